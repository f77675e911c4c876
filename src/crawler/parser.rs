//! Decoding of GraphQL connection pages
//!
//! This module turns a raw response body into records plus pagination info:
//! - Top-level GraphQL `errors` are surfaced as parse failures
//! - `data.<field>.edges[].node` objects become [`Record`]s keyed by `id`
//! - `pageInfo` provides the next cursor; `totalCount` is used when present

use crate::model::Record;
use crate::FetchError;
use serde::Deserialize;
use serde_json::{Map, Value};

/// One decoded page, before cursor bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    pub records: Vec<Record>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
    /// Total matches reported by the platform, if it reports one
    pub total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection {
    edges: Vec<Edge>,
    page_info: PageInfo,
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: Map<String, Value>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    #[serde(default)]
    end_cursor: Option<String>,
}

/// Parses a GraphQL connection page
///
/// # Arguments
///
/// * `body` - Raw response body
/// * `field` - Name of the connection field under `data`
///
/// # Returns
///
/// * `Ok(RawPage)` - Records in page order plus pagination info
/// * `Err(FetchError::Parse)` - The body is not a well-formed page
pub fn parse_connection_page(body: &str, field: &str) -> Result<RawPage, FetchError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("response is not JSON: {}", e)))?;

    if !envelope.errors.is_empty() {
        let messages: Vec<_> = envelope.errors.into_iter().map(|e| e.message).collect();
        return Err(FetchError::Parse(format!(
            "GraphQL errors: {}",
            messages.join("; ")
        )));
    }

    let connection_value = envelope
        .data
        .and_then(|mut data| data.get_mut(field).map(Value::take))
        .filter(|value| !value.is_null())
        .ok_or_else(|| FetchError::Parse(format!("response has no data.{}", field)))?;

    let connection: Connection = serde_json::from_value(connection_value)
        .map_err(|e| FetchError::Parse(format!("malformed {} connection: {}", field, e)))?;

    let last_edge_cursor = connection.edges.last().and_then(|e| e.cursor.clone());

    let mut records = Vec::with_capacity(connection.edges.len());
    for (index, edge) in connection.edges.into_iter().enumerate() {
        let id = record_id(&edge.node)
            .ok_or_else(|| FetchError::Parse(format!("edge {} has no usable id", index)))?;
        records.push(Record::new(id, edge.node));
    }

    let end_cursor = connection.page_info.end_cursor.or(last_edge_cursor);
    if connection.page_info.has_next_page && end_cursor.is_none() {
        return Err(FetchError::Parse(
            "hasNextPage is set but no cursor was returned".to_string(),
        ));
    }

    Ok(RawPage {
        records,
        has_next_page: connection.page_info.has_next_page,
        end_cursor,
        total_count: connection.total_count,
    })
}

fn record_id(node: &Map<String, Value>) -> Option<String> {
    match node.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
