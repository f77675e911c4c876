//! JSON Lines sink backed by a SQLite checkpoint
//!
//! Records are appended to a JSON Lines file, one record per line, and their
//! ids are recorded in the checkpoint database right after each write. The
//! records file is authoritative: when an existing crawl is reopened, ids
//! found in the file but missing from the database are recorded, and a torn
//! final line left by a crash is cut off.

use crate::config::OutputConfig;
use crate::model::Record;
use crate::output::traits::{OutputResult, Sink};
use crate::state::{CrawlState, Deduplicator};
use crate::storage::{CheckpointStore, SqliteCheckpointStore};
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Sink writing JSON Lines records with a SQLite checkpoint alongside
pub struct JsonSink {
    writer: BufWriter<File>,
    store: SqliteCheckpointStore,
    records_path: PathBuf,
}

#[derive(Deserialize)]
struct LineId {
    id: String,
}

impl JsonSink {
    /// Opens the records file and checkpoint database
    ///
    /// # Arguments
    ///
    /// * `records_path` - JSON Lines file receiving records
    /// * `checkpoint_path` - SQLite checkpoint database
    /// * `fresh` - Discard any previous records and checkpoint
    ///
    /// # Returns
    ///
    /// * `Ok(JsonSink)` - Sink ready to append
    /// * `Err(OutputError)` - Files could not be opened or reconciled
    pub fn open(records_path: &Path, checkpoint_path: &Path, fresh: bool) -> OutputResult<Self> {
        create_parent_dir(records_path)?;
        create_parent_dir(checkpoint_path)?;

        let mut store = SqliteCheckpointStore::new(checkpoint_path)?;

        if fresh {
            store.clear()?;
            File::create(records_path)?;
        } else {
            let recovered = reconcile_records(records_path, &mut store)?;
            if recovered > 0 {
                tracing::debug!(
                    "Reconciled {} record id(s) from {}",
                    recovered,
                    records_path.display()
                );
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(records_path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            store,
            records_path: records_path.to_path_buf(),
        })
    }

    /// Opens the sink at the paths named in the output configuration
    pub fn from_config(config: &OutputConfig, fresh: bool) -> OutputResult<Self> {
        Self::open(
            Path::new(&config.records_path),
            Path::new(&config.checkpoint_path),
            fresh,
        )
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }
}

impl Sink for JsonSink {
    fn append(&mut self, records: &[Record]) -> OutputResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        for record in records {
            serde_json::to_writer(&mut self.writer, record)?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        self.store.record_seen(&ids)?;
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    fn load_checkpoint(&mut self) -> OutputResult<Option<CrawlState>> {
        Ok(self.store.load_state()?)
    }

    fn save_checkpoint(&mut self, state: &CrawlState) -> OutputResult<()> {
        self.writer.flush()?;
        self.store.save_state(state)?;
        Ok(())
    }

    fn emitted_ids(&mut self) -> OutputResult<Deduplicator> {
        Ok(self.store.load_seen()?)
    }
}

fn create_parent_dir(path: &Path) -> OutputResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Records every id in the records file and trims a torn final line
///
/// Returns the number of complete records found.
fn reconcile_records(path: &Path, store: &mut SqliteCheckpointStore) -> OutputResult<usize> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    // Raw bytes: a torn line may end inside a multibyte character.
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut complete_bytes = 0u64;
    let mut ids = Vec::new();

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 || line.last() != Some(&b'\n') {
            break;
        }
        complete_bytes += read as u64;

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let entry: LineId = serde_json::from_slice(&line)?;
        ids.push(entry.id);
    }

    let total_bytes = fs::metadata(path)?.len();
    if complete_bytes < total_bytes {
        tracing::warn!(
            "Dropping incomplete trailing record from {} ({} bytes)",
            path.display(),
            total_bytes - complete_bytes
        );
        OpenOptions::new()
            .write(true)
            .open(path)?
            .set_len(complete_bytes)?;
    }

    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    store.record_seen(&refs)?;
    Ok(ids.len())
}

/// Converts a JSON Lines records file into a single JSON array
///
/// Each array element is the record's attributes object, exactly as the
/// gallery returned it.
///
/// # Returns
///
/// * `Ok(usize)` - Number of records exported
/// * `Err(OutputError)` - The records file is unreadable or malformed
pub fn export_json_array(records_path: &Path, out_path: &Path) -> OutputResult<usize> {
    let reader = BufReader::new(File::open(records_path)?);
    create_parent_dir(out_path)?;
    let mut writer = BufWriter::new(File::create(out_path)?);

    writer.write_all(b"[")?;
    let mut count = 0;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(&line)?;
        if count > 0 {
            writer.write_all(b",")?;
        }
        serde_json::to_writer(&mut writer, &record.attributes)?;
        count += 1;
    }
    writer.write_all(b"]")?;
    writer.flush()?;

    Ok(count)
}
