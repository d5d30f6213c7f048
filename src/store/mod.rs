//! Output store: the `metadata.csv` ledger and the exported PDF files.
//!
//! The ledger is the only record of completion. A record counts as done once
//! its row has been appended and synced; a PDF without a row is overwritten on
//! the next run. Each output file name belongs to the first record whose row
//! names it; another record mapping to the same name is refused.
//!
//! # Example
//!
//! ```no_run
//! use libsafe_export::record::RecordId;
//! use libsafe_export::store::{ExportedRow, OutputStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = OutputStore::open("/srv/libsafe")?;
//! let id = RecordId::parse("10754/662345")?;
//! if !store.is_done(&id) {
//!     store.write_file(&id, b"%PDF-1.7").await?;
//!     store.append_row(&id, &ExportedRow::default())?;
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::record::RecordId;

mod error;
mod filename;
mod row;

pub use error::StoreError;
pub use filename::PDF_EXTENSION;
pub use row::{ExportedRow, LEDGER_HEADERS};

/// File name of the ledger inside the export directory.
pub const LEDGER_FILE_NAME: &str = "metadata.csv";

/// Append-only ledger of completed records plus their files.
#[derive(Debug)]
pub struct OutputStore {
    dir: PathBuf,
    ledger_path: PathBuf,
    done: HashSet<RecordId>,
    claimed: HashMap<String, RecordId>,
    unreadable_rows: usize,
}

impl OutputStore {
    /// Opens the store rooted at `dir` and loads the ledger's done set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingDirectory`] when `dir` is not an existing
    /// directory, or [`StoreError::Io`]/[`StoreError::Csv`] when the ledger
    /// exists but cannot be read.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let requested = dir.as_ref();
        if !requested.is_dir() {
            return Err(StoreError::MissingDirectory {
                path: requested.to_path_buf(),
            });
        }
        let dir = requested
            .canonicalize()
            .map_err(|e| StoreError::io(requested, e))?;
        let ledger_path = dir.join(LEDGER_FILE_NAME);

        let mut store = Self {
            dir,
            ledger_path,
            done: HashSet::new(),
            claimed: HashMap::new(),
            unreadable_rows: 0,
        };
        store.load_ledger()?;

        info!(
            dir = %store.dir.display(),
            done = store.done.len(),
            unreadable_rows = store.unreadable_rows,
            "output store opened"
        );
        Ok(store)
    }

    fn load_ledger(&mut self) -> Result<(), StoreError> {
        if !self.ledger_path.exists() {
            debug!(path = %self.ledger_path.display(), "no ledger yet");
            return Ok(());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.ledger_path)
            .map_err(|e| StoreError::csv(&self.ledger_path, e))?;

        for (index, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(error) => {
                    warn!(row = index + 1, error = %error, "unreadable ledger row");
                    self.unreadable_rows += 1;
                    continue;
                }
            };
            let handle = record.get(0).unwrap_or_default().trim();

            match RecordId::from_handle_url(handle).or_else(|_| RecordId::parse(handle)) {
                Ok(id) => {
                    let file = record.get(1).map(str::trim).unwrap_or_default();
                    self.claim(file, &id);
                    self.done.insert(id);
                }
                Err(error) => {
                    warn!(
                        row = index + 1,
                        handle,
                        error = %error,
                        "ledger row has no valid handle"
                    );
                    self.unreadable_rows += 1;
                }
            }
        }

        Ok(())
    }

    /// Canonical export directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `metadata.csv`.
    #[must_use]
    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Number of records marked done.
    #[must_use]
    pub fn len(&self) -> usize {
        self.done.len()
    }

    /// True when no record is marked done.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Ledger rows skipped at load time because their handle did not parse.
    #[must_use]
    pub fn unreadable_rows(&self) -> usize {
        self.unreadable_rows
    }

    /// True when `id` already has a ledger row.
    #[must_use]
    pub fn is_done(&self, id: &RecordId) -> bool {
        self.done.contains(id)
    }

    /// Record whose ledger row names `file_name`, if any.
    #[must_use]
    pub fn owner_of(&self, file_name: &str) -> Option<&RecordId> {
        self.claimed.get(file_name)
    }

    /// Marks `file` (or `<suffix>.pdf` when empty) as belonging to `id`.
    /// The first claim wins.
    fn claim(&mut self, file: &str, id: &RecordId) {
        let file = if file.is_empty() {
            filename::output_file_name(id.suffix())
        } else {
            file.to_string()
        };
        self.claimed.entry(file).or_insert_with(|| id.clone());
    }

    /// Appends one row, syncs the ledger to disk, then marks `id` done.
    ///
    /// The header is written only when the ledger is new or empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] or [`StoreError::Csv`] when the row could
    /// not be made durable; `id` is not marked done in that case.
    pub fn append_row(&mut self, id: &RecordId, row: &ExportedRow) -> Result<(), StoreError> {
        let path = &self.ledger_path;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        let is_new = file.metadata().map_err(|e| StoreError::io(path, e))?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer
            .serialize(row)
            .map_err(|e| StoreError::csv(path, e))?;
        writer.flush().map_err(|e| StoreError::io(path, e))?;
        writer
            .get_ref()
            .sync_data()
            .map_err(|e| StoreError::io(path, e))?;

        self.claim(&row.file_name, id);
        self.done.insert(id.clone());
        debug!(handle = %id, "ledger row appended");
        Ok(())
    }

    /// Writes the record's PDF as `<suffix>.pdf` in the export directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::FileClaimed`] when the ledger already assigns
    /// that file to a different record; nothing is written then. Otherwise
    /// see [`write_named`](Self::write_named).
    pub async fn write_file(&self, id: &RecordId, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let file_name = filename::output_file_name(id.suffix());
        if let Some(owner) = self.owner_of(&file_name)
            && owner != id
        {
            return Err(StoreError::file_claimed(file_name, owner.to_string()));
        }
        self.write_named(id.suffix(), bytes).await
    }

    /// Atomically writes `bytes` to `<stem>.pdf` in the export directory.
    ///
    /// Data goes to `<stem>.pdf.tmp` first, is synced, then renamed over the
    /// final name. An existing file with that name is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PathViolation`] when `stem` is not a single plain
    /// file name, and [`StoreError::Io`] when any write step fails.
    pub async fn write_named(&self, stem: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = filename::confined_output_path(&self.dir, stem)?;
        let temp_path = filename::temp_path_for(&path);

        if let Err(error) = write_synced(&temp_path, bytes).await {
            remove_leftover(&temp_path).await;
            return Err(error);
        }
        if let Err(error) = tokio::fs::rename(&temp_path, &path).await {
            remove_leftover(&temp_path).await;
            return Err(StoreError::io(&path, error));
        }
        sync_dir(&self.dir).await?;

        debug!(path = %path.display(), bytes = bytes.len(), "file written");
        Ok(path)
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    file.sync_all().await.map_err(|e| StoreError::io(path, e))
}

async fn remove_leftover(path: &Path) {
    if let Err(error) = tokio::fs::remove_file(path).await
        && error.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %error, "could not remove temporary file");
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    let handle = tokio::fs::File::open(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;
    handle.sync_all().await.map_err(|e| StoreError::io(dir, e))
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}
