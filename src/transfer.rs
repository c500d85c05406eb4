//! Moving export documents in and out of the board.
//!
//! [`BlobSink`] and [`BlobSource`] are the only places that know where a
//! payload lives. The pipelines here do all the work that can fail (encoding,
//! sealing, decrypting, parsing) before they touch the sink or the store.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::database::KeyValueStore;
use crate::exchange::{self, ExchangeError, PasswordPrompt};
use crate::store::{IdeaStore, StoreError};

/// Extension given to exported boards. Plain `.json` is accepted on import too.
pub const EXPORT_EXTENSION: &str = "lock";
const EXPORT_PREFIX: &str = "borrachos-ideas";
const IMPORT_EXTENSIONS: [&str; 2] = ["lock", "json"];

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Not an idea export (expected .lock or .json): {0}")]
    UnsupportedFile(PathBuf),
    #[error(transparent)]
    ExchangeError(#[from] ExchangeError),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
}

/// Destination for an export payload.
pub trait BlobSink {
    /// Write `payload` under a name derived from `file_name`, returning where it went.
    fn save(&mut self, file_name: &str, payload: &str) -> Result<PathBuf, TransferError>;
}

/// Origin of an import payload.
pub trait BlobSource {
    fn load(&mut self) -> Result<String, TransferError>;
}

/// Writes exports into a directory, creating it if needed.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BlobSink for DirectorySink {
    fn save(&mut self, file_name: &str, payload: &str) -> Result<PathBuf, TransferError> {
        fs::create_dir_all(&self.dir)?;

        let target = self.dir.join(file_name);
        let staging = self.dir.join(format!("{file_name}.new"));
        fs::write(&staging, payload)?;
        if let Err(e) = fs::rename(&staging, &target) {
            if let Err(cleanup) = fs::remove_file(&staging) {
                tracing::warn!(path = %staging.display(), error = %cleanup, "could not remove staging file");
            }
            return Err(e.into());
        }

        Ok(target)
    }
}

/// Reads an import from a single file.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BlobSource for FileSource {
    fn load(&mut self) -> Result<String, TransferError> {
        if !is_exchange_file(&self.path) {
            return Err(TransferError::UnsupportedFile(self.path.clone()));
        }
        Ok(fs::read_to_string(&self.path)?)
    }
}

/// `borrachos-ideas-YYYY-MM-DD.lock`, the name older boards gave their exports
pub fn suggested_file_name(date: &str) -> String {
    format!("{EXPORT_PREFIX}-{date}.{EXPORT_EXTENSION}")
}

/// Whether a path carries one of the extensions imports accept
pub fn is_exchange_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMPORT_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub location: PathBuf,
    pub count: usize,
    pub encrypted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Merged { offered: usize, added: usize },
    /// The file was sealed and no password was given.
    Cancelled,
    /// The file decoded but the user chose not to merge it.
    Declined,
}

/// Encode the whole board and hand it to `sink`.
///
/// Nothing reaches the sink unless encoding and encryption succeeded.
pub fn export_ideas<S, B>(
    store: &IdeaStore<S>,
    password: Option<&str>,
    sink: &mut B,
    date: &str,
) -> Result<ExportReport, TransferError>
where
    S: KeyValueStore,
    B: BlobSink + ?Sized,
{
    let document = exchange::encode(store.ideas(), password)?;
    let payload = document.to_payload()?;
    let location = sink.save(&suggested_file_name(date), &payload)?;

    let report = ExportReport {
        location,
        count: store.len(),
        encrypted: document.is_encrypted(),
    };
    tracing::info!(
        count = report.count,
        encrypted = report.encrypted,
        location = %report.location.display(),
        "exported ideas"
    );
    Ok(report)
}

/// Read, decode and merge an import.
///
/// `confirm` sees how many candidate ideas the file holds and decides whether
/// to merge them. Any failure leaves the store as it was.
pub fn import_ideas<S, B, P, C>(
    store: &mut IdeaStore<S>,
    source: &mut B,
    prompt: &mut P,
    confirm: C,
) -> Result<ImportOutcome, TransferError>
where
    S: KeyValueStore,
    B: BlobSource + ?Sized,
    P: PasswordPrompt + ?Sized,
    C: FnOnce(usize) -> bool,
{
    let payload = source.load()?;

    let candidates = match exchange::decode(&payload, prompt) {
        Ok(ideas) => ideas,
        Err(e) if e.is_cancelled() => {
            tracing::info!("import cancelled: no password given");
            return Ok(ImportOutcome::Cancelled);
        }
        Err(e) => {
            tracing::warn!(error = %e, "import rejected");
            return Err(e.into());
        }
    };

    let offered = candidates.len();
    if !confirm(offered) {
        return Ok(ImportOutcome::Declined);
    }

    let added = store.merge(candidates)?;
    Ok(ImportOutcome::Merged { offered, added })
}
