//! Daily quota tracking.
//!
//! The allowance is a client-side deterrent, not an authoritative limit: the
//! record lives in a local file and nothing stops a user from editing it.

use crate::error::{PfpError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Generations allowed per calendar day.
pub const DAILY_LIMIT: u32 = 4;

/// Key the record is stored under in the quota file.
pub const STORAGE_KEY: &str = "pfp_generations";

/// Attempts consumed on one calendar day.
///
/// Serialises as `{"date": "YYYY-MM-DD", "count": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Day the count applies to.
    pub date: NaiveDate,
    /// Attempts consumed on `date`.
    pub count: u32,
}

impl QuotaRecord {
    /// A fresh record for `today` with nothing consumed.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date: today,
            count: 0,
        }
    }

    /// Applies the day-boundary rule to a stored record.
    ///
    /// Returns the record to use for `today` and whether it differs from what
    /// was stored (and so must be written back). A missing record or one from
    /// any other day is replaced by a zero count; nothing carries over.
    pub fn refreshed(stored: Option<QuotaRecord>, today: NaiveDate) -> (QuotaRecord, bool) {
        match stored {
            Some(record) if record.date == today => (record, false),
            _ => (QuotaRecord::new(today), true),
        }
    }

    /// Remaining allowance under `limit`.
    pub fn remaining(&self, limit: u32) -> u32 {
        limit.saturating_sub(self.count)
    }
}

/// Source of the current calendar day.
pub trait Clock: Send + Sync {
    /// Returns today's date.
    fn today(&self) -> NaiveDate;
}

/// Local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// A clock pinned to one day. Can be moved forward by hand.
#[derive(Debug)]
pub struct FixedClock(Mutex<NaiveDate>);

impl FixedClock {
    /// Creates a clock that reports `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self(Mutex::new(date))
    }

    /// Changes the reported day.
    pub fn set(&self, date: NaiveDate) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = date;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

/// Persistence for the quota record.
pub trait QuotaStore: Send + Sync {
    /// Loads the stored record, if any.
    fn load(&self) -> Result<Option<QuotaRecord>>;

    /// Persists `record`, replacing whatever was stored.
    fn save(&self, record: &QuotaRecord) -> Result<()>;
}

impl<T: QuotaStore + ?Sized> QuotaStore for Arc<T> {
    fn load(&self) -> Result<Option<QuotaRecord>> {
        (**self).load()
    }

    fn save(&self, record: &QuotaRecord) -> Result<()> {
        (**self).save(record)
    }
}

/// Quota record kept in a JSON object file under [`STORAGE_KEY`].
///
/// Other keys in the file are preserved on write, and writes go through a
/// sibling temp file renamed into place. A missing file or malformed content
/// reads as absent, so the next refresh starts a clean day. Any other read
/// failure is a [`PfpError::Storage`] error and the file is left alone.
#[derive(Debug, Clone)]
pub struct FileQuotaStore {
    path: PathBuf,
}

impl FileQuotaStore {
    /// Creates a store backed by `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, e: std::io::Error) -> PfpError {
        PfpError::Storage(format!("{}: {e}", self.path.display()))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn read_object(&self) -> Result<Option<Map<String, Value>>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "failed to read quota file: {e}");
                return Err(self.storage_error(e));
            }
        };
        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            _ => {
                tracing::warn!(path = %self.path.display(), "ignoring malformed quota file");
                Ok(None)
            }
        }
    }
}

impl QuotaStore for FileQuotaStore {
    fn load(&self) -> Result<Option<QuotaRecord>> {
        let Some(mut object) = self.read_object()? else {
            return Ok(None);
        };
        Ok(object
            .remove(STORAGE_KEY)
            .and_then(|value| serde_json::from_value(value).ok()))
    }

    fn save(&self, record: &QuotaRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.storage_error(e))?;
        }

        let mut object = self.read_object()?.unwrap_or_default();
        object.insert(STORAGE_KEY.to_string(), serde_json::to_value(record)?);
        let content = serde_json::to_string_pretty(&Value::Object(object))?;

        let temp_path = self.temp_path();
        std::fs::write(&temp_path, content).map_err(|e| self.storage_error(e))?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            self.storage_error(e)
        })
    }
}

/// In-memory quota store.
#[derive(Debug, Default)]
pub struct MemoryQuotaStore(Mutex<Option<QuotaRecord>>);

impl MemoryQuotaStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `record`.
    pub fn with_record(record: QuotaRecord) -> Self {
        Self(Mutex::new(Some(record)))
    }

    /// Returns the stored record without refreshing it.
    pub fn peek(&self) -> Option<QuotaRecord> {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl QuotaStore for MemoryQuotaStore {
    fn load(&self) -> Result<Option<QuotaRecord>> {
        Ok(self.peek())
    }

    fn save(&self, record: &QuotaRecord) -> Result<()> {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = Some(*record);
        Ok(())
    }
}

/// Tracks the daily generation allowance.
///
/// Reads and writes are not coordinated: two overlapping `consume` calls may
/// both read the same count and under-count by one.
pub struct QuotaTracker {
    store: Box<dyn QuotaStore>,
    clock: Box<dyn Clock>,
    limit: u32,
}

impl QuotaTracker {
    /// Creates a tracker with the default daily limit and the system clock.
    pub fn new(store: impl QuotaStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            clock: Box::new(SystemClock),
            limit: DAILY_LIMIT,
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Returns the daily limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Loads the record for today, resetting it if the day has changed.
    ///
    /// Returns the remaining allowance.
    pub fn check_and_refresh(&self) -> Result<u32> {
        let record = self.current()?;
        Ok(record.remaining(self.limit))
    }

    /// Records one consumed attempt for today. Returns the remaining allowance.
    ///
    /// Callers check the allowance first; this only increments.
    pub fn consume(&self) -> Result<u32> {
        let mut record = self.current()?;
        record.count = record.count.saturating_add(1);
        self.store.save(&record)?;
        tracing::debug!(date = %record.date, count = record.count, "quota consumed");
        Ok(record.remaining(self.limit))
    }

    fn current(&self) -> Result<QuotaRecord> {
        let today = self.clock.today();
        let (record, changed) = QuotaRecord::refreshed(self.store.load()?, today);
        if changed {
            tracing::debug!(date = %today, "starting new quota day");
            self.store.save(&record)?;
        }
        Ok(record)
    }
}

impl std::fmt::Debug for QuotaTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaTracker")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}
