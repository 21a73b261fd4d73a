//! Day stores: where each trading day's CSV lands, and which days are already there.
//!
//! Layout (flat, in a directory or a bucket):
//! - `{prefix}_{YYYY-MM-DD}.csv`: the day's prices
//! - `{prefix}_{YYYY-MM-DD}.pending.json`: written before the CSV
//! - `{prefix}_{YYYY-MM-DD}.json`: written after the CSV (row count, hash)
//!
//! A date is in the inventory when its CSV exists, is non-empty, and was not
//! left behind by an interrupted write (pending marker without a completed
//! manifest). CSVs from before manifests existed count on their own.
//! The decision uses names and sizes from the listing only; manifest
//! contents are never read back.

pub mod gcs;
pub mod local;
pub mod manifest;

pub use gcs::GcsStore;
pub use local::LocalStore;
pub use manifest::{DayManifest, RecordStatus};

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Errors from listing or writing a day store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid path: {}, or folder doesn't exist", path.display())]
    InvalidLocalPath { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage request failed: {0}")]
    Http(String),

    #[error("storage returned HTTP {status} for {context}")]
    Status { status: u16, context: String },

    #[error("manifest error: {0}")]
    Manifest(String),
}

/// Which destination a run writes to. Exactly one per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Local(PathBuf),
    Cloud,
}

impl Destination {
    /// A local path selects the filesystem; its absence selects the bucket.
    pub fn resolve(local: Option<PathBuf>) -> Self {
        match local {
            Some(path) => Self::Local(path),
            None => Self::Cloud,
        }
    }
}

/// What a stored name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Csv,
    PendingMarker,
    Manifest,
}

/// An entry from a store listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub name: String,
    /// Size in bytes, when the store reports it.
    pub size: Option<u64>,
}

pub fn file_name_for(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}_{}.csv", date.format("%Y-%m-%d"))
}

pub fn pending_name_for(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}_{}.pending.json", date.format("%Y-%m-%d"))
}

pub fn manifest_name_for(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}_{}.json", date.format("%Y-%m-%d"))
}

/// Parse a stored name back into its date and kind.
///
/// Only exact `{prefix}_{YYYY-MM-DD}{suffix}` names match; anything else is
/// `None`.
pub fn parse_record_name(prefix: &str, name: &str) -> Option<(NaiveDate, RecordKind)> {
    let rest = name.strip_prefix(prefix)?.strip_prefix('_')?;

    let (date_part, kind) = if let Some(d) = rest.strip_suffix(".pending.json") {
        (d, RecordKind::PendingMarker)
    } else if let Some(d) = rest.strip_suffix(".json") {
        (d, RecordKind::Manifest)
    } else if let Some(d) = rest.strip_suffix(".csv") {
        (d, RecordKind::Csv)
    } else {
        return None;
    };

    // parse_from_str accepts unpadded fields; the stored form is always padded.
    if date_part.len() != 10 {
        return None;
    }
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    Some((date, kind))
}

/// Date of a CSV record name, if `name` is one.
pub fn parse_file_date(prefix: &str, name: &str) -> Option<NaiveDate> {
    match parse_record_name(prefix, name)? {
        (date, RecordKind::Csv) => Some(date),
        _ => None,
    }
}

/// Dates already downloaded to a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    dates: BTreeSet<NaiveDate>,
}

#[derive(Default)]
struct DayEntries {
    csv_size: Option<Option<u64>>,
    pending: bool,
    complete: bool,
}

impl Inventory {
    /// Build the inventory from a raw store listing.
    pub fn from_listing(prefix: &str, objects: &[StoredObject]) -> Self {
        let mut by_date: BTreeMap<NaiveDate, DayEntries> = BTreeMap::new();

        for object in objects {
            let Some((date, kind)) = parse_record_name(prefix, &object.name) else {
                log::debug!("ignoring unrecognised object {}", object.name);
                continue;
            };
            let entry = by_date.entry(date).or_default();
            match kind {
                RecordKind::Csv => entry.csv_size = Some(object.size),
                RecordKind::PendingMarker => entry.pending = true,
                RecordKind::Manifest => entry.complete = true,
            }
        }

        let mut dates = BTreeSet::new();
        for (date, entry) in by_date {
            match entry.csv_size {
                None => {}
                Some(Some(0)) => log::warn!("{date}: stored CSV is empty, treating as missing"),
                Some(_) if entry.pending && !entry.complete => {
                    log::warn!("{date}: previous write did not complete, treating as missing")
                }
                Some(_) => {
                    dates.insert(date);
                }
            }
        }

        Self { dates }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }
}

impl FromIterator<NaiveDate> for Inventory {
    fn from_iter<I: IntoIterator<Item = NaiveDate>>(iter: I) -> Self {
        Self {
            dates: iter.into_iter().collect(),
        }
    }
}

/// A destination for daily CSVs.
///
/// Implementations provide raw listing and object writes; the inventory rules
/// and the pending/CSV/manifest write sequence live in the provided methods.
pub trait DayStore {
    /// Human-readable name of this store, for log lines.
    fn name(&self) -> &str;

    /// File name prefix of the records in this store.
    fn prefix(&self) -> &str;

    /// One-time setup before a run (bucket creation).
    fn prepare(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Every object in the store that might be a record.
    fn list_objects(&self) -> Result<Vec<StoredObject>, StoreError>;

    /// Write one object; returns where it landed.
    fn put_object(&self, name: &str, bytes: &[u8], content_type: &str)
        -> Result<String, StoreError>;

    fn inventory(&self) -> Result<Inventory, StoreError> {
        let objects = self.list_objects()?;
        Ok(Inventory::from_listing(self.prefix(), &objects))
    }

    /// Persist one day's CSV with its pending marker and manifest.
    ///
    /// Returns the location of the CSV.
    fn put_day(&self, date: NaiveDate, csv: &[u8], rows: usize) -> Result<String, StoreError> {
        let prefix = self.prefix();

        let pending = DayManifest::pending(prefix, date);
        self.put_object(
            &pending_name_for(prefix, date),
            &pending.to_json()?,
            JSON_CONTENT_TYPE,
        )?;

        let location = self.put_object(&file_name_for(prefix, date), csv, CSV_CONTENT_TYPE)?;

        let complete = DayManifest::complete(prefix, date, csv, rows);
        self.put_object(
            &manifest_name_for(prefix, date),
            &complete.to_json()?,
            JSON_CONTENT_TYPE,
        )?;

        Ok(location)
    }
}
