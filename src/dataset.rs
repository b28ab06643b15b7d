//! Regulatory dataset store
//!
//! Holds the immutable item-name → [`RegulatoryRecord`] mapping loaded once
//! at startup. The store is constructed explicitly and shared behind an
//! `Arc`; nothing mutates it after construction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::DatasetLoadError;

/// A jurisdiction entry inside a record. Fields other than the ISO code
/// (country names, remarks) are accepted and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryEntry {
    pub iso_code: String,
}

impl CountryEntry {
    pub fn new(iso_code: impl Into<String>) -> Self {
        Self {
            iso_code: iso_code.into(),
        }
    }
}

/// Shipping regulations for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulatoryRecord {
    pub prohibited_in: Vec<CountryEntry>,
    pub restricted_in: Vec<CountryEntry>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RegulatoryRecord {
    pub fn new<P, R>(prohibited_in: P, restricted_in: R, notes: Option<&str>) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            prohibited_in: prohibited_in.into_iter().map(CountryEntry::new).collect(),
            restricted_in: restricted_in.into_iter().map(CountryEntry::new).collect(),
            notes: notes.map(str::to_string),
        }
    }

    pub fn prohibited_codes(&self) -> Vec<String> {
        self.prohibited_in.iter().map(|c| c.iso_code.clone()).collect()
    }

    pub fn restricted_codes(&self) -> Vec<String> {
        self.restricted_in.iter().map(|c| c.iso_code.clone()).collect()
    }
}

/// Whether the store holds the dataset or degraded to empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetStatus {
    Loaded,
    Unavailable(String),
}

/// Read-only regulatory dataset
#[derive(Debug, Clone)]
pub struct RegulatoryStore {
    records: BTreeMap<String, RegulatoryRecord>,
    status: DatasetStatus,
}

impl RegulatoryStore {
    /// Build a store from in-memory records
    pub fn from_records(records: BTreeMap<String, RegulatoryRecord>) -> Self {
        Self {
            records,
            status: DatasetStatus::Loaded,
        }
    }

    /// An empty store that remembers why the dataset is missing
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            records: BTreeMap::new(),
            status: DatasetStatus::Unavailable(reason.into()),
        }
    }

    /// Load and validate the dataset, failing on a missing or invalid file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetLoadError> {
        let path = path.as_ref();
        let records: BTreeMap<String, RegulatoryRecord> = read_json(path)?;
        info!(
            "Regulatory dataset loaded from {} ({} items)",
            path.display(),
            records.len()
        );
        Ok(Self::from_records(records))
    }

    /// Load the dataset, degrading to an empty store on failure
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(store) => store,
            Err(e) => {
                error!("Regulatory dataset unavailable: {}", e);
                warn!("Continuing with an empty regulatory dataset");
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&RegulatoryRecord> {
        self.records.get(key)
    }

    /// Item names in lexical order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn status(&self) -> &DatasetStatus {
        &self.status
    }

    pub fn is_available(&self) -> bool {
        self.status == DatasetStatus::Loaded
    }
}

/// Read a JSON document from disk into `T`
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DatasetLoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            DatasetLoadError::Missing {
                path: path.to_path_buf(),
            }
        } else {
            DatasetLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    serde_json::from_str(&contents).map_err(|source| DatasetLoadError::Parse {
        path: PathBuf::from(path),
        source,
    })
}
