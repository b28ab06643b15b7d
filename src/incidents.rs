//! Incident lookup for route graph nodes
//!
//! Exact-key lookups only. Places absent from the index resolve to
//! [`NO_INCIDENT_SENTINEL`] instead of an error.

use std::collections::HashMap;
use std::path::Path;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::dataset::read_json;
use crate::error::DatasetLoadError;

/// Value reported for places with no recorded incidents
pub const NO_INCIDENT_SENTINEL: &str = "No incident have occured";

/// One lookup result, serialized as a single-entry object `{place: value}`
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentReport {
    pub place: String,
    pub value: Value,
}

impl IncidentReport {
    /// True when the place was not found in the index
    pub fn is_unmatched(&self) -> bool {
        self.value.as_str() == Some(NO_INCIDENT_SENTINEL)
    }
}

impl Serialize for IncidentReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.place, &self.value)?;
        map.end()
    }
}

/// Read-only place → incident count/description index
#[derive(Debug, Clone, Default)]
pub struct IncidentIndex {
    entries: HashMap<String, Value>,
}

impl IncidentIndex {
    pub fn new(entries: HashMap<String, Value>) -> Self {
        Self { entries }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetLoadError> {
        let path = path.as_ref();
        let entries: HashMap<String, Value> = read_json(path)?;
        info!(
            "Incident data loaded from {} ({} places)",
            path.display(),
            entries.len()
        );
        Ok(Self::new(entries))
    }

    /// Load the index, degrading to an empty one on failure
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            error!("Incident data unavailable: {}", e);
            warn!("Continuing with an empty incident index");
            Self::default()
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve each place in order
    pub fn lookup<S: AsRef<str>>(&self, places: &[S]) -> Vec<IncidentReport> {
        places
            .iter()
            .map(|place| {
                let place = place.as_ref();
                let value = self
                    .entries
                    .get(place)
                    .cloned()
                    .unwrap_or_else(|| Value::String(NO_INCIDENT_SENTINEL.to_string()));
                IncidentReport {
                    place: place.to_string(),
                    value,
                }
            })
            .collect()
    }
}
