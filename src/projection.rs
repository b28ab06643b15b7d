//! Context projection
//!
//! Turns ranked candidate keys into the compact JSON block embedded in the
//! prompt: country codes only, a bounded notes summary, and an overall
//! character cap. The cap is enforced at item boundaries: lower-ranked items
//! are dropped whole so the block is always valid JSON with complete records.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ContextLimits;
use crate::dataset::{RegulatoryRecord, RegulatoryStore};
use crate::error::ConsistencyError;

/// Summary used when a record has no notes
pub const EMPTY_NOTES_PLACEHOLDER: &str = "No additional regulatory notes available.";

/// Prompt-facing view of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedItem {
    pub prohibited_in: Vec<String>,
    pub restricted_in: Vec<String>,
    pub summary: String,
}

impl ProjectedItem {
    fn from_record(record: &RegulatoryRecord, summary_chars: usize) -> Self {
        let summary = match record.notes.as_deref() {
            Some(notes) if !notes.trim().is_empty() => notes.chars().take(summary_chars).collect(),
            _ => EMPTY_NOTES_PLACEHOLDER.chars().take(summary_chars).collect(),
        };
        Self {
            prohibited_in: record.prohibited_codes(),
            restricted_in: record.restricted_codes(),
            summary,
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "prohibited_in": self.prohibited_in,
            "restricted_in": self.restricted_in,
            "summary": self.summary,
        })
    }
}

/// The projected items that survived the cap, in rank order, with their
/// serialized form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedContext {
    items: Vec<(String, ProjectedItem)>,
    serialized: String,
    dropped: Vec<String>,
}

impl ProjectedContext {
    pub fn items(&self) -> &[(String, ProjectedItem)] {
        &self.items
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(key, _)| key.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&ProjectedItem> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, item)| item)
    }

    /// Compact JSON object keyed by item name
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Keys removed to respect the size cap
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Builds [`ProjectedContext`] values under fixed [`ContextLimits`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextProjector {
    limits: ContextLimits,
}

impl ContextProjector {
    pub fn new(limits: ContextLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ContextLimits {
        self.limits
    }

    /// Project `keys` (best first) from `store`.
    ///
    /// Every key must exist in the store; retrieval only returns stored keys,
    /// so a miss is reported as a [`ConsistencyError`].
    pub fn project<S: AsRef<str>>(
        &self,
        keys: &[S],
        store: &RegulatoryStore,
    ) -> Result<ProjectedContext, ConsistencyError> {
        let projected = keys
            .iter()
            .map(|key| {
                let key = key.as_ref();
                store
                    .get(key)
                    .map(|record| {
                        (
                            key.to_string(),
                            ProjectedItem::from_record(record, self.limits.summary_chars),
                        )
                    })
                    .ok_or_else(|| ConsistencyError::MissingRecord {
                        key: key.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.cap(projected))
    }

    fn cap(&self, projected: Vec<(String, ProjectedItem)>) -> ProjectedContext {
        let cap = self.limits.context_chars;
        let mut fragments: Vec<String> = Vec::new();
        let mut items = Vec::new();
        let mut dropped = Vec::new();
        // "{" + "}"
        let mut used = 2;
        let mut full = false;

        for (key, mut item) in projected {
            if full {
                dropped.push(key);
                continue;
            }

            let separator = usize::from(!fragments.is_empty());
            let mut fragment = render(&key, &item);
            let mut cost = separator + char_len(&fragment);

            if used + cost > cap && items.is_empty() {
                // Nothing included yet: shorten this record's summary rather
                // than sending an empty context.
                let mut summary_len = char_len(&item.summary);
                while used + cost > cap && summary_len > 0 {
                    let excess = used + cost - cap;
                    summary_len = summary_len.saturating_sub(excess.max(1));
                    item.summary = item.summary.chars().take(summary_len).collect();
                    fragment = render(&key, &item);
                    cost = separator + char_len(&fragment);
                }
            }

            if used + cost <= cap {
                used += cost;
                fragments.push(fragment);
                items.push((key, item));
            } else if items.is_empty() {
                dropped.push(key);
            } else {
                full = true;
                dropped.push(key);
            }
        }

        if !dropped.is_empty() {
            debug!(
                "Context cap of {} chars dropped {} item(s): {:?}",
                cap,
                dropped.len(),
                dropped
            );
        }

        ProjectedContext {
            items,
            serialized: format!("{{{}}}", fragments.join(",")),
            dropped,
        }
    }
}

/// Convenience wrapper over [`ContextProjector::project`] with default limits
pub fn project<S: AsRef<str>>(
    keys: &[S],
    store: &RegulatoryStore,
) -> Result<ProjectedContext, ConsistencyError> {
    ContextProjector::default().project(keys, store)
}

fn render(key: &str, item: &ProjectedItem) -> String {
    format!("{}:{}", Value::String(key.to_string()), item.to_json())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
