//! Append-only store of context items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clock::{system_clock, Clock};
use crate::error::{ContextError, Result};

/// A stored content unit with embedding and timestamp
///
/// Never mutated after creation; the embedding is shared by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: Uuid,
    pub content: String,
    pub embedding: Arc<Vec<f32>>,
    pub token_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Append-only list of context items
///
/// Does not deduplicate. Timestamps come from the injected clock unless
/// the caller supplies one explicitly.
pub struct ContextStore {
    items: Vec<ContextItem>,
    clock: Arc<dyn Clock>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            items: Vec::new(),
            clock,
        }
    }

    /// Append an item, timestamped by the store's clock
    pub fn add(
        &mut self,
        content: impl Into<String>,
        embedding: Vec<f32>,
        token_count: usize,
    ) -> Result<Uuid> {
        let timestamp = self.clock.now();
        self.add_with_timestamp(content, embedding, token_count, timestamp)
    }

    /// Append an item with an explicit timestamp
    pub fn add_with_timestamp(
        &mut self,
        content: impl Into<String>,
        embedding: Vec<f32>,
        token_count: usize,
        timestamp: DateTime<Utc>,
    ) -> Result<Uuid> {
        let content = content.into();
        if content.is_empty() {
            return Err(ContextError::InvalidArgument(
                "context item content must be non-empty".to_string(),
            ));
        }
        if embedding.is_empty() {
            return Err(ContextError::InvalidArgument(
                "context item embedding must have positive dimension".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        self.items.push(ContextItem {
            id,
            content,
            embedding: Arc::new(embedding),
            token_count,
            timestamp,
        });
        debug!(%id, total = self.items.len(), "Added context item");
        Ok(id)
    }

    /// Remove every item
    pub fn clear(&mut self) {
        self.items.clear();
        debug!("Cleared context store");
    }

    /// Read-only snapshot in insertion order
    pub fn items(&self) -> &[ContextItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_add_and_snapshot_order() {
        let mut store = ContextStore::new();
        store.add("first", vec![1.0, 0.0], 3).unwrap();
        store.add("second", vec![0.0, 1.0], 4).unwrap();

        let items = store.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].content, "first");
        assert_eq!(items[1].content, "second");
    }

    #[test]
    fn test_invalid_items_rejected() {
        let mut store = ContextStore::new();
        assert!(store.add("", vec![1.0], 1).is_err());
        assert!(store.add("content", vec![], 1).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_clock_timestamps_are_monotonic_by_insertion() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let mut store = ContextStore::with_clock(clock.clone());

        store.add("a", vec![1.0], 1).unwrap();
        clock.advance(Duration::seconds(10));
        store.add("b", vec![1.0], 1).unwrap();

        let items = store.items();
        assert!(items[0].timestamp < items[1].timestamp);
        assert_eq!(items[1].timestamp, start + Duration::seconds(10));
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut store = ContextStore::new();
        store.add("same", vec![1.0], 1).unwrap();
        store.add("same", vec![1.0], 1).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut store = ContextStore::new();
        store.add("a", vec![1.0], 1).unwrap();
        store.clear();
        assert!(store.is_empty());
    }
}
