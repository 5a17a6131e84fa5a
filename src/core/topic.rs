//! Topic index: which document locations discuss which topic.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Mapping from topic name to the 1-based locations where it is discussed.
///
/// Location numbers are stored exactly as the service returned them. The
/// valid range depends on the document, so filtering happens when the
/// index is consumed (see [`TopicIndex::valid_locations`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicIndex {
    topics: BTreeMap<String, Vec<i64>>,
}

impl TopicIndex {
    /// Creates an index from raw topic entries.
    #[must_use]
    pub fn new(topics: BTreeMap<String, Vec<i64>>) -> Self {
        Self { topics }
    }

    /// Number of topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Returns `true` if the index has no topics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Iterates over topics and their raw location numbers.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[i64])> {
        self.topics.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Raw location numbers for a topic.
    #[must_use]
    pub fn raw_locations(&self, topic: &str) -> Option<&[i64]> {
        self.topics.get(topic).map(Vec::as_slice)
    }

    /// Locations of `topic` within `1..=total_locations`, sorted and deduplicated.
    ///
    /// Unknown topics and out-of-range numbers yield nothing.
    #[must_use]
    pub fn valid_locations(&self, topic: &str, total_locations: usize) -> Vec<usize> {
        self.raw_locations(topic)
            .map(|raw| filter_locations(raw, total_locations))
            .unwrap_or_default()
    }
}

/// Keeps location numbers in `1..=total_locations`, sorted and deduplicated.
#[must_use]
pub fn filter_locations(raw: &[i64], total_locations: usize) -> Vec<usize> {
    raw.iter()
        .filter_map(|&n| usize::try_from(n).ok())
        .filter(|&n| n >= 1 && n <= total_locations)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
