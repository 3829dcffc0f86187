//! Per-replica presence state.
//!
//! Presence is ephemeral: each attached replica publishes one flat map
//! of string keys (cursor position, display name, and the like), updates
//! replace the map wholesale, and the newest update per replica wins.
//! Presence never merges per key and leaves no tombstones; detaching
//! removes the replica's entry everywhere.

use std::collections::BTreeMap;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// A replica's published presence map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence(BTreeMap<String, String>);

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl Deref for Presence {
    type Target = BTreeMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Presence {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A presence map together with the stamp of the update that set it.
/// Last writer wins wholesale; there is no per-key merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub presence: Presence,
    pub updated_at: Timestamp,
}

impl PresenceRecord {
    pub fn new(presence: Presence, updated_at: Timestamp) -> Self {
        Self {
            presence,
            updated_at,
        }
    }

    /// Replace the stored map when `updated_at` is newer. Returns whether
    /// the record changed.
    pub(crate) fn replace_if_newer(&mut self, presence: Presence, updated_at: Timestamp) -> bool {
        if updated_at > self.updated_at {
            self.presence = presence;
            self.updated_at = updated_at;
            true
        } else {
            false
        }
    }
}
