//! Persisted subscription selection

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::types::{ActiveSubscriptionRef, SubscriptionId};

/// Contents of `state.toml`: which subscription the tunnel should use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionState {
    /// Selected subscription; empty when none
    pub current: ActiveSubscriptionRef,
}

impl SelectionState {
    /// Load the selection, treating a missing file as "nothing selected"
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        super::load_or_default(path)
    }

    /// Persist the selection
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        super::save_config(path, self)
    }

    /// Select a subscription; returns false if it was already selected
    pub fn select(&mut self, id: &SubscriptionId) -> bool {
        if self.current.is(id) {
            return false;
        }
        self.current = ActiveSubscriptionRef::from(id);
        true
    }

    /// Clear the selection if it points at `id`; returns whether it did
    pub fn clear_if(&mut self, id: &SubscriptionId) -> bool {
        if self.current.is(id) {
            self.current = ActiveSubscriptionRef::none();
            true
        } else {
            false
        }
    }
}
