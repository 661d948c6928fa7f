//! Shared domain models.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to a ship design by the authoritative empire layer.
pub type DesignId = i32;

/// Name of a hull in the static hull registry.
pub type HullName = String;

/// Name of a ship part.
pub type PartName = String;

/// Hull and parts of a design, as far as the catalog cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignSummary {
    /// Hull the design is built on.
    pub hull: HullName,
    /// Parts mounted in the hull's slots. Empty names mark empty slots.
    #[serde(default)]
    pub parts: Vec<PartName>,
}

impl DesignSummary {
    /// Build a summary from a hull and its parts.
    pub fn new(hull: impl Into<HullName>, parts: impl IntoIterator<Item = impl Into<PartName>>) -> Self {
        Self {
            hull: hull.into(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Names of the parts actually fitted, skipping empty slots.
    pub fn fitted_parts(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .map(String::as_str)
            .filter(|part| !part.is_empty())
    }
}

/// Query interface onto the session's known designs.
pub trait DesignLookup {
    /// Hull and parts of `id`, or `None` if the session does not know it.
    fn design(&self, id: DesignId) -> Option<&DesignSummary>;
}

impl DesignLookup for HashMap<DesignId, DesignSummary> {
    fn design(&self, id: DesignId) -> Option<&DesignSummary> {
        self.get(&id)
    }
}

/// A design saved to disk independently of any game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedDesign {
    /// Stable identity of the saved design.
    pub uuid: Uuid,
    /// Player-visible design name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Hull the design is built on.
    pub hull: HullName,
    /// Parts mounted in the hull's slots. Empty names mark empty slots.
    #[serde(default)]
    pub parts: Vec<PartName>,
}

impl SavedDesign {
    /// Create a saved design with a freshly generated UUID.
    pub fn new(
        name: impl Into<String>,
        hull: impl Into<HullName>,
        parts: impl IntoIterator<Item = impl Into<PartName>>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            hull: hull.into(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns a user-facing label combining name and hull.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("<unnamed> · {}", self.hull)
        } else {
            format!("{} · {}", self.name, self.hull)
        }
    }

    /// Hull and part summary of this design.
    pub fn summary(&self) -> DesignSummary {
        DesignSummary {
            hull: self.hull.clone(),
            parts: self.parts.clone(),
        }
    }
}
