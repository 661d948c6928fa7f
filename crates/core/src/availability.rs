//! Visibility of catalog rows under the obsolete/available/future toggles.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three independent visibility toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Entries the player has hidden.
    Obsolete,
    /// Entries the empire can produce now.
    Available,
    /// Entries not yet producible.
    Future,
}

impl Availability {
    /// Every toggle, in display order.
    pub const ALL: [Availability; 3] = [
        Availability::Obsolete,
        Availability::Available,
        Availability::Future,
    ];

    /// Lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Obsolete => "obsolete",
            Availability::Available => "available",
            Availability::Future => "future",
        }
    }
}

/// Label that names none of the visibility toggles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown availability `{0}`")]
pub struct UnknownAvailability(pub String);

impl FromStr for Availability {
    type Err = UnknownAvailability;

    /// Parse a label, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "obsolete" => Ok(Availability::Obsolete),
            "available" => Ok(Availability::Available),
            "future" | "unavailable" => Ok(Availability::Future),
            _ => Err(UnknownAvailability(s.to_string())),
        }
    }
}

/// Which toggles caused a visible row to be shown, for badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayedAvailability {
    /// Shown because obsolete entries are shown.
    pub obsolete: bool,
    /// Shown because available entries are shown.
    pub available: bool,
    /// Shown because future entries are shown.
    pub future: bool,
}

/// The UI's current toggle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityToggles {
    /// Show entries the player marked obsolete.
    pub show_obsolete: bool,
    /// Show entries producible now.
    pub show_available: bool,
    /// Show entries not yet producible.
    pub show_future: bool,
}

impl Default for AvailabilityToggles {
    fn default() -> Self {
        Self {
            show_obsolete: false,
            show_available: true,
            show_future: false,
        }
    }
}

impl AvailabilityToggles {
    /// Toggle state from explicit flags.
    pub fn new(show_obsolete: bool, show_available: bool, show_future: bool) -> Self {
        Self {
            show_obsolete,
            show_available,
            show_future,
        }
    }

    /// Current value of one toggle.
    pub fn get(&self, which: Availability) -> bool {
        match which {
            Availability::Obsolete => self.show_obsolete,
            Availability::Available => self.show_available,
            Availability::Future => self.show_future,
        }
    }

    /// Set one toggle.
    pub fn set(&mut self, which: Availability, shown: bool) {
        match which {
            Availability::Obsolete => self.show_obsolete = shown,
            Availability::Available => self.show_available = shown,
            Availability::Future => self.show_future = shown,
        }
    }

    /// Flip one toggle and return its new value.
    pub fn toggle(&mut self, which: Availability) -> bool {
        let shown = !self.get(which);
        self.set(which, shown);
        shown
    }

    /// Decide whether an entry is shown and, if so, which toggles apply.
    ///
    /// With only "obsolete" enabled every obsolete entry is shown. Otherwise
    /// an obsolete entry also needs its availability toggle to be on.
    pub fn displayed(&self, is_available: bool, is_obsolete: bool) -> Option<DisplayedAvailability> {
        let Self {
            show_obsolete,
            show_available,
            show_future,
        } = *self;

        let show = (show_obsolete && is_obsolete && show_available && is_available)
            || (show_obsolete && is_obsolete && show_future && !is_available)
            || (show_obsolete && is_obsolete && !show_available && !show_future)
            || (show_available && is_available && !is_obsolete)
            || (show_future && !is_available && !is_obsolete);

        show.then_some(DisplayedAvailability {
            obsolete: show_obsolete && is_obsolete,
            available: show_available && is_available,
            future: show_future && !is_available,
        })
    }
}
