//! Per-key obsolescence overrides stamped with event ordinals.

use std::{collections::HashMap, hash::Hash};

use serde::{Deserialize, Serialize};
use tracing::error;

/// Ordinal drawn from an [`EventCounter`]. Larger means more recent.
pub type EventOrdinal = i32;

/// Source of event ordinals shared by every ledger in one catalog.
///
/// Starts at 1. Wrapping past `i32::MAX` is reported and left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventCounter(EventOrdinal);

impl Default for EventCounter {
    fn default() -> Self {
        Self(1)
    }
}

impl EventCounter {
    /// Counter resuming from a previously saved value.
    pub fn resume(next: EventOrdinal) -> Self {
        Self(next)
    }

    /// The value the next [`draw`](Self::draw) will hand out.
    pub fn peek(&self) -> EventOrdinal {
        self.0
    }

    /// Hand out the current ordinal and advance.
    pub fn draw(&mut self) -> EventOrdinal {
        let ordinal = self.0;
        self.0 = self.0.wrapping_add(1);
        if self.0 < 0 {
            error!(
                counter = self.0,
                "obsolescence event counter overflowed; precedence comparisons are unreliable"
            );
        }
        ordinal
    }

    /// Whether `ordinal` could have been drawn from this counter.
    pub fn covers(&self, ordinal: EventOrdinal) -> bool {
        (0..self.0).contains(&ordinal)
    }
}

/// Explicit user decision about one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "ordinal", rename_all = "snake_case")]
pub enum ObsolescenceMark {
    /// No decision was ever recorded.
    #[default]
    Unset,
    /// Hidden at the given ordinal.
    Obsolete(EventOrdinal),
    /// Explicitly shown at the given ordinal.
    NotObsolete(EventOrdinal),
}

impl ObsolescenceMark {
    /// `Some(true)` for obsolete, `Some(false)` for not obsolete, `None` when unset.
    pub fn is_obsolete(self) -> Option<bool> {
        match self {
            Self::Unset => None,
            Self::Obsolete(_) => Some(true),
            Self::NotObsolete(_) => Some(false),
        }
    }

    /// Ordinal of the decision, if one was made.
    pub fn ordinal(self) -> Option<EventOrdinal> {
        match self {
            Self::Unset => None,
            Self::Obsolete(ordinal) | Self::NotObsolete(ordinal) => Some(ordinal),
        }
    }

    /// Ordinal of the decision only when it marked the key obsolete.
    pub fn obsolete_ordinal(self) -> Option<EventOrdinal> {
        match self {
            Self::Obsolete(ordinal) => Some(ordinal),
            _ => None,
        }
    }
}

/// Map of keys to their latest obsolescence decision.
#[derive(Debug, Clone)]
pub struct ObsolescenceLedger<K> {
    marks: HashMap<K, ObsolescenceMark>,
}

impl<K> Default for ObsolescenceLedger<K> {
    fn default() -> Self {
        Self {
            marks: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> ObsolescenceLedger<K> {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new decision for `key`, replacing any earlier one.
    pub fn set_obsolete(
        &mut self,
        key: K,
        obsolete: bool,
        counter: &mut EventCounter,
    ) -> ObsolescenceMark {
        let ordinal = counter.draw();
        let mark = if obsolete {
            ObsolescenceMark::Obsolete(ordinal)
        } else {
            ObsolescenceMark::NotObsolete(ordinal)
        };
        self.marks.insert(key, mark);
        mark
    }

    /// Latest decision for `key`; `None` if it was never touched.
    pub fn is_obsolete(&self, key: &K) -> Option<bool> {
        self.mark(key).is_obsolete()
    }

    /// Raw mark for `key`.
    pub fn mark(&self, key: &K) -> ObsolescenceMark {
        self.marks.get(key).copied().unwrap_or_default()
    }

    /// Restore a mark verbatim. Storing [`ObsolescenceMark::Unset`] clears the key.
    pub fn insert_mark(&mut self, key: K, mark: ObsolescenceMark) {
        match mark {
            ObsolescenceMark::Unset => {
                self.marks.remove(&key);
            }
            _ => {
                self.marks.insert(key, mark);
            }
        }
    }

    /// Drop any decision recorded for `key`.
    pub fn forget(&mut self, key: &K) {
        self.marks.remove(key);
    }

    /// Number of keys carrying a decision.
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    /// True when no decisions are recorded.
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Every recorded decision, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, ObsolescenceMark)> + '_ {
        self.marks.iter().map(|(key, mark)| (key, *mark))
    }

    /// Drop every decision.
    pub fn clear(&mut self) {
        self.marks.clear();
    }
}
