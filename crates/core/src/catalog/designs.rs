//! Session-scoped ordering and obsolescence of designs and hulls.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    ledger::{EventCounter, EventOrdinal, ObsolescenceLedger, ObsolescenceMark},
    ordered::OrderedIndex,
};
use crate::{
    error::DesignError,
    models::{DesignId, DesignLookup, DesignSummary, HullName, PartName},
};

/// Ordered designs and hulls plus the obsolescence decisions layered over them.
///
/// A design's effective obsolescence is never stored. It is derived from three
/// competing inputs: the design's own mark, its hull's mark and the marks of
/// the parts it uses. The most recent decision wins, so every ledger here
/// draws from the same [`EventCounter`].
#[derive(Debug, Clone, Default)]
pub struct DesignCatalog {
    counter: EventCounter,
    designs: OrderedIndex<DesignId>,
    hulls: OrderedIndex<HullName>,
    design_marks: ObsolescenceLedger<DesignId>,
    hull_marks: ObsolescenceLedger<HullName>,
    part_marks: ObsolescenceLedger<PartName>,
}

impl DesignCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the catalog for a new game.
    ///
    /// Hulls are appended in registry order and start out explicitly shown.
    /// Designs are appended without any decision.
    pub fn start_game(
        &mut self,
        hulls: impl IntoIterator<Item = HullName>,
        designs: impl IntoIterator<Item = DesignId>,
    ) {
        *self = Self::default();
        for hull in hulls {
            self.insert_hull_before(hull, None);
        }
        for id in designs {
            self.insert_before(id, None);
        }
        debug!(
            hulls = self.hulls.len(),
            designs = self.designs.len(),
            "design catalog seeded"
        );
    }

    /// Next ordinal the shared counter will hand out.
    pub fn event_counter(&self) -> EventOrdinal {
        self.counter.peek()
    }

    /// Place design `id` before `before`, or at the end.
    ///
    /// Inserting a design that is already listed moves it and keeps its mark.
    pub fn insert_before(&mut self, id: DesignId, before: Option<DesignId>) -> bool {
        report(self.designs.insert_before(id, before.as_ref()), "insert design")
    }

    /// Move a listed design before `before`, or to the end.
    pub fn move_before(&mut self, id: DesignId, before: Option<DesignId>) -> bool {
        report(self.designs.move_before(&id, before.as_ref()), "move design")
    }

    /// Remove a design and its obsolescence mark.
    pub fn remove(&mut self, id: DesignId) -> bool {
        self.design_marks.forget(&id);
        let removed = self.designs.remove(&id);
        if !removed {
            warn!(id, "cannot remove design that is not listed");
        }
        removed
    }

    /// Place hull `name` before `before`, or at the end.
    ///
    /// Newly listed hulls are marked not obsolete.
    pub fn insert_hull_before(&mut self, name: impl Into<HullName>, before: Option<&str>) -> bool {
        let name = name.into();
        let before = before.map(str::to_string);
        let is_new = !self.hulls.contains(&name);
        if !report(
            self.hulls.insert_before(name.clone(), before.as_ref()),
            "insert hull",
        ) {
            return false;
        }
        if is_new {
            self.hull_marks.set_obsolete(name, false, &mut self.counter);
        }
        true
    }

    /// Record the user's decision to hide or show a listed design.
    pub fn set_obsolete(&mut self, id: DesignId, obsolete: bool) -> bool {
        if !self.designs.contains(&id) {
            warn!(id, obsolete, "cannot mark design that is not listed");
            return false;
        }
        self.design_marks.set_obsolete(id, obsolete, &mut self.counter);
        true
    }

    /// Record the user's decision to hide or show a listed hull.
    pub fn set_hull_obsolete(&mut self, name: &str, obsolete: bool) -> bool {
        let name = name.to_string();
        if !self.hulls.contains(&name) {
            warn!(hull = %name, obsolete, "cannot mark hull that is not listed");
            return false;
        }
        self.hull_marks.set_obsolete(name, obsolete, &mut self.counter);
        true
    }

    /// Record the user's decision to hide or show a part.
    pub fn set_part_obsolete(&mut self, name: impl Into<PartName>, obsolete: bool) {
        self.part_marks
            .set_obsolete(name.into(), obsolete, &mut self.counter);
    }

    /// Effective obsolescence of a listed design.
    ///
    /// The latest `Obsolete` mark among the design, its hull and its parts is
    /// compared against the design's own `NotObsolete` mark. Returns `None`
    /// for designs that are not listed or unknown to `lookup`.
    pub fn is_obsolete(&self, id: DesignId, lookup: &impl DesignLookup) -> Option<bool> {
        if !self.designs.contains(&id) {
            return None;
        }
        let Some(design) = lookup.design(id) else {
            warn!(id, "listed design is unknown to the session");
            return None;
        };

        Some(self.obsolete_with(self.design_marks.mark(&id), design))
    }

    /// Effective obsolescence of a design that carries no mark of its own.
    ///
    /// Only the hull and part marks take part, so this is true exactly when
    /// the hull or any fitted part is currently marked obsolete.
    pub fn is_summary_obsolete(&self, design: &DesignSummary) -> bool {
        self.obsolete_with(ObsolescenceMark::Unset, design)
    }

    fn obsolete_with(&self, own: ObsolescenceMark, design: &DesignSummary) -> bool {
        let latest_obsolete = own
            .obsolete_ordinal()
            .into_iter()
            .chain(self.hull_marks.mark(&design.hull).obsolete_ordinal())
            .chain(design.fitted_parts().filter_map(|part| {
                self.part_marks
                    .mark(&part.to_string())
                    .obsolete_ordinal()
            }))
            .max()
            .unwrap_or(-1);
        let latest_unobsolete = match own {
            ObsolescenceMark::NotObsolete(ordinal) => ordinal,
            _ => 0,
        };

        latest_obsolete > latest_unobsolete
    }

    /// Raw decision recorded for a hull.
    pub fn is_hull_obsolete(&self, name: &str) -> Option<bool> {
        self.hull_marks.is_obsolete(&name.to_string())
    }

    /// Raw decision recorded for a part.
    pub fn is_part_obsolete(&self, name: &str) -> Option<bool> {
        self.part_marks.is_obsolete(&name.to_string())
    }

    /// Raw decision recorded for a design, ignoring hull and parts.
    pub fn design_mark(&self, id: DesignId) -> ObsolescenceMark {
        self.design_marks.mark(&id)
    }

    /// Listed designs that are not effectively obsolete, in display order.
    pub fn ordered_ids(&self, lookup: &impl DesignLookup) -> Vec<DesignId> {
        self.designs
            .ordered_keys()
            .copied()
            .filter(|id| self.is_obsolete(*id, lookup) != Some(true))
            .collect()
    }

    /// Every listed design in display order.
    pub fn all_ordered_ids(&self) -> Vec<DesignId> {
        self.designs.to_vec()
    }

    /// Every listed hull in display order.
    pub fn ordered_hulls(&self) -> Vec<HullName> {
        self.hulls.to_vec()
    }

    /// Capture order, marks and counter for the session save.
    pub fn save(&self) -> CatalogSnapshot {
        let mut parts: Vec<MarkedEntry<PartName>> = self
            .part_marks
            .iter()
            .map(|(name, mark)| MarkedEntry::new(name.clone(), mark))
            .collect();
        parts.sort_by(|a, b| a.key.cmp(&b.key));

        CatalogSnapshot {
            saved_at: Utc::now(),
            event_counter: self.counter.peek(),
            designs: self
                .designs
                .ordered_keys()
                .map(|id| MarkedEntry::new(*id, self.design_marks.mark(id)))
                .collect(),
            hulls: self
                .hulls
                .ordered_keys()
                .map(|name| MarkedEntry::new(name.clone(), self.hull_marks.mark(name)))
                .collect(),
            parts,
        }
    }

    /// Replace the catalog's contents with a saved snapshot.
    ///
    /// Marks whose ordinal could not have come from the saved counter are
    /// reported and loaded unchanged.
    pub fn load(&mut self, snapshot: &CatalogSnapshot) {
        *self = Self::default();
        self.counter = EventCounter::resume(snapshot.event_counter);

        for entry in &snapshot.designs {
            if self.designs.contains(&entry.key) {
                warn!(id = entry.key, "duplicate design in saved order");
            }
            let _ = self.designs.insert_before(entry.key, None);
            self.check_ordinal("design", &entry.key, entry.mark);
            self.design_marks.insert_mark(entry.key, entry.mark);
        }
        for entry in &snapshot.hulls {
            if self.hulls.contains(&entry.key) {
                warn!(hull = %entry.key, "duplicate hull in saved order");
            }
            let _ = self.hulls.insert_before(entry.key.clone(), None);
            self.check_ordinal("hull", &entry.key, entry.mark);
            self.hull_marks.insert_mark(entry.key.clone(), entry.mark);
        }
        for entry in &snapshot.parts {
            self.check_ordinal("part", &entry.key, entry.mark);
            self.part_marks.insert_mark(entry.key.clone(), entry.mark);
        }

        debug!(
            designs = self.designs.len(),
            hulls = self.hulls.len(),
            parts = self.part_marks.len(),
            counter = self.counter.peek(),
            "design catalog loaded"
        );
    }

    fn check_ordinal(&self, kind: &str, key: &dyn std::fmt::Display, mark: ObsolescenceMark) {
        if let Some(ordinal) = mark.ordinal() {
            if !self.counter.covers(ordinal) {
                warn!(
                    kind,
                    key = %key,
                    ordinal,
                    counter = self.counter.peek(),
                    "inconsistent obsolescence ordinal in saved catalog"
                );
            }
        }
    }
}

fn report(result: Result<(), DesignError>, action: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!(action, "{err}");
            false
        }
    }
}

/// One key with its obsolescence mark, as stored in a [`CatalogSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkedEntry<K> {
    /// Design id, hull name or part name.
    pub key: K,
    /// Decision recorded for the key.
    #[serde(default)]
    pub mark: ObsolescenceMark,
}

impl<K> MarkedEntry<K> {
    /// Pair a key with its mark.
    pub fn new(key: K, mark: ObsolescenceMark) -> Self {
        Self { key, mark }
    }
}

/// Serialized catalog state carried in a session save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
    /// Next ordinal the counter would have handed out.
    pub event_counter: EventOrdinal,
    /// Designs in display order.
    #[serde(default)]
    pub designs: Vec<MarkedEntry<DesignId>>,
    /// Hulls in display order.
    #[serde(default)]
    pub hulls: Vec<MarkedEntry<HullName>>,
    /// Part decisions, sorted by name.
    #[serde(default)]
    pub parts: Vec<MarkedEntry<PartName>>,
}

impl CatalogSnapshot {
    /// Load a snapshot from the given path, returning `None` if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog snapshot {}", path.display()))?;
        let snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse catalog snapshot {}", path.display()))?;
        Ok(Some(snapshot))
    }

    /// Persist the snapshot to the given file, creating parent directories if needed.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create snapshot directory {}", parent.display())
            })?;
        }

        let serialized =
            serde_json::to_string_pretty(self).context("failed to serialize catalog snapshot")?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write catalog snapshot {}", path.display()))
    }
}

/// Default location of the session catalog snapshot.
pub fn default_snapshot_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shipyard")
        .join("catalog.json")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::tempdir;

    fn lookup() -> HashMap<DesignId, DesignSummary> {
        HashMap::from([
            (1, DesignSummary::new("SH_BASIC", ["SR_LASER", "AR_PLATE"])),
            (2, DesignSummary::new("SH_ROBOTIC", ["SR_LASER"])),
            (3, DesignSummary::new("SH_ROBOTIC", ["DT_DETECTOR"])),
        ])
    }

    fn snapshot_with(
        counter: EventOrdinal,
        design: ObsolescenceMark,
        hull: ObsolescenceMark,
    ) -> CatalogSnapshot {
        CatalogSnapshot {
            saved_at: Utc::now(),
            event_counter: counter,
            designs: vec![MarkedEntry::new(1, design)],
            hulls: vec![MarkedEntry::new("SH_BASIC".to_string(), hull)],
            parts: Vec::new(),
        }
    }

    #[test]
    fn inserts_keep_requested_order() {
        let mut catalog = DesignCatalog::new();
        assert!(catalog.insert_before(1, None));
        assert!(catalog.insert_before(2, Some(1)));
        assert!(catalog.insert_before(3, Some(1)));
        assert_eq!(catalog.all_ordered_ids(), vec![2, 3, 1]);
    }

    #[test]
    fn latest_design_decision_wins() {
        let mut catalog = DesignCatalog::new();
        catalog.insert_before(1, None);

        assert!(catalog.set_obsolete(1, true));
        assert_eq!(catalog.event_counter(), 2);
        assert!(catalog.set_obsolete(1, false));
        assert_eq!(catalog.event_counter(), 3);

        let designs = lookup();
        assert_eq!(catalog.is_obsolete(1, &designs), Some(false));
        assert!(catalog.ordered_ids(&designs).contains(&1));
    }

    #[test]
    fn newer_hull_mark_overrides_older_design_mark() {
        let designs = lookup();
        let mut catalog = DesignCatalog::new();

        catalog.load(&snapshot_with(
            8,
            ObsolescenceMark::NotObsolete(3),
            ObsolescenceMark::Obsolete(5),
        ));
        assert_eq!(catalog.is_obsolete(1, &designs), Some(true));

        catalog.load(&snapshot_with(
            8,
            ObsolescenceMark::NotObsolete(7),
            ObsolescenceMark::Obsolete(5),
        ));
        assert_eq!(catalog.is_obsolete(1, &designs), Some(false));
    }

    #[test]
    fn obsolete_part_hides_every_design_using_it() {
        let designs = lookup();
        let mut catalog = DesignCatalog::new();
        catalog.start_game(
            ["SH_BASIC".to_string(), "SH_ROBOTIC".to_string()],
            [1, 2, 3],
        );

        catalog.set_part_obsolete("SR_LASER", true);
        assert_eq!(catalog.ordered_ids(&designs), vec![3]);
        assert_eq!(catalog.all_ordered_ids(), vec![1, 2, 3]);

        catalog.set_obsolete(2, false);
        assert_eq!(catalog.ordered_ids(&designs), vec![2, 3]);
        assert_eq!(catalog.is_part_obsolete("SR_LASER"), Some(true));
        assert_eq!(catalog.is_part_obsolete("AR_PLATE"), None);
    }

    #[test]
    fn unlisted_summary_follows_hull_and_part_marks() {
        let mut catalog = DesignCatalog::new();
        catalog.start_game(["SH_BASIC".to_string()], []);
        let saved = DesignSummary::new("SH_BASIC", ["SR_LASER", "", "AR_PLATE"]);
        assert!(!catalog.is_summary_obsolete(&saved));

        catalog.set_part_obsolete("AR_PLATE", true);
        assert!(catalog.is_summary_obsolete(&saved));
        catalog.set_part_obsolete("AR_PLATE", false);
        assert!(!catalog.is_summary_obsolete(&saved));

        catalog.set_hull_obsolete("SH_BASIC", true);
        assert!(catalog.is_summary_obsolete(&saved));
        assert!(!catalog.is_summary_obsolete(&DesignSummary::new("SH_ROBOTIC", ["SR_LASER"])));
    }

    #[test]
    fn hulls_start_visible() {
        let mut catalog = DesignCatalog::new();
        catalog.start_game(["SH_BASIC".to_string()], []);
        assert_eq!(catalog.is_hull_obsolete("SH_BASIC"), Some(false));
        assert!(catalog.insert_hull_before("SH_ROBOTIC", Some("SH_BASIC")));
        assert_eq!(catalog.ordered_hulls(), vec!["SH_ROBOTIC", "SH_BASIC"]);

        assert!(catalog.set_hull_obsolete("SH_ROBOTIC", true));
        assert!(catalog.insert_hull_before("SH_ROBOTIC", None));
        assert_eq!(catalog.is_hull_obsolete("SH_ROBOTIC"), Some(true));
        assert!(!catalog.set_hull_obsolete("SH_MISSING", true));
    }

    #[test]
    fn unknown_designs_have_no_obsolescence() {
        let designs = lookup();
        let mut catalog = DesignCatalog::new();
        assert_eq!(catalog.is_obsolete(1, &designs), None);
        assert!(!catalog.set_obsolete(1, true));

        catalog.insert_before(99, None);
        assert_eq!(catalog.is_obsolete(99, &designs), None);
        assert_eq!(catalog.ordered_ids(&designs), vec![99]);

        catalog.insert_before(1, None);
        assert_eq!(catalog.is_obsolete(1, &designs), Some(false));
    }

    #[test]
    fn rejected_edits_leave_order_untouched() {
        let mut catalog = DesignCatalog::new();
        catalog.start_game([], [1, 2]);
        assert!(!catalog.insert_before(1, Some(1)));
        assert!(!catalog.move_before(5, None));
        assert!(!catalog.remove(5));
        assert!(catalog.move_before(1, Some(99)));
        assert_eq!(catalog.all_ordered_ids(), vec![2, 1]);
    }

    #[test]
    fn removal_forgets_mark() {
        let designs = lookup();
        let mut catalog = DesignCatalog::new();
        catalog.start_game([], [1]);
        catalog.set_obsolete(1, true);
        assert!(catalog.remove(1));
        catalog.insert_before(1, None);
        assert_eq!(catalog.design_mark(1), ObsolescenceMark::Unset);
        assert_eq!(catalog.is_obsolete(1, &designs), Some(false));
    }

    #[test]
    fn save_load_round_trip() -> Result<()> {
        let designs = lookup();
        let mut catalog = DesignCatalog::new();
        catalog.start_game(
            ["SH_BASIC".to_string(), "SH_ROBOTIC".to_string()],
            [1, 2, 3],
        );
        catalog.move_before(3, Some(1));
        catalog.set_obsolete(2, true);
        catalog.set_hull_obsolete("SH_BASIC", true);
        catalog.set_part_obsolete("DT_DETECTOR", false);

        let dir = tempdir()?;
        let path = dir.path().join("session").join("catalog.json");
        catalog.save().persist(&path)?;
        let snapshot = CatalogSnapshot::load(&path)?.expect("snapshot written");

        let mut restored = DesignCatalog::new();
        restored.load(&snapshot);

        assert_eq!(restored.ordered_ids(&designs), catalog.ordered_ids(&designs));
        assert_eq!(restored.ordered_ids(&designs), vec![3]);
        assert_eq!(restored.all_ordered_ids(), vec![3, 1, 2]);
        assert_eq!(restored.ordered_hulls(), catalog.ordered_hulls());
        assert_eq!(restored.event_counter(), catalog.event_counter());
        for id in [1, 2, 3] {
            assert_eq!(restored.design_mark(id), catalog.design_mark(id));
        }
        for hull in ["SH_BASIC", "SH_ROBOTIC"] {
            let hull = hull.to_string();
            assert_eq!(restored.hull_marks.mark(&hull), catalog.hull_marks.mark(&hull));
        }
        assert_eq!(restored.is_part_obsolete("DT_DETECTOR"), Some(false));
        assert_eq!(restored.save().designs, snapshot.designs);
        Ok(())
    }

    #[test]
    fn out_of_range_ordinals_load_unchanged() {
        let mut catalog = DesignCatalog::new();
        catalog.load(&snapshot_with(
            2,
            ObsolescenceMark::Obsolete(40),
            ObsolescenceMark::NotObsolete(-3),
        ));
        assert_eq!(catalog.design_mark(1), ObsolescenceMark::Obsolete(40));
        assert_eq!(catalog.is_hull_obsolete("SH_BASIC"), Some(false));
        assert_eq!(catalog.event_counter(), 2);
    }

    #[test]
    fn missing_snapshot_is_not_an_error() -> Result<()> {
        let dir = tempdir()?;
        assert!(CatalogSnapshot::load(dir.path().join("absent.json"))?.is_none());
        Ok(())
    }
}
