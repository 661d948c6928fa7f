//! Saved designs persisted one file per design, plus an order manifest.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    thread,
};

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    catalog::OrderedIndex,
    error::{DesignError, Result},
    manifest::{manifest_path, DesignManifest, MANIFEST_FILE},
    models::SavedDesign,
};

/// Root directory under the user's data dir used for saved designs.
pub const DEFAULT_DESIGNS_DIR: &str = "shipyard/designs";

/// File name prefix of every design record.
pub const RECORD_PREFIX: &str = "ShipDesign-";

/// Extension of current design records.
pub const RECORD_EXTENSION: &str = ".design.json";

/// Extension written by older versions. Such files are migrated on repair.
pub const LEGACY_RECORD_EXTENSION: &str = ".json";

/// Path of the record file for `uuid` inside `root`.
pub fn record_path(root: impl AsRef<Path>, uuid: Uuid) -> PathBuf {
    root.as_ref()
        .join(format!("{RECORD_PREFIX}{uuid}{RECORD_EXTENSION}"))
}

#[derive(Debug, Clone)]
struct StoredDesign {
    design: SavedDesign,
    path: PathBuf,
    /// Other files that held the same UUID; deleted once `path` is canonical.
    duplicates: Vec<PathBuf>,
}

impl StoredDesign {
    fn new(design: SavedDesign, path: PathBuf) -> Self {
        Self {
            design,
            path,
            duplicates: Vec::new(),
        }
    }
}

/// Output of the background directory parse.
#[derive(Debug, Default)]
struct ParseResults {
    /// Successfully parsed records in file name order.
    designs: Vec<(SavedDesign, PathBuf)>,
    manifest: Option<DesignManifest>,
}

#[derive(Default)]
struct Inner {
    pending: Option<oneshot::Receiver<ParseResults>>,
    order: OrderedIndex<Uuid>,
    designs: HashMap<Uuid, StoredDesign>,
}

/// File-backed, user-ordered collection of saved designs.
///
/// Construction starts parsing the directory on a worker thread. Every public
/// method first joins that parse, so the store is always read in its loaded
/// state. Mutations update memory first and then write through to disk; a
/// failed write is returned but the in-memory change is kept.
///
/// The join blocks the calling thread and must not happen inside an async
/// runtime.
pub struct PersistentDesignStore {
    root: PathBuf,
    inner: Mutex<Inner>,
}

impl PersistentDesignStore {
    /// Open the store rooted at `root` and start loading it in the background.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let store = Self {
            root: root.into(),
            inner: Mutex::new(Inner::default()),
        };
        store.async_load();
        store
    }

    /// Default location under the user's data directory.
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DESIGNS_DIR)
    }

    /// Directory holding the record files and manifest.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a background parse of the directory.
    ///
    /// Returns `false` when a parse is already pending; a started load cannot
    /// be cancelled or restarted.
    pub fn async_load(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.pending.is_some() {
            debug!(root = %self.root.display(), "saved design load already pending");
            return false;
        }

        let (sender, receiver) = oneshot::channel();
        let root = self.root.clone();
        let spawned = thread::Builder::new()
            .name("saved-design-parse".to_string())
            .spawn(move || {
                let _ = sender.send(parse_directory(&root));
            });
        if let Err(err) = spawned {
            error!(?err, "failed to spawn saved design parser");
        }
        inner.pending = Some(receiver);
        true
    }

    /// Whether a background load has not been joined yet.
    pub fn is_pending(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    /// Block until the background load finishes and install its results.
    ///
    /// Repairs the manifest and record files if they disagree. Calling this
    /// with nothing pending is a no-op.
    pub fn check_pending(&self) -> Result<()> {
        self.inner.lock().finish_load(&self.root)
    }

    /// Save `design` before `before`, or at the end.
    ///
    /// A design whose UUID is already stored is only moved.
    pub fn insert_before(&self, design: SavedDesign, before: Option<Uuid>) -> Result<()> {
        let mut inner = self.settled();
        let uuid = design.uuid;

        if uuid.is_nil() {
            warn!(name = %design.name, "refusing to save design with nil UUID");
            return Err(DesignError::NilUuid { name: design.name });
        }
        if inner.designs.contains_key(&uuid) {
            debug!(%uuid, "design already saved; moving instead");
            inner
                .order
                .move_before(&uuid, before.as_ref())
                .map_err(rejected)?;
            return inner.save_manifest(&self.root);
        }

        inner
            .order
            .insert_before(uuid, before.as_ref())
            .map_err(rejected)?;
        let path = record_path(&self.root, uuid);
        inner
            .designs
            .insert(uuid, StoredDesign::new(design.clone(), path.clone()));
        info!(%uuid, name = %design.name, "design saved");

        let written = write_record(&path, &design);
        let manifest = inner.save_manifest(&self.root);
        written.and(manifest)
    }

    /// Move a saved design before `before`, or to the end.
    pub fn move_before(&self, uuid: Uuid, before: Option<Uuid>) -> Result<()> {
        let mut inner = self.settled();
        inner
            .order
            .move_before(&uuid, before.as_ref())
            .map_err(rejected)?;
        inner.save_manifest(&self.root)
    }

    /// Remove a saved design and delete its file.
    pub fn erase(&self, uuid: Uuid) -> Result<()> {
        let mut inner = self.settled();
        let Some(stored) = inner.designs.remove(&uuid) else {
            warn!(%uuid, "cannot erase design that is not saved");
            return Err(DesignError::not_found_uuid(uuid));
        };
        inner.order.remove(&uuid);
        info!(%uuid, name = %stored.design.name, "design erased");

        let removed = std::iter::once(&stored.path)
            .chain(&stored.duplicates)
            .map(|path| remove_file(path))
            .fold(Ok(()), Result::and);
        let manifest = inner.save_manifest(&self.root);
        removed.and(manifest)
    }

    /// Look up a saved design.
    pub fn get_design(&self, uuid: Uuid) -> Option<SavedDesign> {
        self.settled()
            .designs
            .get(&uuid)
            .map(|stored| stored.design.clone())
    }

    /// Record file currently backing `uuid`.
    pub fn design_path(&self, uuid: Uuid) -> Option<PathBuf> {
        self.settled()
            .designs
            .get(&uuid)
            .map(|stored| stored.path.clone())
    }

    /// Saved design UUIDs in display order.
    pub fn ordered_design_uuids(&self) -> Vec<Uuid> {
        self.settled().order.to_vec()
    }

    /// Saved designs in display order.
    pub fn ordered_designs(&self) -> Vec<SavedDesign> {
        let inner = self.settled();
        inner
            .order
            .ordered_keys()
            .filter_map(|uuid| inner.designs.get(uuid))
            .map(|stored| stored.design.clone())
            .collect()
    }

    /// Number of saved designs.
    pub fn len(&self) -> usize {
        self.settled().order.len()
    }

    /// True when nothing is saved.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the current order to the manifest file.
    pub fn save_manifest(&self) -> Result<()> {
        self.settled().save_manifest(&self.root)
    }

    fn settled(&self) -> MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock();
        if let Err(err) = inner.finish_load(&self.root) {
            error!("saved design load incomplete: {err}");
        }
        inner
    }
}

impl Inner {
    fn finish_load(&mut self, root: &Path) -> Result<()> {
        let Some(receiver) = self.pending.take() else {
            return Ok(());
        };
        let results = receiver.blocking_recv().map_err(|_| DesignError::LoadFailed)?;
        self.install(root, results)
    }

    fn install(&mut self, root: &Path, results: ParseResults) -> Result<()> {
        self.order.clear();
        self.designs.clear();

        let mut consistent = true;
        let mut parsed_order = Vec::with_capacity(results.designs.len());
        for (design, path) in results.designs {
            let uuid = design.uuid;
            let canonical = record_path(root, uuid);
            if let Some(existing) = self.designs.get_mut(&uuid) {
                consistent = false;
                if path == canonical {
                    let replaced = std::mem::replace(&mut existing.path, path);
                    existing.design = design;
                    existing.duplicates.push(replaced);
                } else {
                    existing.duplicates.push(path);
                }
                warn!(
                    %uuid,
                    kept = %existing.path.display(),
                    duplicates = existing.duplicates.len(),
                    "duplicate saved design UUID"
                );
                continue;
            }
            if !has_current_extension(&path) || path != canonical {
                consistent = false;
            }
            parsed_order.push(uuid);
            self.designs.insert(uuid, StoredDesign::new(design, path));
        }

        match results.manifest {
            Some(manifest) => {
                for uuid in manifest.order {
                    if !self.designs.contains_key(&uuid) {
                        warn!(%uuid, "design manifest lists a design with no file");
                        consistent = false;
                    } else if self.order.contains(&uuid) {
                        warn!(%uuid, "design manifest lists a design twice");
                        consistent = false;
                    } else {
                        let _ = self.order.insert_before(uuid, None);
                    }
                }
            }
            None if !self.designs.is_empty() => {
                warn!(root = %root.display(), "saved designs have no manifest");
                consistent = false;
            }
            None => {}
        }

        for uuid in parsed_order {
            if !self.order.contains(&uuid) {
                warn!(%uuid, "saved design missing from manifest; appending");
                let _ = self.order.insert_before(uuid, None);
                consistent = false;
            }
        }

        info!(
            designs = self.designs.len(),
            consistent,
            "saved designs loaded"
        );
        if consistent {
            return Ok(());
        }
        self.repair(root)
    }

    /// Rewrite every record under its canonical name and rewrite the manifest.
    ///
    /// Once a canonical record is written, every other file that held the
    /// same UUID is deleted.
    fn repair(&mut self, root: &Path) -> Result<()> {
        warn!(root = %root.display(), "saved designs inconsistent; rewriting files and manifest");
        let mut outcome = Ok(());

        let uuids = self.order.to_vec();
        for uuid in uuids {
            let Some(stored) = self.designs.get_mut(&uuid) else {
                continue;
            };
            let canonical = record_path(root, uuid);
            let written = write_record(&canonical, &stored.design);
            if written.is_ok() {
                if stored.path != canonical {
                    debug!(%uuid, from = %stored.path.display(), "migrated design record");
                    let previous = std::mem::replace(&mut stored.path, canonical);
                    stored.duplicates.push(previous);
                }
                let mut leftover = Vec::new();
                for path in stored.duplicates.drain(..) {
                    if let Err(err) = remove_file(&path) {
                        outcome = outcome.and(Err(err));
                        leftover.push(path);
                    }
                }
                stored.duplicates = leftover;
            }
            outcome = outcome.and(written);
        }

        let manifest = self.save_manifest(root);
        outcome.and(manifest)
    }

    fn save_manifest(&self, root: &Path) -> Result<()> {
        let manifest = DesignManifest::new(self.order.ordered_keys().copied());
        manifest.persist(manifest_path(root)).map_err(|err| {
            error!("failed to write design manifest: {err}");
            err
        })
    }
}

fn rejected(err: DesignError) -> DesignError {
    warn!("saved design edit rejected: {err}");
    err
}

fn has_current_extension(path: &Path) -> bool {
    file_name(path).is_some_and(|name| name.ends_with(RECORD_EXTENSION))
}

fn is_record_file(path: &Path) -> bool {
    file_name(path).is_some_and(|name| {
        name != MANIFEST_FILE
            && name.starts_with(RECORD_PREFIX)
            && (name.ends_with(RECORD_EXTENSION) || name.ends_with(LEGACY_RECORD_EXTENSION))
    })
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

fn write_record(path: &Path, design: &SavedDesign) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| DesignError::io(parent, err))?;
    }
    let serialised = serde_json::to_vec_pretty(design).map_err(|source| DesignError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, serialised).map_err(|err| {
        error!(path = %path.display(), "failed to write saved design: {err}");
        DesignError::io(path, err)
    })
}

fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            error!(path = %path.display(), "failed to delete saved design: {err}");
            Err(DesignError::io(path, err))
        }
    }
}

fn read_record(path: &Path) -> Result<SavedDesign> {
    let content = fs::read_to_string(path).map_err(|err| DesignError::io(path, err))?;
    serde_json::from_str(&content).map_err(|source| DesignError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_directory(root: &Path) -> ParseResults {
    if !root.is_dir() {
        return ParseResults::default();
    }

    let mut files: Vec<PathBuf> = match fs::read_dir(root) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| is_record_file(path))
            .collect(),
        Err(err) => {
            warn!(root = %root.display(), "failed to read saved design directory: {err}");
            return ParseResults::default();
        }
    };
    files.sort();

    let mut designs = Vec::with_capacity(files.len());
    for path in files {
        match read_record(&path) {
            Ok(design) if design.uuid.is_nil() => {
                warn!(path = %path.display(), "skipping saved design with nil UUID");
            }
            Ok(design) => designs.push((design, path)),
            Err(err) => warn!("Skipping saved design: {err}"),
        }
    }

    let manifest = match DesignManifest::load(manifest_path(root)) {
        Ok(manifest) => manifest,
        Err(err) => {
            warn!("failed to read design manifest: {err}");
            None
        }
    };

    ParseResults { designs, manifest }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn design(name: &str) -> SavedDesign {
        SavedDesign::new(name, "SH_BASIC_MEDIUM", ["SR_WEAPON_1_1", "", "AR_STD_PLATE"])
            .with_description(format!("{name} description"))
    }

    fn write_fixture(root: &Path, file_name: &str, design: &SavedDesign) -> Result<PathBuf> {
        fs::create_dir_all(root)?;
        let path = root.join(file_name);
        fs::write(&path, serde_json::to_string_pretty(design)?)?;
        Ok(path)
    }

    fn canonical_name(design: &SavedDesign) -> String {
        format!("{RECORD_PREFIX}{}{RECORD_EXTENSION}", design.uuid)
    }

    #[test]
    fn insert_then_erase_removes_file() -> Result<()> {
        let dir = tempdir()?;
        let store = PersistentDesignStore::open(dir.path());
        let scout = design("Scout");

        store.insert_before(scout.clone(), None)?;
        let path = record_path(dir.path(), scout.uuid);
        assert!(path.exists());
        assert_eq!(store.get_design(scout.uuid), Some(scout.clone()));

        store.erase(scout.uuid)?;
        assert!(store.ordered_design_uuids().is_empty());
        assert!(!path.exists());
        assert!(store.get_design(scout.uuid).is_none());
        Ok(())
    }

    #[test]
    fn order_survives_reopen() -> Result<()> {
        let dir = tempdir()?;
        let (a, b, c) = (design("A"), design("B"), design("C"));
        {
            let store = PersistentDesignStore::open(dir.path());
            store.insert_before(a.clone(), None)?;
            store.insert_before(b.clone(), Some(a.uuid))?;
            store.insert_before(c.clone(), None)?;
            store.move_before(c.uuid, Some(b.uuid))?;
        }

        let manifest = fs::read_to_string(manifest_path(dir.path()))?;
        assert!(manifest.starts_with("ShipDesignOrdering\n    uuid = "));

        let reopened = PersistentDesignStore::open(dir.path());
        assert!(reopened.is_pending());
        reopened.check_pending()?;
        assert!(!reopened.is_pending());
        assert_eq!(reopened.ordered_design_uuids(), vec![c.uuid, b.uuid, a.uuid]);
        assert_eq!(reopened.get_design(b.uuid), Some(b));
        assert_eq!(reopened.ordered_designs().len(), 3);
        Ok(())
    }

    #[test]
    fn rejects_nil_uuid() -> Result<()> {
        let dir = tempdir()?;
        let store = PersistentDesignStore::open(dir.path());
        let mut nameless = design("Nil");
        nameless.uuid = Uuid::nil();

        let err = store.insert_before(nameless, None).unwrap_err();
        assert!(matches!(err, DesignError::NilUuid { .. }));
        assert!(store.is_empty());
        assert!(!manifest_path(dir.path()).exists());
        Ok(())
    }

    #[test]
    fn reinserting_moves_without_rewriting() -> Result<()> {
        let dir = tempdir()?;
        let store = PersistentDesignStore::open(dir.path());
        let (a, b) = (design("A"), design("B"));
        store.insert_before(a.clone(), None)?;
        store.insert_before(b.clone(), None)?;

        let mut renamed = a.clone();
        renamed.name = "Renamed".to_string();
        store.insert_before(renamed, None)?;

        assert_eq!(store.ordered_design_uuids(), vec![b.uuid, a.uuid]);
        assert_eq!(store.get_design(a.uuid).map(|d| d.name), Some("A".to_string()));
        assert_eq!(store.len(), 2);
        Ok(())
    }

    #[test]
    fn moving_or_erasing_unknown_design_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let store = PersistentDesignStore::open(dir.path());
        let a = design("A");
        store.insert_before(a.clone(), None)?;

        let missing = Uuid::new_v4();
        assert!(matches!(
            store.move_before(missing, None),
            Err(DesignError::NotFound { .. })
        ));
        assert!(matches!(
            store.erase(missing),
            Err(DesignError::NotFound { .. })
        ));
        assert!(matches!(
            store.move_before(a.uuid, Some(a.uuid)),
            Err(DesignError::SelfReference { .. })
        ));
        assert_eq!(store.ordered_design_uuids(), vec![a.uuid]);
        Ok(())
    }

    #[test]
    fn unlisted_design_is_appended_and_manifest_rewritten() -> Result<()> {
        let dir = tempdir()?;
        let (a, b, c) = (design("A"), design("B"), design("C"));
        for d in [&a, &b, &c] {
            write_fixture(dir.path(), &canonical_name(d), d)?;
        }
        DesignManifest::new([a.uuid, b.uuid]).persist(manifest_path(dir.path()))?;

        let store = PersistentDesignStore::open(dir.path());
        store.check_pending()?;

        assert_eq!(store.ordered_design_uuids(), vec![a.uuid, b.uuid, c.uuid]);
        let manifest = DesignManifest::load(manifest_path(dir.path()))?.expect("manifest");
        assert_eq!(manifest.order, vec![a.uuid, b.uuid, c.uuid]);
        Ok(())
    }

    #[test]
    fn legacy_extension_is_migrated() -> Result<()> {
        let dir = tempdir()?;
        let a = design("A");
        let legacy = write_fixture(dir.path(), &format!("{RECORD_PREFIX}{}.json", a.uuid), &a)?;
        DesignManifest::new([a.uuid]).persist(manifest_path(dir.path()))?;

        let store = PersistentDesignStore::open(dir.path());
        assert_eq!(store.ordered_design_uuids(), vec![a.uuid]);

        let canonical = record_path(dir.path(), a.uuid);
        assert!(canonical.exists());
        assert!(!legacy.exists());
        assert_eq!(store.design_path(a.uuid), Some(canonical));
        Ok(())
    }

    #[test]
    fn stale_and_unreadable_entries_are_dropped() -> Result<()> {
        let dir = tempdir()?;
        let a = design("A");
        write_fixture(dir.path(), &canonical_name(&a), &a)?;
        fs::write(dir.path().join("ShipDesign-broken.design.json"), "{ not json")?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;
        let ghost = Uuid::new_v4();
        DesignManifest::new([ghost, a.uuid]).persist(manifest_path(dir.path()))?;

        let store = PersistentDesignStore::open(dir.path());
        assert_eq!(store.ordered_design_uuids(), vec![a.uuid]);
        let manifest = DesignManifest::load(manifest_path(dir.path()))?.expect("manifest");
        assert_eq!(manifest.order, vec![a.uuid]);
        Ok(())
    }

    #[test]
    fn duplicate_record_files_collapse_so_erase_sticks() -> Result<()> {
        let dir = tempdir()?;
        let a = design("A");
        let canonical = write_fixture(dir.path(), &canonical_name(&a), &a)?;
        let legacy = write_fixture(dir.path(), &format!("{RECORD_PREFIX}{}.json", a.uuid), &a)?;
        DesignManifest::new([a.uuid]).persist(manifest_path(dir.path()))?;

        let store = PersistentDesignStore::open(dir.path());
        store.check_pending()?;
        assert_eq!(store.ordered_design_uuids(), vec![a.uuid]);
        assert_eq!(store.design_path(a.uuid), Some(canonical.clone()));
        assert!(canonical.exists());
        assert!(!legacy.exists());

        store.erase(a.uuid)?;
        drop(store);

        let reopened = PersistentDesignStore::open(dir.path());
        reopened.check_pending()?;
        assert!(reopened.is_empty());
        assert!(!canonical.exists());
        Ok(())
    }

    #[test]
    fn unprefixed_json_is_left_alone() -> Result<()> {
        let dir = tempdir()?;
        let (a, export) = (design("A"), design("Exported"));
        write_fixture(dir.path(), &canonical_name(&a), &a)?;
        let exported = write_fixture(dir.path(), "my-export.json", &export)?;
        DesignManifest::new([a.uuid]).persist(manifest_path(dir.path()))?;

        let store = PersistentDesignStore::open(dir.path());
        store.check_pending()?;
        assert_eq!(store.ordered_design_uuids(), vec![a.uuid]);
        assert!(store.get_design(export.uuid).is_none());
        assert!(exported.exists());
        assert!(!record_path(dir.path(), export.uuid).exists());
        Ok(())
    }

    #[test]
    fn failed_writes_are_reported_but_kept_in_memory() -> Result<()> {
        let dir = tempdir()?;
        let store = PersistentDesignStore::open(dir.path());
        let (a, b) = (design("A"), design("B"));
        store.insert_before(a.clone(), None)?;

        let manifest = manifest_path(dir.path());
        fs::remove_file(&manifest)?;
        fs::create_dir(&manifest)?;

        assert!(matches!(
            store.insert_before(b.clone(), None),
            Err(DesignError::Io { .. })
        ));
        assert_eq!(store.ordered_design_uuids(), vec![a.uuid, b.uuid]);
        assert!(record_path(dir.path(), b.uuid).exists());

        assert!(matches!(
            store.move_before(b.uuid, Some(a.uuid)),
            Err(DesignError::Io { .. })
        ));
        assert_eq!(store.ordered_design_uuids(), vec![b.uuid, a.uuid]);

        assert!(matches!(store.erase(b.uuid), Err(DesignError::Io { .. })));
        assert_eq!(store.ordered_design_uuids(), vec![a.uuid]);
        assert!(store.get_design(b.uuid).is_none());
        assert!(!record_path(dir.path(), b.uuid).exists());
        Ok(())
    }

    #[test]
    fn missing_directory_loads_empty() -> Result<()> {
        let dir = tempdir()?;
        let store = PersistentDesignStore::open(dir.path().join("absent"));
        store.check_pending()?;
        assert!(store.is_empty());

        assert!(store.async_load());
        assert!(!store.async_load());
        store.check_pending()?;
        assert!(!store.is_pending());
        Ok(())
    }
}
