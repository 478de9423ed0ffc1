//! Storage module for saving and loading pair sets.

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::import::parse_text;
use crate::models::PairSet;

/// Handles set persistence, one JSON file per set.
pub struct SetStorage {
    sets_dir: PathBuf,
}

impl SetStorage {
    pub fn new(sets_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&sets_dir)
            .with_context(|| format!("Failed to create sets directory: {:?}", sets_dir))?;
        Ok(Self { sets_dir })
    }

    /// Get default storage location.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pairs")
            .join("sets")
    }

    pub fn sets_dir(&self) -> &Path {
        &self.sets_dir
    }

    fn set_path(&self, set_id: &str) -> PathBuf {
        self.sets_dir.join(format!("{}.json", set_id))
    }

    fn lock_path(&self, set_id: &str) -> PathBuf {
        self.sets_dir.join(format!("{}.lock", set_id))
    }

    /// Take the exclusive edit lock of a set. Only one process may hold it;
    /// a second attempt fails until the returned guard is dropped.
    pub fn lock_set(&self, set: &PairSet) -> Result<SetLock> {
        let path = self.lock_path(&set.id);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => bail!(
                "Set '{}' ({}) is being edited by another pairs process; \
                 remove {:?} if that process is gone",
                set.name,
                set.id,
                path
            ),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create lock file: {:?}", path))
            }
        };
        let _ = writeln!(file, "{}", std::process::id());
        Ok(SetLock { path })
    }

    /// Resolve a set, lock it, and load it again under the lock so the
    /// returned copy reflects every save made before the lock was taken.
    pub fn open_for_edit(&self, name_or_id: &str) -> Result<(PairSet, SetLock)> {
        let found = self.find_set(name_or_id)?;
        let lock = self.lock_set(&found)?;
        let set = self
            .load_set(&found.id)?
            .with_context(|| format!("Set '{}' was deleted while locking", found.name))?;
        Ok((set, lock))
    }

    /// Save a set to disk. The file is written beside its final name and
    /// renamed into place.
    pub fn save_set(&self, set: &PairSet) -> Result<PathBuf> {
        let path = self.set_path(&set.id);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(set)?;
        fs::write(&tmp, json).with_context(|| format!("Failed to write set file: {:?}", tmp))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace set file: {:?}", path))?;
        Ok(path)
    }

    /// Load a set from disk.
    pub fn load_set(&self, set_id: &str) -> Result<Option<PairSet>> {
        if !is_valid_id(set_id) {
            return Ok(None);
        }
        let path = self.set_path(set_id);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read set file: {:?}", path))?;
        let mut set: PairSet = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse set file: {:?}", path))?;
        set.rebuild_caches();
        Ok(Some(set))
    }

    /// Create and save an empty set. Retries the id on the rare collision.
    pub fn create_set(&self, name: &str) -> Result<PairSet> {
        let mut set = PairSet::new(name);
        while self.set_path(&set.id).exists() {
            set = PairSet::new(name);
        }
        self.save_set(&set)?;
        info!(id = %set.id, name, "created set");
        Ok(set)
    }

    /// Delete a set file. Fails if another process holds the set's lock.
    pub fn delete_set(&self, set_id: &str) -> Result<bool> {
        let Some(set) = self.load_set(set_id)? else {
            return Ok(false);
        };
        let _lock = self.lock_set(&set)?;
        fs::remove_file(self.set_path(set_id))?;
        info!(id = set_id, "deleted set");
        Ok(true)
    }

    /// Rename a stored set under its lock.
    pub fn rename_set(&self, set_id: &str, name: &str) -> Result<bool> {
        let Some(found) = self.load_set(set_id)? else {
            return Ok(false);
        };
        let _lock = self.lock_set(&found)?;
        match self.load_set(set_id)? {
            Some(mut set) => {
                set.rename(name);
                self.save_set(&set)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Save a new set holding copies of the given pairs of `source`.
    pub fn create_subset<I, S>(&self, source: &PairSet, name: &str, keys: I) -> Result<PairSet>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = source.subset(name, keys);
        while self.set_path(&set.id).exists() {
            set.id = PairSet::new(name).id;
        }
        self.save_set(&set)?;
        info!(id = %set.id, name, pairs = set.len(), source = %source.id, "created subset");
        Ok(set)
    }

    /// List all available sets.
    pub fn list_sets(&self) -> Result<Vec<SetInfo>> {
        let mut sets = Vec::new();

        for entry in fs::read_dir(&self.sets_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().map_or(false, |e| e == "json") {
                let parsed = fs::read_to_string(&path)
                    .map_err(anyhow::Error::from)
                    .and_then(|json| Ok(serde_json::from_str::<PairSet>(&json)?));
                match parsed {
                    Ok(mut set) => {
                        set.rebuild_caches();
                        sets.push(SetInfo::from(&set));
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable set"),
                }
            }
        }

        sets.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(sets)
    }

    /// Resolve a set by id, or failing that by its exact name.
    pub fn find_set(&self, name_or_id: &str) -> Result<PairSet> {
        if let Some(set) = self.load_set(name_or_id)? {
            return Ok(set);
        }

        let matches: Vec<SetInfo> = self
            .list_sets()?
            .into_iter()
            .filter(|info| info.name == name_or_id)
            .collect();

        match matches.as_slice() {
            [] => bail!("No set named '{}'", name_or_id),
            [info] => self
                .load_set(&info.id)?
                .with_context(|| format!("Set '{}' disappeared while loading", info.id)),
            _ => {
                let ids: Vec<&str> = matches.iter().map(|i| i.id.as_str()).collect();
                bail!(
                    "Several sets are named '{}', use an id instead: {}",
                    name_or_id,
                    ids.join(", ")
                )
            }
        }
    }

    /// Read and parse an import file without touching any set, so a failed
    /// read leaves the target unchanged.
    pub fn read_pairs_file(path: &Path) -> Result<Vec<(String, String)>> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        let text = String::from_utf8(bytes)
            .with_context(|| format!("{:?} is not valid UTF-8 text", path))?;
        Ok(parse_text(&text))
    }
}

/// Held while a process edits a set; removes the lock file on drop.
#[derive(Debug)]
pub struct SetLock {
    path: PathBuf,
}

impl Drop for SetLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release set lock");
        }
    }
}

/// Ids are generated hex prefixes; anything else is never a file name.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Summary info for a set.
#[derive(Debug, Clone)]
pub struct SetInfo {
    pub id: String,
    pub name: String,
    pub pair_count: usize,
    pub favorite_count: usize,
    pub favorites_only: bool,
    pub reversed_sides: bool,
    pub pending_repeats: usize,
    pub max_weight: u32,
}

impl From<&PairSet> for SetInfo {
    fn from(set: &PairSet) -> Self {
        let stats = set.stats();
        Self {
            id: set.id.clone(),
            name: set.name.clone(),
            pair_count: stats.total,
            favorite_count: stats.favorites,
            favorites_only: set.favorites_only,
            reversed_sides: set.reversed_sides,
            pending_repeats: stats.pending_repeats,
            max_weight: stats.max_weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use tempfile::TempDir;

    fn storage() -> (TempDir, SetStorage) {
        let dir = TempDir::new().unwrap();
        let storage = SetStorage::new(dir.path().join("sets")).unwrap();
        (dir, storage)
    }

    fn sample_set() -> PairSet {
        let mut set = PairSet::new("German Vocabulary");
        set.import_pairs(vec![
            ("Haus".to_string(), "house".to_string()),
            ("Schiff".to_string(), "ship".to_string()),
            ("Tier".to_string(), "animal".to_string()),
        ]);
        set
    }

    #[test]
    fn test_save_and_load_preserves_state() {
        let (_dir, storage) = storage();
        let mut set = sample_set();
        set.toggle_favorite("Tier");
        set.set_reversed_sides(true);
        Scheduler::seeded(0).report_incorrect(&mut set, "Haus");
        storage.save_set(&set).unwrap();

        let loaded = storage.load_set(&set.id).unwrap().unwrap();
        assert_eq!(loaded.name, "German Vocabulary");
        assert!(loaded.reversed_sides);
        assert_eq!(loaded.sorted_keys(), set.sorted_keys());
        assert_eq!(loaded.favorite_keys(), &["Tier"]);
        assert_eq!(loaded.all_pool(), set.all_pool());
        assert_eq!(loaded.forced_queue(), set.forced_queue());
        assert!(loaded.last_studied.is_some());
    }

    #[test]
    fn test_load_missing_set() {
        let (_dir, storage) = storage();
        assert!(storage.load_set("deadbeef").unwrap().is_none());
        assert!(storage.load_set("../etc").unwrap().is_none());
    }

    #[test]
    fn test_create_rename_delete() {
        let (_dir, storage) = storage();
        let set = storage.create_set("New Set").unwrap();

        assert!(storage.rename_set(&set.id, "Verbs").unwrap());
        assert_eq!(storage.load_set(&set.id).unwrap().unwrap().name, "Verbs");

        assert!(storage.delete_set(&set.id).unwrap());
        assert!(!storage.delete_set(&set.id).unwrap());
        assert!(storage.list_sets().unwrap().is_empty());
    }

    #[test]
    fn test_list_sets_sorted_and_skips_garbage() {
        let (_dir, storage) = storage();
        storage.create_set("Zoology").unwrap();
        storage.save_set(&sample_set()).unwrap();
        fs::write(storage.sets_dir().join("broken.json"), "{ not json").unwrap();

        let sets = storage.list_sets().unwrap();
        let names: Vec<&str> = sets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["German Vocabulary", "Zoology"]);
        assert_eq!(sets[0].pair_count, 3);
        assert_eq!(sets[0].pending_repeats, 0);
        assert_eq!(sets[0].max_weight, 1);
    }

    #[test]
    fn test_second_lock_is_refused() {
        let (_dir, storage) = storage();
        let set = sample_set();
        storage.save_set(&set).unwrap();

        let lock = storage.lock_set(&set).unwrap();
        let err = storage.lock_set(&set).unwrap_err();
        assert!(err.to_string().contains("German Vocabulary"));
        assert!(storage.open_for_edit(&set.id).is_err());
        assert!(storage.delete_set(&set.id).is_err());
        assert!(storage.rename_set(&set.id, "Other").is_err());

        drop(lock);
        assert!(storage.lock_set(&set).is_ok());
    }

    #[test]
    fn test_concurrent_editor_cannot_overwrite_changes() {
        let (_dir, storage) = storage();
        storage.save_set(&sample_set()).unwrap();

        // A practice run holds the set; an editor in another process waits.
        let (mut practiced, practice_lock) = storage.open_for_edit("German Vocabulary").unwrap();
        assert!(storage.open_for_edit("German Vocabulary").is_err());

        let mut scheduler = Scheduler::seeded(3);
        let key = scheduler.draw(&mut practiced).unwrap();
        scheduler.report_correct(&mut practiced, &key);
        storage.save_set(&practiced).unwrap();
        drop(practice_lock);

        // The editor now sees the practice result and its own add survives.
        let (mut edited, _lock) = storage.open_for_edit("German Vocabulary").unwrap();
        assert_eq!(edited.all_pool(), practiced.all_pool());
        assert!(edited.add_pair("neu", "new", true));
        storage.save_set(&edited).unwrap();

        assert!(storage.find_set("German Vocabulary").unwrap().contains("neu"));
    }

    #[test]
    fn test_open_for_edit_loads_latest_save() {
        let (_dir, storage) = storage();
        let mut set = sample_set();
        storage.save_set(&set).unwrap();

        set.add_pair("Baum", "tree", true);
        storage.save_set(&set).unwrap();

        let (loaded, _lock) = storage.open_for_edit(&set.id).unwrap();
        assert!(loaded.contains("Baum"));
        assert!(storage.sets_dir().join(format!("{}.lock", set.id)).exists());
    }

    #[test]
    fn test_find_set_by_id_and_name() {
        let (_dir, storage) = storage();
        let set = sample_set();
        storage.save_set(&set).unwrap();

        assert_eq!(storage.find_set(&set.id).unwrap().id, set.id);
        assert_eq!(storage.find_set("German Vocabulary").unwrap().id, set.id);
        assert!(storage.find_set("Nope").is_err());
    }

    #[test]
    fn test_find_set_ambiguous_name() {
        let (_dir, storage) = storage();
        storage.create_set("New Set").unwrap();
        storage.create_set("New Set").unwrap();
        let err = storage.find_set("New Set").unwrap_err();
        assert!(err.to_string().contains("Several sets"));
    }

    #[test]
    fn test_create_subset() {
        let (_dir, storage) = storage();
        let mut set = sample_set();
        set.toggle_favorite("Haus");
        storage.save_set(&set).unwrap();

        let sub = storage
            .create_subset(&set, "Just houses", ["Haus"])
            .unwrap();
        let loaded = storage.load_set(&sub.id).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!loaded.get("Haus").unwrap().favorite);
        assert_eq!(storage.list_sets().unwrap().len(), 2);
    }

    #[test]
    fn test_read_pairs_file() {
        let (dir, _storage) = storage();
        let path = dir.path().join("words.txt");
        fs::write(&path, "Haus\nhouse\n\nTier\nanimal\nleftover\n").unwrap();

        let pairs = SetStorage::read_pairs_file(&path).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], ("Tier".to_string(), "animal".to_string()));
    }

    #[test]
    fn test_failed_import_leaves_set_unchanged() {
        let (dir, _storage) = storage();
        let path = dir.path().join("binary.txt");
        fs::write(&path, [0xffu8, 0xfe, 0x00, 0x80]).unwrap();

        let mut set = sample_set();
        let before = set.sorted_keys().to_vec();
        let result = SetStorage::read_pairs_file(&path).map(|pairs| set.import_pairs(pairs));
        assert!(result.is_err());
        assert_eq!(set.sorted_keys(), before.as_slice());

        assert!(SetStorage::read_pairs_file(&dir.path().join("missing.txt")).is_err());
    }
}
