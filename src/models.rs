//! Data models for pairs and the sets that own them.

use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Number of draws a forced repeat waits before it fires.
pub const FORCED_REPEAT_DRAWS: u32 = 10;

/// A single flashcard, keyed by its front text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub front: String,
    pub back: String,
    /// Relative draw frequency. Never below 1.
    pub weight: u32,
    #[serde(default)]
    pub favorite: bool,
}

impl Pair {
    pub fn new(front: String, back: String) -> Self {
        Self {
            front,
            back,
            weight: 1,
            favorite: false,
        }
    }

    /// Returns `(prompt, answer)` for the given side orientation.
    pub fn sides(&self, reversed: bool) -> (&str, &str) {
        if reversed {
            (&self.back, &self.front)
        } else {
            (&self.front, &self.back)
        }
    }
}

/// A scheduled repeat of a missed pair.
///
/// `key` is a weak reference: the pair may be gone by the time the entry
/// fires, in which case the entry is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedEntry {
    pub key: String,
    pub countdown: u32,
}

impl ForcedEntry {
    pub fn new(key: String) -> Self {
        Self {
            key,
            countdown: FORCED_REPEAT_DRAWS,
        }
    }
}

/// Statistics for a set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SetStats {
    pub total: usize,
    pub favorites: usize,
    pub pending_repeats: usize,
    pub max_weight: u32,
}

/// Result of [`PairSet::edit_pair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Only the back changed; weight and pending repeats are kept.
    BackUpdated,
    /// Front or favorite changed; the pair was replaced.
    Replaced,
    Missing,
    EmptyFront,
    FrontTaken,
}

/// Case-insensitive alphabetical order, raw text as tiebreaker.
fn key_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn sort_keys(keys: &mut [String]) {
    keys.sort_by_cached_key(|k| (k.to_lowercase(), k.clone()));
}

/// A named collection of pairs together with its sampling state.
///
/// The sampling pools and the forced queue live on the set so they persist
/// with it; [`crate::scheduler::Scheduler`] drives them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSet {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_studied: Option<DateTime<Local>>,
    #[serde(default)]
    pub reversed_sides: bool,
    #[serde(default)]
    pub favorites_only: bool,

    pub(crate) pairs: BTreeMap<String, Pair>,
    #[serde(default)]
    pub(crate) all_pool: Vec<String>,
    #[serde(default)]
    pub(crate) favorite_pool: Vec<String>,
    #[serde(default)]
    pub(crate) forced_queue: VecDeque<ForcedEntry>,

    // Derived caches, regenerated by `rebuild_caches` after load.
    #[serde(skip)]
    sorted_keys: Vec<String>,
    #[serde(skip)]
    favorite_keys: Vec<String>,
}

impl PairSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string()[..8].to_string(),
            name: name.into(),
            created_at: Local::now(),
            last_studied: None,
            reversed_sides: false,
            favorites_only: false,
            pairs: BTreeMap::new(),
            all_pool: Vec::new(),
            favorite_pool: Vec::new(),
            forced_queue: VecDeque::new(),
            sorted_keys: Vec::new(),
            favorite_keys: Vec::new(),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Queries
    // ══════════════════════════════════════════════════════════════════════

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, front: &str) -> Option<&Pair> {
        self.pairs.get(front)
    }

    pub fn contains(&self, front: &str) -> bool {
        self.pairs.contains_key(front)
    }

    pub fn pairs(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.values()
    }

    /// All keys, case-insensitively alphabetical.
    pub fn sorted_keys(&self) -> &[String] {
        &self.sorted_keys
    }

    /// Favorite keys, case-insensitively alphabetical.
    pub fn favorite_keys(&self) -> &[String] {
        &self.favorite_keys
    }

    pub fn all_pool(&self) -> &[String] {
        &self.all_pool
    }

    pub fn favorite_pool(&self) -> &[String] {
        &self.favorite_pool
    }

    pub fn forced_queue(&self) -> &VecDeque<ForcedEntry> {
        &self.forced_queue
    }

    /// Keys for listing. An empty `search` returns the cached list as is;
    /// otherwise keeps keys whose front or back contains `search`
    /// (case-sensitive).
    pub fn filtered_keys(&self, favorites: bool, search: &str) -> Vec<&str> {
        let keys = if favorites {
            &self.favorite_keys
        } else {
            &self.sorted_keys
        };

        keys.iter()
            .filter(|key| {
                search.is_empty()
                    || key.contains(search)
                    || self
                        .pairs
                        .get(key.as_str())
                        .map_or(false, |p| p.back.contains(search))
            })
            .map(String::as_str)
            .collect()
    }

    pub fn stats(&self) -> SetStats {
        SetStats {
            total: self.pairs.len(),
            favorites: self.favorite_keys.len(),
            pending_repeats: self.forced_queue.len(),
            max_weight: self.pairs.values().map(|p| p.weight).max().unwrap_or(0),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Mutation
    // ══════════════════════════════════════════════════════════════════════

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_reversed_sides(&mut self, reversed: bool) {
        self.reversed_sides = reversed;
    }

    pub fn set_favorites_only(&mut self, favorites_only: bool) {
        self.favorites_only = favorites_only;
    }

    /// Insert a new pair. Returns false without touching the set if `front`
    /// is empty or already present.
    ///
    /// Batch callers pass `rebuild = false` and call
    /// [`rebuild_sorted_keys`](Self::rebuild_sorted_keys) once at the end.
    pub fn add_pair(&mut self, front: impl Into<String>, back: impl Into<String>, rebuild: bool) -> bool {
        let front = front.into();
        if front.is_empty() || self.pairs.contains_key(&front) {
            return false;
        }

        self.all_pool.push(front.clone());
        self.pairs.insert(front.clone(), Pair::new(front, back.into()));

        if rebuild {
            self.rebuild_sorted_keys();
        }
        true
    }

    /// Add every pair whose front is not yet present. Returns the number added.
    pub fn import_pairs<I>(&mut self, pairs: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut added = 0;
        for (front, back) in pairs {
            if self.add_pair(front, back, false) {
                added += 1;
            }
        }
        self.rebuild_sorted_keys();

        debug!(set = %self.name, added, "imported pairs");
        added
    }

    pub fn update_back(&mut self, front: &str, back: impl Into<String>) {
        if let Some(pair) = self.pairs.get_mut(front) {
            pair.back = back.into();
        }
    }

    /// Remove a pair and every cached reference to it. Pending forced
    /// repeats for the key are left in place and skipped when they fire.
    pub fn remove_pair(&mut self, front: &str) -> bool {
        if self.detach(front).is_none() {
            return false;
        }
        self.rebuild_sorted_keys();
        true
    }

    /// Remove several pairs, rebuilding the sorted cache once.
    pub fn remove_pairs<I, S>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed = keys
            .into_iter()
            .filter(|key| self.detach(key.as_ref()).is_some())
            .count();
        if removed > 0 {
            self.rebuild_sorted_keys();
        }
        removed
    }

    fn detach(&mut self, front: &str) -> Option<Pair> {
        let pair = self.pairs.remove(front)?;
        if pair.favorite {
            self.favorite_keys.retain(|k| k != front);
            self.favorite_pool.retain(|k| k != front);
        }
        self.all_pool.retain(|k| k != front);

        debug!(set = %self.name, front, "removed pair");
        Some(pair)
    }

    /// Flip the favorite flag. Returns the new state, or `None` if absent.
    pub fn toggle_favorite(&mut self, front: &str) -> Option<bool> {
        let pair = self.pairs.get_mut(front)?;
        pair.favorite = !pair.favorite;
        let favorite = pair.favorite;

        if favorite {
            self.favorite_pool.push(front.to_string());
            if let Err(pos) = self
                .favorite_keys
                .binary_search_by(|probe| key_order(probe, front))
            {
                self.favorite_keys.insert(pos, front.to_string());
            }
        } else {
            self.favorite_pool.retain(|k| k != front);
            self.favorite_keys.retain(|k| k != front);
        }
        Some(favorite)
    }

    /// Toggle each key in turn. Returns how many keys were present.
    pub fn toggle_favorites<I, S>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys.into_iter()
            .filter(|key| self.toggle_favorite(key.as_ref()).is_some())
            .count()
    }

    /// Replace a pair, possibly under a new front.
    ///
    /// Front is the primary key, so this is a delete followed by an insert:
    /// the result is a new pair with base weight. Fails without mutation if
    /// `old_front` is absent, `new_front` is empty, or `new_front` names a
    /// different existing pair.
    pub fn replace_pair(
        &mut self,
        old_front: &str,
        new_front: impl Into<String>,
        new_back: impl Into<String>,
        favorite: bool,
    ) -> bool {
        let new_front = new_front.into();
        if !self.pairs.contains_key(old_front) || new_front.is_empty() {
            return false;
        }
        if new_front != old_front && self.pairs.contains_key(&new_front) {
            return false;
        }

        self.detach(old_front);
        self.add_pair(new_front.clone(), new_back, true);
        if favorite {
            self.toggle_favorite(&new_front);
        }
        true
    }

    /// Apply an edit where `None` keeps the current value.
    ///
    /// A back-only edit updates in place. Anything touching the front or the
    /// favorite flag goes through [`replace_pair`](Self::replace_pair).
    pub fn edit_pair(
        &mut self,
        front: &str,
        new_front: Option<String>,
        new_back: Option<String>,
        favorite: Option<bool>,
    ) -> EditOutcome {
        let Some(pair) = self.pairs.get(front) else {
            return EditOutcome::Missing;
        };
        let new_front = new_front.unwrap_or_else(|| front.to_string());
        let new_back = new_back.unwrap_or_else(|| pair.back.clone());
        let favorite = favorite.unwrap_or(pair.favorite);

        if new_front.is_empty() {
            return EditOutcome::EmptyFront;
        }
        if new_front == front && favorite == pair.favorite {
            self.update_back(front, new_back);
            return EditOutcome::BackUpdated;
        }
        if self.replace_pair(front, new_front, new_back, favorite) {
            EditOutcome::Replaced
        } else {
            EditOutcome::FrontTaken
        }
    }

    /// A new set holding copies of the given pairs' front and back text.
    /// Weight, favorite state and pending repeats are not carried over.
    pub fn subset<I, S>(&self, name: impl Into<String>, keys: I) -> PairSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = PairSet::new(name);
        let copies: Vec<(String, String)> = keys
            .into_iter()
            .filter_map(|key| self.pairs.get(key.as_ref()))
            .map(|p| (p.front.clone(), p.back.clone()))
            .collect();
        set.import_pairs(copies);
        set
    }

    // ══════════════════════════════════════════════════════════════════════
    // Caches
    // ══════════════════════════════════════════════════════════════════════

    pub fn rebuild_sorted_keys(&mut self) {
        self.sorted_keys = self.pairs.keys().cloned().collect();
        sort_keys(&mut self.sorted_keys);
    }

    /// Regenerate both key caches and drop pool and queue entries that no
    /// longer resolve to a pair. Used after deserialization.
    pub fn rebuild_caches(&mut self) {
        self.rebuild_sorted_keys();

        self.favorite_keys = self
            .pairs
            .values()
            .filter(|p| p.favorite)
            .map(|p| p.front.clone())
            .collect();
        sort_keys(&mut self.favorite_keys);

        let pairs = &self.pairs;
        self.all_pool.retain(|k| pairs.contains_key(k));
        self.favorite_pool
            .retain(|k| pairs.get(k).map_or(false, |p| p.favorite));
        self.forced_queue.retain(|e| pairs.contains_key(&e.key));
    }

    /// Reset a pool to one entry per eligible key.
    pub(crate) fn refill_pool(&mut self, favorites: bool) {
        if favorites {
            self.favorite_pool = self
                .pairs
                .values()
                .filter(|p| p.favorite)
                .map(|p| p.front.clone())
                .collect();
        } else {
            self.all_pool = self.pairs.keys().cloned().collect();
        }
    }

    pub(crate) fn pool(&self, favorites: bool) -> &[String] {
        if favorites {
            &self.favorite_pool
        } else {
            &self.all_pool
        }
    }

    pub(crate) fn pool_mut(&mut self, favorites: bool) -> &mut Vec<String> {
        if favorites {
            &mut self.favorite_pool
        } else {
            &mut self.all_pool
        }
    }
}
