//! Weighted random selection with forced repeats.
//!
//! Every pair appears in the draw pool once per weight point. A correct
//! answer takes one occurrence out of the current round; an incorrect one
//! adds an occurrence (up to a ceiling tied to the pool size) and schedules
//! a forced repeat [`FORCED_REPEAT_DRAWS`] draws later. An exhausted pool is
//! refilled with one occurrence per eligible pair.

use chrono::Local;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::models::{ForcedEntry, PairSet};

pub use crate::models::FORCED_REPEAT_DRAWS;

/// A pair's weight may not be raised past `all_pool.len() / WEIGHT_CAP_DIVISOR`.
pub const WEIGHT_CAP_DIVISOR: usize = 10;

/// The learner's verdict on a presented pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
}

impl Verdict {
    pub fn from_key(c: char) -> Option<Self> {
        match c {
            'y' | 'Y' | '1' => Some(Self::Correct),
            'n' | 'N' | '0' => Some(Self::Incorrect),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Correct => "right",
            Self::Incorrect => "wrong",
        }
    }
}

/// Picks the next key to present and applies verdicts to a [`PairSet`].
pub struct Scheduler<R = StdRng> {
    rng: R,
}

impl Scheduler<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible draws for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for Scheduler<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Scheduler<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Next key to present, or `None` when the set has nothing eligible.
    ///
    /// A forced repeat whose countdown has run out wins over sampling.
    pub fn draw(&mut self, set: &mut PairSet) -> Option<String> {
        if let Some(key) = fire_forced(set) {
            debug!(set = %set.name, key = %key, "forced repeat");
            return Some(key);
        }
        self.sample(set)
    }

    fn sample(&mut self, set: &mut PairSet) -> Option<String> {
        let favorites = set.favorites_only;
        let mut refilled = false;

        loop {
            let len = set.pool(favorites).len();
            if len == 0 {
                if refilled {
                    return None;
                }
                set.refill_pool(favorites);
                refilled = true;
                debug!(set = %set.name, favorites, "refilled pool");
                continue;
            }

            let idx = self.rng.gen_range(0..len);
            let key = &set.pool(favorites)[idx];
            let eligible = set
                .get(key)
                .map_or(false, |pair| !favorites || pair.favorite);
            if eligible {
                return Some(key.clone());
            }

            // Stale entry; drop it and sample again.
            set.pool_mut(favorites).swap_remove(idx);
        }
    }

    /// Apply a verdict. Returns false if `front` is not in the set.
    pub fn report(&self, set: &mut PairSet, front: &str, verdict: Verdict) -> bool {
        match verdict {
            Verdict::Correct => self.report_correct(set, front),
            Verdict::Incorrect => self.report_incorrect(set, front),
        }
    }

    /// Lower the weight (floor 1) and take one occurrence out of the pools.
    pub fn report_correct(&self, set: &mut PairSet, front: &str) -> bool {
        let Some(pair) = set.pairs.get_mut(front) else {
            return false;
        };
        if pair.weight > 1 {
            pair.weight -= 1;
        }
        let favorite = pair.favorite;

        remove_one(&mut set.all_pool, front);
        if favorite {
            remove_one(&mut set.favorite_pool, front);
        }
        set.last_studied = Some(Local::now());
        true
    }

    /// Raise the weight (capped) with a matching pool occurrence, and
    /// schedule a forced repeat.
    pub fn report_incorrect(&self, set: &mut PairSet, front: &str) -> bool {
        let ceiling = set.all_pool.len() / WEIGHT_CAP_DIVISOR;
        let Some(pair) = set.pairs.get_mut(front) else {
            return false;
        };

        if (pair.weight as usize) < ceiling {
            pair.weight += 1;
            set.all_pool.push(front.to_string());
            if pair.favorite {
                set.favorite_pool.push(front.to_string());
            }
        }

        set.forced_queue.push_back(ForcedEntry::new(front.to_string()));
        set.last_studied = Some(Local::now());
        true
    }
}

/// Tick every pending repeat and pop the first one that is due and still
/// resolves to a pair.
fn fire_forced(set: &mut PairSet) -> Option<String> {
    if set.forced_queue.is_empty() {
        return None;
    }
    for entry in set.forced_queue.iter_mut() {
        entry.countdown = entry.countdown.saturating_sub(1);
    }

    while set.forced_queue.front().is_some_and(|e| e.countdown == 0) {
        let entry = set.forced_queue.pop_front()?;
        if set.contains(&entry.key) {
            return Some(entry.key);
        }
        debug!(set = %set.name, key = %entry.key, "dropped repeat for removed pair");
    }
    None
}

fn remove_one(pool: &mut Vec<String>, key: &str) {
    if let Some(i) = pool.iter().position(|k| k == key) {
        pool.swap_remove(i);
    }
}
