//! Pairs - flashcard sets with weighted repetition.
//!
//! A [`PairSet`] holds front/back pairs keyed by their front text, and a
//! [`Scheduler`] picks which one to show next, favouring pairs the learner
//! got wrong and forcing a missed pair back within a fixed number of draws.

pub mod config;
pub mod import;
pub mod models;
pub mod scheduler;
pub mod storage;

pub use config::Config;
pub use import::parse_text;
pub use models::{EditOutcome, ForcedEntry, Pair, PairSet, SetStats};
pub use scheduler::{Scheduler, Verdict};
pub use storage::{SetInfo, SetLock, SetStorage};
