//! Pairs - flashcard sets with weighted repetition.
//!
//! Command-line front end over the `pairs` library: manage sets, import
//! plain-text pairs and practice.

mod practice;

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pairs::{parse_text, Config, EditOutcome, Scheduler, SetStorage};
use practice::Session;

// ══════════════════════════════════════════════════════════════════════════
// CLI Arguments
// ══════════════════════════════════════════════════════════════════════════

#[derive(Parser, Debug)]
#[command(name = "pairs")]
#[command(author, version, about = "Flashcard sets with weighted repetition", long_about = None)]
struct Args {
    /// Directory containing set files
    #[arg(short, long, global = true)]
    sets_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all sets
    Sets,
    /// Create an empty set
    New { name: Option<String> },
    /// Rename a set
    Rename { set: String, name: String },
    /// Delete a set and all its pairs
    Delete { set: String },
    /// Add a single pair
    Add { set: String, front: String, back: String },
    /// Import pairs from a text file (or stdin): front and back on
    /// consecutive lines, blank lines ignored
    Import { set: String, file: Option<PathBuf> },
    /// List the pairs of a set
    Cards {
        set: String,
        /// Only favorites
        #[arg(long)]
        favorites: bool,
        /// Case-sensitive filter on front or back
        #[arg(short = 'q', long, default_value = "")]
        search: String,
    },
    /// Change a pair's text or favorite flag
    Edit {
        set: String,
        front: String,
        /// New front text
        #[arg(long)]
        rename: Option<String>,
        /// New back text
        #[arg(long)]
        back: Option<String>,
        #[arg(long)]
        favorite: Option<bool>,
    },
    /// Remove pairs
    Remove {
        set: String,
        #[arg(required = true)]
        fronts: Vec<String>,
    },
    /// Toggle the favorite flag of pairs
    Favorite {
        set: String,
        #[arg(required = true)]
        fronts: Vec<String>,
    },
    /// Create a new set from some pairs of another
    Subset {
        set: String,
        name: String,
        #[arg(required = true)]
        fronts: Vec<String>,
    },
    /// Show or change practice settings
    Settings {
        set: String,
        #[arg(long)]
        reversed: Option<bool>,
        #[arg(long)]
        favorites_only: Option<bool>,
    },
    /// Practice a set
    Practice {
        set: String,
        /// Seed for reproducible draws
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show the configuration, optionally writing it to disk
    Config {
        #[arg(long)]
        save: bool,
    },
}

// ══════════════════════════════════════════════════════════════════════════
// Main Entry Point
// ══════════════════════════════════════════════════════════════════════════

fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init_tracing(&config.log_filter);
    if let Some(e) = config_error {
        tracing::warn!("Using default config: {:#}", e);
    }

    // Determine sets directory
    let sets_dir = args
        .sets_dir
        .or_else(|| config.sets_dir.clone())
        .unwrap_or_else(SetStorage::default_path);

    let storage = SetStorage::new(sets_dir)?;
    run(args.command, &storage, &config)
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_ansi(false))
        .with(filter)
        .init();
}

fn run(command: Command, storage: &SetStorage, config: &Config) -> Result<()> {
    match command {
        Command::Sets => {
            let sets = storage.list_sets()?;
            if sets.is_empty() {
                println!("No sets yet. Create one with `pairs new <name>`.");
            }
            for info in sets {
                let mut flags = String::new();
                if info.favorites_only {
                    flags.push_str(" ★");
                }
                if info.reversed_sides {
                    flags.push_str(" ⇄");
                }
                println!(
                    "{}  {} ({} cards, {} favorites, {} repeats pending, max weight {}){}",
                    info.id,
                    info.name,
                    info.pair_count,
                    info.favorite_count,
                    info.pending_repeats,
                    info.max_weight,
                    flags
                );
            }
        }

        Command::New { name } => {
            let name = name.unwrap_or_else(|| config.default_set_name.clone());
            let set = storage.create_set(&name)?;
            println!("✓ Created '{}' ({})", set.name, set.id);
        }

        Command::Rename { set, name } => {
            let target = storage.find_set(&set)?;
            storage.rename_set(&target.id, &name)?;
            println!("✓ Renamed '{}' to '{}'", target.name, name);
        }

        Command::Delete { set } => {
            let target = storage.find_set(&set)?;
            storage.delete_set(&target.id)?;
            println!("✓ Deleted '{}' ({} cards)", target.name, target.len());
        }

        Command::Add { set, front, back } => {
            let (mut target, _lock) = storage.open_for_edit(&set)?;
            if !target.add_pair(front.as_str(), back, true) {
                bail!("A card with front '{}' already exists", front);
            }
            storage.save_set(&target)?;
            println!("✓ Added '{}' to '{}'", front, target.name);
        }

        Command::Import { set, file } => {
            let (mut target, _lock) = storage.open_for_edit(&set)?;
            let pairs = match file {
                Some(path) => SetStorage::read_pairs_file(&path)?,
                None => {
                    let mut text = String::new();
                    io::stdin().read_to_string(&mut text)?;
                    parse_text(&text)
                }
            };
            let found = pairs.len();
            let added = target.import_pairs(pairs);
            storage.save_set(&target)?;
            println!(
                "✓ Imported {} of {} cards into '{}'",
                added, found, target.name
            );
        }

        Command::Cards { set, favorites, search } => {
            let target = storage.find_set(&set)?;
            for key in target.filtered_keys(favorites, &search) {
                if let Some(pair) = target.get(key) {
                    let star = if pair.favorite { "★" } else { " " };
                    println!("{} {}\t{}", star, pair.front, pair.back);
                }
            }
        }

        Command::Edit { set, front, rename, back, favorite } => {
            let (mut target, _lock) = storage.open_for_edit(&set)?;
            let new_front = rename.clone().unwrap_or_else(|| front.clone());
            match target.edit_pair(&front, rename, back, favorite) {
                EditOutcome::BackUpdated | EditOutcome::Replaced => {}
                EditOutcome::Missing => {
                    bail!("No card with front '{}' in '{}'", front, target.name)
                }
                EditOutcome::EmptyFront => bail!("Card front cannot be empty"),
                EditOutcome::FrontTaken => bail!("Card front '{}' already exists", new_front),
            }
            storage.save_set(&target)?;
            println!("✓ Updated '{}'", new_front);
        }

        Command::Remove { set, fronts } => {
            let (mut target, _lock) = storage.open_for_edit(&set)?;
            let removed = target.remove_pairs(&fronts);
            storage.save_set(&target)?;
            println!("✓ Removed {} cards from '{}'", removed, target.name);
        }

        Command::Favorite { set, fronts } => {
            let (mut target, _lock) = storage.open_for_edit(&set)?;
            let toggled = target.toggle_favorites(&fronts);
            storage.save_set(&target)?;
            println!("✓ Toggled {} favorites in '{}'", toggled, target.name);
        }

        Command::Subset { set, name, fronts } => {
            let source = storage.find_set(&set)?;
            let subset = storage.create_subset(&source, &name, &fronts)?;
            println!(
                "✓ Created '{}' ({}) with {} cards",
                subset.name,
                subset.id,
                subset.len()
            );
        }

        Command::Settings { set, reversed, favorites_only } => {
            let (mut target, _lock) = storage.open_for_edit(&set)?;
            if let Some(reversed) = reversed {
                target.set_reversed_sides(reversed);
            }
            if let Some(favorites_only) = favorites_only {
                target.set_favorites_only(favorites_only);
            }
            storage.save_set(&target)?;
            let stats = target.stats();
            println!(
                "'{}': reversed sides {}, favorites only {}",
                target.name, target.reversed_sides, target.favorites_only
            );
            println!(
                "{} cards, {} favorites, {} repeats pending, max weight {}",
                stats.total, stats.favorites, stats.pending_repeats, stats.max_weight
            );
        }

        Command::Practice { set, seed } => {
            let (mut target, _lock) = storage.open_for_edit(&set)?;
            let scheduler = seed.map_or_else(Scheduler::new, Scheduler::seeded);

            let stdin = io::stdin();
            let mut stdout = io::stdout();
            let mut session = Session::new(&mut target, scheduler);
            session.run(stdin.lock(), &mut stdout, |set| {
                storage.save_set(set).map(|_| ())
            })?;
        }

        Command::Config { save } => {
            let path = Config::default_path();
            if save {
                config.save_to(&path)?;
                println!("✓ Wrote {}", path.display());
            }
            print!("{}", toml::to_string_pretty(config)?);
        }
    }

    Ok(())
}
