//! Line-oriented practice session.

use std::io::{BufRead, Write};
use std::time::Instant;

use anyhow::Result;
use rand::Rng;

use pairs::{PairSet, Scheduler, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Reveal,
    Verdict(Verdict),
    Favorite,
    Quit,
    Unknown,
}

impl Input {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let mut chars = line.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Self::Reveal,
            (Some('q'), None) | (Some('Q'), None) => Self::Quit,
            (Some('f'), None) | (Some('F'), None) => Self::Favorite,
            (Some(c), None) => Verdict::from_key(c).map_or(Self::Unknown, Self::Verdict),
            _ => Self::Unknown,
        }
    }
}

/// One run through a set: draw, show, collect the verdict, repeat.
pub struct Session<'a, R> {
    set: &'a mut PairSet,
    scheduler: Scheduler<R>,
    pub cards_studied: usize,
    pub cards_right: usize,
    started: Instant,
}

impl<'a, R: Rng> Session<'a, R> {
    pub fn new(set: &'a mut PairSet, scheduler: Scheduler<R>) -> Self {
        Self {
            set,
            scheduler,
            cards_studied: 0,
            cards_right: 0,
            started: Instant::now(),
        }
    }

    /// Drive the session until the input ends, the learner quits, or the
    /// set has nothing to show. `save` runs after every change to the set.
    pub fn run<I, O, S>(&mut self, input: I, out: &mut O, mut save: S) -> Result<()>
    where
        I: BufRead,
        O: Write,
        S: FnMut(&PairSet) -> Result<()>,
    {
        let mut lines = input.lines();

        'cards: loop {
            let Some(key) = self.scheduler.draw(self.set) else {
                writeln!(out, "No cards")?;
                break;
            };
            let Some(pair) = self.set.get(&key) else {
                continue;
            };
            let (prompt, answer) = pair.sides(self.set.reversed_sides);
            let (prompt, answer) = (prompt.to_string(), answer.to_string());
            let star = if pair.favorite { "★ " } else { "" };
            writeln!(out, "\n{}{}", star, prompt)?;

            let mut revealed = false;
            loop {
                if revealed {
                    write!(out, "[y] right  [n] wrong  [f] favorite  [q] quit > ")?;
                } else {
                    write!(out, "[enter] reveal  [f] favorite  [q] quit > ")?;
                }
                out.flush()?;

                let Some(line) = lines.next() else {
                    writeln!(out)?;
                    break 'cards;
                };

                match Input::parse(&line?) {
                    Input::Quit => break 'cards,
                    Input::Reveal if !revealed => {
                        revealed = true;
                        writeln!(out, "{}", answer)?;
                    }
                    Input::Favorite => {
                        let favorite = self.set.toggle_favorite(&key).unwrap_or(false);
                        save(&*self.set)?;
                        writeln!(
                            out,
                            "{}",
                            if favorite { "★ added to favorites" } else { "removed from favorites" }
                        )?;
                        if self.set.favorites_only && !favorite {
                            continue 'cards;
                        }
                    }
                    Input::Verdict(verdict) if revealed => {
                        self.scheduler.report(self.set, &key, verdict);
                        self.cards_studied += 1;
                        if verdict == Verdict::Correct {
                            self.cards_right += 1;
                        }
                        save(&*self.set)?;
                        writeln!(out, "{}", verdict.name())?;
                        continue 'cards;
                    }
                    _ => {}
                }
            }
        }

        writeln!(
            out,
            "Studied {} cards ({} right) in {}s",
            self.cards_studied,
            self.cards_right,
            self.started.elapsed().as_secs()
        )?;
        Ok(())
    }
}
