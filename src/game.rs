//! Session state: answer entry, score, combo, level and popups around the block manager.

use crate::board::{BlockManager, BoardStatus, Hit, PenaltyOutcome};
use crate::config::{ConfigError, Difficulty, Overrides, Settings, Tier};
use crate::problem::ConfigurationError;

/// Longest answer the input box accepts.
pub const MAX_INPUT_DIGITS: usize = 4;

const POINTS_PER_BLOCK: u32 = 10;
const MAX_COMBO: u32 = 10;
const BLOCKS_PER_LEVEL: u32 = 10;
const POPUP_LIFE_MS: u32 = 1500;
/// Popups rise one logical unit per this many ms.
const POPUP_RISE_MS: u32 = 25;

#[derive(Debug, Clone)]
pub struct ScorePopup {
    pub col: usize,
    /// Logical y, same units as block positions.
    pub y: f32,
    pub amount: u32,
    pub multiplier: u32,
    pub age_ms: u32,
}

/// Result of pressing enter.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Nothing typed, or the game is already over.
    Empty,
    Correct { blocks: Vec<Hit>, points: u32 },
    /// No block matched; `penalty` blocks were pushed in from the bottom.
    Wrong { penalty: usize },
    GameOver,
}

#[derive(Debug)]
pub struct GameState {
    pub board: BlockManager,
    pub score: u32,
    pub level: u32,
    pub destroyed: u32,
    pub combo_multiplier: u32,
    pub input: String,
    pub game_over: bool,
    pub popups: Vec<ScorePopup>,
    /// Last answer that matched nothing; shown until the next submit.
    pub last_miss: Option<i64>,
}

impl GameState {
    pub fn new(settings: Settings, seed: u64) -> Self {
        log::info!("new game: {}, seed {}", settings.tier.label(), seed);
        Self {
            board: BlockManager::new(settings, seed),
            score: 0,
            level: 1,
            destroyed: 0,
            combo_multiplier: 1,
            input: String::new(),
            game_over: false,
            popups: Vec::new(),
            last_miss: None,
        }
    }

    pub fn restart(&mut self) {
        self.board.reset_for_new_game();
        self.score = 0;
        self.level = 1;
        self.destroyed = 0;
        self.combo_multiplier = 1;
        self.input.clear();
        self.game_over = false;
        self.popups.clear();
        self.last_miss = None;
        log::info!("restart");
    }

    /// Switch to the next difficulty preset (training falls back to Easy) and start over.
    pub fn cycle_difficulty(&mut self) {
        let next = match self.board.settings().tier {
            Tier::Standard(Difficulty::Easy) => Difficulty::Normal,
            Tier::Standard(Difficulty::Normal) => Difficulty::Hard,
            Tier::Standard(Difficulty::Hard) | Tier::Training(_) => Difficulty::Easy,
        };
        self.board.set_difficulty(Settings::for_difficulty(next));
        self.restart();
    }

    /// Change parameters mid-game. Blocks already on the board are kept.
    /// The result is validated as a whole first; on error nothing changes.
    pub fn apply_overrides(&mut self, o: &Overrides) -> Result<(), ConfigError> {
        let mut next = self.board.settings().clone();
        next.apply(o)?;
        next.validate()?;
        self.board.set_operators(next.problem.operators)?;
        self.board.set_number_range(next.problem.range);
        self.board.set_level_increase(next.problem.increase_per_level);
        self.board.set_fall_speed(next.fall_speed);
        self.board.set_spawn_interval(next.spawn_interval_ms);
        self.board.set_max_blocks(next.max_falling);
        self.board.set_time_stop_duration(next.time_stop_ms);
        self.board.set_hint_schedule(next.hint_interval_ms, next.hint_chance);
        log::info!("overrides applied: {:?}", o);
        Ok(())
    }

    pub fn push_digit(&mut self, digit: u8) {
        if self.game_over || digit > 9 || self.input.len() >= MAX_INPUT_DIGITS {
            return;
        }
        self.input.push(char::from(b'0' + digit));
    }

    pub fn erase(&mut self) {
        self.input.pop();
    }

    /// Check the typed answer against every live block.
    pub fn submit(&mut self) -> Submission {
        if self.game_over {
            return Submission::Empty;
        }
        let Ok(value) = std::mem::take(&mut self.input).parse::<i64>() else {
            return Submission::Empty;
        };

        let mut blocks = self.board.check_answer(value);
        if blocks.is_empty() {
            self.last_miss = Some(value);
            self.combo_multiplier = 1;
            return match self.board.add_penalty_blocks(self.level) {
                PenaltyOutcome::Inserted(added) => Submission::Wrong {
                    penalty: added.len(),
                },
                PenaltyOutcome::GameOver => {
                    self.end();
                    Submission::GameOver
                }
            };
        }

        self.last_miss = None;
        let specials: Vec<Hit> = blocks
            .iter()
            .filter(|h| h.kind.is_special())
            .cloned()
            .collect();
        for special in &specials {
            // The trigger is already in `blocks`.
            blocks.extend(self.board.chain_explosion(special).into_iter().skip(1));
        }

        self.combo_multiplier = (self.combo_multiplier + 1).min(MAX_COMBO);
        let points = blocks.len() as u32 * POINTS_PER_BLOCK * self.combo_multiplier;
        self.score += points;
        self.destroyed += blocks.len() as u32;
        self.level = 1 + self.destroyed / BLOCKS_PER_LEVEL;

        for hit in &blocks {
            if hit.kind.is_penalty() {
                continue;
            }
            self.popups.push(ScorePopup {
                col: hit.col,
                y: hit.row as f32 * crate::block::CELL_SIZE,
                amount: POINTS_PER_BLOCK * self.combo_multiplier,
                multiplier: self.combo_multiplier,
                age_ms: 0,
            });
        }
        log::debug!(
            "answer {} took {} block(s) for {} points (x{})",
            value,
            blocks.len(),
            points,
            self.combo_multiplier
        );
        Submission::Correct { blocks, points }
    }

    /// Advance the board and popups by one frame.
    pub fn tick(&mut self, delta_ms: f32) -> Result<(), ConfigurationError> {
        self.tick_popups(delta_ms as u32);
        if self.game_over {
            return Ok(());
        }
        if self.board.update(delta_ms, self.level)? == BoardStatus::GameOver {
            self.end();
        }
        Ok(())
    }

    fn end(&mut self) {
        self.game_over = true;
        self.input.clear();
        log::info!(
            "game over: score {}, level {}, {} blocks",
            self.score,
            self.level,
            self.destroyed
        );
    }

    pub fn tick_popups(&mut self, delta_ms: u32) {
        self.popups.retain_mut(|p| {
            let old_steps = p.age_ms / POPUP_RISE_MS;
            p.age_ms += delta_ms;
            let new_steps = p.age_ms / POPUP_RISE_MS;
            p.y = (p.y - (new_steps - old_steps) as f32).max(0.0);
            p.age_ms < POPUP_LIFE_MS
        });
    }
}
