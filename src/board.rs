//! Grid and block manager: spawn, fall, lock, gravity, answer matching, chain explosions,
//! penalty rows, time stop and hint transformation.
//!
//! Landed blocks are owned by the grid cell they occupy; falling blocks live in a separate list
//! until they lock. A block is never in both.

use crate::block::{Block, BlockId, BlockKind, CELL_SIZE};
use crate::config::Settings;
use crate::hint::{Hint, calculate_complexity, calculate_hint_duration, generate_hint};
use crate::problem::{ConfigurationError, NumberRange, OperatorSet, generate_problem};
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::collections::VecDeque;

pub const COLS: usize = 7;
pub const ROWS: usize = 10;

const SPECIAL_CHANCE: f64 = 0.05;
const TIME_STOP_CHANCE: f64 = 0.05;

/// Relative weights for 1..=7 penalty blocks at level 1.
const PENALTY_WEIGHTS: [f64; COLS] = [30.0, 25.0, 18.0, 12.0, 8.0, 5.0, 2.0];
/// Weight moved from small to large penalty counts per level.
const PENALTY_LEVEL_SHIFT: f64 = 1.5;

/// Candidates within this fraction of the top complexity are preferred for hints.
const HINT_PREFERRED_FRACTION: f64 = 0.8;

const NEIGHBOURS_8: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardStatus {
    Playing,
    GameOver,
}

/// A block matched by an answer or caught in an explosion, as it was when hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: BlockId,
    pub col: usize,
    pub row: usize,
    pub kind: BlockKind,
}

impl From<&Block> for Hit {
    fn from(block: &Block) -> Self {
        Self {
            id: block.id,
            col: block.col,
            row: block.row,
            kind: block.kind.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PenaltyOutcome {
    /// Blocks added to the bottom row; empty when penalties are off for this tier.
    Inserted(Vec<Hit>),
    /// The top row was already occupied. Nothing was changed.
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStopStatus {
    pub active: bool,
    pub remaining_ms: f32,
}

enum Fall {
    Moving,
    Lock,
}

type Row = Vec<Option<Block>>;

fn empty_row() -> Row {
    (0..COLS).map(|_| None).collect()
}

/// Level-adjusted chance of inserting 1..=7 penalty blocks, normalised to sum to 1.
pub fn penalty_weights(level: u32) -> [f64; COLS] {
    let shift = f64::from(level.saturating_sub(1)) * PENALTY_LEVEL_SHIFT;
    let mut weights = PENALTY_WEIGHTS;
    let middle = (COLS / 2) as f64;
    for (i, w) in weights.iter_mut().enumerate() {
        *w = (*w + (i as f64 - middle) * shift).max(0.0);
    }
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for w in &mut weights {
            *w /= total;
        }
    } else {
        weights = [1.0 / COLS as f64; COLS];
    }
    weights
}

#[derive(Debug)]
pub struct BlockManager {
    settings: Settings,
    /// rows[0] is the top.
    rows: VecDeque<Row>,
    falling: Vec<Block>,
    next_id: u64,
    clock_ms: f64,
    spawn_timer_ms: f32,
    hint_timer_ms: f32,
    time_stop_until: Option<f64>,
    rng: Pcg32,
}

impl BlockManager {
    pub fn new(settings: Settings, seed: u64) -> Self {
        Self {
            settings,
            rows: (0..ROWS).map(|_| empty_row()).collect(),
            falling: Vec::new(),
            next_id: 0,
            clock_ms: 0.0,
            spawn_timer_ms: 0.0,
            hint_timer_ms: 0.0,
            time_stop_until: None,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Swap in a new difficulty. Blocks on the board are kept.
    pub fn set_difficulty(&mut self, settings: Settings) {
        log::info!("difficulty set to {}", settings.tier.label());
        self.settings = settings;
    }

    pub fn set_fall_speed(&mut self, units_per_sec: f32) {
        self.settings.fall_speed = units_per_sec.max(0.0);
    }

    pub fn set_spawn_interval(&mut self, ms: f32) {
        self.settings.spawn_interval_ms = ms.max(1.0);
    }

    pub fn set_max_blocks(&mut self, max: usize) {
        self.settings.max_falling = max.max(1);
    }

    pub fn set_number_range(&mut self, range: NumberRange) {
        self.settings.problem.range = range;
    }

    pub fn set_level_increase(&mut self, increase: i64) {
        self.settings.problem.increase_per_level = increase.max(0);
    }

    /// Applies from the next activation; a running time stop keeps its end time.
    pub fn set_time_stop_duration(&mut self, ms: f32) {
        self.settings.time_stop_ms = ms.max(0.0);
    }

    pub fn set_hint_schedule(&mut self, interval_ms: f32, chance: f64) {
        self.settings.hint_interval_ms = interval_ms.max(1.0);
        self.settings.hint_chance = chance.clamp(0.0, 1.0);
    }

    /// Refuses an empty set so spawning can always produce a problem.
    pub fn set_operators(&mut self, operators: OperatorSet) -> Result<(), ConfigurationError> {
        if operators.is_empty() {
            return Err(ConfigurationError::NoOperators);
        }
        self.settings.problem.operators = operators;
        Ok(())
    }

    /// Drop every block and timer. Animations in flight are discarded.
    pub fn reset_for_new_game(&mut self) {
        self.rows = (0..ROWS).map(|_| empty_row()).collect();
        self.falling.clear();
        self.clock_ms = 0.0;
        self.spawn_timer_ms = 0.0;
        self.hint_timer_ms = 0.0;
        self.time_stop_until = None;
        log::debug!("board reset");
    }

    pub fn falling(&self) -> &[Block] {
        &self.falling
    }

    pub fn landed(&self) -> impl Iterator<Item = &Block> {
        self.rows.iter().flat_map(|row| row.iter().flatten())
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.falling.iter().chain(self.landed())
    }

    fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.falling
            .iter_mut()
            .chain(self.rows.iter_mut().flat_map(|row| row.iter_mut().flatten()))
            .find(|b| b.id == id)
    }

    fn next_block_id(&mut self) -> BlockId {
        self.next_id += 1;
        BlockId(self.next_id)
    }

    pub fn is_time_stopped(&self) -> bool {
        self.time_stop_until.is_some()
    }

    pub fn time_stop_status(&self) -> TimeStopStatus {
        match self.time_stop_until {
            Some(until) => TimeStopStatus {
                active: true,
                remaining_ms: (until - self.clock_ms).max(0.0) as f32,
            },
            None => TimeStopStatus {
                active: false,
                remaining_ms: 0.0,
            },
        }
    }

    fn activate_time_stop(&mut self) {
        let until = self.clock_ms + f64::from(self.settings.time_stop_ms);
        self.time_stop_until = Some(self.time_stop_until.map_or(until, |t| t.max(until)));
        log::info!("time stop for {} ms", self.settings.time_stop_ms);
    }

    /// Spawn a block in a random column whose top cell is free and that has nothing falling.
    /// Returns `None` when no column qualifies.
    pub fn spawn_block(&mut self, level: u32) -> Result<Option<BlockId>, ConfigurationError> {
        let columns: Vec<usize> = (0..COLS)
            .filter(|&c| self.rows[0][c].is_none() && !self.falling.iter().any(|b| b.col == c))
            .collect();
        let Some(&col) = columns.choose(&mut self.rng) else {
            log::debug!("spawn skipped: no free column");
            return Ok(None);
        };
        let problem = generate_problem(level, &self.settings.problem, &mut self.rng)?;
        let roll: f64 = self.rng.random();
        let kind = if roll < SPECIAL_CHANCE {
            BlockKind::Special(problem)
        } else if roll < SPECIAL_CHANCE + TIME_STOP_CHANCE {
            BlockKind::TimeStop(problem)
        } else {
            BlockKind::Normal(problem)
        };
        let id = self.next_block_id();
        log::debug!("spawn {:?} in column {}: {:?}", id, col, kind);
        self.falling
            .push(Block::new(id, col, 0, kind, self.settings.settle_speed));
        Ok(Some(id))
    }

    /// Advance the board by one frame.
    pub fn update(&mut self, delta_ms: f32, level: u32) -> Result<BoardStatus, ConfigurationError> {
        self.clock_ms += f64::from(delta_ms);
        if let Some(until) = self.time_stop_until {
            if self.clock_ms >= until {
                self.time_stop_until = None;
                log::info!("time stop ended");
            }
        }
        let stopped = self.is_time_stopped();

        if !stopped {
            self.spawn_timer_ms += delta_ms;
            if self.spawn_timer_ms >= self.settings.spawn_interval_ms
                && self.falling.len() < self.settings.max_falling
            {
                self.spawn_timer_ms = 0.0;
                self.spawn_block(level)?;
            }
            self.hint_timer_ms += delta_ms;
            if self.hint_timer_ms >= self.settings.hint_interval_ms {
                self.hint_timer_ms = 0.0;
                self.try_transform_blocks_to_hint();
            }
        }

        let overflow = self.advance_falling(delta_ms, stopped);
        self.advance_landed(delta_ms);

        if overflow || self.top_row_blocked() {
            log::info!("game over");
            return Ok(BoardStatus::GameOver);
        }
        Ok(BoardStatus::Playing)
    }

    /// Returns true if a block locked into the top row or could not lock at all.
    fn advance_falling(&mut self, delta_ms: f32, stopped: bool) -> bool {
        let step = self.settings.fall_speed * delta_ms / 1000.0;
        let mut overflow = false;
        let mut still_falling = Vec::with_capacity(self.falling.len());
        for mut block in std::mem::take(&mut self.falling) {
            if block.update(delta_ms) {
                log::debug!("{:?} destroyed mid-air", block.id);
                continue;
            }
            if block.is_destroying() || stopped {
                still_falling.push(block);
                continue;
            }
            block.y += step;
            match self.fall(&mut block) {
                Fall::Moving => still_falling.push(block),
                Fall::Lock => overflow |= self.lock(block),
            }
        }
        self.falling = still_falling;
        overflow
    }

    fn fall(&self, block: &mut Block) -> Fall {
        loop {
            let next = block.row + 1;
            if next >= ROWS || self.rows[next][block.col].is_some() {
                return Fall::Lock;
            }
            if block.y < next as f32 * CELL_SIZE {
                return Fall::Moving;
            }
            block.row = next;
        }
    }

    /// Place a block into the grid at or above its row. Returns true on top-row lock or overflow.
    fn lock(&mut self, mut block: Block) -> bool {
        let col = block.col;
        let Some(row) = (0..=block.row).rev().find(|&r| self.rows[r][col].is_none()) else {
            log::warn!("{:?} has no free cell in column {}; discarded", block.id, col);
            return true;
        };
        block.row = row;
        block.y = row as f32 * CELL_SIZE;
        block.settling = false;
        log::debug!("{:?} locked at ({}, {})", block.id, row, col);
        self.rows[row][col] = Some(block);
        row == 0
    }

    fn advance_landed(&mut self, delta_ms: f32) {
        let mut removed = false;
        for cell in self.rows.iter_mut().flat_map(|row| row.iter_mut()) {
            if cell.as_mut().is_some_and(|b| b.update(delta_ms)) {
                *cell = None;
                removed = true;
            }
        }
        if removed {
            self.apply_gravity();
        }
    }

    fn top_row_blocked(&self) -> bool {
        self.rows[0].iter().flatten().any(|b| !b.is_destroying())
    }

    /// Slide blocks down into empty cells until nothing moves. Returns the number of moves.
    pub fn apply_gravity(&mut self) -> usize {
        let mut moves = 0;
        loop {
            let mut changed = false;
            for col in 0..COLS {
                for row in (0..ROWS - 1).rev() {
                    if self.rows[row][col].is_none() || self.rows[row + 1][col].is_some() {
                        continue;
                    }
                    let mut target = row + 1;
                    while target + 1 < ROWS && self.rows[target + 1][col].is_none() {
                        target += 1;
                    }
                    if let Some(mut block) = self.rows[row][col].take() {
                        block.row = target;
                        block.settling = true;
                        self.rows[target][col] = Some(block);
                        changed = true;
                        moves += 1;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        moves
    }

    /// Destroy every live, non-penalty block whose answer is `value`.
    /// Matching time-stop blocks also start the time stop. Blocks stay on the board until their
    /// animation finishes.
    pub fn check_answer(&mut self, value: i64) -> Vec<Hit> {
        let mut hits = Vec::new();
        let mut time_stop = false;
        let landed = self.rows.iter_mut().flat_map(|row| row.iter_mut().flatten());
        for block in self.falling.iter_mut().chain(landed) {
            if block.is_destroying() || block.problem().is_none_or(|p| p.answer != value) {
                continue;
            }
            time_stop |= block.kind.is_time_stop();
            block.destroy();
            hits.push(Hit::from(&*block));
        }
        if time_stop {
            self.activate_time_stop();
        }
        log::debug!("answer {} matched {} block(s)", value, hits.len());
        hits
    }

    /// Destroy the eight cells around a special block. One ring only; specials caught in the
    /// blast do not explode further. Returns the trigger followed by the neighbours destroyed.
    pub fn chain_explosion(&mut self, trigger: &Hit) -> Vec<Hit> {
        let (row, col) = self
            .blocks()
            .find(|b| b.id == trigger.id)
            .map_or((trigger.row, trigger.col), |b| (b.row, b.col));
        let mut hits = vec![trigger.clone()];
        for (dr, dc) in NEIGHBOURS_8 {
            let (Some(r), Some(c)) = (row.checked_add_signed(dr), col.checked_add_signed(dc)) else {
                continue;
            };
            if r >= ROWS || c >= COLS {
                continue;
            }
            if let Some(block) = self.rows[r][c].as_mut() {
                if block.is_destroying() {
                    continue;
                }
                block.destroy();
                hits.push(Hit::from(&*block));
            }
        }
        log::info!("chain explosion at ({}, {}) took {} block(s)", row, col, hits.len());
        hits
    }

    /// Push everything up one row and fill random bottom cells with penalty blocks.
    pub fn add_penalty_blocks(&mut self, level: u32) -> PenaltyOutcome {
        if !self.settings.penalty_enabled {
            log::debug!("penalty skipped for {}", self.settings.tier.label());
            return PenaltyOutcome::Inserted(Vec::new());
        }
        if self.top_row_blocked() {
            return PenaltyOutcome::GameOver;
        }

        if let Some(top) = self.rows.pop_front() {
            let dropped = top.iter().flatten().count();
            if dropped > 0 {
                log::debug!("{} exploding block(s) pushed off the top", dropped);
            }
        }
        self.rows.push_back(empty_row());
        for (row, cells) in self.rows.iter_mut().enumerate() {
            for block in cells.iter_mut().flatten() {
                block.row = row;
                block.y = (block.y - CELL_SIZE).max(0.0);
            }
        }
        for block in &mut self.falling {
            if self.rows[block.row][block.col].is_some() {
                block.row = block.row.saturating_sub(1);
                block.y = block.y.min(block.row as f32 * CELL_SIZE);
            }
        }

        let count = self.penalty_count(level);
        let mut columns: Vec<usize> = (0..COLS).collect();
        columns.shuffle(&mut self.rng);
        let mut hits = Vec::with_capacity(count);
        for &col in columns.iter().take(count) {
            let id = self.next_block_id();
            let block = Block::new(id, col, ROWS - 1, BlockKind::Penalty, self.settings.settle_speed);
            hits.push(Hit::from(&block));
            self.rows[ROWS - 1][col] = Some(block);
        }
        self.apply_gravity();
        log::info!("{} penalty block(s) inserted", hits.len());
        PenaltyOutcome::Inserted(hits)
    }

    fn penalty_count(&mut self, level: u32) -> usize {
        match WeightedIndex::new(penalty_weights(level)) {
            Ok(dist) => dist.sample(&mut self.rng) + 1,
            Err(_) => 1,
        }
    }

    /// Maybe put a hint overlay on one live block, favouring the hardest problems.
    /// Returns the block that received it.
    pub fn try_transform_blocks_to_hint(&mut self) -> Option<BlockId> {
        let chance = self.settings.hint_chance.clamp(0.0, 1.0);
        if !self.rng.random_bool(chance) {
            return None;
        }
        let eligible: Vec<(BlockId, String)> = self
            .blocks()
            .filter(|b| b.can_take_hint())
            .filter_map(|b| Some((b.id, b.problem()?.expression.clone())))
            .collect();
        let mut candidates: Vec<(BlockId, Hint, f64, String)> = Vec::new();
        for (id, expression) in eligible {
            if let Some(hint) = generate_hint(&expression, &mut self.rng) {
                let complexity = calculate_complexity(&expression);
                candidates.push((id, hint, complexity, expression));
            }
        }
        if candidates.is_empty() {
            log::debug!("no block can take a hint");
            return None;
        }

        let top = candidates
            .iter()
            .map(|c| c.2)
            .fold(f64::NEG_INFINITY, f64::max);
        let preferred: Vec<usize> = (0..candidates.len())
            .filter(|&i| candidates[i].2 >= top * HINT_PREFERRED_FRACTION)
            .collect();
        let all: Vec<usize> = (0..candidates.len()).collect();
        let &pick = preferred
            .choose(&mut self.rng)
            .or_else(|| all.choose(&mut self.rng))?;

        let (id, hint, _, expression) = candidates.swap_remove(pick);
        let duration = calculate_hint_duration(&expression);
        log::debug!("hint on {:?}: {} -> {}", id, expression, hint.simplified_expression);
        let block = self.block_mut(id)?;
        block.begin_hint(hint, duration).then_some(id)
    }
}
