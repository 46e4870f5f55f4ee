//! Block entity: one falling or landed problem with its reveal, destroy and hint animations.

use crate::hint::Hint;
use crate::problem::{Operator, Problem};
use std::f32::consts::TAU;

/// Logical size of one grid cell; the renderer maps it to terminal cells.
pub const CELL_SIZE: f32 = 40.0;

/// How long a matched block shows its answer before exploding.
pub const ANSWER_REVEAL_MS: f32 = 500.0;

/// Length of the explosion animation.
pub const DESTROY_MS: f32 = 400.0;

/// Hint overlay fade in / fade out time.
pub const HINT_FADE_MS: f32 = 300.0;

/// Fraction of the hint duration after which the overlay starts fading out.
const HINT_DISPLAY_FRACTION: f32 = 0.8;

const PARTICLES_PER_BLOCK: usize = 10;
const PARTICLE_LIFE_MS: f32 = 600.0;
/// Downward acceleration on particles, units/s².
const PARTICLE_GRAVITY: f32 = 240.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

/// Colour role of a block; the theme turns it into an actual colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tint {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Penalty,
    Hint,
}

impl Tint {
    pub fn for_operator(op: Operator) -> Self {
        match op {
            Operator::Add => Self::Addition,
            Operator::Subtract => Self::Subtraction,
            Operator::Multiply => Self::Multiplication,
            Operator::Divide => Self::Division,
        }
    }
}

/// What a block is. Penalty blocks carry no problem and can only be destroyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Normal(Problem),
    /// Destroying it also destroys its eight neighbours.
    Special(Problem),
    /// Destroying it pauses spawning and falling for a while.
    TimeStop(Problem),
    Penalty,
}

impl BlockKind {
    pub fn problem(&self) -> Option<&Problem> {
        match self {
            Self::Normal(p) | Self::Special(p) | Self::TimeStop(p) => Some(p),
            Self::Penalty => None,
        }
    }

    pub fn is_special(&self) -> bool {
        matches!(self, Self::Special(_))
    }

    pub fn is_time_stop(&self) -> bool {
        matches!(self, Self::TimeStop(_))
    }

    pub fn is_penalty(&self) -> bool {
        matches!(self, Self::Penalty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub life_ms: f32,
    pub tint: Tint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadePhase {
    FadeIn,
    Display,
    FadeOut,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HintOverlay {
    None,
    Active {
        hint: Hint,
        phase: FadePhase,
        alpha: f32,
        elapsed_ms: f32,
        duration_ms: f32,
        original_tint: Tint,
    },
}

/// Destruction progress. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Destruction {
    Intact,
    Revealing { elapsed_ms: f32 },
    Exploding { progress: f32 },
    Finished,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub col: usize,
    /// Grid row; 0 is the top.
    pub row: usize,
    /// Vertical position in logical units, animated towards `row * CELL_SIZE` while `settling`.
    pub y: f32,
    pub kind: BlockKind,
    pub tint: Tint,
    /// Sliding down after gravity compaction.
    pub settling: bool,
    settle_speed: f32,
    destruction: Destruction,
    hint: HintOverlay,
    particles: Vec<Particle>,
}

impl Block {
    pub fn new(id: BlockId, col: usize, row: usize, kind: BlockKind, settle_speed: f32) -> Self {
        let tint = kind
            .problem()
            .map_or(Tint::Penalty, |p| Tint::for_operator(p.operator));
        Self {
            id,
            col,
            row,
            y: row as f32 * CELL_SIZE,
            kind,
            tint,
            settling: false,
            settle_speed,
            destruction: Destruction::Intact,
            hint: HintOverlay::None,
            particles: Vec::new(),
        }
    }

    pub fn problem(&self) -> Option<&Problem> {
        self.kind.problem()
    }

    pub fn destruction(&self) -> Destruction {
        self.destruction
    }

    /// True once `destroy` has been called, including the answer reveal.
    pub fn is_destroying(&self) -> bool {
        !matches!(self.destruction, Destruction::Intact)
    }

    pub fn showing_answer(&self) -> bool {
        matches!(self.destruction, Destruction::Revealing { .. })
    }

    /// Explosion progress in 0..=1 (0 before the explosion starts).
    pub fn destroy_progress(&self) -> f32 {
        match self.destruction {
            Destruction::Exploding { progress } => progress,
            Destruction::Finished => 1.0,
            _ => 0.0,
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn hint(&self) -> Option<&Hint> {
        match &self.hint {
            HintOverlay::Active { hint, .. } => Some(hint),
            HintOverlay::None => None,
        }
    }

    pub fn is_hinted(&self) -> bool {
        matches!(self.hint, HintOverlay::Active { .. })
    }

    pub fn hint_phase(&self) -> Option<FadePhase> {
        match self.hint {
            HintOverlay::Active { phase, .. } => Some(phase),
            HintOverlay::None => None,
        }
    }

    /// Overlay opacity in 0..=1, 0 when no hint is shown.
    pub fn hint_alpha(&self) -> f32 {
        match self.hint {
            HintOverlay::Active { alpha, .. } => alpha,
            HintOverlay::None => 0.0,
        }
    }

    /// Tint to restore once the overlay ends; the current tint otherwise.
    pub fn base_tint(&self) -> Tint {
        match self.hint {
            HintOverlay::Active { original_tint, .. } => original_tint,
            HintOverlay::None => self.tint,
        }
    }

    /// Text drawn on the block: the answer while revealing, the problem otherwise.
    pub fn label(&self) -> Option<String> {
        let problem = self.problem()?;
        match self.destruction {
            Destruction::Revealing { .. } => Some(problem.answer.to_string()),
            Destruction::Intact => Some(problem.expression.clone()),
            _ => None,
        }
    }

    /// May receive a hint overlay right now.
    pub fn can_take_hint(&self) -> bool {
        matches!(self.kind, BlockKind::Normal(_) | BlockKind::Special(_))
            && !self.is_destroying()
            && !self.is_hinted()
    }

    /// Start a hint overlay. Refused for penalty, time-stop, destroying and already hinted blocks.
    pub fn begin_hint(&mut self, hint: Hint, duration_ms: f32) -> bool {
        if !self.can_take_hint() {
            return false;
        }
        self.hint = HintOverlay::Active {
            hint,
            phase: FadePhase::FadeIn,
            alpha: 0.0,
            elapsed_ms: 0.0,
            duration_ms,
            original_tint: self.tint,
        };
        self.tint = Tint::Hint;
        true
    }

    fn end_hint(&mut self) {
        if let HintOverlay::Active { original_tint, .. } =
            std::mem::replace(&mut self.hint, HintOverlay::None)
        {
            self.tint = original_tint;
        }
    }

    /// Mark for destruction. Penalty blocks explode at once, others reveal their answer first.
    /// Calling it again has no effect.
    pub fn destroy(&mut self) {
        if self.is_destroying() {
            return;
        }
        self.end_hint();
        if self.kind.is_penalty() {
            self.start_explosion();
        } else {
            self.destruction = Destruction::Revealing { elapsed_ms: 0.0 };
        }
    }

    fn start_explosion(&mut self) {
        self.destruction = Destruction::Exploding { progress: 0.0 };
        self.spawn_particles();
    }

    /// Spread is derived from the block id so no RNG is needed here.
    fn spawn_particles(&mut self) {
        let cx = self.col as f32 * CELL_SIZE + CELL_SIZE / 2.0;
        let cy = self.y + CELL_SIZE / 2.0;
        for i in 0..PARTICLES_PER_BLOCK {
            let hash = self
                .id
                .0
                .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                .wrapping_add((i as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9));
            let hash = hash ^ (hash >> 29);
            let r1 = (hash % 1000) as f32 / 1000.0;
            let r2 = ((hash >> 10) % 1000) as f32 / 1000.0;
            let r3 = ((hash >> 20) % 1000) as f32 / 1000.0;
            let angle = (i as f32 / PARTICLES_PER_BLOCK as f32) * TAU + (r1 - 0.5) * 0.6;
            let speed = 60.0 + r2 * 90.0;
            self.particles.push(Particle {
                x: cx,
                y: cy,
                vx: angle.cos() * speed,
                vy: angle.sin() * speed - 40.0,
                life_ms: PARTICLE_LIFE_MS * (0.6 + 0.4 * r3),
                tint: self.tint,
            });
        }
    }

    /// Advance all timers by `delta_ms`. Returns true exactly once: on the tick the explosion completes.
    pub fn update(&mut self, delta_ms: f32) -> bool {
        self.update_settle(delta_ms);
        self.update_hint(delta_ms);
        self.update_particles(delta_ms);
        match self.destruction {
            Destruction::Revealing { elapsed_ms } => {
                let elapsed_ms = elapsed_ms + delta_ms;
                if elapsed_ms >= ANSWER_REVEAL_MS {
                    self.start_explosion();
                } else {
                    self.destruction = Destruction::Revealing { elapsed_ms };
                }
                false
            }
            Destruction::Exploding { progress } => {
                let progress = progress + delta_ms / DESTROY_MS;
                if progress >= 1.0 {
                    self.destruction = Destruction::Finished;
                    true
                } else {
                    self.destruction = Destruction::Exploding { progress };
                    false
                }
            }
            Destruction::Intact | Destruction::Finished => false,
        }
    }

    fn update_settle(&mut self, delta_ms: f32) {
        if !self.settling {
            return;
        }
        let target = self.row as f32 * CELL_SIZE;
        let step = self.settle_speed * delta_ms / 1000.0;
        if (target - self.y).abs() <= step {
            self.y = target;
            self.settling = false;
        } else if self.y < target {
            self.y += step;
        } else {
            self.y -= step;
        }
    }

    fn update_hint(&mut self, delta_ms: f32) {
        let HintOverlay::Active {
            phase,
            alpha,
            elapsed_ms,
            duration_ms,
            ..
        } = &mut self.hint
        else {
            return;
        };
        *elapsed_ms += delta_ms;
        let fade = delta_ms / HINT_FADE_MS;
        let mut finished = false;
        match *phase {
            FadePhase::FadeIn => {
                *alpha = (*alpha + fade).min(1.0);
                if *alpha >= 1.0 {
                    *phase = FadePhase::Display;
                }
            }
            FadePhase::Display => {
                if *elapsed_ms >= *duration_ms * HINT_DISPLAY_FRACTION {
                    *phase = FadePhase::FadeOut;
                }
            }
            FadePhase::FadeOut => {
                *alpha = (*alpha - fade).max(0.0);
                finished = *alpha <= 0.0;
            }
        }
        if finished {
            self.end_hint();
        }
    }

    fn update_particles(&mut self, delta_ms: f32) {
        let dt = delta_ms / 1000.0;
        self.particles.retain_mut(|p| {
            p.x += p.vx * dt;
            p.y += p.vy * dt;
            p.vy += PARTICLE_GRAVITY * dt;
            p.life_ms -= delta_ms;
            p.life_ms > 0.0
        });
    }
}
