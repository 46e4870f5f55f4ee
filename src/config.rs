//! Difficulty presets, training presets and the tunable parameters of a session.
//!
//! Settings are built from a preset, then an optional JSON override file, then CLI overrides.

use crate::problem::{
    ConfigurationError, MAX_ANSWER, MAX_RANGE, NumberRange, Operator, OperatorSet, ProblemConfig,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Difficulty tiers that receive penalty rows on a wrong answer.
pub const PENALTY_TIERS: [Difficulty; 2] = [Difficulty::Normal, Difficulty::Hard];

const TIME_STOP_MS: f32 = 5000.0;
const HINT_INTERVAL_MS: f32 = 5000.0;
const HINT_CHANCE: f64 = 0.4;
const SETTLE_SPEED: f32 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Normal,
    Hard,
}

/// Focused practice modes. Ranges are fixed and never scale with level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Training {
    /// Two-digit additions that carry.
    Carry,
    /// Two-digit subtractions that borrow.
    Borrow,
    /// Teens times teens.
    Omiyage,
    /// Single-digit times tables.
    Times,
    /// Exact single-digit division.
    Division,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Standard(Difficulty),
    Training(Training),
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Self::Standard(Difficulty::Easy) => "Easy",
            Self::Standard(Difficulty::Normal) => "Normal",
            Self::Standard(Difficulty::Hard) => "Hard",
            Self::Training(Training::Carry) => "Carry",
            Self::Training(Training::Borrow) => "Borrow",
            Self::Training(Training::Omiyage) => "Omiyage",
            Self::Training(Training::Times) => "Times",
            Self::Training(Training::Division) => "Division",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown operator '{0}' (expected some of + - * /)")]
    UnknownOperator(char),
    #[error(transparent)]
    Problem(#[from] ConfigurationError),
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("operand range up to {0} is too large (max {max})", max = MAX_RANGE)]
    RangeTooLarge(i64),
    #[error("increase per level {0} must be between 0 and {max}", max = MAX_RANGE)]
    BadIncrease(i64),
    #[error("answers up to {0} do not fit the input box (max {max})", max = MAX_ANSWER)]
    AnswerTooLong(i64),
}

/// Every parameter the grid manager reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub tier: Tier,
    /// Fall speed of active blocks, units per second.
    pub fall_speed: f32,
    pub spawn_interval_ms: f32,
    /// Cap on blocks falling at the same time.
    pub max_falling: usize,
    pub problem: ProblemConfig,
    pub penalty_enabled: bool,
    pub time_stop_ms: f32,
    pub hint_interval_ms: f32,
    /// Chance that a hint transformation attempt goes ahead.
    pub hint_chance: f64,
    /// Slide speed after gravity compaction, units per second.
    pub settle_speed: f32,
}

impl Settings {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Standard(d) => Self::for_difficulty(d),
            Tier::Training(t) => Self::for_training(t),
        }
    }

    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        use Operator::{Add, Divide, Multiply, Subtract};
        let (fall_speed, spawn_interval_ms, max_falling, ops, max, increase) = match difficulty {
            Difficulty::Easy => (12.0, 4500.0, 2, &[Add, Subtract][..], 10, 2),
            Difficulty::Normal => (18.0, 3500.0, 3, &[Add, Subtract, Multiply][..], 20, 5),
            Difficulty::Hard => (26.0, 2500.0, 4, &[Add, Subtract, Multiply, Divide][..], 50, 10),
        };
        Self {
            tier: Tier::Standard(difficulty),
            fall_speed,
            spawn_interval_ms,
            max_falling,
            problem: ProblemConfig {
                operators: OperatorSet::of(ops),
                range: NumberRange::new(1, max),
                training: false,
                force_carry: false,
                force_borrow: false,
                omiyage: false,
                increase_per_level: increase,
            },
            penalty_enabled: PENALTY_TIERS.contains(&difficulty),
            time_stop_ms: TIME_STOP_MS,
            hint_interval_ms: HINT_INTERVAL_MS,
            hint_chance: HINT_CHANCE,
            settle_speed: SETTLE_SPEED,
        }
    }

    pub fn for_training(training: Training) -> Self {
        let (op, range) = match training {
            Training::Carry => (Operator::Add, NumberRange::new(10, 99)),
            Training::Borrow => (Operator::Subtract, NumberRange::new(10, 99)),
            Training::Omiyage => (Operator::Multiply, NumberRange::new(10, 19)),
            Training::Times => (Operator::Multiply, NumberRange::new(1, 9)),
            Training::Division => (Operator::Divide, NumberRange::new(1, 9)),
        };
        Self {
            tier: Tier::Training(training),
            fall_speed: 10.0,
            spawn_interval_ms: 5000.0,
            max_falling: 2,
            problem: ProblemConfig {
                operators: OperatorSet::only(op),
                range,
                training: true,
                force_carry: training == Training::Carry,
                force_borrow: training == Training::Borrow,
                omiyage: training == Training::Omiyage,
                increase_per_level: 0,
            },
            penalty_enabled: false,
            time_stop_ms: TIME_STOP_MS,
            hint_interval_ms: HINT_INTERVAL_MS,
            hint_chance: HINT_CHANCE,
            settle_speed: SETTLE_SPEED,
        }
    }

    /// Apply overrides; fields left `None` keep the preset value.
    pub fn apply(&mut self, o: &Overrides) -> Result<(), ConfigError> {
        if let Some(v) = o.fall_speed {
            self.fall_speed = v;
        }
        if let Some(v) = o.spawn_interval_ms {
            self.spawn_interval_ms = v;
        }
        if let Some(v) = o.max_blocks {
            self.max_falling = v;
        }
        if o.min.is_some() || o.max.is_some() {
            let min = o.min.unwrap_or(self.problem.range.min);
            let max = o.max.unwrap_or(self.problem.range.max);
            self.problem.range = NumberRange::new(min, max);
        }
        if let Some(ops) = &o.operators {
            self.problem.operators = OperatorSet::parse(ops).map_err(ConfigError::UnknownOperator)?;
        }
        if let Some(v) = o.increase_per_level {
            self.problem.increase_per_level = v;
        }
        if let Some(v) = o.time_stop_ms {
            self.time_stop_ms = v;
        }
        if let Some(v) = o.hint_interval_ms {
            self.hint_interval_ms = v;
        }
        if let Some(v) = o.hint_chance {
            self.hint_chance = v.clamp(0.0, 1.0);
        }
        Ok(())
    }

    /// Reject settings a session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.problem.operators.is_empty() {
            return Err(ConfigurationError::NoOperators.into());
        }
        if self.fall_speed <= 0.0 {
            return Err(ConfigError::NotPositive("fall speed"));
        }
        if self.spawn_interval_ms <= 0.0 {
            return Err(ConfigError::NotPositive("spawn interval"));
        }
        if self.max_falling == 0 {
            return Err(ConfigError::NotPositive("max blocks"));
        }
        if self.hint_interval_ms <= 0.0 {
            return Err(ConfigError::NotPositive("hint interval"));
        }
        if self.problem.range.max > MAX_RANGE {
            return Err(ConfigError::RangeTooLarge(self.problem.range.max));
        }
        let increase = self.problem.increase_per_level;
        if !(0..=MAX_RANGE).contains(&increase) {
            return Err(ConfigError::BadIncrease(increase));
        }
        let largest = self.problem.largest_answer();
        if largest > MAX_ANSWER {
            return Err(ConfigError::AnswerTooLong(largest));
        }
        Ok(())
    }
}

/// Optional parameter overrides, read from a JSON file or the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Overrides {
    pub fall_speed: Option<f32>,
    pub spawn_interval_ms: Option<f32>,
    pub max_blocks: Option<usize>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub operators: Option<String>,
    pub increase_per_level: Option<i64>,
    pub time_stop_ms: Option<f32>,
    pub hint_interval_ms: Option<f32>,
    pub hint_chance: Option<f64>,
}

impl Overrides {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&s)?)
    }

    /// Combine with `other`, whose values win.
    pub fn merge(self, other: Self) -> Self {
        Self {
            fall_speed: other.fall_speed.or(self.fall_speed),
            spawn_interval_ms: other.spawn_interval_ms.or(self.spawn_interval_ms),
            max_blocks: other.max_blocks.or(self.max_blocks),
            min: other.min.or(self.min),
            max: other.max.or(self.max),
            operators: other.operators.or(self.operators),
            increase_per_level: other.increase_per_level.or(self.increase_per_level),
            time_stop_ms: other.time_stop_ms.or(self.time_stop_ms),
            hint_interval_ms: other.hint_interval_ms.or(self.hint_interval_ms),
            hint_chance: other.hint_chance.or(self.hint_chance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        for d in [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard] {
            Settings::for_difficulty(d).validate().unwrap();
        }
        for t in [
            Training::Carry,
            Training::Borrow,
            Training::Omiyage,
            Training::Times,
            Training::Division,
        ] {
            let s = Settings::for_training(t);
            s.validate().unwrap();
            assert!(s.problem.training);
            assert!(!s.penalty_enabled);
        }
    }

    #[test]
    fn penalty_only_for_listed_tiers() {
        assert!(!Settings::for_difficulty(Difficulty::Easy).penalty_enabled);
        assert!(Settings::for_difficulty(Difficulty::Normal).penalty_enabled);
        assert!(Settings::for_difficulty(Difficulty::Hard).penalty_enabled);
    }

    #[test]
    fn overrides_from_json() {
        let o: Overrides =
            serde_json::from_str(r#"{ "fall_speed": 30.0, "operators": "*/", "max": 12 }"#).unwrap();
        let mut s = Settings::for_difficulty(Difficulty::Easy);
        s.apply(&o).unwrap();
        assert_eq!(s.fall_speed, 30.0);
        assert_eq!(s.problem.operators.enabled(), vec![Operator::Multiply, Operator::Divide]);
        assert_eq!(s.problem.range, NumberRange::new(1, 12));
    }

    #[test]
    fn unknown_json_field_is_rejected() {
        assert!(serde_json::from_str::<Overrides>(r#"{ "gravity": 3 }"#).is_err());
    }

    #[test]
    fn empty_operators_fail_validation() {
        let mut s = Settings::for_difficulty(Difficulty::Hard);
        s.apply(&Overrides {
            operators: Some(String::new()),
            ..Overrides::default()
        })
        .unwrap();
        assert!(matches!(
            s.validate(),
            Err(ConfigError::Problem(ConfigurationError::NoOperators))
        ));
    }

    #[test]
    fn bad_operator_is_reported() {
        let mut s = Settings::for_difficulty(Difficulty::Hard);
        let err = s
            .apply(&Overrides {
                operators: Some("+^".into()),
                ..Overrides::default()
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOperator('^')));
    }

    #[test]
    fn oversized_training_range_fails_validation() {
        let mut s = Settings::for_training(Training::Times);
        s.apply(&Overrides {
            min: Some(4_000_000_000),
            max: Some(5_000_000_000),
            ..Overrides::default()
        })
        .unwrap();
        assert!(matches!(s.validate(), Err(ConfigError::RangeTooLarge(5_000_000_000))));
    }

    #[test]
    fn untypeable_answers_fail_validation() {
        let mut s = Settings::for_training(Training::Times);
        s.apply(&Overrides {
            max: Some(200),
            ..Overrides::default()
        })
        .unwrap();
        assert!(matches!(s.validate(), Err(ConfigError::AnswerTooLong(40_000))));

        s.apply(&Overrides {
            max: Some(99),
            ..Overrides::default()
        })
        .unwrap();
        s.validate().unwrap();
    }

    #[test]
    fn level_increase_must_be_bounded() {
        for bad in [-1, i64::MAX / 2] {
            let mut s = Settings::for_difficulty(Difficulty::Easy);
            s.apply(&Overrides {
                increase_per_level: Some(bad),
                ..Overrides::default()
            })
            .unwrap();
            assert!(matches!(s.validate(), Err(ConfigError::BadIncrease(v)) if v == bad));
        }
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let file = Overrides {
            fall_speed: Some(5.0),
            max_blocks: Some(2),
            ..Overrides::default()
        };
        let cli = Overrides {
            fall_speed: Some(9.0),
            ..Overrides::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.fall_speed, Some(9.0));
        assert_eq!(merged.max_blocks, Some(2));
    }
}
