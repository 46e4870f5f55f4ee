//! Arithmetic problems: operators, number ranges, level scaling and training rules.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Level scaling never pushes the upper bound past this.
pub const MAX_RANGE: i64 = 999;

/// Largest answer the player can type.
pub const MAX_ANSWER: i64 = 9999;

/// Rejection-sampling cap for carry/borrow forcing before falling back to an unforced draw.
const FORCE_ATTEMPTS: u32 = 10_000;

/// Upper bound for multiplication operands outside training modes.
const MULTIPLY_CAP: i64 = 50;

/// Upper bound for divisor and quotient.
const DIVIDE_CAP: i64 = 50;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no operators enabled")]
    NoOperators,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    pub const ALL: [Self; 4] = [Self::Add, Self::Subtract, Self::Multiply, Self::Divide];

    /// Symbol used in display expressions.
    pub fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '×',
            Self::Divide => '÷',
        }
    }

    /// Accepts the display symbols plus the ASCII spellings `*`, `x` and `/`.
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Add),
            '-' => Some(Self::Subtract),
            '×' | '*' | 'x' => Some(Self::Multiply),
            '÷' | '/' => Some(Self::Divide),
            _ => None,
        }
    }
}

/// Which operators a session may draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperatorSet {
    pub add: bool,
    pub subtract: bool,
    pub multiply: bool,
    pub divide: bool,
}

impl OperatorSet {
    pub fn only(op: Operator) -> Self {
        let mut set = Self::default();
        set.insert(op);
        set
    }

    pub fn of(ops: &[Operator]) -> Self {
        let mut set = Self::default();
        for &op in ops {
            set.insert(op);
        }
        set
    }

    pub fn insert(&mut self, op: Operator) {
        match op {
            Operator::Add => self.add = true,
            Operator::Subtract => self.subtract = true,
            Operator::Multiply => self.multiply = true,
            Operator::Divide => self.divide = true,
        }
    }

    pub fn contains(&self, op: Operator) -> bool {
        match op {
            Operator::Add => self.add,
            Operator::Subtract => self.subtract,
            Operator::Multiply => self.multiply,
            Operator::Divide => self.divide,
        }
    }

    pub fn enabled(&self) -> Vec<Operator> {
        Operator::ALL
            .into_iter()
            .filter(|&op| self.contains(op))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        !(self.add || self.subtract || self.multiply || self.divide)
    }

    /// Parse a string such as `"+-*/"`. Whitespace is ignored; returns the first unknown char on failure.
    pub fn parse(s: &str) -> Result<Self, char> {
        let mut set = Self::default();
        for c in s.chars().filter(|c| !c.is_whitespace()) {
            set.insert(Operator::from_symbol(c).ok_or(c)?);
        }
        Ok(set)
    }
}

/// Inclusive operand range. Always ordered and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberRange {
    pub min: i64,
    pub max: i64,
}

impl NumberRange {
    pub fn new(a: i64, b: i64) -> Self {
        let (a, b) = (a.max(0), b.max(0));
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> i64 {
        rng.random_range(self.min..=self.max)
    }
}

/// Everything the generator needs to know about a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemConfig {
    pub operators: OperatorSet,
    pub range: NumberRange,
    /// Training sessions use the range as-is at every level.
    pub training: bool,
    /// Additions must carry out of the units digit.
    pub force_carry: bool,
    /// Subtractions must borrow into the units digit.
    pub force_borrow: bool,
    /// Multiplication operands forced into 10..=19.
    pub omiyage: bool,
    /// Added to the range's upper bound every two levels.
    pub increase_per_level: i64,
}

impl ProblemConfig {
    /// Upper bound on any answer this config can produce, at any level.
    pub fn largest_answer(&self) -> i64 {
        let top = if self.training {
            self.range.max
        } else {
            self.range.max.max(MAX_RANGE)
        };
        let range = NumberRange::new(self.range.min, top);
        self.operators
            .enabled()
            .into_iter()
            .map(|op| match op {
                Operator::Add => top.saturating_mul(2),
                Operator::Subtract => top,
                Operator::Multiply => {
                    let m = multiply_range(range, self).max;
                    m.saturating_mul(m)
                }
                Operator::Divide => top.min(DIVIDE_CAP).max(range.min.max(1)),
            })
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub operand1: i64,
    pub operand2: i64,
    pub operator: Operator,
    pub answer: i64,
    pub expression: String,
}

impl Problem {
    pub fn new(operand1: i64, operand2: i64, operator: Operator, answer: i64) -> Self {
        Self {
            operand1,
            operand2,
            operator,
            answer,
            expression: format!("{} {} {}", operand1, operator.symbol(), operand2),
        }
    }
}

/// True if adding the units digits carries.
pub fn has_carry(a: i64, b: i64) -> bool {
    a % 10 + b % 10 >= 10
}

/// True if `a - b` needs a borrow into the units digit.
pub fn has_borrow(a: i64, b: i64) -> bool {
    a % 10 < b % 10
}

/// Range after level scaling. Training sessions are never scaled.
pub fn scaled_range(level: u32, config: &ProblemConfig) -> NumberRange {
    if config.training {
        return config.range;
    }
    let steps = i64::from(level.saturating_sub(1) / 2);
    let max = config
        .range
        .max
        .saturating_add(steps.saturating_mul(config.increase_per_level.max(0)))
        .min(MAX_RANGE);
    NumberRange::new(config.range.min, max.max(config.range.min))
}

/// Generate one problem for `level`, choosing uniformly among the enabled operators.
pub fn generate_problem<R: Rng + ?Sized>(
    level: u32,
    config: &ProblemConfig,
    rng: &mut R,
) -> Result<Problem, ConfigurationError> {
    let operators = config.operators.enabled();
    let &operator = operators
        .choose(rng)
        .ok_or(ConfigurationError::NoOperators)?;
    let range = scaled_range(level, config);
    let problem = match operator {
        Operator::Add => addition(range, config.force_carry, rng),
        Operator::Subtract => subtraction(range, config.force_borrow, rng),
        Operator::Multiply => multiplication(range, config, rng),
        Operator::Divide => division(range, rng),
    };
    Ok(problem)
}

fn addition<R: Rng + ?Sized>(range: NumberRange, force_carry: bool, rng: &mut R) -> Problem {
    if force_carry {
        for _ in 0..FORCE_ATTEMPTS {
            let (a, b) = (range.sample(rng), range.sample(rng));
            if has_carry(a, b) {
                return Problem::new(a, b, Operator::Add, a + b);
            }
        }
        log::warn!(
            "no carrying addition found in {}..={} after {} attempts; using unforced draw",
            range.min,
            range.max,
            FORCE_ATTEMPTS
        );
    }
    let (a, b) = (range.sample(rng), range.sample(rng));
    Problem::new(a, b, Operator::Add, a + b)
}

fn subtraction<R: Rng + ?Sized>(range: NumberRange, force_borrow: bool, rng: &mut R) -> Problem {
    let draw = |rng: &mut R| {
        let a = range.sample(rng);
        let b = rng.random_range(range.min..=a);
        (a, b)
    };
    if force_borrow {
        for _ in 0..FORCE_ATTEMPTS {
            let (a, b) = draw(&mut *rng);
            if has_borrow(a, b) && a - b > 0 {
                return Problem::new(a, b, Operator::Subtract, a - b);
            }
        }
        log::warn!(
            "no borrowing subtraction found in {}..={} after {} attempts; using unforced draw",
            range.min,
            range.max,
            FORCE_ATTEMPTS
        );
    }
    let (a, b) = draw(&mut *rng);
    Problem::new(a, b, Operator::Subtract, a - b)
}

/// Operand range for multiplication: omiyage pairs, the training range as-is, or a capped range.
fn multiply_range(range: NumberRange, config: &ProblemConfig) -> NumberRange {
    if config.omiyage {
        NumberRange::new(10, 19)
    } else if config.training {
        range
    } else {
        let cap = (range.max / 2).min(MULTIPLY_CAP).max(range.min);
        NumberRange::new(range.min, cap)
    }
}

fn multiplication<R: Rng + ?Sized>(
    range: NumberRange,
    config: &ProblemConfig,
    rng: &mut R,
) -> Problem {
    let range = multiply_range(range, config);
    let (a, b) = (range.sample(rng), range.sample(rng));
    Problem::new(a, b, Operator::Multiply, a * b)
}

fn division<R: Rng + ?Sized>(range: NumberRange, rng: &mut R) -> Problem {
    let low = range.min.max(1);
    let high = range.max.min(DIVIDE_CAP).max(low);
    let divisor = rng.random_range(low..=high);
    let answer = rng.random_range(range.min.min(high)..=high);
    Problem::new(divisor * answer, divisor, Operator::Divide, answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn config(ops: &[Operator], min: i64, max: i64) -> ProblemConfig {
        ProblemConfig {
            operators: OperatorSet::of(ops),
            range: NumberRange::new(min, max),
            training: false,
            force_carry: false,
            force_borrow: false,
            omiyage: false,
            increase_per_level: 5,
        }
    }

    #[test]
    fn empty_operator_set_is_a_configuration_error() {
        let mut rng = Pcg32::seed_from_u64(1);
        let cfg = config(&[], 1, 10);
        assert_eq!(
            generate_problem(1, &cfg, &mut rng),
            Err(ConfigurationError::NoOperators)
        );
    }

    #[test]
    fn level_one_addition_round_trip() {
        let mut rng = Pcg32::seed_from_u64(7);
        let cfg = config(&[Operator::Add], 1, 10);
        for _ in 0..200 {
            let p = generate_problem(1, &cfg, &mut rng).unwrap();
            assert!((1..=10).contains(&p.operand1));
            assert!((1..=10).contains(&p.operand2));
            assert_eq!(p.answer, p.operand1 + p.operand2);
            assert_eq!(p.expression, format!("{} + {}", p.operand1, p.operand2));
        }
    }

    #[test]
    fn range_scales_every_two_levels_and_caps() {
        let cfg = config(&[Operator::Add], 1, 10);
        assert_eq!(scaled_range(1, &cfg).max, 10);
        assert_eq!(scaled_range(2, &cfg).max, 10);
        assert_eq!(scaled_range(3, &cfg).max, 15);
        assert_eq!(scaled_range(6, &cfg).max, 20);
        assert_eq!(scaled_range(10_000, &cfg).max, MAX_RANGE);
    }

    #[test]
    fn training_range_is_never_scaled() {
        let mut cfg = config(&[Operator::Add], 1, 10);
        cfg.training = true;
        assert_eq!(scaled_range(40, &cfg), NumberRange::new(1, 10));
    }

    #[test]
    fn huge_level_increase_saturates_at_the_cap() {
        let mut cfg = config(&[Operator::Add], 1, 10);
        cfg.increase_per_level = i64::MAX / 2;
        assert_eq!(scaled_range(7, &cfg).max, MAX_RANGE);
        let mut rng = Pcg32::seed_from_u64(2);
        let p = generate_problem(7, &cfg, &mut rng).unwrap();
        assert!(p.answer <= 2 * MAX_RANGE);
    }

    #[test]
    fn largest_answer_bounds_each_operator() {
        let mut cfg = config(&[Operator::Add, Operator::Subtract], 1, 10);
        assert_eq!(cfg.largest_answer(), 2 * MAX_RANGE);
        cfg.training = true;
        assert_eq!(cfg.largest_answer(), 20);
        cfg.operators = OperatorSet::only(Operator::Multiply);
        cfg.range = NumberRange::new(1, 200);
        assert_eq!(cfg.largest_answer(), 40_000);
        cfg.omiyage = true;
        assert_eq!(cfg.largest_answer(), 19 * 19);
        let cfg = config(&[Operator::Multiply, Operator::Divide], 1, 10);
        assert_eq!(cfg.largest_answer(), MULTIPLY_CAP * MULTIPLY_CAP);
    }

    #[test]
    fn omiyage_operands_are_in_the_teens() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut cfg = config(&[Operator::Multiply], 1, 9);
        cfg.omiyage = true;
        for _ in 0..200 {
            let p = generate_problem(5, &cfg, &mut rng).unwrap();
            assert!((10..=19).contains(&p.operand1));
            assert!((10..=19).contains(&p.operand2));
            assert_eq!(p.expression, format!("{} × {}", p.operand1, p.operand2));
        }
    }

    #[test]
    fn normal_multiplication_range_is_halved() {
        let mut rng = Pcg32::seed_from_u64(11);
        let cfg = config(&[Operator::Multiply], 2, 40);
        for _ in 0..200 {
            let p = generate_problem(1, &cfg, &mut rng).unwrap();
            assert!(p.operand1 <= 20 && p.operand2 <= 20);
        }
    }

    #[test]
    fn impossible_carry_falls_back_instead_of_looping() {
        let mut rng = Pcg32::seed_from_u64(5);
        let mut cfg = config(&[Operator::Add], 1, 2);
        cfg.force_carry = true;
        cfg.training = true;
        let p = generate_problem(1, &cfg, &mut rng).unwrap();
        assert_eq!(p.answer, p.operand1 + p.operand2);
    }

    #[test]
    fn operator_set_parses_ascii_and_display_symbols() {
        let set = OperatorSet::parse("+ × /").unwrap();
        assert!(set.add && set.multiply && set.divide && !set.subtract);
        assert_eq!(OperatorSet::parse("+%"), Err('%'));
        assert!(OperatorSet::parse("").unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn division_is_exact(seed in any::<u64>(), level in 1u32..30, min in 0i64..20, span in 0i64..100) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let cfg = config(&[Operator::Divide], min, min + span);
            let p = generate_problem(level, &cfg, &mut rng).unwrap();
            prop_assert!(p.operand2 > 0);
            prop_assert_eq!(p.operand1 % p.operand2, 0);
            prop_assert_eq!(p.operand1 / p.operand2, p.answer);
        }

        #[test]
        fn subtraction_is_non_negative(seed in any::<u64>(), level in 1u32..30, min in 0i64..50, span in 0i64..200) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let cfg = config(&[Operator::Subtract], min, min + span);
            let p = generate_problem(level, &cfg, &mut rng).unwrap();
            prop_assert!(p.answer >= 0);
            prop_assert!(p.operand1 >= p.operand2);
        }

        #[test]
        fn forced_addition_carries(seed in any::<u64>(), level in 1u32..10) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut cfg = config(&[Operator::Add], 10, 99);
            cfg.force_carry = true;
            let p = generate_problem(level, &cfg, &mut rng).unwrap();
            prop_assert!(has_carry(p.operand1, p.operand2));
        }

        #[test]
        fn forced_subtraction_borrows(seed in any::<u64>(), level in 1u32..10) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut cfg = config(&[Operator::Subtract], 10, 99);
            cfg.force_borrow = true;
            let p = generate_problem(level, &cfg, &mut rng).unwrap();
            prop_assert!(has_borrow(p.operand1, p.operand2));
            prop_assert!(p.answer > 0);
        }
    }
}
