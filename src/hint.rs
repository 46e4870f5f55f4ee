//! Hints: simplified equivalent expressions for problems that are genuinely hard to do in your head.
//!
//! Every generator returns `None` for inputs that are already easy; a missing hint is not an error.

use crate::problem::Operator;
use rand::Rng;
use rand::seq::IndexedRandom;

pub const MIN_HINT_DURATION_MS: f32 = 1500.0;
pub const MAX_HINT_DURATION_MS: f32 = 4000.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub simplified_expression: String,
    pub explanation: String,
}

impl Hint {
    fn new(simplified_expression: String, explanation: String) -> Self {
        Self {
            simplified_expression,
            explanation,
        }
    }
}

/// Split a two-operand expression on the first operator (in `+ - × ÷` order) it contains.
pub fn parse_expression(expression: &str) -> Option<(i64, Operator, i64)> {
    const SYMBOLS: [char; 7] = ['+', '-', '×', '*', '÷', '/', 'x'];
    let (at, op) = SYMBOLS.iter().find_map(|&c| {
        let at = expression.find(c)?;
        Some((at, Operator::from_symbol(c)?))
    })?;
    let symbol_len = expression[at..].chars().next()?.len_utf8();
    let left = expression[..at].trim().parse().ok()?;
    let right = expression[at + symbol_len..].trim().parse().ok()?;
    Some((left, op, right))
}

/// Simplified form of `expression`, or `None` when no rule applies.
/// `rng` breaks ties between several valid rewrites.
pub fn generate_hint<R: Rng + ?Sized>(expression: &str, rng: &mut R) -> Option<Hint> {
    let (a, op, b) = parse_expression(expression)?;
    if a < 0 || b < 0 {
        return None;
    }
    let options = match op {
        Operator::Add => addition_hints(a, b),
        Operator::Subtract => subtraction_hints(a, b),
        Operator::Multiply => multiplication_hints(a, b),
        Operator::Divide => division_hints(a, b),
    };
    let original = normalize(expression);
    let options: Vec<Hint> = options
        .into_iter()
        .filter(|h| normalize(&h.simplified_expression) != original)
        .collect();
    options.choose(rng).cloned()
}

fn normalize(expression: &str) -> String {
    expression.chars().filter(|c| !c.is_whitespace()).collect()
}

fn addition_hints(a: i64, b: i64) -> Vec<Hint> {
    if a < 10 && b < 10 {
        // Make ten: 8 + 5 → 10 + 3.
        if a + b <= 10 {
            return Vec::new();
        }
        let (big, small) = if a >= b { (a, b) } else { (b, a) };
        let need = 10 - big;
        let rest = small - need;
        return vec![Hint::new(
            format!("10 + {}", rest),
            format!("Split {} into {} + {}; {} + {} = 10", small, need, rest, big, need),
        )];
    }
    if a + b < 20 || (a % 10 == 0 && b % 10 == 0) {
        return Vec::new();
    }
    let mut hints = Vec::new();
    for (n, m, n_first) in [(a, b, true), (b, a, false)] {
        let units = n % 10;
        if n < 10 || units == 0 {
            continue;
        }
        let pair = |x: i64, y: i64| {
            if n_first {
                format!("{} + {}", x, y)
            } else {
                format!("{} + {}", y, x)
            }
        };
        if units >= 5 {
            let k = 10 - units;
            if m > k {
                hints.push(Hint::new(
                    pair(n + k, m - k),
                    format!("Move {} from {} to {}: {} + {} = {}", k, m, n, n, k, n + k),
                ));
            }
        } else {
            hints.push(Hint::new(
                pair(n - units, m + units),
                format!("Move {} from {} to {}: {} - {} = {}", units, n, m, n, units, n - units),
            ));
        }
    }
    hints
}

fn subtraction_hints(a: i64, b: i64) -> Vec<Hint> {
    if b == 0 || a <= b || a < 20 || b % 10 == 0 {
        return Vec::new();
    }
    let units = b % 10;
    let up = 10 - units;
    let mut hints = vec![Hint::new(
        format!("{} - {}", a + up, b + up),
        format!("Add {} to both; the difference stays the same", up),
    )];
    if b - units > 0 {
        hints.push(Hint::new(
            format!("{} - {}", a - units, b - units),
            format!("Take {} from both; the difference stays the same", units),
        ));
    }
    hints
}

fn multiplication_hints(a: i64, b: i64) -> Vec<Hint> {
    if a <= 1 || b <= 1 || (a < 10 && b < 10) {
        return Vec::new();
    }
    for (n, m) in [(a, b), (b, a)] {
        if !(10..100).contains(&n) || n % 10 == 0 {
            continue;
        }
        let (tens, ones) = (n - n % 10, n % 10);
        let mut hints = vec![Hint::new(
            format!("{} × {} + {} × {}", tens, m, ones, m),
            format!("{} = {} + {}", n, tens, ones),
        )];
        if ones >= 7 {
            let k = 10 - ones;
            hints.push(Hint::new(
                format!("{} × {} - {} × {}", n + k, m, k, m),
                format!("{} = {} - {}", n, n + k, k),
            ));
        }
        return hints;
    }
    Vec::new()
}

fn division_hints(a: i64, b: i64) -> Vec<Hint> {
    if b <= 1 || a % b != 0 {
        return Vec::new();
    }
    let quotient = a / b;
    let times_table = || {
        Hint::new(
            format!("{} × ? = {}", b, a),
            format!("Which number times {} makes {}?", b, a),
        )
    };
    if b <= 10 && quotient <= 9 {
        return vec![times_table()];
    }
    let factors: Vec<Hint> = (2..=10)
        .filter(|f| b % f == 0 && (2..=10).contains(&(b / f)) && *f <= b / f)
        .map(|f| {
            Hint::new(
                format!("{} ÷ {} ÷ {}", a, f, b / f),
                format!("{} = {} × {}: divide by {}, then by {}", b, f, b / f, f, b / f),
            )
        })
        .collect();
    if !factors.is_empty() {
        return factors;
    }
    if quotient <= 10 {
        return vec![times_table()];
    }
    Vec::new()
}

fn digits(n: i64) -> u32 {
    n.unsigned_abs().checked_ilog10().map_or(1, |d| d + 1)
}

/// Ranking score for hint priority: bigger numbers, harder operators and more digits score higher.
pub fn calculate_complexity(expression: &str) -> f64 {
    let Some((a, op, b)) = parse_expression(expression) else {
        return 0.0;
    };
    let magnitude = (a.abs() + b.abs()) as f64 / 20.0;
    let operator_weight = match op {
        Operator::Add => 1.0,
        Operator::Subtract => 2.0,
        Operator::Multiply | Operator::Divide => 4.0,
    };
    magnitude + operator_weight * 5.0 + f64::from(digits(a) + digits(b)) * 3.0
}

/// How long a hint stays on screen, in milliseconds.
pub fn calculate_hint_duration(expression: &str) -> f32 {
    let complexity = calculate_complexity(expression) as f32;
    (500.0 + complexity * 50.0).clamp(MIN_HINT_DURATION_MS, MAX_HINT_DURATION_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn hint(expr: &str) -> Option<Hint> {
        generate_hint(expr, &mut Pcg32::seed_from_u64(0))
    }

    fn all_hints(expr: &str) -> Vec<String> {
        (0..32)
            .filter_map(|seed| generate_hint(expr, &mut Pcg32::seed_from_u64(seed)))
            .map(|h| h.simplified_expression)
            .collect()
    }

    #[test]
    fn parses_display_and_ascii_operators() {
        assert_eq!(parse_expression("12 × 7"), Some((12, Operator::Multiply, 7)));
        assert_eq!(parse_expression("48 ÷ 6"), Some((48, Operator::Divide, 6)));
        assert_eq!(parse_expression("3+4"), Some((3, Operator::Add, 4)));
        assert_eq!(parse_expression("9 - 2"), Some((9, Operator::Subtract, 2)));
        assert_eq!(parse_expression("hello"), None);
        assert_eq!(parse_expression("1 + 2 + 3"), None);
    }

    #[test]
    fn unparseable_expression_has_no_hint() {
        assert!(hint("twelve plus one").is_none());
        assert!(hint("").is_none());
    }

    #[test]
    fn make_ten_for_single_digits() {
        let h = hint("8 + 5").unwrap();
        assert_eq!(h.simplified_expression, "10 + 3");
    }

    #[test]
    fn easy_additions_are_skipped() {
        assert!(hint("3 + 4").is_none());
        assert!(hint("12 + 5").is_none());
        assert!(hint("30 + 40").is_none());
    }

    #[test]
    fn addition_rounds_one_operand_to_ten() {
        let hints = all_hints("38 + 25");
        assert!(!hints.is_empty());
        assert!(hints.contains(&"40 + 23".to_string()));
        for h in hints {
            let (a, _, b) = parse_expression(&h).unwrap();
            assert_eq!(a + b, 63);
            assert!(a % 10 == 0 || b % 10 == 0);
        }
    }

    #[test]
    fn subtraction_preserves_difference() {
        let hints = all_hints("53 - 27");
        assert!(hints.contains(&"56 - 30".to_string()));
        for h in hints {
            let (a, _, b) = parse_expression(&h).unwrap();
            assert_eq!(a - b, 26);
            assert_eq!(b % 10, 0);
        }
        assert!(hint("50 - 20").is_none());
        assert!(hint("9 - 4").is_none());
    }

    #[test]
    fn multiplication_decomposes_either_operand() {
        let h = hint("7 × 23").unwrap();
        assert!(h.simplified_expression.starts_with("20 × 7"));
        let hints = all_hints("19 × 6");
        assert!(hints.contains(&"10 × 6 + 9 × 6".to_string()));
        assert!(hints.contains(&"20 × 6 - 1 × 6".to_string()));
        assert!(hint("6 × 7").is_none());
    }

    #[test]
    fn division_hints() {
        assert_eq!(hint("56 ÷ 8").unwrap().simplified_expression, "8 × ? = 56");
        assert_eq!(hint("252 ÷ 12").unwrap().simplified_expression.split(" ÷ ").count(), 3);
        assert!(hint("50 ÷ 7").is_none());
        assert!(hint("9 ÷ 1").is_none());
    }

    #[test]
    fn complexity_ranks_harder_problems_higher() {
        assert!(calculate_complexity("47 × 38") > calculate_complexity("4 + 3"));
        assert!(calculate_complexity("63 - 27") > calculate_complexity("63 + 27"));
        assert_eq!(calculate_complexity("nonsense"), 0.0);
    }

    #[test]
    fn duration_is_clamped() {
        assert_eq!(calculate_hint_duration("1 + 1"), MIN_HINT_DURATION_MS);
        assert_eq!(calculate_hint_duration("999 × 999"), MAX_HINT_DURATION_MS);
        let mid = calculate_hint_duration("38 + 25");
        assert!((MIN_HINT_DURATION_MS..=MAX_HINT_DURATION_MS).contains(&mid));
    }
}
