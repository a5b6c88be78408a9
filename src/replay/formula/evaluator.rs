// SPDX-License-Identifier: MIT

//! Formula evaluator
//!
//! Evaluation never fails: a malformed formula, an unknown function or an
//! unparseable date yields an empty string and a `warn` log line.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

use super::ast::{Expr, Literal};
use super::parser::parse;
use crate::runtime::error::FormulaError;

/// Flat field id -> value map a formula reads from
pub type FieldValues = HashMap<String, Value>;

const MAX_ROUND_DIGITS: f64 = 8.0;

/// Ulps of slack on the scaled value so decimal halves like `3.005` round up
const HALF_UP_ULPS: f64 = 4.0;

/// A compiled formula
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Parse a formula, keeping its source for diagnostics
    pub fn compile(source: &str) -> Result<Self, FormulaError> {
        Ok(Self {
            source: source.to_string(),
            expr: parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Field ids this formula reads
    pub fn references(&self) -> Vec<String> {
        let mut refs = Vec::new();
        self.expr.collect_references(&mut refs);
        refs
    }

    /// Evaluate against the current field values
    pub fn evaluate(&self, values: &FieldValues) -> String {
        let ctx = EvalContext {
            values,
            source: &self.source,
        };
        ctx.eval(&self.expr).to_display()
    }
}

/// Parse and evaluate in one go; a formula that does not parse yields ""
pub fn evaluate(expression: &str, values: &FieldValues) -> String {
    if expression.trim().is_empty() {
        return String::new();
    }
    match Formula::compile(expression) {
        Ok(formula) => formula.evaluate(values),
        Err(e) => {
            log::warn!("Failed to parse formula '{}': {}", expression, e);
            String::new()
        }
    }
}

/// Intermediate value while evaluating
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Text(String),
    Number(f64),
}

impl Operand {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Operand::Text(String::new()),
            Some(Value::Number(n)) => Operand::Number(n.as_f64().unwrap_or(0.0)),
            Some(Value::String(s)) => Operand::Text(s.clone()),
            Some(Value::Bool(b)) => Operand::Text(b.to_string()),
            Some(other) => Operand::Text(other.to_string()),
        }
    }

    fn to_display(&self) -> String {
        match self {
            Operand::Text(s) => s.clone(),
            Operand::Number(n) => format_number(*n),
        }
    }

    /// Numeric coercion; anything non-numeric is 0
    fn to_number(&self) -> f64 {
        let n = match self {
            Operand::Number(n) => *n,
            Operand::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    s.parse::<f64>().unwrap_or(0.0)
                }
            }
        };
        if n.is_finite() {
            n
        } else {
            0.0
        }
    }

    fn to_date(&self) -> Option<NaiveDate> {
        match self {
            Operand::Text(s) => parse_date(s),
            Operand::Number(_) => None,
        }
    }
}

struct EvalContext<'a> {
    values: &'a FieldValues,
    source: &'a str,
}

impl EvalContext<'_> {
    fn eval(&self, expr: &Expr) -> Operand {
        match expr {
            Expr::Field(id) => Operand::from_value(self.values.get(id)),
            Expr::Literal(Literal::String(s)) => Operand::Text(s.clone()),
            Expr::Literal(Literal::Number(n)) => Operand::Number(*n),
            Expr::Call { name, args } => {
                let args: Vec<Operand> = args.iter().map(|a| self.eval(a)).collect();
                self.call(name, &args)
            }
        }
    }

    fn call(&self, name: &str, args: &[Operand]) -> Operand {
        match name.to_ascii_lowercase().as_str() {
            "daysbetween" => self.days_between(args),
            "concat" => Operand::Text(args.iter().map(Operand::to_display).collect()),
            "sum" => Operand::Number(args.iter().map(Operand::to_number).sum()),
            "round" => {
                let n = args.first().map(Operand::to_number).unwrap_or(0.0);
                let digits = args.get(1).map(Operand::to_number).unwrap_or(0.0);
                Operand::Number(round_half_up(n, digits))
            }
            "tonumber" => Operand::Number(args.first().map(Operand::to_number).unwrap_or(0.0)),
            _ => {
                log::warn!("Unknown function '{}' in formula '{}'", name, self.source);
                Operand::Text(String::new())
            }
        }
    }

    /// Inclusive day count between two calendar dates
    fn days_between(&self, args: &[Operand]) -> Operand {
        let (Some(a), Some(b)) = (args.first(), args.get(1)) else {
            log::warn!("daysBetween needs two dates in formula '{}'", self.source);
            return Operand::Text(String::new());
        };

        match (a.to_date(), b.to_date()) {
            (Some(start), Some(end)) => {
                Operand::Number(((end - start).num_days() + 1) as f64)
            }
            _ => {
                // Blank inputs are the normal state of an unfilled form
                if !a.to_display().trim().is_empty() && !b.to_display().trim().is_empty() {
                    log::warn!(
                        "Invalid date for daysBetween({}, {}) in formula '{}'",
                        a.to_display(),
                        b.to_display(),
                        self.source
                    );
                }
                Operand::Text(String::new())
            }
        }
    }
}

/// Calendar date of a date or date-time string, taken in UTC
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }

    None
}

/// Scale, round half up, unscale. Digits are clamped to [0, 8].
fn round_half_up(n: f64, digits: f64) -> f64 {
    let digits = if digits.is_finite() {
        digits.trunc().clamp(0.0, MAX_ROUND_DIGITS)
    } else {
        0.0
    };
    let scale = 10f64.powi(digits as i32);
    let scaled = n * scale;
    let floor = scaled.floor();
    let tolerance = scaled.abs() * f64::EPSILON * HALF_UP_ULPS;
    let rounded = if scaled - floor + tolerance >= 0.5 {
        floor + 1.0
    } else {
        floor
    };
    let result = rounded / scale;
    // Avoid "-0"
    if result == 0.0 {
        0.0
    } else {
        result
    }
}

/// Display form of a number: integers without a fractional part
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == n.trunc() && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    format!("{}", n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(pairs: Vec<(&str, Value)>) -> FieldValues {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn eval(expr: &str) -> String {
        evaluate(expr, &FieldValues::new())
    }

    #[test]
    fn test_days_between_same_day_is_one() {
        assert_eq!(eval(r#"daysBetween("2024-01-01", "2024-01-01")"#), "1");
    }

    #[test]
    fn test_days_between_inclusive() {
        assert_eq!(eval(r#"daysBetween("2024-01-01", "2024-01-05")"#), "5");
    }

    #[test]
    fn test_days_between_fields_and_datetimes() {
        let v = values(vec![
            ("start", json!("2024-02-27T18:30:00Z")),
            ("end", json!("2024-03-01")),
        ]);
        // 2024 is a leap year: 27, 28, 29 Feb and 1 Mar
        assert_eq!(evaluate("daysBetween(start, end)", &v), "4");
    }

    #[test]
    fn test_days_between_reversed_is_negative() {
        assert_eq!(eval("daysBetween('2024-01-05', '2024-01-01')"), "-3");
    }

    #[test]
    fn test_days_between_invalid_date_is_empty() {
        assert_eq!(eval("daysBetween('2024-13-01', '2024-01-05')"), "");
        assert_eq!(eval("daysBetween('soon', '2024-01-05')"), "");
        assert_eq!(eval("daysBetween('2024-01-05')"), "");
        assert_eq!(eval("daysBetween(missing, other)"), "");
    }

    #[test]
    fn test_concat_coerces_numbers() {
        assert_eq!(eval(r#"concat("a", 3, "b")"#), "a3b");
        assert_eq!(eval("concat()"), "");
    }

    #[test]
    fn test_concat_fields() {
        let v = values(vec![
            ("first", json!("Ada")),
            ("last", json!("Lovelace")),
            ("age", json!(36)),
            ("active", json!(true)),
        ]);
        assert_eq!(
            evaluate("concat(first, ' ', last, ', ', age, ' ', active)", &v),
            "Ada Lovelace, 36 true"
        );
    }

    #[test]
    fn test_sum_coerces_non_numeric_to_zero() {
        let v = values(vec![("a", json!("4.5")), ("b", json!("abc")), ("c", json!(2))]);
        assert_eq!(evaluate("sum(a, b, c, missing, 1)", &v), "7.5");
        assert_eq!(eval("sum()"), "0");
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(eval("round(sum(1.005, 2), 2)"), "3.01");
        assert_eq!(eval("round(2.5)"), "3");
        assert_eq!(eval("round(3.5)"), "4");
        assert_eq!(eval("round(-2.5)"), "-2");
        assert_eq!(eval("round(1.2345, 3)"), "1.235");
        assert_eq!(eval("round(1.4)"), "1");
        assert_eq!(eval("round(0.285, 2)"), "0.29");
        assert_eq!(eval("round(1.2349999995, 3)"), "1.235");
    }

    #[test]
    fn test_round_just_below_half_rounds_down() {
        assert_eq!(eval("round(0.4999999995)"), "0");
        assert_eq!(eval("round(1.2344999999995, 3)"), "1.234");
        assert_eq!(eval("round(2.4999999)"), "2");
        assert_eq!(eval("round(-0.5000001)"), "-1");
    }

    #[test]
    fn test_round_clamps_digits() {
        assert_eq!(eval("round(1.23456789123, 20)"), "1.23456789");
        assert_eq!(eval("round(12.6, -3)"), "13");
        assert_eq!(eval("round(12.6, 'x')"), "13");
    }

    #[test]
    fn test_to_number() {
        assert_eq!(eval("toNumber('42')"), "42");
        assert_eq!(eval("toNumber(' 1.5 ')"), "1.5");
        assert_eq!(eval("toNumber('abc')"), "0");
        assert_eq!(eval("toNumber('')"), "0");
        assert_eq!(eval("toNumber()"), "0");
    }

    #[test]
    fn test_function_names_case_insensitive() {
        assert_eq!(eval("SUM(1, 2)"), "3");
        assert_eq!(eval("daysbetween('2024-01-01', '2024-01-02')"), "2");
    }

    #[test]
    fn test_unknown_function_is_empty() {
        assert_eq!(eval("avg(1, 2)"), "");
        assert_eq!(eval("concat('a', nope(1), 'b')"), "ab");
    }

    #[test]
    fn test_unknown_field_is_empty() {
        assert_eq!(eval("unknown_field"), "");
    }

    #[test]
    fn test_bare_identifier_display() {
        let v = values(vec![("n", json!(7.0)), ("s", json!("x")), ("z", json!(null))]);
        assert_eq!(evaluate("n", &v), "7");
        assert_eq!(evaluate("s", &v), "x");
        assert_eq!(evaluate("z", &v), "");
    }

    #[test]
    fn test_malformed_formula_is_empty() {
        assert_eq!(eval("sum(1, 2"), "");
        assert_eq!(eval("1 + 2"), "");
        assert_eq!(eval("   "), "");
    }

    #[test]
    fn test_formula_references() {
        let formula = Formula::compile("round(sum(price, tax, 3), digits)").unwrap();
        assert_eq!(formula.references(), vec!["price", "tax", "digits"]);
        assert_eq!(formula.source(), "round(sum(price, tax, 3), digits)");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(f64::NAN), "NaN");
    }
}
