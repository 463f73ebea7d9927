//! Literal value resolution
//!
//! Script values are variable references, percentages, plain numbers, or
//! currents with an `mA`/`A` unit marker. Currents resolve to amperes and
//! percentages to fractions.
//!
//! Unit markers are matched as case-insensitive substrings, not suffixes,
//! and every occurrence is stripped before parsing. Existing scripts rely on
//! this, so `"2.5 A"` and `"a2.5"` are both 2.5 amperes.

use crate::common::{Error, Result};
use crate::session::variables::{VariableStore, VAR_PREFIX};

/// One resolution rule, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRule {
    /// `$name`, looked up in the variable store
    Variable,
    /// `5%`, yields 0.05
    Percent,
    /// `2560mA`, yields 2.56
    MilliAmps,
    /// `1.5A`, yields 1.5
    Amps,
    /// Anything else, parsed as a float
    Plain,
}

impl ValueRule {
    /// Rules in the order they are tried; the first match wins
    pub const PRECEDENCE: [ValueRule; 5] = [
        ValueRule::Variable,
        ValueRule::Percent,
        ValueRule::MilliAmps,
        ValueRule::Amps,
        ValueRule::Plain,
    ];

    /// Whether this rule claims the token
    fn matches(self, token: &str) -> bool {
        match self {
            ValueRule::Variable => token.starts_with(VAR_PREFIX),
            ValueRule::Percent => token.ends_with('%'),
            ValueRule::MilliAmps => token.to_lowercase().contains("ma"),
            ValueRule::Amps => token.to_lowercase().contains('a'),
            ValueRule::Plain => true,
        }
    }

    /// Pick the rule that applies to a token
    pub fn classify(token: &str) -> ValueRule {
        let token = token.trim();
        Self::PRECEDENCE
            .into_iter()
            .find(|rule| rule.matches(token))
            .unwrap_or(ValueRule::Plain)
    }
}

/// Resolve a value token to a number
pub fn resolve(token: &str, vars: &VariableStore) -> Result<f64> {
    let token = token.trim();
    match ValueRule::classify(token) {
        ValueRule::Variable => vars.get(token),
        ValueRule::Percent => parse_float(token, &token[..token.len() - 1]).map(|v| v / 100.0),
        ValueRule::MilliAmps => {
            parse_float(token, &token.to_lowercase().replace("ma", "")).map(|v| v / 1000.0)
        }
        ValueRule::Amps => parse_float(token, &token.to_lowercase().replace('a', "")),
        ValueRule::Plain => parse_float(token, token),
    }
}

fn parse_float(token: &str, number: &str) -> Result<f64> {
    number
        .trim()
        .parse::<f64>()
        .map_err(|e| Error::invalid_value(token, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_classify_precedence() {
        assert_eq!(ValueRule::classify("$limit"), ValueRule::Variable);
        assert_eq!(ValueRule::classify("5%"), ValueRule::Percent);
        assert_eq!(ValueRule::classify("2560mA"), ValueRule::MilliAmps);
        assert_eq!(ValueRule::classify("2560MA"), ValueRule::MilliAmps);
        assert_eq!(ValueRule::classify("1.5A"), ValueRule::Amps);
        assert_eq!(ValueRule::classify("12.0"), ValueRule::Plain);
        // A variable name that contains unit letters is still a variable
        assert_eq!(ValueRule::classify("$max_a"), ValueRule::Variable);
        // Percent wins over the current marker
        assert_eq!(ValueRule::classify("a5%"), ValueRule::Percent);
    }

    #[test]
    fn test_units() {
        let vars = VariableStore::new();
        assert!(approx(resolve("2560mA", &vars).unwrap(), 2.56));
        assert!(approx(resolve("5%", &vars).unwrap(), 0.05));
        assert!(approx(resolve("1.5A", &vars).unwrap(), 1.5));
        assert!(approx(resolve("1.5a", &vars).unwrap(), 1.5));
        assert!(approx(resolve("-3.25", &vars).unwrap(), -3.25));
        assert!(approx(resolve(" 10 ", &vars).unwrap(), 10.0));
    }

    #[test]
    fn test_unit_marker_is_substring_match() {
        let vars = VariableStore::new();
        assert!(approx(resolve("a2.5", &vars).unwrap(), 2.5));
        assert!(approx(resolve("ma100", &vars).unwrap(), 0.1));
    }

    #[test]
    fn test_variables() {
        let mut vars = VariableStore::new();
        vars.define("$i", 0.42).unwrap();
        assert!(approx(resolve("$i", &vars).unwrap(), 0.42));

        let err = resolve("$missing", &vars).unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable(name) if name == "$missing"));
    }

    #[test]
    fn test_invalid_values() {
        let vars = VariableStore::new();
        for token in ["abc%", "twelve", "", "1.2.3mA"] {
            let err = resolve(token, &vars).unwrap_err();
            assert!(
                matches!(err, Error::InvalidValue { .. }),
                "{token:?} should be rejected, got {err:?}"
            );
        }
    }
}
