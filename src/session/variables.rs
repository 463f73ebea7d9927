//! Variable store
//!
//! Variables must be created with DEF_VAR before anything can read or
//! assign them. Nothing creates a binding implicitly.

use std::collections::HashMap;

use crate::common::{Error, Result};

/// Prefix every variable name carries
pub const VAR_PREFIX: char = '$';

/// Check that a name carries the variable prefix
pub fn validate_name(name: &str) -> Result<()> {
    if name.starts_with(VAR_PREFIX) {
        Ok(())
    } else {
        Err(Error::InvalidVariableName(name.to_string()))
    }
}

/// Numeric variables keyed by their `$`-prefixed name
#[derive(Debug, Default, Clone)]
pub struct VariableStore {
    values: HashMap<String, f64>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite a binding
    pub fn define(&mut self, name: &str, initial: f64) -> Result<()> {
        validate_name(name)?;
        self.values.insert(name.to_string(), initial);
        Ok(())
    }

    /// Read a defined variable
    pub fn get(&self, name: &str) -> Result<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| Error::UndefinedVariable(name.to_string()))
    }

    /// Assign to a defined variable; never creates one
    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        validate_name(name)?;
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::UndefinedVariable(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_requires_prefix() {
        let mut vars = VariableStore::new();
        assert!(matches!(
            vars.define("limit", 1.0),
            Err(Error::InvalidVariableName(_))
        ));
        assert!(!vars.contains("limit"));
    }

    #[test]
    fn test_bare_prefix_is_a_name() {
        let mut vars = VariableStore::new();
        vars.define("$", 3.0).unwrap();
        assert_eq!(vars.get("$").unwrap(), 3.0);
    }

    #[test]
    fn test_redefine_overwrites() {
        let mut vars = VariableStore::new();
        vars.define("$x", 1.0).unwrap();
        vars.define("$x", 2.0).unwrap();
        assert_eq!(vars.get("$x").unwrap(), 2.0);
    }

    #[test]
    fn test_set_never_creates() {
        let mut vars = VariableStore::new();
        let err = vars.set("$x", 1.0).unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable(name) if name == "$x"));
        assert!(!vars.contains("$x"));

        vars.define("$x", 0.0).unwrap();
        vars.set("$x", 1.0).unwrap();
        assert_eq!(vars.get("$x").unwrap(), 1.0);
    }

    #[test]
    fn test_get_undefined() {
        let vars = VariableStore::new();
        assert!(matches!(vars.get("$nope"), Err(Error::UndefinedVariable(_))));
    }
}
