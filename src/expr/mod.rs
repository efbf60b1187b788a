pub mod num;

pub use self::num::{FormatSpecifier, InvalidNumberFormatError, NumberFormat};

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// A value bound in the variable environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Num { value: i64, format: NumberFormat },
}

impl Value {
    /// Render this value as the text it would be substituted with.
    ///
    /// Numeric values are re-rendered in the format they were captured with.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Num { value, format } => Cow::Owned(format.render(*value)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Returns true if `name` (without any `$` prefix) is a well-formed
/// variable name.
pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns true if `name` lives in the global namespace, i.e. survives
/// label-scoped environments.
#[inline]
pub fn is_global_name(name: &str) -> bool {
    name.starts_with('$')
}

/// A variable defined on the command line with `-D NAME=VALUE`.
#[derive(Debug, Clone)]
pub struct CliVariable {
    pub name: String,
    pub value: Value,
}

impl FromStr for CliVariable {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (name, value) = input.split_once('=').ok_or_else(|| {
            format!("invalid variable definition '{input}': expected 'NAME=VALUE'")
        })?;
        if name.is_empty() {
            return Err(format!(
                "invalid variable definition '{input}': name cannot be empty"
            ));
        }
        let unprefixed = name.strip_prefix('$').unwrap_or(name);
        if !is_valid_variable_name(unprefixed) {
            return Err(format!(
                "invalid variable name '{name}': must match `$?[A-Za-z_][A-Za-z0-9_]*`"
            ));
        }
        Ok(Self {
            name: name.to_string(),
            value: Value::Text(value.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn cli_variable_parsing() {
        let var = "NAME=a value".parse::<CliVariable>().unwrap();
        assert_eq!(var.name, "NAME");
        assert_eq!(var.value, Value::Text("a value".to_string()));

        let var = "$GLOBAL=x".parse::<CliVariable>().unwrap();
        assert_eq!(var.name, "$GLOBAL");

        assert!("NAME".parse::<CliVariable>().is_err());
        assert!("=value".parse::<CliVariable>().is_err());
        assert!("1BAD=value".parse::<CliVariable>().is_err());
    }

    #[test]
    fn variable_name_validity() {
        assert!(is_valid_variable_name("FOO"));
        assert!(is_valid_variable_name("_f00"));
        assert!(!is_valid_variable_name(""));
        assert!(!is_valid_variable_name("9lives"));
        assert!(!is_valid_variable_name("a-b"));
    }
}
