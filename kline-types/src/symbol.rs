use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KlineError;

const MAX_SYMBOL_LEN: usize = 32;

/// Normalized trading symbol, e.g. `BTCUSDT`.
///
/// Symbols are upper-cased on construction and restricted to ASCII
/// alphanumerics plus `-`, `_` and `.`, so they are safe to use as file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Validate and normalize a symbol.
    ///
    /// # Errors
    /// Returns `KlineError::InvalidArg` when the input is empty, too long, or
    /// contains characters outside the allowed set.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, KlineError> {
        let s = raw.as_ref().trim();
        if s.is_empty() {
            return Err(KlineError::InvalidArg("empty symbol".into()));
        }
        if s.len() > MAX_SYMBOL_LEN {
            return Err(KlineError::InvalidArg(format!(
                "symbol '{s}' exceeds {MAX_SYMBOL_LEN} characters"
            )));
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(KlineError::InvalidArg(format!(
                "symbol '{s}' contains invalid character '{bad}'"
            )));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    /// Borrow the normalized symbol text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = KlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = KlineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = KlineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
