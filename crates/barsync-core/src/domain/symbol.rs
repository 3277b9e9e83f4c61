use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_TICKER_LEN: usize = 15;

/// Upper-cased ticker as accepted by the aggregates endpoint (`AAPL`, `BRK.B`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Trim, upper-case and validate a ticker.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let ticker = input.trim().to_ascii_uppercase();

        let mut chars = ticker.chars();
        let Some(first) = chars.next() else {
            return Err(ValidationError::EmptySymbol);
        };
        if !first.is_ascii_alphabetic() {
            return Err(ValidationError::SymbolInvalidStart { ch: first });
        }

        let len = ticker.chars().count();
        if len > MAX_TICKER_LEN {
            return Err(ValidationError::SymbolTooLong {
                len,
                max: MAX_TICKER_LEN,
            });
        }

        if let Some((index, ch)) = ticker
            .chars()
            .enumerate()
            .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || *ch == '.' || *ch == '-'))
        {
            return Err(ValidationError::SymbolInvalidChar { ch, index });
        }

        Ok(Self(ticker))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_input_is_normalized() {
        let symbol = Symbol::parse("  msft ").expect("symbol should parse");
        assert_eq!(symbol.as_str(), "MSFT");
    }

    #[test]
    fn share_class_suffixes_are_accepted() {
        assert_eq!(Symbol::parse("brk.b").expect("parse").as_str(), "BRK.B");
        assert_eq!(Symbol::parse("BF-B").expect("parse").as_str(), "BF-B");
    }

    #[test]
    fn blank_input_is_empty() {
        assert_eq!(Symbol::parse("   "), Err(ValidationError::EmptySymbol));
    }

    #[test]
    fn leading_digit_is_rejected() {
        let err = Symbol::parse("3M").expect_err("must fail");
        assert_eq!(err, ValidationError::SymbolInvalidStart { ch: '3' });
    }

    #[test]
    fn path_characters_are_rejected() {
        let err = Symbol::parse("AAPL/../X").expect_err("must fail");
        assert_eq!(err, ValidationError::SymbolInvalidChar { ch: '/', index: 4 });
    }

    #[test]
    fn overlong_ticker_is_rejected() {
        let err = Symbol::parse("ABCDEFGHIJKLMNOP").expect_err("must fail");
        assert_eq!(err, ValidationError::SymbolTooLong { len: 16, max: 15 });
    }
}
