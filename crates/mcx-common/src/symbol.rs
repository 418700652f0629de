//! Binary symbols and percept parsing.
//!
//! Everything the agent sends or receives is a sequence of binary symbols.
//! The environment delivers percepts as ASCII lines of `'0'`/`'1'`; a
//! malformed line is a [`SymbolError`] and fatal for the session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the environment -> agent channel.
#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("bad percept: expected {expected} symbols, got {actual}")]
    BadPerceptLength { expected: usize, actual: usize },

    #[error("bad percept: invalid character {found:?} at position {position}")]
    BadPerceptChar { found: char, position: usize },
}

/// A single binary symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbol {
    Off,
    On,
}

/// A block of symbols, e.g. a whole percept or an encoded action.
pub type SymbolList = Vec<Symbol>;

impl Symbol {
    /// The other symbol.
    pub fn flip(self) -> Symbol {
        match self {
            Symbol::Off => Symbol::On,
            Symbol::On => Symbol::Off,
        }
    }

    pub fn from_bit(bit: bool) -> Symbol {
        if bit {
            Symbol::On
        } else {
            Symbol::Off
        }
    }

    pub fn is_on(self) -> bool {
        self == Symbol::On
    }

    /// Index into per-symbol arrays (`Off` = 0, `On` = 1).
    pub fn index(self) -> usize {
        match self {
            Symbol::Off => 0,
            Symbol::On => 1,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Symbol::Off => '0',
            Symbol::On => '1',
        }
    }
}

/// Parse a percept line of exactly `expected` ASCII `'0'`/`'1'` characters.
pub fn percept_to_symbols(line: &str, expected: usize) -> Result<SymbolList, SymbolError> {
    if line.len() != expected {
        return Err(SymbolError::BadPerceptLength {
            expected,
            actual: line.len(),
        });
    }

    line.chars()
        .enumerate()
        .map(|(position, c)| match c {
            '0' => Ok(Symbol::Off),
            '1' => Ok(Symbol::On),
            _ => Err(SymbolError::BadPerceptChar { found: c, position }),
        })
        .collect()
}

/// Render a block of symbols as an ASCII `'0'`/`'1'` string.
pub fn symbols_to_string(symbols: &[Symbol]) -> String {
    symbols.iter().map(|s| s.as_char()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_percept() {
        let syms = percept_to_symbols("0110", 4).unwrap();
        assert_eq!(
            syms,
            vec![Symbol::Off, Symbol::On, Symbol::On, Symbol::Off]
        );
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let err = percept_to_symbols("011", 4).unwrap_err();
        assert!(matches!(
            err,
            SymbolError::BadPerceptLength {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn parse_rejects_non_binary_character() {
        let err = percept_to_symbols("01x0", 4).unwrap_err();
        assert!(matches!(
            err,
            SymbolError::BadPerceptChar {
                found: 'x',
                position: 2
            }
        ));
    }

    #[test]
    fn roundtrip_through_string() {
        let syms = percept_to_symbols("10101", 5).unwrap();
        assert_eq!(symbols_to_string(&syms), "10101");
    }

    #[test]
    fn flip_and_index() {
        assert_eq!(Symbol::Off.flip(), Symbol::On);
        assert_eq!(Symbol::On.flip(), Symbol::Off);
        assert_eq!(Symbol::Off.index(), 0);
        assert_eq!(Symbol::On.index(), 1);
        assert!(Symbol::On.is_on());
        assert!(!Symbol::Off.is_on());
    }
}
