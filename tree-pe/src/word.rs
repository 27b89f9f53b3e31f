use core::{cmp::Ordering, fmt, str::FromStr};

use crate::error::{PeError, Result};

/// A single register or node-memory slot. Node memory mixes packed integer words (field ids,
/// node ids) with float thresholds and leaf outputs, so a word is either of the two.
#[derive(Debug, Clone, Copy)]
pub enum Word {
    Int(i64),
    Float(f64),
}

impl Word {
    pub const ZERO: Word = Word::Int(0);

    /// Truncates toward zero, the way the `li`, `sli` and `addi` immediates are read.
    pub fn integer(self) -> i64 {
        match self {
            Word::Int(i) => i,
            Word::Float(f) => f.trunc() as i64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Word::Int(i) => i as f64,
            Word::Float(f) => f,
        }
    }

    pub fn is_zero(self) -> bool {
        self == Word::ZERO
    }

    /// Bitwise AND. Only defined on integers.
    pub fn bit_and(self, other: Word) -> Result<Word> {
        match (self, other) {
            (Word::Int(a), Word::Int(b)) => Ok(Word::Int(a & b)),
            (Word::Int(_), word) | (word, _) => Err(PeError::TypeMismatch { op: "and", word }),
        }
    }

    /// Left shift by `amount` bits. Only defined on integers; shifting bits out of the word is an
    /// overflow.
    pub fn shl(self, amount: i64) -> Result<Word> {
        let a = match self {
            Word::Int(a) => a,
            word => return Err(PeError::TypeMismatch { op: "sli", word }),
        };
        u32::try_from(amount)
            .ok()
            .and_then(|n| a.checked_shl(n).filter(|shifted| *shifted >> n == a))
            .map(Word::Int)
            .ok_or(PeError::Overflow {
                op: "sli",
                lhs: self,
                rhs: Word::Int(amount),
            })
    }

    /// Integer + integer stays an integer, anything involving a float is a float.
    pub fn add(self, other: Word) -> Result<Word> {
        match (self, other) {
            (Word::Int(a), Word::Int(b)) => {
                a.checked_add(b).map(Word::Int).ok_or(PeError::Overflow {
                    op: "add",
                    lhs: self,
                    rhs: other,
                })
            },
            (a, b) => Ok(Word::Float(a.as_f64() + b.as_f64())),
        }
    }

    /// Interprets the word as a non-negative index (a node address or register offset).
    pub fn to_index(self) -> Option<usize> {
        match self {
            Word::Int(i) => usize::try_from(i).ok(),
            Word::Float(_) => None,
        }
    }
}

/// Splits a line of numbers separated by commas or whitespace, skipping empty tokens
pub fn split_words(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
}

impl Default for Word {
    fn default() -> Self {
        Word::ZERO
    }
}

impl PartialEq for Word {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Word::Int(a), Word::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }
}

impl PartialOrd for Word {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Word::Int(a), Word::Int(b)) => a.partial_cmp(b),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl PartialEq<f64> for Word {
    fn eq(&self, other: &f64) -> bool {
        self.as_f64() == *other
    }
}

impl PartialEq<i64> for Word {
    fn eq(&self, other: &i64) -> bool {
        *self == Word::Int(*other)
    }
}

impl From<i64> for Word {
    fn from(value: i64) -> Self {
        Word::Int(value)
    }
}

impl From<i32> for Word {
    fn from(value: i32) -> Self {
        Word::Int(value.into())
    }
}

impl From<u16> for Word {
    fn from(value: u16) -> Self {
        Word::Int(value.into())
    }
}

impl From<f64> for Word {
    fn from(value: f64) -> Self {
        Word::Float(value)
    }
}

impl FromStr for Word {
    type Err = core::num::ParseFloatError;

    /// Base-10 integers first, then floats.
    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match i64::from_str(s) {
            Ok(i) => Ok(Word::Int(i)),
            Err(_) => f64::from_str(s).map(Word::Float),
        }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Word::Int(i) => write!(f, "{i}"),
            Word::Float(x) => write!(f, "{x}"),
        }
    }
}
