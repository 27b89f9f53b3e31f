use thiserror::Error;

use crate::word::Word;

pub type Result<T> = core::result::Result<T, PeError>;

/// Failures while running a row through a processing element, or while validating its inputs.
#[derive(Debug, Error)]
pub enum PeError {
    #[error("node memory access out of range: node {node}, offset {offset}")]
    MemoryOutOfBounds { node: usize, offset: usize },

    #[error("{0} is not a valid node address")]
    InvalidAddress(Word),

    #[error("register index {index} is outside the field registers")]
    RegisterOutOfBounds { index: usize },

    #[error("{0} cannot be used as a register index")]
    InvalidRegister(Word),

    #[error("`{op}` is only defined on integers, got {word}")]
    TypeMismatch { op: &'static str, word: Word },

    #[error("`{op}` of {lhs} and {rhs} overflows")]
    Overflow {
        op: &'static str,
        lhs: Word,
        rhs: Word,
    },

    #[error("`{0}` is not a number")]
    BadValue(String),

    #[error("row has {actual} fields, expected {expected}")]
    RowLength { expected: usize, actual: usize },

    #[error("instruction pointer {0} is outside the microprogram")]
    IpOutOfBounds(usize),

    #[error("malformed tree at node {node}: {reason}")]
    MalformedTree { node: usize, reason: String },

    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// Construction-time failures of the assembler. The fixed microprogram never produces these.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssembleError {
    #[error("unknown instruction `{0}`")]
    UnknownOpcode(String),

    #[error("`{opcode}` takes {expected} operands, got {actual}")]
    Arity {
        opcode: String,
        expected: usize,
        actual: usize,
    },

    #[error("malformed operand `{0}`")]
    BadOperand(String),

    #[error("unknown register `{0}`")]
    UnknownRegister(String),

    #[error("unknown label `{0}`")]
    UnknownLabel(String),

    #[error("label `{0}` is defined twice")]
    DuplicateLabel(String),
}
