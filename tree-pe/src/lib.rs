pub mod batch;
pub mod constants;
pub mod cpu;
pub mod error;
pub mod fixture;
pub mod instructions;
pub mod memory;
pub mod microprogram;
pub mod parser;
pub mod register;
pub mod word;

pub use cpu::{ProcessingElement, TraceEntry};
pub use error::{AssembleError, PeError, Result};
pub use memory::{MemoryEngine, Node, NodeMemory};
pub use word::Word;

/// Runs a single row on a fresh processing element and returns its prediction
pub fn classify<M: NodeMemory, V: Into<Word> + Copy>(
    num_fields: usize,
    mem: &M,
    row: &[V],
) -> Result<Word> {
    let mut pe = ProcessingElement::new(num_fields, mem);
    pe.process_row(row)?;
    Ok(pe.result())
}
