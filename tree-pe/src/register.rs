use core::fmt;

use crate::{
    constants::{FIELD_BASE, NUM_TRAILING_REGS},
    word::Word,
};

/// An index into the register file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RegIdx(pub usize);

impl RegIdx {
    pub const S0: RegIdx = RegIdx(0);
    pub const ZF: RegIdx = RegIdx(1);
    pub const S1: RegIdx = RegIdx(2);

    pub fn value(&self, registers: &[Word]) -> Word {
        registers[self.0]
    }
}

/// An indexed load `M[k]` from the node currently addressed by R1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRef(pub usize);

/// Where an instruction reads a value from. Operands are lowered once, when the microprogram is
/// assembled, and never re-parsed while running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Register(RegIdx),
    Imm(Word),
    /// `R[Rn]`: the field register selected by the field id held in `Rn`
    Indirect(RegIdx),
}

/// The register file layout for a processing element with `num_fields` field registers.
///
/// ```text
/// S0 ZF S1 | F1 .. FN | R0 R1 R2 R3
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterLayout {
    num_fields: usize,
}

impl RegisterLayout {
    pub fn new(num_fields: usize) -> Self {
        Self { num_fields }
    }

    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    /// Total number of registers, `3 + N + 4`
    pub fn num_registers(&self) -> usize {
        FIELD_BASE + self.num_fields + NUM_TRAILING_REGS
    }

    /// The register holding field `i` of the row, counting from 0
    pub fn field(&self, i: usize) -> Option<RegIdx> {
        (i < self.num_fields).then(|| RegIdx(FIELD_BASE + i))
    }

    /// R0 through R3
    pub fn r(&self, i: usize) -> Option<RegIdx> {
        (i < NUM_TRAILING_REGS).then(|| RegIdx(FIELD_BASE + self.num_fields + i))
    }

    pub fn r0(&self) -> RegIdx {
        RegIdx(FIELD_BASE + self.num_fields)
    }

    pub fn r1(&self) -> RegIdx {
        RegIdx(FIELD_BASE + self.num_fields + 1)
    }

    /// Resolves the target of `R[Rn]` given the current value of `Rn`
    pub fn indirect(&self, field_id: usize) -> Option<RegIdx> {
        self.field(field_id)
    }

    /// Looks up a register by its symbolic name: `S0`, `ZF`, `S1`, `F1`..`FN`, `R0`..`R3`
    pub fn index_of(&self, name: &str) -> Option<RegIdx> {
        match name {
            "S0" => Some(RegIdx::S0),
            "ZF" => Some(RegIdx::ZF),
            "S1" => Some(RegIdx::S1),
            _ => {
                let bank = name.get(..1)?;
                let num: usize = name.get(1..)?.parse().ok()?;
                match bank {
                    // Field registers are numbered from 1
                    "F" => num.checked_sub(1).and_then(|i| self.field(i)),
                    "R" => self.r(num),
                    _ => None,
                }
            },
        }
    }

    /// The symbolic name of a register, for disassembly and transcripts
    pub fn name_of(&self, reg: RegIdx) -> Option<String> {
        let RegIdx(i) = reg;
        let name = match i {
            0 => "S0".to_string(),
            1 => "ZF".to_string(),
            2 => "S1".to_string(),
            i if i < FIELD_BASE + self.num_fields => format!("F{}", i - FIELD_BASE + 1),
            i if i < self.num_registers() => format!("R{}", i - FIELD_BASE - self.num_fields),
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for RegIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}
