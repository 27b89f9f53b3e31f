use crate::{
    constants::LEAF_BIT,
    register::{RegIdx, RegisterLayout},
    word::Word,
};

#[derive(Clone, Debug, PartialEq)]
pub struct PeState {
    /// Offset of the next instruction to fetch.
    pub(super) instruction_pointer: usize,
    /// Register file, `S0 ZF S1 | F1 .. FN | R0 R1 R2 R3`.
    pub(super) registers: Box<[Word]>,
}

impl PeState {
    pub fn new(layout: &RegisterLayout) -> Self {
        let mut registers = vec![Word::ZERO; layout.num_registers()].into_boxed_slice();
        registers[RegIdx::S1.0] = Word::Int(LEAF_BIT);
        Self {
            instruction_pointer: 0,
            registers,
        }
    }

    pub fn register(&self, reg: RegIdx) -> Word {
        self.registers[reg.0]
    }

    pub fn register_mut(&mut self, reg: RegIdx) -> &mut Word {
        &mut self.registers[reg.0]
    }

    pub fn registers(&self) -> &[Word] {
        &self.registers
    }

    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    pub fn zero_flag(&self) -> Word {
        self.register(RegIdx::ZF)
    }
}
