use crate::{
    register::{MemRef, Operand, RegIdx, RegisterLayout},
    word::Word,
};

use opcode::Opcode;

pub mod opcode;

/// One instruction of the processing element. The set is closed: the microprogram is fixed when
/// the element is built, so every opcode is matched exhaustively when executing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instr {
    /// `l Rd M[k]`: `Rd := me.load(R1, k)`
    Load { out: RegIdx, mem: MemRef },
    /// `li Rd imm`
    LoadI { out: RegIdx, imm: Word },
    /// `jmp label`
    Jmp { target: usize },
    /// `and Ra Rb`: `ZF := Ra & Rb`
    And { in1: Operand, in2: Operand },
    /// `jnz label`: jumps if ZF is nonzero, and always clears ZF
    Jnz { target: usize },
    /// `sli Rd imm`
    Sli { out: RegIdx, imm: Word },
    /// `addi Rd imm`
    AddI { out: RegIdx, imm: Word },
    /// `addf Rd Rs`
    AddF { out: RegIdx, in1: Operand },
    /// `cmp Ra Rb`: `ZF := Ra > Rb`
    Cmp { in1: Operand, in2: Operand },
    Exit,
}

impl Instr {
    pub fn opcode(&self) -> Opcode {
        use Instr::*;
        match &self {
            Load { .. } => Opcode::L,
            LoadI { .. } => Opcode::Li,
            Jmp { .. } => Opcode::Jmp,
            And { .. } => Opcode::And,
            Jnz { .. } => Opcode::Jnz,
            Sli { .. } => Opcode::Sli,
            AddI { .. } => Opcode::AddI,
            AddF { .. } => Opcode::AddF,
            Cmp { .. } => Opcode::Cmp,
            Exit => Opcode::Exit,
        }
    }

    /// The jump target, if this is a jump
    pub fn target(&self) -> Option<usize> {
        match self {
            Instr::Jmp { target } | Instr::Jnz { target } => Some(*target),
            _ => None,
        }
    }

    /// Renders the instruction back into its assembly form. `label_of` names jump targets; a
    /// target without a name is printed as its offset.
    pub fn to_asm<'a>(
        &self,
        layout: &RegisterLayout,
        label_of: impl Fn(usize) -> Option<&'a str>,
    ) -> String {
        let reg = |r: &RegIdx| layout.name_of(*r).unwrap_or_else(|| r.to_string());
        let operand = |o: &Operand| match o {
            Operand::Register(r) => reg(r),
            Operand::Imm(w) => w.to_string(),
            Operand::Indirect(r) => format!("R[{}]", reg(r)),
        };
        let opcode = self.opcode();

        match self {
            Instr::Load { out, mem } => format!("{opcode} {} M[{}]", reg(out), mem.0),
            Instr::LoadI { out, imm } | Instr::Sli { out, imm } | Instr::AddI { out, imm } => {
                format!("{opcode} {} {imm}", reg(out))
            },
            Instr::Jmp { target } | Instr::Jnz { target } => match label_of(*target) {
                Some(label) => format!("{opcode} {label}"),
                None => format!("{opcode} {target}"),
            },
            Instr::And { in1, in2 } | Instr::Cmp { in1, in2 } => {
                format!("{opcode} {} {}", operand(in1), operand(in2))
            },
            Instr::AddF { out, in1 } => format!("{opcode} {} {}", reg(out), operand(in1)),
            Instr::Exit => opcode.to_string(),
        }
    }
}
