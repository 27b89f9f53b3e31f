use crate::{
    constants::NODE_WIDTH,
    error::AssembleError,
    instructions::{opcode::Opcode, Instr},
    register::{MemRef, Operand, RegIdx, RegisterLayout},
    word::Word,
};

use std::collections::BTreeMap;

type Result<T> = core::result::Result<T, AssembleError>;

/// The output of assembly: the lowered instructions plus the resolved label table
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub instrs: Vec<Instr>,
    pub labels: BTreeMap<String, usize>,
}

/// The context necessary to lower source lines into typed instructions, i.e., resolve register
/// names against the layout and labels against instruction offsets.
pub struct LoweringCtx<'a> {
    layout: RegisterLayout,
    /// A map of every label and the offset of the instruction that follows it
    label_addrs: BTreeMap<&'a str, usize>,
}

/// Splits an instruction on whitespace into its opcode token and operand tokens
pub fn decode(line: &str) -> (&str, Vec<&str>) {
    let mut toks = line.split_whitespace();
    let opcode = toks.next().unwrap_or_default();
    (opcode, toks.collect())
}

/// Returns the label name if the line is a label marker such as `treenode:`
fn label_of(line: &str) -> Option<&str> {
    line.strip_suffix(':').map(str::trim)
}

/// Extracts the contents of `X[..]`
fn bracketed<'s>(tok: &'s str, prefix: &str) -> Option<&'s str> {
    tok.strip_prefix(prefix)?.strip_suffix(']')
}

impl<'a> LoweringCtx<'a> {
    /// First pass: walks the source and records the offset of every label
    pub fn new(layout: RegisterLayout, lines: &[&'a str]) -> Result<Self> {
        let mut label_addrs = BTreeMap::new();
        let mut offset = 0;
        for line in lines.iter().copied().map(str::trim).filter(|l| !l.is_empty()) {
            match label_of(line) {
                Some(label) => {
                    if label_addrs.insert(label, offset).is_some() {
                        return Err(AssembleError::DuplicateLabel(label.to_string()));
                    }
                },
                None => offset += 1,
            }
        }

        Ok(Self {
            layout,
            label_addrs,
        })
    }

    fn label_addr(&self, label: &str) -> Result<usize> {
        self.label_addrs
            .get(label)
            .copied()
            .ok_or_else(|| AssembleError::UnknownLabel(label.to_string()))
    }

    /// Lowers a register name into a `RegIdx`
    pub fn lower_reg(&self, tok: &str) -> Result<RegIdx> {
        self.layout
            .index_of(tok)
            .ok_or_else(|| AssembleError::UnknownRegister(tok.to_string()))
    }

    /// Lowers a base-10 integer or float literal
    pub fn lower_imm(tok: &str) -> Result<Word> {
        tok.parse::<Word>()
            .map_err(|_| AssembleError::BadOperand(tok.to_string()))
    }

    /// Lowers an indexed memory reference `M[k]`
    pub fn lower_mem(tok: &str) -> Result<MemRef> {
        bracketed(tok, "M[")
            .and_then(|k| k.parse::<usize>().ok())
            .filter(|&k| k < NODE_WIDTH)
            .map(MemRef)
            .ok_or_else(|| AssembleError::BadOperand(tok.to_string()))
    }

    /// Lowers a register, register-indirect `R[Rn]`, or immediate operand
    pub fn lower_operand(&self, tok: &str) -> Result<Operand> {
        if let Some(inner) = bracketed(tok, "R[") {
            return self.lower_reg(inner).map(Operand::Indirect);
        }
        if let Some(reg) = self.layout.index_of(tok) {
            return Ok(Operand::Register(reg));
        }
        Self::lower_imm(tok).map(Operand::Imm)
    }

    /// Lowers a single instruction line
    pub fn lower_instr(&self, line: &str) -> Result<Instr> {
        let (opcode_str, args) = decode(line);
        let op = Opcode::try_from(opcode_str)
            .map_err(|_| AssembleError::UnknownOpcode(opcode_str.to_string()))?;

        if args.len() != op.arity() {
            return Err(AssembleError::Arity {
                opcode: opcode_str.to_string(),
                expected: op.arity(),
                actual: args.len(),
            });
        }

        let instr = match op {
            Opcode::L => Instr::Load {
                out: self.lower_reg(args[0])?,
                mem: Self::lower_mem(args[1])?,
            },
            Opcode::Li => Instr::LoadI {
                out: self.lower_reg(args[0])?,
                imm: Self::lower_imm(args[1])?,
            },
            Opcode::Sli => Instr::Sli {
                out: self.lower_reg(args[0])?,
                imm: Self::lower_imm(args[1])?,
            },
            Opcode::AddI => Instr::AddI {
                out: self.lower_reg(args[0])?,
                imm: Self::lower_imm(args[1])?,
            },
            Opcode::AddF => Instr::AddF {
                out: self.lower_reg(args[0])?,
                in1: self.lower_operand(args[1])?,
            },
            Opcode::And => Instr::And {
                in1: self.lower_operand(args[0])?,
                in2: self.lower_operand(args[1])?,
            },
            Opcode::Cmp => Instr::Cmp {
                in1: self.lower_operand(args[0])?,
                in2: self.lower_operand(args[1])?,
            },
            Opcode::Jmp => Instr::Jmp {
                target: self.label_addr(args[0])?,
            },
            Opcode::Jnz => Instr::Jnz {
                target: self.label_addr(args[0])?,
            },
            Opcode::Exit => Instr::Exit,
        };

        Ok(instr)
    }
}

/// Assembles source lines into instructions. A line ending in `:` names the offset of the next
/// instruction; every other non-blank line is one instruction.
pub fn assemble(layout: RegisterLayout, lines: &[&str]) -> Result<Assembly> {
    let ctx = LoweringCtx::new(layout, lines)?;

    let instrs = lines
        .iter()
        .copied()
        .map(str::trim)
        .filter(|l| !l.is_empty() && label_of(l).is_none())
        .map(|l| ctx.lower_instr(l))
        .collect::<Result<Vec<_>>>()?;

    let labels = ctx
        .label_addrs
        .iter()
        .map(|(label, &addr)| (label.to_string(), addr))
        .collect();

    Ok(Assembly { instrs, labels })
}
