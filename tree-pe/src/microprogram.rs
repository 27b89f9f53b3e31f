use core::fmt;
use std::collections::BTreeMap;

use crate::{
    error::AssembleError,
    instructions::Instr,
    parser::{assemble, Assembly},
    register::RegisterLayout,
};

/// The tree-descent program every processing element runs.
#[rustfmt::skip]
pub const TREE_DESCENT: &[&str] = &[
    // Load the root
    "l R1 M[2]",
    "li R0 0",
    "li R1 0",
    "treenode:",
    "l R2 M[0]",        // field id / leaf word
    "l R3 M[1]",        // threshold, or the output on a leaf
    "and R2 S1",        // leaf bit
    "jnz leafnode",
    "sli R1 1",
    "addi R1 1",        // R1 is now the left child
    "cmp R[R2] R3",     // row value > threshold goes right
    "jnz rightnode",
    "jmp treenode",
    "leafnode:",
    "addf R0 R3",
    "exit",
    "rightnode:",
    "addi R1 1",        // left child + 1
    "jmp treenode",
];

/// An assembled, immutable instruction sequence with its resolved labels
#[derive(Debug, Clone, PartialEq)]
pub struct Microprogram {
    layout: RegisterLayout,
    instrs: Vec<Instr>,
    labels: BTreeMap<String, usize>,
}

impl Microprogram {
    pub fn assemble(layout: RegisterLayout, source: &[&str]) -> Result<Self, AssembleError> {
        let Assembly { instrs, labels } = assemble(layout, source)?;
        Ok(Self {
            layout,
            instrs,
            labels,
        })
    }

    /// The tree-descent program for a register file with `layout`.
    ///
    /// # Panics
    ///
    /// `TREE_DESCENT` is a constant, so a failure to assemble it is a bug in this crate.
    pub fn fixed(layout: RegisterLayout) -> Self {
        Self::assemble(layout, TREE_DESCENT)
            .unwrap_or_else(|e| panic!("tree descent program failed to assemble: {e}"))
    }

    pub fn get(&self, ip: usize) -> Option<&Instr> {
        self.instrs.get(ip)
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn layout(&self) -> &RegisterLayout {
        &self.layout
    }

    /// The offset a label resolved to
    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    /// The label naming `offset`, if any
    pub fn label_at(&self, offset: usize) -> Option<&str> {
        self.labels
            .iter()
            .find(|(_, addr)| **addr == offset)
            .map(|(name, _)| name.as_str())
    }
}

impl fmt::Display for Microprogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ip, instr) in self.instrs.iter().enumerate() {
            if let Some(label) = self.label_at(ip) {
                writeln!(f, "{label}:")?;
            }
            let asm = instr.to_asm(&self.layout, |target| self.label_at(target));
            writeln!(f, "{ip:4}  {asm}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::register::{MemRef, Operand};

    #[test]
    fn labels_resolve_to_fixed_offsets() {
        let program = Microprogram::fixed(RegisterLayout::new(4));
        assert_eq!(program.len(), 16);
        assert_eq!(program.label("treenode"), Some(3));
        assert_eq!(program.label("leafnode"), Some(12));
        assert_eq!(program.label("rightnode"), Some(14));
        assert_eq!(program.label("loadroot"), None);
        assert_eq!(program.label_at(12), Some("leafnode"));
    }

    #[test]
    fn operands_follow_the_register_layout() {
        let layout = RegisterLayout::new(4);
        let program = Microprogram::fixed(layout);
        let r1 = layout.r1();
        let r2 = layout.index_of("R2").unwrap();
        let r3 = layout.index_of("R3").unwrap();

        assert_eq!(
            program.get(0),
            Some(&Instr::Load {
                out: r1,
                mem: MemRef(2)
            })
        );
        assert_eq!(
            program.get(9),
            Some(&Instr::Cmp {
                in1: Operand::Indirect(r2),
                in2: Operand::Register(r3),
            })
        );
        assert_eq!(program.get(13), Some(&Instr::Exit));
        assert_eq!(program.get(16), None);

        // A wider row shifts the trailing registers but not the program shape
        let wide = Microprogram::fixed(RegisterLayout::new(9));
        assert_eq!(wide.len(), program.len());
        assert_ne!(wide.get(0), program.get(0));
    }

    #[test]
    fn disassembly_round_trips() {
        let layout = RegisterLayout::new(4);
        let listing = Microprogram::fixed(layout).to_string();
        assert!(listing.contains("treenode:\n   3  l R2 M[0]"));
        assert!(listing.contains("   9  cmp R[R2] R3"));
        assert!(listing.contains("jnz rightnode"));

        let source: Vec<&str> = TREE_DESCENT.iter().map(|l| l.trim()).collect();
        for line in listing.lines() {
            let line = line.trim();
            let asm = line.split_once("  ").map_or(line, |(_, asm)| asm.trim());
            assert!(source.contains(&asm), "{asm}");
        }
    }
}
