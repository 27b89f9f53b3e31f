use core::fmt;

use derivative::Derivative;
use tracing::{debug, trace};

use crate::{
    constants::FIELD_BASE,
    error::{PeError, Result},
    instructions::Instr,
    memory::NodeMemory,
    microprogram::Microprogram,
    register::{Operand, RegIdx, RegisterLayout},
    word::Word,
};
pub use state::PeState;

pub mod state;

/// A processing element: a register file, the fixed tree-descent microprogram, and a borrowed
/// node store. Each element walks one row at a time; several elements can share one store.
#[derive(Derivative)]
#[derivative(Debug(bound = "M: fmt::Debug"), Clone(bound = ""))]
pub struct ProcessingElement<'m, M: NodeMemory> {
    /// The current state of the element
    pub state: PeState,
    program: Microprogram,
    mem: &'m M,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceEntry {
    /// Position of this entry in the run, starting at 0
    pub step: usize,
    /// Offset the instruction was fetched from
    pub ip: usize,
    /// The instruction being executed
    pub instr: Instr,
    /// The register file after the instruction executed
    pub registers: Box<[Word]>,
}

impl<'m, M: NodeMemory> ProcessingElement<'m, M> {
    pub fn new(num_fields: usize, mem: &'m M) -> Self {
        let layout = RegisterLayout::new(num_fields);
        Self {
            state: PeState::new(&layout),
            program: Microprogram::fixed(layout),
            mem,
        }
    }

    pub fn num_fields(&self) -> usize {
        self.layout().num_fields()
    }

    pub fn layout(&self) -> &RegisterLayout {
        self.program.layout()
    }

    pub fn microprogram(&self) -> &Microprogram {
        &self.program
    }

    pub fn registers(&self) -> &[Word] {
        self.state.registers()
    }

    /// Reads a register by its symbolic name
    pub fn register(&self, name: &str) -> Option<Word> {
        self.layout()
            .index_of(name)
            .map(|reg| self.state.register(reg))
    }

    /// The value left in R0 by the last row
    pub fn result(&self) -> Word {
        self.state.register(self.layout().r0())
    }

    /// Runs the microprogram over one row. The prediction is left in R0, see [`Self::result`].
    pub fn process_row<V: Into<Word> + Copy>(&mut self, row: &[V]) -> Result<()> {
        self.load_row(row)?;
        let mut steps = 0;
        while self.step()?.is_some() {
            steps += 1;
        }
        debug!(steps, result = %self.result(), "row processed");
        Ok(())
    }

    /// Like [`Self::process_row`], but also returns one entry per executed instruction
    pub fn process_row_traced<V: Into<Word> + Copy>(
        &mut self,
        row: &[V],
    ) -> Result<Vec<TraceEntry>> {
        self.load_row(row)?;
        let mut transcript = Vec::new();
        loop {
            let ip = self.state.instruction_pointer;
            match self.step()? {
                Some(instr) => transcript.push(TraceEntry {
                    step: transcript.len(),
                    ip,
                    instr,
                    registers: self.state.registers.clone(),
                }),
                None => break,
            }
        }
        debug!(steps = transcript.len(), result = %self.result(), "row processed");
        Ok(transcript)
    }

    /// Resets the register file and instruction pointer, then copies the row into F1..FN. Nothing
    /// left over from an earlier row, finished or aborted, is visible to the next one.
    fn load_row<V: Into<Word> + Copy>(&mut self, row: &[V]) -> Result<()> {
        if row.len() != self.num_fields() {
            return Err(PeError::RowLength {
                expected: self.num_fields(),
                actual: row.len(),
            });
        }
        debug!(fields = row.len(), "loading row");

        let layout = *self.layout();
        self.state = PeState::new(&layout);
        let fields = &mut self.state.registers[FIELD_BASE..FIELD_BASE + row.len()];
        for (reg, &value) in fields.iter_mut().zip(row) {
            *reg = value.into();
        }
        Ok(())
    }

    /// Fetches the instruction at the instruction pointer, advances the pointer and executes it.
    /// Returns the executed instruction, or `None` once `exit` is fetched.
    pub fn step(&mut self) -> Result<Option<Instr>> {
        let ip = self.state.instruction_pointer;
        let instr = *self.program.get(ip).ok_or(PeError::IpOutOfBounds(ip))?;
        self.state.instruction_pointer += 1;

        if instr == Instr::Exit {
            return Ok(None);
        }

        trace!(ip, instr = %instr.to_asm(self.layout(), |t| self.program.label_at(t)), "execute");
        self.execute(instr)?;
        Ok(Some(instr))
    }

    fn operand(&self, operand: &Operand) -> Result<Word> {
        match operand {
            Operand::Register(reg) => Ok(reg.value(&self.state.registers)),
            Operand::Imm(imm) => Ok(*imm),
            Operand::Indirect(reg) => {
                let field_id = reg.value(&self.state.registers);
                let index = field_id
                    .to_index()
                    .ok_or(PeError::InvalidRegister(field_id))?;
                let target = self
                    .layout()
                    .indirect(index)
                    .ok_or(PeError::RegisterOutOfBounds {
                        index: FIELD_BASE.saturating_add(index),
                    })?;
                Ok(self.state.register(target))
            },
        }
    }

    fn set(&mut self, reg: RegIdx, value: Word) {
        *self.state.register_mut(reg) = value;
    }

    /// Executes one instruction. Only the jumps move the instruction pointer; it has already been
    /// advanced past `instr`.
    fn execute(&mut self, instr: Instr) -> Result<()> {
        match instr {
            Instr::Load { out, mem } => {
                // Every load reads from the node addressed by R1
                let r1 = self.state.register(self.layout().r1());
                let node = r1.to_index().ok_or(PeError::InvalidAddress(r1))?;
                let value = self.mem.load(node, mem.0)?;
                self.set(out, value);
            },

            Instr::LoadI { out, imm } => {
                self.set(out, Word::Int(imm.integer()));
            },

            Instr::Jmp { target } => {
                self.state.instruction_pointer = target;
            },

            Instr::And { in1, in2 } => {
                let in1 = self.operand(&in1)?;
                let in2 = self.operand(&in2)?;
                self.set(RegIdx::ZF, in1.bit_and(in2)?);
            },

            Instr::Jnz { target } => {
                // The flag is consumed whether or not the jump is taken
                let flag = self.state.zero_flag();
                self.set(RegIdx::ZF, Word::ZERO);
                if !flag.is_zero() {
                    self.state.instruction_pointer = target;
                }
            },

            Instr::Sli { out, imm } => {
                let shifted = self.state.register(out).shl(imm.integer())?;
                self.set(out, shifted);
            },

            Instr::AddI { out, imm } => {
                let sum = self.state.register(out).add(Word::Int(imm.integer()))?;
                self.set(out, sum);
            },

            Instr::AddF { out, in1 } => {
                let sum = self.state.register(out).add(self.operand(&in1)?)?;
                self.set(out, sum);
            },

            Instr::Cmp { in1, in2 } => {
                let in1 = self.operand(&in1)?;
                let in2 = self.operand(&in2)?;
                self.set(RegIdx::ZF, Word::Int((in1 > in2) as i64));
            },

            Instr::Exit => {},
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fixture::{self, REFERENCE_ROWS},
        memory::{MemoryEngine, Node},
    };

    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_row(rng: &mut impl Rng, num_fields: usize) -> Vec<f64> {
        (0..num_fields).map(|_| rng.gen_range(-5.0..50.0)).collect()
    }

    #[test]
    fn reference_rows() {
        let me = fixture::reference_tree();
        let mut pe = ProcessingElement::new(4, &me);

        for (row, expected) in REFERENCE_ROWS {
            pe.process_row(&row).unwrap();
            assert_eq!(pe.register("R0").unwrap(), expected, "row {row:?}");
        }
    }

    #[test]
    fn register_file_size() {
        let me = fixture::reference_tree();
        for n in [1, 4, 17] {
            let pe = ProcessingElement::new(n, &me);
            assert_eq!(pe.registers().len(), 3 + n + 4);
            assert_eq!(pe.register("S1"), Some(Word::Int(1 << 15)));
            assert_eq!(pe.register("S0"), Some(Word::ZERO));
        }
    }

    #[test]
    fn ties_descend_left() {
        // A row value equal to the threshold must take the left branch
        let me = MemoryEngine::new(vec![
            Node::internal(0, 1.5, 0),
            Node::leaf(-1, 1),
            Node::leaf(1, 2),
        ]);
        let mut pe = ProcessingElement::new(1, &me);

        pe.process_row(&[1.5]).unwrap();
        assert_eq!(pe.result(), Word::Int(-1));
        pe.process_row(&[1.5000001]).unwrap();
        assert_eq!(pe.result(), Word::Int(1));

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let threshold: f64 = rng.gen_range(-100.0..100.0);
            let me = MemoryEngine::new(vec![
                Node::internal(0, threshold, 0),
                Node::leaf(-1, 1),
                Node::leaf(1, 2),
            ]);
            let mut pe = ProcessingElement::new(1, &me);
            pe.process_row(&[threshold]).unwrap();
            assert_eq!(pe.result(), Word::Int(-1));
        }
    }

    #[test]
    fn leaf_bit_overrides_field_value() {
        // A root leaf is returned no matter what the row holds
        let me = MemoryEngine::new(vec![Node::leaf(42.5, 0)]);
        let mut pe = ProcessingElement::new(2, &me);
        pe.process_row(&[1e9, -1e9]).unwrap();
        assert_eq!(pe.result(), Word::Float(42.5));
    }

    #[test]
    fn deterministic_and_independent_rows() {
        let me = fixture::reference_tree();
        let mut rng = StdRng::seed_from_u64(0);
        let mut shared = ProcessingElement::new(4, &me);

        for _ in 0..200 {
            let a = random_row(&mut rng, 4);
            let b = random_row(&mut rng, 4);

            shared.process_row(&a).unwrap();
            let first = shared.result();
            shared.process_row(&a).unwrap();
            assert_eq!(shared.result(), first);

            shared.process_row(&b).unwrap();
            let mut fresh = ProcessingElement::new(4, &me);
            fresh.process_row(&b).unwrap();
            assert_eq!(shared.result(), fresh.result());
            assert_eq!(shared.registers(), fresh.registers());
        }
    }

    #[test]
    fn traversal_reaches_a_leaf() {
        let me = fixture::reference_tree();
        let mut rng = StdRng::seed_from_u64(1);
        let mut pe = ProcessingElement::new(4, &me);
        let leaves: Vec<Word> = me
            .nodes()
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.field_value())
            .collect();

        for _ in 0..200 {
            pe.process_row(&random_row(&mut rng, 4)).unwrap();
            assert!(leaves.contains(&pe.result()));
        }
    }

    #[test]
    fn transcript_follows_the_descent() {
        let me = fixture::reference_tree();
        let mut pe = ProcessingElement::new(4, &me);
        let (row, expected) = REFERENCE_ROWS[0];
        let transcript = pe.process_row_traced(&row).unwrap();

        // Three setup instructions, two internal nodes (one going right), one leaf
        let ips: Vec<usize> = transcript.iter().map(|e| e.ip).collect();
        assert_eq!(
            ips,
            [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 3, 4, 5, 6, 7, 8, 9, 10, 14, 15, 3, 4, 5, 6, 12]
        );
        assert!(transcript.iter().enumerate().all(|(i, e)| e.step == i));

        let r0 = pe.layout().r0().0;
        assert_eq!(transcript.last().unwrap().registers[r0], expected);
        assert_eq!(pe.result(), expected);
    }

    #[test]
    fn zero_flag_is_consumed_by_jnz() {
        let me = fixture::reference_tree();
        let mut pe = ProcessingElement::new(4, &me);
        let transcript = pe.process_row_traced(&REFERENCE_ROWS[0].0).unwrap();
        for entry in transcript.iter().filter(|e| e.instr.opcode().is_jump()) {
            assert_eq!(entry.registers[RegIdx::ZF.0], Word::ZERO);
        }
        assert_eq!(pe.register("ZF"), Some(Word::ZERO));
    }

    #[test]
    fn out_of_range_node_is_an_error() {
        // An internal node with no children in the store
        let me = MemoryEngine::new(vec![Node::internal(0, 1.0, 0)]);
        let mut pe = ProcessingElement::new(1, &me);
        assert!(matches!(
            pe.process_row(&[0.0]),
            Err(PeError::MemoryOutOfBounds { node: 1, offset: 0 })
        ));

        let empty = MemoryEngine::empty();
        let mut pe = ProcessingElement::new(1, &empty);
        assert!(matches!(
            pe.process_row(&[0.0]),
            Err(PeError::MemoryOutOfBounds { node: 0, offset: 2 })
        ));
    }

    #[test]
    fn aborted_row_does_not_leak_into_the_next() {
        // F1 > 0 goes right to a leaf; otherwise left to an internal node with no children
        let me = MemoryEngine::new(vec![
            Node::internal(0, 0, 0),
            Node::internal(0, 0, 1),
            Node::leaf(7, 2),
        ]);
        let mut fresh = ProcessingElement::new(1, &me);
        fresh.process_row(&[1.0]).unwrap();
        assert_eq!(fresh.result(), Word::Int(7));

        let mut pe = ProcessingElement::new(1, &me);
        assert!(matches!(
            pe.process_row(&[-1.0]),
            Err(PeError::MemoryOutOfBounds { node: 3, offset: 0 })
        ));
        pe.process_row(&[1.0]).unwrap();
        assert_eq!(pe.result(), fresh.result());
        assert_eq!(pe.registers(), fresh.registers());

        // Same for the traced run
        assert!(pe.process_row_traced(&[-1.0]).is_err());
        let transcript = pe.process_row_traced(&[1.0]).unwrap();
        assert_eq!(transcript.first().map(|e| e.ip), Some(0));
        assert_eq!(pe.result(), Word::Int(7));
    }

    #[test]
    fn address_overflow_is_an_error() {
        let me = MemoryEngine::new(vec![Node::leaf(1, 0)]);
        let mut pe = ProcessingElement::new(1, &me);
        let r1 = pe.layout().r1();
        *pe.state.register_mut(r1) = Word::Int(i64::MAX);
        pe.state.instruction_pointer = 8;
        // `addi R1 1` at offset 8 is the left-child step
        assert!(matches!(
            pe.step(),
            Err(PeError::Overflow { op: "add", .. })
        ));
    }

    #[test]
    fn field_id_past_the_row_is_an_error() {
        let me = MemoryEngine::new(vec![
            Node::internal(3, 1.0, 0),
            Node::leaf(-1, 1),
            Node::leaf(1, 2),
        ]);
        let mut pe = ProcessingElement::new(2, &me);
        assert!(matches!(
            pe.process_row(&[0.0, 0.0]),
            Err(PeError::RegisterOutOfBounds { index: 6 })
        ));
    }

    #[test]
    fn row_length_must_match() {
        let me = fixture::reference_tree();
        let mut pe = ProcessingElement::new(4, &me);
        assert!(matches!(
            pe.process_row(&[1.0, 2.0]),
            Err(PeError::RowLength {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn clones_share_the_store() {
        let me = fixture::reference_tree();
        let mut pe = ProcessingElement::new(4, &me);
        let mut other = pe.clone();
        pe.process_row(&REFERENCE_ROWS[0].0).unwrap();
        other.process_row(&REFERENCE_ROWS[2].0).unwrap();
        assert_eq!(pe.result(), REFERENCE_ROWS[0].1);
        assert_eq!(other.result(), REFERENCE_ROWS[2].1);
    }
}
