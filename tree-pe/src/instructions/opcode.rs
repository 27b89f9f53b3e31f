use strum::Display;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Opcode {
    L,
    Li,
    Jmp,
    And,
    Jnz,
    Sli,
    AddI,
    AddF,
    Cmp,
    Exit,
}

pub const STR_TO_OPCODE: phf::Map<&'static str, Opcode> = phf::phf_map! {
    "l" =>    Opcode::L,
    "li" =>   Opcode::Li,
    "jmp" =>  Opcode::Jmp,
    "and" =>  Opcode::And,
    "jnz" =>  Opcode::Jnz,
    "sli" =>  Opcode::Sli,
    "addi" => Opcode::AddI,
    "addf" => Opcode::AddF,
    "cmp" =>  Opcode::Cmp,
    "exit" => Opcode::Exit,
};

impl Opcode {
    /// The number of operand tokens following the opcode
    pub fn arity(self) -> usize {
        use Opcode::*;
        match self {
            Exit => 0,
            Jmp | Jnz => 1,
            L | Li | And | Sli | AddI | AddF | Cmp => 2,
        }
    }

    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Jmp | Opcode::Jnz)
    }
}

impl TryFrom<&str> for Opcode {
    type Error = ();

    fn try_from(input: &str) -> Result<Opcode, ()> {
        STR_TO_OPCODE.get(input).ok_or(()).copied()
    }
}
