/// Bit 15 of a node's first word. Set alone, it marks the node as a leaf
pub const LEAF_BIT: i64 = 1 << 15;

/// The low 15 bits of a node's first word hold the field id
pub const FIELD_ID_MASK: i64 = LEAF_BIT - 1;

/// Number of words per node: `[field_id_or_leaf_word, field_value, node_id]`
pub const NODE_WIDTH: usize = 3;

/// Offset of the packed field id / leaf word within a node
pub const FIELD_WORD_OFFSET: usize = 0;

/// Offset of the threshold (or leaf output) within a node
pub const FIELD_VALUE_OFFSET: usize = 1;

/// Offset of the node id within a node
pub const NODE_ID_OFFSET: usize = 2;

/// Registers ahead of the field registers: S0, ZF, S1
pub(crate) const FIELD_BASE: usize = 3;

/// Registers after the field registers: R0, R1, R2, R3
pub(crate) const NUM_TRAILING_REGS: usize = 4;
