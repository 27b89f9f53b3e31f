//! The reference tree: a depth-two tree over four fields, and the rows it is known to classify.

use crate::{
    memory::{MemoryEngine, Node},
    word::Word,
};

/// Number of fields in a reference row
pub const REFERENCE_FIELDS: usize = 4;

/// Rows paired with the prediction the reference tree gives them
pub const REFERENCE_ROWS: [([f64; REFERENCE_FIELDS], f64); 4] = [
    ([-1.0, 96.0, 1.77, -1.0], 1.23),
    ([-1.0, 44.9, 1.8231, -1.0], -2.0),
    ([-1.0, -1.0, 2.8231, 0.333], 2.0),
    ([-1.0, -1.0, 2.8231, 0.144], -3.0),
];

/// `[field_id/is_leaf, field_value, node_idx]`, in implicit binary tree order
#[rustfmt::skip]
pub fn reference_tree() -> MemoryEngine {
    MemoryEngine::new(vec![
                      Node::internal(2, 1.8232, 0),
        Node::internal(1, 45, 1),       Node::internal(3, 0.2312, 2),
    Node::leaf(-2, 3), Node::leaf(1.23, 4), Node::leaf(-3, 5), Node::leaf(2, 6),
    ])
}

/// The reference leaf outputs, in node order
pub fn reference_leaves() -> Vec<Word> {
    reference_tree()
        .nodes()
        .iter()
        .filter(|n| n.is_leaf())
        .map(|n| n.field_value())
        .collect()
}
