use core::str::FromStr;

use crate::{
    constants::{
        FIELD_ID_MASK, FIELD_VALUE_OFFSET, FIELD_WORD_OFFSET, LEAF_BIT, NODE_ID_OFFSET, NODE_WIDTH,
    },
    error::{PeError, Result},
    word::{split_words, Word},
};

/// Read access to a node store. The processing element performs every memory read through this
/// trait, and never writes.
pub trait NodeMemory {
    /// Returns word `offset` of the node at `node`
    fn load(&self, node: usize, offset: usize) -> Result<Word>;
}

/// A tree node: `[field_id_or_leaf_word, field_value, node_id]`. On a leaf the field value slot
/// holds the leaf's output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node(pub [Word; NODE_WIDTH]);

impl Node {
    /// An internal node testing field `field_id`. Only the low 15 bits of the id are kept, so the
    /// node can never carry the leaf bit.
    pub fn internal(field_id: u16, threshold: impl Into<Word>, id: i64) -> Self {
        let field_word = i64::from(field_id) & FIELD_ID_MASK;
        Node([Word::Int(field_word), threshold.into(), Word::Int(id)])
    }

    pub fn leaf(value: impl Into<Word>, id: i64) -> Self {
        Node([Word::Int(LEAF_BIT), value.into(), Word::Int(id)])
    }

    pub fn field_word(&self) -> Word {
        self.0[FIELD_WORD_OFFSET]
    }

    pub fn field_value(&self) -> Word {
        self.0[FIELD_VALUE_OFFSET]
    }

    pub fn id(&self) -> Word {
        self.0[NODE_ID_OFFSET]
    }

    pub fn is_leaf(&self) -> bool {
        self.field_word() == Word::Int(LEAF_BIT)
    }
}

impl From<[Word; NODE_WIDTH]> for Node {
    fn from(words: [Word; NODE_WIDTH]) -> Self {
        Node(words)
    }
}

/// The memory engine: a node store laid out as an implicit complete binary tree. The root is at
/// address 0 and the children of `a` are at `2a + 1` and `2a + 2`.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct MemoryEngine {
    nodes: Vec<Node>,
}

impl MemoryEngine {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn from_rows(rows: &[[Word; NODE_WIDTH]]) -> Self {
        Self::new(rows.iter().copied().map(Node).collect())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, addr: usize) -> Option<&Node> {
        self.nodes.get(addr)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Checks that the store is a well-formed tree for rows of `num_fields` values: every node is
    /// either a leaf (first word exactly the leaf bit) or an internal node testing an existing
    /// field, and every internal node has both children in range. Traversal of a store that
    /// passes is guaranteed to reach a leaf.
    pub fn validate(&self, num_fields: usize) -> Result<()> {
        let malformed = |node, reason: String| Err(PeError::MalformedTree { node, reason });

        if self.nodes.is_empty() {
            return malformed(0, "the store holds no root".into());
        }

        for (addr, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                continue;
            }
            match node.field_word() {
                Word::Int(w) if (0..LEAF_BIT).contains(&w) => {
                    if w as usize >= num_fields {
                        return malformed(addr, format!("field id {w} exceeds {num_fields} fields"));
                    }
                },
                w => return malformed(addr, format!("{w} is neither a field id nor a leaf")),
            }
            let right = 2 * addr + 2;
            if right >= self.nodes.len() {
                return malformed(addr, format!("child {right} is out of range"));
            }
        }

        Ok(())
    }
}

impl NodeMemory for MemoryEngine {
    fn load(&self, node: usize, offset: usize) -> Result<Word> {
        self.nodes
            .get(node)
            .and_then(|n| n.0.get(offset))
            .copied()
            .ok_or(PeError::MemoryOutOfBounds { node, offset })
    }
}

impl FromStr for MemoryEngine {
    type Err = PeError;

    /// Parses a node table with one node per line: three numbers separated by whitespace or
    /// commas. Blank lines are skipped.
    fn from_str(s: &str) -> Result<Self> {
        let nodes = s
            .lines()
            .filter(|l| !l.trim().is_empty())
            .enumerate()
            .map(|(addr, line)| {
                let words = split_words(line)
                    .map(|t| {
                        t.parse::<Word>().map_err(|_| PeError::MalformedTree {
                            node: addr,
                            reason: format!("`{t}` is not a number"),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                <[Word; NODE_WIDTH]>::try_from(words)
                    .map(Node)
                    .map_err(|words| PeError::MalformedTree {
                        node: addr,
                        reason: format!("expected {NODE_WIDTH} words, got {}", words.len()),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(nodes))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixture;

    #[test]
    fn loads_by_node_and_offset() {
        let me = fixture::reference_tree();
        assert_eq!(me.load(0, 0).unwrap(), Word::Int(2));
        assert_eq!(me.load(0, 1).unwrap(), Word::Float(1.8232));
        assert_eq!(me.load(6, 1).unwrap(), Word::Int(2));
        assert_eq!(me.load(6, 2).unwrap(), Word::Int(6));
    }

    #[test]
    fn out_of_range_is_an_error() {
        let me = fixture::reference_tree();
        assert!(matches!(
            me.load(7, 0),
            Err(PeError::MemoryOutOfBounds { node: 7, offset: 0 })
        ));
        assert!(matches!(
            me.load(0, 3),
            Err(PeError::MemoryOutOfBounds { node: 0, offset: 3 })
        ));
        assert!(MemoryEngine::empty().load(0, 0).is_err());
    }

    #[test]
    fn leaf_bit_detection() {
        assert!(Node::leaf(-2, 3).is_leaf());
        assert!(!Node::internal(3, 0.2312, 2).is_leaf());
        // Only the bare leaf bit marks a leaf
        assert!(!Node([Word::Int(LEAF_BIT | 1), Word::ZERO, Word::ZERO]).is_leaf());

        // Field ids wider than 15 bits never set the leaf bit
        for field_id in [1 << 15, 40000, u16::MAX] {
            let node = Node::internal(field_id, 1.0, 0);
            assert!(!node.is_leaf());
            assert!(matches!(node.field_word(), Word::Int(w) if w & LEAF_BIT == 0));
        }
        assert_eq!(Node::internal(40000, 1.0, 0).field_word(), Word::Int(40000 - (1 << 15)));
    }

    #[test]
    fn reference_tree_is_well_formed() {
        fixture::reference_tree().validate(4).unwrap();
    }

    #[test]
    fn validation_failures() {
        let missing_child = MemoryEngine::new(vec![Node::internal(0, 1.0, 0), Node::leaf(1, 1)]);
        assert!(matches!(
            missing_child.validate(1),
            Err(PeError::MalformedTree { node: 0, .. })
        ));

        let bad_field = MemoryEngine::new(vec![
            Node::internal(5, 1.0, 0),
            Node::leaf(1, 1),
            Node::leaf(2, 2),
        ]);
        assert!(bad_field.validate(4).is_err());
        assert!(bad_field.validate(6).is_ok());

        let float_word = MemoryEngine::from_rows(&[[Word::Float(1.5), Word::ZERO, Word::ZERO]]);
        assert!(float_word.validate(4).is_err());

        assert!(MemoryEngine::empty().validate(4).is_err());
    }

    #[test]
    fn parse_node_table() {
        let me: MemoryEngine = "2 1.8232 0\n\n1, 45, 1\n32768 -2 2\n".parse().unwrap();
        assert_eq!(me.len(), 3);
        assert_eq!(me.node(1), Some(&Node::internal(1, 45, 1)));
        assert!(me.node(2).unwrap().is_leaf());

        assert!("1 2".parse::<MemoryEngine>().is_err());
        assert!("1 2 x".parse::<MemoryEngine>().is_err());
    }
}
