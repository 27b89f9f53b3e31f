use rayon::prelude::*;
use tracing::debug;

use crate::{
    cpu::ProcessingElement,
    error::{PeError, Result},
    memory::NodeMemory,
    word::{split_words, Word},
};

/// Parses one row of values separated by commas or whitespace
pub fn parse_row(line: &str) -> Result<Vec<Word>> {
    split_words(line)
        .map(|t| t.parse::<Word>().map_err(|_| PeError::BadValue(t.to_string())))
        .collect()
}

/// Parses one row per line. Blank lines are skipped.
pub fn parse_rows(input: &str) -> Result<Vec<Vec<Word>>> {
    input
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_row)
        .collect()
}

/// Classifies `rows` in parallel. Each worker owns its own processing element; all of them read
/// the same node store. Results are returned in row order; the first failing row aborts the batch.
pub fn classify_rows<M, R, V>(num_fields: usize, mem: &M, rows: &[R]) -> Result<Vec<Word>>
where
    M: NodeMemory + Sync,
    R: AsRef<[V]> + Sync,
    V: Into<Word> + Copy,
{
    debug!(rows = rows.len(), num_fields, "classifying batch");
    rows.par_iter()
        .map_init(
            || ProcessingElement::new(num_fields, mem),
            |pe, row| {
                pe.process_row(row.as_ref())?;
                Ok(pe.result())
            },
        )
        .collect()
}

/// Classifies `rows` one after another on a single processing element
pub fn classify_rows_sequential<M, R, V>(num_fields: usize, mem: &M, rows: &[R]) -> Result<Vec<Word>>
where
    M: NodeMemory,
    R: AsRef<[V]>,
    V: Into<Word> + Copy,
{
    let mut pe = ProcessingElement::new(num_fields, mem);
    rows.iter()
        .map(|row| {
            pe.process_row(row.as_ref())?;
            Ok(pe.result())
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fixture::{self, REFERENCE_FIELDS, REFERENCE_ROWS},
        memory::{MemoryEngine, Node},
    };

    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn batch_matches_reference() {
        let me = fixture::reference_tree();
        let rows: Vec<[f64; REFERENCE_FIELDS]> = REFERENCE_ROWS.iter().map(|(r, _)| *r).collect();
        let results = classify_rows(REFERENCE_FIELDS, &me, &rows).unwrap();
        for (result, (_, expected)) in results.iter().zip(REFERENCE_ROWS) {
            assert_eq!(*result, expected);
        }
    }

    #[test]
    fn parallel_matches_sequential() {
        let me = fixture::reference_tree();
        let mut rng = StdRng::seed_from_u64(3);
        let rows: Vec<Vec<f64>> = (0..2_000)
            .map(|_| (0..REFERENCE_FIELDS).map(|_| rng.gen_range(-5.0..100.0)).collect())
            .collect();

        let parallel = classify_rows(REFERENCE_FIELDS, &me, &rows).unwrap();
        let sequential = classify_rows_sequential(REFERENCE_FIELDS, &me, &rows).unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn failing_row_aborts_batch() {
        let me = MemoryEngine::new(vec![Node::internal(0, 1.0, 0)]);
        let rows = vec![vec![0.0]; 16];
        assert!(matches!(
            classify_rows(1, &me, &rows),
            Err(PeError::MemoryOutOfBounds { .. })
        ));
    }

    #[test]
    fn rows_parse_with_either_separator() {
        let rows = parse_rows("-1, 96, 1.77, -1\n\n  \n-1 -1 2.8231 0.333\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], [Word::Int(-1), Word::Int(96), Word::Float(1.77), Word::Int(-1)]);
        assert_eq!(
            rows[1],
            [Word::Int(-1), Word::Int(-1), Word::Float(2.8231), Word::Float(0.333)]
        );

        let results = classify_rows_sequential(REFERENCE_FIELDS, &fixture::reference_tree(), &rows)
            .unwrap();
        assert_eq!(results, [REFERENCE_ROWS[0].1, REFERENCE_ROWS[2].1]);

        assert!(parse_rows("").unwrap().is_empty());
        assert_eq!(parse_row("1,,2").unwrap(), [Word::Int(1), Word::Int(2)]);
    }

    #[test]
    fn bad_tokens_are_rejected() {
        assert!(matches!(parse_row("1 two 3"), Err(PeError::BadValue(t)) if t == "two"));
        assert!(matches!(
            parse_rows("1 2\n3 M[1]\n"),
            Err(PeError::BadValue(t)) if t == "M[1]"
        ));
    }
}
