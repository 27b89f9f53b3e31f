use std::{
    error::Error,
    fs,
    io::{self, BufWriter, Read, Write},
    path::PathBuf,
};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tree_pe::{
    batch::{classify_rows, classify_rows_sequential, parse_rows},
    fixture,
    microprogram::Microprogram,
    register::RegisterLayout,
    MemoryEngine, ProcessingElement, Word,
};

/// Classifies rows by walking a decision tree on a processing element.
#[derive(Parser)]
struct Args {
    /// Node table, one `field_word value node_id` triple per line.
    /// If not specified, the built-in reference tree is used
    #[arg(short, long, value_name = "FILE")]
    tree: Option<PathBuf>,

    /// Rows to classify, one per line, values separated by commas or whitespace.
    /// If not specified, stdin is used
    #[arg(short, long, value_name = "FILE")]
    rows: Option<PathBuf>,

    /// Number of fields per row. Defaults to the width of the first row
    #[arg(short = 'n', long, value_name = "NUM")]
    fields: Option<usize>,

    /// Check that the tree is well formed before classifying
    #[arg(long)]
    validate: bool,

    /// Print the executed instructions of every row
    #[arg(long)]
    trace: bool,

    /// Classify rows on a single processing element instead of in parallel
    #[arg(long)]
    sequential: bool,

    /// Print the microprogram and exit
    #[arg(long)]
    disassemble: bool,
}

/// `--fields` if given, else the width of the first row. `None` when there is nothing to classify.
fn field_count(fields: Option<usize>, rows: &[Vec<Word>]) -> Option<usize> {
    fields.or_else(|| rows.first().map(Vec::len))
}

fn load_tree(path: Option<&PathBuf>) -> Result<MemoryEngine, Box<dyn Error>> {
    match path {
        Some(path) => Ok(fs::read_to_string(path)?.parse()?),
        None => Ok(fixture::reference_tree()),
    }
}

fn load_input(path: Option<&PathBuf>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut input = String::new();
            io::stdin().lock().read_to_string(&mut input)?;
            Ok(input)
        },
    }
}

fn write_trace(
    out: &mut impl Write,
    me: &MemoryEngine,
    num_fields: usize,
    rows: &[Vec<Word>],
) -> Result<(), Box<dyn Error>> {
    let mut pe = ProcessingElement::new(num_fields, me);
    for row in rows {
        let transcript = pe.process_row_traced(row.as_slice())?;
        let program = pe.microprogram();
        for entry in &transcript {
            let asm = entry
                .instr
                .to_asm(program.layout(), |t| program.label_at(t));
            writeln!(out, "{:6} {:4}  {asm}", entry.step, entry.ip)?;
        }
        writeln!(out, "{}", pe.result())?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut out = BufWriter::new(io::stdout().lock());

    if args.disassemble {
        let num_fields = args.fields.unwrap_or(fixture::REFERENCE_FIELDS);
        write!(out, "{}", Microprogram::fixed(RegisterLayout::new(num_fields)))?;
        out.flush()?;
        return Ok(());
    }

    let me = load_tree(args.tree.as_ref())?;
    let rows = parse_rows(&load_input(args.rows.as_ref())?)?;
    let Some(num_fields) = field_count(args.fields, &rows) else {
        return Ok(());
    };
    info!(nodes = me.len(), rows = rows.len(), num_fields, "loaded");

    if args.validate {
        me.validate(num_fields)?;
    }

    if args.trace {
        write_trace(&mut out, &me, num_fields, &rows)?;
    } else {
        let results = if args.sequential {
            classify_rows_sequential(num_fields, &me, &rows)?
        } else {
            classify_rows(num_fields, &me, &rows)?
        };
        for result in results {
            writeln!(out, "{result}")?;
        }
    }

    out.flush()?;
    Ok(())
}
