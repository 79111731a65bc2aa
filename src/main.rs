use std::{
    fmt::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};

use outliner::{
    init_tracing,
    pipeline::{find_pdfs, process_batch},
    PdfiumReader, ReadQueue,
};

const CONTAINER_INPUT_DIR: &str = "/app/input";
const CONTAINER_OUTPUT_DIR: &str = "/app/output";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Outliner - infer document title and headings from PDF typography",
    long_about = "Outliner reads every PDF of a directory and writes, for each one, a JSON outline made of the document title and up to three levels of headings with their page numbers."
)]
struct Args {
    /// Directory holding the PDF files to outline
    ///
    /// Defaults to /app/input when it exists, ./input otherwise.
    #[arg(env = "OUTLINER_INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Directory where the JSON outlines are written, created if missing
    #[arg(
        long,
        short('o'),
        env = "OUTLINER_OUTPUT_DIR",
        help = "Specify the directory to store the outlines"
    )]
    output_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "PDFIUM_DYNAMIC_LIB_PATH",
        help = "Directory containing the pdfium shared library, system library used if not set"
    )]
    pdfium_lib_path: Option<PathBuf>,

    #[arg(long, default_value_t = false, help = "Disable the progress bar")]
    no_progress: bool,
}

fn resolve_dirs(args: &Args) -> (PathBuf, PathBuf) {
    let container = Path::new(CONTAINER_INPUT_DIR).exists();
    let input_dir = args.input_dir.clone().unwrap_or_else(|| {
        if container {
            CONTAINER_INPUT_DIR.into()
        } else {
            "input".into()
        }
    });
    let output_dir = args.output_dir.clone().unwrap_or_else(|| {
        if container && args.input_dir.is_none() {
            CONTAINER_OUTPUT_DIR.into()
        } else {
            "output".into()
        }
    });
    (input_dir, output_dir)
}

fn setup_progress_bar(length: usize, hidden: bool) -> anyhow::Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(length as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}",
        )?
        .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .progress_chars("#>-"),
    );
    Ok(pb)
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing()?;

    let (input_dir, output_dir) = resolve_dirs(&args);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("can't create output dir {}", output_dir.display()))?;

    let pdfs = find_pdfs(&input_dir)?;
    if pdfs.is_empty() {
        println!(
            "{} No PDF files found in {}",
            "ℹ".yellow().bold(),
            input_dir.display()
        );
        return Ok(());
    }
    println!(
        "Found {} PDF(s). Starting parallel processing...",
        pdfs.len()
    );

    let reader = PdfiumReader::new(args.pdfium_lib_path.as_deref())?;
    let queue = ReadQueue::new(reader);

    let pb = setup_progress_bar(pdfs.len(), args.no_progress)?;
    let pbc = pb.clone();
    let outcomes = process_batch(
        pdfs,
        &output_dir,
        queue,
        Some(move |outcome: &outliner::DocumentOutcome| {
            pbc.set_message(outcome.doc_name().to_owned());
            pbc.inc(1u64);
        }),
    )
    .await;
    pb.finish_and_clear();

    for outcome in outcomes.iter() {
        if outcome.is_processed() {
            println!("{}", outcome.to_string().green());
        } else {
            println!("{}", outcome.to_string().red());
        }
    }
    println!(
        "{} Results saved in: {}",
        "✓".green().bold(),
        output_dir.display().to_string().cyan().underline()
    );

    Ok(())
}
