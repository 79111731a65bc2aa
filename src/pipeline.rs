use std::{
    fmt::Display,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use futures::{stream::FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::instrument;

use crate::{
    entities::{DocumentOutline, RawPage},
    hierarchy::build_hierarchy,
    observe::observe_lines,
    reader::ReadQueue,
    score::score_lines,
};

pub const EMPTY_DOCUMENT: &str = "Empty or Unreadable Document";

/// Runs observation, scoring and hierarchy building over the pages of one
/// document.
pub fn extract_outline(pages: &[RawPage]) -> DocumentOutline {
    let Some(observed) = observe_lines(pages) else {
        return DocumentOutline::untitled(EMPTY_DOCUMENT);
    };
    let mut lines = observed.lines;
    if lines.is_empty() {
        return DocumentOutline::untitled(EMPTY_DOCUMENT);
    }
    tracing::debug!(
        body_size = observed.body_size,
        "observed {} lines",
        lines.len()
    );
    score_lines(&mut lines, observed.body_size);

    let (title, outline) = build_hierarchy(&lines);
    DocumentOutline { title, outline }
}

/// Maps a page read to an outline. Read failures never propagate, they
/// become a placeholder title naming the file.
pub fn outline_from_read(
    file_name: &str,
    pages: anyhow::Result<Vec<RawPage>>,
) -> DocumentOutline {
    match pages {
        Ok(pages) => extract_outline(&pages),
        Err(e) => {
            tracing::error!("Error opening PDF {file_name}: {e:?}");
            DocumentOutline::untitled(format!("Error processing {file_name}"))
        }
    }
}

#[derive(Debug)]
pub enum DocumentOutcome {
    Processed {
        doc_name: String,
        output_path: PathBuf,
    },
    Failed {
        doc_name: String,
        message: String,
    },
}

impl DocumentOutcome {
    pub fn doc_name(&self) -> &str {
        match self {
            DocumentOutcome::Processed { doc_name, .. } | DocumentOutcome::Failed { doc_name, .. } => {
                doc_name
            }
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, DocumentOutcome::Processed { .. })
    }
}

impl Display for DocumentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentOutcome::Processed { doc_name, .. } => write!(f, "✓ {doc_name} processed."),
            DocumentOutcome::Failed { doc_name, message } => {
                write!(f, "✗ Failed: {doc_name} — {message}")
            }
        }
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_owned())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// `report.pdf` is written as `report.json`.
pub fn output_file_name(file_name: &str) -> String {
    format!("{}.json", file_name.strip_suffix(".pdf").unwrap_or(file_name))
}

/// Pretty json with four spaces of indentation, non-ascii text kept as is.
pub fn save_outline(outline: &DocumentOutline, output_path: &Path) -> anyhow::Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("can't create {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    outline.serialize(&mut ser)?;
    writer.flush()?;
    Ok(())
}

#[instrument(skip(path, output_dir, queue), fields(doc = %path.display()))]
pub async fn process_document(
    path: PathBuf,
    output_dir: PathBuf,
    queue: ReadQueue,
) -> DocumentOutcome {
    let doc_name = file_name(&path);
    let pages = match tokio::fs::read(&path).await {
        Ok(data) => queue.read(&data).await,
        Err(e) => Err(anyhow::Error::new(e).context("can't read file")),
    };
    let outline = outline_from_read(&doc_name, pages);

    let output_path = output_dir.join(output_file_name(&doc_name));
    match save_outline(&outline, &output_path) {
        Ok(()) => {
            tracing::info!(entries = outline.outline.len(), "saved outline");
            DocumentOutcome::Processed {
                doc_name,
                output_path,
            }
        }
        Err(e) => DocumentOutcome::Failed {
            doc_name,
            message: format!("{e:#}"),
        },
    }
}

/// Processes every document in its own task. Outcomes come back in
/// completion order; a panicking task is reported as a failure of its
/// document and doesn't affect the others.
pub async fn process_batch<F>(
    paths: Vec<PathBuf>,
    output_dir: &Path,
    queue: ReadQueue,
    mut callback: Option<F>,
) -> Vec<DocumentOutcome>
where
    F: FnMut(&DocumentOutcome),
{
    let mut tasks = FuturesUnordered::new();
    for path in paths {
        let doc_name = file_name(&path);
        let handle = tokio::spawn(process_document(
            path,
            output_dir.to_owned(),
            queue.clone(),
        ));
        tasks.push(async move { (doc_name, handle.await) });
    }

    let mut outcomes = Vec::new();
    while let Some((doc_name, result)) = tasks.next().await {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Task for {doc_name} failed : {e:?}");
                DocumentOutcome::Failed {
                    doc_name,
                    message: e.to_string(),
                }
            }
        };
        if let Some(cb) = callback.as_mut() {
            cb(&outcome);
        }
        outcomes.push(outcome);
    }
    outcomes
}

/// Lists the `*.pdf` files of a directory, sorted by path.
pub fn find_pdfs(input_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut pdfs = std::fs::read_dir(input_dir)
        .with_context(|| format!("can't list {}", input_dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "pdf"))
        .collect::<Vec<_>>();
    pdfs.sort();
    Ok(pdfs)
}
