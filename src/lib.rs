use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub mod entities;
pub mod hierarchy;
pub mod observe;
pub mod pipeline;
pub mod reader;
pub mod score;

pub use entities::{DocumentOutline, HeadingLevel, OutlineEntry};
pub use pipeline::{extract_outline, process_batch, DocumentOutcome};
pub use reader::{PageReader, PdfiumReader, ReadQueue};

/// Logs go to stderr so they never mix with the summary on stdout. The
/// filter is read from `LOG_LEVEL`.
pub fn init_tracing() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("outliner=info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_line_number(true)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}
