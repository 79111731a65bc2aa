use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    path::Path,
    sync::Arc,
    time::Instant,
};

use anyhow::Context;
use pdfium_render::prelude::*;
use plsfix::fix_text;
use tokio::sync::{
    mpsc::{self, Receiver, Sender},
    oneshot,
};
use tracing::Span;

use crate::entities::{BBox, RawBlock, RawLine, RawPage, RawSpan, SPAN_FLAG_BOLD};

const MAX_CONCURRENT_READ_REQS: usize = 10;

/// Source of structured pages for one document. `Err` means the document
/// could not be opened or decoded, a readable document without text is an
/// `Ok` with no spans.
pub trait PageReader {
    fn read_pages(&self, data: &[u8]) -> anyhow::Result<Vec<RawPage>>;
}

fn is_bold_weight(weight: Option<PdfFontWeight>) -> bool {
    match weight {
        Some(
            PdfFontWeight::Weight700Bold | PdfFontWeight::Weight800 | PdfFontWeight::Weight900,
        ) => true,
        Some(PdfFontWeight::Custom(w)) => w >= 700,
        _ => false,
    }
}

/// Span under construction, grouped on pdfium's per-char font attributes.
struct CharSpan {
    span: RawSpan,
    font_weight: Option<PdfFontWeight>,
    rotation: f32,
}

impl CharSpan {
    fn new_from_char(char: &PdfPageTextChar, bbox: BBox) -> Self {
        let font_weight = char.font_weight();
        Self {
            span: RawSpan {
                text: char.unicode_char().map(String::from).unwrap_or_default(),
                font_size: char.unscaled_font_size().value,
                font_name: char.font_name(),
                flags: if is_bold_weight(font_weight) {
                    SPAN_FLAG_BOLD
                } else {
                    0
                },
                bbox,
            },
            font_weight,
            rotation: char.get_rotation_clockwise_degrees(),
        }
    }

    fn append(&mut self, char: &PdfPageTextChar, bbox: &BBox) -> Option<()> {
        if char.unscaled_font_size().value != self.span.font_size
            || char.font_name() != self.span.font_name
            || char.font_weight() != self.font_weight
            || char.get_rotation_clockwise_degrees() != self.rotation
        {
            None
        } else {
            if let Some(c) = char.unicode_char() {
                self.span.text.push(c);
            }
            self.span.bbox.merge(bbox);
            Some(())
        }
    }
}

fn parse_text_spans<'a>(
    chars: impl Iterator<Item = PdfPageTextChar<'a>>,
    page_height: f32,
) -> Vec<CharSpan> {
    let mut spans: Vec<CharSpan> = Vec::new();

    for char in chars {
        // Generated chars (e.g. inserted line breaks) may have no bounds
        let Ok(rect) = char.tight_bounds() else {
            continue;
        };
        let bbox = BBox::from_pdfrect(rect, page_height);
        let appended = spans
            .last_mut()
            .is_some_and(|span| span.append(&char, &bbox).is_some());
        if !appended {
            spans.push(CharSpan::new_from_char(&char, bbox));
        }
    }

    spans
}

struct LineBuilder {
    line: RawLine,
    rotation: f32,
}

impl LineBuilder {
    fn new_from_span(span: CharSpan) -> Self {
        Self {
            line: RawLine {
                bbox: span.span.bbox.clone(),
                spans: vec![span.span],
            },
            rotation: span.rotation,
        }
    }

    fn ends_line(&self) -> bool {
        self.line
            .spans
            .last()
            .is_some_and(|s| s.text.ends_with('\n') || s.text.ends_with('\x02'))
    }

    fn append(&mut self, span: CharSpan) -> Result<(), CharSpan> {
        // pdfium doesn't always inject a linebreak, so positions are checked too
        if span.rotation != self.rotation || span.span.bbox.y0 > self.line.bbox.y1 || self.ends_line()
        {
            Err(span)
        } else {
            self.line.bbox.merge(&span.span.bbox);
            self.line.spans.push(span.span);
            Ok(())
        }
    }

    fn finish(mut self) -> RawLine {
        for span in self.line.spans.iter_mut() {
            span.text = fix_text(&span.text, None);
        }
        self.line
    }
}

fn parse_text_lines(spans: Vec<CharSpan>) -> Vec<RawLine> {
    let mut lines: Vec<RawLine> = Vec::new();
    let mut current: Option<LineBuilder> = None;
    for span in spans {
        current = match current.take() {
            None => Some(LineBuilder::new_from_span(span)),
            Some(mut builder) => match builder.append(span) {
                Ok(()) => Some(builder),
                Err(span) => {
                    lines.push(builder.finish());
                    Some(LineBuilder::new_from_span(span))
                }
            },
        };
    }
    if let Some(builder) = current {
        lines.push(builder.finish());
    }

    lines
}

/// Page reader backed by a dynamically bound pdfium library.
pub struct PdfiumReader {
    pdfium: Pdfium,
}

impl PdfiumReader {
    /// Binds the pdfium library found in `lib_dir`, or the system library
    /// when no directory is given.
    pub fn new(lib_dir: Option<&Path>) -> anyhow::Result<Self> {
        let bindings = match lib_dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                    .with_context(|| format!("can't bind pdfium in {}", dir.display()))?
            }
            None => Pdfium::bind_to_system_library().context("can't bind system pdfium")?,
        };
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    fn read_page(page: &PdfPage) -> anyhow::Result<RawPage> {
        let page_height = page.height().value;
        let spans = parse_text_spans(page.text()?.chars().iter(), page_height);
        let lines = parse_text_lines(spans);

        let mut blocks = vec![RawBlock::Text { lines }];
        blocks.extend(
            page.objects()
                .iter()
                .filter(|object| matches!(object, PdfPageObject::Image(_)))
                .map(|_| RawBlock::Image),
        );
        Ok(RawPage { blocks })
    }
}

impl PageReader for PdfiumReader {
    fn read_pages(&self, data: &[u8]) -> anyhow::Result<Vec<RawPage>> {
        let start_time = Instant::now();
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(data, None)
            .context("can't load pdf document")?;

        let pages = document
            .pages()
            .iter()
            .enumerate()
            .map(|(page_id, page)| {
                Self::read_page(&page).with_context(|| format!("can't read page {}", page_id + 1))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        tracing::debug!(
            "Reading {} pages using pdfium took {}ms",
            pages.len(),
            start_time.elapsed().as_millis()
        );
        Ok(pages)
    }
}

pub struct ReadRequest {
    pub doc_data: Arc<[u8]>,
    pub response_tx: oneshot::Sender<anyhow::Result<Vec<RawPage>>>,
}

/// Funnels page reads to a single blocking worker owning the reader.
#[derive(Debug, Clone)]
pub struct ReadQueue {
    queue: Sender<(ReadRequest, Span)>,
}

impl ReadQueue {
    pub fn new<R>(reader: R) -> Self
    where
        R: PageReader + Send + 'static,
    {
        let (queue_sender, queue_receiver) = mpsc::channel(MAX_CONCURRENT_READ_REQS);

        tokio::task::spawn_blocking(move || start_reader(reader, queue_receiver));
        Self {
            queue: queue_sender,
        }
    }

    pub async fn read(&self, data: &[u8]) -> anyhow::Result<Vec<RawPage>> {
        let (response_tx, response_rx) = oneshot::channel();
        let req = ReadRequest {
            doc_data: Arc::from(data),
            response_tx,
        };
        self.queue
            .send((req, Span::current()))
            .await
            .context("error sending read request")?;
        response_rx
            .await
            .context("error receiving pages on channel")?
    }
}

fn start_reader<R: PageReader>(reader: R, mut input_rx: Receiver<(ReadRequest, Span)>) {
    while let Some((req, parent_span)) = input_rx.blocking_recv() {
        let _guard = parent_span.enter();
        let ReadRequest {
            doc_data,
            response_tx,
        } = req;
        // Keep serving requests after a reader panic.
        let result = catch_unwind(AssertUnwindSafe(|| reader.read_pages(&doc_data)))
            .unwrap_or_else(|_| {
                tracing::error!("page reader panicked");
                Err(anyhow::anyhow!("page reader panicked"))
            });
        if response_tx.send(result).is_err() {
            tracing::warn!("read requester dropped before receiving pages");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::observe::tests::{line, span, text_page};

    /// Serves canned pages, fails on payloads starting with `BAD` and
    /// panics on payloads starting with `PANIC`.
    pub(crate) struct FakeReader {
        pub pages: Vec<RawPage>,
    }

    impl PageReader for FakeReader {
        fn read_pages(&self, data: &[u8]) -> anyhow::Result<Vec<RawPage>> {
            if data.starts_with(b"BAD") {
                anyhow::bail!("not a pdf")
            }
            if data.starts_with(b"PANIC") {
                panic!("malformed object stream")
            }
            Ok(self.pages.clone())
        }
    }

    #[test]
    fn test_bold_weight() {
        assert!(is_bold_weight(Some(PdfFontWeight::Weight700Bold)));
        assert!(is_bold_weight(Some(PdfFontWeight::Weight900)));
        assert!(is_bold_weight(Some(PdfFontWeight::Custom(750))));
        assert!(!is_bold_weight(Some(PdfFontWeight::Weight400Normal)));
        assert!(!is_bold_weight(Some(PdfFontWeight::Custom(650))));
        assert!(!is_bold_weight(None));
    }

    #[tokio::test]
    async fn test_queue_roundtrip() -> anyhow::Result<()> {
        let pages = vec![text_page(vec![line(
            10.0,
            vec![span("Hello", 12.0, "Times", 0)],
        )])];
        let queue = ReadQueue::new(FakeReader { pages });

        let read = queue.read(b"%PDF-1.7").await?;
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].text_lines().count(), 1);

        let err = queue.read(b"BAD").await.unwrap_err();
        assert!(err.to_string().contains("not a pdf"));
        Ok(())
    }

    #[tokio::test]
    async fn test_queue_survives_reader_panic() -> anyhow::Result<()> {
        let pages = vec![text_page(vec![line(
            10.0,
            vec![span("Hello", 12.0, "Times", 0)],
        )])];
        let queue = ReadQueue::new(FakeReader { pages });

        let err = queue.read(b"PANIC").await.unwrap_err();
        assert!(err.to_string().contains("page reader panicked"));

        let read = queue.read(b"%PDF-1.7").await?;
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].text_lines().next().unwrap().spans[0].text, "Hello");
        Ok(())
    }
}
