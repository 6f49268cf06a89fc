//! Positioned text segmentation: sentence mode and Markdown mode

use async_stream::try_stream;
use futures::stream::BoxStream;
use pulldown_cmark::{Event, Options, Parser, Tag};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ContextError, Result};

/// Default sentence boundary pattern
///
/// Matches `.`, `!`, `?` when followed by whitespace and an uppercase
/// letter, excluding periods that terminate common honorifics. Periods
/// inside numbers, URLs, versions, and lowercase continuations never
/// match because the uppercase-follows rule fails for them.
pub const DEFAULT_SENTENCE_PATTERN: &str = r"(?<!\bMr)(?<!\bMrs)(?<!\bMs)(?<!\bDr)(?<!\bProf)(?<!\bSr)(?<!\bJr)[.!?](?=\s+[A-Z])";

/// A minimal positioned text unit
///
/// `start`/`end` are half-open byte offsets into the original source
/// text; `source[start..end]` contains `text`, possibly with
/// surrounding whitespace that was trimmed from `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl TextSegment {
    fn from_span(source: &str, start: usize, end: usize) -> Option<Self> {
        let trimmed = source[start..end].trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            text: trimmed.to_string(),
            start,
            end,
        })
    }
}

/// Splitter contract consumed by the semantic chunker
pub trait TextSplitter: Send + Sync {
    /// Produce every segment of `text` in source order
    fn segments(&self, text: &str) -> Result<Vec<TextSegment>>;

    /// Lazy, cancellable segment stream; cancellation is checked
    /// between segments
    fn split<'a>(
        &'a self,
        text: &'a str,
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<TextSegment>> {
        Box::pin(try_stream! {
            for segment in self.segments(text)? {
                if cancel.is_cancelled() {
                    Err(ContextError::Cancelled)?;
                }
                yield segment;
            }
        })
    }
}

/// Sentence-boundary splitter (default mode)
pub struct SentenceSplitter {
    pattern: fancy_regex::Regex,
}

impl SentenceSplitter {
    pub fn new() -> Self {
        Self {
            pattern: fancy_regex::Regex::new(DEFAULT_SENTENCE_PATTERN)
                .expect("default sentence pattern is valid"),
        }
    }

    /// Replace the default boundary pattern with a custom one
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let pattern = fancy_regex::Regex::new(pattern)
            .map_err(|e| ContextError::InvalidArgument(format!("invalid sentence pattern: {e}")))?;
        Ok(Self { pattern })
    }
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSplitter for SentenceSplitter {
    fn segments(&self, text: &str) -> Result<Vec<TextSegment>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut segments = Vec::new();
        let mut previous = 0usize;

        for found in self.pattern.find_iter(text) {
            let found = found
                .map_err(|e| ContextError::InvalidArgument(format!("sentence pattern failed: {e}")))?;
            let boundary = found.end();
            if let Some(segment) = TextSegment::from_span(text, previous, boundary) {
                segments.push(segment);
            }
            previous = boundary;
        }

        if let Some(segment) = TextSegment::from_span(text, previous, text.len()) {
            segments.push(segment);
        }

        debug!(count = segments.len(), "Split text into sentence segments");
        Ok(segments)
    }
}

/// Markdown-aware splitter
///
/// Emits one segment per list item, per header line, per code block
/// (fences included), per blockquote line, and per sentence of each
/// ordinary paragraph. Unknown block kinds (thematic breaks, HTML
/// blocks, tables) fall back to sentence-splitting their raw text.
/// All offsets index the original input.
pub struct MarkdownSplitter {
    sentences: SentenceSplitter,
}

impl MarkdownSplitter {
    pub fn new() -> Self {
        Self {
            sentences: SentenceSplitter::new(),
        }
    }

    fn sentence_split_block(
        &self,
        source: &str,
        start: usize,
        end: usize,
        out: &mut Vec<TextSegment>,
    ) -> Result<()> {
        let end = end.min(source.len());
        if start >= end {
            return Ok(());
        }
        for segment in self.sentences.segments(&source[start..end])? {
            out.push(TextSegment {
                text: segment.text,
                start: start + segment.start,
                end: start + segment.end,
            });
        }
        Ok(())
    }

    fn line_split_block(source: &str, start: usize, end: usize, out: &mut Vec<TextSegment>) {
        let end = end.min(source.len());
        let block = &source[start..end];
        let mut offset = start;
        for line in block.split_inclusive('\n') {
            if let Some(segment) = TextSegment::from_span(source, offset, offset + line.len()) {
                out.push(segment);
            }
            offset += line.len();
        }
    }
}

impl Default for MarkdownSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Advance `index` past the block that starts at `index`, returning the
/// position just after its matching end event.
fn skip_block(events: &[(Event<'_>, std::ops::Range<usize>)], index: usize) -> usize {
    let mut depth = 0usize;
    let mut i = index;
    while i < events.len() {
        match &events[i].0 {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    events.len()
}

/// Find the start offset of the first nested list inside the block
/// beginning at `index`, if any. Used to clip a list item's own text so
/// nested items are not duplicated into the parent segment.
fn first_nested_list_start(
    events: &[(Event<'_>, std::ops::Range<usize>)],
    index: usize,
) -> Option<usize> {
    let close = skip_block(events, index);
    events[index + 1..close.saturating_sub(1)]
        .iter()
        .find_map(|(event, range)| match event {
            Event::Start(Tag::List(_)) => Some(range.start),
            _ => None,
        })
}

impl TextSplitter for MarkdownSplitter {
    fn segments(&self, text: &str) -> Result<Vec<TextSegment>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
        let events: Vec<(Event<'_>, std::ops::Range<usize>)> =
            Parser::new_ext(text, options).into_offset_iter().collect();

        let mut segments = Vec::new();
        let mut i = 0usize;
        while i < events.len() {
            let (event, range) = &events[i];
            match event {
                Event::Start(Tag::List(_)) => {
                    // Descend so each item is handled individually.
                    i += 1;
                }
                Event::Start(Tag::Item) => {
                    let clip = first_nested_list_start(&events, i)
                        .unwrap_or(range.end)
                        .min(range.end);
                    if let Some(segment) = TextSegment::from_span(text, range.start, clip) {
                        segments.push(segment);
                    }
                    // Descend: nested lists inside this item still get
                    // their own segments; other inner blocks are part
                    // of the clipped item text, so skip them below.
                    i += 1;
                }
                Event::Start(Tag::Heading { .. }) => {
                    if let Some(segment) = TextSegment::from_span(text, range.start, range.end) {
                        segments.push(segment);
                    }
                    i = skip_block(&events, i);
                }
                Event::Start(Tag::CodeBlock(_)) => {
                    // Single segment including the fences.
                    if let Some(segment) = TextSegment::from_span(text, range.start, range.end) {
                        segments.push(segment);
                    }
                    i = skip_block(&events, i);
                }
                Event::Start(Tag::BlockQuote(_)) => {
                    Self::line_split_block(text, range.start, range.end, &mut segments);
                    i = skip_block(&events, i);
                }
                Event::Start(Tag::Paragraph) => {
                    self.sentence_split_block(text, range.start, range.end, &mut segments)?;
                    i = skip_block(&events, i);
                }
                Event::Start(Tag::HtmlBlock) | Event::Start(Tag::Table(_)) => {
                    self.sentence_split_block(text, range.start, range.end, &mut segments)?;
                    i = skip_block(&events, i);
                }
                Event::Rule => {
                    self.sentence_split_block(text, range.start, range.end, &mut segments)?;
                    i += 1;
                }
                Event::Start(_) => {
                    // Inline or unrecognized container: descend.
                    i += 1;
                }
                _ => {
                    i += 1;
                }
            }
        }

        // Inner blocks of clipped list items were visited above; drop
        // any segment fully contained in an earlier one.
        segments.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        let mut covered_end = 0usize;
        segments.retain(|segment| {
            if segment.end <= covered_end {
                return false;
            }
            covered_end = covered_end.max(segment.end);
            true
        });

        debug!(count = segments.len(), "Split markdown into segments");
        Ok(segments)
    }
}
