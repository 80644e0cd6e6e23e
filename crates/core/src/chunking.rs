use crate::error::IngestError;
use crate::models::{Chunk, ChunkMetadata, ExtractedPage};
use regex::Regex;
use tracing::{debug, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Separator cascade for markdown-ish OCR output, coarsest first.
const MARKDOWN_SEPARATORS: [&str; 8] = [
    r"\n#{1,6} ",
    r"```\n",
    r"\n\*\*\*+\n",
    r"\n---+\n",
    r"\n___+\n",
    r"\n\n",
    r"\n",
    r" ",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk overlap {chunk_overlap} must be smaller than chunk size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

#[derive(Debug, Clone)]
enum Separator {
    Pattern(Regex),
    Character,
}

/// Recursive, structure-aware splitter. Lengths are counted in chars.
///
/// Text is split on the coarsest separator present; pieces that are still
/// too long are split again with the next separator, and small pieces are
/// merged back into windows of at most `chunk_size` chars, consecutive
/// windows sharing up to `chunk_overlap` chars.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    config: ChunkingConfig,
    separators: Vec<Separator>,
}

impl RecursiveSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestError> {
        let config = ChunkingConfig::new(config.chunk_size, config.chunk_overlap)?;
        let mut separators = MARKDOWN_SEPARATORS
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map(Separator::Pattern)
                    .map_err(|error| IngestError::InvalidChunkConfig(error.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        separators.push(Separator::Character);

        Ok(Self { config, separators })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let normalized = normalize_line_endings(text);
        self.split_with(&normalized, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[Separator]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|separator| match separator {
                Separator::Pattern(regex) => regex.is_match(text),
                Separator::Character => true,
            })
            .unwrap_or(separators.len().saturating_sub(1));

        let Some(separator) = separators.get(position) else {
            return Vec::new();
        };
        let finer = &separators[position + 1..];

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.trim().to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks.retain(|chunk| !chunk.is_empty());
        chunks
    }

    /// Packs small pieces into windows, carrying a tail of at most
    /// `chunk_overlap` chars into the next window.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let ChunkingConfig {
            chunk_size,
            chunk_overlap,
        } = self.config;

        let mut merged = Vec::new();
        let mut window: Vec<(&str, usize)> = Vec::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > chunk_size && !window.is_empty() {
                if total > chunk_size {
                    warn!(total, chunk_size, "created a chunk longer than the configured size");
                }
                push_trimmed(&mut merged, &window);

                while !window.is_empty()
                    && (total > chunk_overlap || total + len > chunk_size)
                {
                    let (_, dropped) = window.remove(0);
                    total -= dropped;
                }
            }

            window.push((piece, len));
            total += len;
        }

        push_trimmed(&mut merged, &window);
        merged
    }
}

fn push_trimmed(target: &mut Vec<String>, window: &[(&str, usize)]) {
    let joined = window.iter().map(|(piece, _)| *piece).collect::<String>();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        target.push(trimmed.to_string());
    }
}

/// Splits before every separator match so the separator leads the next
/// piece. The character separator yields single chars.
fn split_keeping_separator<'a>(text: &'a str, separator: &Separator) -> Vec<&'a str> {
    match separator {
        Separator::Character => text
            .char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect(),
        Separator::Pattern(regex) => {
            let mut pieces = Vec::new();
            let mut start = 0;
            for found in regex.find_iter(text) {
                if found.start() > start {
                    pieces.push(&text[start..found.start()]);
                }
                start = found.start();
            }
            if start < text.len() {
                pieces.push(&text[start..]);
            }
            pieces
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\u{a0}', " ")
}

/// Splits every page on its own; chunks inherit the page's metadata and
/// keep page order, then split order.
pub fn chunk_pages(pages: &[ExtractedPage], splitter: &RecursiveSplitter) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for (index, page) in pages.iter().enumerate() {
        let metadata = ChunkMetadata::from_page(page);
        let page_chunks = splitter.split_text(&page.text);
        debug!(
            page = index + 1,
            of = pages.len(),
            file_name = %page.source_file_name,
            page_number = page.page_number,
            chunks = page_chunks.len(),
            "chunked page"
        );

        chunks.extend(page_chunks.into_iter().map(|text| Chunk {
            text,
            metadata: metadata.clone(),
        }));
    }

    chunks
}
