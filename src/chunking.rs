/// Represents a text chunk with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The actual text content of this chunk
    pub text: String,
    /// Estimated token count for this chunk
    pub token_count: usize,
    /// Identifier of the document this chunk belongs to
    pub document_id: String,
    /// Byte offset in the source text where the chunk's new material starts
    pub start_position: usize,
}

/// Chunk sizing, in estimated tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        ChunkingConfig {
            chunk_size: 800,
            chunk_overlap: 20,
        }
    }
}

/// Accumulates pieces of text into chunks, carrying an overlap tail from
/// each finished chunk into the next one
struct ChunkBuilder<'a> {
    source: &'a str,
    document_id: &'a str,
    config: ChunkingConfig,
    chunks: Vec<TextChunk>,
    buffer: String,
    buffer_tokens: usize,
    start_position: Option<usize>,
}

impl<'a> ChunkBuilder<'a> {
    fn new(source: &'a str, document_id: &'a str, config: ChunkingConfig) -> Self {
        ChunkBuilder {
            source,
            document_id,
            config,
            chunks: Vec::new(),
            buffer: String::new(),
            buffer_tokens: 0,
            start_position: None,
        }
    }

    /// Add a piece of text, finishing the current chunk first if the piece
    /// would push it over the size limit
    fn push(&mut self, piece: &str, separator: &str) {
        let piece_tokens = estimate_token_count(piece);

        if self.buffer_tokens + piece_tokens > self.config.chunk_size && self.start_position.is_some()
        {
            self.finish_with_overlap();
        }

        if self.start_position.is_none() {
            self.start_position = Some(offset_of(self.source, piece));
        }
        if !self.buffer.is_empty() {
            self.buffer.push_str(separator);
        }
        self.buffer.push_str(piece);
        self.buffer_tokens = estimate_token_count(&self.buffer);
    }

    fn finish_with_overlap(&mut self) {
        let finished = std::mem::take(&mut self.buffer);
        let tail = overlap_tail(&finished, self.config.chunk_overlap);
        self.emit(finished);

        self.buffer = tail;
        self.buffer_tokens = estimate_token_count(&self.buffer);
    }

    fn emit(&mut self, text: String) {
        if text.trim().is_empty() {
            return;
        }
        self.chunks.push(TextChunk {
            token_count: estimate_token_count(&text),
            text,
            document_id: self.document_id.to_string(),
            start_position: self.start_position.take().unwrap_or(0),
        });
    }

    fn finish(mut self) -> Vec<TextChunk> {
        // A buffer holding only the carried-over tail adds nothing new
        if self.start_position.is_some() {
            let last = std::mem::take(&mut self.buffer);
            self.emit(last);
        }
        self.chunks
    }
}

/// Split text into chunks of approximately `config.chunk_size` tokens
///
/// Paragraphs (separated by blank lines) are kept together where they fit.
/// A paragraph larger than the chunk size is split on sentence punctuation.
pub fn split_into_chunks(text: &str, document_id: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let mut builder = ChunkBuilder::new(text, document_id, *config);

    let paragraphs = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty());

    for paragraph in paragraphs {
        if estimate_token_count(paragraph) <= config.chunk_size {
            builder.push(paragraph, "\n\n");
            continue;
        }

        // Naive sentence split that keeps the terminating punctuation
        for sentence in paragraph.split_inclusive(|c: char| ".!?\n".contains(c)) {
            let sentence = sentence.trim();
            if !sentence.is_empty() {
                builder.push(sentence, " ");
            }
        }
    }

    builder.finish()
}

/// Last `overlap_tokens` (approximately) of a finished chunk, cut on a
/// word boundary
fn overlap_tail(text: &str, overlap_tokens: usize) -> String {
    if overlap_tokens == 0 {
        return String::new();
    }

    // Approximate char count for overlap tokens
    let keep_chars = overlap_tokens * 4;
    let total_chars = text.chars().count();
    if total_chars <= keep_chars {
        return String::new();
    }

    let cut = text
        .char_indices()
        .nth(total_chars - keep_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let tail = &text[cut..];
    let tail = match tail.find(char::is_whitespace) {
        Some(space) => &tail[space..],
        None => tail,
    };
    tail.trim().to_string()
}

/// Byte offset of `piece` inside `source`, assuming `piece` is a subslice of it
fn offset_of(source: &str, piece: &str) -> usize {
    let base = source.as_ptr() as usize;
    let ptr = piece.as_ptr() as usize;
    if ptr >= base && ptr <= base + source.len() {
        ptr - base
    } else {
        source.find(piece).unwrap_or(0)
    }
}

/// Calculate approximate token count for a text
/// This is a very simple estimation - words plus punctuation
pub fn estimate_token_count(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count();
    words + punctuation
}
