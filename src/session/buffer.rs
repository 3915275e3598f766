//! Bounded per-session output buffer.

/// Default byte budget of one session buffer
pub const DEFAULT_MAX_BYTES: usize = 100_000;

/// Append-only text buffer capped at `max_bytes`.
///
/// When an append pushes the buffer past its budget, the front is dropped
/// until only half the budget remains. Truncation is amortized: most appends
/// never touch the existing contents.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    text: String,
    max_bytes: usize,
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

impl OutputBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            text: String::new(),
            max_bytes: max_bytes.max(2),
        }
    }

    /// Append a chunk, evicting from the front when over budget
    pub fn append(&mut self, chunk: &str) {
        self.text.push_str(chunk);
        if self.text.len() > self.max_bytes {
            self.truncate_front(self.max_bytes / 2);
        }
    }

    fn truncate_front(&mut self, keep: usize) {
        let mut start = self.text.len().saturating_sub(keep);
        while !self.text.is_char_boundary(start) {
            start += 1;
        }
        self.text.drain(..start);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The last `n` newline-delimited lines, rejoined with `\n`.
    ///
    /// A trailing newline counts as an (empty) final line.
    pub fn tail_lines(&self, n: usize) -> String {
        if n == 0 {
            return String::new();
        }
        match self.text.rmatch_indices('\n').nth(n - 1) {
            Some((idx, _)) => self.text[idx + 1..].to_string(),
            None => self.text.clone(),
        }
    }

    /// At most the last `max` bytes, starting on a char boundary
    pub fn tail_bytes(&self, max: usize) -> &str {
        let mut start = self.text.len().saturating_sub(max);
        while !self.text.is_char_boundary(start) {
            start += 1;
        }
        &self.text[start..]
    }
}
