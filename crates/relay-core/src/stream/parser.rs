//! Incremental JSON boundary tracking for the `result` member of a JSON-RPC envelope.
//!
//! Only structure is tracked (quotes, escapes, brace and bracket depth). Values are never
//! decoded, so chunks can be forwarded as-is.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    /// Leading whitespace not yet consumed.
    Pending,
    Scalar,
    String,
    Container,
}

/// Outcome of feeding one chunk to a [`ValueScanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Step {
    /// Offset of the first value byte in the chunk.
    pub start: usize,
    /// Exclusive end offset, when the value closed inside this chunk.
    pub end: Option<usize>,
}

/// Tracks where a single JSON value ends, across any number of chunks.
#[derive(Debug, Clone)]
pub(crate) struct ValueScanner {
    kind: ValueKind,
    depth: u32,
    in_string: bool,
    escaped: bool,
}

impl ValueScanner {
    pub(crate) fn new() -> Self {
        Self { kind: ValueKind::Pending, depth: 0, in_string: false, escaped: false }
    }

    /// A scalar has no closing token, so the end of input terminates it.
    pub(crate) fn is_mid_scalar(&self) -> bool {
        self.kind == ValueKind::Scalar
    }

    pub(crate) fn feed(&mut self, data: &[u8]) -> Step {
        let mut i = 0;

        if self.kind == ValueKind::Pending {
            while i < data.len() && data[i].is_ascii_whitespace() {
                i += 1;
            }
            if i == data.len() {
                return Step { start: i, end: None };
            }
        }
        let start = i;

        if self.kind == ValueKind::Pending {
            self.kind = match data[i] {
                b'"' => {
                    self.in_string = true;
                    i += 1;
                    ValueKind::String
                }
                b'{' | b'[' => {
                    self.depth = 1;
                    i += 1;
                    ValueKind::Container
                }
                _ => ValueKind::Scalar,
            };
        }

        while i < data.len() {
            let b = data[i];
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                    if self.kind == ValueKind::String {
                        return Step { start, end: Some(i + 1) };
                    }
                }
            } else {
                match self.kind {
                    ValueKind::Scalar => {
                        if matches!(b, b',' | b'}' | b']') || b.is_ascii_whitespace() {
                            return Step { start, end: Some(i) };
                        }
                    }
                    ValueKind::Container => match b {
                        b'"' => self.in_string = true,
                        b'{' | b'[' => self.depth += 1,
                        b'}' | b']' => {
                            self.depth = self.depth.saturating_sub(1);
                            if self.depth == 0 {
                                return Step { start, end: Some(i + 1) };
                            }
                        }
                        _ => {}
                    },
                    ValueKind::String | ValueKind::Pending => {}
                }
            }
            i += 1;
        }

        Step { start, end: None }
    }
}

/// What the first chunk of a body revealed.
#[derive(Debug)]
pub(crate) enum Located {
    /// No envelope with a top-level `result` could be found.
    NotEnvelope,
    /// `result` closed inside the chunk.
    Complete { result: Range<usize>, id: Option<serde_json::Value> },
    /// `result` started but continues past the chunk.
    Open { result_start: usize, scanner: ValueScanner },
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.data.get(self.pos) == Some(&expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Raw bytes of an object key, escapes left in place.
    fn key(&mut self) -> Option<&'a [u8]> {
        if !self.eat(b'"') {
            return None;
        }
        let start = self.pos;
        let mut escaped = false;
        while self.pos < self.data.len() {
            let b = self.data[self.pos];
            self.pos += 1;
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                return Some(&self.data[start..self.pos - 1]);
            }
        }
        None
    }
}

/// Walks the top-level members of the envelope in `chunk` looking for `result` and `id`.
pub(crate) fn locate(chunk: &[u8]) -> Located {
    let mut cursor = Cursor { data: chunk, pos: 0 };
    cursor.skip_ws();
    if !cursor.eat(b'{') {
        return Located::NotEnvelope;
    }

    let mut id = None;
    let mut result = None;

    loop {
        cursor.skip_ws();
        let Some(key) = cursor.key() else { break };
        cursor.skip_ws();
        if !cursor.eat(b':') {
            break;
        }

        let value_start = cursor.pos;
        let mut scanner = ValueScanner::new();
        let step = scanner.feed(&chunk[value_start..]);
        let end = match step.end {
            Some(end) => Some(end),
            // literals cannot be extended by a later chunk
            None if scanner.is_mid_scalar() &&
                matches!(&chunk[value_start + step.start..], b"null" | b"true" | b"false") =>
            {
                Some(chunk.len() - value_start)
            }
            None => None,
        };
        let Some(end) = end else {
            if key == b"result" && result.is_none() {
                return Located::Open { result_start: value_start + step.start, scanner };
            }
            break;
        };

        let range = value_start + step.start..value_start + end;
        if key == b"result" {
            if range.is_empty() {
                return Located::NotEnvelope;
            }
            result = Some(range);
        } else if key == b"id" {
            id = serde_json::from_slice(&chunk[range]).ok();
        }
        cursor.pos = value_start + end;

        cursor.skip_ws();
        if !cursor.eat(b',') {
            break;
        }
    }

    match result {
        Some(result) => Located::Complete { result, id },
        None => Located::NotEnvelope,
    }
}
