//! Line-window chunking with a fixed character budget.

use serde::{Deserialize, Serialize};

use crate::languages::detect_language;

/// Language hint for files outside the allow-list.
pub const UNKNOWN_LANGUAGE: &str = "text";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Upper bound on `Chunk::text` length, in chars.
    pub max_chars: usize,
    /// Whole lines repeated at the start of the next window.
    pub overlap_lines: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: 2000,
            overlap_lines: 3,
        }
    }
}

/// A contiguous, file-scoped slice of source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{path}#{index}`, unique within a namespace.
    pub id: String,
    pub path: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub text: String,
    pub language: String,
    /// blake3 hex digest of `text`.
    pub content_hash: String,
}

/// One line, or one hard-split piece of a line longer than `max_chars`.
struct Piece<'a> {
    line: usize,
    text: &'a str,
    len: usize,
    /// `false` for every piece of a split line except the last.
    ends_line: bool,
}

fn split_into_pieces(text: &str, max_chars: usize) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let len = line.chars().count();
        if len <= max_chars {
            pieces.push(Piece {
                line: line_no,
                text: line,
                len,
                ends_line: true,
            });
            continue;
        }

        let mut rest = line;
        while !rest.is_empty() {
            let cut = rest
                .char_indices()
                .nth(max_chars)
                .map_or(rest.len(), |(idx, _)| idx);
            let (head, tail) = rest.split_at(cut);
            pieces.push(Piece {
                line: line_no,
                text: head,
                len: head.chars().count(),
                ends_line: tail.is_empty(),
            });
            rest = tail;
        }
    }
    pieces
}

/// Split a file into ordered chunks of at most `config.max_chars` chars.
///
/// Lines are packed into a window until the next line would overflow the
/// budget. The following window starts `overlap_lines` lines back, but
/// always at least one line further than the previous start. Overlap never
/// reaches into the middle of a hard-split line. Whitespace-only input
/// yields no chunks.
#[must_use]
pub fn chunk_file(path: &str, text: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    if text.trim().is_empty() || config.max_chars == 0 {
        return Vec::new();
    }

    let language = detect_language(path).map_or(UNKNOWN_LANGUAGE, |l| l.id());
    let pieces = split_into_pieces(text, config.max_chars);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < pieces.len() {
        let mut end = start;
        let mut len = 0;
        while end < pieces.len() {
            let extra = pieces[end].len + usize::from(end > start);
            if end > start && len + extra > config.max_chars {
                break;
            }
            len += extra;
            end += 1;
        }

        let window = &pieces[start..end];
        let body = window.iter().map(|p| p.text).collect::<Vec<_>>().join("\n");
        if !body.trim().is_empty() {
            let index = chunks.len();
            chunks.push(Chunk {
                id: format!("{path}#{index}"),
                path: path.to_owned(),
                start_line: window[0].line,
                end_line: window[window.len() - 1].line,
                content_hash: blake3_hex(&body),
                text: body,
                language: language.to_owned(),
            });
        }

        if end == pieces.len() {
            break;
        }
        start = if pieces[end - 1].ends_line {
            end.saturating_sub(config.overlap_lines).max(start + 1)
        } else {
            end
        };
        // Overlap must not begin inside a split line.
        while start > 0 && start < end && !pieces[start - 1].ends_line {
            start += 1;
        }
    }

    chunks
}

/// Lowercase hex blake3 digest.
#[must_use]
pub fn blake3_hex(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}
