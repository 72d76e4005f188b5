use crate::chunker::Chunk;

/// Text sent to the embedding provider for a chunk.
///
/// A short header with the file path and language lets path terms
/// ("utils", "math") contribute to similarity alongside the code body.
pub(crate) fn contextualize_for_embedding(chunk: &Chunk) -> String {
    let mut out = String::with_capacity(chunk.text.len() + chunk.path.len() + 32);
    out.push_str("# ");
    out.push_str(&chunk.path);
    out.push_str("\n# Language: ");
    out.push_str(&chunk.language);
    out.push('\n');
    out.push_str(&chunk.text);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{ChunkerConfig, chunk_file};

    #[test]
    fn header_precedes_code() {
        let chunk = &chunk_file("utils/math.go", "func Add() {}", &ChunkerConfig::default())[0];
        let text = contextualize_for_embedding(chunk);
        assert_eq!(text, "# utils/math.go\n# Language: go\nfunc Add() {}");
    }
}
