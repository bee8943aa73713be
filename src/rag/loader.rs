use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub const CHUNK_SIZE: usize = 500;
pub const CHUNK_OVERLAP: usize = 50;

/// One piece of an ingested document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub source: String,
    pub index: usize,
    pub content: String,
}

pub fn load_text_file(path: &Path) -> Result<Vec<Chunk>> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(chunk_text(&text, CHUNK_SIZE, CHUNK_OVERLAP)
        .into_iter()
        .enumerate()
        .map(|(index, content)| Chunk {
            source: source.clone(),
            index,
            content,
        })
        .collect())
}

/// Split into windows of `size` characters, each starting `size - overlap`
/// after the previous one.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_overlap() {
        let chunks = chunk_text("abcdefghij", 4, 1);
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_text("", CHUNK_SIZE, CHUNK_OVERLAP).is_empty());
    }
}
