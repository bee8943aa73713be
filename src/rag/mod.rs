//! Optional prompt context from a searchable knowledge base.

mod loader;

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

pub use loader::{chunk_text, load_text_file, Chunk, CHUNK_OVERLAP, CHUNK_SIZE};

#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Up to `top_k` relevant passages rendered as one block, or an empty
    /// string when nothing matches.
    async fn retrieve(&self, query: &str, top_k: usize) -> String;
}

/// In-memory chunk index ranked by query term overlap.
#[derive(Debug, Default)]
pub struct KeywordIndex {
    chunks: Vec<(Chunk, HashSet<String>)>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, chunks: Vec<Chunk>) {
        let count = chunks.len();
        self.chunks.extend(chunks.into_iter().map(|chunk| {
            let terms = terms(&chunk.content);
            (chunk, terms)
        }));
        tracing::info!(chunks = count, "ingested knowledge chunks");
    }

    pub fn ingest_file(&mut self, path: &Path) -> Result<()> {
        self.ingest(load_text_file(path)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<&Chunk> {
        let query_terms = terms(query);
        let mut scored: Vec<(usize, &Chunk)> = self
            .chunks
            .iter()
            .map(|(chunk, chunk_terms)| (query_terms.intersection(chunk_terms).count(), chunk))
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable: ties keep ingestion order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(top_k).map(|(_, chunk)| chunk).collect()
    }
}

#[async_trait]
impl ContextRetriever for KeywordIndex {
    async fn retrieve(&self, query: &str, top_k: usize) -> String {
        self.search(query, top_k)
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("[{}] {}", i + 1, chunk.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 2)
        .map(|word| word.to_lowercase())
        .collect()
}
