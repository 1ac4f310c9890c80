//! In-memory vector index over guideline chunks
//!
//! Queries are an exhaustive cosine scan with a bounded heap: O(n·d + n log k)
//! for n chunks of dimension d. Guideline corpora are a few thousand chunks,
//! where a scan beats the build and memory cost of an ANN graph and gives
//! exact, reproducible rankings.

use parking_lot::RwLock;
use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::DocumentChunk;

/// A chunk with its similarity to a query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Arc<DocumentChunk>,
    /// Cosine similarity in [-1, 1]
    pub similarity: f32,
}

/// Index size summary
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IndexStats {
    pub chunks: usize,
    pub documents: usize,
    pub dimensions: usize,
}

struct Entry {
    /// Insertion order; earlier entries win similarity ties
    seq: u64,
    norm: f32,
    chunk: Arc<DocumentChunk>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, Entry>,
    by_document: HashMap<String, Vec<Uuid>>,
    next_seq: u64,
}

impl Inner {
    fn insert(&mut self, chunk: DocumentChunk) {
        let norm = l2_norm(&chunk.vector);
        let id = chunk.id;
        let doc = chunk.source_document_id.clone();

        match self.entries.get_mut(&id) {
            Some(existing) => {
                existing.norm = norm;
                existing.chunk = Arc::new(chunk);
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(
                    id,
                    Entry {
                        seq,
                        norm,
                        chunk: Arc::new(chunk),
                    },
                );
                self.by_document.entry(doc).or_default().push(id);
            }
        }
    }

    fn remove_document(&mut self, document_id: &str) -> usize {
        let ids = self.by_document.remove(document_id).unwrap_or_default();
        for id in &ids {
            self.entries.remove(id);
        }
        ids.len()
    }
}

/// Heap candidate ordered so that "greater" means "ranks higher"
struct Candidate {
    similarity: f32,
    seq: u64,
    chunk: Arc<DocumentChunk>,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.similarity
            .total_cmp(&other.similarity)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Thread-safe vector index. Readers run concurrently; writers are
/// exclusive, so a query never sees a half-replaced document.
pub struct VectorIndex {
    dimensions: usize,
    inner: RwLock<Inner>,
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::VectorIndex(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::VectorIndex("vector contains non-finite values".into()));
        }
        Ok(())
    }

    /// Add a chunk. Re-adding an existing id replaces it in place.
    pub fn add(&self, chunk: DocumentChunk) -> Result<()> {
        self.check_vector(&chunk.vector)?;
        self.inner.write().insert(chunk);
        Ok(())
    }

    /// Replace every chunk of `document_id` with `chunks` in one step
    pub fn replace_document(&self, document_id: &str, chunks: Vec<DocumentChunk>) -> Result<usize> {
        for chunk in &chunks {
            self.check_vector(&chunk.vector)?;
            if chunk.source_document_id != document_id {
                return Err(Error::validation(format!(
                    "chunk {} belongs to '{}', not '{}'",
                    chunk.id, chunk.source_document_id, document_id
                )));
            }
        }

        let count = chunks.len();
        let mut inner = self.inner.write();
        let removed = inner.remove_document(document_id);
        for chunk in chunks {
            inner.insert(chunk);
        }
        drop(inner);

        tracing::debug!(document_id, removed, added = count, "Replaced document chunks");
        Ok(count)
    }

    /// Remove a document's chunks, returning how many were dropped
    pub fn remove_document(&self, document_id: &str) -> usize {
        self.inner.write().remove_document(document_id)
    }

    /// Top `k` chunks by cosine similarity, best first. Equal scores keep
    /// insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(Error::validation("k must be at least 1"));
        }
        self.check_vector(vector)?;

        let query_norm = l2_norm(vector);
        let inner = self.inner.read();
        let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(k + 1);

        for entry in inner.entries.values() {
            let similarity = cosine(vector, query_norm, &entry.chunk.vector, entry.norm);
            heap.push(Reverse(Candidate {
                similarity,
                seq: entry.seq,
                chunk: Arc::clone(&entry.chunk),
            }));
            if heap.len() > k {
                heap.pop();
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(c)| ScoredChunk {
                chunk: c.chunk,
                similarity: c.similarity,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_document(&self, document_id: &str) -> bool {
        self.inner.read().by_document.contains_key(document_id)
    }

    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read();
        IndexStats {
            chunks: inner.entries.len(),
            documents: inner.by_document.len(),
            dimensions: self.dimensions,
        }
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; zero vectors are dissimilar to everything
fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (dot / (a_norm * b_norm)).clamp(-1.0, 1.0)
}
