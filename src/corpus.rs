//! In-memory corpus of accepted ideas
//!
//! Append-only and process-lifetime scoped. Writers are serialized through
//! [`Corpus::writer`], which holds an async mutex for the whole scan-then-append
//! sequence. Readers clone the current list of `Arc`s under a short read lock
//! and never wait on a writer's scan.

use crate::error::GateError;
use crate::types::{IdeaRecord, StoredIdea};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct Corpus {
    ideas: RwLock<Vec<Arc<StoredIdea>>>,
    writer: Mutex<()>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ideas in insertion order, as of now
    pub fn snapshot(&self) -> Result<Vec<Arc<StoredIdea>>, GateError> {
        let ideas = self
            .ideas
            .read()
            .map_err(|_| GateError::InternalInconsistency("corpus lock poisoned".to_string()))?;
        Ok(ideas.clone())
    }

    /// Client-facing records in insertion order
    pub fn records(&self) -> Result<Vec<IdeaRecord>, GateError> {
        Ok(self.snapshot()?.iter().map(|idea| idea.to_record()).collect())
    }

    pub fn len(&self) -> usize {
        self.ideas.read().map(|ideas| ideas.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<Arc<StoredIdea>> {
        let ideas = self.ideas.read().ok()?;
        ideas.iter().find(|idea| idea.id == id).cloned()
    }

    /// Take the single writer slot; waits for any other writer to finish
    pub async fn writer(&self) -> CorpusWriter<'_> {
        let guard = self.writer.lock().await;
        CorpusWriter {
            corpus: self,
            _guard: guard,
        }
    }
}

/// Exclusive write access to a corpus
///
/// While a writer is alive no other idea can be appended, so a snapshot taken
/// through it stays current until the writer appends or is dropped.
pub struct CorpusWriter<'a> {
    corpus: &'a Corpus,
    _guard: MutexGuard<'a, ()>,
}

impl CorpusWriter<'_> {
    pub fn snapshot(&self) -> Result<Vec<Arc<StoredIdea>>, GateError> {
        self.corpus.snapshot()
    }

    /// Append an idea at the end of the corpus
    pub fn append(&self, idea: StoredIdea) -> Result<Arc<StoredIdea>, GateError> {
        let idea = Arc::new(idea);
        let mut ideas = self
            .corpus
            .ideas
            .write()
            .map_err(|_| GateError::InternalInconsistency("corpus lock poisoned".to_string()))?;
        ideas.push(Arc::clone(&idea));
        Ok(idea)
    }
}
