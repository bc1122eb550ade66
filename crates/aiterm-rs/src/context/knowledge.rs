//! Named reference documents loaded into the instructions.

use crate::error::EngineError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Source of knowledge base documents.
pub trait KnowledgeStore: Send + Sync {
    /// Names of every available knowledge base, sorted.
    fn list(&self) -> Result<Vec<String>, EngineError>;
    fn read(&self, name: &str) -> Result<String, EngineError>;
}

/// Knowledge bases stored as `<dir>/<name>.md`.
#[derive(Debug, Clone)]
pub struct DirKnowledgeStore {
    dir: PathBuf,
}

impl DirKnowledgeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn unavailable(name: &str, reason: impl Into<String>) -> EngineError {
        EngineError::KnowledgeUnavailable {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl KnowledgeStore for DirKnowledgeStore {
    fn list(&self) -> Result<Vec<String>, EngineError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            Self::unavailable("*", format!("cannot read {}: {e}", self.dir.display()))
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "md"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<String, EngineError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(Self::unavailable(name, "invalid name"));
        }
        let path = self.dir.join(format!("{name}.md"));
        std::fs::read_to_string(&path)
            .map_err(|e| Self::unavailable(name, format!("{}: {e}", path.display())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBase {
    pub name: String,
    pub content: String,
    pub estimated_tokens: usize,
    pub loaded: bool,
}

/// The knowledge bases loaded into a session, ordered by name.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeSet {
    loaded: BTreeMap<String, KnowledgeBase>,
}

impl KnowledgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a knowledge base. Returns the replaced entry.
    pub fn insert(&mut self, mut kb: KnowledgeBase) -> Option<KnowledgeBase> {
        kb.loaded = true;
        self.loaded.insert(kb.name.clone(), kb)
    }

    /// Remove a knowledge base. Its tokens stop counting immediately.
    pub fn remove(&mut self, name: &str) -> Option<KnowledgeBase> {
        self.loaded.remove(name).map(|mut kb| {
            kb.loaded = false;
            kb
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.loaded.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KnowledgeBase> {
        self.loaded.values()
    }

    pub fn total_tokens(&self) -> usize {
        self.loaded.values().map(|kb| kb.estimated_tokens).sum()
    }

    /// Render every loaded knowledge base as an instructions section.
    pub fn render(&self) -> String {
        self.loaded
            .values()
            .map(|kb| format!("## Knowledge base: {}\n\n{}", kb.name, kb.content.trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
