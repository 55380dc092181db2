use std::collections::{BTreeSet, HashMap};

use crate::catalog::{CatalogEntry, SourceFile};
use crate::normalize::normalize;

/// How catalog entries are compared against file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// normalized match key == normalized file base name
    Exact,
    /// normalized file base name contains the normalized match key
    Containment,
}

/// Read-only lookup over the source inventory. Built once per run; lookups
/// take `&self` only, so workers may share it freely.
#[derive(Debug, Clone)]
pub enum MatchIndex {
    Exact(HashMap<String, SourceFile>),
    Containment(Vec<(String, SourceFile)>),
}

impl MatchIndex {
    /// Build an index over `files`, keeping only those whose extension is in
    /// `extensions` (already normalized to lowercase with a leading '.').
    pub fn build(
        mode: MatchMode,
        files: &[SourceFile],
        extensions: Option<&BTreeSet<String>>,
    ) -> Self {
        let eligible = files.iter().filter(|f| match extensions {
            Some(allowed) => allowed.contains(&f.extension.to_lowercase()),
            None => true,
        });
        match mode {
            // On a normalized-name collision the later file wins.
            MatchMode::Exact => MatchIndex::Exact(
                eligible.map(|f| (normalize(&f.base_name), f.clone())).collect(),
            ),
            MatchMode::Containment => MatchIndex::Containment(
                eligible.map(|f| (normalize(&f.base_name), f.clone())).collect(),
            ),
        }
    }

    /// Resolve an entry to at most one source file. Containment mode returns
    /// the first candidate in discovery order. A key that normalizes to the
    /// empty string resolves to nothing in both modes, instead of matching
    /// every file by containment.
    pub fn resolve(&self, entry: &CatalogEntry) -> Option<&SourceFile> {
        let key = normalize(&entry.match_key);
        if key.is_empty() {
            return None;
        }
        match self {
            MatchIndex::Exact(map) => map.get(&key),
            MatchIndex::Containment(pairs) => {
                pairs.iter().find(|(name, _)| name.contains(key.as_str())).map(|(_, f)| f)
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MatchIndex::Exact(map) => map.len(),
            MatchIndex::Containment(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
