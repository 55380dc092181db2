use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use crate::error::EngineError;

/// One record of a catalog file as extracted from the upstream metadata.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CatalogRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "cloneof")]
    pub clone_of: Option<String>,
}

/// Catalog item the engine works on.
///
/// `identifier` is the catalog-assigned name; `match_key` is what gets
/// compared against file names (either the name itself or its description).
/// `catalog` is the stem of the catalog file the entry came from, empty for
/// entries built by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub identifier: String,
    pub match_key: String,
    pub catalog: String,
}

impl CatalogEntry {
    pub fn new(identifier: impl Into<String>, match_key: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), match_key: match_key.into(), catalog: String::new() }
    }

    /// Entry whose match key is its own identifier (exact/download tools).
    pub fn named(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self { match_key: identifier.clone(), identifier, catalog: String::new() }
    }

    pub fn in_catalog(mut self, stem: impl Into<String>) -> Self {
        self.catalog = stem.into();
        self
    }
}

/// Which catalog field is compared against file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Name,
    Description,
}

/// A candidate file found in the source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// File name without its final extension
    pub base_name: String,
    /// Final extension including the leading '.', or empty
    pub extension: String,
}

impl SourceFile {
    pub fn from_path(path: PathBuf) -> Self {
        let base_name =
            path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        Self { path, base_name, extension }
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.base_name, self.extension)
    }
}

/// Record filters applied before entries are built.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub include_clones: bool,
    pub skip_keywords: Vec<String>,
}

impl CatalogFilter {
    /// Filter that lets every record through, clones included.
    pub fn keep_all() -> Self {
        Self { include_clones: true, skip_keywords: Vec::new() }
    }

    pub fn accepts(&self, record: &CatalogRecord) -> bool {
        if !self.include_clones && record.clone_of.as_deref().is_some_and(|c| !c.is_empty()) {
            return false;
        }
        let name = record.name.to_lowercase();
        !self.skip_keywords.iter().any(|kw| name.contains(kw.as_str()))
    }
}

/// Split a comma separated keyword list, lowercased, blanks dropped.
pub fn parse_keywords(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Parse an extension allow-set such as `"zip, .7Z,rar"` into
/// `{".zip", ".7z", ".rar"}`. Returns `None` for an empty list (all files).
pub fn parse_extensions<S: AsRef<str>>(items: &[S]) -> Option<BTreeSet<String>> {
    let set: BTreeSet<String> = items
        .iter()
        .flat_map(|s| s.as_ref().split(','))
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| if e.starts_with('.') { e } else { format!(".{}", e) })
        .collect();
    if set.is_empty() { None } else { Some(set) }
}

pub fn load_catalog(path: &Path) -> Result<Vec<CatalogRecord>, EngineError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| EngineError::CatalogRead(path.to_path_buf(), e.to_string()))?;
    serde_json::from_str::<Vec<CatalogRecord>>(&text)
        .map_err(|e| EngineError::CatalogParse(path.to_path_buf(), e.to_string()))
}

/// Turn filtered records into engine entries. Records with an empty name are
/// dropped; an empty description falls back to the name.
pub fn build_entries(
    records: &[CatalogRecord],
    filter: &CatalogFilter,
    key: KeySource,
) -> Vec<CatalogEntry> {
    records
        .iter()
        .filter(|r| !r.name.trim().is_empty() && filter.accepts(r))
        .map(|r| {
            let identifier = r.name.trim().to_string();
            let match_key = match key {
                KeySource::Name => identifier.clone(),
                KeySource::Description if r.description.trim().is_empty() => identifier.clone(),
                KeySource::Description => r.description.trim().to_string(),
            };
            CatalogEntry { identifier, match_key, catalog: String::new() }
        })
        .collect()
}

/// Stem of the catalog file, used to name the per-catalog destination folder.
pub fn catalog_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
}

/// List regular files of `dir` in file-name order. With `recursive`, nested
/// directories are walked as well. The order is the discovery order used by
/// containment matching.
pub fn discover_sources(dir: &Path, recursive: bool) -> Result<Vec<SourceFile>, EngineError> {
    if !dir.exists() {
        return Err(EngineError::SourceNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(EngineError::SourceNotDir(dir.to_path_buf()));
    }
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth).sort_by_file_name() {
        let entry =
            entry.map_err(|e| EngineError::SourceUnreadable(dir.to_path_buf(), e.to_string()))?;
        if entry.file_type().is_file() {
            files.push(SourceFile::from_path(entry.into_path()));
        }
    }
    tracing::debug!(dir = %dir.display(), count = files.len(), "discovered source files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, desc: &str, clone_of: Option<&str>) -> CatalogRecord {
        CatalogRecord {
            name: name.to_string(),
            description: desc.to_string(),
            clone_of: clone_of.map(str::to_string),
        }
    }

    #[test]
    fn extensions_are_dotted_and_lowercased() {
        let set = parse_extensions(&["zip, .7Z", "RAR,,"]).expect("non-empty");
        let got: Vec<&str> = set.iter().map(String::as_str).collect();
        assert_eq!(got, vec![".7z", ".rar", ".zip"]);
        assert!(parse_extensions::<&str>(&[]).is_none());
        assert!(parse_extensions(&[" , "]).is_none());
    }

    #[test]
    fn filter_drops_clones_and_keywords() {
        let records = vec![
            record("Super Game (USA)", "", None),
            record("Super Game (Japan)", "", Some("Super Game (USA)")),
            record("[BIOS] Console", "", None),
            record("4-in-1 Pack", "", None),
        ];
        let filter = CatalogFilter {
            include_clones: false,
            skip_keywords: parse_keywords("bios, in-1 ,demo"),
        };
        let entries = build_entries(&records, &filter, KeySource::Name);
        assert_eq!(entries, vec![CatalogEntry::named("Super Game (USA)")]);

        let with_clones = CatalogFilter { include_clones: true, ..filter };
        assert_eq!(build_entries(&records, &with_clones, KeySource::Name).len(), 2);
    }

    #[test]
    fn keep_all_filter_passes_clones_and_keywords() {
        let records = vec![
            record("smb", "Super Mario Bros", None),
            record("smbj", "Super Mario Bros (Japan)", Some("smb")),
            record("mariodemo", "Mario Demo", None),
        ];
        let entries = build_entries(&records, &CatalogFilter::keep_all(), KeySource::Description);
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn description_key_falls_back_to_name() {
        let records = vec![record("smb", "Super Mario Bros", None), record("zelda", " ", None)];
        let entries = build_entries(&records, &CatalogFilter::default(), KeySource::Description);
        assert_eq!(entries[0], CatalogEntry::new("smb", "Super Mario Bros"));
        assert_eq!(entries[1], CatalogEntry::new("zelda", "zelda"));
    }

    #[test]
    fn source_file_splits_final_extension() {
        let f = SourceFile::from_path(PathBuf::from("/roms/Game v1.1 (USA).zip"));
        assert_eq!(f.base_name, "Game v1.1 (USA)");
        assert_eq!(f.extension, ".zip");
        assert_eq!(f.file_name(), "Game v1.1 (USA).zip");
        let bare = SourceFile::from_path(PathBuf::from("README"));
        assert_eq!(bare.extension, "");
    }

    #[test]
    fn discover_is_sorted_and_optionally_recursive() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("b.zip"), b"b").expect("write");
        std::fs::write(tmp.path().join("a.zip"), b"a").expect("write");
        std::fs::create_dir(tmp.path().join("nested")).expect("mkdir");
        std::fs::write(tmp.path().join("nested").join("c.zip"), b"c").expect("write");

        let flat = discover_sources(tmp.path(), false).expect("discover");
        let names: Vec<String> = flat.iter().map(SourceFile::file_name).collect();
        assert_eq!(names, vec!["a.zip", "b.zip"]);

        let deep = discover_sources(tmp.path(), true).expect("discover");
        assert_eq!(deep.len(), 3);
    }

    #[test]
    fn discover_rejects_missing_and_file_sources() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let missing = tmp.path().join("nope");
        assert_eq!(
            discover_sources(&missing, false),
            Err(EngineError::SourceNotFound(missing.clone()))
        );
        let file = tmp.path().join("file.zip");
        std::fs::write(&file, b"x").expect("write");
        assert_eq!(discover_sources(&file, false), Err(EngineError::SourceNotDir(file.clone())));
    }

    #[test]
    fn catalog_json_accepts_cloneof_alias() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("nes.json");
        std::fs::write(
            &path,
            r#"[{"name":"A"},{"name":"B","description":"Bee","cloneof":"A"}]"#,
        )
        .expect("write");
        let records = load_catalog(&path).expect("load");
        assert_eq!(records[1].clone_of.as_deref(), Some("A"));
        assert_eq!(catalog_stem(&path), "nes");

        std::fs::write(&path, "{not json").expect("write");
        assert!(matches!(load_catalog(&path), Err(EngineError::CatalogParse(_, _))));
    }
}
