//! Project-wide fact extraction
//!
//! Files are discovered with `ignore` (so `.gitignore` is honored), parsed in
//! a bounded rayon pool, and assembled back in path order so the resulting
//! [`FactSet`] does not depend on scheduling.

mod python;
mod rust;

pub use python::PythonExtractor;
pub use rust::RustExtractor;

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use rayon::prelude::*;
use tree_sitter::{Language, Node, Parser, Tree};

use crate::config::ExtractionConfig;
use crate::error::{GraphError, Result};
use crate::facts::{fnv1a_hash, FactExtractor, FactSet, FileFacts};

/// Extractors keyed by the file extensions they claim
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn FactExtractor>>,
}

impl ExtractorRegistry {
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Later registrations win for a shared extension
    pub fn register(&mut self, extractor: Box<dyn FactExtractor>) {
        self.extractors.insert(0, extractor);
    }

    pub fn for_extension(&self, extension: &str) -> Option<&dyn FactExtractor> {
        self.extractors
            .iter()
            .find(|e| e.can_extract(extension))
            .map(|e| e.as_ref())
    }

    pub fn languages(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.language()).collect()
    }

    pub fn extract_project(&self, root: &Path, config: &ExtractionConfig) -> FactSet {
        let extractors: Vec<&dyn FactExtractor> = self.extractors.iter().map(|e| e.as_ref()).collect();
        extract_project(root, &extractors, config)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(RustExtractor));
        registry.register(Box::new(PythonExtractor));
        registry
    }
}

struct Candidate<'e> {
    path: PathBuf,
    rel_path: String,
    extractor: &'e dyn FactExtractor,
}

/// Walk `root` and extract every file some extractor claims
pub fn extract_project(root: &Path, extractors: &[&dyn FactExtractor], config: &ExtractionConfig) -> FactSet {
    let mut candidates = discover(root, extractors, config);
    candidates.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    let run = |candidate: &Candidate| {
        let outcome = extract_file(candidate, config.max_file_bytes);
        (candidate.rel_path.clone(), outcome)
    };
    let outcomes: Vec<(String, std::result::Result<FileFacts, String>)> =
        match rayon::ThreadPoolBuilder::new().num_threads(config.worker_count()).build() {
            Ok(pool) => pool.install(|| candidates.par_iter().map(run).collect()),
            Err(e) => {
                tracing::warn!("Falling back to sequential extraction: {}", e);
                candidates.iter().map(run).collect()
            }
        };

    let mut facts = FactSet::new();
    for (rel_path, outcome) in outcomes {
        match outcome {
            Ok(file_facts) => facts.push_file(file_facts),
            Err(reason) => {
                tracing::warn!("Skipping {}: {}", rel_path, reason);
                facts.skip(rel_path, reason);
            }
        }
    }
    tracing::info!(
        "Extracted {} files ({} skipped) from {}",
        facts.files.len(),
        facts.skipped.len(),
        root.display()
    );
    facts
}

fn discover<'e>(
    root: &Path,
    extractors: &[&'e dyn FactExtractor],
    config: &ExtractionConfig,
) -> Vec<Candidate<'e>> {
    let mut builder = WalkBuilder::new(root);
    builder.git_ignore(true);
    builder.git_exclude(true);
    builder.follow_links(false);
    // a root outside any git repository still honors its .gitignore
    builder.require_git(false);

    let mut candidates = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Walk error under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let Some(extractor) = extractors.iter().find(|x| x.can_extract(extension)) else {
            continue;
        };
        let rel_path = relative_path(root, path);
        if config.exclude.iter().any(|fragment| rel_path.contains(fragment.as_str())) {
            continue;
        }
        candidates.push(Candidate {
            path: path.to_path_buf(),
            rel_path,
            extractor: *extractor,
        });
    }
    candidates
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn extract_file(candidate: &Candidate, max_file_bytes: u64) -> std::result::Result<FileFacts, String> {
    let size = fs::metadata(&candidate.path).map_err(|e| e.to_string())?.len();
    if size > max_file_bytes {
        return Err(format!("file is {} bytes, limit is {}", size, max_file_bytes));
    }
    let bytes = fs::read(&candidate.path).map_err(|e| e.to_string())?;
    let source = String::from_utf8(bytes).map_err(|_| "not valid UTF-8".to_string())?;

    let mut facts = candidate
        .extractor
        .extract_source(&candidate.rel_path, &source)
        .map_err(|e| e.to_string())?;
    facts.file.content_hash = fnv1a_hash(source.as_bytes());
    Ok(facts)
}

// Tree-sitter helpers shared by the language extractors

pub(crate) fn parse_source(language: Language, rel_path: &str, source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser.set_language(&language).map_err(|e| GraphError::Extraction {
        path: rel_path.to_string(),
        message: format!("failed to load grammar: {}", e),
    })?;
    parser.parse(source, None).ok_or_else(|| GraphError::Extraction {
        path: rel_path.to_string(),
        message: "parser produced no tree".to_string(),
    })
}

pub(crate) fn node_text<'s>(node: &Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

pub(crate) fn line_of(node: &Node) -> usize {
    node.start_position().row + 1
}

pub(crate) fn end_line_of(node: &Node) -> usize {
    node.end_position().row + 1
}

/// Visit every descendant of `node` (inclusive), iteratively
pub(crate) fn visit_all<'t, F>(node: &Node<'t>, mut visitor: F)
where
    F: FnMut(&Node<'t>),
{
    // the cursor is rooted at `node`, so it never climbs above it
    let mut cursor = node.walk();
    loop {
        visitor(&cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// 1 + number of branching constructs below `node`
pub(crate) fn cyclomatic(node: &Node, branch_kinds: &[&str]) -> u32 {
    let mut complexity = 1;
    visit_all(node, |n| {
        if branch_kinds.contains(&n.kind()) {
            complexity += 1;
        }
    });
    complexity
}

/// `a.b.c` style references only; anything with calls, generics or indexing is dropped
pub(crate) fn is_plain_path(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == ':')
}
