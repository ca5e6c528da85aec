//! Ignore rules for .NET repositories.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Build output, package caches, tooling state.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    "bin",
    "obj",
    "packages",
    ".nuget",
    "TestResults",
    "artifacts",
    "node_modules",
    ".git",
    ".svn",
    ".hg",
    ".vs",
    ".vscode",
    ".idea",
    ".docscope",
];

/// Generated sources. Designer and build-generated files never declare
/// data access of their own.
pub const DEFAULT_IGNORE_FILES: &[&str] = &[
    "*.g.cs",
    "*.g.i.cs",
    "*.designer.cs",
    "*.Designer.cs",
    "*.generated.cs",
    "*.AssemblyInfo.cs",
    "*.AssemblyAttributes.cs",
    "*.GlobalUsings.g.cs",
];

pub struct IgnorePatterns {
    gitignore: Gitignore,
}

impl IgnorePatterns {
    /// Defaults, then `extra`, then `.docscopeignore` and `.gitignore` at
    /// the repository root when present.
    pub fn new(root: &Path, extra: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        let lines = DEFAULT_IGNORE_DIRS
            .iter()
            .map(|d| format!("{d}/"))
            .chain(DEFAULT_IGNORE_FILES.iter().map(|f| f.to_string()))
            .chain(extra.iter().cloned());
        for line in lines {
            if let Err(e) = builder.add_line(None, &line) {
                tracing::warn!(pattern = %line, error = %e, "invalid ignore pattern");
            }
        }
        for name in [".docscopeignore", ".gitignore"] {
            let file = root.join(name);
            if file.is_file() {
                if let Some(e) = builder.add(&file) {
                    tracing::warn!(file = %file.display(), error = %e, "unreadable ignore file");
                }
            }
        }
        let gitignore = builder.build().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignore rules failed to build, nothing is ignored");
            Gitignore::empty()
        });
        Self { gitignore }
    }

    /// `path` is relative to the root the patterns were built for.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.gitignore
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }
}
