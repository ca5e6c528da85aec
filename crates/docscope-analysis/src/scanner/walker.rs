//! Source file discovery.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docscope_core::config::ScanConfig;
use docscope_core::errors::ResourceError;
use ignore::WalkBuilder;

use super::ignores::IgnorePatterns;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Repository-relative, `/`-separated.
    pub relative: String,
    pub size: u64,
}

#[derive(Debug, Default)]
pub struct Discovery {
    /// `.cs` files within the size limit, sorted by relative path.
    pub sources: Vec<DiscoveredFile>,
    /// `.csproj` files, sorted by relative path.
    pub projects: Vec<DiscoveredFile>,
    /// Sources skipped for size.
    pub oversized: Vec<ResourceError>,
}

pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk `root` honoring the default and configured ignore rules.
pub fn discover(repository: &str, root: &Path, config: &ScanConfig) -> Result<Discovery, ResourceError> {
    let patterns = Arc::new(IgnorePatterns::new(root, &config.extra_ignore));
    let filter_root = root.to_path_buf();
    let filter_patterns = Arc::clone(&patterns);
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_exclude(false)
        .git_global(false)
        .parents(false)
        .follow_links(config.effective_follow_symlinks())
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            let rel = entry.path().strip_prefix(&filter_root).unwrap_or(entry.path());
            rel.as_os_str().is_empty() || !filter_patterns.is_ignored(rel, is_dir)
        })
        .build();

    let max_size = config.effective_max_file_size();
    let mut discovery = Discovery::default();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(repository, error = %e, "walk entry skipped");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let kind = path.extension().and_then(|e| e.to_str());
        if !matches!(kind, Some("cs" | "csproj")) {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let file = DiscoveredFile {
            relative: relative_path(root, path),
            path: path.to_path_buf(),
            size,
        };
        if kind == Some("csproj") {
            discovery.projects.push(file);
        } else if size > max_size {
            discovery.oversized.push(ResourceError::FileTooLarge {
                path: file.path,
                size,
                max: max_size,
            });
        } else {
            discovery.sources.push(file);
        }
    }

    let max_files = config.effective_max_files_per_repository();
    if discovery.sources.len() > max_files {
        return Err(ResourceError::TooManyFiles {
            repository: repository.to_string(),
            count: discovery.sources.len(),
            max: max_files,
        });
    }
    discovery.sources.sort_by(|a, b| a.relative.cmp(&b.relative));
    discovery.projects.sort_by(|a, b| a.relative.cmp(&b.relative));
    tracing::debug!(
        repository,
        sources = discovery.sources.len(),
        projects = discovery.projects.len(),
        oversized = discovery.oversized.len(),
        "discovered files"
    );
    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_sources_and_projects_skipping_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/Models")).unwrap();
        fs::create_dir_all(root.join("src/bin/Debug")).unwrap();
        fs::write(root.join("src/Models/Order.cs"), "class Order {}").unwrap();
        fs::write(root.join("src/bin/Debug/Gen.cs"), "class Gen {}").unwrap();
        fs::write(root.join("src/Shop.csproj"), "<Project />").unwrap();
        fs::write(root.join("src/Big.cs"), "x".repeat(64)).unwrap();
        fs::write(root.join("README.md"), "# shop").unwrap();

        let config = ScanConfig {
            max_file_size: Some(32),
            ..Default::default()
        };
        let found = discover("shop", root, &config).unwrap();
        let sources: Vec<_> = found.sources.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(sources, vec!["src/Models/Order.cs"]);
        assert_eq!(found.projects[0].relative, "src/Shop.csproj");
        assert_eq!(found.oversized.len(), 1);
    }

    #[test]
    fn too_many_files_is_a_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            fs::write(dir.path().join(format!("T{i}.cs")), "class T {}").unwrap();
        }
        let config = ScanConfig {
            max_files_per_repository: Some(2),
            ..Default::default()
        };
        let err = discover("shop", dir.path(), &config).unwrap_err();
        assert!(matches!(err, ResourceError::TooManyFiles { count: 3, .. }));
    }
}
