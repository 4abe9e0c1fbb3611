//! Repository tree walk with ignore rules.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{IndexError, Result};

/// Patterns always applied, in addition to hidden-entry pruning.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git/",
    "__pycache__/",
    ".env",
    ".DS_Store",
    "node_modules/",
    "venv/",
];

#[derive(Debug, Clone)]
enum Rule {
    /// `name/`: any ancestor directory with this exact name.
    DirName(String),
    /// `a/b/`: a directory at this path relative to the root.
    DirPath(PathBuf),
    /// Contains `*`, `?` or `[`. Patterns without `/` also match the base name.
    Glob {
        pattern: glob::Pattern,
        basename: bool,
    },
    /// `.name`: base names starting with this prefix.
    DotPrefix(String),
    /// Exact relative path.
    Literal(String),
}

/// Compiled ignore patterns.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    rules: Vec<Rule>,
}

impl IgnoreRules {
    /// Compile the default patterns plus `extra`.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::InvalidConfig` if a wildcard pattern does not parse.
    pub fn new<S: AsRef<str>>(extra: &[S]) -> Result<Self> {
        let rules = DEFAULT_IGNORE_PATTERNS
            .iter()
            .copied()
            .chain(extra.iter().map(AsRef::as_ref))
            .filter(|p| !p.trim().is_empty())
            .map(|p| parse_rule(p.trim()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Whether a directory (relative to the root) and everything below it is excluded.
    #[must_use]
    pub fn is_ignored_dir(&self, rel: &Path) -> bool {
        let name = rel.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        self.rules.iter().any(|rule| match rule {
            Rule::DirName(d) => d == name,
            Rule::DirPath(p) => rel == p,
            Rule::Glob { .. } | Rule::DotPrefix(_) | Rule::Literal(_) => false,
        })
    }

    /// Whether a file (relative to the root) is excluded, including by any ancestor directory.
    #[must_use]
    pub fn is_ignored_file(&self, rel: &Path) -> bool {
        let mut ancestor = PathBuf::new();
        let dirs: Vec<_> = rel.parent().map(|p| p.components().collect()).unwrap_or_default();
        for comp in dirs {
            if let Component::Normal(part) = comp {
                ancestor.push(part);
                if self.is_ignored_dir(&ancestor) {
                    return true;
                }
            }
        }

        let rel_str = to_slash(rel);
        let name = rel.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        self.rules.iter().any(|rule| match rule {
            Rule::Glob { pattern, basename } => {
                pattern.matches(&rel_str) || (*basename && pattern.matches(name))
            }
            Rule::DotPrefix(prefix) => name.starts_with(prefix.as_str()),
            Rule::Literal(lit) => *lit == rel_str,
            Rule::DirName(_) | Rule::DirPath(_) => false,
        })
    }
}

fn parse_rule(pattern: &str) -> Result<Rule> {
    if let Some(dir) = pattern.strip_suffix('/') {
        let dir = dir.trim_start_matches("./");
        return Ok(if dir.contains('/') {
            Rule::DirPath(PathBuf::from(dir))
        } else {
            Rule::DirName(dir.to_owned())
        });
    }
    if pattern.contains(['*', '?', '[']) {
        let compiled = glob::Pattern::new(pattern).map_err(|e| {
            IndexError::InvalidConfig(format!("invalid ignore pattern {pattern:?}: {e}"))
        })?;
        return Ok(Rule::Glob {
            pattern: compiled,
            basename: !pattern.contains('/'),
        });
    }
    if pattern.starts_with('.') && !pattern.contains('/') {
        return Ok(Rule::DotPrefix(pattern.to_owned()));
    }
    Ok(Rule::Literal(pattern.trim_start_matches("./").to_owned()))
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Discovery options.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub extra_ignore: Vec<String>,
    /// Also honour `.gitignore` files found in the tree.
    pub respect_gitignore: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extra_ignore: Vec::new(),
            respect_gitignore: true,
        }
    }
}

/// Walk `root` and return the absolute paths of all files that survive the ignore rules.
///
/// Hidden entries (names starting with `.`) are never descended into or
/// returned. Unreadable directory entries are logged and skipped. The result
/// is sorted.
///
/// # Errors
///
/// Returns `IndexError::InvalidRoot` if `root` is missing or not a directory, and
/// `IndexError::InvalidConfig` for malformed extra patterns.
pub fn discover_files(root: &Path, config: &DiscoveryConfig) -> Result<Vec<PathBuf>> {
    let root = canonical_root(root)?;
    let rules = Arc::new(IgnoreRules::new(&config.extra_ignore)?);

    let filter_rules = Arc::clone(&rules);
    let filter_root = root.clone();
    let walker = ignore::WalkBuilder::new(&root)
        .hidden(true)
        .parents(false)
        .ignore(false)
        .git_global(false)
        .git_ignore(config.respect_gitignore)
        .git_exclude(config.respect_gitignore)
        .require_git(false)
        .filter_entry(move |entry| {
            if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                return true;
            }
            let rel = entry.path().strip_prefix(&filter_root).unwrap_or(entry.path());
            !filter_rules.is_ignored_dir(rel)
        })
        .build();

    let mut files = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
        if rules.is_ignored_file(rel) {
            tracing::trace!(path = %rel.display(), "ignored");
            continue;
        }
        files.push(entry.into_path());
    }

    files.sort();
    Ok(files)
}

/// Resolve `root` to an absolute directory path.
///
/// # Errors
///
/// Returns `IndexError::InvalidRoot` if `root` is missing or not a directory.
pub fn canonical_root(root: &Path) -> Result<PathBuf> {
    let canonical = root.canonicalize().map_err(|e| IndexError::InvalidRoot {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !canonical.is_dir() {
        return Err(IndexError::InvalidRoot {
            path: root.to_path_buf(),
            reason: "not a directory".into(),
        });
    }
    Ok(canonical)
}

/// Path of `path` relative to `root`, with `/` separators.
#[must_use]
pub fn relative_path(root: &Path, path: &Path) -> String {
    to_slash(path.strip_prefix(root).unwrap_or(path))
}
