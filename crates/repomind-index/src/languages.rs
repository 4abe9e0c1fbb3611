//! Extension-based language tagging. The tag is descriptive metadata only.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    Python,
    Java,
    JavaScriptTypeScript,
    Markdown,
    CCpp,
    Go,
    Rust,
    Json,
    Xml,
    Unknown,
}

impl Lang {
    /// Identifier stored in the chunk payload.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Java => "java",
            Self::JavaScriptTypeScript => "javascript/typescript",
            Self::Markdown => "markdown",
            Self::CCpp => "c/cpp",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Unknown => "unknown",
        }
    }
}

/// Map a path to its language by extension, ignoring case.
#[must_use]
pub fn detect_language(path: &Path) -> Lang {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return Lang::Unknown;
    };
    match ext.to_ascii_lowercase().as_str() {
        "py" => Lang::Python,
        "java" => Lang::Java,
        "js" | "ts" => Lang::JavaScriptTypeScript,
        "md" | "markdown" => Lang::Markdown,
        "c" | "cpp" => Lang::CCpp,
        "go" => Lang::Go,
        "rs" => Lang::Rust,
        "json" => Lang::Json,
        "xml" => Lang::Xml,
        _ => Lang::Unknown,
    }
}
