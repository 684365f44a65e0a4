//! Scope filtering for repair tickets
//!
//! Bounds the file universe an external fixer is allowed to analyze:
//! - Block globs are always excluded
//! - Allow globs form an inclusive filter applied after blocking
//! - `max_entropy_bits` caps `log2(|scope|)` so the search space (and the
//!   number of fix attempts it implies) stays bounded and reproducible
//!
//! Truncation is deterministic: paths are sorted lexicographically before
//! the cap is applied, so two runs over the same tree always agree.

#![warn(unreachable_pub)]

use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Scope filtering errors
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// The configured root does not exist or is not a directory
    #[error("scope root is not a directory: {0}")]
    RootNotFound(PathBuf),

    /// A block/allow glob failed to compile
    #[error("invalid glob pattern `{pattern}`: {source}")]
    Pattern {
        /// The offending pattern as written
        pattern: String,
        /// Underlying regex compile error
        #[source]
        source: Box<regex::Error>,
    },
}

/// A compiled glob pattern
///
/// Dialect: `*` matches within one path component, `**` matches across
/// components, `?` matches a single non-separator character. Patterns match
/// the full root-relative path with `/` separators.
#[derive(Debug, Clone)]
struct GlobPattern {
    raw: String,
    regex: Regex,
}

impl GlobPattern {
    fn compile(pattern: &str) -> Result<Self, ScopeError> {
        let regex = glob_to_regex(pattern)?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    fn is_match(&self, rel_path: &str) -> bool {
        self.regex.is_match(rel_path)
    }
}

fn glob_to_regex(pattern: &str) -> Result<Regex, ScopeError> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        // `**/` spans zero or more whole components
                        chars.next();
                        re.push_str("(?:[^/]+/)*");
                    } else {
                        re.push_str(".*");
                    }
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            c if r"\.+()[]{}^$|".contains(c) => {
                re.push('\\');
                re.push(c);
            }
            c => re.push(c),
        }
    }
    re.push('$');

    Regex::new(&re).map_err(|source| ScopeError::Pattern {
        pattern: pattern.to_string(),
        source: Box::new(source),
    })
}

/// Filters a repository tree down to the ordered set of allowed file paths
///
/// An empty allow list admits every non-blocked path.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    block: Vec<GlobPattern>,
    allow: Vec<GlobPattern>,
    max_entropy_bits: u32,
}

impl ScopeFilter {
    /// Compile a filter from block/allow globs and an entropy bound
    ///
    /// # Errors
    /// `ScopeError::Pattern` if any glob fails to compile.
    pub fn new<S: AsRef<str>>(
        block: &[S],
        allow: &[S],
        max_entropy_bits: u32,
    ) -> Result<Self, ScopeError> {
        let block = block
            .iter()
            .map(|p| GlobPattern::compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let allow = allow
            .iter()
            .map(|p| GlobPattern::compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            block,
            allow,
            max_entropy_bits,
        })
    }

    /// The configured entropy bound
    #[inline]
    #[must_use]
    pub fn max_entropy_bits(&self) -> u32 {
        self.max_entropy_bits
    }

    /// Maximum number of scope entries implied by the entropy bound
    #[inline]
    #[must_use]
    pub fn max_entries(&self) -> usize {
        if self.max_entropy_bits >= usize::BITS - 1 {
            usize::MAX
        } else {
            1usize << self.max_entropy_bits
        }
    }

    /// Produce the ordered, bounded set of allowed paths under `root`
    ///
    /// Paths are returned relative to `root` with `/` separators. Unreadable
    /// entries are skipped rather than failing the whole scan.
    ///
    /// # Errors
    /// `ScopeError::RootNotFound` if `root` is not a directory.
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, ScopeError> {
        if !root.is_dir() {
            return Err(ScopeError::RootNotFound(root.to_path_buf()));
        }

        let mut paths: Vec<String> = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(root) {
                Ok(r) => r,
                Err(_) => continue,
            };
            let rel_str = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if self.block.iter().any(|p| p.is_match(&rel_str)) {
                continue;
            }
            if !self.allow.is_empty() && !self.allow.iter().any(|p| p.is_match(&rel_str)) {
                continue;
            }
            paths.push(rel_str);
        }

        paths.sort_unstable();

        let cap = self.max_entries();
        if paths.len() > cap {
            tracing::debug!(
                total = paths.len(),
                cap,
                bits = self.max_entropy_bits,
                "scope truncated to entropy bound"
            );
            paths.truncate(cap);
        }

        Ok(paths.into_iter().map(PathBuf::from).collect())
    }
}

/// Search-space entropy of a scope of `count` files, in bits
///
/// Returns 0 for an empty scope. Used by the scheduler and telemetry to
/// report how much uncertainty remains after filtering.
#[inline]
#[must_use]
pub fn entropy_bits(count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        (count as f64).log2()
    }
}
