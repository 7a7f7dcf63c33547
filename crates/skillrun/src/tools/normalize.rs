//! Tool-name normalization applied before reporting and lookup
//!
//! Some providers append a control suffix to function names
//! (`read_file<|channel|>commentary`). The suffix is cut at a fixed
//! delimiter before the name reaches the executor.

/// Maps a model-supplied function name to the name used for dispatch
pub trait ToolNameNormalizer: Send + Sync {
    fn normalize<'a>(&self, name: &'a str) -> &'a str;
}

/// Truncate at the first occurrence of a delimiter
#[derive(Debug, Clone)]
pub struct SuffixDelimiter {
    delimiter: String,
}

impl SuffixDelimiter {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }
}

impl Default for SuffixDelimiter {
    fn default() -> Self {
        Self::new("<|")
    }
}

impl ToolNameNormalizer for SuffixDelimiter {
    fn normalize<'a>(&self, name: &'a str) -> &'a str {
        match name.find(&self.delimiter) {
            Some(idx) => &name[..idx],
            None => name,
        }
    }
}

/// Leave names untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbatim;

impl ToolNameNormalizer for Verbatim {
    fn normalize<'a>(&self, name: &'a str) -> &'a str {
        name
    }
}
