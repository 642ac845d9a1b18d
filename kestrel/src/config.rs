//! Runtime configuration

use crate::interp::GcPolicy;
use std::path::PathBuf;

/// Default limit on nested user-function calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

/// Extension of Kestrel source files, without the dot
pub const SOURCE_EXTENSION: &str = "ks";

/// Knobs for one interpreter instance
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub gc_policy: GcPolicy,
    pub max_call_depth: usize,
    /// Directories searched by `require` after the requiring file's own directory
    pub search_paths: Vec<PathBuf>,
    pub extension: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            gc_policy: GcPolicy::default(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            search_paths: Vec::new(),
            extension: SOURCE_EXTENSION.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn with_gc_threshold(mut self, threshold: Option<usize>) -> Self {
        self.gc_policy = match threshold {
            Some(n) if n > 0 => GcPolicy::Threshold(n),
            _ => GcPolicy::EveryAllocation,
        };
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_search_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.search_paths.extend(paths);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.gc_policy, GcPolicy::EveryAllocation);
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
        assert_eq!(config.extension, "ks");
        assert!(config.search_paths.is_empty());
    }

    #[test]
    fn test_gc_threshold_builder() {
        let config = RuntimeConfig::default().with_gc_threshold(Some(64));
        assert_eq!(config.gc_policy, GcPolicy::Threshold(64));
        let config = config.with_gc_threshold(Some(0));
        assert_eq!(config.gc_policy, GcPolicy::EveryAllocation);
    }

    #[test]
    fn test_search_paths_accumulate() {
        let config = RuntimeConfig::default()
            .with_search_paths([PathBuf::from("lib")])
            .with_search_paths([PathBuf::from("vendor")]);
        assert_eq!(config.search_paths.len(), 2);
    }
}
