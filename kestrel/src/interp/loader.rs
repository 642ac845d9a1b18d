//! Module resolution for `require`

use super::error::{InterpResult, RuntimeError};
use crate::ast::Module;
use crate::config::RuntimeConfig;
use crate::parser::parse_source;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolves a package name to a parsed module
pub trait ModuleLoader {
    /// Load `name` on behalf of the module in file `from`
    fn load(&mut self, name: &str, from: Option<&Path>) -> InterpResult<Module>;

    /// Source text of a file this loader read, for diagnostics
    fn source(&self, _file: &str) -> Option<&str> {
        None
    }
}

/// Loads `<name>.<ext>` from the requiring file's directory, then from each
/// search path
#[derive(Debug, Default)]
pub struct FileLoader {
    search_paths: Vec<PathBuf>,
    extension: String,
    sources: FxHashMap<String, String>,
}

impl FileLoader {
    pub fn new(config: &RuntimeConfig) -> Self {
        FileLoader {
            search_paths: config.search_paths.clone(),
            extension: config.extension.clone(),
            sources: FxHashMap::default(),
        }
    }

    fn file_name(&self, name: &str) -> String {
        let suffix = format!(".{}", self.extension);
        if name.ends_with(&suffix) {
            name.to_string()
        } else {
            format!("{name}{suffix}")
        }
    }

    /// Candidate paths in lookup order
    pub fn candidates(&self, name: &str, from: Option<&Path>) -> Vec<PathBuf> {
        let file_name = self.file_name(name);
        let base = from
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        std::iter::once(base)
            .chain(self.search_paths.iter().cloned())
            .map(|dir| dir.join(&file_name))
            .collect()
    }

    /// Remember source text for a file parsed outside the loader (the entry file)
    pub fn add_source(&mut self, file: &str, source: String) {
        self.sources.insert(file.to_string(), source);
    }
}

impl ModuleLoader for FileLoader {
    fn load(&mut self, name: &str, from: Option<&Path>) -> InterpResult<Module> {
        let Some(path) = self.candidates(name, from).into_iter().find(|p| p.is_file()) else {
            return Err(RuntimeError::module_not_found(name));
        };
        let file = path.display().to_string();
        let source = fs::read_to_string(&path)
            .map_err(|e| RuntimeError::io_error(format!("cannot read '{file}': {e}")))?;
        debug!(module = name, path = %file, "loading module");
        let module = parse_source(name, &file, &source)?;
        self.sources.insert(file, source);
        Ok(module)
    }

    fn source(&self, file: &str) -> Option<&str> {
        self.sources.get(file).map(String::as_str)
    }
}

/// Serves modules from in-memory sources, keyed by package name
#[derive(Debug, Default)]
pub struct MemoryLoader {
    sources: FxHashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, name: &str, source: &str) -> Self {
        self.sources.insert(name.to_string(), source.to_string());
        self
    }
}

impl ModuleLoader for MemoryLoader {
    fn load(&mut self, name: &str, _from: Option<&Path>) -> InterpResult<Module> {
        let source = self
            .sources
            .get(name)
            .ok_or_else(|| RuntimeError::module_not_found(name))?;
        Ok(parse_source(name, name, source)?)
    }

    fn source(&self, file: &str) -> Option<&str> {
        self.sources.get(file).map(String::as_str)
    }
}
