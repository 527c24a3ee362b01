//! Shared library loading
//!
//! An instance declaration may name a `library` that provides its class.
//! The library is looked up as the platform file name in every configured
//! search path and, once loaded, stays loaded for the rest of the process:
//! the factories and cast edges it registers live in process-wide registries.
//! Libraries publish their classes through [`crate::export_components!`].

use crate::bean_factory::FactoryRegistry;
use crate::cast::CastRegistry;
use crate::error::{ContainerError, ContainerResult};
use crate::plugin::{ComponentEntry, ComponentHost, EntryStatus, ENTRY_SYMBOL};
use libloading::{Library, Symbol};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};

static LOADED_LIBRARIES: Lazy<Mutex<HashMap<String, Library>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Platform file name of library `name`, e.g. `libname.so`
pub fn library_file_name(name: &str) -> String {
    format!("{}{}{}", DLL_PREFIX, name, DLL_SUFFIX)
}

pub fn is_loaded(name: &str) -> bool {
    LOADED_LIBRARIES.lock().contains_key(name)
}

/// Names of all libraries loaded so far, sorted
pub fn loaded_libraries() -> Vec<String> {
    let mut names: Vec<_> = LOADED_LIBRARIES.lock().keys().cloned().collect();
    names.sort();
    names
}

/// Loads libraries from an ordered list of search paths
#[derive(Debug, Clone, Default)]
pub struct LibraryLoader {
    paths: Vec<PathBuf>,
}

impl LibraryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_path(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Load library `name` unless some loader already did
    ///
    /// Every search path is tried in order and the first success wins. When
    /// all of them fail, the error carries one failure per path. Once opened,
    /// the library's exported components are published to the global
    /// registries.
    pub fn load(&self, name: &str) -> ContainerResult<()> {
        if is_loaded(name) {
            tracing::debug!("Library {} is already loaded", name);
            return Ok(());
        }

        if self.paths.is_empty() {
            return Err(ContainerError::LibraryLoad {
                library: name.to_string(),
                failures: vec!["no library path has been specified".to_string()],
            });
        }

        let file_name = library_file_name(name);
        let mut failures = Vec::with_capacity(self.paths.len());

        for dir in &self.paths {
            let path = dir.join(&file_name);
            match Self::open(&path) {
                Ok(library) => {
                    tracing::info!("Loaded library {} from {}", name, path.display());
                    return Self::register(name, library);
                }
                Err(e) => {
                    tracing::debug!("Failed to load {}: {}", path.display(), e);
                    failures.push(format!("{}: {}", path.display(), e));
                }
            }
        }

        Err(ContainerError::LibraryLoad {
            library: name.to_string(),
            failures,
        })
    }

    fn open(path: &Path) -> Result<Library, libloading::Error> {
        // SAFETY: loading a library runs its initializers. Libraries named by
        // the factory document are trusted to be built against this crate.
        unsafe { Library::new(path) }
    }

    /// Run the library's entry point and keep the library mapped
    ///
    /// No lock is held while library code runs.
    fn register(name: &str, library: Library) -> ContainerResult<()> {
        let host = ComponentHost::new();

        let status = {
            // SAFETY: the symbol is emitted by `export_components!` with the
            // `ComponentEntry` signature.
            let entry: Symbol<ComponentEntry> = unsafe { library.get(ENTRY_SYMBOL) }.map_err(|e| {
                ContainerError::LibraryLoad {
                    library: name.to_string(),
                    failures: vec![format!("missing entry symbol weave_components_entry: {}", e)],
                }
            })?;

            // SAFETY: `host` outlives the call and has the layout the entry expects.
            unsafe { entry(&host) }
        };

        // Factories may point into the library from here on
        LOADED_LIBRARIES
            .lock()
            .entry(name.to_string())
            .or_insert(library);

        if status != EntryStatus::Ok {
            return Err(ContainerError::LibraryLoad {
                library: name.to_string(),
                failures: vec![format!("component entry failed with status {:?}", status)],
            });
        }

        let published = host.publish(FactoryRegistry::global(), CastRegistry::global())?;
        tracing::debug!("{} classes published by library {}", published, name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_no_paths() {
        let error = LibraryLoader::new().load("weave-missing").unwrap_err();

        assert_eq!(error.kind(), ErrorKind::LibraryLoad);
        assert!(error.to_string().contains("no library path has been specified"));
    }

    #[test]
    fn test_failures_are_aggregated() {
        let loader = LibraryLoader::with_paths(["/nonexistent/first", "/nonexistent/second"]);

        match loader.load("weave-missing").unwrap_err() {
            ContainerError::LibraryLoad { library, failures } => {
                assert_eq!(library, "weave-missing");
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("/nonexistent/first"));
                assert!(failures[1].starts_with("/nonexistent/second"));
            }
            other => panic!("unexpected error: {}", other),
        }

        assert!(!is_loaded("weave-missing"));
        assert!(LOADED_LIBRARIES.try_lock().is_some());
    }

    #[test]
    fn test_library_file_name() {
        let file_name = library_file_name("plugin");
        assert!(file_name.contains("plugin"));
        assert!(file_name.ends_with(DLL_SUFFIX));

        #[cfg(target_os = "linux")]
        assert_eq!(file_name, "libplugin.so");
    }
}
