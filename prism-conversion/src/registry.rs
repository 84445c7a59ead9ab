//! Processor registry
//!
//! Maps file types to processor instances. New file types are supported by
//! registering another [`Processor`] implementation; the scheduler only ever
//! talks to the registry.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ProcessorError, Result};
use crate::identifier::{FileIdentifier, FileType};
use crate::processor::Processor;

/// Registry of processors keyed by file type
pub struct ProcessorRegistry {
    identifier: FileIdentifier,
    processors: HashMap<FileType, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new(identifier: FileIdentifier) -> Self {
        Self {
            identifier,
            processors: HashMap::new(),
        }
    }

    /// Registers a processor under its own file type, replacing any previous one
    pub fn register(&mut self, processor: Arc<dyn Processor>) -> &mut Self {
        self.processors.insert(processor.file_type(), processor);
        self
    }

    /// Registered file types
    pub fn file_types(&self) -> Vec<FileType> {
        let mut types: Vec<_> = self.processors.keys().copied().collect();
        types.sort_by_key(|t| t.to_string());
        types
    }

    /// Processor for a file type, if any
    pub fn get(&self, file_type: FileType) -> Option<Arc<dyn Processor>> {
        self.processors.get(&file_type).cloned()
    }

    /// Identifies `path` and returns the processor for it
    pub fn resolve(&self, path: &Path) -> Result<Arc<dyn Processor>> {
        let file_type = self.identifier.identify(path);
        self.get(file_type)
            .ok_or_else(|| ProcessorError::Unsupported {
                file_type,
                operation: "processing".to_string(),
            })
    }
}
