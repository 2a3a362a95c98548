//! Per-project directory layout.
//!
//! Every conversion chain gets a fresh workspace under its owner's
//! directory, so no two projects ever share a path:
//!
//! ```text
//! <user>/<workspace>/
//!   source/      original upload, converted file, generated model
//!   generated/   one tree per model stem
//!   dataset/     attached data file
//!   output/      captured execution and image logs
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where uploads land and the converters write
    pub fn source_dir(&self) -> PathBuf {
        self.root.join("source")
    }

    /// Destination of code generation for `stem`
    pub fn generated_dir(&self, stem: &str) -> PathBuf {
        self.root.join("generated").join(stem)
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.root.join("dataset")
    }

    /// Log file for a guarded run (`<stem>-<suffix>.txt`)
    pub fn output_file(&self, stem: &str, suffix: &str) -> PathBuf {
        self.root.join("output").join(format!("{}-{}.txt", stem, suffix))
    }

    /// Subdirectories created along with the workspace
    pub fn subdirs(&self) -> [PathBuf; 4] {
        [
            self.source_dir(),
            self.root.join("generated"),
            self.dataset_dir(),
            self.root.join("output"),
        ]
    }
}
