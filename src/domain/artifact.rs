//! Artifacts produced by pipeline stages.
//!
//! An artifact is a file or directory that one stage produces and the next
//! consumes. It is identified by a logical name and a storage path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Reference to a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Logical name (usually the file name)
    pub name: String,

    /// Location on disk
    pub path: PathBuf,
}

impl ArtifactRef {
    /// Create a reference with an explicit logical name
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Create a reference named after the last path component
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { name, path }
    }

    /// Logical name without its extension (`model.thingml` -> `model`)
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_uses_file_name() {
        let artifact = ArtifactRef::from_path("/tmp/u1/model_converted.xml");

        assert_eq!(artifact.name, "model_converted.xml");
        assert_eq!(artifact.path, PathBuf::from("/tmp/u1/model_converted.xml"));
    }

    #[test]
    fn test_stem_strips_extension() {
        let artifact = ArtifactRef::from_path("/tmp/u1/model.thingml");
        assert_eq!(artifact.stem(), "model");

        let dir = ArtifactRef::new("model", "/tmp/u1/model");
        assert_eq!(dir.stem(), "model");
    }

    #[test]
    fn test_artifact_serialization() {
        let artifact = ArtifactRef::new("a.xml", "/data/a.xml");

        let json = serde_json::to_string(&artifact).unwrap();
        let parsed: ArtifactRef = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, artifact);
    }
}
