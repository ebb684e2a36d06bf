use std::path::{Path, PathBuf};

use anyhow::Context;
use manifest_parser::Dependency;
use tracing::debug;

/// A manifest read from disk together with its parsed dependencies.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub dependencies: Vec<Dependency>,
}

impl Document {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        Ok(Self::new(path.to_path_buf(), &text))
    }

    pub fn new(path: PathBuf, text: &str) -> Self {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let dependencies = manifest_parser::parse(&lines);
        debug!(
            "parsed {} dependencies from {}",
            dependencies.len(),
            path.display()
        );
        Self {
            path,
            lines,
            dependencies,
        }
    }

    /// Distinct names of dependencies that carry a usable requirement
    pub fn registry_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .dependencies
            .iter()
            .filter(|dep| dep.parsed_requirements.is_some())
            .map(|dep| dep.name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}
