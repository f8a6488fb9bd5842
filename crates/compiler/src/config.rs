//! Build configuration.
//!
//! `BuildConfig` is the programmatic surface used by the driver; an optional
//! `ferro.toml` next to the source (or named explicitly) supplies project
//! defaults, and command-line flags override both.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Emit MIPS assembly after the IR file (`--ir` turns this off).
    pub emit_asm: bool,
    /// Output directory; `ir/` and `asm/` are created beneath it.
    pub out_dir: PathBuf,
    /// Treat warnings as fatal.
    pub deny_warnings: bool,
}

impl BuildConfig {
    pub fn new() -> Self {
        BuildConfig {
            emit_asm: true,
            out_dir: PathBuf::from("output"),
            deny_warnings: false,
        }
    }

    pub fn with_emit_asm(mut self, emit_asm: bool) -> Self {
        self.emit_asm = emit_asm;
        self
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    pub fn with_deny_warnings(mut self, deny_warnings: bool) -> Self {
        self.deny_warnings = deny_warnings;
        self
    }

    /// Fill in defaults from a project file; explicit CLI flags are applied
    /// on top by the caller.
    pub fn apply_project(&mut self, project: &ProjectConfig) {
        if let Some(emit_asm) = project.emit_asm {
            self.emit_asm = emit_asm;
        }
        if let Some(out_dir) = &project.out_dir {
            self.out_dir = out_dir.clone();
        }
        if let Some(deny_warnings) = project.deny_warnings {
            self.deny_warnings = deny_warnings;
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Contents of an optional `ferro.toml` project file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    pub emit_asm: Option<bool>,
    pub out_dir: Option<PathBuf>,
    pub deny_warnings: Option<bool>,
}

impl ProjectConfig {
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("Failed to parse project config: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&text)
    }

    /// `ferro.toml` sitting next to the given source file, if present.
    pub fn find_near(source: &Path) -> Option<PathBuf> {
        let candidate = source.parent()?.join("ferro.toml");
        candidate.is_file().then_some(candidate)
    }
}
