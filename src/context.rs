// File: ./src/context.rs
/*! Application context abstraction for filesystem paths.

The only file this crate reads from disk is `config.toml`, so the context
answers a single question: where does configuration live.

- `StandardContext`: uses `directories::ProjectDirs`, or an override root
  (handed in by the mobile host, which owns its sandbox directory).
- `TestContext`: a temporary directory removed on drop.

There is no global accessor. Callers pass `&dyn AppContext`
(or a `SharedContext`) to anything that touches the filesystem.
*/

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Defines the file system context for the application.
///
/// The trait is object-safe so callers can hold `Arc<dyn AppContext>`.
pub trait AppContext: Send + Sync + std::fmt::Debug {
    fn get_config_dir(&self) -> Result<PathBuf>;

    fn get_config_file_path(&self) -> Result<PathBuf> {
        Ok(self.get_config_dir()?.join(CONFIG_FILE_NAME))
    }
}

// --- Production Implementation ---

#[derive(Clone, Debug)]
pub struct StandardContext {
    override_root: Option<PathBuf>,
}

impl StandardContext {
    /// When `override_root` is `Some(path)`, configuration is read from
    /// `path/config` instead of the platform config directory.
    pub fn new(override_root: Option<PathBuf>) -> Self {
        Self { override_root }
    }

    fn ensure_exists(path: PathBuf) -> Result<PathBuf> {
        if !path.exists() {
            std::fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(path)
    }
}

impl AppContext for StandardContext {
    fn get_config_dir(&self) -> Result<PathBuf> {
        if let Some(root) = &self.override_root {
            return Self::ensure_exists(root.join("config"));
        }
        let proj = ProjectDirs::from("com", "appshell", "appshell")
            .ok_or_else(|| anyhow::anyhow!("No home directory"))?;
        Self::ensure_exists(proj.config_dir().to_path_buf())
    }
}

// --- Test Implementation ---

#[derive(Clone, Debug)]
pub struct TestContext {
    pub root: PathBuf,
}

impl TestContext {
    /// Creates a new TestContext backed by a unique temporary directory.
    pub fn new() -> Self {
        let root = std::env::temp_dir().join(format!("appshell_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).expect("failed to create TestContext temp dir");
        Self { root }
    }

    /// Writes `contents` as the config file of this context.
    pub fn write_config(&self, contents: &str) -> Result<PathBuf> {
        let path = self.get_config_file_path()?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write test config: {:?}", path))?;
        Ok(path)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContext for TestContext {
    fn get_config_dir(&self) -> Result<PathBuf> {
        let p = self.root.join("config");
        std::fs::create_dir_all(&p)?;
        Ok(p)
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        // Best-effort cleanup; ignore errors.
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

pub type SharedContext = std::sync::Arc<dyn AppContext>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_config_path_lives_under_root() {
        let ctx = TestContext::new();
        let path = ctx.get_config_file_path().unwrap();
        assert!(path.starts_with(&ctx.root));
        assert!(path.ends_with(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_context_removes_root_on_drop() {
        let root = {
            let ctx = TestContext::new();
            ctx.write_config("api_url = \"http://x\"").unwrap();
            ctx.root.clone()
        };
        assert!(!root.exists());
    }

    #[test]
    fn standard_context_honours_override_root() {
        let tmp = TestContext::new();
        let ctx = StandardContext::new(Some(tmp.root.clone()));
        let dir = ctx.get_config_dir().unwrap();
        assert_eq!(dir, tmp.root.join("config"));
        assert!(dir.exists());
    }
}
