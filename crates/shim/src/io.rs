//! Settings File IO
//!
//! Reads and writes settings trees from disk. Files ending in `.json` use
//! JSON; everything else is TOML.

use std::fs;
use std::path::Path;

use shim_types::Setting;
use tracing::{debug, info};

use crate::error::Result;

/// On-disk document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

/// Read and parse a settings file
pub fn read_tree(path: impl AsRef<Path>) -> Result<Setting> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let tree = match Format::from_path(path) {
        Format::Json => Setting::parse_json(&content)?,
        Format::Toml => Setting::parse_toml(&content)?,
    };
    info!("Loaded settings from: {}", path.display());
    Ok(tree)
}

/// Serialize a settings tree and write it, creating parent directories
pub fn write_tree(path: impl AsRef<Path>, tree: &Setting) -> Result<()> {
    let path = path.as_ref();
    let content = match Format::from_path(path) {
        Format::Json => tree.to_json_string()?,
        Format::Toml => tree.to_toml_string()?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    debug!(bytes = tree.len(), "settings written");
    info!("Saved settings to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::error::ShimError;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_path(Path::new("cfg/a.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("cfg/a.JSON")), Format::Json);
        assert_eq!(Format::from_path(Path::new("cfg/a.toml")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("cfg/a.cfg")), Format::Toml);
    }

    #[test]
    fn test_write_then_read_both_formats() {
        let dir = TempDir::new().unwrap();
        let tree = Setting::parse_toml("ver = 2\n[app]\nlog_path = \"/tmp\"\n").unwrap();

        for name in ["nested/out.toml", "nested/out.json"] {
            let path = dir.path().join(name);
            write_tree(&path, &tree).unwrap();
            assert_eq!(read_tree(&path).unwrap(), tree);
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_tree(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ShimError::Io(_)));
    }
}
