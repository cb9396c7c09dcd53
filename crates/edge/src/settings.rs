use domain::setting::Settings;
use std::path::Path;
use tracing::debug;

use crate::EdgeError;

pub const SETTINGS_FILE: &str = "quire.toml";

/// Load `<dir>/quire.toml`. A missing file means defaults.
#[tracing::instrument(skip_all)]
pub fn load_settings(dir: &Path) -> Result<Settings, EdgeError> {
    if !dir.is_dir() {
        return Err(EdgeError::Config(format!(
            "Project directory does not exist: {}",
            dir.display()
        )));
    }

    let path = dir.join(SETTINGS_FILE);
    if !path.exists() {
        debug!("{} not found; using defaults", path.display());
        return Ok(Settings::default());
    }

    let text = std::fs::read_to_string(&path).map_err(|err| {
        EdgeError::Config(format!("Failed reading {}: {}", path.display(), err))
    })?;

    toml::from_str(&text).map_err(|err| {
        EdgeError::Config(format!(
            "Invalid {SETTINGS_FILE} at {}: {}",
            path.display(),
            err
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let s = load_settings(dir.path()).unwrap();
        assert_eq!(s.content.dir, PathBuf::from("src/content"));
        assert_eq!(s.watch.debounce_ms, 40);
    }

    #[test]
    fn reads_sections() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            "[content]\ndir = \"content\"\n\n[cache]\nttl_secs = 5\n\n[[collections]]\nname = \"blog\"\nfilePattern = \"{slug}/index.md\"\n",
        )
        .unwrap();
        let s = load_settings(dir.path()).unwrap();
        assert_eq!(s.content.dir, PathBuf::from("content"));
        assert_eq!(s.cache.ttl_secs, 5);
        assert_eq!(s.collections[0].file_pattern.as_deref(), Some("{slug}/index.md"));
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "[content\n").unwrap();
        assert!(matches!(load_settings(dir.path()), Err(EdgeError::Config(_))));
        let missing = dir.path().join("nope");
        assert!(matches!(load_settings(&missing), Err(EdgeError::Config(_))));
    }
}
