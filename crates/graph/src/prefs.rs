use crate::error::{GraphError, Result};
use gitreader_protocol::GraphLayoutMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// User preferences persisted between sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub layout_mode: GraphLayoutMode,
}

impl Preferences {
    /// Missing or unreadable files fall back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                log::warn!("Failed to read preferences {}: {err}", path.display());
                return Self::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(prefs) => prefs,
            Err(err) => {
                log::warn!("Ignoring corrupt preferences {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Parses a user-supplied layout mode (`cluster`, `layer` or `free`).
pub fn parse_layout_mode(raw: &str) -> Result<GraphLayoutMode> {
    raw.parse::<GraphLayoutMode>()
        .map_err(|_| GraphError::InvalidLayoutMode(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let prefs = Preferences {
            layout_mode: GraphLayoutMode::Layer,
        };
        prefs.save(&path).unwrap();
        assert_eq!(Preferences::load_or_default(&path), prefs);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"layout_mode\": \"layer\""));
    }

    #[test]
    fn layout_mode_parsing_reports_bad_input() {
        assert_eq!(parse_layout_mode("layer").unwrap(), GraphLayoutMode::Layer);
        let err = parse_layout_mode("spiral").unwrap_err();
        assert!(matches!(err, GraphError::InvalidLayoutMode(ref mode) if mode == "spiral"));
    }

    #[test]
    fn missing_or_corrupt_files_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        assert_eq!(Preferences::load_or_default(&path).layout_mode, GraphLayoutMode::Cluster);
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(Preferences::load_or_default(&path), Preferences::default());
    }
}
