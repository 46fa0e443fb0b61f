use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables shared by the view builders and the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Initial per-scope cap for the degree-capped view.
    pub node_cap: usize,
    /// Amount "reveal more" adds to a scope's cap.
    pub node_cap_step: usize,
    /// Zoom level at or above which every label is drawn.
    pub label_zoom_threshold: f64,
    pub label_line_length: usize,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub fit_padding: f64,
    /// Number of (scope, expansion) layouts remembered in manual cluster mode.
    pub layout_memory_capacity: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            node_cap: 300,
            node_cap_step: 200,
            label_zoom_threshold: 0.65,
            label_line_length: 18,
            min_zoom: 0.2,
            max_zoom: 2.5,
            fit_padding: 40.0,
            layout_memory_capacity: 16,
        }
    }
}

impl ViewConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(raw).map_err(|e| GraphError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_cap == 0 {
            return Err(GraphError::Config("node_cap must be positive".to_string()));
        }
        if self.node_cap_step == 0 {
            return Err(GraphError::Config(
                "node_cap_step must be positive".to_string(),
            ));
        }
        if self.layout_memory_capacity == 0 {
            return Err(GraphError::Config(
                "layout_memory_capacity must be positive".to_string(),
            ));
        }
        if !(self.min_zoom > 0.0 && self.max_zoom > 0.0) {
            return Err(GraphError::Config("zoom bounds must be positive".to_string()));
        }
        if self.min_zoom > self.max_zoom {
            return Err(GraphError::Config(format!(
                "min_zoom {} exceeds max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        Ok(())
    }

    pub fn clamp_zoom(&self, level: f64) -> f64 {
        level.clamp(self.min_zoom, self.max_zoom)
    }
}
