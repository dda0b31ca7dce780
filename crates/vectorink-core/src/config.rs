//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// View parameters used to convert millimeters to model units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Device resolution in dots per inch.
    pub dpi: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            dpi: 96.0,
            min_zoom: 0.05,
            max_zoom: 40.0,
        }
    }
}

/// Tolerances of the select command, in millimeters on screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectConfig {
    pub hit_test_tol_mm: f64,
    pub handle_tol_mm: f64,
    pub drag_threshold_mm: f64,
    pub clone_offset_mm: f64,
    pub can_rotate_handle: bool,
    pub rotate_handle_offset_mm: f64,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            hit_test_tol_mm: 10.0,
            handle_tol_mm: 8.0,
            drag_threshold_mm: 2.0,
            clone_offset_mm: 10.0,
            can_rotate_handle: true,
            rotate_handle_offset_mm: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// Shorter strokes are discarded.
    pub min_length_mm: f64,
    /// Commands that switch back to `select` after committing a shape.
    pub one_shape_commands: Vec<String>,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            min_length_mm: 2.0,
            one_shape_commands: Vec::new(),
        }
    }
}

impl DrawConfig {
    pub fn is_one_shape(&self, name: &str) -> bool {
        self.one_shape_commands.iter().any(|n| n == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    pub enabled: bool,
    pub tolerance_mm: f64,
    /// Grid spacing in model units. `None` disables grid snapping.
    pub grid: Option<f64>,
    /// Snap to vertices, centers and other handle points.
    pub points: bool,
    /// Snap to the nearest point on a shape outline.
    pub near: bool,
    /// Snap to perpendicular feet from the previous vertex.
    pub perpendicular: bool,
    pub intersections: bool,
    /// Align to the x or y of other shapes' handles.
    pub same_axis: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance_mm: 4.0,
            grid: None,
            points: true,
            near: true,
            perpendicular: true,
            intersections: true,
            same_axis: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    /// The records index is flushed every this many steps.
    pub index_interval: u32,
    /// Pretty-print journal files.
    pub pretty: bool,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            index_interval: 10,
            pretty: false,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub view: ViewConfig,
    pub select: SelectConfig,
    pub draw: DrawConfig,
    pub snap: SnapConfig,
    pub record: RecordConfig,
}

impl EngineConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert!((config.select.handle_tol_mm - 8.0).abs() < f64::EPSILON);
        assert!((config.view.dpi - 96.0).abs() < f64::EPSILON);
        assert_eq!(config.record.index_interval, 10);
        assert!(config.snap.grid.is_none());
    }

    #[test]
    fn test_partial_override() {
        let config =
            EngineConfig::from_json(r#"{"snap": {"grid": 5.0}, "draw": {"one_shape_commands": ["line"]}}"#)
                .unwrap();
        assert_eq!(config.snap.grid, Some(5.0));
        assert!(config.snap.enabled);
        assert!(config.draw.is_one_shape("line"));
        assert!(!config.draw.is_one_shape("rect"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"record": {"pretty": true}}"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert!(config.record.pretty);

        let missing = EngineConfig::load(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
