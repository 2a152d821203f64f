use std::path::{Path, PathBuf};

use projectm_bridge_core::{
    default_search_paths, ConfigAdapter, SymbolCandidates, TracingObserver, VisualizationConfig,
};
use serde_json::{Map, Value};

/// Everything the host needs before opening the binding.
#[derive(Debug, Clone)]
pub struct HostSettings {
    pub visual: VisualizationConfig,
    pub candidates: SymbolCandidates,
    pub search_paths: Vec<PathBuf>,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            visual: VisualizationConfig::default(),
            candidates: SymbolCandidates::default(),
            search_paths: default_search_paths(),
        }
    }
}

impl HostSettings {
    /// Reads a JSON settings file with optional `projectm`, `symbols` and
    /// `library_paths` sections. A missing file means defaults.
    pub fn load(path: Option<&Path>) -> projectm_bridge_core::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::warn!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        tracing::info!(path = %path.display(), "loaded settings");
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        let observer = TracingObserver;
        let empty = Map::new();
        let section = value
            .get("projectm")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let visual = ConfigAdapter::new(&observer).adapt(section);

        let candidates = match value.get("symbols") {
            Some(symbols) => serde_json::from_value(symbols.clone()).unwrap_or_else(|err| {
                tracing::warn!(%err, "ignoring malformed symbol overrides");
                SymbolCandidates::default()
            }),
            None => SymbolCandidates::default(),
        };

        let search_paths = value
            .get("library_paths")
            .and_then(Value::as_array)
            .map(|paths| {
                paths
                    .iter()
                    .filter_map(Value::as_str)
                    .map(PathBuf::from)
                    .collect::<Vec<_>>()
            })
            .filter(|paths| !paths.is_empty())
            .unwrap_or_else(default_search_paths);

        Self {
            visual,
            candidates,
            search_paths,
        }
    }

    /// Puts explicitly requested libraries ahead of the configured list.
    pub fn prepend_paths(&mut self, extra: &[PathBuf]) {
        if extra.is_empty() {
            return;
        }
        let mut paths = extra.to_vec();
        paths.append(&mut self.search_paths);
        self.search_paths = paths;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_every_section() {
        let settings = HostSettings::from_value(&json!({
            "projectm": { "fps": 30, "mesh_x": 32 },
            "symbols": { "init": ["my_init"] },
            "library_paths": ["/opt/projectM/libprojectM.so"],
        }));

        assert_eq!(settings.visual.fps, 30);
        assert_eq!(settings.visual.mesh_x, 32);
        assert_eq!(settings.visual.width, 1280);
        assert_eq!(settings.candidates.init, vec!["my_init".to_string()]);
        assert_eq!(
            settings.search_paths,
            vec![PathBuf::from("/opt/projectM/libprojectM.so")]
        );
    }

    #[test]
    fn malformed_sections_fall_back() {
        let settings = HostSettings::from_value(&json!({
            "symbols": 42,
            "library_paths": [],
        }));

        assert_eq!(settings.candidates, SymbolCandidates::default());
        assert_eq!(settings.search_paths, default_search_paths());
    }

    #[test]
    fn cli_paths_come_first() {
        let mut settings = HostSettings::from_value(&json!({
            "library_paths": ["/b.so"],
        }));
        settings.prepend_paths(&[PathBuf::from("/a.so")]);

        assert_eq!(
            settings.search_paths,
            vec![PathBuf::from("/a.so"), PathBuf::from("/b.so")]
        );
    }

    #[test]
    fn missing_file_means_defaults() {
        let settings =
            HostSettings::load(Some(Path::new("/definitely/not/here.json"))).unwrap();
        assert_eq!(settings.visual, VisualizationConfig::default());
    }
}
