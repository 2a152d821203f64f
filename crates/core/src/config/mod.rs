use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::observer::{BindingEvent, BindingObserver};
use crate::BindingError;

pub const KEY_WIDTH: &str = "window.fullscreen.width";
pub const KEY_HEIGHT: &str = "window.fullscreen.height";
pub const KEY_MESH_X: &str = "mesh_x";
pub const KEY_MESH_Y: &str = "mesh_y";
pub const KEY_FPS: &str = "fps";
pub const KEY_TEXTURE_SIZE: &str = "texture_size";

/// Largest value that survives the trip into a native `int`.
const MAX_VALUE: u32 = i32::MAX as u32;

/// Strongly typed parameters handed to the native init call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub width: u32,
    pub height: u32,
    pub mesh_x: u32,
    pub mesh_y: u32,
    pub fps: u32,
    pub texture_size: u32,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            mesh_x: 64,
            mesh_y: 32,
            fps: 60,
            texture_size: 512,
        }
    }
}

impl VisualizationConfig {
    /// Arguments in the order the native init entry point expects them.
    pub fn init_args(&self) -> [i32; 6] {
        [
            self.width,
            self.height,
            self.mesh_x,
            self.mesh_y,
            self.fps,
            self.texture_size,
        ]
        .map(|value| value.min(MAX_VALUE) as i32)
    }
}

/// Turns a loosely typed configuration mapping into a [`VisualizationConfig`].
pub struct ConfigAdapter<'a> {
    observer: &'a dyn BindingObserver,
}

impl<'a> ConfigAdapter<'a> {
    pub fn new(observer: &'a dyn BindingObserver) -> Self {
        Self { observer }
    }

    /// Reads every recognised key, substituting defaults for bad entries.
    pub fn adapt(&self, raw: &Map<String, Value>) -> VisualizationConfig {
        let defaults = VisualizationConfig::default();
        VisualizationConfig {
            width: self.field(raw, KEY_WIDTH, defaults.width, true),
            height: self.field(raw, KEY_HEIGHT, defaults.height, true),
            mesh_x: self.field(raw, KEY_MESH_X, defaults.mesh_x, true),
            mesh_y: self.field(raw, KEY_MESH_Y, defaults.mesh_y, true),
            fps: self.field(raw, KEY_FPS, defaults.fps, true),
            // Internally defaulted; hosts rarely set it.
            texture_size: self.field(raw, KEY_TEXTURE_SIZE, defaults.texture_size, false),
        }
    }

    fn field(&self, raw: &Map<String, Value>, key: &str, default: u32, report_missing: bool) -> u32 {
        let outcome = match raw.get(key) {
            None => Err("missing".to_string()),
            Some(value) => parse_positive(value),
        };

        match outcome {
            Ok(value) => value,
            Err(reason) => {
                if report_missing || raw.contains_key(key) {
                    self.observer
                        .on_event(BindingEvent::Absorbed(BindingError::ConfigValueInvalid {
                            key: key.to_string(),
                            reason: format!("{reason}; using default {default}"),
                        }));
                }
                default
            }
        }
    }
}

fn parse_positive(value: &Value) -> std::result::Result<u32, String> {
    let number = match value {
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| format!("`{number}` is not an integer"))?,
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("`{text}` is not an integer"))?,
        other => return Err(format!("expected an integer, found {other}")),
    };

    if number <= 0 || number > i64::from(MAX_VALUE) {
        return Err(format!("{number} is out of range"));
    }
    Ok(number as u32)
}
