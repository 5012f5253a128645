//! Settings file
//!
//! Triggers are built in code by the embedding application. The settings
//! file only carries what is tuned per machine: logging, device rules and
//! motion recognition constants.

use crate::error::{TriggerError, TriggerResult};
use crate::handlers::motion::{default_speed_thresholds, MotionTriggerHandler, SpeedThreshold};
use crate::input::{InputDeviceProperties, InputDeviceRule};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub log_filter: Option<String>,
    /// Applied in order of priority, the first rule wins
    pub device_rules: Vec<InputDeviceRule>,
    /// Properties for devices with an exact name, applied after the rules
    pub device_properties: HashMap<String, InputDeviceProperties>,
    pub motion: MotionSettings,
}

/// Tunables shared by every motion handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    pub swipe_delta_multiplier: f64,
    pub input_events_to_sample: u8,
    pub speed_thresholds: Vec<SpeedThreshold>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: None,
            device_rules: Vec::new(),
            device_properties: HashMap::new(),
            motion: MotionSettings::default(),
        }
    }
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            swipe_delta_multiplier: 1.0,
            input_events_to_sample: 3,
            speed_thresholds: default_speed_thresholds(),
        }
    }
}

impl MotionSettings {
    pub fn apply(&self, handler: &mut MotionTriggerHandler) {
        handler.swipe_delta_multiplier = self.swipe_delta_multiplier;
        handler.input_events_to_sample = self.input_events_to_sample.max(1);
        for threshold in &self.speed_thresholds {
            handler.set_speed_threshold(*threshold);
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> TriggerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> TriggerResult<Self> {
        let settings: Settings = serde_json::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> TriggerResult<()> {
        if !self.motion.swipe_delta_multiplier.is_finite() {
            return Err(TriggerError::Config("swipe_delta_multiplier must be finite".into()));
        }
        if let Some(threshold) = self
            .motion
            .speed_thresholds
            .iter()
            .find(|threshold| threshold.threshold.is_nan() || threshold.threshold < 0.0)
        {
            return Err(TriggerError::Config(format!(
                "invalid speed threshold {} for {:?}",
                threshold.threshold, threshold.trigger_type
            )));
        }
        Ok(())
    }
}
