//! Threshold stage settings.
//!
//! [`ThresholdConfig`] is the plain value saved in sessions;
//! [`ThresholdSettings`] is the live, shared object a running
//! [`ThresholdStage`](crate::stage::ThresholdStage) reads from and that
//! notifies observers when the value changes.

use std::sync::Weak;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::error::SettingsError;
use super::notifier::{ChangeListener, ChangeNotifier, Subscription};
use super::PropertyBag;

/// Property key for the threshold value.
pub const THRESHOLD_KEY: &str = "threshold";

/// Default threshold: the midpoint of an 8-bit band.
pub const DEFAULT_THRESHOLD: f64 = 128.0;

/// Saved form of the threshold settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Samples at or above this value become 255, the rest 0.
    pub threshold: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ThresholdConfig {
    /// Create a config with the given threshold.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Serialize into a property bag.
    pub fn to_properties(&self) -> PropertyBag {
        let mut bag = PropertyBag::new();
        bag.insert(THRESHOLD_KEY.to_string(), self.threshold.to_string());
        bag
    }

    /// Restore from a property bag.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the threshold is missing or not a number.
    pub fn from_properties(bag: &PropertyBag) -> Result<Self, SettingsError> {
        let raw = bag
            .get(THRESHOLD_KEY)
            .ok_or_else(|| SettingsError::MissingProperty(THRESHOLD_KEY.to_string()))?;
        let threshold: f64 = raw.trim().parse().map_err(|_| SettingsError::InvalidProperty {
            key: THRESHOLD_KEY.to_string(),
            value: raw.clone(),
            reason: "expected a number".to_string(),
        })?;
        if threshold.is_nan() {
            return Err(SettingsError::InvalidProperty {
                key: THRESHOLD_KEY.to_string(),
                value: raw.clone(),
                reason: "threshold must not be NaN".to_string(),
            });
        }
        Ok(Self { threshold })
    }
}

/// Live threshold value shared between a stage and its editors.
#[derive(Debug)]
pub struct ThresholdSettings {
    threshold: RwLock<f64>,
    notifier: ChangeNotifier,
}

impl ThresholdSettings {
    /// Create settings from a saved config.
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            threshold: RwLock::new(config.threshold),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Current threshold.
    pub fn threshold(&self) -> f64 {
        *self.threshold.read()
    }

    /// Change the threshold.
    ///
    /// Fires exactly one notification when the value actually changes and
    /// none when it is set to its current value. Returns whether a change
    /// happened.
    pub fn set_threshold(&self, threshold: f64) -> bool {
        {
            let mut current = self.threshold.write();
            if *current == threshold {
                return false;
            }
            *current = threshold;
        }
        self.notifier.notify();
        true
    }

    /// Snapshot for saving.
    pub fn config(&self) -> ThresholdConfig {
        ThresholdConfig::new(self.threshold())
    }

    /// Register a change listener.
    pub fn subscribe(&self, listener: Weak<dyn ChangeListener>) -> Subscription {
        self.notifier.subscribe(listener)
    }
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self::new(ThresholdConfig::default())
    }
}
