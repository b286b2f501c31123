//! Settings objects, change notification and session persistence.
//!
//! Live settings ([`ThresholdSettings`]) are shared between the stage that
//! reads them and whatever edits them, and fire a notification per change so
//! observing channels reprocess. Saved sessions use plain serde value types
//! ([`SessionConfig`] and friends) that know how to build the live objects.

mod error;
mod notifier;
mod session;
mod threshold;

use std::collections::BTreeMap;

pub use error::SettingsError;
pub use notifier::{ChangeListener, ChangeNotifier, Subscription};
pub use session::{
    BuildContext, CompositeConfig, PipelineConfig, SessionConfig, SourceConfig, StageConfig,
    WindowConfig,
};
pub use threshold::{ThresholdConfig, ThresholdSettings, DEFAULT_THRESHOLD, THRESHOLD_KEY};

/// Flat string key/value store used to save and restore settings.
pub type PropertyBag = BTreeMap<String, String>;
