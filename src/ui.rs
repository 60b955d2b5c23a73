//! Rendering surface contract. The runtime exposes plain data and action
//! functions; everything visual lives behind this seam.

use std::collections::HashMap;

/// Navigation request handed to the hosting router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavTarget {
    /// Relative or absolute path, e.g. `../add` or `../7/edit`.
    Path(String),
    /// One step back in history.
    Back,
}

/// Seam between the model runtime and the rendering layer: localized strings,
/// navigation and user notifications.
pub trait UiBridge: Send + Sync {
    /// Localize `key`, substituting `{{var}}` placeholders from `vars`.
    fn translate(&self, key: &str, vars: &HashMap<String, String>) -> String {
        let mut out = key.to_string();
        for (name, value) in vars {
            out = out.replace(&format!("{{{{{}}}}}", name), value);
        }
        out
    }

    fn navigate(&self, _target: NavTarget) {}

    /// Surface a success notification to the user.
    fn success(&self, _message: &str) {}
}

/// Bridge that localizes with the default substitution and swallows
/// navigation and notifications. Used headless and in tests.
pub struct NullBridge;

impl UiBridge for NullBridge {}

pub(crate) fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
