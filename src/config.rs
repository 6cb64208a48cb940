use serde::{Deserialize, Serialize};

/// Call origin of the console's completion machinery. Writes it issues while
/// building suggestions are not host activity.
pub const CONSOLE_COMPLETION_ORIGIN: &str = "InjectedScript.getCompletions";

/// Observer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Fields never hooked. The stringification hook is used by the observer
    /// itself to label objects; the linkage field is structural.
    pub field_deny_list: Vec<String>,
    /// A write whose call origin contains one of these verbatim is noise.
    pub noise_deny_list: Vec<String>,
    /// Attach interception shims to objects assigned after setup.
    pub wrap_late_values: bool,
    /// Log every recorded write at `info` instead of `trace`.
    pub log_writes: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            field_deny_list: vec!["toString".to_string(), "__proto__".to_string()],
            noise_deny_list: vec![CONSOLE_COMPLETION_ORIGIN.to_string()],
            wrap_late_values: true,
            log_writes: false,
        }
    }
}

impl ObserverConfig {
    /// Parse from JSON. Missing keys take their default.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn with_denied_field(mut self, field: impl Into<String>) -> Self {
        self.field_deny_list.push(field.into());
        self
    }

    #[must_use]
    pub fn with_noise_origin(mut self, origin: impl Into<String>) -> Self {
        self.noise_deny_list.push(origin.into());
        self
    }

    #[must_use]
    pub fn with_late_wrapping(mut self, enabled: bool) -> Self {
        self.wrap_late_values = enabled;
        self
    }

    #[must_use]
    pub fn with_write_logging(mut self, enabled: bool) -> Self {
        self.log_writes = enabled;
        self
    }
}
