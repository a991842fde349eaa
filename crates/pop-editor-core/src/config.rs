//! Configuration for the field editor
//!
//! Values can come from a JSON document (all keys optional) or from
//! environment variables layered over the defaults.

use std::str::FromStr;

use pop_pdf::{FieldPosition, StampStyle};
use serde::{Deserialize, Serialize};

use crate::error::EditorError;

/// What happens to a field's stored position when a page finishes rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Keep positions the user already dragged; only unknown fields get the
    /// reference position
    #[default]
    PreserveDragged,
    /// Every declared field goes back to the reference position
    ResetOnRender,
}

impl FromStr for ResetPolicy {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "preserve_dragged" | "preserve" => Ok(ResetPolicy::PreserveDragged),
            "reset_on_render" | "reset" => Ok(ResetPolicy::ResetOnRender),
            other => Err(EditorError::Config(format!("Unknown reset policy: {}", other))),
        }
    }
}

/// Page that receives the stamped text on export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPage {
    #[default]
    First,
    /// The page currently rendered (falls back to the first page)
    Current,
    /// A fixed 1-indexed page
    Page(u32),
}

/// Text drawn for each field on export
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampText {
    /// The field's id
    #[default]
    FieldId,
    /// The same text for every field
    Fixed(String),
}

impl StampText {
    pub fn for_field<'a>(&'a self, field_id: &'a str) -> &'a str {
        match self {
            StampText::FieldId => field_id,
            StampText::Fixed(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Points subtracted from the converted y so stamped text sits on the
    /// marker's top edge; tuned for the default 11pt stamp
    pub baseline_offset: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub initial_scale: f64,
    /// Degrees, multiple of 90
    pub initial_rotation: i64,
    pub initial_page: u32,
    pub reset_policy: ResetPolicy,
    /// Fail exports for fields without a recorded position instead of using
    /// the reference position
    pub strict_export: bool,
    pub target_page: TargetPage,
    pub stamp_text: StampText,
    pub stamp: StampStyle,
    /// fontSize reported in the config manifest
    pub config_font_size: f64,
    /// Position given to fields the first time a page renders
    pub reference_position: FieldPosition,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            baseline_offset: 10.0,
            min_scale: 1.0,
            max_scale: 2.3,
            initial_scale: 1.0,
            initial_rotation: 0,
            initial_page: 1,
            reset_policy: ResetPolicy::default(),
            strict_export: false,
            target_page: TargetPage::default(),
            stamp_text: StampText::default(),
            stamp: StampStyle::default(),
            config_font_size: 9.0,
            reference_position: FieldPosition::default(),
        }
    }
}

impl EditorConfig {
    /// Parse a JSON config; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EditorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Expected variables (all optional):
    /// - POP_BASELINE_OFFSET: points, e.g. "10"
    /// - POP_MIN_SCALE / POP_MAX_SCALE: zoom bounds
    /// - POP_RESET_POLICY: "preserve_dragged" or "reset_on_render"
    /// - POP_STRICT_EXPORT: "true" or "false"
    pub fn from_env() -> Result<Self, EditorError> {
        Self::default().with_env()
    }

    /// Layer environment variables over this configuration
    pub fn with_env(mut self) -> Result<Self, EditorError> {
        if let Some(offset) = env_parse::<f64>("POP_BASELINE_OFFSET")? {
            self.baseline_offset = offset;
        }
        if let Some(min) = env_parse::<f64>("POP_MIN_SCALE")? {
            self.min_scale = min;
        }
        if let Some(max) = env_parse::<f64>("POP_MAX_SCALE")? {
            self.max_scale = max;
        }
        if let Some(policy) = env_parse::<ResetPolicy>("POP_RESET_POLICY")? {
            self.reset_policy = policy;
        }
        if let Some(strict) = env_parse::<bool>("POP_STRICT_EXPORT")? {
            self.strict_export = strict;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), EditorError> {
        if !self.baseline_offset.is_finite() {
            return Err(EditorError::Config(
                "baseline_offset must be finite".to_string(),
            ));
        }
        if !(self.min_scale.is_finite() && self.max_scale.is_finite()) || self.min_scale <= 0.0 {
            return Err(EditorError::Config(format!(
                "Invalid scale bounds: {}..{}",
                self.min_scale, self.max_scale
            )));
        }
        if self.min_scale > self.max_scale {
            return Err(EditorError::Config(format!(
                "min_scale {} > max_scale {}",
                self.min_scale, self.max_scale
            )));
        }
        if self.initial_page == 0 {
            return Err(EditorError::Config("initial_page is 1-indexed".to_string()));
        }
        if let TargetPage::Page(0) = self.target_page {
            return Err(EditorError::Config("target_page is 1-indexed".to_string()));
        }
        if self.stamp.size <= 0.0 || !self.stamp.size.is_finite() {
            return Err(EditorError::Config(format!(
                "Invalid stamp size: {}",
                self.stamp.size
            )));
        }
        Ok(())
    }

    /// Clamp a requested zoom into the configured bounds
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return self.min_scale;
        }
        scale.clamp(self.min_scale, self.max_scale)
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>, EditorError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| EditorError::Config(format!("{}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = EditorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.baseline_offset, 10.0);
        assert_eq!(config.reset_policy, ResetPolicy::PreserveDragged);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EditorConfig::from_json(
            r#"{"baseline_offset": 0, "reset_policy": "reset_on_render", "target_page": {"page": 2}}"#,
        )
        .unwrap();
        assert_eq!(config.baseline_offset, 0.0);
        assert_eq!(config.reset_policy, ResetPolicy::ResetOnRender);
        assert_eq!(config.target_page, TargetPage::Page(2));
        assert_eq!(config.max_scale, 2.3);
        assert_eq!(config.stamp, StampStyle::default());
    }

    #[test]
    fn test_fixed_stamp_text_json() {
        let config = EditorConfig::from_json(r#"{"stamp_text": {"fixed": "Signed"}}"#).unwrap();
        assert_eq!(config.stamp_text.for_field("name"), "Signed");
        assert_eq!(StampText::FieldId.for_field("name"), "name");
    }

    #[test]
    fn test_inverted_scale_bounds_rejected() {
        let err = EditorConfig::from_json(r#"{"min_scale": 3.0, "max_scale": 2.0}"#).unwrap_err();
        assert!(matches!(err, EditorError::Config(_)));
    }

    #[test]
    fn test_zero_target_page_rejected() {
        let err = EditorConfig::from_json(r#"{"target_page": {"page": 0}}"#).unwrap_err();
        assert!(matches!(err, EditorError::Config(_)));
    }

    #[test]
    fn test_clamp_scale() {
        let config = EditorConfig::default();
        assert_eq!(config.clamp_scale(0.5), 1.0);
        assert_eq!(config.clamp_scale(1.7), 1.7);
        assert_eq!(config.clamp_scale(9.0), 2.3);
        assert_eq!(config.clamp_scale(f64::NAN), 1.0);
    }

    #[test]
    fn test_reset_policy_from_str() {
        assert_eq!("reset".parse::<ResetPolicy>().unwrap(), ResetPolicy::ResetOnRender);
        assert_eq!(
            "PRESERVE_DRAGGED".parse::<ResetPolicy>().unwrap(),
            ResetPolicy::PreserveDragged
        );
        assert!("sometimes".parse::<ResetPolicy>().is_err());
    }
}
