use crate::{CompareAppearance, CompareLayout, Error, LayoutConfig, MissingAssetPolicy};
use serde::{Deserialize, Serialize};

/// Viewer settings, usually read from a host-provided JSON document.
///
/// Every field is optional in JSON; absent fields take their defaults.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerConfig {
    pub layout: LayoutConfig,
    pub appearance: CompareAppearance,
    /// Layout used by compare loads that do not request one.
    pub compare_layout: CompareLayout,
    pub missing_pages: MissingAssetPolicy,
}

impl ViewerConfig {
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let to_config_error = |e: serde_json::Error| Error::Config {
            message: e.to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(input).map_err(to_config_error)?;
        if !value.is_object() {
            return Err(Error::Config {
                message: "viewer config must be a JSON object".to_string(),
            });
        }
        let config: Self = serde_json::from_value(value).map_err(to_config_error)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let LayoutConfig { gap, fit_margin } = self.layout;
        if !gap.is_finite() || gap < 0.0 {
            return Err(Error::Config {
                message: format!("layout.gap must be a finite non-negative number, got {gap}"),
            });
        }
        if !fit_margin.is_finite() || fit_margin <= 0.0 {
            return Err(Error::Config {
                message: format!("layout.fitMargin must be a finite positive number, got {fit_margin}"),
            });
        }
        let opacity = self.appearance.overlay_opacity;
        if !opacity.is_finite() {
            return Err(Error::Config {
                message: format!("appearance.overlayOpacity must be finite, got {opacity}"),
            });
        }
        Ok(())
    }
}
