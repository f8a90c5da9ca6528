//! Styling that tells compared instances apart.

use crate::{BlendMode, Error, LayoutMode, LoadedSkeleton, SkeletonInstance};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_OVERLAY_OPACITY: f32 = 0.1;
pub const MAX_OVERLAY_OPACITY: f32 = 1.0;

/// RGBA with channels in `0..=1`. Serialised as `#rrggbb` (or `#rrggbbaa`).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn from_rgb_u32(rgb: u32) -> Self {
        let channel = |shift: u32| ((rgb >> shift) & 0xFF) as f32 / 255.0;
        Self::rgb(channel(16), channel(8), channel(0))
    }

    /// Packed `0xRRGGBB`, alpha dropped.
    pub fn to_rgb_u32(self) -> u32 {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Config {
            message: format!("invalid color '{s}', expected #rrggbb or #rrggbbaa"),
        };
        let hex = s.trim().trim_start_matches('#');
        if !matches!(hex.len(), 6 | 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
        if hex.len() == 6 {
            return Ok(Self::from_rgb_u32(value));
        }
        let mut color = Self::from_rgb_u32(value >> 8);
        color.a = (value & 0xFF) as f32 / 255.0;
        Ok(color)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.to_rgb_u32())?;
        if self.a < 1.0 {
            write!(f, "{:02x}", (self.a.clamp(0.0, 1.0) * 255.0).round() as u32)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompareAppearance {
    pub overlay_opacity: f32,
    pub json_tint: Color,
    pub skel_tint: Color,
}

impl Default for CompareAppearance {
    fn default() -> Self {
        Self {
            overlay_opacity: 0.5,
            json_tint: Color::from_rgb_u32(0x4fc3f7),
            skel_tint: Color::from_rgb_u32(0xff8a65),
        }
    }
}

impl CompareAppearance {
    /// Opacity applied to the secondary overlay instances.
    pub fn effective_overlay_opacity(&self) -> f32 {
        if self.overlay_opacity.is_nan() {
            return MAX_OVERLAY_OPACITY;
        }
        self.overlay_opacity
            .clamp(MIN_OVERLAY_OPACITY, MAX_OVERLAY_OPACITY)
    }

    pub fn apply(&mut self, update: AppearanceUpdate) {
        if let Some(v) = update.overlay_opacity {
            self.overlay_opacity = v;
        }
        if let Some(v) = update.json_tint {
            self.json_tint = v;
        }
        if let Some(v) = update.skel_tint {
            self.skel_tint = v;
        }
    }
}

/// Partial appearance change; absent fields keep their current value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppearanceUpdate {
    pub overlay_opacity: Option<f32>,
    pub json_tint: Option<Color>,
    pub skel_tint: Option<Color>,
}

fn tint<I: SkeletonInstance>(instance: &mut I, color: Color) {
    if let Some(channels) = instance.color_mut() {
        channels.r = color.r;
        channels.g = color.g;
        channels.b = color.b;
        if channels.a.is_nan() || channels.a <= 0.0 {
            channels.a = 1.0;
        }
        return;
    }
    instance.set_tint(color.to_rgb_u32());
}

fn clear_tint<I: SkeletonInstance>(instance: &mut I) {
    if let Some(channels) = instance.color_mut() {
        channels.r = 1.0;
        channels.g = 1.0;
        channels.b = 1.0;
    }
    instance.clear_tint();
}

/// Applies opacity, depth, tint and blend mode for `mode`.
pub fn apply_visuals<I: SkeletonInstance>(
    skeletons: &mut [LoadedSkeleton<I>],
    mode: LayoutMode,
    appearance: &CompareAppearance,
) {
    for (i, skeleton) in skeletons.iter_mut().enumerate() {
        let instance = &mut skeleton.instance;
        instance.set_blend_mode(BlendMode::Normal);
        if mode != LayoutMode::Overlay {
            instance.set_alpha(1.0);
            instance.set_depth(1);
            clear_tint(instance);
            continue;
        }
        if i == 0 {
            instance.set_alpha(1.0);
            instance.set_depth(1);
            tint(instance, appearance.json_tint);
        } else {
            instance.set_alpha(appearance.effective_overlay_opacity());
            instance.set_depth(i as i32 + 1);
            tint(instance, appearance.skel_tint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_hex_parses_and_prints() {
        let c: Color = "#4fc3f7".parse().unwrap();
        assert_eq!(c.to_rgb_u32(), 0x4fc3f7);
        assert_eq!(c.a, 1.0);
        assert_eq!(c.to_string(), "#4fc3f7");

        let c: Color = "ff8a6580".parse().unwrap();
        assert_eq!(c.to_rgb_u32(), 0xff8a65);
        assert_eq!(c.to_string(), "#ff8a6580");

        assert!("#fff".parse::<Color>().is_err());
        assert!("#zzzzzz".parse::<Color>().is_err());
    }

    #[test]
    fn opacity_is_clamped() {
        for (input, expected) in [
            (-3.0, 0.1),
            (0.0, 0.1),
            (0.05, 0.1),
            (0.5, 0.5),
            (1.0, 1.0),
            (7.0, 1.0),
            (f32::INFINITY, 1.0),
            (f32::NEG_INFINITY, 0.1),
            (f32::NAN, 1.0),
        ] {
            let appearance = CompareAppearance {
                overlay_opacity: input,
                ..Default::default()
            };
            assert_eq!(appearance.effective_overlay_opacity(), expected, "{input}");
        }
    }

    #[test]
    fn update_merges_only_provided_fields() {
        let mut appearance = CompareAppearance::default();
        appearance.apply(AppearanceUpdate {
            overlay_opacity: Some(0.8),
            ..Default::default()
        });
        assert_eq!(appearance.overlay_opacity, 0.8);
        assert_eq!(appearance.json_tint, CompareAppearance::default().json_tint);

        let update: AppearanceUpdate = serde_json::from_str(r##"{"skelTint":"#000000"}"##).unwrap();
        appearance.apply(update);
        assert_eq!(appearance.skel_tint, Color::rgb(0.0, 0.0, 0.0));
        assert_eq!(appearance.overlay_opacity, 0.8);
    }
}
