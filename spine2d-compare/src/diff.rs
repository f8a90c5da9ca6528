//! Structural comparison of two skeleton descriptions.
//!
//! The report only lists differences: comparing a description with itself yields no
//! entries. Entries come in a fixed order: scalars, collection names, then per shared
//! animation and per shared skin, each in natural name order.

use crate::names::{natural_cmp, sort_natural};
use crate::{ConstraintKind, SkeletonData, SkinData};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Durations closer than this are considered equal, in seconds.
pub const DURATION_EPSILON: f32 = 1e-4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarField {
    Hash,
    Version,
    Width,
    Height,
    X,
    Y,
}

impl ScalarField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Version => "version",
            Self::Width => "width",
            Self::Height => "height",
            Self::X => "x",
            Self::Y => "y",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Text(String),
    Number(f32),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Bones,
    Slots,
    Skins,
    Animations,
    Events,
    IkConstraints,
    TransformConstraints,
    PathConstraints,
    PhysicsConstraints,
    SliderConstraints,
}

impl Collection {
    pub const ALL: [Self; 10] = [
        Self::Bones,
        Self::Slots,
        Self::Skins,
        Self::Animations,
        Self::Events,
        Self::IkConstraints,
        Self::TransformConstraints,
        Self::PathConstraints,
        Self::PhysicsConstraints,
        Self::SliderConstraints,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bones => "bones",
            Self::Slots => "slots",
            Self::Skins => "skins",
            Self::Animations => "animations",
            Self::Events => "events",
            Self::IkConstraints => "ikConstraints",
            Self::TransformConstraints => "transformConstraints",
            Self::PathConstraints => "pathConstraints",
            Self::PhysicsConstraints => "physicsConstraints",
            Self::SliderConstraints => "sliderConstraints",
        }
    }

    fn names(self, data: &SkeletonData) -> BTreeSet<&str> {
        let names: Box<dyn Iterator<Item = &str> + '_> = match self {
            Self::Bones => Box::new(data.bones.iter().map(|b| b.name.as_str())),
            Self::Slots => Box::new(data.slots.iter().map(|s| s.name.as_str())),
            Self::Skins => Box::new(data.skins.iter().map(|s| s.name.as_str())),
            Self::Animations => Box::new(data.animations.iter().map(|a| a.name.as_str())),
            Self::Events => Box::new(data.events.iter().map(|e| e.name.as_str())),
            Self::IkConstraints => constraint_names(data, ConstraintKind::Ik),
            Self::TransformConstraints => constraint_names(data, ConstraintKind::Transform),
            Self::PathConstraints => constraint_names(data, ConstraintKind::Path),
            Self::PhysicsConstraints => constraint_names(data, ConstraintKind::Physics),
            Self::SliderConstraints => constraint_names(data, ConstraintKind::Slider),
        };
        names.filter(|n| !n.is_empty()).collect()
    }
}

fn constraint_names(
    data: &SkeletonData,
    kind: ConstraintKind,
) -> Box<dyn Iterator<Item = &str> + '_> {
    Box::new(data.constraints_of(kind).map(|c| c.name.as_str()))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(
    tag = "kind",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum DiffEntry {
    Scalar {
        field: ScalarField,
        value_a: Option<ScalarValue>,
        value_b: Option<ScalarValue>,
    },
    Names {
        field: Collection,
        only_in_a: Vec<String>,
        only_in_b: Vec<String>,
        count_a: usize,
        count_b: usize,
    },
    AnimDuration {
        name: String,
        duration_a: f32,
        duration_b: f32,
    },
    AnimTimelineCount {
        name: String,
        count_a: usize,
        count_b: usize,
    },
    AnimTimelineTypes {
        name: String,
        only_in_a: Vec<String>,
        only_in_b: Vec<String>,
    },
    SkinAttachments {
        name: String,
        count_a: usize,
        count_b: usize,
        only_in_a: Vec<String>,
        only_in_b: Vec<String>,
    },
}

fn list(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}

fn optional(value: &Option<ScalarValue>) -> String {
    value
        .as_ref()
        .map_or_else(|| "(none)".to_string(), ToString::to_string)
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar {
                field,
                value_a,
                value_b,
            } => write!(
                f,
                "{}: {} vs {}",
                field.as_str(),
                optional(value_a),
                optional(value_b)
            ),
            Self::Names {
                field,
                only_in_a,
                only_in_b,
                count_a,
                count_b,
            } => write!(
                f,
                "{} ({count_a} vs {count_b}): only in A [{}], only in B [{}]",
                field.as_str(),
                list(only_in_a),
                list(only_in_b)
            ),
            Self::AnimDuration {
                name,
                duration_a,
                duration_b,
            } => write!(f, "animation '{name}' duration: {duration_a} vs {duration_b}"),
            Self::AnimTimelineCount {
                name,
                count_a,
                count_b,
            } => write!(f, "animation '{name}' timelines: {count_a} vs {count_b}"),
            Self::AnimTimelineTypes {
                name,
                only_in_a,
                only_in_b,
            } => write!(
                f,
                "animation '{name}' timeline types: only in A [{}], only in B [{}]",
                list(only_in_a),
                list(only_in_b)
            ),
            Self::SkinAttachments {
                name,
                count_a,
                count_b,
                only_in_a,
                only_in_b,
            } => write!(
                f,
                "skin '{name}' attachments ({count_a} vs {count_b}): only in A [{}], only in B [{}]",
                list(only_in_a),
                list(only_in_b)
            ),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DiffReport {
    pub diffs: Vec<DiffEntry>,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiffEntry> {
        self.diffs.iter()
    }
}

impl<'a> IntoIterator for &'a DiffReport {
    type Item = &'a DiffEntry;
    type IntoIter = std::slice::Iter<'a, DiffEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.diffs.iter()
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.diffs.is_empty() {
            return writeln!(f, "no differences");
        }
        for entry in &self.diffs {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

fn text(value: &Option<String>) -> Option<ScalarValue> {
    value.clone().map(ScalarValue::Text)
}

fn number(value: Option<f32>) -> Option<ScalarValue> {
    value.map(ScalarValue::Number)
}

fn same_scalar(a: &Option<ScalarValue>, b: &Option<ScalarValue>) -> bool {
    match (a, b) {
        (Some(ScalarValue::Number(x)), Some(ScalarValue::Number(y))) => {
            x == y || (x.is_nan() && y.is_nan())
        }
        _ => a == b,
    }
}

fn sorted(names: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    let mut out: Vec<String> = names.into_iter().map(Into::into).collect();
    sort_natural(&mut out);
    out
}

fn set_difference<'a>(
    a: &BTreeSet<&'a str>,
    b: &BTreeSet<&'a str>,
) -> (Vec<String>, Vec<String>) {
    (
        sorted(a.difference(b).copied()),
        sorted(b.difference(a).copied()),
    )
}

fn shared<'a>(a: &BTreeSet<&'a str>, b: &BTreeSet<&'a str>) -> Vec<&'a str> {
    let mut out: Vec<&str> = a.intersection(b).copied().collect();
    out.sort_by(|x, y| natural_cmp(x, y));
    out
}

fn skin_keys(data: &SkeletonData, skin: &SkinData) -> BTreeSet<String> {
    skin.entries()
        .map(|(slot, key)| match data.slots.get(slot) {
            Some(s) => format!("{}:{key}", s.name),
            None => format!("{slot}:{key}"),
        })
        .collect()
}

/// Compares two descriptions. Never fails; absent values are treated as empty.
pub fn diff(a: &SkeletonData, b: &SkeletonData) -> DiffReport {
    let mut diffs = Vec::new();

    let scalars = [
        (ScalarField::Hash, text(&a.hash), text(&b.hash)),
        (ScalarField::Version, text(&a.version), text(&b.version)),
        (ScalarField::Width, number(a.width), number(b.width)),
        (ScalarField::Height, number(a.height), number(b.height)),
        (ScalarField::X, number(a.x), number(b.x)),
        (ScalarField::Y, number(a.y), number(b.y)),
    ];
    for (field, value_a, value_b) in scalars {
        if !same_scalar(&value_a, &value_b) {
            diffs.push(DiffEntry::Scalar {
                field,
                value_a,
                value_b,
            });
        }
    }

    for field in Collection::ALL {
        let names_a = field.names(a);
        let names_b = field.names(b);
        if names_a == names_b {
            continue;
        }
        let (only_in_a, only_in_b) = set_difference(&names_a, &names_b);
        diffs.push(DiffEntry::Names {
            field,
            only_in_a,
            only_in_b,
            count_a: names_a.len(),
            count_b: names_b.len(),
        });
    }

    let animations = shared(
        &Collection::Animations.names(a),
        &Collection::Animations.names(b),
    );
    for name in animations {
        let (Some(anim_a), Some(anim_b)) = (a.animation(name), b.animation(name)) else {
            continue;
        };
        if (anim_a.duration - anim_b.duration).abs() > DURATION_EPSILON {
            diffs.push(DiffEntry::AnimDuration {
                name: name.to_string(),
                duration_a: anim_a.duration,
                duration_b: anim_b.duration,
            });
        }
        if anim_a.timelines.len() != anim_b.timelines.len() {
            diffs.push(DiffEntry::AnimTimelineCount {
                name: name.to_string(),
                count_a: anim_a.timelines.len(),
                count_b: anim_b.timelines.len(),
            });
        }
        let kinds_a: BTreeSet<&str> = anim_a.timelines.iter().map(|t| t.kind.as_str()).collect();
        let kinds_b: BTreeSet<&str> = anim_b.timelines.iter().map(|t| t.kind.as_str()).collect();
        if kinds_a != kinds_b {
            let (only_in_a, only_in_b) = set_difference(&kinds_a, &kinds_b);
            diffs.push(DiffEntry::AnimTimelineTypes {
                name: name.to_string(),
                only_in_a,
                only_in_b,
            });
        }
    }

    let skins = shared(&Collection::Skins.names(a), &Collection::Skins.names(b));
    for name in skins {
        let (Some(skin_a), Some(skin_b)) = (a.skin(name), b.skin(name)) else {
            continue;
        };
        let count_a = skin_a.attachment_count();
        let count_b = skin_b.attachment_count();
        if count_a == 0 && count_b == 0 {
            continue;
        }
        let keys_a = skin_keys(a, skin_a);
        let keys_b = skin_keys(b, skin_b);
        let only_in_a = sorted(keys_a.difference(&keys_b).cloned());
        let only_in_b = sorted(keys_b.difference(&keys_a).cloned());
        if only_in_a.is_empty() && only_in_b.is_empty() && count_a == count_b {
            continue;
        }
        diffs.push(DiffEntry::SkinAttachments {
            name: name.to_string(),
            count_a,
            count_b,
            only_in_a,
            only_in_b,
        });
    }

    DiffReport { diffs }
}
