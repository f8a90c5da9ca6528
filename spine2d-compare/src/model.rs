use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Encoding of a skeleton description.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkeletonFormat {
    Json,
    Skel,
}

impl SkeletonFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Skel => "skel",
        }
    }
}

impl fmt::Display for SkeletonFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

impl BlendMode {
    pub(crate) fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::Normal),
            1 => Some(Self::Additive),
            2 => Some(Self::Multiply),
            3 => Some(Self::Screen),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    /// Setup-pose attachment key.
    pub attachment: Option<String>,
    pub blend: BlendMode,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AttachmentKind {
    Region,
    BoundingBox,
    Mesh,
    LinkedMesh,
    Path,
    Point,
    Clipping,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkinData {
    pub name: String,
    /// Attachments per slot index, keyed by the skin placeholder name.
    pub attachments: Vec<BTreeMap<String, AttachmentKind>>,
    pub bones: Vec<usize>,
    pub constraints: Vec<String>,
}

impl SkinData {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attachments: Vec::new(),
            bones: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, slot_index: usize, key: String, kind: AttachmentKind) {
        if self.attachments.len() <= slot_index {
            self.attachments.resize_with(slot_index + 1, BTreeMap::new);
        }
        self.attachments[slot_index].insert(key, kind);
    }

    /// `(slot index, attachment key)` pairs in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.attachments
            .iter()
            .enumerate()
            .flat_map(|(slot, map)| map.keys().map(move |key| (slot, key.as_str())))
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.iter().map(BTreeMap::len).sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EventData {
    pub name: String,
    pub audio_path: Option<String>,
}

/// Timeline types, shared by the JSON and binary readers so that both encodings
/// label the same animation identically.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum TimelineKind {
    Attachment,
    Rgba,
    Rgb,
    Rgba2,
    Rgb2,
    Alpha,
    Rotate,
    Translate,
    TranslateX,
    TranslateY,
    Scale,
    ScaleX,
    ScaleY,
    Shear,
    ShearX,
    ShearY,
    Inherit,
    IkConstraint,
    TransformConstraint,
    PathPosition,
    PathSpacing,
    PathMix,
    PhysicsInertia,
    PhysicsStrength,
    PhysicsDamping,
    PhysicsMass,
    PhysicsWind,
    PhysicsGravity,
    PhysicsMix,
    PhysicsReset,
    SliderTime,
    SliderMix,
    Deform,
    Sequence,
    DrawOrder,
    Event,
}

impl TimelineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::Rgba => "rgba",
            Self::Rgb => "rgb",
            Self::Rgba2 => "rgba2",
            Self::Rgb2 => "rgb2",
            Self::Alpha => "alpha",
            Self::Rotate => "rotate",
            Self::Translate => "translate",
            Self::TranslateX => "translateX",
            Self::TranslateY => "translateY",
            Self::Scale => "scale",
            Self::ScaleX => "scaleX",
            Self::ScaleY => "scaleY",
            Self::Shear => "shear",
            Self::ShearX => "shearX",
            Self::ShearY => "shearY",
            Self::Inherit => "inherit",
            Self::IkConstraint => "ikConstraint",
            Self::TransformConstraint => "transformConstraint",
            Self::PathPosition => "pathPosition",
            Self::PathSpacing => "pathSpacing",
            Self::PathMix => "pathMix",
            Self::PhysicsInertia => "physicsInertia",
            Self::PhysicsStrength => "physicsStrength",
            Self::PhysicsDamping => "physicsDamping",
            Self::PhysicsMass => "physicsMass",
            Self::PhysicsWind => "physicsWind",
            Self::PhysicsGravity => "physicsGravity",
            Self::PhysicsMix => "physicsMix",
            Self::PhysicsReset => "physicsReset",
            Self::SliderTime => "sliderTime",
            Self::SliderMix => "sliderMix",
            Self::Deform => "deform",
            Self::Sequence => "sequence",
            Self::DrawOrder => "drawOrder",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for TimelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimelineData {
    pub kind: TimelineKind,
    pub frame_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnimationData {
    pub name: String,
    /// Largest key time over all timelines, in seconds.
    pub duration: f32,
    pub timelines: Vec<TimelineData>,
}

impl AnimationData {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: 0.0,
            timelines: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, kind: TimelineKind, frame_count: usize, max_time: f32) {
        if frame_count == 0 {
            return;
        }
        self.timelines.push(TimelineData { kind, frame_count });
        if max_time > self.duration {
            self.duration = max_time;
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConstraintKind {
    Ik,
    Transform,
    Path,
    Physics,
    Slider,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintData {
    pub name: String,
    pub kind: ConstraintKind,
}

/// Structural description of a skeleton export: what the runtime would load,
/// minus poses, attachment geometry and keyframe values.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SkeletonData {
    pub hash: Option<String>,
    pub version: Option<String>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub reference_scale: f32,
    pub fps: Option<f32>,
    pub images_path: Option<String>,
    pub audio_path: Option<String>,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub skins: Vec<SkinData>,
    pub events: Vec<EventData>,
    pub animations: Vec<AnimationData>,
    pub constraints: Vec<ConstraintData>,
}

impl SkeletonData {
    pub fn skin(&self, name: &str) -> Option<&SkinData> {
        self.skins.iter().find(|s| s.name == name)
    }

    pub fn animation(&self, name: &str) -> Option<&AnimationData> {
        self.animations.iter().find(|a| a.name == name)
    }

    pub fn constraints_of(&self, kind: ConstraintKind) -> impl Iterator<Item = &ConstraintData> {
        self.constraints.iter().filter(move |c| c.kind == kind)
    }

    /// Distinct audio files referenced by events.
    pub fn audio_paths(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .events
            .iter()
            .filter_map(|e| e.audio_path.as_deref())
            .filter(|p| !p.is_empty())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}
