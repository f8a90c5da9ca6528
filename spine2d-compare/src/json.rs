use crate::{
    AnimationData, AttachmentKind, BlendMode, BoneData, ConstraintData, ConstraintKind, Error,
    EventData, RuntimeLine, SkeletonData, SkinData, SlotData, TimelineKind,
};
use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A JSON object whose entries keep their file order.
#[derive(Debug)]
struct Ordered<V>(Vec<(String, V)>);

impl<V> Default for Ordered<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Ordered<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = Ordered<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, V>()? {
                    entries.push(entry);
                }
                Ok(Ordered(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

#[derive(Debug, Deserialize)]
struct NamedDef {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ConstraintDef {
    #[serde(rename = "ik")]
    Ik(NamedDef),
    #[serde(rename = "transform")]
    Transform(NamedDef),
    #[serde(rename = "path")]
    Path(NamedDef),
    #[serde(rename = "physics")]
    Physics(NamedDef),
    #[serde(rename = "slider")]
    Slider(NamedDef),
}

#[derive(Debug, Deserialize)]
struct Root {
    skeleton: Option<SkeletonHeader>,
    bones: Option<Vec<BoneDef>>,
    slots: Option<Vec<SlotDef>>,
    skins: Option<SkinsDef>,
    events: Option<Ordered<EventDef>>,
    #[serde(default)]
    constraints: Option<Vec<ConstraintDef>>,
    ik: Option<Vec<NamedDef>>,
    transform: Option<Vec<NamedDef>>,
    path: Option<Vec<NamedDef>>,
    physics: Option<Vec<NamedDef>>,
    slider: Option<Vec<NamedDef>>,
    animations: Option<Ordered<AnimationDef>>,
}

#[derive(Debug, Deserialize, Default)]
struct SkeletonHeader {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    spine: Option<String>,
    #[serde(default)]
    x: Option<f32>,
    #[serde(default)]
    y: Option<f32>,
    #[serde(default)]
    width: Option<f32>,
    #[serde(default)]
    height: Option<f32>,
    #[serde(default, rename = "referenceScale")]
    reference_scale: Option<f32>,
    #[serde(default)]
    fps: Option<f32>,
    #[serde(default)]
    images: Option<String>,
    #[serde(default)]
    audio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoneDef {
    name: String,
    #[serde(default)]
    parent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlotDef {
    name: String,
    bone: String,
    #[serde(default)]
    attachment: Option<String>,
    #[serde(default)]
    blend: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct EventDef {
    #[serde(default, rename = "audio")]
    audio_path: Option<String>,
}

type SkinSlotsDef = BTreeMap<String, BTreeMap<String, AttachmentDef>>;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkinsDef {
    Map(Ordered<SkinSlotsDef>),
    Array(Vec<SkinDef>),
}

#[derive(Debug, Deserialize)]
struct SkinDef {
    name: String,
    #[serde(default)]
    attachments: SkinSlotsDef,
    #[serde(default)]
    bones: Vec<String>,
    #[serde(default)]
    constraints: Vec<String>,
    #[serde(default)]
    ik: Vec<String>,
    #[serde(default)]
    transform: Vec<String>,
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    physics: Vec<String>,
    #[serde(default)]
    slider: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AttachmentDef {
    #[serde(default, rename = "type")]
    attachment_type: Option<String>,
}

/// Only key times matter for the structural summary.
#[derive(Debug, Deserialize)]
struct TimeKey {
    #[serde(default)]
    time: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct EventKey {
    #[serde(default)]
    time: Option<f32>,
    name: String,
}

type Keys = Option<Vec<TimeKey>>;

#[derive(Debug, Deserialize)]
struct AnimationDef {
    events: Option<Vec<EventKey>>,
    bones: Option<BTreeMap<String, BoneAnimDef>>,
    slots: Option<BTreeMap<String, SlotAnimDef>>,
    attachments: Option<BTreeMap<String, BTreeMap<String, BTreeMap<String, AttachmentAnimDef>>>>,
    /// Spine 4.0 layout of deform timelines.
    deform: Option<BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<TimeKey>>>>>,
    #[serde(rename = "drawOrder", alias = "draworder")]
    draw_order: Keys,
    ik: Option<BTreeMap<String, Vec<TimeKey>>>,
    transform: Option<BTreeMap<String, Vec<TimeKey>>>,
    path: Option<BTreeMap<String, PathAnimDef>>,
    physics: Option<BTreeMap<String, PhysicsAnimDef>>,
    slider: Option<BTreeMap<String, SliderAnimDef>>,
}

#[derive(Debug, Deserialize)]
struct BoneAnimDef {
    rotate: Keys,
    translate: Keys,
    #[serde(rename = "translatex", alias = "translateX")]
    translate_x: Keys,
    #[serde(rename = "translatey", alias = "translateY")]
    translate_y: Keys,
    scale: Keys,
    #[serde(rename = "scalex", alias = "scaleX")]
    scale_x: Keys,
    #[serde(rename = "scaley", alias = "scaleY")]
    scale_y: Keys,
    shear: Keys,
    #[serde(rename = "shearx", alias = "shearX")]
    shear_x: Keys,
    #[serde(rename = "sheary", alias = "shearY")]
    shear_y: Keys,
    inherit: Keys,
}

#[derive(Debug, Deserialize)]
struct SlotAnimDef {
    attachment: Keys,
    #[serde(alias = "color")]
    rgba: Keys,
    rgb: Keys,
    #[serde(alias = "twoColor")]
    rgba2: Keys,
    rgb2: Keys,
    alpha: Keys,
}

#[derive(Debug, Deserialize)]
struct AttachmentAnimDef {
    deform: Keys,
    sequence: Keys,
}

#[derive(Debug, Deserialize)]
struct PathAnimDef {
    position: Keys,
    spacing: Keys,
    mix: Keys,
}

#[derive(Debug, Deserialize)]
struct PhysicsAnimDef {
    inertia: Keys,
    strength: Keys,
    damping: Keys,
    mass: Keys,
    wind: Keys,
    gravity: Keys,
    mix: Keys,
    reset: Keys,
}

#[derive(Debug, Deserialize)]
struct SliderAnimDef {
    time: Keys,
    mix: Keys,
}

/// Name lookups that animations are validated against.
struct Targets<'a> {
    bones: &'a HashMap<String, usize>,
    slots: &'a HashMap<String, usize>,
    skins: HashSet<&'a str>,
    events: HashSet<&'a str>,
    constraints: &'a [ConstraintData],
}

impl Targets<'_> {
    fn has_constraint(&self, kind: ConstraintKind, name: &str) -> bool {
        self.constraints
            .iter()
            .any(|c| c.kind == kind && c.name == name)
    }
}

impl SkeletonData {
    pub fn from_json_str(input: &str) -> Result<Arc<Self>, Error> {
        let root: Root = serde_json::from_str(input).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;

        let header = root.skeleton.unwrap_or_default();
        if let Some(v) = header.spine.as_deref() {
            validate_spine_version(v)?;
        }

        let mut bones = Vec::new();
        let mut bone_index = HashMap::<String, usize>::new();
        for bone in root.bones.unwrap_or_default() {
            let parent = match bone.parent.as_deref() {
                None => None,
                Some(parent_name) => {
                    Some(bone_index.get(parent_name).copied().ok_or_else(|| {
                        Error::JsonUnknownBoneParent {
                            bone: bone.name.clone(),
                            parent: parent_name.to_string(),
                        }
                    })?)
                }
            };
            bone_index.insert(bone.name.clone(), bones.len());
            bones.push(BoneData {
                name: bone.name,
                parent,
            });
        }

        let mut slots = Vec::new();
        let mut slot_index = HashMap::<String, usize>::new();
        for slot in root.slots.unwrap_or_default() {
            let bone =
                bone_index
                    .get(&slot.bone)
                    .copied()
                    .ok_or_else(|| Error::JsonUnknownSlotBone {
                        slot: slot.name.clone(),
                        bone: slot.bone.clone(),
                    })?;
            slot_index.insert(slot.name.clone(), slots.len());
            let blend = parse_blend_mode(slot.blend.as_deref(), &slot.name);
            slots.push(SlotData {
                name: slot.name,
                bone,
                attachment: slot.attachment,
                blend,
            });
        }

        let mut constraints = Vec::new();
        for def in root.constraints.unwrap_or_default() {
            let (kind, named) = match def {
                ConstraintDef::Ik(c) => (ConstraintKind::Ik, c),
                ConstraintDef::Transform(c) => (ConstraintKind::Transform, c),
                ConstraintDef::Path(c) => (ConstraintKind::Path, c),
                ConstraintDef::Physics(c) => (ConstraintKind::Physics, c),
                ConstraintDef::Slider(c) => (ConstraintKind::Slider, c),
            };
            constraints.push(ConstraintData {
                name: named.name,
                kind,
            });
        }
        for (kind, legacy) in [
            (ConstraintKind::Ik, root.ik),
            (ConstraintKind::Transform, root.transform),
            (ConstraintKind::Path, root.path),
            (ConstraintKind::Physics, root.physics),
            (ConstraintKind::Slider, root.slider),
        ] {
            for c in legacy.unwrap_or_default() {
                constraints.push(ConstraintData { name: c.name, kind });
            }
        }

        let mut skins = Vec::new();
        match root.skins {
            None => {}
            Some(SkinsDef::Map(map)) => {
                for (name, attachments) in map.0 {
                    let mut skin = SkinData::new(name);
                    add_skin_attachments(&mut skin, attachments, &slot_index)?;
                    skins.push(skin);
                }
            }
            Some(SkinsDef::Array(list)) => {
                for def in list {
                    let mut skin = SkinData::new(def.name);
                    add_skin_attachments(&mut skin, def.attachments, &slot_index)?;
                    skin.bones = def
                        .bones
                        .iter()
                        .filter_map(|b| bone_index.get(b).copied())
                        .collect();
                    skin.constraints = def
                        .constraints
                        .into_iter()
                        .chain(def.ik)
                        .chain(def.transform)
                        .chain(def.path)
                        .chain(def.physics)
                        .chain(def.slider)
                        .collect();
                    skins.push(skin);
                }
            }
        }

        let events: Vec<EventData> = root
            .events
            .unwrap_or_default()
            .0
            .into_iter()
            .map(|(name, def)| EventData {
                name,
                audio_path: def.audio_path.filter(|p| !p.is_empty()),
            })
            .collect();

        let targets = Targets {
            bones: &bone_index,
            slots: &slot_index,
            skins: skins.iter().map(|s| s.name.as_str()).collect(),
            events: events.iter().map(|e| e.name.as_str()).collect(),
            constraints: &constraints,
        };
        let mut animations = Vec::new();
        for (name, def) in root.animations.unwrap_or_default().0 {
            animations.push(read_animation(name, def, &targets)?);
        }

        Ok(Arc::new(SkeletonData {
            hash: header.hash,
            version: header.spine,
            x: header.x,
            y: header.y,
            width: header.width,
            height: header.height,
            reference_scale: header.reference_scale.unwrap_or(100.0),
            fps: header.fps,
            images_path: header.images,
            audio_path: header.audio,
            bones,
            slots,
            skins,
            events,
            animations,
            constraints,
        }))
    }
}

fn add_skin_attachments(
    skin: &mut SkinData,
    slots: SkinSlotsDef,
    slot_index: &HashMap<String, usize>,
) -> Result<(), Error> {
    for (slot_name, attachments) in slots {
        let slot = slot_index
            .get(&slot_name)
            .copied()
            .ok_or_else(|| Error::JsonUnknownSkinSlot {
                skin: skin.name.clone(),
                slot: slot_name.clone(),
            })?;
        for (key, def) in attachments {
            let kind = parse_attachment_kind(def.attachment_type.as_deref()).ok_or_else(|| {
                Error::JsonUnsupportedAttachmentType {
                    skin: skin.name.clone(),
                    slot: slot_name.clone(),
                    attachment: key.clone(),
                    attachment_type: def.attachment_type.clone().unwrap_or_default(),
                }
            })?;
            skin.insert(slot, key, kind);
        }
    }
    Ok(())
}

fn read_animation(
    name: String,
    def: AnimationDef,
    targets: &Targets<'_>,
) -> Result<AnimationData, Error> {
    let mut animation = AnimationData::new(name);

    for (slot, anim) in def.slots.unwrap_or_default() {
        if !targets.slots.contains_key(&slot) {
            return Err(unknown_target(&animation, "slot", &slot));
        }
        push_keys(&mut animation, TimelineKind::Attachment, anim.attachment);
        push_keys(&mut animation, TimelineKind::Rgba, anim.rgba);
        push_keys(&mut animation, TimelineKind::Rgb, anim.rgb);
        push_keys(&mut animation, TimelineKind::Rgba2, anim.rgba2);
        push_keys(&mut animation, TimelineKind::Rgb2, anim.rgb2);
        push_keys(&mut animation, TimelineKind::Alpha, anim.alpha);
    }

    for (bone, anim) in def.bones.unwrap_or_default() {
        if !targets.bones.contains_key(&bone) {
            return Err(unknown_target(&animation, "bone", &bone));
        }
        push_keys(&mut animation, TimelineKind::Rotate, anim.rotate);
        push_keys(&mut animation, TimelineKind::Translate, anim.translate);
        push_keys(&mut animation, TimelineKind::TranslateX, anim.translate_x);
        push_keys(&mut animation, TimelineKind::TranslateY, anim.translate_y);
        push_keys(&mut animation, TimelineKind::Scale, anim.scale);
        push_keys(&mut animation, TimelineKind::ScaleX, anim.scale_x);
        push_keys(&mut animation, TimelineKind::ScaleY, anim.scale_y);
        push_keys(&mut animation, TimelineKind::Shear, anim.shear);
        push_keys(&mut animation, TimelineKind::ShearX, anim.shear_x);
        push_keys(&mut animation, TimelineKind::ShearY, anim.shear_y);
        push_keys(&mut animation, TimelineKind::Inherit, anim.inherit);
    }

    for (constraint, keys) in def.ik.unwrap_or_default() {
        if !targets.has_constraint(ConstraintKind::Ik, &constraint) {
            return Err(unknown_target(&animation, "ik constraint", &constraint));
        }
        push_keys(&mut animation, TimelineKind::IkConstraint, Some(keys));
    }

    for (constraint, keys) in def.transform.unwrap_or_default() {
        if !targets.has_constraint(ConstraintKind::Transform, &constraint) {
            return Err(unknown_target(&animation, "transform constraint", &constraint));
        }
        push_keys(&mut animation, TimelineKind::TransformConstraint, Some(keys));
    }

    for (constraint, anim) in def.path.unwrap_or_default() {
        if !targets.has_constraint(ConstraintKind::Path, &constraint) {
            return Err(unknown_target(&animation, "path constraint", &constraint));
        }
        push_keys(&mut animation, TimelineKind::PathPosition, anim.position);
        push_keys(&mut animation, TimelineKind::PathSpacing, anim.spacing);
        push_keys(&mut animation, TimelineKind::PathMix, anim.mix);
    }

    for (constraint, anim) in def.physics.unwrap_or_default() {
        // An empty name addresses every physics constraint.
        if !constraint.is_empty() && !targets.has_constraint(ConstraintKind::Physics, &constraint)
        {
            return Err(unknown_target(&animation, "physics constraint", &constraint));
        }
        push_keys(&mut animation, TimelineKind::PhysicsInertia, anim.inertia);
        push_keys(&mut animation, TimelineKind::PhysicsStrength, anim.strength);
        push_keys(&mut animation, TimelineKind::PhysicsDamping, anim.damping);
        push_keys(&mut animation, TimelineKind::PhysicsMass, anim.mass);
        push_keys(&mut animation, TimelineKind::PhysicsWind, anim.wind);
        push_keys(&mut animation, TimelineKind::PhysicsGravity, anim.gravity);
        push_keys(&mut animation, TimelineKind::PhysicsMix, anim.mix);
        push_keys(&mut animation, TimelineKind::PhysicsReset, anim.reset);
    }

    for (constraint, anim) in def.slider.unwrap_or_default() {
        if !targets.has_constraint(ConstraintKind::Slider, &constraint) {
            return Err(unknown_target(&animation, "slider constraint", &constraint));
        }
        push_keys(&mut animation, TimelineKind::SliderTime, anim.time);
        push_keys(&mut animation, TimelineKind::SliderMix, anim.mix);
    }

    for (skin, slots) in def.attachments.unwrap_or_default() {
        if !targets.skins.contains(skin.as_str()) {
            return Err(unknown_target(&animation, "skin", &skin));
        }
        for (slot, attachments) in slots {
            if !targets.slots.contains_key(&slot) {
                return Err(unknown_target(&animation, "slot", &slot));
            }
            for anim in attachments.into_values() {
                push_keys(&mut animation, TimelineKind::Deform, anim.deform);
                push_keys(&mut animation, TimelineKind::Sequence, anim.sequence);
            }
        }
    }

    for (skin, slots) in def.deform.unwrap_or_default() {
        if !targets.skins.contains(skin.as_str()) {
            return Err(unknown_target(&animation, "skin", &skin));
        }
        for (slot, attachments) in slots {
            if !targets.slots.contains_key(&slot) {
                return Err(unknown_target(&animation, "slot", &slot));
            }
            for keys in attachments.into_values() {
                push_keys(&mut animation, TimelineKind::Deform, Some(keys));
            }
        }
    }

    push_keys(&mut animation, TimelineKind::DrawOrder, def.draw_order);

    if let Some(keys) = def.events {
        if let Some(bad) = keys
            .iter()
            .find(|k| !targets.events.contains(k.name.as_str()))
        {
            return Err(Error::JsonUnknownEvent {
                animation: animation.name.clone(),
                event: bad.name.clone(),
            });
        }
        let last = keys
            .iter()
            .map(|k| k.time.unwrap_or(0.0))
            .fold(0.0, f32::max);
        animation.push(TimelineKind::Event, keys.len(), last);
    }

    Ok(animation)
}

fn push_keys(animation: &mut AnimationData, kind: TimelineKind, keys: Keys) {
    let Some(keys) = keys else {
        return;
    };
    let last = keys
        .iter()
        .map(|k| k.time.unwrap_or(0.0))
        .fold(0.0, f32::max);
    animation.push(kind, keys.len(), last);
}

fn unknown_target(animation: &AnimationData, kind: &'static str, name: &str) -> Error {
    Error::JsonUnknownAnimationTarget {
        animation: animation.name.clone(),
        kind,
        name: name.to_string(),
    }
}

fn parse_attachment_kind(raw: Option<&str>) -> Option<AttachmentKind> {
    match raw.unwrap_or("region") {
        "region" => Some(AttachmentKind::Region),
        "boundingbox" => Some(AttachmentKind::BoundingBox),
        "mesh" => Some(AttachmentKind::Mesh),
        "linkedmesh" => Some(AttachmentKind::LinkedMesh),
        "path" => Some(AttachmentKind::Path),
        "point" => Some(AttachmentKind::Point),
        "clipping" => Some(AttachmentKind::Clipping),
        _ => None,
    }
}

fn parse_blend_mode(raw: Option<&str>, slot: &str) -> BlendMode {
    match raw.unwrap_or("normal") {
        "normal" => BlendMode::Normal,
        "additive" => BlendMode::Additive,
        "multiply" => BlendMode::Multiply,
        "screen" => BlendMode::Screen,
        other => {
            log::warn!("slot '{slot}' uses unknown blend mode '{other}', using normal");
            BlendMode::Normal
        }
    }
}

fn validate_spine_version(value: &str) -> Result<(), Error> {
    match RuntimeLine::parse(value) {
        Some(_) => Ok(()),
        None => Err(Error::JsonSpineVersion {
            value: value.to_string(),
        }),
    }
}
