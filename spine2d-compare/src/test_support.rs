//! Mocks and fixtures shared by the unit tests.

#![allow(dead_code)]

use crate::{
    BlendMode, Bounds, Color, Error, FileHandle, ObjectUrl, PipelineError, PipelineFuture,
    SkeletonData, SkeletonFormat, SkeletonInstance, SkeletonPayload, SkinSelection, SpineRuntime,
    Viewport,
};
use glam::Vec2;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Side effects observed by mocks, in order.
#[derive(Clone, Debug, Default)]
pub(crate) struct EventLog(Rc<RefCell<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MockFile {
    name: String,
    contents: Vec<u8>,
    log: EventLog,
}

impl MockFile {
    pub fn new(log: &EventLog, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            contents: contents.into(),
            log: log.clone(),
        }
    }
}

impl FileHandle for MockFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_text(&self) -> Result<String, Error> {
        String::from_utf8(self.contents.clone()).map_err(|e| Error::ReadFile {
            name: self.name.clone(),
            message: e.to_string(),
        })
    }

    async fn read_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(self.contents.clone())
    }

    fn object_url(&self) -> Result<ObjectUrl, Error> {
        let log = self.log.clone();
        Ok(ObjectUrl::new(format!("blob:{}", self.name), move |url| {
            log.push(format!("revoke {url}"))
        }))
    }
}

#[derive(Debug)]
pub(crate) struct MockInstance {
    pub key: String,
    pub bounds: Bounds,
    pub scale: f32,
    pub position: Vec2,
    pub depth: i32,
    pub alpha: f32,
    pub blend: Option<BlendMode>,
    pub color: Option<Color>,
    pub tint: Option<u32>,
    pub clear_tint_calls: usize,
    pub skin: Option<SkinSelection>,
    pub setup_pose_calls: usize,
    pub animation: Option<(usize, String, bool)>,
    log: EventLog,
}

impl MockInstance {
    pub fn new(log: &EventLog, key: &str, bounds: Bounds) -> Self {
        Self {
            key: key.to_string(),
            bounds,
            scale: 1.0,
            position: Vec2::ZERO,
            depth: 0,
            alpha: 1.0,
            blend: None,
            color: None,
            tint: None,
            clear_tint_calls: 0,
            skin: None,
            setup_pose_calls: 0,
            animation: None,
            log: log.clone(),
        }
    }

    pub fn with_color_channels(mut self) -> Self {
        self.color = Some(Color::WHITE);
        self
    }

    /// Screen-space centre of the runtime bounds.
    pub fn screen_centre(&self) -> Vec2 {
        self.position + self.bounds.center() * self.scale
    }
}

impl Drop for MockInstance {
    fn drop(&mut self) {
        self.log.push(format!("destroy {}", self.key));
    }
}

impl SkeletonInstance for MockInstance {
    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn scale(&self) -> f32 {
        self.scale
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    fn set_depth(&mut self, depth: i32) {
        self.depth = depth;
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    fn set_blend_mode(&mut self, blend: BlendMode) {
        self.blend = Some(blend);
    }

    fn color_mut(&mut self) -> Option<&mut Color> {
        self.color.as_mut()
    }

    fn set_tint(&mut self, rgb: u32) {
        self.tint = Some(rgb);
    }

    fn clear_tint(&mut self) {
        self.tint = None;
        self.clear_tint_calls += 1;
    }

    fn set_skin(&mut self, skin: &SkinSelection) -> Result<(), Error> {
        self.skin = Some(skin.clone());
        Ok(())
    }

    fn set_slots_to_setup_pose(&mut self) {
        self.setup_pose_calls += 1;
    }

    fn set_animation(&mut self, track: usize, name: &str, looping: bool) -> Result<(), Error> {
        self.animation = Some((track, name.to_string(), looping));
        Ok(())
    }
}

/// Pipeline completion that stays pending until its gate opens.
struct GatedStart {
    gate: Option<Rc<Cell<bool>>>,
    result: Result<(), PipelineError>,
}

impl Future for GatedStart {
    type Output = Result<(), PipelineError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.gate.as_ref().is_some_and(|g| !g.get()) {
            return Poll::Pending;
        }
        Poll::Ready(self.result.clone())
    }
}

#[derive(Debug)]
pub(crate) struct MockRuntime {
    pub log: EventLog,
    pub viewport: Viewport,
    pub binary: bool,
    pub color_channels: bool,
    /// Bounds handed to spawned instances, by format.
    pub json_bounds: Bounds,
    pub skel_bounds: Bounds,
    pub textures: Vec<(String, String)>,
    pub audio: Vec<(String, String)>,
    pub atlases: Vec<(String, String)>,
    pub skeletons: Vec<(String, SkeletonFormat)>,
    /// Resource key reported as failed by the next `start`.
    pub fail_key: Option<String>,
    /// Holds the next `start` until the cell is set.
    pub gate: Option<Rc<Cell<bool>>>,
    /// Skeleton key whose `spawn` fails.
    pub fail_spawn: Option<String>,
}

impl MockRuntime {
    pub fn new(log: &EventLog) -> Self {
        let bounds = Bounds::new(Vec2::new(-100.0, 0.0), Vec2::new(200.0, 300.0));
        Self {
            log: log.clone(),
            viewport: Viewport::new(1000.0, 600.0),
            binary: true,
            color_channels: false,
            json_bounds: bounds,
            skel_bounds: bounds,
            textures: Vec::new(),
            audio: Vec::new(),
            atlases: Vec::new(),
            skeletons: Vec::new(),
            fail_key: None,
            gate: None,
            fail_spawn: None,
        }
    }
}

impl SpineRuntime for MockRuntime {
    type Instance = MockInstance;

    fn supports_binary(&self) -> bool {
        self.binary
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn queue_texture(&mut self, key: &str, url: &ObjectUrl) {
        self.textures.push((key.to_string(), url.as_str().to_string()));
    }

    fn queue_audio(&mut self, key: &str, url: &ObjectUrl) {
        self.audio.push((key.to_string(), url.as_str().to_string()));
    }

    fn register_atlas(&mut self, key: &str, text: &str) {
        self.atlases.push((key.to_string(), text.to_string()));
    }

    fn register_skeleton(&mut self, key: &str, payload: SkeletonPayload<'_>) {
        self.skeletons.push((key.to_string(), payload.format()));
    }

    fn start(&mut self) -> PipelineFuture {
        self.log.push("start");
        let result = match self.fail_key.take() {
            Some(key) => Err(PipelineError {
                key,
                message: "404".to_string(),
            }),
            None => Ok(()),
        };
        Box::pin(GatedStart {
            gate: self.gate.take(),
            result,
        })
    }

    fn spawn(&mut self, skeleton_key: &str, atlas_key: &str) -> Result<MockInstance, Error> {
        let format = self
            .skeletons
            .iter()
            .rev()
            .find(|(key, _)| key == skeleton_key)
            .map(|(_, format)| *format)
            .ok_or_else(|| Error::Spawn {
                key: skeleton_key.to_string(),
                message: "not registered".to_string(),
            })?;
        if !self.atlases.iter().any(|(key, _)| key == atlas_key) {
            return Err(Error::Spawn {
                key: skeleton_key.to_string(),
                message: format!("atlas '{atlas_key}' not registered"),
            });
        }
        if self.fail_spawn.as_deref() == Some(skeleton_key) {
            return Err(Error::Spawn {
                key: skeleton_key.to_string(),
                message: "runtime refused the skeleton".to_string(),
            });
        }
        self.log.push(format!("spawn {skeleton_key}"));
        let bounds = match format {
            SkeletonFormat::Json => self.json_bounds,
            SkeletonFormat::Skel => self.skel_bounds,
        };
        let instance = MockInstance::new(&self.log, skeleton_key, bounds);
        Ok(if self.color_channels {
            instance.with_color_channels()
        } else {
            instance
        })
    }
}

/// A loaded skeleton with hand-picked runtime bounds and declared canvas.
pub(crate) fn loaded(
    log: &EventLog,
    key: &str,
    runtime: Bounds,
    declared: Option<Bounds>,
) -> crate::LoadedSkeleton<MockInstance> {
    let data = SkeletonData {
        x: declared.map(|b| b.offset.x),
        y: declared.map(|b| b.offset.y),
        width: declared.map(|b| b.size.x),
        height: declared.map(|b| b.size.y),
        ..Default::default()
    };
    crate::LoadedSkeleton {
        instance: MockInstance::new(log, key, runtime),
        data: Arc::new(data),
        format: SkeletonFormat::Json,
        key: key.to_string(),
    }
}

pub(crate) fn bounds(x: f32, y: f32, width: f32, height: f32) -> Bounds {
    Bounds::new(Vec2::new(x, y), Vec2::new(width, height))
}

/// Big-endian `.skel` writer mirroring the reader's primitives.
#[derive(Default)]
pub(crate) struct SkelWriter {
    pub bytes: Vec<u8>,
}

impl SkelWriter {
    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.bytes.push(v);
        self
    }

    pub fn u8s(&mut self, v: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(v);
        self
    }

    pub fn i8(&mut self, v: i8) -> &mut Self {
        self.u8(v as u8)
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(u8::from(v))
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.u8s(&v.to_be_bytes())
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.u8s(&v.to_be_bytes())
    }

    pub fn f32s(&mut self, v: &[f32]) -> &mut Self {
        for &x in v {
            self.f32(x);
        }
        self
    }

    /// Unsigned varint (`optimize_positive`).
    pub fn varint(&mut self, mut v: u32) -> &mut Self {
        loop {
            let b = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                return self.u8(b);
            }
            self.u8(b | 0x80);
        }
    }

    /// Zig-zag varint.
    pub fn signed(&mut self, v: i32) -> &mut Self {
        self.varint(((v << 1) ^ (v >> 31)) as u32)
    }

    pub fn string(&mut self, s: Option<&str>) -> &mut Self {
        match s {
            None => self.varint(0),
            Some(s) => {
                self.varint(s.len() as u32 + 1);
                self.u8s(s.as_bytes())
            }
        }
    }

    pub fn str(&mut self, s: &str) -> &mut Self {
        self.string(Some(s))
    }
}

/// Hash string of [`fixture_skel`].
pub(crate) const FIXTURE_SKEL_HASH: &str = "56781234";

/// Small Spine 4.3 JSON export. [`fixture_skel`] encodes the same skeleton.
pub(crate) const FIXTURE_JSON: &str = r#"{
  "skeleton": { "hash": "fixturehash", "spine": "4.3.39", "x": -100, "y": 0, "width": 200, "height": 300 },
  "bones": [
    { "name": "root" },
    { "name": "hip", "parent": "root", "y": 40, "length": 25 }
  ],
  "slots": [
    { "name": "body", "bone": "hip", "attachment": "body" },
    { "name": "shadow", "bone": "root", "attachment": "shadow" }
  ],
  "constraints": [
    { "type": "ik", "name": "aim", "bones": ["hip"], "target": "root" }
  ],
  "skins": [
    {
      "name": "default",
      "attachments": {
        "body": { "body": { "width": 10, "height": 20 } },
        "shadow": { "shadow": { "type": "boundingbox", "vertexCount": 3, "vertices": [0, 0, 1, 0, 0, 1] } }
      }
    },
    {
      "name": "red",
      "constraints": ["aim"],
      "attachments": {
        "body": { "red-body": { "width": 10, "height": 20 } }
      }
    }
  ],
  "events": {
    "step": { "audio": "step.ogg", "volume": 1, "balance": 0 }
  },
  "animations": {
    "idle": {
      "slots": {
        "body": { "rgba": [ { "color": "ffffffff" }, { "time": 1.5, "color": "ff0000ff" } ] }
      },
      "bones": {
        "hip": { "rotate": [ { "value": 0, "curve": [0.25, 0, 0.75, 1] }, { "time": 1.5, "value": 30 } ] }
      }
    },
    "walk": {
      "bones": {
        "hip": { "translate": [ { "x": 0, "y": 0, "curve": "stepped" }, { "time": 0.5, "x": 10 } ] }
      },
      "ik": {
        "aim": [ { "mix": 1 }, { "time": 0.5 } ]
      },
      "drawOrder": [
        { "time": 0.4, "offsets": [ { "slot": "shadow", "offset": 1 } ] }
      ],
      "events": [
        { "time": 0.25, "name": "step" }
      ]
    }
  }
}"#;

fn fixture_slots(w: &mut SkelWriter) {
    // name, bone, color, dark color, attachment, blend
    w.varint(2);
    w.str("body").varint(1).u8s(&[0xFF; 4]).u8s(&[0xFF; 4]).varint(1).varint(0);
    w.str("shadow").varint(0).u8s(&[0xFF; 4]).u8s(&[0xFF; 4]).varint(2).varint(0);
}

/// Bones in the 4.1 and 4.2 layout: eight transform floats, then the inherit varint.
fn fixture_sectioned_bones(w: &mut SkelWriter) {
    w.varint(2);
    w.str("root").f32s(&[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    w.varint(0).bool(false);
    w.str("hip").varint(0).f32s(&[0.0, 0.0, 40.0, 1.0, 1.0, 0.0, 0.0, 25.0]);
    w.varint(0).bool(false);
}

/// Default skin with attachments packed behind a flags byte (4.2 and 4.3).
fn fixture_default_skin(w: &mut SkelWriter) {
    w.varint(2);
    w.varint(0).varint(1).varint(1).u8(0);
    w.f32s(&[0.0, 0.0, 1.0, 1.0, 10.0, 20.0]);
    w.varint(1).varint(1).varint(2).u8(1).varint(3);
    w.f32s(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
}

fn fixture_red_body(w: &mut SkelWriter) {
    // slot body, one attachment: region "red-body"
    w.varint(1).varint(0).varint(1).varint(3).u8(0);
    w.f32s(&[0.0, 0.0, 1.0, 1.0, 10.0, 20.0]);
}

/// Slot and bone timelines of "idle".
fn fixture_idle_timelines(w: &mut SkelWriter) {
    // slot body: rgba, 2 frames
    w.varint(1).varint(0).varint(1).u8(1).varint(2).varint(0);
    w.f32(0.0).u8s(&[0xFF, 0xFF, 0xFF, 0xFF]);
    w.f32(1.5).u8s(&[0xFF, 0x00, 0x00, 0xFF]).i8(0);
    // bone hip: rotate, 2 frames, bezier
    w.varint(1).varint(1).varint(1).u8(0).varint(2).varint(1);
    w.f32(0.0).f32(0.0);
    w.f32(1.5).f32(30.0).i8(2).f32s(&[0.25, 0.0, 0.75, 1.0]);
}

/// No slot timelines, then the stepped hip translate of "walk".
fn fixture_walk_bones(w: &mut SkelWriter) {
    w.varint(0);
    w.varint(1).varint(1).varint(1).u8(1).varint(2).varint(0);
    w.f32(0.0).f32s(&[0.0, 0.0]);
    w.f32(0.5).f32s(&[10.0, 0.0]).i8(1);
}

/// Draw order and event timelines of "walk".
fn fixture_walk_tail(w: &mut SkelWriter) {
    w.varint(1).f32(0.4).varint(1).varint(1).varint(1);
    w.varint(1).f32(0.25).varint(0).signed(0).f32(0.0).string(None);
    w.f32s(&[1.0, 0.0]);
}

/// 4.2 and 4.3 IK timeline of "aim": a flags byte leads every key.
fn fixture_walk_ik(w: &mut SkelWriter) {
    w.varint(1).varint(0).varint(2).varint(0);
    w.u8(3).f32(0.0).f32(1.0);
    w.u8(0).f32(0.5);
}

fn zeros(w: &mut SkelWriter, count: usize) {
    for _ in 0..count {
        w.varint(0);
    }
}

/// Binary encoding of [`FIXTURE_JSON`]; only the hash differs.
pub(crate) fn fixture_skel() -> Vec<u8> {
    let mut w = SkelWriter::default();
    w.i32(0x1234).i32(0x5678).str("4.3.39");
    w.f32s(&[-100.0, 0.0, 200.0, 300.0, 100.0]).bool(false);

    // strings
    w.varint(3).str("body").str("shadow").str("red-body");

    // bones
    w.varint(2);
    w.str("root").f32s(&[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    w.u8(0).f32(0.0).bool(false);
    w.str("hip").varint(0).f32s(&[0.0, 0.0, 40.0, 1.0, 1.0, 0.0, 0.0]);
    w.u8(0).f32(25.0).bool(false);

    fixture_slots(&mut w);

    // constraints: ik "aim", bones [hip], target root
    w.varint(1).str("aim").u8(0).varint(1).varint(1).varint(0).u8(0);

    fixture_default_skin(&mut w);

    // named skins: name, bones, constraints
    w.varint(1).str("red").varint(0).varint(1).varint(0);
    fixture_red_body(&mut w);

    // events
    w.varint(1).str("step").signed(0).f32(0.0).string(None).str("step.ogg");
    w.f32s(&[1.0, 0.0]);

    // animations
    w.varint(2);

    w.str("idle").varint(2);
    fixture_idle_timelines(&mut w);
    // ik, transform, path, physics, slider, attachment, draw order, events
    zeros(&mut w, 8);

    w.str("walk").varint(4);
    fixture_walk_bones(&mut w);
    fixture_walk_ik(&mut w);
    // transform, path, physics, slider, attachment
    zeros(&mut w, 5);
    fixture_walk_tail(&mut w);

    w.bytes
}

/// [`FIXTURE_JSON`] in the Spine 4.2 layout; only the hash and version differ.
pub(crate) fn fixture_skel_v42() -> Vec<u8> {
    let mut w = SkelWriter::default();
    w.i32(0x1234).i32(0x5678).str("4.2.43");
    w.f32s(&[-100.0, 0.0, 200.0, 300.0, 100.0]).bool(false);
    w.varint(3).str("body").str("shadow").str("red-body");

    fixture_sectioned_bones(&mut w);
    fixture_slots(&mut w);

    // ik: name, order, bones [hip], target root, flags
    w.varint(1).str("aim").varint(0).varint(1).varint(1).varint(0).u8(0);
    // transform, path, physics
    zeros(&mut w, 3);

    fixture_default_skin(&mut w);

    // named skins: name, bones, then ik, transform, path and physics indices
    w.varint(1).str("red").varint(0);
    w.varint(1).varint(0);
    zeros(&mut w, 3);
    fixture_red_body(&mut w);

    w.varint(1).str("step").signed(0).f32(0.0).string(None).str("step.ogg");
    w.f32s(&[1.0, 0.0]);

    w.varint(2);

    w.str("idle").varint(2);
    fixture_idle_timelines(&mut w);
    // ik, transform, path, physics, attachment, draw order, events
    zeros(&mut w, 7);

    w.str("walk").varint(4);
    fixture_walk_bones(&mut w);
    fixture_walk_ik(&mut w);
    // transform, path, physics, attachment
    zeros(&mut w, 4);
    fixture_walk_tail(&mut w);

    w.bytes
}

/// [`FIXTURE_JSON`] in the Spine 4.1 layout; only the hash and version differ.
pub(crate) fn fixture_skel_v41() -> Vec<u8> {
    let mut w = SkelWriter::default();
    w.i32(0x1234).i32(0x5678).str("4.1.24");
    w.f32s(&[-100.0, 0.0, 200.0, 300.0]).bool(false);
    // skin and event names are string references in 4.1
    w.varint(5).str("body").str("shadow").str("red-body").str("red").str("step");

    fixture_sectioned_bones(&mut w);
    fixture_slots(&mut w);

    // ik: name, order, skin required, bones [hip], target root, mix, softness,
    // bend direction, compress, stretch, uniform
    w.varint(1).str("aim").varint(0).bool(false).varint(1).varint(1).varint(0);
    w.f32s(&[1.0, 0.0]).i8(1).bool(false).bool(false).bool(false);
    // transform, path
    zeros(&mut w, 2);

    // default skin: name ref, type, then the type's fields
    w.varint(2);
    w.varint(0).varint(1).varint(1).varint(0).u8(0);
    w.varint(0).f32s(&[0.0, 0.0, 0.0, 1.0, 1.0, 10.0, 20.0]);
    w.u8s(&[0xFF; 4]).bool(false);
    w.varint(1).varint(1).varint(2).varint(0).u8(1);
    w.varint(3).bool(false).f32s(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);

    // named skins: name ref, bones, then ik, transform and path indices
    w.varint(1).varint(4).varint(0);
    w.varint(1).varint(0);
    zeros(&mut w, 2);
    w.varint(1).varint(0).varint(1).varint(3).varint(0).u8(0);
    w.varint(0).f32s(&[0.0, 0.0, 0.0, 1.0, 1.0, 10.0, 20.0]);
    w.u8s(&[0xFF; 4]).bool(false);

    w.varint(1).varint(5).signed(0).f32(0.0).string(None).str("step.ogg");
    w.f32s(&[1.0, 0.0]);

    w.varint(2);

    w.str("idle").varint(2);
    fixture_idle_timelines(&mut w);
    // ik, transform, path, attachment, draw order, events
    zeros(&mut w, 6);

    w.str("walk").varint(4);
    fixture_walk_bones(&mut w);
    // ik aim: time, mix, softness, then bend direction, compress, stretch per key
    w.varint(1).varint(0).varint(2).varint(0);
    w.f32s(&[0.0, 1.0, 0.0]).i8(1).bool(false).bool(false);
    w.f32s(&[0.5, 1.0, 0.0]).i8(0).i8(1).bool(false).bool(false);
    // transform, path, attachment
    zeros(&mut w, 3);
    fixture_walk_tail(&mut w);

    w.bytes
}

pub(crate) const FIXTURE_ATLAS: &str = "hero.png\nsize: 64, 64\nfilter: Linear, Linear\nbody\n  bounds: 0, 0, 10, 20\nred-body\n  bounds: 10, 0, 10, 20\n\nhero2.png\nsize: 32, 32\nshadow\n  bounds: 0, 0, 8, 8\n";
