//! Capabilities the viewer consumes from the host and the animation runtime.
//!
//! The crate never renders or animates; it drives a runtime through these traits.

use crate::{BlendMode, Bounds, Color, Error, SkeletonData, SkeletonFormat};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Drawable area in screen units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> glam::Vec2 {
        glam::Vec2::new(self.width * 0.5, self.height * 0.5)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkinSelection {
    Named(String),
    /// A skin synthesised at runtime from several data skins.
    Combined { name: String, skins: Vec<String> },
}

impl SkinSelection {
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Combined { name, .. } => name,
        }
    }
}

/// Skeleton payload registered with the asset pipeline.
#[derive(Copy, Clone, Debug)]
pub enum SkeletonPayload<'a> {
    Json(&'a str),
    Binary(&'a [u8]),
}

impl SkeletonPayload<'_> {
    pub fn format(&self) -> SkeletonFormat {
        match self {
            Self::Json(_) => SkeletonFormat::Json,
            Self::Binary(_) => SkeletonFormat::Skel,
        }
    }
}

/// Completion of one asset pipeline run. Owns everything it needs.
pub type PipelineFuture = Pin<Box<dyn Future<Output = Result<(), PipelineError>>>>;

/// First resource that failed while the pipeline was running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineError {
    pub key: String,
    pub message: String,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Temporary URL for a host file. The URL is revoked when the handle is dropped.
pub struct ObjectUrl {
    url: String,
    revoke: Option<Box<dyn FnOnce(&str)>>,
}

impl ObjectUrl {
    pub fn new(url: impl Into<String>, revoke: impl FnOnce(&str) + 'static) -> Self {
        Self {
            url: url.into(),
            revoke: Some(Box::new(revoke)),
        }
    }

    /// A URL that needs no cleanup (data URLs, plain paths).
    pub fn persistent(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            revoke: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectUrl")
            .field("url", &self.url)
            .field("revocable", &self.revoke.is_some())
            .finish()
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        if let Some(revoke) = self.revoke.take() {
            revoke(&self.url);
        }
    }
}

/// Host event listener registration, removed on drop.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

/// A file picked by the user.
pub trait FileHandle {
    fn name(&self) -> &str;
    fn read_text(&self) -> impl Future<Output = Result<String, Error>>;
    fn read_bytes(&self) -> impl Future<Output = Result<Vec<u8>, Error>>;
    fn object_url(&self) -> Result<ObjectUrl, Error>;
}

/// A live skeleton owned by the runtime. Dropping it destroys the instance.
pub trait SkeletonInstance {
    /// Setup-pose bounds as reported by the runtime, in skeleton units.
    fn bounds(&self) -> Bounds;

    fn scale(&self) -> f32;
    fn set_scale(&mut self, scale: f32);
    fn position(&self) -> glam::Vec2;
    fn set_position(&mut self, position: glam::Vec2);
    fn set_depth(&mut self, depth: i32);
    fn set_alpha(&mut self, alpha: f32);
    fn set_blend_mode(&mut self, blend: BlendMode);

    /// Direct access to the skeleton colour, when the runtime exposes it.
    fn color_mut(&mut self) -> Option<&mut Color> {
        None
    }

    /// Packed `0xRRGGBB` tint for runtimes without colour channel access.
    fn set_tint(&mut self, _rgb: u32) {}

    fn clear_tint(&mut self) {}

    fn set_skin(&mut self, skin: &SkinSelection) -> Result<(), Error>;
    fn set_slots_to_setup_pose(&mut self);
    fn set_animation(&mut self, track: usize, name: &str, looping: bool) -> Result<(), Error>;
}

/// Animation runtime plus its queue/commit asset pipeline.
pub trait SpineRuntime {
    type Instance: SkeletonInstance;

    fn supports_binary(&self) -> bool {
        true
    }

    fn viewport(&self) -> Viewport;

    fn queue_texture(&mut self, key: &str, url: &ObjectUrl);

    fn queue_audio(&mut self, _key: &str, _url: &ObjectUrl) {}

    fn register_atlas(&mut self, key: &str, text: &str);

    fn register_skeleton(&mut self, key: &str, payload: SkeletonPayload<'_>);

    /// Starts every queued load. Resolves once all of them finished, or with the
    /// first failure.
    fn start(&mut self) -> PipelineFuture;

    fn spawn(&mut self, skeleton_key: &str, atlas_key: &str) -> Result<Self::Instance, Error>;
}

/// One instance on screen together with the description it was built from.
#[derive(Debug)]
pub struct LoadedSkeleton<I> {
    pub instance: I,
    pub data: Arc<SkeletonData>,
    pub format: SkeletonFormat,
    pub key: String,
}
