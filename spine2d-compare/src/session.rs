//! Load cycles and the live state of one viewer.
//!
//! A [`Session`] owns the runtime and everything a load produced. Hosts keep it in an
//! `Rc<RefCell<_>>` and drive it from their event loop; the async entry points release the
//! borrow at every suspension point, so input events may be handled while a load is pending.

use crate::atlas::{atlas_page_names, resolve_pages, rewrite_page_names, texture_key};
use crate::layout::hit_test;
use crate::names::sort_natural;
use crate::{
    AppearanceUpdate, CompareAppearance, CompareLayout, DiffReport, Error, FileHandle,
    LayoutMode, LoadedSkeleton, MissingAssetPolicy, ObjectUrl, PanGesture, PipelineFuture,
    Placement, SkeletonData, SkeletonFormat, SkeletonInstance, SkeletonPayload, SkinSelection,
    SpineRuntime, Subscription, ViewerConfig, Viewport, diff, layout,
};
use glam::Vec2;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

const DEFAULT_SKIN: &str = "default";

/// Files picked for one load. Texture pages and audio are matched by file name.
#[derive(Debug)]
pub struct SpineFiles<F> {
    pub json: Option<F>,
    pub skel: Option<F>,
    pub atlas: Option<F>,
    pub images: Vec<F>,
    pub audio: Vec<F>,
}

impl<F> Default for SpineFiles<F> {
    fn default() -> Self {
        Self {
            json: None,
            skel: None,
            atlas: None,
            images: Vec::new(),
            audio: Vec::new(),
        }
    }
}

impl<F> SpineFiles<F> {
    pub fn skeleton(&self, format: SkeletonFormat) -> Option<&F> {
        match format {
            SkeletonFormat::Json => self.json.as_ref(),
            SkeletonFormat::Skel => self.skel.as_ref(),
        }
    }
}

/// Assets that were referenced but not provided.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadWarnings {
    pub missing_pages: Vec<String>,
    pub missing_audio: Vec<String>,
}

impl LoadWarnings {
    pub fn is_empty(&self) -> bool {
        self.missing_pages.is_empty() && self.missing_audio.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadSummary {
    pub generation: u64,
    pub key: String,
    pub version: Option<String>,
    pub skins: Vec<String>,
    pub animations: Vec<String>,
    pub placement: Option<Placement>,
    pub warnings: LoadWarnings,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CompareOptions {
    /// Falls back to [`ViewerConfig::compare_layout`].
    pub layout: Option<CompareLayout>,
    pub appearance: AppearanceUpdate,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompareOutcome {
    pub layout: CompareLayout,
    /// Placements in load order: JSON first, binary second.
    pub metrics: Vec<Placement>,
    /// JSON description as side A, binary as side B.
    pub report: DiffReport,
    pub warnings: LoadWarnings,
}

pub struct Session<R: SpineRuntime> {
    runtime: R,
    config: ViewerConfig,
    viewport: Viewport,
    appearance: CompareAppearance,
    layout_mode: Option<LayoutMode>,
    pan: PanGesture,
    skeletons: Vec<LoadedSkeleton<R::Instance>>,
    placements: Vec<Placement>,
    urls: Vec<ObjectUrl>,
    listeners: Vec<Subscription>,
    warnings: LoadWarnings,
    report: Option<DiffReport>,
    generation: u64,
}

impl<R: SpineRuntime> Session<R> {
    pub fn new(runtime: R, config: ViewerConfig) -> Self {
        let viewport = runtime.viewport();
        Self {
            runtime,
            viewport,
            appearance: config.appearance,
            config,
            layout_mode: None,
            pan: PanGesture::default(),
            skeletons: Vec::new(),
            placements: Vec::new(),
            urls: Vec::new(),
            listeners: Vec::new(),
            warnings: LoadWarnings::default(),
            report: None,
            generation: 0,
        }
    }

    pub fn shared(runtime: R, config: ViewerConfig) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(runtime, config)))
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Number of load cycles started so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn skeletons(&self) -> &[LoadedSkeleton<R::Instance>] {
        &self.skeletons
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn warnings(&self) -> &LoadWarnings {
        &self.warnings
    }

    /// Report of the last successful compare load.
    pub fn report(&self) -> Option<&DiffReport> {
        self.report.as_ref()
    }

    pub fn appearance(&self) -> &CompareAppearance {
        &self.appearance
    }

    pub fn layout_mode(&self) -> Option<LayoutMode> {
        self.layout_mode
    }

    pub fn pan_offset(&self) -> Vec2 {
        self.pan.offset()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_loaded(&self) -> bool {
        !self.skeletons.is_empty()
    }

    /// Skin names of the primary skeleton, in file order.
    pub fn skin_names(&self) -> Vec<String> {
        self.skeletons
            .first()
            .map(|s| s.data.skins.iter().map(|skin| skin.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Animation names of the primary skeleton, in file order.
    pub fn animation_names(&self) -> Vec<String> {
        self.skeletons
            .first()
            .map(|s| s.data.animations.iter().map(|a| a.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Shows skin `name` on every loaded skeleton that has it.
    pub fn set_skin(&mut self, name: &str) -> Result<(), Error> {
        if !self.skeletons.iter().any(|s| s.data.skin(name).is_some()) {
            return Err(Error::UnknownSkin {
                name: name.to_string(),
            });
        }
        let selection = SkinSelection::Named(name.to_string());
        for skeleton in &mut self.skeletons {
            if skeleton.data.skin(name).is_none() {
                log::warn!("skeleton '{}' has no skin '{name}'", skeleton.key);
                continue;
            }
            skeleton.instance.set_skin(&selection)?;
            skeleton.instance.set_slots_to_setup_pose();
        }
        Ok(())
    }

    /// Plays animation `name` on track 0 of every loaded skeleton that has it.
    pub fn set_animation(&mut self, name: &str, looping: bool) -> Result<(), Error> {
        if !self.skeletons.iter().any(|s| s.data.animation(name).is_some()) {
            return Err(Error::UnknownAnimation {
                name: name.to_string(),
            });
        }
        for skeleton in &mut self.skeletons {
            if skeleton.data.animation(name).is_none() {
                log::warn!("skeleton '{}' has no animation '{name}'", skeleton.key);
                continue;
            }
            skeleton.instance.set_animation(0, name, looping)?;
        }
        Ok(())
    }

    /// Re-runs layout with the current mode, viewport, pan offset and appearance.
    pub fn relayout(&mut self) -> &[Placement] {
        self.placements = layout(
            &mut self.skeletons,
            self.layout_mode,
            self.viewport,
            self.pan.offset(),
            &self.config.layout,
            &self.appearance,
        );
        &self.placements
    }

    /// `None` fits every instance on its own.
    pub fn set_compare_layout(&mut self, layout: Option<CompareLayout>) {
        self.layout_mode = layout.map(LayoutMode::from);
        if self.is_loaded() {
            self.relayout();
        }
    }

    pub fn set_compare_appearance(&mut self, update: AppearanceUpdate) {
        self.appearance.apply(update);
        if self.is_loaded() {
            self.relayout();
        }
    }

    /// Returns `true` when the pointer started a pan drag.
    pub fn on_pointer_down(&mut self, pointer: u32, at: Vec2) -> bool {
        let hit = hit_test(&self.skeletons, at);
        self.pan.pointer_down(pointer, at, hit)
    }

    /// Returns `true` when the pan offset changed and layout was re-run.
    pub fn on_pointer_move(&mut self, pointer: u32, at: Vec2) -> bool {
        if !self.pan.pointer_move(pointer, at) {
            return false;
        }
        self.relayout();
        true
    }

    pub fn on_pointer_up(&mut self, pointer: u32) -> bool {
        self.pan.pointer_up(pointer)
    }

    pub fn on_resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if self.is_loaded() {
            self.relayout();
        }
    }

    /// Keeps a host listener registered until [`Session::shutdown`] or drop.
    pub fn attach_listener(&mut self, subscription: Subscription) {
        self.listeners.push(subscription);
    }

    /// Releases every instance, URL and listener. Pending loads resolve as superseded.
    pub fn shutdown(&mut self) {
        self.teardown();
        self.listeners.clear();
        self.generation += 1;
        log::info!("session shut down");
    }

    fn teardown(&mut self) {
        if !self.skeletons.is_empty() || !self.urls.is_empty() {
            log::debug!(
                "releasing {} skeleton(s) and {} object URL(s)",
                self.skeletons.len(),
                self.urls.len()
            );
        }
        self.skeletons.clear();
        self.urls.clear();
        self.placements.clear();
        self.pan.reset();
        self.layout_mode = None;
        self.warnings = LoadWarnings::default();
        self.report = None;
    }

    fn begin_cycle(&mut self) -> u64 {
        self.teardown();
        self.generation += 1;
        self.generation
    }

    fn ensure_current(&self, generation: u64) -> Result<(), Error> {
        if self.generation != generation {
            return Err(Error::Superseded { generation });
        }
        Ok(())
    }

    fn stage<F: FileHandle>(
        &mut self,
        generation: u64,
        files: &SpineFiles<F>,
        atlas_text: &str,
        sources: &[Source],
        descriptions: &[Arc<SkeletonData>],
    ) -> Result<Staged, Error> {
        let atlas_key = format!("spine_{generation}");

        let pages = atlas_page_names(atlas_text);
        let pages = resolve_pages(&pages, &files.images);
        if !pages.is_complete() {
            log::warn!(
                "atlas references texture pages that were not provided: {}",
                pages.missing.join(", ")
            );
            if self.config.missing_pages == MissingAssetPolicy::Fail {
                return Err(Error::MissingTexturePages {
                    pages: pages.missing,
                });
            }
        }
        for (page, file) in &pages.resolved {
            let url = file.object_url()?;
            self.runtime.queue_texture(&texture_key(&atlas_key, page), &url);
            self.urls.push(url);
        }
        self.runtime
            .register_atlas(&atlas_key, &rewrite_page_names(atlas_text, &atlas_key));

        let mut keys = Vec::with_capacity(sources.len());
        for source in sources {
            let key = if sources.len() == 1 {
                atlas_key.clone()
            } else {
                format!("{atlas_key}_{}", source.format())
            };
            self.runtime.register_skeleton(&key, source.payload());
            keys.push(key);
        }

        let mut audio: Vec<String> = descriptions
            .iter()
            .flat_map(|d| d.audio_paths())
            .map(|path| file_name(path).to_string())
            .collect();
        sort_natural(&mut audio);
        audio.dedup();
        let audio = resolve_pages(&audio, &files.audio);
        if !audio.is_complete() {
            log::warn!(
                "events reference audio files that were not provided: {}",
                audio.missing.join(", ")
            );
        }
        for (name, file) in &audio.resolved {
            let url = file.object_url()?;
            self.runtime.queue_audio(&format!("{atlas_key}_audio_{name}"), &url);
            self.urls.push(url);
        }

        self.warnings = LoadWarnings {
            missing_pages: pages.missing,
            missing_audio: audio.missing,
        };
        log::info!(
            "load cycle {generation}: queued {} texture page(s) and {} skeleton(s)",
            pages.resolved.len(),
            keys.len()
        );
        Ok(Staged {
            pipeline: self.runtime.start(),
            atlas_key,
            keys,
        })
    }

    fn spawn_all(
        &mut self,
        atlas_key: &str,
        keys: Vec<String>,
        sources: &[Source],
        descriptions: Vec<Arc<SkeletonData>>,
    ) -> Result<(), Error> {
        // Instances spawned before a failure are dropped with `spawned`.
        let mut spawned = Vec::with_capacity(keys.len());
        for ((key, source), data) in keys.into_iter().zip(sources).zip(descriptions) {
            let mut instance = self.runtime.spawn(&key, atlas_key)?;
            show_initial_pose(&mut instance, &data, &key);
            spawned.push(LoadedSkeleton {
                instance,
                data,
                format: source.format(),
                key,
            });
        }
        self.skeletons = spawned;
        Ok(())
    }
}

impl<R: SpineRuntime + std::fmt::Debug> std::fmt::Debug for Session<R>
where
    R::Instance: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("runtime", &self.runtime)
            .field("generation", &self.generation)
            .field("layout_mode", &self.layout_mode)
            .field("skeletons", &self.skeletons)
            .field("urls", &self.urls.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

struct Staged {
    pipeline: PipelineFuture,
    atlas_key: String,
    keys: Vec<String>,
}

enum Source {
    Json(String),
    Skel(Vec<u8>),
}

impl Source {
    async fn read<F: FileHandle>(file: &F, format: SkeletonFormat) -> Result<Self, Error> {
        match format {
            SkeletonFormat::Json => Ok(Self::Json(file.read_text().await?)),
            SkeletonFormat::Skel => Ok(Self::Skel(file.read_bytes().await?)),
        }
    }

    fn format(&self) -> SkeletonFormat {
        match self {
            Self::Json(_) => SkeletonFormat::Json,
            Self::Skel(_) => SkeletonFormat::Skel,
        }
    }

    fn payload(&self) -> SkeletonPayload<'_> {
        match self {
            Self::Json(text) => SkeletonPayload::Json(text),
            Self::Skel(bytes) => SkeletonPayload::Binary(bytes),
        }
    }

    fn parse(&self) -> Result<Arc<SkeletonData>, Error> {
        match self {
            #[cfg(feature = "json")]
            Self::Json(text) => SkeletonData::from_json_str(text),
            #[cfg(not(feature = "json"))]
            Self::Json(_) => Err(Error::FormatDisabled {
                format: SkeletonFormat::Json,
            }),
            #[cfg(feature = "binary")]
            Self::Skel(bytes) => SkeletonData::from_skel_bytes(bytes),
            #[cfg(not(feature = "binary"))]
            Self::Skel(_) => Err(Error::FormatDisabled {
                format: SkeletonFormat::Skel,
            }),
        }
    }
}

fn format_enabled(format: SkeletonFormat) -> bool {
    match format {
        SkeletonFormat::Json => cfg!(feature = "json"),
        SkeletonFormat::Skel => cfg!(feature = "binary"),
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Skin shown right after spawning: `default` plus the first other skin when the
/// skeleton has several.
pub fn initial_skin(data: &SkeletonData) -> Option<SkinSelection> {
    let first = data.skins.first()?;
    let has_default = data.skin(DEFAULT_SKIN).is_some();
    let extra = data.skins.iter().find(|s| s.name != DEFAULT_SKIN);
    match (has_default, extra) {
        (true, Some(extra)) => Some(SkinSelection::Combined {
            name: format!("{DEFAULT_SKIN}+{}", extra.name),
            skins: vec![DEFAULT_SKIN.to_string(), extra.name.clone()],
        }),
        _ => Some(SkinSelection::Named(first.name.clone())),
    }
}

fn show_initial_pose<I: SkeletonInstance>(
    instance: &mut I,
    data: &SkeletonData,
    key: &str,
) {
    if let Some(skin) = initial_skin(data) {
        if let Err(e) = instance.set_skin(&skin) {
            log::warn!("'{key}': could not set skin '{}': {e}", skin.name());
        }
    }
    instance.set_slots_to_setup_pose();
    if let Some(animation) = data.animations.first() {
        if let Err(e) = instance.set_animation(0, &animation.name, true) {
            log::warn!("'{key}': could not play animation '{}': {e}", animation.name);
        }
    }
}

struct Request {
    formats: Vec<SkeletonFormat>,
    mode: Option<LayoutMode>,
    appearance: AppearanceUpdate,
}

fn required_files<'a, F>(
    files: &'a SpineFiles<F>,
    formats: &[SkeletonFormat],
    supports_binary: bool,
) -> Result<(&'a F, Vec<&'a F>), Error> {
    let mut skeletons = Vec::with_capacity(formats.len());
    for &format in formats {
        let file = files
            .skeleton(format)
            .ok_or(Error::MissingSkeletonFile { format })?;
        skeletons.push(file);
    }
    for &format in formats {
        if format == SkeletonFormat::Skel && !supports_binary {
            return Err(Error::BinaryUnsupported);
        }
        if !format_enabled(format) {
            return Err(Error::FormatDisabled { format });
        }
    }
    let atlas = files.atlas.as_ref().ok_or(Error::MissingAtlasFile)?;
    Ok((atlas, skeletons))
}

/// Runs one load cycle and returns its generation. Nothing is torn down when the inputs
/// are incomplete.
async fn run_cycle<R, F>(
    session: &RefCell<Session<R>>,
    files: &SpineFiles<F>,
    request: Request,
) -> Result<u64, Error>
where
    R: SpineRuntime,
    F: FileHandle,
{
    let supports_binary = session.borrow().runtime.supports_binary();
    let (atlas, skeleton_files) = required_files(files, &request.formats, supports_binary)?;

    let generation = {
        let mut s = session.borrow_mut();
        let generation = s.begin_cycle();
        s.appearance.apply(request.appearance);
        generation
    };
    log::info!(
        "load cycle {generation}: reading {} skeleton(s) and atlas '{}'",
        skeleton_files.len(),
        atlas.name()
    );

    let atlas_text = atlas.read_text().await?;
    let mut sources = Vec::with_capacity(skeleton_files.len());
    for (file, &format) in skeleton_files.iter().zip(&request.formats) {
        sources.push(Source::read(*file, format).await?);
    }
    let descriptions = sources
        .iter()
        .map(Source::parse)
        .collect::<Result<Vec<_>, _>>()?;

    let staged = {
        let mut s = session.borrow_mut();
        s.ensure_current(generation)?;
        s.stage(generation, files, &atlas_text, &sources, &descriptions)?
    };
    staged.pipeline.await?;

    let mut s = session.borrow_mut();
    s.ensure_current(generation)?;
    s.spawn_all(&staged.atlas_key, staged.keys, &sources, descriptions)?;
    s.layout_mode = request.mode;
    s.relayout();
    log::info!(
        "load cycle {generation}: displaying {} skeleton(s)",
        s.skeletons.len()
    );
    Ok(generation)
}

fn log_failure(what: &str, e: &Error) {
    match e {
        Error::Superseded { generation } => {
            log::info!("{what}: cycle {generation} superseded by a newer load")
        }
        _ => log::error!("{what} failed: {e}"),
    }
}

/// Loads one skeleton in `format` and fits it into the viewport.
pub async fn load_and_display<R, F>(
    session: &RefCell<Session<R>>,
    files: &SpineFiles<F>,
    format: SkeletonFormat,
) -> Result<LoadSummary, Error>
where
    R: SpineRuntime,
    F: FileHandle,
{
    let request = Request {
        formats: vec![format],
        mode: None,
        appearance: AppearanceUpdate::default(),
    };
    let generation = run_cycle(session, files, request)
        .await
        .inspect_err(|e| log_failure(&format!("loading {format} skeleton"), e))?;

    let s = session.borrow();
    let (key, version) = s
        .skeletons
        .first()
        .map(|sk| (sk.key.clone(), sk.data.version.clone()))
        .unwrap_or_default();
    Ok(LoadSummary {
        generation,
        key,
        version,
        skins: s.skin_names(),
        animations: s.animation_names(),
        placement: s.placements.first().copied(),
        warnings: s.warnings.clone(),
    })
}

/// Loads the JSON and binary exports of one skeleton, lays them out together and
/// reports how their descriptions differ.
pub async fn load_and_display_compare<R, F>(
    session: &RefCell<Session<R>>,
    files: &SpineFiles<F>,
    options: CompareOptions,
) -> Result<CompareOutcome, Error>
where
    R: SpineRuntime,
    F: FileHandle,
{
    let layout = options
        .layout
        .unwrap_or(session.borrow().config.compare_layout);
    let request = Request {
        formats: vec![SkeletonFormat::Json, SkeletonFormat::Skel],
        mode: Some(layout.into()),
        appearance: options.appearance,
    };
    run_cycle(session, files, request)
        .await
        .inspect_err(|e| log_failure("compare load", e))?;

    let mut s = session.borrow_mut();
    let report = match s.skeletons.as_slice() {
        [json, skel, ..] => diff(&json.data, &skel.data),
        _ => DiffReport::default(),
    };
    if report.is_empty() {
        log::info!("JSON and binary descriptions match");
    } else {
        log::info!("JSON and binary descriptions differ in {} place(s)", report.len());
    }
    s.report = Some(report.clone());
    Ok(CompareOutcome {
        layout,
        metrics: s.placements.clone(),
        report,
        warnings: s.warnings.clone(),
    })
}
