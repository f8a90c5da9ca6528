//! Fitting skeleton instances into the viewport.

use crate::{
    Bounds, CompareAppearance, LoadedSkeleton, SkeletonInstance, Viewport, apply_visuals,
    compare_bounds, compare_scale,
};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Layout requested for a compare session.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompareLayout {
    #[default]
    Overlay,
    SideBySide,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LayoutMode {
    Single,
    SideBySide,
    Overlay,
}

impl From<CompareLayout> for LayoutMode {
    fn from(value: CompareLayout) -> Self {
        match value {
            CompareLayout::Overlay => Self::Overlay,
            CompareLayout::SideBySide => Self::SideBySide,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    /// Horizontal space between side-by-side columns, in screen units.
    pub gap: f32,
    /// Fraction of the target region the group may fill.
    pub fit_margin: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            gap: 40.0,
            fit_margin: 0.9,
        }
    }
}

/// Where one instance ended up. Doubles as the compare metrics of a load.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Placement {
    pub runtime_bounds: Bounds,
    pub compare_bounds: Bounds,
    pub scale: f32,
    pub position: Vec2,
    /// Screen point the group anchor is mapped to for this instance.
    pub slot_centre: Vec2,
}

impl Placement {
    /// Runtime bounds in screen space.
    pub fn screen_bounds(&self) -> Bounds {
        screen_bounds(self.runtime_bounds, self.scale, self.position)
    }
}

pub(crate) fn screen_bounds(runtime: Bounds, scale: f32, position: Vec2) -> Bounds {
    Bounds::new(position + runtime.offset * scale, runtime.size * scale)
}

fn current_placement<I: SkeletonInstance>(
    skeleton: &LoadedSkeleton<I>,
    slot_centre: Vec2,
) -> Placement {
    let runtime_bounds = skeleton.instance.bounds();
    Placement {
        runtime_bounds,
        compare_bounds: compare_bounds(&skeleton.data, runtime_bounds),
        scale: skeleton.instance.scale(),
        position: skeleton.instance.position(),
        slot_centre,
    }
}

/// Fits one instance on its own runtime bounds, centred on the viewport plus `pan`.
pub fn fit_single<I: SkeletonInstance>(
    skeleton: &mut LoadedSkeleton<I>,
    viewport: Viewport,
    pan: Vec2,
    config: &LayoutConfig,
) -> Placement {
    let slot_centre = viewport.center() + pan;
    let runtime_bounds = skeleton.instance.bounds();
    let size = runtime_bounds.size;
    if size.x <= 0.0 || size.y <= 0.0 {
        log::debug!("skip fit of '{}': empty bounds", skeleton.key);
        return current_placement(skeleton, slot_centre);
    }
    let scale = (viewport.width / size.x).min(viewport.height / size.y) * config.fit_margin;
    let position = slot_centre - runtime_bounds.center() * scale;
    skeleton.instance.set_scale(scale);
    skeleton.instance.set_position(position);
    Placement {
        runtime_bounds,
        compare_bounds: compare_bounds(&skeleton.data, runtime_bounds),
        scale,
        position,
        slot_centre,
    }
}

/// Positions every instance for `mode` and applies the matching visuals.
///
/// `None`, or a single loaded instance, fits each instance on its own. Otherwise the group
/// is fitted on the largest compare bounds and the midpoint of all compare centres is mapped
/// to each instance's slot centre. Degenerate compare bounds leave the instances untouched,
/// styling included.
pub fn layout<I: SkeletonInstance>(
    skeletons: &mut [LoadedSkeleton<I>],
    mode: Option<LayoutMode>,
    viewport: Viewport,
    pan: Vec2,
    config: &LayoutConfig,
    appearance: &CompareAppearance,
) -> Vec<Placement> {
    let mode = match mode {
        Some(mode) if skeletons.len() > 1 => mode,
        _ => {
            let placements = skeletons
                .iter_mut()
                .map(|s| fit_single(s, viewport, pan, config))
                .collect();
            apply_visuals(skeletons, LayoutMode::Single, appearance);
            return placements;
        }
    };

    let bounds: Vec<(Bounds, Bounds)> = skeletons
        .iter()
        .map(|s| {
            let runtime = s.instance.bounds();
            (runtime, compare_bounds(&s.data, runtime))
        })
        .collect();

    let centres = bounds.iter().map(|(_, compare)| compare.center());
    let min = centres.clone().fold(Vec2::splat(f32::INFINITY), Vec2::min);
    let max = centres.fold(Vec2::splat(f32::NEG_INFINITY), Vec2::max);
    let anchor = (min + max) * 0.5;

    let max_size = bounds
        .iter()
        .fold(Vec2::ZERO, |acc, (_, compare)| acc.max(compare.size));

    let columns = match mode {
        LayoutMode::SideBySide => skeletons.len(),
        LayoutMode::Single | LayoutMode::Overlay => 1,
    };
    let gaps = config.gap * (columns as f32 - 1.0);
    let target = Vec2::new((viewport.width - gaps) / columns as f32, viewport.height);

    if max_size.x <= 0.0 || max_size.y <= 0.0 || target.x <= 0.0 || target.y <= 0.0 {
        log::debug!("skip layout: max compare size {max_size}, target {target}");
        let placements = skeletons
            .iter()
            .map(|s| current_placement(s, viewport.center() + pan))
            .collect();
        return placements;
    }

    let base = (target.x / max_size.x).min(target.y / max_size.y) * config.fit_margin;
    log::debug!("layout {mode:?}: base scale {base}, target {target}, anchor {anchor}");

    let mut placements = Vec::with_capacity(skeletons.len());
    for (i, (skeleton, (runtime_bounds, compare_bounds))) in
        skeletons.iter_mut().zip(bounds).enumerate()
    {
        let slot_x = match mode {
            LayoutMode::SideBySide => i as f32 * (target.x + config.gap) + target.x * 0.5,
            LayoutMode::Single | LayoutMode::Overlay => viewport.width * 0.5,
        };
        let slot_centre = Vec2::new(slot_x, viewport.height * 0.5) + pan;
        let scale = compare_scale(base, runtime_bounds, compare_bounds);
        let position = slot_centre - anchor * scale;
        skeleton.instance.set_scale(scale);
        skeleton.instance.set_position(position);
        placements.push(Placement {
            runtime_bounds,
            compare_bounds,
            scale,
            position,
            slot_centre,
        });
    }

    apply_visuals(skeletons, mode, appearance);
    placements
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Drag {
    pointer: u32,
    origin: Vec2,
    start_offset: Vec2,
}

/// Pointer-driven pan offset shared by all instances.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PanGesture {
    offset: Vec2,
    drag: Option<Drag>,
}

impl PanGesture {
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Starts a drag when `hit` is set and no other pointer is dragging.
    pub fn pointer_down(&mut self, pointer: u32, at: Vec2, hit: bool) -> bool {
        if self.drag.is_some() || !hit {
            return false;
        }
        self.drag = Some(Drag {
            pointer,
            origin: at,
            start_offset: self.offset,
        });
        true
    }

    /// Returns `true` when the offset changed.
    pub fn pointer_move(&mut self, pointer: u32, at: Vec2) -> bool {
        let Some(drag) = self.drag.filter(|d| d.pointer == pointer) else {
            return false;
        };
        let offset = drag.start_offset + (at - drag.origin);
        let changed = offset != self.offset;
        self.offset = offset;
        changed
    }

    pub fn pointer_up(&mut self, pointer: u32) -> bool {
        if self.drag.is_some_and(|d| d.pointer == pointer) {
            self.drag = None;
            return true;
        }
        false
    }
}

/// Whether `point` lies inside any instance's on-screen runtime bounds.
pub fn hit_test<I: SkeletonInstance>(skeletons: &[LoadedSkeleton<I>], point: Vec2) -> bool {
    skeletons.iter().any(|s| {
        screen_bounds(s.instance.bounds(), s.instance.scale(), s.instance.position())
            .contains(point)
    })
}
