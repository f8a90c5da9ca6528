use crate::SkeletonData;
use glam::Vec2;

/// Axis-aligned box: `offset` is the bottom-left corner in skeleton units.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Bounds {
    pub offset: Vec2,
    pub size: Vec2,
}

impl Bounds {
    pub fn new(offset: Vec2, size: Vec2) -> Self {
        Self { offset, size }
    }

    pub fn center(&self) -> Vec2 {
        self.offset + self.size * 0.5
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let max = self.offset + self.size;
        point.x >= self.offset.x
            && point.y >= self.offset.y
            && point.x <= max.x
            && point.y <= max.y
    }
}

fn usable_size(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn axis(
    declared_size: Option<f32>,
    declared_origin: Option<f32>,
    runtime_offset: f32,
    runtime_size: f32,
) -> (f32, f32) {
    match usable_size(declared_size) {
        Some(size) => {
            let offset = declared_origin
                .filter(|v| v.is_finite())
                .unwrap_or(runtime_offset);
            (offset, size)
        }
        None => (runtime_offset, runtime_size),
    }
}

/// Bounds used to compare two encodings: the declared canvas where the export has one,
/// otherwise the runtime's setup-pose bounds, axis by axis.
pub fn compare_bounds(data: &SkeletonData, runtime: Bounds) -> Bounds {
    let (x, width) = axis(data.width, data.x, runtime.offset.x, runtime.size.x);
    let (y, height) = axis(data.height, data.y, runtime.offset.y, runtime.size.y);
    Bounds::new(Vec2::new(x, y), Vec2::new(width, height))
}

/// Corrects `base` for instances whose compare bounds and runtime bounds disagree in scale.
///
/// Uses the smaller of the finite positive per-axis ratios `compare / runtime`, or 1 when
/// neither axis has one.
pub fn compare_scale(base: f32, runtime: Bounds, compare: Bounds) -> f32 {
    let ratio = [
        compare.size.x / runtime.size.x,
        compare.size.y / runtime.size.y,
    ]
    .into_iter()
    .filter(|r| r.is_finite() && *r > 0.0)
    .reduce(f32::min)
    .unwrap_or(1.0);
    base * ratio
}
