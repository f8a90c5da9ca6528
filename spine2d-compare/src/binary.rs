//! Spine `.skel` (binary) reader for Spine 4.1, 4.2 and 4.3 exports.
//!
//! The reader is IO-free: it operates on an in-memory byte slice. Every section is walked so
//! the cursor stays aligned, but only the structural description is kept.
//!
//! The header's version string selects the section layout. 4.3 stores constraints as one mixed
//! list; 4.1 and 4.2 store one list per constraint kind, and every constraint index in those
//! files counts within its kind.

use crate::{
    AnimationData, AttachmentKind, BlendMode, BoneData, ConstraintData, ConstraintKind, Error,
    EventData, RuntimeLine, SkeletonData, SkinData, SlotData, TimelineKind,
};
use byteorder::{BigEndian, ByteOrder};
use std::sync::Arc;

const CURVE_LINEAR: i8 = 0;
const CURVE_STEPPED: i8 = 1;
const CURVE_BEZIER: i8 = 2;

/// One bezier segment: cx1, cy1, cx2, cy2.
const BEZIER_BYTES: usize = 16;

const ATTACHMENT_DEFORM: u8 = 0;
const ATTACHMENT_SEQUENCE: u8 = 1;

const SLOT_ATTACHMENT: u8 = 0;
const SLOT_RGBA: u8 = 1;
const SLOT_RGB: u8 = 2;
const SLOT_RGBA2: u8 = 3;
const SLOT_RGB2: u8 = 4;
const SLOT_ALPHA: u8 = 5;

const BONE_ROTATE: u8 = 0;
const BONE_TRANSLATE: u8 = 1;
const BONE_TRANSLATEX: u8 = 2;
const BONE_TRANSLATEY: u8 = 3;
const BONE_SCALE: u8 = 4;
const BONE_SCALEX: u8 = 5;
const BONE_SCALEY: u8 = 6;
const BONE_SHEAR: u8 = 7;
const BONE_SHEARX: u8 = 8;
const BONE_SHEARY: u8 = 9;
const BONE_INHERIT: u8 = 10;

const PATH_POSITION: u8 = 0;
const PATH_SPACING: u8 = 1;
const PATH_MIX: u8 = 2;

const PHYSICS_INERTIA: u8 = 0;
const PHYSICS_STRENGTH: u8 = 1;
const PHYSICS_DAMPING: u8 = 2;
const PHYSICS_MASS: u8 = 4;
const PHYSICS_WIND: u8 = 5;
const PHYSICS_GRAVITY: u8 = 6;
const PHYSICS_MIX: u8 = 7;
const PHYSICS_RESET: u8 = 8;

const SLIDER_TIME: u8 = 0;
const SLIDER_MIX: u8 = 1;

const CONSTRAINT_IK: u8 = 0;
const CONSTRAINT_PATH: u8 = 1;
const CONSTRAINT_TRANSFORM: u8 = 2;
const CONSTRAINT_PHYSICS: u8 = 3;
const CONSTRAINT_SLIDER: u8 = 4;

#[derive(Clone, Debug)]
struct BinaryInput<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> BinaryInput<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.cursor)
    }

    fn eof(&self, wanted: usize) -> Error {
        Error::BinaryParse {
            message: format!(
                "unexpected EOF at offset {} (wanted {wanted} bytes, {} left)",
                self.cursor,
                self.remaining()
            ),
        }
    }

    fn skip(&mut self, len: usize) -> Result<(), Error> {
        if self.remaining() < len {
            return Err(self.eof(len));
        }
        self.cursor += len;
        Ok(())
    }

    fn skip_f32(&mut self, count: usize) -> Result<(), Error> {
        self.skip(count.saturating_mul(4))
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        let Some(&b) = self.bytes.get(self.cursor) else {
            return Err(self.eof(1));
        };
        self.cursor += 1;
        Ok(b)
    }

    fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.read_u8()? as i8)
    }

    fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.read_u8()? != 0)
    }

    fn read_i32_be(&mut self) -> Result<i32, Error> {
        if self.remaining() < 4 {
            return Err(self.eof(4));
        }
        let v = BigEndian::read_i32(&self.bytes[self.cursor..self.cursor + 4]);
        self.cursor += 4;
        Ok(v)
    }

    fn read_f32_be(&mut self) -> Result<f32, Error> {
        if self.remaining() < 4 {
            return Err(self.eof(4));
        }
        let v = BigEndian::read_f32(&self.bytes[self.cursor..self.cursor + 4]);
        self.cursor += 4;
        Ok(v)
    }

    fn read_varint(&mut self, optimize_positive: bool) -> Result<i32, Error> {
        let mut value: u32 = 0;
        for shift in [0u32, 7, 14, 21, 28] {
            let b = self.read_u8()?;
            value |= ((b & 0x7F) as u32) << shift;
            if (b & 0x80) == 0 {
                break;
            }
        }

        if optimize_positive {
            Ok(value as i32)
        } else {
            Ok((value >> 1) as i32 ^ -((value & 1) as i32))
        }
    }

    fn read_count(&mut self) -> Result<usize, Error> {
        let offset = self.cursor;
        let v = self.read_varint(true)?;
        usize::try_from(v).map_err(|_| Error::BinaryParse {
            message: format!("negative count {v} at offset {offset}"),
        })
    }

    /// Length-prefixed UTF-8; a length of 0 is `None` and 1 is the empty string.
    fn read_string(&mut self) -> Result<Option<String>, Error> {
        let length_offset = self.cursor;
        let length = self.read_count()?;
        if length == 0 {
            return Ok(None);
        }
        let byte_len = length - 1;
        if self.remaining() < byte_len {
            return Err(self.eof(byte_len));
        }
        let bytes = &self.bytes[self.cursor..self.cursor + byte_len];
        self.cursor += byte_len;
        let s = std::str::from_utf8(bytes).map_err(|e| Error::BinaryParse {
            message: format!("invalid utf-8 in string at offset {length_offset}: {e}"),
        })?;
        Ok(Some(s.to_string()))
    }

    fn read_string_ref(&mut self, strings: &[String]) -> Result<Option<String>, Error> {
        let offset = self.cursor;
        let idx = self.read_count()?;
        if idx == 0 {
            return Ok(None);
        }
        let s = strings.get(idx - 1).ok_or_else(|| Error::BinaryParse {
            message: format!(
                "invalid stringRef index {idx} (len={}) at offset {offset}",
                strings.len()
            ),
        })?;
        Ok(Some(s.clone()))
    }

    fn skip_color(&mut self) -> Result<(), Error> {
        self.skip(4)
    }
}

/// Section layout for the header's version string. Files without one use the newest layout.
fn export_line(version: Option<&str>) -> Result<RuntimeLine, Error> {
    let Some(value) = version else {
        return Ok(RuntimeLine::V4_3);
    };
    RuntimeLine::parse(value).ok_or_else(|| Error::BinarySpineVersion {
        value: value.to_string(),
    })
}

/// Constraint sections, in file order, of the layouts that keep one list per kind.
fn constraint_sections(line: RuntimeLine) -> &'static [ConstraintKind] {
    match line {
        RuntimeLine::V4_1 => &[
            ConstraintKind::Ik,
            ConstraintKind::Transform,
            ConstraintKind::Path,
        ],
        RuntimeLine::V4_2 => &[
            ConstraintKind::Ik,
            ConstraintKind::Transform,
            ConstraintKind::Path,
            ConstraintKind::Physics,
        ],
        RuntimeLine::V4_3 => &[],
    }
}

fn format_hash(low: i32, high: i32) -> Option<String> {
    if low == 0 && high == 0 {
        return None;
    }
    Some(format!("{:x}{:x}", high as u32, low as u32))
}

fn constraint_kind(kind: u8) -> Result<ConstraintKind, Error> {
    match kind {
        CONSTRAINT_IK => Ok(ConstraintKind::Ik),
        CONSTRAINT_PATH => Ok(ConstraintKind::Path),
        CONSTRAINT_TRANSFORM => Ok(ConstraintKind::Transform),
        CONSTRAINT_PHYSICS => Ok(ConstraintKind::Physics),
        CONSTRAINT_SLIDER => Ok(ConstraintKind::Slider),
        other => Err(Error::BinaryParse {
            message: format!("unknown constraint type {other}"),
        }),
    }
}

fn skip_bones_list(input: &mut BinaryInput<'_>) -> Result<(), Error> {
    for _ in 0..input.read_count()? {
        input.read_varint(true)?;
    }
    Ok(())
}

fn skip_constraint_body(input: &mut BinaryInput<'_>, kind: ConstraintKind) -> Result<(), Error> {
    match kind {
        ConstraintKind::Ik => {
            skip_bones_list(input)?;
            input.read_varint(true)?; // target
            let flags = input.read_u8()?;
            if (flags & 32) != 0 && (flags & 64) != 0 {
                input.skip_f32(1)?; // mix
            }
            if (flags & 128) != 0 {
                input.skip_f32(1)?; // softness
            }
        }
        ConstraintKind::Transform => {
            skip_bones_list(input)?;
            input.read_varint(true)?; // source
            let flags = input.read_u8()?;
            for _ in 0..(flags >> 5) {
                input.read_u8()?; // from property
                input.skip_f32(1)?; // from offset
                for _ in 0..input.read_u8()? {
                    input.read_u8()?; // to property
                    input.skip_f32(3)?; // offset, max, scale
                }
            }
            // Offsets, then mixes: one float per set flag bit.
            for _ in 0..2 {
                let flags = input.read_u8()?;
                input.skip_f32((flags & 0x3F).count_ones() as usize)?;
            }
        }
        ConstraintKind::Path => {
            skip_bones_list(input)?;
            input.read_varint(true)?; // target slot
            let flags = input.read_u8()?;
            if (flags & 128) != 0 {
                input.skip_f32(1)?; // offset rotation
            }
            input.skip_f32(5)?; // position, spacing, mixRotate, mixX, mixY
        }
        ConstraintKind::Physics => {
            input.read_varint(true)?; // bone
            let flags = input.read_u8()?;
            // x, y, rotate, scaleX, shearX, limit
            input.skip_f32((flags & 0x7E).count_ones() as usize)?;
            input.read_u8()?; // step
            input.skip_f32(3)?; // inertia, strength, damping
            if (flags & 128) != 0 {
                input.skip_f32(1)?; // mass inverse
            }
            input.skip_f32(2)?; // wind, gravity
            let flags = input.read_u8()?;
            if (flags & 128) != 0 {
                input.skip_f32(1)?; // mix
            }
        }
        ConstraintKind::Slider => {
            let flags = input.read_u8()?;
            if (flags & 8) != 0 {
                input.skip_f32(1)?; // setup time
            }
            if (flags & 16) != 0 && (flags & 32) != 0 {
                input.skip_f32(1)?; // setup mix
            }
            if (flags & 64) != 0 {
                input.read_varint(true)?; // bone
                input.skip_f32(1)?; // from
                input.read_u8()?; // property
                input.skip_f32(2)?; // to, scale
            }
        }
    }
    Ok(())
}

/// Skips a constraint body from a per-kind section, after its name and order.
fn skip_sectioned_constraint_body(
    input: &mut BinaryInput<'_>,
    kind: ConstraintKind,
    line: RuntimeLine,
) -> Result<(), Error> {
    match (line, kind) {
        (RuntimeLine::V4_1, ConstraintKind::Ik) => {
            input.read_bool()?; // skin required
            skip_bones_list(input)?;
            input.read_varint(true)?; // target
            input.skip_f32(2)?; // mix, softness
            input.skip(4)?; // bend direction, compress, stretch, uniform
        }
        (RuntimeLine::V4_1, ConstraintKind::Transform) => {
            input.read_bool()?; // skin required
            skip_bones_list(input)?;
            input.read_varint(true)?; // target
            input.skip(2)?; // local, relative
            input.skip_f32(12)?; // six offsets, six mixes
        }
        (RuntimeLine::V4_1, ConstraintKind::Path) => {
            input.read_bool()?; // skin required
            skip_bones_list(input)?;
            input.read_varint(true)?; // target slot
            for _ in 0..3 {
                input.read_varint(true)?; // position, spacing and rotate modes
            }
            // offset rotation, position, spacing, mixRotate, mixX, mixY
            input.skip_f32(6)?;
        }
        (_, ConstraintKind::Transform) => {
            skip_bones_list(input)?;
            input.read_varint(true)?; // target
            // Offsets rotation..scaleY on bits 3-7, then shearY offset and six mixes on bits 0-6.
            let flags = input.read_u8()?;
            input.skip_f32((flags & 0xF8).count_ones() as usize)?;
            let flags = input.read_u8()?;
            input.skip_f32((flags & 0x7F).count_ones() as usize)?;
        }
        (_, ConstraintKind::Path) => {
            input.read_bool()?; // skin required
            skip_bones_list(input)?;
            input.read_varint(true)?; // target slot
            let flags = input.read_u8()?;
            if (flags & 128) != 0 {
                input.skip_f32(1)?; // offset rotation
            }
            input.skip_f32(5)?; // position, spacing, mixRotate, mixX, mixY
        }
        (_, kind) => skip_constraint_body(input, kind)?,
    }
    Ok(())
}

fn read_constraints(input: &mut BinaryInput<'_>, line: RuntimeLine) -> Result<Constraints, Error> {
    let sections = constraint_sections(line);
    if sections.is_empty() {
        let count = input.read_count()?;
        let mut list = Vec::with_capacity(count.min(input.remaining()));
        for _ in 0..count {
            let name = input.read_string()?.unwrap_or_default();
            let kind = constraint_kind(input.read_u8()?)?;
            skip_constraint_body(input, kind)?;
            list.push(ConstraintData { name, kind });
        }
        return Ok(Constraints {
            list,
            per_kind: false,
        });
    }

    let mut list = Vec::new();
    for &kind in sections {
        for _ in 0..input.read_count()? {
            let name = input.read_string()?.unwrap_or_default();
            input.read_varint(true)?; // order
            skip_sectioned_constraint_body(input, kind, line)?;
            list.push(ConstraintData { name, kind });
        }
    }
    Ok(Constraints {
        list,
        per_kind: true,
    })
}

fn skip_sequence(input: &mut BinaryInput<'_>) -> Result<(), Error> {
    for _ in 0..4 {
        input.read_varint(true)?; // count, start, digits, setup index
    }
    Ok(())
}

/// Skips a vertex block and returns the vertex count.
fn skip_vertices(input: &mut BinaryInput<'_>, weighted: bool) -> Result<usize, Error> {
    let vertex_count = input.read_count()?;
    if !weighted {
        input.skip_f32(vertex_count * 2)?;
        return Ok(vertex_count);
    }
    for _ in 0..vertex_count {
        for _ in 0..input.read_count()? {
            input.read_varint(true)?; // bone
            input.skip_f32(3)?; // x, y, weight
        }
    }
    Ok(vertex_count)
}

fn read_attachment(
    input: &mut BinaryInput<'_>,
    strings: &[String],
    nonessential: bool,
) -> Result<AttachmentKind, Error> {
    let flags = input.read_u8()?;
    if (flags & 8) != 0 {
        input.read_string_ref(strings)?; // name
    }

    match flags & 0x7 {
        0 => {
            if (flags & 16) != 0 {
                input.read_string_ref(strings)?; // path
            }
            if (flags & 32) != 0 {
                input.skip_color()?;
            }
            if (flags & 64) != 0 {
                skip_sequence(input)?;
            }
            if (flags & 128) != 0 {
                input.skip_f32(1)?; // rotation
            }
            input.skip_f32(6)?; // x, y, scaleX, scaleY, width, height
            Ok(AttachmentKind::Region)
        }
        1 => {
            skip_vertices(input, (flags & 16) != 0)?;
            if nonessential {
                input.skip_color()?;
            }
            Ok(AttachmentKind::BoundingBox)
        }
        2 => {
            if (flags & 16) != 0 {
                input.read_string_ref(strings)?;
            }
            if (flags & 32) != 0 {
                input.skip_color()?;
            }
            if (flags & 64) != 0 {
                skip_sequence(input)?;
            }
            let hull_length = input.read_count()?;
            let vertex_count = skip_vertices(input, (flags & 128) != 0)?;
            let world_vertices_length = vertex_count * 2;
            input.skip_f32(world_vertices_length)?; // uvs
            let triangles = world_vertices_length
                .checked_sub(hull_length + 2)
                .ok_or_else(|| Error::BinaryParse {
                    message: format!(
                        "invalid mesh triangle count: worldVerticesLength={world_vertices_length} hullLength={hull_length}"
                    ),
                })?
                * 3;
            for _ in 0..triangles {
                input.read_varint(true)?;
            }
            if nonessential {
                for _ in 0..input.read_count()? {
                    input.read_varint(true)?; // edges
                }
                input.skip_f32(2)?; // width, height
            }
            Ok(AttachmentKind::Mesh)
        }
        3 => {
            if (flags & 16) != 0 {
                input.read_string_ref(strings)?;
            }
            if (flags & 32) != 0 {
                input.skip_color()?;
            }
            if (flags & 64) != 0 {
                skip_sequence(input)?;
            }
            input.read_varint(true)?; // parent skin
            input
                .read_string_ref(strings)?
                .ok_or_else(|| Error::BinaryParse {
                    message: "linked mesh missing parent name".to_string(),
                })?;
            if nonessential {
                input.skip_f32(2)?;
            }
            Ok(AttachmentKind::LinkedMesh)
        }
        4 => {
            let vertex_count = skip_vertices(input, (flags & 64) != 0)?;
            input.skip_f32(vertex_count * 2 / 6)?; // lengths
            if nonessential {
                input.skip_color()?;
            }
            Ok(AttachmentKind::Path)
        }
        5 => {
            input.skip_f32(3)?; // rotation, x, y
            if nonessential {
                input.skip_color()?;
            }
            Ok(AttachmentKind::Point)
        }
        6 => {
            input.read_varint(true)?; // end slot
            skip_vertices(input, (flags & 16) != 0)?;
            if nonessential {
                input.skip_color()?;
            }
            Ok(AttachmentKind::Clipping)
        }
        ty => Err(Error::BinaryParse {
            message: format!("unsupported attachment type {ty}"),
        }),
    }
}

fn skip_legacy_sequence(input: &mut BinaryInput<'_>) -> Result<(), Error> {
    if input.read_bool()? {
        skip_sequence(input)?;
    }
    Ok(())
}

/// 4.1 vertex block: the vertex count comes first, then the weighted flag.
fn skip_legacy_vertices(input: &mut BinaryInput<'_>, vertex_count: usize) -> Result<(), Error> {
    if !input.read_bool()? {
        return input.skip_f32(vertex_count * 2);
    }
    for _ in 0..vertex_count {
        for _ in 0..input.read_count()? {
            input.read_varint(true)?; // bone
            input.skip_f32(3)?; // x, y, weight
        }
    }
    Ok(())
}

fn skip_shorts(input: &mut BinaryInput<'_>) -> Result<(), Error> {
    let count = input.read_count()?;
    input.skip(count * 2)
}

/// 4.1 attachments spell out every field instead of packing them behind a flags byte.
fn read_legacy_attachment(
    input: &mut BinaryInput<'_>,
    strings: &[String],
    nonessential: bool,
) -> Result<AttachmentKind, Error> {
    input.read_string_ref(strings)?; // name
    match input.read_u8()? {
        0 => {
            input.read_string_ref(strings)?; // path
            // rotation, x, y, scaleX, scaleY, width, height
            input.skip_f32(7)?;
            input.skip_color()?;
            skip_legacy_sequence(input)?;
            Ok(AttachmentKind::Region)
        }
        1 => {
            let vertex_count = input.read_count()?;
            skip_legacy_vertices(input, vertex_count)?;
            if nonessential {
                input.skip_color()?;
            }
            Ok(AttachmentKind::BoundingBox)
        }
        2 => {
            input.read_string_ref(strings)?; // path
            input.skip_color()?;
            let vertex_count = input.read_count()?;
            input.skip_f32(vertex_count * 2)?; // uvs
            skip_shorts(input)?; // triangles
            skip_legacy_vertices(input, vertex_count)?;
            input.read_varint(true)?; // hull length
            skip_legacy_sequence(input)?;
            if nonessential {
                skip_shorts(input)?; // edges
                input.skip_f32(2)?; // width, height
            }
            Ok(AttachmentKind::Mesh)
        }
        3 => {
            input.read_string_ref(strings)?; // path
            input.skip_color()?;
            input.read_string_ref(strings)?; // parent skin
            input
                .read_string_ref(strings)?
                .ok_or_else(|| Error::BinaryParse {
                    message: "linked mesh missing parent name".to_string(),
                })?;
            input.read_bool()?; // inherit timelines
            skip_legacy_sequence(input)?;
            if nonessential {
                input.skip_f32(2)?;
            }
            Ok(AttachmentKind::LinkedMesh)
        }
        4 => {
            input.skip(2)?; // closed, constant speed
            let vertex_count = input.read_count()?;
            skip_legacy_vertices(input, vertex_count)?;
            input.skip_f32(vertex_count / 3)?; // lengths
            if nonessential {
                input.skip_color()?;
            }
            Ok(AttachmentKind::Path)
        }
        5 => {
            input.skip_f32(3)?; // rotation, x, y
            if nonessential {
                input.skip_color()?;
            }
            Ok(AttachmentKind::Point)
        }
        6 => {
            input.read_varint(true)?; // end slot
            let vertex_count = input.read_count()?;
            skip_legacy_vertices(input, vertex_count)?;
            if nonessential {
                input.skip_color()?;
            }
            Ok(AttachmentKind::Clipping)
        }
        ty => Err(Error::BinaryParse {
            message: format!("unsupported attachment type {ty}"),
        }),
    }
}

/// Per-file settings the section readers branch on.
#[derive(Copy, Clone)]
struct Layout {
    line: RuntimeLine,
    nonessential: bool,
}

fn read_skin_attachments(
    input: &mut BinaryInput<'_>,
    skin: &mut SkinData,
    entries: usize,
    slot_count: usize,
    strings: &[String],
    layout: Layout,
) -> Result<(), Error> {
    for _ in 0..entries {
        let slot_index = input.read_count()?;
        if slot_index >= slot_count {
            return Err(Error::BinaryParse {
                message: format!(
                    "skin '{}' references slot {slot_index} (len={slot_count})",
                    skin.name
                ),
            });
        }
        for _ in 0..input.read_count()? {
            let key = input.read_string_ref(strings)?.unwrap_or_default();
            let offset = input.cursor;
            let kind = match layout.line {
                RuntimeLine::V4_1 => read_legacy_attachment(input, strings, layout.nonessential),
                _ => read_attachment(input, strings, layout.nonessential),
            }
            .map_err(|e| Error::BinaryParse {
                message: format!(
                    "failed to read attachment (skin={} slotIndex={slot_index} key={key:?}) at offset {offset}: {e}",
                    skin.name
                ),
            })?;
            skin.insert(slot_index, key, kind);
        }
    }
    Ok(())
}

fn skip_curve(input: &mut BinaryInput<'_>, beziers: usize) -> Result<(), Error> {
    match input.read_i8()? {
        CURVE_LINEAR | CURVE_STEPPED => Ok(()),
        CURVE_BEZIER => input.skip(beziers * BEZIER_BYTES),
        other => Err(Error::BinaryParse {
            message: format!("invalid curve type {other}"),
        }),
    }
}

/// Skips a curve timeline whose keys carry `value_bytes` of values and whose bezier
/// curves have one segment per value. Returns the largest key time.
fn skip_curve_timeline(
    input: &mut BinaryInput<'_>,
    frame_count: usize,
    value_bytes: usize,
    beziers: usize,
) -> Result<f32, Error> {
    if frame_count == 0 {
        return Ok(0.0);
    }
    let mut last = input.read_f32_be()?;
    input.skip(value_bytes)?;
    for _ in 1..frame_count {
        let time = input.read_f32_be()?;
        input.skip(value_bytes)?;
        skip_curve(input, beziers)?;
        last = last.max(time);
    }
    Ok(last)
}

fn skip_ik_timeline(input: &mut BinaryInput<'_>, frame_count: usize) -> Result<f32, Error> {
    fn skip_values(input: &mut BinaryInput<'_>, flags: u8) -> Result<(), Error> {
        if (flags & 1) != 0 && (flags & 2) != 0 {
            input.skip_f32(1)?; // mix
        }
        if (flags & 4) != 0 {
            input.skip_f32(1)?; // softness
        }
        Ok(())
    }

    if frame_count == 0 {
        return Ok(0.0);
    }
    let flags = input.read_u8()?;
    let mut last = input.read_f32_be()?;
    skip_values(input, flags)?;
    for _ in 1..frame_count {
        let flags = input.read_u8()?;
        let time = input.read_f32_be()?;
        skip_values(input, flags)?;
        if (flags & 64) == 0 && (flags & 128) != 0 {
            input.skip(2 * BEZIER_BYTES)?;
        }
        last = last.max(time);
    }
    Ok(last)
}

/// 4.1 IK keys: time, mix and softness, then bend direction, compress and stretch bytes.
/// The curve sits between a key's floats and its flag bytes.
fn skip_legacy_ik_timeline(input: &mut BinaryInput<'_>, frame_count: usize) -> Result<f32, Error> {
    if frame_count == 0 {
        return Ok(0.0);
    }
    let mut last = input.read_f32_be()?;
    input.skip_f32(2)?;
    for frame in 0..frame_count {
        input.skip(3)?;
        if frame + 1 == frame_count {
            break;
        }
        let time = input.read_f32_be()?;
        input.skip_f32(2)?;
        skip_curve(input, 2)?;
        last = last.max(time);
    }
    Ok(last)
}

fn skip_deform_timeline(input: &mut BinaryInput<'_>, frame_count: usize) -> Result<f32, Error> {
    if frame_count == 0 {
        return Ok(0.0);
    }
    let mut last = input.read_f32_be()?;
    for frame in 0..frame_count {
        let end = input.read_count()?;
        if end != 0 {
            input.read_varint(true)?; // start
            input.skip_f32(end)?;
        }
        if frame + 1 == frame_count {
            break;
        }
        let time = input.read_f32_be()?;
        skip_curve(input, 1)?;
        last = last.max(time);
    }
    Ok(last)
}

fn skip_timed_frames(
    input: &mut BinaryInput<'_>,
    frame_count: usize,
    value_bytes: usize,
) -> Result<f32, Error> {
    let mut last = 0.0f32;
    for _ in 0..frame_count {
        last = last.max(input.read_f32_be()?);
        input.skip(value_bytes)?;
    }
    Ok(last)
}

fn check_index(index: usize, len: usize, what: &str) -> Result<(), Error> {
    if index >= len {
        return Err(Error::BinaryParse {
            message: format!("{what} index {index} out of range (len={len})"),
        });
    }
    Ok(())
}

struct Constraints {
    list: Vec<ConstraintData>,
    /// Indices count within one constraint kind rather than over the whole list.
    per_kind: bool,
}

impl Constraints {
    fn lookup(&self, index: usize, kind: ConstraintKind) -> Option<&ConstraintData> {
        if self.per_kind {
            self.list.iter().filter(|c| c.kind == kind).nth(index)
        } else {
            self.list.get(index)
        }
    }

    fn check_timeline(&self, index: usize, kind: ConstraintKind) -> Result<(), Error> {
        check_constraint(self.lookup(index, kind), index, kind)
    }
}

fn check_constraint(
    found: Option<&ConstraintData>,
    index: usize,
    kind: ConstraintKind,
) -> Result<(), Error> {
    match found {
        Some(c) if c.kind == kind => Ok(()),
        Some(c) => Err(Error::BinaryParse {
            message: format!(
                "{kind:?} timeline index {index} points to {:?} constraint '{}'",
                c.kind, c.name
            ),
        }),
        None => Err(Error::BinaryParse {
            message: format!("{kind:?} timeline index {index} out of range"),
        }),
    }
}

struct Tables<'a> {
    line: RuntimeLine,
    strings: &'a [String],
    bones: usize,
    slots: usize,
    skins: usize,
    constraints: &'a Constraints,
    events: &'a [EventData],
    /// Whether each event's data carries an audio path, empty ones included.
    event_audio: &'a [bool],
}

fn read_animation(
    input: &mut BinaryInput<'_>,
    name: String,
    tables: &Tables<'_>,
) -> Result<AnimationData, Error> {
    let mut animation = AnimationData::new(name);
    let _num_timelines = input.read_count()?;

    // Slot timelines
    for _ in 0..input.read_count()? {
        let slot_index = input.read_count()?;
        check_index(slot_index, tables.slots, "slot timeline slot")?;
        for _ in 0..input.read_count()? {
            let timeline_type = input.read_u8()?;
            let frame_count = input.read_count()?;
            if timeline_type == SLOT_ATTACHMENT {
                let mut last = 0.0f32;
                for _ in 0..frame_count {
                    last = last.max(input.read_f32_be()?);
                    input.read_string_ref(tables.strings)?;
                }
                animation.push(TimelineKind::Attachment, frame_count, last);
                continue;
            }
            let _bezier_count = input.read_count()?;
            let (kind, channels) = match timeline_type {
                SLOT_RGBA => (TimelineKind::Rgba, 4),
                SLOT_RGB => (TimelineKind::Rgb, 3),
                SLOT_RGBA2 => (TimelineKind::Rgba2, 7),
                SLOT_RGB2 => (TimelineKind::Rgb2, 6),
                SLOT_ALPHA => (TimelineKind::Alpha, 1),
                other => {
                    return Err(Error::BinaryParse {
                        message: format!(
                            "unsupported slot timeline type {other} (anim={} slotIndex={slot_index})",
                            animation.name
                        ),
                    });
                }
            };
            // Colour channels are stored as bytes, one bezier per channel.
            let last = skip_curve_timeline(input, frame_count, channels, channels)?;
            animation.push(kind, frame_count, last);
        }
    }

    // Bone timelines
    for _ in 0..input.read_count()? {
        let bone_index = input.read_count()?;
        check_index(bone_index, tables.bones, "bone timeline bone")?;
        for _ in 0..input.read_count()? {
            let timeline_type = input.read_u8()?;
            let frame_count = input.read_count()?;
            if timeline_type == BONE_INHERIT && tables.line >= RuntimeLine::V4_2 {
                let last = skip_timed_frames(input, frame_count, 1)?;
                animation.push(TimelineKind::Inherit, frame_count, last);
                continue;
            }
            let _bezier_count = input.read_count()?;
            let (kind, values) = match timeline_type {
                BONE_ROTATE => (TimelineKind::Rotate, 1),
                BONE_TRANSLATE => (TimelineKind::Translate, 2),
                BONE_TRANSLATEX => (TimelineKind::TranslateX, 1),
                BONE_TRANSLATEY => (TimelineKind::TranslateY, 1),
                BONE_SCALE => (TimelineKind::Scale, 2),
                BONE_SCALEX => (TimelineKind::ScaleX, 1),
                BONE_SCALEY => (TimelineKind::ScaleY, 1),
                BONE_SHEAR => (TimelineKind::Shear, 2),
                BONE_SHEARX => (TimelineKind::ShearX, 1),
                BONE_SHEARY => (TimelineKind::ShearY, 1),
                other => {
                    return Err(Error::BinaryParse {
                        message: format!("unsupported bone timeline type {other}"),
                    });
                }
            };
            let last = skip_curve_timeline(input, frame_count, values * 4, values)?;
            animation.push(kind, frame_count, last);
        }
    }

    // IK constraint timelines
    for _ in 0..input.read_count()? {
        let index = input.read_count()?;
        tables.constraints.check_timeline(index, ConstraintKind::Ik)?;
        let frame_count = input.read_count()?;
        let _bezier_count = input.read_count()?;
        let last = match tables.line {
            RuntimeLine::V4_1 => skip_legacy_ik_timeline(input, frame_count)?,
            _ => skip_ik_timeline(input, frame_count)?,
        };
        animation.push(TimelineKind::IkConstraint, frame_count, last);
    }

    // Transform constraint timelines
    for _ in 0..input.read_count()? {
        let index = input.read_count()?;
        tables.constraints.check_timeline(index, ConstraintKind::Transform)?;
        let frame_count = input.read_count()?;
        let _bezier_count = input.read_count()?;
        let last = skip_curve_timeline(input, frame_count, 6 * 4, 6)?;
        animation.push(TimelineKind::TransformConstraint, frame_count, last);
    }

    // Path constraint timelines
    for _ in 0..input.read_count()? {
        let index = input.read_count()?;
        tables.constraints.check_timeline(index, ConstraintKind::Path)?;
        for _ in 0..input.read_count()? {
            let timeline_type = input.read_u8()?;
            let frame_count = input.read_count()?;
            let _bezier_count = input.read_count()?;
            let (kind, values) = match timeline_type {
                PATH_POSITION => (TimelineKind::PathPosition, 1),
                PATH_SPACING => (TimelineKind::PathSpacing, 1),
                PATH_MIX => (TimelineKind::PathMix, 3),
                other => {
                    return Err(Error::BinaryParse {
                        message: format!("unsupported path timeline type {other}"),
                    });
                }
            };
            let last = skip_curve_timeline(input, frame_count, values * 4, values)?;
            animation.push(kind, frame_count, last);
        }
    }

    // Physics constraint timelines (4.2+); index 0 addresses every constraint.
    if tables.line >= RuntimeLine::V4_2 {
        for _ in 0..input.read_count()? {
            let index = input.read_varint(true)? - 1;
            if let Ok(index) = usize::try_from(index) {
                tables.constraints.check_timeline(index, ConstraintKind::Physics)?;
            }
            for _ in 0..input.read_count()? {
                let timeline_type = input.read_u8()?;
                let frame_count = input.read_count()?;
                if timeline_type == PHYSICS_RESET {
                    let last = skip_timed_frames(input, frame_count, 0)?;
                    animation.push(TimelineKind::PhysicsReset, frame_count, last);
                    continue;
                }
                let _bezier_count = input.read_count()?;
                let kind = match timeline_type {
                    PHYSICS_INERTIA => TimelineKind::PhysicsInertia,
                    PHYSICS_STRENGTH => TimelineKind::PhysicsStrength,
                    PHYSICS_DAMPING => TimelineKind::PhysicsDamping,
                    PHYSICS_MASS => TimelineKind::PhysicsMass,
                    PHYSICS_WIND => TimelineKind::PhysicsWind,
                    PHYSICS_GRAVITY => TimelineKind::PhysicsGravity,
                    PHYSICS_MIX => TimelineKind::PhysicsMix,
                    other => {
                        return Err(Error::BinaryParse {
                            message: format!("unsupported physics timeline type {other}"),
                        });
                    }
                };
                let last = skip_curve_timeline(input, frame_count, 4, 1)?;
                animation.push(kind, frame_count, last);
            }
        }
    }

    // Slider constraint timelines (4.3)
    if tables.line >= RuntimeLine::V4_3 {
        for _ in 0..input.read_count()? {
            let index = input.read_count()?;
            tables.constraints.check_timeline(index, ConstraintKind::Slider)?;
            for _ in 0..input.read_count()? {
                let timeline_type = input.read_u8()?;
                let frame_count = input.read_count()?;
                let _bezier_count = input.read_count()?;
                let kind = match timeline_type {
                    SLIDER_TIME => TimelineKind::SliderTime,
                    SLIDER_MIX => TimelineKind::SliderMix,
                    other => {
                        return Err(Error::BinaryParse {
                            message: format!("unsupported slider timeline type {other}"),
                        });
                    }
                };
                let last = skip_curve_timeline(input, frame_count, 4, 1)?;
                animation.push(kind, frame_count, last);
            }
        }
    }

    // Attachment timelines (deform/sequence)
    for _ in 0..input.read_count()? {
        let skin_index = input.read_count()?;
        check_index(skin_index, tables.skins, "attachment timeline skin")?;
        for _ in 0..input.read_count()? {
            let slot_index = input.read_count()?;
            check_index(slot_index, tables.slots, "attachment timeline slot")?;
            for _ in 0..input.read_count()? {
                input.read_string_ref(tables.strings)?; // attachment key
                let timeline_type = input.read_u8()?;
                let frame_count = input.read_count()?;
                match timeline_type {
                    ATTACHMENT_DEFORM => {
                        let _bezier_count = input.read_count()?;
                        let last = skip_deform_timeline(input, frame_count)?;
                        animation.push(TimelineKind::Deform, frame_count, last);
                    }
                    ATTACHMENT_SEQUENCE => {
                        // time, packed mode/index (i32), delay
                        let last = skip_timed_frames(input, frame_count, 8)?;
                        animation.push(TimelineKind::Sequence, frame_count, last);
                    }
                    other => {
                        return Err(Error::BinaryParse {
                            message: format!("unsupported attachment timeline type {other}"),
                        });
                    }
                }
            }
        }
    }

    // Draw order timeline
    let draw_order_count = input.read_count()?;
    let mut last = 0.0f32;
    for _ in 0..draw_order_count {
        last = last.max(input.read_f32_be()?);
        for _ in 0..input.read_count()? {
            let slot_index = input.read_count()?;
            check_index(slot_index, tables.slots, "draw order slot")?;
            input.read_varint(true)?; // offset
        }
    }
    animation.push(TimelineKind::DrawOrder, draw_order_count, last);

    // Event timeline
    let event_count = input.read_count()?;
    let mut last = 0.0f32;
    for _ in 0..event_count {
        last = last.max(input.read_f32_be()?);
        let event_index = input.read_count()?;
        check_index(event_index, tables.events.len(), "event data")?;
        input.read_varint(false)?; // int
        input.skip_f32(1)?; // float
        input.read_string()?; // string
        if tables.event_audio[event_index] {
            input.skip_f32(2)?; // volume, balance
        }
    }
    animation.push(TimelineKind::Event, event_count, last);

    Ok(animation)
}

impl SkeletonData {
    pub fn from_skel_bytes(bytes: &[u8]) -> Result<Arc<Self>, Error> {
        let mut input = BinaryInput::new(bytes);

        let low = input.read_i32_be()?;
        let high = input.read_i32_be()?;
        let hash = format_hash(low, high);

        let version = input.read_string()?.filter(|v| !v.is_empty());
        let line = export_line(version.as_deref())?;

        let x = input.read_f32_be()?;
        let y = input.read_f32_be()?;
        let width = input.read_f32_be()?;
        let height = input.read_f32_be()?;
        let reference_scale = if line >= RuntimeLine::V4_2 {
            input.read_f32_be()?
        } else {
            100.0
        };

        let nonessential = input.read_bool()?;
        let layout = Layout { line, nonessential };
        let (fps, images_path, audio_path) = if nonessential {
            let fps = input.read_f32_be()?;
            let images = input.read_string()?;
            let audio = input.read_string()?;
            (Some(fps), images, audio)
        } else {
            (None, None, None)
        };

        let strings_count = input.read_count()?;
        let mut strings = Vec::with_capacity(strings_count.min(input.remaining()));
        for _ in 0..strings_count {
            strings.push(input.read_string()?.unwrap_or_default());
        }

        // Bones
        let bones_count = input.read_count()?;
        let mut bones = Vec::with_capacity(bones_count.min(input.remaining()));
        for i in 0..bones_count {
            let name = input.read_string()?.unwrap_or_default();
            let parent = if i == 0 {
                None
            } else {
                let parent = input.read_count()?;
                check_index(parent, i, "bone parent")?;
                Some(parent)
            };
            if line >= RuntimeLine::V4_3 {
                // rotation, x, y, scaleX, scaleY, shearX, shearY
                input.skip_f32(7)?;
                input.read_u8()?; // inherit
                input.skip_f32(1)?; // length
            } else {
                // rotation, x, y, scaleX, scaleY, shearX, shearY, length
                input.skip_f32(8)?;
                input.read_varint(true)?; // inherit
            }
            input.read_bool()?; // skin required
            if nonessential {
                input.skip_color()?;
                if line >= RuntimeLine::V4_2 {
                    input.read_string()?; // icon
                    input.read_bool()?; // visible
                }
            }
            bones.push(BoneData { name, parent });
        }

        // Slots
        let slots_count = input.read_count()?;
        let mut slots = Vec::with_capacity(slots_count.min(input.remaining()));
        for _ in 0..slots_count {
            let name = input.read_string()?.unwrap_or_default();
            let bone = input.read_count()?;
            check_index(bone, bones.len(), "slot bone")?;
            input.skip_color()?; // color
            input.skip(4)?; // dark color (a, r, g, b)
            let attachment = input.read_string_ref(&strings)?;
            let blend_index = input.read_varint(true)?;
            let blend = BlendMode::from_index(blend_index as u32).unwrap_or_default();
            if nonessential && line >= RuntimeLine::V4_2 {
                input.read_bool()?; // visible
            }
            slots.push(SlotData {
                name,
                bone,
                attachment,
                blend,
            });
        }

        let constraints = read_constraints(&mut input, line)?;

        // Skins (default + named)
        let mut skins = Vec::new();
        let default_entries = input.read_count()?;
        if default_entries != 0 {
            let mut skin = SkinData::new("default");
            read_skin_attachments(
                &mut input,
                &mut skin,
                default_entries,
                slots.len(),
                &strings,
                layout,
            )?;
            skins.push(skin);
        }

        for _ in 0..input.read_count()? {
            let name = match line {
                RuntimeLine::V4_1 => input.read_string_ref(&strings)?,
                _ => input.read_string()?,
            };
            let mut skin = SkinData::new(name.unwrap_or_default());
            if nonessential && line >= RuntimeLine::V4_2 {
                input.skip_color()?;
            }
            for _ in 0..input.read_count()? {
                let bone = input.read_count()?;
                check_index(bone, bones.len(), "skin bone")?;
                skin.bones.push(bone);
            }
            if constraints.per_kind {
                for &kind in constraint_sections(line) {
                    for _ in 0..input.read_count()? {
                        let index = input.read_count()?;
                        let Some(constraint) = constraints.lookup(index, kind) else {
                            return Err(Error::BinaryParse {
                                message: format!(
                                    "skin references out-of-range {kind:?} constraint index {index}"
                                ),
                            });
                        };
                        skin.constraints.push(constraint.name.clone());
                    }
                }
            } else {
                for _ in 0..input.read_count()? {
                    let index = input.read_count()?;
                    let constraint =
                        constraints.list.get(index).ok_or_else(|| Error::BinaryParse {
                            message: format!(
                                "skin references out-of-range constraint index {index} (len={})",
                                constraints.list.len()
                            ),
                        })?;
                    skin.constraints.push(constraint.name.clone());
                }
            }
            let entries = input.read_count()?;
            read_skin_attachments(
                &mut input,
                &mut skin,
                entries,
                slots.len(),
                &strings,
                layout,
            )?;
            skins.push(skin);
        }

        // Events
        let events_count = input.read_count()?;
        let mut events = Vec::with_capacity(events_count.min(input.remaining()));
        let mut event_audio = Vec::with_capacity(events.capacity());
        for _ in 0..events_count {
            let name = match line {
                RuntimeLine::V4_1 => input.read_string_ref(&strings)?,
                _ => input.read_string()?,
            };
            input.read_varint(false)?; // int
            input.skip_f32(1)?; // float
            input.read_string()?; // string
            let audio_path = input.read_string()?;
            if audio_path.is_some() {
                input.skip_f32(2)?; // volume, balance
            }
            event_audio.push(audio_path.is_some());
            events.push(EventData {
                name: name.unwrap_or_default(),
                audio_path: audio_path.filter(|p| !p.is_empty()),
            });
        }

        // Animations
        let tables = Tables {
            line,
            strings: &strings,
            bones: bones.len(),
            slots: slots.len(),
            skins: skins.len(),
            constraints: &constraints,
            events: &events,
            event_audio: &event_audio,
        };
        let animations_count = input.read_count()?;
        let mut animations = Vec::with_capacity(animations_count.min(input.remaining()));
        for _ in 0..animations_count {
            let name = input.read_string()?.unwrap_or_default();
            animations.push(read_animation(&mut input, name, &tables)?);
        }

        // Slider constraints close the file with the index of the animation they drive.
        for c in &constraints.list {
            if c.kind == ConstraintKind::Slider {
                input.read_varint(true)?;
            }
        }

        Ok(Arc::new(SkeletonData {
            hash,
            version,
            x: Some(x),
            y: Some(y),
            width: Some(width),
            height: Some(height),
            reference_scale,
            fps,
            images_path,
            audio_path,
            bones,
            slots,
            skins,
            events,
            animations,
            constraints: constraints.list,
        }))
    }
}
