//! Quantized vertex buffers.
//!
//! Positions, normals and texture coordinates are stored as fixed-point
//! integers scaled by `2^divisor` (or raw floats); colors use one of the
//! packed GX color formats.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use glam::{Vec2, Vec3};
use serde::Serialize;

use super::io::{cursor_at, read_name, read_vec3, resolve};
use super::section::Section;
use crate::error::{Error, Result};
use crate::formats::gx::{Aabb, Color, ColorFormat, ComponentType, VatFormat};

/// Which pool a buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BufferKind {
    Position,
    Normal,
    Color,
    TexCoord,
}

impl BufferKind {
    /// Position and normal records carry min/max samples.
    #[must_use]
    pub const fn has_bounds(self) -> bool {
        matches!(self, BufferKind::Position | BufferKind::Normal)
    }

    const fn header_size(self) -> usize {
        if self.has_bounds() { 0x38 } else { 0x20 }
    }
}

/// Element encoding of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VertexFormat {
    Generic(ComponentType),
    Color(ColorFormat),
}

impl VertexFormat {
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        match self {
            VertexFormat::Generic(ty) => ty.to_u32(),
            VertexFormat::Color(fmt) => fmt.to_u32(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VertexQuantization {
    /// Kind-specific component count selector (e.g. XY/XYZ, RGB/RGBA).
    pub component_count: u32,
    pub format: VertexFormat,
    /// Fixed point shift; always 0 for colors and floats.
    pub divisor: u8,
    /// Bytes per entry.
    pub stride: u8,
}

impl VertexQuantization {
    /// Quantization with the stride derived from the element layout.
    #[must_use]
    pub fn new(kind: BufferKind, component_count: u32, format: VertexFormat, divisor: u8) -> Self {
        let mut q = Self {
            component_count,
            format,
            divisor,
            stride: 0,
        };
        q.stride = q.entry_size(kind).unwrap_or(0) as u8;
        q
    }

    /// Components per entry for generic buffers.
    pub fn elements(&self, kind: BufferKind) -> std::result::Result<usize, String> {
        let n = self.component_count;
        match (kind, n) {
            (BufferKind::Position, 0) => Ok(2),
            (BufferKind::Position, 1) => Ok(3),
            (BufferKind::Normal, 0) => Ok(3),
            (BufferKind::Normal, 1 | 2) => Err("NBT normals are not supported".to_string()),
            (BufferKind::TexCoord, 0) => Ok(1),
            (BufferKind::TexCoord, 1) => Ok(2),
            (BufferKind::Color, 0) => Ok(3),
            (BufferKind::Color, 1) => Ok(4),
            _ => Err(format!("invalid component count {n} for {kind:?} buffer")),
        }
    }

    /// Encoded bytes per entry.
    pub fn entry_size(&self, kind: BufferKind) -> std::result::Result<usize, String> {
        let elements = self.elements(kind)?;
        Ok(match self.format {
            VertexFormat::Generic(ty) => elements * ty.size(),
            VertexFormat::Color(fmt) => fmt.size(),
        })
    }

    /// Normals only allow the three hardware scalings.
    #[must_use]
    pub fn is_valid_normal(&self) -> bool {
        matches!(
            (self.format, self.divisor),
            (VertexFormat::Generic(ComponentType::S8), 6)
                | (VertexFormat::Generic(ComponentType::S16), 14)
                | (VertexFormat::Generic(ComponentType::F32), 0)
        )
    }

    /// The VAT entry a mesh must declare to read this buffer.
    #[must_use]
    pub fn vat_format(&self, kind: BufferKind) -> VatFormat {
        VatFormat {
            elements: self.component_count,
            format: self.format.to_u32(),
            shift: match kind {
                BufferKind::Position | BufferKind::TexCoord => u32::from(self.divisor),
                BufferKind::Normal | BufferKind::Color => 0,
            },
        }
    }

    fn check(&self, kind: BufferKind) -> std::result::Result<usize, String> {
        match (kind, self.format) {
            (BufferKind::Color, VertexFormat::Generic(_)) => {
                return Err("color buffer with a generic component type".to_string());
            }
            (BufferKind::Position | BufferKind::Normal | BufferKind::TexCoord, VertexFormat::Color(_)) => {
                return Err(format!("{kind:?} buffer with a color format"));
            }
            _ => {}
        }
        if self.divisor >= 32 {
            return Err(format!("divisor {} out of range", self.divisor));
        }
        if kind == BufferKind::Normal && !self.is_valid_normal() {
            return Err(format!(
                "normal quantization {:?} with divisor {} is not supported; \
                 expected (s8, 6), (s16, 14) or (f32, 0)",
                self.format, self.divisor
            ));
        }
        self.elements(kind)
    }
}

/// A named vertex array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenericBuffer<T> {
    pub name: String,
    /// Stored record id, written back unchanged. Meshes refer to buffers by
    /// pool position, not by id.
    pub id: u32,
    pub quantize: VertexQuantization,
    pub entries: Vec<T>,
}

impl<T> GenericBuffer<T> {
    #[must_use]
    pub fn new(name: impl Into<String>, quantize: VertexQuantization) -> Self {
        Self {
            name: name.into(),
            id: 0,
            quantize,
            entries: Vec::new(),
        }
    }
}

/// A value stored in a vertex buffer.
pub trait VertexElement: Sized + Copy {
    fn decode(reader: &mut Cursor<&[u8]>, q: &VertexQuantization, elements: usize) -> Result<Self>;

    fn encode(&self, section: &mut Section, q: &VertexQuantization, elements: usize);

    /// Sample used for the record's bounds.
    fn bound_point(&self) -> Option<Vec3> {
        None
    }
}

fn component_type(q: &VertexQuantization) -> ComponentType {
    match q.format {
        VertexFormat::Generic(ty) => ty,
        // rejected by check() before any element is touched
        VertexFormat::Color(_) => ComponentType::F32,
    }
}

fn read_component(r: &mut Cursor<&[u8]>, ty: ComponentType, divisor: u8) -> Result<f32> {
    let scale = 1.0 / (1u64 << divisor) as f32;
    Ok(match ty {
        ComponentType::U8 => f32::from(r.read_u8()?) * scale,
        ComponentType::S8 => f32::from(r.read_i8()?) * scale,
        ComponentType::U16 => f32::from(r.read_u16::<BigEndian>()?) * scale,
        ComponentType::S16 => f32::from(r.read_i16::<BigEndian>()?) * scale,
        ComponentType::F32 => r.read_f32::<BigEndian>()?,
    })
}

fn write_component(section: &mut Section, ty: ComponentType, divisor: u8, value: f32) {
    let scaled = (value * (1u64 << divisor) as f32).round();
    match ty {
        ComponentType::U8 => section.write_u8(scaled.clamp(0.0, 255.0) as u8),
        ComponentType::S8 => section.write_i8(scaled.clamp(-128.0, 127.0) as i8),
        ComponentType::U16 => section.write_u16(scaled.clamp(0.0, 65535.0) as u16),
        ComponentType::S16 => section.write_i16(scaled.clamp(-32768.0, 32767.0) as i16),
        ComponentType::F32 => section.write_f32(value),
    }
}

impl VertexElement for Vec3 {
    fn decode(r: &mut Cursor<&[u8]>, q: &VertexQuantization, elements: usize) -> Result<Self> {
        let ty = component_type(q);
        let mut v = Vec3::ZERO;
        for i in 0..elements.min(3) {
            v[i] = read_component(r, ty, q.divisor)?;
        }
        Ok(v)
    }

    fn encode(&self, section: &mut Section, q: &VertexQuantization, elements: usize) {
        let ty = component_type(q);
        for i in 0..elements.min(3) {
            write_component(section, ty, q.divisor, self[i]);
        }
    }

    fn bound_point(&self) -> Option<Vec3> {
        Some(*self)
    }
}

impl VertexElement for Vec2 {
    fn decode(r: &mut Cursor<&[u8]>, q: &VertexQuantization, elements: usize) -> Result<Self> {
        let ty = component_type(q);
        let mut v = Vec2::ZERO;
        for i in 0..elements.min(2) {
            v[i] = read_component(r, ty, q.divisor)?;
        }
        Ok(v)
    }

    fn encode(&self, section: &mut Section, q: &VertexQuantization, elements: usize) {
        let ty = component_type(q);
        for i in 0..elements.min(2) {
            write_component(section, ty, q.divisor, self[i]);
        }
    }
}

/// Widen an `n`-bit channel to 8 bits.
const fn expand(v: u32, n: u32) -> u8 {
    let v = v & ((1 << n) - 1);
    ((v << (8 - n)) | (v >> (2 * n - 8))) as u8
}

impl VertexElement for Color {
    fn decode(r: &mut Cursor<&[u8]>, q: &VertexQuantization, _elements: usize) -> Result<Self> {
        let VertexFormat::Color(fmt) = q.format else {
            return Err(Error::buffer("", "color element without a color format"));
        };
        Ok(match fmt {
            ColorFormat::Rgb565 => {
                let v = u32::from(r.read_u16::<BigEndian>()?);
                Color::new(expand(v >> 11, 5), expand(v >> 5, 6), expand(v, 5), 0xFF)
            }
            ColorFormat::Rgb8 => {
                let v = r.read_u24::<BigEndian>()?;
                Color::from_u32((v << 8) | 0xFF)
            }
            ColorFormat::Rgbx8 => {
                let v = r.read_u32::<BigEndian>()?;
                Color::from_u32(v | 0xFF)
            }
            ColorFormat::Rgba4 => {
                let v = u32::from(r.read_u16::<BigEndian>()?);
                Color::new(
                    expand(v >> 12, 4),
                    expand(v >> 8, 4),
                    expand(v >> 4, 4),
                    expand(v, 4),
                )
            }
            ColorFormat::Rgba6 => {
                let v = r.read_u24::<BigEndian>()?;
                Color::new(
                    expand(v >> 18, 6),
                    expand(v >> 12, 6),
                    expand(v >> 6, 6),
                    expand(v, 6),
                )
            }
            ColorFormat::Rgba8 => Color::from_u32(r.read_u32::<BigEndian>()?),
        })
    }

    fn encode(&self, section: &mut Section, q: &VertexQuantization, _elements: usize) {
        let VertexFormat::Color(fmt) = q.format else {
            return;
        };
        let [r, g, b, a] = [self.r, self.g, self.b, self.a].map(u32::from);
        match fmt {
            ColorFormat::Rgb565 => {
                section.write_u16(((r >> 3) << 11 | (g >> 2) << 5 | (b >> 3)) as u16);
            }
            ColorFormat::Rgb8 => section.write_bytes(&[self.r, self.g, self.b]),
            ColorFormat::Rgbx8 => section.write_bytes(&[self.r, self.g, self.b, 0xFF]),
            ColorFormat::Rgba4 => {
                section.write_u16(((r >> 4) << 12 | (g >> 4) << 8 | (b >> 4) << 4 | (a >> 4)) as u16);
            }
            ColorFormat::Rgba6 => {
                let v = (r >> 2) << 18 | (g >> 2) << 12 | (b >> 2) << 6 | (a >> 2);
                section.write_bytes(&v.to_be_bytes()[1..]);
            }
            ColorFormat::Rgba8 => section.write_u32(self.to_u32()),
        }
    }
}

/// Decode the buffer record at `start`.
pub fn read_buffer<T: VertexElement>(
    data: &[u8],
    start: u64,
    kind: BufferKind,
) -> Result<GenericBuffer<T>> {
    let mut r = cursor_at(data, start)?;
    let _size = r.read_u32::<BigEndian>()?;
    let _model_offset = r.read_i32::<BigEndian>()?;
    let data_offset = r.read_i32::<BigEndian>()?;
    let name_offset = r.read_i32::<BigEndian>()?;
    let name = read_name(data, start, name_offset)?;
    let fail = |message: String| Error::buffer(&name, message);

    let id = r.read_u32::<BigEndian>()?;
    let component_count = r.read_u32::<BigEndian>()?;
    let raw_type = r.read_u32::<BigEndian>()?;
    let b0 = r.read_u8()?;
    let b1 = r.read_u8()?;
    let count = r.read_u16::<BigEndian>()?;

    let format = match kind {
        BufferKind::Color => ColorFormat::from_u32(raw_type).map(VertexFormat::Color),
        _ => ComponentType::from_u32(raw_type).map(VertexFormat::Generic),
    }
    .ok_or_else(|| fail(format!("unknown component type {raw_type}")))?;
    let (divisor, stride) = match kind {
        BufferKind::Color => (0, b0),
        _ => (b0, b1),
    };
    let quantize = VertexQuantization {
        component_count,
        format,
        divisor,
        stride,
    };
    let elements = quantize.check(kind).map_err(fail)?;
    let entry_size = quantize.entry_size(kind).map_err(fail)?;
    if usize::from(stride) < entry_size {
        return Err(fail(format!(
            "stride {stride} is smaller than the {entry_size} byte entry"
        )));
    }
    if kind.has_bounds() {
        // min/max samples, recomputed on write
        read_vec3(&mut r)?;
        read_vec3(&mut r)?;
    }

    let payload = resolve(
        data,
        start,
        i64::from(data_offset),
        usize::from(stride) * usize::from(count),
    )
    .map_err(|e| fail(e.to_string()))?;

    let mut entries = Vec::with_capacity(usize::from(count));
    for i in 0..u64::from(count) {
        r.set_position(payload + i * u64::from(stride));
        entries.push(T::decode(&mut r, &quantize, elements)?);
    }

    tracing::debug!("Read {:?} buffer '{}' ({} entries)", kind, name, count);
    Ok(GenericBuffer {
        name,
        id,
        quantize,
        entries,
    })
}

/// Emit a buffer record (32-byte aligned) under `label`.
pub fn write_buffer<T: VertexElement>(
    section: &mut Section,
    buffer: &GenericBuffer<T>,
    kind: BufferKind,
    label: &str,
) -> Result<()> {
    let q = &buffer.quantize;
    let fail = |message: String| Error::buffer(&buffer.name, message);
    let elements = q.check(kind).map_err(fail)?;
    let entry_size = q.entry_size(kind).map_err(fail)?;
    let count = u16::try_from(buffer.entries.len()).map_err(|_| {
        fail(format!(
            "{} entries exceed the 65535 entry limit",
            buffer.entries.len()
        ))
    })?;

    section.align(32);
    let start = section.pos();
    section.label(label);
    let data_offset = kind.header_size().next_multiple_of(32);

    section.write_u32(0); // size, patched below
    section.write_model_offset(start);
    section.write_i32(data_offset as i32);
    section.write_name(start, &buffer.name);
    section.write_u32(buffer.id);
    section.write_u32(q.component_count);
    section.write_u32(q.format.to_u32());
    match kind {
        BufferKind::Color => {
            section.write_u8(entry_size as u8);
            section.write_u8(0);
        }
        _ => {
            section.write_u8(q.divisor);
            section.write_u8(entry_size as u8);
        }
    }
    section.write_u16(count);
    if kind.has_bounds() {
        let bounds = Aabb::from_points(
            buffer
                .entries
                .iter()
                .filter_map(VertexElement::bound_point)
                .collect::<Vec<_>>()
                .iter(),
        )
        .unwrap_or_default();
        section.write_vec3(bounds.min);
        section.write_vec3(bounds.max);
    }

    section.write_zeros(start + data_offset - section.pos());
    for entry in &buffer.entries {
        entry.encode(section, q, elements);
    }
    section.align(32);
    let size = section.pos() - start;
    section.patch_u32(start, size as u32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: VertexElement>(buffer: &GenericBuffer<T>, kind: BufferKind) -> GenericBuffer<T> {
        let mut section = Section::new();
        write_buffer(&mut section, buffer, kind, "buf").unwrap();
        let data = section.finish().unwrap();
        read_buffer(&data, 0, kind).unwrap()
    }

    #[test]
    fn test_f32_positions() {
        let q = VertexQuantization::new(
            BufferKind::Position,
            1,
            VertexFormat::Generic(ComponentType::F32),
            0,
        );
        let mut buffer = GenericBuffer::new("pos", q);
        buffer.id = 3;
        buffer.entries = vec![Vec3::new(0.0, 1.5, -2.0), Vec3::new(10.0, 0.0, 3.25)];
        let decoded = round_trip(&buffer, BufferKind::Position);
        assert_eq!(decoded.name, "pos");
        assert_eq!(decoded.id, 3);
        assert_eq!(decoded.entries, buffer.entries);
        assert_eq!(decoded.quantize, q);
    }

    #[test]
    fn test_fixed_point_texcoords() {
        let q = VertexQuantization::new(
            BufferKind::TexCoord,
            1,
            VertexFormat::Generic(ComponentType::S16),
            10,
        );
        let mut buffer = GenericBuffer::new("uv", q);
        buffer.entries = vec![Vec2::new(0.5, -0.25), Vec2::new(1.0 / 3.0, 31.0)];
        let decoded = round_trip(&buffer, BufferKind::TexCoord);
        for (a, b) in buffer.entries.iter().zip(&decoded.entries) {
            assert!((*a - *b).abs().max_element() <= 0.5 / 1024.0);
        }
    }

    #[test]
    fn test_quantize_clamps() {
        let q = VertexQuantization::new(
            BufferKind::Position,
            1,
            VertexFormat::Generic(ComponentType::U8),
            0,
        );
        let mut buffer = GenericBuffer::new("p", q);
        buffer.entries = vec![Vec3::new(-5.0, 300.0, 7.4)];
        let decoded = round_trip(&buffer, BufferKind::Position);
        assert_eq!(decoded.entries[0], Vec3::new(0.0, 255.0, 7.0));
    }

    #[test]
    fn test_normal_quantization_rule() {
        for (ty, divisor, ok) in [
            (ComponentType::S8, 6, true),
            (ComponentType::S16, 14, true),
            (ComponentType::F32, 0, true),
            (ComponentType::S8, 7, false),
            (ComponentType::U16, 14, false),
        ] {
            let q = VertexQuantization::new(BufferKind::Normal, 0, VertexFormat::Generic(ty), divisor);
            let mut buffer = GenericBuffer::new("n", q);
            buffer.entries = vec![Vec3::Y];
            let mut section = Section::new();
            let result = write_buffer(&mut section, &buffer, BufferKind::Normal, "n");
            assert_eq!(result.is_ok(), ok, "{ty:?}/{divisor}");
        }
    }

    #[test]
    fn test_invalid_normal_rejected_on_read() {
        let q = VertexQuantization::new(
            BufferKind::Position,
            1,
            VertexFormat::Generic(ComponentType::S8),
            3,
        );
        let mut buffer = GenericBuffer::new("n", q);
        buffer.entries = vec![Vec3::ONE];
        let mut section = Section::new();
        write_buffer(&mut section, &buffer, BufferKind::Position, "n").unwrap();
        let data = section.finish().unwrap();
        // Same bytes decoded as a normal pool: (s8, 3) is not a legal scaling.
        assert!(matches!(
            read_buffer::<Vec3>(&data, 0, BufferKind::Normal),
            Err(Error::InvalidBuffer { .. })
        ));
    }

    #[test]
    fn test_color_formats() {
        let colors = vec![Color::new(255, 0, 128, 255), Color::new(16, 32, 48, 64)];
        for fmt in [ColorFormat::Rgba8, ColorFormat::Rgb8, ColorFormat::Rgba6, ColorFormat::Rgb565] {
            let q = VertexQuantization::new(BufferKind::Color, 1, VertexFormat::Color(fmt), 0);
            let mut buffer = GenericBuffer::new("c", q);
            buffer.entries = colors.clone();
            let decoded = round_trip(&buffer, BufferKind::Color);
            assert_eq!(decoded.entries.len(), 2);
            assert_eq!(decoded.quantize.stride as usize, fmt.size());
            if fmt == ColorFormat::Rgba8 {
                assert_eq!(decoded.entries, colors);
            }
            assert_eq!(decoded.entries[0].r, 255);
        }
    }

    #[test]
    fn test_too_many_entries() {
        let q = VertexQuantization::new(
            BufferKind::TexCoord,
            0,
            VertexFormat::Generic(ComponentType::U8),
            0,
        );
        let mut buffer = GenericBuffer::new("big", q);
        buffer.entries = vec![Vec2::ZERO; 65536];
        let mut section = Section::new();
        assert!(write_buffer(&mut section, &buffer, BufferKind::TexCoord, "big").is_err());
    }
}
