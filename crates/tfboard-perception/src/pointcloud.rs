//! Point-cloud wire decoding.
//!
//! Two encodings of `sensor_msgs/PointCloud2` reach the dashboard:
//!
//! - **Raw** – the ROS record layout: a field descriptor list, `point_step`
//!   bytes per point and a base64 payload of `width * height` records.
//! - **Quantized** – the server keeps only x/y/z, maps each axis onto
//!   `0..=65535` between per-axis bounds and ships little-endian `u16`
//!   triples alongside `[xmin, xmax, ymin, ymax, zmin, zmax]`.
//!
//! Both decode into a flat [`PointBuffer`] of `f32` triples, optionally
//! keeping only every `stride`-th point.
//!
//! # Example
//!
//! ```rust
//! use base64::Engine;
//! use tfboard_perception::pointcloud::decode_quantized;
//!
//! let bytes: Vec<u8> = [0u16, 0, 0, 65535, 65535, 65535]
//!     .iter()
//!     .flat_map(|v| v.to_le_bytes())
//!     .collect();
//! let payload = base64::prelude::BASE64_STANDARD.encode(bytes);
//!
//! let cloud = decode_quantized(&[0.0, 10.0, 0.0, 10.0, 0.0, 10.0], &payload, 1).unwrap();
//! assert_eq!(cloud.as_slice(), &[0.0, 0.0, 0.0, 10.0, 10.0, 10.0]);
//! ```

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use tfboard_types::{BoardError, PointCloud2Message, PointField, PointFieldDatatype};
use tracing::{debug, warn};

/// Bytes per quantized point (three `u16`).
const QUANTIZED_POINT_BYTES: usize = 6;

/// Colour range assumed for raw clouds, which carry no bounds.
const RAW_Z_RANGE: (f32, f32) = (-2.0, 2.0);

// ────────────────────────────────────────────────────────────────────────────
// PointBuffer
// ────────────────────────────────────────────────────────────────────────────

/// Flat `[x0, y0, z0, x1, y1, z1, …]` coordinates. Length is always a
/// multiple of three.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointBuffer {
    data: Vec<f32>,
}

impl PointBuffer {
    /// Wrap an existing flat buffer. Returns `None` if its length is not a
    /// multiple of three.
    pub fn from_vec(data: Vec<f32>) -> Option<Self> {
        (data.len() % 3 == 0).then_some(Self { data })
    }

    /// A buffer of `points` points at the origin.
    pub fn zeros(points: usize) -> Self {
        Self {
            data: vec![0.0; points * 3],
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Number of floats (three per point).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.data.len() / 3
    }

    /// Iterate over `[x, y, z]` triples.
    pub fn points(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.data.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }
}

impl FromIterator<[f32; 3]> for PointBuffer {
    fn from_iter<I: IntoIterator<Item = [f32; 3]>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().flatten().collect(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Decoding entry points
// ────────────────────────────────────────────────────────────────────────────

/// A decoded cloud plus the z range to colour it by.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCloud {
    pub points: PointBuffer,
    pub z_range: (f32, f32),
}

/// Decode either wire form of a `PointCloud2` message.
///
/// `stride` keeps points `0, stride, 2·stride, …`; `0` behaves like `1`.
pub fn decode(msg: &PointCloud2Message, stride: usize) -> Result<DecodedCloud, BoardError> {
    if msg.is_compressed() {
        let quantized = msg
            .data_uint16
            .as_ref()
            .ok_or_else(|| BoardError::MissingField("_data_uint16".to_string()))?;
        let points = decode_quantized(&quantized.bounds, &quantized.points, stride)?;
        let z_range = (quantized.bounds[4] as f32, quantized.bounds[5] as f32);
        Ok(DecodedCloud { points, z_range })
    } else {
        let data = msg
            .data
            .as_deref()
            .ok_or_else(|| BoardError::MissingField("data".to_string()))?;
        let layout = RawLayout {
            fields: &msg.fields,
            point_step: msg.point_step as usize,
            width: msg.width as usize,
            height: msg.height as usize,
            is_bigendian: msg.is_bigendian,
        };
        let points = decode_raw(&layout, data, stride)?;
        Ok(DecodedCloud {
            points,
            z_range: RAW_Z_RANGE,
        })
    }
}

/// Record geometry of a raw cloud.
#[derive(Debug, Clone, Copy)]
pub struct RawLayout<'a> {
    pub fields: &'a [PointField],
    pub point_step: usize,
    pub width: usize,
    pub height: usize,
    pub is_bigendian: bool,
}

/// Decode a raw field-described cloud from its base64 payload.
pub fn decode_raw(layout: &RawLayout<'_>, payload: &str, stride: usize) -> Result<PointBuffer, BoardError> {
    for (name, value) in [
        ("point_step", layout.point_step),
        ("width", layout.width),
        ("height", layout.height),
    ] {
        if value == 0 {
            return Err(BoardError::EmptyGeometry(name.to_string()));
        }
    }

    let x = FieldReader::resolve(layout, "x")?
        .ok_or_else(|| BoardError::MissingField("x".to_string()))?;
    let y = FieldReader::resolve(layout, "y")?
        .ok_or_else(|| BoardError::MissingField("y".to_string()))?;
    let z = FieldReader::resolve(layout, "z")?;

    for field in layout.fields {
        if PointFieldDatatype::from_code(field.datatype).is_none() {
            warn!(field = %field.name, datatype = field.datatype, "ignoring point field with invalid datatype");
        }
    }

    let bytes = decode_base64(payload)?;
    let expected = layout
        .point_step
        .checked_mul(layout.width)
        .and_then(|n| n.checked_mul(layout.height))
        .unwrap_or(usize::MAX);
    if expected != bytes.len() {
        return Err(BoardError::ByteLengthMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    let stride = stride.max(1);
    let total = bytes.len() / layout.point_step;
    let big_endian = layout.is_bigendian;

    let points: PointBuffer = (0..total)
        .step_by(stride)
        .map(|i| {
            let base = i * layout.point_step;
            [
                x.read(&bytes, base, big_endian),
                y.read(&bytes, base, big_endian),
                z.map_or(0.0, |z| z.read(&bytes, base, big_endian)),
            ]
        })
        .collect();

    debug!(total, stride, decoded = points.point_count(), "decoded raw point cloud");
    Ok(points)
}

/// Decode a quantized cloud: `bounds` is `[xmin, xmax, ymin, ymax, zmin,
/// zmax]`, `payload` base64 of little-endian `u16` triples.
pub fn decode_quantized(bounds: &[f64], payload: &str, stride: usize) -> Result<PointBuffer, BoardError> {
    if bounds.len() < 6 {
        return Err(BoardError::InvalidBounds(bounds.len()));
    }
    let bytes = decode_base64(payload)?;

    let axes = [
        Dequantizer::new(bounds[0], bounds[1]),
        Dequantizer::new(bounds[2], bounds[3]),
        Dequantizer::new(bounds[4], bounds[5]),
    ];

    let stride = stride.max(1);
    let total = bytes.len() / QUANTIZED_POINT_BYTES;

    let points: PointBuffer = (0..total)
        .step_by(stride)
        .map(|i| {
            let base = i * QUANTIZED_POINT_BYTES;
            let mut p = [0.0f32; 3];
            for (axis, (out, dq)) in p.iter_mut().zip(&axes).enumerate() {
                let raw = u16::from_le_bytes(read_array(&bytes, base + axis * 2));
                *out = dq.apply(raw);
            }
            p
        })
        .collect();

    debug!(total, stride, decoded = points.point_count(), "decoded quantized point cloud");
    Ok(points)
}

// ────────────────────────────────────────────────────────────────────────────
// Internals
// ────────────────────────────────────────────────────────────────────────────

fn decode_base64(payload: &str) -> Result<Vec<u8>, BoardError> {
    BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|e| BoardError::InvalidBase64(e.to_string()))
}

fn read_array<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[at..at + N]);
    buf
}

/// Location and encoding of one coordinate inside a record.
#[derive(Debug, Clone, Copy)]
struct FieldReader {
    offset: usize,
    datatype: PointFieldDatatype,
}

impl FieldReader {
    /// Look up `name` in the layout. `Ok(None)` if absent; an error if it is
    /// present but cannot be read.
    fn resolve(layout: &RawLayout<'_>, name: &str) -> Result<Option<Self>, BoardError> {
        let Some(field) = layout.fields.iter().find(|f| f.name == name) else {
            return Ok(None);
        };
        let datatype = PointFieldDatatype::from_code(field.datatype).ok_or_else(|| {
            BoardError::UnsupportedDatatype {
                field: field.name.clone(),
                datatype: field.datatype,
            }
        })?;
        let offset = field.offset as usize;
        if offset + datatype.size() > layout.point_step {
            return Err(BoardError::FieldOutOfRecord {
                field: field.name.clone(),
                offset,
                point_step: layout.point_step,
            });
        }
        Ok(Some(Self { offset, datatype }))
    }

    fn read(&self, bytes: &[u8], record: usize, big_endian: bool) -> f32 {
        let at = record + self.offset;
        macro_rules! get {
            ($t:ty) => {{
                let raw = read_array::<{ std::mem::size_of::<$t>() }>(bytes, at);
                if big_endian { <$t>::from_be_bytes(raw) } else { <$t>::from_le_bytes(raw) }
            }};
        }
        match self.datatype {
            PointFieldDatatype::Int8 => get!(i8) as f32,
            PointFieldDatatype::Uint8 => get!(u8) as f32,
            PointFieldDatatype::Int16 => get!(i16) as f32,
            PointFieldDatatype::Uint16 => get!(u16) as f32,
            PointFieldDatatype::Int32 => get!(i32) as f32,
            PointFieldDatatype::Uint32 => get!(u32) as f32,
            PointFieldDatatype::Float32 => get!(f32),
            PointFieldDatatype::Float64 => get!(f64) as f32,
        }
    }
}

/// Maps `0..=65535` linearly onto `[min, max]`.
#[derive(Debug, Clone, Copy)]
struct Dequantizer {
    min: f64,
    range: f64,
}

impl Dequantizer {
    fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            range: max - min,
        }
    }

    fn apply(&self, raw: u16) -> f32 {
        ((f64::from(raw) / 65535.0) * self.range + self.min) as f32
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
