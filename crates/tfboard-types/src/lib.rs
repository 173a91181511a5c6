//! Shared wire types and the workspace-wide error enum.
//!
//! The message structs mirror the JSON the dashboard transport delivers: ROS
//! messages flattened into objects, with the routing metadata carried in the
//! underscore-prefixed `_topic_name` / `_topic_type` keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Routing envelope
// ────────────────────────────────────────────────────────────────────────────

/// A message as received from the transport, before it is routed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// e.g. `"/velodyne_points"`
    #[serde(rename = "_topic_name")]
    pub topic_name: String,
    /// e.g. `"sensor_msgs/msg/PointCloud2"`
    #[serde(rename = "_topic_type", default)]
    pub topic_type: String,
    /// The remaining message fields.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl InboundMessage {
    /// Deserialize the message body into a concrete message type.
    pub fn parse_body<T: serde::de::DeserializeOwned>(&self) -> Result<T, BoardError> {
        serde_json::from_value(Value::Object(self.body.clone()))
            .map_err(|e| BoardError::Serialization(format!("{}: {e}", self.topic_name)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// std_msgs / geometry_msgs / tf2_msgs
// ────────────────────────────────────────────────────────────────────────────

/// `std_msgs/Header`, reduced to the part the engine reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub frame_id: String,
}

/// `geometry_msgs/Vector3`. Absent components decode as `0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3Msg {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// `geometry_msgs/Quaternion`. Absent components decode to the identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuaternionMsg {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "one")]
    pub w: f64,
}

fn one() -> f64 {
    1.0
}

impl Default for QuaternionMsg {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// `geometry_msgs/Transform`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformMsg {
    #[serde(default)]
    pub translation: Vector3Msg,
    #[serde(default)]
    pub rotation: QuaternionMsg,
}

/// `geometry_msgs/TransformStamped`: the pose of `child_frame_id` expressed in
/// `header.frame_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub child_frame_id: String,
    #[serde(default)]
    pub transform: TransformMsg,
}

/// `tf2_msgs/TFMessage`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfMessage {
    #[serde(default)]
    pub transforms: Vec<TransformStamped>,
}

// ────────────────────────────────────────────────────────────────────────────
// sensor_msgs/PointCloud2
// ────────────────────────────────────────────────────────────────────────────

/// Numeric encodings a `PointField` may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointFieldDatatype {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl PointFieldDatatype {
    /// Map a `sensor_msgs/PointField` datatype code (1–8) to its encoding.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Int8),
            2 => Some(Self::Uint8),
            3 => Some(Self::Int16),
            4 => Some(Self::Uint16),
            5 => Some(Self::Int32),
            6 => Some(Self::Uint32),
            7 => Some(Self::Float32),
            8 => Some(Self::Float64),
            _ => None,
        }
    }

    /// Wire code of this encoding.
    pub fn code(self) -> u8 {
        match self {
            Self::Int8 => 1,
            Self::Uint8 => 2,
            Self::Int16 => 3,
            Self::Uint16 => 4,
            Self::Int32 => 5,
            Self::Uint32 => 6,
            Self::Float32 => 7,
            Self::Float64 => 8,
        }
    }

    /// Width of one value in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

/// One entry of a raw point cloud's field descriptor list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointField {
    pub name: String,
    pub offset: u32,
    /// Raw datatype code; see [`PointFieldDatatype::from_code`].
    pub datatype: u8,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

/// Lossy uint16 payload produced by the server-side compressor.
///
/// `points` is base64 of little-endian `u16` triples; `bounds` is
/// `[xmin, xmax, ymin, ymax, zmin, zmax]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantizedPoints {
    #[serde(default)]
    pub bounds: Vec<f64>,
    #[serde(default)]
    pub points: String,
}

/// `sensor_msgs/PointCloud2` in either of its two wire forms.
///
/// A raw cloud fills `fields` / `point_step` / `width` / `height` / `data`.
/// A compressed cloud instead carries `_data_uint16` and lists it in
/// `__comp`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud2Message {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub fields: Vec<PointField>,
    #[serde(default)]
    pub point_step: u32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub is_bigendian: bool,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(rename = "_data_uint16", default, skip_serializing_if = "Option::is_none")]
    pub data_uint16: Option<QuantizedPoints>,
    #[serde(rename = "__comp", default, skip_serializing_if = "Vec::is_empty")]
    pub comp: Vec<String>,
}

impl PointCloud2Message {
    /// Whether the message arrived in the quantized form.
    pub fn is_compressed(&self) -> bool {
        !self.comp.is_empty() || self.data_uint16.is_some()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type. Every variant is recoverable: the message that
/// caused it is dropped and the rest of the system carries on.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoardError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("Byte length mismatch: point_step * width * height = {expected}, payload is {actual} bytes")]
    ByteLengthMismatch { expected: usize, actual: usize },

    #[error("Point cloud has zero {0}")]
    EmptyGeometry(String),

    #[error("Field '{field}' has unsupported datatype {datatype}")]
    UnsupportedDatatype { field: String, datatype: u8 },

    #[error("Field '{field}' at offset {offset} does not fit in a {point_step}-byte record")]
    FieldOutOfRecord {
        field: String,
        offset: usize,
        point_step: usize,
    },

    #[error("Quantization bounds must have 6 entries, got {0}")]
    InvalidBounds(usize),

    #[error("No viewer registered for message type '{0}'")]
    UnknownMessageType(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("I/O Error: {0}")]
    Io(String),
}
