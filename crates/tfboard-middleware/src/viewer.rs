//! The contract every per-topic viewer fulfils, and what it hands the
//! renderer.
//!
//! A viewer is fed messages through [`TopicViewer::decode`] as they arrive
//! and asked for draw objects through [`TopicViewer::render`] once per
//! scheduler tick. Rendering takes the shared [`FrameGraph`] so a viewer can
//! re-express its data in the operator's base frame at draw time.

use serde::{Deserialize, Serialize};
use tfboard_perception::FrameGraph;
use tfboard_types::{BoardError, InboundMessage};

/// How point colours are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Gradient over the cloud's z range.
    #[default]
    Z,
    /// One uniform colour.
    Fixed,
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorMode::Z => write!(f, "z"),
            ColorMode::Fixed => write!(f, "fixed"),
        }
    }
}

/// Operator-controlled knobs shared by every viewer on a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSettings {
    /// Keep every Nth point. `0` behaves like `1`.
    pub decimation_stride: usize,
    /// Frame to draw everything in. Empty means "leave data in its own frame".
    pub base_frame: String,
    pub color_mode: ColorMode,
    /// RGBA used when `color_mode` is [`ColorMode::Fixed`].
    pub fixed_color: [f32; 4],
    pub point_size: f32,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            decimation_stride: 1,
            base_frame: String::new(),
            color_mode: ColorMode::Z,
            fixed_color: [1.0, 1.0, 1.0, 1.0],
            point_size: 1.5,
        }
    }
}

/// A primitive handed to the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DrawObject {
    Points {
        /// Flat `[x, y, z, …]` in `frame`.
        data: Vec<f32>,
        /// Frame the coordinates are expressed in.
        frame: String,
        z_min: f32,
        z_max: f32,
        color_mode: ColorMode,
        color: [f32; 4],
        point_size: f32,
    },
}

impl DrawObject {
    /// Number of points carried by this object.
    pub fn point_count(&self) -> usize {
        match self {
            DrawObject::Points { data, .. } => data.len() / 3,
        }
    }
}

/// Capability interface for a per-topic viewer.
pub trait TopicViewer: Send {
    /// Validate and keep `msg` as the viewer's current data.
    ///
    /// On error the viewer drops whatever it held, so the next render skips
    /// this layer until a good message arrives.
    fn decode(&mut self, msg: &InboundMessage) -> Result<(), BoardError>;

    /// Produce draw objects for the current data, or `None` when there is
    /// nothing to draw.
    fn render(&self, graph: &FrameGraph) -> Option<Vec<DrawObject>>;

    /// Apply new operator settings.
    fn configure(&mut self, settings: &ViewerSettings);
}
