//! `tfboard-middleware` – where decoded data meets the renderer.
//!
//! Routes inbound dashboard messages either into the shared frame graph or to
//! the viewer subscribed to their topic, and paces redraws so that any burst
//! of updates costs at most one render per tick.
//!
//! # Modules
//!
//! - [`dashboard`] – [`Dashboard`]: one session owning a
//!   [`FrameGraph`](tfboard_perception::FrameGraph), its subscriptions and a
//!   scheduler.
//! - [`registry`] – [`ViewerRegistry`]: message type → viewer factory.
//! - [`viewer`] – the [`TopicViewer`] contract and [`DrawObject`] output.
//! - [`pointcloud_viewer`] – [`PointCloudViewer`] for `sensor_msgs/PointCloud2`.
//! - [`scheduler`] – [`RenderScheduler`], the single-slot pending flag.

pub mod dashboard;
pub mod pointcloud_viewer;
pub mod registry;
pub mod scheduler;
pub mod viewer;

pub use dashboard::{Dashboard, Layer, Routed};
pub use pointcloud_viewer::PointCloudViewer;
pub use registry::ViewerRegistry;
pub use scheduler::RenderScheduler;
pub use viewer::{ColorMode, DrawObject, TopicViewer, ViewerSettings};
