//! `tfboard-perception` – frame resolution and point-cloud decoding.
//!
//! Turns the raw wire traffic of a robot into coordinates a renderer can draw
//! in whichever frame the operator picked.
//!
//! # Modules
//!
//! - [`transform`] – [`Quaternion`][transform::Quaternion] and
//!   [`Transform3D`][transform::Transform3D] algebra.
//! - [`frame_graph`] – [`FrameGraph`][frame_graph::FrameGraph]: the forest of
//!   `child → parent` edges and lowest-common-ancestor lookups between any two
//!   frames.
//! - [`pointcloud`] – decodes raw and quantized `PointCloud2` payloads into a
//!   flat [`PointBuffer`][pointcloud::PointBuffer].
//! - [`apply`] – applies a resolved transform to a whole buffer.

pub mod apply;
pub mod frame_graph;
pub mod pointcloud;
pub mod transform;

pub use apply::{ApplyOutcome, apply_between, transform_points};
pub use frame_graph::{EdgeUpdate, FrameGraph, LookupError, MAX_FRAME_DEPTH};
pub use pointcloud::{DecodedCloud, PointBuffer};
pub use transform::{Quaternion, Transform3D, Vec3};
