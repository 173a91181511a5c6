//! Bulk application of a resolved transform to a [`PointBuffer`].

use tracing::warn;

use crate::frame_graph::{FrameGraph, normalize_frame};
use crate::pointcloud::PointBuffer;
use crate::transform::Transform3D;

/// Map every point of `points` through `t`: `rotate(q, p) + translation`.
pub fn transform_points(t: &Transform3D, points: &PointBuffer) -> PointBuffer {
    let q = t.rotation;
    let (rx, ry, rz, rw) = (q.x, q.y, q.z, q.w);
    let (tx, ty, tz) = (t.translation.x, t.translation.y, t.translation.z);

    points
        .points()
        .map(|[px, py, pz]| {
            let (px, py, pz) = (f64::from(px), f64::from(py), f64::from(pz));
            // q * (p, 0)
            let ix = rw * px + ry * pz - rz * py;
            let iy = rw * py + rz * px - rx * pz;
            let iz = rw * pz + rx * py - ry * px;
            let iw = -rx * px - ry * py - rz * pz;
            // … * q*
            [
                (ix * rw - iw * rx - iy * rz + iz * ry + tx) as f32,
                (iy * rw - iw * ry - iz * rx + ix * rz + ty) as f32,
                (iz * rw - iw * rz - ix * ry + iy * rx + tz) as f32,
            ]
        })
        .collect()
}

/// Result of [`apply_between`].
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The points are now expressed in the target frame.
    Transformed(PointBuffer),
    /// No transform was applied; the points are still in their source frame.
    Passthrough(PointBuffer),
}

impl ApplyOutcome {
    pub fn is_transformed(&self) -> bool {
        matches!(self, Self::Transformed(_))
    }

    pub fn points(&self) -> &PointBuffer {
        match self {
            Self::Transformed(p) | Self::Passthrough(p) => p,
        }
    }

    pub fn into_points(self) -> PointBuffer {
        match self {
            Self::Transformed(p) | Self::Passthrough(p) => p,
        }
    }
}

/// Re-express `points` from `source` into `target` using `graph`.
///
/// When either name is empty, or the graph cannot relate the frames, the
/// buffer is handed back untouched as [`ApplyOutcome::Passthrough`]; it is up
/// to the caller whether to draw it in its source frame or drop it.
pub fn apply_between(graph: &FrameGraph, source: &str, target: &str, points: PointBuffer) -> ApplyOutcome {
    let source = normalize_frame(source);
    let target = normalize_frame(target);
    if source.is_empty() || target.is_empty() {
        return ApplyOutcome::Passthrough(points);
    }
    match graph.try_get_transform(source, target) {
        Ok(t) => ApplyOutcome::Transformed(transform_points(&t, &points)),
        Err(e) => {
            warn!(source_frame = source, target_frame = target, error = %e, "cannot transform points");
            ApplyOutcome::Passthrough(points)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_graph::EdgeUpdate;
    use crate::transform::{Quaternion, Vec3};
    use std::f64::consts::FRAC_1_SQRT_2;

    fn buffer(values: &[f32]) -> PointBuffer {
        PointBuffer::from_vec(values.to_vec()).unwrap()
    }

    fn assert_close(got: &PointBuffer, want: &[f32]) {
        assert_eq!(got.len(), want.len());
        for (g, w) in got.as_slice().iter().zip(want) {
            assert!((g - w).abs() < 1e-5, "got {:?} want {:?}", got.as_slice(), want);
        }
    }

    #[test]
    fn identity_leaves_points_in_place() {
        let input = buffer(&[1.0, 2.0, 3.0, -4.0, 5.5, 0.0]);
        let out = transform_points(&Transform3D::identity(), &input);
        assert_close(&out, input.as_slice());
    }

    #[test]
    fn matches_per_point_quaternion_rotation() {
        let q = Quaternion::new(0.1, -0.7, 0.3, 0.5).normalized(1e-9).unwrap();
        let t = Transform3D::new(Vec3::new(0.5, -1.0, 2.0), q);
        let input = buffer(&[1.0, 0.0, 0.0, 0.0, 2.0, -3.0, 7.0, 7.0, 7.0]);

        let out = transform_points(&t, &input);
        for (p, o) in input.points().zip(out.points()) {
            let want = t.apply(Vec3::new(p[0].into(), p[1].into(), p[2].into()));
            assert!((o[0] as f64 - want.x).abs() < 1e-5);
            assert!((o[1] as f64 - want.y).abs() < 1e-5);
            assert!((o[2] as f64 - want.z).abs() < 1e-5);
        }
    }

    #[test]
    fn yaw_and_shift() {
        let q90z = Quaternion::new(0.0, 0.0, FRAC_1_SQRT_2, FRAC_1_SQRT_2);
        let t = Transform3D::new(Vec3::new(0.0, 0.0, 1.0), q90z);
        let out = transform_points(&t, &buffer(&[1.0, 0.0, 0.0]));
        assert_close(&out, &[0.0, 1.0, 1.0]);
    }

    #[test]
    fn empty_buffer_stays_empty() {
        let out = transform_points(&Transform3D::identity(), &PointBuffer::default());
        assert!(out.is_empty());
    }

    #[test]
    fn apply_between_resolves_through_graph() {
        let mut graph = FrameGraph::new();
        graph.update(
            [
                EdgeUpdate::new("base_link", "map", Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity())),
                EdgeUpdate::new("sensor", "base_link", Transform3D::new(Vec3::new(0.0, 1.0, 0.0), Quaternion::identity())),
            ],
            false,
        );
        let outcome = apply_between(&graph, "/sensor", "map", buffer(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]));
        assert!(outcome.is_transformed());
        assert_close(outcome.points(), &[1.0, 1.0, 0.0, 2.0, 2.0, 1.0]);
    }

    #[test]
    fn apply_between_passes_through_when_unavailable() {
        let mut graph = FrameGraph::new();
        graph.update(
            [
                EdgeUpdate::new("a", "b", Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity())),
                EdgeUpdate::new("c", "d", Transform3D::new(Vec3::new(0.0, 1.0, 0.0), Quaternion::identity())),
            ],
            false,
        );
        let input = buffer(&[1.0, 2.0, 3.0]);

        let outcome = apply_between(&graph, "a", "c", input.clone());
        assert_eq!(outcome, ApplyOutcome::Passthrough(input.clone()));

        let outcome = apply_between(&graph, "", "b", input.clone());
        assert!(!outcome.is_transformed());
        assert_eq!(outcome.into_points(), input);

        let outcome = apply_between(&graph, "a", "", input.clone());
        assert!(!outcome.is_transformed());
    }
}
