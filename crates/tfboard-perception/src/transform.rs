//! Quaternion and rigid-transform primitives.
//!
//! Everything here is a pure value type. Rotations are stored in `(x, y, z, w)`
//! order to match `geometry_msgs/Quaternion`, and nothing renormalizes them:
//! producers are trusted to hand over unit quaternions.
//!
//! # Example
//!
//! ```rust
//! use tfboard_perception::transform::{Quaternion, Transform3D, Vec3};
//!
//! let t = Transform3D::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::identity());
//! let round_trip = t.compose(t.invert());
//! assert!(round_trip.translation.norm() < 1e-9);
//! ```

use tfboard_types::TransformMsg;

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }

    /// Euclidean length.
    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A rotation quaternion in `(x, y, z, w)` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    /// Create a quaternion. The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Hamilton product `self * rhs`. Not commutative.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Scale to unit length. Returns `None` when the norm is below
    /// `min_norm`, where the direction is meaningless.
    pub fn normalized(self, min_norm: f64) -> Option<Self> {
        let n = self.norm();
        if n.is_nan() || n < min_norm {
            return None;
        }
        Some(Self::new(self.x / n, self.y / n, self.z / n, self.w / n))
    }

    /// Rotate a vector by this quaternion: p' = q * (v, 0) * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(v.x, v.y, v.z, 0.0);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform: rotation followed by translation.
///
/// Applied to a point `p` it yields `rotation.rotate(p) + translation`. An
/// edge `child → parent` stores the transform that maps child coordinates
/// into parent coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Compose two transforms: `other` applied first, then `self`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// The transform that undoes `self`.
    pub fn invert(self) -> Self {
        let rotation = self.rotation.conjugate();
        Self::new(rotation.rotate(self.translation).neg(), rotation)
    }

    /// Map a single point through this transform.
    pub fn apply(self, p: Vec3) -> Vec3 {
        self.rotation.rotate(p).add(self.translation)
    }

    /// Whether this is the identity within `eps` per component.
    ///
    /// `q` and `-q` describe the same rotation, so both signs of `w` count.
    pub fn is_identity(self, eps: f64) -> bool {
        let q = self.rotation;
        self.translation.norm() <= eps
            && q.x.abs() <= eps
            && q.y.abs() <= eps
            && q.z.abs() <= eps
            && (q.w.abs() - 1.0).abs() <= eps
    }

    /// Rotation as `[x, y, z, w]`.
    pub fn rotation_array(self) -> [f64; 4] {
        [self.rotation.x, self.rotation.y, self.rotation.z, self.rotation.w]
    }

    /// Translation as `[x, y, z]`.
    pub fn translation_array(self) -> [f64; 3] {
        [self.translation.x, self.translation.y, self.translation.z]
    }
}

impl From<&TransformMsg> for Transform3D {
    /// Take the wire values verbatim.
    fn from(msg: &TransformMsg) -> Self {
        let t = msg.translation;
        let r = msg.rotation;
        Self::new(Vec3::new(t.x, t.y, t.z), Quaternion::new(r.x, r.y, r.z, r.w))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn q90z() -> Quaternion {
        Quaternion::new(0.0, 0.0, FRAC_1_SQRT_2, FRAC_1_SQRT_2)
    }

    /// Some unit quaternions and arbitrary transforms to sweep over.
    fn sample_rotations() -> Vec<Quaternion> {
        let raw = [
            (0.0, 0.0, 0.0, 1.0),
            (1.0, 0.0, 0.0, 0.0),
            (0.0, 0.0, FRAC_1_SQRT_2, FRAC_1_SQRT_2),
            (0.1, -0.7, 0.3, 0.5),
            (-0.9, 0.2, 0.2, -0.3),
            (0.5, 0.5, 0.5, 0.5),
        ];
        raw.iter()
            .map(|&(x, y, z, w)| Quaternion::new(x, y, z, w).normalized(1e-9).unwrap())
            .collect()
    }

    // ── Quaternion ──────────────────────────────────────────────────────────

    #[test]
    fn quaternion_90deg_yaw_rotates_x_to_y() {
        let r = q90z().rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(r.x.abs() < 1e-5, "x should be ~0, got {}", r.x);
        assert!((r.y - 1.0).abs() < 1e-5, "y should be ~1, got {}", r.y);
        assert!(r.z.abs() < 1e-5);
    }

    #[test]
    fn quaternion_conjugate_is_inverse() {
        let prod = q90z().mul(q90z().conjugate());
        assert!((prod.w - 1.0).abs() < 1e-5);
        assert!(prod.x.abs() < 1e-5);
        assert!(prod.y.abs() < 1e-5);
        assert!(prod.z.abs() < 1e-5);
    }

    #[test]
    fn quaternion_product_is_not_commutative() {
        let qx = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let ab = qx.mul(q90z());
        let ba = q90z().mul(qx);
        assert!((ab.x - ba.x).abs() > 1e-3 || (ab.y - ba.y).abs() > 1e-3 || (ab.z - ba.z).abs() > 1e-3);
    }

    #[test]
    fn rotate_preserves_norm_for_unit_quaternions() {
        let vectors = [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-3.0, 4.0, 12.0),
            Vec3::new(0.25, -0.5, 8.0),
        ];
        for q in sample_rotations() {
            for v in vectors {
                let r = q.rotate(v);
                assert!((r.norm() - v.norm()).abs() < 1e-5, "q={q:?} v={v:?}");
            }
        }
    }

    #[test]
    fn normalized_rejects_degenerate_quaternion() {
        assert!(Quaternion::new(0.0, 0.0, 0.0, 0.0).normalized(1e-3).is_none());
        let q = Quaternion::new(0.0, 0.0, 0.0, 2.0).normalized(1e-3).unwrap();
        assert!((q.w - 1.0).abs() < 1e-12);
    }

    // ── Transform3D ─────────────────────────────────────────────────────────

    #[test]
    fn identity_is_neutral_and_shifts_only_translate() {
        let shift = Vec3::new(-0.5, 2.0, 7.0);
        let pure_shift = Transform3D::new(shift, Quaternion::identity());
        for (i, q) in sample_rotations().into_iter().enumerate() {
            let t = Transform3D::new(Vec3::new(i as f64, 1.5, -0.25 * i as f64), q);
            assert!(Transform3D::identity().compose(t).compose(t.invert()).is_identity(1e-9), "t={t:?}");
            assert!(t.compose(Transform3D::identity()).compose(t.invert()).is_identity(1e-9), "t={t:?}");

            let v = Vec3::new(3.0, -1.0, 0.5 * i as f64);
            let r = Quaternion::identity().rotate(v);
            assert!((r.x - v.x).abs() < 1e-12 && (r.y - v.y).abs() < 1e-12 && (r.z - v.z).abs() < 1e-12);

            let moved = pure_shift.compose(t);
            let want = t.translation.add(shift);
            assert!((moved.translation.x - want.x).abs() < 1e-9, "t={t:?}");
            assert!((moved.translation.y - want.y).abs() < 1e-9, "t={t:?}");
            assert!((moved.translation.z - want.z).abs() < 1e-9, "t={t:?}");
            assert_eq!(moved.rotation, t.rotation);
        }
    }

    #[test]
    fn compose_applies_right_operand_first() {
        // Rotate 90° about Z after shifting 1 m along X: the shift ends up on +Y.
        let rot = Transform3D::new(Vec3::zero(), q90z());
        let shift = Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity());
        let t = rot.compose(shift);
        assert!(t.translation.x.abs() < 1e-5);
        assert!((t.translation.y - 1.0).abs() < 1e-5);

        let p = t.apply(Vec3::zero());
        let expected = rot.apply(shift.apply(Vec3::zero()));
        assert!((p.x - expected.x).abs() < 1e-9 && (p.y - expected.y).abs() < 1e-9);
    }

    #[test]
    fn compose_with_inverse_is_identity() {
        for (i, q) in sample_rotations().into_iter().enumerate() {
            let t = Transform3D::new(Vec3::new(i as f64, -2.5, 0.75 * i as f64), q);
            assert!(t.compose(t.invert()).is_identity(1e-5), "t={t:?}");
            assert!(t.invert().compose(t).is_identity(1e-5), "t={t:?}");
        }
    }

    #[test]
    fn compose_is_associative() {
        let rs = sample_rotations();
        let a = Transform3D::new(Vec3::new(1.0, 0.0, 0.0), rs[2]);
        let b = Transform3D::new(Vec3::new(0.0, 2.0, -1.0), rs[3]);
        let c = Transform3D::new(Vec3::new(-1.0, 0.5, 4.0), rs[4]);
        let left = a.compose(b).compose(c);
        let right = a.compose(b.compose(c));
        let diff = left.compose(right.invert());
        assert!(diff.is_identity(1e-9));
    }

    #[test]
    fn from_wire_transform() {
        let msg = TransformMsg::default();
        assert_eq!(Transform3D::from(&msg), Transform3D::identity());
    }
}
