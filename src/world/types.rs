/*!
Core world types and math aliases shared by the world and character submodules.

This module intentionally contains no algorithms. It defines the data types
exchanged between:
- the body store (identifiers, motion types, opaque per-body data)
- the query layer (planes, hit data)
- the character controller (contact planes, supporting-contact math)

Notes
- Units are meters, seconds, kilograms. All math uses nalgebra.
- Favor practical world-space tolerances over machine epsilon for robust
  behavior (see `character::settings`).
*/

use nalgebra as na;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// Identifier of a body inside a [`BodySet`](crate::world::BodySet).
///
/// Ids are dense indices; a removed body leaves a tombstone so its id is
/// never reused within the lifetime of the set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyId(pub u32);

/// Identifier of a sub-shape within a body's collision shape.
///
/// For simple shapes this is always `0`; compound shapes report the index of
/// the part that produced the contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubShapeId(pub u32);

/// Opaque material tag carried through contacts for the embedder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaterialId(pub u32);

/// How a body participates in the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionType {
    /// Never moves.
    Static,
    /// Moved by position/velocity updates, not by impulses.
    Kinematic,
    /// Fully simulated; can receive impulses from the character.
    Dynamic,
}

impl MotionType {
    /// Dominance rank used when the constraint solver breaks ties between
    /// simultaneous contacts: immovable geometry must win over bodies the
    /// character could push out of the way.
    #[inline]
    pub fn solver_rank(self) -> u8 {
        match self {
            MotionType::Static => 2,
            MotionType::Kinematic => 1,
            MotionType::Dynamic => 0,
        }
    }
}

/// A plane in constraint form: `normal ⋅ x + constant = 0`.
///
/// The constant is a signed offset, so a contact plane built from a contact
/// normal and a signed contact distance reports that distance at the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    /// Unit normal of the plane.
    pub normal: Vec3,
    /// Signed offset along the normal.
    pub constant: f32,
}

impl Plane {
    #[inline]
    pub fn new(normal: Vec3, constant: f32) -> Self {
        Self { normal, constant }
    }

    /// Signed distance from `point` to the plane (positive on the normal side).
    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.constant
    }
}

/// Normalize `v`, or return zero when its length collapses below a practical
/// world-space tolerance. Callers treat a zero result as "no direction".
#[inline]
pub fn normalize_or_zero(v: Vec3) -> Vec3 {
    let len_sq = v.norm_squared();
    if len_sq > 1.0e-12 {
        v / len_sq.sqrt()
    } else {
        Vec3::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_signed_distance() {
        let plane = Plane::new(Vec3::new(0.0, 1.0, 0.0), -2.0);
        assert!((plane.signed_distance(Vec3::new(0.0, 5.0, 0.0)) - 3.0).abs() < 1.0e-6);
        assert!((plane.signed_distance(Vec3::new(1.0, 2.0, -4.0))).abs() < 1.0e-6);
    }

    #[test]
    fn degenerate_direction_collapses_to_zero() {
        assert_eq!(normalize_or_zero(Vec3::zeros()), Vec3::zeros());
        let n = normalize_or_zero(Vec3::new(3.0, 0.0, 4.0));
        assert!((n.norm() - 1.0).abs() < 1.0e-6);
    }
}
