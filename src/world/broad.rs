//! Broad-phase helpers: swept AABBs and coarse overlap rejection.
//!
//! Queries prune candidate bodies with world-space AABB tests inside the same
//! read lock that the narrow phase uses, so a body is never locked twice per
//! hit. Half-spaces have unbounded AABBs and always pass the coarse test.

use nalgebra as na;
use parry3d::bounding_volume::Aabb;
use parry3d::shape::Shape;

use super::types::{Iso, Vec3};

/// Compute the AABB of a shape swept from `transform` along `displacement`,
/// inflated by `margin` to conservatively include near misses.
pub fn swept_shape_aabb(shape: &dyn Shape, transform: &Iso, displacement: Vec3, margin: f32) -> Aabb {
    let start = shape.compute_aabb(transform);
    let mut end_transform = *transform;
    end_transform.translation.vector += displacement;
    let end = shape.compute_aabb(&end_transform);

    let mut swept = aabb_union(&start, &end);
    if margin > 0.0 {
        swept = aabb_inflate(&swept, margin);
    }
    swept
}

/// Compute the union of two AABBs.
pub fn aabb_union(a: &Aabb, b: &Aabb) -> Aabb {
    Aabb {
        mins: na::Point3::new(
            a.mins.x.min(b.mins.x),
            a.mins.y.min(b.mins.y),
            a.mins.z.min(b.mins.z),
        ),
        maxs: na::Point3::new(
            a.maxs.x.max(b.maxs.x),
            a.maxs.y.max(b.maxs.y),
            a.maxs.z.max(b.maxs.z),
        ),
    }
}

/// Inflate an AABB by `margin` on all sides.
pub fn aabb_inflate(a: &Aabb, margin: f32) -> Aabb {
    if margin <= 0.0 {
        return *a;
    }
    let delta = Vec3::new(margin, margin, margin);
    Aabb {
        mins: a.mins - delta,
        maxs: a.maxs + delta,
    }
}

/// Test two AABBs for intersection.
#[inline]
pub fn aabb_intersects(a: &Aabb, b: &Aabb) -> bool {
    !(a.maxs.x < b.mins.x
        || a.mins.x > b.maxs.x
        || a.maxs.y < b.mins.y
        || a.mins.y > b.maxs.y
        || a.maxs.z < b.mins.z
        || a.mins.z > b.maxs.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parry3d::shape::SharedShape;

    #[test]
    fn swept_aabb_covers_both_endpoints() {
        let ball = SharedShape::ball(0.5);
        let start = Iso::translation(0.0, 0.0, 0.0);
        let swept = swept_shape_aabb(&*ball, &start, Vec3::new(3.0, 0.0, 0.0), 0.1);
        assert!(swept.mins.x <= -0.6 && swept.maxs.x >= 3.6);
        assert!(swept.mins.y <= -0.6 && swept.maxs.y >= 0.6);
    }
}
