//! Thin wrappers over parry3d narrow-phase queries.
//!
//! Two query paths feed the character controller:
//! - [`collide_shape`]: contact manifolds within a maximum separation
//!   distance, one hit per manifold at its deepest point. Used for contact
//!   discovery around a candidate position.
//! - [`cast_shape`]: earliest time-of-impact per body along a displacement.
//!   Used to verify that a solved displacement is actually unobstructed.
//!
//! Both paths lock each candidate body once, apply the query filter and a
//! coarse AABB rejection under that lock, and hand hits to a
//! [`ShapeHitConsumer`]. Shape pairings parry cannot evaluate are treated as
//! "no contact".

use log::debug;
use parry3d::query::{self, ContactManifold, DefaultQueryDispatcher, PersistentQueryDispatcher};
use parry3d::shape::Shape;

use super::body::{Body, BodySet};
use super::broad::{aabb_inflate, aabb_intersects, swept_shape_aabb};
use super::filter::QueryFilter;
use super::types::{BodyId, Iso, SubShapeId, Vec3};

/// Geometric data for a single hit, before it is turned into a contact.
#[derive(Clone, Copy, Debug)]
pub struct ShapeHit {
    /// Body that was hit.
    pub body_id: BodyId,
    /// Sub-shape of the body that was hit.
    pub sub_shape_id: SubShapeId,
    /// World-space contact point on the hit body.
    pub position: Vec3,
    /// World-space axis pointing from the query shape into the hit body.
    /// Not guaranteed to be unit length; a collapsed axis means the
    /// penetration direction is undefined.
    pub penetration_axis: Vec3,
    /// Signed distance between the shapes: negative when penetrating.
    /// Always zero for swept hits (the shapes touch at the time of impact).
    pub distance: f32,
    /// Fraction along the displacement where the hit occurs. Zero for
    /// overlap hits.
    pub fraction: f32,
}

/// Consumer of query hits. The body is locked for the duration of the call,
/// so implementations can read its velocity and properties consistently.
///
/// Returning `false` aborts the query early.
pub trait ShapeHitConsumer {
    fn on_hit(&mut self, hit: &ShapeHit, body: &Body) -> bool;
}

/// Find all bodies whose shapes are within `max_separation` of `shape` at
/// `transform` and report one hit per contact manifold.
pub fn collide_shape(
    bodies: &BodySet,
    shape: &dyn Shape,
    transform: &Iso,
    max_separation: f32,
    filter: &QueryFilter,
    consumer: &mut dyn ShapeHitConsumer,
) {
    let dispatcher = DefaultQueryDispatcher;
    let query_aabb = aabb_inflate(&shape.compute_aabb(transform), max_separation);

    for id in bodies.ids() {
        let keep_going = bodies
            .read(id, |body| {
                if !filter.test(id, body.layers()) {
                    return true;
                }
                let body_aabb = body.shape().compute_aabb(body.pose());
                if !aabb_intersects(&query_aabb, &body_aabb) {
                    return true;
                }

                let pos12 = transform.inv_mul(body.pose());
                let mut manifolds: Vec<ContactManifold<(), ()>> = Vec::new();
                let mut workspace = None;
                if let Err(unsupported) = dispatcher.contact_manifolds(
                    &pos12,
                    shape,
                    &**body.shape(),
                    max_separation,
                    &mut manifolds,
                    &mut workspace,
                ) {
                    debug!("skipping unsupported shape pairing: {unsupported}");
                    return true;
                }

                for manifold in &manifolds {
                    let Some(deepest) = manifold.find_deepest_contact() else {
                        continue;
                    };
                    let axis_local = manifold
                        .subshape_pos1
                        .map(|p| p * manifold.local_n1)
                        .unwrap_or(manifold.local_n1);
                    let point_local = manifold
                        .subshape_pos2
                        .map(|p| p.transform_point(&deepest.local_p2))
                        .unwrap_or(deepest.local_p2);
                    let hit = ShapeHit {
                        body_id: id,
                        sub_shape_id: SubShapeId(manifold.subshape2),
                        position: body.pose().transform_point(&point_local).coords,
                        penetration_axis: transform * axis_local,
                        distance: deepest.dist,
                        fraction: 0.0,
                    };
                    if !consumer.on_hit(&hit, body) {
                        return false;
                    }
                }
                true
            })
            .unwrap_or(true);
        if !keep_going {
            return;
        }
    }
}

/// Sweep `shape` from `transform` along `displacement` and report the
/// earliest hit per body.
pub fn cast_shape(
    bodies: &BodySet,
    shape: &dyn Shape,
    transform: &Iso,
    displacement: Vec3,
    filter: &QueryFilter,
    consumer: &mut dyn ShapeHitConsumer,
) {
    let swept = swept_shape_aabb(shape, transform, displacement, 0.0);

    for id in bodies.ids() {
        let keep_going = bodies
            .read(id, |body| {
                if !filter.test(id, body.layers()) {
                    return true;
                }
                let body_aabb = body.shape().compute_aabb(body.pose());
                if !aabb_intersects(&swept, &body_aabb) {
                    return true;
                }

                match query::time_of_impact(
                    transform,
                    &displacement,
                    shape,
                    body.pose(),
                    &Vec3::zeros(),
                    &**body.shape(),
                    1.0,
                    true,
                ) {
                    Ok(Some(hit)) => {
                        let shape_hit = ShapeHit {
                            body_id: id,
                            sub_shape_id: SubShapeId(0),
                            position: body.pose().transform_point(&hit.witness2).coords,
                            penetration_axis: transform * hit.normal1.into_inner(),
                            distance: 0.0,
                            fraction: hit.toi,
                        };
                        consumer.on_hit(&shape_hit, body)
                    }
                    Ok(None) => true,
                    Err(unsupported) => {
                        debug!("skipping unsupported shape cast: {unsupported}");
                        true
                    }
                }
            })
            .unwrap_or(true);
        if !keep_going {
            return;
        }
    }
}
