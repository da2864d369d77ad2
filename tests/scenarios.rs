//! End-to-end scenarios: a character stepped against small worlds built from
//! half-spaces and boxes.
//!
//! Characters here are spheres, so the character origin is the sphere
//! center; surfaces are placed so the sphere starts just inside the
//! predictive contact distance where a scenario needs a starting contact.

use approx::assert_relative_eq;
use kinematic_character::prelude::*;
use nalgebra as na;
use parry3d::shape::SharedShape;

type Vec3 = na::Vector3<f32>;
type Iso = na::Isometry3<f32>;

const DT: f32 = 1.0 / 60.0;
const RADIUS: f32 = 0.5;
/// Start surfaces this far from the character: inside the predictive
/// contact distance (0.01), slightly under the padding (0.005) so the
/// padded contact reads as a tiny penetration.
const START_GAP: f32 = 0.004;

fn character_at(position: Vec3) -> VirtualCharacter {
    let mut settings = CharacterSettings::new(SharedShape::ball(RADIUS));
    settings.max_slope_angle = 45.0_f32.to_radians();
    settings.max_strength = 1000.0;
    settings.mass = 80.0;
    VirtualCharacter::new(settings, position, na::UnitQuaternion::identity())
}

/// A fixed half-space whose boundary passes through `point`.
fn halfspace(normal: Vec3, point: Vec3) -> Body {
    Body::fixed(
        SharedShape::halfspace(na::Unit::new_normalize(normal)),
        Iso::translation(point.x, point.y, point.z),
    )
}

#[test]
fn rests_on_flat_ground() {
    let mut bodies = BodySet::new();
    bodies.insert(halfspace(Vec3::y(), Vec3::zeros()));

    let start = Vec3::new(0.0, RADIUS + START_GAP, 0.0);
    let mut character = character_at(start);
    character.update(&bodies, DT, Vec3::new(0.0, -9.81, 0.0), &QueryFilter::new());

    assert!((character.position() - start).norm() < 0.01);
    assert_eq!(character.ground_state(), GroundState::OnGround);
    let support = character.supporting_contact().expect("standing on the plane");
    assert_relative_eq!(support.normal.y, 1.0, epsilon = 1.0e-3);
}

#[test]
fn walking_into_a_wall_stops_at_the_padding() {
    let mut bodies = BodySet::new();
    // Wall occupying x >= 0.
    bodies.insert(halfspace(Vec3::new(-1.0, 0.0, 0.0), Vec3::zeros()));

    let mut character = character_at(Vec3::new(-1.0, 0.5, 0.0));
    character.set_linear_velocity(Vec3::new(10.0, 0.0, 0.0));
    let speed_in = character.linear_velocity().norm();

    character.update(&bodies, 0.1, Vec3::zeros(), &QueryFilter::new());

    // Stopped short of the wall, sphere surface a padding away.
    let padding = character.tuning().character_padding;
    assert!(character.position().x <= -RADIUS - padding + 1.0e-3);
    assert_relative_eq!(character.position().z, 0.0, epsilon = 1.0e-4);
    // The solver never adds energy.
    assert!(character.linear_velocity().norm() <= speed_in + 1.0e-3);

    // The next update starts against the wall: the x velocity dies entirely.
    character.update(&bodies, 0.1, Vec3::zeros(), &QueryFilter::new());
    assert_relative_eq!(character.linear_velocity().x, 0.0, epsilon = 1.0e-2);
    assert_relative_eq!(character.linear_velocity().z, 0.0, epsilon = 1.0e-3);
    assert!(character.position().x <= -RADIUS - padding + 1.0e-3);
}

#[test]
fn climbs_a_walkable_ramp() {
    // 30 degree ramp rising toward +x; walkable with a 45 degree limit.
    let normal = Vec3::new(-(30.0_f32.to_radians().sin()), 30.0_f32.to_radians().cos(), 0.0);
    let mut bodies = BodySet::new();
    bodies.insert(halfspace(normal, Vec3::zeros()));

    let start = normal * (RADIUS + START_GAP);
    let mut character = character_at(start);
    character.set_linear_velocity(Vec3::new(5.0, 0.0, 0.0));
    character.update(&bodies, 0.1, Vec3::new(0.0, -9.81, 0.0), &QueryFilter::new());

    // The velocity was redirected up the slope.
    assert!(character.linear_velocity().y > 0.5);
    assert!(character.position().x > start.x + 0.1);
    assert!(character.position().y > start.y + 0.05);
    assert_eq!(character.ground_state(), GroundState::OnGround);
}

#[test]
fn blocked_by_an_unwalkable_slope() {
    // 60 degree ramp rising toward +x; too steep for a 45 degree limit.
    let normal = Vec3::new(-(60.0_f32.to_radians().sin()), 60.0_f32.to_radians().cos(), 0.0);
    let mut bodies = BodySet::new();
    bodies.insert(halfspace(normal, Vec3::zeros()));

    let start = normal * (RADIUS + START_GAP);
    let mut character = character_at(start);
    character.set_linear_velocity(Vec3::new(5.0, 0.0, 0.0));
    character.update(&bodies, 0.1, Vec3::new(0.0, -9.81, 0.0), &QueryFilter::new());

    // The horizontal blocking plane holds the character back instead of
    // letting it ride up the slope.
    assert!(character.position().y < start.y + 0.01);
    assert!(character.linear_velocity().norm() < 0.5);
    assert_eq!(character.ground_state(), GroundState::Sliding);
}

#[test]
fn slides_along_the_crease_of_two_walls() {
    let mut bodies = BodySet::new();
    // Perpendicular walls occupying x >= 0 and z >= 0.
    bodies.insert(halfspace(Vec3::new(-1.0, 0.0, 0.0), Vec3::zeros()));
    bodies.insert(halfspace(Vec3::new(0.0, 0.0, -1.0), Vec3::zeros()));

    let start = Vec3::new(-(RADIUS + START_GAP), 0.0, -(RADIUS + START_GAP));
    let mut character = character_at(start);
    // Push diagonally into the corner, with an upward component along the
    // crease.
    character.set_linear_velocity(Vec3::new(3.0, 2.0, 3.0));
    character.update(&bodies, 0.1, Vec3::zeros(), &QueryFilter::new());

    // Only the crease-aligned (vertical) component survives.
    assert_relative_eq!(character.linear_velocity().x, 0.0, epsilon = 1.0e-2);
    assert_relative_eq!(character.linear_velocity().z, 0.0, epsilon = 1.0e-2);
    assert_relative_eq!(character.linear_velocity().y, 2.0, epsilon = 1.0e-1);
    assert_relative_eq!(character.position().y, start.y + 0.2, epsilon = 1.0e-2);
    // Still clear of both walls.
    assert!(character.position().x <= start.x + 1.0e-3);
    assert!(character.position().z <= start.z + 1.0e-3);
}

#[test]
fn pushes_a_dynamic_crate() {
    let mut bodies = BodySet::new();
    // A 1 m cube of mass 10 kg directly ahead, its face a starting gap away
    // from the sphere surface.
    let crate_id = bodies.insert(Body::dynamic(
        SharedShape::cuboid(0.5, 0.5, 0.5),
        Iso::translation(RADIUS + START_GAP + 0.5, 0.0, 0.0),
        10.0,
    ));

    let mut character = character_at(Vec3::zeros());
    character.set_linear_velocity(Vec3::new(3.0, 0.0, 0.0));
    character.update(&bodies, DT, Vec3::zeros(), &QueryFilter::new());

    let crate_velocity = bodies
        .read(crate_id, |body| body.linear_velocity())
        .expect("crate still exists");
    // The crate was pushed forward, but no harder than the character's
    // strength allows: |impulse| <= max_strength * dt.
    let max_speed_gain = character.max_strength() * DT / 10.0;
    assert!(crate_velocity.x > 0.0);
    assert!(crate_velocity.x <= max_speed_gain + 1.0e-3);
    // The character's own advance was cut short by the blocking crate.
    assert!(character.position().x < 0.01);
}

#[test]
fn listener_can_veto_contacts() {
    struct IgnoreEverything;

    impl CharacterContactListener for IgnoreEverything {
        fn on_contact_validate(&self, _body: BodyId, _sub_shape: SubShapeId) -> bool {
            false
        }
    }

    let mut bodies = BodySet::new();
    bodies.insert(halfspace(Vec3::new(-1.0, 0.0, 0.0), Vec3::zeros()));

    let mut character = character_at(Vec3::new(-1.0, 0.0, 0.0));
    character.set_listener(Some(Box::new(IgnoreEverything)));
    character.set_linear_velocity(Vec3::new(10.0, 0.0, 0.0));
    character.update(&bodies, 0.1, Vec3::zeros(), &QueryFilter::new());

    // With every contact vetoed the wall does not exist for the character.
    assert!(character.position().x > -0.1);
}

#[test]
fn refresh_contacts_is_idempotent() {
    let mut bodies = BodySet::new();
    bodies.insert(halfspace(Vec3::y(), Vec3::zeros()));

    let mut character = character_at(Vec3::new(0.0, RADIUS + START_GAP, 0.0));
    character.refresh_contacts(&bodies, &QueryFilter::new());
    let first = character.active_contacts().to_vec();
    assert_eq!(first.len(), 1);

    character.refresh_contacts(&bodies, &QueryFilter::new());
    assert_eq!(character.active_contacts(), first.as_slice());
}

#[test]
fn set_shape_to_the_current_shape_is_a_no_op() {
    let mut bodies = BodySet::new();
    bodies.insert(halfspace(Vec3::y(), Vec3::zeros()));

    let mut character = character_at(Vec3::new(0.0, RADIUS + START_GAP, 0.0));
    character.refresh_contacts(&bodies, &QueryFilter::new());
    let before = character.active_contacts().to_vec();

    let same = character.shape().clone();
    assert!(character.set_shape(&bodies, &same, 0.01, &QueryFilter::new()));
    assert_eq!(character.active_contacts(), before.as_slice());
}

#[test]
fn set_shape_refuses_an_overlapping_shape() {
    let mut bodies = BodySet::new();
    bodies.insert(halfspace(Vec3::y(), Vec3::zeros()));

    let mut character = character_at(Vec3::new(0.0, RADIUS + START_GAP, 0.0));
    let original = character.shape().clone();

    // Doubling the radius would bury the sphere half a meter deep.
    let bigger = SharedShape::ball(RADIUS * 2.0);
    assert!(!character.set_shape(&bodies, &bigger, 0.01, &QueryFilter::new()));
    // The character keeps its old shape.
    assert!(std::sync::Arc::ptr_eq(&character.shape().0, &original.0));

    // An unbounded penetration allowance skips the check entirely.
    assert!(character.set_shape(&bodies, &bigger, f32::INFINITY, &QueryFilter::new()));
    assert!(std::sync::Arc::ptr_eq(&character.shape().0, &bigger.0));
}

#[test]
fn query_filter_hides_bodies_from_the_character() {
    let mut bodies = BodySet::new();
    let wall = bodies.insert(halfspace(Vec3::new(-1.0, 0.0, 0.0), Vec3::zeros()));

    let mut character = character_at(Vec3::new(-1.0, 0.0, 0.0));
    character.set_linear_velocity(Vec3::new(10.0, 0.0, 0.0));
    character.update(&bodies, 0.1, Vec3::zeros(), &QueryFilter::new().exclude(wall));

    assert_relative_eq!(character.position().x, 0.0, epsilon = 1.0e-4);
}

#[test]
fn removed_body_is_silently_skipped() {
    let mut bodies = BodySet::new();
    let wall = bodies.insert(halfspace(Vec3::new(-1.0, 0.0, 0.0), Vec3::zeros()));
    bodies.remove(wall);

    let mut character = character_at(Vec3::new(-1.0, 0.0, 0.0));
    character.set_linear_velocity(Vec3::new(10.0, 0.0, 0.0));
    character.update(&bodies, 0.1, Vec3::zeros(), &QueryFilter::new());

    assert_relative_eq!(character.position().x, 0.0, epsilon = 1.0e-4);
}
