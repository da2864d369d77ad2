//! Planar velocity constraints and the time-of-impact ordered slide solver.
//!
//! Contacts become half-space constraints with an associated contact
//! velocity. The solver repeatedly finds the constraint with the earliest
//! time of impact, advances to it, projects the velocity into its plane, and
//! slides along the crease when two planes fight over the direction.

use log::debug;

use super::contact::Contact;
use super::listener::ContactSettings;
use super::settings::SolverTuning;
use crate::world::{normalize_or_zero, Plane, Vec3};

/// Below this approach speed (m/s) a plane is treated as stationary or
/// receding and never produces an impact.
const MIN_PROJECTED_VELOCITY: f32 = 1.0e-6;

/// Penetration (meters) the move may add to a plane without registering an
/// impact.
const ACCEPTABLE_PENETRATION: f32 = 1.0e-4;

/// A time of impact above this (seconds) counts as significant movement and
/// invalidates the remembered contact planes.
const SIGNIFICANT_TOI: f32 = 1.0e-4;

/// Squared speed (m^2/s^2) below which the solver considers the character
/// stopped.
const MIN_SOLVER_VELOCITY_SQ: f32 = 1.0e-8;

/// A slope limit cosine this close to 1 disables the limit entirely.
const SLOPE_LIMIT_DISABLED: f32 = 0.999;

/// A planar velocity constraint derived from a contact.
///
/// `contact` indexes into the move iteration's contact vector; constraints
/// never outlive it. `projected_velocity` and `toi` are scratch values
/// recomputed every solver iteration.
#[derive(Clone, Debug)]
pub(crate) struct Constraint {
    /// Index of the originating contact.
    pub contact: usize,
    /// Contact velocity used for this constraint; may be a projection of the
    /// contact's real velocity (see the steep-slope constraint).
    pub linear_velocity: Vec3,
    /// The half-space the character must not violate.
    pub plane: Plane,
    /// Approach speed of the plane along its normal. Scratch.
    pub projected_velocity: f32,
    /// Time of impact against the plane. Scratch.
    pub toi: f32,
}

impl Constraint {
    fn new(contact: usize, linear_velocity: Vec3, plane: Plane) -> Self {
        Self {
            contact,
            linear_velocity,
            plane,
            projected_velocity: 0.0,
            toi: 0.0,
        }
    }
}

/// Convert contacts to constraints.
///
/// Penetrating contacts get a recovery term added to their velocity so the
/// solver pushes the character out over time instead of snapping. Contacts
/// the character is already moving away from produce no constraint. A
/// too-steep walkable-direction contact produces a second constraint that
/// blocks horizontal motion into the slope, which is what makes the
/// character slide down instead of climbing.
pub(crate) fn determine_constraints(
    character_velocity: Vec3,
    cos_max_slope_angle: f32,
    penetration_recovery_speed: f32,
    contacts: &[Contact],
    constraints: &mut Vec<Constraint>,
) {
    for (index, contact) in contacts.iter().enumerate() {
        let mut contact_velocity = contact.linear_velocity;
        if contact.distance < 0.0 {
            contact_velocity -= contact.normal * (contact.distance * penetration_recovery_speed);
        }

        let relative_velocity = character_velocity - contact_velocity;
        if contact.normal.dot(&relative_velocity) >= 0.0 {
            continue;
        }

        constraints.push(Constraint::new(
            index,
            contact_velocity,
            Plane::new(contact.normal, contact.distance),
        ));

        if cos_max_slope_angle < SLOPE_LIMIT_DISABLED
            && contact.normal.y >= 0.0
            && contact.normal.y < cos_max_slope_angle
        {
            let horizontal =
                normalize_or_zero(Vec3::new(contact.normal.x, 0.0, contact.normal.z));
            if horizontal != Vec3::zeros() {
                // Project the contact velocity on the horizontal normal so
                // both planes push at an equal rate, and stretch the plane
                // distance to where horizontal travel meets the slope.
                constraints.push(Constraint::new(
                    index,
                    horizontal * contact_velocity.dot(&horizontal),
                    Plane::new(horizontal, contact.distance / horizontal.dot(&contact.normal)),
                ));
            }
        }
    }
}

/// Output of [`solve_constraints`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct SolveResult {
    /// Displacement the character may take this iteration.
    pub displacement: Vec3,
    /// Portion of the remaining time that displacement consumes.
    pub time_simulated: f32,
}

/// Slide the character through the constraint set for up to `time_remaining`
/// seconds.
///
/// `handle_first_collision` runs the first time a contact is actually hit
/// (listener callbacks, impulse transfer); returning `None` discards the
/// contact for the rest of the update.
pub(crate) fn solve_constraints(
    character_velocity: Vec3,
    mut time_remaining: f32,
    tuning: &SolverTuning,
    contacts: &mut [Contact],
    constraints: &mut [Constraint],
    handle_first_collision: &mut dyn FnMut(Vec3, &Contact) -> Option<ContactSettings>,
) -> SolveResult {
    let mut displacement = Vec3::zeros();
    let mut time_simulated = 0.0;

    if constraints.is_empty() {
        return SolveResult {
            displacement: character_velocity * time_remaining,
            time_simulated: time_remaining,
        };
    }

    let mut velocity = character_velocity;
    let mut sorted: Vec<usize> = (0..constraints.len()).collect();
    let mut previous: Vec<usize> = Vec::with_capacity(tuning.max_constraint_iterations);

    for _ in 0..tuning.max_constraint_iterations {
        // How soon does each plane reach us along the current velocity?
        for constraint in constraints.iter_mut() {
            constraint.projected_velocity = constraint
                .plane
                .normal
                .dot(&(constraint.linear_velocity - velocity));
            if constraint.projected_velocity < MIN_PROJECTED_VELOCITY {
                constraint.toi = f32::MAX;
            } else {
                let dist = constraint.plane.signed_distance(displacement);
                if dist - constraint.projected_velocity * time_remaining > -ACCEPTABLE_PENETRATION {
                    constraint.toi = f32::MAX;
                } else {
                    constraint.toi = (dist / constraint.projected_velocity).max(0.0);
                }
            }
        }

        // Earliest impact first. Simultaneous impacts at t = 0 resolve the
        // fastest-approaching plane first, which also pushes out of the
        // deepest penetration because of the recovery velocity. Immovable
        // geometry wins remaining ties.
        sorted.sort_by(|&a, &b| {
            let ca = &constraints[a];
            let cb = &constraints[b];
            if ca.toi <= 0.0 && cb.toi <= 0.0 {
                return cb
                    .projected_velocity
                    .partial_cmp(&ca.projected_velocity)
                    .unwrap_or(std::cmp::Ordering::Equal);
            }
            if ca.toi != cb.toi {
                return ca
                    .toi
                    .partial_cmp(&cb.toi)
                    .unwrap_or(std::cmp::Ordering::Equal);
            }
            let rank_a = contacts[ca.contact].motion_type.solver_rank();
            let rank_b = contacts[cb.contact].motion_type.solver_rank();
            rank_b.cmp(&rank_a)
        });

        // Pick the first constraint we actually collide with.
        let mut picked = None;
        for &ci in &sorted {
            if constraints[ci].toi >= time_remaining {
                break;
            }

            let contact_index = constraints[ci].contact;
            if contacts[contact_index].was_discarded {
                continue;
            }
            if !contacts[contact_index].had_collision {
                match handle_first_collision(velocity, &contacts[contact_index]) {
                    Some(settings) => {
                        contacts[contact_index].had_collision = true;
                        contacts[contact_index].can_push_character = settings.can_push_character;
                    }
                    None => {
                        contacts[contact_index].was_discarded = true;
                        continue;
                    }
                }
            }
            if !contacts[contact_index].can_push_character {
                constraints[ci].linear_velocity = Vec3::zeros();
            }

            picked = Some(ci);
            break;
        }

        // Every blocking plane lies beyond the remaining time or was
        // discarded: the goal is reachable.
        let Some(ci) = picked else {
            displacement += velocity * time_remaining;
            time_simulated += time_remaining;
            return SolveResult {
                displacement,
                time_simulated,
            };
        };

        // Advance to the contact.
        let toi = constraints[ci].toi;
        displacement += velocity * toi;
        time_remaining -= toi;
        time_simulated += toi;
        if time_remaining < tuning.min_time_remaining {
            return SolveResult {
                displacement,
                time_simulated,
            };
        }

        // The remembered planes are stale once we have moved a real
        // distance.
        if toi > SIGNIFICANT_TOI {
            previous.clear();
        }

        let plane_normal = constraints[ci].plane.normal;
        let relative_velocity = velocity - constraints[ci].linear_velocity;
        let new_velocity = velocity - plane_normal * relative_velocity.dot(&plane_normal);

        // Of the planes hit since we last moved, find the one this new
        // velocity violates the most. Near-parallel planes are skipped
        // because their crease direction is degenerate.
        let mut highest_penetration = 0.0;
        let mut other = None;
        for &pi in &previous {
            if pi == ci {
                continue;
            }
            let other_normal = constraints[pi].plane.normal;
            let penetration = (constraints[pi].linear_velocity - new_velocity).dot(&other_normal);
            if penetration > highest_penetration {
                let dot = other_normal.dot(&plane_normal);
                if dot < tuning.crease_parallel_threshold
                    && dot > -tuning.crease_parallel_threshold
                {
                    highest_penetration = penetration;
                    other = Some(pi);
                }
            }
        }

        if let Some(oi) = other {
            // Two planes fight over the direction: slide along their crease.
            let other_normal = constraints[oi].plane.normal;
            let slide_dir = normalize_or_zero(plane_normal.cross(&other_normal));
            let velocity_in_slide_dir = slide_dir * new_velocity.dot(&slide_dir);
            debug!("sliding along the crease between two contact planes");

            // Cancel each constraint's pushing component in the other's
            // plane so the pair stops re-launching the character at each
            // other on the next iterations.
            let cancel = constraints[ci].linear_velocity.dot(&other_normal).min(0.0);
            constraints[ci].linear_velocity -= other_normal * cancel;
            let cancel = constraints[oi].linear_velocity.dot(&plane_normal).min(0.0);
            constraints[oi].linear_velocity -= plane_normal * cancel;

            let perpendicular = constraints[ci].linear_velocity
                - slide_dir * constraints[ci].linear_velocity.dot(&slide_dir);
            let other_perpendicular = constraints[oi].linear_velocity
                - slide_dir * constraints[oi].linear_velocity.dot(&slide_dir);
            velocity = velocity_in_slide_dir + perpendicular + other_perpendicular;
        } else {
            velocity = new_velocity;
        }

        previous.push(ci);

        if velocity.norm_squared() < MIN_SOLVER_VELOCITY_SQ {
            return SolveResult {
                displacement,
                time_simulated,
            };
        }
    }

    SolveResult {
        displacement,
        time_simulated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{BodyId, MaterialId, MotionType, SubShapeId};
    use approx::assert_relative_eq;

    fn contact(normal: Vec3, distance: f32) -> Contact {
        Contact {
            position: Vec3::zeros(),
            linear_velocity: Vec3::zeros(),
            normal,
            distance,
            fraction: 0.0,
            body_id: BodyId(0),
            sub_shape_id: SubShapeId(0),
            motion_type: MotionType::Static,
            material: MaterialId::default(),
            user_data: 0,
            had_collision: false,
            was_discarded: false,
            can_push_character: true,
        }
    }

    fn accept_all(_velocity: Vec3, _contact: &Contact) -> Option<ContactSettings> {
        Some(ContactSettings::default())
    }

    #[test]
    fn receding_contact_produces_no_constraint() {
        let contacts = vec![contact(Vec3::new(-1.0, 0.0, 0.0), 0.0)];
        let mut constraints = Vec::new();
        // Moving away from the wall.
        determine_constraints(Vec3::new(-2.0, 0.0, 0.0), 0.999, 1.0, &contacts, &mut constraints);
        assert!(constraints.is_empty());
    }

    #[test]
    fn penetration_recovery_pushes_out() {
        let contacts = vec![contact(Vec3::new(0.0, 1.0, 0.0), -0.1)];
        let mut constraints = Vec::new();
        determine_constraints(Vec3::zeros(), 0.999, 1.0, &contacts, &mut constraints);
        assert_eq!(constraints.len(), 1);
        // The recovery velocity points out of the penetration, at the depth
        // per second of simulated time.
        assert_relative_eq!(constraints[0].linear_velocity.y, 0.1, epsilon = 1.0e-6);
    }

    #[test]
    fn steep_slope_adds_horizontal_constraint() {
        let normal = Vec3::new(-0.866, 0.5, 0.0);
        let contacts = vec![contact(normal, -0.01)];
        let mut constraints = Vec::new();
        let cos_max = 45.0_f32.to_radians().cos();
        determine_constraints(Vec3::new(5.0, 0.0, 0.0), cos_max, 1.0, &contacts, &mut constraints);

        assert_eq!(constraints.len(), 2);
        let secondary = &constraints[1];
        assert_relative_eq!(secondary.plane.normal.y, 0.0, epsilon = 1.0e-6);
        assert_relative_eq!(secondary.plane.normal.x, -1.0, epsilon = 1.0e-3);
        // The slant distance is stretched onto the horizontal plane.
        assert!(secondary.plane.constant < -0.01);
    }

    #[test]
    fn walkable_slope_adds_single_constraint() {
        let normal = Vec3::new(-0.5, 0.866, 0.0);
        let contacts = vec![contact(normal, -0.01)];
        let mut constraints = Vec::new();
        let cos_max = 45.0_f32.to_radians().cos();
        determine_constraints(Vec3::new(5.0, 0.0, 0.0), cos_max, 1.0, &contacts, &mut constraints);
        assert_eq!(constraints.len(), 1);
    }

    #[test]
    fn no_constraints_reaches_goal() {
        let tuning = SolverTuning::default();
        let result = solve_constraints(
            Vec3::new(1.0, 0.0, 0.0),
            0.25,
            &tuning,
            &mut [],
            &mut [],
            &mut accept_all,
        );
        assert_relative_eq!(result.displacement.x, 0.25, epsilon = 1.0e-6);
        assert_relative_eq!(result.time_simulated, 0.25, epsilon = 1.0e-6);
    }

    #[test]
    fn wall_cancels_normal_velocity() {
        let tuning = SolverTuning::default();
        let mut contacts = vec![contact(Vec3::new(-1.0, 0.0, 0.0), 0.0)];
        let mut constraints = Vec::new();
        let velocity = Vec3::new(10.0, 0.0, 2.0);
        determine_constraints(velocity, 0.999, 1.0, &contacts, &mut constraints);

        let result = solve_constraints(
            velocity,
            0.1,
            &tuning,
            &mut contacts,
            &mut constraints,
            &mut accept_all,
        );

        // All of the x velocity is absorbed by the wall; the z component
        // slides through for the full time.
        assert_relative_eq!(result.displacement.x, 0.0, epsilon = 1.0e-5);
        assert_relative_eq!(result.displacement.z, 0.2, epsilon = 1.0e-5);
        assert_relative_eq!(result.time_simulated, 0.1, epsilon = 1.0e-6);
        assert!(contacts[0].had_collision);
    }

    #[test]
    fn groove_terminates_without_ping_pong() {
        // A V-groove: two planes whose projections re-enter each other.
        let tuning = SolverTuning::default();
        let sqrt_half = std::f32::consts::FRAC_1_SQRT_2;
        let mut contacts = vec![
            contact(Vec3::new(-sqrt_half, sqrt_half, 0.0), 0.0),
            contact(Vec3::new(sqrt_half, sqrt_half, 0.0), 0.0),
        ];
        let mut constraints = Vec::new();
        let velocity = Vec3::new(0.0, -5.0, 0.0);
        determine_constraints(velocity, 0.999, 1.0, &contacts, &mut constraints);
        assert_eq!(constraints.len(), 2);

        let result = solve_constraints(
            velocity,
            0.1,
            &tuning,
            &mut contacts,
            &mut constraints,
            &mut accept_all,
        );

        // Wedged: the crease direction is horizontal and carries no
        // velocity, so the solver stops instead of bouncing between planes.
        assert!(result.displacement.norm() < 1.0e-4);
        assert!(result.time_simulated < 1.0e-4);
    }

    #[test]
    fn vetoed_contact_is_discarded() {
        let tuning = SolverTuning::default();
        let mut contacts = vec![contact(Vec3::new(-1.0, 0.0, 0.0), 0.0)];
        let mut constraints = Vec::new();
        let velocity = Vec3::new(10.0, 0.0, 0.0);
        determine_constraints(velocity, 0.999, 1.0, &contacts, &mut constraints);

        let result = solve_constraints(
            velocity,
            0.1,
            &tuning,
            &mut contacts,
            &mut constraints,
            &mut |_, _| None,
        );

        // The only constraint was vetoed, so the move passes through.
        assert_relative_eq!(result.displacement.x, 1.0, epsilon = 1.0e-5);
        assert!(contacts[0].was_discarded);
        assert!(!contacts[0].had_collision);
    }

    #[test]
    fn platform_that_cannot_push_is_ignored() {
        let tuning = SolverTuning::default();
        // A face approaching the character at 2 m/s.
        let mut approaching = contact(Vec3::new(0.0, 0.0, -1.0), 0.0);
        approaching.linear_velocity = Vec3::new(0.0, 0.0, -2.0);
        let mut contacts = vec![approaching];
        let mut constraints = Vec::new();
        determine_constraints(Vec3::zeros(), 0.999, 1.0, &contacts, &mut constraints);
        assert_eq!(constraints.len(), 1);

        let carried = solve_constraints(
            Vec3::zeros(),
            0.1,
            &tuning,
            &mut contacts.clone(),
            &mut constraints.clone(),
            &mut accept_all,
        );
        assert!(carried.displacement.z < -0.1);

        let denied = solve_constraints(
            Vec3::zeros(),
            0.1,
            &tuning,
            &mut contacts,
            &mut constraints,
            &mut |_, _| {
                Some(ContactSettings {
                    can_push_character: false,
                    can_receive_impulses: true,
                })
            },
        );
        assert!(denied.displacement.norm() < 1.0e-5);
    }
}
