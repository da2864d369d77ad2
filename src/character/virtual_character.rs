//! The virtual character: a kinematic actor that moves by sweeping its shape
//! through the world and resolving contacts geometrically each frame.
//!
//! The character is not a rigid body. Each update runs a bounded loop of
//! move iterations: discover contacts around the current position, prune
//! contradictory ones, convert the rest to planar velocity constraints,
//! slide through the constraint set in time-of-impact order, then verify the
//! solved displacement with a shape cast before committing it.

use std::sync::Arc;

use parry3d::shape::SharedShape;

use super::contact::{
    remove_conflicting_contacts, Contact, IgnoredContact, OverlapCollector, SweepCollector,
};
use super::constraint::{determine_constraints, solve_constraints, Constraint};
use super::listener::{CharacterContactListener, ContactSettings};
use super::settings::{CharacterSettings, SolverTuning};
use crate::world::{
    cast_shape, collide_shape, BodySet, Iso, MotionType, QueryFilter, Quat, Vec3,
};

/// Damping applied to the relative speed transferred to a pushed body.
const PUSH_DAMPING: f32 = 0.9;

/// Fraction of the penetration resolved per frame through the pushed body.
const PUSH_PENETRATION_RESOLUTION: f32 = 0.4;

/// Below this squared displacement (m^2) a move iteration cannot make
/// further progress.
const MIN_DISPLACEMENT_SQ: f32 = 1.0e-8;

/// A kinematic character with a shape, a pose, and a velocity.
///
/// `position` is the character's origin in world space; the shape's
/// center-of-mass offset is applied on top of it when querying the world, so
/// a shape built with its feet at the origin keeps `position` at the feet.
pub struct VirtualCharacter {
    position: Vec3,
    rotation: Quat,
    linear_velocity: Vec3,
    shape: SharedShape,
    cos_max_slope_angle: f32,
    max_strength: f32,
    mass: f32,
    penetration_recovery_speed: f32,
    tuning: SolverTuning,
    listener: Option<Box<dyn CharacterContactListener>>,
    active_contacts: Vec<Contact>,
    supporting_contact: Option<usize>,
}

impl VirtualCharacter {
    pub fn new(settings: CharacterSettings, position: Vec3, rotation: Quat) -> Self {
        let mut character = Self {
            position,
            rotation,
            linear_velocity: Vec3::zeros(),
            shape: settings.shape,
            cos_max_slope_angle: 1.0,
            max_strength: 0.0,
            mass: 1.0,
            penetration_recovery_speed: 1.0,
            tuning: SolverTuning::default(),
            listener: None,
            active_contacts: Vec::new(),
            supporting_contact: None,
        };
        character.set_max_slope_angle(settings.max_slope_angle);
        character.set_max_strength(settings.max_strength);
        character.set_mass(settings.mass);
        character.set_penetration_recovery_speed(settings.penetration_recovery_speed);
        character
    }

    pub fn with_tuning(mut self, tuning: SolverTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn set_listener(&mut self, listener: Option<Box<dyn CharacterContactListener>>) {
        self.listener = listener;
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    #[inline]
    pub fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.linear_velocity = velocity;
    }

    #[inline]
    pub fn shape(&self) -> &SharedShape {
        &self.shape
    }

    #[inline]
    pub fn tuning(&self) -> &SolverTuning {
        &self.tuning
    }

    #[inline]
    pub fn cos_max_slope_angle(&self) -> f32 {
        self.cos_max_slope_angle
    }

    /// Set the steepest walkable slope, in radians from horizontal. Stored
    /// as a cosine so the hot path never computes trigonometry.
    pub fn set_max_slope_angle(&mut self, radians: f32) {
        self.cos_max_slope_angle = radians.cos().clamp(-1.0, 1.0);
    }

    #[inline]
    pub fn max_strength(&self) -> f32 {
        self.max_strength
    }

    /// Set the maximum force (newtons) exerted on pushed bodies.
    pub fn set_max_strength(&mut self, newtons: f32) {
        self.max_strength = newtons.max(0.0);
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Set the character mass (kg); must be positive.
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass.max(1.0e-6);
    }

    #[inline]
    pub fn penetration_recovery_speed(&self) -> f32 {
        self.penetration_recovery_speed
    }

    /// Set the fraction of penetration depth recovered per second.
    pub fn set_penetration_recovery_speed(&mut self, speed: f32) {
        self.penetration_recovery_speed = speed.clamp(0.0, 1.0);
    }

    /// Contacts from the last update or refresh.
    #[inline]
    pub fn active_contacts(&self) -> &[Contact] {
        &self.active_contacts
    }

    pub(crate) fn active_contacts_mut(&mut self) -> &mut [Contact] {
        &mut self.active_contacts
    }

    /// The contact the character is standing on, if any.
    pub fn supporting_contact(&self) -> Option<&Contact> {
        self.supporting_contact
            .and_then(|index| self.active_contacts.get(index))
    }

    pub(crate) fn set_supporting_contact(&mut self, index: Option<usize>) {
        self.supporting_contact = index;
    }

    /// Advance the character by `delta_time` seconds.
    ///
    /// The character's velocity is swept through the world, sliding along
    /// whatever it hits; afterwards `linear_velocity` holds the velocity the
    /// character actually achieved. `gravity` is only used to transfer the
    /// character's weight to supporting dynamic bodies. A non-positive
    /// `delta_time` is a no-op.
    pub fn update(&mut self, bodies: &BodySet, delta_time: f32, gravity: Vec3, filter: &QueryFilter) {
        if delta_time <= 0.0 {
            return;
        }

        let old_position = self.position;
        self.move_shape(bodies, delta_time, gravity, filter);
        self.linear_velocity = (self.position - old_position) / delta_time;
        self.update_supporting_contact();
    }

    /// Re-measure the active contacts at the current position without moving.
    pub fn refresh_contacts(&mut self, bodies: &BodySet, filter: &QueryFilter) {
        let contacts = self.contacts_at_position(bodies, self.position, &self.shape, filter);
        self.store_active_contacts(contacts);
    }

    /// Atomically replace the collision shape, e.g. for a crouch or stand
    /// transition.
    ///
    /// Fails (returning `false`, with no side effect) when the new shape
    /// would penetrate the world deeper than `max_penetration_depth`. Pass
    /// `f32::INFINITY` to skip the check. Setting the shape the character
    /// already has succeeds without touching the contacts.
    pub fn set_shape(
        &mut self,
        bodies: &BodySet,
        shape: &SharedShape,
        max_penetration_depth: f32,
        filter: &QueryFilter,
    ) -> bool {
        if Arc::ptr_eq(&self.shape.0, &shape.0) {
            return true;
        }

        let contacts = self.contacts_at_position(bodies, self.position, shape, filter);
        if max_penetration_depth < f32::INFINITY
            && contacts
                .iter()
                .any(|contact| contact.distance < -max_penetration_depth)
        {
            return false;
        }

        self.shape = shape.clone();
        self.store_active_contacts(contacts);
        true
    }

    fn store_active_contacts(&mut self, contacts: Vec<Contact>) {
        self.active_contacts = contacts;
        self.update_supporting_contact();
    }

    /// World transform of a shape placed at `position` with the character's
    /// rotation.
    fn shape_transform(&self, position: Vec3, shape: &SharedShape) -> Iso {
        let center_of_mass = shape.mass_properties(1.0).local_com.coords;
        Iso::from_parts(
            (position + self.rotation * center_of_mass).into(),
            self.rotation,
        )
    }

    /// All contacts within the predictive contact distance of the shape at
    /// `position`, with the character padding already subtracted so the
    /// character keeps a small margin off geometry.
    fn contacts_at_position(
        &self,
        bodies: &BodySet,
        position: Vec3,
        shape: &SharedShape,
        filter: &QueryFilter,
    ) -> Vec<Contact> {
        let transform = self.shape_transform(position, shape);
        let mut collector = OverlapCollector::new(self.tuning.max_num_hits);
        collide_shape(
            bodies,
            &**shape,
            &transform,
            self.tuning.predictive_contact_distance,
            filter,
            &mut collector,
        );

        let mut contacts = collector.into_contacts();
        for contact in &mut contacts {
            contact.distance -= self.tuning.character_padding;
        }
        contacts
    }

    /// One frame of sliding: up to `max_collision_iterations` rounds of
    /// discover, prune, constrain, solve, sweep-verify, advance.
    fn move_shape(&mut self, bodies: &BodySet, delta_time: f32, gravity: Vec3, filter: &QueryFilter) {
        let mut time_remaining = delta_time;

        for _ in 0..self.tuning.max_collision_iterations {
            if time_remaining < self.tuning.min_time_remaining {
                break;
            }

            let mut contacts =
                self.contacts_at_position(bodies, self.position, &self.shape, filter);

            let mut ignored: Vec<IgnoredContact> = Vec::with_capacity(contacts.len());
            remove_conflicting_contacts(
                &mut contacts,
                &mut ignored,
                self.tuning.min_required_penetration(),
            );

            let mut constraints: Vec<Constraint> = Vec::with_capacity(contacts.len() * 2);
            determine_constraints(
                self.linear_velocity,
                self.cos_max_slope_angle,
                self.penetration_recovery_speed,
                &contacts,
                &mut constraints,
            );

            let result = solve_constraints(
                self.linear_velocity,
                time_remaining,
                &self.tuning,
                &mut contacts,
                &mut constraints,
                &mut |velocity, contact| {
                    self.handle_contact(bodies, velocity, contact, gravity, delta_time)
                },
            );
            let mut displacement = result.displacement;
            let mut time_simulated = result.time_simulated;

            // Keep the contact set the solver actually used, colliding marks
            // included, before the sweep can shorten the move.
            self.active_contacts = contacts;

            // The overlap-based solver cannot see obstacles beyond the
            // predictive distance; verify the path with a cast and shorten
            // the move to the first real hit.
            if let Some(cast) =
                self.first_contact_for_sweep(bodies, self.position, displacement, &ignored, filter)
            {
                displacement *= cast.fraction;
                time_simulated *= cast.fraction;
            }

            self.position += displacement;
            time_remaining -= time_simulated;

            if displacement.norm_squared() < MIN_DISPLACEMENT_SQ {
                break;
            }
        }
    }

    /// Cast the shape along `displacement` and return the first contact that
    /// would make the character penetrate beyond the collision tolerance,
    /// with its fraction shortened so the character stops a padding short of
    /// the surface.
    fn first_contact_for_sweep(
        &self,
        bodies: &BodySet,
        position: Vec3,
        displacement: Vec3,
        ignored: &[IgnoredContact],
        filter: &QueryFilter,
    ) -> Option<Contact> {
        if displacement.norm_squared() < MIN_DISPLACEMENT_SQ {
            return None;
        }

        let transform = self.shape_transform(position, &self.shape);
        let mut collector = SweepCollector::new(displacement, ignored, self.tuning.max_num_hits);
        cast_shape(
            bodies,
            &*self.shape,
            &transform,
            displacement,
            filter,
            &mut collector,
        );

        let mut contacts = collector.into_contacts();
        contacts.sort_by(|a, b| {
            a.fraction
                .partial_cmp(&b.fraction)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut first = None;
        for contact in contacts {
            if contact.distance + contact.normal.dot(&displacement) < -self.tuning.collision_tolerance
                && self.validate_contact(&contact)
            {
                first = Some(contact);
                break;
            }
        }
        let mut contact = first?;

        // Walking the fraction back by padding / (normal ⋅ displacement)
        // leaves the character a padding-width away from the surface along
        // the contact normal.
        contact.fraction = (contact.fraction
            + self.tuning.character_padding / contact.normal.dot(&displacement))
        .max(0.0);
        Some(contact)
    }

    fn validate_contact(&self, contact: &Contact) -> bool {
        self.listener
            .as_ref()
            .map_or(true, |listener| {
                listener.on_contact_validate(contact.body_id, contact.sub_shape_id)
            })
    }

    /// First actual collision with a contact: run the listener callbacks
    /// and, for a dynamic body that accepts impulses, push it so it starts
    /// moving at the character's speed at the contact point.
    ///
    /// Returns `None` when the listener vetoes the contact or the body is
    /// gone; the solver then discards the contact.
    fn handle_contact(
        &self,
        bodies: &BodySet,
        velocity: Vec3,
        contact: &Contact,
        gravity: Vec3,
        delta_time: f32,
    ) -> Option<ContactSettings> {
        if !self.validate_contact(contact) {
            return None;
        }

        let mut settings = ContactSettings::default();
        if let Some(listener) = &self.listener {
            listener.on_contact_added(
                contact.body_id,
                contact.sub_shape_id,
                contact.position,
                -contact.normal,
                &mut settings,
            );
        }

        if !settings.can_receive_impulses || contact.motion_type != MotionType::Dynamic {
            return Some(settings);
        }

        let applied = bodies.write(contact.body_id, |body| {
            let relative_velocity = velocity - contact.linear_velocity;
            let projected_velocity = relative_velocity.dot(&contact.normal);
            let delta_velocity = -projected_velocity * PUSH_DAMPING
                - contact.distance.min(0.0) * PUSH_PENETRATION_RESOLUTION / delta_time;
            if delta_velocity < 0.0 {
                // Separating.
                return;
            }

            // Inverse of the body's mass as seen at the contact point along
            // the contact normal.
            let jacobian = (contact.position - body.center_of_mass()).cross(&contact.normal);
            let inv_effective_mass =
                (body.inverse_inertia_world() * jacobian).dot(&jacobian) + body.inverse_mass();
            if inv_effective_mass <= 0.0 {
                return;
            }

            // P = M dv, clamped by the character's strength: P = F dt.
            let impulse = (delta_velocity / inv_effective_mass).min(self.max_strength * delta_time);
            let mut world_impulse = contact.normal * -impulse;

            // A contact that supports the character against gravity also
            // carries the character's weight: P = M g dt.
            let normal_dot_gravity = contact.normal.dot(&gravity);
            if normal_dot_gravity < 0.0 {
                let gravity_length = gravity.norm();
                if gravity_length > 0.0 {
                    world_impulse -=
                        gravity * (self.mass * normal_dot_gravity / gravity_length * delta_time);
                }
            }

            body.apply_impulse(world_impulse, contact.position);
        });

        // The body disappeared between discovery and the impulse.
        applied?;
        Some(settings)
    }
}
