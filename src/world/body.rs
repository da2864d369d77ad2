//! Body storage with scoped per-body locking.
//!
//! The character controller reads body state under read locks and applies
//! impulses under write locks. Locks are scoped to a closure so they are
//! released on every path, and a lock attempt on a removed body reports the
//! body as gone instead of failing loudly.

use std::sync::RwLock;

use nalgebra as na;
use parry3d::shape::SharedShape;

use super::types::{BodyId, Iso, MaterialId, MotionType, Quat, Vec3};

/// A collidable body: a shared shape, a world pose, velocities, and the mass
/// data needed to answer impulse queries.
///
/// The shape handle is shared-immutable; several bodies (or characters) may
/// reference the same shape.
pub struct Body {
    shape: SharedShape,
    pose: Iso,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    motion_type: MotionType,
    layers: u32,
    user_data: u64,
    material: MaterialId,
    inv_mass: f32,
    inv_principal_inertia: Vec3,
    principal_inertia_frame: Quat,
    local_com: na::Point3<f32>,
}

impl Body {
    /// Create a static body. Static bodies have no velocity and infinite mass.
    pub fn fixed(shape: SharedShape, pose: Iso) -> Self {
        let local_com = shape.mass_properties(1.0).local_com;
        Self {
            shape,
            pose,
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            motion_type: MotionType::Static,
            layers: u32::MAX,
            user_data: 0,
            material: MaterialId::default(),
            inv_mass: 0.0,
            inv_principal_inertia: Vec3::zeros(),
            principal_inertia_frame: Quat::identity(),
            local_com,
        }
    }

    /// Create a kinematic body: moved by the embedder, immune to impulses.
    pub fn kinematic(shape: SharedShape, pose: Iso) -> Self {
        Self {
            motion_type: MotionType::Kinematic,
            ..Self::fixed(shape, pose)
        }
    }

    /// Create a dynamic body with mass data derived from the shape at the
    /// given density (kg/m^3).
    pub fn dynamic(shape: SharedShape, pose: Iso, density: f32) -> Self {
        let props = shape.mass_properties(density.max(1.0e-6));
        let inv_principal = props
            .inv_principal_inertia_sqrt
            .component_mul(&props.inv_principal_inertia_sqrt);
        Self {
            shape,
            pose,
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            motion_type: MotionType::Dynamic,
            layers: u32::MAX,
            user_data: 0,
            material: MaterialId::default(),
            inv_mass: props.inv_mass,
            inv_principal_inertia: inv_principal,
            principal_inertia_frame: props.principal_inertia_local_frame,
            local_com: props.local_com,
        }
    }

    pub fn with_linear_velocity(mut self, velocity: Vec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, velocity: Vec3) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn with_layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = material;
        self
    }

    #[inline]
    pub fn shape(&self) -> &SharedShape {
        &self.shape
    }

    #[inline]
    pub fn pose(&self) -> &Iso {
        &self.pose
    }

    pub fn set_pose(&mut self, pose: Iso) {
        self.pose = pose;
    }

    #[inline]
    pub fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.linear_velocity = velocity;
    }

    #[inline]
    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    #[inline]
    pub fn motion_type(&self) -> MotionType {
        self.motion_type
    }

    #[inline]
    pub fn layers(&self) -> u32 {
        self.layers
    }

    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    #[inline]
    pub fn material(&self) -> MaterialId {
        self.material
    }

    #[inline]
    pub fn inverse_mass(&self) -> f32 {
        self.inv_mass
    }

    /// World-space center of mass.
    #[inline]
    pub fn center_of_mass(&self) -> Vec3 {
        self.pose.transform_point(&self.local_com).coords
    }

    /// Velocity of the body surface at a world-space point.
    #[inline]
    pub fn point_velocity(&self, point: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(&(point - self.center_of_mass()))
    }

    /// World-space inverse inertia tensor.
    ///
    /// Zero for static and kinematic bodies.
    pub fn inverse_inertia_world(&self) -> na::Matrix3<f32> {
        let rotation = (self.pose.rotation * self.principal_inertia_frame).to_rotation_matrix();
        rotation.matrix()
            * na::Matrix3::from_diagonal(&self.inv_principal_inertia)
            * rotation.matrix().transpose()
    }

    /// Apply an impulse at a world-space point, updating linear and angular
    /// velocity. No effect on non-dynamic bodies.
    pub fn apply_impulse(&mut self, impulse: Vec3, point: Vec3) {
        if self.motion_type != MotionType::Dynamic {
            return;
        }
        self.linear_velocity += impulse * self.inv_mass;
        let arm = point - self.center_of_mass();
        self.angular_velocity += self.inverse_inertia_world() * arm.cross(&impulse);
    }
}

/// The set of bodies the character collides with.
///
/// Each slot carries its own `RwLock`; removal leaves a tombstone so that a
/// lock attempt on a removed body fails the same way a lock on a body deleted
/// mid-query would. Queries and the character access bodies exclusively
/// through [`BodySet::read`] and [`BodySet::write`].
#[derive(Default)]
pub struct BodySet {
    slots: Vec<RwLock<Option<Body>>>,
}

impl BodySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a body and return its id.
    pub fn insert(&mut self, body: Body) -> BodyId {
        let id = BodyId(self.slots.len() as u32);
        self.slots.push(RwLock::new(Some(body)));
        id
    }

    /// Remove a body. Later lock attempts on its id report the body as gone.
    pub fn remove(&mut self, id: BodyId) {
        if let Some(slot) = self.slots.get(id.0 as usize) {
            if let Ok(mut body) = slot.write() {
                *body = None;
            }
        }
    }

    /// Number of slots ever allocated (including tombstones).
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over every id ever allocated. Removed bodies still yield their
    /// id; the `read`/`write` accessors filter them out.
    pub fn ids(&self) -> impl Iterator<Item = BodyId> + '_ {
        (0..self.slots.len() as u32).map(BodyId)
    }

    /// Run `f` with a read lock on the body. Returns `None` when the body was
    /// removed (or its lock is poisoned), which callers treat as "contact
    /// gone".
    pub fn read<R>(&self, id: BodyId, f: impl FnOnce(&Body) -> R) -> Option<R> {
        let slot = self.slots.get(id.0 as usize)?;
        let guard = slot.read().ok()?;
        guard.as_ref().map(f)
    }

    /// Run `f` with a write lock on the body. Returns `None` when the body
    /// was removed (or its lock is poisoned).
    pub fn write<R>(&self, id: BodyId, f: impl FnOnce(&mut Body) -> R) -> Option<R> {
        let slot = self.slots.get(id.0 as usize)?;
        let mut guard = slot.write().ok()?;
        guard.as_mut().map(f)
    }
}
