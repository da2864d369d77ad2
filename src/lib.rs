/*!
# `kinematic-character`

A kinematic ("virtual") character controller for 3D worlds. The character is
not a rigid body: it moves by sweeping a collision shape through a set of
bodies, resolving contacts geometrically every frame, while optionally
pushing dynamic bodies via impulses.

Each call to [`VirtualCharacter::update`] runs a bounded loop of move
iterations:

1. Discover contacts around the current position (overlap query with a
   predictive margin).
2. Prune contradictory contacts on the same body.
3. Convert contacts to planar velocity constraints, adding a horizontal
   blocking plane on too-steep slopes.
4. Slide through the constraints in time-of-impact order, following creases
   where two planes meet.
5. Verify the solved displacement with a shape cast and shorten it to the
   first real obstacle.
6. Advance and repeat until the frame time is consumed.

Afterwards the achieved velocity is written back and the supporting contact
(the one whose normal points most upward) determines the
[`GroundState`](character::GroundState).

## Usage

```no_run
use kinematic_character::prelude::*;
use nalgebra as na;
use parry3d::shape::SharedShape;

let mut bodies = BodySet::new();
bodies.insert(Body::fixed(
    SharedShape::halfspace(na::Vector3::y_axis()),
    na::Isometry3::identity(),
));

let settings = CharacterSettings::new(SharedShape::capsule_y(0.5, 0.3));
let mut character = VirtualCharacter::new(
    settings,
    na::Vector3::new(0.0, 2.0, 0.0),
    na::UnitQuaternion::identity(),
);

let gravity = na::Vector3::new(0.0, -9.81, 0.0);
let filter = QueryFilter::new();
let delta_time = 1.0 / 60.0;
character.set_linear_velocity(character.linear_velocity() + gravity * delta_time);
character.update(&bodies, delta_time, gravity, &filter);
```

The embedder owns the world: bodies live in a [`BodySet`](world::BodySet)
passed into every operation, and per-contact behavior can be tuned through a
[`CharacterContactListener`](character::CharacterContactListener).
*/

pub mod character;
pub mod world;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::character::{
        CharacterContactListener, CharacterSettings, Contact, ContactSettings, GroundState,
        SolverTuning, VirtualCharacter,
    };
    pub use crate::world::{
        Body, BodyId, BodySet, MaterialId, MotionType, QueryFilter, SubShapeId,
    };
}

pub use character::{CharacterSettings, GroundState, SolverTuning, VirtualCharacter};
pub use world::{Body, BodyId, BodySet, MotionType, QueryFilter};
