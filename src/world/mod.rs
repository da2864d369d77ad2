/*!
World root module: the host-side surface the character controller consumes.

The code is split for clarity:

- types:   shared data types (math aliases, ids, planes, motion types)
- body:    body storage with scoped per-body read/write locking
- filter:  query filtering by layer mask and excluded bodies
- broad:   broad-phase helpers (swept AABBs, coarse overlap rejection)
- queries: thin wrappers over parry3d narrow-phase queries (manifolds, TOI)

Embedders populate a [`BodySet`] with their geometry and pass it, together
with a [`QueryFilter`], into every character operation. The set is never
stored by the character.
*/

pub mod body;
pub mod broad;
pub mod filter;
pub mod queries;
pub mod types;

pub use body::{Body, BodySet};
pub use filter::QueryFilter;
pub use queries::{cast_shape, collide_shape, ShapeHit, ShapeHitConsumer};
pub use types::{normalize_or_zero, BodyId, Iso, MaterialId, MotionType, Plane, Quat, SubShapeId, Vec3};
