/*!
Character tuning and solver tolerances.

These constants centralize the parameters used by contact discovery, the
constraint solver, sweep verification, and ground classification. Keeping
them together makes tuning easier and helps ensure deterministic behavior
across platforms.

Notes
- Distances are in meters, time in seconds, forces in newtons.
- Favor practical world-space tolerances over machine epsilon for robust
  behavior.
- Per-character customization goes through [`SolverTuning`]; the constants
  here are its defaults.
*/

use parry3d::shape::SharedShape;

/// Contacts are collected while still separated by up to this distance
/// (meters), so the solver can reason about surfaces just ahead.
pub const PREDICTIVE_CONTACT_DISTANCE: f32 = 0.01;

/// Margin kept between the character and geometry (meters). Subtracted from
/// every measured contact distance, and restored when shortening sweep
/// fractions. Must stay below [`PREDICTIVE_CONTACT_DISTANCE`] or a character
/// resting at the margin stops seeing the surface it rests on.
pub const CHARACTER_PADDING: f32 = 0.005;

/// Penetrations smaller than this are accepted without correction (meters).
pub const COLLISION_TOLERANCE: f32 = 1.0e-3;

/// Below this much remaining time (seconds) an update iteration stops early.
pub const MIN_TIME_REMAINING: f32 = 1.0e-4;

/// Maximum move-and-slide iterations per update.
pub const MAX_COLLISION_ITERATIONS: usize = 5;

/// Maximum solver iterations per move iteration. Also bounds the number of
/// contact planes remembered for crease detection.
pub const MAX_CONSTRAINT_ITERATIONS: usize = 15;

/// Cap on contacts collected per query.
pub const MAX_NUM_HITS: usize = 256;

/// Penetration (meters, beyond the padding) required before two opposing
/// contacts on the same body are considered contradictory.
pub const MIN_CONFLICT_PENETRATION: f32 = 0.005;

/// Normals whose dot product exceeds this are treated as parallel when
/// looking for a crease to slide along; their cross product would be too
/// degenerate to produce a usable slide direction. Corresponds to roughly
/// 10 degrees of slack.
pub const CREASE_PARALLEL_THRESHOLD: f32 = 0.984;

/// Per-character solver tolerances. Defaults are the module constants.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverTuning {
    /// See [`PREDICTIVE_CONTACT_DISTANCE`].
    pub predictive_contact_distance: f32,
    /// See [`CHARACTER_PADDING`].
    pub character_padding: f32,
    /// See [`COLLISION_TOLERANCE`].
    pub collision_tolerance: f32,
    /// See [`MIN_TIME_REMAINING`].
    pub min_time_remaining: f32,
    /// See [`MAX_COLLISION_ITERATIONS`].
    pub max_collision_iterations: usize,
    /// See [`MAX_CONSTRAINT_ITERATIONS`].
    pub max_constraint_iterations: usize,
    /// See [`MAX_NUM_HITS`].
    pub max_num_hits: usize,
    /// See [`CREASE_PARALLEL_THRESHOLD`].
    pub crease_parallel_threshold: f32,
}

impl Default for SolverTuning {
    fn default() -> Self {
        Self {
            predictive_contact_distance: PREDICTIVE_CONTACT_DISTANCE,
            character_padding: CHARACTER_PADDING,
            collision_tolerance: COLLISION_TOLERANCE,
            min_time_remaining: MIN_TIME_REMAINING,
            max_collision_iterations: MAX_COLLISION_ITERATIONS,
            max_constraint_iterations: MAX_CONSTRAINT_ITERATIONS,
            max_num_hits: MAX_NUM_HITS,
            crease_parallel_threshold: CREASE_PARALLEL_THRESHOLD,
        }
    }
}

impl SolverTuning {
    /// Minimum penetration before conflicting contacts are pruned. The
    /// padding is added back because it was subtracted from every measured
    /// distance.
    #[inline]
    pub fn min_required_penetration(&self) -> f32 {
        MIN_CONFLICT_PENETRATION + self.character_padding
    }
}

/// Construction-time settings for a
/// [`VirtualCharacter`](crate::character::VirtualCharacter).
#[derive(Clone)]
pub struct CharacterSettings {
    /// Collision shape. The character keeps a shared handle and never
    /// mutates the shape.
    pub shape: SharedShape,
    /// Steepest walkable slope, in radians from horizontal.
    pub max_slope_angle: f32,
    /// Maximum force (newtons) the character exerts on dynamic bodies.
    pub max_strength: f32,
    /// Character mass (kg), used when transferring weight to a supporting
    /// body.
    pub mass: f32,
    /// Fraction of penetration depth recovered per second of simulated time.
    pub penetration_recovery_speed: f32,
}

impl CharacterSettings {
    pub fn new(shape: SharedShape) -> Self {
        Self {
            shape,
            max_slope_angle: 50.0_f32.to_radians(),
            max_strength: 100.0,
            mass: 70.0,
            penetration_recovery_speed: 1.0,
        }
    }
}
