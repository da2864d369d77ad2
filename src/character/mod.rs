/*!
Character root module: the kinematic virtual character and its solver.

The code is split for clarity:

- settings:          tuning scalars and solver tolerances
- contact:           contacts and the collectors that build them from hits
- constraint:        planar constraints and the TOI-ordered slide solver
- listener:          the embedder's per-contact callbacks
- ground:            supporting contact and ground classification
- virtual_character: the character itself and its update pipeline
*/

pub mod contact;
pub(crate) mod constraint;
pub mod ground;
pub mod listener;
pub mod settings;
pub mod virtual_character;

pub use contact::Contact;
pub use ground::GroundState;
pub use listener::{CharacterContactListener, ContactSettings};
pub use settings::{CharacterSettings, SolverTuning};
pub use virtual_character::VirtualCharacter;
