//! Contact listener: the embedder's hook into per-contact decisions.

use crate::world::{BodyId, SubShapeId, Vec3};

/// Per-contact behavior, filled by the listener when a contact is first hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ContactSettings {
    /// When false, the contact's velocity is ignored while sliding, so a
    /// moving platform cannot carry the character through this contact.
    pub can_push_character: bool,
    /// When false, the character applies no impulse to the body.
    pub can_receive_impulses: bool,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            can_push_character: true,
            can_receive_impulses: true,
        }
    }
}

/// Callbacks invoked while the character collides with the world.
///
/// A listener instance belongs to a single character, so callbacks identify
/// the contact by body and sub-shape only. No body lock is held while a
/// callback runs; a listener may freely query the body set.
pub trait CharacterContactListener {
    /// Veto a contact. Returning `false` discards the contact for the rest
    /// of the update.
    fn on_contact_validate(&self, body: BodyId, sub_shape: SubShapeId) -> bool {
        let _ = (body, sub_shape);
        true
    }

    /// Called the first time the solver actually collides with a contact.
    /// `normal` points out of the character, toward the body. Adjust
    /// `settings` to tune how the contact behaves.
    fn on_contact_added(
        &self,
        body: BodyId,
        sub_shape: SubShapeId,
        position: Vec3,
        normal: Vec3,
        settings: &mut ContactSettings,
    ) {
        let _ = (body, sub_shape, position, normal, settings);
    }
}
