//! Ground support: which contact the character stands on, and what that
//! means for its ground state.

use super::virtual_character::VirtualCharacter;

/// Classification of the character's support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum GroundState {
    /// Standing on a walkable surface.
    OnGround,
    /// Touching a surface that is too steep to stand on.
    Sliding,
    /// No supporting contact.
    InAir,
}

/// A slope limit cosine this close to 1 disables the limit entirely.
const SLOPE_LIMIT_DISABLED: f32 = 0.999;

impl VirtualCharacter {
    /// Classify the character's support from the last update.
    pub fn ground_state(&self) -> GroundState {
        let Some(contact) = self.supporting_contact() else {
            return GroundState::InAir;
        };

        if self.cos_max_slope_angle() < SLOPE_LIMIT_DISABLED
            && contact.normal.y >= 0.0
            && contact.normal.y < self.cos_max_slope_angle()
        {
            return GroundState::Sliding;
        }

        GroundState::OnGround
    }

    /// Reselect the supporting contact: flag active contacts that are close
    /// enough as colliding (preserving what the solver already marked), then
    /// pick the colliding contact whose normal points most upward.
    pub(crate) fn update_supporting_contact(&mut self) {
        let tolerance = self.tuning().collision_tolerance;
        for contact in self.active_contacts_mut() {
            if !contact.was_discarded {
                contact.had_collision |= contact.distance < tolerance;
            }
        }

        // Only contacts that push at least sideways can support; a ceiling
        // touch alone leaves the character in the air.
        let mut supporting = None;
        let mut max_y = f32::MIN;
        for (index, contact) in self.active_contacts().iter().enumerate() {
            if contact.had_collision && contact.normal.y >= 0.0 && max_y < contact.normal.y {
                supporting = Some(index);
                max_y = contact.normal.y;
            }
        }
        self.set_supporting_contact(supporting);
    }
}
