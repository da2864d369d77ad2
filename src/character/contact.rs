//! Contacts and the collectors that build them from query hits.
//!
//! Contacts are rebuilt every move iteration; the final iteration's set is
//! kept on the character so listeners and the supporting-contact query can
//! observe continuity across frames.

use log::{debug, warn};

use crate::world::{
    normalize_or_zero, Body, BodyId, MaterialId, MotionType, ShapeHit, ShapeHitConsumer,
    SubShapeId, Vec3,
};

/// A single contact between the character and another body.
#[derive(Clone, Debug, PartialEq)]
pub struct Contact {
    /// World-space contact point on the other body.
    pub position: Vec3,
    /// Velocity of the other body at `position`.
    pub linear_velocity: Vec3,
    /// Unit normal pointing out of the other body, toward the character.
    /// Zero when the penetration axis collapsed; such a contact never
    /// blocks.
    pub normal: Vec3,
    /// Signed distance: negative means penetrating by that depth.
    pub distance: f32,
    /// For swept contacts, the fraction along the displacement where the
    /// contact occurs. Zero for overlap contacts.
    pub fraction: f32,
    /// The other body.
    pub body_id: BodyId,
    /// Sub-shape of the other body.
    pub sub_shape_id: SubShapeId,
    /// Motion type of the other body at collection time.
    pub motion_type: MotionType,
    /// Material of the hit sub-shape, passed through untouched.
    pub material: MaterialId,
    /// The other body's user data, passed through untouched.
    pub user_data: u64,
    /// Set once the solver actually collided with this contact.
    pub had_collision: bool,
    /// Set when the listener rejected this contact mid-solve.
    pub was_discarded: bool,
    /// From listener settings; when false the contact velocity is ignored
    /// while sliding.
    pub can_push_character: bool,
}

impl Contact {
    /// Fill a contact from a query hit and the (locked) body that produced
    /// it.
    pub(crate) fn from_hit(hit: &ShapeHit, body: &Body) -> Self {
        let normal = normalize_or_zero(-hit.penetration_axis);
        if normal == Vec3::zeros() {
            warn!(
                "contact with body {:?} has a degenerate penetration axis; treating as non-blocking",
                hit.body_id
            );
        }
        Self {
            position: hit.position,
            linear_velocity: body.point_velocity(hit.position),
            normal,
            distance: hit.distance,
            fraction: hit.fraction,
            body_id: hit.body_id,
            sub_shape_id: hit.sub_shape_id,
            motion_type: body.motion_type(),
            material: body.material(),
            user_data: body.user_data(),
            had_collision: false,
            was_discarded: false,
            can_push_character: true,
        }
    }
}

/// A contact deliberately dropped by conflict pruning, excluded from sweep
/// tests for the rest of the move iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct IgnoredContact {
    pub body_id: BodyId,
    pub sub_shape_id: SubShapeId,
}

/// Collects overlap hits into contacts, up to a hit cap.
pub(crate) struct OverlapCollector {
    contacts: Vec<Contact>,
    max_hits: usize,
}

impl OverlapCollector {
    pub fn new(max_hits: usize) -> Self {
        Self {
            contacts: Vec::new(),
            max_hits,
        }
    }

    pub fn into_contacts(self) -> Vec<Contact> {
        self.contacts
    }
}

impl ShapeHitConsumer for OverlapCollector {
    fn on_hit(&mut self, hit: &ShapeHit, body: &Body) -> bool {
        self.contacts.push(Contact::from_hit(hit, body));
        self.contacts.len() < self.max_hits
    }
}

/// Collects sweep hits into contacts, dropping hits the character is moving
/// away from and contacts that conflict pruning told us to ignore.
pub(crate) struct SweepCollector<'a> {
    contacts: Vec<Contact>,
    displacement: Vec3,
    ignored: &'a [IgnoredContact],
    max_hits: usize,
}

impl<'a> SweepCollector<'a> {
    pub fn new(displacement: Vec3, ignored: &'a [IgnoredContact], max_hits: usize) -> Self {
        Self {
            contacts: Vec::new(),
            displacement,
            ignored,
            max_hits,
        }
    }

    pub fn into_contacts(self) -> Vec<Contact> {
        self.contacts
    }
}

impl ShapeHitConsumer for SweepCollector<'_> {
    fn on_hit(&mut self, hit: &ShapeHit, body: &Body) -> bool {
        // A hit at fraction zero was already handled by the overlap pass,
        // and a hit whose axis opposes the displacement is one we are
        // leaving.
        if hit.fraction <= 0.0 || hit.penetration_axis.dot(&self.displacement) <= 0.0 {
            return true;
        }
        if self
            .ignored
            .iter()
            .any(|c| c.body_id == hit.body_id && c.sub_shape_id == hit.sub_shape_id)
        {
            return true;
        }
        self.contacts.push(Contact::from_hit(hit, body));
        self.contacts.len() < self.max_hits
    }
}

/// Drop contradictory contact pairs: two contacts on the same body whose
/// normals oppose each other while both penetrate deeper than
/// `min_required_penetration` cannot both be satisfied. The deeper contact
/// reflects the dominant interpenetration and survives; the other is
/// recorded so the sweep does not rediscover it.
pub(crate) fn remove_conflicting_contacts(
    contacts: &mut Vec<Contact>,
    ignored: &mut Vec<IgnoredContact>,
    min_required_penetration: f32,
) {
    let mut c1 = 0;
    while c1 < contacts.len() {
        let mut removed_c1 = false;
        if contacts[c1].distance <= -min_required_penetration {
            let mut c2 = c1 + 1;
            while c2 < contacts.len() {
                let conflicting = contacts[c1].body_id == contacts[c2].body_id
                    && contacts[c2].distance <= -min_required_penetration
                    && contacts[c1].normal.dot(&contacts[c2].normal) < 0.0;
                if conflicting {
                    if contacts[c1].distance < contacts[c2].distance {
                        debug!(
                            "discarding conflicting contact on body {:?} (kept deeper opposite)",
                            contacts[c2].body_id
                        );
                        ignored.push(IgnoredContact {
                            body_id: contacts[c2].body_id,
                            sub_shape_id: contacts[c2].sub_shape_id,
                        });
                        contacts.remove(c2);
                        continue;
                    } else {
                        debug!(
                            "discarding conflicting contact on body {:?} (kept deeper opposite)",
                            contacts[c1].body_id
                        );
                        ignored.push(IgnoredContact {
                            body_id: contacts[c1].body_id,
                            sub_shape_id: contacts[c1].sub_shape_id,
                        });
                        contacts.remove(c1);
                        removed_c1 = true;
                        break;
                    }
                }
                c2 += 1;
            }
        }
        if !removed_c1 {
            c1 += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn penetrating(body: u32, sub_shape: u32, normal: Vec3, distance: f32) -> Contact {
        Contact {
            position: Vec3::zeros(),
            linear_velocity: Vec3::zeros(),
            normal,
            distance,
            fraction: 0.0,
            body_id: BodyId(body),
            sub_shape_id: SubShapeId(sub_shape),
            motion_type: MotionType::Static,
            material: MaterialId::default(),
            user_data: 0,
            had_collision: false,
            was_discarded: false,
            can_push_character: true,
        }
    }

    #[test]
    fn opposing_pair_keeps_deeper_contact() {
        let mut contacts = vec![
            penetrating(7, 0, Vec3::new(1.0, 0.0, 0.0), -0.02),
            penetrating(7, 1, Vec3::new(-1.0, 0.0, 0.0), -0.08),
        ];
        let mut ignored = Vec::new();
        remove_conflicting_contacts(&mut contacts, &mut ignored, 0.01);

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].sub_shape_id, SubShapeId(1));
        assert_eq!(ignored, vec![IgnoredContact {
            body_id: BodyId(7),
            sub_shape_id: SubShapeId(0),
        }]);
    }

    #[test]
    fn different_bodies_are_left_alone() {
        let mut contacts = vec![
            penetrating(1, 0, Vec3::new(1.0, 0.0, 0.0), -0.05),
            penetrating(2, 0, Vec3::new(-1.0, 0.0, 0.0), -0.05),
        ];
        let mut ignored = Vec::new();
        remove_conflicting_contacts(&mut contacts, &mut ignored, 0.01);
        assert_eq!(contacts.len(), 2);
        assert!(ignored.is_empty());
    }

    #[test]
    fn shallow_penetrations_survive() {
        let mut contacts = vec![
            penetrating(1, 0, Vec3::new(1.0, 0.0, 0.0), -0.002),
            penetrating(1, 1, Vec3::new(-1.0, 0.0, 0.0), -0.003),
        ];
        let mut ignored = Vec::new();
        remove_conflicting_contacts(&mut contacts, &mut ignored, 0.01);
        assert_eq!(contacts.len(), 2);
        assert!(ignored.is_empty());
    }

    #[test]
    fn aligned_normals_on_same_body_survive() {
        let mut contacts = vec![
            penetrating(1, 0, Vec3::new(0.0, 1.0, 0.0), -0.05),
            penetrating(1, 1, Vec3::new(0.1, 0.9, 0.0), -0.05),
        ];
        let mut ignored = Vec::new();
        remove_conflicting_contacts(&mut contacts, &mut ignored, 0.01);
        assert_eq!(contacts.len(), 2);
        assert!(ignored.is_empty());
    }
}
