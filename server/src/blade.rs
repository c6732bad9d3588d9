//! Returning blade projectile.
//!
//! `Outbound -> Returning -> Destroyed`. Outbound flight curves at a fixed
//! angular rate whose sign is picked once at spawn; the return leg seeks the
//! owner's current position. A blade applies damage at most once.

use crate::config::BladeTuning;
use glam::Vec3;
use shared::{rotate_about_vertical, BladeSnapshot, EntityId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BladePhase {
    Outbound,
    Returning,
    Destroyed,
}

/// What the blade touched this step, resolved by the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BladeContact {
    Owner,
    Damageable { entity: EntityId, alive: bool },
    StaticGeometry,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactResponse {
    Ignore,
    /// Returned to its owner.
    Caught,
    /// Damage the target once, knock it back, then fly home.
    Strike { target: EntityId },
    /// Hit scenery: show an effect and fly home.
    Bounce,
}

#[derive(Debug, Clone)]
pub struct Blade {
    pub id: EntityId,
    pub owner: EntityId,
    pub position: Vec3,
    pub spawn_position: Vec3,
    pub direction: Vec3,
    pub traveled: f32,
    pub age: f32,
    phase: BladePhase,
    has_hit: bool,
    /// +1 or -1: curve direction for the whole outbound leg.
    curve_sign: f32,
}

impl Blade {
    pub fn new(id: EntityId, owner: EntityId, position: Vec3, direction: Vec3, curve_sign: f32) -> Self {
        let mut flat = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
        if flat == Vec3::ZERO {
            flat = Vec3::Z;
        }
        Self {
            id,
            owner,
            position,
            spawn_position: position,
            direction: flat,
            traveled: 0.0,
            age: 0.0,
            phase: BladePhase::Outbound,
            has_hit: false,
            curve_sign: if curve_sign < 0.0 { -1.0 } else { 1.0 },
        }
    }

    pub fn phase(&self) -> BladePhase {
        self.phase
    }

    pub fn has_hit(&self) -> bool {
        self.has_hit
    }

    pub fn is_destroyed(&self) -> bool {
        self.phase == BladePhase::Destroyed
    }

    pub fn start_return(&mut self) {
        if self.phase == BladePhase::Outbound {
            self.phase = BladePhase::Returning;
        }
    }

    pub fn destroy(&mut self) {
        self.phase = BladePhase::Destroyed;
    }

    /// Advances the blade one step. `owner_position` is `None` once the owner
    /// no longer resolves, which destroys the blade.
    pub fn advance(&mut self, dt: f32, owner_position: Option<Vec3>, tuning: &BladeTuning) {
        if self.is_destroyed() {
            return;
        }

        self.age += dt;
        if self.age > tuning.max_lifetime {
            self.destroy();
            return;
        }

        let Some(owner_position) = owner_position else {
            self.destroy();
            return;
        };

        match self.phase {
            BladePhase::Outbound => {
                let angle = self.curve_sign * tuning.curve_rate.to_radians() * dt;
                self.direction = rotate_about_vertical(self.direction, angle).normalize_or_zero();

                let step = tuning.speed * dt;
                self.position += self.direction * step;
                self.traveled += step;

                if self.traveled > tuning.max_range {
                    self.phase = BladePhase::Returning;
                }
            }
            BladePhase::Returning => {
                let target = Vec3::new(owner_position.x, self.position.y, owner_position.z);
                let to_owner = target - self.position;
                let distance = to_owner.length();
                if distance <= tuning.catch_radius {
                    self.destroy();
                    return;
                }

                self.direction = to_owner / distance;
                let step = (tuning.return_speed * dt).min(distance);
                self.position += self.direction * step;
                self.traveled += step;

                if self.position.distance(target) <= tuning.catch_radius {
                    self.destroy();
                }
            }
            BladePhase::Destroyed => {}
        }
    }

    /// Decides how to react to a contact, updating latches and phase.
    pub fn on_contact(&mut self, contact: BladeContact) -> ContactResponse {
        if self.is_destroyed() {
            return ContactResponse::Ignore;
        }

        match contact {
            BladeContact::Owner => {
                if self.phase == BladePhase::Returning {
                    self.destroy();
                    ContactResponse::Caught
                } else {
                    ContactResponse::Ignore
                }
            }
            BladeContact::Damageable { entity, alive } => {
                if !alive || self.has_hit {
                    return ContactResponse::Ignore;
                }
                self.has_hit = true;
                self.phase = BladePhase::Returning;
                ContactResponse::Strike { target: entity }
            }
            BladeContact::StaticGeometry => {
                if self.phase == BladePhase::Outbound {
                    self.phase = BladePhase::Returning;
                    ContactResponse::Bounce
                } else {
                    ContactResponse::Ignore
                }
            }
        }
    }

    pub fn snapshot(&self) -> BladeSnapshot {
        BladeSnapshot {
            id: self.id,
            owner: self.owner,
            position: self.position,
            returning: self.phase == BladePhase::Returning,
        }
    }
}
