//! Proximity mine.
//!
//! `Dormant -> Armed -> Exploding -> Destroyed`, plus silent expiry from
//! Dormant or Armed. Exploding is a one-way latch.

use crate::config::MineTuning;
use glam::Vec3;
use shared::{EntityId, MineSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinePhase {
    Dormant,
    Armed,
    Exploding,
    Destroyed,
}

#[derive(Debug, Clone)]
pub struct Mine {
    pub id: EntityId,
    pub owner: EntityId,
    pub position: Vec3,
    pub spawned_at: f64,
    phase: MinePhase,
}

impl Mine {
    pub fn new(id: EntityId, owner: EntityId, position: Vec3, now: f64) -> Self {
        Self {
            id,
            owner,
            position,
            spawned_at: now,
            phase: MinePhase::Dormant,
        }
    }

    pub fn phase(&self) -> MinePhase {
        self.phase
    }

    pub fn is_armed(&self) -> bool {
        self.phase == MinePhase::Armed
    }

    pub fn is_exploding(&self) -> bool {
        self.phase == MinePhase::Exploding
    }

    /// Dormant -> Armed. Returns false if the mine is in any other state.
    pub fn arm(&mut self) -> bool {
        if self.phase != MinePhase::Dormant {
            return false;
        }
        self.phase = MinePhase::Armed;
        true
    }

    /// Whether a live entity inside the detection radius sets the mine off.
    /// The owner is ignored during the grace period, or always when owners
    /// cannot trigger their own mines.
    pub fn is_triggered_by(&self, entity: EntityId, alive: bool, now: f64, tuning: &MineTuning) -> bool {
        if !self.is_armed() || !alive {
            return false;
        }
        if entity == self.owner {
            if !tuning.owner_can_trigger {
                return false;
            }
            if now - self.spawned_at < tuning.owner_grace as f64 {
                return false;
            }
        }
        true
    }

    /// Latches the explosion. A second call is a no-op and returns false.
    pub fn begin_explosion(&mut self) -> bool {
        if self.phase == MinePhase::Exploding || self.phase == MinePhase::Destroyed {
            return false;
        }
        self.phase = MinePhase::Exploding;
        true
    }

    /// Silent expiry. Only applies to mines that never went off.
    pub fn expire(&mut self) -> bool {
        match self.phase {
            MinePhase::Dormant | MinePhase::Armed => {
                self.phase = MinePhase::Destroyed;
                true
            }
            MinePhase::Exploding | MinePhase::Destroyed => false,
        }
    }

    pub fn snapshot(&self) -> MineSnapshot {
        MineSnapshot {
            id: self.id,
            owner: self.owner,
            position: self.position,
            armed: self.is_armed(),
        }
    }
}

/// Linear falloff: 1 at the centre, 0 at and beyond the radius.
pub fn falloff(distance: f32, radius: f32) -> f32 {
    if !(radius > 0.0) {
        return 0.0;
    }
    (1.0 - distance / radius).clamp(0.0, 1.0)
}

pub fn explosion_damage(base_damage: f32, distance: f32, radius: f32) -> f32 {
    base_damage * falloff(distance, radius)
}
