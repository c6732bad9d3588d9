//! Weapon pickup pads placed around the arena.

use crate::config::PickupConfig;
use glam::Vec3;
use shared::WeaponType;

#[derive(Debug, Clone)]
pub struct PickupPad {
    pub index: u32,
    pub position: Vec3,
    pub weapon: WeaponType,
    pub amount: u32,
    pub radius: f32,
    pub respawn_time: f32,
    active: bool,
}

impl PickupPad {
    pub fn new(index: u32, config: &PickupConfig) -> Self {
        Self {
            index,
            position: config.position,
            weapon: config.weapon,
            amount: config.amount,
            radius: config.radius,
            respawn_time: config.respawn_time,
            active: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Ground-plane overlap, so bouncing karts still collect.
    pub fn overlaps(&self, position: Vec3) -> bool {
        let dx = position.x - self.position.x;
        let dz = position.z - self.position.z;
        dx * dx + dz * dz <= self.radius * self.radius
    }

    /// Deactivates the pad. Returns false if it was already taken.
    pub fn take(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    /// Returns true if the pad came back this call.
    pub fn reactivate(&mut self) -> bool {
        !std::mem::replace(&mut self.active, true)
    }
}

pub fn build_pads(configs: &[PickupConfig]) -> Vec<PickupPad> {
    configs
        .iter()
        .enumerate()
        .map(|(i, config)| PickupPad::new(i as u32, config))
        .collect()
}
