//! Requester side of the command surface.
//!
//! The controller decides when it is worth asking the authority for something:
//! it skips requests the mirror already shows would be rejected, keeps its own
//! weapon cooldown clock, and reports each fall below the arena exactly once.
//! The authority still validates every request on arrival.

use glam::Vec3;
use shared::{
    ClientCommand, Packet, WeaponType, BLADE_COOLDOWN, FALL_THRESHOLD_Y, MINE_COOLDOWN,
};

use crate::mirror::Mirror;

#[derive(Debug)]
pub struct Controller {
    clock: f64,
    next_sequence: u32,
    blade_ready_at: f64,
    mine_ready_at: f64,
    fall_reported: bool,
    drifting: bool,
}

impl Controller {
    pub fn new() -> Self {
        Self {
            clock: 0.0,
            next_sequence: 1,
            blade_ready_at: 0.0,
            mine_ready_at: 0.0,
            fall_reported: false,
            drifting: false,
        }
    }

    /// Advances the local cooldown clock.
    pub fn advance(&mut self, dt: f32) {
        self.clock += dt as f64;
    }

    pub fn drive(&self, throttle: f32, steer: f32) -> ClientCommand {
        ClientCommand::Drive {
            throttle: throttle.clamp(-1.0, 1.0),
            steer: steer.clamp(-1.0, 1.0),
        }
    }

    /// Only produces a request when the drift state actually changes.
    pub fn set_drifting(&mut self, drifting: bool) -> Option<ClientCommand> {
        if self.drifting == drifting {
            return None;
        }
        self.drifting = drifting;
        Some(ClientCommand::SetDrifting { drifting })
    }

    fn can_use(&self, mirror: &Mirror, weapon: WeaponType) -> bool {
        if !mirror.controls_enabled() {
            return false;
        }
        match mirror.local_kart() {
            Some(kart) => {
                let ammo = match weapon {
                    WeaponType::Blade => *kart.blade_ammo.get(),
                    WeaponType::Mine => *kart.mine_ammo.get(),
                    WeaponType::None => 0,
                };
                *kart.weapon.get() == weapon && ammo > 0
            }
            None => false,
        }
    }

    pub fn fire(&mut self, mirror: &Mirror, aim: Vec3) -> Option<ClientCommand> {
        if self.clock < self.blade_ready_at || !self.can_use(mirror, WeaponType::Blade) {
            return None;
        }
        self.blade_ready_at = self.clock + BLADE_COOLDOWN as f64;
        Some(ClientCommand::FireWeapon { aim })
    }

    pub fn drop_mine(&mut self, mirror: &Mirror) -> Option<ClientCommand> {
        if self.clock < self.mine_ready_at || !self.can_use(mirror, WeaponType::Mine) {
            return None;
        }
        self.mine_ready_at = self.clock + MINE_COOLDOWN as f64;
        Some(ClientCommand::DropMine)
    }

    /// Reports a fall once per breach; climbing back above the threshold (or
    /// being placed back at a spawn) re-arms the check.
    pub fn check_fall(&mut self, mirror: &Mirror) -> Option<ClientCommand> {
        let kart = mirror.local_kart()?;

        if kart.position.y >= FALL_THRESHOLD_Y {
            self.fall_reported = false;
            return None;
        }
        if self.fall_reported || !kart.is_alive() {
            return None;
        }

        self.fall_reported = true;
        Some(ClientCommand::RequestFallRespawn)
    }

    pub fn request_respawn(&self, mirror: &Mirror) -> Option<ClientCommand> {
        match mirror.local_kart() {
            Some(kart) if !kart.is_alive() => Some(ClientCommand::RequestRespawn),
            _ => None,
        }
    }

    /// Wraps a command with the next sequence number.
    pub fn package(&mut self, command: ClientCommand) -> Packet {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        Packet::Command { sequence, command }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}
