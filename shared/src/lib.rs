use glam::Vec3;
use serde::{Deserialize, Serialize};

pub mod replication;

pub use replication::Replicated;

pub const PROTOCOL_VERSION: u32 = 1;

pub const MAX_HEALTH: f32 = 100.0;
pub const BLADE_COOLDOWN: f32 = 0.5;
pub const MINE_COOLDOWN: f32 = 1.0;
pub const FALL_THRESHOLD_Y: f32 = -10.0;
pub const COUNTDOWN_STEPS: u8 = 3;

/// Network identity of any replicated entity (kart, blade, mine).
pub type EntityId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WeaponType {
    #[default]
    None,
    Blade,
    Mine,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPhase {
    #[default]
    WaitingForPlayers,
    Countdown,
    Playing,
    GameOver,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ScoreEntry {
    pub display_name: String,
    pub kills: u32,
    pub deaths: u32,
    pub score: i32,
    pub connected: bool,
}

/// One replicated kart field, pushed whenever the authority commits a change.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum KartField {
    Health(f32),
    Alive(bool),
    Weapon(WeaponType),
    BladeAmmo(u32),
    MineAmmo(u32),
    Drifting(bool),
}

/// Requests a participant may submit to the authority.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum ClientCommand {
    Drive { throttle: f32, steer: f32 },
    SetDrifting { drifting: bool },
    FireWeapon { aim: Vec3 },
    DropMine,
    RequestFallRespawn,
    RequestRespawn,
}

/// Authority-to-all broadcasts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServerEvent {
    HitEffect {
        position: Vec3,
    },
    DamageFlash {
        entity: EntityId,
        amount: f32,
    },
    DeathEffect {
        entity: EntityId,
        killer: Option<EntityId>,
    },
    RespawnEffect {
        entity: EntityId,
        position: Vec3,
        yaw: f32,
    },
    WeaponFireSound {
        entity: EntityId,
        is_blade: bool,
    },
    MineArmSound {
        mine: EntityId,
    },
    MineExplodeEffect {
        mine: EntityId,
        position: Vec3,
    },
    PickupTaken {
        pad: u32,
        entity: EntityId,
    },
    PickupRespawned {
        pad: u32,
    },
    CountdownStep {
        remaining: u8,
    },
    MatchControlsEnabled,
    MatchPhaseChanged {
        phase: MatchPhase,
    },
    GameOver {
        winner_name: Option<String>,
    },
    ScoreboardChanged {
        entity: EntityId,
        entry: Option<ScoreEntry>,
    },
    KartChanged {
        entity: EntityId,
        field: KartField,
    },
    KartRemoved {
        entity: EntityId,
    },
}

/// Per-tick kart state: motion plus the current value of every replicated
/// field, so a mirror that missed an event packet catches up on the next one.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct KartSnapshot {
    pub id: EntityId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub health: f32,
    pub alive: bool,
    pub weapon: WeaponType,
    pub blade_ammo: u32,
    pub mine_ammo: u32,
    pub drifting: bool,
}

impl KartSnapshot {
    pub fn fields(&self) -> [KartField; 6] {
        [
            KartField::Health(self.health),
            KartField::Alive(self.alive),
            KartField::BladeAmmo(self.blade_ammo),
            KartField::MineAmmo(self.mine_ammo),
            KartField::Weapon(self.weapon),
            KartField::Drifting(self.drifting),
        ]
    }
}

/// Match-level state repeated in every snapshot.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct MatchState {
    pub phase: MatchPhase,
    pub time_remaining: f32,
    pub winner_name: Option<String>,
    pub scoreboard: Vec<(EntityId, ScoreEntry)>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct BladeSnapshot {
    pub id: EntityId,
    pub owner: EntityId,
    pub position: Vec3,
    pub returning: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct MineSnapshot {
    pub id: EntityId,
    pub owner: EntityId,
    pub position: Vec3,
    pub armed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        display_name: String,
    },
    Command {
        sequence: u32,
        command: ClientCommand,
    },
    Disconnect,

    Connected {
        client_id: u32,
        entity_id: EntityId,
    },
    Events {
        tick: u32,
        events: Vec<ServerEvent>,
    },
    Snapshot {
        tick: u32,
        timestamp: u64,
        state: MatchState,
        karts: Vec<KartSnapshot>,
        blades: Vec<BladeSnapshot>,
        mines: Vec<MineSnapshot>,
    },
    Disconnected {
        reason: String,
    },
}

/// Unit vector on the ground plane for a yaw angle (radians, 0 = +Z).
pub fn forward_from_yaw(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Rotates a direction around the vertical axis by `angle` radians.
pub fn rotate_about_vertical(direction: Vec3, angle: f32) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    Vec3::new(
        direction.x * cos + direction.z * sin,
        direction.y,
        -direction.x * sin + direction.z * cos,
    )
}
