//! Server tunables, loaded from an optional TOML file.
//!
//! Every tunable is a constant for the lifetime of a match session and is
//! handed to entities when they are constructed. Missing keys fall back to
//! the defaults below.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use shared::{WeaponType, BLADE_COOLDOWN, FALL_THRESHOLD_Y, MAX_HEALTH, MINE_COOLDOWN};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub kart: KartTuning,
    pub blade: BladeTuning,
    pub mine: MineTuning,
    pub match_rules: MatchRules,
    pub arena: ArenaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KartTuning {
    pub max_health: f32,
    pub acceleration: f32,
    pub reverse_acceleration: f32,
    pub max_speed: f32,
    pub turn_rate: f32,
    pub min_steer_speed: f32,
    pub drift_turn_multiplier: f32,
    pub linear_drag: f32,
    pub lateral_drag: f32,
    pub drift_lateral_drag_multiplier: f32,
    pub gravity: f32,
    pub body_radius: f32,
    pub nose_radius: f32,
    pub nose_offset: f32,
    pub impact_threshold: f32,
    pub impact_damage_multiplier: f32,
    pub impact_cooldown: f32,
    pub fall_threshold: f32,
    pub fall_damage: f32,
    pub invulnerability: f32,
    pub respawn_delay: f32,
}

impl Default for KartTuning {
    fn default() -> Self {
        Self {
            max_health: MAX_HEALTH,
            acceleration: 18.0,
            reverse_acceleration: 9.0,
            max_speed: 20.0,
            turn_rate: 2.5,
            min_steer_speed: 0.5,
            drift_turn_multiplier: 1.6,
            linear_drag: 0.6,
            lateral_drag: 6.0,
            drift_lateral_drag_multiplier: 1.5,
            gravity: 20.0,
            body_radius: 1.0,
            nose_radius: 0.6,
            nose_offset: 1.0,
            impact_threshold: 8.0,
            impact_damage_multiplier: 2.0,
            impact_cooldown: 0.5,
            fall_threshold: FALL_THRESHOLD_Y,
            fall_damage: 25.0,
            invulnerability: 2.0,
            respawn_delay: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BladeTuning {
    pub speed: f32,
    pub return_speed: f32,
    pub max_range: f32,
    /// Degrees per second.
    pub curve_rate: f32,
    pub catch_radius: f32,
    pub damage: f32,
    pub knockback: f32,
    pub max_lifetime: f32,
    pub radius: f32,
    pub spawn_offset: f32,
    pub flight_height: f32,
    pub cooldown: f32,
}

impl Default for BladeTuning {
    fn default() -> Self {
        Self {
            speed: 25.0,
            return_speed: 35.0,
            max_range: 20.0,
            curve_rate: 20.0,
            catch_radius: 1.5,
            damage: 25.0,
            knockback: 8.0,
            max_lifetime: 6.0,
            radius: 0.5,
            spawn_offset: 1.8,
            flight_height: 0.5,
            cooldown: BLADE_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MineTuning {
    pub arming_delay: f32,
    pub detection_radius: f32,
    pub explosion_radius: f32,
    pub base_damage: f32,
    pub impulse: f32,
    pub owner_grace: f32,
    pub owner_can_trigger: bool,
    pub max_lifetime: f32,
    pub despawn_grace: f32,
    pub drop_offset: f32,
    pub cooldown: f32,
}

impl Default for MineTuning {
    fn default() -> Self {
        Self {
            arming_delay: 1.5,
            detection_radius: 2.5,
            explosion_radius: 5.0,
            base_damage: 60.0,
            impulse: 15.0,
            owner_grace: 3.0,
            owner_can_trigger: true,
            max_lifetime: 30.0,
            despawn_grace: 0.1,
            drop_offset: 2.0,
            cooldown: MINE_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchRules {
    pub min_players: usize,
    pub duration: f32,
    pub time_limited: bool,
    pub score_to_win: i32,
    pub score_limited: bool,
    /// Seconds after game over before the match restarts; 0 disables.
    pub restart_delay: f32,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            min_players: 2,
            duration: 180.0,
            time_limited: true,
            score_to_win: 10,
            score_limited: true,
            restart_delay: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SpawnPoint {
    pub position: Vec3,
    pub yaw: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ObstacleConfig {
    pub center: Vec3,
    pub half_extents: Vec3,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PickupConfig {
    pub position: Vec3,
    pub weapon: WeaponType,
    pub amount: u32,
    pub radius: f32,
    pub respawn_time: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Half the side length of the square arena floor.
    pub half_size: f32,
    pub random_spawns: bool,
    pub spawn_points: Vec<SpawnPoint>,
    pub obstacles: Vec<ObstacleConfig>,
    pub pickups: Vec<PickupConfig>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        let corner = 30.0;
        let spawn_points = [
            (Vec3::new(-corner, 0.0, -corner), 0.785),
            (Vec3::new(corner, 0.0, -corner), -0.785),
            (Vec3::new(corner, 0.0, corner), -2.356),
            (Vec3::new(-corner, 0.0, corner), 2.356),
        ]
        .into_iter()
        .map(|(position, yaw)| SpawnPoint { position, yaw })
        .collect();

        let obstacles = [
            Vec3::new(-12.0, 1.5, 0.0),
            Vec3::new(12.0, 1.5, 0.0),
            Vec3::new(0.0, 1.5, -12.0),
            Vec3::new(0.0, 1.5, 12.0),
        ]
        .into_iter()
        .map(|center| ObstacleConfig {
            center,
            half_extents: Vec3::new(2.0, 1.5, 2.0),
        })
        .collect();

        let pickups = vec![
            PickupConfig {
                position: Vec3::new(0.0, 0.0, 0.0),
                weapon: WeaponType::Blade,
                amount: 3,
                radius: 1.5,
                respawn_time: 8.0,
            },
            PickupConfig {
                position: Vec3::new(-20.0, 0.0, 20.0),
                weapon: WeaponType::Mine,
                amount: 2,
                radius: 1.5,
                respawn_time: 12.0,
            },
            PickupConfig {
                position: Vec3::new(20.0, 0.0, -20.0),
                weapon: WeaponType::Mine,
                amount: 2,
                radius: 1.5,
                respawn_time: 12.0,
            },
        ];

        Self {
            half_size: 40.0,
            random_spawns: false,
            spawn_points,
            obstacles,
            pickups,
        }
    }
}

impl ServerConfig {
    /// Loads a config file, or returns defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("kart.max_health", self.kart.max_health),
            ("kart.max_speed", self.kart.max_speed),
            ("kart.body_radius", self.kart.body_radius),
            ("blade.speed", self.blade.speed),
            ("blade.return_speed", self.blade.return_speed),
            ("blade.max_range", self.blade.max_range),
            ("blade.catch_radius", self.blade.catch_radius),
            ("blade.radius", self.blade.radius),
            ("mine.detection_radius", self.mine.detection_radius),
            ("mine.explosion_radius", self.mine.explosion_radius),
            ("arena.half_size", self.arena.half_size),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }

        let non_negative = [
            ("kart.respawn_delay", self.kart.respawn_delay),
            ("kart.invulnerability", self.kart.invulnerability),
            ("kart.impact_cooldown", self.kart.impact_cooldown),
            ("blade.cooldown", self.blade.cooldown),
            ("blade.max_lifetime", self.blade.max_lifetime),
            ("mine.arming_delay", self.mine.arming_delay),
            ("mine.owner_grace", self.mine.owner_grace),
            ("mine.max_lifetime", self.mine.max_lifetime),
            ("mine.despawn_grace", self.mine.despawn_grace),
            ("mine.cooldown", self.mine.cooldown),
            ("match_rules.duration", self.match_rules.duration),
            ("match_rules.restart_delay", self.match_rules.restart_delay),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must not be negative")));
            }
        }

        if self.match_rules.min_players == 0 {
            return Err(ConfigError::Invalid(
                "match_rules.min_players must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
