//! Kart entities and the drive model.
//!
//! A kart is any damageable vehicle in the arena: either controlled by a
//! connected participant or by the authority itself (AI karts).

use crate::config::KartTuning;
use crate::health::Health;
use crate::inventory::Inventory;
use crate::physics::KartBody;
use glam::Vec3;
use shared::{EntityId, KartField, KartSnapshot, Replicated, ServerEvent};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveInput {
    pub throttle: f32,
    pub steer: f32,
}

impl DriveInput {
    /// Clamps to [-1, 1] and zeroes non-finite values.
    pub fn sanitized(throttle: f32, steer: f32) -> Self {
        let clean = |v: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        Self {
            throttle: clean(throttle),
            steer: clean(steer),
        }
    }
}

/// Wandering driver for authority-controlled karts.
#[derive(Debug, Clone, Copy)]
pub struct AiDriver {
    phase: f32,
}

impl AiDriver {
    pub fn new(phase: f32) -> Self {
        Self { phase }
    }

    /// Steers in slow sweeps and turns back toward the centre near the edge.
    pub fn next_input(&mut self, body: &KartBody, arena_half_size: f32, dt: f32) -> DriveInput {
        self.phase += dt * 0.7;

        let flat = Vec3::new(body.position.x, 0.0, body.position.z);
        let steer = if flat.length() > arena_half_size * 0.7 {
            let to_center = -flat.normalize_or_zero();
            let forward = body.forward();
            // Cross product's vertical component gives the turn direction.
            let side = forward.z * to_center.x - forward.x * to_center.z;
            side.signum()
        } else {
            self.phase.sin() * 0.6
        };

        DriveInput::sanitized(0.6, steer)
    }
}

#[derive(Debug)]
pub struct Kart {
    pub id: EntityId,
    pub client_id: Option<u32>,
    pub display_name: String,
    pub body: KartBody,
    pub input: DriveInput,
    pub drifting: Replicated<bool>,
    pub health: Health,
    pub inventory: Inventory,
    /// Incremented on every respawn; deferred respawns compare against it.
    pub life: u32,
    pub ai: Option<AiDriver>,
    pub grounded: bool,
    last_impact_damage: Option<f64>,
}

impl Kart {
    pub fn new(
        id: EntityId,
        client_id: Option<u32>,
        display_name: String,
        body: KartBody,
        tuning: &KartTuning,
    ) -> Self {
        Self {
            id,
            client_id,
            display_name,
            body,
            input: DriveInput::default(),
            drifting: Replicated::new(false),
            health: Health::new(tuning.max_health),
            inventory: Inventory::new(),
            life: 0,
            ai: None,
            grounded: true,
            last_impact_damage: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health.is_alive()
    }

    /// Applies the latest drive input for one step. With controls disabled the
    /// kart coasts on neutral input, but the held input is kept.
    ///
    /// Steering only bites above the minimum speed; drifting turns harder and
    /// bleeds more lateral velocity.
    pub fn drive(&mut self, controls_enabled: bool, dt: f32, tuning: &KartTuning) {
        let input = if controls_enabled { self.input } else { DriveInput::default() };
        let drifting = *self.drifting.get();
        let body = &mut self.body;
        let forward = body.forward();

        if self.grounded {
            let accel = if input.throttle >= 0.0 {
                tuning.acceleration
            } else {
                tuning.reverse_acceleration
            };
            body.velocity += forward * input.throttle * accel * dt;
        }

        let mut planar = Vec3::new(body.velocity.x, 0.0, body.velocity.z);
        let forward_speed = planar.dot(forward);

        if planar.length() > tuning.min_steer_speed {
            let multiplier = if drifting { tuning.drift_turn_multiplier } else { 1.0 };
            body.angular_velocity = input.steer * tuning.turn_rate * multiplier * forward_speed.signum();
        } else {
            body.angular_velocity = 0.0;
        }
        body.yaw += body.angular_velocity * dt;

        if self.grounded {
            let lateral_drag = if drifting {
                tuning.lateral_drag * tuning.drift_lateral_drag_multiplier
            } else {
                tuning.lateral_drag
            };
            let new_forward = body.forward();
            let along = new_forward * planar.dot(new_forward);
            let lateral = planar - along;
            let lateral = lateral * (1.0 - lateral_drag * dt).max(0.0);
            planar = (along + lateral) * (1.0 - tuning.linear_drag * dt).max(0.0);
        }

        let speed = planar.length();
        if speed > tuning.max_speed {
            planar *= tuning.max_speed / speed;
        }

        body.velocity.x = planar.x;
        body.velocity.z = planar.z;
    }

    /// Vertical integration against the arena floor.
    pub fn integrate(&mut self, dt: f32, over_floor: bool, tuning: &KartTuning) {
        let body = &mut self.body;
        if !(over_floor && body.position.y >= -0.01 && body.position.y <= 0.05 && body.velocity.y <= 0.0) {
            body.velocity.y -= tuning.gravity * dt;
        }

        body.position += body.velocity * dt;

        if over_floor && body.position.y <= 0.0 && body.position.y > -0.5 && body.velocity.y <= 0.0 {
            body.position.y = 0.0;
            body.velocity.y = 0.0;
            self.grounded = true;
        } else {
            self.grounded = false;
        }
    }

    /// Self-inflicted damage for a hard impact, rate limited by the impact
    /// cooldown. Returns the damage to apply, if any.
    pub fn impact_damage(&mut self, impact_speed: f32, now: f64, tuning: &KartTuning) -> Option<f32> {
        if impact_speed <= tuning.impact_threshold {
            return None;
        }
        if let Some(last) = self.last_impact_damage {
            if now - last < tuning.impact_cooldown as f64 {
                return None;
            }
        }
        self.last_impact_damage = Some(now);
        Some((impact_speed - tuning.impact_threshold) * tuning.impact_damage_multiplier)
    }

    pub fn is_below_fall_threshold(&self, tuning: &KartTuning) -> bool {
        self.body.position.y < tuning.fall_threshold
    }

    pub fn snapshot(&self) -> KartSnapshot {
        KartSnapshot {
            id: self.id,
            position: self.body.position,
            velocity: self.body.velocity,
            yaw: self.body.yaw,
            health: self.health.value(),
            alive: self.health.is_alive(),
            weapon: self.inventory.equipped(),
            blade_ammo: *self.inventory.blade_ammo.get(),
            mine_ammo: *self.inventory.mine_ammo.get(),
            drifting: *self.drifting.get(),
        }
    }

    /// Collects every replicated field that changed since the last call.
    pub fn drain_changes(&mut self, events: &mut Vec<ServerEvent>) {
        let entity = self.id;
        let mut push = |field: KartField| events.push(ServerEvent::KartChanged { entity, field });

        if let Some(v) = self.health.current.take_dirty() {
            push(KartField::Health(v));
        }
        if let Some(v) = self.health.alive.take_dirty() {
            push(KartField::Alive(v));
        }
        if let Some(v) = self.inventory.blade_ammo.take_dirty() {
            push(KartField::BladeAmmo(v));
        }
        if let Some(v) = self.inventory.mine_ammo.take_dirty() {
            push(KartField::MineAmmo(v));
        }
        if let Some(v) = self.inventory.equipped.take_dirty() {
            push(KartField::Weapon(v));
        }
        if let Some(v) = self.drifting.take_dirty() {
            push(KartField::Drifting(v));
        }
    }

    /// Every replicated field, for a participant that just joined.
    pub fn full_state(&self) -> Vec<ServerEvent> {
        [
            KartField::Health(self.health.value()),
            KartField::Alive(self.health.is_alive()),
            KartField::BladeAmmo(*self.inventory.blade_ammo.get()),
            KartField::MineAmmo(*self.inventory.mine_ammo.get()),
            KartField::Weapon(self.inventory.equipped()),
            KartField::Drifting(*self.drifting.get()),
        ]
        .into_iter()
        .map(|field| ServerEvent::KartChanged {
            entity: self.id,
            field,
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::WeaponType;

    fn test_kart() -> Kart {
        Kart::new(
            1,
            Some(1),
            "ana".to_string(),
            KartBody::at(Vec3::ZERO, 0.0),
            &KartTuning::default(),
        )
    }

    #[test]
    fn test_throttle_accelerates_forward() {
        let tuning = KartTuning::default();
        let mut kart = test_kart();
        kart.input = DriveInput::sanitized(1.0, 0.0);

        for _ in 0..30 {
            kart.drive(true, 1.0 / 30.0, &tuning);
            kart.integrate(1.0 / 30.0, true, &tuning);
        }

        assert!(kart.body.position.z > 1.0);
        assert_approx_eq!(kart.body.position.x, 0.0, 1e-4);
        assert_approx_eq!(kart.body.position.y, 0.0, 1e-4);
    }

    #[test]
    fn test_no_steering_below_min_speed() {
        let tuning = KartTuning::default();
        let mut kart = test_kart();
        kart.input = DriveInput::sanitized(0.0, 1.0);

        kart.drive(true, 1.0 / 30.0, &tuning);
        assert_approx_eq!(kart.body.yaw, 0.0);
    }

    #[test]
    fn test_drift_turns_faster() {
        let tuning = KartTuning::default();
        let mut grip = test_kart();
        let mut drift = test_kart();
        for kart in [&mut grip, &mut drift] {
            kart.body.velocity = Vec3::new(0.0, 0.0, 10.0);
            kart.input = DriveInput::sanitized(0.0, 1.0);
        }
        drift.drifting.set(true);

        grip.drive(true, 0.1, &tuning);
        drift.drive(true, 0.1, &tuning);

        assert!(drift.body.yaw > grip.body.yaw);
        assert!(grip.body.yaw > 0.0);
    }

    #[test]
    fn test_disabled_controls_coast_but_keep_input() {
        let tuning = KartTuning::default();
        let mut kart = test_kart();
        kart.input = DriveInput::sanitized(1.0, 0.0);

        kart.drive(false, 1.0 / 30.0, &tuning);

        assert_eq!(kart.body.velocity, Vec3::ZERO);
        assert_eq!(kart.input.throttle, 1.0);
    }

    #[test]
    fn test_speed_capped() {
        let tuning = KartTuning::default();
        let mut kart = test_kart();
        kart.body.velocity = Vec3::new(0.0, 0.0, 100.0);
        kart.drive(true, 1.0 / 30.0, &tuning);
        assert!(kart.body.velocity.length() <= tuning.max_speed + 1e-3);
    }

    #[test]
    fn test_off_floor_falls() {
        let tuning = KartTuning::default();
        let mut kart = test_kart();
        for _ in 0..60 {
            kart.integrate(1.0 / 30.0, false, &tuning);
        }
        assert!(kart.is_below_fall_threshold(&tuning));
        assert!(!kart.grounded);
    }

    #[test]
    fn test_impact_damage_formula_and_cooldown() {
        let tuning = KartTuning::default();
        let mut kart = test_kart();

        assert_eq!(kart.impact_damage(5.0, 0.0, &tuning), None);
        let damage = kart.impact_damage(13.0, 1.0, &tuning).unwrap();
        assert_approx_eq!(damage, (13.0 - 8.0) * 2.0);
        assert_eq!(kart.impact_damage(20.0, 1.2, &tuning), None);
        assert!(kart.impact_damage(20.0, 1.6, &tuning).is_some());
    }

    #[test]
    fn test_sanitized_input() {
        let input = DriveInput::sanitized(f32::NAN, 4.0);
        assert_eq!(input, DriveInput { throttle: 0.0, steer: 1.0 });
    }

    #[test]
    fn test_drain_changes_reports_each_field_once() {
        let mut kart = test_kart();
        kart.inventory.give(WeaponType::Blade, 2);
        kart.health.take_damage(10.0, None, 0.0);

        let mut events = Vec::new();
        kart.drain_changes(&mut events);
        assert_eq!(events.len(), 3);
        assert!(events.contains(&ServerEvent::KartChanged {
            entity: 1,
            field: KartField::Weapon(WeaponType::Blade),
        }));

        events.clear();
        kart.drain_changes(&mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn test_ai_turns_back_near_edge() {
        let mut ai = AiDriver::new(0.0);
        let body = KartBody::at(Vec3::new(35.0, 0.0, 0.0), std::f32::consts::FRAC_PI_2);
        let input = ai.next_input(&body, 40.0, 1.0 / 30.0);
        assert!(input.steer.abs() > 0.99);
    }
}
