//! The authoritative arena world.
//!
//! `GameState` owns every kart, projectile, pickup pad, the scoreboard and
//! the match lifecycle. It is the only writer: commands from participants are
//! applied between ticks, and everything observers need to know leaves
//! through the event outbox (`drain_events`) or a periodic snapshot.

use crate::blade::{Blade, BladeContact, ContactResponse};
use crate::config::ServerConfig;
use crate::health::DamageOutcome;
use crate::inventory::FireRejection;
use crate::kart::{AiDriver, DriveInput, Kart};
use crate::lifecycle::MatchLifecycle;
use crate::mine::{falloff, Mine, MinePhase};
use crate::physics::{
    calculate_required_substeps, radial_impulse, resolve_kart_contact, KartBody, PhysicsWorld,
    QueryFilter,
};
use crate::pickups::{build_pads, PickupPad};
use crate::scheduler::{Scheduler, Task};
use crate::scoreboard::Scoreboard;
use crate::spawn::SpawnPlacement;
use glam::Vec3;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ClientCommand, EntityId, MatchPhase, MatchState, Packet, ServerEvent, WeaponType};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug)]
pub struct GameState {
    pub tick: u32,
    now: f64,
    config: ServerConfig,
    rng: StdRng,
    next_entity_id: EntityId,
    pub karts: BTreeMap<EntityId, Kart>,
    clients: HashMap<u32, EntityId>,
    blades: Vec<Blade>,
    mines: Vec<Mine>,
    pads: Vec<PickupPad>,
    physics: PhysicsWorld,
    spawns: SpawnPlacement,
    lifecycle: MatchLifecycle,
    scoreboard: Scoreboard,
    scheduler: Scheduler,
    events: Vec<ServerEvent>,
}

impl GameState {
    pub fn new(config: ServerConfig, seed: u64) -> Self {
        Self {
            tick: 0,
            now: 0.0,
            rng: StdRng::seed_from_u64(seed),
            next_entity_id: 1,
            karts: BTreeMap::new(),
            clients: HashMap::new(),
            blades: Vec::new(),
            mines: Vec::new(),
            pads: build_pads(&config.arena.pickups),
            physics: PhysicsWorld::new(&config.arena),
            spawns: SpawnPlacement::new(config.arena.spawn_points.clone(), config.arena.random_spawns),
            lifecycle: MatchLifecycle::new(config.match_rules.clone()),
            scoreboard: Scoreboard::new(),
            scheduler: Scheduler::new(),
            events: Vec::new(),
            config,
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn phase(&self) -> MatchPhase {
        self.lifecycle.phase()
    }

    pub fn lifecycle(&self) -> &MatchLifecycle {
        &self.lifecycle
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn blades(&self) -> &[Blade] {
        &self.blades
    }

    pub fn mines(&self) -> &[Mine] {
        &self.mines
    }

    pub fn pads(&self) -> &[PickupPad] {
        &self.pads
    }

    pub fn kart(&self, id: EntityId) -> Option<&Kart> {
        self.karts.get(&id)
    }

    pub fn kart_for_client(&self, client_id: u32) -> Option<EntityId> {
        self.clients.get(&client_id).copied()
    }

    pub fn connected_players(&self) -> usize {
        self.clients.len()
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1);
        id
    }

    fn spawn_kart(&mut self, client_id: Option<u32>, display_name: String) -> EntityId {
        let id = self.allocate_id();
        let body = match self.spawns.next_spawn_point(&mut self.rng) {
            Some(point) => KartBody::at(point.position, point.yaw),
            None => KartBody::default(),
        };

        let kart = Kart::new(id, client_id, display_name, body, &self.config.kart);
        self.events.extend(kart.full_state());
        self.karts.insert(id, kart);
        id
    }

    /// Creates the kart for a newly connected participant.
    pub fn add_player(&mut self, client_id: u32, display_name: &str) -> EntityId {
        let id = self.spawn_kart(Some(client_id), display_name.to_string());
        self.clients.insert(client_id, id);
        self.scoreboard.register_player(id, display_name);

        info!("Added player {} ({}) as kart {}", client_id, display_name, id);
        id
    }

    /// Removes a participant's kart. Their blades observe the missing owner
    /// on the next step and self-destruct; their scoreboard row stays.
    pub fn remove_player(&mut self, client_id: u32) -> Option<EntityId> {
        let id = self.clients.remove(&client_id)?;
        self.karts.remove(&id);
        self.scoreboard.unregister_player(id);
        self.events.push(ServerEvent::KartRemoved { entity: id });

        info!("Removed player {} (kart {})", client_id, id);
        Some(id)
    }

    /// Adds an authority-driven kart. AI karts never appear on the scoreboard.
    pub fn add_ai_kart(&mut self, display_name: &str) -> EntityId {
        let id = self.spawn_kart(None, display_name.to_string());
        let phase = self.rng.gen_range(0.0..std::f32::consts::TAU);
        if let Some(kart) = self.karts.get_mut(&id) {
            kart.ai = Some(AiDriver::new(phase));
        }

        info!("Added AI kart {} ({})", id, display_name);
        id
    }

    /// Applies one command from a connected participant. Unknown callers and
    /// stale requests are dropped without feedback.
    pub fn apply_command(&mut self, client_id: u32, command: ClientCommand) {
        match self.clients.get(&client_id) {
            Some(&kart_id) => self.apply_kart_command(kart_id, command),
            None => debug!("Dropping command from unknown client {}", client_id),
        }
    }

    fn apply_kart_command(&mut self, kart_id: EntityId, command: ClientCommand) {
        match command {
            ClientCommand::Drive { throttle, steer } => {
                if let Some(kart) = self.karts.get_mut(&kart_id) {
                    kart.input = DriveInput::sanitized(throttle, steer);
                }
            }
            ClientCommand::SetDrifting { drifting } => {
                if let Some(kart) = self.karts.get_mut(&kart_id) {
                    if kart.is_alive() {
                        kart.drifting.set(drifting);
                    }
                }
            }
            ClientCommand::FireWeapon { aim } => {
                if let Err(reason) = self.fire_blade(kart_id, aim) {
                    debug!("Kart {} fire rejected: {}", kart_id, reason);
                }
            }
            ClientCommand::DropMine => {
                if let Err(reason) = self.drop_mine(kart_id) {
                    debug!("Kart {} mine drop rejected: {}", kart_id, reason);
                }
            }
            ClientCommand::RequestFallRespawn => self.handle_fall(kart_id),
            ClientCommand::RequestRespawn => {
                if !self.request_respawn(kart_id) {
                    debug!("Kart {} respawn request rejected: still alive", kart_id);
                }
            }
        }
    }

    fn check_controls(&self, kart_id: EntityId) -> Result<(), FireRejection> {
        let alive = self.karts.get(&kart_id).is_some_and(|k| k.is_alive());
        if !alive || !self.lifecycle.controls_enabled() {
            return Err(FireRejection::ControlsDisabled);
        }
        Ok(())
    }

    /// Validates a fire request and launches a blade along `aim`.
    pub fn fire_blade(&mut self, kart_id: EntityId, aim: Vec3) -> Result<EntityId, FireRejection> {
        self.check_controls(kart_id)?;
        let tuning = &self.config.blade;
        let kart = self
            .karts
            .get_mut(&kart_id)
            .ok_or(FireRejection::ControlsDisabled)?;

        kart.inventory.try_consume(WeaponType::Blade, self.now, tuning.cooldown)?;

        let mut direction = Vec3::new(aim.x, 0.0, aim.z).normalize_or_zero();
        if direction == Vec3::ZERO {
            direction = kart.body.forward();
        }
        let position = kart.body.position + direction * tuning.spawn_offset + Vec3::Y * tuning.flight_height;
        let curve_sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };

        let id = self.allocate_id();
        self.blades.push(Blade::new(id, kart_id, position, direction, curve_sign));
        self.events.push(ServerEvent::WeaponFireSound {
            entity: kart_id,
            is_blade: true,
        });
        Ok(id)
    }

    /// Validates a drop request and leaves a dormant mine behind the kart.
    pub fn drop_mine(&mut self, kart_id: EntityId) -> Result<EntityId, FireRejection> {
        self.check_controls(kart_id)?;
        let tuning = &self.config.mine;
        let kart = self
            .karts
            .get_mut(&kart_id)
            .ok_or(FireRejection::ControlsDisabled)?;

        kart.inventory.try_consume(WeaponType::Mine, self.now, tuning.cooldown)?;
        let position = kart.body.position - kart.body.forward() * tuning.drop_offset;
        let (arming_delay, max_lifetime) = (tuning.arming_delay, tuning.max_lifetime);

        let id = self.allocate_id();
        self.mines.push(Mine::new(id, kart_id, position, self.now));
        self.scheduler
            .schedule(self.now + arming_delay as f64, Task::ArmMine { mine: id });
        self.scheduler
            .schedule(self.now + max_lifetime as f64, Task::ExpireMine { mine: id });
        self.events.push(ServerEvent::WeaponFireSound {
            entity: kart_id,
            is_blade: false,
        });
        Ok(id)
    }

    /// Pickup grant. Returns false if the kart is missing or dead.
    pub fn give_pickup_to(&mut self, kart_id: EntityId, weapon: WeaponType, amount: u32) -> bool {
        match self.karts.get_mut(&kart_id) {
            Some(kart) if kart.is_alive() => {
                kart.inventory.give(weapon, amount);
                true
            }
            _ => false,
        }
    }

    /// Damages a kart and runs the death transition when it is lethal.
    pub fn damage_kart(&mut self, target: EntityId, amount: f32, attacker: Option<EntityId>) -> DamageOutcome {
        let Some(kart) = self.karts.get_mut(&target) else {
            return DamageOutcome::Ignored;
        };

        let outcome = kart.health.take_damage(amount, attacker, self.now);
        if outcome != DamageOutcome::Ignored {
            self.events.push(ServerEvent::DamageFlash { entity: target, amount });
        }
        if outcome == DamageOutcome::Lethal {
            self.kill_kart(target);
        }
        outcome
    }

    /// Death transition. Returns false if the kart was already dead.
    pub fn kill_kart(&mut self, target: EntityId) -> bool {
        let Some(kart) = self.karts.get_mut(&target) else {
            return false;
        };
        let Some(attacker) = kart.health.die() else {
            return false;
        };

        kart.body.stop();
        kart.input = DriveInput::default();
        kart.drifting.set(false);
        let life = kart.life;

        let killer = attacker.filter(|&k| k != target);
        match killer {
            Some(killer) => self.scoreboard.add_kill(killer, target),
            None => self.scoreboard.add_death(target),
        }
        info!("Kart {} died, killer: {:?}", target, killer);

        self.events.push(ServerEvent::DeathEffect { entity: target, killer });
        self.scheduler.schedule(
            self.now + self.config.kart.respawn_delay as f64,
            Task::RespawnKart { kart: target, life },
        );
        true
    }

    /// Moves a kart to the next spawn point, or leaves it where it is when no
    /// spawn points are configured, and stops it.
    fn place_at_spawn(&mut self, kart_id: EntityId) -> Option<(Vec3, f32)> {
        let point = self.spawns.next_spawn_point(&mut self.rng);
        let kart = self.karts.get_mut(&kart_id)?;
        let (position, yaw) = match point {
            Some(point) => (point.position, point.yaw),
            None => (kart.body.position, kart.body.yaw),
        };

        kart.body = KartBody::at(position, yaw);
        kart.grounded = true;
        kart.input = DriveInput::default();
        self.events.push(ServerEvent::RespawnEffect {
            entity: kart_id,
            position,
            yaw,
        });
        Some((position, yaw))
    }

    /// Brings a kart back with full health and a fresh invulnerability window.
    pub fn respawn_kart(&mut self, kart_id: EntityId) -> bool {
        if self.place_at_spawn(kart_id).is_none() {
            return false;
        }
        let Some(kart) = self.karts.get_mut(&kart_id) else {
            return false;
        };

        kart.health.respawn(self.now, self.config.kart.invulnerability);
        kart.life = kart.life.wrapping_add(1);
        debug!("Kart {} respawned (life {})", kart_id, kart.life);
        true
    }

    /// Participant-requested respawn; honoured only while dead.
    pub fn request_respawn(&mut self, kart_id: EntityId) -> bool {
        match self.karts.get(&kart_id) {
            Some(kart) if !kart.is_alive() => self.respawn_kart(kart_id),
            _ => false,
        }
    }

    /// Fall recovery: applies fall damage and, if the kart survives, returns
    /// it to a spawn point with its remaining health.
    fn handle_fall(&mut self, kart_id: EntityId) {
        let breached = self
            .karts
            .get(&kart_id)
            .is_some_and(|k| k.is_alive() && k.is_below_fall_threshold(&self.config.kart));
        if !breached {
            debug!("Kart {} fall respawn rejected", kart_id);
            return;
        }

        let outcome = self.damage_kart(kart_id, self.config.kart.fall_damage, None);
        if outcome == DamageOutcome::Lethal {
            return;
        }
        self.place_at_spawn(kart_id);
    }

    /// Detonates a mine. Re-entry once it is exploding is a no-op.
    pub fn explode_mine(&mut self, mine_id: EntityId) -> bool {
        let Some(mine) = self.mines.iter_mut().find(|m| m.id == mine_id) else {
            return false;
        };
        if !mine.begin_explosion() {
            return false;
        }
        let (origin, owner) = (mine.position, mine.owner);
        let tuning = self.config.mine.clone();

        self.events.push(ServerEvent::MineExplodeEffect {
            mine: mine_id,
            position: origin,
        });

        self.rebuild_colliders();
        let mut seen = HashSet::new();
        let targets: Vec<EntityId> = self
            .physics
            .overlap_sphere(origin, tuning.explosion_radius, QueryFilter::ENTITIES)
            .into_iter()
            .filter_map(|hit| hit.owner)
            .filter(|entity| seen.insert(*entity))
            .collect();

        for target in targets {
            let Some(kart) = self.karts.get_mut(&target) else {
                continue;
            };
            let factor = falloff(kart.body.position.distance(origin), tuning.explosion_radius);
            if factor <= 0.0 {
                continue;
            }
            let impulse = radial_impulse(origin, kart.body.position, tuning.impulse * factor);
            kart.body.apply_impulse(impulse);
            self.damage_kart(target, tuning.base_damage * factor, Some(owner));
        }

        self.scheduler.schedule(
            self.now + tuning.despawn_grace as f64,
            Task::DespawnMine { mine: mine_id },
        );
        true
    }

    /// Returns to `WaitingForPlayers` with a clean arena.
    pub fn restart_match(&mut self) {
        self.lifecycle.restart(&mut self.scoreboard, &mut self.events);
        self.blades.clear();
        self.mines.clear();

        for pad in &mut self.pads {
            if pad.reactivate() {
                self.events.push(ServerEvent::PickupRespawned { pad: pad.index });
            }
        }

        let ids: Vec<EntityId> = self.karts.keys().copied().collect();
        for id in ids {
            if let Some(kart) = self.karts.get_mut(&id) {
                kart.inventory.clear();
                kart.drifting.set(false);
            }
            self.respawn_kart(id);
        }
    }

    fn handle_task(&mut self, task: Task) {
        match task {
            Task::ArmMine { mine } => {
                if let Some(m) = self.mines.iter_mut().find(|m| m.id == mine) {
                    if m.arm() {
                        self.events.push(ServerEvent::MineArmSound { mine });
                    }
                }
            }
            Task::ExpireMine { mine } => {
                if let Some(m) = self.mines.iter_mut().find(|m| m.id == mine) {
                    if m.expire() {
                        debug!("Mine {} expired", mine);
                    }
                }
            }
            Task::DespawnMine { mine } => self.mines.retain(|m| m.id != mine),
            Task::CountdownStep { epoch, remaining } => {
                self.lifecycle.on_countdown_step(epoch, remaining, &mut self.events);
            }
            Task::RespawnKart { kart, life } => {
                let due = self
                    .karts
                    .get(&kart)
                    .is_some_and(|k| !k.is_alive() && k.life == life);
                if due {
                    self.respawn_kart(kart);
                }
            }
            Task::RespawnPickup { pad } => {
                if let Some(p) = self.pads.get_mut(pad as usize) {
                    if p.reactivate() {
                        self.events.push(ServerEvent::PickupRespawned { pad });
                    }
                }
            }
            Task::RestartMatch { epoch } => {
                if self.lifecycle.is_restart_due(epoch) {
                    self.restart_match();
                }
            }
        }
    }

    fn rebuild_colliders(&mut self) {
        self.physics.clear_colliders();
        for kart in self.karts.values().filter(|k| k.is_alive()) {
            self.physics.add_kart_colliders(kart.id, &kart.body, &self.config.kart);
        }
    }

    /// Advances the world by one fixed step.
    pub fn update(&mut self, dt: f32) {
        self.tick = self.tick.wrapping_add(1);
        self.now += dt as f64;

        for task in self.scheduler.take_due(self.now) {
            self.handle_task(task);
        }

        self.lifecycle.server_update(
            dt,
            self.clients.len(),
            &self.scoreboard,
            self.now,
            &mut self.scheduler,
            &mut self.events,
        );

        let kart = &self.config.kart;
        let blade = &self.config.blade;
        let max_speed = kart.max_speed.max(blade.speed).max(blade.return_speed);
        let min_radius = blade.radius.min(kart.nose_radius);
        let substeps = calculate_required_substeps(dt, max_speed, min_radius);
        let step = dt / substeps as f32;

        for _ in 0..substeps {
            self.step_karts(step);
            self.step_blades(step);
        }

        self.check_falls();
        self.update_mines();
        self.collect_pickups();
        self.blades.retain(|b| !b.is_destroyed());
        self.mines.retain(|m| m.phase() != MinePhase::Destroyed);

        if self.tick % 60 == 0 {
            debug!(
                "Tick {}: {:?}, {} karts, {} blades, {} mines",
                self.tick,
                self.lifecycle.phase(),
                self.karts.len(),
                self.blades.len(),
                self.mines.len()
            );
        }
    }

    fn step_karts(&mut self, dt: f32) {
        let controls = self.lifecycle.controls_enabled();
        let tuning = &self.config.kart;
        let half_size = self.config.arena.half_size;

        for kart in self.karts.values_mut().filter(|k| k.is_alive()) {
            if controls {
                if let Some(ai) = kart.ai.as_mut() {
                    kart.input = ai.next_input(&kart.body, half_size, dt);
                }
            }
            kart.drive(controls, dt, tuning);
            let over_floor = self.physics.is_over_floor(kart.body.position);
            kart.integrate(dt, over_floor, tuning);
        }

        let mut impacts: Vec<(EntityId, f32)> = Vec::new();
        for kart in self.karts.values_mut().filter(|k| k.is_alive()) {
            let impact = self.physics.resolve_obstacles(&mut kart.body, tuning.body_radius);
            if impact > 0.0 {
                impacts.push((kart.id, impact));
            }
        }

        let ids: Vec<EntityId> = self
            .karts
            .values()
            .filter(|k| k.is_alive())
            .map(|k| k.id)
            .collect();
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (Some(mut a), Some(mut b)) = (
                    self.karts.get(&ids[i]).map(|k| k.body),
                    self.karts.get(&ids[j]).map(|k| k.body),
                ) else {
                    continue;
                };

                let closing = resolve_kart_contact(&mut a, &mut b, tuning.body_radius);
                if let Some(kart) = self.karts.get_mut(&ids[i]) {
                    kart.body = a;
                }
                if let Some(kart) = self.karts.get_mut(&ids[j]) {
                    kart.body = b;
                }
                if closing > 0.0 {
                    impacts.push((ids[i], closing));
                    impacts.push((ids[j], closing));
                }
            }
        }

        let (tuning, now) = (tuning.clone(), self.now);
        for (id, speed) in impacts {
            let damage = self
                .karts
                .get_mut(&id)
                .and_then(|k| k.impact_damage(speed, now, &tuning));
            if let Some(damage) = damage {
                self.damage_kart(id, damage, None);
            }
        }
    }

    fn step_blades(&mut self, dt: f32) {
        self.rebuild_colliders();

        for index in 0..self.blades.len() {
            let owner_position = self
                .karts
                .get(&self.blades[index].owner)
                .map(|k| k.body.position);
            let blade = &mut self.blades[index];
            if blade.is_destroyed() {
                continue;
            }

            blade.advance(dt, owner_position, &self.config.blade);
            if blade.is_destroyed() {
                continue;
            }

            let hits = self
                .physics
                .overlap_sphere(blade.position, self.config.blade.radius, QueryFilter::ALL);
            for hit in hits {
                let blade = &mut self.blades[index];
                let contact = match hit.owner {
                    None => BladeContact::StaticGeometry,
                    Some(entity) if entity == blade.owner => BladeContact::Owner,
                    Some(entity) => BladeContact::Damageable {
                        entity,
                        alive: self.karts.get(&entity).is_some_and(|k| k.is_alive()),
                    },
                };

                match blade.on_contact(contact) {
                    ContactResponse::Ignore => {}
                    ContactResponse::Caught => break,
                    ContactResponse::Bounce => {
                        self.events.push(ServerEvent::HitEffect { position: hit.point });
                    }
                    ContactResponse::Strike { target } => {
                        let (owner, origin, direction) = (blade.owner, blade.position, blade.direction);
                        self.events.push(ServerEvent::HitEffect { position: hit.point });
                        self.strike(target, owner, origin, direction);
                    }
                }
            }
        }
    }

    fn strike(&mut self, target: EntityId, owner: EntityId, origin: Vec3, direction: Vec3) {
        let knockback = self.config.blade.knockback;
        if let Some(kart) = self.karts.get_mut(&target) {
            let mut away = kart.body.position - origin;
            away.y = 0.0;
            let mut away = away.normalize_or_zero();
            if away == Vec3::ZERO {
                away = direction;
            }
            kart.body.apply_impulse(away * knockback);
        }
        self.damage_kart(target, self.config.blade.damage, Some(owner));
    }

    /// AI karts file their own fall requests; participants send theirs.
    fn check_falls(&mut self) {
        let fallen: Vec<EntityId> = self
            .karts
            .values()
            .filter(|k| k.ai.is_some() && k.is_alive() && k.is_below_fall_threshold(&self.config.kart))
            .map(|k| k.id)
            .collect();
        for id in fallen {
            self.handle_fall(id);
        }
    }

    fn update_mines(&mut self) {
        self.rebuild_colliders();
        let tuning = &self.config.mine;

        let triggered: Vec<EntityId> = self
            .mines
            .iter()
            .filter(|mine| mine.is_armed())
            .filter(|mine| {
                self.physics
                    .overlap_sphere(mine.position, tuning.detection_radius, QueryFilter::ENTITIES)
                    .into_iter()
                    .filter_map(|hit| hit.owner)
                    .any(|entity| {
                        let alive = self.karts.get(&entity).is_some_and(|k| k.is_alive());
                        mine.is_triggered_by(entity, alive, self.now, tuning)
                    })
            })
            .map(|mine| mine.id)
            .collect();

        for mine in triggered {
            self.explode_mine(mine);
        }
    }

    fn collect_pickups(&mut self) {
        if !self.lifecycle.controls_enabled() {
            return;
        }

        for index in 0..self.pads.len() {
            let pad = &self.pads[index];
            if !pad.is_active() {
                continue;
            }
            let Some(kart_id) = self
                .karts
                .values()
                .find(|k| k.is_alive() && pad.overlaps(k.body.position))
                .map(|k| k.id)
            else {
                continue;
            };

            let (weapon, amount, respawn_time) = (pad.weapon, pad.amount, pad.respawn_time);
            if !self.give_pickup_to(kart_id, weapon, amount) {
                continue;
            }
            let pad = &mut self.pads[index];
            pad.take();
            let pad_index = pad.index;

            self.events.push(ServerEvent::PickupTaken {
                pad: pad_index,
                entity: kart_id,
            });
            self.scheduler.schedule(
                self.now + respawn_time as f64,
                Task::RespawnPickup { pad: pad_index },
            );
        }
    }

    /// Everything observers need to hear since the last call: discrete
    /// events in order, followed by replicated field changes.
    pub fn drain_events(&mut self) -> Vec<ServerEvent> {
        for kart in self.karts.values_mut() {
            kart.drain_changes(&mut self.events);
        }
        self.scoreboard.drain_changes(&mut self.events);
        std::mem::take(&mut self.events)
    }

    /// Full state for a participant that just connected.
    pub fn welcome_events(&self) -> Vec<ServerEvent> {
        let mut events = vec![ServerEvent::MatchPhaseChanged {
            phase: self.lifecycle.phase(),
        }];
        for kart in self.karts.values() {
            events.extend(kart.full_state());
        }
        events.extend(self.scoreboard.full_state());
        events
    }

    pub fn snapshot(&self, timestamp: u64) -> Packet {
        Packet::Snapshot {
            tick: self.tick,
            timestamp,
            state: MatchState {
                phase: self.lifecycle.phase(),
                time_remaining: self.lifecycle.time_remaining(),
                winner_name: self
                    .lifecycle
                    .winner()
                    .and_then(|w| self.scoreboard.display_name(w)),
                scoreboard: self.scoreboard.entries(),
            },
            karts: self.karts.values().map(|k| k.snapshot()).collect(),
            blades: self.blades.iter().map(|b| b.snapshot()).collect(),
            mines: self.mines.iter().map(|m| m.snapshot()).collect(),
        }
    }
}
