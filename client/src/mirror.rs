//! Read-only replica of the authority's state.
//!
//! Every event-driven field is a [`Replicated`] value, so applying a pushed
//! change fires the same listeners the authority uses. The mirror never decides
//! anything; it only records what it is told and turns a few of those changes
//! into [`PresentationSignal`]s for whatever presents the local participant.

use glam::Vec3;
use shared::{
    BladeSnapshot, EntityId, KartField, KartSnapshot, MatchPhase, MatchState, MineSnapshot,
    Replicated, ScoreEntry, ServerEvent, WeaponType, MAX_HEALTH,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::mem::{discriminant, Discriminant};
use std::sync::{Arc, Mutex};

/// Instructions for the presentation layer about the local participant.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationSignal {
    /// Local kart died: hide it and wait for respawn.
    EnterSpectator,
    /// Local kart is back in the arena.
    LeaveSpectator,
    CountdownStep(u8),
    ControlsEnabled,
    /// Match over: show results and lock input.
    ShowResults { winner_name: Option<String> },
    /// Cosmetic broadcast to play as-is (sound, particles, flashes).
    Effect(ServerEvent),
}

#[derive(Debug, Default)]
struct SignalSink {
    local: Option<EntityId>,
    pending: Vec<PresentationSignal>,
}

type SharedSink = Arc<Mutex<SignalSink>>;

fn push_signal(sink: &SharedSink, signal: PresentationSignal) {
    if let Ok(mut sink) = sink.lock() {
        sink.pending.push(signal);
    }
}

/// Mirrored kart. Replicated fields change through events or, when an event
/// packet was lost, through the next snapshot; motion comes from snapshots.
#[derive(Debug)]
pub struct MirrorKart {
    pub health: Replicated<f32>,
    pub alive: Replicated<bool>,
    pub weapon: Replicated<WeaponType>,
    pub blade_ammo: Replicated<u32>,
    pub mine_ammo: Replicated<u32>,
    pub drifting: Replicated<bool>,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
}

impl MirrorKart {
    fn new(entity: EntityId, sink: &SharedSink) -> Self {
        let mut alive = Replicated::new(true);

        let sink = Arc::clone(sink);
        alive.on_change(move |was_alive, is_alive| {
            if let Ok(mut sink) = sink.lock() {
                if sink.local != Some(entity) {
                    return;
                }
                let signal = match (*was_alive, *is_alive) {
                    (true, false) => PresentationSignal::EnterSpectator,
                    (false, true) => PresentationSignal::LeaveSpectator,
                    _ => return,
                };
                sink.pending.push(signal);
            }
        });

        Self {
            health: Replicated::new(MAX_HEALTH),
            alive,
            weapon: Replicated::default(),
            blade_ammo: Replicated::default(),
            mine_ammo: Replicated::default(),
            drifting: Replicated::default(),
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            yaw: 0.0,
        }
    }

    fn apply_field(&mut self, field: KartField) {
        match field {
            KartField::Health(v) => {
                self.health.set(v);
            }
            KartField::Alive(v) => {
                self.alive.set(v);
            }
            KartField::Weapon(v) => {
                self.weapon.set(v);
            }
            KartField::BladeAmmo(v) => {
                self.blade_ammo.set(v);
            }
            KartField::MineAmmo(v) => {
                self.mine_ammo.set(v);
            }
            KartField::Drifting(v) => {
                self.drifting.set(v);
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.get()
    }
}

/// Pieces of replicated state that are ordered independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum StateKey {
    Match,
    Countdown,
    Presence(EntityId),
    Field(EntityId, Discriminant<KartField>),
    Score(EntityId),
}

/// Tick of the newest value applied for each piece of state.
#[derive(Debug, Default)]
struct Stamps {
    ticks: HashMap<StateKey, u32>,
}

impl Stamps {
    /// Accepts an update stamped `tick` unless something newer was applied.
    fn admit(&mut self, key: StateKey, tick: u32) -> bool {
        match self.ticks.get(&key) {
            Some(&last) if last > tick => false,
            _ => {
                self.ticks.insert(key, tick);
                true
            }
        }
    }

    /// Same as [`Stamps::admit`], except a value from the same tick wins.
    fn supersedes(&mut self, key: StateKey, tick: u32) -> bool {
        match self.ticks.get(&key) {
            Some(&last) if last >= tick => false,
            _ => {
                self.ticks.insert(key, tick);
                true
            }
        }
    }
}

/// Mirror of the authority.
///
/// Event packets and snapshots travel over UDP, so either may arrive late,
/// twice, or never. Every update is stamped with the tick it was sent at and
/// only applied when nothing newer is already shown. Snapshots repeat the full
/// replicated state, which repairs whatever a lost event packet left behind.
pub struct Mirror {
    sink: SharedSink,
    local_entity: Option<EntityId>,
    phase: Replicated<MatchPhase>,
    controls_enabled: bool,
    results_shown: bool,
    time_remaining: f32,
    winner_name: Option<String>,
    karts: BTreeMap<EntityId, MirrorKart>,
    scoreboard: BTreeMap<EntityId, Replicated<ScoreEntry>>,
    blades: Vec<BladeSnapshot>,
    mines: Vec<MineSnapshot>,
    stamps: Stamps,
    last_snapshot_tick: Option<u32>,
}

impl Mirror {
    pub fn new() -> Self {
        Self {
            sink: Arc::new(Mutex::new(SignalSink::default())),
            local_entity: None,
            phase: Replicated::default(),
            controls_enabled: false,
            results_shown: false,
            time_remaining: 0.0,
            winner_name: None,
            karts: BTreeMap::new(),
            scoreboard: BTreeMap::new(),
            blades: Vec::new(),
            mines: Vec::new(),
            stamps: Stamps::default(),
            last_snapshot_tick: None,
        }
    }

    /// Marks which kart belongs to this participant.
    pub fn set_local_entity(&mut self, entity: EntityId) {
        self.local_entity = Some(entity);
        if let Ok(mut sink) = self.sink.lock() {
            sink.local = Some(entity);
        }
    }

    pub fn local_entity(&self) -> Option<EntityId> {
        self.local_entity
    }

    pub fn local_kart(&self) -> Option<&MirrorKart> {
        self.local_entity.and_then(|id| self.karts.get(&id))
    }

    pub fn kart(&self, entity: EntityId) -> Option<&MirrorKart> {
        self.karts.get(&entity)
    }

    pub fn karts(&self) -> impl Iterator<Item = (&EntityId, &MirrorKart)> {
        self.karts.iter()
    }

    pub fn phase(&self) -> MatchPhase {
        *self.phase.get()
    }

    pub fn time_remaining(&self) -> f32 {
        self.time_remaining
    }

    pub fn winner_name(&self) -> Option<&str> {
        self.winner_name.as_deref()
    }

    pub fn score(&self, entity: EntityId) -> Option<&ScoreEntry> {
        self.scoreboard.get(&entity).map(|row| row.get())
    }

    pub fn scoreboard_len(&self) -> usize {
        self.scoreboard.len()
    }

    pub fn blades(&self) -> &[BladeSnapshot] {
        &self.blades
    }

    pub fn mines(&self) -> &[MineSnapshot] {
        &self.mines
    }

    /// Whether the local participant may act: match running and kart alive.
    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled && self.local_kart().is_some_and(|k| k.is_alive())
    }

    pub fn take_signals(&mut self) -> Vec<PresentationSignal> {
        match self.sink.lock() {
            Ok(mut sink) => std::mem::take(&mut sink.pending),
            Err(_) => Vec::new(),
        }
    }

    fn set_controls(&mut self, enabled: bool) {
        if enabled && !self.controls_enabled {
            push_signal(&self.sink, PresentationSignal::ControlsEnabled);
        }
        self.controls_enabled = enabled;
    }

    fn set_phase(&mut self, phase: MatchPhase) {
        self.phase.set(phase);
        if phase != MatchPhase::GameOver {
            self.results_shown = false;
        }
        if phase == MatchPhase::WaitingForPlayers {
            self.winner_name = None;
        }
        self.set_controls(phase == MatchPhase::Playing);
    }

    fn show_results(&mut self, winner_name: Option<String>) {
        self.winner_name = winner_name.clone();
        self.set_controls(false);
        if self.results_shown {
            return;
        }
        self.results_shown = true;
        push_signal(&self.sink, PresentationSignal::ShowResults { winner_name });
    }

    fn set_score(&mut self, entity: EntityId, entry: Option<ScoreEntry>) {
        match entry {
            Some(entry) => {
                self.scoreboard
                    .entry(entity)
                    .or_insert_with(Replicated::default)
                    .set(entry);
            }
            None => {
                self.scoreboard.remove(&entity);
            }
        }
    }

    /// Makes sure `entity` is mirrored before an update stamped `tick` lands
    /// on it. Returns false when the kart was removed after that update.
    fn ensure_kart(&mut self, entity: EntityId, tick: u32) -> bool {
        let fresher = self.stamps.admit(StateKey::Presence(entity), tick);
        if self.karts.contains_key(&entity) {
            return true;
        }
        if !fresher {
            return false;
        }
        let kart = MirrorKart::new(entity, &self.sink);
        self.karts.insert(entity, kart);
        true
    }

    fn apply_kart_field(&mut self, entity: EntityId, field: KartField, tick: u32) {
        if !self.ensure_kart(entity, tick) {
            return;
        }
        if !self
            .stamps
            .admit(StateKey::Field(entity, discriminant(&field)), tick)
        {
            return;
        }
        if let Some(kart) = self.karts.get_mut(&entity) {
            kart.apply_field(field);
        }
    }

    /// Applies one `Events` packet sent at `tick`.
    pub fn apply_events(&mut self, tick: u32, events: &[ServerEvent]) {
        for event in events {
            self.apply_event(tick, event);
        }
    }

    pub fn apply_event(&mut self, tick: u32, event: &ServerEvent) {
        match event {
            ServerEvent::KartChanged { entity, field } => {
                self.apply_kart_field(*entity, *field, tick);
            }
            ServerEvent::KartRemoved { entity } => {
                if self.stamps.admit(StateKey::Presence(*entity), tick) {
                    self.karts.remove(entity);
                }
            }
            ServerEvent::ScoreboardChanged { entity, entry } => {
                if self.stamps.admit(StateKey::Score(*entity), tick) {
                    self.set_score(*entity, entry.clone());
                }
            }
            ServerEvent::MatchPhaseChanged { phase } => {
                if self.stamps.admit(StateKey::Match, tick) {
                    self.set_phase(*phase);
                }
            }
            ServerEvent::CountdownStep { remaining } => {
                if self.stamps.admit(StateKey::Countdown, tick) {
                    push_signal(&self.sink, PresentationSignal::CountdownStep(*remaining));
                }
            }
            ServerEvent::MatchControlsEnabled => {
                if self.stamps.admit(StateKey::Match, tick) {
                    self.set_controls(true);
                }
            }
            ServerEvent::GameOver { winner_name } => {
                if self.stamps.admit(StateKey::Match, tick) {
                    self.show_results(winner_name.clone());
                }
            }
            ServerEvent::RespawnEffect { entity, position, yaw } => {
                if let Some(kart) = self.karts.get_mut(entity) {
                    kart.position = *position;
                    kart.velocity = Vec3::ZERO;
                    kart.yaw = *yaw;
                }
                push_signal(&self.sink, PresentationSignal::Effect(event.clone()));
            }
            ServerEvent::HitEffect { .. }
            | ServerEvent::DamageFlash { .. }
            | ServerEvent::DeathEffect { .. }
            | ServerEvent::WeaponFireSound { .. }
            | ServerEvent::MineArmSound { .. }
            | ServerEvent::MineExplodeEffect { .. }
            | ServerEvent::PickupTaken { .. }
            | ServerEvent::PickupRespawned { .. } => {
                push_signal(&self.sink, PresentationSignal::Effect(event.clone()));
            }
        }
    }

    /// Applies a snapshot sent at `tick`. Snapshots older than the last one
    /// applied are dropped; replicated fields only move forward when no newer
    /// event already set them, and karts or score rows missing from the
    /// snapshot are removed unless something newer vouches for them.
    pub fn apply_snapshot(
        &mut self,
        tick: u32,
        state: &MatchState,
        karts: &[KartSnapshot],
        blades: &[BladeSnapshot],
        mines: &[MineSnapshot],
    ) -> bool {
        if self.last_snapshot_tick.is_some_and(|last| tick <= last) {
            return false;
        }
        self.last_snapshot_tick = Some(tick);
        self.time_remaining = state.time_remaining;

        if self.stamps.admit(StateKey::Match, tick) {
            self.set_phase(state.phase);
            if state.phase == MatchPhase::GameOver {
                self.show_results(state.winner_name.clone());
            }
        }

        for snapshot in karts {
            for field in snapshot.fields() {
                self.apply_kart_field(snapshot.id, field, tick);
            }
            if let Some(kart) = self.karts.get_mut(&snapshot.id) {
                kart.position = snapshot.position;
                kart.velocity = snapshot.velocity;
                kart.yaw = snapshot.yaw;
            }
        }
        let listed: HashSet<EntityId> = karts.iter().map(|k| k.id).collect();
        let missing: Vec<EntityId> = self
            .karts
            .keys()
            .filter(|id| !listed.contains(*id))
            .copied()
            .collect();
        for entity in missing {
            if self.stamps.supersedes(StateKey::Presence(entity), tick) {
                self.karts.remove(&entity);
            }
        }

        for (entity, entry) in &state.scoreboard {
            if self.stamps.admit(StateKey::Score(*entity), tick) {
                self.set_score(*entity, Some(entry.clone()));
            }
        }
        let listed: HashSet<EntityId> = state.scoreboard.iter().map(|(id, _)| *id).collect();
        let missing: Vec<EntityId> = self
            .scoreboard
            .keys()
            .filter(|id| !listed.contains(*id))
            .copied()
            .collect();
        for entity in missing {
            if self.stamps.supersedes(StateKey::Score(entity), tick) {
                self.scoreboard.remove(&entity);
            }
        }

        self.blades = blades.to_vec();
        self.mines = mines.to_vec();
        true
    }
}

impl Default for Mirror {
    fn default() -> Self {
        Self::new()
    }
}
