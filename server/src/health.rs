//! Per-kart health, death latch and post-respawn invulnerability.
//!
//! Health only ever changes on the authority. Mirrors observe `current` and
//! `alive` through their replicated change callbacks.

use shared::{EntityId, Replicated};

/// Post-respawn invulnerability window, kept on the authority's clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpawnShield {
    until: f64,
}

impl SpawnShield {
    pub fn grant(&mut self, now: f64, duration: f32) {
        self.until = now + duration as f64;
    }

    pub fn is_active(&self, now: f64) -> bool {
        now < self.until
    }

    pub fn clear(&mut self) {
        self.until = 0.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Dead or shielded; nothing changed.
    Ignored,
    Damaged { remaining: f32 },
    /// Health reached zero. The caller must run the death transition.
    Lethal,
}

#[derive(Debug)]
pub struct Health {
    pub current: Replicated<f32>,
    pub alive: Replicated<bool>,
    max: f32,
    last_attacker: Option<EntityId>,
    shield: SpawnShield,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: Replicated::new(max),
            alive: Replicated::new(true),
            max,
            last_attacker: None,
            shield: SpawnShield::default(),
        }
    }

    pub fn value(&self) -> f32 {
        *self.current.get()
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.get()
    }

    pub fn is_invulnerable(&self, now: f64) -> bool {
        self.shield.is_active(now)
    }

    pub fn last_attacker(&self) -> Option<EntityId> {
        self.last_attacker
    }

    pub fn take_damage(&mut self, amount: f32, attacker: Option<EntityId>, now: f64) -> DamageOutcome {
        if !self.is_alive() || self.shield.is_active(now) {
            return DamageOutcome::Ignored;
        }
        if !(amount > 0.0) {
            return DamageOutcome::Ignored;
        }

        let remaining = (self.value() - amount).max(0.0);
        self.current.set(remaining);
        self.last_attacker = attacker;

        if remaining <= 0.0 {
            DamageOutcome::Lethal
        } else {
            DamageOutcome::Damaged { remaining }
        }
    }

    /// Latches death. Returns the attacker to credit, or `None` if the kart was
    /// already dead.
    pub fn die(&mut self) -> Option<Option<EntityId>> {
        if !self.is_alive() {
            return None;
        }
        self.current.set(0.0);
        self.alive.set(false);
        Some(self.last_attacker)
    }

    pub fn respawn(&mut self, now: f64, invulnerability: f32) {
        self.current.set(self.max);
        self.alive.set(true);
        self.last_attacker = None;
        self.shield.grant(now, invulnerability);
    }

    pub fn heal(&mut self, amount: f32) {
        if !self.is_alive() || !(amount > 0.0) {
            return;
        }
        self.current.set((self.value() + amount).min(self.max));
    }
}
