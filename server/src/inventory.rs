//! Weapon inventory: ammo counters, derived equipped weapon, fire cooldowns.

use shared::{Replicated, WeaponType};

/// Why a fire or drop request was turned down. Stale requests are dropped
/// silently; this only feeds debug logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FireRejection {
    #[error("{requested:?} is not the equipped weapon ({equipped:?})")]
    NotEquipped {
        requested: WeaponType,
        equipped: WeaponType,
    },
    #[error("no ammo for {0:?}")]
    NoAmmo(WeaponType),
    #[error("{0:?} is cooling down")]
    CoolingDown(WeaponType),
    #[error("controls are disabled")]
    ControlsDisabled,
}

#[derive(Debug)]
pub struct Inventory {
    pub blade_ammo: Replicated<u32>,
    pub mine_ammo: Replicated<u32>,
    pub equipped: Replicated<WeaponType>,
    last_blade_fire: Option<f64>,
    last_mine_drop: Option<f64>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        Self {
            blade_ammo: Replicated::new(0),
            mine_ammo: Replicated::new(0),
            equipped: Replicated::new(WeaponType::None),
            last_blade_fire: None,
            last_mine_drop: None,
        }
    }

    pub fn ammo(&self, weapon: WeaponType) -> u32 {
        match weapon {
            WeaponType::Blade => *self.blade_ammo.get(),
            WeaponType::Mine => *self.mine_ammo.get(),
            WeaponType::None => 0,
        }
    }

    pub fn equipped(&self) -> WeaponType {
        *self.equipped.get()
    }

    pub fn give(&mut self, weapon: WeaponType, amount: u32) {
        match weapon {
            WeaponType::Blade => {
                let total = self.ammo(weapon).saturating_add(amount);
                self.blade_ammo.set(total);
            }
            WeaponType::Mine => {
                let total = self.ammo(weapon).saturating_add(amount);
                self.mine_ammo.set(total);
            }
            WeaponType::None => return,
        }
        self.recompute_equipped();
    }

    /// Validates and consumes one round of `weapon`.
    ///
    /// `weapon` must be the equipped type, have ammo, and its cooldown must
    /// have elapsed since the last successful use on the authority's clock.
    pub fn try_consume(&mut self, weapon: WeaponType, now: f64, cooldown: f32) -> Result<(), FireRejection> {
        let equipped = self.equipped();
        if weapon != equipped {
            return Err(FireRejection::NotEquipped {
                requested: weapon,
                equipped,
            });
        }
        if self.ammo(weapon) == 0 {
            return Err(FireRejection::NoAmmo(weapon));
        }

        let last = match weapon {
            WeaponType::Blade => &mut self.last_blade_fire,
            WeaponType::Mine => &mut self.last_mine_drop,
            WeaponType::None => return Err(FireRejection::NoAmmo(weapon)),
        };
        if let Some(last) = *last {
            if now - last < cooldown as f64 {
                return Err(FireRejection::CoolingDown(weapon));
            }
        }
        *last = Some(now);

        match weapon {
            WeaponType::Blade => {
                let left = self.ammo(weapon) - 1;
                self.blade_ammo.set(left);
            }
            WeaponType::Mine => {
                let left = self.ammo(weapon) - 1;
                self.mine_ammo.set(left);
            }
            WeaponType::None => {}
        }
        self.recompute_equipped();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.blade_ammo.set(0);
        self.mine_ammo.set(0);
        self.last_blade_fire = None;
        self.last_mine_drop = None;
        self.recompute_equipped();
    }

    /// Equipped is never set directly: it is always the first weapon with
    /// ammo, blade before mine.
    fn recompute_equipped(&mut self) {
        let next = if self.ammo(WeaponType::Blade) > 0 {
            WeaponType::Blade
        } else if self.ammo(WeaponType::Mine) > 0 {
            WeaponType::Mine
        } else {
            WeaponType::None
        };
        self.equipped.set(next);
    }
}
