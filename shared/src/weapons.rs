//! The fixed weapon list.
//!
//! Snapshots carry only a `weapon_index`; both sides resolve it against
//! this table, so the order here is part of the wire contract.

use serde::{Deserialize, Serialize};

/// Kinetic weapon kinds carried inside projectile descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KineticKind {
    Minigun,
    Deagle,
    Awp,
    Shotgun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponClass {
    /// Explosive, area damage, detonates on impact.
    Ballistic,
    /// Straight-flying single-target round.
    Kinetic(KineticKind),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponSpec {
    pub name: &'static str,
    pub class: WeaponClass,
    pub damage: f32,
    /// Recoil on the shooter; for the ballistic launcher also the
    /// self-knockback switch (zero disables self-push entirely).
    pub push_power: f32,
    /// Ticks between shots.
    pub cooldown: u32,
    pub projectile_speed: f32,
    pub range: f32,
    /// Half-angle of random spread, degrees.
    pub spread_deg: f32,
    /// Projectiles per trigger pull.
    pub pellets: u32,
    /// Relative range jitter in [0, 1).
    pub stability: f32,
}

/// Weapon list in wire order (`weapon_index` indexes into this).
pub const WEAPONS: [WeaponSpec; 5] = [
    WeaponSpec {
        name: "rpg",
        class: WeaponClass::Ballistic,
        damage: 30.0,
        push_power: -1.0,
        cooldown: 60,
        projectile_speed: 5.0,
        range: 200.0,
        spread_deg: 0.0,
        pellets: 1,
        stability: 0.0,
    },
    WeaponSpec {
        name: "minigun",
        class: WeaponClass::Kinetic(KineticKind::Minigun),
        damage: 5.0,
        push_power: 0.1,
        cooldown: 5,
        projectile_speed: 17.0,
        range: 200.0,
        spread_deg: 4.0,
        pellets: 1,
        stability: 0.0,
    },
    WeaponSpec {
        name: "deagle",
        class: WeaponClass::Kinetic(KineticKind::Deagle),
        damage: 7.0,
        push_power: 1.0,
        cooldown: 30,
        projectile_speed: 13.0,
        range: 200.0,
        spread_deg: 6.0,
        pellets: 1,
        stability: 0.0,
    },
    WeaponSpec {
        name: "awp",
        class: WeaponClass::Kinetic(KineticKind::Awp),
        damage: 50.0,
        push_power: 2.5,
        cooldown: 100,
        projectile_speed: 18.0,
        range: 400.0,
        spread_deg: 0.0,
        pellets: 1,
        stability: 0.0,
    },
    WeaponSpec {
        name: "shotgun",
        class: WeaponClass::Kinetic(KineticKind::Shotgun),
        damage: 20.0,
        push_power: 0.5,
        cooldown: 50,
        projectile_speed: 8.0,
        range: 50.0,
        spread_deg: 15.0,
        pellets: 5,
        stability: 0.5,
    },
];

/// Resolves a wire `weapon_index`, clamping junk to the default weapon.
pub fn weapon(index: usize) -> &'static WeaponSpec {
    WEAPONS.get(index).unwrap_or(&WEAPONS[0])
}

/// Spec behind a kinetic kind from a wire descriptor.
pub fn kinetic_spec(kind: KineticKind) -> &'static WeaponSpec {
    WEAPONS
        .iter()
        .find(|w| w.class == WeaponClass::Kinetic(kind))
        .unwrap_or(&WEAPONS[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_order() {
        let names: Vec<&str> = WEAPONS.iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["rpg", "minigun", "deagle", "awp", "shotgun"]);
    }

    #[test]
    fn test_only_first_weapon_is_ballistic() {
        assert_eq!(WEAPONS[0].class, WeaponClass::Ballistic);
        for spec in &WEAPONS[1..] {
            assert!(matches!(spec.class, WeaponClass::Kinetic(_)));
        }
    }

    #[test]
    fn test_out_of_range_index_falls_back() {
        assert_eq!(weapon(99).name, "rpg");
        assert_eq!(weapon(3).name, "awp");
    }

    #[test]
    fn test_kinetic_spec_lookup() {
        assert_eq!(kinetic_spec(KineticKind::Shotgun).name, "shotgun");
        assert_eq!(kinetic_spec(KineticKind::Minigun).name, "minigun");
    }

    #[test]
    fn test_kinetic_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&KineticKind::Deagle).unwrap(),
            "\"deagle\""
        );
        assert_eq!(
            serde_json::from_str::<KineticKind>("\"shotgun\"").unwrap(),
            KineticKind::Shotgun
        );
    }
}
