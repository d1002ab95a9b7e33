//! Attribute resolution
//!
//! Maps human-friendly attribute names to the closed set of canonical
//! [`Attribute`] keys and exposes static range metadata for each key.
//!
//! Lookups are case-insensitive. Input is normalised first (whitespace
//! trimmed, `-` and spaces become `_`, namespaced host spellings such as
//! `minecraft:generic.max_health` are reduced to the bare key), then matched
//! against canonical keys and finally against the alias table.

mod tables;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use tables::{ALIASES, CANONICAL};

/// Canonical attribute keys the engine can override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    MaxHealth,
    MaxAbsorption,
    MovementSpeed,
    FlyingSpeed,
    SneakingSpeed,
    AttackDamage,
    AttackSpeed,
    AttackKnockback,
    Armor,
    ArmorToughness,
    KnockbackResistance,
    ExplosionKnockbackResistance,
    Luck,
    Scale,
    JumpStrength,
    Gravity,
    StepHeight,
    SafeFallDistance,
    FallDamageMultiplier,
    BlockInteractionRange,
    EntityInteractionRange,
    BlockBreakSpeed,
    MiningEfficiency,
    SubmergedMiningSpeed,
    MovementEfficiency,
    WaterMovementEfficiency,
    OxygenBonus,
    BurningTime,
    SweepingDamageRatio,
    FollowRange,
    TemptRange,
    SpawnReinforcements,
}

/// Static metadata for one attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeMeta {
    pub default_value: f64,
    pub min_value: f64,
    pub max_value: f64,
}

impl AttributeMeta {
    const fn new(default_value: f64, min_value: f64, max_value: f64) -> Self {
        Self {
            default_value,
            min_value,
            max_value,
        }
    }

    /// Clamp a requested value into `[min_value, max_value]`.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min_value, self.max_value)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min_value && value <= self.max_value
    }
}

impl Attribute {
    /// Every canonical attribute, in declaration order.
    pub const ALL: [Attribute; 32] = [
        Attribute::MaxHealth,
        Attribute::MaxAbsorption,
        Attribute::MovementSpeed,
        Attribute::FlyingSpeed,
        Attribute::SneakingSpeed,
        Attribute::AttackDamage,
        Attribute::AttackSpeed,
        Attribute::AttackKnockback,
        Attribute::Armor,
        Attribute::ArmorToughness,
        Attribute::KnockbackResistance,
        Attribute::ExplosionKnockbackResistance,
        Attribute::Luck,
        Attribute::Scale,
        Attribute::JumpStrength,
        Attribute::Gravity,
        Attribute::StepHeight,
        Attribute::SafeFallDistance,
        Attribute::FallDamageMultiplier,
        Attribute::BlockInteractionRange,
        Attribute::EntityInteractionRange,
        Attribute::BlockBreakSpeed,
        Attribute::MiningEfficiency,
        Attribute::SubmergedMiningSpeed,
        Attribute::MovementEfficiency,
        Attribute::WaterMovementEfficiency,
        Attribute::OxygenBonus,
        Attribute::BurningTime,
        Attribute::SweepingDamageRatio,
        Attribute::FollowRange,
        Attribute::TemptRange,
        Attribute::SpawnReinforcements,
    ];

    /// Canonical key string (matches the serde representation).
    pub const fn key(&self) -> &'static str {
        match self {
            Attribute::MaxHealth => "max_health",
            Attribute::MaxAbsorption => "max_absorption",
            Attribute::MovementSpeed => "movement_speed",
            Attribute::FlyingSpeed => "flying_speed",
            Attribute::SneakingSpeed => "sneaking_speed",
            Attribute::AttackDamage => "attack_damage",
            Attribute::AttackSpeed => "attack_speed",
            Attribute::AttackKnockback => "attack_knockback",
            Attribute::Armor => "armor",
            Attribute::ArmorToughness => "armor_toughness",
            Attribute::KnockbackResistance => "knockback_resistance",
            Attribute::ExplosionKnockbackResistance => "explosion_knockback_resistance",
            Attribute::Luck => "luck",
            Attribute::Scale => "scale",
            Attribute::JumpStrength => "jump_strength",
            Attribute::Gravity => "gravity",
            Attribute::StepHeight => "step_height",
            Attribute::SafeFallDistance => "safe_fall_distance",
            Attribute::FallDamageMultiplier => "fall_damage_multiplier",
            Attribute::BlockInteractionRange => "block_interaction_range",
            Attribute::EntityInteractionRange => "entity_interaction_range",
            Attribute::BlockBreakSpeed => "block_break_speed",
            Attribute::MiningEfficiency => "mining_efficiency",
            Attribute::SubmergedMiningSpeed => "submerged_mining_speed",
            Attribute::MovementEfficiency => "movement_efficiency",
            Attribute::WaterMovementEfficiency => "water_movement_efficiency",
            Attribute::OxygenBonus => "oxygen_bonus",
            Attribute::BurningTime => "burning_time",
            Attribute::SweepingDamageRatio => "sweeping_damage_ratio",
            Attribute::FollowRange => "follow_range",
            Attribute::TemptRange => "tempt_range",
            Attribute::SpawnReinforcements => "spawn_reinforcements",
        }
    }

    /// Default value and valid range, taken from the host's attribute registry.
    pub const fn meta(&self) -> AttributeMeta {
        match self {
            Attribute::MaxHealth => AttributeMeta::new(20.0, 1.0, 1024.0),
            Attribute::MaxAbsorption => AttributeMeta::new(0.0, 0.0, 2048.0),
            Attribute::MovementSpeed => AttributeMeta::new(0.7, 0.0, 1024.0),
            Attribute::FlyingSpeed => AttributeMeta::new(0.4, 0.0, 1024.0),
            Attribute::SneakingSpeed => AttributeMeta::new(0.3, 0.0, 1.0),
            Attribute::AttackDamage => AttributeMeta::new(2.0, 0.0, 2048.0),
            Attribute::AttackSpeed => AttributeMeta::new(4.0, 0.0, 1024.0),
            Attribute::AttackKnockback => AttributeMeta::new(0.0, 0.0, 5.0),
            Attribute::Armor => AttributeMeta::new(0.0, 0.0, 30.0),
            Attribute::ArmorToughness => AttributeMeta::new(0.0, 0.0, 20.0),
            Attribute::KnockbackResistance => AttributeMeta::new(0.0, 0.0, 1.0),
            Attribute::ExplosionKnockbackResistance => AttributeMeta::new(0.0, 0.0, 1.0),
            Attribute::Luck => AttributeMeta::new(0.0, -1024.0, 1024.0),
            Attribute::Scale => AttributeMeta::new(1.0, 0.0625, 16.0),
            Attribute::JumpStrength => AttributeMeta::new(0.42, 0.0, 32.0),
            Attribute::Gravity => AttributeMeta::new(0.08, -1.0, 1.0),
            Attribute::StepHeight => AttributeMeta::new(0.6, 0.0, 10.0),
            Attribute::SafeFallDistance => AttributeMeta::new(3.0, -1024.0, 1024.0),
            Attribute::FallDamageMultiplier => AttributeMeta::new(1.0, 0.0, 100.0),
            Attribute::BlockInteractionRange => AttributeMeta::new(4.5, 0.0, 64.0),
            Attribute::EntityInteractionRange => AttributeMeta::new(3.0, 0.0, 64.0),
            Attribute::BlockBreakSpeed => AttributeMeta::new(1.0, 0.0, 1024.0),
            Attribute::MiningEfficiency => AttributeMeta::new(0.0, 0.0, 1024.0),
            Attribute::SubmergedMiningSpeed => AttributeMeta::new(0.2, 0.0, 20.0),
            Attribute::MovementEfficiency => AttributeMeta::new(0.0, 0.0, 1.0),
            Attribute::WaterMovementEfficiency => AttributeMeta::new(0.0, 0.0, 1.0),
            Attribute::OxygenBonus => AttributeMeta::new(0.0, 0.0, 1024.0),
            Attribute::BurningTime => AttributeMeta::new(1.0, 0.0, 1024.0),
            Attribute::SweepingDamageRatio => AttributeMeta::new(0.0, 0.0, 1.0),
            Attribute::FollowRange => AttributeMeta::new(32.0, 0.0, 2048.0),
            Attribute::TemptRange => AttributeMeta::new(10.0, 0.0, 2048.0),
            Attribute::SpawnReinforcements => AttributeMeta::new(0.0, 0.0, 1.0),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve(s).ok_or_else(|| format!("unknown attribute '{s}'"))
    }
}

/// Host namespaces stripped before lookup, outermost first.
const NAMESPACE_PREFIXES: [&str; 1] = ["minecraft:"];
const CATEGORY_PREFIXES: [&str; 3] = ["generic.", "player.", "zombie."];

fn normalize(input: &str) -> String {
    let mut key = input.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    for prefix in NAMESPACE_PREFIXES {
        if let Some(rest) = key.strip_prefix(prefix) {
            key = rest.to_string();
        }
    }
    for prefix in CATEGORY_PREFIXES {
        if let Some(rest) = key.strip_prefix(prefix) {
            key = rest.to_string();
            break;
        }
    }
    key
}

/// Resolve a user-supplied name to its canonical attribute.
pub fn resolve(input: &str) -> Option<Attribute> {
    let key = normalize(input);
    if key.is_empty() {
        return None;
    }
    CANONICAL
        .get(key.as_str())
        .or_else(|| ALIASES.get(key.as_str()))
        .copied()
}

/// Range metadata for a canonical attribute.
pub fn metadata(attribute: Attribute) -> AttributeMeta {
    attribute.meta()
}

/// Aliases that resolve to `attribute`, sorted.
pub fn aliases_for(attribute: Attribute) -> Vec<&'static str> {
    let mut names: Vec<_> = ALIASES
        .entries()
        .filter(|(_, target)| **target == attribute)
        .map(|(alias, _)| *alias)
        .collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_keys_resolve_case_insensitively() {
        assert_eq!(resolve("max_health"), Some(Attribute::MaxHealth));
        assert_eq!(resolve("MAX_HEALTH"), Some(Attribute::MaxHealth));
        assert_eq!(resolve("  Scale "), Some(Attribute::Scale));
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(resolve("hp"), Some(Attribute::MaxHealth));
        assert_eq!(resolve("Speed"), Some(Attribute::MovementSpeed));
        assert_eq!(resolve("size"), Some(Attribute::Scale));
        assert_eq!(resolve("reach"), Some(Attribute::BlockInteractionRange));
    }

    #[test]
    fn namespaced_spellings_resolve() {
        assert_eq!(
            resolve("minecraft:generic.max_health"),
            Some(Attribute::MaxHealth)
        );
        assert_eq!(resolve("generic.attack-damage"), Some(Attribute::AttackDamage));
        assert_eq!(
            resolve("player.block_interaction_range"),
            Some(Attribute::BlockInteractionRange)
        );
        assert_eq!(
            resolve("zombie.spawn_reinforcements"),
            Some(Attribute::SpawnReinforcements)
        );
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        assert_eq!(resolve("mana"), None);
        assert_eq!(resolve(""), None);
        assert_eq!(resolve("minecraft:"), None);
    }

    #[test]
    fn every_canonical_key_round_trips() {
        for attribute in Attribute::ALL {
            assert_eq!(resolve(attribute.key()), Some(attribute), "{attribute}");
            let meta = attribute.meta();
            assert!(meta.min_value <= meta.max_value, "{attribute}");
            assert!(meta.contains(meta.default_value), "{attribute}");
        }
        assert_eq!(CANONICAL.len(), Attribute::ALL.len());
    }

    #[test]
    fn aliases_never_shadow_canonical_keys() {
        for (alias, _) in ALIASES.entries() {
            assert!(CANONICAL.get(*alias).is_none(), "alias {alias} shadows a key");
        }
    }

    #[test]
    fn clamp_uses_declared_range() {
        let meta = metadata(Attribute::Scale);
        assert_eq!(meta.clamp(100.0), 16.0);
        assert_eq!(meta.clamp(0.0), 0.0625);
        assert_eq!(meta.clamp(2.0), 2.0);
    }

    #[test]
    fn serde_uses_canonical_key() {
        let json = serde_json::to_string(&Attribute::JumpStrength).unwrap();
        assert_eq!(json, "\"jump_strength\"");
        let back: Attribute = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Attribute::JumpStrength);
    }

    #[test]
    fn aliases_for_lists_targets() {
        let names = aliases_for(Attribute::MaxHealth);
        assert!(names.contains(&"hp"));
        assert!(names.contains(&"health"));
    }
}
