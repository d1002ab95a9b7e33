//! Static lookup tables for attribute resolution.
//!
//! Keys are stored already normalised (lowercase, `_` separators).

use phf::phf_map;

use super::Attribute;

/// Canonical key → attribute
pub static CANONICAL: phf::Map<&'static str, Attribute> = phf_map! {
    "max_health" => Attribute::MaxHealth,
    "max_absorption" => Attribute::MaxAbsorption,
    "movement_speed" => Attribute::MovementSpeed,
    "flying_speed" => Attribute::FlyingSpeed,
    "sneaking_speed" => Attribute::SneakingSpeed,
    "attack_damage" => Attribute::AttackDamage,
    "attack_speed" => Attribute::AttackSpeed,
    "attack_knockback" => Attribute::AttackKnockback,
    "armor" => Attribute::Armor,
    "armor_toughness" => Attribute::ArmorToughness,
    "knockback_resistance" => Attribute::KnockbackResistance,
    "explosion_knockback_resistance" => Attribute::ExplosionKnockbackResistance,
    "luck" => Attribute::Luck,
    "scale" => Attribute::Scale,
    "jump_strength" => Attribute::JumpStrength,
    "gravity" => Attribute::Gravity,
    "step_height" => Attribute::StepHeight,
    "safe_fall_distance" => Attribute::SafeFallDistance,
    "fall_damage_multiplier" => Attribute::FallDamageMultiplier,
    "block_interaction_range" => Attribute::BlockInteractionRange,
    "entity_interaction_range" => Attribute::EntityInteractionRange,
    "block_break_speed" => Attribute::BlockBreakSpeed,
    "mining_efficiency" => Attribute::MiningEfficiency,
    "submerged_mining_speed" => Attribute::SubmergedMiningSpeed,
    "movement_efficiency" => Attribute::MovementEfficiency,
    "water_movement_efficiency" => Attribute::WaterMovementEfficiency,
    "oxygen_bonus" => Attribute::OxygenBonus,
    "burning_time" => Attribute::BurningTime,
    "sweeping_damage_ratio" => Attribute::SweepingDamageRatio,
    "follow_range" => Attribute::FollowRange,
    "tempt_range" => Attribute::TemptRange,
    "spawn_reinforcements" => Attribute::SpawnReinforcements,
};

/// Shorthand and legacy names → attribute (many-to-one)
pub static ALIASES: phf::Map<&'static str, Attribute> = phf_map! {
    // ═══════════════════════════════════════════════════════════════════════
    // Health
    // ═══════════════════════════════════════════════════════════════════════
    "hp" => Attribute::MaxHealth,
    "health" => Attribute::MaxHealth,
    "maxhp" => Attribute::MaxHealth,
    "max_hp" => Attribute::MaxHealth,
    "maxhealth" => Attribute::MaxHealth,
    "absorption" => Attribute::MaxAbsorption,
    "golden_hearts" => Attribute::MaxAbsorption,

    // ═══════════════════════════════════════════════════════════════════════
    // Movement
    // ═══════════════════════════════════════════════════════════════════════
    "speed" => Attribute::MovementSpeed,
    "walk_speed" => Attribute::MovementSpeed,
    "walkspeed" => Attribute::MovementSpeed,
    "move_speed" => Attribute::MovementSpeed,
    "fly_speed" => Attribute::FlyingSpeed,
    "flyspeed" => Attribute::FlyingSpeed,
    "sneak_speed" => Attribute::SneakingSpeed,
    "crouch_speed" => Attribute::SneakingSpeed,
    "jump" => Attribute::JumpStrength,
    "jump_height" => Attribute::JumpStrength,
    "jump_boost" => Attribute::JumpStrength,
    "step" => Attribute::StepHeight,
    "step_up" => Attribute::StepHeight,
    "gravity_strength" => Attribute::Gravity,
    "fall_distance" => Attribute::SafeFallDistance,
    "safe_fall" => Attribute::SafeFallDistance,
    "fall_damage" => Attribute::FallDamageMultiplier,
    "swim_speed" => Attribute::WaterMovementEfficiency,
    "water_speed" => Attribute::WaterMovementEfficiency,
    "terrain_speed" => Attribute::MovementEfficiency,

    // ═══════════════════════════════════════════════════════════════════════
    // Combat
    // ═══════════════════════════════════════════════════════════════════════
    "damage" => Attribute::AttackDamage,
    "dmg" => Attribute::AttackDamage,
    "strength" => Attribute::AttackDamage,
    "attack" => Attribute::AttackDamage,
    "atk_speed" => Attribute::AttackSpeed,
    "swing_speed" => Attribute::AttackSpeed,
    "knockback" => Attribute::AttackKnockback,
    "kb" => Attribute::AttackKnockback,
    "defense" => Attribute::Armor,
    "def" => Attribute::Armor,
    "toughness" => Attribute::ArmorToughness,
    "kb_resist" => Attribute::KnockbackResistance,
    "knockback_resist" => Attribute::KnockbackResistance,
    "explosion_resist" => Attribute::ExplosionKnockbackResistance,
    "sweep" => Attribute::SweepingDamageRatio,
    "sweeping" => Attribute::SweepingDamageRatio,
    "burn_time" => Attribute::BurningTime,
    "fire_time" => Attribute::BurningTime,

    // ═══════════════════════════════════════════════════════════════════════
    // Body & interaction
    // ═══════════════════════════════════════════════════════════════════════
    "size" => Attribute::Scale,
    "height" => Attribute::Scale,
    "reach" => Attribute::BlockInteractionRange,
    "block_reach" => Attribute::BlockInteractionRange,
    "entity_reach" => Attribute::EntityInteractionRange,
    "attack_reach" => Attribute::EntityInteractionRange,
    "mining_speed" => Attribute::BlockBreakSpeed,
    "break_speed" => Attribute::BlockBreakSpeed,
    "efficiency" => Attribute::MiningEfficiency,
    "underwater_mining" => Attribute::SubmergedMiningSpeed,
    "oxygen" => Attribute::OxygenBonus,
    "breath" => Attribute::OxygenBonus,
    "luck_bonus" => Attribute::Luck,

    // ═══════════════════════════════════════════════════════════════════════
    // Mob-only
    // ═══════════════════════════════════════════════════════════════════════
    "follow" => Attribute::FollowRange,
    "aggro_range" => Attribute::FollowRange,
    "tempt" => Attribute::TemptRange,
    "reinforcements" => Attribute::SpawnReinforcements,
};
