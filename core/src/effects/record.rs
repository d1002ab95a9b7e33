//! Effect records (one timed override on one owner attribute)
//!
//! An `EffectRecord` is created by an apply request and lives on its
//! (owner, attribute) stack until its countdown reaches zero or it is
//! cancelled. Only the top record of a stack is unpaused, and only the top
//! record's countdown moves.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attributes::Attribute;
use crate::clock::Millis;

/// Namespace for name-derived owner ids (stable across restarts).
const OWNER_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b7e_9a41_4d0a_8c3e_51f2_a9d4_7b10);

/// Identifier of a live entity that can carry effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Stable id derived from an entity name, for hosts that address
    /// entities by name.
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&OWNER_NAMESPACE, name.to_ascii_lowercase().as_bytes()))
    }

    /// Parse a UUID, falling back to a name-derived id.
    pub fn parse_or_name(input: &str) -> Self {
        Uuid::parse_str(input)
            .map(Self)
            .unwrap_or_else(|_| Self::from_name(input))
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique id of one effect record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectId(pub Uuid);

impl EffectId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EffectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One timed override contributed by one caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRecord {
    pub effect_id: EffectId,
    pub owner_id: OwnerId,
    pub attribute: Attribute,

    // ─── Values ─────────────────────────────────────────────────────────────
    /// Value the attribute is set to while this record is active
    pub target_value: f64,

    /// Attribute value immediately before this record was applied
    pub captured_value: f64,

    // ─── Clock ──────────────────────────────────────────────────────────────
    /// Countdown. Only moves while top-of-stack and the owner is connected.
    pub remaining_ms: i64,

    /// Epoch ms of the last elapsed-time accounting
    pub last_tick_at: Millis,

    // ─── Stack position ─────────────────────────────────────────────────────
    /// 0 = bottom/oldest
    pub stack_index: u32,

    pub is_paused: bool,

    // ─── Provenance ─────────────────────────────────────────────────────────
    pub created_at: DateTime<Utc>,
    pub source: String,
}

impl EffectRecord {
    /// Build a fresh, unpaused record. The caller supplies the stack index.
    pub fn new(
        owner_id: OwnerId,
        attribute: Attribute,
        target_value: f64,
        captured_value: f64,
        duration_ms: i64,
        now: Millis,
        source: impl Into<String>,
    ) -> Self {
        Self {
            effect_id: EffectId::new_random(),
            owner_id,
            attribute,
            target_value,
            captured_value,
            remaining_ms: duration_ms,
            last_tick_at: now,
            stack_index: 0,
            is_paused: false,
            created_at: DateTime::from_timestamp_millis(now).unwrap_or_else(Utc::now),
            source: source.into(),
        }
    }

    /// The quantity this record contributes (and takes back on removal).
    pub fn delta(&self) -> f64 {
        self.target_value - self.captured_value
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_ms <= 0
    }

    /// Charge the time elapsed since `last_tick_at` against the countdown.
    ///
    /// Paused records only move their tick marker. Returns the milliseconds
    /// consumed.
    pub fn tick(&mut self, now: Millis) -> i64 {
        let elapsed = (now - self.last_tick_at).max(0);
        self.last_tick_at = now;
        if self.is_paused {
            return 0;
        }
        self.remaining_ms -= elapsed;
        elapsed
    }

    /// Resume counting from `now`; time spent paused is never charged.
    pub fn resume(&mut self, now: Millis) {
        self.is_paused = false;
        self.last_tick_at = now;
    }

    pub fn pause(&mut self) {
        self.is_paused = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(target: f64, captured: f64, remaining: i64) -> EffectRecord {
        EffectRecord::new(
            OwnerId::from_name("steve"),
            Attribute::Scale,
            target,
            captured,
            remaining,
            0,
            "test",
        )
    }

    #[test]
    fn delta_is_target_minus_captured() {
        assert_eq!(record(3.0, 1.0, 10).delta(), 2.0);
        assert_eq!(record(0.5, 1.0, 10).delta(), -0.5);
    }

    #[test]
    fn tick_charges_only_unpaused_records() {
        let mut r = record(2.0, 1.0, 1_000);
        assert_eq!(r.tick(300), 300);
        assert_eq!(r.remaining_ms, 700);

        r.pause();
        assert_eq!(r.tick(900), 0);
        assert_eq!(r.remaining_ms, 700);
        assert_eq!(r.last_tick_at, 900);
    }

    #[test]
    fn resume_restarts_the_tick_marker() {
        let mut r = record(2.0, 1.0, 1_000);
        r.pause();
        r.resume(5_000);
        assert!(!r.is_paused);
        assert_eq!(r.tick(5_400), 400);
        assert_eq!(r.remaining_ms, 600);
    }

    #[test]
    fn created_at_follows_the_supplied_clock() {
        let r = EffectRecord::new(
            OwnerId::from_name("steve"),
            Attribute::Scale,
            2.0,
            1.0,
            1_000,
            1_700_000_000_123,
            "test",
        );
        assert_eq!(r.created_at.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn clock_going_backwards_charges_nothing() {
        let mut r = record(2.0, 1.0, 1_000);
        r.last_tick_at = 10_000;
        assert_eq!(r.tick(9_000), 0);
        assert_eq!(r.remaining_ms, 1_000);
    }

    #[test]
    fn owner_names_map_to_stable_ids() {
        assert_eq!(OwnerId::from_name("Alex"), OwnerId::from_name("alex"));
        assert_ne!(OwnerId::from_name("alex"), OwnerId::from_name("steve"));

        let id = Uuid::new_v4();
        assert_eq!(OwnerId::parse_or_name(&id.to_string()), OwnerId(id));
    }
}
