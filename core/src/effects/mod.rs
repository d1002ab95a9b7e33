//! Timed attribute effects
//!
//! This module provides:
//! - **Records**: one timed override on one owner attribute
//! - **Stacks**: the ordered records on one (owner, attribute) pair
//! - **Manager**: apply, cancel, expire, connect and disconnect
//! - **Scanner**: the periodic driver that expires running tops
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     apply_effect (command)                       │
//! │   "Set alex's scale to 2.0 for 30s"  (captures current 1.0)      │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                     owner execution context
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                EffectStack (alex, scale)                         │
//! │   [0] 1.0 → 1.5  paused, 12s left                                │
//! │   [1] 1.5 → 2.0  running, 30s left        ◀── top                │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                 ExpirationScanner tick / cancel
//!                              │
//!                              ▼
//!          live value −= Δ of removed record, next record resumes
//! ```
//!
//! Every change is mirrored to the store through the persistence writer so
//! stacks survive a disconnect or a restart.

mod error;
mod manager;
mod record;
pub mod scanner;
pub mod stack;


pub use error::EffectError;
pub use manager::EffectStackManager;
pub use record::{EffectId, EffectRecord, OwnerId};
pub use scanner::ExpirationScanner;
pub use stack::{EffectStack, Unwind};
