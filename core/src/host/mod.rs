//! Contracts the engine needs from the hosting simulation.
//!
//! - [`AttributeHost`]: read/write an entity's live attribute values
//! - [`OwnerExecutor`]: run work for one entity, never concurrently with
//!   other work for the same entity
//!
//! [`MailboxExecutor`] and [`InMemoryHost`] are reference implementations
//! used by the admin shell and the tests.

mod mailbox;
mod memory;

pub use mailbox::MailboxExecutor;
pub use memory::InMemoryHost;

use std::future::Future;
use std::pin::Pin;

use crate::attributes::Attribute;
use crate::effects::OwnerId;

/// Live attribute access. Only called from inside the owner's execution
/// context.
pub trait AttributeHost: Send + Sync + 'static {
    /// Current value, or `None` when the entity does not carry the attribute.
    fn live_value(&self, owner: OwnerId, attribute: Attribute) -> Option<f64>;

    fn set_live_value(&self, owner: OwnerId, attribute: Attribute, value: f64);
}

/// A unit of work bound to one owner.
pub type OwnerJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Per-owner serialised execution.
///
/// Jobs submitted for the same owner run one at a time, each to completion,
/// in submission order. Jobs for different owners may run in parallel.
pub trait OwnerExecutor: Send + Sync + 'static {
    fn execute(&self, owner: OwnerId, job: OwnerJob);

    /// The owner has left. Resources held for it may be freed once its
    /// queued jobs finish; a later `execute` must still work.
    fn release(&self, _owner: OwnerId) {}
}
