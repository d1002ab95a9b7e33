//! Owner → attribute → stack bookkeeping and the operations on it.
//!
//! Every mutation is queued on the owner's [`OwnerExecutor`] context and the
//! public method resolves once that job has run. A job is bound to the
//! connection session that was live when it was queued; after that session
//! disconnects the job is a no-op reporting [`EffectError::OwnerOffline`].
//! Until the owner's stored effects have been loaded, each job first retries
//! that load and fails with [`EffectError::Load`] if the store is still down.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use hashbrown::HashMap;
use tokio::sync::oneshot;

use super::stack::{EffectStack, Unwind};
use super::{EffectError, EffectId, EffectRecord, OwnerId};
use crate::attributes::{self, Attribute};
use crate::clock::{Clock, Millis};
use crate::host::{AttributeHost, OwnerExecutor};
use crate::storage::PersistenceHandle;

/// One connection session's effects.
#[derive(Debug, Default)]
struct OwnerEffects {
    online: bool,
    /// Stored rows have been loaded into `stacks`.
    restored: bool,
    stacks: HashMap<Attribute, EffectStack>,
}

type Session = Arc<Mutex<OwnerEffects>>;

fn lock(session: &Session) -> MutexGuard<'_, OwnerEffects> {
    session.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct EffectStackManager {
    owners: RwLock<HashMap<OwnerId, Session>>,
    host: Arc<dyn AttributeHost>,
    executor: Arc<dyn OwnerExecutor>,
    persistence: PersistenceHandle,
    clock: Arc<dyn Clock>,
    max_duration_ms: u64,
}

impl EffectStackManager {
    pub fn new(
        host: Arc<dyn AttributeHost>,
        executor: Arc<dyn OwnerExecutor>,
        persistence: PersistenceHandle,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            owners: RwLock::new(HashMap::new()),
            host,
            executor,
            persistence,
            clock,
            max_duration_ms: u64::MAX,
        }
    }

    /// Cap accepted durations; longer requests are shortened.
    pub fn with_max_duration(mut self, max_duration_ms: u64) -> Self {
        self.max_duration_ms = max_duration_ms.max(1);
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    fn session(&self, owner: OwnerId) -> Option<Session> {
        self.owners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&owner)
            .cloned()
    }

    /// Queue `work` in the owner's context.
    fn queue<T, F>(&self, owner: OwnerId, work: F) -> oneshot::Receiver<Result<T, EffectError>>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, EffectError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.executor.execute(
            owner,
            Box::pin(async move {
                let _ = tx.send(work.await);
            }),
        );
        rx
    }

    async fn wait<T>(
        owner: OwnerId,
        rx: oneshot::Receiver<Result<T, EffectError>>,
    ) -> Result<T, EffectError> {
        rx.await.map_err(|_| EffectError::ContextClosed(owner))?
    }

    /// Queue a synchronous mutation against the owner's current session.
    fn queue_on_session<T, F>(
        self: &Arc<Self>,
        owner: OwnerId,
        work: F,
    ) -> Result<oneshot::Receiver<Result<T, EffectError>>, EffectError>
    where
        T: Send + 'static,
        F: FnOnce(&EffectStackManager, &mut OwnerEffects, Millis) -> Result<T, EffectError>
            + Send
            + 'static,
    {
        let session = self.session(owner).ok_or(EffectError::OwnerOffline(owner))?;
        let manager = Arc::clone(self);
        Ok(self.queue(owner, async move {
            let restored = lock(&session).restored;
            if !restored {
                manager.load_session(owner, &session).await?;
            }

            let mut state = lock(&session);
            if !state.online {
                return Err(EffectError::OwnerOffline(owner));
            }
            let now = manager.clock.now_ms();
            work(&*manager, &mut *state, now)
        }))
    }

    async fn dispatch<T, F>(self: &Arc<Self>, owner: OwnerId, work: F) -> Result<T, EffectError>
    where
        T: Send + 'static,
        F: FnOnce(&EffectStackManager, &mut OwnerEffects, Millis) -> Result<T, EffectError>
            + Send
            + 'static,
    {
        let rx = self.queue_on_session(owner, work)?;
        Self::wait(owner, rx).await
    }

    fn current_value(&self, owner: OwnerId, attribute: Attribute) -> f64 {
        self.host
            .live_value(owner, attribute)
            .unwrap_or_else(|| attribute.meta().default_value)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Push a new timed override onto `(owner, attribute)`.
    ///
    /// The target is clamped to the attribute's range. The attribute, value
    /// and duration are validated before anything is queued.
    pub async fn apply_effect(
        self: &Arc<Self>,
        owner: OwnerId,
        attribute: &str,
        target_value: f64,
        duration: Duration,
        source: &str,
    ) -> Result<EffectId, EffectError> {
        let attribute = attributes::resolve(attribute)
            .ok_or_else(|| EffectError::UnknownAttribute(attribute.to_string()))?;
        if !target_value.is_finite() {
            return Err(EffectError::InvalidValue(target_value));
        }
        let requested_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        if requested_ms == 0 {
            return Err(EffectError::InvalidDuration);
        }
        let duration_ms = requested_ms.min(self.max_duration_ms).min(i64::MAX as u64) as i64;
        let target_value = attribute.meta().clamp(target_value);
        let source = source.to_string();

        self.dispatch(owner, move |manager, state, now| {
            let captured_value = manager.current_value(owner, attribute);
            let record = EffectRecord::new(
                owner,
                attribute,
                target_value,
                captured_value,
                duration_ms,
                now,
                source,
            );
            let effect_id = record.effect_id;

            let stack = state.stacks.entry(attribute).or_default();
            if let Some(paused) = stack.push(record, now) {
                manager.persistence.save(paused);
            }
            manager.host.set_live_value(owner, attribute, target_value);
            if let Some(top) = stack.top() {
                manager.persistence.save(top.clone());
            }

            tracing::debug!(
                owner = %owner,
                attribute = %attribute,
                effect = %effect_id,
                captured = captured_value,
                target = target_value,
                duration_ms,
                depth = stack.len(),
                "Effect applied"
            );
            Ok(effect_id)
        })
        .await
    }

    /// Drop every record on `(owner, attribute)`, taking back their combined
    /// delta in one write. Returns the number of records removed.
    pub async fn cancel_effects(
        self: &Arc<Self>,
        owner: OwnerId,
        attribute: Attribute,
    ) -> Result<usize, EffectError> {
        self.dispatch(owner, move |manager, state, _now| {
            let Some(stack) = state.stacks.remove(&attribute) else {
                return Ok(0);
            };
            let removed = manager.unwind_whole_stack(owner, attribute, stack);
            manager.persistence.delete_owner_attribute(owner, attribute);
            Ok(removed)
        })
        .await
    }

    /// [`cancel_effects`](Self::cancel_effects) for every attribute the owner
    /// has stacks for.
    pub async fn clear_all(self: &Arc<Self>, owner: OwnerId) -> Result<usize, EffectError> {
        self.dispatch(owner, move |manager, state, _now| {
            let removed: usize = state
                .stacks
                .drain()
                .map(|(attribute, stack)| manager.unwind_whole_stack(owner, attribute, stack))
                .sum();
            manager.persistence.delete_owner(owner);
            Ok(removed)
        })
        .await
    }

    /// Remove one record by id. Returns `false` when the owner has no such
    /// record.
    pub async fn cancel_effect(
        self: &Arc<Self>,
        owner: OwnerId,
        effect_id: EffectId,
    ) -> Result<bool, EffectError> {
        self.dispatch(owner, move |manager, state, now| {
            let Some(attribute) = state
                .stacks
                .iter()
                .find(|(_, stack)| stack.contains(effect_id))
                .map(|(attribute, _)| *attribute)
            else {
                return Ok(false);
            };

            let current = manager.current_value(owner, attribute);
            let Some(stack) = state.stacks.get_mut(&attribute) else {
                return Ok(false);
            };
            if let Some(unwind) = stack.remove(effect_id, current, now) {
                manager.apply_unwind(owner, attribute, unwind, "cancelled");
            }
            if stack.is_empty() {
                state.stacks.remove(&attribute);
            }
            Ok(true)
        })
        .await
    }

    fn unwind_whole_stack(
        &self,
        owner: OwnerId,
        attribute: Attribute,
        mut stack: EffectStack,
    ) -> usize {
        let total = stack.total_delta();
        let current = self.current_value(owner, attribute);
        self.host.set_live_value(owner, attribute, current - total);
        let removed = stack.clear().len();
        tracing::debug!(
            owner = %owner,
            attribute = %attribute,
            removed,
            delta = total,
            "Effect stack cancelled"
        );
        removed
    }

    fn apply_unwind(&self, owner: OwnerId, attribute: Attribute, unwind: Unwind, reason: &str) {
        self.persistence.delete_effect(unwind.removed.effect_id);
        self.host.set_live_value(owner, attribute, unwind.value);
        if let Some(resumed) = unwind.resumed {
            self.persistence.save(resumed);
        }
        self.persistence.save_all(unwind.renumbered);
        tracing::debug!(
            owner = %owner,
            attribute = %attribute,
            effect = %unwind.removed.effect_id,
            value = unwind.value,
            reason,
            "Effect removed"
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a session for `owner` and rebuild its stacks from the store.
    ///
    /// Returns the number of records restored. Connecting an owner that is
    /// already connected is a no-op returning `0`. If the store cannot be
    /// read the session still starts, and the load is retried before its
    /// next operation.
    pub async fn on_connect(self: &Arc<Self>, owner: OwnerId) -> Result<usize, EffectError> {
        let session = {
            let mut owners = self.owners.write().unwrap_or_else(|e| e.into_inner());
            if owners.contains_key(&owner) {
                tracing::debug!(owner = %owner, "Owner already connected");
                return Ok(0);
            }
            let session: Session = Arc::new(Mutex::new(OwnerEffects {
                online: true,
                restored: false,
                stacks: HashMap::new(),
            }));
            owners.insert(owner, Arc::clone(&session));
            session
        };

        let manager = Arc::clone(self);
        let rx = self.queue(owner, async move {
            match manager.load_session(owner, &session).await {
                Err(EffectError::Load { source, .. }) => {
                    tracing::warn!(
                        owner = %owner,
                        error = %source,
                        "Effects not restored, retrying on next request"
                    );
                    Ok(0)
                }
                other => other,
            }
        });
        Self::wait(owner, rx).await
    }

    /// Load the owner's stored rows into a session that has none yet.
    async fn load_session(&self, owner: OwnerId, session: &Session) -> Result<usize, EffectError> {
        // Queued behind any earlier disconnect's final writes
        let rows = self
            .persistence
            .load_by_owner(owner)
            .await
            .map_err(|source| EffectError::Load { owner, source })?;

        let mut state = lock(session);
        if !state.online {
            return Err(EffectError::OwnerOffline(owner));
        }
        if state.restored {
            return Ok(0);
        }
        state.restored = true;
        let now = self.clock.now_ms();
        Ok(self.restore(owner, &mut state, rows, now))
    }

    fn restore(
        &self,
        owner: OwnerId,
        state: &mut OwnerEffects,
        rows: Vec<EffectRecord>,
        now: Millis,
    ) -> usize {
        let mut grouped: HashMap<Attribute, Vec<EffectRecord>> = HashMap::new();
        for row in rows {
            grouped.entry(row.attribute).or_default().push(row);
        }

        let mut restored = 0;
        let mut stale_count = 0;
        for (attribute, rows) in grouped {
            let (stack, stale) = EffectStack::restore(rows, now);
            for record in stale {
                self.persistence.delete_effect(record.effect_id);
                stale_count += 1;
            }
            let Some(top) = stack.top() else {
                continue;
            };
            self.host.set_live_value(owner, attribute, top.target_value);
            self.persistence.save_all(stack.records().to_vec());
            restored += stack.len();
            state.stacks.insert(attribute, stack);
        }

        tracing::info!(
            owner = %owner,
            restored,
            stale = stale_count,
            stacks = state.stacks.len(),
            "Owner connected"
        );
        restored
    }

    /// End the owner's session: commit running clocks, persist them and
    /// release the in-memory stacks. Attribute values are left as they are.
    ///
    /// Returns the number of records that were held. Disconnecting an owner
    /// that is not connected returns `0`.
    pub async fn on_disconnect(self: &Arc<Self>, owner: OwnerId) -> Result<usize, EffectError> {
        // Detach first so a reconnect queued after this call starts fresh
        let detached = {
            let mut owners = self.owners.write().unwrap_or_else(|e| e.into_inner());
            owners.remove(&owner)
        };
        let Some(session) = detached else {
            return Ok(0);
        };

        let manager = Arc::clone(self);
        let rx = self.queue(owner, async move {
            let mut state = lock(&session);
            state.online = false;
            let now = manager.clock.now_ms();

            let mut held = 0;
            for stack in state.stacks.values_mut() {
                if let Some(committed) = stack.commit_top(now) {
                    manager.persistence.save(committed);
                }
                held += stack.len();
            }
            state.stacks.clear();

            tracing::info!(owner = %owner, records = held, "Owner disconnected");
            Ok(held)
        });
        let held = Self::wait(owner, rx).await;
        if !self.is_connected(owner) {
            self.executor.release(owner);
        }
        held
    }

    /// Disconnect every connected owner.
    pub async fn shutdown_owners(self: &Arc<Self>) {
        for owner in self.connected_owners() {
            if let Err(e) = self.on_disconnect(owner).await {
                tracing::warn!(owner = %owner, error = %e, "Disconnect during shutdown failed");
            }
        }
    }

    /// Wait until every store write issued so far has been applied.
    pub async fn flush_persistence(&self) {
        self.persistence.flush().await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expiry
    // ─────────────────────────────────────────────────────────────────────────

    /// Tick every connected owner's running tops and expire those that ran
    /// out. Returns the number of records expired.
    pub async fn scan(self: &Arc<Self>) -> usize {
        // Queue every owner's tick up front so owners tick in parallel
        let ticks: Vec<_> = self
            .connected_owners()
            .into_iter()
            .map(|owner| {
                let queued = self.queue_on_session(owner, move |manager, state, now| {
                    Ok(manager.tick_owner(owner, state, now))
                });
                (owner, queued)
            })
            .collect();

        let mut expired = 0;
        for (owner, queued) in ticks {
            let result = match queued {
                Ok(rx) => Self::wait(owner, rx).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(count) => expired += count,
                // Disconnected between snapshot and tick
                Err(EffectError::OwnerOffline(_)) => {}
                Err(e @ EffectError::Load { .. }) => {
                    tracing::debug!(
                        owner = %owner,
                        error = %e,
                        "Scan skipped, effects not restored"
                    );
                }
                Err(e) => tracing::warn!(owner = %owner, error = %e, "Scan tick failed"),
            }
        }
        if expired > 0 {
            tracing::debug!(expired, "Scan complete");
        }
        expired
    }

    fn tick_owner(&self, owner: OwnerId, state: &mut OwnerEffects, now: Millis) -> usize {
        let due: Vec<Attribute> = state
            .stacks
            .iter_mut()
            .filter_map(|(attribute, stack)| stack.tick_top(now).then_some(*attribute))
            .collect();

        for attribute in &due {
            self.expire_top(owner, state, *attribute, now);
        }
        due.len()
    }

    fn expire_top(
        &self,
        owner: OwnerId,
        state: &mut OwnerEffects,
        attribute: Attribute,
        now: Millis,
    ) {
        let current = self.current_value(owner, attribute);
        let Some(stack) = state.stacks.get_mut(&attribute) else {
            return;
        };
        if let Some(unwind) = stack.pop_top(current, now) {
            self.apply_unwind(owner, attribute, unwind, "expired");
        }
        if stack.is_empty() {
            state.stacks.remove(&attribute);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Top record of each of the owner's stacks, ordered by attribute.
    pub fn list_active(&self, owner: OwnerId) -> Vec<EffectRecord> {
        let Some(session) = self.session(owner) else {
            return Vec::new();
        };
        let state = lock(&session);
        let mut tops: Vec<_> = state
            .stacks
            .values()
            .filter_map(|stack| stack.top().cloned())
            .collect();
        tops.sort_by_key(|r| r.attribute);
        tops
    }

    /// Full stack for `(owner, attribute)`, bottom first.
    pub fn list_stack(&self, owner: OwnerId, attribute: Attribute) -> Vec<EffectRecord> {
        let Some(session) = self.session(owner) else {
            return Vec::new();
        };
        let state = lock(&session);
        state
            .stacks
            .get(&attribute)
            .map(|stack| stack.records().to_vec())
            .unwrap_or_default()
    }

    pub fn is_connected(&self, owner: OwnerId) -> bool {
        self.owners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&owner)
    }

    pub fn connected_owners(&self) -> Vec<OwnerId> {
        let mut owners: Vec<_> = self
            .owners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect();
        owners.sort();
        owners
    }
}
