//! Per-(owner, attribute) stack of effect records
//!
//! The stack is a plain state machine: it never touches the host. Every
//! mutation that changes the attribute's live value takes the current live
//! value as input and returns the value the caller must write back.
//!
//! # Unwinding
//!
//! Each record is undone purely in terms of its own delta, so external
//! writes that happened while it was active survive:
//!
//! ```text
//!   V0 ──apply A──▶ T_A ──apply B──▶ T_B ──(external)──▶ V1
//!                                                        │
//!                                    expire B: V1 − Δ_B ◀┘
//!                                    expire A: V1 − Δ_B − Δ_A
//! ```
//!
//! A resumed record's contribution is already part of the value captured by
//! the record above it, so resuming never re-adds it.

use crate::clock::Millis;

use super::{EffectId, EffectRecord};

/// Result of taking one record off a stack.
#[derive(Debug, Clone)]
pub struct Unwind {
    pub removed: EffectRecord,
    /// Live value to write after the removal
    pub value: f64,
    /// Record that became the running top, if any
    pub resumed: Option<EffectRecord>,
    /// Records whose `stack_index` changed
    pub renumbered: Vec<EffectRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct EffectStack {
    records: Vec<EffectRecord>,
}

impl EffectStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a stack from persisted rows.
    ///
    /// Rows are ordered by `stack_index`; rows whose countdown already ran
    /// out are returned separately and left out. Survivors are renumbered
    /// from zero, all but the last are paused, and every clock restarts at
    /// `now` so time spent offline is never charged.
    pub fn restore(mut rows: Vec<EffectRecord>, now: Millis) -> (Self, Vec<EffectRecord>) {
        rows.sort_by_key(|r| r.stack_index);
        let (mut live, stale): (Vec<_>, Vec<_>) = rows.into_iter().partition(|r| !r.is_expired());

        let top = live.len().saturating_sub(1);
        for (index, record) in live.iter_mut().enumerate() {
            record.stack_index = index as u32;
            record.is_paused = index != top;
            record.last_tick_at = now;
        }

        (Self { records: live }, stale)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn top(&self) -> Option<&EffectRecord> {
        self.records.last()
    }

    pub fn records(&self) -> &[EffectRecord] {
        &self.records
    }

    pub fn get(&self, effect_id: EffectId) -> Option<&EffectRecord> {
        self.records.iter().find(|r| r.effect_id == effect_id)
    }

    pub fn contains(&self, effect_id: EffectId) -> bool {
        self.get(effect_id).is_some()
    }

    /// Sum of every record's delta.
    pub fn total_delta(&self) -> f64 {
        self.records.iter().map(EffectRecord::delta).sum()
    }

    /// Push `record` as the new running top.
    ///
    /// The previous top has its consumed time committed and is paused; a
    /// copy of it is returned so the caller can persist the change.
    pub fn push(&mut self, mut record: EffectRecord, now: Millis) -> Option<EffectRecord> {
        let paused = self.records.last_mut().and_then(|top| {
            if top.is_paused {
                return None;
            }
            top.tick(now);
            top.pause();
            Some(top.clone())
        });

        record.stack_index = self.records.len() as u32;
        record.resume(now);
        self.records.push(record);
        paused
    }

    /// Charge elapsed time to the running top.
    ///
    /// Returns `true` when the top's countdown has run out.
    pub fn tick_top(&mut self, now: Millis) -> bool {
        match self.records.last_mut() {
            Some(top) if !top.is_paused => {
                top.tick(now);
                top.is_expired()
            }
            _ => false,
        }
    }

    /// Commit the running top's consumed time without checking expiry.
    /// Returns a copy when the top was running.
    pub fn commit_top(&mut self, now: Millis) -> Option<EffectRecord> {
        let top = self.records.last_mut()?;
        if top.is_paused {
            return None;
        }
        top.tick(now);
        Some(top.clone())
    }

    /// Remove the top record and unwind its contribution from `current_value`.
    pub fn pop_top(&mut self, current_value: f64, now: Millis) -> Option<Unwind> {
        let removed = self.records.pop()?;
        let value = current_value - removed.delta();

        let resumed = self.records.last_mut().map(|next| {
            next.resume(now);
            next.clone()
        });

        Some(Unwind {
            removed,
            value,
            resumed,
            renumbered: Vec::new(),
        })
    }

    /// Remove one record anywhere in the stack.
    ///
    /// Removing the top behaves like [`pop_top`](Self::pop_top). Removing a
    /// buried record takes back its delta immediately, shifts the records
    /// above it down by one, and leaves the running top untouched.
    pub fn remove(&mut self, effect_id: EffectId, current_value: f64, now: Millis) -> Option<Unwind> {
        let position = self.records.iter().position(|r| r.effect_id == effect_id)?;
        if position + 1 == self.records.len() {
            return self.pop_top(current_value, now);
        }

        let removed = self.records.remove(position);
        let value = current_value - removed.delta();

        let renumbered = self.records[position..]
            .iter_mut()
            .map(|record| {
                record.stack_index -= 1;
                record.clone()
            })
            .collect();

        Some(Unwind {
            removed,
            value,
            resumed: None,
            renumbered,
        })
    }

    /// Empty the stack, returning its records bottom-first.
    pub fn clear(&mut self) -> Vec<EffectRecord> {
        std::mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;
    use crate::effects::OwnerId;

    fn record(target: f64, captured: f64, duration: i64) -> EffectRecord {
        EffectRecord::new(
            OwnerId::from_name("alex"),
            Attribute::AttackDamage,
            target,
            captured,
            duration,
            0,
            "test",
        )
    }

    fn assert_single_running_top(stack: &EffectStack) {
        let running = stack.records().iter().filter(|r| !r.is_paused).count();
        assert_eq!(running, usize::from(!stack.is_empty()));
        if let Some(top) = stack.top() {
            assert!(!top.is_paused);
        }
        for (index, r) in stack.records().iter().enumerate() {
            assert_eq!(r.stack_index as usize, index);
        }
    }

    #[test]
    fn push_pauses_previous_top_and_commits_its_time() {
        let mut stack = EffectStack::new();
        assert!(stack.push(record(5.0, 2.0, 1_000), 0).is_none());

        let paused = stack.push(record(9.0, 5.0, 1_000), 400).unwrap();
        assert!(paused.is_paused);
        assert_eq!(paused.remaining_ms, 600);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.top().unwrap().target_value, 9.0);
        assert_single_running_top(&stack);
    }

    #[test]
    fn pop_unwinds_in_order() {
        let mut stack = EffectStack::new();
        stack.push(record(5.0, 2.0, 1_000), 0);
        stack.push(record(9.0, 5.0, 1_000), 0);

        let first = stack.pop_top(9.0, 100).unwrap();
        assert_eq!(first.value, 5.0);
        let resumed = first.resumed.unwrap();
        assert!(!resumed.is_paused);
        assert_eq!(resumed.last_tick_at, 100);

        let second = stack.pop_top(first.value, 200).unwrap();
        assert_eq!(second.value, 2.0);
        assert!(second.resumed.is_none());
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_preserves_external_changes() {
        let mut stack = EffectStack::new();
        stack.push(record(5.0, 2.0, 1_000), 0);

        // something else added 10 while the effect was running
        let unwind = stack.pop_top(15.0, 100).unwrap();
        assert_eq!(unwind.value, 12.0);
    }

    #[test]
    fn removing_a_buried_record_takes_back_its_delta() {
        let mut stack = EffectStack::new();
        let a = record(5.0, 2.0, 1_000);
        let a_id = a.effect_id;
        stack.push(a, 0);
        stack.push(record(9.0, 5.0, 1_000), 0);
        stack.push(record(10.0, 9.0, 1_000), 0);

        let unwind = stack.remove(a_id, 10.0, 50).unwrap();
        assert_eq!(unwind.value, 7.0);
        assert!(unwind.resumed.is_none());
        assert_eq!(unwind.renumbered.len(), 2);
        assert_eq!(stack.len(), 2);
        assert_single_running_top(&stack);

        // the rest still unwinds back to the original baseline
        let v = stack.pop_top(unwind.value, 60).unwrap().value;
        let v = stack.pop_top(v, 70).unwrap().value;
        assert_eq!(v, 2.0);
    }

    #[test]
    fn removing_the_top_resumes_the_next_record() {
        let mut stack = EffectStack::new();
        stack.push(record(5.0, 2.0, 1_000), 0);
        let b = record(9.0, 5.0, 1_000);
        let b_id = b.effect_id;
        stack.push(b, 0);

        let unwind = stack.remove(b_id, 9.0, 10).unwrap();
        assert_eq!(unwind.value, 5.0);
        assert!(unwind.resumed.is_some());
        assert!(stack.remove(b_id, 5.0, 10).is_none());
    }

    #[test]
    fn tick_top_reports_expiry() {
        let mut stack = EffectStack::new();
        stack.push(record(5.0, 2.0, 1_000), 0);
        assert!(!stack.tick_top(999));
        assert!(stack.tick_top(1_000));
    }

    #[test]
    fn restore_drops_stale_rows_and_renumbers() {
        let mut rows = Vec::new();
        for (index, remaining) in [(4u32, 500i64), (0, 1_000), (2, 0), (1, -20)] {
            let mut r = record(1.0, 0.0, remaining);
            r.stack_index = index;
            r.is_paused = false;
            r.last_tick_at = 3;
            rows.push(r);
        }

        let (stack, stale) = EffectStack::restore(rows, 42);
        assert_eq!(stale.len(), 2);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.records()[0].remaining_ms, 1_000);
        assert_eq!(stack.top().unwrap().remaining_ms, 500);
        assert!(stack.records().iter().all(|r| r.last_tick_at == 42));
        assert_single_running_top(&stack);
    }

    #[test]
    fn total_delta_sums_every_layer() {
        let mut stack = EffectStack::new();
        stack.push(record(5.0, 2.0, 1_000), 0);
        stack.push(record(9.0, 5.0, 1_000), 0);
        stack.push(record(1.0, 9.0, 1_000), 0);
        assert_eq!(stack.total_delta(), -1.0);
        assert_eq!(stack.clear().len(), 3);
        assert!(stack.is_empty());
    }
}
