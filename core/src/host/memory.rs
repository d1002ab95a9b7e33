//! Host stand-in that keeps attribute values in a map.

use std::sync::RwLock;

use hashbrown::HashMap;

use super::AttributeHost;
use crate::attributes::Attribute;
use crate::effects::OwnerId;

/// Attribute values for simulated entities.
///
/// Unset attributes read as their registry default, so every entity carries
/// every attribute.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    values: RwLock<HashMap<(OwnerId, Attribute), f64>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, falling back to the attribute default.
    pub fn value(&self, owner: OwnerId, attribute: Attribute) -> f64 {
        self.live_value(owner, attribute)
            .unwrap_or_else(|| attribute.meta().default_value)
    }

    /// Attributes explicitly set for `owner`, sorted by key.
    pub fn values_for(&self, owner: OwnerId) -> Vec<(Attribute, f64)> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<_> = values
            .iter()
            .filter(|((o, _), _)| *o == owner)
            .map(|((_, attribute), value)| (*attribute, *value))
            .collect();
        out.sort_by_key(|(attribute, _)| *attribute);
        out
    }

    /// Forget every value set for `owner`.
    pub fn reset(&self, owner: OwnerId) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(o, _), _| *o != owner);
    }
}

impl AttributeHost for InMemoryHost {
    fn live_value(&self, owner: OwnerId, attribute: Attribute) -> Option<f64> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        Some(
            values
                .get(&(owner, attribute))
                .copied()
                .unwrap_or_else(|| attribute.meta().default_value),
        )
    }

    fn set_live_value(&self, owner: OwnerId, attribute: Attribute, value: f64) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((owner, attribute), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_attributes_read_as_default() {
        let host = InMemoryHost::new();
        let owner = OwnerId::from_name("alex");
        assert_eq!(host.value(owner, Attribute::MaxHealth), 20.0);

        host.set_live_value(owner, Attribute::MaxHealth, 40.0);
        assert_eq!(host.value(owner, Attribute::MaxHealth), 40.0);
        assert_eq!(host.values_for(owner), vec![(Attribute::MaxHealth, 40.0)]);

        host.reset(owner);
        assert_eq!(host.value(owner, Attribute::MaxHealth), 20.0);
    }
}
