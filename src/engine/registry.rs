//! Capability registry and dispatcher.
//!
//! The host registers named hardware actions before any ruleset referencing
//! them is loaded; the engine only reads the registry. Dispatch marshals an
//! action's typed parameters into a string-keyed map and invokes the handler
//! synchronously — handlers must return quickly and must not re-enter the
//! engine.

use std::collections::{BTreeMap, HashMap};

use log::warn;

use super::types::{ActionDef, CapabilityHandler, CapabilityMeta, ParamMap, ParamValue};

/// Host-registered capability handlers plus optional introspection metadata.
pub struct CapabilityRegistry {
    handlers: HashMap<String, CapabilityHandler>,
    /// Ordered so profile serialization is deterministic.
    meta: BTreeMap<String, CapabilityMeta>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            meta: BTreeMap::new(),
        }
    }

    /// Register a handler under `id`, replacing any previous registration.
    pub fn register(&mut self, id: &str, handler: CapabilityHandler) {
        self.handlers.insert(id.to_owned(), handler);
    }

    /// Register a handler together with descriptive metadata.
    pub fn register_with_meta(&mut self, id: &str, handler: CapabilityHandler, meta: CapabilityMeta) {
        self.handlers.insert(id.to_owned(), handler);
        self.meta.insert(id.to_owned(), meta);
    }

    /// Whether a handler exists for `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    /// Registered metadata entries in id order.
    pub fn meta_entries(&self) -> impl Iterator<Item = &CapabilityMeta> {
        self.meta.values()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke the handler for `action`, marshaling parameters into a
    /// positional map. A missing handler is a defensive no-op (cannot occur
    /// after a validated load): log and skip.
    pub fn dispatch(&mut self, action: &ActionDef) {
        let Some(handler) = self.handlers.get_mut(&action.capability_id) else {
            warn!("capability '{}' vanished from registry, skipping", action.capability_id);
            return;
        };

        let params = marshal_params(&action.params);
        handler(&params);
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the `"p0"`, `"p1"`, … parameter map for a handler call.
fn marshal_params(params: &[ParamValue]) -> ParamMap {
    let mut map = BTreeMap::new();
    for (i, p) in params.iter().enumerate() {
        let key = format!("p{i}");
        let value = match p {
            ParamValue::Int(v) => v.to_string(),
            ParamValue::Bool(v) => (i32::from(*v)).to_string(),
            ParamValue::Float(v) => format!("{v:.4}"),
            ParamValue::Str(s) => s.clone(),
        };
        map.insert(key, value);
    }
    map
}
