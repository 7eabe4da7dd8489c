use crate::builtin::Builtin;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Central registry for all built-in commands.
pub struct BuiltinRegistry {
    builtins: BTreeMap<String, Arc<dyn Builtin>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self {
            builtins: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, builtin: Arc<dyn Builtin>) {
        let name = builtin.descriptor().name.clone();
        debug!(builtin = %name, "Registered builtin");
        self.builtins.insert(name, builtin);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Builtin>> {
        self.builtins.get(name)
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}
