//! Script host context: the values every submission in a session can see.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::value::ScriptValue;

/// A capability bundle made available to scripts.
///
/// Packs are identified by name; the host context keeps at most one pack
/// per name.
pub trait ScriptPack: Send + Sync {
    /// Unique pack name.
    fn name(&self) -> &str;

    /// Read-only globals this pack exposes to scripts.
    fn globals(&self) -> Vec<(String, ScriptValue)> {
        Vec::new()
    }
}

/// A pack that exposes a fixed set of globals.
#[derive(Debug, Clone, Default)]
pub struct StaticPack {
    name: String,
    globals: Vec<(String, ScriptValue)>,
}

impl StaticPack {
    /// Create an empty pack with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            globals: Vec::new(),
        }
    }

    /// Add a global.
    pub fn global(mut self, name: impl Into<String>, value: impl Into<ScriptValue>) -> Self {
        self.globals.push((name.into(), value.into()));
        self
    }
}

impl ScriptPack for StaticPack {
    fn name(&self) -> &str {
        &self.name
    }

    fn globals(&self) -> Vec<(String, ScriptValue)> {
        self.globals.clone()
    }
}

/// Arguments and packs exposed to a session.
///
/// Built once per execution and handed to the backend when a session is
/// created. There are no mutators.
#[derive(Clone, Default)]
pub struct ScriptHostContext {
    args: Vec<String>,
    packs: IndexMap<String, Arc<dyn ScriptPack>>,
}

impl ScriptHostContext {
    /// Create a host context. Later packs with a duplicate name are ignored.
    pub fn new<I, S>(args: I, packs: Vec<Arc<dyn ScriptPack>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut by_name = IndexMap::new();
        for pack in packs {
            by_name.entry(pack.name().to_string()).or_insert(pack);
        }

        Self {
            args: args.into_iter().map(Into::into).collect(),
            packs: by_name,
        }
    }

    /// Script arguments in order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Get a single argument.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Look up an active pack by name.
    pub fn require(&self, name: &str) -> Option<&Arc<dyn ScriptPack>> {
        self.packs.get(name)
    }

    /// Iterate over active packs.
    pub fn packs(&self) -> impl Iterator<Item = &Arc<dyn ScriptPack>> {
        self.packs.values()
    }

    /// Names of active packs.
    pub fn pack_names(&self) -> impl Iterator<Item = &str> {
        self.packs.keys().map(String::as_str)
    }

    /// All pack globals. The first pack to define a name wins.
    pub fn globals(&self) -> IndexMap<String, ScriptValue> {
        let mut globals = IndexMap::new();
        for pack in self.packs.values() {
            for (name, value) in pack.globals() {
                globals.entry(name).or_insert(value);
            }
        }
        globals
    }
}

impl fmt::Debug for ScriptHostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptHostContext")
            .field("args", &self.args)
            .field("packs", &self.packs.keys().collect::<Vec<_>>())
            .finish()
    }
}
