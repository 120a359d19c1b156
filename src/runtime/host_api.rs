use std::{collections::HashMap, fmt, rc::Rc};

use crate::runtime::{script::ThreadHandle, vm::Vm};

/// Native function callable from scripts through `CALLHOST`.
///
/// The callback reads its parameters with [`Vm::param_as_int`] and friends
/// and must pop exactly the parameters the script pushed, usually through one
/// of the `return_*` helpers. Popping a different count leaves the caller's
/// stack misaligned for the rest of the thread's execution.
pub type HostFn = Rc<dyn Fn(&mut Vm, ThreadHandle)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostScope {
    /// Callable from every thread.
    Global,
    /// Callable only from one thread.
    Thread(ThreadHandle),
}

impl HostScope {
    pub fn admits(self, thread: ThreadHandle) -> bool {
        match self {
            HostScope::Global => true,
            HostScope::Thread(owner) => owner == thread,
        }
    }
}

/// Name-to-callback registry consulted on every `CALLHOST`.
///
/// Names compare case-insensitively. When a name is registered both globally
/// and for the calling thread, the earlier registration wins. Registering the
/// same name in the same scope again replaces the callback in place.
pub trait HostApi {
    fn register(&mut self, scope: HostScope, name: &str, func: HostFn);
    fn resolve(&self, name: &str, thread: ThreadHandle) -> Option<HostFn>;
    /// Drops every registration scoped to `thread`.
    fn remove_thread(&mut self, thread: ThreadHandle);
    fn clear(&mut self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Entry {
    name: String,
    scope: HostScope,
    func: HostFn,
}

/// Registration-ordered table searched linearly.
#[derive(Default)]
pub struct LinearHostApi {
    entries: Vec<Entry>,
}

impl LinearHostApi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for LinearHostApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (&e.name, e.scope)))
            .finish()
    }
}

impl HostApi for LinearHostApi {
    fn register(&mut self, scope: HostScope, name: &str, func: HostFn) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.scope == scope && e.name.eq_ignore_ascii_case(name))
        {
            entry.func = func;
            return;
        }
        self.entries.push(Entry {
            name: name.to_string(),
            scope,
            func,
        });
    }

    fn resolve(&self, name: &str, thread: ThreadHandle) -> Option<HostFn> {
        self.entries
            .iter()
            .find(|e| e.scope.admits(thread) && e.name.eq_ignore_ascii_case(name))
            .map(|e| e.func.clone())
    }

    fn remove_thread(&mut self, thread: ThreadHandle) {
        self.entries
            .retain(|e| e.scope != HostScope::Thread(thread));
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Hash-keyed table with the same resolution order as [`LinearHostApi`].
#[derive(Default)]
pub struct HashedHostApi {
    entries: HashMap<(String, HostScope), (u64, HostFn)>,
    next_seq: u64,
}

impl HashedHostApi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostApi for HashedHostApi {
    fn register(&mut self, scope: HostScope, name: &str, func: HostFn) {
        let key = (name.to_ascii_uppercase(), scope);
        if let Some(existing) = self.entries.get_mut(&key) {
            existing.1 = func;
            return;
        }
        self.entries.insert(key, (self.next_seq, func));
        self.next_seq += 1;
    }

    fn resolve(&self, name: &str, thread: ThreadHandle) -> Option<HostFn> {
        let upper = name.to_ascii_uppercase();
        let scoped = self.entries.get(&(upper.clone(), HostScope::Thread(thread)));
        let global = self.entries.get(&(upper, HostScope::Global));
        match (scoped, global) {
            (Some(a), Some(b)) => Some(if a.0 < b.0 { a.1.clone() } else { b.1.clone() }),
            (Some(only), None) | (None, Some(only)) => Some(only.1.clone()),
            (None, None) => None,
        }
    }

    fn remove_thread(&mut self, thread: ThreadHandle) {
        self.entries
            .retain(|(_, scope), _| *scope != HostScope::Thread(thread));
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
