use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Something a [`Relay`] can reach into.
trait Slot<T>: Send + Sync {
    fn visit(&self, f: &mut dyn FnMut(&mut T));
}

struct CellSlot<T>(Arc<Mutex<T>>);

impl<T: Send> Slot<T> for CellSlot<T> {
    fn visit(&self, f: &mut dyn FnMut(&mut T)) {
        f(&mut self.0.lock());
    }
}

struct FieldSlot<P, U> {
    parent: Arc<dyn Slot<P>>,
    field: Arc<dyn Fn(&mut P) -> &mut U + Send + Sync>,
}

impl<P, U> Slot<U> for FieldSlot<P, U> {
    fn visit(&self, f: &mut dyn FnMut(&mut U)) {
        self.parent.visit(&mut |parent: &mut P| f((self.field)(parent)));
    }
}

struct FnSlot<T> {
    get: Box<dyn Fn() -> T + Send + Sync>,
    set: Box<dyn Fn(T) + Send + Sync>,
}

impl<T> Slot<T> for FnSlot<T> {
    fn visit(&self, f: &mut dyn FnMut(&mut T)) {
        let mut value = (self.get)();
        f(&mut value);
        (self.set)(value);
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Owns one mutable value for the lifetime of whoever declared it, usually
/// an agent instance.
///
/// Steps never get the `State` itself. They get a [`Relay`] from
/// [`State::relay`], which reads and writes the same value.
///
/// Every access takes the cell's lock, so single `get`/`set`/`update` calls
/// are atomic even from concurrent branches. A `get` followed by a `set` is
/// not; use `update` for read-modify-write.
pub struct State<T> {
    cell: Arc<Mutex<T>>,
}

impl<T: Send + 'static> State<T> {
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(Mutex::new(value)),
        }
    }

    /// A relay bound to this cell.
    pub fn relay(&self) -> Relay<T> {
        Relay {
            slot: Arc::new(CellSlot(Arc::clone(&self.cell))),
        }
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.cell.lock().clone()
    }

    pub fn set(&self, value: T) {
        *self.cell.lock() = value;
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.cell.lock());
    }

    /// Replace the value with its default and return the old one.
    pub fn take(&self) -> T
    where
        T: Default,
    {
        std::mem::take(&mut *self.cell.lock())
    }
}

impl<T: Default + Send + 'static> Default for State<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State").field("value", &*self.cell.lock()).finish()
    }
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// A get/set capability for a [`State`] or for one field inside it.
///
/// A relay does not own anything. Clones alias the same storage, and a
/// projected relay reads and writes through its parent, so a write through
/// any of them is seen by all of them.
///
/// Don't touch the same cell from inside an `update`/`with` closure: the
/// cell's lock is held for the closure's duration.
pub struct Relay<T> {
    slot: Arc<dyn Slot<T>>,
}

impl<T> Clone for Relay<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Send + 'static> Relay<T> {
    /// A relay over a custom getter/setter pair. `update` on such a relay
    /// is `get`, modify, `set`.
    pub fn from_fns(
        get: impl Fn() -> T + Send + Sync + 'static,
        set: impl Fn(T) + Send + Sync + 'static,
    ) -> Self {
        Self {
            slot: Arc::new(FnSlot {
                get: Box::new(get),
                set: Box::new(set),
            }),
        }
    }

    /// A read-only relay: always reads `value`, ignores writes.
    pub fn constant(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::from_fns(move || value.clone(), |_| {})
    }

    /// Run `f` against the current value and return what it returns.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut f = Some(f);
        let mut out = None;
        self.slot.visit(&mut |value: &mut T| {
            if let Some(f) = f.take() {
                out = Some(f(value));
            }
        });
        match out {
            Some(out) => out,
            None => unreachable!("relay slot did not visit its value"),
        }
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(|value| value.clone())
    }

    pub fn set(&self, value: T) {
        self.with(move |slot| *slot = value);
    }

    /// Modify the value in place, atomically with respect to other accesses
    /// of the same cell.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.with(f);
    }

    /// A narrower relay over one field of this relay's value.
    ///
    /// ```rust
    /// use agent_pipe::State;
    ///
    /// #[derive(Clone, Default)]
    /// struct Session { turns: u32, notes: Vec<String> }
    ///
    /// let state = State::new(Session::default());
    /// let turns = state.relay().project(|s: &mut Session| &mut s.turns);
    /// turns.set(3);
    /// assert_eq!(state.get().turns, 3);
    /// ```
    pub fn project<U: Send + 'static>(
        &self,
        field: impl Fn(&mut T) -> &mut U + Send + Sync + 'static,
    ) -> Relay<U> {
        Relay {
            slot: Arc::new(FieldSlot {
                parent: Arc::clone(&self.slot),
                field: Arc::new(field),
            }),
        }
    }
}

impl<T> fmt::Debug for Relay<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Relay")
    }
}
