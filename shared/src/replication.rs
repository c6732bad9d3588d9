//! Field-level change replication.
//!
//! A [`Replicated`] value wraps one authoritative field. Every committed change
//! notifies the registered listeners (old value, new value) and marks the field
//! dirty so the authority can push it to mirrors on the next broadcast. Mirrors
//! use the same wrapper: applying a pushed value through [`Replicated::set`]
//! fires their local listeners, so every holder observes changes the same way.

use std::fmt;

type Listener<T> = Box<dyn FnMut(&T, &T) + Send>;

pub struct Replicated<T> {
    value: T,
    dirty: bool,
    listeners: Vec<Listener<T>>,
}

impl<T: Clone + PartialEq> Replicated<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            dirty: false,
            listeners: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Commits a new value. Returns false (and notifies nobody) when the value
    /// is unchanged.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }

        let old = std::mem::replace(&mut self.value, value);
        self.dirty = true;
        for listener in &mut self.listeners {
            listener(&old, &self.value);
        }
        true
    }

    /// Edits a copy of the value and commits it through [`Replicated::set`].
    pub fn modify(&mut self, edit: impl FnOnce(&mut T)) -> bool {
        let mut next = self.value.clone();
        edit(&mut next);
        self.set(next)
    }

    /// Registers a change callback invoked with `(old, new)`.
    pub fn on_change(&mut self, listener: impl FnMut(&T, &T) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the current value if it changed since the last call.
    pub fn take_dirty(&mut self) -> Option<T> {
        if self.dirty {
            self.dirty = false;
            Some(self.value.clone())
        } else {
            None
        }
    }

    /// Marks the field dirty without changing it, forcing a re-push.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl<T: Clone + PartialEq + Default> Default for Replicated<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Replicated<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replicated")
            .field("value", &self.value)
            .field("dirty", &self.dirty)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_set_notifies_listeners_with_old_and_new() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut field = Replicated::new(100.0_f32);

        let sink = Arc::clone(&seen);
        field.on_change(move |old, new| sink.lock().unwrap().push((*old, *new)));

        assert!(field.set(75.0));
        assert!(field.set(50.0));

        assert_eq!(*seen.lock().unwrap(), vec![(100.0, 75.0), (75.0, 50.0)]);
    }

    #[test]
    fn test_unchanged_value_is_not_broadcast() {
        let calls = Arc::new(Mutex::new(0));
        let mut field = Replicated::new(3_u32);

        let sink = Arc::clone(&calls);
        field.on_change(move |_, _| *sink.lock().unwrap() += 1);

        assert!(!field.set(3));
        assert!(!field.is_dirty());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_take_dirty_clears_flag() {
        let mut field = Replicated::new(false);
        field.set(true);

        assert_eq!(field.take_dirty(), Some(true));
        assert_eq!(field.take_dirty(), None);

        field.mark_dirty();
        assert_eq!(field.take_dirty(), Some(true));
    }

    #[test]
    fn test_modify_commits_edited_copy() {
        let mut field = Replicated::new(vec![1, 2]);
        assert!(field.modify(|v| v.push(3)));
        assert_eq!(field.get(), &vec![1, 2, 3]);
        assert!(!field.modify(|_| {}));
    }
}
