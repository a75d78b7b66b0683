//! Generational arena with stable handles.

use std::fmt;

/// A collection of values addressed by [`Handle`]s that remain stable while
/// other values are inserted and removed.
///
/// Each entry has a generation that is advanced whenever the entry is
/// vacated. A handle records the generation it was issued for, so a handle to
/// a removed value never resolves to a value later inserted in the same
/// entry.
#[derive(Clone, Debug)]
pub struct Arena<V> {
    entries: Vec<Entry<V>>,
    vacant: Vec<u32>,
    len: usize,
}

/// A handle to a value in an [`Arena`].
///
/// Handles are plain data and can be stored anywhere; they do not borrow the
/// arena.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    idx: u32,
    generation: u32,
}

#[derive(Clone, Debug)]
struct Entry<V> {
    generation: u32,
    value: Option<V>,
}

impl<V> Arena<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            vacant: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of values in the arena.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts the given value, reusing a vacated entry if there is one.
    ///
    /// # Returns
    /// The handle for the inserted value.
    ///
    /// # Panics
    /// If the arena would exceed `u32::MAX` entries.
    pub fn insert(&mut self, value: V) -> Handle {
        self.len += 1;
        if let Some(idx) = self.vacant.pop() {
            let entry = &mut self.entries[idx as usize];
            entry.value = Some(value);
            Handle {
                idx,
                generation: entry.generation,
            }
        } else {
            let idx = u32::try_from(self.entries.len())
                .expect("Arena exceeded maximum capacity (u32::MAX)");
            self.entries.push(Entry {
                generation: 0,
                value: Some(value),
            });
            Handle { idx, generation: 0 }
        }
    }

    /// Returns a reference to the value for the given handle, or [`None`] if
    /// the value has been removed or the handle belongs to another arena.
    pub fn get(&self, handle: Handle) -> Option<&V> {
        self.entries
            .get(handle.idx as usize)
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.value.as_ref())
    }

    /// Returns a mutable reference to the value for the given handle, or
    /// [`None`] if the value has been removed or the handle belongs to another
    /// arena.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut V> {
        self.entries
            .get_mut(handle.idx as usize)
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.value.as_mut())
    }

    /// Whether a value exists for the given handle.
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Removes and returns the value for the given handle, if present. The
    /// entry's generation is advanced so that the handle is invalidated.
    pub fn remove(&mut self, handle: Handle) -> Option<V> {
        let entry = self
            .entries
            .get_mut(handle.idx as usize)
            .filter(|entry| entry.generation == handle.generation)?;
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.vacant.push(handle.idx);
        self.len -= 1;
        Some(value)
    }

    /// Returns an iterator over the handles and values in the arena, in
    /// insertion-slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &V)> {
        self.entries.iter().enumerate().filter_map(|(idx, entry)| {
            entry.value.as_ref().map(|value| {
                (
                    Handle {
                        idx: idx as u32,
                        generation: entry.generation,
                    },
                    value,
                )
            })
        })
    }

    /// Returns an iterator over the handles in the arena.
    pub fn handles(&self) -> impl Iterator<Item = Handle> {
        self.iter().map(|(handle, _)| handle)
    }

    /// Returns an iterator over the values in the arena.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().filter_map(|entry| entry.value.as_ref())
    }
}

impl<V> Default for Arena<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle {
    /// Returns the index of the entry the handle refers to. Indices are
    /// reused after removal, so this does not identify a value on its own.
    pub fn index(&self) -> u32 {
        self.idx
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.idx, self.generation)
    }
}
