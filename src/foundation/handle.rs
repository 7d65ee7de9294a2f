use std::{
    cell::RefCell,
    rc::Rc,
    sync::atomic::{AtomicU32, Ordering},
};

static NEXT_OWNER: AtomicU32 = AtomicU32::new(1);

/// Slot index plus the generation the slot had when the handle was issued.
///
/// A slot's generation is bumped every time it is freed, so a handle kept past its removal can
/// never match a later registration that reuses the same slot. `owner` identifies the issuing
/// allocator, so handles from another registry never match either.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RawHandle {
    owner: u32,
    index: u32,
    generation: u32,
}

#[derive(Debug)]
pub(crate) struct HandleAllocator {
    owner: u32,
    generations: Vec<u32>,
    live: Vec<bool>,
    free: Vec<u32>,
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self {
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            generations: Vec::new(),
            live: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl HandleAllocator {
    pub(crate) fn alloc(&mut self) -> RawHandle {
        if let Some(index) = self.free.pop() {
            let i = index as usize;
            self.live[i] = true;
            return RawHandle {
                owner: self.owner,
                index,
                generation: self.generations[i],
            };
        }
        let index = u32::try_from(self.generations.len()).unwrap_or(u32::MAX);
        self.generations.push(0);
        self.live.push(true);
        RawHandle {
            owner: self.owner,
            index,
            generation: 0,
        }
    }

    pub(crate) fn is_live(&self, h: RawHandle) -> bool {
        let i = h.index as usize;
        h.owner == self.owner
            && i < self.generations.len()
            && self.live[i]
            && self.generations[i] == h.generation
    }

    /// Retire `h`. Returns `false` for stale or unknown handles.
    pub(crate) fn free(&mut self, h: RawHandle) -> bool {
        if !self.is_live(h) {
            return false;
        }
        let i = h.index as usize;
        self.live[i] = false;
        self.generations[i] = self.generations[i].wrapping_add(1);
        self.free.push(h.index);
        true
    }
}

/// Ordered callback registry with snapshot firing.
///
/// Callbacks are reference counted so that a firing pass can iterate over a snapshot while the
/// callbacks themselves register or unregister entries.
pub(crate) struct HookList<F: ?Sized> {
    alloc: HandleAllocator,
    entries: Vec<(RawHandle, Rc<RefCell<F>>)>,
}

impl<F: ?Sized> Default for HookList<F> {
    fn default() -> Self {
        Self {
            alloc: HandleAllocator::default(),
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> HookList<F> {
    pub(crate) fn push(&mut self, f: Rc<RefCell<F>>) -> RawHandle {
        let h = self.alloc.alloc();
        self.entries.push((h, f));
        h
    }

    pub(crate) fn remove(&mut self, h: RawHandle) -> bool {
        if !self.alloc.free(h) {
            return false;
        }
        self.entries.retain(|(eh, _)| *eh != h);
        true
    }

    pub(crate) fn contains(&self, h: RawHandle) -> bool {
        self.alloc.is_live(h)
    }

    /// Registration-ordered copy of the current callbacks.
    pub(crate) fn snapshot(&self) -> Vec<Rc<RefCell<F>>> {
        self.entries.iter().map(|(_, f)| Rc::clone(f)).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/handle.rs"]
mod tests;
