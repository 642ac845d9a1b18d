//! Object heap with a mark-and-sweep collector
//!
//! Objects live in an arena of slots addressed by [`ObjRef`] handles. Each
//! slot carries a generation that is bumped when the slot is freed, so a
//! stale handle never resolves to whatever object reuses the slot.

use super::value::{Object, Value};
use tracing::debug;

/// Generation-checked handle to a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    index: u32,
    generation: u32,
}

impl ObjRef {
    /// Opaque integer identifying the handle (`heap.address`)
    pub fn address(self) -> usize {
        ((self.generation as usize) << 32) | self.index as usize
    }
}

/// When allocation triggers a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GcPolicy {
    /// Collect before every allocation
    #[default]
    EveryAllocation,
    /// Collect once this many objects were allocated since the last cycle
    Threshold(usize),
}

/// A collection root
#[derive(Debug, Clone, Copy)]
pub enum GcRoot<'a> {
    Object(ObjRef),
    Value(&'a Value),
}

/// Statistics about GC activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub collections: u64,
    pub allocated: u64,
    pub freed: u64,
    /// Peak number of live objects
    pub peak_live: usize,
}

#[derive(Debug)]
struct Slot {
    object: Option<Object>,
    marked: bool,
    generation: u32,
}

/// Garbage-collected object heap
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    since_collect: usize,
    policy: GcPolicy,
    stats: GcStats,
}

impl Heap {
    pub fn new(policy: GcPolicy) -> Self {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            since_collect: 0,
            policy,
            stats: GcStats::default(),
        }
    }

    pub fn policy(&self) -> GcPolicy {
        self.policy
    }

    pub fn stats(&self) -> GcStats {
        self.stats
    }

    pub fn live_objects(&self) -> usize {
        self.live
    }

    /// Whether the next allocation should run a collection first
    pub fn should_collect(&self) -> bool {
        match self.policy {
            GcPolicy::EveryAllocation => true,
            GcPolicy::Threshold(n) => self.since_collect >= n,
        }
    }

    /// Track an object without collecting. The object starts unmarked.
    pub fn takeover(&mut self, object: Object) -> ObjRef {
        self.stats.allocated += 1;
        self.since_collect += 1;
        self.live += 1;
        self.stats.peak_live = self.stats.peak_live.max(self.live);

        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.object = Some(object);
                slot.marked = false;
                ObjRef {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    object: Some(object),
                    marked: false,
                    generation: 0,
                });
                ObjRef {
                    index,
                    generation: 0,
                }
            }
        }
    }

    fn slot(&self, r: ObjRef) -> Option<&Slot> {
        self.slots
            .get(r.index as usize)
            .filter(|slot| slot.generation == r.generation)
    }

    pub fn get(&self, r: ObjRef) -> Option<&Object> {
        self.slot(r)?.object.as_ref()
    }

    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut Object> {
        let slot = self.slots.get_mut(r.index as usize)?;
        if slot.generation != r.generation {
            return None;
        }
        slot.object.as_mut()
    }

    pub fn is_live(&self, r: ObjRef) -> bool {
        self.get(r).is_some()
    }

    /// Mark everything reachable from `roots` and free the rest.
    /// Returns the number of objects freed.
    pub fn collect<'a>(&mut self, roots: impl IntoIterator<Item = GcRoot<'a>>) -> usize {
        self.mark(roots);
        let freed = self.sweep();
        self.stats.collections += 1;
        self.since_collect = 0;
        debug!(freed, live = self.live, "gc cycle");
        freed
    }

    fn mark<'a>(&mut self, roots: impl IntoIterator<Item = GcRoot<'a>>) {
        for slot in &mut self.slots {
            slot.marked = false;
        }

        let mut worklist = Vec::new();
        for root in roots {
            match root {
                GcRoot::Object(r) => worklist.push(r),
                GcRoot::Value(value) => trace_value(value, &mut worklist),
            }
        }

        while let Some(r) = worklist.pop() {
            let Some(slot) = self.slots.get_mut(r.index as usize) else {
                continue;
            };
            if slot.generation != r.generation || slot.marked {
                continue;
            }
            slot.marked = true;
            match &slot.object {
                Some(Object::Array(items)) => {
                    for item in items {
                        trace_value(item, &mut worklist);
                    }
                }
                Some(Object::Table(table)) => table.trace(&mut worklist),
                Some(Object::String(_)) | None => {}
            }
        }
    }

    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.object.is_some() && !slot.marked {
                slot.object = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                freed += 1;
            }
            slot.marked = false;
        }
        self.live -= freed;
        self.stats.freed += freed as u64;
        freed
    }

    /// Dispose of every object regardless of reachability
    pub fn free_all(&mut self) -> usize {
        let freed = self.live;
        self.stats.freed += freed as u64;
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.object.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            slot.marked = false;
            self.free.push(index as u32);
        }
        self.live = 0;
        freed
    }
}

/// Push the heap objects a value keeps alive
pub fn trace_value(value: &Value, worklist: &mut Vec<ObjRef>) {
    match value {
        Value::String(r) | Value::Array(r) | Value::Table(r) | Value::Reference(r) => {
            worklist.push(*r)
        }
        Value::Function(closure) => worklist.extend(closure.captured.iter().copied()),
        _ => {}
    }
}
