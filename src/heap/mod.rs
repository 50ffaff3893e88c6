// Copyright 2017 The Australian National University
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use std::cell::Cell;
use std::fmt;

use crate::common::HeapMemory;
use crate::objectmodel::header;
use crate::objectmodel::ObjectLayout;
use utils::*;

pub mod barrier;
pub mod young;
pub mod old;
pub mod permanent;
pub mod gc;

use self::barrier::CardTable;
use self::permanent::PermanentSpace;

pub const YOUNG_GENERATION: usize = 0;
pub const OLD_GENERATION: usize = 1;

/// smallest total heap we will run with
pub const MIN_TOTAL_HEAP: ByteSize = 1 << 10;
/// default size of one young semispace
pub const DEFAULT_YOUNG_SIZE: ByteSize = 1 << 20;
/// objects larger than this go straight to the old generation by default
pub const LARGE_OBJECT_THRESHOLD: ByteSize = 50000;

/// The address range of a generation and its bump allocation state.
///
/// `heap_base..heap_top` is everything the generation owns (both
/// semispaces for the young generation). `alloc_base..alloc_top` is the part
/// currently receiving allocations. Outside a collection
/// `alloc_base <= alloc_mark <= alloc_ptr <= alloc_top`.
pub struct GenSpace {
    heap_base: Address,
    heap_top: Address,

    alloc_base: Cell<Address>,
    alloc_top: Cell<Address>,
    alloc_ptr: Cell<Address>,
    alloc_mark: Cell<Address>,
}

impl GenSpace {
    pub fn new(heap_base: Address, heap_top: Address) -> GenSpace {
        GenSpace {
            heap_base: heap_base,
            heap_top: heap_top,
            alloc_base: Cell::new(heap_base),
            alloc_top: Cell::new(heap_top),
            alloc_ptr: Cell::new(heap_base),
            alloc_mark: Cell::new(heap_base),
        }
    }

    #[inline(always)]
    pub fn heap_base(&self) -> Address {
        self.heap_base
    }
    #[inline(always)]
    pub fn heap_top(&self) -> Address {
        self.heap_top
    }
    #[inline(always)]
    pub fn alloc_base(&self) -> Address {
        self.alloc_base.get()
    }
    #[inline(always)]
    pub fn alloc_top(&self) -> Address {
        self.alloc_top.get()
    }
    #[inline(always)]
    pub fn alloc_ptr(&self) -> Address {
        self.alloc_ptr.get()
    }
    #[inline(always)]
    pub fn alloc_mark(&self) -> Address {
        self.alloc_mark.get()
    }

    pub fn set_alloc_ptr(&self, ptr: Address) {
        debug_assert!(ptr >= self.alloc_base() && ptr <= self.alloc_top());
        self.alloc_ptr.set(ptr)
    }

    pub fn set_alloc_mark(&self, mark: Address) {
        debug_assert!(mark >= self.alloc_base() && mark <= self.alloc_ptr());
        self.alloc_mark.set(mark)
    }

    /// makes [base, top) the allocation range, with the pointer at ptr
    pub fn reset_alloc_range(&self, base: Address, top: Address, ptr: Address) {
        debug_assert!(base >= self.heap_base && top <= self.heap_top);
        self.alloc_base.set(base);
        self.alloc_top.set(top);
        self.alloc_ptr.set(ptr);
        self.alloc_mark.set(ptr);
    }

    #[inline(always)]
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.heap_base && addr < self.heap_top
    }

    /// bump allocation, the fast path of every allocation
    #[inline(always)]
    pub fn bump(&self, size: ByteSize) -> Option<Address> {
        let ptr = self.alloc_ptr.get();
        if self.alloc_top.get() - ptr >= size {
            self.alloc_ptr.set(ptr + size);
            Some(ptr)
        } else {
            None
        }
    }

    #[inline(always)]
    pub fn free_bytes(&self) -> ByteSize {
        self.alloc_top() - self.alloc_ptr()
    }
}

impl fmt::Display for GenSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{} .. {}) alloc [{} .. {}) ptr {} mark {}",
            self.heap_base,
            self.heap_top,
            self.alloc_base(),
            self.alloc_top(),
            self.alloc_ptr(),
            self.alloc_mark()
        )
    }
}

/// Everything a collection phase touches besides the generations
/// themselves.
pub struct GcEnv<'a> {
    pub mem: &'a mut HeapMemory,
    pub layout: &'a dyn ObjectLayout,
    pub cards: &'a mut CardTable,
    pub permanent: &'a PermanentSpace,
}

impl<'a> GcEnv<'a> {
    /// size of the object at obj, read through its class word
    #[inline(always)]
    pub fn object_size(&self, obj: ObjectReference) -> ByteSize {
        let class = header::class_id(self.mem, obj);
        self.layout.object_size(self.mem, obj, class)
    }

    #[inline(always)]
    pub fn is_permanent(&self, obj: ObjectReference) -> bool {
        self.permanent.contains(obj.to_address())
    }
}

/// A collector's reaction to a reference it finds.
///
/// `process` returns the (possibly new) location of the referent; the
/// provided methods write it back into heap slots and root slots.
pub trait RefVisitor {
    fn process(&mut self, env: &mut GcEnv, obj: ObjectReference) -> ObjectReference;

    #[inline(always)]
    fn visit_slot(&mut self, env: &mut GcEnv, slot: Address) {
        let obj = env.mem.load_ref(slot);
        if !obj.is_null() {
            let new_obj = self.process(env, obj);
            if new_obj != obj {
                env.mem.store_ref(slot, new_obj);
            }
        }
    }

    #[inline(always)]
    fn visit_root(&mut self, env: &mut GcEnv, root: &mut ObjectReference) {
        if !root.is_null() {
            *root = self.process(env, *root);
        }
    }
}

/// visits every reference slot of obj
pub fn scan_object(env: &mut GcEnv, obj: ObjectReference, visitor: &mut dyn RefVisitor) {
    let layout = env.layout;
    let class = header::class_id(env.mem, obj);
    let map = layout.ref_map(env.mem, obj, class);
    map.for_each_slot(obj, |slot| visitor.visit_slot(env, slot));
}

/// visits every object in [start, end), which must be densely packed
pub fn scan_objects_in_range(
    env: &mut GcEnv,
    start: Address,
    end: Address,
    visitor: &mut dyn RefVisitor,
) {
    let mut cursor = start;
    while cursor < end {
        let obj = cursor.to_object_reference();
        let size = env.object_size(obj);
        scan_object(env, obj, visitor);
        cursor += size;
    }
    debug_assert!(cursor == end);
}

/// Liveness queries handed to special-object processing.
pub trait Liveness {
    /// whether obj survives the collection in progress
    fn is_live(&self, obj: ObjectReference) -> bool;

    /// makes the object in root (and everything it reaches) live, and
    /// updates root to its new location
    fn scan_transitively(&mut self, root: &mut ObjectReference);
}

/// The embedding runtime's side of a collection.
pub trait Roots {
    /// calls visit once per root slot
    fn scan_roots(&mut self, visit: &mut dyn FnMut(&mut ObjectReference));

    /// called once marking or copying is complete; weak references and
    /// similar tables are cleared or kept alive here
    fn process_special_objects(&mut self, _liveness: &mut dyn Liveness) {}

    /// called by a compacting collection so special tables can be updated
    /// to moved addresses
    fn scan_special_objects(&mut self, _visit: &mut dyn FnMut(&mut ObjectReference)) {}
}

/// The operations both generations offer to the heap driver and to each
/// other.
pub trait Generation {
    fn generation_no(&self) -> usize;

    fn space(&self) -> &GenSpace;

    #[inline(always)]
    fn in_generation(&self, addr: Address) -> bool {
        self.space().contains(addr)
    }

    /// bump allocation without collecting
    #[inline(always)]
    fn allocate(&self, size: ByteSize) -> Option<Address> {
        self.space().bump(size)
    }

    fn free_memory(&self) -> ByteSize {
        self.space().free_bytes()
    }

    fn total_memory(&self) -> ByteSize;

    fn start_gc(&self);

    fn end_gc(&self);

    /// copies obj into this generation, None if it does not fit
    fn promote_into(&self, mem: &mut HeapMemory, obj: ObjectReference, size: ByteSize) -> Option<ObjectReference>;

    /// visits every slot in this generation that may point into a younger one
    fn scan_older_to_younger(&self, env: &mut GcEnv, visitor: &mut dyn RefVisitor);

    /// visits every slot in this generation that may point into an older one
    fn scan_younger_to_older(&self, env: &mut GcEnv, visitor: &mut dyn RefVisitor);

    /// scans objects placed in this generation since the last scan, until
    /// no new ones appear
    fn scan_promoted_pointers(&self, env: &mut GcEnv, visitor: &mut dyn RefVisitor);

    /// an idle range another generation may use as scratch memory
    fn extra_space(&self) -> Option<(Address, Address)>;

    /// collects this generation, true if at least goal bytes are free
    /// afterwards
    fn collect(&mut self, other: &dyn Generation, env: &mut GcEnv, roots: &mut dyn Roots, goal: ByteSize) -> bool;
}
