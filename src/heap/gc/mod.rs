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
//! The heap driver: sizes and lays out the heap, serves allocations, picks
//! which generation to collect and implements the write barrier.

use std::cmp;
use std::fmt;

use crate::common::HeapMemory;
use crate::error::GcError;
use crate::gc_options::GcOptions;
use crate::heap::barrier;
use crate::heap::barrier::{CardState, CardTable, CARD_SIZE, SUMMARY_END};
use crate::heap::old::OldGeneration;
use crate::heap::permanent::PermanentSpace;
use crate::heap::young::YoungGeneration;
use crate::heap::*;
use crate::objectmodel::header;
use crate::objectmodel::{ClassId, ObjectLayout, MAX_AGE, OBJECT_HEADER_SIZE};
use utils::math;
use utils::*;

const TRACE_ALLOC: bool = false;

/// Collection counters for both generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub young_collections: usize,
    pub old_collections: usize,
    pub bytes_copied: ByteSize,
    pub bytes_promoted: ByteSize,
    pub objects_promoted: usize,
    pub promotion_failures: usize,
    pub bytes_freed_old: ByteSize,
}

impl fmt::Display for GcStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} young collections ({} bytes copied, {} bytes promoted, {} promotion failures), \
             {} old collections ({} bytes freed)",
            self.young_collections,
            self.bytes_copied,
            self.bytes_promoted,
            self.promotion_failures,
            self.old_collections,
            self.bytes_freed_old
        )
    }
}

/// Young generation size for a heap of heap_size bytes: at most the heap,
/// and at least an eighth of it unless the request reaches the default.
pub fn young_generation_size(requested: ByteSize, heap_size: ByteSize) -> ByteSize {
    let mut young = cmp::min(requested, heap_size);
    if young < DEFAULT_YOUNG_SIZE && young < heap_size / 8 {
        young = heap_size / 8;
    }
    young
}

fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// The whole collected heap.
///
/// Arena layout, all boundaries card aligned:
///
/// | null card | permanent space | semispace 0 | semispace 1 | old generation | slack card |
pub struct Heap {
    mem: HeapMemory,
    layout: Box<dyn ObjectLayout>,
    cards: CardTable,
    permanent: PermanentSpace,
    young: YoungGeneration,
    old: OldGeneration,

    large_object_threshold: ByteSize,
    last_major_gc: i64,
}

impl Heap {
    pub fn new(options: &GcOptions, layout: Box<dyn ObjectLayout>) -> Result<Heap, GcError> {
        crate::start_logging(options.log_level());

        Heap::init_heap(
            options.flag_gc_min_heap_size,
            options.flag_gc_heap_size,
            options,
            layout,
        )
    }

    /// lays out a heap of max_bytes (at least MIN_TOTAL_HEAP); min_bytes only
    /// has to fit
    pub fn init_heap(
        min_bytes: ByteSize,
        max_bytes: ByteSize,
        options: &GcOptions,
        layout: Box<dyn ObjectLayout>,
    ) -> Result<Heap, GcError> {
        if min_bytes > max_bytes {
            return Err(GcError::InvalidHeapSize {
                min: min_bytes,
                max: max_bytes,
            });
        }

        let heap_size = math::align_up(cmp::max(max_bytes, MIN_TOTAL_HEAP), CARD_SIZE);
        let young_size = young_generation_size(options.flag_gc_young_size, heap_size);
        let semispace_size = math::align_up(young_size, CARD_SIZE);
        let old_size = heap_size - semispace_size;
        let permanent_size = math::align_up(options.flag_gc_permanent_size, CARD_SIZE);

        // the first card is never used, so address 0 can be null
        let permanent_start = Address::from_usize(CARD_SIZE);
        let heap_base = permanent_start + permanent_size;
        let old_start = heap_base + 2 * semispace_size;
        let heap_top = old_start + old_size;

        let mem = HeapMemory::new(heap_top.as_usize() + CARD_SIZE)?;

        let threshold = cmp::min(options.flag_gc_promotion_threshold, MAX_AGE as usize) as u8;
        let young = YoungGeneration::new(heap_base, semispace_size, threshold);
        let old = OldGeneration::new(old_start, heap_top);
        let permanent = PermanentSpace::new(permanent_start, heap_base);
        let mut cards = CardTable::new(heap_base, heap_top, heap_base, old_start);
        cards.clear();

        info!(
            "heap is {} bytes (young: 2 x {} bytes, old: {} bytes, permanent: {} bytes)",
            heap_size + semispace_size,
            semispace_size,
            old_size,
            permanent_size
        );
        debug!("{}", young);
        debug!("{}", old);
        debug!("{}", cards);

        Ok(Heap {
            mem: mem,
            layout: layout,
            cards: cards,
            permanent: permanent,
            young: young,
            old: old,
            large_object_threshold: options.flag_gc_large_object_threshold,
            last_major_gc: now_millis(),
        })
    }

    // allocation

    /// Bump allocation without collecting. Objects above the large object
    /// threshold go straight to the old generation. The memory is zeroed.
    #[inline(always)]
    pub fn try_allocate(&mut self, size: ByteSize) -> Option<ObjectReference> {
        let size = math::align_up(size, WORD_SIZE);
        debug_assert!(size >= OBJECT_HEADER_SIZE);

        let addr = if size > self.large_object_threshold {
            self.old.allocate(size)
        } else {
            self.young.allocate(size)
        }?;

        self.mem.zero(addr, size);
        trace_if!(TRACE_ALLOC, "alloc {} bytes at {}", size, addr);
        Some(addr.to_object_reference())
    }

    /// allocates, collecting if needed
    pub fn allocate(&mut self, size: ByteSize, roots: &mut dyn Roots) -> Result<ObjectReference, GcError> {
        match self.try_allocate(size) {
            Some(obj) => Ok(obj),
            None => self.collect_and_retry(size, roots),
        }
    }

    /// collects with size as the goal, then retries the allocation once
    #[inline(never)]
    pub fn collect_and_retry(&mut self, size: ByteSize, roots: &mut dyn Roots) -> Result<ObjectReference, GcError> {
        let size = math::align_up(size, WORD_SIZE);
        self.collect(size, roots);

        match self.retry_allocation(size) {
            Some(obj) => Ok(obj),
            None => {
                warn!("out of memory allocating {} bytes", size);
                Err(GcError::OutOfMemory { requested: size })
            }
        }
    }

    /// tries whichever generation has room, the preferred one first
    fn retry_allocation(&mut self, size: ByteSize) -> Option<ObjectReference> {
        let addr = if size > self.large_object_threshold {
            self.old.allocate(size).or_else(|| self.young.allocate(size))
        } else {
            self.young.allocate(size).or_else(|| self.old.allocate(size))
        }?;

        self.mem.zero(addr, size);
        Some(addr.to_object_reference())
    }

    /// allocates in the permanent space, which is never collected
    pub fn alloc_permanent(&mut self, size: ByteSize) -> Result<ObjectReference, GcError> {
        let size = math::align_up(size, WORD_SIZE);
        match self.permanent.alloc(size) {
            Some(addr) => {
                self.mem.zero(addr, size);
                Ok(addr.to_object_reference())
            }
            None => Err(GcError::OutOfMemory { requested: size }),
        }
    }

    // collection

    /// Young collection first, then an old collection if the young one did
    /// not free goal bytes or could not promote everything. Returns whether
    /// goal bytes are available afterwards.
    pub fn collect(&mut self, goal: ByteSize, roots: &mut dyn Roots) -> bool {
        self.young.start_gc();
        self.old.start_gc();

        let mut success = self.do_young_collection(goal, roots);
        if !success {
            success = self.do_old_collection(goal, roots);
        }

        self.young.end_gc();
        self.old.end_gc();
        success
    }

    /// a young collection on its own, true unless promotion failed
    pub fn collect_young(&mut self, roots: &mut dyn Roots) -> bool {
        self.young.start_gc();
        self.old.start_gc();
        let success = self.do_young_collection(0, roots);
        self.young.end_gc();
        self.old.end_gc();
        success
    }

    /// an old collection on its own
    pub fn collect_old(&mut self, roots: &mut dyn Roots) -> bool {
        self.young.start_gc();
        self.old.start_gc();
        let success = self.do_old_collection(0, roots);
        self.young.end_gc();
        self.old.end_gc();
        success
    }

    /// a young collection followed by an old collection
    pub fn collect_full(&mut self, roots: &mut dyn Roots) -> bool {
        self.young.start_gc();
        self.old.start_gc();
        self.do_young_collection(0, roots);
        let success = self.do_old_collection(0, roots);
        self.young.end_gc();
        self.old.end_gc();
        success
    }

    fn do_young_collection(&mut self, goal: ByteSize, roots: &mut dyn Roots) -> bool {
        let mut env = GcEnv {
            mem: &mut self.mem,
            layout: &*self.layout,
            cards: &mut self.cards,
            permanent: &self.permanent,
        };
        self.young.collect(&self.old, &mut env, roots, goal)
    }

    fn do_old_collection(&mut self, goal: ByteSize, roots: &mut dyn Roots) -> bool {
        let success = {
            let mut env = GcEnv {
                mem: &mut self.mem,
                layout: &*self.layout,
                cards: &mut self.cards,
                permanent: &self.permanent,
            };
            self.old.collect(&self.young, &mut env, roots, goal)
        };
        self.last_major_gc = now_millis();
        success
    }

    // write barrier

    /// marks the card holding slot, if slot is in the old generation
    #[inline(always)]
    pub fn record_store(&mut self, slot: Address) {
        if self.old.in_generation(slot) {
            self.cards.mark_dirty(slot);
        }
    }

    /// The barrier to run after storing value into slot. Stores into the
    /// young generation, and stores of null or permanent objects, need no
    /// record.
    #[inline(always)]
    pub fn write_barrier(&mut self, slot: Address, value: ObjectReference) {
        if value.is_null() || self.permanent.contains(value.to_address()) {
            return;
        }
        if self.young.in_generation(slot) {
            return;
        }
        self.record_store(slot);
    }

    /// stores a reference field and runs the write barrier
    pub fn store_ref(&mut self, obj: ObjectReference, offset: ByteSize, value: ObjectReference) {
        let slot = obj.field(offset);
        self.mem.store_ref(slot, value);
        self.write_barrier(slot, value);
    }

    pub fn load_ref(&self, obj: ObjectReference, offset: ByteSize) -> ObjectReference {
        self.mem.load_ref(obj.field(offset))
    }

    /// stores a non-reference word, no barrier needed
    pub fn store_word(&mut self, obj: ObjectReference, offset: ByteSize, value: Word) {
        self.mem.store_word(obj.field(offset), value)
    }

    pub fn load_word(&self, obj: ObjectReference, offset: ByteSize) -> Word {
        self.mem.load_word(obj.field(offset))
    }

    // queries

    pub fn free_memory(&self) -> ByteSize {
        self.young.free_memory() + self.old.free_memory()
    }

    pub fn total_memory(&self) -> ByteSize {
        self.young.total_memory() + self.old.total_memory()
    }

    /// wall-clock milliseconds of the last old collection (or of heap
    /// creation if there has been none)
    pub fn time_of_last_major_gc(&self) -> i64 {
        self.last_major_gc
    }

    /// Visits every object of both generations in address order, stopping
    /// early when f returns false. Returns whether the walk completed.
    pub fn iterate_heap<F: FnMut(ObjectReference, ClassId, ByteSize) -> bool>(&self, mut f: F) -> bool {
        let ranges = [
            (self.young.space().alloc_base(), self.young.space().alloc_ptr()),
            (self.old.space().heap_base(), self.old.space().alloc_ptr()),
        ];
        for &(start, end) in ranges.iter() {
            let mut cursor = start;
            while cursor < end {
                let obj = cursor.to_object_reference();
                let class = header::class_id(&self.mem, obj);
                let size = self.layout.object_size(&self.mem, obj, class);
                if !f(obj, class, size) {
                    return false;
                }
                cursor += size;
            }
        }
        true
    }

    pub fn stats(&self) -> GcStats {
        let young = self.young.stats();
        let old = self.old.stats();
        GcStats {
            young_collections: young.collections,
            old_collections: old.collections,
            bytes_copied: young.bytes_copied,
            bytes_promoted: young.bytes_promoted,
            objects_promoted: young.objects_promoted,
            promotion_failures: young.promotion_failures,
            bytes_freed_old: old.bytes_freed,
        }
    }

    #[inline(always)]
    pub fn in_young(&self, obj: ObjectReference) -> bool {
        self.young.in_generation(obj.to_address())
    }

    #[inline(always)]
    pub fn in_old(&self, obj: ObjectReference) -> bool {
        self.old.in_generation(obj.to_address())
    }

    #[inline(always)]
    pub fn is_permanent(&self, obj: ObjectReference) -> bool {
        self.permanent.contains(obj.to_address())
    }

    pub fn memory(&self) -> &HeapMemory {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut HeapMemory {
        &mut self.mem
    }

    pub fn layout(&self) -> &dyn ObjectLayout {
        &*self.layout
    }

    pub fn young(&self) -> &YoungGeneration {
        &self.young
    }

    pub fn old(&self) -> &OldGeneration {
        &self.old
    }

    pub fn permanent(&self) -> &PermanentSpace {
        &self.permanent
    }

    pub fn cards(&self) -> &CardTable {
        &self.cards
    }

    // remembered set inspection

    pub fn card_state(&self, addr: Address) -> CardState {
        self.cards.state(self.cards.card_index(addr))
    }

    /// slots recorded in the summary of the card holding addr
    pub fn card_summary(&self, addr: Address) -> Vec<Address> {
        let index = self.cards.card_index(addr);
        let boundary = self.cards.card_boundary(index);
        self.cards
            .summary(index)
            .iter()
            .take_while(|&&offset| offset != SUMMARY_END)
            .map(|&offset| boundary + ((offset as usize) << LOG_POINTER_SIZE))
            .collect()
    }

    /// start of the object overlapping the first word of the card holding addr
    pub fn object_start_for_card(&self, addr: Address) -> Address {
        self.cards.find_object_start(self.cards.card_index(addr))
    }

    /// runs the summary of the card holding addr, returning the non-null
    /// references found there
    pub fn rescan_card_summary(&mut self, addr: Address) -> Vec<ObjectReference> {
        struct Collect(Vec<ObjectReference>);
        impl RefVisitor for Collect {
            fn process(&mut self, _env: &mut GcEnv, obj: ObjectReference) -> ObjectReference {
                self.0.push(obj);
                obj
            }
        }

        let index = self.cards.card_index(addr);
        let mut found = Collect(vec![]);
        let mut env = GcEnv {
            mem: &mut self.mem,
            layout: &*self.layout,
            cards: &mut self.cards,
            permanent: &self.permanent,
        };
        barrier::replay_summary(&mut env, index, &mut found);
        found.0
    }

    /// recomputes card and header entries for the old generation objects in
    /// [start, end)
    pub fn rebuild_remembered_set(&mut self, start: Address, end: Address) {
        let gen_base = self.old.space().heap_base();
        let gen_top = self.old.space().heap_top();
        let mut env = GcEnv {
            mem: &mut self.mem,
            layout: &*self.layout,
            cards: &mut self.cards,
            permanent: &self.permanent,
        };
        barrier::rebuild(&mut env, gen_base, gen_top, start, end);
    }
}

impl fmt::Display for Heap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Heap")?;
        writeln!(f, "{}", self.permanent)?;
        writeln!(f, "{}", self.young)?;
        writeln!(f, "{}", self.old)?;
        writeln!(f, "{}", self.cards)?;
        write!(f, "{}", self.stats())
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
