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
//! Mark, sweep, update, compact.

use crate::heap::barrier;
use crate::heap::*;
use crate::objectmodel::header;
use crate::objectmodel::header::{DEFAULT_VARIOUS_WORD, TODO_PRESERVED_BIT};
use utils::*;

use super::preserved::PreservedHeaderTable;
use super::OldGeneration;

const TRACE_MARK: bool = false;

/// Marks objects of [gen_start, gen_end). Objects still to be scanned form a
/// list threaded through their various words.
struct Marker<'t> {
    gen_start: Address,
    gen_end: Address,
    todo: ObjectReference,
    preserved: &'t mut PreservedHeaderTable,
    objects_marked: usize,
}

impl<'t> Marker<'t> {
    #[inline(always)]
    fn in_generation(&self, obj: ObjectReference) -> bool {
        let addr = obj.to_address();
        addr >= self.gen_start && addr < self.gen_end
    }

    fn push_todo(&mut self, env: &mut GcEnv, obj: ObjectReference) {
        let various = header::various_word(env.mem, obj);
        let mut link = self.todo.to_address().as_usize() as Word;
        if !header::is_trivial(various) {
            self.preserved.push(env.mem, obj, various);
            link |= TODO_PRESERVED_BIT;
        }
        header::set_various_word(env.mem, obj, link);
        self.todo = obj;
    }

    /// pops and scans until the to-do list is empty
    fn follow_todo(&mut self, env: &mut GcEnv) {
        while !self.todo.is_null() {
            let obj = self.todo;
            let link = header::various_word(env.mem, obj);
            self.todo = Address::from_usize((link & !TODO_PRESERVED_BIT) as usize).to_object_reference();

            let original = if link & TODO_PRESERVED_BIT != 0 {
                self.preserved.pop(env.mem, obj)
            } else {
                DEFAULT_VARIOUS_WORD
            };
            header::set_various_word(env.mem, obj, original);

            scan_object(env, obj, self);
        }
    }
}

impl<'t> RefVisitor for Marker<'t> {
    fn process(&mut self, env: &mut GcEnv, obj: ObjectReference) -> ObjectReference {
        if self.in_generation(obj) && !header::is_marked(env.mem, obj) {
            trace_if!(TRACE_MARK, "mark {}", obj);
            header::set_marked(env.mem, obj);
            self.objects_marked += 1;

            let class = header::class_id(env.mem, obj);
            if !env.layout.is_leaf(class) {
                self.push_todo(env, obj);
            }
        }
        obj
    }
}

struct MarkLiveness<'c, 't: 'c, 'e: 'c> {
    marker: &'c mut Marker<'t>,
    env: &'c mut GcEnv<'e>,
}

impl<'c, 't, 'e> Liveness for MarkLiveness<'c, 't, 'e> {
    fn is_live(&self, obj: ObjectReference) -> bool {
        obj.is_null()
            || !self.marker.in_generation(obj)
            || self.env.is_permanent(obj)
            || header::is_marked(self.env.mem, obj)
    }

    fn scan_transitively(&mut self, root: &mut ObjectReference) {
        self.marker.visit_root(self.env, root);
        self.marker.follow_todo(self.env);
    }
}

/// Rewrites references into [gen_start, gen_end) to forwarding addresses.
struct Updater {
    gen_start: Address,
    gen_end: Address,
}

impl RefVisitor for Updater {
    fn process(&mut self, env: &mut GcEnv, obj: ObjectReference) -> ObjectReference {
        let addr = obj.to_address();
        if addr >= self.gen_start && addr < self.gen_end {
            debug_assert!(header::is_marked(env.mem, obj), "reference to dead object {}", obj);
            header::forwarding_address(env.mem, obj)
        } else {
            obj
        }
    }
}

/// Assigns every marked object in [base, top) its compacted address.
/// Returns the end of the compacted objects.
fn sweep(env: &mut GcEnv, preserved: &mut PreservedHeaderTable, base: Address, top: Address) -> Address {
    let mut cursor = base;
    let mut forward = base;
    while cursor < top {
        let obj = cursor.to_object_reference();
        let size = env.object_size(obj);

        if header::is_marked(env.mem, obj) {
            let various = header::various_word(env.mem, obj);
            if !header::is_trivial(various) {
                preserved.push(env.mem, forward.to_object_reference(), various);
            }
            header::set_various_word(env.mem, obj, forward.as_usize() as Word);
            forward += size;
        } else {
            trace_if!(TRACE_MARK, "free {} ({} bytes)", obj, size);
        }

        cursor += size;
    }
    forward
}

fn update_interior_pointers(env: &mut GcEnv, updater: &mut Updater, base: Address, top: Address) {
    let mut cursor = base;
    while cursor < top {
        let obj = cursor.to_object_reference();
        let size = env.object_size(obj);
        if header::is_marked(env.mem, obj) {
            scan_object(env, obj, updater);
        }
        cursor += size;
    }
}

/// Slides every marked object down to its forwarding address. Each copy
/// moves downwards, so nothing not yet visited is overwritten.
fn compact(env: &mut GcEnv, base: Address, top: Address) {
    let mut cursor = base;
    while cursor < top {
        let obj = cursor.to_object_reference();
        let size = env.object_size(obj);

        if header::is_marked(env.mem, obj) {
            let dest = header::forwarding_address(env.mem, obj);
            debug_assert!(dest <= obj);
            if dest != obj {
                env.mem.copy(cursor, dest.to_address(), size);
            }
            header::clear_mark(env.mem, dest);
            header::set_various_word(env.mem, dest, DEFAULT_VARIOUS_WORD);
        }

        cursor += size;
    }
}

pub fn collect(
    gen: &mut OldGeneration,
    younger: &dyn Generation,
    env: &mut GcEnv,
    roots: &mut dyn Roots,
    goal: ByteSize,
) -> bool {
    let base = gen.space.heap_base();
    let heap_top = gen.space.heap_top();
    let top = gen.space.alloc_ptr();

    let (scratch_start, scratch_end) = match younger.extra_space() {
        Some(range) => range,
        None => panic!("old collection started without scratch space"),
    };
    let mut preserved = PreservedHeaderTable::new(scratch_start, scratch_end);

    info!(
        "old collection #{}: [{} .. {}) in use, {} preserved header slots",
        gen.stats.collections + 1,
        base,
        top,
        preserved.capacity()
    );

    // mark
    let objects_marked = {
        let mut marker = Marker {
            gen_start: base,
            gen_end: heap_top,
            todo: ObjectReference::null(),
            preserved: &mut preserved,
            objects_marked: 0,
        };

        younger.scan_younger_to_older(env, &mut marker);
        marker.follow_todo(env);
        roots.scan_roots(&mut |root| marker.visit_root(env, root));
        marker.follow_todo(env);

        {
            let mut liveness = MarkLiveness {
                marker: &mut marker,
                env: &mut *env,
            };
            roots.process_special_objects(&mut liveness);
        }
        debug_assert!(marker.todo.is_null());
        marker.objects_marked
    };
    debug_assert_eq!(preserved.len(), 0);
    preserved.reset();

    // sweep
    let new_top = sweep(env, &mut preserved, base, top);
    debug!(
        "old collection: {} objects marked, {} of {} bytes live",
        objects_marked,
        new_top - base,
        top - base
    );

    // update
    let mut updater = Updater {
        gen_start: base,
        gen_end: heap_top,
    };
    younger.scan_younger_to_older(env, &mut updater);
    roots.scan_roots(&mut |root| updater.visit_root(env, root));
    roots.scan_special_objects(&mut |root| updater.visit_root(env, root));
    update_interior_pointers(env, &mut updater, base, top);

    // compact
    compact(env, base, top);
    preserved.restore_all(env.mem);
    gen.space.reset_alloc_range(base, heap_top, new_top);

    // every remembered-set entry is stale now
    env.cards.clear();
    barrier::rebuild(env, base, heap_top, base, new_top);

    gen.stats.collections += 1;
    gen.stats.objects_marked = objects_marked;
    gen.stats.bytes_live = new_top - base;
    gen.stats.bytes_freed += top - new_top;

    let free = gen.free_memory();
    info!(
        "old collection done: {} bytes reclaimed, {} bytes free",
        top - new_top,
        free
    );

    free >= goal
}
