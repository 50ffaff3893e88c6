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
//! The old generation: bump allocation, collected by mark-sweep-compact.

use std::fmt;

use crate::common::HeapMemory;
use crate::heap::barrier;
use crate::heap::*;
use utils::*;

mod markcompact;
mod preserved;

pub use self::preserved::PreservedHeaderTable;
pub use self::preserved::PRESERVED_RECORD_SIZE;

/// Counters kept across old collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct OldStats {
    pub collections: usize,
    /// objects marked by the last collection
    pub objects_marked: usize,
    /// bytes in use right after the last collection
    pub bytes_live: ByteSize,
    /// bytes reclaimed by all collections so far
    pub bytes_freed: ByteSize,
}

pub struct OldGeneration {
    space: GenSpace,
    stats: OldStats,
}

impl OldGeneration {
    pub fn new(start: Address, end: Address) -> OldGeneration {
        OldGeneration {
            space: GenSpace::new(start, end),
            stats: OldStats::default(),
        }
    }

    pub fn stats(&self) -> OldStats {
        self.stats
    }
}

impl Generation for OldGeneration {
    fn generation_no(&self) -> usize {
        OLD_GENERATION
    }

    fn space(&self) -> &GenSpace {
        &self.space
    }

    fn total_memory(&self) -> ByteSize {
        self.space.heap_top() - self.space.heap_base()
    }

    fn start_gc(&self) {
        trace!("old generation before gc: {}", self.space);
    }

    fn end_gc(&self) {
        trace!("old generation after gc: {}", self.space);
    }

    fn promote_into(&self, mem: &mut HeapMemory, obj: ObjectReference, size: ByteSize) -> Option<ObjectReference> {
        let dest = self.space.bump(size)?;
        mem.copy(obj.to_address(), dest, size);
        Some(dest.to_object_reference())
    }

    /// the card table covers everything up to the allocation mark
    fn scan_older_to_younger(&self, env: &mut GcEnv, visitor: &mut dyn RefVisitor) {
        barrier::traverse_older_to_younger(env, self.space.heap_base(), self.space.alloc_mark(), visitor);
    }

    /// nothing is older than the old generation
    fn scan_younger_to_older(&self, _env: &mut GcEnv, _visitor: &mut dyn RefVisitor) {}

    fn scan_promoted_pointers(&self, env: &mut GcEnv, visitor: &mut dyn RefVisitor) {
        let mark = self.space.alloc_mark();
        let mut scanned = mark;
        loop {
            // the visitor may promote more objects, moving alloc_ptr
            let top = self.space.alloc_ptr();
            if scanned >= top {
                break;
            }
            scan_objects_in_range(env, scanned, top, visitor);
            scanned = top;
        }

        barrier::rebuild(env, self.space.heap_base(), self.space.heap_top(), mark, scanned);
        self.space.set_alloc_mark(scanned);
    }

    fn extra_space(&self) -> Option<(Address, Address)> {
        None
    }

    fn collect(&mut self, younger: &dyn Generation, env: &mut GcEnv, roots: &mut dyn Roots, goal: ByteSize) -> bool {
        markcompact::collect(self, younger, env, roots, goal)
    }
}

impl fmt::Display for OldGeneration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "old generation: [{} .. {}), {} of {} bytes used, {} bytes not yet in the remembered set",
            self.space.heap_base(),
            self.space.heap_top(),
            self.space.alloc_ptr() - self.space.heap_base(),
            self.total_memory(),
            self.space.alloc_ptr() - self.space.alloc_mark()
        )
    }
}
