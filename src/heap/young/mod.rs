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
//! The young generation: two equal semispaces collected by copying.

use std::cell::Cell;
use std::fmt;

use crate::common::HeapMemory;
use crate::heap::*;
use crate::objectmodel::MAX_AGE;
use utils::*;

mod copier;

pub use self::copier::Copier;
pub use self::copier::CopierLiveness;

/// Counters kept across young collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct YoungStats {
    pub collections: usize,
    pub bytes_copied: ByteSize,
    pub bytes_promoted: ByteSize,
    pub objects_promoted: usize,
    pub promotion_failures: usize,
}

pub struct YoungGeneration {
    space: GenSpace,
    semispaces: [(Address, Address); 2],
    /// index of the semispace receiving allocations
    from: usize,
    promotion_threshold: u8,

    collecting: Cell<bool>,
    has_failed_promotion: bool,
    stats: YoungStats,
}

impl YoungGeneration {
    /// a young generation over [start, start + 2 * semispace_size)
    pub fn new(start: Address, semispace_size: ByteSize, promotion_threshold: u8) -> YoungGeneration {
        let middle = start + semispace_size;
        let end = middle + semispace_size;

        let space = GenSpace::new(start, end);
        space.reset_alloc_range(start, middle, start);

        YoungGeneration {
            space: space,
            semispaces: [(start, middle), (middle, end)],
            from: 0,
            promotion_threshold: if promotion_threshold > MAX_AGE {
                MAX_AGE
            } else {
                promotion_threshold
            },
            collecting: Cell::new(false),
            has_failed_promotion: false,
            stats: YoungStats::default(),
        }
    }

    #[inline(always)]
    pub fn from_space(&self) -> (Address, Address) {
        self.semispaces[self.from]
    }

    #[inline(always)]
    pub fn to_space(&self) -> (Address, Address) {
        self.semispaces[1 - self.from]
    }

    pub fn semispace_size(&self) -> ByteSize {
        let (start, end) = self.semispaces[0];
        end - start
    }

    pub fn promotion_threshold(&self) -> u8 {
        self.promotion_threshold
    }

    /// whether the last collection had to keep a promotable object in young
    /// space because the old generation was full
    pub fn has_failed_promotion(&self) -> bool {
        self.has_failed_promotion
    }

    pub fn stats(&self) -> YoungStats {
        self.stats
    }

    fn flip(&mut self, copy_top: Address) {
        self.from = 1 - self.from;
        let (start, end) = self.from_space();
        self.space.reset_alloc_range(start, end, copy_top);
    }
}

impl Generation for YoungGeneration {
    fn generation_no(&self) -> usize {
        YOUNG_GENERATION
    }

    fn space(&self) -> &GenSpace {
        &self.space
    }

    /// only one semispace is ever usable
    fn total_memory(&self) -> ByteSize {
        self.semispace_size()
    }

    fn start_gc(&self) {
        self.space.set_alloc_mark(self.space.alloc_ptr());
        trace!("young generation before gc: {}", self.space);
    }

    fn end_gc(&self) {
        trace!("young generation after gc: {}", self.space);
    }

    fn promote_into(&self, _mem: &mut HeapMemory, _obj: ObjectReference, _size: ByteSize) -> Option<ObjectReference> {
        None
    }

    /// nothing is younger than the young generation
    fn scan_older_to_younger(&self, _env: &mut GcEnv, _visitor: &mut dyn RefVisitor) {}

    /// every reference slot of every object in from-space
    fn scan_younger_to_older(&self, env: &mut GcEnv, visitor: &mut dyn RefVisitor) {
        scan_objects_in_range(env, self.space.alloc_base(), self.space.alloc_ptr(), visitor);
    }

    /// young objects are never promoted into the young generation
    fn scan_promoted_pointers(&self, _env: &mut GcEnv, _visitor: &mut dyn RefVisitor) {}

    /// the idle semispace
    fn extra_space(&self) -> Option<(Address, Address)> {
        if self.collecting.get() {
            None
        } else {
            Some(self.to_space())
        }
    }

    fn collect(&mut self, next: &dyn Generation, env: &mut GcEnv, roots: &mut dyn Roots, goal: ByteSize) -> bool {
        self.collecting.set(true);
        env.cards.reset_stats();

        let from = self.from_space();
        let to = self.to_space();
        debug!(
            "young collection #{}: from-space [{} .. {}) has {} bytes in use",
            self.stats.collections + 1,
            from.0,
            from.1,
            self.space.alloc_ptr() - from.0
        );

        let mut copier = Copier::new(from, to, self.promotion_threshold, next);

        // older generation first, then anything placed there since it was
        // last scanned, then the runtime's roots
        next.scan_older_to_younger(env, &mut copier);
        if next.space().alloc_ptr() > next.space().alloc_mark() {
            next.scan_promoted_pointers(env, &mut copier);
        }
        roots.scan_roots(&mut |root| copier.visit_root(env, root));
        copier.follow_roots(env);

        {
            let mut liveness = CopierLiveness {
                copier: &mut copier,
                env: &mut *env,
            };
            roots.process_special_objects(&mut liveness);
        }

        self.flip(copier.copy_top());
        self.collecting.set(false);

        self.has_failed_promotion = copier.failed_promotion;
        self.stats.collections += 1;
        self.stats.bytes_copied += copier.bytes_copied;
        self.stats.bytes_promoted += copier.bytes_promoted;
        self.stats.objects_promoted += copier.objects_promoted;
        if copier.failed_promotion {
            self.stats.promotion_failures += 1;
        }

        let free = self.free_memory();
        debug!(
            "young collection done: {} bytes copied, {} bytes promoted ({} objects), {} bytes free{}",
            copier.bytes_copied,
            copier.bytes_promoted,
            copier.objects_promoted,
            free,
            if copier.failed_promotion {
                ", promotion failed"
            } else {
                ""
            }
        );
        debug!("{}", env.cards.stats());

        free >= goal && !copier.failed_promotion
    }
}

impl fmt::Display for YoungGeneration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (start, end) = self.from_space();
        write!(
            f,
            "young generation: from-space [{} .. {}), {} of {} bytes used, promotion age {}",
            start,
            end,
            self.space.alloc_ptr() - start,
            end - start,
            self.promotion_threshold
        )
    }
}
