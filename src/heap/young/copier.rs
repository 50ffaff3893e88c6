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
use crate::heap::*;
use crate::objectmodel::header;
use crate::objectmodel::MAX_AGE;
use utils::*;

const TRACE_COPY: bool = false;

/// State of one young collection: evacuates from-space objects into
/// to-space or the next generation, leaving forwarding addresses behind.
///
/// Objects in [copy_base, copy_top) of to-space are gray; everything below
/// copy_base has been scanned.
pub struct Copier<'g> {
    from_start: Address,
    from_end: Address,
    to_end: Address,

    copy_base: Address,
    copy_top: Address,

    promotion_threshold: u8,
    next: &'g dyn Generation,

    pub failed_promotion: bool,
    pub bytes_copied: ByteSize,
    pub bytes_promoted: ByteSize,
    pub objects_promoted: usize,
}

impl<'g> Copier<'g> {
    pub fn new(
        from: (Address, Address),
        to: (Address, Address),
        promotion_threshold: u8,
        next: &'g dyn Generation,
    ) -> Copier<'g> {
        Copier {
            from_start: from.0,
            from_end: from.1,
            to_end: to.1,
            copy_base: to.0,
            copy_top: to.0,
            promotion_threshold: promotion_threshold,
            next: next,
            failed_promotion: false,
            bytes_copied: 0,
            bytes_promoted: 0,
            objects_promoted: 0,
        }
    }

    #[inline(always)]
    pub fn copy_top(&self) -> Address {
        self.copy_top
    }

    #[inline(always)]
    pub fn in_from_space(&self, obj: ObjectReference) -> bool {
        let addr = obj.to_address();
        addr >= self.from_start && addr < self.from_end
    }

    /// scans every gray object, interleaved with scans of whatever was
    /// promoted meanwhile, until neither produces new work
    pub fn follow_roots(&mut self, env: &mut GcEnv) {
        loop {
            while self.copy_base < self.copy_top {
                let obj = self.copy_base.to_object_reference();
                let size = env.object_size(obj);
                scan_object(env, obj, self);
                self.copy_base += size;
            }

            let next = self.next;
            if next.space().alloc_ptr() > next.space().alloc_mark() {
                next.scan_promoted_pointers(env, self);
            }

            if self.copy_base == self.copy_top {
                break;
            }
        }
    }

    fn forward_or_promote(&mut self, env: &mut GcEnv, obj: ObjectReference) -> ObjectReference {
        let size = env.object_size(obj);
        let age = header::age(env.mem, obj);

        let new_obj = if age >= self.promotion_threshold {
            match self.next.promote_into(env.mem, obj, size) {
                Some(new_obj) => {
                    trace_if!(TRACE_COPY, "promoted {} -> {} ({} bytes)", obj, new_obj, size);
                    self.bytes_promoted += size;
                    self.objects_promoted += 1;
                    new_obj
                }
                None => {
                    trace_if!(TRACE_COPY, "failed to promote {} ({} bytes)", obj, size);
                    self.failed_promotion = true;
                    self.copy_to_survivor_space(env, obj, size, age)
                }
            }
        } else {
            self.copy_to_survivor_space(env, obj, size, age + 1)
        };

        header::set_forwarding(env.mem, obj, new_obj);
        new_obj
    }

    fn copy_to_survivor_space(
        &mut self,
        env: &mut GcEnv,
        obj: ObjectReference,
        size: ByteSize,
        age: u8,
    ) -> ObjectReference {
        let dest = self.copy_top;
        if self.to_end - dest < size {
            // to-space is as large as from-space, so this cannot happen on a
            // consistent heap
            panic!("young to-space overflow copying {} ({} bytes)", obj, size);
        }
        env.mem.copy(obj.to_address(), dest, size);
        self.copy_top = dest + size;
        self.bytes_copied += size;

        let new_obj = dest.to_object_reference();
        let various = header::various_word(env.mem, new_obj);
        header::set_various_word(
            env.mem,
            new_obj,
            header::with_age(various, if age > MAX_AGE { MAX_AGE } else { age }),
        );
        trace_if!(TRACE_COPY, "copied {} -> {} ({} bytes, age {})", obj, new_obj, size, age);
        new_obj
    }
}

impl<'g> RefVisitor for Copier<'g> {
    #[inline(always)]
    fn process(&mut self, env: &mut GcEnv, obj: ObjectReference) -> ObjectReference {
        if !self.in_from_space(obj) {
            return obj;
        }
        if header::is_marked(env.mem, obj) {
            return header::forwarding_address(env.mem, obj);
        }
        self.forward_or_promote(env, obj)
    }
}

/// Liveness during a young collection: a from-space object is live once
/// it has been forwarded, everything outside from-space is live.
pub struct CopierLiveness<'c, 'g: 'c, 'e: 'c> {
    pub copier: &'c mut Copier<'g>,
    pub env: &'c mut GcEnv<'e>,
}

impl<'c, 'g, 'e> Liveness for CopierLiveness<'c, 'g, 'e> {
    fn is_live(&self, obj: ObjectReference) -> bool {
        if obj.is_null() || !self.copier.in_from_space(obj) {
            true
        } else {
            header::is_marked(self.env.mem, obj)
        }
    }

    fn scan_transitively(&mut self, root: &mut ObjectReference) {
        self.copier.visit_root(self.env, root);
        self.copier.follow_roots(self.env);
    }
}
