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
use std::process;

use crate::common::HeapMemory;
use crate::objectmodel::header;
use utils::*;

/// one record: the object and its original various word
pub const PRESERVED_RECORD_SIZE: ByteSize = 2 * WORD_SIZE;

/// Saved various words, kept in scratch memory borrowed from the young
/// generation for the length of an old collection.
///
/// Records are pushed and popped like a stack while marking, then appended
/// again while sweeping and restored in bulk after compaction.
pub struct PreservedHeaderTable {
    base: Address,
    capacity: usize,
    count: usize,
}

impl PreservedHeaderTable {
    pub fn new(start: Address, end: Address) -> PreservedHeaderTable {
        PreservedHeaderTable {
            base: start,
            capacity: (end - start) / PRESERVED_RECORD_SIZE,
            count: 0,
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    fn record(&self, index: usize) -> Address {
        self.base + index * PRESERVED_RECORD_SIZE
    }

    pub fn push(&mut self, mem: &mut HeapMemory, obj: ObjectReference, word: Word) {
        if self.count >= self.capacity {
            // the heap cannot be put back together without these words
            error!(
                "OVERFLOW OF PRESERVED HEADER WORDS: {} records in {} bytes of scratch space",
                self.capacity,
                self.capacity * PRESERVED_RECORD_SIZE
            );
            process::abort();
        }
        let record = self.record(self.count);
        mem.store_ref(record, obj);
        mem.store_word(record + WORD_SIZE, word);
        self.count += 1;
    }

    /// takes back the most recent record, which must belong to obj
    pub fn pop(&mut self, mem: &HeapMemory, obj: ObjectReference) -> Word {
        debug_assert!(self.count > 0);
        self.count -= 1;
        let record = self.record(self.count);
        debug_assert_eq!(mem.load_ref(record), obj);
        mem.load_word(record + WORD_SIZE)
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// writes every saved word back into its object
    pub fn restore_all(&self, mem: &mut HeapMemory) {
        for i in 0..self.count {
            let record = self.record(i);
            let obj = mem.load_ref(record);
            let word = mem.load_word(record + WORD_SIZE);
            header::set_various_word(mem, obj, word);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut mem = HeapMemory::new(8192).unwrap();
        let mut table = PreservedHeaderTable::new(Address::from_usize(4096), Address::from_usize(8192));
        assert_eq!(table.capacity(), 256);

        let a = Address::from_usize(512).to_object_reference();
        let b = Address::from_usize(1024).to_object_reference();
        table.push(&mut mem, a, 0x100);
        table.push(&mut mem, b, 0x200);

        assert_eq!(table.pop(&mem, b), 0x200);
        assert_eq!(table.len(), 1);
        assert_eq!(table.pop(&mem, a), 0x100);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_restore_all() {
        let mut mem = HeapMemory::new(8192).unwrap();
        let mut table = PreservedHeaderTable::new(Address::from_usize(4096), Address::from_usize(8192));

        let a = Address::from_usize(512).to_object_reference();
        header::init_header(&mut mem, a, 1);
        table.push(&mut mem, a, 0x1c0);
        header::set_various_word(&mut mem, a, 0);

        table.restore_all(&mut mem);
        assert_eq!(header::various_word(&mem, a), 0x1c0);
    }
}
