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
use byteorder::{ByteOrder, NativeEndian};
use memmap::MmapMut;

use std::fmt;
use std::io;

use utils::Address;
use utils::ByteSize;
use utils::ObjectReference;
use utils::Word;
use utils::WORD_SIZE;

/// The heap arena: one anonymous mapping, addressed by byte offset.
///
/// Every load and store is bounds checked by the slice it goes through, so
/// a bad address panics instead of corrupting memory outside the heap.
pub struct HeapMemory {
    map: MmapMut,
    size: ByteSize,
}

impl HeapMemory {
    pub fn new(size: ByteSize) -> io::Result<HeapMemory> {
        let map = MmapMut::map_anon(size)?;
        trace!("mapped {} bytes of heap memory", size);

        Ok(HeapMemory {
            map: map,
            size: size,
        })
    }

    #[inline(always)]
    pub fn size(&self) -> ByteSize {
        self.size
    }

    #[inline(always)]
    pub fn end(&self) -> Address {
        Address::from_usize(self.size)
    }

    #[inline(always)]
    pub fn load_word(&self, addr: Address) -> Word {
        debug_assert!(addr.is_aligned_to(WORD_SIZE));
        let a = addr.as_usize();
        NativeEndian::read_u64(&self.map[a..a + WORD_SIZE])
    }

    #[inline(always)]
    pub fn store_word(&mut self, addr: Address, value: Word) {
        debug_assert!(addr.is_aligned_to(WORD_SIZE));
        let a = addr.as_usize();
        NativeEndian::write_u64(&mut self.map[a..a + WORD_SIZE], value)
    }

    #[inline(always)]
    pub fn load_ref(&self, addr: Address) -> ObjectReference {
        Address::from_usize(self.load_word(addr) as usize).to_object_reference()
    }

    #[inline(always)]
    pub fn store_ref(&mut self, addr: Address, value: ObjectReference) {
        self.store_word(addr, value.to_address().as_usize() as Word)
    }

    /// zeroes [start, start + len)
    pub fn zero(&mut self, start: Address, len: ByteSize) {
        let s = start.as_usize();
        for b in self.map[s..s + len].iter_mut() {
            *b = 0;
        }
    }

    /// copies len bytes from src to dst, the two ranges may overlap
    #[inline(always)]
    pub fn copy(&mut self, src: Address, dst: Address, len: ByteSize) {
        let s = src.as_usize();
        self.map.copy_within(s..s + len, dst.as_usize());
    }
}

impl fmt::Debug for HeapMemory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HeapMemory({} bytes)", self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words() {
        let mut mem = HeapMemory::new(4096).unwrap();
        let a = Address::from_usize(64);

        assert_eq!(mem.load_word(a), 0);
        mem.store_word(a, 0xdead_beef);
        assert_eq!(mem.load_word(a), 0xdead_beef);

        let r = Address::from_usize(512).to_object_reference();
        mem.store_ref(a + 8, r);
        assert_eq!(mem.load_ref(a + 8), r);
    }

    #[test]
    fn test_overlapping_copy() {
        let mut mem = HeapMemory::new(4096).unwrap();
        for i in 0..4 {
            mem.store_word(Address::from_usize(128 + i * 8), i as Word + 1);
        }

        // slide down by one word, ranges overlap
        mem.copy(Address::from_usize(128), Address::from_usize(120), 32);
        for i in 0..4 {
            assert_eq!(mem.load_word(Address::from_usize(120 + i * 8)), i as Word + 1);
        }

        mem.zero(Address::from_usize(120), 32);
        assert_eq!(mem.load_word(Address::from_usize(144)), 0);
    }
}
