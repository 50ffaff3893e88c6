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
/// * use 2 words (128 bits) header
///
/// * header is at the object reference, fields follow it
///
/// * class word (word 0)
/// | class id (62 bits)                                   | unused | marked? |
///                                                            bit 1     bit 0
///   the mark bit means "visited" to the mark-compact collector and
///   "forwarded" to the copying collector
///
/// * various word (word 1)
/// | hash code (58 bits)                         | age (4 bits) | lock (2 bits) |
///
///   while an object is forwarded the various word holds the new address;
///   while it sits on the mark-compact to-do list it holds the next entry,
///   with bit 0 set if the original word was saved in the preserved table
use crate::common::HeapMemory;
use crate::objectmodel::ClassId;
use utils::bit_utils;
use utils::ByteSize;
use utils::Word;
use utils::{Address, ObjectReference};

pub const OBJECT_HEADER_SIZE: ByteSize = 16;
pub const CLASS_WORD_OFFSET: ByteSize = 0;
pub const VARIOUS_WORD_OFFSET: ByteSize = 8;

pub const BIT_IS_MARKED: usize = 0;
pub const SHR_CLASS_ID: usize = 2;

pub const SHR_AGE: usize = 2;
pub const AGE_BITS: usize = 4;
pub const SHR_HASH: usize = 6;
pub const HASH_BITS: usize = 58;

pub const MAX_AGE: u8 = (1 << AGE_BITS) - 1;

pub const DEFAULT_VARIOUS_WORD: Word = 0;

/// set on a to-do link when the linked object's various word was preserved
pub const TODO_PRESERVED_BIT: Word = 1;

#[inline(always)]
pub fn encode_class_word(class: ClassId) -> Word {
    (class as Word) << SHR_CLASS_ID
}

#[inline(always)]
pub fn class_word(mem: &HeapMemory, obj: ObjectReference) -> Word {
    mem.load_word(obj.field(CLASS_WORD_OFFSET))
}

#[inline(always)]
pub fn class_id_of(word: Word) -> ClassId {
    (word >> SHR_CLASS_ID) as ClassId
}

#[inline(always)]
pub fn class_id(mem: &HeapMemory, obj: ObjectReference) -> ClassId {
    class_id_of(class_word(mem, obj))
}

#[inline(always)]
pub fn word_is_marked(word: Word) -> bool {
    bit_utils::test_nth_bit_u64(word, BIT_IS_MARKED, 1)
}

#[inline(always)]
pub fn is_marked(mem: &HeapMemory, obj: ObjectReference) -> bool {
    word_is_marked(class_word(mem, obj))
}

#[inline(always)]
pub fn set_marked(mem: &mut HeapMemory, obj: ObjectReference) {
    let word = class_word(mem, obj);
    mem.store_word(
        obj.field(CLASS_WORD_OFFSET),
        bit_utils::set_nth_bit_u64(word, BIT_IS_MARKED, 1),
    )
}

#[inline(always)]
pub fn clear_mark(mem: &mut HeapMemory, obj: ObjectReference) {
    let word = class_word(mem, obj);
    mem.store_word(
        obj.field(CLASS_WORD_OFFSET),
        bit_utils::set_nth_bit_u64(word, BIT_IS_MARKED, 0),
    )
}

#[inline(always)]
pub fn various_word(mem: &HeapMemory, obj: ObjectReference) -> Word {
    mem.load_word(obj.field(VARIOUS_WORD_OFFSET))
}

#[inline(always)]
pub fn set_various_word(mem: &mut HeapMemory, obj: ObjectReference, word: Word) {
    mem.store_word(obj.field(VARIOUS_WORD_OFFSET), word)
}

#[inline(always)]
pub fn age_of(various: Word) -> u8 {
    bit_utils::get_bits_u64(various, SHR_AGE, AGE_BITS) as u8
}

#[inline(always)]
pub fn with_age(various: Word, age: u8) -> Word {
    bit_utils::set_bits_u64(various, SHR_AGE, AGE_BITS, age as Word)
}

#[inline(always)]
pub fn age(mem: &HeapMemory, obj: ObjectReference) -> u8 {
    age_of(various_word(mem, obj))
}

#[inline(always)]
pub fn hash_of(various: Word) -> Word {
    bit_utils::get_bits_u64(various, SHR_HASH, HASH_BITS)
}

/// installs an identity hash, which makes the various word non-trivial
pub fn set_hash(mem: &mut HeapMemory, obj: ObjectReference, hash: Word) {
    let various = various_word(mem, obj);
    set_various_word(
        mem,
        obj,
        bit_utils::set_bits_u64(various, SHR_HASH, HASH_BITS, hash),
    )
}

/// A various word is trivial if it can be rebuilt from nothing: only the
/// age may differ from the default.
#[inline(always)]
pub fn is_trivial(various: Word) -> bool {
    with_age(various, 0) == DEFAULT_VARIOUS_WORD
}

/// writes a fresh header for an object of the given class
pub fn init_header(mem: &mut HeapMemory, obj: ObjectReference, class: ClassId) {
    mem.store_word(obj.field(CLASS_WORD_OFFSET), encode_class_word(class));
    set_various_word(mem, obj, DEFAULT_VARIOUS_WORD);
}

/// marks obj as forwarded to new_obj
#[inline(always)]
pub fn set_forwarding(mem: &mut HeapMemory, obj: ObjectReference, new_obj: ObjectReference) {
    set_marked(mem, obj);
    set_various_word(mem, obj, new_obj.to_address().as_usize() as Word);
}

/// the address stored in the various word of a forwarded or swept object
#[inline(always)]
pub fn forwarding_address(mem: &HeapMemory, obj: ObjectReference) -> ObjectReference {
    debug_assert!(is_marked(mem, obj));
    Address::from_usize(various_word(mem, obj) as usize).to_object_reference()
}
