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
use crate::common::HeapMemory;
use utils::ByteSize;
use utils::{Address, ObjectReference};

pub mod header;
pub mod classes;

pub use self::header::OBJECT_HEADER_SIZE;
pub use self::header::MAX_AGE;

/// index of a class descriptor, stored in an object's class word
pub type ClassId = usize;

/// Where the reference slots of an object are.
///
/// Field offsets are in bytes from the object start. An element range covers
/// `length` consecutive reference words starting at `first`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefMap<'a> {
    NoRefs,
    Fields(&'a [ByteSize]),
    Elements { first: Address, length: usize },
}

impl<'a> RefMap<'a> {
    /// calls f with the address of every reference slot of obj
    pub fn for_each_slot<F: FnMut(Address)>(&self, obj: ObjectReference, mut f: F) {
        match *self {
            RefMap::NoRefs => {}
            RefMap::Fields(offsets) => {
                for &offset in offsets {
                    f(obj.field(offset));
                }
            }
            RefMap::Elements { first, length } => {
                for i in 0..length {
                    f(first + (i << utils::LOG_POINTER_SIZE));
                }
            }
        }
    }
}

/// Layout queries the collector needs from the embedding runtime.
///
/// Classes are not heap objects, so the collector never has to trace or move
/// class metadata.
pub trait ObjectLayout {
    /// size in bytes of obj, a multiple of the word size
    fn object_size(&self, mem: &HeapMemory, obj: ObjectReference, class: ClassId) -> ByteSize;

    /// reference slots of obj
    fn ref_map<'a>(&'a self, mem: &HeapMemory, obj: ObjectReference, class: ClassId) -> RefMap<'a>;

    /// true for objects that can never hold a reference (primitive arrays,
    /// the base object class)
    fn is_leaf(&self, class: ClassId) -> bool;

    /// element count for arrays
    fn array_length(&self, mem: &HeapMemory, obj: ObjectReference, class: ClassId) -> Option<usize>;
}
