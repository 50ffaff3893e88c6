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
//! A concrete class table for runtimes that describe objects as plain
//! instances and arrays.
//!
//! Instance layout: header, then `n_fields` words.
//! Array layout: header, a length word, then the elements.

use std::fmt;

use crate::common::HeapMemory;
use crate::objectmodel::header;
use crate::objectmodel::{ClassId, ObjectLayout, RefMap, OBJECT_HEADER_SIZE};
use utils::math;
use utils::ByteSize;
use utils::ObjectReference;
use utils::{POINTER_SIZE, WORD_SIZE};

pub const ARRAY_LENGTH_OFFSET: ByteSize = OBJECT_HEADER_SIZE;
pub const ARRAY_ELEMENTS_OFFSET: ByteSize = OBJECT_HEADER_SIZE + WORD_SIZE;

/// the universal base class, always id 0
pub const BASE_CLASS: ClassId = 0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassKind {
    /// the base object: a bare header
    Base,
    Instance {
        size: ByteSize,
        ref_offsets: Vec<ByteSize>,
    },
    RefArray,
    PrimArray { element_size: ByteSize },
}

#[derive(Clone, Debug)]
pub struct ClassDescriptor {
    pub id: ClassId,
    pub name: String,
    pub kind: ClassKind,
}

impl fmt::Display for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{} {:?}", self.name, self.id, self.kind)
    }
}

#[derive(Debug, Clone)]
pub struct ClassTable {
    classes: Vec<ClassDescriptor>,
}

impl ClassTable {
    pub fn new() -> ClassTable {
        ClassTable {
            classes: vec![ClassDescriptor {
                id: BASE_CLASS,
                name: "Object".to_string(),
                kind: ClassKind::Base,
            }],
        }
    }

    fn define(&mut self, name: &str, kind: ClassKind) -> ClassId {
        let id = self.classes.len();
        let desc = ClassDescriptor {
            id: id,
            name: name.to_string(),
            kind: kind,
        };
        trace!("define class {}", desc);
        self.classes.push(desc);
        id
    }

    /// defines an instance class with n_fields words, of which the fields
    /// listed in ref_fields hold references
    pub fn define_instance(&mut self, name: &str, n_fields: usize, ref_fields: &[usize]) -> ClassId {
        let mut ref_offsets: Vec<ByteSize> = ref_fields
            .iter()
            .map(|&i| {
                assert!(i < n_fields, "reference field {} out of {} fields", i, n_fields);
                OBJECT_HEADER_SIZE + i * POINTER_SIZE
            })
            .collect();
        ref_offsets.sort();
        ref_offsets.dedup();

        self.define(
            name,
            ClassKind::Instance {
                size: OBJECT_HEADER_SIZE + n_fields * WORD_SIZE,
                ref_offsets: ref_offsets,
            },
        )
    }

    pub fn define_ref_array(&mut self, name: &str) -> ClassId {
        self.define(name, ClassKind::RefArray)
    }

    pub fn define_prim_array(&mut self, name: &str, element_size: ByteSize) -> ClassId {
        assert!(element_size > 0);
        self.define(name, ClassKind::PrimArray { element_size: element_size })
    }

    pub fn get(&self, class: ClassId) -> &ClassDescriptor {
        match self.classes.get(class) {
            Some(desc) => desc,
            None => panic!("unknown class id {}", class),
        }
    }

    /// size of an instance of class
    pub fn instance_size(&self, class: ClassId) -> ByteSize {
        match self.get(class).kind {
            ClassKind::Base => OBJECT_HEADER_SIZE,
            ClassKind::Instance { size, .. } => size,
            ref kind => panic!("{:?} is not an instance class", kind),
        }
    }

    /// size of an array of class with length elements
    pub fn array_size(&self, class: ClassId, length: usize) -> ByteSize {
        match self.get(class).kind {
            ClassKind::RefArray => ARRAY_ELEMENTS_OFFSET + length * POINTER_SIZE,
            ClassKind::PrimArray { element_size } => {
                math::align_up(ARRAY_ELEMENTS_OFFSET + length * element_size, WORD_SIZE)
            }
            ref kind => panic!("{:?} is not an array class", kind),
        }
    }

    /// writes the header of a freshly allocated (zeroed) instance
    pub fn init_instance(&self, mem: &mut HeapMemory, obj: ObjectReference, class: ClassId) {
        debug_assert!(match self.get(class).kind {
            ClassKind::Base | ClassKind::Instance { .. } => true,
            _ => false,
        });
        header::init_header(mem, obj, class);
    }

    /// writes the header and length of a freshly allocated (zeroed) array
    pub fn init_array(&self, mem: &mut HeapMemory, obj: ObjectReference, class: ClassId, length: usize) {
        header::init_header(mem, obj, class);
        mem.store_word(obj.field(ARRAY_LENGTH_OFFSET), length as u64);
    }
}

impl Default for ClassTable {
    fn default() -> ClassTable {
        ClassTable::new()
    }
}

impl ObjectLayout for ClassTable {
    fn object_size(&self, mem: &HeapMemory, obj: ObjectReference, class: ClassId) -> ByteSize {
        match self.get(class).kind {
            ClassKind::Base => OBJECT_HEADER_SIZE,
            ClassKind::Instance { size, .. } => size,
            ClassKind::RefArray | ClassKind::PrimArray { .. } => {
                let length = mem.load_word(obj.field(ARRAY_LENGTH_OFFSET)) as usize;
                self.array_size(class, length)
            }
        }
    }

    fn ref_map<'a>(&'a self, mem: &HeapMemory, obj: ObjectReference, class: ClassId) -> RefMap<'a> {
        match self.get(class).kind {
            ClassKind::Instance { ref ref_offsets, .. } if !ref_offsets.is_empty() => {
                RefMap::Fields(ref_offsets)
            }
            ClassKind::RefArray => RefMap::Elements {
                first: obj.field(ARRAY_ELEMENTS_OFFSET),
                length: mem.load_word(obj.field(ARRAY_LENGTH_OFFSET)) as usize,
            },
            _ => RefMap::NoRefs,
        }
    }

    fn is_leaf(&self, class: ClassId) -> bool {
        match self.get(class).kind {
            ClassKind::Base | ClassKind::PrimArray { .. } => true,
            ClassKind::Instance { ref ref_offsets, .. } => ref_offsets.is_empty(),
            ClassKind::RefArray => false,
        }
    }

    fn array_length(&self, mem: &HeapMemory, obj: ObjectReference, class: ClassId) -> Option<usize> {
        match self.get(class).kind {
            ClassKind::RefArray | ClassKind::PrimArray { .. } => {
                Some(mem.load_word(obj.field(ARRAY_LENGTH_OFFSET)) as usize)
            }
            _ => None,
        }
    }
}
