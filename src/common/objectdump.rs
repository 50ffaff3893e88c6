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
use std::collections::HashMap;
use std::fmt;

use crate::common::HeapMemory;
use crate::objectmodel::header;
use crate::objectmodel::{ClassId, ObjectLayout};
use utils::*;

/// Everything reachable from a set of roots, keyed by address.
pub struct HeapDump {
    pub objects: HashMap<ObjectReference, ObjectDump>,
    /// objects in the order they were first reached
    pub order: Vec<ObjectReference>,
}

pub struct ObjectDump {
    pub obj: ObjectReference,
    pub class: ClassId,
    pub size: ByteSize,
    pub hash: Word,
    /// slot offsets from the object start
    pub reference_offsets: Vec<ByteSize>,
    /// slot contents, in the same order
    pub references: Vec<ObjectReference>,
}

/// One object of a dump with its references replaced by discovery indices.
/// Equal shapes mean equal object graphs regardless of where objects live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectShape {
    pub class: ClassId,
    pub size: ByteSize,
    pub hash: Word,
    pub references: Vec<Option<usize>>,
}

impl HeapDump {
    pub fn from_roots(mem: &HeapMemory, layout: &dyn ObjectLayout, roots: &[ObjectReference]) -> HeapDump {
        trace!("dump heap from {:?}", roots);
        let mut heap = HeapDump {
            objects: HashMap::new(),
            order: vec![],
        };

        // depth first, roots in order, so discovery order only depends on
        // the graph
        let mut work_queue: Vec<ObjectReference> = roots.iter().rev().cloned().collect();
        while let Some(obj) = work_queue.pop() {
            if obj.is_null() || heap.objects.contains_key(&obj) {
                continue;
            }

            let obj_dump = HeapDump::persist_object(mem, layout, obj);
            for edge in obj_dump.references.iter().rev() {
                if !edge.is_null() && !heap.objects.contains_key(edge) {
                    work_queue.push(*edge);
                }
            }
            heap.order.push(obj);
            heap.objects.insert(obj, obj_dump);
        }

        heap
    }

    fn persist_object(mem: &HeapMemory, layout: &dyn ObjectLayout, obj: ObjectReference) -> ObjectDump {
        let class = header::class_id(mem, obj);
        let size = layout.object_size(mem, obj, class);
        let base = obj.to_address();

        let mut reference_offsets = vec![];
        let mut references = vec![];
        layout.ref_map(mem, obj, class).for_each_slot(obj, |slot| {
            let edge = mem.load_ref(slot);
            trace!("object reference from {} -> {} at +[{}]", obj, edge, slot - base);
            reference_offsets.push(slot - base);
            references.push(edge);
        });

        ObjectDump {
            obj: obj,
            class: class,
            size: size,
            hash: header::hash_of(header::various_word(mem, obj)),
            reference_offsets: reference_offsets,
            references: references,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, obj: ObjectReference) -> bool {
        self.objects.contains_key(&obj)
    }

    /// the dump in discovery order, addresses replaced by indices
    pub fn shape(&self) -> Vec<ObjectShape> {
        let index: HashMap<ObjectReference, usize> =
            self.order.iter().enumerate().map(|(i, obj)| (*obj, i)).collect();

        self.order
            .iter()
            .map(|obj| {
                let dump = &self.objects[obj];
                ObjectShape {
                    class: dump.class,
                    size: dump.size,
                    hash: dump.hash,
                    references: dump
                        .references
                        .iter()
                        .map(|edge| if edge.is_null() { None } else { index.get(edge).cloned() })
                        .collect(),
                }
            })
            .collect()
    }

    pub fn total_bytes(&self) -> ByteSize {
        self.objects.values().map(|o| o.size).sum()
    }
}

impl fmt::Debug for ObjectDump {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "PersistedObject({}, class {}, {} bytes, refs at {:?})",
            self.obj, self.class, self.size, self.reference_offsets
        )
    }
}

impl fmt::Debug for HeapDump {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Heap Dump")?;
        writeln!(f, "---{} objects---", self.objects.len())?;
        for obj in self.order.iter() {
            writeln!(f, "{:?}", self.objects[obj])?;
        }
        Ok(())
    }
}
