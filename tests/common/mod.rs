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
#![allow(dead_code)]

use std::sync::Once;

use gengc::common::objectdump::{HeapDump, ObjectShape};
use gengc::heap::barrier::{CardState, CARD_SIZE};
use gengc::heap::Generation;
use gengc::objectmodel::classes::{ClassTable, ARRAY_ELEMENTS_OFFSET};
use gengc::objectmodel::{header, ClassId};
use gengc::{Address, GcOptions, Heap, Liveness, ObjectReference, Roots};

static LOGGING: Once = Once::new();

pub fn start_logging() {
    LOGGING.call_once(|| gengc::start_logging_env());
}

pub const WORD: usize = 8;

// Node: next, data
pub const NODE_NEXT: usize = 16;
pub const NODE_DATA: usize = 24;

// Pair: left, right, data
pub const PAIR_LEFT: usize = 16;
pub const PAIR_RIGHT: usize = 24;
pub const PAIR_DATA: usize = 32;

// Leaf: data
pub const LEAF_DATA: usize = 16;

/// Strong roots plus a table of weak references that is cleared when its
/// targets die.
pub struct TestRoots {
    pub slots: Vec<ObjectReference>,
    pub weak: Vec<ObjectReference>,
}

impl Roots for TestRoots {
    fn scan_roots(&mut self, visit: &mut dyn FnMut(&mut ObjectReference)) {
        for slot in self.slots.iter_mut() {
            visit(slot);
        }
    }

    fn process_special_objects(&mut self, liveness: &mut dyn Liveness) {
        for slot in self.weak.iter_mut() {
            if slot.is_null() {
                continue;
            }
            if liveness.is_live(*slot) {
                liveness.scan_transitively(slot);
            } else {
                *slot = ObjectReference::null();
            }
        }
    }

    fn scan_special_objects(&mut self, visit: &mut dyn FnMut(&mut ObjectReference)) {
        for slot in self.weak.iter_mut() {
            visit(slot);
        }
    }
}

/// A heap with a handful of classes and a root table, standing in for a
/// runtime.
pub struct TestVm {
    pub heap: Heap,
    pub classes: ClassTable,
    pub roots: TestRoots,

    pub node: ClassId,
    pub pair: ClassId,
    pub leaf: ClassId,
    pub refs: ClassId,
    pub bytes: ClassId,
}

impl TestVm {
    pub fn new(args: &str) -> TestVm {
        start_logging();

        let options = GcOptions::init(args).unwrap();
        let mut classes = ClassTable::new();
        let node = classes.define_instance("Node", 2, &[0]);
        let pair = classes.define_instance("Pair", 3, &[0, 1]);
        let leaf = classes.define_instance("Leaf", 1, &[]);
        let refs = classes.define_ref_array("Object[]");
        let bytes = classes.define_prim_array("byte[]", 1);

        let heap = Heap::new(&options, Box::new(classes.clone())).unwrap();

        TestVm {
            heap: heap,
            classes: classes,
            roots: TestRoots {
                slots: vec![],
                weak: vec![],
            },
            node: node,
            pair: pair,
            leaf: leaf,
            refs: refs,
            bytes: bytes,
        }
    }

    fn alloc_instance(&mut self, class: ClassId) -> ObjectReference {
        let size = self.classes.instance_size(class);
        let obj = self.heap.allocate(size, &mut self.roots).unwrap();
        self.classes.init_instance(self.heap.memory_mut(), obj, class);
        obj
    }

    pub fn new_node(&mut self, data: u64) -> ObjectReference {
        let obj = self.alloc_instance(self.node);
        self.heap.store_word(obj, NODE_DATA, data);
        obj
    }

    pub fn new_pair(&mut self, data: u64) -> ObjectReference {
        let obj = self.alloc_instance(self.pair);
        self.heap.store_word(obj, PAIR_DATA, data);
        obj
    }

    pub fn new_leaf(&mut self, data: u64) -> ObjectReference {
        let obj = self.alloc_instance(self.leaf);
        self.heap.store_word(obj, LEAF_DATA, data);
        obj
    }

    pub fn new_ref_array(&mut self, length: usize) -> ObjectReference {
        let size = self.classes.array_size(self.refs, length);
        let obj = self.heap.allocate(size, &mut self.roots).unwrap();
        self.classes.init_array(self.heap.memory_mut(), obj, self.refs, length);
        obj
    }

    pub fn new_byte_array(&mut self, length: usize) -> ObjectReference {
        let size = self.classes.array_size(self.bytes, length);
        let obj = self.heap.allocate(size, &mut self.roots).unwrap();
        self.classes.init_array(self.heap.memory_mut(), obj, self.bytes, length);
        obj
    }

    pub fn element_offset(index: usize) -> usize {
        ARRAY_ELEMENTS_OFFSET + index * WORD
    }

    /// adds a root, returning its index
    pub fn root(&mut self, obj: ObjectReference) -> usize {
        self.roots.slots.push(obj);
        self.roots.slots.len() - 1
    }

    pub fn get_root(&self, index: usize) -> ObjectReference {
        self.roots.slots[index]
    }

    pub fn weak(&mut self, obj: ObjectReference) -> usize {
        self.roots.weak.push(obj);
        self.roots.weak.len() - 1
    }

    pub fn get_weak(&self, index: usize) -> ObjectReference {
        self.roots.weak[index]
    }

    /// Builds a rooted list of n nodes holding data n-1 down to 0 and
    /// returns the index of its root.
    pub fn build_list(&mut self, n: usize) -> usize {
        let root = self.root(ObjectReference::null());
        for i in 0..n {
            let node = self.new_node(i as u64);
            let head = self.get_root(root);
            self.heap.store_ref(node, NODE_NEXT, head);
            self.roots.slots[root] = node;
        }
        root
    }

    /// Builds a rooted complete binary tree of the given depth, data holding
    /// the node number in preorder, and returns the index of its root.
    pub fn build_tree(&mut self, depth: usize) -> usize {
        let root = self.root(ObjectReference::null());
        let mut counter = 0;
        let tree = self.build_subtree(depth, &mut counter);
        self.roots.slots[root] = tree;
        root
    }

    fn build_subtree(&mut self, depth: usize, counter: &mut u64) -> ObjectReference {
        let data = *counter;
        *counter += 1;
        let node = self.new_pair(data);
        if depth == 0 {
            return node;
        }

        // keep the half-built node reachable while its children allocate
        let slot = self.root(node);
        let left = self.build_subtree(depth - 1, counter);
        let node = self.get_root(slot);
        self.heap.store_ref(node, PAIR_LEFT, left);
        let right = self.build_subtree(depth - 1, counter);
        let node = self.get_root(slot);
        self.heap.store_ref(node, PAIR_RIGHT, right);

        self.roots.slots.remove(slot)
    }

    pub fn collect_young(&mut self) -> bool {
        self.heap.collect_young(&mut self.roots)
    }

    pub fn collect_old(&mut self) -> bool {
        self.heap.collect_old(&mut self.roots)
    }

    pub fn collect_full(&mut self) -> bool {
        self.heap.collect_full(&mut self.roots)
    }

    pub fn collect(&mut self, goal: usize) -> bool {
        self.heap.collect(goal, &mut self.roots)
    }

    pub fn dump(&self) -> HeapDump {
        HeapDump::from_roots(self.heap.memory(), self.heap.layout(), &self.roots.slots)
    }

    pub fn shape(&self) -> Vec<ObjectShape> {
        self.dump().shape()
    }

    /// data words along the list rooted at root
    pub fn list_data(&self, root: usize) -> Vec<u64> {
        let mut ret = vec![];
        let mut cursor = self.get_root(root);
        while !cursor.is_null() {
            ret.push(self.heap.load_word(cursor, NODE_DATA));
            cursor = self.heap.load_ref(cursor, NODE_NEXT);
        }
        ret
    }

    /// Every slot of an old object that points into the young generation
    /// lies on a card that is not clean.
    pub fn check_card_soundness(&self) {
        let heap = &self.heap;
        heap.iterate_heap(|obj, class, _| {
            if heap.in_old(obj) {
                heap.layout()
                    .ref_map(heap.memory(), obj, class)
                    .for_each_slot(obj, |slot| {
                        let target = heap.memory().load_ref(slot);
                        if !target.is_null() && heap.in_young(target) {
                            assert!(
                                heap.card_state(slot) != CardState::Clean,
                                "slot {} of {} points to young {} from a clean card",
                                slot,
                                obj,
                                target
                            );
                        }
                    });
            }
            true
        });
    }

    /// no object in either generation is left marked or forwarded
    pub fn check_no_marks(&self) {
        let heap = &self.heap;
        heap.iterate_heap(|obj, _, _| {
            assert!(!header::is_marked(heap.memory(), obj), "{} is still marked", obj);
            true
        });
    }

    /// (state, object start) for every card of the used old generation
    pub fn old_card_snapshot(&self) -> Vec<(CardState, Address)> {
        let space = self.heap.old().space();
        let mut ret = vec![];
        let mut card = space.heap_base();
        while card < space.alloc_ptr() {
            ret.push((self.heap.card_state(card), self.heap.object_start_for_card(card)));
            card += CARD_SIZE;
        }
        ret
    }
}
