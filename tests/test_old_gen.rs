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
extern crate gengc;

mod common;

use common::*;
use gengc::heap::barrier::CardState;
use gengc::heap::Generation;
use gengc::objectmodel::header;
use gengc::ObjectReference;

fn old_bytes_used(vm: &TestVm) -> usize {
    let space = vm.heap.old().space();
    space.alloc_ptr() - space.heap_base()
}

fn hash(vm: &TestVm, obj: ObjectReference) -> u64 {
    header::hash_of(header::various_word(vm.heap.memory(), obj))
}

#[test]
fn test_compaction_slides_and_keeps_hashes() {
    let mut vm = TestVm::new("--gc-promotion-threshold=0");
    let a = vm.new_node(1);
    vm.root(a);
    let b = vm.new_node(2);
    vm.root(b);
    let c = vm.new_node(3);
    vm.root(c);
    vm.heap.store_ref(a, NODE_NEXT, c);
    header::set_hash(vm.heap.memory_mut(), a, 0x1234);
    header::set_hash(vm.heap.memory_mut(), c, 0x5678);

    assert!(vm.collect_young());
    let (a, b) = (vm.get_root(0), vm.get_root(1));
    assert!(vm.heap.in_old(a) && vm.heap.in_old(b));
    assert_eq!(hash(&vm, a), 0x1234);

    // only a stays rooted, c through a
    vm.roots.slots.truncate(1);
    assert!(vm.collect_old());

    assert_eq!(vm.get_root(0), a);
    let c = vm.heap.load_ref(a, NODE_NEXT);
    assert_eq!(c, b);
    assert_eq!(vm.heap.load_word(c, NODE_DATA), 3);
    assert_eq!(hash(&vm, a), 0x1234);
    assert_eq!(hash(&vm, c), 0x5678);
    vm.check_no_marks();

    let node_size = vm.classes.instance_size(vm.node);
    assert_eq!(old_bytes_used(&vm), 2 * node_size);
    let stats = vm.heap.stats();
    assert_eq!(stats.old_collections, 1);
    assert_eq!(stats.bytes_freed_old, node_size);
}

#[test]
fn test_garbage_is_reclaimed_and_graph_kept() {
    let mut vm = TestVm::new("--gc-promotion-threshold=0");
    let tree = vm.build_tree(6);
    let list = vm.build_list(200);
    assert!(vm.collect_young());
    assert_eq!(old_bytes_used(&vm), 127 * 40 + 200 * 32);

    vm.roots.slots[list] = ObjectReference::null();
    let before = vm.shape();
    assert_eq!(before.len(), 127);

    assert!(vm.collect_old());
    assert_eq!(vm.shape(), before);
    assert_eq!(old_bytes_used(&vm), 127 * 40);
    assert!(vm.heap.in_old(vm.get_root(tree)));
    vm.check_no_marks();
    vm.check_card_soundness();
}

#[test]
fn test_long_chain_is_marked() {
    let mut vm = TestVm::new("--gc-promotion-threshold=0");
    // promoted first, so the chain behind it has to move
    let garbage = vm.new_leaf(0);
    vm.root(garbage);
    let list = vm.build_list(20000);
    assert!(vm.collect_young());
    let head = vm.get_root(list);
    vm.roots.slots[0] = ObjectReference::null();

    assert!(vm.collect_old());
    assert_ne!(vm.get_root(list), head);
    assert_eq!(vm.list_data(list), (0..20000).rev().collect::<Vec<u64>>());
    vm.check_no_marks();
}

#[test]
fn test_promotion_failure_runs_old_collection() {
    let mut vm = TestVm::new(
        "--gc-heap-size=65536 --gc-young-size=16384 --gc-promotion-threshold=0",
    );
    assert_eq!(vm.heap.young().semispace_size(), 16384);
    assert_eq!(vm.heap.old().total_memory(), 49152);

    // fill 38400 of 49152 old bytes with garbage
    for _ in 0..3 {
        for i in 0..400 {
            let node = vm.new_node(i);
            vm.root(node);
        }
        assert!(vm.collect_young());
        vm.roots.slots.clear();
    }
    assert_eq!(old_bytes_used(&vm), 38400);
    assert_eq!(vm.heap.stats().old_collections, 0);

    for i in 0..400 {
        let node = vm.new_node(i);
        vm.root(node);
    }

    // 336 objects fit in the old generation, 64 stay young
    assert!(vm.collect(0));
    let stats = vm.heap.stats();
    assert_eq!(stats.promotion_failures, 1);
    assert_eq!(stats.old_collections, 1);
    assert_eq!(old_bytes_used(&vm), 336 * 32);
    assert_eq!(
        vm.heap.young().total_memory() - vm.heap.young().free_memory(),
        64 * 32
    );
    for i in 0..400 {
        assert_eq!(vm.heap.load_word(vm.get_root(i), NODE_DATA), i as u64);
    }
    vm.check_no_marks();

    // with room again the rest is promoted
    assert!(vm.collect_young());
    assert!(!vm.heap.young().has_failed_promotion());
    for i in 0..400 {
        let obj = vm.get_root(i);
        assert!(vm.heap.in_old(obj));
        assert_eq!(vm.heap.load_word(obj, NODE_DATA), i as u64);
    }
}

#[test]
fn test_young_objects_keep_old_objects_alive() {
    let mut vm = TestVm::new("--gc-promotion-threshold=0");
    let garbage = vm.new_leaf(0);
    vm.root(garbage);
    let target = vm.new_leaf(99);
    vm.root(target);
    assert!(vm.collect_young());
    let (garbage, target) = (vm.get_root(0), vm.get_root(1));
    vm.roots.slots.clear();

    let young = vm.new_node(1);
    let r = vm.root(young);
    vm.heap.store_ref(young, NODE_NEXT, target);

    assert!(vm.collect_old());
    let young = vm.get_root(r);
    assert!(vm.heap.in_young(young));
    let moved = vm.heap.load_ref(young, NODE_NEXT);
    assert_eq!(moved, garbage);
    assert_eq!(vm.heap.load_word(moved, LEAF_DATA), 99);
}

#[test]
fn test_remembered_set_rebuilt_after_compaction() {
    let mut vm = TestVm::new("--gc-promotion-threshold=0");
    let garbage = vm.new_node(0);
    vm.root(garbage);
    let holder = vm.new_node(1);
    vm.root(holder);
    assert!(vm.collect_young());
    let (garbage, holder) = (vm.get_root(0), vm.get_root(1));
    vm.roots.slots.remove(0);

    let young = vm.new_node(2);
    vm.heap.store_ref(holder, NODE_NEXT, young);
    assert_eq!(vm.heap.card_state(holder.field(NODE_NEXT)), CardState::Dirty);

    assert!(vm.collect_old());
    let holder = vm.get_root(0);
    assert_eq!(holder, garbage);
    assert_eq!(vm.heap.card_state(holder.field(NODE_NEXT)), CardState::Dirty);
    assert_eq!(
        vm.heap.object_start_for_card(holder.to_address()),
        vm.heap.old().space().heap_base()
    );
    vm.check_card_soundness();

    assert!(vm.collect_young());
    let young = vm.heap.load_ref(holder, NODE_NEXT);
    assert!(vm.heap.in_old(young));
    assert_eq!(vm.heap.load_word(young, NODE_DATA), 2);
}

#[test]
fn test_weak_references_in_old_collection() {
    let mut vm = TestVm::new("--gc-promotion-threshold=0");
    let garbage = vm.new_leaf(0);
    vm.root(garbage);
    let dropped = vm.new_leaf(1);
    vm.root(dropped);
    let kept = vm.new_leaf(2);
    vm.root(kept);
    assert!(vm.collect_young());

    let garbage = vm.get_root(0);
    let w_dropped = vm.weak(vm.get_root(1));
    let w_kept = vm.weak(vm.get_root(2));
    vm.roots.slots.drain(0..2);

    assert!(vm.collect_old());
    assert!(vm.get_weak(w_dropped).is_null());
    assert_eq!(vm.get_weak(w_kept), garbage);
    assert_eq!(vm.get_root(0), garbage);
    assert_eq!(vm.heap.load_word(garbage, LEAF_DATA), 2);
}

#[test]
fn test_full_collection() {
    let mut vm = TestVm::new("");
    vm.build_tree(7);
    let garbage = vm.build_list(300);
    let before_tree = vm.shape()[..255].to_vec();
    vm.roots.slots[garbage] = ObjectReference::null();

    assert!(vm.collect_full());
    assert_eq!(vm.shape(), before_tree);
    let stats = vm.heap.stats();
    assert_eq!(stats.young_collections, 1);
    assert_eq!(stats.old_collections, 1);
    assert!(vm.heap.time_of_last_major_gc() > 0);
    vm.check_no_marks();
}
