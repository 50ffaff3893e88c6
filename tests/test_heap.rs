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
use gengc::heap::Generation;
use gengc::{ClassTable, GcError, GcOptions, Heap};

#[test]
fn test_default_layout() {
    let vm = TestVm::new("");
    assert_eq!(vm.heap.young().semispace_size(), 1 << 20);
    assert_eq!(vm.heap.old().total_memory(), 15 << 20);
    assert_eq!(vm.heap.total_memory(), 16 << 20);
    assert_eq!(vm.heap.free_memory(), 16 << 20);
    assert_eq!(vm.heap.permanent().end() - vm.heap.permanent().start(), 64 << 10);
}

#[test]
fn test_small_young_generation_is_raised() {
    let vm = TestVm::new("--gc-heap-size=8388608 --gc-young-size=65536");
    assert_eq!(vm.heap.young().semispace_size(), 1 << 20);
    assert_eq!(vm.heap.old().total_memory(), 7 << 20);
}

#[test]
fn test_tiny_heap_is_floored() {
    let vm = TestVm::new("--gc-heap-size=100 --gc-min-heap-size=100");
    assert_eq!(vm.heap.young().semispace_size(), 1024);
    assert_eq!(vm.heap.old().total_memory(), 0);
}

#[test]
fn test_heap_applies_log_level() {
    let options = GcOptions::init("--gc-log-level=info --gc-heap-size=65536").unwrap();
    let heap = Heap::new(&options, Box::new(ClassTable::new())).unwrap();
    assert!(log::max_level() >= log::LevelFilter::Info);

    // a second heap finds the logger installed and still comes up
    let again = Heap::new(&options, Box::new(ClassTable::new())).unwrap();
    assert_eq!(again.total_memory(), heap.total_memory());
}

#[test]
fn test_min_above_max_is_rejected() {
    let options = GcOptions::default();
    match Heap::init_heap(2048, 1024, &options, Box::new(ClassTable::new())) {
        Err(GcError::InvalidHeapSize { min, max }) => {
            assert_eq!(min, 2048);
            assert_eq!(max, 1024);
        }
        other => panic!("expected InvalidHeapSize, got {:?}", other.map(|_| ())),
    }

    let options = GcOptions::init("--gc-min-heap-size=4096 --gc-heap-size=2048").unwrap();
    assert!(Heap::new(&options, Box::new(ClassTable::new())).is_err());
}

#[test]
fn test_large_objects_go_to_old_generation() {
    let mut vm = TestVm::new("");
    let big = vm.new_byte_array(60000);
    let small = vm.new_byte_array(40000);
    assert!(vm.heap.in_old(big));
    assert!(vm.heap.in_young(small));
    assert_eq!(vm.heap.layout().array_length(vm.heap.memory(), big, vm.bytes), Some(60000));
}

#[test]
fn test_allocation_is_zeroed() {
    let mut vm = TestVm::new("");
    let garbage = vm.new_node(0xdead);
    vm.heap.store_ref(garbage, NODE_NEXT, garbage);

    // two flips bring allocation back to the same semispace
    assert!(vm.collect_young());
    assert!(vm.collect_young());
    let fresh = vm.heap.try_allocate(32).unwrap();
    assert_eq!(fresh, garbage);
    assert!(vm.heap.load_ref(fresh, NODE_NEXT).is_null());
    assert_eq!(vm.heap.load_word(fresh, NODE_DATA), 0);
}

#[test]
fn test_out_of_memory() {
    let mut vm = TestVm::new("--gc-heap-size=65536 --gc-young-size=16384");

    let too_big = vm.classes.array_size(vm.bytes, 60000);
    match vm.heap.allocate(too_big, &mut vm.roots) {
        Err(GcError::OutOfMemory { requested }) => assert_eq!(requested, 60024),
        Err(e) => panic!("unexpected error {}", e),
        Ok(obj) => panic!("{} bytes allocated at {}", too_big, obj),
    }

    // keep everything alive until the heap runs out
    let size = vm.classes.instance_size(vm.node);
    let mut count = 0;
    loop {
        match vm.heap.allocate(size, &mut vm.roots) {
            Ok(obj) => {
                vm.classes.init_instance(vm.heap.memory_mut(), obj, vm.node);
                vm.heap.store_word(obj, NODE_DATA, count);
                vm.root(obj);
                count += 1;
            }
            Err(GcError::OutOfMemory { .. }) => break,
            Err(e) => panic!("unexpected error {}", e),
        }
        assert!(count < 10000);
    }

    assert!(count as usize * size > 48 << 10);
    for i in 0..count as usize {
        assert_eq!(vm.heap.load_word(vm.get_root(i), NODE_DATA), i as u64);
    }
}

#[test]
fn test_iterate_heap() {
    let mut vm = TestVm::new("--gc-large-object-threshold=1024");
    for i in 0..5 {
        vm.new_leaf(i);
    }
    vm.new_ref_array(200);

    let mut young = 0;
    let mut old = 0;
    assert!(vm.heap.iterate_heap(|obj, class, size| {
        if class == vm.leaf {
            young += 1;
            assert_eq!(size, 24);
            assert!(vm.heap.in_young(obj));
        } else {
            old += 1;
            assert_eq!(class, vm.refs);
            assert_eq!(size, 24 + 200 * 8);
        }
        true
    }));
    assert_eq!((young, old), (5, 1));

    let mut seen = 0;
    assert!(!vm.heap.iterate_heap(|_, _, _| {
        seen += 1;
        seen < 3
    }));
    assert_eq!(seen, 3);
}

#[test]
fn test_statistics() {
    let mut vm = TestVm::new("--gc-promotion-threshold=0");
    vm.build_list(10);
    assert!(vm.collect_full());

    let stats = vm.heap.stats();
    assert_eq!(stats.young_collections, 1);
    assert_eq!(stats.old_collections, 1);
    assert_eq!(stats.objects_promoted, 10);
    assert_eq!(stats.bytes_promoted, 320);

    assert!(format!("{}", stats).contains("1 young collections"));
    assert!(format!("{}", vm.heap).contains("old generation"));
}

#[test]
fn test_bad_options() {
    match GcOptions::init("--gc-heap-size=huge") {
        Err(GcError::BadOptions(_)) => {}
        other => panic!("expected BadOptions, got {:?}", other),
    }
}
