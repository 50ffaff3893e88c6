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
//! # Utility crate that serves the generational collector
//!
//! It includes:
//!
//! * Address/ObjectReference type (offsets into the heap arena)
//! * utility functions for
//!   * mathematics
//!   * bit operations
//! * conditional logging macros

// these type aliases make source code easier to read

/// size in bits
pub type BitSize = usize;
/// size in bytes
pub type ByteSize = usize;
/// offset in byte
pub type ByteOffset = isize;
/// word value
pub type Word = u64;

pub const LOG_POINTER_SIZE: usize = 3;

/// pointer size in byte
pub const POINTER_SIZE: ByteSize = 1 << LOG_POINTER_SIZE;
/// word size in byte
pub const WORD_SIZE: ByteSize = 1 << LOG_POINTER_SIZE;

/// mathematics utilities
pub mod math;
/// bit operations
pub mod bit_utils;

mod address;
/// Address represents a location in the heap arena (valid or not)
pub use crate::address::Address;
/// ObjectReference is a reference to an object (the address of its first header word)
pub use crate::address::ObjectReference;

/// print trace!() log if condition is true (the condition should be a constant boolean)
#[macro_export]
macro_rules! trace_if {
    ($cond: expr, $($arg:tt)*) => {
        if $cond {
            trace!($($arg)*)
        }
    }
}
