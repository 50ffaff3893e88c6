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
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use crate::math;
use crate::ByteOffset;
use crate::ByteSize;
use crate::LOG_POINTER_SIZE;

/// Address is an offset into the collector's heap arena.
/// Offset 0 is never handed out and serves as null.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Address(usize);

impl Address {
    #[inline(always)]
    pub fn zero() -> Address {
        Address(0)
    }

    #[inline(always)]
    pub fn from_usize(raw: usize) -> Address {
        Address(raw)
    }

    #[inline(always)]
    pub fn as_usize(self) -> usize {
        self.0
    }

    #[inline(always)]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// address minus some bytes
    #[inline(always)]
    pub fn minus(self, bytes: ByteSize) -> Address {
        Address(self.0 - bytes)
    }

    /// address plus a signed offset
    #[inline(always)]
    pub fn offset(self, offset: ByteOffset) -> Address {
        Address((self.0 as isize + offset) as usize)
    }

    /// distance in words between two addresses (self must not be below other)
    #[inline(always)]
    pub fn words_from(self, other: Address) -> usize {
        debug_assert!(self >= other);
        (self.0 - other.0) >> LOG_POINTER_SIZE
    }

    #[inline(always)]
    pub fn align_up(self, align: ByteSize) -> Address {
        Address(math::align_up(self.0, align))
    }

    #[inline(always)]
    pub fn align_down(self, align: ByteSize) -> Address {
        Address(math::align_down(self.0, align))
    }

    #[inline(always)]
    pub fn is_aligned_to(self, align: ByteSize) -> bool {
        self.0 % align == 0
    }

    /// views the address as a reference to an object starting there
    #[inline(always)]
    pub fn to_object_reference(self) -> ObjectReference {
        ObjectReference(self)
    }
}

impl Add<ByteSize> for Address {
    type Output = Address;
    #[inline(always)]
    fn add(self, bytes: ByteSize) -> Address {
        Address(self.0 + bytes)
    }
}

impl AddAssign<ByteSize> for Address {
    #[inline(always)]
    fn add_assign(&mut self, bytes: ByteSize) {
        self.0 += bytes;
    }
}

impl Sub<Address> for Address {
    type Output = ByteSize;
    #[inline(always)]
    fn sub(self, other: Address) -> ByteSize {
        debug_assert!(self >= other, "{} - {} underflows", self, other);
        self.0 - other.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// ObjectReference points at the first header word of an object
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct ObjectReference(Address);

impl ObjectReference {
    #[inline(always)]
    pub fn null() -> ObjectReference {
        ObjectReference(Address::zero())
    }

    #[inline(always)]
    pub fn is_null(self) -> bool {
        self.0.is_zero()
    }

    #[inline(always)]
    pub fn to_address(self) -> Address {
        self.0
    }

    /// address of a field at the given byte offset from the object start
    #[inline(always)]
    pub fn field(self, offset: ByteSize) -> Address {
        self.0 + offset
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:x}", (self.0).0)
    }
}

impl fmt::Debug for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectReference(0x{:x})", (self.0).0)
    }
}
