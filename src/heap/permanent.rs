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
use std::cell::Cell;
use std::fmt;

use utils::*;

/// The permanent (read-only image) space.
///
/// Objects here are never moved or reclaimed and every collector treats
/// them as live. They may only refer to other permanent objects, so stores
/// into them are never recorded by the write barrier.
pub struct PermanentSpace {
    start: Address,
    end: Address,
    cursor: Cell<Address>,
}

impl PermanentSpace {
    pub fn new(start: Address, end: Address) -> PermanentSpace {
        PermanentSpace {
            start: start,
            end: end,
            cursor: Cell::new(start),
        }
    }

    #[inline(always)]
    pub fn start(&self) -> Address {
        self.start
    }

    #[inline(always)]
    pub fn end(&self) -> Address {
        self.end
    }

    /// end of the allocated part
    #[inline(always)]
    pub fn cursor(&self) -> Address {
        self.cursor.get()
    }

    #[inline(always)]
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr < self.end
    }

    pub fn alloc(&self, size: ByteSize) -> Option<Address> {
        let cursor = self.cursor.get();
        if self.end - cursor >= size {
            self.cursor.set(cursor + size);
            Some(cursor)
        } else {
            None
        }
    }
}

impl fmt::Display for PermanentSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "permanent space [{} .. {}), {} bytes used",
            self.start,
            self.end,
            self.cursor() - self.start
        )
    }
}
