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
/// sets the nth bit of a u64 word to set_value (0 or 1)
#[inline(always)]
pub fn set_nth_bit_u64(value: u64, index: usize, set_value: u8) -> u64 {
    value ^ (((-(set_value as i64) as u64) ^ value) & (1 << index))
}

#[inline(always)]
pub fn test_nth_bit_u64(value: u64, index: usize, val: u8) -> bool {
    ((value >> index) & 1) as u8 == val
}

/// extracts len bits starting at index
#[inline(always)]
pub fn get_bits_u64(value: u64, index: usize, len: usize) -> u64 {
    (value >> index) & ((1u64 << len) - 1)
}

/// replaces len bits starting at index with bits
#[inline(always)]
pub fn set_bits_u64(value: u64, index: usize, len: usize, bits: u64) -> u64 {
    let mask = ((1u64 << len) - 1) << index;
    (value & !mask) | ((bits << index) & mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_set_bit() {
        let a = 0b0000u64;
        let b = 0b1111u64;

        assert_eq!(set_nth_bit_u64(a, 2, 1), 0b100);
        assert_eq!(set_nth_bit_u64(b, 2, 0), 0b1011);
        assert!(test_nth_bit_u64(0b100, 2, 1));
        assert!(test_nth_bit_u64(0b100, 1, 0));
    }

    #[test]
    pub fn test_bit_fields() {
        let word = 0b1101_0110u64;

        assert_eq!(get_bits_u64(word, 2, 4), 0b0101);
        assert_eq!(set_bits_u64(word, 2, 4, 0b1111), 0b1111_1110);
        assert_eq!(set_bits_u64(word, 2, 4, 0), 0b1100_0010);
    }
}
