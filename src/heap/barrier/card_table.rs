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
use byteorder::{ByteOrder, NativeEndian};

use std::fmt;

use super::*;
use utils::*;

/// Counters for one traversal of the card table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardStats {
    pub clean: usize,
    pub dirty: usize,
    pub summarized: usize,
    /// dirty cards that became summarized or clean after a rescan
    pub demoted: usize,
}

impl fmt::Display for CardStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "cards: {} clean, {} dirty, {} summarized, {} demoted",
            self.clean, self.dirty, self.summarized, self.demoted
        )
    }
}

/// One byte of card state, one header-table byte and one summary entry per
/// card covering [heap_base, heap_top).
pub struct CardTable {
    heap_base: Address,
    heap_top: Address,
    /// card number of heap_base, subtracted from every card number
    virtual_base: usize,

    young_start: Address,
    young_end: Address,

    cards: Vec<u8>,
    headers: Vec<i8>,
    summaries: Vec<[u8; SUMMARY_SLOTS]>,

    stats: CardStats,
}

impl CardTable {
    pub fn new(heap_base: Address, heap_top: Address, young_start: Address, young_end: Address) -> CardTable {
        debug_assert!(heap_base.is_aligned_to(CARD_SIZE));
        debug_assert!(heap_top.is_aligned_to(CARD_SIZE));
        let n_cards = (heap_top - heap_base) >> LOG_CARD_SIZE;

        trace!("card table for [{} .. {}): {} cards", heap_base, heap_top, n_cards);

        CardTable {
            heap_base: heap_base,
            heap_top: heap_top,
            virtual_base: heap_base.as_usize() >> LOG_CARD_SIZE,
            young_start: young_start,
            young_end: young_end,
            cards: vec![CARD_CLEAN; n_cards],
            headers: vec![0; n_cards],
            summaries: vec![[SUMMARY_END; SUMMARY_SLOTS]; n_cards],
            stats: CardStats::default(),
        }
    }

    #[inline(always)]
    pub fn n_cards(&self) -> usize {
        self.cards.len()
    }

    #[inline(always)]
    pub fn covers(&self, addr: Address) -> bool {
        addr >= self.heap_base && addr < self.heap_top
    }

    #[inline(always)]
    pub fn card_index(&self, addr: Address) -> usize {
        (addr.as_usize() >> LOG_CARD_SIZE) - self.virtual_base
    }

    #[inline(always)]
    pub fn card_boundary(&self, index: usize) -> Address {
        Address::from_usize((index + self.virtual_base) << LOG_CARD_SIZE)
    }

    #[inline(always)]
    pub fn in_young(&self, obj: ObjectReference) -> bool {
        let addr = obj.to_address();
        addr >= self.young_start && addr < self.young_end
    }

    /// records that the card holding slot may point into the young generation
    #[inline(always)]
    pub fn mark_dirty(&mut self, slot: Address) {
        let index = self.card_index(slot);
        self.cards[index] = CARD_DIRTY;
    }

    #[inline(always)]
    pub fn state_byte(&self, index: usize) -> u8 {
        self.cards[index]
    }

    #[inline(always)]
    pub fn state(&self, index: usize) -> CardState {
        CardState::from_byte(self.cards[index])
    }

    #[inline(always)]
    pub fn set_state_byte(&mut self, index: usize, byte: u8) {
        self.cards[index] = byte;
    }

    /// the states of cards index..index+4 in one read
    #[inline(always)]
    pub fn four_cards(&self, index: usize) -> u32 {
        NativeEndian::read_u32(&self.cards[index..index + 4])
    }

    #[inline(always)]
    pub fn summary(&self, index: usize) -> [u8; SUMMARY_SLOTS] {
        self.summaries[index]
    }

    #[inline(always)]
    pub fn set_summary(&mut self, index: usize, summary: [u8; SUMMARY_SLOTS]) {
        self.summaries[index] = summary;
    }

    #[inline(always)]
    pub fn header(&self, index: usize) -> i8 {
        self.headers[index]
    }

    #[inline(always)]
    pub fn set_header(&mut self, index: usize, entry: i8) {
        self.headers[index] = entry;
    }

    /// Start of the object that overlaps the first word of the card.
    ///
    /// A non-negative entry is the distance in words back to that object; a
    /// negative entry says how many cards to step back before looking again.
    pub fn find_object_start(&self, index: usize) -> Address {
        let mut index = index;
        let mut entry = self.headers[index];
        while entry < 0 {
            index -= (-(entry as isize)) as usize;
            entry = self.headers[index];
        }
        self.card_boundary(index)
            .minus((entry as usize) << LOG_POINTER_SIZE)
    }

    /// every card clean, every header zero, every summary empty
    pub fn clear(&mut self) {
        for c in self.cards.iter_mut() {
            *c = CARD_CLEAN;
        }
        for h in self.headers.iter_mut() {
            *h = 0;
        }
        for s in self.summaries.iter_mut() {
            *s = [SUMMARY_END; SUMMARY_SLOTS];
        }
    }

    /// number of cards in [start, end) in each state
    pub fn count_states(&self, start: Address, end: Address) -> CardStats {
        let mut ret = CardStats::default();
        if start >= end {
            return ret;
        }
        for index in self.card_index(start)..self.card_index(end.minus(1)) + 1 {
            match self.state(index) {
                CardState::Clean => ret.clean += 1,
                CardState::Dirty => ret.dirty += 1,
                CardState::Summarized => ret.summarized += 1,
            }
        }
        ret
    }

    pub fn stats(&self) -> CardStats {
        self.stats
    }

    pub fn stats_mut(&mut self) -> &mut CardStats {
        &mut self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CardStats::default();
    }
}

impl fmt::Display for CardTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let stats = self.count_states(self.heap_base, self.heap_top);
        write!(
            f,
            "card table [{} .. {}), {} cards of {} bytes: {} clean, {} dirty, {} summarized",
            self.heap_base,
            self.heap_top,
            self.n_cards(),
            CARD_SIZE,
            stats.clean,
            stats.dirty,
            stats.summarized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CardTable {
        // 16 cards starting at card 4, young generation is the first 4 cards
        let base = Address::from_usize(4 * CARD_SIZE);
        CardTable::new(base, base + 16 * CARD_SIZE, base, base + 4 * CARD_SIZE)
    }

    #[test]
    fn test_card_index() {
        let mut cards = table();
        let base = Address::from_usize(4 * CARD_SIZE);

        assert_eq!(cards.card_index(base), 0);
        assert_eq!(cards.card_index((base + CARD_SIZE).minus(8)), 0);
        assert_eq!(cards.card_index(base + CARD_SIZE), 1);
        assert_eq!(cards.card_boundary(3), base + 3 * CARD_SIZE);

        assert_eq!(cards.state(5), CardState::Clean);
        cards.mark_dirty(base + 5 * CARD_SIZE + 100);
        assert_eq!(cards.state(5), CardState::Dirty);
        assert_eq!(cards.count_states(base, base + 16 * CARD_SIZE).dirty, 1);
    }

    #[test]
    fn test_four_clean_cards() {
        let mut cards = table();
        assert_eq!(cards.four_cards(4), FOUR_CLEAN_CARDS);

        cards.set_state_byte(6, CARD_SUMMARIZED);
        assert!(cards.four_cards(4) != FOUR_CLEAN_CARDS);
        assert_eq!(cards.four_cards(8), FOUR_CLEAN_CARDS);
    }

    #[test]
    fn test_find_object_start() {
        let mut cards = table();
        let base = Address::from_usize(4 * CARD_SIZE);

        // an object starting 3 words before card 8 spans cards 8..=10
        cards.set_header(8, 3);
        cards.set_header(9, -1);
        cards.set_header(10, -2);

        let start = (base + 8 * CARD_SIZE).minus(24);
        assert_eq!(cards.find_object_start(8), start);
        assert_eq!(cards.find_object_start(9), start);
        assert_eq!(cards.find_object_start(10), start);
        assert_eq!(cards.find_object_start(11), base + 11 * CARD_SIZE);
    }
}
