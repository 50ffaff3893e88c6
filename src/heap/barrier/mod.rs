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
//! The remembered set: a card table, an object-header table and a
//! per-card summary table, all indexed by card.

use utils::ByteSize;

mod card_table;
mod traverse;

pub use self::card_table::CardStats;
pub use self::card_table::CardTable;
pub use self::traverse::rebuild;
pub use self::traverse::replay_summary;
pub use self::traverse::traverse_older_to_younger;
pub use self::traverse::update_cards_for_range;
pub use self::traverse::update_object_headers;

pub const LOG_CARD_SIZE: usize = 9;
pub const CARD_SIZE: ByteSize = 1 << LOG_CARD_SIZE;
pub const WORDS_PER_CARD: usize = CARD_SIZE >> utils::LOG_POINTER_SIZE;

pub const CARD_DIRTY: u8 = 0;
pub const CARD_CLEAN: u8 = 1;
pub const CARD_SUMMARIZED: u8 = 2;

/// four clean cards read as one u32
pub const FOUR_CLEAN_CARDS: u32 = 0x0101_0101;

/// references a summary entry can hold
pub const SUMMARY_SLOTS: usize = 4;
/// terminates a summary entry with fewer than four offsets
pub const SUMMARY_END: u8 = 0xff;

/// deepest back-step stored in the header table before the chain restarts
pub const MAX_HEADER_BACK_STEP: i8 = 126;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Clean,
    Dirty,
    Summarized,
}

impl CardState {
    pub fn from_byte(byte: u8) -> CardState {
        match byte {
            CARD_DIRTY => CardState::Dirty,
            CARD_CLEAN => CardState::Clean,
            CARD_SUMMARIZED => CardState::Summarized,
            _ => panic!("corrupted card byte {}", byte),
        }
    }
}
