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
use std::cmp;

use super::*;
use crate::heap::{GcEnv, RefVisitor};
use crate::objectmodel::header;
use crate::objectmodel::RefMap;
use utils::*;

const TRACE_CARDS: bool = false;

/// Visits every slot in [lower, higher) that the card table says may point
/// into the young generation, refreshing the state of each card it reads.
///
/// Runs of four clean cards are skipped with a single read.
pub fn traverse_older_to_younger(
    env: &mut GcEnv,
    lower: Address,
    higher: Address,
    visitor: &mut dyn RefVisitor,
) {
    if lower >= higher {
        return;
    }
    debug_assert!(lower.is_aligned_to(CARD_SIZE));

    let first = env.cards.card_index(lower);
    let end = env.cards.card_index(higher.minus(1)) + 1;
    trace_if!(TRACE_CARDS, "traverse cards {}..{} for [{} .. {})", first, end, lower, higher);

    let mut index = first;
    while index < end {
        if index % 4 == 0 && index + 4 <= end && env.cards.four_cards(index) == FOUR_CLEAN_CARDS {
            env.cards.stats_mut().clean += 4;
            index += 4;
            continue;
        }

        let boundary = env.cards.card_boundary(index);
        let region_start = cmp::max(boundary, lower);
        let region_end = cmp::min(boundary + CARD_SIZE, higher);
        scan_card(env, index, region_start, region_end, visitor);

        index += 1;
    }
}

fn scan_card(
    env: &mut GcEnv,
    index: usize,
    region_start: Address,
    region_end: Address,
    visitor: &mut dyn RefVisitor,
) {
    match env.cards.state(index) {
        CardState::Clean => env.cards.stats_mut().clean += 1,
        CardState::Summarized => {
            env.cards.stats_mut().summarized += 1;
            if !replay_summary(env, index, visitor) {
                trace_if!(TRACE_CARDS, "card {} has no young references left", index);
                env.cards.set_state_byte(index, CARD_CLEAN);
            }
        }
        CardState::Dirty => {
            env.cards.stats_mut().dirty += 1;
            let obj_start = env.cards.find_object_start(index);
            let state = scan_and_summarize(env, index, obj_start, region_start, region_end, visitor);
            if state != CARD_DIRTY {
                env.cards.stats_mut().demoted += 1;
            }
            env.cards.set_state_byte(index, state);
        }
    }
}

/// Runs the offsets recorded for a summarized card through visitor.
/// Returns whether any of the slots still points into the young generation
/// afterwards.
pub fn replay_summary(env: &mut GcEnv, index: usize, visitor: &mut dyn RefVisitor) -> bool {
    let summary = env.cards.summary(index);
    let boundary = env.cards.card_boundary(index);

    let mut still_young = false;
    for &offset in summary.iter() {
        if offset == SUMMARY_END {
            break;
        }
        let slot = boundary + ((offset as usize) << LOG_POINTER_SIZE);
        visitor.visit_slot(env, slot);

        let target = env.mem.load_ref(slot);
        if env.cards.in_young(target) {
            still_young = true;
        }
    }
    still_young
}

/// Walks the objects from obj_start through region_end, visiting every slot
/// in [region_start, region_end) that points into the young generation.
/// Returns the new state of the card; a summary is stored when at most four
/// such slots were found.
fn scan_and_summarize(
    env: &mut GcEnv,
    index: usize,
    obj_start: Address,
    region_start: Address,
    region_end: Address,
    visitor: &mut dyn RefVisitor,
) -> u8 {
    let boundary = env.cards.card_boundary(index);
    let layout = env.layout;

    let mut n_refs = 0;
    let mut summary = [SUMMARY_END; SUMMARY_SLOTS];

    let mut cursor = obj_start;
    while cursor < region_end {
        let obj = cursor.to_object_reference();
        let class = header::class_id(env.mem, obj);
        let size = layout.object_size(env.mem, obj, class);

        let map = match layout.ref_map(env.mem, obj, class) {
            // only the part of a large array that lies on this card
            RefMap::Elements { first, length } if size >= CARD_SIZE => {
                let elements_end = first + (length << LOG_POINTER_SIZE);
                let from = cmp::max(first, region_start);
                let to = cmp::min(elements_end, region_end);
                if from < to {
                    RefMap::Elements {
                        first: from,
                        length: (to - from) >> LOG_POINTER_SIZE,
                    }
                } else {
                    RefMap::NoRefs
                }
            }
            map => map,
        };

        map.for_each_slot(obj, |slot| {
            if slot < region_start || slot >= region_end {
                return;
            }
            let target = env.mem.load_ref(slot);
            if env.cards.in_young(target) {
                if n_refs < SUMMARY_SLOTS {
                    summary[n_refs] = slot.words_from(boundary) as u8;
                }
                n_refs += 1;
                visitor.visit_slot(env, slot);
            }
        });

        cursor += size;
    }

    trace_if!(TRACE_CARDS, "card {}: {} young references", index, n_refs);

    if n_refs == 0 {
        CARD_CLEAN
    } else if n_refs <= SUMMARY_SLOTS {
        env.cards.set_summary(index, summary);
        CARD_SUMMARIZED
    } else {
        CARD_DIRTY
    }
}

/// Marks dirty every card in [start, end) holding a reference that leaves
/// [gen_base, gen_top) for anything but the permanent space.
pub fn update_cards_for_range(
    env: &mut GcEnv,
    gen_base: Address,
    gen_top: Address,
    start: Address,
    end: Address,
) {
    let layout = env.layout;
    let mut cursor = start;
    while cursor < end {
        let obj = cursor.to_object_reference();
        let class = header::class_id(env.mem, obj);
        let size = layout.object_size(env.mem, obj, class);

        layout.ref_map(env.mem, obj, class).for_each_slot(obj, |slot| {
            let target = env.mem.load_ref(slot);
            let addr = target.to_address();
            if !target.is_null()
                && (addr < gen_base || addr >= gen_top)
                && !env.permanent.contains(addr)
            {
                env.cards.mark_dirty(slot);
            }
        });

        cursor += size;
    }
}

/// Records, for every card boundary that falls inside an object in
/// [start, end), where that object starts.
///
/// The first boundary inside an object gets its distance in words back to
/// the object start. Later boundaries get -1, -2, ... (cards to step back),
/// restarting at -1 after MAX_HEADER_BACK_STEP. A card whose first word
/// starts an object gets 0.
pub fn update_object_headers(env: &mut GcEnv, start: Address, end: Address) {
    let mut cursor = start;
    while cursor < end {
        let obj = cursor.to_object_reference();
        let size = env.object_size(obj);
        let obj_end = cursor + size;

        let mut boundary = if cursor.is_aligned_to(CARD_SIZE) {
            let index = env.cards.card_index(cursor);
            env.cards.set_header(index, 0);
            cursor + CARD_SIZE
        } else {
            cursor.align_up(CARD_SIZE)
        };

        if boundary < obj_end {
            let index = env.cards.card_index(boundary);
            env.cards.set_header(index, boundary.words_from(cursor) as i8);
            boundary += CARD_SIZE;

            let mut back: i8 = -1;
            while boundary < obj_end {
                let index = env.cards.card_index(boundary);
                env.cards.set_header(index, back);
                back = if back == -MAX_HEADER_BACK_STEP { -1 } else { back - 1 };
                boundary += CARD_SIZE;
            }
        }

        cursor = obj_end;
    }
}

/// rebuilds card and header entries for [start, end) of the generation
/// [gen_base, gen_top)
pub fn rebuild(env: &mut GcEnv, gen_base: Address, gen_top: Address, start: Address, end: Address) {
    trace!("rebuild barrier tables for [{} .. {})", start, end);
    update_cards_for_range(env, gen_base, gen_top, start, end);
    update_object_headers(env, start, end);
}
