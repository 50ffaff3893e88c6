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
//! A two-generation garbage collector.
//!
//! The young generation is a pair of semispaces collected by copying, with
//! survivors promoted into the old generation once they reach an age
//! threshold. The old generation is collected by mark-sweep-compact. A card
//! table, an object-header table and a per-card summary table form the
//! remembered set that lets a young collection skip most of the old
//! generation.
//!
//! All heap state lives in one [`Heap`](heap::gc::Heap) value; addresses are
//! offsets into its arena. The embedding runtime supplies the object layout
//! (see [`ObjectLayout`](objectmodel::ObjectLayout)) and its roots (see
//! [`Roots`](heap::Roots)).

#[macro_use]
extern crate log;
extern crate stderrlog;
#[macro_use]
extern crate gengc_utils as utils;
extern crate byteorder;
extern crate docopt;
extern crate memmap;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate thiserror;
extern crate time;

/// common utilities: the heap arena and heap dumps
pub mod common;
/// object header layout and class descriptors
pub mod objectmodel;
/// generations, remembered set and the heap driver
pub mod heap;
/// options parsed from an option string
pub mod gc_options;
mod error;

pub use crate::error::GcError;
pub use crate::gc_options::{GcLogLevel, GcOptions};
pub use crate::heap::gc::Heap;
pub use crate::heap::gc::GcStats;
pub use crate::heap::{Liveness, Roots};
pub use crate::objectmodel::{ClassId, ObjectLayout, RefMap};
pub use crate::objectmodel::classes::ClassTable;
pub use utils::{Address, ObjectReference};

use std::env;

/// starts stderr logging at the given level
pub fn start_logging(level: GcLogLevel) {
    match level {
        GcLogLevel::None => {}
        GcLogLevel::Error => start_logging_internal(log::Level::Error),
        GcLogLevel::Warn => start_logging_internal(log::Level::Warn),
        GcLogLevel::Info => start_logging_internal(log::Level::Info),
        GcLogLevel::Debug => start_logging_internal(log::Level::Debug),
        GcLogLevel::Trace => start_logging_internal(log::Level::Trace),
        GcLogLevel::Env => match env::var("GENGC_LOG_LEVEL") {
            Ok(s) => match GcLogLevel::from_string(&s) {
                Some(GcLogLevel::Env) | None => {}
                Some(level) => start_logging(level),
            },
            _ => {} // Don't log
        },
    }
}

pub fn start_logging_trace() {
    start_logging_internal(log::Level::Trace)
}

pub fn start_logging_env() {
    start_logging(GcLogLevel::Env)
}

fn start_logging_internal(level: log::Level) {
    let verbose: usize = match level {
        log::Level::Error => 0,
        log::Level::Warn => 1,
        log::Level::Info => 2,
        log::Level::Debug => 3,
        log::Level::Trace => 4,
    };

    match stderrlog::new().verbosity(verbose).init() {
        Ok(()) => info!("logger initialized"),
        // every heap applies its log level, only the first one installs a logger
        Err(e) => debug!("logger already initialized: {:?}", e),
    }
}
