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
use docopt::Docopt;
use std::default::Default;
use std::iter;

use crate::error::GcError;
use crate::heap::{DEFAULT_YOUNG_SIZE, LARGE_OBJECT_THRESHOLD, MIN_TOTAL_HEAP};

const USAGE: &'static str = "
gengc (generational collector). Pass arguments as a string to init it.

Usage:
  gengc [options]

Logging:
  --gc-log-level=<level>                logging level: none, error, warn, info, debug, trace, env [default: env]

Heap:
  --gc-heap-size=<bytes>                total heap size (default 16mb) [default: 16777216]
  --gc-min-heap-size=<bytes>            smallest acceptable heap size [default: 1024]
  --gc-young-size=<bytes>               size of one young semispace (default 1mb) [default: 1048576]
  --gc-permanent-size=<bytes>           permanent (read-only image) space size (default 64kb) [default: 65536]

Policy:
  --gc-promotion-threshold=<n>          young collections an object survives before promotion [default: 2]
  --gc-large-object-threshold=<bytes>   objects larger than this are allocated in the old generation [default: 50000]
";

#[derive(Debug, Clone, Deserialize)]
pub struct GcOptions {
    pub flag_gc_log_level: String,

    pub flag_gc_heap_size: usize,
    pub flag_gc_min_heap_size: usize,
    pub flag_gc_young_size: usize,
    pub flag_gc_permanent_size: usize,

    pub flag_gc_promotion_threshold: usize,
    pub flag_gc_large_object_threshold: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcLogLevel {
    None,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Env,
}

impl GcLogLevel {
    pub fn from_string(s: &str) -> Option<GcLogLevel> {
        match s.trim().to_lowercase().as_str() {
            "none" => Some(GcLogLevel::None),
            "error" => Some(GcLogLevel::Error),
            "warn" => Some(GcLogLevel::Warn),
            "info" => Some(GcLogLevel::Info),
            "debug" => Some(GcLogLevel::Debug),
            "trace" => Some(GcLogLevel::Trace),
            "env" => Some(GcLogLevel::Env),
            _ => None,
        }
    }
}

impl GcOptions {
    pub fn init(str: &str) -> Result<GcOptions, GcError> {
        debug!("init gc options with: {:?}", str);

        let argv = iter::once("gengc").chain(str.split_whitespace());
        let ret: GcOptions = Docopt::new(USAGE)
            .and_then(|d| d.argv(argv).deserialize())
            .map_err(|e| GcError::BadOptions(e.to_string()))?;

        if GcLogLevel::from_string(&ret.flag_gc_log_level).is_none() {
            return Err(GcError::BadOptions(format!(
                "unrecognised log level {}",
                ret.flag_gc_log_level
            )));
        }

        debug!("parsed as {:?}", ret);
        Ok(ret)
    }

    pub fn log_level(&self) -> GcLogLevel {
        GcLogLevel::from_string(&self.flag_gc_log_level).unwrap_or(GcLogLevel::Env)
    }
}

impl Default for GcOptions {
    fn default() -> GcOptions {
        GcOptions {
            flag_gc_log_level: "env".to_string(),
            flag_gc_heap_size: 16 << 20,
            flag_gc_min_heap_size: MIN_TOTAL_HEAP,
            flag_gc_young_size: DEFAULT_YOUNG_SIZE,
            flag_gc_permanent_size: 64 << 10,
            flag_gc_promotion_threshold: 2,
            flag_gc_large_object_threshold: LARGE_OBJECT_THRESHOLD,
        }
    }
}
