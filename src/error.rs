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
use std::io;

use thiserror::Error;
use utils::ByteSize;

/// Errors that cross the collector boundary.
///
/// Promotion failure is recovered inside a young collection and never shows
/// up here.
#[derive(Debug, Error)]
pub enum GcError {
    /// both generations were collected and the request still does not fit
    #[error("out of memory: cannot allocate {requested} bytes")]
    OutOfMemory { requested: ByteSize },
    #[error("invalid heap size: min {min} bytes is larger than max {max} bytes")]
    InvalidHeapSize { min: ByteSize, max: ByteSize },
    #[error("failed to map heap memory: {0}")]
    MapFailed(#[from] io::Error),
    #[error("bad gc options: {0}")]
    BadOptions(String),
}
