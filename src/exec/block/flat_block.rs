// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Flat ("uncompressed") block: one encoded tuple per position.
//!
//! Responsibilities:
//! - Holds a contiguous tuple slice plus, for variable-width schemas, a tuple offset array.
//! - Provides O(1) positional access to any tuple in the block.
//!
//! Key exported interfaces:
//! - Types: `FlatBlock`.

use arrow_buffer::{Buffer, ScalarBuffer};

use super::range::Range;
use super::tuple::TupleView;
use super::tuple_info::TupleInfo;
use crate::check_argument;
use crate::common::error::{ExecError, Result};

#[derive(Clone, Debug)]
pub struct FlatBlock {
    tuple_info: TupleInfo,
    start_position: u64,
    position_count: usize,
    slice: Buffer,
    /// `position_count + 1` byte offsets; absent for fixed-size schemas.
    offsets: Option<ScalarBuffer<u32>>,
}

impl FlatBlock {
    pub fn try_new(
        tuple_info: TupleInfo,
        start_position: u64,
        position_count: usize,
        slice: Buffer,
        offsets: Option<ScalarBuffer<u32>>,
    ) -> Result<Self> {
        match (tuple_info.fixed_size(), offsets.as_ref()) {
            (Some(fixed), None) => {
                check_argument!(
                    position_count.checked_mul(fixed) == Some(slice.len()),
                    "fixed-size block of {} positions needs {} bytes, got {}",
                    position_count,
                    position_count.saturating_mul(fixed),
                    slice.len()
                );
            }
            (Some(_), Some(_)) => {
                return Err(ExecError::invalid_argument(
                    "fixed-size block must not carry tuple offsets",
                ));
            }
            (None, None) => {
                return Err(ExecError::invalid_argument(
                    "variable-width block requires tuple offsets",
                ));
            }
            (None, Some(offsets)) => {
                check_argument!(
                    offsets.len() == position_count + 1,
                    "block of {} positions needs {} offsets, got {}",
                    position_count,
                    position_count + 1,
                    offsets.len()
                );
                check_argument!(
                    offsets.first() == Some(&0)
                        && offsets.last().map(|v| *v as usize) == Some(slice.len())
                        && offsets.windows(2).all(|w| w[0] <= w[1]),
                    "tuple offsets must start at 0, be non-decreasing and end at {}",
                    slice.len()
                );
                let bytes = slice.as_slice();
                for (index, span) in offsets.windows(2).enumerate() {
                    let tuple = &bytes[span[0] as usize..span[1] as usize];
                    check_argument!(
                        tuple_info.checked_tuple_size(tuple, 0) == Some(tuple.len()),
                        "tuple {} does not fill its {} byte span",
                        index,
                        tuple.len()
                    );
                }
            }
        }
        Ok(Self {
            tuple_info,
            start_position,
            position_count,
            slice,
            offsets,
        })
    }

    pub fn tuple_info(&self) -> &TupleInfo {
        &self.tuple_info
    }

    pub fn start_position(&self) -> u64 {
        self.start_position
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn range(&self) -> Option<Range> {
        Range::with_length(self.start_position, self.position_count)
    }

    /// Backing store; hashing and equality read probe values from here.
    pub fn slice(&self) -> &Buffer {
        &self.slice
    }

    /// Byte offset of the tuple at block-local `index`.
    pub fn tuple_offset(&self, index: usize) -> Result<usize> {
        if index >= self.position_count {
            return Err(ExecError::invalid_argument(format!(
                "index {} out of range for block of {} positions",
                index, self.position_count
            )));
        }
        Ok(self.tuple_offset_unchecked(index))
    }

    pub(crate) fn tuple_offset_unchecked(&self, index: usize) -> usize {
        match (&self.offsets, self.tuple_info.fixed_size()) {
            (Some(offsets), _) => offsets[index] as usize,
            (None, Some(fixed)) => index * fixed,
            (None, None) => 0,
        }
    }

    pub fn tuple(&self, index: usize) -> Result<TupleView<'_>> {
        let start = self.tuple_offset(index)?;
        Ok(self.tuple_at(index, start))
    }

    pub(crate) fn tuple_at(&self, index: usize, start: usize) -> TupleView<'_> {
        let end = match &self.offsets {
            Some(offsets) => offsets[index + 1] as usize,
            None => start + self.tuple_info.tuple_size(self.slice.as_slice(), start),
        };
        TupleView::new(&self.tuple_info, &self.slice.as_slice()[start..end])
    }

    pub fn memory_size(&self) -> usize {
        self.slice.len() + self.offsets.as_ref().map_or(0, |o| o.len() * 4)
    }
}
