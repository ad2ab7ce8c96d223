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
//! Positional builder for flat blocks.
//!
//! Responsibilities:
//! - Accumulates values and nulls field by field into one pre-sized byte buffer.
//! - Freezes the buffer into an immutable `Block`; the builder is unusable afterwards.
//!
//! Key exported interfaces:
//! - Types: `BlockBuilder`.

use arrow_buffer::{Buffer, MutableBuffer, ScalarBuffer};

use super::Block;
use super::flat_block::FlatBlock;
use super::tuple::{TupleView, TupleWriter};
use super::tuple_info::TupleInfo;
use crate::common::error::{ExecError, Result};
use crate::{check_argument, check_state};

pub struct BlockBuilder {
    tuple_info: TupleInfo,
    start_position: u64,
    data: MutableBuffer,
    /// Tuple start offsets for variable-width schemas, with a trailing end offset.
    offsets: Option<Vec<u32>>,
    writer: TupleWriter,
    position_count: usize,
    built: bool,
}

impl BlockBuilder {
    /// `expected_bytes` pre-sizes the backing store. For fixed-size schemas pass
    /// `positions * fixed_size` and the buffer never grows.
    pub fn new(tuple_info: TupleInfo, expected_bytes: usize) -> Self {
        let offsets = (!tuple_info.is_fixed_size()).then(|| vec![0u32]);
        Self {
            writer: TupleWriter::new(tuple_info.clone()),
            tuple_info,
            start_position: 0,
            data: MutableBuffer::with_capacity(expected_bytes),
            offsets,
            position_count: 0,
            built: false,
        }
    }

    /// Builder sized for exactly `positions` tuples of a fixed-size schema.
    pub fn with_positions(tuple_info: TupleInfo, positions: usize) -> Self {
        let expected = tuple_info
            .fixed_size()
            .map_or(0, |size| size.saturating_mul(positions));
        Self::new(tuple_info, expected)
    }

    pub fn with_start_position(mut self, start_position: u64) -> Self {
        self.start_position = start_position;
        self
    }

    pub fn tuple_info(&self) -> &TupleInfo {
        &self.tuple_info
    }

    /// Completed tuples so far.
    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn is_empty(&self) -> bool {
        self.position_count == 0
    }

    fn check_open(&self) -> Result<()> {
        check_state!(!self.built, "block builder already built");
        Ok(())
    }

    /// Moves the writer's tuple into the block once every field is written.
    fn flush_if_complete(&mut self) -> Result<()> {
        if !self.writer.is_complete() {
            return Ok(());
        }
        self.data.extend_from_slice(self.writer.encoded());
        self.writer.reset();
        self.push_tuple_end()
    }

    fn push_tuple_end(&mut self) -> Result<()> {
        if let Some(offsets) = self.offsets.as_mut() {
            let end = u32::try_from(self.data.len()).map_err(|_| {
                ExecError::invalid_state(format!(
                    "variable-width block exceeds {} bytes",
                    u32::MAX
                ))
            })?;
            offsets.push(end);
        }
        self.position_count += 1;
        Ok(())
    }

    pub fn append_null(&mut self) -> Result<()> {
        self.check_open()?;
        self.writer.append_null();
        self.flush_if_complete()
    }

    pub fn append_boolean(&mut self, value: bool) -> Result<()> {
        self.check_open()?;
        self.writer.append_boolean(value)?;
        self.flush_if_complete()
    }

    pub fn append_long(&mut self, value: i64) -> Result<()> {
        self.check_open()?;
        self.writer.append_long(value)?;
        self.flush_if_complete()
    }

    pub fn append_double(&mut self, value: f64) -> Result<()> {
        self.check_open()?;
        self.writer.append_double(value)?;
        self.flush_if_complete()
    }

    pub fn append_slice(&mut self, value: &[u8]) -> Result<()> {
        self.check_open()?;
        self.writer.append_slice(value)?;
        self.flush_if_complete()
    }

    pub fn append_str(&mut self, value: &str) -> Result<()> {
        self.append_slice(value.as_bytes())
    }

    /// Appends a whole encoded tuple of the same schema.
    pub fn append_tuple(&mut self, tuple: TupleView<'_>) -> Result<()> {
        self.check_open()?;
        check_argument!(
            tuple.tuple_info() == &self.tuple_info,
            "tuple schema {} does not match block schema {}",
            tuple.tuple_info(),
            self.tuple_info
        );
        check_state!(
            !self.writer.in_progress(),
            "cannot append a tuple while {} fields of another are pending",
            self.writer.fields_written()
        );
        self.data.extend_from_slice(tuple.as_slice());
        self.push_tuple_end()
    }

    /// Freezes the accumulated tuples. Every later call on this builder fails.
    pub fn build(&mut self) -> Result<Block> {
        self.check_open()?;
        check_state!(
            !self.writer.in_progress(),
            "cannot build with a half-written tuple ({} of {} fields)",
            self.writer.fields_written(),
            self.tuple_info.field_count()
        );
        self.built = true;
        let data: Buffer = std::mem::replace(&mut self.data, MutableBuffer::new(0)).into();
        let offsets = self.offsets.take().map(ScalarBuffer::from);
        let block = FlatBlock::try_new(
            self.tuple_info.clone(),
            self.start_position,
            self.position_count,
            data,
            offsets,
        )?;
        Ok(Block::Flat(block))
    }
}
