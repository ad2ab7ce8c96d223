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
//! Columnar block model.
//!
//! Responsibilities:
//! - Defines tuple schemas, encoded tuples and the two block encodings (flat and run-length).
//! - Exposes blocks to callers only through cursors and lookup sources, never by variant.
//!
//! Key exported interfaces:
//! - Types: `Block`, `FlatBlock`, `RleBlock`, `BlockBuilder`, `Cursor`, `LookupSource`,
//!   `Range`, `Tuple`, `TupleInfo`, `FieldType`.

pub mod block_builder;
pub mod cursor;
pub mod flat_block;
pub mod range;
pub mod rle_block;
pub mod tuple;
pub mod tuple_info;

pub use block_builder::BlockBuilder;
pub use cursor::{Cursor, TuplePosition};
pub use flat_block::FlatBlock;
pub use range::Range;
pub use rle_block::RleBlock;
pub use tuple::{Tuple, TupleBuilder, TupleView};
pub use tuple_info::{FieldType, TupleInfo};

use crate::common::error::{ExecError, Result};

/// One column's values for a page, flat or run-length encoded.
#[derive(Clone, Debug)]
pub enum Block {
    Flat(FlatBlock),
    Rle(RleBlock),
}

impl Block {
    pub fn tuple_info(&self) -> &TupleInfo {
        match self {
            Block::Flat(b) => b.tuple_info(),
            Block::Rle(b) => b.tuple_info(),
        }
    }

    pub fn position_count(&self) -> usize {
        match self {
            Block::Flat(b) => b.position_count(),
            Block::Rle(b) => b.position_count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position_count() == 0
    }

    pub fn start_position(&self) -> u64 {
        match self {
            Block::Flat(b) => b.start_position(),
            Block::Rle(b) => b.range().start(),
        }
    }

    /// Covered positions, or `None` for a zero-row block.
    pub fn range(&self) -> Option<Range> {
        match self {
            Block::Flat(b) => b.range(),
            Block::Rle(b) => Some(b.range()),
        }
    }

    pub fn memory_size(&self) -> usize {
        match self {
            Block::Flat(b) => b.memory_size(),
            Block::Rle(b) => b.memory_size(),
        }
    }

    /// View of the backing store that a channel set can be rebound to.
    pub fn lookup_source(&self) -> LookupSource<'_> {
        let slice = match self {
            Block::Flat(b) => b.slice().as_slice(),
            Block::Rle(b) => b.value().as_slice(),
        };
        LookupSource {
            tuple_info: self.tuple_info(),
            slice,
        }
    }

    /// Cursor over this block alone. The clone shares the backing buffers.
    pub fn cursor(&self) -> Cursor<std::iter::Once<Block>> {
        Cursor::for_block(self.clone())
    }
}

impl From<FlatBlock> for Block {
    fn from(block: FlatBlock) -> Self {
        Block::Flat(block)
    }
}

impl From<RleBlock> for Block {
    fn from(block: RleBlock) -> Self {
        Block::Rle(block)
    }
}

/// Borrowed backing store of one block, addressed by tuple byte offset.
#[derive(Clone, Copy, Debug)]
pub struct LookupSource<'a> {
    tuple_info: &'a TupleInfo,
    slice: &'a [u8],
}

impl<'a> LookupSource<'a> {
    pub fn tuple_info(&self) -> &'a TupleInfo {
        self.tuple_info
    }

    pub fn slice(&self) -> &'a [u8] {
        self.slice
    }

    /// The tuple encoded at `offset`.
    pub fn tuple_at(&self, offset: usize) -> Result<TupleView<'a>> {
        if offset >= self.slice.len() {
            return Err(ExecError::invalid_argument(format!(
                "tuple offset {} outside lookup source of {} bytes",
                offset,
                self.slice.len()
            )));
        }
        let size = self.tuple_info.tuple_size(self.slice, offset);
        let end = offset + size;
        if end > self.slice.len() {
            return Err(ExecError::invalid_argument(format!(
                "tuple at offset {} overruns lookup source of {} bytes",
                offset,
                self.slice.len()
            )));
        }
        Ok(TupleView::new(self.tuple_info, &self.slice[offset..end]))
    }

    /// True when `slice` is exactly this source's backing store.
    pub(crate) fn is_same_store(&self, slice: &[u8]) -> bool {
        std::ptr::eq(self.slice.as_ptr(), slice.as_ptr()) && self.slice.len() == slice.len()
    }
}
