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
//! Forward-only cursor over one logical column.
//!
//! Responsibilities:
//! - Walks a lazily supplied sequence of blocks by position or by value run.
//! - Keeps both advance modes consistent: the position and value after any mix of
//!   calls match a pure position-by-position walk to the same spot.
//! - Exposes the current tuple's backing store and offset as a flyweight handle.
//!
//! Key exported interfaces:
//! - Types: `Cursor`, `TuplePosition`.
//!
//! Blocks are validated when the cursor enters them: every block must carry the
//! cursor's schema and start after the previous block's end.

use super::Block;
use super::tuple::TupleView;
use super::tuple_info::TupleInfo;
use crate::common::error::{ExecError, Result};

/// A position inside some block's backing store, for copy-free lookups.
pub trait TuplePosition {
    /// Backing store the current tuple lives in.
    fn raw_slice(&self) -> Result<&[u8]>;
    /// Byte offset of the current tuple within `raw_slice()`.
    fn raw_offset(&self) -> Result<usize>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CursorState {
    NotStarted,
    Active,
    Finished,
}

pub struct Cursor<I: Iterator<Item = Block>> {
    tuple_info: TupleInfo,
    blocks: I,
    /// One block of lookahead, never zero-row.
    next_block: Option<Block>,
    current: Option<Block>,
    /// Block-local index of the current position.
    index: usize,
    /// Byte offset of the current tuple in the current block's store.
    offset: usize,
    /// End position of the last block entered.
    last_end: Option<u64>,
    state: CursorState,
}

impl Cursor<std::iter::Once<Block>> {
    pub(crate) fn for_block(block: Block) -> Self {
        Self::new(block.tuple_info().clone(), std::iter::once(block))
    }
}

impl<I: Iterator<Item = Block>> Cursor<I> {
    /// Cursor over `blocks`, all of which must use `tuple_info`. Blocks are pulled
    /// one ahead of the current one.
    pub fn new(tuple_info: TupleInfo, blocks: impl IntoIterator<IntoIter = I>) -> Self {
        let blocks = blocks.into_iter();
        let mut cursor = Self {
            tuple_info,
            blocks,
            next_block: None,
            current: None,
            index: 0,
            offset: 0,
            last_end: None,
            state: CursorState::NotStarted,
        };
        cursor.fetch_next_block();
        cursor
    }

    pub fn tuple_info(&self) -> &TupleInfo {
        &self.tuple_info
    }

    pub fn is_finished(&self) -> bool {
        self.state == CursorState::Finished
    }

    fn fetch_next_block(&mut self) {
        self.next_block = self.blocks.by_ref().find(|b| !b.is_empty());
    }

    fn enter_next_block(&mut self) -> Result<()> {
        let Some(block) = self.next_block.take() else {
            self.current = None;
            self.state = CursorState::Finished;
            return Err(ExecError::end_of_data("cursor has no more positions"));
        };
        if block.tuple_info() != &self.tuple_info {
            return Err(ExecError::invalid_argument(format!(
                "block schema {} does not match cursor schema {}",
                block.tuple_info(),
                self.tuple_info
            )));
        }
        let Some(range) = block.range() else {
            return Err(ExecError::invalid_state("zero-row block reached the cursor"));
        };
        if let Some(last_end) = self.last_end
            && range.start() <= last_end
        {
            return Err(ExecError::invalid_argument(format!(
                "block range {:?} does not start after previous end {}",
                range, last_end
            )));
        }
        self.last_end = Some(range.end());
        self.index = 0;
        self.offset = 0;
        self.current = Some(block);
        self.state = CursorState::Active;
        self.fetch_next_block();
        Ok(())
    }

    fn current_block(&self) -> Result<&Block> {
        match self.state {
            CursorState::NotStarted => Err(ExecError::CursorNotAdvanced),
            CursorState::Finished => {
                Err(ExecError::end_of_data("cursor is past its last position"))
            }
            CursorState::Active => self
                .current
                .as_ref()
                .ok_or_else(|| ExecError::invalid_state("active cursor without a block")),
        }
    }

    fn has_next_in_block(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|b| self.index + 1 < b.position_count())
    }

    pub fn has_next_position(&self) -> bool {
        match self.state {
            CursorState::Finished => false,
            _ => self.has_next_in_block() || self.next_block.is_some(),
        }
    }

    /// True when another value run follows. Every flat position is its own run;
    /// a run-length block is one run.
    pub fn has_next_value(&self) -> bool {
        match (&self.state, &self.current) {
            (CursorState::Finished, _) => false,
            (_, Some(Block::Flat(_))) => self.has_next_in_block() || self.next_block.is_some(),
            _ => self.next_block.is_some(),
        }
    }

    /// Moves exactly one position forward, crossing into the next block as needed.
    pub fn advance_next_position(&mut self) -> Result<()> {
        if self.state == CursorState::Finished {
            return Err(ExecError::end_of_data("cursor has no more positions"));
        }
        if self.has_next_in_block() {
            self.index += 1;
            if let Some(Block::Flat(flat)) = &self.current {
                self.offset = flat.tuple_offset_unchecked(self.index);
            }
            return Ok(());
        }
        self.enter_next_block()
    }

    /// Moves to the first position of the next value run.
    pub fn advance_next_value(&mut self) -> Result<()> {
        if self.state == CursorState::Finished {
            return Err(ExecError::end_of_data("cursor has no more values"));
        }
        let result = match self.current {
            Some(Block::Flat(_)) => self.advance_next_position(),
            _ => self.enter_next_block(),
        };
        result.map_err(|e| {
            if e.is_end_of_data() {
                ExecError::end_of_data("cursor has no more values")
            } else {
                e
            }
        })
    }

    /// Position the next `advance_next_value` would land on, without moving.
    pub fn peek_next_value_position(&self) -> Result<u64> {
        if self.state == CursorState::Finished {
            return Err(ExecError::end_of_data("cursor has no more values"));
        }
        if let Some(Block::Flat(flat)) = &self.current
            && self.index + 1 < flat.position_count()
        {
            return Ok(flat.start_position() + self.index as u64 + 1);
        }
        self.next_block
            .as_ref()
            .map(Block::start_position)
            .ok_or_else(|| ExecError::end_of_data("cursor has no more values"))
    }

    pub fn position(&self) -> Result<u64> {
        Ok(self.current_block()?.start_position() + self.index as u64)
    }

    /// Last position holding the current value.
    pub fn current_value_end_position(&self) -> Result<u64> {
        match self.current_block()? {
            Block::Flat(_) => self.position(),
            Block::Rle(rle) => Ok(rle.range().end()),
        }
    }

    pub fn tuple(&self) -> Result<TupleView<'_>> {
        match self.current_block()? {
            Block::Flat(flat) => Ok(flat.tuple_at(self.index, self.offset)),
            Block::Rle(rle) => Ok(rle.value_view()),
        }
    }

    pub fn is_null(&self, field: usize) -> Result<bool> {
        self.tuple()?.is_null(field)
    }

    pub fn get_boolean(&self, field: usize) -> Result<bool> {
        self.tuple()?.get_boolean(field)
    }

    pub fn get_long(&self, field: usize) -> Result<i64> {
        self.tuple()?.get_long(field)
    }

    pub fn get_double(&self, field: usize) -> Result<f64> {
        self.tuple()?.get_double(field)
    }

    pub fn get_slice(&self, field: usize) -> Result<&[u8]> {
        self.tuple()?.get_slice(field)
    }
}

impl<I: Iterator<Item = Block>> TuplePosition for Cursor<I> {
    fn raw_slice(&self) -> Result<&[u8]> {
        Ok(self.current_block()?.lookup_source().slice())
    }

    fn raw_offset(&self) -> Result<usize> {
        self.current_block()?;
        Ok(self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::block::{BlockBuilder, RleBlock, Tuple};

    fn flat_longs(start: u64, values: &[Option<i64>]) -> Block {
        let mut builder = BlockBuilder::with_positions(TupleInfo::single_long(), values.len())
            .with_start_position(start);
        for v in values {
            match v {
                Some(v) => builder.append_long(*v).expect("append"),
                None => builder.append_null().expect("append"),
            }
        }
        builder.build().expect("build")
    }

    #[test]
    fn reads_before_first_advance_are_distinct_from_end_of_data() {
        let mut cursor = flat_longs(0, &[Some(1)]).cursor();
        assert_eq!(cursor.position(), Err(ExecError::CursorNotAdvanced));
        assert_eq!(cursor.get_long(0), Err(ExecError::CursorNotAdvanced));
        cursor.advance_next_position().expect("advance");
        assert_eq!(cursor.get_long(0), Ok(1));
        assert!(cursor.advance_next_position().unwrap_err().is_end_of_data());
        assert!(cursor.position().unwrap_err().is_end_of_data());
        assert!(cursor.is_finished());
    }

    #[test]
    fn flat_values_are_one_per_position() {
        let mut cursor = flat_longs(10, &[Some(4), None, Some(6)]).cursor();
        assert_eq!(cursor.peek_next_value_position(), Ok(10));
        cursor.advance_next_value().expect("advance");
        assert_eq!(cursor.peek_next_value_position(), Ok(11));
        cursor.advance_next_value().expect("advance");
        assert_eq!(cursor.position(), Ok(11));
        assert_eq!(cursor.is_null(0), Ok(true));
        assert_eq!(cursor.current_value_end_position(), Ok(11));
        cursor.advance_next_position().expect("advance");
        assert_eq!(cursor.get_long(0), Ok(6));
        assert!(!cursor.has_next_value());
        assert!(cursor.advance_next_value().unwrap_err().is_end_of_data());
    }

    #[test]
    fn zero_row_block_is_immediately_exhausted() {
        let block = BlockBuilder::new(TupleInfo::single_long(), 0)
            .build()
            .expect("build");
        let mut cursor = block.cursor();
        assert!(!cursor.has_next_position());
        assert!(!cursor.has_next_value());
        assert!(cursor.advance_next_position().unwrap_err().is_end_of_data());
    }

    #[test]
    fn single_position_run_behaves_like_one_flat_row() {
        let rle: Block = RleBlock::try_new(Tuple::long(9), 3, 3).expect("rle").into();
        let flat = flat_longs(3, &[Some(9)]);
        for block in [rle, flat] {
            let mut cursor = block.cursor();
            assert_eq!(cursor.peek_next_value_position(), Ok(3));
            cursor.advance_next_value().expect("advance");
            assert_eq!(cursor.position(), Ok(3));
            assert_eq!(cursor.current_value_end_position(), Ok(3));
            assert_eq!(cursor.get_long(0), Ok(9));
            assert!(!cursor.has_next_position());
            assert!(!cursor.has_next_value());
        }
    }

    #[test]
    fn rejects_overlapping_and_mismatched_blocks() {
        let blocks: Vec<Block> = vec![
            RleBlock::try_new(Tuple::long(1), 0, 4).expect("rle").into(),
            RleBlock::try_new(Tuple::long(2), 4, 6).expect("rle").into(),
        ];
        let mut cursor = Cursor::new(TupleInfo::single_long(), blocks);
        cursor.advance_next_value().expect("advance");
        assert!(matches!(
            cursor.advance_next_value(),
            Err(ExecError::InvalidArgument(_))
        ));

        let blocks: Vec<Block> =
            vec![RleBlock::try_new(Tuple::string("x"), 0, 0).expect("rle").into()];
        let mut cursor = Cursor::new(TupleInfo::single_long(), blocks);
        assert!(matches!(
            cursor.advance_next_position(),
            Err(ExecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn raw_handle_points_into_current_store() {
        let block = flat_longs(0, &[Some(1), Some(2)]);
        let mut cursor = block.cursor();
        assert_eq!(cursor.raw_offset(), Err(ExecError::CursorNotAdvanced));
        cursor.advance_next_position().expect("advance");
        cursor.advance_next_position().expect("advance");
        assert_eq!(cursor.raw_offset(), Ok(9));
        let source = block.lookup_source();
        assert!(source.is_same_store(cursor.raw_slice().expect("slice")));
    }
}
