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
//! Hash set over the distinct values of one build-side channel.
//!
//! Responsibilities:
//! - Collects distinct non-null tuples of a single-field schema and remembers whether a null was seen.
//! - Answers membership for a position inside a probe block without copying the probe value.
//!
//! Key exported interfaces:
//! - Types: `ChannelSetBuilder`, `ChannelSet`, `ChannelSetProbe`.
//!
//! Build-side tuples are copied once into a private byte store; the table holds
//! offsets into that store. Probe values are hashed and compared in place, read
//! from whatever block the probe handle is currently rebound to. A probe handle
//! is owned by one operator, so the shared set itself is never mutated after build.

use std::sync::Arc;

use arrow_buffer::Buffer;
use hashbrown::hash_map::DefaultHashBuilder;
use hashbrown::raw::RawTable;

use crate::check_argument;
use crate::common::error::{ExecError, Result};
use crate::exec::block::{Block, Cursor, LookupSource, TupleInfo, TuplePosition, TupleView};
use crate::exec::hash_table::hash::seed_from_hasher;
use crate::exec::page::Page;
use crate::runtime::mem_tracker::{MemTracker, TrackedBytes};

#[derive(Clone, Copy, Debug)]
struct SetEntry {
    offset: usize,
    len: usize,
    hash: u64,
}

pub struct ChannelSetBuilder {
    tuple_info: TupleInfo,
    table: RawTable<SetEntry>,
    storage: Vec<u8>,
    contains_null: bool,
    hash_seed: u64,
    mem_tracker: Option<Arc<MemTracker>>,
}

impl ChannelSetBuilder {
    /// `expected_positions` is a capacity hint for the distinct value count.
    pub fn new(tuple_info: TupleInfo, expected_positions: usize) -> Result<Self> {
        check_argument!(
            tuple_info.field_count() == 1,
            "channel set supports single-field tuples, got {} fields",
            tuple_info.field_count()
        );
        let storage_hint = tuple_info.fixed_size().unwrap_or(16);
        Ok(Self {
            tuple_info,
            table: RawTable::with_capacity(expected_positions),
            storage: Vec::with_capacity(expected_positions.saturating_mul(storage_hint)),
            contains_null: false,
            hash_seed: seed_from_hasher(&DefaultHashBuilder::default()),
            mem_tracker: None,
        })
    }

    /// Charges the built set's storage to `tracker` for as long as the set lives.
    pub fn set_mem_tracker(&mut self, tracker: Arc<MemTracker>) {
        self.mem_tracker = Some(tracker);
    }

    pub fn tuple_info(&self) -> &TupleInfo {
        &self.tuple_info
    }

    /// Distinct non-null values collected so far.
    pub fn size(&self) -> usize {
        self.table.len()
    }

    fn add_tuple(&mut self, tuple: TupleView<'_>) -> Result<()> {
        if tuple.is_null(0)? {
            self.contains_null = true;
            return Ok(());
        }
        let bytes = tuple.as_slice();
        let hash = self.tuple_info.hash_tuple(bytes, self.hash_seed);
        let storage = &self.storage;
        let info = &self.tuple_info;
        let present = self
            .table
            .get(hash, |e| {
                info.tuple_equals(&storage[e.offset..e.offset + e.len], bytes)
            })
            .is_some();
        if !present {
            let entry = SetEntry {
                offset: self.storage.len(),
                len: bytes.len(),
                hash,
            };
            self.storage.extend_from_slice(bytes);
            self.table.insert(hash, entry, |e| e.hash);
        }
        Ok(())
    }

    /// Adds every value run of `cursor`; a run-length value is hashed once.
    pub fn add_cursor<I: Iterator<Item = Block>>(&mut self, cursor: &mut Cursor<I>) -> Result<()> {
        check_argument!(
            cursor.tuple_info() == &self.tuple_info,
            "cursor schema {} does not match channel set schema {}",
            cursor.tuple_info(),
            self.tuple_info
        );
        while cursor.has_next_value() {
            cursor.advance_next_value()?;
            self.add_tuple(cursor.tuple()?)?;
        }
        Ok(())
    }

    pub fn add_block(&mut self, block: &Block) -> Result<()> {
        self.add_cursor(&mut block.cursor())
    }

    pub fn add_page(&mut self, page: &Page, channel: usize) -> Result<()> {
        self.add_block(page.block(channel)?)
    }

    pub fn build(self) -> ChannelSet {
        let table_bytes = self.table.buckets() * (std::mem::size_of::<SetEntry>() + 1);
        let accounting = self
            .mem_tracker
            .map(|tracker| TrackedBytes::new(self.storage.len() + table_bytes, tracker));
        ChannelSet {
            tuple_info: self.tuple_info,
            table: self.table,
            storage: Buffer::from_vec(self.storage),
            contains_null: self.contains_null,
            hash_seed: self.hash_seed,
            accounting,
        }
    }
}

/// Immutable set of distinct build-side values plus a null flag.
pub struct ChannelSet {
    tuple_info: TupleInfo,
    table: RawTable<SetEntry>,
    storage: Buffer,
    contains_null: bool,
    hash_seed: u64,
    accounting: Option<TrackedBytes>,
}

impl std::fmt::Debug for ChannelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSet")
            .field("tuple_info", &self.tuple_info)
            .field("size", &self.size())
            .field("contains_null", &self.contains_null)
            .finish()
    }
}

impl ChannelSet {
    pub fn tuple_info(&self) -> &TupleInfo {
        &self.tuple_info
    }

    /// Number of distinct non-null values.
    pub fn size(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn contains_null(&self) -> bool {
        self.contains_null
    }

    /// Bytes charged for this set, when built with a tracker.
    pub fn tracked_bytes(&self) -> i64 {
        self.accounting.as_ref().map_or(0, TrackedBytes::bytes)
    }

    /// Membership of an owned or borrowed non-null value.
    pub fn contains_value(&self, tuple: TupleView<'_>) -> Result<bool> {
        check_argument!(
            tuple.tuple_info() == &self.tuple_info,
            "value schema {} does not match channel set schema {}",
            tuple.tuple_info(),
            self.tuple_info
        );
        check_argument!(!tuple.is_null(0)?, "channel set lookup requires a non-null value");
        Ok(self.contains_encoded(tuple.as_slice()))
    }

    fn contains_encoded(&self, bytes: &[u8]) -> bool {
        let hash = self.tuple_info.hash_tuple(bytes, self.hash_seed);
        let storage = self.storage.as_slice();
        self.table
            .get(hash, |e| {
                self.tuple_info
                    .tuple_equals(&storage[e.offset..e.offset + e.len], bytes)
            })
            .is_some()
    }

    /// Probe handle for one consumer. It must be rebound to a block before `contains`.
    pub fn probe(&self) -> ChannelSetProbe<'_> {
        ChannelSetProbe {
            set: self,
            source: None,
        }
    }
}

/// Per-consumer view of a channel set, bound to one probe block at a time.
pub struct ChannelSetProbe<'a> {
    set: &'a ChannelSet,
    source: Option<LookupSource<'a>>,
}

impl<'a> ChannelSetProbe<'a> {
    /// Points later `contains` calls at `source`'s backing store.
    pub fn rebind(&mut self, source: LookupSource<'a>) -> Result<()> {
        check_argument!(
            source.tuple_info() == &self.set.tuple_info,
            "lookup source schema {} does not match channel set schema {}",
            source.tuple_info(),
            self.set.tuple_info
        );
        self.source = Some(source);
        Ok(())
    }

    pub fn contains_null(&self) -> bool {
        self.set.contains_null
    }

    /// Whether the non-null value at `position` is in the set. `position` must be
    /// parked inside the currently rebound source.
    pub fn contains(&self, position: &impl TuplePosition) -> Result<bool> {
        let Some(source) = self.source else {
            return Err(ExecError::invalid_state(
                "channel set probed before a lookup source was bound",
            ));
        };
        check_argument!(
            source.is_same_store(position.raw_slice()?),
            "position does not belong to the bound lookup source"
        );
        let tuple = source.tuple_at(position.raw_offset()?)?;
        check_argument!(!tuple.is_null(0)?, "channel set lookup requires a non-null value");
        Ok(self.set.contains_encoded(tuple.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::block::{BlockBuilder, RleBlock, Tuple};

    fn varchar_block(values: &[Option<&str>]) -> Block {
        let mut builder = BlockBuilder::new(TupleInfo::single_varbinary(), 64);
        for v in values {
            match v {
                Some(v) => builder.append_str(v).expect("append"),
                None => builder.append_null().expect("append"),
            }
        }
        builder.build().expect("build")
    }

    #[test]
    fn distinct_values_and_null_flag() {
        let mut builder = ChannelSetBuilder::new(TupleInfo::single_varbinary(), 4).expect("builder");
        builder
            .add_block(&varchar_block(&[Some("a"), Some("b"), Some("a"), None]))
            .expect("add");
        let set = builder.build();
        assert_eq!(set.size(), 2);
        assert!(set.contains_null());
        assert_eq!(set.contains_value(Tuple::string("a").view()), Ok(true));
        assert_eq!(set.contains_value(Tuple::string("c").view()), Ok(false));
        assert!(set.contains_value(Tuple::long(1).view()).is_err());
    }

    #[test]
    fn run_length_values_are_added_once() {
        let mut builder = ChannelSetBuilder::new(TupleInfo::single_long(), 4).expect("builder");
        let run: Block = RleBlock::try_new(Tuple::long(7), 0, 999).expect("rle").into();
        builder.add_block(&run).expect("add");
        let set = builder.build();
        assert_eq!(set.size(), 1);
        assert!(!set.contains_null());
    }

    #[test]
    fn rejects_multi_field_schema() {
        let info = TupleInfo::try_new(vec![
            crate::exec::block::FieldType::FixedInt64,
            crate::exec::block::FieldType::FixedInt64,
        ])
        .expect("schema");
        assert!(matches!(
            ChannelSetBuilder::new(info, 1),
            Err(ExecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn probe_reads_values_from_rebound_block() {
        let mut builder = ChannelSetBuilder::new(TupleInfo::single_varbinary(), 4).expect("builder");
        builder
            .add_block(&varchar_block(&[Some("apple"), Some("date")]))
            .expect("add");
        let set = builder.build();

        let probe_block = varchar_block(&[Some("date"), Some("fig")]);
        let mut cursor = probe_block.cursor();
        cursor.advance_next_position().expect("advance");

        let mut probe = set.probe();
        assert!(matches!(probe.contains(&cursor), Err(ExecError::InvalidState(_))));
        probe.rebind(probe_block.lookup_source()).expect("rebind");
        assert_eq!(probe.contains(&cursor), Ok(true));
        cursor.advance_next_position().expect("advance");
        assert_eq!(probe.contains(&cursor), Ok(false));

        let other = varchar_block(&[Some("date")]);
        let mut foreign = other.cursor();
        foreign.advance_next_position().expect("advance");
        assert!(matches!(
            probe.contains(&foreign),
            Err(ExecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn doubles_match_numerically() {
        let mut builder = ChannelSetBuilder::new(TupleInfo::single_double(), 4).expect("builder");
        let mut values = BlockBuilder::with_positions(TupleInfo::single_double(), 2);
        values.append_double(0.0).expect("append");
        values.append_double(f64::NAN).expect("append");
        builder.add_block(&values.build().expect("build")).expect("add");
        let set = builder.build();
        assert_eq!(set.contains_value(Tuple::double(-0.0).view()), Ok(true));
        assert_eq!(set.contains_value(Tuple::double(f64::NAN).view()), Ok(true));
        assert_eq!(set.contains_value(Tuple::double(1.0).view()), Ok(false));
    }

    #[test]
    fn tracked_set_releases_on_drop() {
        let tracker = MemTracker::new_root("set");
        let mut builder = ChannelSetBuilder::new(TupleInfo::single_long(), 8).expect("builder");
        builder.set_mem_tracker(Arc::clone(&tracker));
        builder
            .add_block(&RleBlock::try_new(Tuple::long(1), 0, 0).expect("rle").into())
            .expect("add");
        let set = builder.build();
        assert!(tracker.current() > 0);
        assert_eq!(tracker.current(), set.tracked_bytes());
        drop(set);
        assert_eq!(tracker.current(), 0);
    }
}
