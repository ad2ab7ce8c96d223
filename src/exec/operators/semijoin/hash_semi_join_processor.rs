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
//! Hash semi-join probe processor.
//!
//! Responsibilities:
//! - Appends one nullable boolean column to every probe page: whether the row's join key
//!   is in the build-side channel set, under SQL three-valued logic.
//! - Waits on the set's dependency without blocking and surfaces a failed build.
//!
//! Key exported interfaces:
//! - Types: `HashSemiJoinProcessorFactory`.
//!
//! Per row: a null key yields null; a key found in the set yields true; a key not
//! found yields null when the build side held a null and false otherwise.

use std::cell::OnceCell;
use std::sync::Arc;

use super::set_supplier::SetSupplier;
use crate::common::error::{ExecError, Result};
use crate::exec::block::{Block, BlockBuilder, TupleInfo};
use crate::exec::hash_table::ChannelSet;
use crate::exec::page::Page;
use crate::exec::pipeline::dependency::DependencyHandle;
use crate::exec::pipeline::operator::{Operator, ProcessorOperator};
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::novaprobe_logging::debug;
use crate::runtime::runtime_state::RuntimeState;
use crate::{check_argument, check_state};

pub struct HashSemiJoinProcessorFactory {
    name: String,
    supplier: Arc<SetSupplier>,
    probe_tuple_infos: Arc<[TupleInfo]>,
    probe_join_channel: usize,
    output_tuple_infos: Arc<[TupleInfo]>,
}

impl HashSemiJoinProcessorFactory {
    /// Fails when `probe_join_channel` is negative or out of range, or when that
    /// channel is not a single-field schema matching the supplier's.
    pub fn try_new(
        node_id: i32,
        supplier: Arc<SetSupplier>,
        probe_tuple_infos: Vec<TupleInfo>,
        probe_join_channel: i32,
    ) -> Result<Self> {
        check_argument!(
            probe_join_channel >= 0,
            "probe join channel must be non-negative, got {}",
            probe_join_channel
        );
        let channel = probe_join_channel as usize;
        let Some(key_info) = probe_tuple_infos.get(channel) else {
            return Err(ExecError::invalid_argument(format!(
                "probe join channel {} out of range for {} probe channels",
                channel,
                probe_tuple_infos.len()
            )));
        };
        check_argument!(
            key_info.field_count() == 1,
            "semi join supports single-field join keys, channel {} has {} fields",
            channel,
            key_info.field_count()
        );
        check_argument!(
            key_info == supplier.tuple_info(),
            "probe key schema {} does not match channel set schema {}",
            key_info,
            supplier.tuple_info()
        );
        let mut output_tuple_infos = probe_tuple_infos.clone();
        output_tuple_infos.push(TupleInfo::single_boolean());
        Ok(Self {
            name: format!("HashSemiJoin (id={node_id})"),
            supplier,
            probe_tuple_infos: probe_tuple_infos.into(),
            probe_join_channel: channel,
            output_tuple_infos: output_tuple_infos.into(),
        })
    }

    /// Probe schema followed by the boolean membership column.
    pub fn output_tuple_infos(&self) -> &[TupleInfo] {
        &self.output_tuple_infos
    }
}

impl OperatorFactory for HashSemiJoinProcessorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, _dop: i32, _driver_id: i32) -> Box<dyn Operator> {
        Box::new(HashSemiJoinProcessorOperator {
            name: self.name.clone(),
            supplier: Arc::clone(&self.supplier),
            probe_tuple_infos: Arc::clone(&self.probe_tuple_infos),
            probe_join_channel: self.probe_join_channel,
            output_tuple_infos: Arc::clone(&self.output_tuple_infos),
            channel_set: OnceCell::new(),
            pending_output: None,
            finishing: false,
        })
    }
}

struct HashSemiJoinProcessorOperator {
    name: String,
    supplier: Arc<SetSupplier>,
    probe_tuple_infos: Arc<[TupleInfo]>,
    probe_join_channel: usize,
    output_tuple_infos: Arc<[TupleInfo]>,
    channel_set: OnceCell<Arc<ChannelSet>>,
    pending_output: Option<Page>,
    finishing: bool,
}

impl HashSemiJoinProcessorOperator {
    /// The published set, cached on first sight. `None` while the build runs or after it failed.
    fn resolved_set(&self) -> Option<&Arc<ChannelSet>> {
        if let Some(set) = self.channel_set.get() {
            return Some(set);
        }
        match self.supplier.get() {
            Some(Ok(set)) => Some(self.channel_set.get_or_init(|| set)),
            _ => None,
        }
    }

    fn check_page_schema(&self, page: &Page) -> Result<()> {
        check_argument!(
            page.channel_count() == self.probe_tuple_infos.len(),
            "probe page has {} channels, expected {}",
            page.channel_count(),
            self.probe_tuple_infos.len()
        );
        for (channel, (block, expected)) in page
            .blocks()
            .iter()
            .zip(self.probe_tuple_infos.iter())
            .enumerate()
        {
            check_argument!(
                block.tuple_info() == expected,
                "probe channel {} has schema {}, expected {}",
                channel,
                block.tuple_info(),
                expected
            );
        }
        Ok(())
    }

    /// Membership column for one probe block, row for row.
    fn probe_block(set: &ChannelSet, block: &Block, positions: usize) -> Result<Block> {
        let mut probe = set.probe();
        probe.rebind(block.lookup_source())?;
        let mut result = BlockBuilder::with_positions(TupleInfo::single_boolean(), positions);
        let mut cursor = block.cursor();
        while cursor.has_next_value() {
            cursor.advance_next_value()?;
            let value = if cursor.is_null(0)? {
                None
            } else if probe.contains(&cursor)? {
                Some(true)
            } else if probe.contains_null() {
                None
            } else {
                Some(false)
            };
            // A run-length key covers several rows with one lookup.
            let run = cursor.current_value_end_position()? - cursor.position()? + 1;
            for _ in 0..run {
                match value {
                    Some(v) => result.append_boolean(v)?,
                    None => result.append_null()?,
                }
            }
        }
        result.build()
    }
}

impl Operator for HashSemiJoinProcessorOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_processor_mut(&mut self) -> Option<&mut dyn ProcessorOperator> {
        Some(self)
    }

    fn as_processor_ref(&self) -> Option<&dyn ProcessorOperator> {
        Some(self)
    }

    fn is_finished(&self) -> bool {
        self.finishing && self.pending_output.is_none()
    }
}

impl ProcessorOperator for HashSemiJoinProcessorOperator {
    fn need_input(&self) -> bool {
        !self.finishing && self.pending_output.is_none() && self.resolved_set().is_some()
    }

    fn has_output(&self) -> bool {
        self.pending_output.is_some()
    }

    fn push_page(&mut self, _state: &RuntimeState, page: Page) -> Result<()> {
        check_state!(!self.finishing, "{} received input after finishing", self.name);
        check_state!(
            self.pending_output.is_none(),
            "{} received input while output is pending",
            self.name
        );
        if let Some(Err(err)) = self.supplier.get() {
            return Err(err);
        }
        let Some(set) = self.resolved_set().cloned() else {
            return Err(ExecError::invalid_state(format!(
                "{} received input before {} was built",
                self.name,
                self.supplier.dep_name()
            )));
        };
        self.check_page_schema(&page)?;
        let key_block = page.block(self.probe_join_channel)?;
        let membership = Self::probe_block(&set, key_block, page.position_count())?;
        self.pending_output = Some(page.append_block(membership)?);
        Ok(())
    }

    fn pull_page(&mut self, _state: &RuntimeState) -> Result<Option<Page>> {
        Ok(self.pending_output.take())
    }

    fn set_finishing(&mut self, _state: &RuntimeState) -> Result<()> {
        if !self.finishing {
            debug!(
                "Semi join finishing: name={} pending_output={}",
                self.name,
                self.pending_output.is_some()
            );
        }
        self.finishing = true;
        Ok(())
    }

    fn precondition_dependency(&self) -> Option<DependencyHandle> {
        Some(self.supplier.dep())
    }

    fn is_blocked(&self) -> Result<DependencyHandle> {
        if let Some(Err(err)) = self.supplier.get() {
            return Err(err);
        }
        Ok(self.supplier.dep())
    }

    fn output_tuple_infos(&self) -> Option<Vec<TupleInfo>> {
        Some(self.output_tuple_infos.to_vec())
    }
}
