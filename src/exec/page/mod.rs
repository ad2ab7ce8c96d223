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
//! Pages: the unit of data exchanged between operators.
//!
//! Responsibilities:
//! - Groups one block per channel, all with the same position count.
//! - Carries optional memory accounting that follows the page between operators.
//!
//! Key exported interfaces:
//! - Types: `Page`.

use std::sync::{Arc, Mutex};

use crate::check_argument;
use crate::common::error::{ExecError, Result};
use crate::exec::block::{Block, TupleInfo};
use crate::runtime::mem_tracker::{MemTracker, TrackedBytes};

#[derive(Clone, Debug)]
pub struct Page {
    blocks: Arc<[Block]>,
    position_count: usize,
    accounting: Option<Arc<Mutex<TrackedBytes>>>,
}

impl Page {
    /// Fails when `blocks` is empty or their position counts differ.
    pub fn try_new(blocks: Vec<Block>) -> Result<Self> {
        let Some(first) = blocks.first() else {
            return Err(ExecError::invalid_argument("page requires at least one block"));
        };
        let position_count = first.position_count();
        for (channel, block) in blocks.iter().enumerate() {
            check_argument!(
                block.position_count() == position_count,
                "block {} has {} positions, page has {}",
                channel,
                block.position_count(),
                position_count
            );
        }
        Ok(Self {
            blocks: blocks.into(),
            position_count,
            accounting: None,
        })
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn is_empty(&self) -> bool {
        self.position_count == 0
    }

    pub fn channel_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, channel: usize) -> Result<&Block> {
        self.blocks.get(channel).ok_or_else(|| {
            ExecError::invalid_argument(format!(
                "channel {} out of range for page with {} channels",
                channel,
                self.blocks.len()
            ))
        })
    }

    pub fn tuple_infos(&self) -> Vec<TupleInfo> {
        self.blocks.iter().map(|b| b.tuple_info().clone()).collect()
    }

    /// New page with every block of this one followed by `block`.
    pub fn append_block(&self, block: Block) -> Result<Page> {
        check_argument!(
            block.position_count() == self.position_count,
            "appended block has {} positions, page has {}",
            block.position_count(),
            self.position_count
        );
        let mut blocks = self.blocks.to_vec();
        blocks.push(block);
        let mut page = Page {
            blocks: blocks.into(),
            position_count: self.position_count,
            accounting: None,
        };
        if let Some(tracker) = self.tracker() {
            page.transfer_to(&tracker);
        }
        Ok(page)
    }

    pub fn memory_size(&self) -> usize {
        self.blocks.iter().map(Block::memory_size).sum()
    }

    /// Tracker currently charged for this page, if any.
    pub fn tracker(&self) -> Option<Arc<MemTracker>> {
        let accounting = self.accounting.as_ref()?;
        let guard = accounting.lock().expect("page accounting lock");
        Some(Arc::clone(guard.tracker()))
    }

    /// Charges the page to `tracker`, moving any existing charge. Clones share the charge.
    pub fn transfer_to(&mut self, tracker: &Arc<MemTracker>) {
        if let Some(accounting) = self.accounting.as_ref() {
            accounting
                .lock()
                .expect("page accounting lock")
                .transfer_to(tracker);
            return;
        }
        let bytes = self.memory_size();
        if bytes == 0 {
            return;
        }
        self.accounting = Some(Arc::new(Mutex::new(TrackedBytes::new(
            bytes,
            Arc::clone(tracker),
        ))));
    }
}
