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
//! Operator contracts driven by the pipeline driver.
//!
//! Responsibilities:
//! - Defines the push/pull state machine every pipeline stage implements.
//! - Defines how an operator reports an outstanding dependency without blocking.
//!
//! Key exported interfaces:
//! - Types: `BlockedReason`, `Operator`, `ProcessorOperator`.

use std::sync::Arc;

use crate::common::error::Result;
use crate::exec::block::TupleInfo;
use crate::exec::page::Page;
use crate::exec::pipeline::dependency::{DependencyHandle, resolved_dependency};
use crate::runtime::mem_tracker::MemTracker;
use crate::runtime::runtime_state::RuntimeState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockedReason {
    /// Upstream currently has no data available.
    InputEmpty,
    /// Downstream cannot accept more output at the moment.
    OutputFull,
    /// Blocked on a dependency object (e.g. a channel set still being built).
    Dependency(DependencyHandle),
}

pub trait Operator: Send {
    fn name(&self) -> &str;

    fn set_mem_tracker(&mut self, tracker: Arc<MemTracker>) {
        let _ = tracker;
    }

    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_finished(&self) -> bool {
        false
    }

    fn as_processor_mut(&mut self) -> Option<&mut dyn ProcessorOperator> {
        None
    }

    fn as_processor_ref(&self) -> Option<&dyn ProcessorOperator> {
        None
    }
}

/// Push/pull state machine.
///
/// A caller pushes only while `need_input` is true, pulls while `has_output` is
/// true, and calls `set_finishing` once upstream is exhausted. `set_finishing`
/// is idempotent and forbids further input while still allowing buffered output
/// to drain.
pub trait ProcessorOperator: Operator {
    fn need_input(&self) -> bool;

    fn has_output(&self) -> bool;

    fn push_page(&mut self, state: &RuntimeState, page: Page) -> Result<()>;

    /// Hands over the pending output page, at most once per page.
    fn pull_page(&mut self, state: &RuntimeState) -> Result<Option<Page>>;

    fn set_finishing(&mut self, state: &RuntimeState) -> Result<()>;

    /// Dependency that must be ready before the operator can make progress.
    fn precondition_dependency(&self) -> Option<DependencyHandle> {
        None
    }

    /// Handle to wait on before re-checking `need_input`/`is_finished`.
    /// Already resolved when nothing is outstanding. Fails when the awaited
    /// dependency resolved to a failure.
    fn is_blocked(&self) -> Result<DependencyHandle> {
        Ok(self
            .precondition_dependency()
            .unwrap_or_else(resolved_dependency))
    }

    /// Schemas of the pages this operator emits, when it emits any.
    fn output_tuple_infos(&self) -> Option<Vec<TupleInfo>> {
        None
    }
}
