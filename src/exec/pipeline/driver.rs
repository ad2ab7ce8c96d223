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
//! Pipeline driver execution loop.
//!
//! Responsibilities:
//! - Runs a source, its processors and a sink with cooperative scheduling semantics.
//! - Moves pages along the edges between operators, charging each page to its holder.
//! - Reports blocking reasons instead of waiting, so the caller decides how to park.
//!
//! Key exported interfaces:
//! - Types: `DriverState`, `PipelineDriver`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::operator::{BlockedReason, Operator, ProcessorOperator};
use crate::common::error::{ExecError, Result};
use crate::exec::page::Page;
use crate::exec::pipeline::dependency::DependencyHandle;
use crate::novaprobe_logging::{debug, warn};
use crate::runtime::mem_tracker::MemTracker;
use crate::runtime::runtime_state::RuntimeState;

/// Runtime state for a single pipeline driver.
///
/// ```text
///              (scheduled)                 (time slice ends)
///   Ready ───────────────────► Running ─────────────────────► Ready
///                               │
///                               ├─ waits on input/deps ─────► Blocked(reason)
///                               ├─ completes normally ───────► Finished
///                               └─ fatal error ──────────────► Failed(err)
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriverState {
    Ready,
    Running,
    Blocked(BlockedReason),
    Finished,
    Failed(ExecError),
}

impl DriverState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DriverState::Finished | DriverState::Failed(_))
    }
}

pub struct PipelineDriver {
    driver_id: i32,
    operators: Vec<Box<dyn Operator>>,
    runtime_state: Arc<RuntimeState>,
    state: DriverState,
    closed: bool,

    edge_pages: Vec<Option<Page>>,
    edge_closed: Vec<bool>,
    operator_finishing_set: Vec<bool>,
    operator_mem_trackers: Vec<Arc<MemTracker>>,
}

fn processor_mut(op: &mut Box<dyn Operator>) -> Result<&mut dyn ProcessorOperator> {
    let name = op.name().to_string();
    op.as_processor_mut().ok_or_else(|| {
        ExecError::invalid_state(format!("pipeline operator {name} missing processor operator"))
    })
}

fn processor_ref(op: &dyn Operator) -> Result<&dyn ProcessorOperator> {
    op.as_processor_ref().ok_or_else(|| {
        ExecError::invalid_state(format!(
            "pipeline operator {} missing processor operator",
            op.name()
        ))
    })
}

impl PipelineDriver {
    /// `operators` runs source first and sink last. Each operator gets a child
    /// of the runtime state's memory tracker and is prepared here.
    pub fn new(
        driver_id: i32,
        mut operators: Vec<Box<dyn Operator>>,
        runtime_state: Arc<RuntimeState>,
    ) -> Result<Self> {
        if operators.len() < 2 {
            return Err(ExecError::invalid_argument(format!(
                "pipeline needs a source and a sink, got {} operators",
                operators.len()
            )));
        }
        let mut operator_mem_trackers = Vec::with_capacity(operators.len());
        for (idx, op) in operators.iter_mut().enumerate() {
            processor_ref(&**op)?;
            let tracker = MemTracker::new_child(
                format!("{}#{}", op.name(), idx),
                runtime_state.mem_tracker(),
            );
            op.set_mem_tracker(Arc::clone(&tracker));
            op.prepare()?;
            operator_mem_trackers.push(tracker);
        }
        let edge_count = operators.len() - 1;
        let names: Vec<&str> = operators.iter().map(|op| op.name()).collect();
        debug!(
            "Driver created: driver_id={} operators=[{}]",
            driver_id,
            names.join(" -> ")
        );
        Ok(Self {
            driver_id,
            operator_finishing_set: vec![false; operators.len()],
            operators,
            runtime_state,
            state: DriverState::Ready,
            closed: false,
            edge_pages: (0..edge_count).map(|_| None).collect(),
            edge_closed: vec![false; edge_count],
            operator_mem_trackers,
        })
    }

    pub fn driver_id(&self) -> i32 {
        self.driver_id
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    /// One scheduling quantum using the configured driver time slice.
    pub fn process_slice(&mut self) -> DriverState {
        let time_slice = self.runtime_state.time_slice();
        self.process(time_slice)
    }

    /// Runs until blocked, finished, failed, or `time_slice` elapses.
    pub fn process(&mut self, time_slice: Duration) -> DriverState {
        if self.state.is_terminal() {
            return self.state.clone();
        }
        let start = Instant::now();
        self.state = DriverState::Running;

        loop {
            if let Some(err) = self.runtime_state.error() {
                return self.finish_with_state(DriverState::Failed(err));
            }
            if start.elapsed() >= time_slice {
                self.state = DriverState::Ready;
                return self.state.clone();
            }
            if self.is_finished() {
                return self.finish_with_state(DriverState::Finished);
            }

            match self.find_blocking_dependency() {
                Ok(Some(dep)) => return self.block(BlockedReason::Dependency(dep)),
                Ok(None) => {}
                Err(err) => return self.finish_with_state(DriverState::Failed(err)),
            }

            let mut made_progress = false;
            if let Err(err) = self.drive_once(&mut made_progress) {
                return self.finish_with_state(DriverState::Failed(err));
            }
            if made_progress {
                continue;
            }

            match self.idle_reason() {
                Ok(Some(reason)) => return self.block(reason),
                Ok(None) => {
                    self.state = DriverState::Ready;
                    return self.state.clone();
                }
                Err(err) => return self.finish_with_state(DriverState::Failed(err)),
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.operators.last().is_some_and(|sink| sink.is_finished())
    }

    fn find_blocking_dependency(&self) -> Result<Option<DependencyHandle>> {
        for op in &self.operators {
            if op.is_finished() {
                continue;
            }
            let dep = processor_ref(&**op)?.is_blocked()?;
            if !dep.is_ready() {
                return Ok(Some(dep));
            }
        }
        Ok(None)
    }

    /// Why a pass made no progress: the source has nothing yet or the sink is full.
    fn idle_reason(&self) -> Result<Option<BlockedReason>> {
        if let Some(source) = self.operators.first()
            && !source.is_finished()
            && !processor_ref(&**source)?.has_output()
        {
            return Ok(Some(BlockedReason::InputEmpty));
        }
        if let Some(sink) = self.operators.last()
            && !sink.is_finished()
            && !processor_ref(&**sink)?.need_input()
        {
            return Ok(Some(BlockedReason::OutputFull));
        }
        Ok(None)
    }

    fn block(&mut self, reason: BlockedReason) -> DriverState {
        if let BlockedReason::Dependency(dep) = &reason {
            debug!(
                "Driver blocked on dependency: driver_id={} dep_name={}",
                self.driver_id,
                dep.name()
            );
        }
        self.state = DriverState::Blocked(reason);
        self.state.clone()
    }

    fn finish_with_state(&mut self, state: DriverState) -> DriverState {
        match &state {
            DriverState::Finished => {
                debug!("Driver finished: driver_id={}", self.driver_id);
            }
            DriverState::Failed(err) => {
                warn!("Driver failed: driver_id={} error={}", self.driver_id, err);
                self.runtime_state.set_error(err.clone());
            }
            _ => {}
        }
        self.close_operators();
        self.state = state;
        self.state.clone()
    }

    fn close_operators(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.edge_pages.iter_mut().for_each(|page| *page = None);
        for op in self.operators.iter_mut() {
            if let Err(err) = op.close() {
                warn!(
                    "Operator close failed: driver_id={} op_name={} error={}",
                    self.driver_id,
                    op.name(),
                    err
                );
            }
        }
    }

    fn drive_once(&mut self, made_progress: &mut bool) -> Result<()> {
        self.propagate_edge_closure(made_progress)?;
        self.drive_set_finishing(made_progress)?;
        self.drive_dataflow(made_progress)?;
        self.check_mem_limit()
    }

    fn check_mem_limit(&self) -> Result<()> {
        let tracker = self.runtime_state.mem_tracker();
        if tracker.limit_exceeded() {
            return Err(ExecError::MemLimitExceeded {
                label: tracker.label().to_string(),
                limit: tracker.limit(),
                current: tracker.current(),
            });
        }
        Ok(())
    }

    fn drive_dataflow(&mut self, made_progress: &mut bool) -> Result<()> {
        self.drive_push_edges(made_progress)?;
        self.drive_pull_edges(made_progress)?;
        self.drive_push_edges(made_progress)
    }

    fn drive_push_edges(&mut self, made_progress: &mut bool) -> Result<()> {
        for e in (0..self.edge_pages.len()).rev() {
            let downstream_idx = e + 1;
            let downstream = processor_mut(&mut self.operators[downstream_idx])?;
            if self.edge_pages[e].is_none() || !downstream.need_input() {
                continue;
            }
            let Some(mut page) = self.edge_pages[e].take() else {
                continue;
            };
            // Charge the page to whoever holds it now.
            page.transfer_to(&self.operator_mem_trackers[downstream_idx]);
            downstream.push_page(self.runtime_state.as_ref(), page)?;
            *made_progress = true;
        }
        Ok(())
    }

    fn drive_pull_edges(&mut self, made_progress: &mut bool) -> Result<()> {
        for e in 0..self.edge_pages.len() {
            if self.edge_pages[e].is_some() {
                continue;
            }
            let (left, right) = self.operators.split_at_mut(e + 1);
            let upstream = processor_mut(&mut left[e])?;
            let downstream = processor_mut(&mut right[0])?;
            if !upstream.has_output() || !downstream.need_input() {
                continue;
            }
            if let Some(mut page) = upstream.pull_page(self.runtime_state.as_ref())? {
                page.transfer_to(&self.operator_mem_trackers[e]);
                self.edge_pages[e] = Some(page);
                *made_progress = true;
            }
        }
        Ok(())
    }

    fn propagate_edge_closure(&mut self, made_progress: &mut bool) -> Result<()> {
        for e in 0..self.edge_pages.len() {
            if self.edge_closed[e] || self.edge_pages[e].is_some() {
                continue;
            }
            if self.operators[e].is_finished() {
                self.edge_closed[e] = true;
                debug!(
                    "Driver edge closed: driver_id={} edge={} upstream_op={}",
                    self.driver_id,
                    e,
                    self.operators[e].name()
                );
                *made_progress = true;
            }
        }
        Ok(())
    }

    fn drive_set_finishing(&mut self, made_progress: &mut bool) -> Result<()> {
        for idx in 1..self.operators.len() {
            let in_edge = idx - 1;
            if self.operator_finishing_set[idx]
                || !self.edge_closed[in_edge]
                || self.edge_pages[in_edge].is_some()
            {
                continue;
            }
            let op = &mut self.operators[idx];
            let name = op.name().to_string();
            processor_mut(op)?.set_finishing(self.runtime_state.as_ref())?;
            debug!(
                "Driver set_finishing: driver_id={} op_idx={} op_name={}",
                self.driver_id, idx, name
            );
            self.operator_finishing_set[idx] = true;
            *made_progress = true;
        }
        Ok(())
    }
}

impl Drop for PipelineDriver {
    fn drop(&mut self) {
        self.close_operators();
    }
}
