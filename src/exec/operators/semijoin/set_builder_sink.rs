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
//! Sink that builds a channel set from one build-side channel.
//!
//! Responsibilities:
//! - Feeds the build channel of every input page into one shared channel set builder.
//! - Publishes the finished set through `SetSupplier` once all `dop` drivers have finished,
//!   however late their operators are created.
//!
//! Key exported interfaces:
//! - Types: `SetBuilderSinkFactory`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::set_supplier::SetSupplier;
use crate::common::error::{ExecError, Result};
use crate::exec::hash_table::ChannelSetBuilder;
use crate::exec::page::Page;
use crate::exec::pipeline::operator::{Operator, ProcessorOperator};
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::novaprobe_logging::debug;
use crate::runtime::mem_tracker::MemTracker;
use crate::runtime::runtime_state::RuntimeState;

/// Build state shared by every driver of the build pipeline.
struct SharedSetBuild {
    builder: Mutex<Option<ChannelSetBuilder>>,
    /// Driver count of the build pipeline, fixed by the first `create`.
    expected_drivers: AtomicUsize,
    finished: AtomicUsize,
}

pub struct SetBuilderSinkFactory {
    name: String,
    supplier: Arc<SetSupplier>,
    build_channel: usize,
    shared: Arc<SharedSetBuild>,
}

impl SetBuilderSinkFactory {
    pub fn try_new(
        node_id: i32,
        supplier: Arc<SetSupplier>,
        build_channel: usize,
        expected_positions: usize,
    ) -> Result<Self> {
        let builder = ChannelSetBuilder::new(supplier.tuple_info().clone(), expected_positions)?;
        Ok(Self {
            name: format!("SetBuilderSink (id={node_id})"),
            supplier,
            build_channel,
            shared: Arc::new(SharedSetBuild {
                builder: Mutex::new(Some(builder)),
                expected_drivers: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            }),
        })
    }
}

impl OperatorFactory for SetBuilderSinkFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, dop: i32, driver_id: i32) -> Box<dyn Operator> {
        let dop = usize::try_from(dop).unwrap_or(0).max(1);
        if let Err(expected) = self.shared.expected_drivers.compare_exchange(
            0,
            dop,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) && expected != dop
        {
            self.supplier.set_failed(ExecError::invalid_argument(format!(
                "{} created with dop {} after dop {}",
                self.name, dop, expected
            )));
        }
        Box::new(SetBuilderSinkOperator {
            name: self.name.clone(),
            driver_id,
            supplier: Arc::clone(&self.supplier),
            build_channel: self.build_channel,
            shared: Arc::clone(&self.shared),
            mem_tracker: None,
            finished: false,
        })
    }

    fn is_sink(&self) -> bool {
        true
    }
}

struct SetBuilderSinkOperator {
    name: String,
    driver_id: i32,
    supplier: Arc<SetSupplier>,
    build_channel: usize,
    shared: Arc<SharedSetBuild>,
    mem_tracker: Option<Arc<MemTracker>>,
    finished: bool,
}

impl SetBuilderSinkOperator {
    fn add_page(&self, page: &Page) -> Result<()> {
        let mut guard = self.shared.builder.lock().expect("set builder lock");
        let builder = guard
            .as_mut()
            .ok_or_else(|| ExecError::invalid_state("channel set already built"))?;
        builder.add_page(page, self.build_channel)
    }

    /// Builds and publishes once all `dop` drivers have finished.
    fn finish_build(&self) -> Result<()> {
        let finished = self.shared.finished.fetch_add(1, Ordering::AcqRel) + 1;
        let expected = self.shared.expected_drivers.load(Ordering::Acquire);
        if finished < expected {
            debug!(
                "Set builder driver done: name={} driver_id={} finished={}/{}",
                self.name, self.driver_id, finished, expected
            );
            return Ok(());
        }
        let mut builder = self
            .shared
            .builder
            .lock()
            .expect("set builder lock")
            .take()
            .ok_or_else(|| ExecError::invalid_state("channel set already built"))?;
        if let Some(tracker) = self.mem_tracker.as_ref() {
            builder.set_mem_tracker(Arc::clone(tracker));
        }
        self.supplier.set_channel_set(Arc::new(builder.build()))
    }

    fn fail(&self, err: ExecError) -> ExecError {
        self.supplier.set_failed(err.clone());
        err
    }
}

impl Operator for SetBuilderSinkOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_mem_tracker(&mut self, tracker: Arc<MemTracker>) {
        self.mem_tracker = Some(tracker);
    }

    fn as_processor_mut(&mut self) -> Option<&mut dyn ProcessorOperator> {
        Some(self)
    }

    fn as_processor_ref(&self) -> Option<&dyn ProcessorOperator> {
        Some(self)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

impl ProcessorOperator for SetBuilderSinkOperator {
    fn need_input(&self) -> bool {
        !self.finished
    }

    fn has_output(&self) -> bool {
        false
    }

    fn push_page(&mut self, _state: &RuntimeState, page: Page) -> Result<()> {
        if self.finished {
            return Err(ExecError::invalid_state(format!(
                "{} received input after finishing",
                self.name
            )));
        }
        self.add_page(&page).map_err(|err| self.fail(err))
    }

    fn pull_page(&mut self, _state: &RuntimeState) -> Result<Option<Page>> {
        Ok(None)
    }

    fn set_finishing(&mut self, _state: &RuntimeState) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.finish_build().map_err(|err| self.fail(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::block::{Block, RleBlock, Tuple, TupleInfo};
    use crate::exec::pipeline::dependency::DependencyManager;

    fn page_of(value: &str) -> Page {
        let block: Block = RleBlock::try_new(Tuple::string(value), 0, 0)
            .expect("rle")
            .into();
        Page::try_new(vec![block]).expect("page")
    }

    #[test]
    fn publishes_only_after_every_driver_finishes() {
        let supplier = Arc::new(SetSupplier::new(
            3,
            TupleInfo::single_varbinary(),
            &DependencyManager::new(),
        ));
        let factory =
            SetBuilderSinkFactory::try_new(3, Arc::clone(&supplier), 0, 8).expect("factory");
        let state = RuntimeState::default();

        // Driver 0 runs to completion before driver 1's operator exists.
        let mut first = factory.create(2, 0);
        let first = first.as_processor_mut().expect("processor");
        first.push_page(&state, page_of("apple")).expect("push");
        first.set_finishing(&state).expect("finish");
        assert!(!supplier.is_ready());

        let mut second = factory.create(2, 1);
        let second = second.as_processor_mut().expect("processor");
        second.push_page(&state, page_of("banana")).expect("push");
        second.set_finishing(&state).expect("finish");
        let set = supplier.get().expect("published").expect("built");
        assert_eq!(set.size(), 2);
        assert!(set.contains_value(Tuple::string("apple").view()).expect("lookup"));
        assert!(set.contains_value(Tuple::string("banana").view()).expect("lookup"));
    }

    #[test]
    fn mismatched_dop_fails_the_build() {
        let supplier = Arc::new(SetSupplier::new(
            4,
            TupleInfo::single_varbinary(),
            &DependencyManager::new(),
        ));
        let factory =
            SetBuilderSinkFactory::try_new(4, Arc::clone(&supplier), 0, 8).expect("factory");
        let _first = factory.create(2, 0);
        let _second = factory.create(3, 1);
        let Some(Err(ExecError::DependencyFailed { message, .. })) = supplier.get() else {
            panic!("expected a failed build");
        };
        assert!(message.contains("dop 3 after dop 2"), "message={message}");
    }
}
