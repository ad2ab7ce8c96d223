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
//! Source that replays a fixed list of pages.
//!
//! Responsibilities:
//! - Emits pre-built pages in order, one per pull.
//! - Splits the pages round-robin across parallel drivers.
//!
//! Key exported interfaces:
//! - Types: `ValuesSourceFactory`.

use std::sync::Arc;

use crate::common::error::{ExecError, Result};
use crate::exec::block::TupleInfo;
use crate::exec::page::Page;
use crate::exec::pipeline::operator::{Operator, ProcessorOperator};
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::runtime::runtime_state::RuntimeState;

pub struct ValuesSourceFactory {
    name: String,
    pages: Arc<[Page]>,
}

impl ValuesSourceFactory {
    pub fn new(pages: Vec<Page>, node_id: i32) -> Self {
        let name = if node_id >= 0 {
            format!("ValuesSource (id={node_id})")
        } else {
            "ValuesSource".to_string()
        };
        Self {
            name,
            pages: pages.into(),
        }
    }
}

impl OperatorFactory for ValuesSourceFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, dop: i32, driver_id: i32) -> Box<dyn Operator> {
        let dop = dop.max(1) as usize;
        let driver_id = driver_id.max(0) as usize;
        let pages: Vec<Page> = self
            .pages
            .iter()
            .enumerate()
            .filter(|(idx, _)| idx % dop == driver_id)
            .map(|(_, page)| page.clone())
            .collect();
        Box::new(ValuesSourceOperator {
            name: self.name.clone(),
            pages,
            next: 0,
        })
    }

    fn is_source(&self) -> bool {
        true
    }
}

struct ValuesSourceOperator {
    name: String,
    pages: Vec<Page>,
    next: usize,
}

impl Operator for ValuesSourceOperator {
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
        self.next >= self.pages.len()
    }
}

impl ProcessorOperator for ValuesSourceOperator {
    fn need_input(&self) -> bool {
        false
    }

    fn has_output(&self) -> bool {
        !self.is_finished()
    }

    fn push_page(&mut self, _state: &RuntimeState, _page: Page) -> Result<()> {
        Err(ExecError::invalid_state(
            "values source operator does not accept input",
        ))
    }

    fn pull_page(&mut self, _state: &RuntimeState) -> Result<Option<Page>> {
        let page = self.pages.get(self.next).cloned();
        if page.is_some() {
            self.next += 1;
        }
        Ok(page)
    }

    fn set_finishing(&mut self, _state: &RuntimeState) -> Result<()> {
        Ok(())
    }

    fn output_tuple_infos(&self) -> Option<Vec<TupleInfo>> {
        self.pages.first().map(Page::tuple_infos)
    }
}
