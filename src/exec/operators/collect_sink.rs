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
//! Sink that keeps every page it receives.
//!
//! Responsibilities:
//! - Terminates a pipeline and hands its output back to the caller.
//!
//! Key exported interfaces:
//! - Types: `CollectSinkFactory`.

use std::sync::{Arc, Mutex};

use crate::common::error::{ExecError, Result};
use crate::exec::page::Page;
use crate::exec::pipeline::operator::{Operator, ProcessorOperator};
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::runtime::runtime_state::RuntimeState;

/// Pages are collected per driver and returned in driver order.
pub struct CollectSinkFactory {
    name: String,
    collected: Arc<Mutex<Vec<(i32, Vec<Page>)>>>,
}

impl CollectSinkFactory {
    pub fn new() -> Self {
        Self {
            name: "CollectSink".to_string(),
            collected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every page delivered so far, grouped by driver id and in arrival order within a driver.
    pub fn pages(&self) -> Vec<Page> {
        let mut guard = self.collected.lock().expect("collect sink lock");
        guard.sort_by_key(|(driver_id, _)| *driver_id);
        guard
            .iter()
            .flat_map(|(_, pages)| pages.iter().cloned())
            .collect()
    }
}

impl Default for CollectSinkFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorFactory for CollectSinkFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, _dop: i32, driver_id: i32) -> Box<dyn Operator> {
        Box::new(CollectSinkOperator {
            name: self.name.clone(),
            driver_id,
            collected: Arc::clone(&self.collected),
            pages: Vec::new(),
            finishing: false,
        })
    }

    fn is_sink(&self) -> bool {
        true
    }
}

struct CollectSinkOperator {
    name: String,
    driver_id: i32,
    collected: Arc<Mutex<Vec<(i32, Vec<Page>)>>>,
    pages: Vec<Page>,
    finishing: bool,
}

impl Operator for CollectSinkOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_finished(&self) -> bool {
        self.finishing
    }

    fn as_processor_mut(&mut self) -> Option<&mut dyn ProcessorOperator> {
        Some(self)
    }

    fn as_processor_ref(&self) -> Option<&dyn ProcessorOperator> {
        Some(self)
    }
}

impl ProcessorOperator for CollectSinkOperator {
    fn need_input(&self) -> bool {
        !self.finishing
    }

    fn has_output(&self) -> bool {
        false
    }

    fn push_page(&mut self, _state: &RuntimeState, page: Page) -> Result<()> {
        if self.finishing {
            return Err(ExecError::invalid_state(format!(
                "{} received input after finishing",
                self.name
            )));
        }
        self.pages.push(page);
        Ok(())
    }

    fn pull_page(&mut self, _state: &RuntimeState) -> Result<Option<Page>> {
        Ok(None)
    }

    /// Publishes this driver's pages to the factory.
    fn set_finishing(&mut self, _state: &RuntimeState) -> Result<()> {
        if self.finishing {
            return Ok(());
        }
        self.finishing = true;
        let pages = std::mem::take(&mut self.pages);
        self.collected
            .lock()
            .expect("collect sink lock")
            .push((self.driver_id, pages));
        Ok(())
    }
}
