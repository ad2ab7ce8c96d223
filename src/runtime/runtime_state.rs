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
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::common::app_config::RuntimeConfig;
use crate::common::error::ExecError;
use crate::runtime::mem_tracker::MemTracker;

/// Per-pipeline execution context handed to every operator call.
///
/// Carries the channel set capacity hint, the driver time slice and the root memory
/// tracker. The first error recorded wins and stays visible to every driver
/// sharing this state.
#[derive(Debug, Clone)]
pub struct RuntimeState {
    expected_set_positions: usize,
    time_slice: Duration,
    mem_tracker: Arc<MemTracker>,
    error_state: Arc<RuntimeErrorState>,
}

#[derive(Debug, Default)]
pub struct RuntimeErrorState {
    error: Mutex<Option<ExecError>>,
}

impl RuntimeErrorState {
    pub fn set_error(&self, err: ExecError) {
        let mut guard = self.error.lock().expect("runtime error lock");
        if guard.is_none() {
            *guard = Some(err);
        }
    }

    pub fn error(&self) -> Option<ExecError> {
        self.error.lock().expect("runtime error lock").clone()
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl RuntimeState {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            expected_set_positions: config.expected_set_positions,
            time_slice: Duration::from_millis(config.driver_time_slice_ms.max(1)),
            mem_tracker: MemTracker::new_root_with_limit("pipeline", config.mem_limit_bytes),
            error_state: Arc::new(RuntimeErrorState::default()),
        }
    }

    pub fn expected_set_positions(&self) -> usize {
        self.expected_set_positions
    }

    pub fn time_slice(&self) -> Duration {
        self.time_slice
    }

    pub fn mem_tracker(&self) -> &Arc<MemTracker> {
        &self.mem_tracker
    }

    pub fn set_error(&self, err: ExecError) {
        self.error_state.set_error(err);
    }

    pub fn error(&self) -> Option<ExecError> {
        self.error_state.error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_wins_across_clones() {
        let state = RuntimeState::default();
        let shared = state.clone();
        shared.set_error(ExecError::invalid_state("first"));
        state.set_error(ExecError::invalid_state("second"));
        assert_eq!(state.error(), Some(ExecError::invalid_state("first")));
    }

    #[test]
    fn built_from_runtime_config() {
        let config = RuntimeConfig {
            expected_set_positions: 64,
            driver_time_slice_ms: 5,
            mem_limit_bytes: 1024,
        };
        let state = RuntimeState::from_config(&config);
        assert_eq!(state.expected_set_positions(), 64);
        assert_eq!(state.time_slice(), Duration::from_millis(5));
        assert_eq!(state.mem_tracker().limit(), 1024);
    }
}
