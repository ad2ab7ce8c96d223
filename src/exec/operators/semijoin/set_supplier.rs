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
//! Shared publication point for one channel set.
//!
//! Responsibilities:
//! - Publishes the built channel set (or the build failure) exactly once.
//! - Exposes the dependency probe operators wait on while the build runs.
//!
//! Key exported interfaces:
//! - Types: `SetSupplier`.

use std::sync::{Arc, Mutex};

use crate::check_argument;
use crate::common::error::{ExecError, Result};
use crate::exec::block::TupleInfo;
use crate::exec::hash_table::ChannelSet;
use crate::exec::pipeline::dependency::{DependencyHandle, DependencyManager};
use crate::novaprobe_logging::{info, warn};

/// Build result handed from the set builder pipeline to every probe operator.
pub struct SetSupplier {
    dep: DependencyHandle,
    tuple_info: TupleInfo,
    result: Mutex<Option<Result<Arc<ChannelSet>>>>,
}

impl SetSupplier {
    pub fn new(node_id: i32, tuple_info: TupleInfo, dep_manager: &DependencyManager) -> Self {
        let dep = dep_manager.get_or_create(format!("channel_set:{}", node_id));
        Self {
            dep,
            tuple_info,
            result: Mutex::new(None),
        }
    }

    pub fn dep(&self) -> DependencyHandle {
        Arc::clone(&self.dep)
    }

    pub fn dep_name(&self) -> &str {
        self.dep.name()
    }

    /// Schema of the values the published set holds.
    pub fn tuple_info(&self) -> &TupleInfo {
        &self.tuple_info
    }

    pub fn set_channel_set(&self, channel_set: Arc<ChannelSet>) -> Result<()> {
        check_argument!(
            channel_set.tuple_info() == &self.tuple_info,
            "channel set schema {} does not match supplier schema {}",
            channel_set.tuple_info(),
            self.tuple_info
        );
        {
            let mut guard = self.result.lock().expect("set supplier lock");
            if guard.is_some() {
                return Err(ExecError::invalid_state(format!(
                    "{} already published",
                    self.dep.name()
                )));
            }
            info!(
                "Channel set published: dep_name={} distinct={} contains_null={}",
                self.dep.name(),
                channel_set.size(),
                channel_set.contains_null()
            );
            *guard = Some(Ok(channel_set));
        }
        self.dep.set_ready();
        Ok(())
    }

    /// Resolves the dependency to a failure. Ignored when a result is already published.
    pub fn set_failed(&self, err: ExecError) {
        {
            let mut guard = self.result.lock().expect("set supplier lock");
            if guard.is_some() {
                return;
            }
            warn!(
                "Channel set build failed: dep_name={} error={}",
                self.dep.name(),
                err
            );
            *guard = Some(Err(ExecError::DependencyFailed {
                name: self.dep.name().to_string(),
                message: err.to_string(),
            }));
        }
        self.dep.set_ready();
    }

    /// The published result, or `None` while the build is still running.
    pub fn get(&self) -> Option<Result<Arc<ChannelSet>>> {
        let guard = self.result.lock().expect("set supplier lock");
        guard.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.dep.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::hash_table::ChannelSetBuilder;

    fn empty_set(info: TupleInfo) -> Arc<ChannelSet> {
        Arc::new(ChannelSetBuilder::new(info, 1).expect("builder").build())
    }

    #[test]
    fn publishes_exactly_once() {
        let supplier = SetSupplier::new(1, TupleInfo::single_long(), &DependencyManager::new());
        assert!(!supplier.is_ready());
        assert!(supplier.get().is_none());
        supplier
            .set_channel_set(empty_set(TupleInfo::single_long()))
            .expect("publish");
        assert!(supplier.is_ready());
        assert!(matches!(supplier.get(), Some(Ok(_))));
        assert!(matches!(
            supplier.set_channel_set(empty_set(TupleInfo::single_long())),
            Err(ExecError::InvalidState(_))
        ));
        supplier.set_failed(ExecError::invalid_state("late"));
        assert!(matches!(supplier.get(), Some(Ok(_))));
    }

    #[test]
    fn failure_resolves_the_dependency() {
        let supplier = SetSupplier::new(2, TupleInfo::single_long(), &DependencyManager::new());
        supplier.set_failed(ExecError::invalid_argument("bad build input"));
        assert!(supplier.is_ready());
        match supplier.get() {
            Some(Err(ExecError::DependencyFailed { name, message })) => {
                assert_eq!(name, "channel_set:2");
                assert!(message.contains("bad build input"), "message={message}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_set_of_other_schema() {
        let supplier = SetSupplier::new(3, TupleInfo::single_long(), &DependencyManager::new());
        assert!(matches!(
            supplier.set_channel_set(empty_set(TupleInfo::single_varbinary())),
            Err(ExecError::InvalidArgument(_))
        ));
        assert!(!supplier.is_ready());
    }
}
