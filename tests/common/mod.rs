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
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;
use tempfile::TempDir;

use novaprobe::exec::block::{Block, BlockBuilder, TupleInfo};
use novaprobe::exec::page::Page;
use novaprobe::exec::pipeline::dependency::DependencyHandle;
use novaprobe::exec::pipeline::driver::{DriverState, PipelineDriver};
use novaprobe::exec::pipeline::operator::BlockedReason;
use novaprobe::novaprobe_config;
use novaprobe::novaprobe_logging;

pub struct TestConfig {
    /// Temporary directory for test artifacts
    pub temp_dir: TempDir,
    /// Test config path
    pub config_path: PathBuf,
}

impl TestConfig {
    /// Create a new test configuration with a small set hint and a short time slice.
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("test_novaprobe.toml");

        let config_content = r#"
log_level = "info"
log_filter = "novaprobe=debug"

[runtime]
expected_set_positions = 16
driver_time_slice_ms = 20
mem_limit_bytes = 1048576
"#;

        std::fs::write(&config_path, config_content)?;

        Ok(Self {
            temp_dir,
            config_path,
        })
    }

    /// Initialize logging for tests.
    pub fn init_logging(&self) {
        novaprobe_logging::init_with_level("debug");
    }

    /// Load the test configuration.
    pub fn load_config(&self) -> anyhow::Result<&'static novaprobe_config::NovaProbeConfig> {
        novaprobe_config::init_from_path(&self.config_path)
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new().expect("Failed to create test config")
    }
}

pub fn wait_for<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

pub fn run_with_timeout<F, T>(timeout: Duration, f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });

    match rx.recv_timeout(timeout) {
        Ok(v) => v,
        Err(_) => panic!("test timed out after {:?}", timeout),
    }
}

/// Parks the calling thread until `dep` is ready, using a waiter callback.
pub fn wait_dependency(dep: &DependencyHandle, timeout: Duration) -> bool {
    let (tx, rx) = mpsc::channel();
    dep.add_waiter(Arc::new(move || {
        let _ = tx.send(());
    }));
    rx.recv_timeout(timeout).is_ok()
}

/// Drives `driver` until it finishes or fails, parking on dependencies in between.
pub fn drive_to_end(driver: &mut PipelineDriver, timeout: Duration) -> DriverState {
    let start = std::time::Instant::now();
    loop {
        assert!(start.elapsed() < timeout, "driver did not finish in {:?}", timeout);
        match driver.process_slice() {
            DriverState::Blocked(BlockedReason::Dependency(dep)) => {
                assert!(
                    wait_dependency(&dep, timeout),
                    "dependency {} never resolved",
                    dep.name()
                );
            }
            state if state.is_terminal() => return state,
            _ => std::thread::yield_now(),
        }
    }
}

pub fn varchar_block(values: &[Option<&str>]) -> Block {
    let mut builder = BlockBuilder::new(TupleInfo::single_varbinary(), values.len() * 8);
    for v in values {
        match v {
            Some(v) => builder.append_str(v).expect("append"),
            None => builder.append_null().expect("append"),
        }
    }
    builder.build().expect("build")
}

pub fn long_block(values: &[Option<i64>]) -> Block {
    let mut builder = BlockBuilder::with_positions(TupleInfo::single_long(), values.len());
    for v in values {
        match v {
            Some(v) => builder.append_long(*v).expect("append"),
            None => builder.append_null().expect("append"),
        }
    }
    builder.build().expect("build")
}

/// Decodes a single-boolean block into three-valued results.
pub fn booleans(block: &Block) -> Vec<Option<bool>> {
    let mut cursor = block.cursor();
    let mut out = Vec::new();
    while cursor.has_next_position() {
        cursor.advance_next_position().expect("advance");
        if cursor.is_null(0).expect("null check") {
            out.push(None);
        } else {
            out.push(Some(cursor.get_boolean(0).expect("boolean")));
        }
    }
    out
}

/// The membership column appended as the last channel of `page`.
pub fn membership(page: &Page) -> Vec<Option<bool>> {
    booleans(page.block(page.channel_count() - 1).expect("last channel"))
}

pub fn strings(block: &Block) -> Vec<Option<String>> {
    let mut cursor = block.cursor();
    let mut out = Vec::new();
    while cursor.has_next_position() {
        cursor.advance_next_position().expect("advance");
        if cursor.is_null(0).expect("null check") {
            out.push(None);
        } else {
            let bytes = cursor.get_slice(0).expect("slice");
            out.push(Some(String::from_utf8_lossy(bytes).into_owned()));
        }
    }
    out
}

pub fn long_values(block: &Block) -> Vec<i64> {
    let mut cursor = block.cursor();
    let mut out = Vec::new();
    while cursor.has_next_position() {
        cursor.advance_next_position().expect("advance");
        out.push(cursor.get_long(0).expect("long"));
    }
    out
}

#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
}
