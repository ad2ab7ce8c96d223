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
//! Named readiness dependencies.
//!
//! Responsibilities:
//! - Models the asynchronous handle an operator exposes while waiting on another pipeline.
//! - Lets a driver park on a dependency and be woken through waiter callbacks.
//!
//! Key exported interfaces:
//! - Types: `Dependency`, `DependencyHandle`, `DependencyManager`.
//! - Functions: `resolved_dependency`.
//!
//! A dependency only ever moves from waiting to ready. Whatever the waiter
//! should observe (a built set, a failure) is published before `set_ready`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::exec::pipeline::schedule::observer::{Observable, Observer};
use crate::novaprobe_logging::debug;

static NEXT_DEP_MANAGER_ID: AtomicUsize = AtomicUsize::new(1);
static NEXT_DEP_ID: AtomicUsize = AtomicUsize::new(1);
static RESOLVED: OnceLock<DependencyHandle> = OnceLock::new();

pub type DependencyHandle = Arc<Dependency>;

/// Shared handle that is ready from the start; returned by operators with
/// nothing outstanding.
pub fn resolved_dependency() -> DependencyHandle {
    Arc::clone(RESOLVED.get_or_init(|| {
        let dep = Dependency::new("resolved".to_string());
        dep.ready.store(true, Ordering::Release);
        Arc::new(dep)
    }))
}

pub struct Dependency {
    id: usize,
    name: String,
    ready: AtomicBool,
    observable: Arc<Observable>,
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Dependency {}

impl Dependency {
    pub fn new(name: String) -> Self {
        Self {
            id: NEXT_DEP_ID.fetch_add(1, Ordering::Relaxed),
            name,
            ready: AtomicBool::new(false),
            observable: Arc::new(Observable::new()),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Marks the dependency ready and wakes every waiter. Later calls are no-ops.
    pub fn set_ready(&self) {
        let prev = self.ready.swap(true, Ordering::AcqRel);
        if !prev {
            let notify = self.observable.defer_notify();
            notify.arm();
            debug!(
                "Dependency ready: dep_id={} name={} observers={}",
                self.id,
                self.name,
                self.observable.num_observers()
            );
        }
    }

    /// Runs `observer` once the dependency is ready; immediately if it already is.
    pub fn add_waiter(&self, observer: Observer) {
        if self.is_ready() {
            observer();
            return;
        }
        self.observable.add_observer(observer);
        debug!(
            "Dependency add_waiter: dep_id={} name={} observers_after={}",
            self.id,
            self.name,
            self.observable.num_observers()
        );
        // set_ready may have drained observers before ours was registered.
        if self.is_ready() {
            let notify = self.observable.defer_notify();
            notify.arm();
        }
    }
}

/// Name-keyed registry so a build side and its probes can agree on one handle.
#[derive(Clone)]
pub struct DependencyManager {
    id: usize,
    deps: Arc<Mutex<HashMap<String, DependencyHandle>>>,
}

impl DependencyManager {
    pub fn new() -> Self {
        Self {
            id: NEXT_DEP_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            deps: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn get_or_create(&self, name: impl Into<String>) -> DependencyHandle {
        let name = name.into();
        let mut guard = self.deps.lock().expect("dependency manager lock");
        guard
            .entry(name.clone())
            .or_insert_with(|| Arc::new(Dependency::new(name)))
            .clone()
    }

    pub fn mark_ready(&self, name: &str) {
        self.get_or_create(name).set_ready();
    }
}

impl Default for DependencyManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiter_runs_once_ready() {
        let manager = DependencyManager::new();
        let dep = manager.get_or_create("channel_set:1");
        let woke = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&woke);
        dep.add_waiter(Arc::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(!woke.load(Ordering::SeqCst));
        manager.mark_ready("channel_set:1");
        assert!(dep.is_ready());
        assert!(woke.load(Ordering::SeqCst));
    }

    #[test]
    fn same_name_yields_same_handle() {
        let manager = DependencyManager::new();
        let a = manager.get_or_create("channel_set:7");
        let b = manager.get_or_create("channel_set:7");
        assert_eq!(a, b);
        assert_ne!(a, manager.get_or_create("channel_set:8"));
    }

    #[test]
    fn resolved_dependency_is_ready_and_runs_waiters_inline() {
        let dep = resolved_dependency();
        assert!(dep.is_ready());
        let woke = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&woke);
        dep.add_waiter(Arc::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(woke.load(Ordering::SeqCst));
    }
}
