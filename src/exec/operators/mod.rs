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
//! Execution operator module exports.
//!
//! Responsibilities:
//! - Provides the operator factories a pipeline is assembled from.
//! - Keeps concrete operator types private behind their factories.

mod collect_sink;
pub mod semijoin;
mod values_source;

pub use collect_sink::CollectSinkFactory;
pub use semijoin::{HashSemiJoinProcessorFactory, SetBuilderSinkFactory, SetSupplier};
pub use values_source::ValuesSourceFactory;
