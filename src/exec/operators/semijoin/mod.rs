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
//! Hash semi-join operators.
//!
//! Responsibilities:
//! - Builds a channel set from the build side and publishes it to probe operators.
//! - Tags every probe row with its three-valued membership in that set.
//!
//! Key exported interfaces:
//! - Types: `SetSupplier`, `SetBuilderSinkFactory`, `HashSemiJoinProcessorFactory`.

mod hash_semi_join_processor;
mod set_builder_sink;
mod set_supplier;

pub use hash_semi_join_processor::HashSemiJoinProcessorFactory;
pub use set_builder_sink::SetBuilderSinkFactory;
pub use set_supplier::SetSupplier;
