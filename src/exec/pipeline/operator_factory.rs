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
//! Factories that stamp out operators for each driver of a pipeline.

use super::operator::Operator;

pub trait OperatorFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Operator for driver `driver_id` of `dop` parallel drivers.
    fn create(&self, dop: i32, driver_id: i32) -> Box<dyn Operator>;

    /// One operator per driver, in driver order.
    fn create_for_drivers(&self, dop: i32) -> Vec<Box<dyn Operator>> {
        let dop = dop.max(1);
        (0..dop).map(|driver_id| self.create(dop, driver_id)).collect()
    }

    fn is_source(&self) -> bool {
        false
    }

    fn is_sink(&self) -> bool {
        false
    }
}
