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
use super::range::Range;
use super::tuple::{Tuple, TupleView};
use super::tuple_info::TupleInfo;
use crate::common::error::Result;

/// One tuple repeated over every position of a closed range.
#[derive(Clone, Debug)]
pub struct RleBlock {
    value: Tuple,
    range: Range,
}

impl RleBlock {
    pub fn new(value: Tuple, range: Range) -> Self {
        Self { value, range }
    }

    pub fn try_new(value: Tuple, start: u64, end: u64) -> Result<Self> {
        Ok(Self::new(value, Range::try_new(start, end)?))
    }

    pub fn tuple_info(&self) -> &TupleInfo {
        self.value.tuple_info()
    }

    pub fn value(&self) -> &Tuple {
        &self.value
    }

    pub fn value_view(&self) -> TupleView<'_> {
        self.value.view()
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn position_count(&self) -> usize {
        usize::try_from(self.range.length()).unwrap_or(usize::MAX)
    }

    pub fn memory_size(&self) -> usize {
        self.value.as_slice().len()
    }
}
