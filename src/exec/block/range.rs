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
use std::fmt;

use crate::check_argument;
use crate::common::error::Result;

/// Closed position range `[start, end]` covered by one block.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    start: u64,
    end: u64,
}

impl Range {
    /// Fails with `InvalidArgument` when `start > end`, or when the position count
    /// does not fit a `usize`; empty ranges are not representable.
    pub fn try_new(start: u64, end: u64) -> Result<Self> {
        check_argument!(
            start <= end,
            "range start {} is greater than end {}",
            start,
            end
        );
        let length = (end - start)
            .checked_add(1)
            .and_then(|n| usize::try_from(n).ok());
        check_argument!(
            length.is_some(),
            "range [{}..{}] has more positions than a block can address",
            start,
            end
        );
        Ok(Self { start, end })
    }

    /// Range of `count` positions beginning at `start`, or `None` when `count` is zero.
    pub fn with_length(start: u64, count: usize) -> Option<Self> {
        let count = u64::try_from(count).ok()?;
        let end = start.checked_add(count.checked_sub(1)?)?;
        Some(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position <= self.end
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ExecError;

    #[test]
    fn single_position_range() {
        let range = Range::try_new(30, 30).expect("range");
        assert_eq!(range.length(), 1);
        assert!(range.contains(30));
        assert!(!range.contains(31));
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(matches!(
            Range::try_new(5, 4),
            Err(ExecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn full_u64_span_is_rejected() {
        assert!(matches!(
            Range::try_new(0, u64::MAX),
            Err(ExecError::InvalidArgument(_))
        ));
        let widest = Range::try_new(1, u64::MAX).expect("range");
        assert_eq!(widest.length(), u64::MAX);
    }

    #[test]
    fn with_length_skips_empty() {
        assert_eq!(Range::with_length(0, 0), None);
        assert_eq!(Range::with_length(5, 3), Some(Range::try_new(5, 7).expect("range")));
    }

    #[test]
    fn overlap_detection() {
        let a = Range::try_new(0, 4).expect("range");
        let b = Range::try_new(4, 9).expect("range");
        let c = Range::try_new(5, 9).expect("range");
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
