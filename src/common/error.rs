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
//! Execution error taxonomy.
//!
//! Responsibilities:
//! - Classifies failures raised by blocks, cursors, channel sets and operators.
//! - Separates caller contract violations from cursor exhaustion and build-side failures.
//!
//! Key exported interfaces:
//! - Types: `ExecError`, `Result`.
//!
//! Null-valued data never produces an error; only malformed wiring does.

use thiserror::Error;

/// Failure raised synchronously by the execution core.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExecError {
    /// Caller passed an argument that violates a precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Call is not legal in the object's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A cursor was advanced or read past its last position or value.
    #[error("end of data: {0}")]
    EndOfData(String),

    /// A cursor was read before its first advance.
    #[error("cursor has not been advanced")]
    CursorNotAdvanced,

    /// Logical memory charged to a pipeline went over its configured limit.
    #[error("memory limit exceeded: tracker={label} limit={limit} current={current}")]
    MemLimitExceeded { label: String, limit: i64, current: i64 },

    /// The asynchronous build side resolved to a failure.
    #[error("dependency {name} failed: {message}")]
    DependencyFailed { name: String, message: String },
}

impl ExecError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn end_of_data(msg: impl Into<String>) -> Self {
        Self::EndOfData(msg.into())
    }

    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Self::EndOfData(_))
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;

/// Returns `InvalidArgument` with the formatted message when the condition is false.
#[macro_export]
macro_rules! check_argument {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::common::error::ExecError::InvalidArgument(format!($($arg)+)));
        }
    };
}

/// Returns `InvalidState` with the formatted message when the condition is false.
#[macro_export]
macro_rules! check_state {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::common::error::ExecError::InvalidState(format!($($arg)+)));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guarded(value: i64) -> Result<i64> {
        check_argument!(value >= 0, "value {} is negative", value);
        check_state!(value != 7, "value {} is reserved", value);
        Ok(value)
    }

    #[test]
    fn check_macros_pick_variant() {
        assert_eq!(guarded(3), Ok(3));
        assert_eq!(
            guarded(-1),
            Err(ExecError::InvalidArgument("value -1 is negative".to_string()))
        );
        assert!(matches!(guarded(7), Err(ExecError::InvalidState(_))));
    }

    #[test]
    fn end_of_data_is_distinct_from_not_advanced() {
        assert!(ExecError::end_of_data("x").is_end_of_data());
        assert!(!ExecError::CursorNotAdvanced.is_end_of_data());
        assert_eq!(
            ExecError::CursorNotAdvanced.to_string(),
            "cursor has not been advanced"
        );
    }
}
