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
//! Single encoded tuples.
//!
//! Responsibilities:
//! - Owns one encoded tuple (the repeated value of a run-length block, test literals).
//! - Provides the field-by-field encoder shared with the block builder.
//!
//! Key exported interfaces:
//! - Types: `Tuple`, `TupleView`, `TupleBuilder`.

use std::fmt;

use arrow_buffer::Buffer;

use super::tuple_info::{FieldType, TupleInfo};
use crate::check_state;
use crate::common::error::{ExecError, Result};

/// Owned, immutable tuple with its schema. Cloning shares the backing buffer.
#[derive(Clone)]
pub struct Tuple {
    info: TupleInfo,
    bytes: Buffer,
}

impl Tuple {
    /// Wraps already-encoded bytes; the caller guarantees they follow `info`'s layout.
    pub(crate) fn from_encoded(info: TupleInfo, bytes: Buffer) -> Self {
        Self { info, bytes }
    }

    pub fn builder(info: TupleInfo) -> TupleBuilder {
        TupleBuilder {
            writer: TupleWriter::new(info),
            error: None,
        }
    }

    pub fn string(value: &str) -> Self {
        Self::bytes(value.as_bytes())
    }

    /// Values longer than `u32::MAX` bytes cannot be length-prefixed and become null.
    pub fn bytes(value: &[u8]) -> Self {
        Self::single(TupleInfo::single_varbinary(), |w| w.append_slice(value))
    }

    pub fn long(value: i64) -> Self {
        Self::single(TupleInfo::single_long(), |w| w.append_long(value))
    }

    pub fn double(value: f64) -> Self {
        Self::single(TupleInfo::single_double(), |w| w.append_double(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::single(TupleInfo::single_boolean(), |w| w.append_boolean(value))
    }

    /// Tuple whose every field is null.
    pub fn null(info: TupleInfo) -> Self {
        let mut writer = TupleWriter::new(info.clone());
        for _ in 0..info.field_count() {
            writer.append_null();
        }
        Self::from_encoded(info, Buffer::from_vec(writer.take()))
    }

    fn single(info: TupleInfo, write: impl FnOnce(&mut TupleWriter) -> Result<()>) -> Self {
        let mut writer = TupleWriter::new(info.clone());
        if write(&mut writer).is_err() {
            writer.reset();
            writer.append_null();
        }
        Self::from_encoded(info, Buffer::from_vec(writer.take()))
    }

    pub fn tuple_info(&self) -> &TupleInfo {
        &self.info
    }

    pub fn as_slice(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    pub(crate) fn buffer(&self) -> &Buffer {
        &self.bytes
    }

    pub fn view(&self) -> TupleView<'_> {
        TupleView::new(&self.info, self.bytes.as_slice())
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info && self.info.tuple_equals(self.as_slice(), other.as_slice())
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.view(), f)
    }
}

/// Borrowed tuple: a schema plus the encoded bytes of one tuple.
#[derive(Clone, Copy)]
pub struct TupleView<'a> {
    info: &'a TupleInfo,
    bytes: &'a [u8],
}

impl<'a> TupleView<'a> {
    pub(crate) fn new(info: &'a TupleInfo, bytes: &'a [u8]) -> Self {
        Self { info, bytes }
    }

    pub fn tuple_info(&self) -> &'a TupleInfo {
        self.info
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn is_null(&self, field: usize) -> Result<bool> {
        self.info.is_null(self.bytes, field)
    }

    pub fn get_boolean(&self, field: usize) -> Result<bool> {
        self.info.get_boolean(self.bytes, field)
    }

    pub fn get_long(&self, field: usize) -> Result<i64> {
        self.info.get_long(self.bytes, field)
    }

    pub fn get_double(&self, field: usize) -> Result<f64> {
        self.info.get_double(self.bytes, field)
    }

    pub fn get_slice(&self, field: usize) -> Result<&'a [u8]> {
        self.info.get_slice(self.bytes, field)
    }

    pub fn to_tuple(&self) -> Tuple {
        Tuple::from_encoded(self.info.clone(), Buffer::from(self.bytes))
    }
}

impl fmt::Debug for TupleView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (field, t) in self.info.types().iter().enumerate() {
            if self.is_null(field).unwrap_or(true) {
                list.entry(&"NULL");
                continue;
            }
            match t {
                FieldType::Boolean => list.entry(&self.get_boolean(field).ok()),
                FieldType::FixedInt64 => list.entry(&self.get_long(field).ok()),
                FieldType::Double => list.entry(&self.get_double(field).ok()),
                FieldType::VariableBinary => list.entry(
                    &self
                        .get_slice(field)
                        .map(|s| String::from_utf8_lossy(s).into_owned())
                        .ok(),
                ),
            };
        }
        list.finish()
    }
}

/// Chainable tuple builder; the first failed append is reported by `build`.
pub struct TupleBuilder {
    writer: TupleWriter,
    error: Option<ExecError>,
}

impl TupleBuilder {
    fn record(mut self, result: Result<()>) -> Self {
        if let Err(err) = result
            && self.error.is_none()
        {
            self.error = Some(err);
        }
        self
    }

    pub fn append_null(mut self) -> Self {
        self.writer.append_null();
        self
    }

    pub fn append_boolean(mut self, value: bool) -> Self {
        let result = self.writer.append_boolean(value);
        self.record(result)
    }

    pub fn append_long(mut self, value: i64) -> Self {
        let result = self.writer.append_long(value);
        self.record(result)
    }

    pub fn append_double(mut self, value: f64) -> Self {
        let result = self.writer.append_double(value);
        self.record(result)
    }

    pub fn append_slice(mut self, value: &[u8]) -> Self {
        let result = self.writer.append_slice(value);
        self.record(result)
    }

    pub fn append_str(self, value: &str) -> Self {
        self.append_slice(value.as_bytes())
    }

    pub fn build(mut self) -> Result<Tuple> {
        if let Some(err) = self.error {
            return Err(err);
        }
        check_state!(
            self.writer.is_complete(),
            "tuple is incomplete: {} of {} fields written",
            self.writer.field,
            self.writer.info.field_count()
        );
        let info = self.writer.info.clone();
        Ok(Tuple::from_encoded(info, Buffer::from_vec(self.writer.take())))
    }
}

/// Field-by-field encoder for one tuple at a time.
pub(crate) struct TupleWriter {
    info: TupleInfo,
    buf: Vec<u8>,
    field: usize,
}

impl TupleWriter {
    pub(crate) fn new(info: TupleInfo) -> Self {
        let header = info.null_bitmap_len();
        Self {
            buf: vec![0u8; header],
            info,
            field: 0,
        }
    }

    pub(crate) fn in_progress(&self) -> bool {
        self.field > 0
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.field == self.info.field_count()
    }

    pub(crate) fn fields_written(&self) -> usize {
        self.field
    }

    fn next_field(&self, expected: FieldType) -> Result<()> {
        let count = self.info.field_count();
        check_state!(
            self.field < count,
            "tuple already has all {} fields written",
            count
        );
        let actual = self.info.types()[self.field];
        if actual != expected {
            return Err(ExecError::invalid_argument(format!(
                "field {} is {}, cannot append {}",
                self.field, actual, expected
            )));
        }
        Ok(())
    }

    /// Appends null for the next field. Appending past the last field is ignored.
    pub(crate) fn append_null(&mut self) {
        let Some(field_type) = self.info.types().get(self.field).copied() else {
            return;
        };
        self.buf[self.field / 8] |= 1u8 << (self.field % 8);
        match field_type.fixed_size() {
            Some(width) => self.buf.resize(self.buf.len() + width, 0),
            None => self.buf.extend_from_slice(&0u32.to_le_bytes()),
        }
        self.field += 1;
    }

    pub(crate) fn append_boolean(&mut self, value: bool) -> Result<()> {
        self.next_field(FieldType::Boolean)?;
        self.buf.push(u8::from(value));
        self.field += 1;
        Ok(())
    }

    pub(crate) fn append_long(&mut self, value: i64) -> Result<()> {
        self.next_field(FieldType::FixedInt64)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        self.field += 1;
        Ok(())
    }

    pub(crate) fn append_double(&mut self, value: f64) -> Result<()> {
        self.next_field(FieldType::Double)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        self.field += 1;
        Ok(())
    }

    pub(crate) fn append_slice(&mut self, value: &[u8]) -> Result<()> {
        self.next_field(FieldType::VariableBinary)?;
        let len = u32::try_from(value.len()).map_err(|_| {
            ExecError::invalid_argument(format!(
                "binary value of {} bytes exceeds u32 length prefix",
                value.len()
            ))
        })?;
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(value);
        self.field += 1;
        Ok(())
    }

    /// Bytes of the tuple written so far; resets for the next tuple.
    pub(crate) fn take(&mut self) -> Vec<u8> {
        let header = self.info.null_bitmap_len();
        self.field = 0;
        std::mem::replace(&mut self.buf, vec![0u8; header])
    }

    pub(crate) fn encoded(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn reset(&mut self) {
        let header = self.info.null_bitmap_len();
        self.buf.clear();
        self.buf.resize(header, 0);
        self.field = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_constructors_round_trip_values() {
        assert_eq!(Tuple::string("apple").view().get_slice(0), Ok(&b"apple"[..]));
        assert_eq!(Tuple::long(-5).view().get_long(0), Ok(-5));
        assert_eq!(Tuple::boolean(true).view().get_boolean(0), Ok(true));
        assert_eq!(Tuple::double(1.5).view().get_double(0), Ok(1.5));
    }

    #[test]
    fn null_tuple_sets_every_flag() {
        let info = TupleInfo::try_new(vec![FieldType::Boolean, FieldType::VariableBinary])
            .expect("tuple info");
        let tuple = Tuple::null(info);
        assert_eq!(tuple.view().is_null(0), Ok(true));
        assert_eq!(tuple.view().is_null(1), Ok(true));
        assert_eq!(tuple.as_slice().len(), 1 + 1 + 4);
    }

    #[test]
    fn builder_reports_type_mismatch_and_incomplete_tuples() {
        let err = Tuple::builder(TupleInfo::single_long())
            .append_str("oops")
            .build()
            .expect_err("type mismatch");
        assert!(matches!(err, ExecError::InvalidArgument(_)));

        let info = TupleInfo::try_new(vec![FieldType::FixedInt64, FieldType::FixedInt64])
            .expect("tuple info");
        let err = Tuple::builder(info)
            .append_long(1)
            .build()
            .expect_err("incomplete");
        assert!(matches!(err, ExecError::InvalidState(_)));
    }

    #[test]
    fn tuples_compare_by_value() {
        assert_eq!(Tuple::string("a"), Tuple::string("a"));
        assert_ne!(Tuple::string("a"), Tuple::string("b"));
        assert_ne!(Tuple::long(1), Tuple::double(1.0));
    }
}
