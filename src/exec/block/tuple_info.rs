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
//! Tuple schema and physical tuple layout.
//!
//! Responsibilities:
//! - Describes the field kinds of one column's tuples and how they are laid out in bytes.
//! - Provides type-aware field access, hashing and equality over encoded tuples.
//!
//! Key exported interfaces:
//! - Types: `FieldType`, `TupleInfo`.
//!
//! Layout of one tuple:
//! ```text
//! [null bitmap: ceil(fields / 8) bytes][field 0][field 1]...
//! fixed field:    value bytes, little endian (zeroed when null)
//! variable field: u32 LE length, then bytes (length 0 when null)
//! ```

use std::fmt;
use std::sync::Arc;

use crate::check_argument;
use crate::common::error::{ExecError, Result};
use crate::exec::hash_table::hash::{
    canonical_f64_bits, combine_hash, hash_bytes_with_seed, hash_null_with_seed,
    hash_u64_with_seed,
};

pub(crate) const LENGTH_PREFIX_BYTES: usize = std::mem::size_of::<u32>();

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    FixedInt64,
    Double,
    VariableBinary,
}

impl FieldType {
    /// Encoded width, or `None` for length-prefixed kinds.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            FieldType::Boolean => Some(1),
            FieldType::FixedInt64 | FieldType::Double => Some(8),
            FieldType::VariableBinary => None,
        }
    }

    pub fn is_fixed_size(self) -> bool {
        self.fixed_size().is_some()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Boolean => "BOOLEAN",
            FieldType::FixedInt64 => "FIXED_INT_64",
            FieldType::Double => "DOUBLE",
            FieldType::VariableBinary => "VARIABLE_BINARY",
        };
        f.write_str(name)
    }
}

/// Immutable, structurally compared description of one column's tuples.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TupleInfo {
    types: Arc<[FieldType]>,
    fixed_size: Option<usize>,
}

impl fmt::Debug for TupleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.types.iter()).finish()
    }
}

impl fmt::Display for TupleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, field_type) in self.types.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field_type}")?;
        }
        f.write_str(")")
    }
}

impl TupleInfo {
    pub fn try_new(types: Vec<FieldType>) -> Result<Self> {
        check_argument!(!types.is_empty(), "tuple info requires at least one field");
        let header = null_bitmap_len(types.len());
        let fixed_size = types
            .iter()
            .try_fold(header, |acc, t| t.fixed_size().map(|w| acc + w));
        Ok(Self {
            types: types.into(),
            fixed_size,
        })
    }

    pub fn single(field_type: FieldType) -> Self {
        let header = null_bitmap_len(1);
        Self {
            types: Arc::from([field_type]),
            fixed_size: field_type.fixed_size().map(|w| header + w),
        }
    }

    pub fn single_boolean() -> Self {
        Self::single(FieldType::Boolean)
    }

    pub fn single_long() -> Self {
        Self::single(FieldType::FixedInt64)
    }

    pub fn single_double() -> Self {
        Self::single(FieldType::Double)
    }

    pub fn single_varbinary() -> Self {
        Self::single(FieldType::VariableBinary)
    }

    pub fn types(&self) -> &[FieldType] {
        &self.types
    }

    pub fn field_count(&self) -> usize {
        self.types.len()
    }

    pub fn field_type(&self, field: usize) -> Result<FieldType> {
        self.types.get(field).copied().ok_or_else(|| {
            ExecError::invalid_argument(format!(
                "field {} out of range for tuple with {} fields",
                field,
                self.types.len()
            ))
        })
    }

    pub fn null_bitmap_len(&self) -> usize {
        null_bitmap_len(self.types.len())
    }

    /// Exact encoded size of every tuple, when all fields are fixed width.
    pub fn fixed_size(&self) -> Option<usize> {
        self.fixed_size
    }

    pub fn is_fixed_size(&self) -> bool {
        self.fixed_size.is_some()
    }

    /// Encoded size of the tuple starting at `offset` in `slice`.
    pub fn tuple_size(&self, slice: &[u8], offset: usize) -> usize {
        if let Some(size) = self.fixed_size {
            return size;
        }
        let mut cursor = offset + self.null_bitmap_len();
        for t in self.types.iter() {
            cursor += match t.fixed_size() {
                Some(width) => width,
                None => LENGTH_PREFIX_BYTES + read_u32(slice, cursor) as usize,
            };
        }
        cursor - offset
    }

    /// Encoded size of the tuple at `offset`, or `None` when a field or length
    /// prefix would run past the end of `slice`.
    pub fn checked_tuple_size(&self, slice: &[u8], offset: usize) -> Option<usize> {
        let mut cursor = offset.checked_add(self.null_bitmap_len())?;
        for t in self.types.iter() {
            let width = match t.fixed_size() {
                Some(width) => width,
                None => {
                    let prefix = slice.get(cursor..cursor.checked_add(LENGTH_PREFIX_BYTES)?)?;
                    let len = u32::from_le_bytes(prefix.try_into().ok()?) as usize;
                    LENGTH_PREFIX_BYTES.checked_add(len)?
                }
            };
            cursor = cursor.checked_add(width)?;
        }
        (cursor <= slice.len()).then(|| cursor - offset)
    }

    /// Offset of `field` relative to the start of `tuple`.
    fn field_offset(&self, tuple: &[u8], field: usize) -> usize {
        let mut cursor = self.null_bitmap_len();
        for t in &self.types[..field] {
            cursor += match t.fixed_size() {
                Some(width) => width,
                None => LENGTH_PREFIX_BYTES + read_u32(tuple, cursor) as usize,
            };
        }
        cursor
    }

    pub fn is_null(&self, tuple: &[u8], field: usize) -> Result<bool> {
        self.field_type(field)?;
        Ok(tuple[field / 8] & (1u8 << (field % 8)) != 0)
    }

    pub fn get_boolean(&self, tuple: &[u8], field: usize) -> Result<bool> {
        self.expect_type(field, FieldType::Boolean)?;
        Ok(tuple[self.field_offset(tuple, field)] != 0)
    }

    pub fn get_long(&self, tuple: &[u8], field: usize) -> Result<i64> {
        self.expect_type(field, FieldType::FixedInt64)?;
        let offset = self.field_offset(tuple, field);
        Ok(i64::from_le_bytes(read_array(tuple, offset)))
    }

    pub fn get_double(&self, tuple: &[u8], field: usize) -> Result<f64> {
        self.expect_type(field, FieldType::Double)?;
        let offset = self.field_offset(tuple, field);
        Ok(f64::from_le_bytes(read_array(tuple, offset)))
    }

    pub fn get_slice<'a>(&self, tuple: &'a [u8], field: usize) -> Result<&'a [u8]> {
        self.expect_type(field, FieldType::VariableBinary)?;
        let offset = self.field_offset(tuple, field);
        let len = read_u32(tuple, offset) as usize;
        let start = offset + LENGTH_PREFIX_BYTES;
        Ok(&tuple[start..start + len])
    }

    fn expect_type(&self, field: usize, expected: FieldType) -> Result<()> {
        let actual = self.field_type(field)?;
        check_argument!(
            actual == expected,
            "field {} is {}, not {}",
            field,
            actual,
            expected
        );
        Ok(())
    }

    /// Hash of an encoded tuple; equal tuples under [`TupleInfo::tuple_equals`] hash equally.
    pub fn hash_tuple(&self, tuple: &[u8], seed: u64) -> u64 {
        let mut acc = seed;
        let mut cursor = self.null_bitmap_len();
        for (field, t) in self.types.iter().enumerate() {
            let is_null = tuple[field / 8] & (1u8 << (field % 8)) != 0;
            let (value_hash, width) = match t {
                _ if is_null => (hash_null_with_seed(seed), self.encoded_width(*t, tuple, cursor)),
                FieldType::Boolean => (hash_u64_with_seed(seed, tuple[cursor] as u64), 1),
                FieldType::FixedInt64 => {
                    let v = i64::from_le_bytes(read_array(tuple, cursor));
                    (hash_u64_with_seed(seed, v as u64), 8)
                }
                FieldType::Double => {
                    let v = f64::from_le_bytes(read_array(tuple, cursor));
                    (hash_u64_with_seed(seed, canonical_f64_bits(v)), 8)
                }
                FieldType::VariableBinary => {
                    let len = read_u32(tuple, cursor) as usize;
                    let start = cursor + LENGTH_PREFIX_BYTES;
                    (
                        hash_bytes_with_seed(seed, &tuple[start..start + len]),
                        LENGTH_PREFIX_BYTES + len,
                    )
                }
            };
            acc = combine_hash(acc, value_hash);
            cursor += width;
        }
        acc
    }

    /// Field-wise equality: byte-exact for binary, numeric for numbers, null equals null.
    pub fn tuple_equals(&self, left: &[u8], right: &[u8]) -> bool {
        let mut l = self.null_bitmap_len();
        let mut r = l;
        for (field, t) in self.types.iter().enumerate() {
            let mask = 1u8 << (field % 8);
            let l_null = left[field / 8] & mask != 0;
            let r_null = right[field / 8] & mask != 0;
            let lw = self.encoded_width(*t, left, l);
            let rw = self.encoded_width(*t, right, r);
            if l_null != r_null {
                return false;
            }
            if !l_null {
                let equal = match t {
                    FieldType::Boolean => (left[l] != 0) == (right[r] != 0),
                    FieldType::FixedInt64 => left[l..l + 8] == right[r..r + 8],
                    FieldType::Double => {
                        let lv = f64::from_le_bytes(read_array(left, l));
                        let rv = f64::from_le_bytes(read_array(right, r));
                        canonical_f64_bits(lv) == canonical_f64_bits(rv)
                    }
                    FieldType::VariableBinary => left[l..l + lw] == right[r..r + rw],
                };
                if !equal {
                    return false;
                }
            }
            l += lw;
            r += rw;
        }
        true
    }

    fn encoded_width(&self, t: FieldType, tuple: &[u8], offset: usize) -> usize {
        match t.fixed_size() {
            Some(width) => width,
            None => LENGTH_PREFIX_BYTES + read_u32(tuple, offset) as usize,
        }
    }
}

pub(crate) fn null_bitmap_len(fields: usize) -> usize {
    fields.div_ceil(8)
}

pub(crate) fn read_u32(slice: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(read_array(slice, offset))
}

fn read_array<const N: usize>(slice: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&slice[offset..offset + N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::block::tuple::Tuple;

    #[test]
    fn fixed_size_accounts_for_null_bitmap() {
        assert_eq!(TupleInfo::single_boolean().fixed_size(), Some(2));
        assert_eq!(TupleInfo::single_long().fixed_size(), Some(9));
        assert_eq!(TupleInfo::single_varbinary().fixed_size(), None);
        let wide = TupleInfo::try_new(vec![FieldType::FixedInt64; 9]).expect("tuple info");
        assert_eq!(wide.null_bitmap_len(), 2);
        assert_eq!(wide.fixed_size(), Some(2 + 9 * 8));
    }

    #[test]
    fn checked_size_stops_at_truncated_prefix() {
        let info = TupleInfo::single_varbinary();
        let banana = Tuple::string("banana");
        assert_eq!(info.checked_tuple_size(banana.as_slice(), 0), Some(11));
        assert_eq!(info.checked_tuple_size(&[0, 100, 0, 0, 0], 0), None);
        assert_eq!(info.checked_tuple_size(&[0, 1, 0], 0), None);
        assert_eq!(TupleInfo::single_long().checked_tuple_size(&[0u8; 8], 0), None);
    }

    #[test]
    fn rejects_empty_schema() {
        assert!(matches!(
            TupleInfo::try_new(Vec::new()),
            Err(ExecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn schemas_compare_structurally() {
        let a = TupleInfo::try_new(vec![FieldType::VariableBinary]).expect("tuple info");
        assert_eq!(a, TupleInfo::single_varbinary());
        assert_ne!(a, TupleInfo::single_long());
    }

    #[test]
    fn mixed_tuple_field_access() {
        let info = TupleInfo::try_new(vec![
            FieldType::VariableBinary,
            FieldType::FixedInt64,
            FieldType::VariableBinary,
        ])
        .expect("tuple info");
        let tuple = Tuple::builder(info.clone())
            .append_str("apple")
            .append_long(42)
            .append_null()
            .build()
            .expect("tuple");
        let bytes = tuple.as_slice();
        assert_eq!(info.tuple_size(bytes, 0), bytes.len());
        assert_eq!(info.get_slice(bytes, 0).expect("slice"), b"apple");
        assert_eq!(info.get_long(bytes, 1).expect("long"), 42);
        assert!(info.is_null(bytes, 2).expect("null flag"));
        assert!(matches!(
            info.get_long(bytes, 0),
            Err(ExecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn doubles_compare_numerically() {
        let info = TupleInfo::single_double();
        let pos = Tuple::double(0.0);
        let neg = Tuple::double(-0.0);
        assert!(info.tuple_equals(pos.as_slice(), neg.as_slice()));
        assert_eq!(
            info.hash_tuple(pos.as_slice(), 7),
            info.hash_tuple(neg.as_slice(), 7)
        );
        let nan_a = Tuple::double(f64::NAN);
        let nan_b = Tuple::double(-f64::NAN);
        assert!(info.tuple_equals(nan_a.as_slice(), nan_b.as_slice()));
    }

    #[test]
    fn binary_equality_is_byte_exact() {
        let info = TupleInfo::single_varbinary();
        let a = Tuple::string("apple");
        let b = Tuple::string("apple");
        let c = Tuple::string("Apple");
        assert!(info.tuple_equals(a.as_slice(), b.as_slice()));
        assert!(!info.tuple_equals(a.as_slice(), c.as_slice()));
        assert_eq!(
            info.hash_tuple(a.as_slice(), 1),
            info.hash_tuple(b.as_slice(), 1)
        );
    }
}
