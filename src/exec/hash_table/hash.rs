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
//! Seeded hashing for encoded tuple fields.

use std::hash::BuildHasher;

const GOLDEN: u64 = 0x9e3779b97f4a7c15;

/// Per-table random seed drawn from a randomly keyed `BuildHasher`.
pub(crate) fn seed_from_hasher<S: BuildHasher>(build_hasher: &S) -> u64 {
    build_hasher.hash_one(0u8)
}

/// Folds one field hash into the running tuple hash; order sensitive.
pub(crate) fn combine_hash(acc: u64, field_hash: u64) -> u64 {
    let mixed = field_hash
        .wrapping_add(GOLDEN)
        .wrapping_add(acc << 6)
        .wrapping_add(acc >> 2);
    acc ^ mixed
}

pub(crate) fn hash_u64_with_seed(seed: u64, value: u64) -> u64 {
    mix_u64(seed ^ value)
}

// FNV-1a over the seed; binary keys in a probe batch are short.
pub(crate) fn hash_bytes_with_seed(seed: u64, bytes: &[u8]) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    mix_u64(hash ^ bytes.len() as u64)
}

pub(crate) fn hash_null_with_seed(seed: u64) -> u64 {
    hash_u64_with_seed(seed, GOLDEN.rotate_left(17))
}

/// Bits that compare equal iff the doubles are numerically equal (NaN equals NaN).
pub(crate) fn canonical_f64_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

fn mix_u64(mut value: u64) -> u64 {
    value = value.wrapping_add(GOLDEN);
    value = (value ^ (value >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    value = (value ^ (value >> 27)).wrapping_mul(0x94d049bb133111eb);
    value ^ (value >> 31)
}
