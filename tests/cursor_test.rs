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
//! Integration tests for cursor dual iteration over run-length and flat blocks.

#[macro_use]
mod common;

use novaprobe::exec::block::{Block, BlockBuilder, Cursor, RleBlock, Tuple, TupleInfo};
use novaprobe::ExecError;

type Blocks = std::vec::IntoIter<Block>;

fn rle(value: &str, start: u64, end: u64) -> Block {
    RleBlock::try_new(Tuple::string(value), start, end)
        .expect("rle block")
        .into()
}

fn fruit_blocks() -> Vec<Block> {
    vec![
        rle("apple", 0, 4),
        rle("banana", 5, 7),
        rle("cherry", 20, 21),
        rle("date", 30, 30),
    ]
}

fn create_cursor() -> Cursor<Blocks> {
    Cursor::new(TupleInfo::single_varbinary(), fruit_blocks())
}

fn current(cursor: &Cursor<Blocks>) -> (u64, String) {
    let position = assert_ok!(cursor.position());
    let value = assert_ok!(cursor.get_slice(0));
    (position, String::from_utf8_lossy(value).into_owned())
}

fn assert_next_value(cursor: &mut Cursor<Blocks>, position: u64, value: &str) {
    assert!(cursor.has_next_value());
    assert_ok!(cursor.advance_next_value());
    assert_eq!(current(cursor), (position, value.to_string()));
}

fn assert_next_position(cursor: &mut Cursor<Blocks>, position: u64, value: &str) {
    assert!(cursor.has_next_position());
    assert_ok!(cursor.advance_next_position());
    assert_eq!(current(cursor), (position, value.to_string()));
}

fn assert_next_value_position(cursor: &mut Cursor<Blocks>, position: u64) {
    assert_eq!(cursor.peek_next_value_position(), Ok(position));
    assert_ok!(cursor.advance_next_value());
    assert_eq!(cursor.position(), Ok(position));
}

#[test]
fn test_first_value() {
    let mut cursor = create_cursor();
    assert_next_value(&mut cursor, 0, "apple");
}

#[test]
fn test_first_position() {
    let mut cursor = create_cursor();
    assert_next_position(&mut cursor, 0, "apple");
}

#[test]
fn test_advance_next_value() {
    let mut cursor = create_cursor();
    assert_next_value(&mut cursor, 0, "apple");
    assert_next_value(&mut cursor, 5, "banana");
    assert_next_value(&mut cursor, 20, "cherry");
    assert_next_value(&mut cursor, 30, "date");
    assert!(!cursor.has_next_value());
}

#[test]
fn test_advance_next_position() {
    let mut cursor = create_cursor();
    for position in 0..=4 {
        assert_next_position(&mut cursor, position, "apple");
    }
    for position in 5..=7 {
        assert_next_position(&mut cursor, position, "banana");
    }
    assert_next_position(&mut cursor, 20, "cherry");
    assert_next_position(&mut cursor, 21, "cherry");
    assert_next_position(&mut cursor, 30, "date");
    assert!(!cursor.has_next_position());
}

#[test]
fn test_advance_to_next_value_advances_position() {
    let mut cursor = create_cursor();
    // skip to the middle of a run
    assert_next_value(&mut cursor, 0, "apple");
    assert_next_position(&mut cursor, 1, "apple");
    // jump to the next run
    assert_next_value(&mut cursor, 5, "banana");
}

#[test]
fn test_advance_to_next_position_advances_value() {
    let mut cursor = create_cursor();
    for position in 0..=4 {
        assert_next_position(&mut cursor, position, "apple");
    }
    assert_next_position(&mut cursor, 5, "banana");
}

#[test]
fn test_advance_next_value_at_end_of_block() {
    let mut cursor = create_cursor();
    for position in 0..=4 {
        assert_next_position(&mut cursor, position, "apple");
    }
    assert_next_value(&mut cursor, 5, "banana");
}

#[test]
fn test_next_value_position() {
    let mut cursor = create_cursor();
    assert_next_value_position(&mut cursor, 0);
    assert_next_value_position(&mut cursor, 5);
    assert_next_value_position(&mut cursor, 20);
    assert_next_value_position(&mut cursor, 30);
    assert!(!cursor.has_next_value());
}

#[test]
fn test_current_value_end_position() {
    let mut cursor = create_cursor();
    assert_ok!(cursor.advance_next_position());
    assert_eq!(cursor.current_value_end_position(), Ok(4));
    assert_ok!(cursor.advance_next_position());
    assert_eq!(cursor.current_value_end_position(), Ok(4));
    assert_ok!(cursor.advance_next_value());
    assert_eq!(cursor.current_value_end_position(), Ok(7));
}

#[test]
fn test_advance_next_position_past_end() {
    let mut cursor = create_cursor();
    while cursor.has_next_position() {
        assert_ok!(cursor.advance_next_position());
    }
    let err = assert_err!(cursor.advance_next_position());
    assert!(err.is_end_of_data(), "err={err}");
}

#[test]
fn test_advance_next_value_past_end() {
    let mut cursor = create_cursor();
    while cursor.has_next_value() {
        assert_ok!(cursor.advance_next_value());
    }
    let err = assert_err!(cursor.advance_next_value());
    assert!(err.is_end_of_data(), "err={err}");
}

#[test]
fn test_peek_next_value_position_past_end() {
    let mut cursor = create_cursor();
    while cursor.has_next_value() {
        assert_ok!(cursor.advance_next_value());
    }
    let err = assert_err!(cursor.peek_next_value_position());
    assert!(err.is_end_of_data(), "err={err}");
}

#[test]
fn test_read_before_advance_is_not_end_of_data() {
    let cursor = create_cursor();
    assert_eq!(cursor.position(), Err(ExecError::CursorNotAdvanced));
    assert_eq!(cursor.get_slice(0), Err(ExecError::CursorNotAdvanced));
}

#[test]
fn test_tuple_info() {
    let cursor = create_cursor();
    assert_eq!(cursor.tuple_info(), &TupleInfo::single_varbinary());
}

/// Every mix of advance calls, encoded as bits (1 = by value), must land on the
/// same (position, value) as walking position by position to that position.
#[test]
fn test_dual_iteration_consistency() {
    let mut reference = create_cursor();
    let mut by_position = Vec::new();
    while reference.has_next_position() {
        assert_ok!(reference.advance_next_position());
        by_position.push(current(&reference));
    }

    for mask in 0u32..(1 << 8) {
        let mut cursor = create_cursor();
        for step in 0..8 {
            let by_value = mask & (1 << step) != 0;
            let advanced = if by_value {
                cursor.has_next_value() && cursor.advance_next_value().is_ok()
            } else {
                cursor.has_next_position() && cursor.advance_next_position().is_ok()
            };
            if !advanced {
                break;
            }
            let (position, value) = current(&cursor);
            let expected = by_position
                .iter()
                .find(|(p, _)| *p == position)
                .expect("position reachable by single steps");
            assert_eq!(&(position, value), expected, "mask={mask:#010b} step={step}");
        }
    }
}

#[test]
fn test_mixed_flat_and_run_length_blocks() {
    let mut flat = BlockBuilder::new(TupleInfo::single_varbinary(), 32).with_start_position(8);
    assert_ok!(flat.append_str("fig"));
    assert_ok!(flat.append_null());
    let blocks = vec![rle("apple", 0, 4), assert_ok!(flat.build()), rle("kiwi", 10, 12)];
    let mut cursor = Cursor::new(TupleInfo::single_varbinary(), blocks);

    assert_ok!(cursor.advance_next_value());
    assert_eq!(cursor.peek_next_value_position(), Ok(8));
    assert_ok!(cursor.advance_next_value());
    assert_eq!(cursor.position(), Ok(8));
    assert!(cursor.has_next_value());
    assert_eq!(cursor.peek_next_value_position(), Ok(9));
    assert_ok!(cursor.advance_next_value());
    assert_eq!(cursor.is_null(0), Ok(true));
    assert_eq!(cursor.peek_next_value_position(), Ok(10));
    assert_ok!(cursor.advance_next_position());
    assert_eq!(cursor.position(), Ok(10));
    assert_ok!(cursor.advance_next_position());
    assert_eq!(cursor.position(), Ok(11));
    assert_eq!(cursor.current_value_end_position(), Ok(12));
}
