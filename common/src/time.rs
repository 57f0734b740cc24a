//! Timestamp helpers, mirroring the teacher's `tos_common::time` module
//! (a thin wrapper keeping millisecond-resolution wall-clock reads in one
//! place so nothing in consensus code calls `SystemTime::now()` directly).

use std::time::{SystemTime, UNIX_EPOCH};

pub type TimestampMillis = u64;

pub fn current_timestamp_millis() -> TimestampMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as u64
}
