//! Snowflake ID Generator
//!
//! 64-bit time-ordered ids for messages and friendships:
//!
//! ```text
//! | 41 bits ms since EPOCH | 5 bits machine | 5 bits node | 12 bits sequence |
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Custom epoch (2024-01-01T00:00:00.000Z)
pub const EPOCH: u64 = 1_704_067_200_000;

const SEQUENCE_MASK: u64 = 0xFFF;

/// Snowflake ID generator
pub struct SnowflakeGenerator {
    machine_id: u64,
    node_id: u64,
    /// (last timestamp, sequence within that millisecond)
    state: Mutex<(u64, u64)>,
}

impl SnowflakeGenerator {
    pub fn new(machine_id: u64, node_id: u64) -> Self {
        Self {
            machine_id: machine_id & 0x1F,
            node_id: node_id & 0x1F,
            state: Mutex::new((0, 0)),
        }
    }

    /// Generate a new id. Spins into the next millisecond when the
    /// sequence of the current one is exhausted.
    pub fn generate(&self) -> i64 {
        let mut state = self.state.lock();
        let (last, sequence) = *state;

        let mut timestamp = current_millis().max(last);
        let sequence = if timestamp == last {
            let next = (sequence + 1) & SEQUENCE_MASK;
            if next == 0 {
                while timestamp <= last {
                    std::hint::spin_loop();
                    timestamp = current_millis();
                }
            }
            next
        } else {
            0
        };
        *state = (timestamp, sequence);

        let id = ((timestamp - EPOCH) << 22) | (self.machine_id << 17) | (self.node_id << 12) | sequence;
        id as i64
    }
}

fn current_millis() -> u64 {
    // A clock before 1970 collapses to the epoch; ids stay monotonic via `max(last)`.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
        .max(EPOCH)
}

/// Millisecond timestamp embedded in a snowflake.
pub fn extract_timestamp(snowflake: i64) -> u64 {
    ((snowflake as u64) >> 22) + EPOCH
}
