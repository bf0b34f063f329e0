use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{SimplicityError, SimplicityResult};
use crate::traits::IdProvider;

/// Custom epoch (2010-11-04T01:42:54.657Z) in milliseconds.
const EPOCH_MILLIS: u64 = 1_288_834_974_657;
const NODE_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const MAX_NODE: u16 = (1 << NODE_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const TIMESTAMP_SHIFT: u64 = NODE_BITS + SEQUENCE_BITS;

/// Snowflake id generator.
///
/// Produces decimal strings of `(millis_since_epoch << 22 | node << 12 | sequence)`,
/// strictly increasing per generator even under contention.
pub struct SnowflakeIdProvider {
    node_bits: u64,
    last: AtomicU64,
}

impl SnowflakeIdProvider {
    pub fn new(node_id: u16) -> SimplicityResult<Self> {
        if node_id > MAX_NODE {
            return Err(SimplicityError::Validation(format!(
                "node id {node_id} exceeds {MAX_NODE}"
            )));
        }
        Ok(Self {
            node_bits: (node_id as u64) << SEQUENCE_BITS,
            last: AtomicU64::new(0),
        })
    }

    fn next_value(&self) -> u64 {
        let now_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(EPOCH_MILLIS);
        let candidate = (now_millis.saturating_sub(EPOCH_MILLIS) << TIMESTAMP_SHIFT) | self.node_bits;

        loop {
            let last = self.last.load(Ordering::Acquire);
            let next = if candidate > last {
                candidate
            } else if last & SEQUENCE_MASK < SEQUENCE_MASK {
                last + 1
            } else {
                // Sequence exhausted within this millisecond: borrow the next one.
                (((last >> TIMESTAMP_SHIFT) + 1) << TIMESTAMP_SHIFT) | self.node_bits
            };
            if self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return next;
            }
        }
    }
}

impl IdProvider for SnowflakeIdProvider {
    fn generate(&self) -> String {
        self.next_value().to_string()
    }

    fn validate(&self, id: &str) -> SimplicityResult<()> {
        match id.parse::<i64>() {
            Ok(value) if value > 0 => Ok(()),
            _ => Err(SimplicityError::Validation(format!("invalid id: {id}"))),
        }
    }
}

/// Random UUID v4 ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdProvider;

impl IdProvider for UuidIdProvider {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn validate(&self, id: &str) -> SimplicityResult<()> {
        uuid::Uuid::parse_str(id)
            .map(|_| ())
            .map_err(|_| SimplicityError::Validation(format!("invalid id: {id}")))
    }
}
