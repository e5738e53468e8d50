use crate::domain::order::{OrderId, OrderNumber};
use crate::domain::ports::{Clock, IdGenerator};
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use ulid::{Generator, Ulid};

const ORDER_NUMBER_PREFIX: &str = "ORD";
const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Monotonic ULID order ids and clock-seeded, strictly increasing order numbers.
///
/// Order numbers are `ORD` followed by the base-36 form of a counter that never
/// falls behind the millisecond clock, so numbers from one process never repeat
/// and numbers from a restarted process start above the previous run's.
pub struct UlidGenerator {
    ulids: Mutex<Generator>,
    counter: AtomicU64,
}

impl UlidGenerator {
    pub fn new() -> Self {
        Self {
            ulids: Mutex::new(Generator::new()),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for UlidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for UlidGenerator {
    fn next_order_id(&self) -> OrderId {
        let mut generator = self.ulids.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Overflow only happens after 2^80 ids in one millisecond; a fresh ULID is still unique.
        let ulid = generator.generate().unwrap_or_else(|_| Ulid::new());
        OrderId::new(ulid)
    }

    fn next_order_number(&self) -> OrderNumber {
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let previous = self
            .counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(prev.saturating_add(1).max(now_ms))
            })
            .unwrap_or_else(|prev| prev);
        let next = previous.saturating_add(1).max(now_ms);
        OrderNumber(format!("{}{}", ORDER_NUMBER_PREFIX, to_base36(next)))
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize] as char);
        value /= 36;
    }
    digits.iter().rev().collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
