use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Base32-sortkey alphabet used by AT Protocol TIDs.
const BASE32_SORTKEY: &[u8; 32] = b"234567abcdefghijklmnopqrstuvwxyz";

/// TID (Timestamp Identifier) generator.
///
/// Produces 13-character, monotonically increasing, base32-sortkey encoded
/// identifiers from `(microsecond_timestamp << 10 | clock_id)`.
pub struct TidGenerator {
    clock_id: u16,
    last: AtomicU64,
}

impl TidGenerator {
    /// Create a new TID generator with a random 10-bit clock ID.
    pub fn new() -> Self {
        let clock_id = rand::random::<u16>() & 0x03FF; // 10-bit mask
        Self {
            clock_id,
            last: AtomicU64::new(0),
        }
    }

    /// Create a TID generator with an explicit clock ID.
    ///
    /// Distinct clock IDs are what keep two generators from colliding when
    /// run concurrently across a fleet; pick one per process/config.
    pub fn with_clock_id(clock_id: u16) -> Self {
        Self {
            clock_id: clock_id & 0x03FF,
            last: AtomicU64::new(0),
        }
    }

    /// Generate the next TID.
    ///
    /// Guarantees monotonically increasing values even when called within
    /// the same microsecond by incrementing the stored timestamp.
    pub fn next_tid(&self) -> String {
        let now_micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_micros() as u64;

        let candidate = (now_micros << 10) | (self.clock_id as u64);

        // Ensure monotonically increasing: if candidate <= last, use last + 1
        let value = loop {
            let last = self.last.load(Ordering::Acquire);
            let next = if candidate > last { candidate } else { last + 1 };
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break next,
                Err(_) => continue, // retry on contention
            }
        };

        encode_base32_sortkey(value)
    }
}

impl Default for TidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a u64 value as a 13-character base32-sortkey string.
fn encode_base32_sortkey(mut value: u64) -> String {
    let mut buf = [0u8; 13];
    for i in (0..13).rev() {
        buf[i] = BASE32_SORTKEY[(value & 0x1F) as usize];
        value >>= 5;
    }
    // SAFETY: all characters in BASE32_SORTKEY are valid ASCII/UTF-8
    String::from_utf8(buf.to_vec()).expect("base32-sortkey chars are valid UTF-8")
}
