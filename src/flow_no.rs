// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Human-readable, sortable flow numbers.
//!
//! A flow number is the upper-cased prefix followed by 22 digits:
//!
//! ```text
//! PREFIX YYYYMMDDHHMMSS CC SSS RRR
//! ```
//!
//! `CC` is the hundredths of the current second, `SSS` a sequence that
//! restarts every 100 ms bucket and `RRR` a uniformly drawn random number.
//! Within one process and bucket the sequence alone makes numbers unique; the
//! random digits only lower the odds of collisions between processes.

use crate::error::BoxDynError;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use rand::TryRngCore;
use rand::rngs::OsRng;
use std::hint;
use std::sync::OnceLock;
use tracing::warn;

/// Sequence numbers available per bucket.
const SEQUENCE_LIMIT: u32 = 1000;
/// Exclusive upper bound of the random suffix.
const RANDOM_BOUND: u32 = 1000;
/// Width of a bucket in milliseconds.
const PERIOD_MILLIS: i64 = 100;

/// A source of random bytes for the flow number suffix.
///
/// This abstraction allows you to plug in the OS source or a mocked source in tests.
pub trait EntropySource {
    /// Fill `buf` entirely with random bytes.
    fn try_fill(&self, buf: &mut [u8]) -> Result<(), BoxDynError>;
}

/// An [`EntropySource`] backed by the operating system's secure generator.
#[derive(Default, Clone, Copy, Debug)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn try_fill(&self, buf: &mut [u8]) -> Result<(), BoxDynError> {
        OsRng.try_fill_bytes(buf)?;
        Ok(())
    }
}

#[derive(Debug)]
struct FlowState {
    sequence: u32,
    last_period: i64,
}

/// Generates flow numbers.
///
/// The sequence is shared by every prefix, so all callers of one generator
/// serialize on its lock. Use [`FlowNumberGenerator::global`] to share one
/// instance across the process.
#[derive(Debug)]
pub struct FlowNumberGenerator<E = OsEntropy> {
    state: Mutex<FlowState>,
    entropy: E,
}

impl FlowNumberGenerator<OsEntropy> {
    /// Create a generator that draws suffixes from the OS.
    pub fn new() -> Self {
        Self::with_entropy(OsEntropy)
    }

    /// The process-wide generator used by [`generate_flow_no`].
    pub fn global() -> &'static FlowNumberGenerator {
        static GLOBAL: OnceLock<FlowNumberGenerator> = OnceLock::new();
        GLOBAL.get_or_init(FlowNumberGenerator::new)
    }
}

impl Default for FlowNumberGenerator<OsEntropy> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntropySource> FlowNumberGenerator<E> {
    /// Create a generator that draws suffixes from `entropy`.
    pub fn with_entropy(entropy: E) -> Self {
        Self {
            state: Mutex::new(FlowState {
                sequence: 0,
                last_period: -1,
            }),
            entropy,
        }
    }

    /// Generate a flow number for `prefix`.
    ///
    /// The result is always `prefix.len() + 22` bytes long for ASCII prefixes.
    /// When 1000 numbers have been issued in the current bucket this spins
    /// until the next bucket starts.
    pub fn generate(&self, prefix: &str) -> String {
        let (now, sequence) = {
            let mut state = self.state.lock();
            let mut now = Local::now();
            let mut period = period_of(&now);

            let sequence = if period == state.last_period {
                state.sequence += 1;
                if state.sequence >= SEQUENCE_LIMIT {
                    while period <= state.last_period {
                        hint::spin_loop();
                        now = Local::now();
                        period = period_of(&now);
                    }
                    0
                } else {
                    state.sequence
                }
            } else {
                0
            };
            state.sequence = sequence;
            state.last_period = period;
            (now, sequence)
        };

        let random = uniform_below(&self.entropy, RANDOM_BOUND);
        format!(
            "{}{}{:02}{:03}{:03}",
            prefix.to_uppercase(),
            now.format("%Y%m%d%H%M%S"),
            now.timestamp_subsec_millis() / 10,
            sequence,
            random
        )
    }
}

/// Generate a flow number with the process-wide generator.
pub fn generate_flow_no(prefix: &str) -> String {
    FlowNumberGenerator::global().generate(prefix)
}

fn period_of(now: &DateTime<Local>) -> i64 {
    now.timestamp_millis().div_euclid(PERIOD_MILLIS)
}

/// Draw a uniformly distributed value in `[0, bound)`.
///
/// Four bytes are read as a big-endian `u32`; values at or above the largest
/// multiple of `bound` are discarded and redrawn so the modulo is unbiased.
/// If the source fails, a value derived from the current time is returned.
pub fn uniform_below<E: EntropySource + ?Sized>(source: &E, bound: u32) -> u32 {
    if bound == 0 {
        return 0;
    }
    let limit = (u32::MAX / bound) * bound;
    let mut buf = [0u8; 4];
    loop {
        if let Err(err) = source.try_fill(&mut buf) {
            warn!(error = %err, "random source failed, using time-derived value");
            let nanos = Local::now().timestamp_subsec_nanos();
            return nanos % bound;
        }
        let value = u32::from_be_bytes(buf);
        if value < limit {
            return value % bound;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("entropy unavailable")]
    struct Unavailable;

    struct FailingEntropy;

    impl EntropySource for FailingEntropy {
        fn try_fill(&self, _buf: &mut [u8]) -> Result<(), BoxDynError> {
            Err(Box::new(Unavailable))
        }
    }

    /// Replays a fixed list of `u32`s and counts draws.
    struct ScriptedEntropy {
        values: Vec<u32>,
        draws: AtomicUsize,
    }

    impl ScriptedEntropy {
        fn new(values: Vec<u32>) -> Self {
            Self {
                values,
                draws: AtomicUsize::new(0),
            }
        }
    }

    impl EntropySource for ScriptedEntropy {
        fn try_fill(&self, buf: &mut [u8]) -> Result<(), BoxDynError> {
            let i = self.draws.fetch_add(1, Ordering::SeqCst);
            let value = self.values[i.min(self.values.len() - 1)];
            buf.copy_from_slice(&value.to_be_bytes());
            Ok(())
        }
    }

    fn assert_layout(flow_no: &str, prefix: &str) {
        assert_eq!(flow_no.len(), prefix.len() + 22, "bad length: {}", flow_no);
        assert!(flow_no.starts_with(prefix), "bad prefix: {}", flow_no);
        assert!(
            flow_no[prefix.len()..].bytes().all(|b| b.is_ascii_digit()),
            "non-digit in {}",
            flow_no
        );
    }

    #[test]
    fn test_format() {
        let flow_no = generate_flow_no("sf");
        assert_layout(&flow_no, "SF");

        let digits = &flow_no[2..];
        let month: u32 = digits[4..6].parse().unwrap();
        let day: u32 = digits[6..8].parse().unwrap();
        let hour: u32 = digits[8..10].parse().unwrap();
        assert!((1..=12).contains(&month));
        assert!((1..=31).contains(&day));
        assert!(hour < 24);
    }

    #[test]
    fn test_prefix_upper_cased() {
        let generator = FlowNumberGenerator::new();
        for (input, expected) in [("Ab", "AB"), ("test", "TEST"), ("XYZ", "XYZ"), ("", "")] {
            assert_layout(&generator.generate(input), expected);
        }
    }

    #[test]
    fn test_sequential_uniqueness() {
        let generator = FlowNumberGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let flow_no = generator.generate("TEST");
            assert!(seen.insert(flow_no.clone()), "duplicate: {}", flow_no);
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_concurrent_uniqueness() {
        let generator = Arc::new(FlowNumberGenerator::new());
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let generator = Arc::clone(&generator);
                thread::spawn(move || {
                    (0..100)
                        .map(|_| generator.generate("CONC"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for flow_no in handle.join().expect("Child thread panicked") {
                assert!(seen.insert(flow_no.clone()), "duplicate: {}", flow_no);
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_prefixes_share_sequence() {
        let generator = FlowNumberGenerator::with_entropy(ScriptedEntropy::new(vec![7]));
        // Retry when the bucket rolls over between the seeding and the second call.
        for _ in 0..100 {
            let period = period_of(&Local::now());
            {
                let mut state = generator.state.lock();
                state.last_period = period;
                state.sequence = 5;
            }
            let a = generator.generate("A");
            let b = generator.generate("B");
            if generator.state.lock().last_period != period {
                continue;
            }
            assert_layout(&a, "A");
            assert_layout(&b, "B");
            assert_eq!(&a[17..20], "006", "{}", a);
            assert_eq!(&b[17..20], "007", "{}", b);
            assert_eq!(&a[20..], "007");
            return;
        }
        panic!("bucket changed on every attempt");
    }

    #[test]
    fn test_sequence_exhaustion_rolls_bucket() {
        let generator = FlowNumberGenerator::new();
        {
            let mut state = generator.state.lock();
            state.last_period = period_of(&Local::now());
            state.sequence = SEQUENCE_LIMIT - 1;
        }
        let flow_no = generator.generate("X");
        assert_layout(&flow_no, "X");
        let state = generator.state.lock();
        assert_eq!(state.sequence, 0);
        assert_eq!(&flow_no[17..20], "000");
    }

    #[test]
    fn test_uniform_below_rejects_biased_values() {
        let limit = (u32::MAX / 1000) * 1000;
        let source = ScriptedEntropy::new(vec![u32::MAX, limit, limit - 1]);
        assert_eq!(uniform_below(&source, 1000), (limit - 1) % 1000);
        assert_eq!(source.draws.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_uniform_below_in_range() {
        for _ in 0..1000 {
            assert!(uniform_below(&OsEntropy, 1000) < 1000);
        }
        assert_eq!(uniform_below(&OsEntropy, 1), 0);
        assert_eq!(uniform_below(&OsEntropy, 0), 0);
    }

    #[test]
    fn test_failing_entropy_falls_back() {
        assert!(uniform_below(&FailingEntropy, 1000) < 1000);

        let generator = FlowNumberGenerator::with_entropy(FailingEntropy);
        assert_layout(&generator.generate("fb"), "FB");
    }
}
