// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::builder::Builder;
use crate::error::*;
use crate::short_id::encode_base62;
use chrono::prelude::*;
use parking_lot::Mutex;
use std::{hint, sync::Arc};
use tracing::warn;

/// bit length of time
pub(crate) const BIT_LEN_TIME: u32 = 41;
/// bit length of the data center id
pub(crate) const BIT_LEN_DATACENTER_ID: u32 = 5;
/// bit length of worker id
pub(crate) const BIT_LEN_WORKER_ID: u32 = 5;
/// bit length of sequence number
pub(crate) const BIT_LEN_SEQUENCE: u32 =
    63 - BIT_LEN_TIME - BIT_LEN_DATACENTER_ID - BIT_LEN_WORKER_ID;

pub(crate) const WORKER_ID_SHIFT: u32 = BIT_LEN_SEQUENCE;
pub(crate) const DATACENTER_ID_SHIFT: u32 = BIT_LEN_SEQUENCE + BIT_LEN_WORKER_ID;
pub(crate) const TIMESTAMP_SHIFT: u32 =
    BIT_LEN_SEQUENCE + BIT_LEN_WORKER_ID + BIT_LEN_DATACENTER_ID;

/// Largest accepted worker id.
pub const MAX_WORKER_ID: i64 = (1 << BIT_LEN_WORKER_ID) - 1;
/// Largest accepted data center id.
pub const MAX_DATACENTER_ID: i64 = (1 << BIT_LEN_DATACENTER_ID) - 1;
/// mask for sequence number
pub(crate) const SEQUENCE_MASK: i64 = (1 << BIT_LEN_SEQUENCE) - 1;

/// Default epoch, 2016-05-21T12:35:16.272Z in milliseconds.
///
/// Ids already persisted were composed against this instant, so it must not change.
pub const DEFAULT_EPOCH_MILLIS: i64 = 1_463_834_116_272;

/// Internals of Snowflake.
/// This struct is not exposed to the public.
#[derive(Debug)]
pub(crate) struct Internals {
    pub(crate) last_timestamp: i64,
    pub(crate) sequence: i64,
}

/// SharedSnowflake is shared between Snowflake instances.
/// This struct is not exposed to the public.
#[derive(Debug)]
pub(crate) struct SharedSnowflake {
    pub(crate) epoch: i64,
    pub(crate) datacenter_id: i64,
    pub(crate) worker_id: i64,
    pub(crate) internals: Mutex<Internals>,
}

/// Snowflake is a distributed unique ID generator.
///
/// Every call to [`next_id`] serializes on a single lock owned by the
/// generator. Clones share that lock and state, so a clone handed to another
/// thread still yields ids unique for this `(datacenter_id, worker_id)` pair.
///
/// [`next_id`]: Snowflake::next_id
#[derive(Debug)]
pub struct Snowflake(pub(crate) Arc<SharedSnowflake>);

impl Snowflake {
    /// Create a new Snowflake configured from the environment.
    ///
    /// `IDWORKER_WORKER_ID` and `IDWORKER_DATACENTER_ID` are used when set;
    /// an unset variable falls back to an id derived from the machine
    /// fingerprint. For custom configuration see [`builder`].
    ///
    /// [`builder`]: Snowflake::builder
    pub fn new() -> Result<Self, Error> {
        Builder::new().finalize()
    }

    /// Create a Snowflake with explicit ids, both of which must lie in `[0, 31]`.
    pub fn init(worker_id: i64, datacenter_id: i64) -> Result<Self, Error> {
        let worker = move || -> Result<i64, BoxDynError> { Ok(worker_id) };
        let datacenter = move || -> Result<i64, BoxDynError> { Ok(datacenter_id) };
        Builder::new()
            .worker_id(&worker)
            .datacenter_id(&datacenter)
            .finalize()
    }

    /// Create a Snowflake whose ids are derived only from the machine fingerprint.
    ///
    /// Two machines may hash to the same ids; assign them explicitly when
    /// strict uniqueness across hosts matters.
    pub fn from_machine() -> Result<Self, Error> {
        let (worker_id, datacenter_id) = crate::machine::machine_ids();
        let worker = move || -> Result<i64, BoxDynError> { Ok(worker_id) };
        let datacenter = move || -> Result<i64, BoxDynError> { Ok(datacenter_id) };
        Builder::new()
            .worker_id(&worker)
            .datacenter_id(&datacenter)
            .finalize()
    }

    /// Create a new [`Builder`] to construct a Snowflake.
    pub fn builder<'a>() -> Builder<'a> {
        Builder::new()
    }

    pub(crate) fn new_inner(shared: Arc<SharedSnowflake>) -> Self {
        Self(shared)
    }

    /// The epoch ids are measured from, in milliseconds since the Unix epoch.
    pub fn epoch(&self) -> i64 {
        self.0.epoch
    }

    /// The worker id embedded in every id.
    pub fn worker_id(&self) -> i64 {
        self.0.worker_id
    }

    /// The data center id embedded in every id.
    pub fn datacenter_id(&self) -> i64 {
        self.0.datacenter_id
    }

    /// Generate the next unique id.
    ///
    /// When the 4096 sequence numbers of the current millisecond are used up
    /// this busy-waits for the next millisecond while holding the lock. There
    /// is no timeout; wrap the call if bounded latency is required.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockMovedBackwards`] if the wall clock reads earlier
    /// than the last timestamp used. The generator does not wait for the
    /// clock to catch up.
    pub fn next_id(&self) -> Result<i64, Error> {
        let mut internals = self.0.internals.lock();

        let mut timestamp = current_millis();
        if timestamp < internals.last_timestamp {
            let regression = internals.last_timestamp - timestamp;
            warn!(
                regression_ms = regression,
                worker_id = self.0.worker_id,
                datacenter_id = self.0.datacenter_id,
                "clock moved backwards"
            );
            return Err(Error::ClockMovedBackwards(regression));
        }

        if timestamp == internals.last_timestamp {
            internals.sequence = (internals.sequence + 1) & SEQUENCE_MASK;
            if internals.sequence == 0 {
                timestamp = til_next_millis(internals.last_timestamp);
            }
        } else {
            internals.sequence = 0;
        }
        internals.last_timestamp = timestamp;

        Ok(compose(
            timestamp - self.0.epoch,
            self.0.datacenter_id,
            self.0.worker_id,
            internals.sequence,
        ))
    }

    /// Generate the next id and encode it in base62.
    pub fn next_short_id(&self) -> Result<String, Error> {
        let id = self.next_id()?;
        Ok(encode_base62(id as u64))
    }
}

/// Returns a new `Snowflake` referencing the same state as `self`.
impl Clone for Snowflake {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn current_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Spin until the clock reads a millisecond later than `last_timestamp`.
pub(crate) fn til_next_millis(last_timestamp: i64) -> i64 {
    let mut timestamp = current_millis();
    while timestamp <= last_timestamp {
        hint::spin_loop();
        timestamp = current_millis();
    }
    timestamp
}

/// Pack the id fields, most significant first: 41 bits of elapsed time,
/// 5 bits of data center id, 5 bits of worker id and 12 bits of sequence.
///
/// A negative result is negated before it is returned. This only happens
/// when `elapsed` is negative or does not fit in 41 bits, and is kept so
/// that ids match those already stored. `i64::MIN` has no positive
/// counterpart and is returned unchanged.
pub fn compose(elapsed: i64, datacenter_id: i64, worker_id: i64, sequence: i64) -> i64 {
    let id = (elapsed << TIMESTAMP_SHIFT)
        | (datacenter_id << DATACENTER_ID_SHIFT)
        | (worker_id << WORKER_ID_SHIFT)
        | sequence;
    if id < 0 { id.wrapping_neg() } else { id }
}

/// DecomposedSnowflake is the parts of a Snowflake ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecomposedSnowflake {
    pub id: i64,
    pub time: i64,
    pub datacenter_id: i64,
    pub worker_id: i64,
    pub sequence: i64,
}

impl DecomposedSnowflake {
    /// Returns the Unix timestamp in milliseconds, given the generator's epoch.
    pub fn timestamp_millis(&self, epoch: i64) -> i64 {
        self.time + epoch
    }
}

/// Break a Snowflake ID up into its parts.
pub fn decompose(id: i64) -> DecomposedSnowflake {
    DecomposedSnowflake {
        id,
        time: id >> TIMESTAMP_SHIFT,
        datacenter_id: (id >> DATACENTER_ID_SHIFT) & MAX_DATACENTER_ID,
        worker_id: (id >> WORKER_ID_SHIFT) & MAX_WORKER_ID,
        sequence: id & SEQUENCE_MASK,
    }
}
