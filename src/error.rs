// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use chrono::{DateTime, Utc};
use std::error::Error as StdError;
use std::num::ParseIntError;
use thiserror::Error;

use crate::snowflake::{MAX_DATACENTER_ID, MAX_WORKER_ID};

/// Convenience type alias for usage within idworker.
pub type BoxDynError = Box<dyn StdError + 'static + Send + Sync>;

/// The error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("start_time `{0}` is ahead of current time")]
    StartTimeAheadOfCurrentTime(DateTime<Utc>),
    #[error("worker_id {0} is out of range [0, {max}]", max = MAX_WORKER_ID)]
    InvalidWorkerId(i64),
    #[error("datacenter_id {0} is out of range [0, {max}]", max = MAX_DATACENTER_ID)]
    InvalidDatacenterId(i64),
    #[error("worker_id returned an error: {0}")]
    WorkerIdFailed(#[source] BoxDynError),
    #[error("datacenter_id returned an error: {0}")]
    DatacenterIdFailed(#[source] BoxDynError),
    #[error("check_worker_id returned false")]
    CheckWorkerIdFailed,
    #[error("check_datacenter_id returned false")]
    CheckDatacenterIdFailed,
    #[error("environment variable `{0}` is not set")]
    EnvVarMissing(&'static str),
    #[error("environment variable `{name}` is not an integer: {value:?}")]
    EnvVarInvalid {
        name: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("clock moved backwards, refusing to generate id for {0} milliseconds")]
    ClockMovedBackwards(i64),
    #[error("invalid short id: {0:?}")]
    InvalidShortId(String),
}

impl Error {
    /// Returns true for errors raised while constructing a generator.
    ///
    /// These are fatal and should stop startup rather than be retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::StartTimeAheadOfCurrentTime(_)
                | Error::InvalidWorkerId(_)
                | Error::InvalidDatacenterId(_)
                | Error::WorkerIdFailed(_)
                | Error::DatacenterIdFailed(_)
                | Error::CheckWorkerIdFailed
                | Error::CheckDatacenterIdFailed
                | Error::EnvVarMissing(_)
                | Error::EnvVarInvalid { .. }
        )
    }

    /// Returns true if the wall clock was observed moving backwards.
    ///
    /// The caller decides whether to retry after a delay, alert, or fail the request.
    pub fn is_clock_regression(&self) -> bool {
        matches!(self, Error::ClockMovedBackwards(_))
    }
}
