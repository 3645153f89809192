// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::Snowflake;
use crate::env;
use crate::error::{BoxDynError, Error};
use crate::machine;
use crate::snowflake::{
    DEFAULT_EPOCH_MILLIS, Internals, MAX_DATACENTER_ID, MAX_WORKER_ID, SharedSnowflake,
};
use chrono::prelude::*;
use parking_lot::Mutex;
use std::cell::OnceCell;
use std::sync::Arc;
use tracing::debug;

type IdFn<'a> = &'a dyn Fn() -> Result<i64, BoxDynError>;
type CheckFn<'a> = &'a dyn Fn(i64) -> bool;

/// A builder for building the [`Snowflake`] generator.
pub struct Builder<'a> {
    start_time: Option<DateTime<Utc>>,
    worker_id: Option<IdFn<'a>>,
    datacenter_id: Option<IdFn<'a>>,
    check_worker_id: Option<CheckFn<'a>>,
    check_datacenter_id: Option<CheckFn<'a>>,
}

impl<'a> Default for Builder<'a> {
    fn default() -> Self {
        Builder::new()
    }
}

impl<'a> Builder<'a> {
    /// Construct a new builder for the build of [`Snowflake`].
    pub fn new() -> Self {
        Self {
            start_time: None,
            worker_id: None,
            datacenter_id: None,
            check_worker_id: None,
            check_datacenter_id: None,
        }
    }

    /// Set the start time.
    /// If the time is set later than the current time, 'finalize' will fail.
    pub fn start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Set the worker ID.
    /// If the provided closure returns an error, 'finalize' will fail.
    pub fn worker_id(mut self, worker_id: IdFn<'a>) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    /// Set the data center ID.
    /// If the provided closure returns an error, 'finalize' will fail.
    pub fn datacenter_id(mut self, datacenter_id: IdFn<'a>) -> Self {
        self.datacenter_id = Some(datacenter_id);
        self
    }

    /// Set up a function to check the worker ID.
    /// If the function returns 'false', 'finalize' will fail.
    pub fn check_worker_id(mut self, check_worker_id: CheckFn<'a>) -> Self {
        self.check_worker_id = Some(check_worker_id);
        self
    }

    /// Set up a function to check the data center ID.
    /// If the function returns 'false', 'finalize' will fail.
    pub fn check_datacenter_id(mut self, check_datacenter_id: CheckFn<'a>) -> Self {
        self.check_datacenter_id = Some(check_datacenter_id);
        self
    }

    /// Finish building and create a Snowflake instance.
    ///
    /// An id without a closure is read from the environment. If its variable
    /// is unset, the id is derived from the machine fingerprint instead; a
    /// variable that is set but malformed or out of range is an error.
    pub fn finalize(self) -> Result<Snowflake, Error> {
        let epoch = if let Some(start_time) = self.start_time {
            if start_time > Utc::now() {
                return Err(Error::StartTimeAheadOfCurrentTime(start_time));
            }
            start_time.timestamp_millis()
        } else {
            DEFAULT_EPOCH_MILLIS
        };

        // Shared by both fallbacks so the machine is inspected at most once.
        let fingerprint = OnceCell::new();

        let worker_id = match self.worker_id {
            Some(worker_id_fn) => worker_id_fn().map_err(Error::WorkerIdFailed)?,
            None => match env::worker_id_from_env() {
                Ok(worker_id) => worker_id,
                Err(Error::EnvVarMissing(name)) => {
                    let worker_id = machine::derive_id(
                        fingerprint.get_or_init(machine::machine_fingerprint),
                        machine::WORKER_SUFFIX,
                    );
                    debug!(env = name, worker_id, "using machine-derived worker id");
                    worker_id
                }
                Err(err) => return Err(err),
            },
        };

        if !(0..=MAX_WORKER_ID).contains(&worker_id) {
            return Err(Error::InvalidWorkerId(worker_id));
        }

        if let Some(check_worker_id) = self.check_worker_id
            && !check_worker_id(worker_id)
        {
            return Err(Error::CheckWorkerIdFailed);
        }

        let datacenter_id = match self.datacenter_id {
            Some(datacenter_id_fn) => datacenter_id_fn().map_err(Error::DatacenterIdFailed)?,
            None => match env::datacenter_id_from_env() {
                Ok(datacenter_id) => datacenter_id,
                Err(Error::EnvVarMissing(name)) => {
                    let datacenter_id = machine::derive_id(
                        fingerprint.get_or_init(machine::machine_fingerprint),
                        machine::DATACENTER_SUFFIX,
                    );
                    debug!(env = name, datacenter_id, "using machine-derived datacenter id");
                    datacenter_id
                }
                Err(err) => return Err(err),
            },
        };

        if !(0..=MAX_DATACENTER_ID).contains(&datacenter_id) {
            return Err(Error::InvalidDatacenterId(datacenter_id));
        }

        if let Some(check_datacenter_id) = self.check_datacenter_id
            && !check_datacenter_id(datacenter_id)
        {
            return Err(Error::CheckDatacenterIdFailed);
        }

        let shared = Arc::new(SharedSnowflake {
            epoch,
            datacenter_id,
            worker_id,
            internals: Mutex::new(Internals {
                last_timestamp: -1,
                sequence: 0,
            }),
        });
        Ok(Snowflake::new_inner(shared))
    }
}
