// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Worker and data center ids from the process environment.

use crate::error::Error;
use crate::snowflake::{MAX_DATACENTER_ID, MAX_WORKER_ID};
use tracing::debug;

/// Environment variable holding the worker id.
pub const WORKER_ID_ENV: &str = "IDWORKER_WORKER_ID";
/// Environment variable holding the data center id.
pub const DATACENTER_ID_ENV: &str = "IDWORKER_DATACENTER_ID";

/// Read the worker id from `IDWORKER_WORKER_ID`.
pub fn worker_id_from_env() -> Result<i64, Error> {
    let value = read_var(WORKER_ID_ENV)?;
    parse_id_var(WORKER_ID_ENV, &value, MAX_WORKER_ID, Error::InvalidWorkerId)
}

/// Read the data center id from `IDWORKER_DATACENTER_ID`.
pub fn datacenter_id_from_env() -> Result<i64, Error> {
    let value = read_var(DATACENTER_ID_ENV)?;
    parse_id_var(
        DATACENTER_ID_ENV,
        &value,
        MAX_DATACENTER_ID,
        Error::InvalidDatacenterId,
    )
}

fn read_var(name: &'static str) -> Result<String, Error> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::EnvVarMissing(name)),
    }
}

/// Parse and range-check the value of an id variable.
///
/// Blank values count as unset.
pub(crate) fn parse_id_var(
    name: &'static str,
    value: &str,
    max: i64,
    out_of_range: fn(i64) -> Error,
) -> Result<i64, Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::EnvVarMissing(name));
    }
    let id: i64 = trimmed.parse().map_err(|source| Error::EnvVarInvalid {
        name,
        value: value.to_owned(),
        source,
    })?;
    if !(0..=max).contains(&id) {
        return Err(out_of_range(id));
    }
    debug!(env = name, id, "read id from environment");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_worker(value: &str) -> Result<i64, Error> {
        parse_id_var(WORKER_ID_ENV, value, MAX_WORKER_ID, Error::InvalidWorkerId)
    }

    #[test]
    fn test_parse_valid() {
        assert_eq!(parse_worker("15").unwrap(), 15);
        assert_eq!(parse_worker(" 0 ").unwrap(), 0);
        assert_eq!(parse_worker("31").unwrap(), 31);
    }

    #[test]
    fn test_parse_out_of_range() {
        assert!(matches!(parse_worker("100"), Err(Error::InvalidWorkerId(100))));
        assert!(matches!(parse_worker("32"), Err(Error::InvalidWorkerId(32))));
        assert!(matches!(parse_worker("-1"), Err(Error::InvalidWorkerId(-1))));

        let err = parse_id_var(
            DATACENTER_ID_ENV,
            "40",
            MAX_DATACENTER_ID,
            Error::InvalidDatacenterId,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidDatacenterId(40)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_parse_not_a_number() {
        match parse_worker("abc") {
            Err(Error::EnvVarInvalid { name, value, .. }) => {
                assert_eq!(name, WORKER_ID_ENV);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_blank_is_missing() {
        assert!(matches!(
            parse_worker(""),
            Err(Error::EnvVarMissing(WORKER_ID_ENV))
        ));
        assert!(matches!(
            parse_worker("   "),
            Err(Error::EnvVarMissing(WORKER_ID_ENV))
        ));
    }
}
