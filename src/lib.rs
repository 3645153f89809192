// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Identifier generation and obfuscation.
//!
//! - [`Snowflake`]: 64-bit ids made of a millisecond timestamp, a data center
//!   id, a worker id and a per-millisecond sequence, inspired by
//!   [Twitter's Snowflake].
//! - [`FlowNumberGenerator`]: sortable string ids such as
//!   `SF2024010112000012345678`, built from the wall clock, a local sequence and
//!   a random suffix.
//! - [`IntObfuscator`]: a reversible bit transform that masks ids before they
//!   leave the service. It is not encryption.
//!
//! ## Quickstart
//!
//! ```
//! use idworker::Snowflake;
//!
//! let sf = Snowflake::init(1, 1).unwrap();
//! let next_id = sf.next_id().unwrap();
//! println!("{}", next_id);
//! ```
//!
//! ## Concurrent use
//!
//! Snowflake is thread safe. `clone` it before moving to another thread;
//! clones share the same sequence:
//! ```
//! use idworker::Snowflake;
//! use std::thread;
//!
//! let sf = Snowflake::init(3, 7).unwrap();
//!
//! let mut children = Vec::new();
//! for _ in 0..10 {
//!     let thread_sf = sf.clone();
//!     children.push(thread::spawn(move || {
//!         println!("{}", thread_sf.next_id().unwrap());
//!     }));
//! }
//!
//! for child in children {
//!     child.join().unwrap();
//! }
//! ```
//!
//! ## Configuration
//!
//! [`Snowflake::new`] reads `IDWORKER_WORKER_ID` and `IDWORKER_DATACENTER_ID`.
//! Unset variables fall back to ids hashed from the machine fingerprint, see
//! [`machine`].
//!
//! ## Masking ids
//!
//! ```
//! use idworker::IntObfuscator;
//!
//! let obfuscator = IntObfuscator::new(0x1234_5678);
//! let public = obfuscator.obfuscate(1001);
//! assert_eq!(obfuscator.deobfuscate(public), 1001);
//! ```
//!
//! [Twitter's Snowflake]: https://blog.twitter.com/2010/announcing-snowflake

mod builder;
pub mod env;
mod error;
mod flow_no;
pub mod machine;
mod obfuscator;
mod short_id;
mod snowflake;

pub use crate::snowflake::*;
pub use builder::*;
pub use error::*;
pub use flow_no::*;
pub use obfuscator::*;
pub use short_id::*;
