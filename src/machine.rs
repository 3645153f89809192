// Copyright 2022 houseme
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Worker and data center ids derived from machine characteristics.
//!
//! The fingerprint combines the hostname, the first usable MAC address, the
//! local address used for outbound traffic, the target OS and architecture,
//! and the process id. Hashing it and keeping five bits gives a best effort
//! id only: distinct hosts can collide, and operators who need strict
//! uniqueness should assign ids through the environment instead.

use pnet_datalink::MacAddr;
use sha2::{Digest, Sha256};
use std::net::{IpAddr, UdpSocket};

/// Suffix hashed with the fingerprint to derive a worker id.
pub const WORKER_SUFFIX: &str = "_worker";
/// Suffix hashed with the fingerprint to derive a data center id.
pub const DATACENTER_SUFFIX: &str = "_datacenter";

/// Worker id in `[0, 31]` derived from [`machine_fingerprint`].
pub fn machine_worker_id() -> i64 {
    derive_id(&machine_fingerprint(), WORKER_SUFFIX)
}

/// Data center id in `[0, 31]` derived from [`machine_fingerprint`].
pub fn machine_datacenter_id() -> i64 {
    derive_id(&machine_fingerprint(), DATACENTER_SUFFIX)
}

/// `(worker_id, datacenter_id)` derived from a single fingerprint.
pub fn machine_ids() -> (i64, i64) {
    let fingerprint = machine_fingerprint();
    (
        derive_id(&fingerprint, WORKER_SUFFIX),
        derive_id(&fingerprint, DATACENTER_SUFFIX),
    )
}

/// Hash `fingerprint` with `suffix` and keep the low five bits of the first digest byte.
///
/// The suffix decorrelates ids derived from the same fingerprint.
pub fn derive_id(fingerprint: &str, suffix: &str) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint.as_bytes());
    hasher.update(suffix.as_bytes());
    let digest = hasher.finalize();
    i64::from(digest[0] & 0x1F)
}

/// Collect the machine fingerprint. Components that cannot be read are skipped.
pub fn machine_fingerprint() -> String {
    let mut info = String::new();
    if let Some(hostname) = hostname() {
        info.push_str(&hostname);
    }
    if let Some(mac) = mac_address() {
        info.push_str(&mac.to_string());
    }
    if let Some(ip) = local_ip() {
        info.push_str(&ip.to_string());
    }
    info.push_str(std::env::consts::OS);
    info.push_str(std::env::consts::ARCH);
    info.push_str(&std::process::id().to_string());
    info
}

/// The OS hostname, independent of any `HOSTNAME` variable.
fn hostname() -> Option<String> {
    hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

/// MAC address of the first interface that is up and not a loopback.
fn mac_address() -> Option<MacAddr> {
    pnet_datalink::interfaces()
        .into_iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .find_map(|iface| iface.mac.filter(|mac| *mac != MacAddr::zero()))
}

/// The local address the OS picks to reach a public host.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
