//! IP address parsing, formatting and CIDR range expansion
//!
//! IPv4 addresses are plain `u32` in network (big-endian) interpretation;
//! IPv6 addresses are `u128`, which orders identically to the (hi, lo)
//! pair stored on the wire.
//!
//! Two parsing flavors exist on purpose. [`check_ipv4`] / [`check_ipv6`]
//! are strict validators. [`ipv4_from_str`] / [`ipv6_from_str`] are the
//! lookup-path scanners: they never fail, mapping garbage to address 0 so
//! a bad query degrades into a miss, or a spurious hit on a 0.0.0.0 range.
//! Callers that care validate first.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Strict IPv4 validator (dotted quad, each octet 0-255)
pub fn check_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}

/// Strict IPv6 validator (any standard textual form)
pub fn check_ipv6(s: &str) -> bool {
    s.parse::<Ipv6Addr>().is_ok()
}

/// Permissive IPv4 scanner: digits accumulate, `.` shifts, anything else
/// aborts to 0
pub fn ipv4_from_str(s: &str) -> u32 {
    let mut ip: u32 = 0;
    let mut octet: u32 = 0;
    for b in s.bytes() {
        match b {
            b'0'..=b'9' => octet = octet.wrapping_mul(10).wrapping_add((b - b'0') as u32),
            b'.' => {
                ip = (ip << 8) | octet;
                octet = 0;
            }
            _ => return 0,
        }
    }
    (ip << 8) | octet
}

/// Dotted-quad form of an IPv4 address
pub fn ipv4_to_string(ip: u32) -> String {
    format!(
        "{}.{}.{}.{}",
        (ip >> 24) & 0xff,
        (ip >> 16) & 0xff,
        (ip >> 8) & 0xff,
        ip & 0xff
    )
}

/// IPv6 parser over the standard textual forms; parse failure yields the
/// all-zero address
pub fn ipv6_from_str(s: &str) -> u128 {
    s.parse::<Ipv6Addr>().map(u128::from).unwrap_or(0)
}

/// Eight 4-hex-digit groups, never the `::` compressed form
pub fn ipv6_to_string(ip: u128) -> String {
    format!(
        "{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}:{:04x}",
        (ip >> 112) & 0xffff,
        (ip >> 96) & 0xffff,
        (ip >> 80) & 0xffff,
        (ip >> 64) & 0xffff,
        (ip >> 48) & 0xffff,
        (ip >> 32) & 0xffff,
        (ip >> 16) & 0xffff,
        ip & 0xffff
    )
}

/// Leading-digits prefix length, clamped to the address width
fn parse_prefix(s: &str, max: u32) -> u32 {
    let mut v: u32 = 0;
    for b in s.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        v = v.saturating_mul(10).saturating_add((b - b'0') as u32);
    }
    v.min(max)
}

/// Expand an IPv4 CIDR network (or plain address) to an inclusive range
pub fn net4_to_range(net: &str) -> (u32, u32) {
    let Some((addr, prefix)) = net.split_once('/') else {
        let ip = ipv4_from_str(net);
        return (ip, ip);
    };
    let ip = ipv4_from_str(addr);
    let m = parse_prefix(prefix, 32);
    let mask: u32 = if m == 0 { 0 } else { u32::MAX << (32 - m) };
    (ip & mask, ip | !mask)
}

/// Expand an IPv6 CIDR network (or plain address) to an inclusive range
pub fn net6_to_range(net: &str) -> (u128, u128) {
    let Some((addr, prefix)) = net.split_once('/') else {
        let ip = ipv6_from_str(net);
        return (ip, ip);
    };
    let ip = ipv6_from_str(addr);
    let m = parse_prefix(prefix, 128);
    let mask: u128 = if m == 0 { 0 } else { u128::MAX << (128 - m) };
    (ip & mask, ip | !mask)
}
