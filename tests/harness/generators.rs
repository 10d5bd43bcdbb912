// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for attack simulation.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Generate a pool of client addresses for testing.
pub fn generate_client_addrs(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c)).to_string()
        })
        .collect()
}

/// Generate IPv6 client addresses from one /64, as a rotating attacker would.
pub fn generate_ipv6_addrs(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, i as u16 + 1)).to_string())
        .collect()
}

/// Generate a pool of form identifiers.
pub fn generate_form_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("form-{}", i)).collect()
}

/// Identifier pairs whose naive concatenation is identical.
/// Each pair must still land in distinct buckets.
pub fn generate_lookalike_pairs() -> Vec<((&'static str, &'static str), (&'static str, &'static str))> {
    vec![
        (("contact", "10.0.0.1"), ("contact1", "0.0.0.1")),
        (("ab", "c"), ("a", "bc")),
        (("form:", "10.0.0.1"), ("form", ":10.0.0.1")),
        (("a|", "b"), ("a", "|b")),
    ]
}

/// Identifiers the guard must refuse before touching the store.
pub fn generate_blank_identifiers() -> Vec<&'static str> {
    vec!["", " ", "   ", "\t", "\n", " \t\r\n"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_client_addrs() {
        let addrs = generate_client_addrs(300);
        assert_eq!(addrs.len(), 300);
        // All should be unique
        let unique: std::collections::HashSet<_> = addrs.iter().collect();
        assert_eq!(unique.len(), 300);
        assert_eq!(addrs[0], "10.0.0.0");
        assert_eq!(addrs[257], "10.0.1.1");
    }

    #[test]
    fn test_generate_ipv6_addrs() {
        let addrs = generate_ipv6_addrs(3);
        assert_eq!(addrs, vec!["2001:db8::1", "2001:db8::2", "2001:db8::3"]);
    }

    #[test]
    fn test_lookalike_pairs_concatenate_equal() {
        for ((form_a, client_a), (form_b, client_b)) in generate_lookalike_pairs() {
            assert_eq!(format!("{form_a}{client_a}"), format!("{form_b}{client_b}"));
        }
    }
}
