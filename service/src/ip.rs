// ## src/ip.rs

//! Client-IP helpers shared by authorization and session validation.

use std::net::Ipv4Addr;

/// Pick the client IP the way a reverse-proxied deployment must: prefer
/// `X-Real-IP`, then the first `X-Forwarded-For` entry, but only when the
/// upstream proxy is marked trusted; otherwise use the peer address.
pub fn client_ip(
    x_real_ip: Option<&str>,
    x_forwarded_for: Option<&str>,
    trusted_proxy: bool,
    peer: &str,
) -> String {
    if trusted_proxy {
        if let Some(real) = x_real_ip {
            let real = real.trim();
            if !real.is_empty() {
                return real.to_string();
            }
        }
        if let Some(forwarded) = x_forwarded_for {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }
    peer.to_string()
}

/// IP equality with mobile-network tolerance.
///
/// Two IPv4 addresses match when their first three octets agree (the last
/// octet is free to change as carrier NAT rotates). Everything else,
/// IPv6 included, requires exact equality.
pub fn ips_match_with_tolerance(stored: &str, current: &str) -> bool {
    if stored == current {
        return true;
    }
    match (stored.parse::<Ipv4Addr>(), current.parse::<Ipv4Addr>()) {
        (Ok(a), Ok(b)) => a.octets()[..3] == b.octets()[..3],
        _ => false,
    }
}
