//! Canonical form of the address a rule is keyed on.
//!
//! Callers hand in whatever the HTTP layer saw: `1.2.3.4`, `1.2.3.4:5000`,
//! `[fe80::1%eth0]:443`, `::ffff:10.0.0.1`. Rules and lookups are compared on
//! the normalized string, so the same viewer always lands on the same key.

use std::net::{IpAddr, SocketAddr};

use crate::error::{GuardError, GuardResult};

/// Normalize a viewer address.
///
/// Strips surrounding whitespace, a port, IPv6 brackets and an IPv6 zone
/// index, and renders parseable addresses in canonical text form (IPv4-mapped
/// IPv6 becomes plain IPv4). Strings that are not IP addresses are kept
/// verbatim after trimming so opaque identifiers still work as rule subjects.
///
/// # Errors
///
/// Returns [`GuardError::InvalidInput`] if the address is blank.
pub fn normalize(raw: &str) -> GuardResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GuardError::missing_address());
    }

    if let Ok(sock) = trimmed.parse::<SocketAddr>() {
        return Ok(canonical(sock.ip()));
    }

    let unbracketed = strip_brackets(trimmed);
    let unzoned = unbracketed.split_once('%').map_or(unbracketed, |(ip, _)| ip);

    if let Ok(ip) = unzoned.parse::<IpAddr>() {
        return Ok(canonical(ip));
    }

    // `host:port` where host is IPv4; IPv6 without brackets never carries a port.
    if let Some((host, port)) = unzoned.rsplit_once(':') {
        if port.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(ip) = host.parse::<IpAddr>() {
                return Ok(canonical(ip));
            }
        }
    }

    Ok(trimmed.to_string())
}

fn strip_brackets(addr: &str) -> &str {
    let Some(inner) = addr.strip_prefix('[') else {
        return addr;
    };
    match inner.find(']') {
        Some(end) => &inner[..end],
        None => addr,
    }
}

fn canonical(ip: IpAddr) -> String {
    ip.to_canonical().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1.2.3.4", "1.2.3.4" ; "plain ipv4")]
    #[test_case("  1.2.3.4\n", "1.2.3.4" ; "surrounding whitespace")]
    #[test_case("1.2.3.4:8080", "1.2.3.4" ; "ipv4 with port")]
    #[test_case("2001:DB8::1", "2001:db8::1" ; "ipv6 uppercase")]
    #[test_case("2001:0db8:0000:0000:0000:0000:0000:0001", "2001:db8::1" ; "ipv6 uncompressed")]
    #[test_case("[2001:db8::1]:443", "2001:db8::1" ; "bracketed ipv6 with port")]
    #[test_case("[2001:db8::1]", "2001:db8::1" ; "bracketed ipv6")]
    #[test_case("fe80::1%eth0", "fe80::1" ; "ipv6 with zone")]
    #[test_case("[fe80::1%eth0]:443", "fe80::1" ; "bracketed ipv6 with zone and port")]
    #[test_case("::ffff:10.0.0.1", "10.0.0.1" ; "ipv4 mapped ipv6")]
    #[test_case("viewer-42", "viewer-42" ; "opaque identifier")]
    fn test_normalize(raw: &str, expected: &str) {
        assert_eq!(normalize(raw).unwrap(), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "spaces")]
    #[test_case("\t\n" ; "control whitespace")]
    fn test_normalize_rejects_blank(raw: &str) {
        let err = normalize(raw).unwrap_err();
        assert!(matches!(err, GuardError::InvalidInput(_)));
    }

    #[test]
    fn test_unterminated_bracket_kept_verbatim() {
        assert_eq!(normalize("[::1").unwrap(), "[::1");
    }
}
