//! Client address extraction for audit metadata.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Best-effort client IP.
///
/// With `trusted_proxies` reverse proxies in front, the client is the entry just before the
/// last `trusted_proxies` entries of `X-Forwarded-For`. Falls back to `X-Real-IP`, then the
/// socket peer. Entries that do not parse as an IP address are ignored.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxies: usize,
) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|chain| from_forwarded_chain(chain, trusted_proxies))
        .or_else(|| header_str(headers, "x-real-ip").and_then(parse_ip))
        .or_else(|| socket_addr.map(|addr| addr.ip()))
        .map(|ip| ip.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse().ok()
}

fn from_forwarded_chain(chain: &str, trusted_proxies: usize) -> Option<IpAddr> {
    let hops: Vec<&str> = chain
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let last = hops.len().checked_sub(1)?;
    // Too short a chain means the header was not written by our proxies; use the nearest hop.
    let index = last.checked_sub(trusted_proxies).unwrap_or(last);
    parse_ip(hops[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_forwarded_chain_skips_trusted_proxies() {
        assert_eq!(
            from_forwarded_chain("192.168.1.1, 10.0.0.1", 1),
            parse_ip("192.168.1.1")
        );
        assert_eq!(
            from_forwarded_chain("192.168.1.1, 10.0.0.1, 10.0.0.2", 2),
            parse_ip("192.168.1.1")
        );
        assert_eq!(from_forwarded_chain("192.168.1.1, 10.0.0.1", 0), parse_ip("10.0.0.1"));
        assert_eq!(from_forwarded_chain("192.168.1.1", 3), parse_ip("192.168.1.1"));
        assert_eq!(from_forwarded_chain("not-an-ip", 0), None);
    }

    #[test]
    fn test_fallbacks() {
        let ip = extract_client_ip(&headers("x-real-ip", " ::1 "), None, 1);
        assert_eq!(ip.as_deref(), Some("::1"));

        let socket = SocketAddr::from(([127, 0, 0, 1], 8080));
        let ip = extract_client_ip(&headers("x-forwarded-for", "garbage"), Some(&socket), 1);
        assert_eq!(ip.as_deref(), Some("127.0.0.1"));

        assert_eq!(extract_client_ip(&HeaderMap::new(), None, 1), None);
    }
}
