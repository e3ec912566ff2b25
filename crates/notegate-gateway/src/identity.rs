//! Client identity resolution.

use axum::http::HeaderMap;

/// Proxy-supplied client address list.
pub const FORWARDED_FOR: &str = "x-forwarded-for";
/// Proxy-supplied single client address.
pub const REAL_IP: &str = "x-real-ip";

/// Derive the identity a request is counted against.
///
/// Uses the first `X-Forwarded-For` entry, then `X-Real-IP`, then the peer
/// address with its trailing `:port` removed. Values are not validated and
/// the function never fails.
#[must_use]
pub fn client_identity(headers: &HeaderMap, peer: &str) -> String {
    if let Some(first) = header_str(headers, FORWARDED_FOR)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = header_str(headers, REAL_IP).filter(|ip| !ip.is_empty()) {
        return real_ip.to_string();
    }

    strip_port(peer).to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn strip_port(addr: &str) -> &str {
    addr.rfind(':').map_or(addr, |idx| &addr[..idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let h = headers(&[(FORWARDED_FOR, " 203.0.113.7 , 10.0.0.1"), (REAL_IP, "10.0.0.2")]);
        assert_eq!(client_identity(&h, "127.0.0.1:5000"), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let h = headers(&[(REAL_IP, "198.51.100.4")]);
        assert_eq!(client_identity(&h, "127.0.0.1:5000"), "198.51.100.4");
    }

    #[test]
    fn test_empty_forwarded_for_falls_through() {
        let h = headers(&[(FORWARDED_FOR, " , 10.0.0.1"), (REAL_IP, "198.51.100.4")]);
        assert_eq!(client_identity(&h, "127.0.0.1:5000"), "198.51.100.4");
    }

    #[test]
    fn test_peer_address_port_stripped() {
        assert_eq!(client_identity(&HeaderMap::new(), "192.0.2.1:41234"), "192.0.2.1");
    }

    #[test]
    fn test_ipv6_peer_strips_after_last_colon() {
        assert_eq!(client_identity(&HeaderMap::new(), "[::1]:8080"), "[::1]");
    }

    #[test]
    fn test_malformed_peer_returned_as_is() {
        assert_eq!(client_identity(&HeaderMap::new(), "unix-socket"), "unix-socket");
    }
}
