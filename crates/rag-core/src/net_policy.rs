//! Network-level allow-list enforced at every service's HTTP boundary:
//! clients must originate from loopback or a private-subnet address.

use std::net::IpAddr;

/// True if `addr` is loopback or within `10.0.0.0/8`, `172.16.0.0/12`, or
/// `192.168.0.0/16`.
#[must_use]
pub fn is_allowed(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            if v4.is_loopback() {
                return true;
            }
            let octets = v4.octets();
            matches!(octets[0], 10)
                || (octets[0] == 172 && (16..=31).contains(&octets[1]))
                || (octets[0] == 192 && octets[1] == 168)
        }
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_v4_allowed() {
        assert!(is_allowed("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn loopback_v6_allowed() {
        assert!(is_allowed("::1".parse().unwrap()));
    }

    #[test]
    fn ten_slash_eight_allowed() {
        assert!(is_allowed("10.1.2.3".parse().unwrap()));
    }

    #[test]
    fn private_172_range_allowed() {
        assert!(is_allowed("172.16.0.5".parse().unwrap()));
        assert!(is_allowed("172.31.255.255".parse().unwrap()));
        assert!(!is_allowed("172.32.0.1".parse().unwrap()));
        assert!(!is_allowed("172.15.255.255".parse().unwrap()));
    }

    #[test]
    fn private_192_168_allowed() {
        assert!(is_allowed("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn public_address_rejected() {
        assert!(!is_allowed("8.8.8.8".parse().unwrap()));
        assert!(!is_allowed("203.0.113.5".parse().unwrap()));
    }
}
