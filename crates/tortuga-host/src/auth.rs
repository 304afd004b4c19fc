//! Network/token authorization gate. Runs before any core call: a denial
//! must prevent every log append and read.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use axum::http::HeaderMap;

use crate::config::{AuthConfig, AuthMode};

pub const TOKEN_HEADER: &str = "x-kari-token";
pub const TOKEN_QUERY_PARAM: &str = "t";
pub const TOKEN_COOKIE: &str = "kari_token";

pub fn is_authorized(
    auth: &AuthConfig,
    client_ip: Option<IpAddr>,
    presented: Option<&str>,
) -> bool {
    let expected = auth.token.as_deref().filter(|token| !token.is_empty());
    let (AuthMode::Token, Some(expected)) = (auth.mode, expected) else {
        // Token checks disabled: restrict to private networks when
        // configured, otherwise fully open (trusted environments only).
        return if auth.allow_private {
            client_ip.is_some_and(is_private_addr)
        } else {
            true
        };
    };
    if presented == Some(expected) {
        return true;
    }
    auth.allow_private && client_ip.is_some_and(is_private_addr)
}

/// Original client address: first hop of `X-Forwarded-For` when a proxy is
/// in front (tailscale/nginx), then `X-Real-IP`, then the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        let first = forwarded.split(',').next().unwrap_or("").trim();
        if let Ok(ip) = first.parse() {
            return Some(ip);
        }
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip")
        && let Ok(ip) = real_ip.trim().parse()
    {
        return Some(ip);
    }
    peer.map(|addr| addr.ip())
}

/// Token presented via header, `t` query parameter, or cookie, in that
/// order of precedence.
pub fn presented_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(token) = header_str(headers, TOKEN_HEADER) {
        return Some(token.to_string());
    }
    if let Some(query) = query
        && let Some(token) = query_param(query, TOKEN_QUERY_PARAM)
    {
        return Some(token);
    }
    cookie_value(headers, TOKEN_COOKIE)
}

pub fn is_private_addr(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || in_cgnat_range(v4)
        }
        IpAddr::V6(v6) => v6.is_loopback() || is_unique_local(v6) || is_link_local(v6),
    }
}

// 100.64.0.0/10 — tailnet peers usually appear here.
fn in_cgnat_range(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 100 && (octets[1] & 0xc0) == 64
}

// fc00::/7
fn is_unique_local(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

// fe80::/10
fn is_link_local(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = header_str(headers, "cookie")?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
