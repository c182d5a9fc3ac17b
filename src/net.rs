//! Diagnostic socket-address lookup for the device UI.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

/// Public address used only to select the outbound interface; no packet
/// is sent because UDP `connect` merely fixes the peer.
const ROUTE_TARGET: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 80);

/// First non-loopback IPv4 address of the interface holding the default
/// route, if the host has one.
#[must_use]
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(ROUTE_TARGET).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// `"<ipv4>:<port>"` clients should connect to, or `None` without a
/// usable network interface.
#[must_use]
pub fn socket_address(port: u16) -> Option<String> {
    local_ipv4().map(|ip| format_socket_address(ip, port))
}

/// Format an address the way [`socket_address`] reports it.
#[must_use]
pub fn format_socket_address(ip: Ipv4Addr, port: u16) -> String {
    format!("{ip}:{port}")
}
