//! Unit tests for the diagnostic socket-address lookup.

use std::net::{Ipv4Addr, SocketAddrV4};

use opi_server::net::{format_socket_address, local_ipv4, socket_address};

#[test]
fn formats_ipv4_and_port() {
    assert_eq!(
        format_socket_address(Ipv4Addr::new(192, 168, 1, 7), 50008),
        "192.168.1.7:50008"
    );
}

#[test]
fn formatted_address_parses_as_socket_address() {
    let text = format_socket_address(Ipv4Addr::new(10, 0, 0, 1), 1);
    let addr: SocketAddrV4 = text.parse().expect("socket address");
    assert_eq!(addr, SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 1));
}

#[test]
fn local_address_is_never_loopback_or_unspecified() {
    // Hosts without a default route report nothing, which is also valid.
    if let Some(ip) = local_ipv4() {
        assert!(!ip.is_loopback());
        assert!(!ip.is_unspecified());
    }
}

#[test]
fn reported_address_carries_the_requested_port() {
    let port = 50008;
    let Some(text) = socket_address(port) else {
        return;
    };

    assert!(text.ends_with(&format!(":{port}")), "got {text}");
    let addr: SocketAddrV4 = text.parse().expect("socket address");
    assert_eq!(addr.port(), port);
    assert!(!addr.ip().is_loopback());
}
