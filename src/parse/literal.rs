//! Recognizers for the value literals that follow rule flags: IPv4
//! addresses, CIDR networks, `address[:port]` targets and port numbers.

use std::fmt;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use winnow::ascii::digit1;
use winnow::combinator::{opt, preceded};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;

use super::LiteralError;

const NETWORK: &str = "an IPv4 address or CIDR network";
const TARGET: &str = "an IPv4 address with an optional :port";
const PORT: &str = "a port number in 0..=65535";

/// A NAT rewrite target: an address and an optional port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPort {
    pub addr: Ipv4Addr,
    pub port: Option<u16>,
}

impl fmt::Display for AddressPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{port}", self.addr),
            None => write!(f, "{}", self.addr),
        }
    }
}

// -- Components -------------------------------------------------------------

fn octet(input: &mut &str) -> ModalResult<u8> {
    digit1.try_map(str::parse::<u8>).parse_next(input)
}

fn ipv4(input: &mut &str) -> ModalResult<Ipv4Addr> {
    (octet, '.', octet, '.', octet, '.', octet)
        .map(|(a, _, b, _, c, _, d)| Ipv4Addr::new(a, b, c, d))
        .context(StrContext::Expected(StrContextValue::Description(
            "IPv4 address",
        )))
        .parse_next(input)
}

fn prefix_len(input: &mut &str) -> ModalResult<u8> {
    preceded(
        '/',
        digit1
            .try_map(str::parse::<u8>)
            .verify(|len: &u8| *len <= 32),
    )
    .parse_next(input)
}

fn port(input: &mut &str) -> ModalResult<u16> {
    digit1.try_map(str::parse::<u16>).parse_next(input)
}

// -- Public recognizers -----------------------------------------------------

/// Parse `a.b.c.d` or `a.b.c.d/len` into a network. A bare address is a `/32`.
///
/// # Errors
///
/// Returns [`LiteralError`] if the text is not a dotted-quad address with an
/// optional prefix length of at most 32.
pub fn parse_network(text: &str) -> Result<Ipv4Network, LiteralError> {
    let (addr, len) = (ipv4, opt(prefix_len))
        .parse(text)
        .map_err(|_| LiteralError::new(text, NETWORK))?;
    Ipv4Network::new(addr, len.unwrap_or(32)).map_err(|_| LiteralError::new(text, NETWORK))
}

/// Parse `a.b.c.d` or `a.b.c.d:port`.
///
/// # Errors
///
/// Returns [`LiteralError`] if the address or port is malformed.
pub fn parse_address_port(text: &str) -> Result<AddressPort, LiteralError> {
    (ipv4, opt(preceded(':', port)))
        .map(|(addr, port)| AddressPort { addr, port })
        .parse(text)
        .map_err(|_| LiteralError::new(text, TARGET))
}

/// Parse a decimal port number.
///
/// # Errors
///
/// Returns [`LiteralError`] for non-digits or values above 65535.
pub fn parse_port(text: &str) -> Result<u16, LiteralError> {
    port.parse(text).map_err(|_| LiteralError::new(text, PORT))
}

#[must_use]
pub fn is_ip_or_cidr(text: &str) -> bool {
    parse_network(text).is_ok()
}

#[must_use]
pub fn is_address_port(text: &str) -> bool {
    parse_address_port(text).is_ok()
}
