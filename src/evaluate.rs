use std::net::Ipv4Addr;

use tracing::{trace, warn};

use crate::parse::literal;
use crate::types::{Action, Condition, Descriptor, Packet, Role, Rule, Verdict, META_LAYER};

impl Condition {
    /// Test the packet against the descriptor value the condition was
    /// matched with. A field the packet does not carry never matches.
    #[must_use]
    pub fn test(self, packet: &Packet, value: &str) -> bool {
        match self {
            Condition::Protocol(p) => packet.get_type() == Some(p),
            Condition::SourcePort(p) => port_is(packet, &format!("{}.sport", p.layer()), value),
            Condition::DestinationPort(p) => {
                port_is(packet, &format!("{}.dport", p.layer()), value)
            }
            Condition::SourceAddress => address_in(packet, "IP.src", value),
            Condition::DestinationAddress => address_in(packet, "IP.dst", value),
            Condition::InInterface => meta_is(packet, "in_interface", value),
            Condition::OutInterface => meta_is(packet, "out_interface", value),
            Condition::State => meta_is(packet, "state", value),
        }
    }
}

fn port_is(packet: &Packet, path: &str, value: &str) -> bool {
    let Ok(want) = literal::parse_port(value) else {
        return false;
    };
    packet
        .get(path)
        .and_then(|v| v.as_int())
        .is_some_and(|have| have == i64::from(want))
}

fn address_in(packet: &Packet, path: &str, value: &str) -> bool {
    let Ok(network) = literal::parse_network(value) else {
        return false;
    };
    packet
        .get(path)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<Ipv4Addr>().ok())
        .is_some_and(|addr| network.contains(addr))
}

fn meta_is(packet: &Packet, field: &str, value: &str) -> bool {
    packet
        .get(&format!("{META_LAYER}.{field}"))
        .and_then(|v| v.as_str())
        .is_some_and(|have| have == value)
}

impl Action {
    /// Apply the action to a copy of the packet.
    ///
    /// A NAT target that no longer parses (after an edit through
    /// [`Rule::set_value`](crate::Rule::set_value)) forwards the packet
    /// unchanged.
    pub fn apply(self, packet: &Packet, value: &str) -> Verdict {
        match self {
            Action::Accept => Verdict::Forward(packet.clone()),
            Action::Drop => Verdict::Drop,
            Action::SourceNat => Verdict::Forward(rewrite(packet, value, "src", "sport")),
            Action::DestinationNat => Verdict::Forward(rewrite(packet, value, "dst", "dport")),
        }
    }
}

fn rewrite(packet: &Packet, value: &str, addr_field: &str, port_field: &str) -> Packet {
    let target = match literal::parse_address_port(value) {
        Ok(target) => target,
        Err(err) => {
            warn!(%err, "NAT target not applied");
            return packet.clone();
        }
    };
    let mut out = packet.clone();
    out.insert(&format!("IP.{addr_field}"), target.addr.to_string().into());
    if let (Some(port), Some(proto)) = (target.port, packet.get_type()) {
        if proto.has_ports() {
            out.insert(&format!("{}.{port_field}", proto.layer()), port.into());
        }
    }
    out
}

/// Run matched descriptors against a packet: every condition must hold, and
/// the last action seen decides. `None` means the rule does not match.
pub(crate) fn run_descriptors(descriptors: &[Descriptor], packet: &Packet) -> Option<Verdict> {
    let mut action = None;
    for d in descriptors {
        match d.role() {
            Role::Condition(c) => {
                if !c.test(packet, d.value().unwrap_or("")) {
                    trace!(descriptor = %d, "condition failed");
                    return None;
                }
            }
            Role::Action(a) => action = Some((a, d.value().unwrap_or(""))),
            Role::Structural(_) => {}
        }
    }
    action.map(|(a, value)| a.apply(packet, value))
}

/// First rule in chain order that matches, with its index.
pub(crate) fn evaluate_chain(rules: &[Rule], packet: &Packet) -> Option<(usize, Verdict)> {
    rules
        .iter()
        .enumerate()
        .find_map(|(i, rule)| rule.run_on_packet(packet).map(|v| (i, v)))
}
