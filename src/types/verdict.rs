use std::fmt;

use super::Packet;

/// Outcome of a matching rule's action.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Verdict {
    /// The packet is discarded.
    Drop,
    /// The packet continues, possibly rewritten.
    Forward(Packet),
}

impl Verdict {
    #[must_use]
    pub fn is_drop(&self) -> bool {
        matches!(self, Verdict::Drop)
    }

    /// The forwarded packet, or `None` for a drop.
    #[must_use]
    pub fn packet(&self) -> Option<&Packet> {
        match self {
            Verdict::Drop => None,
            Verdict::Forward(p) => Some(p),
        }
    }

    #[must_use]
    pub fn into_packet(self) -> Option<Packet> {
        match self {
            Verdict::Drop => None,
            Verdict::Forward(p) => Some(p),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Drop => write!(f, "drop"),
            Verdict::Forward(_) => write!(f, "forward"),
        }
    }
}
