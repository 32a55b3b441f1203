use crate::parse::{literal, pair_iter};
use crate::types::{Action, Condition, Descriptor, ProtocolTag, Role};

use super::{is_one_of, Fit, RuleSpecification};

/// Connection-tracking states accepted by `--state`.
pub const STATES: &[&str] = &["NEW", "ESTABLISHED", "RELATED", "INVALID"];

#[derive(Debug, Clone, Copy)]
struct Spelling {
    keyword: &'static str,
    aliases: &'static [&'static str],
    help: &'static str,
}

impl Spelling {
    fn matches(self, token: &str) -> bool {
        token == self.keyword || is_one_of(token, self.aliases)
    }
}

const PROTOCOL: Spelling = Spelling {
    keyword: "-p",
    aliases: &["--protocol"],
    help: "Matches packets of the given transport protocol.",
};
const SOURCE_PORT: Spelling = Spelling {
    keyword: "--sport",
    aliases: &["--source-port"],
    help: "Matches the transport source port.",
};
const DESTINATION_PORT: Spelling = Spelling {
    keyword: "--dport",
    aliases: &["--destination-port"],
    help: "Matches the transport destination port.",
};
const SOURCE_ADDRESS: Spelling = Spelling {
    keyword: "-s",
    aliases: &["--source"],
    help: "Matches the source address or network.",
};
const DESTINATION_ADDRESS: Spelling = Spelling {
    keyword: "-d",
    aliases: &["--destination"],
    help: "Matches the destination address or network.",
};
const IN_INTERFACE: Spelling = Spelling {
    keyword: "-i",
    aliases: &["--in-interface"],
    help: "Matches the interface the packet arrived on.",
};
const OUT_INTERFACE: Spelling = Spelling {
    keyword: "-o",
    aliases: &["--out-interface"],
    help: "Matches the interface the packet leaves on.",
};
const STATE: Spelling = Spelling {
    keyword: "--state",
    aliases: &[],
    help: "Matches the connection-tracking state.",
};
const JUMP: Spelling = Spelling {
    keyword: "-j",
    aliases: &["--jump"],
    help: "Decides what happens to a matching packet.",
};

/// An optional flag group inside a [`RuleSpecification`].
///
/// Every matcher except the port matchers looks at the front of the
/// remaining tokens. Port matchers search the whole remainder pairwise, so a
/// protocol's ports may appear anywhere after its `-p` selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagMatcher {
    /// `-p <proto>` followed by the protocol's own unordered options.
    Protocol {
        protocol: ProtocolTag,
        options: RuleSpecification,
    },
    SourcePort(ProtocolTag),
    DestinationPort(ProtocolTag),
    SourceAddress,
    DestinationAddress,
    InInterface,
    OutInterface,
    State,
    /// `-j ACCEPT|DROP` or `-j SNAT --to-source` / `-j DNAT --to-destination`.
    Jump,
}

impl FlagMatcher {
    /// A protocol selector with source and destination port options when the
    /// protocol has ports.
    #[must_use]
    pub fn protocol(protocol: ProtocolTag) -> Self {
        let options = if protocol.has_ports() {
            vec![
                FlagMatcher::SourcePort(protocol),
                FlagMatcher::DestinationPort(protocol),
            ]
        } else {
            Vec::new()
        };
        FlagMatcher::Protocol {
            protocol,
            options: RuleSpecification::new(options),
        }
    }

    fn spelling(&self) -> Spelling {
        match self {
            FlagMatcher::Protocol { .. } => PROTOCOL,
            FlagMatcher::SourcePort(_) => SOURCE_PORT,
            FlagMatcher::DestinationPort(_) => DESTINATION_PORT,
            FlagMatcher::SourceAddress => SOURCE_ADDRESS,
            FlagMatcher::DestinationAddress => DESTINATION_ADDRESS,
            FlagMatcher::InInterface => IN_INTERFACE,
            FlagMatcher::OutInterface => OUT_INTERFACE,
            FlagMatcher::State => STATE,
            FlagMatcher::Jump => JUMP,
        }
    }

    /// The condition this matcher binds. `None` for the jump matcher.
    fn condition(&self) -> Option<Condition> {
        Some(match self {
            FlagMatcher::Protocol { protocol, .. } => Condition::Protocol(*protocol),
            FlagMatcher::SourcePort(p) => Condition::SourcePort(*p),
            FlagMatcher::DestinationPort(p) => Condition::DestinationPort(*p),
            FlagMatcher::SourceAddress => Condition::SourceAddress,
            FlagMatcher::DestinationAddress => Condition::DestinationAddress,
            FlagMatcher::InInterface => Condition::InInterface,
            FlagMatcher::OutInterface => Condition::OutInterface,
            FlagMatcher::State => Condition::State,
            FlagMatcher::Jump => return None,
        })
    }

    #[must_use]
    pub fn find_fit<'t>(&self, tokens: &[&'t str]) -> Option<Fit<'t>> {
        match self {
            FlagMatcher::Protocol { protocol, options } => {
                self.protocol_fit(*protocol, options, tokens)
            }
            FlagMatcher::SourcePort(_) | FlagMatcher::DestinationPort(_) => self.port_fit(tokens),
            FlagMatcher::SourceAddress | FlagMatcher::DestinationAddress => {
                self.valued_fit(tokens, literal::is_ip_or_cidr)
            }
            FlagMatcher::InInterface | FlagMatcher::OutInterface => {
                self.valued_fit(tokens, |name| !name.is_empty())
            }
            FlagMatcher::State => self.valued_fit(tokens, |s| is_one_of(s, STATES)),
            FlagMatcher::Jump => jump_fit(tokens),
        }
    }

    fn descriptor(&self, condition: Condition, keyword: impl Into<String>) -> Descriptor {
        let spelling = self.spelling();
        Descriptor::new(keyword, Role::Condition(condition), spelling.help)
            .with_aliases(spelling.aliases)
    }

    fn protocol_fit<'t>(
        &self,
        protocol: ProtocolTag,
        options: &RuleSpecification,
        tokens: &[&'t str],
    ) -> Option<Fit<'t>> {
        let [flag, name, rest @ ..] = tokens else {
            return None;
        };
        if !PROTOCOL.matches(flag) || !name.eq_ignore_ascii_case(protocol.as_ref()) {
            return None;
        }
        let d = self
            .descriptor(Condition::Protocol(protocol), format!("-p {protocol}"))
            .with_source(&[*flag, *name]);
        // Options belong to this protocol only up to the next `-p`.
        let end = rest
            .iter()
            .position(|t| PROTOCOL.matches(t))
            .unwrap_or(rest.len());
        let (scope, after) = rest.split_at(end);
        let mut fit = Fit::new(vec![d], scope.to_vec());
        if let Some(nested) = options.find_fit(scope) {
            fit.descriptors.extend(nested.descriptors);
            fit.rest = nested.rest;
        }
        fit.rest.extend_from_slice(after);
        Some(fit)
    }

    fn port_fit<'t>(&self, tokens: &[&'t str]) -> Option<Fit<'t>> {
        let spelling = self.spelling();
        let condition = self.condition()?;
        let (i, flag, value) = pair_iter(tokens).find(|(_, flag, _)| spelling.matches(flag))?;
        let port = literal::parse_port(value).ok()?;
        let d = self
            .descriptor(condition, spelling.keyword)
            .with_value(port.to_string())
            .with_source(&[flag, value]);
        let mut rest = tokens.to_vec();
        rest.drain(i..i + 2);
        Some(Fit::new(vec![d], rest))
    }

    fn valued_fit<'t>(&self, tokens: &[&'t str], accept: impl Fn(&str) -> bool) -> Option<Fit<'t>> {
        let spelling = self.spelling();
        let condition = self.condition()?;
        let [flag, value, rest @ ..] = tokens else {
            return None;
        };
        if !spelling.matches(flag) || !accept(*value) {
            return None;
        }
        let d = self
            .descriptor(condition, spelling.keyword)
            .with_value(*value)
            .with_source(&[*flag, *value]);
        Some(Fit::new(vec![d], rest.to_vec()))
    }

    /// Whether `descriptor` was produced by this matcher.
    #[must_use]
    pub fn produced(&self, descriptor: &Descriptor) -> bool {
        match (self.condition(), descriptor.role()) {
            (Some(c), Role::Condition(d)) => c == d,
            (None, Role::Action(_)) => true,
            _ => false,
        }
    }

    /// Leading literal forms this matcher accepts, for autocomplete.
    #[must_use]
    pub fn forms(&self) -> Vec<String> {
        match self {
            FlagMatcher::Protocol { protocol, .. } => vec![format!("-p {protocol}")],
            FlagMatcher::Jump => vec![
                "-j ACCEPT".to_owned(),
                "-j DROP".to_owned(),
                "-j SNAT --to-source".to_owned(),
                "-j DNAT --to-destination".to_owned(),
            ],
            other => vec![other.spelling().keyword.to_owned()],
        }
    }
}

fn jump_fit<'t>(tokens: &[&'t str]) -> Option<Fit<'t>> {
    let [flag, target, rest @ ..] = tokens else {
        return None;
    };
    if !JUMP.matches(flag) {
        return None;
    }
    let (action, help) = match *target {
        "ACCEPT" => (Action::Accept, "Lets the packet through."),
        "DROP" => (Action::Drop, "Silently discards the packet."),
        "SNAT" => (Action::SourceNat, "Rewrites the source address (and port)."),
        "DNAT" => (
            Action::DestinationNat,
            "Rewrites the destination address (and port).",
        ),
        _ => return None,
    };
    let d = match action {
        Action::Accept | Action::Drop => {
            Descriptor::new(format!("-j {target}"), Role::Action(action), help)
                .with_aliases(JUMP.aliases)
                .with_source(&[*flag, *target])
        }
        Action::SourceNat | Action::DestinationNat => {
            let option = if action == Action::SourceNat {
                "--to-source"
            } else {
                "--to-destination"
            };
            let [opt, value, tail @ ..] = rest else {
                return None;
            };
            if *opt != option || !literal::is_address_port(value) {
                return None;
            }
            let d = Descriptor::new(format!("-j {target} {option}"), Role::Action(action), help)
                .with_value(*value)
                .with_aliases(JUMP.aliases)
                .with_source(&[*flag, *target, *opt, *value]);
            return Some(Fit::new(vec![d], tail.to_vec()));
        }
    };
    Some(Fit::new(vec![d], rest.to_vec()))
}
