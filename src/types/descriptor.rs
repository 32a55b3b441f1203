use std::fmt;

use super::{ProtocolTag, TableId};

/// Which structural part of a rule header a descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Start,
    Table,
    Command,
    Chain,
}

/// A packet test bound to a condition descriptor. Evaluated by
/// [`Condition::test`](crate::Condition::test) against the descriptor's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Protocol(ProtocolTag),
    SourcePort(ProtocolTag),
    DestinationPort(ProtocolTag),
    SourceAddress,
    DestinationAddress,
    InInterface,
    OutInterface,
    State,
}

/// A packet transform bound to an action descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Accept,
    Drop,
    SourceNat,
    DestinationNat,
}

/// What a descriptor does during evaluation. Only conditions and actions
/// carry a behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Structural(Segment),
    Condition(Condition),
    Action(Action),
}

/// The matched form of one token or flag group of a rule.
///
/// The display text is the keyword followed by the value, single-space
/// joined, so editing the value through [`Rule::set_value`](crate::Rule::set_value)
/// is reflected in the serialized rule.
#[derive(Debug, Clone)]
pub struct Descriptor {
    keyword: String,
    value: Option<String>,
    source: Option<String>,
    help: &'static str,
    role: Role,
    aliases: &'static [&'static str],
    tables: Option<Vec<TableId>>,
}

impl Descriptor {
    pub(crate) fn new(keyword: impl Into<String>, role: Role, help: &'static str) -> Self {
        Self {
            keyword: keyword.into(),
            value: None,
            source: None,
            help,
            role,
            aliases: &[],
            tables: None,
        }
    }

    #[must_use]
    pub(crate) fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub(crate) fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    #[must_use]
    pub(crate) fn with_tables(mut self, tables: Vec<TableId>) -> Self {
        self.tables = Some(tables);
        self
    }

    /// Record the tokens as typed. Kept only when they differ from the
    /// canonical display text.
    #[must_use]
    pub(crate) fn with_source(mut self, typed: &[&str]) -> Self {
        let typed = typed.join(" ");
        if typed != self.display() {
            self.source = Some(typed);
        }
        self
    }

    /// Canonical text of the matched tokens.
    #[must_use]
    pub fn display(&self) -> String {
        match (self.keyword.is_empty(), &self.value) {
            (_, None) => self.keyword.clone(),
            (true, Some(v)) => v.clone(),
            (false, Some(v)) => format!("{} {v}", self.keyword),
        }
    }

    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The tokens as typed, when they were spelled differently from
    /// [`display`](Self::display).
    #[must_use]
    pub fn source_form(&self) -> Option<&str> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn help(&self) -> &str {
        self.help
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Alternate spellings of the keyword.
    #[must_use]
    pub fn aliases(&self) -> &[&'static str] {
        self.aliases
    }

    /// Tables a chain descriptor is valid in.
    #[must_use]
    pub fn tables(&self) -> Option<&[TableId]> {
        self.tables.as_deref()
    }

    #[must_use]
    pub fn has_value_slot(&self) -> bool {
        self.value.is_some()
    }

    #[must_use]
    pub fn is_condition(&self) -> bool {
        matches!(self.role, Role::Condition(_))
    }

    #[must_use]
    pub fn is_action(&self) -> bool {
        matches!(self.role, Role::Action(_))
    }

    /// Replace the value. Header descriptors (table, chain) are fixed once
    /// matched, since the rule's slot was resolved from them.
    pub(crate) fn set_value(&mut self, value: impl Into<String>) -> bool {
        if matches!(self.role, Role::Structural(_)) {
            return false;
        }
        match &mut self.value {
            Some(slot) => {
                *slot = value.into();
                self.source = None;
                true
            }
            None => false,
        }
    }
}

/// Source form and help text are presentation only and do not take part in
/// equality.
impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.keyword == other.keyword
            && self.value == other.value
            && self.role == other.role
            && self.tables == other.tables
    }
}

impl Eq for Descriptor {}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_keyword_and_value() {
        let d = Descriptor::new("-s", Role::Condition(Condition::SourceAddress), "")
            .with_value("10.0.0.1");
        assert_eq!(d.display(), "-s 10.0.0.1");
        assert_eq!(d.to_string(), "-s 10.0.0.1");
    }

    #[test]
    fn display_without_keyword() {
        let d = Descriptor::new("", Role::Structural(Segment::Chain), "").with_value("INPUT");
        assert_eq!(d.display(), "INPUT");
    }

    #[test]
    fn display_without_value() {
        let d = Descriptor::new("-j DROP", Role::Action(Action::Drop), "");
        assert_eq!(d.display(), "-j DROP");
        assert!(!d.has_value_slot());
    }

    #[test]
    fn source_kept_only_when_different() {
        let d = Descriptor::new("-s", Role::Condition(Condition::SourceAddress), "")
            .with_value("10.0.0.1")
            .with_source(&["--source", "10.0.0.1"]);
        assert_eq!(d.source_form(), Some("--source 10.0.0.1"));

        let d = Descriptor::new("-s", Role::Condition(Condition::SourceAddress), "")
            .with_value("10.0.0.1")
            .with_source(&["-s", "10.0.0.1"]);
        assert_eq!(d.source_form(), None);
    }

    #[test]
    fn set_value_requires_slot() {
        let role = Role::Condition(Condition::DestinationPort(ProtocolTag::Tcp));
        let mut d = Descriptor::new("--dport", role, "").with_value("80");
        assert!(d.set_value("443"));
        assert_eq!(d.display(), "--dport 443");

        let mut d = Descriptor::new("iptables", Role::Structural(Segment::Start), "");
        assert!(!d.set_value("x"));
        assert_eq!(d.display(), "iptables");
    }

    #[test]
    fn header_values_are_fixed() {
        let mut chain =
            Descriptor::new("", Role::Structural(Segment::Chain), "").with_value("INPUT");
        assert!(!chain.set_value("FORWARD"));
        assert_eq!(chain.display(), "INPUT");

        let mut table =
            Descriptor::new("-t", Role::Structural(Segment::Table), "").with_value("FILTER");
        assert!(!table.set_value("NAT"));
        assert_eq!(table.display(), "-t FILTER");
    }

    #[test]
    fn equality_ignores_source_form() {
        let typed = Descriptor::new("-d", Role::Condition(Condition::DestinationAddress), "")
            .with_value("10.0.0.0/8")
            .with_source(&["--destination", "10.0.0.0/8"]);
        let canonical = Descriptor::new("-d", Role::Condition(Condition::DestinationAddress), "")
            .with_value("10.0.0.0/8");
        assert_eq!(typed, canonical);
    }

    #[test]
    fn role_predicates() {
        let c = Descriptor::new("--state", Role::Condition(Condition::State), "").with_value("NEW");
        let a = Descriptor::new("-j ACCEPT", Role::Action(Action::Accept), "");
        assert!(c.is_condition() && !c.is_action());
        assert!(a.is_action() && !a.is_condition());
    }
}
