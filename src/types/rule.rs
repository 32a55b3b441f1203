use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{ChainId, Descriptor, Packet, TableId, Verdict};
use crate::grammar::{Grammar, ParseContext, Walk};
use crate::parse::tokenize;

/// Result of matching a rule's text against its grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub descriptors: Vec<Descriptor>,
    /// Tokens no component accounted for. Empty for a complete match.
    pub leftover: Vec<String>,
    /// Literal forms that could come next. Empty for a complete match.
    pub suggestions: BTreeSet<String>,
    /// Table and chain as resolved by the chosen signature.
    pub context: ParseContext,
    pub complete: bool,
}

/// One rule: its text and the descriptors recognized in it.
///
/// Descriptor order is display order and evaluation order. The text is
/// reparsed on demand; edits go through the descriptors and are serialized
/// back with [`get_str_form`](Self::get_str_form).
#[derive(Debug, Clone)]
pub struct Rule {
    raw: String,
    grammar: Arc<Grammar>,
    table: Option<TableId>,
    chain: Option<ChainId>,
    descriptors: Vec<Descriptor>,
    possible_elements: BTreeSet<String>,
}

impl Rule {
    /// Create a rule. Non-empty text is parsed right away in best-effort
    /// mode, and any table or chain it resolves is adopted. A preset chain
    /// the preset table does not hold is dropped.
    #[must_use]
    pub fn new(
        raw: impl Into<String>,
        grammar: Arc<Grammar>,
        table: Option<TableId>,
        chain: Option<ChainId>,
    ) -> Self {
        let chain = match (table, chain) {
            (Some(t), Some(c)) if !t.has_chain(c) => {
                debug!(table = %t, chain = %c, "preset chain not in table");
                None
            }
            _ => chain,
        };
        let mut rule = Self {
            raw: raw.into(),
            grammar,
            table,
            chain,
            descriptors: Vec::new(),
            possible_elements: BTreeSet::new(),
        };
        if !rule.raw.trim().is_empty() {
            if let Some(outcome) = rule.parse(true) {
                rule.table = outcome.context.table;
                rule.chain = outcome.context.chain;
                rule.descriptors = outcome.descriptors;
                rule.possible_elements = outcome.suggestions;
            }
        }
        rule
    }

    /// Match the current text against every signature in order.
    ///
    /// The first complete match (all components covered, no tokens left)
    /// wins outright. Otherwise, in best-effort mode, the attempt that
    /// recovered the most descriptors is returned with its leftover tokens
    /// and suggestions; on a tie the earlier signature is kept. Without
    /// best effort a partial match is `None`.
    #[must_use]
    pub fn parse(&self, best_effort: bool) -> Option<ParseOutcome> {
        let tokens = tokenize(&self.raw);
        let (walk, suggestions, complete) = self.select(&tokens, best_effort)?;
        let outcome = ParseOutcome {
            leftover: walk.rest.iter().map(|t| (*t).to_owned()).collect(),
            descriptors: walk.descriptors,
            suggestions,
            context: walk.ctx,
            complete,
        };
        if !complete {
            debug!(
                raw = %self.raw,
                recovered = outcome.descriptors.len(),
                leftover = outcome.leftover.len(),
                "partial match"
            );
        }
        Some(outcome)
    }

    /// Pick the walk [`parse`](Self::parse) reports, with its suggestions and
    /// whether it is complete.
    fn select<'t>(
        &self,
        tokens: &[&'t str],
        best_effort: bool,
    ) -> Option<(Walk<'t>, BTreeSet<String>, bool)> {
        let start = ParseContext::new(self.table, self.chain);
        let mut best: Option<(Walk<'t>, BTreeSet<String>)> = None;

        for signature in self.grammar.signatures() {
            let walk = signature.walk(tokens, start);
            if signature.is_complete(&walk) {
                return Some((walk, BTreeSet::new(), true));
            }
            if !best_effort {
                continue;
            }
            let better = best
                .as_ref()
                .map_or(true, |(b, _)| walk.descriptors.len() > b.descriptors.len());
            if better {
                let suggestions = signature.suggestions(&walk);
                best = Some((walk, suggestions));
            }
        }
        best.map(|(walk, suggestions)| (walk, suggestions, false))
    }

    /// Whether the serialized descriptors form a complete rule.
    pub fn check_total_correctness(&mut self) -> bool {
        self.raw = self.get_str_form();
        self.parse(false).is_some()
    }

    /// Whether any part of the serialized descriptors is recognized.
    /// Refreshes [`possible_elements`](Self::possible_elements).
    pub fn check_partial_correctness(&mut self) -> bool {
        self.raw = self.get_str_form();
        match self.parse(true) {
            Some(outcome) => {
                self.possible_elements = outcome.suggestions;
                !outcome.descriptors.is_empty()
            }
            None => false,
        }
    }

    /// Remove the descriptor at `index`. `false` if out of bounds.
    pub fn delete_element(&mut self, index: usize) -> bool {
        if index >= self.descriptors.len() {
            return false;
        }
        self.descriptors.remove(index);
        true
    }

    /// Replace the value of the descriptor at `index`. `false` if out of
    /// bounds, the descriptor has no value, or it is the table or chain.
    pub fn set_value(&mut self, index: usize, value: impl Into<String>) -> bool {
        self.descriptors
            .get_mut(index)
            .is_some_and(|d| d.set_value(value))
    }

    /// Canonical text: the descriptors' display forms joined by single spaces.
    #[must_use]
    pub fn get_str_form(&self) -> String {
        self.descriptors
            .iter()
            .map(Descriptor::display)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Evaluate against a packet. `None` when a condition fails or the rule
    /// carries no action.
    #[must_use]
    pub fn run_on_packet(&self, packet: &Packet) -> Option<Verdict> {
        crate::evaluate::run_descriptors(&self.descriptors, packet)
    }

    /// The part of `typed` from its first unrecognized token on, with its
    /// original spacing. `typed` is matched against this rule's grammar and
    /// context; the result is empty when every token is recognized.
    #[must_use]
    pub fn unrecognized_suffix<'a>(&self, typed: &'a str) -> &'a str {
        let tokens = tokenize(typed);
        let Some((walk, _, _)) = self.select(&tokens, true) else {
            return "";
        };
        // Leftover tokens are slices of `typed`, so their address gives the
        // byte offset.
        match walk.rest.first() {
            Some(first) => &typed[first.as_ptr() as usize - typed.as_ptr() as usize..],
            None => "",
        }
    }

    #[must_use]
    pub fn elements(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Suggestions cached by the last best-effort parse.
    #[must_use]
    pub fn possible_elements(&self) -> &BTreeSet<String> {
        &self.possible_elements
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn table(&self) -> Option<TableId> {
        self.table
    }

    #[must_use]
    pub fn chain(&self) -> Option<ChainId> {
        self.chain
    }

    #[must_use]
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.get_str_form())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, Role};

    fn rule(raw: &str) -> Rule {
        Rule::new(raw, Arc::new(Grammar::iptables()), None, None)
    }

    #[test]
    fn full_parse_resolves_table_and_chain() {
        let r = rule("iptables -t FILTER -A INPUT -p tcp --sport 1222 -j DROP");
        assert_eq!(r.table(), Some(TableId::Filter));
        assert_eq!(r.chain(), Some(ChainId::Input));
        assert_eq!(r.elements().len(), 7);
        assert!(r.possible_elements().is_empty());
        let outcome = r.parse(false).unwrap();
        assert!(outcome.complete);
        assert!(outcome.leftover.is_empty());
    }

    #[test]
    fn bare_header_uses_second_signature() {
        let mut r = rule("iptables -t NAT -A POSTROUTING");
        assert_eq!(r.elements().len(), 4);
        assert!(r.check_total_correctness());
    }

    #[test]
    fn partial_parse_keeps_recovered_prefix() {
        let r = rule("iptables -t FILTER -A INPUT -s 10.0.0.1 --bogus");
        assert_eq!(r.get_str_form(), "iptables -t FILTER -A INPUT -s 10.0.0.1");
        let outcome = r.parse(true).unwrap();
        assert!(!outcome.complete);
        assert_eq!(outcome.leftover, vec!["--bogus"]);
        assert!(r.parse(false).is_none());
    }

    #[test]
    fn suggestions_while_typing() {
        let r = rule("iptables -t NAT");
        assert!(r.possible_elements().contains("-A"));
        assert!(r.possible_elements().contains("-I"));
        // Chains follow the command.
        assert!(r.possible_elements().contains("PREROUTING"));
        assert!(!r.possible_elements().contains("FORWARD"));
    }

    #[test]
    fn aliases_normalize() {
        let r = rule("iptables --table FILTER --append INPUT --source 10.0.0.1 --jump ACCEPT");
        assert_eq!(
            r.get_str_form(),
            "iptables -t FILTER -A INPUT -s 10.0.0.1 -j ACCEPT"
        );
        assert_eq!(r.get_str_form(), r.get_str_form());
    }

    #[test]
    fn delete_and_recheck() {
        let mut r = rule("iptables -t FILTER -A INPUT -j DROP");
        assert!(r.check_total_correctness());
        assert!(r.delete_element(4));
        assert_eq!(r.get_str_form(), "iptables -t FILTER -A INPUT");
        assert!(r.check_total_correctness());
        assert!(!r.delete_element(4));
        assert!(r.delete_element(0));
        assert!(!r.check_total_correctness());
    }

    #[test]
    fn set_value_edits_serialized_text() {
        let mut r = rule("iptables -t FILTER -A INPUT -s 10.0.0.1 -j DROP");
        assert!(r.set_value(4, "172.16.0.0/12"));
        assert_eq!(
            r.get_str_form(),
            "iptables -t FILTER -A INPUT -s 172.16.0.0/12 -j DROP"
        );
        assert!(!r.set_value(0, "ip6tables"));
        assert!(!r.set_value(99, "x"));
        assert!(r.check_total_correctness());
    }

    #[test]
    fn last_action_wins() {
        let grammar = crate::grammar::GrammarBuilder::new()
            .signature(|s| {
                s.start("iptables")
                    .table()
                    .command()
                    .chain()
                    .specification([
                        crate::grammar::FlagMatcher::Jump,
                        crate::grammar::FlagMatcher::Jump,
                    ])
            })
            .build()
            .unwrap();
        let r = Rule::new(
            "iptables -t FILTER -A INPUT -j ACCEPT -j DROP",
            Arc::new(grammar),
            None,
            None,
        );
        let actions: Vec<_> = r.elements().iter().filter(|d| d.is_action()).collect();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1].role(), Role::Action(Action::Drop));
        let pk = Packet::new(crate::types::ProtocolTag::Tcp);
        assert_eq!(r.run_on_packet(&pk), Some(Verdict::Drop));
    }

    #[test]
    fn no_action_is_no_match() {
        let r = rule("iptables -t FILTER -A INPUT -p tcp");
        let pk = Packet::new(crate::types::ProtocolTag::Tcp);
        assert_eq!(r.run_on_packet(&pk), None);
    }

    #[test]
    fn unrecognized_suffix_keeps_spacing() {
        let typed = "iptables  -t FILTER -A INPUT   --bogus  flag";
        let r = rule(typed);
        assert_eq!(r.unrecognized_suffix(typed), "--bogus  flag");

        let typed = "iptables --table FILTER -A INPUT -j DROP";
        let r = rule(typed);
        assert_eq!(r.unrecognized_suffix(typed), "");
    }

    #[test]
    fn empty_text_is_not_parsed() {
        let mut r = rule("   ");
        assert!(r.elements().is_empty());
        assert!(r.possible_elements().is_empty());
        assert!(!r.check_partial_correctness());
        assert!(r.possible_elements().contains("iptables"));
    }

    #[test]
    fn preset_chain_outside_table_is_dropped() {
        let r = Rule::new(
            "",
            Arc::new(Grammar::iptables()),
            Some(TableId::Filter),
            Some(ChainId::Prerouting),
        );
        assert_eq!(r.table(), Some(TableId::Filter));
        assert_eq!(r.chain(), None);

        let r = Rule::new(
            "iptables -t FILTER -A FORWARD -j DROP",
            Arc::new(Grammar::iptables()),
            Some(TableId::Filter),
            Some(ChainId::Postrouting),
        );
        assert_eq!(r.chain(), Some(ChainId::Forward));
    }

    #[test]
    fn suffix_starts_at_unknown_flag_before_trailing_port() {
        let typed = "iptables -t FILTER -A INPUT -p tcp -s 10.0.0.1 --bogus --dport 22";
        let r = rule(typed);
        assert_eq!(
            r.get_str_form(),
            "iptables -t FILTER -A INPUT -p tcp --dport 22 -s 10.0.0.1"
        );
        assert_eq!(r.unrecognized_suffix(typed), "--bogus --dport 22");
    }

    #[test]
    fn suffix_points_at_repeated_token() {
        let typed = "iptables -t FILTER -A INPUT -s 10.0.0.1  -s 10.0.0.1";
        let r = rule(typed);
        assert_eq!(r.unrecognized_suffix(typed), "-s 10.0.0.1");
        assert_eq!(r.unrecognized_suffix(""), "");
    }

    #[test]
    fn configured_table_is_kept() {
        let r = Rule::new(
            "iptables -t NAT -A INPUT -j ACCEPT",
            Arc::new(Grammar::iptables()),
            Some(TableId::Filter),
            Some(ChainId::Input),
        );
        assert_eq!(r.table(), Some(TableId::Filter));
        assert_eq!(r.chain(), Some(ChainId::Input));
    }
}
