//! Text format for a [`RuleStore`].
//!
//! ```text
//! #FILTER.INPUT
//! iptables -t FILTER -A INPUT -p tcp --dport 22 -j ACCEPT
//! iptables -t FILTER -A INPUT -j DROP
//! #NAT.PREROUTING
//! iptables -t NAT -A PREROUTING -p tcp --dport 5001 -j DNAT --to-destination 192.168.0.11
//! ```
//!
//! A `#<TABLE>.<CHAIN>` header introduces the rules of one chain, each on its
//! own line in canonical form. Empty chains are not written.

use std::io::{BufRead, Write};
use std::str::FromStr;

use tracing::{debug, warn};
use winnow::combinator::{preceded, separated_pair};
use winnow::error::ModalResult;
use winnow::prelude::*;
use winnow::token::take_while;

use crate::types::{slots, ChainId, PersistError, Rule, RuleStore, TableId};

fn name<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

fn header<'i>(input: &mut &'i str) -> ModalResult<(&'i str, &'i str)> {
    preceded('#', separated_pair(name, '.', name)).parse_next(input)
}

fn parse_header(text: &str, line: usize) -> Result<(TableId, ChainId), PersistError> {
    let (table, chain) = header.parse(text).map_err(|_| PersistError::MalformedHeader {
        line,
        text: text.to_owned(),
    })?;
    let table = TableId::from_str(table).map_err(|_| PersistError::UnknownTable {
        line,
        name: table.to_owned(),
    })?;
    let chain = ChainId::from_str(chain).map_err(|_| PersistError::UnknownChain {
        line,
        name: chain.to_owned(),
    })?;
    if !table.has_chain(chain) {
        return Err(PersistError::ChainNotInTable {
            line,
            table: table.to_string(),
            chain: chain.to_string(),
        });
    }
    Ok((table, chain))
}

/// Write every non-empty chain, tables and chains in declaration order.
///
/// # Errors
///
/// Returns [`PersistError::Io`] if writing fails.
pub fn write_store(store: &RuleStore, mut w: impl Write) -> Result<(), PersistError> {
    for (table, chain) in slots() {
        let rules = store.get_rules_in_chain(table, chain).unwrap_or_default();
        if rules.is_empty() {
            continue;
        }
        writeln!(w, "#{table}.{chain}")?;
        for rule in rules {
            writeln!(w, "{}", rule.get_str_form())?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Read rules and append them to `store`. Returns the number of rules added.
///
/// Each rule is parsed with, and appended to, the table and chain of the
/// nearest header above it; a rule before any header goes wherever its own
/// text resolves. Rules whose text names a different chain than their slot
/// are skipped with a warning. A malformed header rejects the whole input
/// and leaves the store untouched.
///
/// # Errors
///
/// Returns [`PersistError`] on I/O failure or a malformed header.
pub fn read_store(store: &mut RuleStore, r: impl BufRead) -> Result<usize, PersistError> {
    let mut table = None;
    let mut chain = None;
    let mut staged = Vec::new();
    for (i, line) in r.lines().enumerate() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.starts_with('#') {
            let (t, c) = parse_header(text, i + 1)?;
            table = Some(t);
            chain = Some(c);
            continue;
        }
        let rule = Rule::new(text, store.grammar().clone(), table, chain);
        staged.push((i + 1, rule, table.zip(chain)));
    }

    let mut loaded = 0;
    for (line, rule, slot) in staged {
        let text = rule.get_str_form();
        let placed = match slot.or_else(|| rule.table().zip(rule.chain())) {
            Some((t, c)) => store.append_rule(rule, t, c),
            None => false,
        };
        if placed {
            loaded += 1;
        } else {
            warn!(line, rule = %text, "rule skipped while loading");
        }
    }
    debug!(loaded, "rule store loaded");
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers() {
        assert_eq!(
            parse_header("#FILTER.INPUT", 1).unwrap(),
            (TableId::Filter, ChainId::Input)
        );
        assert_eq!(
            parse_header("#NAT.POSTROUTING", 1).unwrap(),
            (TableId::Nat, ChainId::Postrouting)
        );
    }

    #[test]
    fn malformed_headers() {
        for bad in ["#FILTER", "#FILTER.", "#.INPUT", "#FILTER INPUT", "#FILTER.INPUT.X"] {
            assert!(
                matches!(parse_header(bad, 3), Err(PersistError::MalformedHeader { line: 3, .. })),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn unknown_and_mismatched_headers() {
        assert!(matches!(
            parse_header("#MANGLE.INPUT", 1),
            Err(PersistError::UnknownTable { .. })
        ));
        assert!(matches!(
            parse_header("#FILTER.SIDEWAYS", 1),
            Err(PersistError::UnknownChain { .. })
        ));
        assert!(matches!(
            parse_header("#FILTER.PREROUTING", 1),
            Err(PersistError::ChainNotInTable { .. })
        ));
    }

    #[test]
    fn write_skips_empty_chains() {
        let mut store = RuleStore::default();
        let rule = store.create_rule_from_raw_str(
            "iptables -t NAT -A POSTROUTING -j ACCEPT",
            TableId::Nat,
            ChainId::Postrouting,
        );
        assert!(store.append_rule(rule, TableId::Nat, ChainId::Postrouting));
        let mut out = Vec::new();
        write_store(&store, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#NAT.POSTROUTING\niptables -t NAT -A POSTROUTING -j ACCEPT\n"
        );
    }

    #[test]
    fn read_skips_blank_lines_and_misplaced_rules() {
        let text = "\n#FILTER.INPUT\niptables -t FILTER -A INPUT -j DROP\n\n\
                    iptables -t FILTER -A FORWARD -j DROP\n";
        let mut store = RuleStore::default();
        let loaded = read_store(&mut store, text.as_bytes()).unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(
            store.get_rules_in_chain(TableId::Filter, ChainId::Input).map(<[Rule]>::len),
            Some(1)
        );
        assert_eq!(
            store.get_rules_in_chain(TableId::Filter, ChainId::Forward).map(<[Rule]>::len),
            Some(0)
        );
    }

    #[test]
    fn rule_before_header_uses_its_own_slot() {
        let text = "iptables -t NAT -A PREROUTING -j ACCEPT\n";
        let mut store = RuleStore::default();
        assert_eq!(read_store(&mut store, text.as_bytes()).unwrap(), 1);
        assert_eq!(store.get_rule(TableId::Nat, ChainId::Prerouting, 0).raw(), text.trim());
    }

    #[test]
    fn bad_header_leaves_store_untouched() {
        let text = "#FILTER.INPUT\niptables -t FILTER -A INPUT -j DROP\n#FILTER INPUT\n";
        let mut store = RuleStore::default();
        let err = read_store(&mut store, text.as_bytes()).unwrap_err();
        assert!(matches!(err, PersistError::MalformedHeader { line: 3, .. }));
        assert_eq!(
            store.get_rules_in_chain(TableId::Filter, ChainId::Input).map(<[Rule]>::len),
            Some(0)
        );
    }
}
