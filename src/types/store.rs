use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use super::{
    slots, CaptureError, ChainId, Packet, PersistError, ReplayReport, Rule, TableId, Verdict,
};
use crate::capture::{PacketSink, PacketSource};
use crate::grammar::Grammar;

/// What happened at a store position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Appended,
    Inserted,
    Deleted,
}

/// Change notification sent to every [`RuleStore::subscribe`] listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreEvent {
    pub kind: ChangeKind,
    pub table: TableId,
    pub chain: ChainId,
    pub index: usize,
}

type Listener = Box<dyn FnMut(&StoreEvent) + Send>;

/// Ordered rules per table and chain.
///
/// Every rule stored at `(table, chain)` has that table and chain itself.
/// Mutations that would break this, or that name an index outside the
/// chain, return `false` and change nothing. Lower indices are evaluated
/// first.
pub struct RuleStore {
    grammar: Arc<Grammar>,
    chains: BTreeMap<TableId, BTreeMap<ChainId, Vec<Rule>>>,
    listeners: Vec<Listener>,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new(Arc::new(Grammar::iptables()))
    }
}

impl fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleStore")
            .field("grammar", &self.grammar)
            .field("chains", &self.chains)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl RuleStore {
    /// An empty store whose rules are parsed with `grammar`.
    #[must_use]
    pub fn new(grammar: Arc<Grammar>) -> Self {
        let mut chains: BTreeMap<TableId, BTreeMap<ChainId, Vec<Rule>>> = BTreeMap::new();
        for (table, chain) in slots() {
            chains.entry(table).or_default().insert(chain, Vec::new());
        }
        Self {
            grammar,
            chains,
            listeners: Vec::new(),
        }
    }

    #[must_use]
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// Register a listener for append, insert and delete events.
    pub fn subscribe(&mut self, listener: impl FnMut(&StoreEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Build a rule for `(table, chain)` without storing it.
    #[must_use]
    pub fn create_rule_from_raw_str(&self, raw: &str, table: TableId, chain: ChainId) -> Rule {
        Rule::new(raw, Arc::clone(&self.grammar), Some(table), Some(chain))
    }

    pub fn append_rule(&mut self, rule: Rule, table: TableId, chain: ChainId) -> bool {
        if !belongs(&rule, table, chain) {
            debug!(%table, %chain, rule = %rule, "append rejected");
            return false;
        }
        let Some(rules) = self.slot_mut(table, chain) else {
            return false;
        };
        rules.push(rule);
        let index = rules.len() - 1;
        self.emit(ChangeKind::Appended, table, chain, index);
        true
    }

    /// Insert before `index`. `index` may equal the chain length.
    pub fn insert_rule(
        &mut self,
        rule: Rule,
        table: TableId,
        chain: ChainId,
        index: usize,
    ) -> bool {
        if !belongs(&rule, table, chain) {
            debug!(%table, %chain, index, "insert rejected");
            return false;
        }
        let Some(rules) = self.slot_mut(table, chain) else {
            return false;
        };
        if index > rules.len() {
            return false;
        }
        rules.insert(index, rule);
        self.emit(ChangeKind::Inserted, table, chain, index);
        true
    }

    /// Replace the rule at `index`. Listeners see a delete then an insert.
    pub fn overwrite_rule(
        &mut self,
        rule: Rule,
        table: TableId,
        chain: ChainId,
        index: usize,
    ) -> bool {
        if !belongs(&rule, table, chain) {
            debug!(%table, %chain, index, "overwrite rejected");
            return false;
        }
        let Some(slot) = self
            .slot_mut(table, chain)
            .and_then(|rules| rules.get_mut(index))
        else {
            return false;
        };
        *slot = rule;
        self.emit(ChangeKind::Deleted, table, chain, index);
        self.emit(ChangeKind::Inserted, table, chain, index);
        true
    }

    /// Parse `raw` for `(table, chain)` and overwrite the rule at `index`.
    pub fn update_rule(&mut self, raw: &str, table: TableId, chain: ChainId, index: usize) -> bool {
        let rule = self.create_rule_from_raw_str(raw, table, chain);
        self.overwrite_rule(rule, table, chain, index)
    }

    pub fn delete_rule(&mut self, table: TableId, chain: ChainId, index: usize) -> bool {
        let Some(rules) = self.slot_mut(table, chain) else {
            return false;
        };
        if index >= rules.len() {
            return false;
        }
        rules.remove(index);
        self.emit(ChangeKind::Deleted, table, chain, index);
        true
    }

    /// Remove every rule of a chain, last first. Returns how many were removed.
    pub fn flush_chain(&mut self, table: TableId, chain: ChainId) -> usize {
        let Some(rules) = self.slot_mut(table, chain) else {
            return 0;
        };
        let removed = std::mem::take(rules).len();
        for index in (0..removed).rev() {
            self.emit(ChangeKind::Deleted, table, chain, index);
        }
        removed
    }

    /// # Panics
    ///
    /// Panics if `(table, chain)` is not a valid slot or `index` is out of
    /// range.
    #[must_use]
    pub fn get_rule(&self, table: TableId, chain: ChainId, index: usize) -> &Rule {
        match self.get_rules_in_chain(table, chain) {
            Some(rules) if index < rules.len() => &rules[index],
            _ => panic!("no rule at {table}.{chain}[{index}]"),
        }
    }

    /// Rules of a chain in evaluation order. `None` if the table has no such
    /// chain.
    #[must_use]
    pub fn get_rules_in_chain(&self, table: TableId, chain: ChainId) -> Option<&[Rule]> {
        self.chains.get(&table)?.get(&chain).map(Vec::as_slice)
    }

    /// Chains of a table, in persistence order.
    #[must_use]
    pub fn get_chain_names(&self, table: TableId) -> &'static [ChainId] {
        table.chains()
    }

    /// Total number of stored rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chains.values().flat_map(BTreeMap::values).map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// # Errors
    ///
    /// Returns [`PersistError::Io`] if writing fails.
    pub fn write_to(&self, w: impl Write) -> Result<(), PersistError> {
        crate::persist::write_store(self, w)
    }

    /// # Errors
    ///
    /// Returns [`PersistError::Io`] if the file cannot be created or written.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))
    }

    /// Append the rules in `r` to this store. Returns the number loaded.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] on I/O failure or a malformed chain header.
    pub fn read_from(&mut self, r: impl Read) -> Result<usize, PersistError> {
        crate::persist::read_store(self, BufReader::new(r))
    }

    /// # Errors
    ///
    /// Returns [`PersistError`] if the file cannot be opened or is malformed.
    pub fn read_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize, PersistError> {
        let file = File::open(path)?;
        self.read_from(file)
    }

    /// Replay a packet stream through one chain.
    ///
    /// All packets are read first. Each is run through the chain's rules in
    /// order and the first match decides: a drop writes nothing, otherwise
    /// the (possibly rewritten) packet is written. Packets no rule matches
    /// are written unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError`] if the source cannot be read or the sink
    /// rejects a packet.
    pub fn run_chain_on_raw_packets(
        &self,
        input: &mut impl PacketSource,
        output: &mut impl PacketSink,
        table: TableId,
        chain: ChainId,
    ) -> Result<ReplayReport, CaptureError> {
        let start = Instant::now();
        let packets = input.read_all()?;
        let rules = self.get_rules_in_chain(table, chain).unwrap_or_default();

        let mut written = 0;
        let mut dropped = 0;
        let mut decisions = Vec::with_capacity(packets.len());
        for packet in packets {
            let (decided, out): (Option<usize>, Option<Packet>) =
                match crate::evaluate::evaluate_chain(rules, &packet) {
                    Some((i, Verdict::Drop)) => (Some(i), None),
                    Some((i, Verdict::Forward(p))) => (Some(i), Some(p)),
                    None => (None, Some(packet)),
                };
            decisions.push(decided);
            match out {
                Some(p) => {
                    output.write_packet(p)?;
                    written += 1;
                }
                None => dropped += 1,
            }
        }

        let report = ReplayReport::new(written, dropped, decisions, start.elapsed());
        info!(%table, %chain, rules = rules.len(), %report, "chain replayed");
        Ok(report)
    }

    fn slot_mut(&mut self, table: TableId, chain: ChainId) -> Option<&mut Vec<Rule>> {
        self.chains.get_mut(&table)?.get_mut(&chain)
    }

    fn emit(&mut self, kind: ChangeKind, table: TableId, chain: ChainId, index: usize) {
        let event = StoreEvent {
            kind,
            table,
            chain,
            index,
        };
        debug!(?kind, %table, %chain, index, "store changed");
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

fn belongs(rule: &Rule, table: TableId, chain: ChainId) -> bool {
    rule.table() == Some(table) && rule.chain() == Some(chain) && table.has_chain(chain)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    const DROP_ALL: &str = "iptables -t FILTER -A INPUT -j DROP";

    fn recorded(store: &mut RuleStore) -> Arc<Mutex<Vec<StoreEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        store.subscribe(move |e| sink.lock().unwrap().push(*e));
        events
    }

    #[test]
    fn new_store_has_every_slot() {
        let store = RuleStore::default();
        for (t, c) in slots() {
            assert_eq!(store.get_rules_in_chain(t, c).map(<[Rule]>::len), Some(0));
        }
        assert!(store.get_rules_in_chain(TableId::Filter, ChainId::Prerouting).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn append_emits_event() {
        let mut store = RuleStore::default();
        let events = recorded(&mut store);
        let rule = store.create_rule_from_raw_str(DROP_ALL, TableId::Filter, ChainId::Input);
        assert!(store.append_rule(rule, TableId::Filter, ChainId::Input));
        assert_eq!(
            *events.lock().unwrap(),
            vec![StoreEvent {
                kind: ChangeKind::Appended,
                table: TableId::Filter,
                chain: ChainId::Input,
                index: 0,
            }]
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn mismatched_slot_is_rejected() {
        let mut store = RuleStore::default();
        let events = recorded(&mut store);
        let rule = store.create_rule_from_raw_str(DROP_ALL, TableId::Filter, ChainId::Input);
        assert!(!store.append_rule(rule.clone(), TableId::Filter, ChainId::Forward));
        assert!(!store.insert_rule(rule.clone(), TableId::Nat, ChainId::Input, 0));
        assert!(store.is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn overwrite_emits_delete_then_insert() {
        let mut store = RuleStore::default();
        let rule = store.create_rule_from_raw_str(DROP_ALL, TableId::Filter, ChainId::Input);
        assert!(store.append_rule(rule, TableId::Filter, ChainId::Input));
        let events = recorded(&mut store);
        assert!(store.update_rule(
            "iptables -t FILTER -A INPUT -j ACCEPT",
            TableId::Filter,
            ChainId::Input,
            0
        ));
        let kinds: Vec<_> = events.lock().unwrap().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Deleted, ChangeKind::Inserted]);
        assert_eq!(
            store.get_rule(TableId::Filter, ChainId::Input, 0).get_str_form(),
            "iptables -t FILTER -A INPUT -j ACCEPT"
        );
        assert!(!store.update_rule(DROP_ALL, TableId::Filter, ChainId::Input, 1));
    }

    #[test]
    fn flush_deletes_from_the_end() {
        let mut store = RuleStore::default();
        for _ in 0..3 {
            let rule = store.create_rule_from_raw_str(DROP_ALL, TableId::Filter, ChainId::Input);
            assert!(store.append_rule(rule, TableId::Filter, ChainId::Input));
        }
        let events = recorded(&mut store);
        assert_eq!(store.flush_chain(TableId::Filter, ChainId::Input), 3);
        let indices: Vec<_> = events.lock().unwrap().iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![2, 1, 0]);
        assert!(store.is_empty());
        assert_eq!(store.flush_chain(TableId::Filter, ChainId::Prerouting), 0);
    }

    #[test]
    fn chain_names_follow_adjacency() {
        let store = RuleStore::default();
        assert_eq!(
            store.get_chain_names(TableId::Nat),
            &[ChainId::Prerouting, ChainId::Input, ChainId::Postrouting]
        );
    }

    #[test]
    fn debug_shows_listener_count() {
        let mut store = RuleStore::default();
        store.subscribe(|_| {});
        assert!(format!("{store:?}").contains("listeners: 1"));
    }
}
