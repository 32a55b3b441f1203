use std::str::FromStr;

use strum::IntoEnumIterator;

use crate::types::{ChainId, Descriptor, Role, Segment, TableId};

use super::{is_one_of, Fit, ParseContext};

const TABLE_FLAGS: &[&str] = &["-t", "--table"];

/// The fixed literal a rule starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartToken {
    literal: &'static str,
}

impl StartToken {
    #[must_use]
    pub fn new(literal: &'static str) -> Self {
        Self { literal }
    }

    #[must_use]
    pub fn find_fit<'t>(&self, tokens: &[&'t str]) -> Option<Fit<'t>> {
        let (&first, rest) = tokens.split_first()?;
        if first != self.literal {
            return None;
        }
        let d = Descriptor::new(
            self.literal,
            Role::Structural(Segment::Start),
            "Invokes the packet filter administration tool.",
        );
        Some(Fit::new(vec![d], rest.to_vec()))
    }

    /// Only offered on an empty rule.
    #[must_use]
    pub fn candidates(&self, matched: &[Descriptor]) -> Option<Vec<String>> {
        matched.is_empty().then(|| vec![self.literal.to_owned()])
    }
}

/// `-t <TABLE>`. Resolves the context's table when it is still open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSelector {
    tables: Vec<TableId>,
}

impl Default for TableSelector {
    fn default() -> Self {
        Self::new(TableId::iter())
    }
}

impl TableSelector {
    pub fn new(tables: impl IntoIterator<Item = TableId>) -> Self {
        Self {
            tables: tables.into_iter().collect(),
        }
    }

    pub fn find_fit<'t>(&self, tokens: &[&'t str], ctx: &mut ParseContext) -> Option<Fit<'t>> {
        let [flag, name, rest @ ..] = tokens else {
            return None;
        };
        if !is_one_of(flag, TABLE_FLAGS) {
            return None;
        }
        let table = TableId::from_str(name)
            .ok()
            .filter(|t| self.tables.contains(t))?;
        if ctx.table.is_none() {
            ctx.table = Some(table);
        }
        let d = Descriptor::new("-t", Role::Structural(Segment::Table), table_help(table))
            .with_value(table.to_string())
            .with_aliases(&["--table"])
            .with_source(&[*flag, *name]);
        Some(Fit::new(vec![d], rest.to_vec()))
    }

    #[must_use]
    pub fn candidates(&self, matched: &[Descriptor]) -> Option<Vec<String>> {
        if has_segment(matched, Segment::Table) {
            return None;
        }
        Some(self.tables.iter().map(|t| format!("-t {t}")).collect())
    }
}

fn table_help(table: TableId) -> &'static str {
    match table {
        TableId::Filter => "The rule belongs to the FILTER table.",
        TableId::Nat => "The rule belongs to the NAT (network address translation) table.",
    }
}

/// Where a rule is placed in its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter)]
pub enum Command {
    Append,
    Insert,
}

impl Command {
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Command::Append => "-A",
            Command::Insert => "-I",
        }
    }

    const fn aliases(self) -> &'static [&'static str] {
        match self {
            Command::Append => &["--append"],
            Command::Insert => &["--insert"],
        }
    }

    const fn help(self) -> &'static str {
        match self {
            Command::Append => "Append adds the rule to the end of the chain.",
            Command::Insert => "Insert places the rule at a given position in the chain.",
        }
    }
}

/// `-A` or `-I`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSelector {
    commands: Vec<Command>,
}

impl Default for CommandSelector {
    fn default() -> Self {
        Self {
            commands: Command::iter().collect(),
        }
    }
}

impl CommandSelector {
    #[must_use]
    pub fn find_fit<'t>(&self, tokens: &[&'t str]) -> Option<Fit<'t>> {
        let (&first, rest) = tokens.split_first()?;
        let command = self
            .commands
            .iter()
            .find(|c| first == c.flag() || is_one_of(first, c.aliases()))?;
        let d = Descriptor::new(
            command.flag(),
            Role::Structural(Segment::Command),
            command.help(),
        )
        .with_aliases(command.aliases())
        .with_source(&[first]);
        Some(Fit::new(vec![d], rest.to_vec()))
    }

    #[must_use]
    pub fn candidates(&self, matched: &[Descriptor]) -> Option<Vec<String>> {
        if has_segment(matched, Segment::Command) {
            return None;
        }
        Some(self.commands.iter().map(|c| c.flag().to_owned()).collect())
    }
}

/// A chain name, accepted only when the context's table holds that chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSelector {
    chains: Vec<ChainId>,
}

impl Default for ChainSelector {
    fn default() -> Self {
        Self {
            chains: ChainId::iter().collect(),
        }
    }
}

impl ChainSelector {
    pub fn find_fit<'t>(&self, tokens: &[&'t str], ctx: &mut ParseContext) -> Option<Fit<'t>> {
        let (&first, rest) = tokens.split_first()?;
        let chain = ChainId::from_str(first)
            .ok()
            .filter(|c| self.chains.contains(c))?;
        let table = ctx.table?;
        if !table.has_chain(chain) {
            return None;
        }
        ctx.chain = Some(chain);
        let d = Descriptor::new("", Role::Structural(Segment::Chain), chain_help(chain))
            .with_value(chain.to_string())
            .with_tables(chain.tables());
        Some(Fit::new(vec![d], rest.to_vec()))
    }

    /// Chains valid for the resolved table, or every known chain while the
    /// table is still open.
    #[must_use]
    pub fn candidates(&self, matched: &[Descriptor], ctx: &ParseContext) -> Option<Vec<String>> {
        if has_segment(matched, Segment::Chain) {
            return None;
        }
        Some(
            self.chains
                .iter()
                .filter(|c| ctx.table.map_or(true, |t| t.has_chain(**c)))
                .map(ToString::to_string)
                .collect(),
        )
    }
}

fn chain_help(chain: ChainId) -> &'static str {
    match chain {
        ChainId::Input => "Packets addressed to this host.",
        ChainId::Output => "Packets generated by this host.",
        ChainId::Forward => "Packets routed through this host.",
        ChainId::Prerouting => "Packets as they arrive, before the routing decision.",
        ChainId::Postrouting => "Packets about to leave, after the routing decision.",
    }
}

fn has_segment(matched: &[Descriptor], segment: Segment) -> bool {
    matched
        .iter()
        .any(|d| d.role() == Role::Structural(segment))
}
