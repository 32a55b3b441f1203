use strum::IntoEnumIterator;

/// A rule table. Each table owns a fixed set of chains, see [`TableId::chains`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TableId {
    /// Packet filtering.
    #[strum(serialize = "FILTER")]
    Filter,
    /// Network address translation.
    #[strum(serialize = "NAT")]
    Nat,
}

/// A traversal point in a packet's path.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChainId {
    #[strum(serialize = "INPUT")]
    Input,
    #[strum(serialize = "OUTPUT")]
    Output,
    #[strum(serialize = "FORWARD")]
    Forward,
    #[strum(serialize = "PREROUTING")]
    Prerouting,
    #[strum(serialize = "POSTROUTING")]
    Postrouting,
}

impl TableId {
    /// The chains this table holds, in persistence order.
    #[must_use]
    pub const fn chains(self) -> &'static [ChainId] {
        match self {
            TableId::Filter => &[ChainId::Input, ChainId::Forward],
            TableId::Nat => &[ChainId::Prerouting, ChainId::Input, ChainId::Postrouting],
        }
    }

    #[must_use]
    pub fn has_chain(self, chain: ChainId) -> bool {
        self.chains().contains(&chain)
    }
}

impl ChainId {
    /// Every table that holds this chain. Empty for chains no table uses.
    #[must_use]
    pub fn tables(self) -> Vec<TableId> {
        TableId::iter().filter(|t| t.has_chain(self)).collect()
    }
}

/// Every valid `(table, chain)` slot, tables in declaration order and chains
/// in each table's own order.
pub(crate) fn slots() -> impl Iterator<Item = (TableId, ChainId)> {
    TableId::iter().flat_map(|t| t.chains().iter().map(move |&c| (t, c)))
}
