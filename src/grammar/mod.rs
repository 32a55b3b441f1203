//! Rule grammars: leaves that recognize token runs, signatures that order
//! them, and the stock `iptables` grammar.

mod flag;
mod leaf;
mod spec;

use std::collections::BTreeSet;

use crate::types::{ChainId, Descriptor, GrammarError, ProtocolTag, TableId};

pub use flag::{FlagMatcher, STATES};
pub use leaf::{ChainSelector, Command, CommandSelector, StartToken, TableSelector};
pub use spec::RuleSpecification;

/// Table and chain resolved so far in one signature walk.
///
/// Passed by `&mut` to the leaves that resolve it, so a chain leaf sees the
/// table chosen earlier in the same walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseContext {
    pub table: Option<TableId>,
    pub chain: Option<ChainId>,
}

impl ParseContext {
    #[must_use]
    pub fn new(table: Option<TableId>, chain: Option<ChainId>) -> Self {
        Self { table, chain }
    }
}

/// A successful leaf match: the descriptors produced and the tokens left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fit<'t> {
    pub descriptors: Vec<Descriptor>,
    pub rest: Vec<&'t str>,
}

impl<'t> Fit<'t> {
    pub(crate) fn new(descriptors: Vec<Descriptor>, rest: Vec<&'t str>) -> Self {
        Self { descriptors, rest }
    }
}

pub(crate) fn is_one_of(token: &str, forms: &[&str]) -> bool {
    forms.iter().any(|f| *f == token)
}

/// One step of a [`Signature`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureComponent {
    Start(StartToken),
    Table(TableSelector),
    Command(CommandSelector),
    Chain(ChainSelector),
    Specification(RuleSpecification),
}

impl SignatureComponent {
    #[must_use]
    pub fn find_fit<'t>(&self, tokens: &[&'t str], ctx: &mut ParseContext) -> Option<Fit<'t>> {
        match self {
            SignatureComponent::Start(s) => s.find_fit(tokens),
            SignatureComponent::Table(t) => t.find_fit(tokens, ctx),
            SignatureComponent::Command(c) => c.find_fit(tokens),
            SignatureComponent::Chain(c) => c.find_fit(tokens, ctx),
            SignatureComponent::Specification(s) => s.find_fit(tokens),
        }
    }

    /// Literal forms this component would accept next, or `None` once it no
    /// longer applies.
    #[must_use]
    pub fn candidates(&self, matched: &[Descriptor], ctx: &ParseContext) -> Option<Vec<String>> {
        match self {
            SignatureComponent::Start(s) => s.candidates(matched),
            SignatureComponent::Table(t) => t.candidates(matched),
            SignatureComponent::Command(c) => c.candidates(matched),
            SignatureComponent::Chain(c) => c.candidates(matched, ctx),
            SignatureComponent::Specification(s) => s.candidates(matched),
        }
    }
}

/// The result of walking one signature over a token list.
#[derive(Debug, Clone)]
pub(crate) struct Walk<'t> {
    /// Number of leading components that matched.
    pub covered: usize,
    pub descriptors: Vec<Descriptor>,
    pub rest: Vec<&'t str>,
    pub ctx: ParseContext,
}

/// An ordered template of components describing one accepted rule shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    components: Vec<SignatureComponent>,
}

impl Signature {
    #[must_use]
    pub fn components(&self) -> &[SignatureComponent] {
        &self.components
    }

    /// Match components left to right, stopping at the first that fails.
    pub(crate) fn walk<'t>(&self, tokens: &[&'t str], mut ctx: ParseContext) -> Walk<'t> {
        let mut descriptors = Vec::new();
        let mut rest = tokens.to_vec();
        let mut covered = 0;
        for component in &self.components {
            let Some(fit) = component.find_fit(&rest, &mut ctx) else {
                break;
            };
            descriptors.extend(fit.descriptors);
            rest = fit.rest;
            covered += 1;
        }
        Walk {
            covered,
            descriptors,
            rest,
            ctx,
        }
    }

    pub(crate) fn is_complete(&self, walk: &Walk<'_>) -> bool {
        walk.covered == self.components.len() && walk.rest.is_empty()
    }

    /// Candidates of the component that failed and the one after it. The
    /// last matched component is asked too, since a rule specification can
    /// take more flags after a partial match; finished leaves offer nothing.
    pub(crate) fn suggestions(&self, walk: &Walk<'_>) -> BTreeSet<String> {
        let from = walk.covered.saturating_sub(1);
        self.components
            .iter()
            .skip(from)
            .take(walk.covered - from + 2)
            .filter_map(|c| c.candidates(&walk.descriptors, &walk.ctx))
            .flatten()
            .collect()
    }
}

/// The candidate signatures a rule is matched against, tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    signatures: Vec<Signature>,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::iptables()
    }
}

impl Grammar {
    /// The stock grammar: a full rule with an unordered rule specification,
    /// then a bare `iptables -t <TABLE> -A <CHAIN>` header.
    #[must_use]
    pub fn iptables() -> Self {
        let header = || {
            vec![
                SignatureComponent::Start(StartToken::new("iptables")),
                SignatureComponent::Table(TableSelector::default()),
                SignatureComponent::Command(CommandSelector::default()),
                SignatureComponent::Chain(ChainSelector::default()),
            ]
        };
        let mut full = header();
        full.push(SignatureComponent::Specification(RuleSpecification::new(
            vec![
                FlagMatcher::protocol(ProtocolTag::Tcp),
                FlagMatcher::protocol(ProtocolTag::Udp),
                FlagMatcher::SourceAddress,
                FlagMatcher::DestinationAddress,
                FlagMatcher::InInterface,
                FlagMatcher::OutInterface,
                FlagMatcher::State,
                FlagMatcher::Jump,
            ],
        )));
        Self {
            signatures: vec![
                Signature { components: full },
                Signature {
                    components: header(),
                },
            ],
        }
    }

    #[must_use]
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }
}

/// Builder for a custom [`Grammar`].
///
/// # Example
///
/// ```
/// use iptguide::grammar::{FlagMatcher, GrammarBuilder};
/// use iptguide::TableId;
///
/// let grammar = GrammarBuilder::new()
///     .signature(|s| {
///         s.start("iptables")
///             .tables([TableId::Filter])
///             .command()
///             .chain()
///             .specification([FlagMatcher::SourceAddress, FlagMatcher::Jump])
///     })
///     .build()
///     .unwrap();
/// assert_eq!(grammar.signatures().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    signatures: Vec<Vec<SignatureComponent>>,
}

/// Intermediate builder passed to the signature definition closure.
#[derive(Debug, Default)]
pub struct SignatureBuilder {
    components: Vec<SignatureComponent>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a signature. Signatures are tried in definition order.
    #[must_use]
    pub fn signature(mut self, f: impl FnOnce(SignatureBuilder) -> SignatureBuilder) -> Self {
        self.signatures.push(f(SignatureBuilder::default()).components);
        self
    }

    /// Validate and assemble the grammar.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError`] if no signature was defined, a signature has
    /// no components, or a signature holds more than one rule specification.
    pub fn build(self) -> Result<Grammar, GrammarError> {
        if self.signatures.is_empty() {
            return Err(GrammarError::NoSignatures);
        }
        let mut signatures = Vec::with_capacity(self.signatures.len());
        for (index, components) in self.signatures.into_iter().enumerate() {
            if components.is_empty() {
                return Err(GrammarError::EmptySignature { index });
            }
            let specs = components
                .iter()
                .filter(|c| matches!(c, SignatureComponent::Specification(_)))
                .count();
            if specs > 1 {
                return Err(GrammarError::MultipleSpecifications { index, count: specs });
            }
            signatures.push(Signature { components });
        }
        Ok(Grammar { signatures })
    }
}

impl SignatureBuilder {
    #[must_use]
    pub fn start(mut self, literal: &'static str) -> Self {
        self.components
            .push(SignatureComponent::Start(StartToken::new(literal)));
        self
    }

    /// `-t` accepting every known table.
    #[must_use]
    pub fn table(self) -> Self {
        self.component(SignatureComponent::Table(TableSelector::default()))
    }

    /// `-t` restricted to the given tables.
    #[must_use]
    pub fn tables(self, tables: impl IntoIterator<Item = TableId>) -> Self {
        self.component(SignatureComponent::Table(TableSelector::new(tables)))
    }

    #[must_use]
    pub fn command(self) -> Self {
        self.component(SignatureComponent::Command(CommandSelector::default()))
    }

    #[must_use]
    pub fn chain(self) -> Self {
        self.component(SignatureComponent::Chain(ChainSelector::default()))
    }

    #[must_use]
    pub fn specification(self, options: impl IntoIterator<Item = FlagMatcher>) -> Self {
        self.component(SignatureComponent::Specification(RuleSpecification::new(
            options.into_iter().collect(),
        )))
    }

    #[must_use]
    pub fn component(mut self, component: SignatureComponent) -> Self {
        self.components.push(component);
        self
    }
}
