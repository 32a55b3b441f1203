//! Author, check, store and replay `iptables`-style packet filter rules.
//!
//! Rule text is matched against a [`Grammar`](grammar::Grammar) of
//! signatures. A partial match still yields the recognized
//! [`Descriptor`]s and a set of suggestions for what may come next, so a
//! rule can be checked while it is being typed. Matched rules live in a
//! [`RuleStore`] indexed by table and chain, persist to a line-based text
//! format, and can be replayed against a packet stream.
//!
//! ```
//! use std::sync::Arc;
//! use iptguide::{grammar::Grammar, Packet, ProtocolTag, Rule, Verdict};
//!
//! let mut rule = Rule::new(
//!     "iptables -t FILTER -A INPUT -p tcp --sport 1222 -j DROP",
//!     Arc::new(Grammar::iptables()),
//!     None,
//!     None,
//! );
//! assert!(rule.check_total_correctness());
//!
//! let packet = Packet::new(ProtocolTag::Tcp).set("TCP.sport", 1222_u16);
//! assert_eq!(rule.run_on_packet(&packet), Some(Verdict::Drop));
//! ```

pub mod capture;
mod error;
mod evaluate;
pub mod grammar;
pub mod parse;
pub mod persist;
mod types;

pub use error::GuideError;
pub use types::{
    Action, CaptureError, ChainId, ChangeKind, Condition, Descriptor, GrammarError, Layer,
    Packet, ParseOutcome, PersistError, ProtocolTag, ReplayReport, Role, Rule, RuleStore,
    Segment, StoreEvent, TableId, Value, Verdict, META_LAYER,
};
