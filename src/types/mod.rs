mod descriptor;
mod error;
mod packet;
mod replay_report;
mod rule;
mod store;
mod table;
mod value;
mod verdict;

pub use descriptor::{Action, Condition, Descriptor, Role, Segment};
pub use error::{CaptureError, GrammarError, PersistError};
pub use packet::{Layer, Packet, ProtocolTag, META_LAYER};
pub use replay_report::ReplayReport;
pub use rule::{ParseOutcome, Rule};
pub use store::{ChangeKind, RuleStore, StoreEvent};
pub(crate) use table::slots;
pub use table::{ChainId, TableId};
pub use value::Value;
pub use verdict::Verdict;
