use std::fmt;
use std::time::Duration;

/// Summary of one
/// [`RuleStore::run_chain_on_raw_packets`](super::RuleStore::run_chain_on_raw_packets)
/// call.
///
/// Records how many packets were read, written and dropped, which rule
/// decided each packet, and the wall-clock duration of the replay.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ReplayReport {
    written: usize,
    dropped: usize,
    decisions: Vec<Option<usize>>,
    duration: Duration,
}

impl ReplayReport {
    pub(crate) fn new(
        written: usize,
        dropped: usize,
        decisions: Vec<Option<usize>>,
        duration: Duration,
    ) -> Self {
        Self {
            written,
            dropped,
            decisions,
            duration,
        }
    }

    #[must_use]
    pub fn read(&self) -> usize {
        self.decisions.len()
    }

    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Per input packet, the index of the rule that matched it, or `None`
    /// when the packet fell through to the default accept.
    #[must_use]
    pub fn decisions(&self) -> &[Option<usize>] {
        &self.decisions
    }

    /// Wall-clock duration of the replay.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read: {}, written: {}, dropped: {}",
            self.read(),
            self.written,
            self.dropped
        )?;
        let defaulted = self.decisions.iter().filter(|d| d.is_none()).count();
        write!(f, ", default accept: {defaulted}")?;
        write!(f, ", duration: {:?}", self.duration)?;
        Ok(())
    }
}
