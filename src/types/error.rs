use thiserror::Error;

/// A [`GrammarBuilder`](crate::grammar::GrammarBuilder) definition that
/// cannot be matched against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("no signatures defined; at least one signature is required")]
    NoSignatures,

    #[error("signature {index} has no components")]
    EmptySignature { index: usize },

    #[error("signature {index} has {count} rule specifications; at most one is allowed")]
    MultipleSpecifications { index: usize, count: usize },
}

/// Failure to save or load a rule store.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("line {line}: malformed chain header '{text}', expected '#<TABLE>.<CHAIN>'")]
    MalformedHeader { line: usize, text: String },

    #[error("line {line}: unknown table '{name}'")]
    UnknownTable { line: usize, name: String },

    #[error("line {line}: unknown chain '{name}'")]
    UnknownChain { line: usize, name: String },

    #[error("line {line}: chain {chain} is not part of table {table}")]
    ChainNotInTable {
        line: usize,
        table: String,
        chain: String,
    },
}

/// Failure to read or write packets during a replay.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "capture-json")]
    #[error("capture line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grammar_messages() {
        assert_eq!(
            GrammarError::NoSignatures.to_string(),
            "no signatures defined; at least one signature is required"
        );
        assert_eq!(
            GrammarError::EmptySignature { index: 2 }.to_string(),
            "signature 2 has no components"
        );
        assert_eq!(
            GrammarError::MultipleSpecifications { index: 0, count: 3 }.to_string(),
            "signature 0 has 3 rule specifications; at most one is allowed"
        );
    }

    #[test]
    fn malformed_header_message() {
        let err = PersistError::MalformedHeader {
            line: 4,
            text: "#FILTER INPUT".into(),
        };
        assert_eq!(
            err.to_string(),
            "line 4: malformed chain header '#FILTER INPUT', expected '#<TABLE>.<CHAIN>'"
        );
    }

    #[test]
    fn chain_not_in_table_message() {
        let err = PersistError::ChainNotInTable {
            line: 1,
            table: "FILTER".into(),
            chain: "PREROUTING".into(),
        };
        assert_eq!(
            err.to_string(),
            "line 1: chain PREROUTING is not part of table FILTER"
        );
    }

    #[test]
    fn unknown_names() {
        let err = PersistError::UnknownTable {
            line: 7,
            name: "MANGLE".into(),
        };
        assert_eq!(err.to_string(), "line 7: unknown table 'MANGLE'");
        let err = PersistError::UnknownChain {
            line: 2,
            name: "OUTPUTS".into(),
        };
        assert_eq!(err.to_string(), "line 2: unknown chain 'OUTPUTS'");
    }

    #[test]
    fn io_is_transparent() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "rules.txt");
        assert_eq!(PersistError::from(io).to_string(), "rules.txt");
    }
}
