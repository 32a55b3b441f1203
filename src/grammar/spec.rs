use crate::types::Descriptor;

use super::{FlagMatcher, Fit};

/// An unordered set of optional flag matchers.
///
/// Matching scans the options from the first one. The first unmatched option
/// that fits the remaining tokens is consumed and the scan restarts from the
/// top; a failing option only advances the scan. Matching stops when a full
/// scan adds nothing or the tokens run out, so independent flags may appear in
/// any order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSpecification {
    options: Vec<FlagMatcher>,
}

impl RuleSpecification {
    #[must_use]
    pub fn new(options: Vec<FlagMatcher>) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &[FlagMatcher] {
        &self.options
    }

    /// `None` when no option matched at all.
    #[must_use]
    pub fn find_fit<'t>(&self, tokens: &[&'t str]) -> Option<Fit<'t>> {
        let mut claimed = vec![false; self.options.len()];
        let mut fit = Fit::new(Vec::new(), tokens.to_vec());
        let mut i = 0;
        while i < self.options.len() && !fit.rest.is_empty() {
            if !claimed[i] {
                if let Some(step) = self.options[i].find_fit(&fit.rest) {
                    fit.descriptors.extend(step.descriptors);
                    fit.rest = step.rest;
                    claimed[i] = true;
                    i = 0;
                    continue;
                }
            }
            i += 1;
        }
        if fit.descriptors.is_empty() {
            None
        } else {
            Some(fit)
        }
    }

    /// Forms of the options not yet matched, including the nested options of
    /// protocols that were.
    #[must_use]
    pub fn candidates(&self, matched: &[Descriptor]) -> Option<Vec<String>> {
        let mut out = Vec::new();
        for option in &self.options {
            let claimed = matched.iter().any(|d| option.produced(d));
            match option {
                FlagMatcher::Protocol { options, .. } if claimed => {
                    out.extend(options.candidates(matched).unwrap_or_default());
                }
                _ if claimed => {}
                _ => out.extend(option.forms()),
            }
        }
        (!out.is_empty()).then_some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProtocolTag;

    fn spec() -> RuleSpecification {
        RuleSpecification::new(vec![
            FlagMatcher::protocol(ProtocolTag::Tcp),
            FlagMatcher::SourceAddress,
            FlagMatcher::State,
            FlagMatcher::Jump,
        ])
    }

    fn displays(fit: &Fit<'_>) -> Vec<String> {
        fit.descriptors.iter().map(Descriptor::display).collect()
    }

    #[test]
    fn flags_in_any_order() {
        let a = spec().find_fit(&["-s", "10.0.0.1", "--state", "NEW"]).unwrap();
        let b = spec().find_fit(&["--state", "NEW", "-s", "10.0.0.1"]).unwrap();
        let mut da = displays(&a);
        let mut db = displays(&b);
        da.sort();
        db.sort();
        assert_eq!(da, db);
        assert!(a.rest.is_empty() && b.rest.is_empty());
    }

    #[test]
    fn restarts_after_each_match() {
        // Jump is last in the list but first in the input.
        let fit = spec()
            .find_fit(&["-j", "ACCEPT", "-p", "tcp", "--dport", "22", "-s", "10.0.0.0/8"])
            .unwrap();
        assert_eq!(
            displays(&fit),
            vec!["-j ACCEPT", "-p tcp", "--dport 22", "-s 10.0.0.0/8"]
        );
        assert!(fit.rest.is_empty());
    }

    #[test]
    fn each_option_matches_once() {
        let fit = spec()
            .find_fit(&["--state", "NEW", "--state", "RELATED"])
            .unwrap();
        assert_eq!(displays(&fit), vec!["--state NEW"]);
        assert_eq!(fit.rest, vec!["--state", "RELATED"]);
    }

    #[test]
    fn stops_at_unknown_tokens() {
        let fit = spec().find_fit(&["-s", "10.0.0.1", "--bogus", "-j", "DROP"]).unwrap();
        assert_eq!(displays(&fit), vec!["-s 10.0.0.1"]);
        assert_eq!(fit.rest, vec!["--bogus", "-j", "DROP"]);
    }

    #[test]
    fn nothing_matched_is_none() {
        assert!(spec().find_fit(&["--bogus"]).is_none());
        assert!(spec().find_fit(&[]).is_none());
    }

    #[test]
    fn candidates_skip_claimed_options() {
        let all = spec().candidates(&[]).unwrap();
        assert!(all.contains(&"-p tcp".to_owned()));
        assert!(all.contains(&"-j DROP".to_owned()));
        assert!(!all.contains(&"--sport".to_owned()));

        let fit = spec().find_fit(&["-p", "tcp", "-j", "DROP"]).unwrap();
        let rest = spec().candidates(&fit.descriptors).unwrap();
        assert!(!rest.contains(&"-p tcp".to_owned()));
        assert!(!rest.contains(&"-j DROP".to_owned()));
        assert!(rest.contains(&"--sport".to_owned()));
        assert!(rest.contains(&"--dport".to_owned()));
        assert!(rest.contains(&"-s".to_owned()));
    }

    #[test]
    fn candidates_exhausted() {
        let only = RuleSpecification::new(vec![FlagMatcher::State]);
        let fit = only.find_fit(&["--state", "NEW"]).unwrap();
        assert_eq!(only.candidates(&fit.descriptors), None);
    }
}
