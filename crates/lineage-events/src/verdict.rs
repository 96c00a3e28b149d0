//! Before-listener verdicts

/// Result of a before-listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Verdict {
    /// Cancel the occurrence
    Cancel,
    /// Let the occurrence proceed and stop asking further listeners
    Allow,
    /// No opinion
    #[default]
    Pass,
}

impl Verdict {
    /// Whether this verdict ends the before phase
    pub fn is_decisive(self) -> bool {
        self != Verdict::Pass
    }

    /// Whether this verdict cancels the occurrence
    pub fn is_cancel(self) -> bool {
        self == Verdict::Cancel
    }

    /// `Cancel` for `true`, `Allow` for `false`
    pub fn from_cancel(cancel: bool) -> Self {
        if cancel {
            Verdict::Cancel
        } else {
            Verdict::Allow
        }
    }
}

impl From<Option<bool>> for Verdict {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Verdict::Pass, Verdict::from_cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_helpers() {
        assert_eq!(Verdict::default(), Verdict::Pass);
        assert!(Verdict::Allow.is_decisive());
        assert!(!Verdict::Pass.is_decisive());
        assert!(Verdict::Cancel.is_cancel());
        assert_eq!(Verdict::from(Some(true)), Verdict::Cancel);
        assert_eq!(Verdict::from(Some(false)), Verdict::Allow);
        assert_eq!(Verdict::from(None), Verdict::Pass);
    }
}
