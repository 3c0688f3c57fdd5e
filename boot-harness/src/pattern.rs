//! Expected-output patterns
//!
//! A [`PatternSet`] is the definition of a successful boot: every pattern must
//! match somewhere in the captured output, in any order.

use regex::bytes::Regex;

use crate::error::{Error, Result};

/// An immutable, ordered, non-empty set of compiled patterns
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile every pattern up front so a typo fails before the first trial
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(p).map_err(|e| Error::invalid_pattern(p, e))
            })
            .collect::<Result<Vec<_>>>()?;

        if patterns.is_empty() {
            return Err(Error::EmptyPatternSet);
        }

        Ok(Self { patterns })
    }

    /// True iff every pattern matches somewhere in `haystack`
    pub fn all_matched(&self, haystack: &[u8]) -> bool {
        self.patterns.iter().all(|re| re.is_match(haystack))
    }

    /// Patterns without a match, in declaration order
    pub fn missing(&self, haystack: &[u8]) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|re| !re.is_match(haystack))
            .map(Regex::as_str)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
