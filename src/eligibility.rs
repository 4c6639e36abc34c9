//! Eligibility filters over candidate names

use regex::Regex;

use crate::error::ConfigError;

/// Decides whether a candidate name may be considered at all
pub trait EligibilityFilter: Send + Sync {
    fn is_eligible(&self, name: &str) -> bool;
}

/// Every candidate is eligible
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl EligibilityFilter for AcceptAll {
    fn is_eligible(&self, _name: &str) -> bool {
        true
    }
}

impl<F> EligibilityFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_eligible(&self, name: &str) -> bool {
        self(name)
    }
}

/// Names must fully match at least one pattern; no patterns admits everything
#[derive(Debug, Clone, Default)]
pub struct IncludePatterns {
    patterns: Vec<Regex>,
}

impl IncludePatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(&format!("^(?:{pattern})$")).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl EligibilityFilter for IncludePatterns {
    fn is_eligible(&self, name: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.is_match(name))
    }
}
