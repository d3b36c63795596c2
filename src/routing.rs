//! Tag-to-routing-key derivation.
//!
//! A batch's tag selects its token. When a [`TagRule`] is configured, the
//! routing key is the text captured by the rule's named group; otherwise the
//! tag itself is the key.

use regex::Regex;

use crate::config::{ConfigError, UnmatchedTagPolicy};

/// Compiled `tag_regex` together with the position of its `tag_key` group.
#[derive(Clone, Debug)]
pub struct TagRule {
    regex: Regex,
    key: String,
    index: usize,
}

impl TagRule {
    /// Compile `pattern` and locate the named group `key`.
    pub fn new(pattern: &str, key: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidTagRegex {
            pattern: pattern.to_owned(),
            source,
        })?;
        let index = regex
            .capture_names()
            .position(|name| name == Some(key))
            .ok_or_else(|| ConfigError::TagKeyNotInRegex {
                key: key.to_owned(),
                pattern: pattern.to_owned(),
            })?;
        Ok(Self {
            regex,
            key: key.to_owned(),
            index,
        })
    }

    /// Name of the capture group used as the routing key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Index of that group within the pattern.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Text captured by the routing group, if the tag matches and the group
    /// participated in the match.
    pub fn capture<'t>(&self, tag: &'t str) -> Option<&'t str> {
        self.regex
            .captures(tag)
            .and_then(|caps| caps.get(self.index))
            .map(|m| m.as_str())
    }
}

/// Derives routing keys from tags.
#[derive(Clone, Debug, Default)]
pub struct TagRouter {
    rule: Option<TagRule>,
    unmatched: UnmatchedTagPolicy,
}

impl TagRouter {
    pub fn new(rule: Option<TagRule>, unmatched: UnmatchedTagPolicy) -> Self {
        Self { rule, unmatched }
    }

    /// Router that passes every tag through unchanged.
    pub fn passthrough() -> Self {
        Self::default()
    }

    pub fn rule(&self) -> Option<&TagRule> {
        self.rule.as_ref()
    }

    /// Return the routing key for `tag`.
    ///
    /// `None` means the batch is unrouted: only possible when a rule is set,
    /// the tag does not match it, and the unmatched policy is
    /// [`UnmatchedTagPolicy::Drop`].
    pub fn route<'t>(&self, tag: &'t str) -> Option<&'t str> {
        let Some(rule) = &self.rule else {
            return Some(tag);
        };
        match rule.capture(tag) {
            Some(key) => Some(key),
            None => match self.unmatched {
                UnmatchedTagPolicy::Passthrough => Some(tag),
                UnmatchedTagPolicy::Drop => None,
            },
        }
    }
}
