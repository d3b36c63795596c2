//! Routing-key to token lookup.

use std::{collections::HashMap, fmt, fs};

use crate::config::{ConfigError, CredentialSource, TOKENS_ENV_VAR};

/// Secret prefixed to every frame sent for a routing key.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Validate and wrap `value`.
    ///
    /// Tokens are written verbatim before the space that separates them from
    /// the JSON payload, so whitespace would corrupt the frame.
    fn parse(key: &str, value: String) -> Result<Self, ConfigError> {
        if value.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidToken {
                key: key.to_owned(),
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// Immutable token lookup for one context.
#[derive(Clone, Debug)]
pub enum CredentialStore {
    /// Every routing key maps to the same token.
    Single(Token),
    /// Exact-match lookup by routing key.
    Table(HashMap<String, Token>),
}

impl CredentialStore {
    /// Store that answers every lookup with `token`.
    pub fn single(token: impl Into<String>) -> Result<Self, ConfigError> {
        Token::parse("*", token.into()).map(Self::Single)
    }

    /// Parse a flat JSON object mapping routing keys to tokens.
    ///
    /// Entries with an empty token are kept out of the table; they behave as
    /// if the key were not configured at all.
    pub fn from_json(json: &str, origin: &str) -> Result<Self, ConfigError> {
        let raw: HashMap<String, String> =
            serde_json::from_str(json).map_err(|source| ConfigError::InvalidCredentials {
                origin: origin.to_owned(),
                source,
            })?;
        let mut table = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            if value.is_empty() {
                continue;
            }
            let token = Token::parse(&key, value)?;
            table.insert(key, token);
        }
        Ok(Self::Table(table))
    }

    /// Load the store described by `source`.
    pub fn load(source: &CredentialSource) -> Result<Self, ConfigError> {
        match source {
            CredentialSource::Token(token) => Self::single(token.clone()),
            CredentialSource::File(path) => {
                let json = fs::read_to_string(path).map_err(|source| {
                    ConfigError::CredentialRead {
                        path: path.clone(),
                        source,
                    }
                })?;
                Self::from_json(&json, &path.display().to_string())
            }
            CredentialSource::Environment(json) => Self::from_json(json, TOKENS_ENV_VAR),
        }
    }

    /// Token for `routing_key`, or `None` when the key is not configured.
    pub fn resolve(&self, routing_key: &str) -> Option<&Token> {
        match self {
            Self::Single(token) => Some(token),
            Self::Table(table) => table.get(routing_key),
        }
    }

    /// Number of configured routing keys (`None` in single-token mode).
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Single(_) => None,
            Self::Table(table) => Some(table.len()),
        }
    }
}
