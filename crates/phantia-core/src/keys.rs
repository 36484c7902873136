//! Key namespace scheme: `<prefix>:<kind>:<identifier>`.
//!
//! The prefix and the kind tokens never contain `:`, so the kind is always the
//! second segment of a key. A `:` inside an identifier can only extend the
//! third segment, which keeps each kind's namespace disjoint from the others
//! and the mapping injective without escaping. Identifiers are trusted tokens
//! (JIDs, session ids); only empty identifiers are rejected.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use phantia_shared::constants::DEFAULT_KEY_PREFIX;

use crate::error::KeyError;

const DELIMITER: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Context,
    State,
    Buffer,
    Lock,
    Rate,
}

impl KeyKind {
    pub const ALL: [KeyKind; 5] = [
        KeyKind::Context,
        KeyKind::State,
        KeyKind::Buffer,
        KeyKind::Lock,
        KeyKind::Rate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Context => "context",
            KeyKind::State => "state",
            KeyKind::Buffer => "buffer",
            KeyKind::Lock => "lock",
            KeyKind::Rate => "rate",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyKind {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| KeyError::Malformed(format!("unknown kind {:?}", s)))
    }
}

/// Builds and parses store keys under one fixed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: Arc<str>,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Result<Self, KeyError> {
        let prefix = prefix.into();
        if prefix.is_empty() || prefix.contains(DELIMITER) {
            return Err(KeyError::InvalidPrefix(prefix));
        }
        Ok(Self { prefix: prefix.into() })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key(&self, kind: KeyKind, id: &str) -> Result<String, KeyError> {
        if id.is_empty() {
            return Err(KeyError::EmptyIdentifier);
        }
        Ok(format!("{}{d}{}{d}{}", self.prefix, kind.as_str(), id, d = DELIMITER))
    }

    /// Split a key produced by [`KeySpace::key`] back into kind and identifier.
    pub fn parse<'a>(&self, key: &'a str) -> Result<(KeyKind, &'a str), KeyError> {
        let mut it = key.splitn(3, DELIMITER);
        let prefix = it.next().unwrap_or("");
        let kind = it.next().ok_or_else(|| KeyError::Malformed(key.to_string()))?;
        let id = it.next().ok_or_else(|| KeyError::Malformed(key.to_string()))?;
        if prefix != &*self.prefix {
            return Err(KeyError::Malformed(format!("foreign prefix in {}", key)));
        }
        if id.is_empty() {
            return Err(KeyError::EmptyIdentifier);
        }
        Ok((kind.parse()?, id))
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_KEY_PREFIX.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = KeySpace::default();
        assert_eq!(
            keys.key(KeyKind::Buffer, "5511999999999@s.whatsapp.net").unwrap(),
            "phantia:buffer:5511999999999@s.whatsapp.net"
        );
        assert_eq!(keys.key(KeyKind::Rate, "abc").unwrap(), "phantia:rate:abc");
    }

    #[test]
    fn test_prefix_validation() {
        assert_eq!(KeySpace::new(""), Err(KeyError::InvalidPrefix(String::new())));
        assert!(matches!(KeySpace::new("a:b"), Err(KeyError::InvalidPrefix(_))));
        assert_eq!(KeySpace::new("tenant1").unwrap().prefix(), "tenant1");
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let keys = KeySpace::default();
        assert_eq!(keys.key(KeyKind::Lock, ""), Err(KeyError::EmptyIdentifier));
    }

    #[test]
    fn test_delimiter_in_identifier_stays_in_kind() {
        let keys = KeySpace::default();
        // "state:x" as a context id must not produce a state key
        let tricky = keys.key(KeyKind::Context, "state:x").unwrap();
        let plain = keys.key(KeyKind::State, "x").unwrap();
        assert_ne!(tricky, plain);
        assert_eq!(keys.parse(&tricky).unwrap(), (KeyKind::Context, "state:x"));
    }

    #[test]
    fn test_no_collisions_across_kinds() {
        let keys = KeySpace::default();
        let ids = ["a", "a:b", "context", "lock:a", ":", "x:"];
        let mut seen = std::collections::HashSet::new();
        for kind in KeyKind::ALL {
            for id in ids {
                assert!(seen.insert(keys.key(kind, id).unwrap()));
            }
        }
    }

    #[test]
    fn test_parse_rejects_foreign_and_malformed_keys() {
        let keys = KeySpace::default();
        assert!(keys.parse("other:state:x").is_err());
        assert!(keys.parse("phantia:state").is_err());
        assert!(keys.parse("phantia:bogus:x").is_err());
        assert_eq!(keys.parse("phantia:state:"), Err(KeyError::EmptyIdentifier));
    }
}
