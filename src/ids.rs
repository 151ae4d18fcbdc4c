use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Request identifier: a kind prefix plus a ULID, rendered as `req_01J...`.
///
/// The identifier is advisory (it correlates logs and responses); every
/// response, success or error, carries a fresh one.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct RequestId {
    kind: Arc<str>,
    ulid: ulid::Ulid,
}

impl RequestId {
    pub fn new(kind: impl Into<Arc<str>>) -> Self {
        Self {
            kind: kind.into(),
            ulid: ulid::Ulid::new(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn ulid(&self) -> ulid::Ulid {
        self.ulid
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.kind.is_empty() {
            write!(f, "{}", self.ulid)
        } else {
            write!(f, "{}_{}", self.kind, self.ulid)
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid request id '{0}'")]
pub struct ParseRequestIdError(String);

impl FromStr for RequestId {
    type Err = ParseRequestIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, raw) = match s.rsplit_once('_') {
            Some((kind, raw)) => (kind, raw),
            None => ("", s),
        };
        let ulid = ulid::Ulid::from_string(raw).map_err(|_| ParseRequestIdError(s.to_string()))?;
        Ok(RequestId {
            kind: Arc::from(kind),
            ulid,
        })
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<RequestId>().map_err(serde::de::Error::custom)
    }
}

/// Hands out request identifiers of one kind.
#[derive(Clone, Debug)]
pub struct IdGenerator {
    kind: Arc<str>,
}

impl IdGenerator {
    pub fn new(kind: impl Into<Arc<str>>) -> Self {
        Self { kind: kind.into() }
    }

    pub fn next_id(&self) -> RequestId {
        RequestId::new(Arc::clone(&self.kind))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new("req")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_prefixed_and_fresh() {
        let ids = IdGenerator::default();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("req_"));
    }

    #[test]
    fn parses_its_own_rendering() {
        let id = RequestId::new("req");
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("req_not-a-ulid".parse::<RequestId>().is_err());
    }
}
