//! Lookup results

use serde::Serialize;

use crate::domain::DomainError;

/// A similarity search match against an indexed entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticMatch {
    similarity_score: f32,
    matched_entry_key: String,
    confidence: f32,
}

impl SemanticMatch {
    pub fn new(
        matched_entry_key: impl Into<String>,
        similarity_score: f32,
        confidence: f32,
    ) -> Result<Self, DomainError> {
        let matched_entry_key = matched_entry_key.into();

        if matched_entry_key.is_empty() {
            return Err(DomainError::validation("Matched entry key must not be empty"));
        }

        check_unit_range("similarity_score", similarity_score)?;
        check_unit_range("confidence", confidence)?;

        Ok(Self {
            similarity_score,
            matched_entry_key,
            confidence,
        })
    }

    pub fn similarity_score(&self) -> f32 {
        self.similarity_score
    }

    pub fn matched_entry_key(&self) -> &str {
        &self.matched_entry_key
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

pub(crate) fn check_unit_range(name: &str, value: f32) -> Result<(), DomainError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}

/// How a hit was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    /// Derived cache key present in storage
    Exact,
    /// Normalized text, intent bucket or token overlap of a stored query
    Lexical,
    /// Fused dense + sparse retrieval
    Semantic,
}

impl HitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
        }
    }
}

/// A reusable cached value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheHit {
    #[serde(serialize_with = "serialize_lossy_utf8")]
    value: Vec<u8>,
    entry_key: String,
    kind: HitKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    similarity_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f32>,
    response_time_ms: u64,
}

impl CacheHit {
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    pub fn entry_key(&self) -> &str {
        &self.entry_key
    }

    pub fn kind(&self) -> HitKind {
        self.kind
    }

    pub fn similarity_score(&self) -> Option<f32> {
        self.similarity_score
    }

    pub fn confidence(&self) -> Option<f32> {
        self.confidence
    }

    pub fn response_time_ms(&self) -> u64 {
        self.response_time_ms
    }
}

/// Outcome of a lookup
///
/// Errors on the read path are reported as misses; callers cannot tell an
/// unavailable cache from an empty one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CacheResult {
    Hit(CacheHit),
    Miss { response_time_ms: u64 },
}

impl CacheResult {
    pub fn miss(response_time_ms: u64) -> Self {
        Self::Miss { response_time_ms }
    }

    /// Hit found through the derived key; carries no similarity score
    pub fn exact_hit(value: Vec<u8>, entry_key: impl Into<String>, response_time_ms: u64) -> Self {
        Self::Hit(CacheHit {
            value,
            entry_key: entry_key.into(),
            kind: HitKind::Exact,
            similarity_score: None,
            confidence: None,
            response_time_ms,
        })
    }

    /// Hit found by a similarity stage, optionally scored
    pub fn similar_hit(
        value: Vec<u8>,
        entry_key: impl Into<String>,
        kind: HitKind,
        similarity_score: Option<f32>,
        confidence: Option<f32>,
        response_time_ms: u64,
    ) -> Self {
        Self::Hit(CacheHit {
            value,
            entry_key: entry_key.into(),
            kind,
            similarity_score,
            confidence,
            response_time_ms,
        })
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    pub fn hit(&self) -> Option<&CacheHit> {
        match self {
            Self::Hit(hit) => Some(hit),
            Self::Miss { .. } => None,
        }
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.hit().map(CacheHit::value)
    }

    pub fn entry_key(&self) -> Option<&str> {
        self.hit().map(CacheHit::entry_key)
    }

    pub fn similarity_score(&self) -> Option<f32> {
        self.hit().and_then(CacheHit::similarity_score)
    }

    pub fn confidence(&self) -> Option<f32> {
        self.hit().and_then(CacheHit::confidence)
    }

    pub fn response_time_ms(&self) -> u64 {
        match self {
            Self::Hit(hit) => hit.response_time_ms,
            Self::Miss { response_time_ms } => *response_time_ms,
        }
    }
}

fn serialize_lossy_utf8<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&String::from_utf8_lossy(value))
}
