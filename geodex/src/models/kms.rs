use serde::{Deserialize, Serialize};
use std::fmt;

/// KMS concept schemes the pipeline resolves terms against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KmsScheme {
    #[serde(rename = "sciencekeywords")]
    ScienceKeywords,
    #[serde(rename = "platforms")]
    Platforms,
    #[serde(rename = "instruments")]
    Instruments,
}

impl KmsScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScienceKeywords => "sciencekeywords",
            Self::Platforms => "platforms",
            Self::Instruments => "instruments",
        }
    }
}

impl fmt::Display for KmsScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A controlled-vocabulary reference produced by extraction, before the
/// KMS lookup resolves it to a canonical uuid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KmsTermRef {
    pub term: String,
    pub scheme: KmsScheme,
}

impl KmsTermRef {
    pub fn new(term: impl Into<String>, scheme: KmsScheme) -> Self {
        Self {
            term: term.into(),
            scheme,
        }
    }
}

/// A resolved KMS term with its canonical uuid and optional definition.
#[derive(Debug, Clone, PartialEq)]
pub struct KmsTerm {
    pub uuid: String,
    pub scheme: KmsScheme,
    pub term: String,
    pub definition: Option<String>,
}

impl KmsTerm {
    /// Canonical text embedded for this term: the definition gives richer
    /// semantic matching when KMS provides one.
    pub fn embedding_text(&self) -> String {
        match &self.definition {
            Some(definition) => format!("{}: {}", self.term, definition),
            None => self.term.clone(),
        }
    }
}

/// Stored KMS embedding row, as read back for skip-regeneration checks.
#[derive(Debug, Clone)]
pub struct KmsEmbeddingRecord {
    pub uuid: String,
    pub scheme: String,
    pub term: String,
    pub definition: Option<String>,
}
