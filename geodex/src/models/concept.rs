use serde::{Deserialize, Serialize};
use std::fmt;

/// Action carried by a concept event from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConceptAction {
    #[serde(rename = "concept-update")]
    Update,
    #[serde(rename = "concept-delete")]
    Delete,
}

/// CMR concept types the pipeline indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConceptType {
    Collection,
    Variable,
    Citation,
}

impl ConceptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Variable => "variable",
            Self::Citation => "citation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "collection" => Some(Self::Collection),
            "variable" => Some(Self::Variable),
            "citation" => Some(Self::Citation),
            _ => None,
        }
    }
}

impl fmt::Display for ConceptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message from the ingest queue describing a CMR concept event.
///
/// `(concept_id, revision_id)` uniquely identifies a snapshot and doubles
/// as the queue deduplication key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptMessage {
    pub action: ConceptAction,
    #[serde(rename = "concept-type")]
    pub concept_type: ConceptType,
    #[serde(rename = "concept-id")]
    pub concept_id: String,
    #[serde(rename = "revision-id")]
    pub revision_id: i64,
}

impl ConceptMessage {
    /// FIFO message group: all revisions of one concept share a group so
    /// the queue delivers them strictly in order.
    pub fn group_id(&self) -> String {
        format!("{}:{}", self.concept_type, self.concept_id)
    }

    /// FIFO deduplication id, suppressing immediate replay of one snapshot.
    pub fn dedup_id(&self) -> String {
        format!("{}:{}", self.concept_id, self.revision_id)
    }
}
