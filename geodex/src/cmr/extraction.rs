//! Extraction of text chunks and KMS term references from UMM metadata.
//!
//! Extraction is pure and total: the same metadata always yields the
//! same result, and missing or empty fields are skipped rather than
//! raised.

use serde_json::Value;

use crate::error::{GeodexError, Result};
use crate::models::{
    ConceptAction, ConceptMessage, ConceptType, EmbeddingChunk, ExtractionResult, KmsScheme,
    KmsTermRef,
};

// UMM field name -> attribute name, per concept type
const COLLECTION_FIELDS: &[(&str, &str)] = &[
    ("EntryTitle", "title"),
    ("Abstract", "abstract"),
    ("Purpose", "purpose"),
];

const VARIABLE_FIELDS: &[(&str, &str)] = &[
    ("Name", "name"),
    ("LongName", "long_name"),
    ("Definition", "definition"),
];

const CITATION_FIELDS: &[(&str, &str)] = &[("Name", "name"), ("Abstract", "abstract")];

fn non_empty_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value.and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

fn extract_text_chunks(
    concept_type: ConceptType,
    concept_id: &str,
    metadata: &Value,
    field_map: &[(&str, &str)],
) -> Vec<EmbeddingChunk> {
    let mut chunks = Vec::new();
    for (umm_field, attribute) in field_map {
        if let Some(text) = non_empty_str(metadata.get(*umm_field)) {
            chunks.push(EmbeddingChunk::new(
                concept_type,
                concept_id,
                *attribute,
                text,
            ));
        }
    }
    chunks
}

/// Science keywords are hierarchical (Category > Topic > Term >
/// VariableLevel1-3); the most specific non-empty level wins.
fn extract_science_keywords(metadata: &Value) -> Vec<KmsTermRef> {
    let Some(keywords) = metadata.get("ScienceKeywords").and_then(|k| k.as_array()) else {
        return Vec::new();
    };

    keywords
        .iter()
        .filter_map(|kw| {
            let term = non_empty_str(kw.get("VariableLevel3"))
                .or_else(|| non_empty_str(kw.get("VariableLevel2")))
                .or_else(|| non_empty_str(kw.get("VariableLevel1")))
                .or_else(|| non_empty_str(kw.get("Term")))?;
            Some(KmsTermRef::new(term, KmsScheme::ScienceKeywords))
        })
        .collect()
}

fn extract_platforms_and_instruments(metadata: &Value) -> Vec<KmsTermRef> {
    let Some(platforms) = metadata.get("Platforms").and_then(|p| p.as_array()) else {
        return Vec::new();
    };

    let mut terms = Vec::new();
    for platform in platforms {
        if let Some(name) = non_empty_str(platform.get("ShortName")) {
            terms.push(KmsTermRef::new(name, KmsScheme::Platforms));
        }

        if let Some(instruments) = platform.get("Instruments").and_then(|i| i.as_array()) {
            for instrument in instruments {
                if let Some(name) = non_empty_str(instrument.get("ShortName")) {
                    terms.push(KmsTermRef::new(name, KmsScheme::Instruments));
                }
            }
        }
    }
    terms
}

fn extract_citation_authors(concept_id: &str, metadata: &Value) -> Option<EmbeddingChunk> {
    let authors = metadata
        .get("CitationMetadata")?
        .get("Author")?
        .as_array()?;

    let names: Vec<String> = authors
        .iter()
        .filter_map(|author| {
            let family = non_empty_str(author.get("Family"))?;
            match non_empty_str(author.get("Given")) {
                Some(given) => Some(format!("{given} {family}")),
                None => Some(family.to_string()),
            }
        })
        .collect();

    if names.is_empty() {
        return None;
    }

    Some(EmbeddingChunk::new(
        ConceptType::Citation,
        concept_id,
        "authors",
        names.join("; "),
    ))
}

fn extract_citation_publisher(concept_id: &str, metadata: &Value) -> Option<EmbeddingChunk> {
    let publisher = non_empty_str(metadata.get("CitationMetadata")?.get("Publisher"))?;
    Some(EmbeddingChunk::new(
        ConceptType::Citation,
        concept_id,
        "publisher",
        publisher,
    ))
}

fn extract_from_collection(concept_id: &str, metadata: &Value) -> ExtractionResult {
    let chunks = extract_text_chunks(ConceptType::Collection, concept_id, metadata, COLLECTION_FIELDS);
    let mut kms_terms = extract_science_keywords(metadata);
    kms_terms.extend(extract_platforms_and_instruments(metadata));
    ExtractionResult { chunks, kms_terms }
}

fn extract_from_variable(concept_id: &str, metadata: &Value) -> ExtractionResult {
    ExtractionResult {
        chunks: extract_text_chunks(ConceptType::Variable, concept_id, metadata, VARIABLE_FIELDS),
        kms_terms: extract_science_keywords(metadata),
    }
}

fn extract_from_citation(concept_id: &str, metadata: &Value) -> ExtractionResult {
    let mut chunks = extract_text_chunks(ConceptType::Citation, concept_id, metadata, CITATION_FIELDS);

    if let Some(author_chunk) = extract_citation_authors(concept_id, metadata) {
        chunks.push(author_chunk);
    }
    if let Some(publisher_chunk) = extract_citation_publisher(concept_id, metadata) {
        chunks.push(publisher_chunk);
    }

    ExtractionResult {
        chunks,
        kms_terms: Vec::new(),
    }
}

/// Route to the extractor for the message's concept type.
pub fn extract_data(message: &ConceptMessage, metadata: &Value) -> ExtractionResult {
    match message.concept_type {
        ConceptType::Collection => extract_from_collection(&message.concept_id, metadata),
        ConceptType::Variable => extract_from_variable(&message.concept_id, metadata),
        ConceptType::Citation => extract_from_citation(&message.concept_id, metadata),
    }
}

/// Build a synthetic update message from a CMR search result item.
/// Missing identifiers are an error the bootstrap driver counts and
/// skips.
pub fn extract_concept_info(concept_type: ConceptType, item: &Value) -> Result<ConceptMessage> {
    let meta = item.get("meta").cloned().unwrap_or(Value::Null);
    let concept_id = non_empty_str(meta.get("concept-id"));
    let revision_id = meta.get("revision-id").and_then(|r| r.as_i64());

    match (concept_id, revision_id) {
        (Some(concept_id), Some(revision_id)) => Ok(ConceptMessage {
            action: ConceptAction::Update,
            concept_type,
            concept_id: concept_id.to_string(),
            revision_id,
        }),
        _ => Err(GeodexError::Cmr(format!(
            "Missing concept-id or revision-id in item: {meta}"
        ))),
    }
}
