// 🔗 Cross-Reference Resolver - external ontology terms <-> OMOP standard concepts
//
// Both directions bridge through the vocabularies OMOP and OxO share
// (ICD9CM, ICD10CM, SNOMED, MeSH):
//
//   forward:  CURIE --OxO--> bridge code --Maps to--> standard concept
//   backward: standard concept --Maps to⁻¹--> bridge code --OxO--> CURIE
//
// total_distance = OxO distance + OMOP distance (0 when no "Maps to" hop was needed)

use crate::concept::{Concept, StandardConcept};
use crate::crosswalk::{self, BRIDGE_VOCABULARIES, MAPPING_TARGETS};
use crate::error::{CohdError, Result};
use crate::gateway::{ExternalMappingCandidate, MappingGateway, SearchResult};
use crate::ranking::{stable_rank, Direction};
use crate::store::ConceptStore;
use serde::Serialize;
use tracing::{debug, warn};

pub const DEFAULT_DISTANCE: u32 = 2;

// ============================================================================
// MAPPING RECORDS
// ============================================================================

/// One end of a mapping: an external CURIE, an OMOP concept, or both
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingEndpoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curie: Option<String>,

    pub label: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocabulary_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
}

impl MappingEndpoint {
    pub fn external(curie: &str, label: &str) -> Self {
        MappingEndpoint {
            curie: Some(curie.to_string()),
            label: label.to_string(),
            concept_id: None,
            vocabulary_id: None,
            concept_code: None,
            domain_id: None,
        }
    }

    pub fn concept(concept: &Concept) -> Self {
        MappingEndpoint {
            curie: None,
            label: concept.concept_name.clone(),
            concept_id: Some(concept.concept_id),
            vocabulary_id: Some(concept.vocabulary_id.clone()),
            concept_code: Some(concept.concept_code.clone()),
            domain_id: Some(concept.domain_id.clone()),
        }
    }

    pub fn with_curie(mut self, curie: &str) -> Self {
        self.curie = Some(curie.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossReferenceMapping {
    pub source: MappingEndpoint,
    pub intermediate: MappingEndpoint,
    pub target: MappingEndpoint,
    /// OxO hop count
    pub external_distance: u32,
    /// 0 or 1: whether a "Maps to" hop was needed
    pub internal_distance: u32,
    pub total_distance: u32,
}

impl CrossReferenceMapping {
    pub fn new(
        source: MappingEndpoint,
        intermediate: MappingEndpoint,
        target: MappingEndpoint,
        external_distance: u32,
        internal_distance: u32,
    ) -> Self {
        CrossReferenceMapping {
            source,
            intermediate,
            target,
            external_distance,
            internal_distance,
            total_distance: external_distance + internal_distance,
        }
    }
}

/// Closest mappings first, ties in encounter order
fn rank_by_distance(mappings: &mut [CrossReferenceMapping]) {
    stable_rank(mappings, Direction::Ascending, |m| m.total_distance as f64);
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct CrossReferenceResolver<'a> {
    store: &'a dyn ConceptStore,
    gateway: &'a dyn MappingGateway,
    default_distance: u32,
}

impl<'a> CrossReferenceResolver<'a> {
    pub fn new(store: &'a dyn ConceptStore, gateway: &'a dyn MappingGateway) -> Self {
        CrossReferenceResolver {
            store,
            gateway,
            default_distance: DEFAULT_DISTANCE,
        }
    }

    pub fn with_default_distance(mut self, distance: u32) -> Self {
        self.default_distance = distance;
        self
    }

    /// Map an external identifier to OMOP standard concepts.
    ///
    /// With `vocabulary`, `code` is a bare code in that vocabulary; without it,
    /// `code` must already be a CURIE (e.g. `DOID:8398`).
    pub fn forward(
        &self,
        code: &str,
        vocabulary: Option<&str>,
        distance: Option<u32>,
    ) -> Result<Vec<CrossReferenceMapping>> {
        let curie = query_curie(code, vocabulary)?;
        let distance = distance.unwrap_or(self.default_distance);
        let targets: Vec<String> = MAPPING_TARGETS.iter().map(|t| t.to_string()).collect();

        let results = self
            .gateway
            .search(std::slice::from_ref(&curie), &targets, distance)?;

        let search_result = match results.into_iter().next() {
            Some(result) => result,
            None => return Ok(Vec::new()),
        };

        let source = MappingEndpoint::external(&search_result.curie, &search_result.label);
        let mut mappings = Vec::new();

        for candidate in &search_result.mappings {
            for standard in self.standard_concepts_for(candidate)? {
                let internal_distance = if standard.is_self_mapping() { 0 } else { 1 };

                let intermediate = MappingEndpoint {
                    curie: Some(candidate.curie.clone()),
                    label: candidate.label.clone(),
                    concept_id: Some(standard.source_concept_id),
                    vocabulary_id: Some(standard.source_vocabulary_id.clone()),
                    concept_code: Some(standard.source_concept_code.clone()),
                    domain_id: None,
                };
                let target = MappingEndpoint {
                    curie: None,
                    label: standard.standard_concept_name.clone(),
                    concept_id: Some(standard.standard_concept_id),
                    vocabulary_id: None,
                    concept_code: None,
                    domain_id: Some(standard.standard_domain_id.clone()),
                };

                mappings.push(CrossReferenceMapping::new(
                    source.clone(),
                    intermediate,
                    target,
                    candidate.distance,
                    internal_distance,
                ));
            }
        }

        rank_by_distance(&mut mappings);
        Ok(mappings)
    }

    /// "Maps to" edges for one OxO candidate; empty when its namespace has no OMOP vocabulary
    fn standard_concepts_for(&self, candidate: &ExternalMappingCandidate) -> Result<Vec<StandardConcept>> {
        let (prefix, code) = match crosswalk::split_curie(&candidate.curie) {
            Some(parts) => parts,
            None => {
                debug!(curie = %candidate.curie, "Skipping candidate without namespace");
                return Ok(Vec::new());
            }
        };

        match crosswalk::internal_vocabulary(prefix) {
            Some(vocabulary_id) => self.store.maps_to_standard(code, Some(vocabulary_id)),
            None => {
                debug!(curie = %candidate.curie, "Skipping candidate with unknown prefix");
                Ok(Vec::new())
            }
        }
    }

    /// Map an OMOP concept outward to external ontologies.
    ///
    /// Empty `mapping_targets` lets OxO search every namespace it knows.
    pub fn backward(
        &self,
        concept_id: i64,
        mapping_targets: &[String],
        distance: Option<u32>,
    ) -> Result<Vec<CrossReferenceMapping>> {
        let source = match self.store.concept_by_id(concept_id)? {
            Some(concept) => concept,
            None => {
                debug!(concept_id, "Concept not found");
                return Ok(Vec::new());
            }
        };

        let mut bridged = self.store.maps_from_standard(concept_id, BRIDGE_VOCABULARIES)?;

        // A source that is its own standard concept may have no "Maps to" row
        let found_source = bridged.iter().any(|c| c.concept_id == source.concept_id);
        if !found_source && crosswalk::is_bridgeable(&source.vocabulary_id) {
            bridged.push(source.clone());
        }

        if bridged.is_empty() {
            return Ok(Vec::new());
        }

        let curies: Vec<String> = bridged
            .iter()
            .map(|c| crosswalk::curie_for(&c.vocabulary_id, &c.concept_code))
            .collect();

        let distance = distance.unwrap_or(self.default_distance);
        let results = self.gateway.search(&curies, mapping_targets, distance)?;

        if results.len() != curies.len() {
            warn!(
                sent = curies.len(),
                received = results.len(),
                "OxO result count does not match query count"
            );
        }

        let mut source_endpoint = MappingEndpoint::concept(&source);
        if crosswalk::is_bridgeable(&source.vocabulary_id) {
            source_endpoint = source_endpoint
                .with_curie(&crosswalk::curie_for(&source.vocabulary_id, &source.concept_code));
        }

        let mut mappings = Vec::new();

        for ((concept, curie), result) in bridged.iter().zip(&curies).zip(&results) {
            if result.mappings.is_empty() {
                debug!(curie = %curie, "No OxO mappings");
                continue;
            }

            let internal_distance = if concept.concept_id == concept_id { 0 } else { 1 };
            let intermediate = intermediate_endpoint(concept, curie, result);

            for candidate in &result.mappings {
                mappings.push(CrossReferenceMapping::new(
                    source_endpoint.clone(),
                    intermediate.clone(),
                    MappingEndpoint::external(&candidate.curie, &candidate.label),
                    candidate.distance,
                    internal_distance,
                ));
            }
        }

        rank_by_distance(&mut mappings);
        Ok(mappings)
    }
}

fn intermediate_endpoint(concept: &Concept, curie: &str, result: &SearchResult) -> MappingEndpoint {
    let oxo_curie = if result.curie.is_empty() { curie } else { result.curie.as_str() };
    let mut endpoint = MappingEndpoint::concept(concept).with_curie(oxo_curie);
    if !result.label.is_empty() {
        endpoint.label = result.label.clone();
    }
    endpoint
}

/// CURIE sent to OxO for a forward lookup
fn query_curie(code: &str, vocabulary: Option<&str>) -> Result<String> {
    let code = code.trim();
    if code.is_empty() {
        return Err(CohdError::invalid("code must not be empty"));
    }

    match vocabulary.map(str::trim).filter(|v| !v.is_empty()) {
        Some(vocabulary) => Ok(format!("{}:{}", crosswalk::to_external_prefix(vocabulary), code)),
        None if crosswalk::split_curie(code).is_some() => Ok(code.to_string()),
        None => Err(CohdError::invalid(format!(
            "'{}' is not a CURIE; pass a vocabulary or use namespace:code",
            code
        ))),
    }
}

// ============================================================================
// TESTS
// ============================================================================
