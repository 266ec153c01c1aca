// OMOP concept lookups: by id list, or by name fragment

use crate::concept::Concept;
use crate::error::{CohdError, Result};
use crate::store::ConceptStore;

pub const DEFAULT_SEARCH_LIMIT: usize = 1000;

/// Concepts whose name contains `fragment`, case-insensitive
pub fn find_concept_ids(store: &dyn ConceptStore, fragment: &str, limit: usize) -> Result<Vec<Concept>> {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return Err(CohdError::invalid("search text must not be empty"));
    }

    store.find_concepts(fragment, limit)
}

/// Concepts for each id that exists, in request order
pub fn concepts(store: &dyn ConceptStore, concept_ids: &[i64]) -> Result<Vec<Concept>> {
    let mut found = Vec::with_capacity(concept_ids.len());
    for &concept_id in concept_ids {
        if let Some(concept) = store.concept_by_id(concept_id)? {
            found.push(concept);
        }
    }
    Ok(found)
}

/// Parse a comma-separated id list ("4196636,437643")
pub fn parse_concept_ids(list: &str) -> Result<Vec<i64>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| CohdError::invalid(format!("'{}' is not a concept id", s)))
        })
        .collect()
}
