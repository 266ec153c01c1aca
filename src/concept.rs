// 🧬 Concept records - typed rows from the OMOP concept catalog and count tables
// Built once at the store boundary; the resolver and engine never see raw rows.

use serde::{Deserialize, Serialize};

// ============================================================================
// STANDARD FLAG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StandardFlag {
    /// 'S' - canonical concept for its domain
    Standard,

    /// 'C' - classification concept (hierarchy only)
    Classification,

    /// NULL - source-vocabulary code, needs a maps-to hop
    NonStandard,
}

impl StandardFlag {
    /// Parse the `standard_concept` column
    pub fn from_column(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("S") => StandardFlag::Standard,
            Some("C") => StandardFlag::Classification,
            _ => StandardFlag::NonStandard,
        }
    }

    pub fn as_column(&self) -> Option<&'static str> {
        match self {
            StandardFlag::Standard => Some("S"),
            StandardFlag::Classification => Some("C"),
            StandardFlag::NonStandard => None,
        }
    }
}

// ============================================================================
// CONCEPT
// ============================================================================

/// One row of the concept catalog. Identity = concept_id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub concept_id: i64,
    pub concept_name: String,
    pub domain_id: String,
    pub vocabulary_id: String,
    pub concept_class_id: String,
    pub concept_code: String,
    pub standard_concept: StandardFlag,
}

/// One "Maps to" edge: a source-vocabulary concept and the standard concept it maps to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardConcept {
    pub source_concept_id: i64,
    pub source_concept_code: String,
    pub source_concept_name: String,
    pub source_vocabulary_id: String,
    pub standard_concept_id: i64,
    pub standard_concept_name: String,
    pub standard_domain_id: String,
}

impl StandardConcept {
    /// Source code is already the standard concept (no extra hop)
    pub fn is_self_mapping(&self) -> bool {
        self.source_concept_id == self.standard_concept_id
    }
}

// ============================================================================
// COUNTS
// ============================================================================

/// Single-concept count within a dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptCount {
    pub dataset_id: i64,
    pub concept_id: i64,
    pub concept_count: u64,
    /// concept_count / patient_count
    pub concept_frequency: f64,
}

/// Co-occurrence count of an unordered pair.
///
/// The store keeps one row per pair; readers orient it so that
/// `concept_id_1` is the concept the caller asked about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptPairCount {
    pub dataset_id: i64,
    pub concept_id_1: i64,
    pub concept_id_2: i64,
    pub concept_count: u64,
}

impl ConceptPairCount {
    /// Same pair with roles swapped
    pub fn swapped(&self) -> Self {
        ConceptPairCount {
            dataset_id: self.dataset_id,
            concept_id_1: self.concept_id_2,
            concept_id_2: self.concept_id_1,
            concept_count: self.concept_count,
        }
    }

    /// Orient so that `concept_id` is in first position (no-op if already)
    pub fn oriented_to(&self, concept_id: i64) -> Self {
        if self.concept_id_1 == concept_id {
            self.clone()
        } else {
            self.swapped()
        }
    }
}

/// A pair row seen from one concept: the partner concept and its marginal count
#[derive(Debug, Clone, PartialEq)]
pub struct PartnerCount {
    pub pair: ConceptPairCount,
    pub partner: Concept,
    /// Marginal count of the partner (None when the count row is missing)
    pub partner_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_flag_from_column() {
        assert_eq!(StandardFlag::from_column(Some("S")), StandardFlag::Standard);
        assert_eq!(StandardFlag::from_column(Some("C")), StandardFlag::Classification);
        assert_eq!(StandardFlag::from_column(None), StandardFlag::NonStandard);
        assert_eq!(StandardFlag::from_column(Some("")), StandardFlag::NonStandard);
    }

    #[test]
    fn test_standard_flag_column_round_trip() {
        assert_eq!(StandardFlag::Standard.as_column(), Some("S"));
        assert_eq!(StandardFlag::NonStandard.as_column(), None);

        for flag in [StandardFlag::Standard, StandardFlag::Classification, StandardFlag::NonStandard] {
            assert_eq!(StandardFlag::from_column(flag.as_column()), flag);
        }
    }

    #[test]
    fn test_pair_orientation() {
        let pair = ConceptPairCount {
            dataset_id: 1,
            concept_id_1: 192855,
            concept_id_2: 2008271,
            concept_count: 42,
        };

        let oriented = pair.oriented_to(2008271);
        assert_eq!(oriented.concept_id_1, 2008271);
        assert_eq!(oriented.concept_id_2, 192855);
        assert_eq!(oriented.concept_count, 42);

        assert_eq!(pair.oriented_to(192855), pair);
    }
}
