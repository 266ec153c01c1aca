// 🔀 Vocabulary Crosswalk - OMOP vocabulary_id <-> OxO prefix
//
// Frozen lookup data. Unknown identifiers pass through unchanged: an
// unrecognised vocabulary is assumed to already be OxO-compatible.

/// (OMOP vocabulary_id, OxO prefix)
const VOCABULARY_PREFIXES: &[(&str, &str)] = &[
    ("ICD9CM", "ICD9CM"),
    ("ICD10CM", "ICD10CM"),
    ("SNOMED", "SNOMEDCT"),
    ("MeSH", "MeSH"),
];

/// OxO prefixes that OMOP can bridge into
pub const MAPPING_TARGETS: &[&str] = &["ICD9CM", "ICD10CM", "SNOMEDCT", "MeSH"];

/// OMOP vocabularies that OxO understands
pub const BRIDGE_VOCABULARIES: &[&str] = &["ICD9CM", "ICD10CM", "SNOMED", "MeSH"];

/// Strict lookup: OxO prefix for a bridgeable OMOP vocabulary
pub fn external_prefix(vocabulary_id: &str) -> Option<&'static str> {
    VOCABULARY_PREFIXES
        .iter()
        .find(|(vocab, _)| *vocab == vocabulary_id)
        .map(|(_, prefix)| *prefix)
}

/// Strict lookup: OMOP vocabulary for a known OxO prefix
pub fn internal_vocabulary(prefix: &str) -> Option<&'static str> {
    VOCABULARY_PREFIXES
        .iter()
        .find(|(_, p)| *p == prefix)
        .map(|(vocab, _)| *vocab)
}

/// OxO prefix for `vocabulary_id`, or the input itself
pub fn to_external_prefix(vocabulary_id: &str) -> &str {
    external_prefix(vocabulary_id).unwrap_or(vocabulary_id)
}

/// OMOP vocabulary for `prefix`, or the input itself
pub fn to_internal_vocabulary(prefix: &str) -> &str {
    internal_vocabulary(prefix).unwrap_or(prefix)
}

pub fn is_bridgeable(vocabulary_id: &str) -> bool {
    external_prefix(vocabulary_id).is_some()
}

/// Build `prefix:code` for an OMOP concept
pub fn curie_for(vocabulary_id: &str, concept_code: &str) -> String {
    format!("{}:{}", to_external_prefix(vocabulary_id), concept_code)
}

/// Split `namespace:code` at the first colon
pub fn split_curie(curie: &str) -> Option<(&str, &str)> {
    match curie.split_once(':') {
        Some((prefix, code)) if !prefix.is_empty() && !code.is_empty() => Some((prefix, code)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vocabularies_round_trip() {
        for vocab in BRIDGE_VOCABULARIES {
            let prefix = to_external_prefix(vocab);
            assert!(MAPPING_TARGETS.contains(&prefix));
            assert_eq!(to_internal_vocabulary(prefix), *vocab);
        }
    }

    #[test]
    fn test_snomed_renamed() {
        assert_eq!(to_external_prefix("SNOMED"), "SNOMEDCT");
        assert_eq!(to_internal_vocabulary("SNOMEDCT"), "SNOMED");
    }

    #[test]
    fn test_unknown_identity_fallback() {
        assert_eq!(to_external_prefix("DOID"), "DOID");
        assert_eq!(to_internal_vocabulary("UMLS"), "UMLS");
        assert_eq!(internal_vocabulary("DOID"), None);
        assert!(!is_bridgeable("RxNorm"));
    }

    #[test]
    fn test_curie_helpers() {
        assert_eq!(curie_for("SNOMED", "44054006"), "SNOMEDCT:44054006");
        assert_eq!(curie_for("DOID", "8398"), "DOID:8398");
        assert_eq!(split_curie("ICD10CM:E11.9"), Some(("ICD10CM", "E11.9")));
        // Only the first colon splits
        assert_eq!(split_curie("MeSH:D003924:x"), Some(("MeSH", "D003924:x")));
        assert_eq!(split_curie("no-colon"), None);
        assert_eq!(split_curie(":123"), None);
    }
}
