// 📈 Frequencies - observed clinical frequencies from the count tables
//
// frequency = count / patient_count for the dataset. A dataset with no
// patient_count row yields empty results.

use crate::concept::ConceptCount;
use crate::error::Result;
use crate::ranking::{stable_rank, Direction};
use crate::store::ConceptStore;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_MOST_FREQUENT_LIMIT: usize = 25;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairFrequency {
    pub dataset_id: i64,
    pub concept_id_1: i64,
    pub concept_id_2: i64,
    pub concept_count: u64,
    pub concept_frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociatedFrequency {
    pub dataset_id: i64,
    pub concept_id: i64,
    pub associated_concept_id: i64,
    pub associated_concept_name: String,
    pub associated_concept_domain: String,
    pub concept_count: u64,
    pub concept_frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptFrequency {
    pub dataset_id: i64,
    pub concept_id: i64,
    pub concept_name: String,
    pub domain_id: String,
    pub concept_count: u64,
    pub concept_frequency: f64,
}

fn frequency(count: u64, population: u64) -> f64 {
    count as f64 / population as f64
}

pub struct FrequencyReader<'a> {
    store: &'a dyn ConceptStore,
}

impl<'a> FrequencyReader<'a> {
    pub fn new(store: &'a dyn ConceptStore) -> Self {
        FrequencyReader { store }
    }

    fn population(&self, dataset_id: i64) -> Result<Option<u64>> {
        let population = self.store.patient_count(dataset_id)?;
        if population.is_none() {
            debug!(dataset_id, "Unknown dataset");
        }
        Ok(population)
    }

    /// Counts for each known concept, in request order
    pub fn single_concept_freq(&self, dataset_id: i64, concept_ids: &[i64]) -> Result<Vec<ConceptCount>> {
        let population = match self.population(dataset_id)? {
            Some(n) => n,
            None => return Ok(Vec::new()),
        };

        let mut counts = Vec::new();
        for &concept_id in concept_ids {
            if let Some(count) = self.store.concept_count(dataset_id, concept_id)? {
                counts.push(ConceptCount {
                    dataset_id,
                    concept_id,
                    concept_count: count,
                    concept_frequency: frequency(count, population),
                });
            }
        }

        Ok(counts)
    }

    pub fn paired_concept_freq(
        &self,
        dataset_id: i64,
        concept_id_1: i64,
        concept_id_2: i64,
    ) -> Result<Vec<PairFrequency>> {
        let population = match self.population(dataset_id)? {
            Some(n) => n,
            None => return Ok(Vec::new()),
        };

        let pair = self.store.pair_count(dataset_id, concept_id_1, concept_id_2)?;

        Ok(pair
            .into_iter()
            .map(|p| PairFrequency {
                dataset_id,
                concept_id_1: p.concept_id_1,
                concept_id_2: p.concept_id_2,
                concept_count: p.concept_count,
                concept_frequency: frequency(p.concept_count, population),
            })
            .collect())
    }

    /// Every co-occurring concept, most frequent first
    pub fn associated_concept_freq(&self, dataset_id: i64, concept_id: i64) -> Result<Vec<AssociatedFrequency>> {
        self.associated(dataset_id, concept_id, None)
    }

    /// Co-occurring concepts within one domain, most frequent first
    pub fn associated_concept_domain_freq(
        &self,
        dataset_id: i64,
        concept_id: i64,
        domain_id: &str,
    ) -> Result<Vec<AssociatedFrequency>> {
        self.associated(dataset_id, concept_id, Some(domain_id))
    }

    fn associated(
        &self,
        dataset_id: i64,
        concept_id: i64,
        domain_id: Option<&str>,
    ) -> Result<Vec<AssociatedFrequency>> {
        let population = match self.population(dataset_id)? {
            Some(n) => n,
            None => return Ok(Vec::new()),
        };

        let mut associated: Vec<AssociatedFrequency> = self
            .store
            .partner_counts(dataset_id, concept_id)?
            .into_iter()
            .filter(|p| domain_id.map_or(true, |d| p.partner.domain_id.eq_ignore_ascii_case(d)))
            .map(|p| AssociatedFrequency {
                dataset_id,
                concept_id,
                associated_concept_id: p.partner.concept_id,
                associated_concept_name: p.partner.concept_name,
                associated_concept_domain: p.partner.domain_id,
                concept_count: p.pair.concept_count,
                concept_frequency: frequency(p.pair.concept_count, population),
            })
            .collect();

        stable_rank(&mut associated, Direction::Descending, |a| a.concept_count as f64);
        Ok(associated)
    }

    pub fn most_frequent_concepts(
        &self,
        dataset_id: i64,
        domain_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ConceptFrequency>> {
        let population = match self.population(dataset_id)? {
            Some(n) => n,
            None => return Ok(Vec::new()),
        };

        let mut top: Vec<ConceptFrequency> = self
            .store
            .top_concept_counts(dataset_id, domain_id, limit)?
            .into_iter()
            .map(|(concept, count)| ConceptFrequency {
                dataset_id,
                concept_id: concept.concept_id,
                concept_name: concept.concept_name,
                domain_id: concept.domain_id,
                concept_count: count,
                concept_frequency: frequency(count, population),
            })
            .collect();

        stable_rank(&mut top, Direction::Descending, |c| c.concept_count as f64);
        Ok(top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn test_single_concept_freq_skips_unknown() {
        let store = fixture_store();
        let reader = FrequencyReader::new(&store);

        let counts = reader
            .single_concept_freq(1, &[METFORMIN, 999999999, T2DM])
            .unwrap();

        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].concept_id, METFORMIN);
        assert!((counts[0].concept_frequency - 0.15).abs() < 1e-12);
        assert_eq!(counts[1].concept_count, 200);
    }

    #[test]
    fn test_paired_concept_freq_oriented_as_asked() {
        let store = fixture_store();
        let reader = FrequencyReader::new(&store);

        let pairs = reader.paired_concept_freq(1, T2DM, METFORMIN).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].concept_id_1, pairs[0].concept_id_2), (T2DM, METFORMIN));
        assert!((pairs[0].concept_frequency - 0.05).abs() < 1e-12);

        assert!(reader.paired_concept_freq(1, T2DM, OSTEOARTHRITIS).unwrap().is_empty());
    }

    #[test]
    fn test_associated_concept_freq_ranked_by_count() {
        let store = fixture_store();
        let reader = FrequencyReader::new(&store);

        let associated = reader.associated_concept_freq(1, T2DM).unwrap();
        let counts: Vec<u64> = associated.iter().map(|a| a.concept_count).collect();
        assert_eq!(counts, vec![80, 60, 50, 20, 7, 3]);
        assert_eq!(associated[0].associated_concept_id, ELECTROCARDIOGRAM);
        assert!(associated.iter().all(|a| a.concept_id == T2DM));
    }

    #[test]
    fn test_associated_concept_domain_freq() {
        let store = fixture_store();
        let reader = FrequencyReader::new(&store);

        let drugs = reader.associated_concept_domain_freq(1, T2DM, "Drug").unwrap();
        let ids: Vec<i64> = drugs.iter().map(|a| a.associated_concept_id).collect();
        assert_eq!(ids, vec![ASPIRIN, METFORMIN, ACETAMINOPHEN, ONDANSETRON]);

        assert!(reader
            .associated_concept_domain_freq(1, T2DM, "Device")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_most_frequent_concepts() {
        let store = fixture_store();
        let reader = FrequencyReader::new(&store);

        let top = reader.most_frequent_concepts(1, None, 3).unwrap();
        let ids: Vec<i64> = top.iter().map(|c| c.concept_id).collect();
        assert_eq!(ids, vec![ELECTROCARDIOGRAM, ASPIRIN, T2DM]);

        let conditions = reader.most_frequent_concepts(1, Some("Condition"), 10).unwrap();
        assert_eq!(conditions.len(), 3);
        assert!(conditions.iter().all(|c| c.domain_id == "Condition"));

        assert!(reader.most_frequent_concepts(2, None, 10).unwrap().is_empty());
    }
}
