// 🧮 Association Engine - how strongly do two clinical concepts co-occur?
//
// Three measures over raw co-occurrence counts:
//   - Chi-square independence test on the 2×2 contingency table
//   - ln(observed / expected) co-occurrence ratio
//   - Relative frequency: pair count / concept 2 count
//
// Two query shapes:
//   - paired:  concept_id_1 and concept_id_2 → at most one row, unranked
//   - fan-out: concept_id_1 vs every partner → filtered by domain, THEN ranked
//
// Degenerate counts (zero marginals) produce NaN/±inf rather than errors.
// Those rows rank after every finite row and serialize as null.

use crate::concept::{Concept, ConceptPairCount};
use crate::error::{CohdError, Result};
use crate::ranking::{stable_rank, Direction};
use crate::stats::{self, ContingencyTable};
use crate::store::ConceptStore;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

pub const DEFAULT_DATASET_ID: i64 = 1;

// ============================================================================
// MEASURE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measure {
    ChiSquare,
    ObsExpRatio,
    RelativeFrequency,
}

impl Measure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Measure::ChiSquare => "chiSquare",
            Measure::ObsExpRatio => "obsExpRatio",
            Measure::RelativeFrequency => "relativeFrequency",
        }
    }
}

impl FromStr for Measure {
    type Err = CohdError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "chisquare" => Ok(Measure::ChiSquare),
            "obsexpratio" => Ok(Measure::ObsExpRatio),
            "relativefrequency" => Ok(Measure::RelativeFrequency),
            _ => Err(CohdError::invalid(format!("unknown association measure '{}'", s))),
        }
    }
}

// ============================================================================
// QUERY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AssociationQuery {
    pub dataset_id: i64,
    pub concept_id_1: i64,
    /// None = fan-out over every partner of concept_id_1
    pub concept_id_2: Option<i64>,
    /// Partner domain filter (fan-out only)
    pub domain: Option<String>,
}

impl AssociationQuery {
    pub fn paired(dataset_id: i64, concept_id_1: i64, concept_id_2: i64) -> Self {
        AssociationQuery {
            dataset_id,
            concept_id_1,
            concept_id_2: Some(concept_id_2),
            domain: None,
        }
    }

    pub fn fan_out(dataset_id: i64, concept_id_1: i64) -> Self {
        AssociationQuery {
            dataset_id,
            concept_id_1,
            concept_id_2: None,
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: Option<&str>) -> Self {
        self.domain = domain
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        self
    }

    fn accepts_partner(&self, partner: &Concept) -> bool {
        match &self.domain {
            Some(domain) => partner.domain_id.eq_ignore_ascii_case(domain),
            None => true,
        }
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Statistic {
    ChiSquare {
        chi_square: f64,
        p_value: f64,
    },
    ObsExpRatio {
        ln_ratio: f64,
        observed_count: u64,
        expected_count: f64,
    },
    RelativeFrequency {
        relative_frequency: f64,
        concept_pair_count: u64,
        concept_2_count: u64,
    },
}

impl Statistic {
    /// `cpc` pair count, `c1`/`c2` marginals, `n` population
    pub fn compute(measure: Measure, cpc: u64, c1: u64, c2: u64, n: u64) -> Self {
        match measure {
            Measure::ChiSquare => {
                let test = ContingencyTable::new(cpc, c1, c2, n).chi_square();
                Statistic::ChiSquare {
                    chi_square: test.statistic,
                    p_value: test.p_value,
                }
            }
            Measure::ObsExpRatio => Statistic::ObsExpRatio {
                ln_ratio: stats::ln_obs_exp_ratio(cpc, c1, c2, n),
                observed_count: cpc,
                expected_count: stats::expected_count(c1, c2, n),
            },
            Measure::RelativeFrequency => Statistic::RelativeFrequency {
                relative_frequency: stats::relative_frequency(cpc, c2),
                concept_pair_count: cpc,
                concept_2_count: c2,
            },
        }
    }

    /// Larger = stronger association
    pub fn rank_key(&self) -> f64 {
        match self {
            Statistic::ChiSquare { chi_square, .. } => *chi_square,
            Statistic::ObsExpRatio { ln_ratio, .. } => *ln_ratio,
            Statistic::RelativeFrequency { relative_frequency, .. } => *relative_frequency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationResult {
    pub dataset_id: i64,
    pub concept_id_1: i64,
    pub concept_id_2: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_2_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_2_domain: Option<String>,

    #[serde(flatten)]
    pub statistic: Statistic,
}

impl AssociationResult {
    fn new(pair: &ConceptPairCount, partner: Option<&Concept>, statistic: Statistic) -> Self {
        AssociationResult {
            dataset_id: pair.dataset_id,
            concept_id_1: pair.concept_id_1,
            concept_id_2: pair.concept_id_2,
            concept_2_name: partner.map(|c| c.concept_name.clone()),
            concept_2_domain: partner.map(|c| c.domain_id.clone()),
            statistic,
        }
    }

    pub fn rank_key(&self) -> f64 {
        self.statistic.rank_key()
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct AssociationEngine<'a> {
    store: &'a dyn ConceptStore,
}

impl<'a> AssociationEngine<'a> {
    pub fn new(store: &'a dyn ConceptStore) -> Self {
        AssociationEngine { store }
    }

    pub fn chi_square(&self, query: &AssociationQuery) -> Result<Vec<AssociationResult>> {
        self.run(query, Measure::ChiSquare)
    }

    pub fn obs_exp_ratio(&self, query: &AssociationQuery) -> Result<Vec<AssociationResult>> {
        self.run(query, Measure::ObsExpRatio)
    }

    pub fn relative_frequency(&self, query: &AssociationQuery) -> Result<Vec<AssociationResult>> {
        self.run(query, Measure::RelativeFrequency)
    }

    pub fn run(&self, query: &AssociationQuery, measure: Measure) -> Result<Vec<AssociationResult>> {
        let n = match self.store.patient_count(query.dataset_id)? {
            Some(n) => n,
            None => {
                debug!(dataset_id = query.dataset_id, "Unknown dataset");
                return Ok(Vec::new());
            }
        };

        let c1 = match self.store.concept_count(query.dataset_id, query.concept_id_1)? {
            Some(count) => count,
            None => {
                debug!(concept_id = query.concept_id_1, "No count for concept");
                return Ok(Vec::new());
            }
        };

        match query.concept_id_2 {
            Some(concept_id_2) => self.paired(query, measure, concept_id_2, c1, n),
            None => self.fan_out(query, measure, c1, n),
        }
    }

    fn paired(
        &self,
        query: &AssociationQuery,
        measure: Measure,
        concept_id_2: i64,
        c1: u64,
        n: u64,
    ) -> Result<Vec<AssociationResult>> {
        let pair = match self
            .store
            .pair_count(query.dataset_id, query.concept_id_1, concept_id_2)?
        {
            Some(pair) => pair,
            None => return Ok(Vec::new()),
        };

        let c2 = match self.store.concept_count(query.dataset_id, concept_id_2)? {
            Some(count) => count,
            None => {
                warn!(concept_id = concept_id_2, "Pair count without marginal count");
                return Ok(Vec::new());
            }
        };

        let partner = self.store.concept_by_id(concept_id_2)?;
        let statistic = Statistic::compute(measure, pair.concept_count, c1, c2, n);

        Ok(vec![AssociationResult::new(&pair, partner.as_ref(), statistic)])
    }

    fn fan_out(
        &self,
        query: &AssociationQuery,
        measure: Measure,
        c1: u64,
        n: u64,
    ) -> Result<Vec<AssociationResult>> {
        let partners = self.store.partner_counts(query.dataset_id, query.concept_id_1)?;

        // Filter first so the ranking is over the filtered set
        let mut results: Vec<AssociationResult> = partners
            .iter()
            .filter(|p| query.accepts_partner(&p.partner))
            .filter_map(|p| match p.partner_count {
                Some(c2) => {
                    let statistic = Statistic::compute(measure, p.pair.concept_count, c1, c2, n);
                    Some(AssociationResult::new(&p.pair, Some(&p.partner), statistic))
                }
                None => {
                    warn!(
                        concept_id = p.partner.concept_id,
                        "Skipping partner without marginal count"
                    );
                    None
                }
            })
            .collect();

        stable_rank(&mut results, Direction::Descending, AssociationResult::rank_key);
        Ok(results)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::is_ranked;
    use crate::testing::*;

    fn partner_ids(results: &[AssociationResult]) -> Vec<i64> {
        results.iter().map(|r| r.concept_id_2).collect()
    }

    #[test]
    fn test_measure_from_str() {
        assert_eq!("chiSquare".parse::<Measure>().unwrap(), Measure::ChiSquare);
        assert_eq!("obs_exp_ratio".parse::<Measure>().unwrap(), Measure::ObsExpRatio);
        assert_eq!("relative-frequency".parse::<Measure>().unwrap(), Measure::RelativeFrequency);
        assert!(matches!("pmi".parse::<Measure>(), Err(CohdError::InvalidArgument(_))));
    }

    #[test]
    fn test_paired_chi_square_either_orientation() {
        let store = fixture_store();
        let engine = AssociationEngine::new(&store);

        let results = engine
            .chi_square(&AssociationQuery::paired(1, T2DM, METFORMIN))
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].concept_id_1, T2DM);
        assert_eq!(results[0].concept_id_2, METFORMIN);
        assert_eq!(results[0].concept_2_domain.as_deref(), Some("Drug"));

        match results[0].statistic {
            Statistic::ChiSquare { chi_square, p_value } => {
                assert!((chi_square - 19.607843).abs() < 1e-5);
                assert!((p_value - 9.5078e-6).abs() < 1e-9);
            }
            ref other => panic!("unexpected statistic {:?}", other),
        }
    }

    #[test]
    fn test_paired_without_pair_row_is_empty() {
        let store = fixture_store();
        let engine = AssociationEngine::new(&store);

        let query = AssociationQuery::paired(1, T2DM, OSTEOARTHRITIS);
        assert!(engine.chi_square(&query).unwrap().is_empty());
        assert!(engine.relative_frequency(&query).unwrap().is_empty());

        // Unknown dataset
        let other = AssociationQuery::paired(7, T2DM, METFORMIN);
        assert!(engine.obs_exp_ratio(&other).unwrap().is_empty());
    }

    #[test]
    fn test_fan_out_chi_square_ranking() {
        let store = fixture_store();
        let engine = AssociationEngine::new(&store);

        let results = engine.chi_square(&AssociationQuery::fan_out(1, T2DM)).unwrap();

        // Acetaminophen has no marginal count and is skipped; ondansetron (c2 = 0) ranks last
        assert_eq!(
            partner_ids(&results),
            vec![METFORMIN, MYOCARDIAL_INFARCTION, ASPIRIN, ELECTROCARDIOGRAM, ONDANSETRON]
        );
        assert!(results.iter().all(|r| r.concept_id_1 == T2DM));
        assert!(!results[4].rank_key().is_finite());
        assert!(is_ranked(&results, Direction::Descending, AssociationResult::rank_key));
    }

    #[test]
    fn test_fan_out_obs_exp_ratio() {
        let store = fixture_store();
        let engine = AssociationEngine::new(&store);

        let results = engine.obs_exp_ratio(&AssociationQuery::fan_out(1, T2DM)).unwrap();
        assert_eq!(
            partner_ids(&results),
            vec![MYOCARDIAL_INFARCTION, METFORMIN, ASPIRIN, ELECTROCARDIOGRAM, ONDANSETRON]
        );

        match results[0].statistic {
            Statistic::ObsExpRatio { ln_ratio, observed_count, expected_count } => {
                assert!((ln_ratio - 2f64.ln()).abs() < 1e-12);
                assert_eq!(observed_count, 20);
                assert!((expected_count - 10.0).abs() < 1e-12);
            }
            ref other => panic!("unexpected statistic {:?}", other),
        }
    }

    #[test]
    fn test_relative_frequency_zero_marginal_does_not_break_ranking() {
        let store = fixture_store();
        let engine = AssociationEngine::new(&store);

        let results = engine
            .relative_frequency(&AssociationQuery::fan_out(1, T2DM))
            .unwrap();

        assert_eq!(results.len(), 5);
        let last = results.last().unwrap();
        assert_eq!(last.concept_id_2, ONDANSETRON);
        assert!(!last.rank_key().is_finite());

        assert_eq!(results[0].concept_id_2, MYOCARDIAL_INFARCTION);
        assert!((results[0].rank_key() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_domain_filter_before_ranking() {
        let store = fixture_store();
        let engine = AssociationEngine::new(&store);

        let query = AssociationQuery::fan_out(1, T2DM).with_domain(Some("drug"));
        let results = engine.chi_square(&query).unwrap();

        assert_eq!(partner_ids(&results), vec![METFORMIN, ASPIRIN, ONDANSETRON]);
        assert!(results.iter().all(|r| r.concept_2_domain.as_deref() == Some("Drug")));
    }

    #[test]
    fn test_non_finite_serializes_as_null() {
        let store = fixture_store();
        let engine = AssociationEngine::new(&store);

        let results = engine
            .relative_frequency(&AssociationQuery::paired(1, T2DM, ONDANSETRON))
            .unwrap();
        let json = serde_json::to_value(&results[0]).unwrap();

        assert_eq!(json["concept_id_2"], ONDANSETRON);
        assert!(json["relative_frequency"].is_null());
        assert_eq!(json["concept_pair_count"], 3);
    }
}
