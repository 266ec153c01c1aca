// Test fixtures: a small OMOP snapshot in SQLite plus a scripted OxO stand-in

use crate::concept::StandardFlag;
use crate::error::{CohdError, Result};
use crate::gateway::{ExternalMappingCandidate, MappingGateway, SearchResult};
use crate::store::{create_schema, SqliteConceptStore};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::Mutex;

pub const T2DM: i64 = 201826;
pub const T2DM_ICD9: i64 = 44836914;
pub const T2DM_ICD10: i64 = 45576876;
pub const OSTEOARTHRITIS: i64 = 80180;
pub const OSTEOARTHRITIS_ICD10: i64 = 45591016;
pub const OSTEOARTHRITIS_ICD9: i64 = 44834979;
pub const MYOCARDIAL_INFARCTION: i64 = 4329847;
pub const METFORMIN: i64 = 1503297;
pub const ASPIRIN: i64 = 1112807;
pub const ONDANSETRON: i64 = 1000560;
pub const ACETAMINOPHEN: i64 = 1125315;
pub const ELECTROCARDIOGRAM: i64 = 2314216;

/// Patients in dataset 1
pub const POPULATION: u64 = 1000;

pub fn fixture_store() -> SqliteConceptStore {
    let conn = Connection::open_in_memory().unwrap();
    create_schema(&conn).unwrap();

    let concepts: &[(i64, &str, &str, &str, &str, StandardFlag)] = &[
        (T2DM, "Type 2 diabetes mellitus", "Condition", "SNOMED", "44054006", StandardFlag::Standard),
        (T2DM_ICD9, "Diabetes mellitus without mention of complication, type II", "Condition", "ICD9CM", "250.00", StandardFlag::NonStandard),
        (T2DM_ICD10, "Type 2 diabetes mellitus without complications", "Condition", "ICD10CM", "E11.9", StandardFlag::NonStandard),
        (OSTEOARTHRITIS, "Osteoarthritis", "Condition", "SNOMED", "396275006", StandardFlag::Standard),
        (OSTEOARTHRITIS_ICD10, "Unspecified osteoarthritis, unspecified site", "Condition", "ICD10CM", "M19.90", StandardFlag::NonStandard),
        (OSTEOARTHRITIS_ICD9, "Osteoarthrosis, unspecified site", "Condition", "ICD9CM", "715.90", StandardFlag::NonStandard),
        (MYOCARDIAL_INFARCTION, "Myocardial infarction", "Condition", "SNOMED", "22298006", StandardFlag::Standard),
        (METFORMIN, "metformin", "Drug", "RxNorm", "6809", StandardFlag::Standard),
        (ASPIRIN, "Aspirin", "Drug", "RxNorm", "1191", StandardFlag::Standard),
        (ONDANSETRON, "ondansetron", "Drug", "RxNorm", "26225", StandardFlag::Standard),
        (ACETAMINOPHEN, "Acetaminophen", "Drug", "RxNorm", "161", StandardFlag::Standard),
        (ELECTROCARDIOGRAM, "Electrocardiogram, routine ECG", "Procedure", "CPT4", "93000", StandardFlag::Standard),
    ];
    for (id, name, domain, vocab, code, standard) in concepts {
        conn.execute(
            "INSERT INTO concept VALUES (?1, ?2, ?3, ?4, 'Clinical Finding', ?5, ?6)",
            params![id, name, domain, vocab, standard.as_column(), code],
        )
        .unwrap();
    }

    // Myocardial infarction deliberately has no "Maps to" rows, not even to itself
    let maps_to = [
        (T2DM_ICD9, T2DM),
        (T2DM_ICD10, T2DM),
        (T2DM, T2DM),
        (OSTEOARTHRITIS, OSTEOARTHRITIS),
        (OSTEOARTHRITIS_ICD10, OSTEOARTHRITIS),
        (OSTEOARTHRITIS_ICD9, OSTEOARTHRITIS),
    ];
    for (from, to) in maps_to {
        conn.execute(
            "INSERT INTO concept_relationship VALUES (?1, ?2, 'Maps to')",
            params![from, to],
        )
        .unwrap();
    }

    conn.execute("INSERT INTO patient_count VALUES (1, ?1)", params![POPULATION as i64])
        .unwrap();

    // Acetaminophen has no count row; ondansetron's count is zero
    let counts = [
        (T2DM, 200),
        (METFORMIN, 150),
        (OSTEOARTHRITIS, 100),
        (ASPIRIN, 300),
        (MYOCARDIAL_INFARCTION, 50),
        (ELECTROCARDIOGRAM, 400),
        (ONDANSETRON, 0),
    ];
    for (id, count) in counts {
        conn.execute(
            "INSERT INTO concept_counts VALUES (1, ?1, ?2)",
            params![id, count],
        )
        .unwrap();
    }

    // One stored row per unordered pair, in mixed orientations
    let pairs = [
        (METFORMIN, T2DM, 50),
        (T2DM, ASPIRIN, 60),
        (T2DM, MYOCARDIAL_INFARCTION, 20),
        (T2DM, ELECTROCARDIOGRAM, 80),
        (T2DM, ONDANSETRON, 3),
        (ACETAMINOPHEN, T2DM, 7),
        (OSTEOARTHRITIS, ASPIRIN, 30),
    ];
    for (c1, c2, count) in pairs {
        conn.execute(
            "INSERT INTO concept_pair_counts VALUES (1, ?1, ?2, ?3)",
            params![c1, c2, count],
        )
        .unwrap();
    }

    SqliteConceptStore::from_connection(conn)
}

pub fn candidate(curie: &str, label: &str, distance: u32) -> ExternalMappingCandidate {
    ExternalMappingCandidate {
        curie: curie.to_string(),
        label: label.to_string(),
        distance,
    }
}

/// Scripted mapping service; records every batch it receives
#[derive(Default)]
pub struct StubGateway {
    responses: HashMap<String, SearchResult>,
    failing: bool,
    no_results: bool,
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        StubGateway {
            failing: true,
            ..Self::default()
        }
    }

    /// Answers every batch with an empty `_embedded.searchResults`
    pub fn without_results() -> Self {
        StubGateway {
            no_results: true,
            ..Self::default()
        }
    }

    pub fn respond(mut self, query_id: &str, label: &str, mappings: Vec<ExternalMappingCandidate>) -> Self {
        self.responses.insert(
            query_id.to_string(),
            SearchResult {
                query_id: query_id.to_string(),
                label: label.to_string(),
                curie: query_id.to_string(),
                mappings,
            },
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl MappingGateway for StubGateway {
    fn search(&self, ids: &[String], _mapping_targets: &[String], _distance: u32) -> Result<Vec<SearchResult>> {
        self.calls.lock().unwrap().push(ids.to_vec());

        if self.failing {
            let source_id = if ids.len() == 1 { Some(ids[0].as_str()) } else { None };
            return Err(CohdError::upstream(source_id, "OxO request failed: operation timed out"));
        }

        if self.no_results {
            return Ok(Vec::new());
        }

        Ok(ids
            .iter()
            .map(|id| {
                self.responses
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| SearchResult::empty(id))
            })
            .collect())
    }
}
