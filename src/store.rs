// 🗄️ Concept Store - read-only adapter over the COHD SQLite tables
//
// Tables: concept, concept_relationship, concept_counts,
//         concept_pair_counts, patient_count
//
// Every row is turned into a typed record here; nothing above this module
// indexes columns by name.

use crate::concept::{Concept, ConceptPairCount, PartnerCount, StandardConcept, StandardFlag};
use crate::error::Result;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Relationship linking a source concept to its standard concept
pub const MAPS_TO: &str = "Maps to";

// ============================================================================
// STORE CONTRACT
// ============================================================================

/// Read-only access to the concept catalog and count tables.
///
/// Implementations must tolerate concurrent readers.
pub trait ConceptStore: Send + Sync {
    fn concept_by_id(&self, concept_id: i64) -> Result<Option<Concept>>;

    /// Concepts whose name contains `fragment` (case-insensitive)
    fn find_concepts(&self, fragment: &str, limit: usize) -> Result<Vec<Concept>>;

    /// "Maps to" edges from (code, vocabulary) to standard concepts
    fn maps_to_standard(
        &self,
        concept_code: &str,
        vocabulary_id: Option<&str>,
    ) -> Result<Vec<StandardConcept>>;

    /// Concepts that "map to" `concept_id`, restricted to `vocabularies` when non-empty
    fn maps_from_standard(&self, concept_id: i64, vocabularies: &[&str]) -> Result<Vec<Concept>>;

    fn patient_count(&self, dataset_id: i64) -> Result<Option<u64>>;

    fn concept_count(&self, dataset_id: i64, concept_id: i64) -> Result<Option<u64>>;

    /// Pair row in either stored orientation, oriented to `concept_id_1`
    fn pair_count(
        &self,
        dataset_id: i64,
        concept_id_1: i64,
        concept_id_2: i64,
    ) -> Result<Option<ConceptPairCount>>;

    /// Every pair row involving `concept_id`, oriented to it
    fn partner_counts(&self, dataset_id: i64, concept_id: i64) -> Result<Vec<PartnerCount>>;

    /// Highest single-concept counts, optionally within one domain
    fn top_concept_counts(
        &self,
        dataset_id: i64,
        domain_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(Concept, u64)>>;
}

// ============================================================================
// SQLITE IMPLEMENTATION
// ============================================================================

pub struct SqliteConceptStore {
    conn: Mutex<Connection>,
}

const CONCEPT_COLUMNS: &str = "c.concept_id, c.concept_name, c.domain_id, c.vocabulary_id,
     c.concept_class_id, c.concept_code, c.standard_concept";

/// Number of columns in CONCEPT_COLUMNS
const CONCEPT_WIDTH: usize = 7;

impl SqliteConceptStore {
    /// Open an existing database read-only
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteConceptStore {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // Readers never leave the connection half-updated, so a poisoned lock is still usable
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn concept_from_row(row: &Row, offset: usize) -> rusqlite::Result<Concept> {
    let standard: Option<String> = row.get(offset + 6)?;

    Ok(Concept {
        concept_id: row.get(offset)?,
        concept_name: row.get(offset + 1)?,
        domain_id: row.get(offset + 2)?,
        vocabulary_id: row.get(offset + 3)?,
        concept_class_id: row.get(offset + 4)?,
        concept_code: row.get(offset + 5)?,
        standard_concept: StandardFlag::from_column(standard.as_deref()),
    })
}

/// Counts are stored as INTEGER; negative values are treated as zero
fn count_from_row(row: &Row, index: usize) -> rusqlite::Result<u64> {
    let count: i64 = row.get(index)?;
    Ok(count.max(0) as u64)
}

/// Escape LIKE wildcards so a search fragment matches literally
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl ConceptStore for SqliteConceptStore {
    fn concept_by_id(&self, concept_id: i64) -> Result<Option<Concept>> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM concept c WHERE c.concept_id = ?1", CONCEPT_COLUMNS);

        let concept = conn
            .query_row(&sql, params![concept_id], |row| concept_from_row(row, 0))
            .optional()?;

        Ok(concept)
    }

    fn find_concepts(&self, fragment: &str, limit: usize) -> Result<Vec<Concept>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM concept c
             WHERE c.concept_name LIKE ?1 ESCAPE '\\'
             ORDER BY c.concept_id
             LIMIT ?2",
            CONCEPT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let concepts = stmt
            .query_map(params![like_pattern(fragment), limit as i64], |row| {
                concept_from_row(row, 0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(concepts)
    }

    fn maps_to_standard(
        &self,
        concept_code: &str,
        vocabulary_id: Option<&str>,
    ) -> Result<Vec<StandardConcept>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT
                c1.concept_id, c1.concept_code, c1.concept_name, c1.vocabulary_id,
                c2.concept_id, c2.concept_name, c2.domain_id
             FROM concept c1
             JOIN concept_relationship cr ON c1.concept_id = cr.concept_id_1
             JOIN concept c2 ON cr.concept_id_2 = c2.concept_id
             WHERE c1.concept_code = ?1
               AND cr.relationship_id = ?2
               AND (?3 IS NULL OR c1.vocabulary_id = ?3)
             ORDER BY c1.concept_id, c2.concept_id",
        )?;

        let mappings = stmt
            .query_map(params![concept_code, MAPS_TO, vocabulary_id], |row| {
                Ok(StandardConcept {
                    source_concept_id: row.get(0)?,
                    source_concept_code: row.get(1)?,
                    source_concept_name: row.get(2)?,
                    source_vocabulary_id: row.get(3)?,
                    standard_concept_id: row.get(4)?,
                    standard_concept_name: row.get(5)?,
                    standard_domain_id: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(mappings)
    }

    fn maps_from_standard(&self, concept_id: i64, vocabularies: &[&str]) -> Result<Vec<Concept>> {
        let conn = self.conn();

        let mut sql = format!(
            "SELECT {} FROM concept_relationship cr
             JOIN concept c ON cr.concept_id_1 = c.concept_id
             WHERE cr.concept_id_2 = ?1 AND cr.relationship_id = ?2",
            CONCEPT_COLUMNS
        );
        let mut values = vec![Value::Integer(concept_id), Value::Text(MAPS_TO.to_string())];

        if !vocabularies.is_empty() {
            let placeholders: Vec<String> = (0..vocabularies.len())
                .map(|i| format!("?{}", i + 3))
                .collect();
            sql.push_str(&format!(" AND c.vocabulary_id IN ({})", placeholders.join(", ")));
            values.extend(vocabularies.iter().map(|v| Value::Text(v.to_string())));
        }
        sql.push_str(" ORDER BY c.vocabulary_id ASC, c.concept_code ASC");

        let mut stmt = conn.prepare(&sql)?;
        let concepts = stmt
            .query_map(params_from_iter(values.iter()), |row| concept_from_row(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(concepts)
    }

    fn patient_count(&self, dataset_id: i64) -> Result<Option<u64>> {
        let conn = self.conn();
        let count = conn
            .query_row(
                "SELECT count FROM patient_count WHERE dataset_id = ?1",
                params![dataset_id],
                |row| count_from_row(row, 0),
            )
            .optional()?;

        Ok(count)
    }

    fn concept_count(&self, dataset_id: i64, concept_id: i64) -> Result<Option<u64>> {
        let conn = self.conn();
        let count = conn
            .query_row(
                "SELECT concept_count FROM concept_counts
                 WHERE dataset_id = ?1 AND concept_id = ?2",
                params![dataset_id, concept_id],
                |row| count_from_row(row, 0),
            )
            .optional()?;

        Ok(count)
    }

    fn pair_count(
        &self,
        dataset_id: i64,
        concept_id_1: i64,
        concept_id_2: i64,
    ) -> Result<Option<ConceptPairCount>> {
        let conn = self.conn();
        let pair = conn
            .query_row(
                "SELECT concept_id_1, concept_id_2, concept_count
                 FROM concept_pair_counts
                 WHERE dataset_id = ?1
                   AND ((concept_id_1 = ?2 AND concept_id_2 = ?3)
                     OR (concept_id_1 = ?3 AND concept_id_2 = ?2))
                 LIMIT 1",
                params![dataset_id, concept_id_1, concept_id_2],
                |row| {
                    Ok(ConceptPairCount {
                        dataset_id,
                        concept_id_1: row.get(0)?,
                        concept_id_2: row.get(1)?,
                        concept_count: count_from_row(row, 2)?,
                    })
                },
            )
            .optional()?;

        Ok(pair.map(|p| p.oriented_to(concept_id_1)))
    }

    fn partner_counts(&self, dataset_id: i64, concept_id: i64) -> Result<Vec<PartnerCount>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT p.concept_id_1, p.concept_id_2, p.concept_count, {}, cc.concept_count
             FROM concept_pair_counts p
             JOIN concept c ON c.concept_id =
                 CASE WHEN p.concept_id_1 = ?2 THEN p.concept_id_2 ELSE p.concept_id_1 END
             LEFT JOIN concept_counts cc
                 ON cc.dataset_id = p.dataset_id AND cc.concept_id = c.concept_id
             WHERE p.dataset_id = ?1
               AND (p.concept_id_1 = ?2 OR p.concept_id_2 = ?2)
             ORDER BY c.concept_id",
            CONCEPT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let partners = stmt
            .query_map(params![dataset_id, concept_id], |row| {
                let pair = ConceptPairCount {
                    dataset_id,
                    concept_id_1: row.get(0)?,
                    concept_id_2: row.get(1)?,
                    concept_count: count_from_row(row, 2)?,
                };
                let partner_count: Option<i64> = row.get(3 + CONCEPT_WIDTH)?;

                Ok(PartnerCount {
                    pair: pair.oriented_to(concept_id),
                    partner: concept_from_row(row, 3)?,
                    partner_count: partner_count.map(|c| c.max(0) as u64),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(partners)
    }

    fn top_concept_counts(
        &self,
        dataset_id: i64,
        domain_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(Concept, u64)>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {}, cc.concept_count
             FROM concept_counts cc
             JOIN concept c ON c.concept_id = cc.concept_id
             WHERE cc.dataset_id = ?1 AND (?2 IS NULL OR c.domain_id = ?2 COLLATE NOCASE)
             ORDER BY cc.concept_count DESC, c.concept_id ASC
             LIMIT ?3",
            CONCEPT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![dataset_id, domain_id, limit as i64], |row| {
                Ok((concept_from_row(row, 0)?, count_from_row(row, CONCEPT_WIDTH)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }
}

// ============================================================================
// SCHEMA (local snapshots and test fixtures)
// ============================================================================

/// Create the COHD tables in an empty database
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS concept (
            concept_id INTEGER PRIMARY KEY,
            concept_name TEXT NOT NULL,
            domain_id TEXT NOT NULL,
            vocabulary_id TEXT NOT NULL,
            concept_class_id TEXT NOT NULL,
            standard_concept TEXT,
            concept_code TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS concept_relationship (
            concept_id_1 INTEGER NOT NULL,
            concept_id_2 INTEGER NOT NULL,
            relationship_id TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS concept_counts (
            dataset_id INTEGER NOT NULL,
            concept_id INTEGER NOT NULL,
            concept_count INTEGER NOT NULL,
            PRIMARY KEY (dataset_id, concept_id)
        );

        CREATE TABLE IF NOT EXISTS concept_pair_counts (
            dataset_id INTEGER NOT NULL,
            concept_id_1 INTEGER NOT NULL,
            concept_id_2 INTEGER NOT NULL,
            concept_count INTEGER NOT NULL,
            PRIMARY KEY (dataset_id, concept_id_1, concept_id_2)
        );

        CREATE TABLE IF NOT EXISTS patient_count (
            dataset_id INTEGER PRIMARY KEY,
            count INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_concept_code ON concept(concept_code, vocabulary_id);
        CREATE INDEX IF NOT EXISTS idx_relationship_2 ON concept_relationship(concept_id_2, relationship_id);
        CREATE INDEX IF NOT EXISTS idx_pair_counts_2 ON concept_pair_counts(dataset_id, concept_id_2);",
    )?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
