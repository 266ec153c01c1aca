// COHD - Columbia Open Health Data core library
// Cross-reference resolution and co-occurrence association analytics
// over OMOP concept counts

pub mod error;
pub mod config;
pub mod concept;
pub mod store;          // Concept Store Adapter (SQLite)
pub mod crosswalk;      // OMOP vocabulary <-> OxO prefix
pub mod gateway;        // OxO cross-reference search
pub mod ranking;
pub mod stats;
pub mod xref;           // Cross-Reference Resolver
pub mod association;    // Association Engine
pub mod frequencies;
pub mod omop;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use error::{CohdError, Result};
pub use config::{GatewaySettings, Settings};
pub use concept::{
    Concept, ConceptCount, ConceptPairCount, PartnerCount, StandardConcept, StandardFlag,
};
pub use store::{create_schema, ConceptStore, SqliteConceptStore};
pub use gateway::{ExternalMappingCandidate, MappingGateway, OxoClient, SearchResult};
pub use ranking::{stable_rank, Direction};
pub use stats::{chi2_sf, ChiSquareTest, ContingencyTable};
pub use xref::{CrossReferenceMapping, CrossReferenceResolver, MappingEndpoint};
pub use association::{
    AssociationEngine, AssociationQuery, AssociationResult, Measure, Statistic,
};
pub use frequencies::{AssociatedFrequency, ConceptFrequency, FrequencyReader, PairFrequency};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
