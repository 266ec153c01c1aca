use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cohd::omop::{self, DEFAULT_SEARCH_LIMIT};
use cohd::{
    AssociationEngine, AssociationQuery, CrossReferenceResolver, FrequencyReader, Measure,
    OxoClient, Settings, SqliteConceptStore,
};

/// Columbia Open Health Data: concept cross-references and co-occurrence statistics
#[derive(Parser)]
#[command(name = "cohd", version, about)]
struct Args {
    /// Settings file (defaults to ./cohd.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database, overrides the settings file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Map an external CURIE (or code + --vocabulary) to OMOP standard concepts
    XrefToOmop {
        code: String,
        #[arg(long)]
        vocabulary: Option<String>,
        #[arg(long)]
        distance: Option<u32>,
    },

    /// Map an OMOP concept to external ontologies
    XrefFromOmop {
        concept_id: i64,
        /// Target ontology prefixes, comma separated (empty = all)
        #[arg(long = "targets", value_delimiter = ',')]
        mapping_targets: Vec<String>,
        #[arg(long)]
        distance: Option<u32>,
    },

    /// Chi-square test of association
    ChiSquare(AssociationArgs),

    /// ln(observed / expected) co-occurrence
    ObsExpRatio(AssociationArgs),

    /// Pair count / concept 2 count
    RelativeFrequency(AssociationArgs),

    /// Frequencies of single concepts ("4196636,437643")
    SingleFreq {
        concept_ids: String,
        #[arg(long)]
        dataset: Option<i64>,
    },

    /// Co-occurrence frequency of one pair
    PairedFreq {
        concept_id_1: i64,
        concept_id_2: i64,
        #[arg(long)]
        dataset: Option<i64>,
    },

    /// Co-occurrence frequencies of every partner of a concept
    AssociatedFreq {
        concept_id: i64,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        dataset: Option<i64>,
    },

    /// Most frequent concepts in a dataset
    MostFrequent {
        #[arg(long)]
        domain: Option<String>,
        #[arg(long, default_value_t = cohd::frequencies::DEFAULT_MOST_FREQUENT_LIMIT)]
        limit: usize,
        #[arg(long)]
        dataset: Option<i64>,
    },

    /// Search concepts by name
    FindConcepts {
        query: String,
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// Look up concepts by id ("4196636,437643")
    Concepts { concept_ids: String },
}

#[derive(ClapArgs)]
struct AssociationArgs {
    concept_id_1: i64,
    /// Omit to rank every partner of concept_id_1
    concept_id_2: Option<i64>,
    /// Partner domain filter (fan-out only)
    #[arg(long)]
    domain: Option<String>,
    #[arg(long)]
    dataset: Option<i64>,
}

/// JSON envelope expected by COHD clients
#[derive(Serialize)]
struct Envelope<T> {
    results: T,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(database) = args.database {
        settings.database_path = database;
    }

    run(args.command, &settings, args.pretty)
}

fn run(command: Command, settings: &Settings, pretty: bool) -> Result<()> {
    let store = open_store(settings)?;
    let dataset = |d: Option<i64>| d.unwrap_or(settings.default_dataset_id);

    match command {
        Command::XrefToOmop { code, vocabulary, distance } => {
            let gateway = OxoClient::from_settings(&settings.oxo)?;
            let resolver = CrossReferenceResolver::new(&store, &gateway)
                .with_default_distance(settings.oxo.default_distance);
            let mappings = resolver
                .forward(&code, vocabulary.as_deref(), distance)
                .with_context(|| format!("Cross-reference lookup failed for {}", code))?;
            print_results(&mappings, pretty)
        }
        Command::XrefFromOmop { concept_id, mapping_targets, distance } => {
            let gateway = OxoClient::from_settings(&settings.oxo)?;
            let resolver = CrossReferenceResolver::new(&store, &gateway)
                .with_default_distance(settings.oxo.default_distance);
            let mappings = resolver
                .backward(concept_id, &mapping_targets, distance)
                .with_context(|| format!("Cross-reference lookup failed for concept {}", concept_id))?;
            print_results(&mappings, pretty)
        }
        Command::ChiSquare(a) => run_association(&store, Measure::ChiSquare, a, dataset, pretty),
        Command::ObsExpRatio(a) => run_association(&store, Measure::ObsExpRatio, a, dataset, pretty),
        Command::RelativeFrequency(a) => {
            run_association(&store, Measure::RelativeFrequency, a, dataset, pretty)
        }
        Command::SingleFreq { concept_ids, dataset: d } => {
            let ids = omop::parse_concept_ids(&concept_ids)?;
            let counts = FrequencyReader::new(&store).single_concept_freq(dataset(d), &ids)?;
            print_results(&counts, pretty)
        }
        Command::PairedFreq { concept_id_1, concept_id_2, dataset: d } => {
            let pairs = FrequencyReader::new(&store).paired_concept_freq(dataset(d), concept_id_1, concept_id_2)?;
            print_results(&pairs, pretty)
        }
        Command::AssociatedFreq { concept_id, domain, dataset: d } => {
            let reader = FrequencyReader::new(&store);
            let associated = match domain.as_deref() {
                Some(domain) => reader.associated_concept_domain_freq(dataset(d), concept_id, domain)?,
                None => reader.associated_concept_freq(dataset(d), concept_id)?,
            };
            print_results(&associated, pretty)
        }
        Command::MostFrequent { domain, limit, dataset: d } => {
            let top = FrequencyReader::new(&store).most_frequent_concepts(dataset(d), domain.as_deref(), limit)?;
            print_results(&top, pretty)
        }
        Command::FindConcepts { query, limit } => {
            let found = omop::find_concept_ids(&store, &query, limit)?;
            print_results(&found, pretty)
        }
        Command::Concepts { concept_ids } => {
            let ids = omop::parse_concept_ids(&concept_ids)?;
            let found = omop::concepts(&store, &ids)?;
            print_results(&found, pretty)
        }
    }
}

fn run_association(
    store: &SqliteConceptStore,
    measure: Measure,
    args: AssociationArgs,
    dataset: impl Fn(Option<i64>) -> i64,
    pretty: bool,
) -> Result<()> {
    let query = AssociationQuery {
        dataset_id: dataset(args.dataset),
        concept_id_1: args.concept_id_1,
        concept_id_2: args.concept_id_2,
        domain: None,
    }
    .with_domain(args.domain.as_deref());

    let results = AssociationEngine::new(store)
        .run(&query, measure)
        .with_context(|| format!("{} failed for concept {}", measure.as_str(), args.concept_id_1))?;

    print_results(&results, pretty)
}

fn open_store(settings: &Settings) -> Result<SqliteConceptStore> {
    let path = &settings.database_path;
    if !path.exists() {
        bail!("Database not found at {}", path.display());
    }

    SqliteConceptStore::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn print_results<T: Serialize>(results: &[T], pretty: bool) -> Result<()> {
    let envelope = Envelope { results };
    let json = if pretty {
        serde_json::to_string_pretty(&envelope)?
    } else {
        serde_json::to_string(&envelope)?
    };
    println!("{}", json);
    Ok(())
}
