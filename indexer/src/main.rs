use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use logvec_core::{load_path, EngineConfig, IdfScheme, InputFormat, LogField, Record, SearchEngine, TokenizerConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build per-field TF-IDF indexes over access logs and query them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index and print per-field statistics
    Stats {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Build the index and run one nearest-neighbour query
    Search {
        #[command(flatten)]
        build: BuildArgs,
        /// Field to search
        #[arg(long)]
        field: String,
        /// Query text
        #[arg(long, short)]
        query: String,
        /// Number of neighbours to return
        #[arg(short, default_value_t = 5)]
        k: usize,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Copy, Clone, ValueEnum)]
enum Format {
    Access,
    Jsonl,
}

#[derive(Copy, Clone, ValueEnum)]
enum Idf {
    /// ln((1 + N) / (1 + df)) + 1
    Smooth,
    /// ln(1 + N / df)
    LogPlusOne,
}

#[derive(Args)]
struct BuildArgs {
    /// Input path (file or directory)
    #[arg(long)]
    input: PathBuf,
    /// Input record format
    #[arg(long, value_enum, default_value_t = Format::Access)]
    format: Format,
    /// Comma-separated fields to index (defaults to url,timestamp,status,user_agent,ip_address)
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
    #[arg(long, value_enum, default_value_t = Idf::Smooth)]
    idf: Idf,
    /// Use 1 + ln(tf) instead of raw term counts
    #[arg(long, default_value_t = false)]
    sublinear_tf: bool,
    /// Drop English stopwords
    #[arg(long, default_value_t = false)]
    stopwords: bool,
    /// Apply English stemming
    #[arg(long, default_value_t = false)]
    stem: bool,
    /// Minimum term length in characters
    #[arg(long, default_value_t = 2)]
    min_token_len: usize,
}

impl BuildArgs {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tokenizer: TokenizerConfig { lowercase: true, min_token_len: self.min_token_len, stopwords: self.stopwords, stem: self.stem },
            idf: match self.idf {
                Idf::Smooth => IdfScheme::Smooth,
                Idf::LogPlusOne => IdfScheme::LogPlusOne,
            },
            sublinear_tf: self.sublinear_tf,
        }
    }

    fn fields(&self) -> Vec<String> {
        if self.fields.is_empty() {
            LogField::DEFAULT_INDEXED.iter().map(|f| f.as_str().to_string()).collect()
        } else {
            self.fields.clone()
        }
    }

    fn input_format(&self) -> InputFormat {
        match self.format {
            Format::Access => InputFormat::Access,
            Format::Jsonl => InputFormat::Jsonl,
        }
    }
}

#[derive(Serialize)]
struct Hit {
    record_id: usize,
    distance: f32,
    value: String,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { build } => {
            let (engine, _) = build_engine(&build)?;
            println!("records: {}", engine.num_records());
            for (field, fi) in engine.fields() {
                println!("{field:<16} rows={:<8} dimension={}", fi.rows(), fi.dimension());
            }
            Ok(())
        }
        Commands::Search { build, field, query, k, json } => {
            let (engine, records) = build_engine(&build)?;
            let hits = engine
                .search_with_distances(&query, &field, k)
                .with_context(|| format!("searching field {field}"))?;
            let hits: Vec<Hit> = hits
                .into_iter()
                .map(|n| Hit {
                    record_id: n.record,
                    distance: n.distance,
                    value: records[n.record].get(&field).map(|v| v.as_text().into_owned()).unwrap_or_default(),
                })
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                for (rank, h) in hits.iter().enumerate() {
                    println!("{rank:>3}  #{:<8} {:.6}  {}", h.record_id, h.distance, h.value);
                }
            }
            Ok(())
        }
    }
}

fn build_engine(args: &BuildArgs) -> Result<(SearchEngine, Vec<Record>)> {
    let (records, stats) = load_records(&args.input, args.input_format())?;
    tracing::info!(records = records.len(), skipped = stats.skipped, "ingested records");

    let mut engine = SearchEngine::new(args.engine_config());
    if let Err(failed) = engine.build_index(&records, &args.fields()) {
        // Surviving fields are still searchable.
        for (field, err) in &failed.failed {
            eprintln!("warning: field {field} not indexed: {err}");
        }
    }
    Ok((engine, records))
}

fn load_records(input: &Path, format: InputFormat) -> Result<(Vec<Record>, logvec_core::ParseStats)> {
    load_path(input, format).with_context(|| format!("loading records from {}", input.display()))
}
