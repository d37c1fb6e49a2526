use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use logvec_core::{EngineConfig, InputFormat, LogField};
use logvec_server::{build_app, ServerSettings};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Access log file or directory of logs
    #[arg(long, default_value = "./nginx_access.log")]
    input: PathBuf,
    /// Input record format: access or jsonl
    #[arg(long, default_value = "access")]
    format: InputFormat,
    /// Comma-separated fields to index (defaults to url,timestamp,status,user_agent,ip_address)
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
    /// JSON file with engine settings (tokenizer, idf, sublinear_tf)
    #[arg(long)]
    engine_config: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

fn load_engine_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let Some(path) = path else { return Ok(EngineConfig::default()) };
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let fields = if args.fields.is_empty() {
        LogField::DEFAULT_INDEXED.iter().map(|f| f.as_str().to_string()).collect()
    } else {
        args.fields.clone()
    };
    let settings = ServerSettings {
        input: args.input.clone(),
        format: args.format,
        fields,
        engine: load_engine_config(args.engine_config.as_ref())?,
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
    };
    let app: Router = build_app(settings)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
