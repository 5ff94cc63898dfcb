use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use onto_core::OntoConfig;
use onto_ingest::Fragment;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use onto_service::OntologyService;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ontology graph ingestion and export", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "onto.toml")]
    config: String,

    /// Check database connectivity and exit
    #[arg(long)]
    health: bool,

    /// Create the ontology tables if missing
    #[arg(long)]
    migrate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a fragment JSON file to a conversation
    Ingest {
        #[arg(long)]
        conversation: Uuid,

        #[arg(long)]
        fragment: PathBuf,
    },

    /// Write a conversation's ontology to a file
    Export {
        #[arg(long)]
        conversation: Uuid,

        #[arg(long)]
        out: PathBuf,

        #[arg(long, value_enum, default_value_t = Format::Turtle)]
        format: Format,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Turtle,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match OntoConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let service = match OntologyService::bootstrap(&config).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };
    let pool = service
        .pool()
        .context("service was bootstrapped without a database pool")?;

    if args.health {
        match onto_core::db::health_check(pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    if args.migrate {
        onto_core::db::migrate(pool)
            .await
            .context("schema migration failed")?;
    }

    match args.command {
        Some(Command::Ingest {
            conversation,
            fragment,
        }) => {
            let text = tokio::fs::read_to_string(&fragment)
                .await
                .with_context(|| format!("reading {}", fragment.display()))?;
            let fragment = Fragment::from_json(&text)?;
            let outcome = service.ingest(conversation, &fragment).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Some(Command::Export {
            conversation,
            out,
            format,
        }) => {
            let body = match format {
                Format::Turtle => service.export_turtle(conversation).await?,
                Format::Json => serde_json::to_string_pretty(&service.export(conversation).await?)?,
            };
            tokio::fs::write(&out, body)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            tracing::info!(%conversation, out = %out.display(), ?format, "Export written");
        }
        None if !args.migrate => {
            tracing::warn!("No command given; see --help");
        }
        None => {}
    }

    Ok(())
}
