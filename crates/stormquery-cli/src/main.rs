use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use stormquery_core::{Category, EntityKind, FieldName, FilterCriteria, ServiceConfig};
use stormquery_remote::{ArcGisClient, FeatureQueryService, FeatureService, InMemoryFeatureService};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stormquery")]
#[command(about = "Query the stormwater feature service", long_about = None)]
struct Cli {
    /// JSON config file; defaults to STORMQUERY_CONFIG or the built-in service
    #[arg(long, global = true)]
    config: Option<String>,
    /// Answer from a fixture file instead of the remote service
    #[arg(long, global = true)]
    fixture: Option<String>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List records matching filters
    Query {
        /// project, pre_application or concern
        #[arg(long, default_value = "project")]
        kind: String,
        /// projects, studies or flood_audits
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        project_status: Option<String>,
        #[arg(long = "project-type")]
        project_types: Vec<String>,
        #[arg(long)]
        jurisdiction: Option<String>,
        #[arg(long)]
        partners: Option<String>,
        #[arg(long)]
        subshed: Option<String>,
        #[arg(long)]
        category_report: Option<String>,
        #[arg(long)]
        problem: Option<String>,
        #[arg(long)]
        frequency: Option<String>,
        /// Permit a query with no filters at all
        #[arg(long)]
        all: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print cached distinct values for fields
    Vocab { fields: Vec<String> },
    /// Find projects by name
    Search { name: String },
    /// Print a municipality outline, or the county outline when no name is given
    Boundary {
        #[arg(long)]
        jurisdiction: Option<String>,
    },
}

fn parse_kind(s: &str) -> Result<EntityKind> {
    serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
        .map_err(|_| anyhow!("unknown kind {s:?}"))
}

fn print<T: Serialize>(v: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::load()?,
    };
    let service: Arc<dyn FeatureService> = match &cli.fixture {
        Some(path) => {
            info!(fixture = %path, "answering from fixture file");
            Arc::new(InMemoryFeatureService::from_fixture_file(path)?)
        }
        None => Arc::new(ArcGisClient::new(config.request_timeout)?),
    };
    let queries = FeatureQueryService::new(config, service);

    match cli.cmd {
        Cmd::Query {
            kind,
            category,
            status,
            project_status,
            project_types,
            jurisdiction,
            partners,
            subshed,
            category_report,
            problem,
            frequency,
            all,
            limit,
        } => {
            let category = match category {
                Some(label) => {
                    Category::parse(&label).ok_or_else(|| anyhow!("unknown category {label:?}"))?
                }
                None => Category::Unfiltered,
            };
            let criteria = FilterCriteria {
                kind: parse_kind(&kind)?,
                category,
                status,
                project_status,
                project_types,
                jurisdiction,
                project_partners: partners,
                subshed,
                category_report,
                problem,
                frequency_problem: frequency,
                allow_unfiltered: all,
                limit,
            }
            .with_default_category();
            let result = queries.query(&criteria).await;
            if let Some(reason) = result.reason {
                warn!(?reason, "query returned no matches");
            }
            print(&result)?;
        }
        Cmd::Vocab { fields } => {
            let fields = if fields.is_empty() {
                queries.config().vocabulary.fields.clone()
            } else {
                fields
                    .into_iter()
                    .map(FieldName::new)
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };
            print(&queries.resolve_vocabulary(&fields).await)?;
        }
        Cmd::Search { name } => {
            print(&queries.search_by_name(&name).await)?;
        }
        Cmd::Boundary { jurisdiction } => {
            let fc = match jurisdiction {
                Some(name) => queries.jurisdiction_boundary(&name).await,
                None => queries.county_boundary().await,
            };
            match fc {
                Some(fc) => print(&fc)?,
                None => {
                    warn!("boundary lookup returned nothing");
                    return Err(anyhow!("boundary not found"));
                }
            }
        }
    }
    Ok(())
}
