//! `adeverinta`: command-line front end for the certificate request desk.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use adeverinta_core::form::{Domain, Requirement};
use adeverinta_core::{ContractValidator, FormSchema};
use adeverinta_runtime::{AppConfig, LogFormat, Session, TurnError, TurnOrchestrator};

const DEFAULT_CONFIG: &str = "config/adeverinta.yaml";

#[derive(Parser, Debug)]
#[command(name = "adeverinta", version, about = "Student certificate request desk")]
struct Cli {
    /// Runtime configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Override the configured log filter
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum)]
    log_format: Option<Format>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Compact,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rank policy snippets for a query
    Retrieve {
        query: String,

        /// Number of snippets (defaults to the configured k)
        #[arg(short, long)]
        k: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Interactive conversation (/reset, /state, /quit)
    Chat {
        #[arg(long, default_value = "cli")]
        session: String,

        /// Print each turn's full reply as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a saved collaborator response against the contract
    Validate {
        /// JSON file with the collaborator response
        #[arg(long)]
        response: PathBuf,

        /// Snippet ids retrieved for that turn, comma separated
        #[arg(long, value_delimiter = ',')]
        retrieved: Vec<String>,
    },

    /// List the form fields with their domains and conditions
    Fields,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fields => {
            print_fields();
            Ok(())
        }
        Commands::Validate {
            ref response,
            ref retrieved,
        } => validate(response, retrieved),
        Commands::Retrieve { ref query, k, json } => {
            let config = load_config(&cli)?;
            retrieve(&config, query, k, json).await
        }
        Commands::Chat { ref session, json } => {
            let config = load_config(&cli)?;
            chat(&config, session, json).await
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = match format {
            Format::Compact => LogFormat::Compact,
            Format::Json => LogFormat::Json,
        };
    }
    init_logging(&config);
    Ok(config)
}

/// `RUST_LOG` wins over the configured level. Logs go to stderr so that
/// JSON output on stdout stays parseable.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn retrieve(config: &AppConfig, query: &str, k: Option<usize>, json: bool) -> Result<()> {
    let orchestrator = TurnOrchestrator::from_config(config)?;
    let service = orchestrator.retrieval();
    let k = k.unwrap_or_else(|| service.default_k());
    let retrieval = service.retrieve(query, k).await?;

    if json {
        return print_json(&retrieval);
    }
    println!("backend: {:?}", retrieval.backend);
    for (rank, result) in retrieval.results.iter().enumerate() {
        let first_line = result.text.lines().next().unwrap_or_default();
        println!("{:>2}. {:<24} {:>7.4}  {}", rank + 1, result.id, result.score, first_line);
    }
    Ok(())
}

async fn chat(config: &AppConfig, session_id: &str, json: bool) -> Result<()> {
    let orchestrator = TurnOrchestrator::from_config(config)?;
    let mut session = Session::new(session_id);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Buna! Spune-mi pentru ce ai nevoie de adeverinta. (/reset, /state, /quit)");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                println!("Am inceput o cerere noua.");
                continue;
            }
            "/state" => {
                print_json(session.state())?;
                continue;
            }
            _ => {}
        }

        match orchestrator.handle_turn(&mut session, line).await {
            Ok(reply) if json => print_json(&reply)?,
            Ok(reply) => {
                println!("{}", reply.text());
                if let Some(date) = reply.earliest_pickup {
                    println!("Cel mai devreme la ridicare: {}", date.format("%d.%m.%Y"));
                }
            }
            Err(TurnError::ConversationClosed(status)) => {
                println!("Cererea este inchisa ({status}). Scrie /reset pentru o cerere noua.");
            }
            Err(e) if e.is_retriable() => {
                tracing::warn!(error = %e, "Turn failed");
                println!("Nu am putut procesa mesajul acum. Te rog sa incerci din nou.");
            }
            Err(e) => println!("Eroare: {e}"),
        }
    }
    Ok(())
}

fn validate(path: &Path, retrieved: &[String]) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;

    match ContractValidator::default().validate(&raw, retrieved) {
        Ok(validated) => {
            println!("OK: status {}", validated.response.status);
            for (field, value) in validated.updates.iter() {
                println!("  {field} = {value}");
            }
            Ok(())
        }
        Err(violation) => bail!("contract violation: {violation}"),
    }
}

fn print_fields() {
    let schema = FormSchema::standard();
    for spec in schema.fields() {
        let domain = match &spec.domain {
            Domain::Choice(options) => options.join(" | "),
            other => other.describe(),
        };
        let condition = match &spec.requirement {
            Requirement::Always => "required".to_string(),
            Requirement::When { field, equals } => format!("if {field} = {equals}"),
        };
        println!(
            "{:<24} {:<22} {}  ({})",
            spec.name.as_str(),
            condition,
            domain,
            spec.name.label()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieve_args() {
        let cli = Cli::try_parse_from(["adeverinta", "retrieve", "termen eliberare", "-k", "5"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG));
        match cli.command {
            Commands::Retrieve { query, k, json } => {
                assert_eq!(query, "termen eliberare");
                assert_eq!(k, Some(5));
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "adeverinta",
            "chat",
            "--config",
            "/etc/adeverinta.yaml",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/adeverinta.yaml"));
        assert!(matches!(cli.log_format, Some(Format::Json)));
        assert!(matches!(cli.command, Commands::Chat { json: false, .. }));
    }

    #[test]
    fn test_validate_splits_ids() {
        let cli = Cli::try_parse_from([
            "adeverinta",
            "validate",
            "--response",
            "reply.json",
            "--retrieved",
            "motive-permise,termen-eliberare",
        ])
        .unwrap();
        match cli.command {
            Commands::Validate { retrieved, .. } => {
                assert_eq!(retrieved, vec!["motive-permise", "termen-eliberare"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_missing_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["adeverinta"]).is_err());
    }
}
