//! Command-line front end for the drafting engine.

use anyhow::Context;
use clap::{Parser, Subcommand};

use okr_coach::codec;
use okr_coach::config::{CoachConfig, LlmConfig};
use okr_coach::generator::OkrGenerator;
use okr_coach::llm::LlmProviderFactory;
use okr_coach::rules::RuleEngine;
use okr_coach::types::{Category, GenerationContext, ValidationResult};
use okr_coach::OkrError;

#[derive(Parser)]
#[command(name = "okr-coach", about = "Generate and validate OKR drafts with an LLM coach")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true, env = "OKR_COACH_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new OKR draft from a free-form request.
    Generate {
        /// The request to base the draft on.
        request: String,
        /// Team the draft belongs to.
        #[arg(long, default_value = "default")]
        team: String,
        /// Seed objective the model must honor.
        #[arg(long)]
        objective: Option<String>,
        /// Comma-separated categories (objectives,key_results,risks,kpis,initiatives).
        /// When omitted, the request is classified automatically.
        #[arg(long, value_delimiter = ',')]
        categories: Option<Vec<String>>,
    },
    /// Apply a change request to an existing YAML structure.
    Iterate {
        /// Path to a YAML file holding the current structure.
        file: String,
        /// The change to apply.
        change: String,
        /// Team the structure belongs to.
        #[arg(long, default_value = "default")]
        team: String,
        /// Comma-separated categories present in the file.
        #[arg(long, value_delimiter = ',', required = true)]
        categories: Vec<String>,
    },
    /// Classify which categories a free-form request implies.
    Analyze {
        /// The request to classify.
        request: String,
    },
}

fn load_config(path: Option<&str>) -> anyhow::Result<CoachConfig> {
    match path {
        Some(path) => {
            CoachConfig::from_file(path).with_context(|| format!("loading config from {}", path))
        }
        None => Ok(CoachConfig {
            llm: LlmConfig::from_env(),
            ..CoachConfig::default()
        }),
    }
}

fn parse_categories(names: &[String]) -> Result<Vec<Category>, OkrError> {
    names.iter().map(|name| name.trim().parse()).collect()
}

fn print_validation(validation: &ValidationResult) {
    for error in &validation.errors {
        eprintln!("error: {}", error);
    }
    for warning in &validation.warnings {
        eprintln!("warning: {}", warning);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let provider = LlmProviderFactory::create_provider(&config.llm)?;
    let generator = OkrGenerator::new(
        provider,
        RuleEngine::new(config.rules.clone()),
        config.retry.clone(),
    );

    match cli.command {
        Command::Generate {
            request,
            team,
            objective,
            categories,
        } => {
            let categories = match categories {
                Some(names) => parse_categories(&names)?,
                None => generator.analyze_categories(&request).await.categories,
            };

            let mut context = GenerationContext::new(team).with_categories(categories);
            if let Some(objective) = objective {
                context = context.with_objective(objective);
            }

            let outcome = generator.generate(&request, &context).await?;
            print_validation(&outcome.validation);
            println!("{}", codec::serialize_to_yaml(&outcome.okr_set)?);

            log::info!(
                "finished in {} iteration(s), valid: {}",
                outcome.iterations,
                outcome.validation.is_valid
            );
            if !outcome.validation.is_valid {
                std::process::exit(1);
            }
        }
        Command::Iterate {
            file,
            change,
            team,
            categories,
        } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("reading structure from {}", file))?;
            let categories = parse_categories(&categories)?;
            let current = codec::parse_partial_okr_set(&contents, &team, &categories)?;
            codec::validate_cross_references(&current, &categories)?;

            let outcome = generator.iterate(&current, &change, &categories).await?;
            print_validation(&outcome.validation);
            println!("{}", codec::serialize_to_yaml(&outcome.okr_set)?);

            if !outcome.validation.is_valid {
                std::process::exit(1);
            }
        }
        Command::Analyze { request } => {
            let analysis = generator.analyze_categories(&request).await;
            for category in &analysis.categories {
                let confidence = analysis
                    .confidence
                    .get(category.wire_name())
                    .copied()
                    .unwrap_or_default();
                match analysis.reasoning.get(category.wire_name()) {
                    Some(reason) => {
                        println!("{} ({:.2}): {}", category, confidence, reason)
                    }
                    None => println!("{} ({:.2})", category, confidence),
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
