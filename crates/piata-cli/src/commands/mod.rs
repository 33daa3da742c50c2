use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use piata_config::{ConfigLoader, LlmConfig, PiataConfig};
use piata_core::{PiataError, Result};
use piata_llm::{LlmProvider, MockProvider, OpenAiProvider};
use piata_orchestrator::{Orchestrator, ToolServerRegistry};

mod chat;

/// Piata: marketplace assistant orchestrator
#[derive(Parser, Debug)]
#[command(name = "piata", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to piata.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive chat in the terminal
    Chat {
        /// User the conversation belongs to
        #[arg(short, long, default_value = "local")]
        user: String,
        /// Conversation ID to resume (creates new if omitted)
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Answer a single request and exit
    Ask {
        /// The request, e.g. "show me iPhone listings under 4000"
        utterance: String,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show how a request would be classified
    Classify {
        utterance: String,
    },
    /// List configured tool-servers
    Servers {
        /// Call each server's /health endpoint
        #[arg(long)]
        probe: bool,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version and build info
    Version,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config default
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };
        init_logging(log_level, &config.logging.format);

        match self.command {
            Commands::Chat { user, conversation } => chat::cmd_chat(config, user, conversation).await,
            Commands::Ask { utterance, json } => Self::cmd_ask(config, utterance, json).await,
            Commands::Classify { utterance } => Self::cmd_classify(config, utterance).await,
            Commands::Servers { probe } => Self::cmd_servers(config, probe).await,
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Version => Self::cmd_version(),
        }
    }

    async fn cmd_ask(config: PiataConfig, utterance: String, json: bool) -> Result<()> {
        if utterance.trim().is_empty() {
            return Err(PiataError::EmptyUtterance);
        }
        let orchestrator = build_orchestrator(&config)?;
        let response = orchestrator.process_request(&utterance, &[]).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&response)?);
            return Ok(());
        }

        println!("{}", response.reply_text);
        if !response.tools_used.is_empty() {
            eprintln!(
                "{}",
                style(format!("   tools: {}", response.tools_used.join(", "))).dim()
            );
        }
        Ok(())
    }

    async fn cmd_classify(config: PiataConfig, utterance: String) -> Result<()> {
        let orchestrator = build_orchestrator(&config)?;
        let intent = orchestrator.classifier().classify(&utterance).await;
        println!("{}", serde_json::to_string_pretty(&intent)?);
        Ok(())
    }

    async fn cmd_servers(config: PiataConfig, probe: bool) -> Result<()> {
        let registry = ToolServerRegistry::from_config(&config)?;
        if registry.is_empty() {
            println!("No tool-servers configured.");
            return Ok(());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| PiataError::Config(format!("failed to build HTTP client: {e}")))?;

        for server in registry.list_servers() {
            println!(
                "{} {} — {}",
                style(server.kind.as_str()).bold(),
                server.name,
                server.base_url
            );
            if !server.description.is_empty() {
                println!("   {}", server.description);
            }
            println!("   tools: {}", server.tools.join(", "));

            if probe {
                let url = format!("{}/health", server.base_url.trim_end_matches('/'));
                match client.get(&url).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        println!("   {} healthy", style("✅").green());
                    }
                    Ok(resp) => {
                        println!("   {} returned {}", style("❌").red(), resp.status());
                    }
                    Err(e) => {
                        println!("   {} unreachable ({e})", style("❌").red());
                    }
                }
            }
        }
        Ok(())
    }

    fn cmd_config(config: PiataConfig, json: bool) -> Result<()> {
        let mut config = config;
        // Never echo credentials.
        if config.llm.api_key.is_some() {
            config.llm.api_key = Some("********".into());
        }
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| PiataError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_version() -> Result<()> {
        println!("Piata v{}", env!("CARGO_PKG_VERSION"));
        println!("   Rust edition: 2024");
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }
}

/// Initialize tracing. `RUST_LOG` wins over `level` when set.
fn init_logging(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        "json" => builder.json().with_target(true).init(),
        "compact" => builder.compact().with_target(false).init(),
        _ => builder.with_target(false).init(),
    }
}

/// Provider adapter named by `llm.provider`.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "openai" => {
            if config.api_key.is_none() {
                eprintln!(
                    "{} No LLM API key found. Set api_key under [llm] in piata.toml or export OPENAI_API_KEY.",
                    style("⚠️").yellow()
                );
                eprintln!("   Requests will use the keyword fallback until a key is configured.");
            }
            let provider = OpenAiProvider::new(config.api_key.clone())
                .with_base_url(config.base_url.clone())
                .with_timeout(Duration::from_secs(config.request_timeout_secs))?;
            Ok(Arc::new(provider))
        }
        "mock" => Ok(Arc::new(MockProvider::new("mock"))),
        other => Err(PiataError::Config(format!("unknown llm provider '{other}'"))),
    }
}

pub fn build_orchestrator(config: &PiataConfig) -> Result<Orchestrator> {
    let provider = build_provider(&config.llm)?;
    Orchestrator::from_config(config, provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask_with_globals() {
        let cli = Cli::try_parse_from([
            "piata",
            "--config",
            "/tmp/piata.toml",
            "-v",
            "ask",
            "show me iPhone listings",
            "--json",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/piata.toml")));
        match cli.command {
            Commands::Ask { utterance, json } => {
                assert_eq!(utterance, "show me iPhone listings");
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_chat_defaults() {
        let cli = Cli::try_parse_from(["piata", "chat"]).unwrap();
        match cli.command {
            Commands::Chat { user, conversation } => {
                assert_eq!(user, "local");
                assert!(conversation.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["piata", "-v", "-q", "version"]).is_err());
    }

    #[test]
    fn test_build_provider() {
        let mut config = LlmConfig::default();
        config.provider = "mock".into();
        assert_eq!(build_provider(&config).unwrap().name(), "mock");

        config.provider = "openai".into();
        config.api_key = Some("sk-test".into());
        assert_eq!(build_provider(&config).unwrap().name(), "openai");

        config.provider = "carrier-pigeon".into();
        assert!(build_provider(&config).is_err());
    }

    #[test]
    fn test_build_orchestrator_from_defaults() {
        let mut config = PiataConfig::default();
        config.llm.provider = "mock".into();
        let orchestrator = build_orchestrator(&config).unwrap();
        assert_eq!(orchestrator.registry().len(), 3);
    }
}
