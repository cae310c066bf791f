//! Click-or-Cap CLI
//!
//! Command-line interface for the moderation pipeline.
//!
//! # Overview
//!
//! Click-or-Cap asks a hosted language/vision model to rate content for
//! toxicity, maps the rating to HIDE / WARN / ALLOW and offers civil
//! rewrites. `serve` exposes the pipeline, the points game, the trivia deck
//! and the toxicity weather over HTTP; the other commands run the same
//! pipeline from a terminal.
//!
//! # Offline Mode
//!
//! Without `MISTRAL_API_KEY` every command falls back to a keyword oracle so
//! the service stays usable for local development.

use clap::{Args, Parser, Subcommand, ValueEnum};
use moderation_contract::{
    AlternativeTone, CalibrationCase, CalibrationSummary, ModerationRequest, ModerationResult,
    ModerationRunner,
};
use moderation_server::{AppState, ServerConfig, ServerError};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use toxicity_oracle::{
    normalize_api_key, HostedConfig, HostedOracle, LexiconOracle, OracleError, ScoringOracle,
};
use tracing_subscriber::EnvFilter;
use trivia_deck::{CardKind, DeckBuilder, DeckConfig, GameCard};

/// Output format for results
#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine processing
    Json,
    /// Compact single-line output
    Compact,
}

/// Verbosity level
#[derive(Debug, Clone, ValueEnum)]
enum Verbosity {
    /// Errors only
    Quiet,
    /// Normal output
    Normal,
    /// Detailed output including oracle calls
    Verbose,
    /// Debug output including internal state
    Debug,
}

impl Verbosity {
    fn default_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::Debug => "trace",
        }
    }
}

/// Tone for `rewrite --tone`
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ToneArg {
    Polite,
    Educational,
    Firm,
}

impl From<ToneArg> for AlternativeTone {
    fn from(tone: ToneArg) -> Self {
        match tone {
            ToneArg::Polite => AlternativeTone::Polite,
            ToneArg::Educational => AlternativeTone::Educational,
            ToneArg::Firm => AlternativeTone::Firm,
        }
    }
}

/// Hosted model settings shared by every command
#[derive(Debug, Clone, Args)]
struct OracleArgs {
    /// Mistral API key; without one the offline keyword oracle is used
    #[arg(long, env = "MISTRAL_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Chat-completions base URL
    #[arg(long, env = "MISTRAL_API_BASE", global = true, default_value = toxicity_oracle::DEFAULT_BASE_URL)]
    api_base: String,

    /// Model used for text rating, rewrites and reply options
    #[arg(long, env = "MISTRAL_TEXT_MODEL", global = true, default_value = toxicity_oracle::DEFAULT_TEXT_MODEL)]
    text_model: String,

    /// Model used for image rating
    #[arg(long, env = "MISTRAL_VISION_MODEL", global = true, default_value = toxicity_oracle::DEFAULT_VISION_MODEL)]
    vision_model: String,

    /// Oracle request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    timeout_secs: u64,

    /// Do not ask the oracle for civil rewrites of flagged text
    #[arg(long, global = true)]
    no_rewrite: bool,
}

#[derive(Parser)]
#[command(name = "clickcap")]
#[command(author = "Jonathan D.A. Jewell <jonathan@hyperpolymath.org>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Model-scored content moderation with a civility game")]
#[command(long_about = r#"
Click-or-Cap - Toxicity Moderation and Civility Game

OVERVIEW
  Rates text and images with a hosted model (Mistral chat-completions),
  maps the 0-100 rating to an action and offers civil rewrites:
    score >= 70          HIDE
    score >= 40 (text)   WARN
    score >= 30 (image)  WARN
    otherwise            ALLOW

EXAMPLES
  clickcap serve --port 8000                       # HTTP API
  clickcap check --content "you are an idiot"      # Rate inline text
  clickcap check --image-url https://x/y.png       # Rate an image
  echo "hello" | clickcap check --content -        # Rate stdin
  clickcap rewrite "this is stupid" --tone firm    # Alternative phrasing
  clickcap deck --format json                      # Deal a trivia deck
  clickcap calibrate                               # Check oracle calibration

EXIT CODES
  0  Content allowed
  1  Content hidden
  2  Content flagged with a warning
  3  Error during execution
"#)]
#[command(after_help = r#"
ENVIRONMENT
  A .env file in the working directory is loaded before parsing.
  MISTRAL_API_KEY, MISTRAL_API_BASE, MISTRAL_TEXT_MODEL, MISTRAL_VISION_MODEL
  configure the oracle; HOST and PORT configure `serve`.
  RUST_LOG (or LOG_LEVEL) overrides the --verbosity log filter.

SHELL COMPLETIONS
  Generate completions with:
    clickcap completions bash > /etc/bash_completion.d/clickcap
    clickcap completions zsh > ~/.zfunc/_clickcap
    clickcap completions fish > ~/.config/fish/completions/clickcap.fish
"#)]
struct Cli {
    /// Output verbosity level
    #[arg(short, long, value_enum, default_value = "normal", global = true)]
    verbosity: Verbosity,

    #[command(flatten)]
    oracle: OracleArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    ///
    /// Serves /decision, /users, /game and /hate-weather with permissive CORS.
    /// User points and the moderation tally live in memory only.
    Serve {
        /// Interface to bind
        #[arg(long, env = "HOST", default_value = moderation_server::DEFAULT_HOST)]
        host: String,

        /// Port to bind
        #[arg(short, long, env = "PORT", default_value_t = moderation_server::DEFAULT_PORT)]
        port: u16,
    },

    /// Rate text or an image and print the decision
    ///
    /// Exactly the pipeline behind POST /decision/engine. An image wins over
    /// text; text given alongside an image becomes its context.
    ///
    /// EXAMPLES
    ///   clickcap check --content "nobody asked you"
    ///   clickcap check --image-url https://example.com/meme.png --context "meme caption"
    #[command(visible_alias = "c")]
    Check {
        /// Text to rate (use '-' for stdin)
        #[arg(short = 'C', long)]
        content: Option<String>,

        /// Image URL (http(s) or data URL)
        #[arg(long)]
        image_url: Option<String>,

        /// Inline base64 image data
        #[arg(long)]
        image_data: Option<String>,

        /// Where the content came from
        #[arg(long)]
        context: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Also print the audit entry as JSON
        #[arg(long)]
        audit: bool,
    },

    /// Rewrite text civilly, or in a given tone
    #[command(visible_alias = "r")]
    Rewrite {
        /// Text to rewrite (use '-' for stdin)
        text: String,

        /// Pick one of the generated reply options instead of a civil rewrite
        #[arg(short, long, value_enum)]
        tone: Option<ToneArg>,
    },

    /// Deal a Click-or-Cap trivia deck from the live feeds
    #[command(visible_alias = "d")]
    Deck {
        /// Headlines taken from each feed
        #[arg(long, default_value = "4")]
        per_feed: usize,

        /// Hate speech samples mixed in
        #[arg(long, default_value = "2")]
        samples: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Run calibration cases against the configured oracle
    ///
    /// Uses the built-in cases unless --cases points at a JSON array of
    /// calibration cases.
    Calibrate {
        /// JSON file with calibration cases
        #[arg(long)]
        cases: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES
    ///   clickcap completions bash > ~/.local/share/bash-completion/completions/clickcap
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Generate man page
    ///
    /// EXAMPLE
    ///   clickcap man > /usr/local/share/man/man1/clickcap.1
    Man,
}

#[tokio::main]
async fn main() {
    // Best-effort .env load; ignore if missing
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli.verbosity);

    let exit_code = match cli.command {
        Commands::Completions { shell } => {
            generate_completions(shell);
            0
        }
        Commands::Man => generate_man_page(),
        command => match build_oracle(&cli.oracle) {
            Ok((oracle, configured)) => {
                let runner = ModerationRunner::new(oracle).with_rewrites(!cli.oracle.no_rewrite);
                run_command(command, runner, configured).await
            }
            Err(e) => {
                eprintln!("Failed to set up oracle: {}", e);
                3
            }
        },
    };

    std::process::exit(exit_code);
}

fn init_tracing(verbosity: &Verbosity) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Hosted oracle when a key is present, keyword oracle otherwise
fn build_oracle(args: &OracleArgs) -> Result<(Arc<dyn ScoringOracle>, bool), OracleError> {
    let key = args.api_key.as_deref().and_then(normalize_api_key);
    match key {
        Some(key) => {
            let mut config = HostedConfig::new(key).with_base_url(&args.api_base);
            config.text_model = args.text_model.clone();
            config.vision_model = args.vision_model.clone();
            config.timeout_secs = args.timeout_secs;
            tracing::info!(
                base_url = %config.base_url,
                text_model = %config.text_model,
                vision_model = %config.vision_model,
                "using hosted oracle"
            );
            Ok((Arc::new(HostedOracle::new(config)?), true))
        }
        None => {
            tracing::warn!("MISTRAL_API_KEY not set, using offline keyword oracle");
            Ok((Arc::new(LexiconOracle::new()), false))
        }
    }
}

async fn run_command(command: Commands, runner: ModerationRunner, configured: bool) -> i32 {
    match command {
        Commands::Serve { host, port } => {
            match serve(ServerConfig::new(host, port), runner, configured).await {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("Server error: {}", e);
                    3
                }
            }
        }
        Commands::Check {
            content,
            image_url,
            image_data,
            context,
            format,
            audit,
        } => {
            check_content(
                &runner,
                content,
                image_url,
                image_data,
                context,
                &format,
                audit,
            )
            .await
        }
        Commands::Rewrite { text, tone } => rewrite_text(&runner, text, tone).await,
        Commands::Deck {
            per_feed,
            samples,
            format,
        } => deal_deck(per_feed, samples, &format).await,
        Commands::Calibrate { cases, format } => {
            calibrate(&runner, cases.as_deref(), &format).await
        }
        Commands::Completions { .. } | Commands::Man => 0,
    }
}

async fn serve(
    config: ServerConfig,
    runner: ModerationRunner,
    configured: bool,
) -> Result<(), ServerError> {
    let deck = DeckBuilder::new(DeckConfig::default())?;
    let state = AppState::new(runner, deck, configured);
    moderation_server::serve(&config, state).await
}

fn read_stdin_if_dash(value: String) -> std::io::Result<String> {
    if value == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(value)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

async fn check_content(
    runner: &ModerationRunner,
    content: Option<String>,
    image_url: Option<String>,
    image_data: Option<String>,
    context: Option<String>,
    format: &OutputFormat,
    audit: bool,
) -> i32 {
    let content = match content.map(read_stdin_if_dash).transpose() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to read stdin: {}", e);
            return 3;
        }
    };

    let request = match ModerationRequest::from_parts(content, image_url, image_data, context) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e);
            return 3;
        }
    };

    let result = runner.moderate(&request).await;

    match format {
        OutputFormat::Json => println!("{}", to_json(&result)),
        OutputFormat::Compact => println!(
            "{} score={} oracle={} {}",
            result.action, result.score, result.oracle, result.reason
        ),
        OutputFormat::Text => print_result(&result),
    }

    if audit {
        match runner.audit(&request, &result).to_json() {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Failed to serialize audit entry: {}", e),
        }
    }

    if result.oracle_error.is_some() {
        3
    } else {
        result.action.exit_code()
    }
}

fn print_result(result: &ModerationResult) {
    println!("=== Moderation Result ===\n");
    println!("Action: {}", result.action);
    println!("Score:  {}/100", result.score);
    println!("Reason: {}", result.reason);
    println!("Oracle: {}", result.oracle);

    if let Some(replacement) = &result.replacement_content {
        println!("\nShown instead: {}", replacement);
    }
    if let Some(rewrite) = &result.rewritten_content {
        println!("Civil rewrite: {}", rewrite);
    }
    if let Some(error) = &result.oracle_error {
        println!("\nOracle error: {}", error);
    }
}

async fn rewrite_text(runner: &ModerationRunner, text: String, tone: Option<ToneArg>) -> i32 {
    let text = match read_stdin_if_dash(text) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to read stdin: {}", e);
            return 3;
        }
    };

    match tone {
        Some(tone) => match runner.alternative(&text, tone.into()).await {
            Ok(alternative) => {
                println!("{}", alternative.alternative);
                0
            }
            Err(e) => {
                eprintln!("{}", e);
                3
            }
        },
        None if text.trim().is_empty() => {
            eprintln!("Nothing to rewrite");
            3
        }
        None => {
            println!("{}", runner.civilize(&text).await);
            0
        }
    }
}

async fn deal_deck(per_feed: usize, samples: usize, format: &OutputFormat) -> i32 {
    let config = DeckConfig {
        per_feed_limit: per_feed,
        hate_samples: samples,
        ..DeckConfig::default()
    };
    let builder = match DeckBuilder::new(config) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to set up feed client: {}", e);
            return 3;
        }
    };

    let deck = builder.build().await;
    match format {
        OutputFormat::Json => println!("{}", to_json(&deck)),
        OutputFormat::Compact => {
            for card in &deck {
                println!("{} {} {}", card.id, kind_label(card), card.text);
            }
        }
        OutputFormat::Text => print_deck(&deck),
    }
    0
}

fn kind_label(card: &GameCard) -> &'static str {
    match card.kind {
        CardKind::Click => "CLICK",
        CardKind::Cap => "CAP",
    }
}

fn print_deck(deck: &[GameCard]) {
    println!("=== Click or Cap ({} cards) ===\n", deck.len());
    for (idx, card) in deck.iter().enumerate() {
        println!("{:>2}. [{}] {}", idx + 1, kind_label(card), card.text);
        println!("    {} - {}", card.source, card.explanation);
    }
}

async fn calibrate(runner: &ModerationRunner, cases: Option<&Path>, format: &OutputFormat) -> i32 {
    let cases = match cases {
        Some(path) => match load_cases(path) {
            Ok(cases) => cases,
            Err(e) => {
                eprintln!("Failed to load calibration cases: {}", e);
                return 3;
            }
        },
        None => CalibrationCase::defaults(),
    };

    let summary = runner.calibrate(&cases).await;
    match format {
        OutputFormat::Json => println!("{}", to_json(&summary)),
        OutputFormat::Compact => println!(
            "{} passed={}/{} oracle={}",
            if summary.all_passed() { "OK" } else { "FAIL" },
            summary.passed,
            summary.total,
            runner.oracle_name()
        ),
        OutputFormat::Text => print_summary(&summary, runner.oracle_name()),
    }

    if summary.all_passed() {
        0
    } else {
        1
    }
}

fn load_cases(path: &Path) -> Result<Vec<CalibrationCase>, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&raw).map_err(|e| e.to_string())
}

fn print_summary(summary: &CalibrationSummary, oracle: &str) {
    println!("=== Calibration ({}) ===\n", oracle);
    for result in &summary.results {
        let mark = if result.passed { "+" } else { "-" };
        println!(
            "  {} {} expected {} got {} (score {})",
            mark, result.name, result.expected_action, result.actual_action, result.actual_score
        );
        if let Some(error) = &result.error {
            println!("      {}", error);
        }
    }
    println!("\n{}/{} passed", summary.passed, summary.total);
    if !summary.all_passed() {
        println!("Failed: {}", summary.failed_cases().join(", "));
    }
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    clap_complete::generate(
        shell,
        &mut Cli::command(),
        "clickcap",
        &mut std::io::stdout(),
    );
}

fn generate_man_page() -> i32 {
    use clap::CommandFactory;
    let man = clap_mangen::Man::new(Cli::command());
    let mut buffer: Vec<u8> = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        eprintln!("Failed to generate man page: {}", e);
        return 3;
    }
    print!("{}", String::from_utf8_lossy(&buffer));
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_parses_image_flags() {
        let cli = Cli::try_parse_from([
            "clickcap",
            "check",
            "--image-url",
            "https://example.com/a.png",
            "--context",
            "caption",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Check {
                image_url, context, ..
            } => {
                assert_eq!(image_url.as_deref(), Some("https://example.com/a.png"));
                assert_eq!(context.as_deref(), Some("caption"));
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_blank_key_falls_back_to_lexicon() {
        let args = OracleArgs {
            api_key: Some("\"\"".to_string()),
            api_base: "http://localhost:1".to_string(),
            text_model: "t".to_string(),
            vision_model: "v".to_string(),
            timeout_secs: 1,
            no_rewrite: false,
        };
        let (oracle, configured) = build_oracle(&args).unwrap();
        assert_eq!(oracle.name(), "lexicon");
        assert!(!configured);
    }

    #[test]
    fn test_key_selects_hosted_oracle() {
        let args = OracleArgs {
            api_key: Some("sk-test".to_string()),
            api_base: "http://localhost:1".to_string(),
            text_model: "t".to_string(),
            vision_model: "v".to_string(),
            timeout_secs: 1,
            no_rewrite: false,
        };
        let (oracle, configured) = build_oracle(&args).unwrap();
        assert_eq!(oracle.name(), "mistral");
        assert!(configured);
    }

    #[tokio::test]
    async fn test_check_exit_codes_follow_action() {
        let runner = ModerationRunner::new(Arc::new(LexiconOracle::new()));
        let code = |text: &str| {
            let runner = runner.clone();
            let text = text.to_string();
            async move {
                check_content(
                    &runner,
                    Some(text),
                    None,
                    None,
                    None,
                    &OutputFormat::Compact,
                    false,
                )
                .await
            }
        };
        assert_eq!(code("lovely weather").await, 0);
        assert_eq!(code("that was stupid").await, 2);
        assert_eq!(code("I hate you, fucking idiot").await, 1);
    }
}
