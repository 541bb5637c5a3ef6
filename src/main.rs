use std::io::{self, BufRead, Read};

use anyhow::{Context, Result};
use clap::Parser;
use fake_news_scorer::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "fake-news-scorer",
    version,
    about = "Score how likely a news article is true, in any language"
)]
struct Cli {
    /// Article file to score (reads stdin when omitted)
    file: Option<String>,

    /// Model name or provider:model (e.g. openai:MODEL_ID)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Classify at most this many sentences; the rest score 0.5
    #[arg(long = "max-sentences")]
    max_sentences: Option<usize>,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Enable verbose logging (stderr)
    #[arg(long = "verbose")]
    verbose: bool,

    /// Interactive mode: one article per line
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Serve the HTTP API (address defaults to settings [server] addr)
    #[arg(long = "server", num_args = 0..=1, default_missing_value = "")]
    server: Option<String>,
}

impl Cli {
    fn config(&self) -> fake_news_scorer::Config {
        fake_news_scorer::Config {
            model: self.model.clone(),
            key: self.key.clone(),
            settings_path: self.read_settings.clone(),
            max_sentences: self.max_sentences,
            format: self.format,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    fake_news_scorer::logging::init(cli.verbose)?;

    if let Some(addr) = cli.server.as_deref() {
        return run_server(&cli, addr).await;
    }
    if cli.interactive {
        return run_interactive(&cli).await;
    }

    let input = match cli.file.as_deref() {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read article: {}", path))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .with_context(|| "stdin must be UTF-8 text")?;
            buffer
        }
    };

    let output = fake_news_scorer::run(cli.config(), Some(input)).await?;
    println!("{}", output);
    Ok(())
}

async fn run_server(cli: &Cli, addr: &str) -> Result<()> {
    let config = cli.config();
    let settings = fake_news_scorer::load_config_settings(&config)?;
    let pipeline = fake_news_scorer::build_pipeline(&config, &settings)?;
    let addr = if addr.trim().is_empty() {
        settings.server_addr.clone()
    } else {
        addr.trim().to_string()
    };
    eprintln!("listening on http://{}", addr);
    fake_news_scorer::server::run_server(pipeline, addr).await
}

async fn run_interactive(cli: &Cli) -> Result<()> {
    use std::io::Write;

    let mut config = cli.config();
    println!("Interactive mode. Use /quit or /exit to finish.");
    println!("Type /help to see available commands.");

    let mut line = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();
    loop {
        line.clear();
        print!("> ");
        io::stdout().flush()?;
        if stdin_lock.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.starts_with('/') {
            if handle_interactive_command(input, &mut config) {
                break;
            }
            continue;
        }

        match fake_news_scorer::run(config.clone(), Some(input.to_string())).await {
            Ok(output) => println!("{}", output),
            Err(err) => eprintln!("error: {:#}", err),
        }
    }
    Ok(())
}

fn handle_interactive_command(input: &str, config: &mut fake_news_scorer::Config) -> bool {
    let trimmed = input.trim();
    if matches!(trimmed, "/quit" | "/exit") {
        return true;
    }
    if trimmed == "/help" {
        print_interactive_help();
        return false;
    }

    if let Some(arg) = trimmed.strip_prefix("/model") {
        let value = arg.trim();
        if value.is_empty() {
            println!("model: {}", config.model.as_deref().unwrap_or("(auto)"));
        } else {
            config.model = Some(value.to_string());
            println!("model set to {}", value);
        }
        return false;
    }
    if let Some(arg) = trimmed.strip_prefix("/format") {
        let value = arg.trim();
        if value.is_empty() {
            println!("format: {}", config.format.as_str());
        } else if let Some(format) = OutputFormat::parse(value) {
            config.format = format;
            println!("format set to {}", format.as_str());
        } else {
            eprintln!("unknown format: {} (expected json or text)", value);
        }
        return false;
    }

    eprintln!("unknown command: {}", trimmed);
    false
}

fn print_interactive_help() {
    println!("Commands:");
    println!("  /quit, /exit                 Exit interactive mode");
    println!("  /model <provider:model>      Set model (or show current)");
    println!("  /format <json|text>          Set output format (or show current)");
    println!("  /help                        Show this help");
}
