//! Contexto CLI
//!
//! Serve the game over HTTP or query the dictionary from the terminal.

use anyhow::{bail, Context, Result};
use contexto::{server, Config, WordGame};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    // Global flags
    let quiet = args.iter().any(|a| a == "-q" || a == "--quiet");

    let mut config_path: Option<PathBuf> = None;
    let mut rest: Vec<String> = Vec::new();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-q" | "--quiet" => {}
            "--config" | "-c" => {
                let Some(path) = args.get(i + 1) else {
                    bail!("--config needs a path");
                };
                config_path = Some(PathBuf::from(path));
                i += 1;
            }
            other => rest.push(other.to_string()),
        }
        i += 1;
    }

    init_logging(quiet);

    let mut config = Config::load(config_path.as_deref())?;

    match rest.first().map(|s| s.as_str()) {
        Some("serve") | Some("server") => cmd_serve(&mut config, &rest[1..]),
        Some("rank") | Some("r") => cmd_rank(&config, &rest[1..]),
        Some("similar") | Some("sim") => cmd_similar(&config, &rest[1..]),
        Some("target") | Some("t") => cmd_target(&config, &rest[1..]),
        Some("sample") => cmd_sample(&config, &rest[1..]),
        Some("check") => cmd_check(&config, &rest[1..]),
        Some("stats") | Some("status") => cmd_stats(&config),
        Some("config") => {
            println!("{}", config.to_json_pretty()?);
            Ok(())
        }
        Some("help") | Some("--help") | Some("-h") | None => {
            print_usage();
            Ok(())
        }
        Some("version") | Some("--version") | Some("-V") => {
            println!("contexto {}", VERSION);
            Ok(())
        }
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(2);
        }
    }
}

fn init_logging(quiet: bool) {
    let default = if quiet { "contexto=warn" } else { "contexto=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_serve(config: &mut Config, args: &[String]) -> Result<()> {
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--host" | "-h" => {
                if let Some(host) = args.get(i + 1) {
                    config.server.host = host.clone();
                    i += 2;
                    continue;
                }
            }
            "--port" | "-p" => {
                if let Some(port) = args.get(i + 1) {
                    config.server.port = port.parse().with_context(|| format!("invalid port '{}'", port))?;
                    i += 2;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(server::start_server(config))
}

fn cmd_rank(config: &Config, args: &[String]) -> Result<()> {
    let (Some(guess), Some(target)) = (args.first(), args.get(1)) else {
        bail!("usage: contexto rank <guess> <target_POS>");
    };

    let game = WordGame::from_config(config)?;
    let outcome = game.evaluate(&contexto::text::to_lower(guess), target)?;

    println!("🎯 {} → {}", guess, target);
    println!("   Rank:       {}", outcome.rank);
    println!("   Similarity: {:.4}", outcome.similarity);
    if let Some(combined) = outcome.combined {
        println!("   Combined:   {:.4}", combined);
    }
    if outcome.is_win() {
        println!("   🎉 Exact match!");
    }
    Ok(())
}

fn cmd_similar(config: &Config, args: &[String]) -> Result<()> {
    let Some(word) = args.first() else {
        bail!("usage: contexto similar <word> [k]");
    };
    let k = match args.get(1) {
        Some(k) => k.parse().with_context(|| format!("invalid count '{}'", k))?,
        None => 10,
    };

    let game = WordGame::from_config(config)?;
    if !game.validate_word(word) {
        bail!("unknown word '{}'", word);
    }

    println!("🔍 Nearest to '{}':\n", word);
    for (i, (entry, score)) in game.most_similar(word, k).iter().enumerate() {
        println!("  {:>4}. {:<30} {:.4}", i + 1, entry.token(), score);
    }
    Ok(())
}

fn parse_count(args: &[String], default: usize) -> Result<usize> {
    match args.first() {
        Some(n) => n.parse().with_context(|| format!("invalid count '{}'", n)),
        None => Ok(default),
    }
}

fn cmd_target(config: &Config, args: &[String]) -> Result<()> {
    let count = parse_count(args, 1)?;
    let game = WordGame::from_config(config)?;
    if count == 1 {
        println!("{}", game.generate_new_target_word()?.token());
        return Ok(());
    }
    for target in game.sample_targets(count) {
        println!("{}", target.token());
    }
    Ok(())
}

fn cmd_sample(config: &Config, args: &[String]) -> Result<()> {
    let count = parse_count(args, 10)?;
    let game = WordGame::from_config(config)?;
    let source = if game.store().has_dedicated_dictionary() { "dedicated dictionary" } else { "vocabulary" };

    println!("🎲 {} random words from the {}:\n", count, source);
    for entry in game.store().random_words(count) {
        println!("  {}", entry.token());
    }
    Ok(())
}

fn cmd_check(config: &Config, args: &[String]) -> Result<()> {
    let Some(word) = args.first() else {
        bail!("usage: contexto check <word>");
    };

    let game = WordGame::from_config(config)?;
    let variants = game.store().variants_of(word);
    if variants.is_empty() {
        println!("❌ '{}' is not in the dictionary", word);
        return Ok(());
    }

    println!("✅ '{}' is in the dictionary", word);
    for entry in variants {
        let dedicated = if game.store().dictionary_contains(entry.token()) { " (playable)" } else { "" };
        println!("   {}{}", entry.token(), dedicated);
    }
    Ok(())
}

fn cmd_stats(config: &Config) -> Result<()> {
    let game = WordGame::from_config(config)?;
    let stats = game.stats();

    println!("📚 Dictionary Statistics\n");
    println!("  Entries:         {}", stats.entries);
    println!("  Distinct words:  {}", stats.words);
    println!("  Dimension:       {}d", stats.dimension);
    println!("  Dedicated words: {}", stats.dedicated_words);
    println!("  Target type:     {}", stats.target_word_type);
    println!("  Rank strategy:   {:?}", stats.rank_strategy);
    println!("\n  By type:");
    for (pos, count) in &stats.types {
        println!("    {:<8} {}", pos, count);
    }
    Ok(())
}

fn print_usage() {
    println!(
        r#"
🎯 Contexto v{} - Guess the secret word by meaning

USAGE:
    contexto [--config PATH] [-q] <command> [options]

COMMANDS:
    serve                  Start the HTTP game server
    rank <guess> <target>  Rank a guess against a POS-tagged target (кот_NOUN)
    similar <word> [k]     Show the k nearest words (default: 10)
    target [n]             Pick n distinct target words (default: 1)
    sample [n]             Show n random playable words (default: 10)
    check <word>           Show whether a word is known, with its POS variants
    stats                  Show dictionary statistics
    config                 Print the effective configuration
    help                   Show this help

OPTIONS:
    -c, --config PATH      Config file (default: $CONTEXTO_CONFIG or <config dir>/contexto/config.json)
    -q, --quiet            Only log warnings and errors

SERVER MODE:
    contexto serve [--host 0.0.0.0] [--port 8080]

    Endpoints:
      POST /api/new-game    - Start a game (sets session_id cookie)
      POST /api/guess       - Rank a guess (JSON: {{word}})
      POST /api/give-up     - Reveal the target
      POST /api/hint        - Get a closer word
      GET  /api/history     - Guesses so far, closest first
      GET  /api/similar/:w  - Nearest neighbours (?k=N)
      GET  /api/health      - Health check

ENVIRONMENT:
    CONTEXTO_EMBEDDINGS, CONTEXTO_DICTIONARY, CONTEXTO_HOST,
    CONTEXTO_PORT, CONTEXTO_SEED override the config file.
    RUST_LOG sets the log filter (default: contexto=info).
"#,
        VERSION
    );
}
