use std::io::Write;
use std::time::Duration;

use clap::{Parser, Subcommand};
use strata_cli::commands;
use strata_cli::logging;
use strata_cli::readline;
use strata_cli::CliContext;

#[tokio::main]
async fn main() -> Result<(), String> {
    let _log_guard = logging::init();

    let ctx = CliContext::start().await.map_err(|e| e.to_string())?;
    println!(
        "strata admin shell ({} store), type 'help' for commands",
        ctx.config().store.backend
    );

    loop {
        let Some(line) = readline()? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, &ctx).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                writeln!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    ctx.shutdown().await;
    Ok(())
}

#[derive(Parser)]
#[command(version, about = "strata admin shell")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate an owner joining
    Connect { owner: String },
    /// Simulate an owner leaving
    Disconnect { owner: String },
    /// Push a timed override onto an attribute
    Apply {
        owner: String,
        attribute: String,
        #[arg(allow_negative_numbers = true)]
        value: f64,
        /// e.g. 500ms, 30s, 5m, 1h
        #[arg(value_parser = commands::parse_duration)]
        duration: Duration,
        #[arg(short, long, default_value = "admin")]
        source: String,
    },
    /// Cancel every effect on one attribute
    Cancel { owner: String, attribute: String },
    /// Cancel a single effect by id
    CancelEffect { owner: String, effect_id: String },
    /// Cancel every effect the owner has
    Clear { owner: String },
    /// Show each stack's running effect
    List { owner: Option<String> },
    /// Show a full stack, top first
    Stack { owner: String, attribute: String },
    /// Read live attribute values
    Get {
        owner: String,
        attribute: Option<String>,
    },
    /// Write a live value directly, bypassing the engine
    Set {
        owner: String,
        attribute: String,
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },
    /// List attributes with ranges and aliases
    Attrs,
    /// Show which attribute a name resolves to
    Resolve { input: String },
    Config,
    Exit,
}

async fn respond(line: &str, ctx: &CliContext) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "strata".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match &cli.command {
        Some(Commands::Connect { owner }) => commands::connect(owner, ctx).await?,
        Some(Commands::Disconnect { owner }) => commands::disconnect(owner, ctx).await?,
        Some(Commands::Apply {
            owner,
            attribute,
            value,
            duration,
            source,
        }) => commands::apply(owner, attribute, *value, *duration, source, ctx).await?,
        Some(Commands::Cancel { owner, attribute }) => {
            commands::cancel(owner, attribute, ctx).await?
        }
        Some(Commands::CancelEffect { owner, effect_id }) => {
            commands::cancel_effect(owner, effect_id, ctx).await?
        }
        Some(Commands::Clear { owner }) => commands::clear(owner, ctx).await?,
        Some(Commands::List { owner }) => commands::list(owner.as_deref(), ctx),
        Some(Commands::Stack { owner, attribute }) => commands::stack(owner, attribute, ctx)?,
        Some(Commands::Get { owner, attribute }) => {
            commands::get(owner, attribute.as_deref(), ctx)?
        }
        Some(Commands::Set {
            owner,
            attribute,
            value,
        }) => commands::set(owner, attribute, *value, ctx)?,
        Some(Commands::Attrs) => commands::attrs(),
        Some(Commands::Resolve { input }) => commands::resolve(input),
        Some(Commands::Config) => commands::show_config(ctx)?,
        Some(Commands::Exit) => {
            commands::exit();
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}
