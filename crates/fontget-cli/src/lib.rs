//! CLI interface for fontget
//!
//! Parses arguments, builds the [`AppContext`] from the environment and
//! dispatches to one handler per command. Handlers print status lines and
//! return `FontError`; `main` maps errors to exit codes.

mod args;
mod ops;

pub use args::*;
pub use ops::*;

use clap::Parser;
use fontget_core::progress::CancellationFlag;
use fontget_core::FontError;

/// Dispatch a parsed command against an existing context
pub async fn run_cli_with(cli: Cli, ctx: &AppContext) -> Result<(), FontError> {
    let opts = OperationOptions::new(cli.dry_run, cli.quiet, cli.verbose)
        .with_json(cli.json)
        .with_refresh(cli.refresh);

    match cli.command {
        Commands::Add { fonts, scope, force } => {
            handle_add_command(ctx, fonts, scope, force, opts).await?;
        }
        Commands::Remove { fonts, scope } => {
            handle_remove_command(ctx, fonts, scope, opts).await?;
        }
        Commands::List { scope, family } => {
            handle_list_command(ctx, scope, family, opts).await?;
        }
        Commands::Search { query } => {
            handle_search_command(ctx, query, opts).await?;
        }
        Commands::Info { font_id } => {
            handle_info_command(ctx, font_id, opts).await?;
        }
        Commands::Export {
            output,
            all,
            matched,
            match_filter,
            source_filter,
            scope,
        } => {
            let args = ExportArgs {
                output,
                all,
                matched,
                match_filter,
                source_filter,
                scope,
            };
            handle_export_command(ctx, args, opts).await?;
        }
        Commands::Import { file, scope, force } => {
            handle_import_command(ctx, file, scope, force, opts).await?;
        }
        Commands::Backup { output, scope } => {
            handle_backup_command(ctx, output, scope, opts).await?;
        }
        Commands::Sources { command } => match command {
            SourcesCommand::List => handle_sources_list_command(ctx, opts).await?,
            SourcesCommand::Update => handle_sources_update_command(ctx, opts).await?,
            SourcesCommand::Enable { name } => {
                handle_sources_toggle_command(ctx, name, true, opts).await?
            }
            SourcesCommand::Disable { name } => {
                handle_sources_toggle_command(ctx, name, false, opts).await?
            }
            SourcesCommand::Add { name, url, prefix } => {
                handle_sources_add_command(ctx, name, url, prefix, opts).await?
            }
            SourcesCommand::Remove { name } => {
                handle_sources_remove_command(ctx, name, opts).await?
            }
        },
        Commands::Completions { shell } => {
            write_completions(shell, std::io::stdout())?;
        }
    }

    Ok(())
}

/// Main CLI handler
///
/// Completions are written before the environment is read.
pub async fn run_cli(cli: Cli, cancel: CancellationFlag) -> Result<(), FontError> {
    if let Commands::Completions { shell } = &cli.command {
        return write_completions(*shell, std::io::stdout());
    }
    let ctx = AppContext::from_env()?.with_cancel(cancel);
    run_cli_with(cli, &ctx).await
}

/// CLI entry point
#[tokio::main]
pub async fn main() {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = exit_code_for_clap_error(err.kind());
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let cancel = CancellationFlag::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::debug!("Interrupt received");
            interrupt.cancel();
        }
    });

    match run_cli(cli, cancel).await {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => {
            eprintln!("⚠️  Operation cancelled");
            std::process::exit(130);
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}
