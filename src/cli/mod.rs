pub mod presenter;
pub mod report;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use presenter::{TerminalPresenter, spawn_dismiss_listener};
use tracing::level_filters::LevelFilter;

use crate::{
    agent::run_agent,
    config::TimeConfigController,
    page::FixedPage,
    records::RecordStore,
    store::{KeyValueStore, json_file::JsonFileStore},
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::{AGENT_PREFIX, CLI_PREFIX, enable_logging},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Domainwatch", version, long_about = None)]
#[command(
    about = "Tracks active time per web domain and warns when a daily budget runs out",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(
        about = "Attribute active time to a domain in the current console and warn when its budget runs out"
    )]
    Watch {
        #[arg(long, help = "Hostname to attribute time to, for example youtube.com")]
        domain: String,
    },
    #[command(about = "Manage per-domain time budgets")]
    Limits {
        #[command(subcommand)]
        command: LimitsCommand,
    },
    #[command(about = "Show today's active time per domain")]
    Usage {},
    #[command(about = "Show per-day domain shares for the last 7 days")]
    Weekly {},
}

#[derive(Subcommand, Debug)]
enum LimitsCommand {
    #[command(about = "Add a budget, replacing any existing entry for the same domain")]
    Add {
        #[arg(help = "Exact host or wildcard pattern like *.youtube.com")]
        domain: String,
        #[arg(help = "Budget in minutes")]
        minutes: u64,
    },
    #[command(about = "Remove a budget")]
    Remove { domain: String },
    #[command(about = "Enable or disable a budget without deleting it")]
    Toggle { domain: String },
    #[command(about = "Change a budget's minutes without touching its enabled state")]
    Set { domain: String, minutes: u64 },
    #[command(about = "List configured budgets in matching order")]
    List {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        Some(LevelFilter::WARN)
    };
    let prefix = match args.commands {
        Commands::Watch { .. } => AGENT_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir, logging_level, args.log)?;

    let store = Arc::new(JsonFileStore::new(&app_dir)?);

    match args.commands {
        Commands::Watch { domain } => {
            println!("Watching {domain}, Ctrl-C to stop");
            let dismissals = spawn_dismiss_listener();
            run_agent(
                store,
                Box::new(FixedPage::new(&domain)),
                TerminalPresenter::new(),
                dismissals,
            )
            .await
        }
        Commands::Limits { command } => {
            let controller = TimeConfigController::new(store);
            process_limits_command(&controller, command).await
        }
        Commands::Usage {} => {
            let records = RecordStore::new(store.clone(), Arc::new(DefaultClock))
                .load_records()
                .await;
            let config = TimeConfigController::new(store).load().await;
            report::print_usage(&records, &config, Local::now());
            Ok(())
        }
        Commands::Weekly {} => {
            let records = RecordStore::new(store, Arc::new(DefaultClock))
                .load_records()
                .await;
            report::print_weekly(&records, Local::now());
            Ok(())
        }
    }
}

async fn process_limits_command<S: KeyValueStore>(
    controller: &TimeConfigController<S>,
    command: LimitsCommand,
) -> Result<()> {
    let config = controller.load().await;

    match command {
        LimitsCommand::Add { domain, minutes } => {
            let updated = controller.add_domain_config(config, &domain, minutes).await;
            if updated.domain_configs.iter().any(|dc| dc.domain == domain.trim()) {
                println!("Budget for {} set to {minutes} minutes", domain.trim());
            }
        }
        LimitsCommand::Remove { domain } => {
            controller.remove_domain_config(config, &domain).await;
            println!("Budget for {domain} removed");
        }
        LimitsCommand::Toggle { domain } => {
            let updated = controller.toggle_domain_config(config, &domain).await;
            match updated.domain_configs.iter().find(|dc| dc.domain == domain) {
                Some(dc) if dc.enabled => println!("Budget for {domain} enabled"),
                Some(_) => println!("Budget for {domain} disabled"),
                None => println!("No budget configured for {domain}"),
            }
        }
        LimitsCommand::Set { domain, minutes } => {
            controller.update_domain_time_limit(config, &domain, minutes).await;
            println!("Budget for {domain} set to {minutes} minutes");
        }
        LimitsCommand::List {} => {
            report::print_limits(&config);
        }
    }

    Ok(())
}
