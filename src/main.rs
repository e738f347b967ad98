mod augment;
mod cli;
mod config;
mod error;
mod filter;
mod model;
mod naming;
mod output;
mod parsers;
mod provision;
mod result;
mod signature;
mod source;
mod transport;

use std::io::{self, Write};
use std::process;

use anyhow::Result;
use clap::Parser;
use colored::control;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use config::Settings;
use error::ProvisionError;
use output::OutputFormat;
use provision::Provisioner;
use result::RunReport;
use transport::dry_run::DryRunConnectionManager;
use transport::soap::SoapConnectionManager;

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        control::set_override(false);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(io::stderr),
        )
        .init();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    };

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Terminal
    };

    let mut report = RunReport::new(cli.mode, &settings.metadata, cli.dry_run);
    let outcome = run(&cli, &settings, &mut report);
    if let Err(ref e) = outcome {
        report.error = Some(format!("{:#}", e));
    }

    output::print_report(&report, format);

    if let Err(e) = outcome {
        eprintln!("Error: {:#}", e);
        process::exit(exit_code(&e));
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = config::locate(cli.config.as_deref())?;
    debug!(path = %path.display(), "loading settings");
    let mut settings = config::load(&path)?;

    if let Some(ref metadata) = cli.metadata {
        settings.metadata = metadata.clone();
    }
    if let Some(ref certificate) = cli.certificate {
        settings.certificate = Some(certificate.clone());
    }
    if cli.no_verify {
        settings.certificate = None;
    }
    Ok(settings)
}

fn run(cli: &Cli, settings: &Settings, report: &mut RunReport) -> Result<()> {
    let anchor = match settings.certificate {
        Some(ref path) => Some(parsers::certificate::load_trust_anchor(path)?),
        None => {
            warn!("no certificate configured; the metadata signature will not be verified");
            None
        }
    };

    let bytes = source::load(&settings.metadata)?;
    let mut document = parsers::metadata::parse_bytes(&bytes)?;
    if !signature::verify(&mut document, anchor.as_ref()) {
        return Err(ProvisionError::Verification.into());
    }

    let entities = parsers::metadata::entities(&document)?;
    info!(count = entities.len(), mode = %cli.mode, "processing entities");

    if cli.dry_run {
        // keep stdout parseable when it carries the JSON report
        let out: Box<dyn Write> = if cli.json {
            Box::new(io::stderr())
        } else {
            Box::new(io::stdout())
        };
        let mut provisioner = Provisioner::new(settings, DryRunConnectionManager::new(out));
        let outcome = provisioner.run(cli.mode, &entities, report);
        info!(calls = provisioner.manager().calls().len(), "dry run finished; nothing was sent");
        outcome?;
    } else {
        let manager = SoapConnectionManager::new(&settings.connection_manager);
        Provisioner::new(settings, manager).run(cli.mode, &entities, report)?;
    }
    Ok(())
}

/// `1` for refused runs, `2` for everything that kept the run from starting.
fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<ProvisionError>()
        .map(ProvisionError::exit_code)
        .unwrap_or(2)
}
