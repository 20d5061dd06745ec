//! Ledger maintenance CLI
//!
//! Offline integrity verification, export and signing-key generation for a
//! diagnostic ledger database.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use diagnostic_ledger::audit::AuditEntry;
use diagnostic_ledger::compliance::ThresholdPolicy;
use diagnostic_ledger::crypto::signer::write_secret_key;
use diagnostic_ledger::crypto::{LocalKeySigner, SignatureManager};
use diagnostic_ledger::ledger::DiagnosticRecord;
use diagnostic_ledger::LedgerService;

#[derive(Parser)]
#[command(name = "ledger-tool")]
#[command(about = "Diagnostic Ledger maintenance tool")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database URL
    #[arg(long, default_value = "sqlite://diagnostic-ledger.db")]
    database_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-verify every record signature and the audit hash chain
    Verify {
        /// Print every record checked
        #[arg(short, long)]
        verbose: bool,
    },

    /// Export records and the audit trail as JSON
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a new signing key
    Keygen {
        /// Where to write the hex-encoded secret key
        #[arg(short, long, default_value = "ledger-signing.key")]
        output: PathBuf,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize, Deserialize)]
struct LedgerExport {
    records: Vec<DiagnosticRecord>,
    audit_trail: Vec<AuditEntry>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diagnostic_ledger=warn,ledger_tool=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Verify { verbose } => {
            if let Err(e) = verify(&cli.database_url, verbose).await {
                error!("Ledger verification failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Export { output } => export(&cli.database_url, output).await?,
        Commands::Keygen { output, force } => keygen(output, force)?,
    }

    Ok(())
}

/// Verification only reads stored signatures and keys, so the service is
/// wired with a throwaway signer.
async fn open_service(database_url: &str) -> Result<LedgerService> {
    let oracle = Arc::new(LocalKeySigner::generate("ledger-tool"));
    let service = LedgerService::open(database_url, oracle, Arc::new(ThresholdPolicy::default()))
        .await
        .with_context(|| format!("Failed to open ledger at {}", database_url))?;
    Ok(service)
}

async fn verify(database_url: &str, verbose: bool) -> Result<()> {
    let service = open_service(database_url).await?;
    info!("Verifying ledger at {}", database_url);

    let report = service.verify_integrity().await?;

    if verbose {
        for record in service.list_records().await? {
            let status = if report.invalid_signatures.contains(&record.id) {
                "INVALID"
            } else {
                "ok"
            };
            println!("{:>8}  {}", status, record.summary());
        }
    }

    println!("Records checked:     {}", report.records_checked);
    println!("Audit entries:       {}", report.audit_chain.entry_count);

    for id in &report.invalid_signatures {
        println!("✗ Diagnosis {} has an invalid signature", id);
    }
    for id in &report.unaudited_records {
        println!("✗ Diagnosis {} has no creation audit entry", id);
    }
    if let Some(message) = &report.audit_chain.error_message {
        println!("✗ Audit chain: {}", message);
    }

    service.database().close().await;

    if !report.is_intact() {
        return Err(anyhow!(
            "{} invalid signatures, {} unaudited records, audit chain {}",
            report.invalid_signatures.len(),
            report.unaudited_records.len(),
            if report.audit_chain.is_valid() { "valid" } else { "broken" }
        ));
    }

    println!("✓ Ledger integrity verified");
    Ok(())
}

async fn export(database_url: &str, output: Option<PathBuf>) -> Result<()> {
    let service = open_service(database_url).await?;

    let export = LedgerExport {
        records: service.list_records().await?,
        audit_trail: service.list_audit_trail().await?,
    };
    service.database().close().await;

    let json = serde_json::to_string_pretty(&export)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                "Exported {} records and {} audit entries to {}",
                export.records.len(),
                export.audit_trail.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn keygen(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(anyhow!(
            "{} already exists, pass --force to overwrite",
            output.display()
        ));
    }

    let manager = SignatureManager::new();
    let secret_key = manager.generate_secret_key();
    write_secret_key(&output, &secret_key)?;

    let public_key = manager.public_key_from_secret(&secret_key);
    info!("Wrote signing key to {}", output.display());
    println!("{}", hex::encode(public_key.serialize()));

    Ok(())
}
