use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use solana_sdk::signature::Signature;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::{Config, SignatureSource};
use crate::dlmm::{classify_transaction, DlmmApiClient, MeteoraTransaction};
use crate::models::{Position, PositionOutcome, Submission};
use crate::position::{PositionReconstructor, RpcTransactionHistory};
use crate::pricing::{HttpPriceOracle, UsdValuationEngine};
use crate::report::{self, ReportRow};
use crate::solana;
use crate::throttle::TaskRunner;

/// Counters reported at the end of a run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub total_rows: usize,
    pub valid_signatures: usize,
    pub positions_found: usize,
    pub valid_submissions: usize,
    pub api_errors: usize,
}

/// Execute one full audit run: load submissions, resolve positions,
/// reconstruct and value them, evaluate, and write the report.
///
/// After startup checks pass, no failure aborts the run; every input row
/// reaches the output with its quality flags set.
pub async fn run(config: Config) -> Result<RunSummary> {
    let (headers, mut submissions) = load_submissions(&config)?;
    let mut summary = RunSummary {
        total_rows: submissions.len(),
        ..Default::default()
    };
    summary.valid_signatures = submissions
        .iter()
        .filter(|s| s.cleansed_signature.is_some())
        .count();
    info!(
        "Loaded {} submission(s), {} with usable signatures",
        summary.total_rows, summary.valid_signatures
    );

    let client = Arc::new(solana::create_client_from_config(&config));
    let runner = TaskRunner::new(config.throttle_limit);

    // Verify the RPC endpoint before doing any real work.
    match client.get_slot().await {
        Ok(slot) => info!("Current Solana slot: {} - RPC connection established", slot),
        Err(e) => {
            error!("Failed to connect to Solana RPC: {}", e);
            return Err(anyhow!("Could not establish Solana RPC connection"));
        }
    }

    let api = Arc::new(DlmmApiClient::new(
        &config.dlmm_api_url,
        &config.token_api_url,
    ));
    let registry = Arc::new(api.list_pairs().await?);
    let tokens = Arc::new(api.list_tokens().await?);

    // Fetch the submitted transactions and classify them into position
    // addresses.
    let mut signatures: Vec<Signature> = Vec::new();
    let mut seen_signatures: HashSet<String> = HashSet::new();
    for submission in &submissions {
        if let Some(signature) = &submission.cleansed_signature {
            if seen_signatures.insert(signature.clone()) {
                if let Ok(parsed) = Signature::from_str(signature) {
                    signatures.push(parsed);
                }
            }
        }
    }

    let fetched = solana::get_parsed_transactions(client.clone(), &runner, &signatures).await;
    info!(
        "Read {} initial transactions, getting position addresses...",
        fetched.iter().filter(|(_, r)| matches!(r, Ok(Some(_)))).count()
    );

    let mut meteora_transactions: Vec<MeteoraTransaction> = Vec::new();
    for (_, result) in &fetched {
        if let Ok(Some(tx)) = result {
            let classification = classify_transaction(tx, &registry);
            for integrity_error in &classification.errors {
                error!("Data integrity error: {}", integrity_error);
            }
            meteora_transactions.extend(classification.positions);
        }
    }

    let by_signature: HashMap<&str, &MeteoraTransaction> = meteora_transactions
        .iter()
        .map(|tx| (tx.signature.as_str(), tx))
        .collect();
    for submission in &mut submissions {
        if let Some(signature) = &submission.cleansed_signature {
            if let Some(meteora_tx) = by_signature.get(signature.as_str()) {
                submission.position = Some(meteora_tx.position.clone());
            }
        }
    }

    let hawksight_positions: HashSet<&str> = meteora_transactions
        .iter()
        .filter(|tx| tx.is_hawksight)
        .map(|tx| tx.position.as_str())
        .collect();

    // Reconstruct each distinct position once; rows referencing the same
    // position share the result.
    let mut addresses: Vec<String> = Vec::new();
    let mut seen_addresses: HashSet<&str> = HashSet::new();
    for submission in &submissions {
        if let Some(address) = &submission.position {
            if seen_addresses.insert(address.as_str()) {
                addresses.push(address.clone());
            }
        }
    }
    summary.positions_found = addresses.len();
    info!(
        "Obtained {} position address(es) from {} transaction(s). Getting all P&Ls...",
        addresses.len(),
        signatures.len()
    );

    let reconstructor = Arc::new(PositionReconstructor::new(registry.clone(), tokens.clone()));
    let history = Arc::new(RpcTransactionHistory::new(client.clone(), registry.clone()));
    let completed = Arc::new(AtomicUsize::new(0));
    let total_positions = addresses.len();

    let tasks: Vec<_> = addresses
        .iter()
        .map(|address| {
            let address = address.clone();
            let reconstructor = reconstructor.clone();
            let history = history.clone();
            let api = api.clone();
            let completed = completed.clone();
            async move {
                let position = reconstructor
                    .reconstruct(&address, history.as_ref(), api.as_ref())
                    .await;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                info!("Obtained P&L for {} of {} positions.", done, total_positions);
                position
            }
        })
        .collect();
    let mut positions: Vec<Position> = runner.run(tasks).await;

    for position in &mut positions {
        if hawksight_positions.contains(position.address.as_str()) {
            position.is_hawksight = true;
        }
    }

    // USD overlay for the whole batch in one pass so quote lookups
    // deduplicate across positions.
    let oracle = Arc::new(HttpPriceOracle::new(
        &config.price_api_url,
        config.price_api_key.clone(),
    ));
    let engine = UsdValuationEngine::new(oracle, runner.clone());
    let report_timestamp_ms = Utc::now().timestamp_millis();
    let positions = engine
        .value_positions(positions, report_timestamp_ms)
        .await;

    let positions_by_address: HashMap<&str, &Position> = positions
        .iter()
        .map(|position| (position.address.as_str(), position))
        .collect();

    // Evaluate and assemble one output row per input row.
    let thresholds = config.thresholds();
    let outcomes: Vec<PositionOutcome> = submissions
        .iter()
        .map(|submission| {
            submission
                .position
                .as_deref()
                .and_then(|address| positions_by_address.get(address))
                .map(|position| PositionOutcome::from_position((*position).clone()))
                .unwrap_or(PositionOutcome::NotFound)
        })
        .collect();

    let rows: Vec<ReportRow> = submissions
        .iter()
        .zip(&outcomes)
        .map(|(submission, outcome)| {
            let verdict = outcome.position().map(|position| {
                report::evaluate(position, submission.cleansed_wallet.as_deref(), &thresholds)
            });
            ReportRow {
                submission,
                outcome,
                verdict,
            }
        })
        .collect();

    summary.valid_submissions = rows
        .iter()
        .filter(|row| row.verdict.map(|v| v.valid_submission).unwrap_or(false))
        .count();
    summary.api_errors = positions.iter().filter(|p| p.has_api_error).count();

    let out_file = File::create(&config.out_file)
        .with_context(|| format!("Failed to create output file {}", config.out_file))?;
    report::write_report(out_file, &headers, &rows)
        .with_context(|| format!("Failed to write report to {}", config.out_file))?;
    info!("Report written to {}", config.out_file);

    Ok(summary)
}

/// Load the input CSV and resolve the signature/wallet columns.
///
/// A missing file, a missing signature column, or a configured wallet
/// column that does not exist are fatal: they abort the run before any
/// processing.
fn load_submissions(config: &Config) -> Result<(Vec<String>, Vec<Submission>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&config.data_file)
        .with_context(|| format!("Failed to open input file {}", config.data_file))?;

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read input header row")?
        .iter()
        .map(String::from)
        .collect();

    let signature_column = match &config.signature_source {
        SignatureSource::ByLabel(label) => headers
            .iter()
            .position(|header| header == label)
            .ok_or_else(|| {
                anyhow!("Column labeled \"{}\" was not found in input data", label)
            })?,
        SignatureSource::ByIndex(index) => {
            if *index >= headers.len() {
                return Err(anyhow!(
                    "Signature column index {} is out of range ({} columns)",
                    index,
                    headers.len()
                ));
            }
            *index
        }
    };

    let wallet_column = match &config.wallet_column_label {
        Some(label) => Some(headers.iter().position(|header| header == label).ok_or_else(
            || anyhow!("Column labeled \"{}\" was not found in input data", label),
        )?),
        None => None,
    };

    let mut submissions = Vec::new();
    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                let cells: Vec<String> = record.iter().map(String::from).collect();
                submissions.push(Submission::from_row(
                    index,
                    cells,
                    signature_column,
                    wallet_column,
                ));
            }
            Err(e) => {
                warn!("Skipping unreadable input row {}: {}", index + 2, e);
            }
        }
    }

    Ok((headers, submissions))
}
