//! Prometheus metrics for the mirror worker.
//!
//! Only the `metrics` facade is used here; installing an exporter is left to
//! the embedding binary.
//!
//! ## Metrics recorded
//!
//! ### Gauges
//! - `chain_mirror_head_block`: Latest block number reported by the node
//! - `chain_mirror_backfill_missing`: Blocks missing at the start of the last backfill pass
//!
//! ### Counters
//! - `chain_mirror_blocks_synced_total`
//! - `chain_mirror_block_failures_total`
//! - `chain_mirror_transactions_synced_total`
//! - `chain_mirror_transaction_failures_total`
//! - `chain_mirror_reconnects_total`
//! - `chain_mirror_artifacts_resolved_total`
//! - `chain_mirror_artifact_failures_total`

#![allow(clippy::cast_precision_loss)]

use metrics::{
    counter,
    gauge,
};

pub fn record_head(block_number: u64) {
    gauge!("chain_mirror_head_block").set(block_number as f64);
}

pub fn record_backfill(missing: usize) {
    gauge!("chain_mirror_backfill_missing").set(missing as f64);
}

pub fn record_block_synced() {
    counter!("chain_mirror_blocks_synced_total").increment(1);
}

pub fn record_block_failure() {
    counter!("chain_mirror_block_failures_total").increment(1);
}

pub fn record_transaction_synced() {
    counter!("chain_mirror_transactions_synced_total").increment(1);
}

pub fn record_transaction_failure() {
    counter!("chain_mirror_transaction_failures_total").increment(1);
}

pub fn record_reconnect() {
    counter!("chain_mirror_reconnects_total").increment(1);
}

pub fn record_artifact_resolved() {
    counter!("chain_mirror_artifacts_resolved_total").increment(1);
}

pub fn record_artifact_failure() {
    counter!("chain_mirror_artifact_failures_total").increment(1);
}
