//! Bounded-concurrency batch executor
//!
//! Pipeline: CSV reader → binder stage → bounded work channel (capacity T) →
//! T workers → bounded result channel → collector. The producer owns the
//! sole work-channel sender and drops it only once its input is exhausted;
//! workers drain until the channel reports closed; the collector terminates
//! when every worker's result sender is gone. Result ordering follows worker
//! completion, never input order.
//!
//! Rows whose binding or API call fails terminally are logged against their
//! context key and dropped; the absence of a result record is the signal.
//! Workers observe a fixed pacing delay between iterations to soften
//! rate-limit pressure; the delay is per worker, not a global throttle.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::bind::{self, ValueMap};
use crate::error::{Error, Result};
use crate::flags::{Catalog, Verb};
use crate::output::{self, OutputConfig, StreamEncoder};
use crate::retry::{Retrier, RetryConfig};

/// One row's worth of work: resolved values plus the error-context key
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub values: ValueMap,
    pub context: String,
}

/// The caller-supplied operation a worker applies to each unit
///
/// Takes the resolved values and returns the API result record. Delete-style
/// operations return their composite `{identifying fields, success}` value.
pub type BatchOp =
    Arc<dyn Fn(ValueMap) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Executor tuning, resolved once per invocation
pub struct BatchConfig {
    /// Worker count; also the capacity of both channels
    pub threads: usize,
    /// Per-worker delay between successive units
    pub pacing: Duration,
    /// Backoff policy handed to each worker's retrier
    pub retry: RetryConfig,
}

/// Where completed result records go
pub enum ResultSink {
    /// Accumulate everything, emit one top-level array at end-of-input
    Buffered(OutputConfig),
    /// Encode each record as it arrives
    Streaming(Arc<StreamEncoder>),
}

/// Creates the bounded work channel shared by batch and recursive mode
pub fn unit_channel(threads: usize) -> (Sender<WorkUnit>, Receiver<WorkUnit>) {
    mpsc::channel(threads.max(1))
}

/// Runs a CSV batch end to end
///
/// The first row is the header; each subsequent row binds to a work unit.
/// Rows that fail binding are logged by row number and skipped; processing
/// continues. Returns the number of result records produced.
pub async fn run_csv_batch(
    path: &Path,
    delimiter: u8,
    catalog: &'static Catalog,
    verb: Verb,
    cfg: BatchConfig,
    op: BatchOp,
    sink: ResultSink,
) -> Result<usize> {
    let (tx, rx) = unit_channel(cfg.threads);
    let path = path.to_path_buf();

    // Reader + binder stage. CSV parsing is blocking I/O, so it runs on the
    // blocking pool and feeds the bounded channel with backpressure via
    // blocking_send. The sender is dropped when the file is exhausted.
    let producer = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;

        let mut records = reader.records();
        let header_record = match records.next() {
            Some(first) => first?,
            None => {
                return Err(Error::InvalidInvocation(format!(
                    "CSV file {} is empty",
                    path.display()
                )))
            }
        };
        let header = bind::parse_header(catalog, verb, &header_record)?;

        let mut row_number = 1usize;
        for record in records {
            row_number += 1;
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    error!("row {}: unreadable record: {}", row_number, e);
                    continue;
                }
            };
            match bind::bind_csv_row(catalog, verb, &header, &record) {
                Ok(values) => {
                    let context = bind::context_key(catalog, verb, &values);
                    let unit = WorkUnit { values, context };
                    if tx.blocking_send(unit).is_err() {
                        // Workers are gone; nothing left to feed.
                        break;
                    }
                }
                Err(e) => {
                    error!("row {}: {}", row_number, e);
                }
            }
        }
        Ok(())
    });

    let produced = run_units(rx, cfg, op, sink).await?;

    match producer.await {
        Ok(result) => result?,
        Err(e) => return Err(Error::InvalidInvocation(format!("reader stage failed: {}", e))),
    }

    Ok(produced)
}

/// Drives a work-unit channel through T workers into the sink
///
/// This is the shared back half of batch and recursive mode: the caller owns
/// whatever produces units. Returns the number of result records emitted.
pub async fn run_units(
    rx: Receiver<WorkUnit>,
    cfg: BatchConfig,
    op: BatchOp,
    sink: ResultSink,
) -> Result<usize> {
    let threads = cfg.threads.max(1);
    let (result_tx, mut result_rx) = mpsc::channel::<Value>(threads);
    let rx = Arc::new(Mutex::new(rx));
    let retry = Arc::new(cfg.retry);

    let mut workers = Vec::with_capacity(threads);
    for worker_id in 0..threads {
        let rx = Arc::clone(&rx);
        let result_tx = result_tx.clone();
        let op = Arc::clone(&op);
        let retry = Arc::clone(&retry);
        let pacing = cfg.pacing;

        workers.push(tokio::spawn(async move {
            loop {
                let unit = {
                    let mut guard = rx.lock().await;
                    guard.recv().await
                };
                let Some(WorkUnit { values, context }) = unit else { break };

                debug!("worker {} processing {}", worker_id, context);
                let retrier = Retrier::new(retry.as_ref(), &context);
                let outcome = retrier.run(|| op(values.clone())).await;

                match outcome {
                    Ok(record) => {
                        if result_tx.send(record).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("{} {}", context, e);
                    }
                }

                sleep(pacing).await;
            }
        }));
    }
    // The collector must see the channel close once all workers return.
    drop(result_tx);

    let mut count = 0usize;
    match &sink {
        ResultSink::Buffered(out_cfg) => {
            let mut collected: Vec<Value> = Vec::new();
            while let Some(record) = result_rx.recv().await {
                collected.push(record);
            }
            count = collected.len();
            output::write_value(out_cfg, &collected)?;
        }
        ResultSink::Streaming(encoder) => {
            while let Some(record) = result_rx.recv().await {
                encoder.emit(&record)?;
                count += 1;
            }
        }
    }

    for worker in workers {
        worker
            .await
            .map_err(|e| Error::InvalidInvocation(format!("worker panicked: {}", e)))?;
    }

    info!("batch complete, {} result record(s)", count);
    Ok(count)
}
