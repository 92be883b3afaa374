//! Batch parse/stringify over a rayon pool.
//!
//! Every input is an independent call; results keep input order and carry
//! the error text of failed inputs.

use crate::config::RichTextField;
use crate::types::Root;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// Image URL mapper shared across worker threads.
pub type SharedImageUrl<'a> = &'a (dyn Fn(&str) -> String + Sync);

/// One input of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInput<T> {
    /// Caller-chosen identifier echoed in the result.
    pub id: String,
    /// Text to parse or tree to stringify.
    pub source: T,
}

/// Batch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOptions {
    /// Size of a dedicated thread pool; the global pool when unset.
    #[serde(default)]
    pub max_threads: Option<usize>,
    /// Keep going after a failed input. When false, inputs run in order and
    /// the batch stops at the first failure.
    #[serde(default = "default_continue")]
    pub continue_on_error: bool,
}

fn default_continue() -> bool {
    true
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_threads: None,
            continue_on_error: true,
        }
    }
}

/// Outcome of one input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult<T> {
    /// Identifier of the input.
    pub id: String,
    /// Output on success.
    pub result: Option<T>,
    /// Error message on failure.
    pub error: Option<String>,
}

/// Counters for a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    /// Inputs handed in.
    pub total: u32,
    /// Inputs that converted.
    pub succeeded: u32,
    /// Inputs that failed.
    pub failed: u32,
    /// Wall time of the whole batch.
    pub processing_time_ms: f64,
}

/// Results in input order plus counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutput<T> {
    /// One entry per processed input.
    pub results: Vec<BatchResult<T>>,
    /// Counters.
    pub stats: BatchStats,
}

/// Parses many texts in parallel.
pub fn parse_batch(
    inputs: Vec<BatchInput<String>>,
    field: &RichTextField,
    image_url: SharedImageUrl<'_>,
    options: BatchOptions,
) -> BatchOutput<Root> {
    run(inputs, options, |text: String| crate::parse(&text, field, image_url))
}

/// Stringifies many document trees in parallel.
pub fn stringify_batch(
    inputs: Vec<BatchInput<Root>>,
    field: &RichTextField,
    image_url: SharedImageUrl<'_>,
    options: BatchOptions,
) -> BatchOutput<String> {
    run(inputs, options, |root: Root| crate::stringify(&root, field, image_url))
}

fn run<I, O, F>(inputs: Vec<BatchInput<I>>, options: BatchOptions, job: F) -> BatchOutput<O>
where
    I: Send,
    O: Send,
    F: Fn(I) -> Result<O, richmark_core::RichmarkError> + Sync,
{
    let start = Instant::now();

    let pool = options.max_threads.and_then(|threads| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|err| log::warn!("falling back to the global rayon pool: {err}"))
            .ok()
    });

    let total = u32::try_from(inputs.len()).unwrap_or(u32::MAX);
    let succeeded = AtomicU32::new(0);
    let failed = AtomicU32::new(0);

    let process_input = |input: BatchInput<I>| -> BatchResult<O> {
        match job(input.source) {
            Ok(result) => {
                succeeded.fetch_add(1, Ordering::Relaxed);
                BatchResult {
                    id: input.id,
                    result: Some(result),
                    error: None,
                }
            }
            Err(e) => {
                failed.fetch_add(1, Ordering::Relaxed);
                log::debug!("batch input `{}` failed: {e}", input.id);
                BatchResult {
                    id: input.id,
                    result: None,
                    error: Some(e.to_string()),
                }
            }
        }
    };

    let results: Vec<BatchResult<O>> = if options.continue_on_error {
        match &pool {
            Some(pool) => pool.install(|| inputs.into_par_iter().map(process_input).collect()),
            None => inputs.into_par_iter().map(process_input).collect(),
        }
    } else {
        // Stop on first error, in input order.
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            let result = process_input(input);
            let had_error = result.error.is_some();
            results.push(result);
            if had_error {
                break;
            }
        }
        results
    };

    let elapsed = start.elapsed();
    let stats = BatchStats {
        total,
        succeeded: succeeded.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
        processing_time_ms: elapsed.as_secs_f64() * 1000.0,
    };
    log::debug!(
        "batch of {} finished: {} ok, {} failed in {:.1}ms",
        stats.total,
        stats.succeeded,
        stats.failed,
        stats.processing_time_ms
    );

    BatchOutput { results, stats }
}
