//! Batch analysis over a fixed worker pool.
//!
//! Maps are pushed onto an mpsc work queue; each worker pulls the next map,
//! analyzes it and sends the outcome back. Maps are independent, so a map
//! that fails to decode only affects its own outcome.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use std::thread;

use crate::error::Result;
use crate::pipeline::{Analyzer, MapAnalysis};

/// One encoded map waiting for analysis.
#[derive(Debug, Clone)]
pub struct MapInput {
    /// Map name (file stem), used in reports and errors
    pub name: String,
    pub bytes: Vec<u8>,
}

impl MapInput {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Result for one input map.
pub struct MapOutcome {
    pub name: String,
    pub result: Result<MapAnalysis>,
}

/// Queue entry: position in the input list plus the map itself.
type WorkItem = (usize, MapInput);

/// Creates a new work queue.
///
/// The channel is unbounded; all inputs are queued up front.
fn create_work_queue() -> (Sender<WorkItem>, Receiver<WorkItem>) {
    channel()
}

/// Analyzes every map and returns one outcome per input, in input order.
///
/// `workers` is clamped to at least one and at most the number of maps.
pub fn run_batch(analyzer: &Analyzer, inputs: Vec<MapInput>, workers: usize) -> Vec<MapOutcome> {
    let total = inputs.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = workers.clamp(1, total);
    log::info!("Analyzing {} maps with {} workers", total, workers);

    let (work_sender, work_receiver) = create_work_queue();
    for item in inputs.into_iter().enumerate() {
        // The receiver is alive until the end of this function
        let _ = work_sender.send(item);
    }
    drop(work_sender);

    let work_receiver = Mutex::new(work_receiver);
    let (result_sender, result_receiver) = channel::<(usize, MapOutcome)>();

    thread::scope(|s| {
        for worker_id in 0..workers {
            let results = result_sender.clone();
            let queue = &work_receiver;
            s.spawn(move || run_worker(worker_id, queue, results, analyzer));
        }
    });
    drop(result_sender);

    let mut outcomes: Vec<(usize, MapOutcome)> = result_receiver.into_iter().collect();
    outcomes.sort_by_key(|(index, _)| *index);

    let failed = outcomes.iter().filter(|(_, o)| o.result.is_err()).count();
    log::info!("Batch finished: {} ok, {} failed", total - failed, failed);

    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Runs the worker loop until the queue is drained.
fn run_worker(
    worker_id: usize,
    queue: &Mutex<Receiver<WorkItem>>,
    results: Sender<(usize, MapOutcome)>,
    analyzer: &Analyzer,
) {
    log::debug!("Worker {} started", worker_id);

    loop {
        // Hold the lock only while taking the next item
        let next = match queue.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => break,
        };
        let Ok((index, input)) = next else {
            // Channel closed and empty
            break;
        };

        log::debug!("Worker {}: analyzing {}", worker_id, input.name);
        let result = analyzer.analyze_bytes(&input.name, &input.bytes);
        if let Err(e) = &result {
            log::warn!("Worker {}: {}", worker_id, e);
        }

        let outcome = MapOutcome {
            name: input.name,
            result,
        };
        if results.send((index, outcome)).is_err() {
            break;
        }
    }

    log::debug!("Worker {} finished", worker_id);
}
