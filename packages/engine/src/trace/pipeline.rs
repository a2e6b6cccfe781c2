// packages/engine/src/trace/pipeline.rs
//! Producer/consumer pipeline
//!
//! Producers insert through a [`Tracer`]; a dedicated `simtrace-writer`
//! thread drains the queue and drives the backend through a [`Dispatcher`].
//! Entries inserted before [`Pipeline::start`] wait in the queue and form
//! the first batch.

use crate::backend::TraceBackend;
use crate::trace::context::Tracer;
use crate::trace::dispatcher::{DispatchStats, Dispatcher};
use crate::trace::entry::{self, Entry};
use crate::trace::meta::MetaInfo;
use crate::trace::queue::{EventQueue, QueueStats};
use crate::trace::sampling::SamplingGate;
use crate::utils::errors::{EngineError, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Name of the consumer thread
pub const WRITER_THREAD_NAME: &str = "simtrace-writer";

/// Summary returned by [`Pipeline::stop`]
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub backend: &'static str,
    pub dispatch: DispatchStats,
    pub queue: QueueStats,
}

/// Trace pipeline owning the queue and the writer thread
pub struct Pipeline {
    queue: Arc<EventQueue>,
    gate: SamplingGate,
    backend_name: &'static str,

    /// Present until the writer thread takes it
    dispatcher: Option<Dispatcher>,

    worker: Option<JoinHandle<DispatchStats>>,

    /// Totals of a writer that already exited
    finished: Option<DispatchStats>,
}

impl Pipeline {
    /// Create a stopped pipeline around `backend`
    pub fn new(backend: Box<dyn TraceBackend>, gate: SamplingGate) -> Self {
        let backend_name = backend.name();
        Self {
            queue: Arc::new(EventQueue::new()),
            dispatcher: Some(Dispatcher::new(backend, gate.clone())),
            gate,
            backend_name,
            worker: None,
            finished: None,
        }
    }

    /// Producer handle
    pub fn tracer(&self) -> Tracer {
        Tracer::new(Arc::clone(&self.queue))
    }

    pub fn gate(&self) -> &SamplingGate {
        &self.gate
    }

    pub fn insert(&self, entry: Entry) {
        self.queue.insert(entry);
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Spawn the writer thread. `meta` is written before the first batch.
    pub fn start(&mut self, meta: MetaInfo) -> Result<()> {
        let dispatcher = self.dispatcher.take().ok_or_else(|| {
            EngineError::RecordingFailed("Pipeline already started".to_string())
        })?;

        info!(
            "Starting {} with {} backend ({} entries buffered)",
            WRITER_THREAD_NAME,
            self.backend_name,
            self.queue.len()
        );

        // real_time stamps count from here at the latest
        entry::real_time_epoch();

        let queue = Arc::clone(&self.queue);
        let handle = thread::Builder::new()
            .name(WRITER_THREAD_NAME.to_string())
            .spawn(move || run_writer(queue, dispatcher, meta))?;

        self.worker = Some(handle);
        Ok(())
    }

    /// Request shutdown, wait for the final drain and return the totals.
    pub fn stop(&mut self) -> Result<WorkerReport> {
        self.queue.shutdown();

        let dispatch = if let Some(handle) = self.worker.take() {
            let stats = handle.join().map_err(|_| {
                EngineError::RecordingFailed(format!("{} panicked", WRITER_THREAD_NAME))
            })?;
            self.finished = Some(stats.clone());
            stats
        } else if let Some(stats) = &self.finished {
            debug!("Pipeline already stopped");
            stats.clone()
        } else {
            let pending = self.queue.len();
            if pending > 0 {
                warn!("Pipeline stopped before start, discarding {} entries", pending);
            }
            DispatchStats::default()
        };

        let report = WorkerReport {
            backend: self.backend_name,
            dispatch,
            queue: self.queue.stats(),
        };
        info!(
            "Pipeline stopped: {} dispatched, {} filtered, {} dropped in {} batches",
            report.dispatch.dispatched,
            report.dispatch.filtered,
            report.dispatch.dropped,
            report.dispatch.batches
        );
        Ok(report)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop() {
                error!("Pipeline shutdown failed: {}", e);
            }
        }
    }
}

fn run_writer(queue: Arc<EventQueue>, mut dispatcher: Dispatcher, meta: MetaInfo) -> DispatchStats {
    if let Err(e) = dispatcher.write_meta(&meta) {
        fatal(e);
    }

    loop {
        let drained = queue.wait_drain();
        if let Err(e) = dispatcher.dispatch_batch(drained.entries) {
            fatal(e);
        }
        if drained.shutdown {
            break;
        }
    }

    if let Err(e) = dispatcher.finish() {
        fatal(e);
    }

    dispatcher.stats().clone()
}

/// A trace store that cannot be written ends the run
fn fatal(e: EngineError) -> ! {
    error!("Trace backend failed: {}", e);
    eprintln!("simtrace: fatal backend error: {}", e);
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, Record};
    use std::time::{Duration, Instant};

    fn meta() -> MetaInfo {
        MetaInfo::capture(Some("test"))
    }

    fn port(id: u64) -> Entry {
        Entry::PortCreated {
            id,
            name: format!("p{}", id),
        }
    }

    #[test]
    fn test_buffered_before_start() {
        let backend = MemoryBackend::new();
        let mut pipeline = Pipeline::new(Box::new(backend.clone()), SamplingGate::default());

        pipeline.insert(port(1));
        pipeline.insert(port(2));
        pipeline.start(meta()).unwrap();

        let report = pipeline.stop().unwrap();
        assert_eq!(report.dispatch.dispatched, 2);
        assert_eq!(report.backend, "memory");

        let records = backend.records();
        assert!(matches!(records.first(), Some(Record::Meta(_))));
        assert_eq!(records.last(), Some(&Record::Finish));
        assert_eq!(backend.entries(), vec![port(1), port(2)]);
    }

    #[test]
    fn test_start_twice_fails() {
        let mut pipeline = Pipeline::new(Box::new(MemoryBackend::new()), SamplingGate::default());
        pipeline.start(meta()).unwrap();
        assert!(matches!(
            pipeline.start(meta()),
            Err(EngineError::RecordingFailed(_))
        ));
        pipeline.stop().unwrap();
    }

    #[test]
    fn test_stop_flushes_pending() {
        let backend = MemoryBackend::new();
        let mut pipeline = Pipeline::new(Box::new(backend.clone()), SamplingGate::default());
        pipeline.start(meta()).unwrap();

        let tracer = pipeline.tracer();
        for id in 0..100 {
            tracer.insert(port(id));
        }
        thread::sleep(Duration::from_millis(5));
        for id in 100..200 {
            tracer.insert(port(id));
        }

        let report = pipeline.stop().unwrap();
        assert_eq!(report.dispatch.dispatched, 200);
        assert_eq!(report.queue.insert_count, 200);
        assert_eq!(backend.entries().len(), 200);
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_second_stop_reports_same_totals() {
        let mut pipeline = Pipeline::new(Box::new(MemoryBackend::new()), SamplingGate::default());
        pipeline.start(meta()).unwrap();
        pipeline.insert(port(1));

        let first = pipeline.stop().unwrap();
        let second = pipeline.stop().unwrap();
        assert_eq!(first.dispatch.dispatched, 1);
        assert_eq!(second.dispatch, first.dispatch);
    }

    #[test]
    fn test_start_fixes_real_time_epoch() {
        let mut pipeline = Pipeline::new(Box::new(MemoryBackend::new()), SamplingGate::default());
        pipeline.start(meta()).unwrap();
        let started = Instant::now();

        let epoch = entry::real_time_epoch();
        assert!(epoch <= started);
        // stamps are measured from that same origin
        let stamp = entry::real_time_stamp();
        assert!(u128::from(stamp) <= epoch.elapsed().as_nanos());
        pipeline.stop().unwrap();
    }

    #[test]
    fn test_stop_without_start() {
        let mut pipeline = Pipeline::new(Box::new(MemoryBackend::new()), SamplingGate::default());
        pipeline.insert(port(1));
        let report = pipeline.stop().unwrap();
        assert_eq!(report.dispatch, DispatchStats::default());
    }

    #[test]
    fn test_drop_stops_worker() {
        let backend = MemoryBackend::new();
        {
            let mut pipeline =
                Pipeline::new(Box::new(backend.clone()), SamplingGate::default());
            pipeline.start(meta()).unwrap();
            pipeline.insert(port(7));
        }
        assert_eq!(backend.entries(), vec![port(7)]);
        assert_eq!(backend.records().last(), Some(&Record::Finish));
    }
}
