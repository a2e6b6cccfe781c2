// packages/engine/src/trace/sampling.rs
//! Runtime sampling gate
//!
//! High-frequency kinds (scheduling, notification, channel update, cpu idle,
//! call stack, transaction trace) can be switched off while the simulation
//! runs. The gate is a process-wide flag an operator flips with `SIGUSR2`;
//! the consumer reads it through a [`SamplingWindow`], which freezes the
//! decision taken at a span's START until its END so recorded spans are
//! always complete.
//!
//! Races on the flag are benign: a flip only changes what gets sampled,
//! never what a recorded span looks like.

use crate::trace::entry::{Entry, SubjectId};
use crate::utils::errors::{EngineError, Result};
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Categories of START/END spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanCategory {
    /// Process start / yield
    Scheduling,

    /// Channel update start / complete
    ChannelUpdate,

    /// CPU idle enter / leave
    CpuIdle,
}

/// Sampling treatment of an entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// Structural, always recorded
    Always,

    /// Recorded while the window is open
    Window,

    /// Opens a span and freezes the decision for it
    Start(SpanCategory),

    /// Closes a span with the decision frozen at its start
    End(SpanCategory),
}

/// Process-wide on/off flag for high-frequency tracing
#[derive(Debug, Clone)]
pub struct SamplingGate {
    enabled: Arc<AtomicBool>,
}

impl SamplingGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Flip the gate, returning the new state
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::Relaxed)
    }
}

impl SamplingGate {
    /// The gate `SIGUSR2` flips; every handle shares the same flag
    pub fn process() -> Self {
        PROCESS_GATE.clone()
    }

    /// Both handles flip the same flag
    pub fn same_as(&self, other: &SamplingGate) -> bool {
        Arc::ptr_eq(&self.enabled, &other.enabled)
    }
}

impl Default for SamplingGate {
    fn default() -> Self {
        Self::new(true)
    }
}

static PROCESS_GATE: Lazy<SamplingGate> = Lazy::new(SamplingGate::default);

/// Flag flipped by the signal handler; set once by [`install_signal_toggle`]
static SIGNAL_GATE: OnceCell<Arc<AtomicBool>> = OnceCell::new();

#[cfg(unix)]
extern "C" fn handle_sigusr2(_signal: libc::c_int) {
    let Some(flag) = SIGNAL_GATE.get() else {
        return;
    };

    let enabled = !flag.fetch_xor(true, Ordering::Relaxed);
    let msg: &[u8] = if enabled {
        b"simtrace: rt-tracing enabled\n"
    } else {
        b"simtrace: rt-tracing disabled\n"
    };

    // write(2) is async-signal-safe; the result is irrelevant here
    unsafe {
        libc::write(libc::STDERR_FILENO, msg.as_ptr().cast(), msg.len());
    }
}

/// Let `SIGUSR2` flip `gate`.
///
/// Only [`SamplingGate::process`] (or a clone of it) can be bound; any
/// other gate is rejected. Installing again is harmless.
#[cfg(unix)]
pub fn install_signal_toggle(gate: &SamplingGate) -> Result<()> {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    if !gate.same_as(&PROCESS_GATE) {
        return Err(EngineError::ConfigError(
            "SIGUSR2 can only toggle the process-wide sampling gate".to_string(),
        ));
    }
    SIGNAL_GATE.get_or_init(|| Arc::clone(&gate.enabled));

    let action = SigAction::new(
        SigHandler::Handler(handle_sigusr2),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );

    // SAFETY: the handler only touches an atomic and calls write(2)
    unsafe { sigaction(Signal::SIGUSR2, &action) }.map_err(|e| {
        EngineError::ConfigError(format!("Failed to install SIGUSR2 handler: {}", e))
    })?;

    info!("SIGUSR2 toggles runtime sampling (currently {})", gate.is_enabled());
    Ok(())
}

#[cfg(not(unix))]
pub fn install_signal_toggle(gate: &SamplingGate) -> Result<()> {
    if !gate.same_as(&PROCESS_GATE) {
        return Err(EngineError::ConfigError(
            "SIGUSR2 can only toggle the process-wide sampling gate".to_string(),
        ));
    }
    Ok(())
}

/// Consumer-side view of the gate
///
/// Owned by the dispatcher, so it needs no synchronisation of its own.
#[derive(Debug)]
pub struct SamplingWindow {
    gate: SamplingGate,
    open: bool,
    spans: HashMap<(SpanCategory, SubjectId), bool>,
}

impl SamplingWindow {
    pub fn new(gate: SamplingGate) -> Self {
        let open = gate.is_enabled();
        Self {
            gate,
            open,
            spans: HashMap::new(),
        }
    }

    /// Decide whether `entry` is recorded, updating span state
    pub fn admit(&mut self, entry: &Entry) -> bool {
        let Some(kind) = entry.kind() else {
            return false;
        };

        match kind.sampling() {
            Sampling::Always => true,
            Sampling::Window => {
                // outside every span the window follows the gate live
                if self.spans.is_empty() {
                    self.open = self.gate.is_enabled();
                }
                self.open
            }
            Sampling::Start(category) => {
                let decision = self.gate.is_enabled();
                self.spans.insert((category, entry.subject_id()), decision);
                self.open = decision;
                decision
            }
            Sampling::End(category) => {
                let decision = self
                    .spans
                    .remove(&(category, entry.subject_id()))
                    .unwrap_or(self.open);
                // frozen until the last open span ends
                if self.spans.is_empty() {
                    self.open = self.gate.is_enabled();
                }
                decision
            }
        }
    }

    /// Spans started but not yet ended
    pub fn open_spans(&self) -> usize {
        self.spans.len()
    }

    pub fn gate(&self) -> &SamplingGate {
        &self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(id: SubjectId) -> Entry {
        Entry::ProcessStart {
            id,
            real_time: 0,
            sim_time: 0,
        }
    }

    fn yield_(id: SubjectId) -> Entry {
        Entry::ProcessYield {
            id,
            real_time: 1,
            sim_time: 1,
        }
    }

    fn notify(id: SubjectId) -> Entry {
        Entry::EventNotifyDelta {
            id,
            real_time: 0,
            sim_time: 0,
        }
    }

    #[test]
    fn test_gate_toggle() {
        let gate = SamplingGate::default();
        assert!(gate.is_enabled());
        assert!(!gate.toggle());
        assert!(!gate.is_enabled());
        assert!(gate.toggle());

        let clone = gate.clone();
        clone.set_enabled(false);
        assert!(!gate.is_enabled());
    }

    #[test]
    fn test_decision_frozen_at_start() {
        let gate = SamplingGate::new(true);
        let mut window = SamplingWindow::new(gate.clone());

        assert!(window.admit(&start(1)));
        gate.set_enabled(false);
        assert!(window.admit(&yield_(1)));
        assert_eq!(window.open_spans(), 0);

        // next span sees the new state on both ends
        assert!(!window.admit(&start(1)));
        gate.set_enabled(true);
        assert!(!window.admit(&yield_(1)));
    }

    #[test]
    fn test_spans_tracked_per_subject_and_category() {
        let gate = SamplingGate::new(false);
        let mut window = SamplingWindow::new(gate.clone());

        let idle = Entry::CpuIdleEnter { id: 1, sim_time: 0 };
        assert!(!window.admit(&idle));
        gate.set_enabled(true);
        assert!(window.admit(&start(1)));
        assert_eq!(window.open_spans(), 2);

        gate.set_enabled(false);
        assert!(window.admit(&yield_(1)));
        assert!(!window.admit(&Entry::CpuIdleLeave { id: 1, sim_time: 1 }));
    }

    #[test]
    fn test_structural_never_filtered() {
        let gate = SamplingGate::new(false);
        let mut window = SamplingWindow::new(gate);

        let entries = [
            Entry::PortCreated {
                id: 1,
                name: "p".to_string(),
            },
            Entry::LogMessage {
                sim_time: 0,
                level: 1,
                sender: "s".to_string(),
                message: "m".to_string(),
            },
        ];
        for entry in &entries {
            assert!(window.admit(entry));
        }
    }

    #[test]
    fn test_window_frozen_inside_span() {
        let gate = SamplingGate::new(true);
        let mut window = SamplingWindow::new(gate.clone());

        assert!(window.admit(&start(7)));
        gate.set_enabled(false);
        // still inside the span opened while enabled
        assert!(window.admit(&notify(3)));
        assert!(window.admit(&yield_(7)));
        // outside any span the live state applies
        assert!(!window.admit(&notify(3)));
        gate.set_enabled(true);
        assert!(window.admit(&notify(3)));
    }

    #[test]
    fn test_window_frozen_until_last_span_ends() {
        let gate = SamplingGate::new(true);
        let mut window = SamplingWindow::new(gate.clone());

        assert!(window.admit(&start(1)));
        assert!(window.admit(&start(2)));
        gate.set_enabled(false);

        assert!(window.admit(&yield_(1)));
        assert_eq!(window.open_spans(), 1);
        // span 2 is still open, so the window keeps its decision
        assert!(window.admit(&notify(9)));

        assert!(window.admit(&yield_(2)));
        assert!(!window.admit(&notify(9)));
    }

    #[derive(Debug, Clone)]
    enum Step {
        Start(usize, SubjectId),
        End(usize, SubjectId),
        Gated(usize),
        Toggle,
    }

    const CATEGORIES: [SpanCategory; 3] = [
        SpanCategory::Scheduling,
        SpanCategory::ChannelUpdate,
        SpanCategory::CpuIdle,
    ];

    fn span_entry(category: SpanCategory, id: SubjectId, opening: bool) -> Entry {
        match (category, opening) {
            (SpanCategory::Scheduling, true) => start(id),
            (SpanCategory::Scheduling, false) => yield_(id),
            (SpanCategory::ChannelUpdate, true) => Entry::ChannelUpdateStart {
                id,
                real_time: 0,
                sim_time: 0,
            },
            (SpanCategory::ChannelUpdate, false) => Entry::ChannelUpdateComplete {
                id,
                real_time: 0,
                sim_time: 0,
            },
            (SpanCategory::CpuIdle, true) => Entry::CpuIdleEnter { id, sim_time: 0 },
            (SpanCategory::CpuIdle, false) => Entry::CpuIdleLeave { id, sim_time: 0 },
        }
    }

    fn gated_entry(idx: usize) -> Entry {
        match idx {
            0 => notify(1),
            1 => Entry::CpuCallStack {
                id: 0,
                sim_time: 0,
                level: 0,
                address: 0,
                symbol: "f".to_string(),
            },
            _ => Entry::TransactionTraceFw {
                id: 2,
                sim_time: 0,
                protocol: crate::trace::entry::ProtocolKind::Tlm,
                payload: "{}".to_string(),
            },
        }
    }

    fn step() -> impl proptest::strategy::Strategy<Value = Step> {
        use proptest::prelude::*;
        prop_oneof![
            (0..3usize, 0..3u64).prop_map(|(c, id)| Step::Start(c, id)),
            (0..3usize, 0..3u64).prop_map(|(c, id)| Step::End(c, id)),
            (0..3usize).prop_map(Step::Gated),
            Just(Step::Toggle),
        ]
    }

    proptest::proptest! {
        #[test]
        fn prop_spans_paired_and_window_frozen(
            initial in proptest::bool::ANY,
            steps in proptest::collection::vec(step(), 0..80),
        ) {
            let gate = SamplingGate::new(initial);
            let mut window = SamplingWindow::new(gate.clone());

            // decision recorded at each open span's START
            let mut started: HashMap<(SpanCategory, SubjectId), bool> = HashMap::new();
            // decision in force while any span is open
            let mut frozen = initial;

            for step in steps {
                match step {
                    Step::Toggle => {
                        gate.toggle();
                    }
                    Step::Start(c, id) => {
                        let recorded = window.admit(&span_entry(CATEGORIES[c], id, true));
                        proptest::prop_assert_eq!(recorded, gate.is_enabled());
                        started.insert((CATEGORIES[c], id), recorded);
                        frozen = recorded;
                    }
                    Step::End(c, id) => {
                        let recorded = window.admit(&span_entry(CATEGORIES[c], id, false));
                        match started.remove(&(CATEGORIES[c], id)) {
                            Some(at_start) => {
                                proptest::prop_assert_eq!(recorded, at_start);
                            }
                            None => {
                                proptest::prop_assert_eq!(recorded, frozen);
                            }
                        }
                        if started.is_empty() {
                            frozen = gate.is_enabled();
                        }
                    }
                    Step::Gated(idx) => {
                        let recorded = window.admit(&gated_entry(idx));
                        if started.is_empty() {
                            proptest::prop_assert_eq!(recorded, gate.is_enabled());
                            frozen = recorded;
                        } else {
                            proptest::prop_assert_eq!(recorded, frozen);
                        }
                    }
                }
                proptest::prop_assert_eq!(window.open_spans(), started.len());
            }
        }
    }

    #[test]
    fn test_unknown_rejected() {
        let mut window = SamplingWindow::new(SamplingGate::default());
        assert!(!window.admit(&Entry::Unknown { code: 77, id: 0 }));
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_toggles_gate() {
        let gate = SamplingGate::process();
        gate.set_enabled(true);
        install_signal_toggle(&gate).unwrap();
        // installing again keeps working
        install_signal_toggle(&SamplingGate::process()).unwrap();

        nix::sys::signal::raise(nix::sys::signal::Signal::SIGUSR2).unwrap();
        assert!(!gate.is_enabled());
        nix::sys::signal::raise(nix::sys::signal::Signal::SIGUSR2).unwrap();
        assert!(gate.is_enabled());

        let other = SamplingGate::new(true);
        assert!(install_signal_toggle(&other).is_err());
    }
}
