// packages/engine/src/main.rs
//! Simtrace demo driver
//!
//! Builds a trace session from `SIMTRACE` and `simtrace.toml`, then drives it
//! with a synthetic multi-threaded simulation workload.

use anyhow::{Context, Result};
use rand::Rng;
use serde_json::json;
use simtrace_engine::observability::init_tracing;
use simtrace_engine::trace::{BindingKind, ModulePhase, ProcKind, ProtocolKind};
use simtrace_engine::{EngineConfig, TraceContext, Tracer};
use tracing::info;

fn main() -> Result<()> {
    let config = EngineConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.log_level)?;

    info!("Starting simtrace v{}", simtrace_engine::VERSION);

    let Some(ctx) = TraceContext::from_config(&config)? else {
        info!("Set SIMTRACE=csv or SIMTRACE=1 to record a trace");
        return Ok(());
    };

    let tracer = ctx.tracer();
    elaborate(&tracer, config.demo_threads as u64);

    crossbeam::scope(|scope| {
        for cpu in 0..config.demo_threads as u64 {
            let tracer = tracer.clone();
            let events = config.demo_events;
            scope.spawn(move |_| simulate_cpu(&tracer, cpu, events));
        }
    })
    .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;

    let report = ctx.shutdown()?;
    info!(
        "Recorded {} entries ({} filtered) in {} batches, avg batch {:.1}",
        report.dispatch.dispatched,
        report.dispatch.filtered,
        report.dispatch.batches,
        report.queue.avg_batch_size()
    );

    Ok(())
}

/// Ids of the objects owned by one simulated cpu
fn cpu_ids(cpu: u64) -> (u64, u64, u64, u64) {
    let base = 1000 * (cpu + 1);
    (base, base + 1, base + 2, base + 3)
}

fn elaborate(tracer: &Tracer, cpus: u64) {
    tracer.module_created(1, "system", "sc_module");
    tracer.module_phase_started(1, ModulePhase::Construction);

    for cpu in 0..cpus {
        let (module, process, port, event) = cpu_ids(cpu);
        tracer.module_created(module, format!("system.cpu{}", cpu), "processor");
        tracer.process_created(process, format!("system.cpu{}.run", cpu), ProcKind::Thread);
        tracer.port_created(port, format!("system.cpu{}.data", cpu));
        tracer.event_created(event, format!("system.cpu{}.irq", cpu));
        tracer.port_bound(
            port,
            2,
            BindingKind::Normal,
            ProtocolKind::from_type_name("tlm::tlm_generic_payload"),
        );
    }

    tracer.port_created(2, "system.bus.in");
    tracer.channel_created(3, "system.reset", "sc_signal<bool>");
    tracer.module_phase_finished(1, ModulePhase::Construction);
    tracer.module_phase_started(1, ModulePhase::StartOfSimulation);
    tracer.module_phase_finished(1, ModulePhase::StartOfSimulation);
}

fn simulate_cpu(tracer: &Tracer, cpu: u64, events: usize) {
    let (_, process, port, event) = cpu_ids(cpu);
    let mut rng = rand::thread_rng();
    let mut now = 0u64;

    for n in 0..events {
        now += rng.gen_range(1..100) * 1000;

        tracer.process_start(process, now);
        let addr: u64 = rng.gen_range(0..0x1_0000) & !0x3;
        let payload = json!({ "cmd": "read", "addr": addr, "len": 4 });
        tracer.transaction_trace_fw(port, now, ProtocolKind::Tlm, payload.to_string());
        tracer.transaction_trace_bw(port, now + 10, ProtocolKind::Tlm, json!({ "resp": "ok" }).to_string());
        tracer.cpu_call_stack(cpu, now, 0, 0x8000_0000 + addr, "handle_io");
        tracer.process_yield(process, now);

        if n % 16 == 0 {
            tracer.event_notify_timed(event, now, 5000);
            tracer.cpu_idle_enter(cpu, now);
            tracer.cpu_idle_leave(cpu, now + 5000);
            tracer.channel_update_start(3, now);
            tracer.channel_update_complete(3, now);
        }
        if n % 100 == 0 {
            tracer.log_message(now, 1, format!("system.cpu{}", cpu), format!("step {}", n));
        }
    }
}
