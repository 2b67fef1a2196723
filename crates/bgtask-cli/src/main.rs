use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use bgtask_core::impls::{MemoryEventSink, TracingEventSink};
use bgtask_core::ports::EventSink;
use bgtask_core::{
    ConsumerKind, DispatcherConfig, Outcome, TaskConsumer, TaskDelegate, TaskDescriptor,
    TaskDispatcher, TaskFailure, TaskOptions, TaskRegistration,
};
use clap::Parser;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Registers one demo task, fires it a few times and prints what the delegate saw.
#[derive(Debug, Parser)]
#[command(name = "bgtask", version)]
struct Args {
    #[arg(long, default_value = "app1")]
    app_id: String,

    #[arg(long, default_value = "sync")]
    task: String,

    /// How many times the task is fired
    #[arg(long, default_value_t = 3)]
    fires: u32,

    /// Items reported in each firing's data
    #[arg(long, default_value_t = 3)]
    items: u64,

    /// Every Nth firing fails (0 = never)
    #[arg(long, default_value_t = 0)]
    fail_every: u32,

    /// minInterval option in seconds
    #[arg(long, default_value_t = 900)]
    min_interval: u64,

    /// Do not attach a delegate, so outcomes are dropped
    #[arg(long)]
    detached: bool,
}

#[derive(Debug, Deserialize)]
struct SyncPayload {
    items: u64,
    #[serde(default)]
    fail: bool,
}

#[derive(Default)]
struct DemoSyncConsumer;

#[async_trait]
impl TaskConsumer for DemoSyncConsumer {
    async fn execute(
        &self,
        task: &TaskDescriptor,
        data: Option<Value>,
        error: Option<TaskFailure>,
    ) -> Result<Option<Value>, TaskFailure> {
        if let Some(error) = error {
            return Err(error);
        }
        let payload: SyncPayload = data
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| TaskFailure::new("E_PAYLOAD", format!("json decode: {e}")))?
            .unwrap_or(SyncPayload {
                items: 0,
                fail: false,
            });
        if payload.fail {
            return Err(TaskFailure::execution_failed("intentional failure"));
        }

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tracing::info!(task = task.name(), items = payload.items, "synced");
        Ok(Some(json!({ "synced": payload.items })))
    }

    fn did_register(&self, task: &TaskDescriptor) {
        tracing::info!(task = task.name(), options = ?task.options(), "consumer attached");
    }
}

impl ConsumerKind for DemoSyncConsumer {
    const KIND: &'static str = "demo.sync.v1";
}

#[derive(Default)]
struct PrintingDelegate {
    seen: AtomicU32,
}

impl TaskDelegate for PrintingDelegate {
    fn notify(&self, task: &TaskDescriptor, outcome: &Outcome) {
        let n = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        match outcome {
            Outcome::Success { data } => println!("[{n}] {}: ok data={data:?}", task.key()),
            Outcome::Failed { error } => println!("[{n}] {}: failed {error}", task.key()),
        }
    }
}

/// Forwards to both sinks so the run is logged and can be summarized afterwards.
struct Tee(Arc<MemoryEventSink>, TracingEventSink);

impl EventSink for Tee {
    fn emit(&self, event: bgtask_core::domain::DomainEvent) {
        self.1.emit(event.clone());
        self.0.emit(event);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = DispatcherConfig::from_env().context("reading dispatcher config")?;
    let memory = Arc::new(MemoryEventSink::new());

    let dispatcher = TaskDispatcher::builder()
        .consumer::<DemoSyncConsumer>()?
        .event_sink(Arc::new(Tee(Arc::clone(&memory), TracingEventSink)))
        .config(config)
        .expect_kinds(&[DemoSyncConsumer::KIND])
        .build()?;

    let delegate = Arc::new(PrintingDelegate::default());
    let mut registration = TaskRegistration::new(
        args.app_id.as_str(),
        args.task.as_str(),
        format!("app://{}", args.app_id),
        DemoSyncConsumer::KIND,
    )
    .with_options(TaskOptions::new().with("minInterval", json!(args.min_interval)));
    if !args.detached {
        registration = registration.with_delegate(&delegate);
    }
    let handle = dispatcher.register(registration)?;
    println!("registered {} ({})", handle.key(), handle.registration());

    let mut firings = Vec::new();
    for i in 1..=args.fires {
        let fail = args.fail_every > 0 && i % args.fail_every == 0;
        let data = json!({ "items": args.items, "fail": fail });
        firings.push(dispatcher.fire(&args.app_id, &args.task, Some(data), None)?);
    }
    for firing in firings {
        if let Some(report) = firing.wait().await {
            tracing::debug!(firing = %report.firing, delivery = ?report.delivery, "report");
        }
    }

    println!("status: {}", serde_json::to_string_pretty(&dispatcher.status())?);
    let shutdown = dispatcher.shutdown().await;
    println!(
        "shutdown: drained={} cleared={} events={}",
        shutdown.drained,
        shutdown.cleared,
        memory.events().len()
    );
    Ok(())
}
