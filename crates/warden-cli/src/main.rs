use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use warden_core::{SampleTask, SchedulerBuilder, SchedulerConfig, Task};

#[derive(Parser, Debug)]
#[command(about = "Run sample background tasks and print the queue until it drains")]
struct CliArgs {
    /// Path to a TOML file with a `[task_manager]` table.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of sample tasks to register.
    #[arg(long, default_value_t = 4)]
    tasks: usize,

    /// Delay between two progress steps of a sample task, in milliseconds.
    #[arg(long, default_value_t = 50)]
    step_millis: u64,

    /// How often to print the queue, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    print_millis: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()?;

    let config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            SchedulerConfig::load(path)?
        }
        None => SchedulerConfig::default(),
    };

    let scheduler = SchedulerBuilder::new().config(config).build()?;
    scheduler.start();

    // (A) サンプルタスクを投入
    let factory = Arc::new(SampleTask::new(Duration::from_millis(args.step_millis)));
    for n in 1..=args.tasks {
        let task = Task::with_name_detail(factory.clone(), format!("#{n}"))?;
        scheduler.register_task(task).await;
    }
    info!(
        tasks = args.tasks,
        limit = scheduler.auto_run_limit(),
        "sample tasks registered"
    );

    // (B) キューが空になるまで（または Ctrl-C まで）一覧を表示
    let mut ticker = tokio::time::interval(Duration::from_millis(args.print_millis.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = ticker.tick() => {
                let views = scheduler.task_views().await;
                println!("{}", serde_json::to_string_pretty(&views)?);
                if !scheduler.counts().await.has_pending() {
                    break;
                }
            }
        }
    }

    // (C) 停止
    scheduler.shutdown_now().await;
    Ok(())
}
