//! visflow - Main Entry Point
//!
//! Loads a TOML pipeline description, builds it from the built-in component
//! catalog and drives it with a synthetic frame feed.
//!
//! ```bash
//! # Run a pipeline
//! visflow demos/pipeline.toml
//!
//! # Print the built topology as JSON without running it
//! visflow demos/pipeline.toml --describe
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use visflow::components::builtin_catalog;
use visflow::config::{ExecutionMode, PipelineConfig, SourceConfig};
use visflow::pipeline::{OutPort, Pipeline, Transition};
use visflow::types::Mat;

/// visflow - Run a data-flow pipeline of vision components.
#[derive(Parser, Debug)]
#[command(name = "visflow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pipeline description (TOML)
    pipeline: PathBuf,

    /// Print the built topology as JSON and exit
    #[arg(long)]
    describe: bool,

    /// Also write a daily rolling log file into this directory
    #[arg(long, env = "VISFLOW_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

/// Console logging, plus a daily log file when `log_dir` is given.
/// The returned guard flushes the file writer on drop.
fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "visflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,visflow=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn frame(source: &SourceConfig, index: usize) -> Mat {
    Mat::gradient(source.height, source.width, source.channels, index)
}

fn run_event_loop(
    mut pipeline: Pipeline,
    feed: &OutPort<Mat>,
    source: Option<&SourceConfig>,
) -> anyhow::Result<Pipeline> {
    pipeline.init_all()?;
    pipeline.start_all()?;

    if let Some(source) = source {
        for i in 0..source.frames {
            feed.write(frame(source, i))?;
            let fired = pipeline.run_until_idle();
            tracing::debug!("Frame {}: {} handler invocations", i, fired);
        }
    }

    pipeline.stop_all()?;
    pipeline.finish_all()?;
    Ok(pipeline)
}

fn run_threaded(
    pipeline: Pipeline,
    feed: &OutPort<Mat>,
    source: Option<&SourceConfig>,
) -> anyhow::Result<Pipeline> {
    let threaded = pipeline.spawn()?;
    threaded.transition_all(Transition::Init)?;
    threaded.transition_all(Transition::Start)?;

    if let Some(source) = source {
        for i in 0..source.frames {
            feed.write(frame(source, i))?;
        }
    }

    // Workers stop in declaration order after draining their queues.
    threaded.transition_all(Transition::Stop)?;
    threaded.transition_all(Transition::Finish)?;
    Ok(threaded.shutdown()?)
}

fn log_summary(pipeline: &Pipeline) {
    for component in pipeline.describe().components {
        let fired: u64 = component.handlers.iter().map(|h| h.fired).sum();
        let failed: u64 = component.handlers.iter().map(|h| h.failed).sum();
        tracing::info!(
            "{} ({}): {}, {} handler runs, {} failed, {} deferred",
            component.name,
            component.kind,
            component.state,
            fired,
            failed,
            component.deferred
        );
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_logging(args.log_dir.as_deref());

    let config = PipelineConfig::load(&args.pipeline)?;
    let catalog = builtin_catalog()?;
    let mut pipeline = config.build(&catalog)?;

    if args.describe {
        println!("{}", serde_json::to_string_pretty(&pipeline.describe())?);
        return Ok(());
    }

    tracing::info!(
        "Running {:?} ({} components, {:?})",
        args.pipeline,
        pipeline.len(),
        config.execution.mode
    );

    let feed = OutPort::<Mat>::new("source");
    let source = config.source.as_ref();
    if let Some(source) = source {
        pipeline
            .connect_external(&feed, &source.target)
            .with_context(|| format!("Cannot feed '{}'", source.target))?;
    } else {
        tracing::warn!("No [source] section, running without input");
    }

    let pipeline = match config.execution.mode {
        ExecutionMode::EventLoop => run_event_loop(pipeline, &feed, source)?,
        ExecutionMode::Threaded => run_threaded(pipeline, &feed, source)?,
    };

    log_summary(&pipeline);
    Ok(())
}
