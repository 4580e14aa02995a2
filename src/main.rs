use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use r2r::{geometry_msgs::msg::PoseStamped, QosProfile};
use tf_to_pose::{utils::duration_from_std, ConverterConfig, PoseConverter, TfBuffer, TfListener};
use tracing_subscriber::EnvFilter;

const SPIN_PERIOD: Duration = Duration::from_millis(10);

/// Publish the pose of a tf frame as geometry_msgs/PoseStamped
#[derive(Debug, Parser)]
#[command(name = "tf_to_pose", version)]
struct Cli {
    /// TOML file overriding the default frames, topic and timings
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ROS arguments from --ros-args on are not forwarded to rcl and are ignored
    let cli = Cli::parse_from(std::env::args().take_while(|arg| arg != "--ros-args"));
    let config = match &cli.config {
        Some(path) => ConverterConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConverterConfig::default(),
    };

    let ctx = r2r::Context::create()?;
    let mut node = r2r::Node::create(ctx, &config.node_name, "")?;

    let listener = TfListener::new_with_buffer(
        &mut node,
        TfBuffer::new_with_duration(duration_from_std(config.cache_duration())),
    )?;
    let publisher = node.create_publisher::<PoseStamped>(
        &config.pose_topic,
        QosProfile::default().keep_last(config.queue_depth),
    )?;
    let clock = node.get_ros_clock();

    tracing::info!(
        target_frame = %config.target_frame,
        source_frame = %config.source_frame,
        topic = %config.pose_topic,
        period_secs = config.timer_period_secs,
        "publishing pose"
    );

    let running = Arc::new(AtomicBool::new(true));
    let spinning = running.clone();
    let spinner = tokio::task::spawn_blocking(move || {
        while spinning.load(Ordering::Relaxed) {
            node.spin_once(SPIN_PERIOD);
        }
    });

    let result = PoseConverter::new(config, listener, publisher, clock)
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl-c: {err}");
                std::future::pending::<()>().await;
            }
        })
        .await;

    running.store(false, Ordering::Relaxed);
    spinner.await?;
    result?;
    Ok(())
}
