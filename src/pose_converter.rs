use std::{
    future::Future,
    sync::{Arc, Mutex},
};

use r2r::{
    builtin_interfaces::msg::Time,
    geometry_msgs::msg::{Point, Pose, PoseStamped, Transform},
    std_msgs::msg::Header,
};
use tokio::time::MissedTickBehavior;

use crate::{
    config::ConverterConfig, tf_error::TfError, tf_listener::TfListener,
    transforms::yaw_from_quaternion, utils::time_from_nanosec,
};

/// Where converted poses go.
pub trait PoseSink {
    fn send_pose(&self, pose: &PoseStamped) -> Result<(), TfError>;
}

impl PoseSink for r2r::Publisher<PoseStamped> {
    fn send_pose(&self, pose: &PoseStamped) -> Result<(), TfError> {
        self.publish(pose).map_err(TfError::from)
    }
}

/// Source of header stamps.
pub trait StampSource {
    fn now(&mut self) -> Result<Time, TfError>;
}

impl StampSource for r2r::Clock {
    fn now(&mut self) -> Result<Time, TfError> {
        let now = self.get_now()?;
        Ok(r2r::Clock::to_builtin_time(&now))
    }
}

/// The node's ROS clock, as handed out by `r2r::Node::get_ros_clock`.
impl StampSource for Arc<Mutex<r2r::Clock>> {
    fn now(&mut self) -> Result<Time, TfError> {
        self.lock()
            .map_err(|_| TfError::CouldNotAcquireLock)?
            .now()
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    Published(PoseStamped),
    /// No transform within the timeout; nothing was published.
    LookupFailed(TfError),
    PublishFailed(TfError),
}

/// Copies the transform into a pose without touching its values.
pub fn to_pose_stamped(tf: &Transform, frame_id: &str, stamp: Time) -> PoseStamped {
    PoseStamped {
        header: Header {
            stamp,
            frame_id: frame_id.to_string(),
        },
        pose: Pose {
            position: Point {
                x: tf.translation.x,
                y: tf.translation.y,
                z: tf.translation.z,
            },
            orientation: tf.rotation.clone(),
        },
    }
}

pub fn pose_report(frame: &str, tf: &Transform) -> String {
    let t = &tf.translation;
    format!(
        "{frame} position: x: {:.2} y: {:.2} z: {:.2} yaw: {:.6}",
        t.x,
        t.y,
        t.z,
        yaw_from_quaternion(&tf.rotation)
    )
}

fn log_lookup_failure(err: &TfError) {
    if err.is_extrapolation() {
        tracing::error!("Time extrapolation failed: {err}");
    } else {
        tracing::error!("Transform lookup failed: {err}");
    }
}

/// Periodically resolves `source_frame` in `target_frame` and publishes it as a pose.
pub struct PoseConverter<P, C> {
    config: ConverterConfig,
    listener: TfListener,
    publisher: P,
    clock: C,
}

impl<P: PoseSink, C: StampSource> PoseConverter<P, C> {
    pub fn new(config: ConverterConfig, listener: TfListener, publisher: P, clock: C) -> Self {
        Self {
            config,
            listener,
            publisher,
            clock,
        }
    }

    /// One polling cycle: at most one publication and exactly one log line.
    ///
    /// Lookup and publish failures are logged and reported in the outcome; only a clock
    /// failure is an `Err`.
    pub async fn tick(&mut self) -> Result<TickOutcome, TfError> {
        let lookup_time = if self.config.lookup_latest {
            time_from_nanosec(0)
        } else {
            self.clock.now()?
        };

        let tf = match self
            .listener
            .lookup_transform_with_timeout(
                &self.config.target_frame,
                &self.config.source_frame,
                lookup_time,
                self.config.lookup_timeout(),
            )
            .await
        {
            Ok(tf) => tf,
            Err(err) => {
                log_lookup_failure(&err);
                return Ok(TickOutcome::LookupFailed(err));
            }
        };

        let pose = to_pose_stamped(&tf.transform, &self.config.target_frame, self.clock.now()?);
        match self.publisher.send_pose(&pose) {
            Ok(()) => {
                tracing::info!("{}", pose_report(&self.config.source_frame, &tf.transform));
                Ok(TickOutcome::Published(pose))
            }
            Err(err) => {
                tracing::error!("Failed to publish on {}: {err}", self.config.pose_topic);
                Ok(TickOutcome::PublishFailed(err))
            }
        }
    }

    /// Ticks every `timer_period` until `shutdown` resolves. Ticks missed while a lookup
    /// was waiting are skipped rather than replayed.
    pub async fn run_until<F: Future>(mut self, shutdown: F) -> Result<(), TfError> {
        let mut interval = tokio::time::interval(self.config.timer_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick().await?;
                }
            }
        }
        tracing::info!("pose converter stopped");
        Ok(())
    }
}
