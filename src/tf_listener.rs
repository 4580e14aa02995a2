use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use futures::{Stream, StreamExt};
use r2r::{
    builtin_interfaces::msg::Time, geometry_msgs::msg::TransformStamped, tf2_msgs::msg::TFMessage,
    QosProfile,
};
use tokio::sync::Notify;

use crate::{tf_buffer::TfBuffer, tf_error::TfError};

/// Keeps a [`TfBuffer`] filled from `/tf` and `/tf_static` and answers lookups against it.
///
/// Cloning is cheap; clones share the same buffer.
#[derive(Clone, Debug)]
pub struct TfListener {
    buffer: Arc<RwLock<TfBuffer>>,
    updated: Arc<Notify>,
}

impl TfListener {
    /// Create a new TfListener subscribed through `node`.
    ///
    /// Must be called inside a tokio runtime; `node` has to be spun for transforms to arrive.
    pub fn new_with_buffer(node: &mut r2r::Node, tf_buffer: TfBuffer) -> Result<Self, TfError> {
        let listener = Self::detached(tf_buffer);

        let dynamic_subscriber = node.subscribe::<TFMessage>("/tf", QosProfile::default())?;
        listener.spawn_feeder(dynamic_subscriber, false);

        let static_subscriber = node.subscribe::<TFMessage>(
            "/tf_static",
            QosProfile::default().keep_last(100).transient_local(),
        )?;
        listener.spawn_feeder(static_subscriber, true);

        Ok(listener)
    }

    /// A listener that is only fed through [`TfListener::handle_incoming_transforms`].
    pub fn detached(tf_buffer: TfBuffer) -> Self {
        Self {
            buffer: Arc::new(RwLock::new(tf_buffer)),
            updated: Arc::new(Notify::new()),
        }
    }

    fn spawn_feeder<S>(&self, mut subscriber: S, static_tf: bool)
    where
        S: Stream<Item = TFMessage> + Unpin + Send + 'static,
    {
        let listener = self.clone();
        tokio::spawn(async move {
            while let Some(tf) = subscriber.next().await {
                listener.handle_incoming_transforms(tf, static_tf);
            }
            tracing::debug!(static_tf, "tf subscription closed");
        });
    }

    /// Inserts the transforms and wakes every pending timed lookup.
    pub fn handle_incoming_transforms(&self, transforms: TFMessage, static_tf: bool) {
        match self.buffer.write() {
            Ok(mut buffer) => buffer.handle_incoming_transforms(transforms, static_tf),
            Err(_) => {
                tracing::error!("tf buffer lock poisoned, dropping incoming transforms");
                return;
            }
        }
        self.updated.notify_waiters();
    }

    /// Looks up a transform within the tree at a given time.
    pub fn lookup_transform(
        &self,
        from: &str,
        to: &str,
        time: Time,
    ) -> Result<TransformStamped, TfError> {
        self.buffer
            .read()
            .map_err(|_| TfError::CouldNotAcquireLock)?
            .lookup_transform(from, to, &time)
    }

    /// Like [`TfListener::lookup_transform`], but retries whenever new transforms arrive
    /// until `timeout` has passed. The error of the last attempt is returned on expiry.
    pub async fn lookup_transform_with_timeout(
        &self,
        from: &str,
        to: &str,
        time: Time,
        timeout: Duration,
    ) -> Result<TransformStamped, TfError> {
        let deadline = tokio::time::Instant::now().checked_add(timeout);
        loop {
            let notified = self.updated.notified();
            tokio::pin!(notified);
            // register before looking, so an update landing in between is not missed
            notified.as_mut().enable();

            let err = match self.lookup_transform(from, to, time.clone()) {
                Ok(tf) => return Ok(tf),
                Err(err) => err,
            };

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Err(err);
                    }
                }
                None => notified.await,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use r2r::{
        geometry_msgs::msg::{Transform, Vector3},
        std_msgs::msg::Header,
    };

    use super::*;
    use crate::utils::time_from_nanosec;

    fn map_to_base_link(x: f64) -> TFMessage {
        TFMessage {
            transforms: vec![TransformStamped {
                header: Header {
                    frame_id: "map".to_string(),
                    stamp: time_from_nanosec(1_000_000_000),
                },
                child_frame_id: "base_link".to_string(),
                transform: Transform {
                    translation: Vector3 {
                        x,
                        y: 0.0,
                        z: 0.0,
                    },
                    ..Default::default()
                },
            }],
        }
    }

    #[test]
    fn test_lookup_after_incoming_transforms() {
        let listener = TfListener::detached(TfBuffer::new());
        assert!(listener
            .lookup_transform("map", "base_link", time_from_nanosec(0))
            .is_err());

        listener.handle_incoming_transforms(map_to_base_link(4.0), false);
        let tf = listener
            .lookup_transform("map", "base_link", time_from_nanosec(0))
            .unwrap();
        assert_eq!(tf.transform.translation.x, 4.0);
    }

    #[test]
    fn test_clones_share_buffer() {
        let listener = TfListener::detached(TfBuffer::new());
        let feeder = listener.clone();
        feeder.handle_incoming_transforms(map_to_base_link(1.0), true);
        assert!(listener
            .lookup_transform("base_link", "map", time_from_nanosec(0))
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_lookup_gives_up_after_timeout() {
        let listener = TfListener::detached(TfBuffer::new());
        let started = tokio::time::Instant::now();

        let res = listener
            .lookup_transform_with_timeout(
                "map",
                "base_link",
                time_from_nanosec(0),
                Duration::from_secs(1),
            )
            .await;

        assert!(matches!(res, Err(TfError::CouldNotFindTransform(..))));
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_lookup_wakes_on_new_data() {
        let listener = TfListener::detached(TfBuffer::new());
        let feeder = listener.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            feeder.handle_incoming_transforms(map_to_base_link(2.0), false);
        });

        let started = tokio::time::Instant::now();
        let tf = listener
            .lookup_transform_with_timeout(
                "map",
                "base_link",
                time_from_nanosec(0),
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert_eq!(tf.transform.translation.x, 2.0);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_is_a_single_attempt() {
        let listener = TfListener::detached(TfBuffer::new());
        listener.handle_incoming_transforms(map_to_base_link(3.0), false);

        let tf = listener
            .lookup_transform_with_timeout("map", "base_link", time_from_nanosec(0), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(tf.transform.translation.x, 3.0);

        let missing = listener
            .lookup_transform_with_timeout("map", "odom", time_from_nanosec(0), Duration::ZERO)
            .await;
        assert!(missing.is_err());
    }
}
