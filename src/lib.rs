//! A ROS 2 node that reports where a robot frame sits in a world frame.
//!
//! Every `timer_period` the [`PoseConverter`] asks a [`TfListener`] for the transform
//! `target_frame` <- `source_frame`, logs its position and yaw, and republishes it as a
//! `geometry_msgs/PoseStamped` stamped with the current ROS time.

pub mod config;
mod pose_converter;
mod tf_buffer;
mod tf_error;
mod tf_individual_transform_chain;
mod tf_listener;
pub mod transforms;
pub mod utils;

pub use config::{ConfigError, ConverterConfig};
pub use pose_converter::{
    pose_report, to_pose_stamped, PoseConverter, PoseSink, StampSource, TickOutcome,
};
pub use tf_buffer::TfBuffer;
pub use tf_error::TfError;
pub use tf_listener::TfListener;
