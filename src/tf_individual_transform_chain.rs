use r2r::{
    builtin_interfaces::msg::{Duration, Time},
    geometry_msgs::msg::TransformStamped,
};

use crate::{
    tf_error::TfError,
    transforms::{interpolate, to_transform_stamped},
    utils::{duration_as_ns_i64, is_time_zero, time_as_ns_i64},
};

fn binary_search_time(chain: &[TransformStamped], time_ns: i64) -> Result<usize, usize> {
    chain.binary_search_by(|element| time_as_ns_i64(&element.header.stamp).cmp(&time_ns))
}

/// Time-ordered history of a single parent -> child edge.
#[derive(Clone, Debug)]
pub(crate) struct TfIndividualTransformChain {
    cache_duration: Duration,
    static_tf: bool,
    pub(crate) transform_chain: Vec<TransformStamped>,
}

impl TfIndividualTransformChain {
    pub fn new(static_tf: bool, cache_duration: Duration) -> Self {
        Self {
            cache_duration,
            transform_chain: Vec::new(),
            static_tf,
        }
    }

    pub fn add_to_buffer(&mut self, msg: TransformStamped) {
        let stamp_ns = time_as_ns_i64(&msg.header.stamp);
        match binary_search_time(&self.transform_chain, stamp_ns) {
            // a republished sample replaces the one with the same stamp
            Ok(index) => self.transform_chain[index] = msg,
            Err(index) => self.transform_chain.insert(index, msg),
        }

        let Some(newest) = self.transform_chain.last() else {
            return;
        };
        let oldest_to_keep =
            time_as_ns_i64(&newest.header.stamp) - duration_as_ns_i64(&self.cache_duration);
        if oldest_to_keep > 0 {
            let index =
                binary_search_time(&self.transform_chain, oldest_to_keep).unwrap_or_else(|x| x);
            self.transform_chain.drain(..index);
        }
    }

    /// If timestamp is zero, return the latest transform.
    pub fn get_closest_transform(&self, time: &Time) -> Result<TransformStamped, TfError> {
        let (Some(first), Some(last)) = (self.transform_chain.first(), self.transform_chain.last())
        else {
            return Err(TfError::CouldNotFindTransform(
                String::new(),
                String::new(),
                Default::default(),
            ));
        };

        if is_time_zero(time) || self.static_tf {
            return Ok(last.clone());
        }

        let time_ns = time_as_ns_i64(time);
        match binary_search_time(&self.transform_chain, time_ns) {
            Ok(x) => Ok(self.transform_chain[x].clone()),
            Err(0) => Err(TfError::AttemptedLookupInPast(
                time.clone(),
                Box::new(first.clone()),
            )),
            Err(x) if x >= self.transform_chain.len() => Err(TfError::AttemptedLookUpInFuture(
                Box::new(last.clone()),
                time.clone(),
            )),
            Err(x) => {
                let before = &self.transform_chain[x - 1];
                let after = &self.transform_chain[x];
                let time1 = time_as_ns_i64(&before.header.stamp);
                let time2 = time_as_ns_i64(&after.header.stamp);
                let weight = 1.0 - (time_ns - time1) as f64 / (time2 - time1) as f64;
                let final_tf = interpolate(
                    before.transform.clone(),
                    after.transform.clone(),
                    weight,
                );
                Ok(to_transform_stamped(
                    final_tf,
                    after.header.frame_id.clone(),
                    after.child_frame_id.clone(),
                    time,
                ))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transform_chain.is_empty()
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

    const CACHE: Duration = Duration {
        sec: 10,
        nanosec: 0,
    };

    fn sample(sec: i32, x: f64) -> TransformStamped {
        TransformStamped {
            header: Header {
                frame_id: "odom".to_string(),
                stamp: Time { sec, nanosec: 0 },
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
        }
    }

    fn dynamic_chain() -> TfIndividualTransformChain {
        let mut chain = TfIndividualTransformChain::new(false, CACHE);
        chain.add_to_buffer(sample(3, 3.0));
        chain.add_to_buffer(sample(1, 1.0));
        chain.add_to_buffer(sample(2, 2.0));
        chain
    }

    #[test]
    fn test_samples_are_kept_sorted() {
        let chain = dynamic_chain();
        let stamps: Vec<i32> = chain
            .transform_chain
            .iter()
            .map(|tf| tf.header.stamp.sec)
            .collect();
        assert_eq!(stamps, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_stamp_replaces_sample() {
        let mut chain = dynamic_chain();
        chain.add_to_buffer(sample(2, 20.0));
        assert_eq!(chain.transform_chain.len(), 3);
        assert_eq!(chain.transform_chain[1].transform.translation.x, 20.0);
    }

    #[test]
    fn test_zero_time_returns_latest() {
        let chain = dynamic_chain();
        let tf = chain.get_closest_transform(&time_from_nanosec(0)).unwrap();
        assert_eq!(tf.transform.translation.x, 3.0);
    }

    #[test]
    fn test_interpolates_between_neighbours() {
        let chain = dynamic_chain();
        let time = time_from_nanosec(1_500_000_000);
        let tf = chain.get_closest_transform(&time).unwrap();
        assert!((tf.transform.translation.x - 1.5).abs() < 1e-9);
        assert_eq!(tf.header.stamp, time);
        assert_eq!(tf.header.frame_id, "odom");
        assert_eq!(tf.child_frame_id, "base_link");
    }

    #[test]
    fn test_out_of_range_is_extrapolation() {
        let chain = dynamic_chain();
        assert!(matches!(
            chain.get_closest_transform(&time_from_nanosec(500_000_000)),
            Err(TfError::AttemptedLookupInPast(..))
        ));
        assert!(matches!(
            chain.get_closest_transform(&time_from_nanosec(4_000_000_000)),
            Err(TfError::AttemptedLookUpInFuture(..))
        ));
        assert!(chain
            .get_closest_transform(&time_from_nanosec(3_000_000_000))
            .is_ok());
    }

    #[test]
    fn test_static_chain_ignores_time() {
        let mut chain = TfIndividualTransformChain::new(true, CACHE);
        chain.add_to_buffer(sample(1, 1.0));
        let tf = chain
            .get_closest_transform(&time_from_nanosec(99_000_000_000))
            .unwrap();
        assert_eq!(tf.transform.translation.x, 1.0);
    }

    #[test]
    fn test_empty_chain_has_no_transform() {
        let chain = TfIndividualTransformChain::new(false, CACHE);
        assert!(chain.is_empty());
        assert!(chain.get_closest_transform(&time_from_nanosec(0)).is_err());
    }
}
