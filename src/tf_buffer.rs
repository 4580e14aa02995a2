use std::collections::{hash_map::Entry, HashMap, HashSet, VecDeque};

use r2r::{
    builtin_interfaces::msg::{Duration, Time},
    geometry_msgs::msg::{Transform, TransformStamped},
    tf2_msgs::msg::TFMessage,
};

use crate::{
    tf_error::TfError,
    tf_individual_transform_chain::TfIndividualTransformChain,
    transforms::{chain_transforms, get_inverse, to_transform_stamped},
};

/// A directed edge of the frame graph: (parent, child).
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
struct FrameEdge(String, String);

impl FrameEdge {
    fn new(parent: &str, child: &str) -> Self {
        Self(parent.to_owned(), child.to_owned())
    }
}

#[derive(Clone, Debug)]
pub struct TfBuffer {
    child_transform_index: HashMap<String, HashSet<String>>,
    transform_data: HashMap<FrameEdge, TfIndividualTransformChain>,
    cache_duration: Duration,
}

const DEFAULT_CACHE_DURATION_SECONDS: i32 = 10;

impl TfBuffer {
    pub fn new() -> Self {
        Self::new_with_duration(Duration {
            sec: DEFAULT_CACHE_DURATION_SECONDS,
            nanosec: 0,
        })
    }

    pub fn new_with_duration(cache_duration: Duration) -> Self {
        TfBuffer {
            child_transform_index: HashMap::new(),
            transform_data: HashMap::new(),
            cache_duration,
        }
    }

    /// Stores every transform of the message together with its inverse.
    pub fn handle_incoming_transforms(&mut self, transforms: TFMessage, static_tf: bool) {
        for transform in transforms.transforms {
            self.add_transform(&get_inverse(&transform), static_tf);
            self.add_transform(&transform, static_tf);
        }
    }

    fn add_transform(&mut self, transform: &TransformStamped, static_tf: bool) {
        self.child_transform_index
            .entry(transform.header.frame_id.clone())
            .or_default()
            .insert(transform.child_frame_id.clone());

        let key = FrameEdge::new(&transform.header.frame_id, &transform.child_frame_id);
        match self.transform_data.entry(key) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(TfIndividualTransformChain::new(
                static_tf,
                self.cache_duration.clone(),
            )),
        }
        .add_to_buffer(transform.clone());
    }

    /// Breadth-first search for the frames between `from` (excluded) and `to` (included).
    ///
    /// The search follows topology only, so stale edges surface as extrapolation errors
    /// during lookup.
    fn retrieve_transform_path(&self, from: &str, to: &str) -> Result<Vec<String>, TfError> {
        let mut frontier: VecDeque<&str> = VecDeque::from([from]);
        let mut visited: HashSet<&str> = HashSet::from([from]);
        let mut parents: HashMap<&str, &str> = HashMap::new();

        while let Some(current) = frontier.pop_front() {
            if current == to {
                break;
            }
            let Some(children) = self.child_transform_index.get(current) else {
                continue;
            };
            for child in children {
                if visited.contains(child.as_str()) {
                    continue;
                }
                let usable = self
                    .transform_data
                    .get(&FrameEdge::new(current, child))
                    .is_some_and(|chain| !chain.is_empty());
                if usable {
                    parents.insert(child, current);
                    visited.insert(child);
                    frontier.push_back(child);
                }
            }
        }

        let mut path = vec![];
        let mut frame = to;
        while frame != from {
            path.push(frame.to_owned());
            frame = parents.get(frame).copied().ok_or_else(|| {
                TfError::CouldNotFindTransform(
                    from.to_owned(),
                    to.to_owned(),
                    self.child_transform_index.clone(),
                )
            })?;
        }
        path.reverse();
        Ok(path)
    }

    /// Looks up a transform within the tree at a given time.
    ///
    /// The result expresses `to` in `from`: its header frame is `from` and its child frame is `to`.
    /// A zero `time` resolves every edge to its latest sample.
    pub fn lookup_transform(
        &self,
        from: &str,
        to: &str,
        time: &Time,
    ) -> Result<TransformStamped, TfError> {
        let path = self.retrieve_transform_path(from, to)?;

        let mut tf_list: Vec<Transform> = Vec::with_capacity(path.len());
        let mut parent = from;
        for child in &path {
            let chain = self
                .transform_data
                .get(&FrameEdge::new(parent, child))
                .ok_or_else(|| {
                    TfError::CouldNotFindTransform(
                        from.to_owned(),
                        to.to_owned(),
                        self.child_transform_index.clone(),
                    )
                })?;
            tf_list.push(chain.get_closest_transform(time)?.transform);
            parent = child;
        }

        Ok(to_transform_stamped(
            chain_transforms(&tf_list),
            from.to_owned(),
            to.to_owned(),
            time,
        ))
    }
}
