use nalgebra::{
    Isometry3, Quaternion as NaQuaternion, Translation3, UnitQuaternion, Vector3 as NaVector3,
};
use r2r::{
    builtin_interfaces::msg::Time,
    geometry_msgs::msg::{Quaternion, Transform, TransformStamped, Vector3},
    std_msgs::msg::Header,
};

/// Quaternion with a norm below this is treated as the identity rotation.
const DEGENERATE_QUATERNION_NORM: f64 = 1e-12;

pub fn unit_quaternion_from_msg(q: &Quaternion) -> UnitQuaternion<f64> {
    // nalgebra takes w first
    UnitQuaternion::try_new(
        NaQuaternion::new(q.w, q.x, q.y, q.z),
        DEGENERATE_QUATERNION_NORM,
    )
    .unwrap_or_else(UnitQuaternion::identity)
}

pub fn unit_quaternion_to_msg(q: &UnitQuaternion<f64>) -> Quaternion {
    let q = q.quaternion();
    Quaternion {
        x: q.i,
        y: q.j,
        z: q.k,
        w: q.w,
    }
}

pub fn isometry_from_transform(tf: &Transform) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(tf.translation.x, tf.translation.y, tf.translation.z),
        unit_quaternion_from_msg(&tf.rotation),
    )
}

pub fn isometry_to_transform(iso: &Isometry3<f64>) -> Transform {
    let t = &iso.translation.vector;
    Transform {
        translation: Vector3 {
            x: t.x,
            y: t.y,
            z: t.z,
        },
        rotation: unit_quaternion_to_msg(&iso.rotation),
    }
}

/// Composes transforms left to right: `tfs[0] * tfs[1] * ...`.
pub fn chain_transforms(tfs: &[Transform]) -> Transform {
    // a single edge is passed through untouched
    if let [tf] = tfs {
        return tf.clone();
    }
    let chained = tfs
        .iter()
        .fold(Isometry3::identity(), |acc, tf| acc * isometry_from_transform(tf));
    isometry_to_transform(&chained)
}

/// Swaps parent and child and inverts the transform.
pub fn get_inverse(tf: &TransformStamped) -> TransformStamped {
    let inverse = isometry_from_transform(&tf.transform).inverse();
    TransformStamped {
        header: Header {
            frame_id: tf.child_frame_id.clone(),
            stamp: tf.header.stamp.clone(),
        },
        child_frame_id: tf.header.frame_id.clone(),
        transform: isometry_to_transform(&inverse),
    }
}

/// `weight` is the share of `tf1`: 1.0 yields `tf1`, 0.0 yields `tf2`.
pub fn interpolate(tf1: Transform, tf2: Transform, weight: f64) -> Transform {
    let t1 = NaVector3::new(tf1.translation.x, tf1.translation.y, tf1.translation.z);
    let t2 = NaVector3::new(tf2.translation.x, tf2.translation.y, tf2.translation.z);
    let translation = t1 * weight + t2 * (1.0 - weight);

    let r1 = unit_quaternion_from_msg(&tf1.rotation);
    let r2 = unit_quaternion_from_msg(&tf2.rotation);
    // Opposite rotations have no unique slerp path, fall back to the nearer sample.
    let rotation = r1
        .try_slerp(&r2, 1.0 - weight, f64::EPSILON)
        .unwrap_or(if weight >= 0.5 { r1 } else { r2 });

    Transform {
        translation: Vector3 {
            x: translation.x,
            y: translation.y,
            z: translation.z,
        },
        rotation: unit_quaternion_to_msg(&rotation),
    }
}

pub fn to_transform_stamped(
    tf: Transform,
    from: String,
    to: String,
    time: &Time,
) -> TransformStamped {
    TransformStamped {
        header: Header {
            frame_id: from,
            stamp: time.clone(),
        },
        child_frame_id: to,
        transform: tf,
    }
}

/// Rotation about Z of the Z-Y-X Euler decomposition, in (-pi, pi].
pub fn yaw_from_quaternion(q: &Quaternion) -> f64 {
    let (_roll, _pitch, yaw) = unit_quaternion_from_msg(q).euler_angles();
    yaw
}

pub fn quaternion_from_yaw(yaw: f64) -> Quaternion {
    unit_quaternion_to_msg(&UnitQuaternion::from_euler_angles(0.0, 0.0, yaw))
}
