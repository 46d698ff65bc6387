//! Camera animation through xformOp time samples.

use std::collections::BTreeMap;

use usdgen_math::{DVec3, LookAt};

use crate::scene::{check_positive, SceneError, SceneResult};
use crate::usd::{PrimPath, Stage, XformOp};

/// Per-frame camera positions and look-at targets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraPath {
    pub positions: BTreeMap<i64, DVec3>,
    pub targets: BTreeMap<i64, DVec3>,
}

/// Animate a camera with translate samples and, where a target is given
/// for a frame, rotateY/rotateX look-at samples.
///
/// The stage time range is widened to cover the animated frames.
pub fn animate_camera(
    stage: &mut Stage,
    camera: &PrimPath,
    positions: &BTreeMap<i64, DVec3>,
    targets: Option<&BTreeMap<i64, DVec3>>,
) -> SceneResult<()> {
    let (Some(first), Some(last)) = (positions.keys().next(), positions.keys().next_back()) else {
        log::warn!("No frames given for {}; camera left static", camera);
        return Ok(());
    };
    let (first, last) = (*first, *last);

    let prim = stage.prim_mut(camera)?;
    for (&frame, &position) in positions {
        let time = frame as f64;
        prim.add_xform_op_sample(XformOp::Translate(position), time)?;

        if let Some(target) = targets.and_then(|t| t.get(&frame)) {
            if *target == position {
                return Err(SceneError::InvalidParameter(format!(
                    "frame {}: camera cannot look at its own position",
                    frame
                )));
            }
            let (yaw, pitch) = LookAt::new(position, *target).angles();
            prim.add_xform_op_sample(XformOp::RotateY(yaw as f32), time)?;
            prim.add_xform_op_sample(XformOp::RotateX(pitch as f32), time)?;
        }
    }

    stage.extend_time_range(first as f64, last as f64);
    log::debug!("Animated {} over frames {}..={}", camera, first, last);
    Ok(())
}

/// Animate a camera along a precomputed path.
pub fn animate_camera_path(stage: &mut Stage, camera: &PrimPath, path: &CameraPath) -> SceneResult<()> {
    animate_camera(stage, camera, &path.positions, Some(&path.targets))
}

/// One full revolution around `center` over `start..=end`, looking at it.
///
/// Frame `f` sits at angle `360 * (f - start) / (end - start + 1)` degrees,
/// measured from +Z towards +X, so the last frame stops short of the first.
pub fn generate_orbit_path(center: DVec3, radius: f64, height: f64, start: i64, end: i64) -> SceneResult<CameraPath> {
    check_positive("orbit radius", radius)?;
    if end < start {
        return Err(SceneError::InvalidParameter(format!(
            "frame range {}..{} is empty",
            start, end
        )));
    }

    let span = (end - start + 1) as f64;
    let mut path = CameraPath::default();
    for frame in start..=end {
        let angle = (360.0 * (frame - start) as f64 / span).to_radians();
        let position = DVec3::new(
            center.x + angle.sin() * radius,
            height,
            center.z + angle.cos() * radius,
        );
        path.positions.insert(frame, position);
        path.targets.insert(frame, center);
    }
    Ok(path)
}
