//! Camera calibration from accumulated pattern observations.
//!
//! Observations arrive on `in_object3d`. They are stored when `continuous` is
//! set, or once after a pulse on `in_add`. A pulse on `in_calibrate` hands the
//! stored set to the [`CalibrationSolver`] and writes the result to
//! `out_camerainfo`; `in_clear` empties the set. The latest value on
//! `in_camerainfo`, if any, is passed to the solver as the initial guess.

use crate::pipeline::{
    Component, InPort, Interface, OutPort, PipelineResult, Property, PropertyRegistry,
};
use crate::types::{CameraInfo, Object3D, Point2f, Point3f};
use std::sync::{Arc, Mutex, MutexGuard};

/// Computes intrinsics from a set of pattern views.
#[cfg_attr(test, mockall::automock)]
pub trait CalibrationSolver: Send {
    fn calibrate(
        &mut self,
        object_points: &[Vec<Point3f>],
        image_points: &[Vec<Point2f>],
        image_size: (u32, u32),
        guess: Option<CameraInfo>,
    ) -> anyhow::Result<CameraInfo>;
}

/// Pinhole model centred on the image with unit aspect and no distortion.
///
/// Keeps the guess's focal lengths when one is given. It does not refine
/// anything from the observations; plug in a real solver for that.
#[derive(Debug, Default, Clone, Copy)]
pub struct NominalSolver;

impl CalibrationSolver for NominalSolver {
    fn calibrate(
        &mut self,
        object_points: &[Vec<Point3f>],
        image_points: &[Vec<Point2f>],
        image_size: (u32, u32),
        guess: Option<CameraInfo>,
    ) -> anyhow::Result<CameraInfo> {
        anyhow::ensure!(!image_points.is_empty(), "no observations to calibrate from");
        anyhow::ensure!(
            object_points.len() == image_points.len(),
            "{} model views but {} image views",
            object_points.len(),
            image_points.len()
        );

        let (w, h) = (image_size.0 as f64, image_size.1 as f64);
        let (fx, fy) = match guess {
            Some(g) if g.camera_matrix[0][0] > 0.0 => (g.camera_matrix[0][0], g.camera_matrix[1][1]),
            _ => (w.max(h), w.max(h)),
        };
        Ok(CameraInfo {
            width: image_size.0,
            height: image_size.1,
            camera_matrix: [[fx, 0.0, w / 2.0], [0.0, fy, h / 2.0], [0.0, 0.0, 1.0]],
            dist_coeffs: vec![0.0; 5],
            rms: 0.0,
        })
    }
}

#[derive(Default)]
struct Dataset {
    object_points: Vec<Vec<Point3f>>,
    image_points: Vec<Vec<Point2f>>,
    image_size: (u32, u32),
    add_next: bool,
}

struct Shared {
    dataset: Mutex<Dataset>,
    solver: Mutex<Box<dyn CalibrationSolver>>,
}

impl Shared {
    fn dataset(&self) -> MutexGuard<'_, Dataset> {
        self.dataset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct Calib {
    in_object3d: InPort<Object3D>,
    in_camerainfo: InPort<CameraInfo>,
    in_add: InPort<()>,
    in_calibrate: InPort<()>,
    in_clear: InPort<()>,
    out_camerainfo: OutPort<CameraInfo>,
    continuous: Property<bool>,
    shared: Arc<Shared>,
}

impl Calib {
    pub fn new() -> Self {
        Self::with_solver(Box::new(NominalSolver))
    }

    pub fn with_solver(solver: Box<dyn CalibrationSolver>) -> Self {
        Self {
            in_object3d: InPort::newest("in_object3d"),
            in_camerainfo: InPort::newest("in_camerainfo"),
            in_add: InPort::queue("in_add"),
            in_calibrate: InPort::queue("in_calibrate"),
            in_clear: InPort::queue("in_clear"),
            out_camerainfo: OutPort::new("out_camerainfo"),
            continuous: Property::new("continuous", false),
            shared: Arc::new(Shared {
                dataset: Mutex::new(Dataset::default()),
                solver: Mutex::new(solver),
            }),
        }
    }

    /// Number of stored observations.
    pub fn observations(&self) -> usize {
        self.shared.dataset().image_points.len()
    }
}

impl Default for Calib {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Calib {
    fn register_properties(&mut self, props: &mut PropertyRegistry) -> PipelineResult<()> {
        props.register(&self.continuous)
    }

    fn prepare_interface(&mut self, iface: &mut Interface<'_>) -> PipelineResult<()> {
        iface.register_input(&self.in_object3d)?;
        iface.register_input(&self.in_camerainfo)?;
        iface.register_output(&self.out_camerainfo)?;

        let (input, continuous, shared) = (
            self.in_object3d.clone(),
            self.continuous.clone(),
            Arc::clone(&self.shared),
        );
        iface.register_handler("process_object3D", move || {
            let mut data = shared.dataset();
            if !continuous.get() && !data.add_next {
                return Ok(());
            }
            let obj = input.read()?;
            anyhow::ensure!(
                obj.model_points.len() == obj.image_points.len(),
                "observation has {} model points but {} image points",
                obj.model_points.len(),
                obj.image_points.len()
            );
            data.image_size = obj.image_size;
            data.object_points.push(obj.model_points);
            data.image_points.push(obj.image_points);
            data.add_next = false;
            tracing::debug!("Stored observation #{}", data.image_points.len());
            Ok(())
        })?;
        iface.add_dependency("process_object3D", &self.in_object3d)?;

        let (pulse, shared) = (self.in_add.clone(), Arc::clone(&self.shared));
        iface.register_handler("add_object3D", move || {
            pulse.read()?;
            shared.dataset().add_next = true;
            Ok(())
        })?;
        iface.add_dependency("add_object3D", &self.in_add)?;

        let (pulse, shared) = (self.in_clear.clone(), Arc::clone(&self.shared));
        iface.register_handler("clear_dataset", move || {
            pulse.read()?;
            let mut data = shared.dataset();
            data.object_points.clear();
            data.image_points.clear();
            tracing::info!("Calibration set cleared");
            Ok(())
        })?;
        iface.add_dependency("clear_dataset", &self.in_clear)?;

        let (pulse, guess, output, shared) = (
            self.in_calibrate.clone(),
            self.in_camerainfo.clone(),
            self.out_camerainfo.clone(),
            Arc::clone(&self.shared),
        );
        iface.register_handler("perform_calibration", move || {
            pulse.read()?;
            let info = {
                let data = shared.dataset();
                let mut solver = shared.solver.lock().unwrap_or_else(|e| e.into_inner());
                solver.calibrate(
                    &data.object_points,
                    &data.image_points,
                    data.image_size,
                    guess.peek().ok(),
                )?
            };
            tracing::info!("Calibration done, rms = {:.4}", info.rms);
            output.write(info)?;
            Ok(())
        })?;
        iface.add_dependency("perform_calibration", &self.in_calibrate)
    }

    fn on_finish(&mut self) -> bool {
        let mut data = self.shared.dataset();
        data.object_points.clear();
        data.image_points.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation() -> Object3D {
        let model = Object3D::chessboard_model(3, 2, 1.0);
        let image = model
            .iter()
            .map(|p| Point2f { x: p.x * 10.0, y: p.y * 10.0 })
            .collect();
        Object3D {
            model_points: model,
            image_points: image,
            image_size: (640, 480),
        }
    }

    #[test]
    fn test_nominal_solver_centres_principal_point() {
        let obs = observation();
        let info = NominalSolver
            .calibrate(&[obs.model_points], &[obs.image_points], (640, 480), None)
            .unwrap();
        assert_eq!(info.camera_matrix[0][2], 320.0);
        assert_eq!(info.camera_matrix[1][2], 240.0);
        assert_eq!(info.camera_matrix[0][0], 640.0);
    }

    #[test]
    fn test_nominal_solver_requires_observations() {
        assert!(NominalSolver.calibrate(&[], &[], (640, 480), None).is_err());
    }

    #[test]
    fn test_mock_solver_receives_dataset_size() {
        let mut solver = MockCalibrationSolver::new();
        solver
            .expect_calibrate()
            .withf(|objects, images, size, _| objects.len() == 2 && images.len() == 2 && *size == (640, 480))
            .times(1)
            .returning(|_, _, _, _| Ok(CameraInfo::default()));

        let obs = observation();
        let objects = vec![obs.model_points.clone(), obs.model_points];
        let images = vec![obs.image_points.clone(), obs.image_points];
        assert!(solver.calibrate(&objects, &images, (640, 480), None).is_ok());
    }
}
