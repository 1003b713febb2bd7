//! Built-in vision components.
//!
//! Each component is a thin adapter: handlers read from their input ports,
//! call into [`crate::imgproc`] and write the result to their outputs.
//! [`register_builtin`] makes all of them available to a [`Catalog`] under
//! their kind names.

pub mod calib;
pub mod color_conv;
pub mod contour;
pub mod frame_info;
pub mod morphology;
pub mod mser;
pub mod split;
pub mod threshold;

pub use calib::{Calib, CalibrationSolver, NominalSolver};
pub use color_conv::CvColorConv;
pub use contour::CvContour;
pub use frame_info::FrameInfo;
pub use morphology::CvMorphology;
pub use mser::CvMSER;
pub use split::CvSplit;
pub use threshold::CvThreshold;

use crate::pipeline::{Catalog, PipelineResult};

/// Register every built-in kind.
pub fn register_builtin(catalog: &mut Catalog) -> PipelineResult<()> {
    catalog.register("CvColorConv", |_| Box::new(CvColorConv::new()))?;
    catalog.register("CvThreshold", |_| Box::new(CvThreshold::new()))?;
    catalog.register("CvSplit", |_| Box::new(CvSplit::new()))?;
    catalog.register("CvMorphology", |_| Box::new(CvMorphology::new()))?;
    catalog.register("CvContour", |_| Box::new(CvContour::new()))?;
    catalog.register("CvMSER", |_| Box::new(CvMSER::new()))?;
    catalog.register("Calib", |_| Box::new(Calib::new()))?;
    catalog.register("FrameInfo", |name| Box::new(FrameInfo::new(name)))?;
    Ok(())
}

/// Catalog with every built-in kind registered.
pub fn builtin_catalog() -> PipelineResult<Catalog> {
    let mut catalog = Catalog::new();
    register_builtin(&mut catalog)?;
    Ok(catalog)
}
