//! # visflow: data-flow execution core for vision pipelines
//!
//! Independently written processing components are wired into a directed
//! graph of typed ports. Writing to an output port buffers the value in every
//! connected input and raises an event; the scheduler then runs each handler
//! that declared that input as a dependency. Components move through an
//! explicit lifecycle and are configured through string-translated
//! properties, so a whole pipeline can be described in a TOML file.
//!
//! ## Architecture
//!
//! - **Pipeline core** (`pipeline`): properties, ports, handlers, lifecycle,
//!   catalog and the two execution strategies (event loop and per-component
//!   worker threads)
//! - **Components** (`components`): built-in vision adapters over `imgproc`
//! - **Configuration** (`config`): TOML pipeline descriptions
//! - **Communication**: crossbeam channels carry data-ready and control events
//!
//! ## Example
//!
//! ```ignore
//! use visflow::{components::builtin_catalog, config::PipelineConfig, types::Mat};
//! use visflow::pipeline::{InPort, OutPort};
//!
//! let config = PipelineConfig::load("demos/pipeline.toml")?;
//! let mut pipeline = config.build(&builtin_catalog()?)?;
//!
//! let camera = OutPort::<Mat>::new("camera");
//! pipeline.connect_external(&camera, "gray.in_img")?;
//!
//! pipeline.init_all()?;
//! pipeline.start_all()?;
//! camera.write(Mat::gradient(48, 64, 3, 0))?;
//! pipeline.run_until_idle();
//! pipeline.stop_all()?;
//! pipeline.finish_all()?;
//! ```

pub mod components;
pub mod config;
pub mod error;
pub mod imgproc;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use config::{ExecutionMode, PipelineConfig};
pub use error::{Result, VisflowError};
pub use pipeline::{
    Catalog, Component, InPort, Interface, LifecycleState, OutPort, Pipeline, PipelineError,
    PipelineResult, Property, PropertyRegistry, ThreadedPipeline,
};
pub use types::Mat;
