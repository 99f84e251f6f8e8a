//! Report building and output.

pub mod generator;
pub mod render;
pub mod sections;

pub use generator::write_summary;
pub use render::Renderer;
pub use sections::{frequency_sweep, joint_heatmaps, noise_sweep, planned_patterns, SectionContext};
