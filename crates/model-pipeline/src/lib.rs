pub mod combine;
pub mod export;
pub mod loader;
pub mod measure;
pub mod transform;
pub mod types;

pub use combine::{combine, preview_separation};
pub use export::{render_mesh_to_stl, stl_data_url, MeshExporter, StlDataUrlExporter};
pub use loader::{load, load_request};
pub use measure::measure;
pub use transform::{translation_along, Axis, SeparationPolicy, Transform};
pub use types::*;
