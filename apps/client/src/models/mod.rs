pub mod job;
pub mod resume;

pub use job::{FacetCount, Job};
pub use resume::ResumeInput;
