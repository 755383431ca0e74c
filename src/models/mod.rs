mod plan;
mod switch_model;
mod topology;

pub use plan::*;
pub use switch_model::*;
pub use topology::*;
