mod half_space;
mod line;
mod plane;

pub use half_space::*;
pub use line::*;
pub use plane::*;
