/// Newton iterations for small, fixed-size non-linear systems
pub mod newton;
