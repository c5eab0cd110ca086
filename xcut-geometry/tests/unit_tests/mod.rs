mod aabb;
mod hull;
