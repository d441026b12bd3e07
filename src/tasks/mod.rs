pub mod repair;
pub mod seed;
pub mod standings;
