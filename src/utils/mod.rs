pub mod logger;
pub mod rotate;
