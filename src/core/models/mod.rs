pub mod tokens;
pub mod usage;
