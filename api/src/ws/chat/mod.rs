pub mod emit;
pub mod payload;
