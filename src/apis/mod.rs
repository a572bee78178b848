pub mod ateneul;
pub mod base;
pub mod enescu;
pub mod factory;
pub mod jfr;

pub use factory::{create_all_units, create_unit};
