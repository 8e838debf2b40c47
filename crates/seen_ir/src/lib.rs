//! Intermediate representation, code generation, and the fixed
//! optimizer pipeline for the toolchain's register-machine IR.

pub mod generator;
pub mod ir;
pub mod optimizer;

pub use generator::generate;
pub use ir::*;
pub use optimizer::optimize;
