mod chunk;
mod concept;
mod extraction;
mod kms;

pub use chunk::*;
pub use concept::*;
pub use extraction::*;
pub use kms::*;
