mod client;
mod extraction;

pub use client::{CmrClient, CmrSearchPages};
pub use extraction::{extract_concept_info, extract_data};
