mod client;

pub use client::KmsClient;
