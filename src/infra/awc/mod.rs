mod client;

pub use client::AwcClient;
