// ABOUTME: Library root for the dataset toolkit
// ABOUTME: Each workflow module is independent and talks to the API through remote::DatasetApi

pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod mappings;
pub mod remote;
pub mod schema;
pub mod tabular;
pub mod upload;
