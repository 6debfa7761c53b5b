//! DataGPT: load a tabular dataset, ask questions in natural language,
//! validate and execute the generated analysis code in-process.

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod dataset;
pub mod handlers;
pub mod llm;
pub mod printer;
pub mod render;
pub mod session;
