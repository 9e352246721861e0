pub mod app;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fs_util;
pub mod normalize;
pub mod output;
pub mod query;
pub mod release;
pub mod tsv;
