pub mod app;
pub mod cache;
pub mod config;
pub mod domain;
pub mod ensembl;
pub mod error;
pub mod fs_util;
pub mod gene;
pub mod graph;
pub mod http;
pub mod import;
pub mod mirna;
pub mod ncbi;
pub mod output;
pub mod reconcile;
pub mod store;
pub mod uniprot;
