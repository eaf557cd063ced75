pub mod config;
pub mod contract;
pub mod cse;
pub mod etypes;
pub mod expr;
pub mod format;
pub mod keccak;
pub mod traversals;
pub mod types;
