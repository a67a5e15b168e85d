pub mod assign;
pub mod boarding;
pub mod compare;
pub mod config;
pub mod dataset;
pub mod fetch;
pub mod freshness;
pub mod metadata;
pub mod output;
pub mod period;
