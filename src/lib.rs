pub mod api;
pub mod clients;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod processor;
pub mod publish;
pub mod recovery;
pub mod scheduler;

#[cfg(test)]
mod testutil;
