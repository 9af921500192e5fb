// Relay Kernel
//
// Metadata-driven ETL engine: resolves an inbound file against
// trigger definitions and executes the triggered job's steps,
// recording every transition in an audit log.

pub mod adapters;
pub mod audit;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod metadata;
pub mod pattern;
pub mod runner;
pub mod trigger;

#[cfg(test)]
mod testing;
