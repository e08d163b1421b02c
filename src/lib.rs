//! snapdump: downtime-free logical dumps of RDS instances.
//!
//! Restores a point-in-time snapshot of a live instance into a brand-new
//! throwaway instance, dumps it with the engine-native tool, then deletes
//! the throwaway instance. The production instance is never touched.

pub mod cli;
pub mod config;
pub mod dump;
pub mod errors;
pub mod ident;
pub mod provision;
pub mod rds;
pub mod snapshot;
pub mod workflow;
