//! A small host program whose validation code is produced by the generator
//! at build time and compiled with the crate.

pub mod app;
pub mod models;

/// Generated instance table, routines and plans.
pub mod validation {
    include!(concat!(env!("OUT_DIR"), "/validation_instances.rs"));
    include!(concat!(env!("OUT_DIR"), "/validation_routines.rs"));
    include!(concat!(env!("OUT_DIR"), "/validation_filters.rs"));
}
