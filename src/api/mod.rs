//! Clients of the services this one calls out to.

pub mod orders;
