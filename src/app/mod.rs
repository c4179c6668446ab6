//! Application module: the `smartqueue` demo binary

pub mod cli;
pub mod demo;
pub mod startup;
