//! Runnable compositions of shell sessions and bridging over the in-process
//! broker, plus the command line front door.

pub mod cli;
pub mod scenarios;
