pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod run;
pub mod sink;
