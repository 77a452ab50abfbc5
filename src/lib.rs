//! Screen time tracker for the terminal. Counts the time you spend at the machine, pauses while
//! you are away, and survives restarts by persisting its state next to its logs.

pub mod cli;
pub mod fs;
pub mod idle_api;
pub mod lifecycle;
pub mod notify;
pub mod overlay;
pub mod storage;
pub mod tracker;
pub mod utils;
