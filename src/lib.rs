//! Counts every keystroke made on the machine and keeps a per-day history of the totals.
//! A small daemon taps the system key event stream, rolls the running count into history at
//! local midnight, and the cli renders statistics from the persisted state.
//!

pub mod cli;
pub mod daemon;
pub mod key_source;
pub mod utils;
