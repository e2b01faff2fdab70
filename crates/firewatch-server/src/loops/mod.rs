//! Background loops.

pub mod cache_sweep_loop;
