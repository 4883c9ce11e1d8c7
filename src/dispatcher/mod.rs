// Licensed under the MIT License.

//! The top-level engine: owns the coroutine-worker and I/O-worker thread
//! pools and routes posted work onto them.

mod client;
mod config;
mod core;

pub use client::Dispatcher;
pub use config::DispatcherConfig;
