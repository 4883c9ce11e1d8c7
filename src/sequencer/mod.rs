// Licensed under the MIT License.

//! Per-key FIFO ordering and a universal barrier, layered on top of a
//! [`crate::dispatcher::Dispatcher`].

mod config;
mod key_record;
#[allow(clippy::module_inception)]
mod sequencer;
mod sequencer_task;

pub use config::{ExceptionCallback, SequencerConfig};
pub use key_record::KeyStats;
pub use sequencer::{Sequencer, SequencerStats};

pub(crate) use sequencer::Inner;
