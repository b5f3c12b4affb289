//! Run events and the sinks that receive them.
//!
//! Every transition of a run produces exactly one [`RunEvent`]. The same
//! event is yielded to streaming consumers and handed to the pipeline's
//! [`EventSink`].

mod run_event;
mod sink;

pub use run_event::{RunEvent, RunEventKind};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
