pub mod device;
pub mod event;
pub mod output;

pub use device::{InstrumentInfo, InstrumentRegistry};
pub use event::{MidiEvent, MidiEventTimed};
pub use output::InstrumentConnection;
