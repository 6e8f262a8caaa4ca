// MIDI output - an open connection to an instrument port

use crate::midi::device::InstrumentRegistry;
use crate::midi::event::MidiEvent;
use midir::MidiOutputConnection;

/// An open connection to a writable MIDI port
pub struct InstrumentConnection {
    name: String,
    connection: MidiOutputConnection,
}

impl InstrumentConnection {
    /// Connect to an instrument by port name
    pub fn connect(instrument_name: &str) -> Result<Self, String> {
        let registry = InstrumentRegistry::new();
        let (midi_out, port) = registry
            .port_by_name(instrument_name)
            .ok_or_else(|| format!("No MIDI output port named '{}'", instrument_name))?;

        let connection = midi_out
            .connect(&port, "gridseq-out")
            .map_err(|e| format!("Failed to connect to '{}': {}", instrument_name, e))?;

        Ok(Self {
            name: instrument_name.to_string(),
            connection,
        })
    }

    /// The port name this connection writes to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a single event
    pub fn send(&mut self, event: MidiEvent) {
        let bytes = event.to_bytes();
        if let Err(e) = self.connection.send(&bytes) {
            eprintln!("Warning: MIDI send to '{}' failed: {}", self.name, e);
        }
    }

    /// Send note-off for every key on a channel (used on stop/seek/panic)
    pub fn all_notes_off(&mut self, channel: u8) {
        // CC 123 = All Notes Off
        self.send(MidiEvent::ControlChange {
            channel,
            controller: 123,
            value: 0,
        });
    }
}
