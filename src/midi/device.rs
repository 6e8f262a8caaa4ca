// Instrument registry - discoverable MIDI output ports the engine can
// route tracks to

use midir::{MidiOutput, MidiOutputPort};

/// A writable MIDI destination
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrumentInfo {
    pub id: String,
    /// Human-readable port name
    pub name: String,
    pub is_default: bool,
}

/// Enumerates the MIDI output ports available on this machine
pub struct InstrumentRegistry;

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self
    }

    /// List all writable MIDI ports
    ///
    /// A machine without MIDI ports yields an empty list, not an error.
    pub fn list_instruments(&self) -> Vec<InstrumentInfo> {
        let mut instruments = Vec::new();

        // Temporary client, only used to enumerate ports
        if let Ok(midi_out) = MidiOutput::new("gridseq scanner") {
            let ports = midi_out.ports();

            for (index, port) in ports.iter().enumerate() {
                if let Ok(name) = midi_out.port_name(port) {
                    instruments.push(InstrumentInfo {
                        id: format!("midi_out_{}", index),
                        name,
                        is_default: index == 0,
                    });
                }
            }
        }

        instruments
    }

    /// Get the first available output port
    pub fn default_port(&self) -> Option<(MidiOutput, MidiOutputPort)> {
        let midi_out = MidiOutput::new("gridseq output").ok()?;
        let port = midi_out.ports().into_iter().next()?;
        Some((midi_out, port))
    }

    /// Get an output port by its instrument name
    pub fn port_by_name(&self, instrument_name: &str) -> Option<(MidiOutput, MidiOutputPort)> {
        let midi_out = MidiOutput::new("gridseq output").ok()?;
        let ports = midi_out.ports();

        for port in ports {
            if let Ok(name) = midi_out.port_name(&port) {
                if name == instrument_name {
                    return Some((midi_out, port));
                }
            }
        }

        None
    }
}

impl Default for InstrumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_never_panics() {
        // CI machines usually expose no MIDI ports; the registry must not
        // treat that as a failure
        let registry = InstrumentRegistry::new();
        let instruments = registry.list_instruments();
        for (index, info) in instruments.iter().enumerate() {
            assert_eq!(info.is_default, index == 0);
        }
    }

    #[test]
    fn test_unknown_name_yields_none() {
        let registry = InstrumentRegistry::new();
        assert!(registry.port_by_name("gridseq: no such port").is_none());
    }
}
