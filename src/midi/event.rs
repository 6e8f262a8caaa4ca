// MIDI event types and the raw byte codec

/// A channel MIDI event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Pitch bend, signed around center: -8192..=8191
    PitchBend { channel: u8, value: i16 },
}

/// MIDI event with frame-accurate timing
/// `frames_from_now` is relative to the first frame of the current
/// processing block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEventTimed {
    pub event: MidiEvent,
    pub frames_from_now: u32,
}

impl MidiEvent {
    /// Parse a raw MIDI message
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }

        let status = bytes[0];
        let message_type = status & 0xF0;
        let channel = status & 0x0F;

        match message_type {
            0x90 => {
                // Note On; velocity 0 means Note Off
                if bytes.len() >= 3 {
                    let key = bytes[1];
                    let velocity = bytes[2];
                    if velocity == 0 {
                        Some(MidiEvent::NoteOff { channel, key })
                    } else {
                        Some(MidiEvent::NoteOn {
                            channel,
                            key,
                            velocity,
                        })
                    }
                } else {
                    None
                }
            }
            0x80 => {
                if bytes.len() >= 3 {
                    Some(MidiEvent::NoteOff {
                        channel,
                        key: bytes[1],
                    })
                } else {
                    None
                }
            }
            0xB0 => {
                if bytes.len() >= 3 {
                    Some(MidiEvent::ControlChange {
                        channel,
                        controller: bytes[1],
                        value: bytes[2],
                    })
                } else {
                    None
                }
            }
            0xE0 => {
                if bytes.len() >= 3 {
                    let lsb = bytes[1] as i16;
                    let msb = bytes[2] as i16;
                    let value = ((msb << 7) | lsb) - 8192;
                    Some(MidiEvent::PitchBend { channel, value })
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Encode as a raw 3-byte MIDI message
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            MidiEvent::NoteOn {
                channel,
                key,
                velocity,
            } => [0x90 | (channel & 0x0F), key & 0x7F, velocity & 0x7F],
            MidiEvent::NoteOff { channel, key } => [0x80 | (channel & 0x0F), key & 0x7F, 0],
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => [0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F],
            MidiEvent::PitchBend { channel, value } => {
                let raw = (value.clamp(-8192, 8191) + 8192) as u16;
                [
                    0xE0 | (channel & 0x0F),
                    (raw & 0x7F) as u8,
                    (raw >> 7) as u8,
                ]
            }
        }
    }

    /// The channel the event is addressed to
    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::PitchBend { channel, .. } => channel,
        }
    }
}
