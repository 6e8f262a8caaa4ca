// Integration tests: playback event generation across tracks and loops

use gridseq::sequencer::player::SequencerPlayer;
use gridseq::{MidiEvent, Song, TrackId};

/// Two tracks on different channels, patterns sequenced from beat 0
///
/// 48 kHz at the default 120 BPM puts one beat at 24000 frames.
fn two_track_song() -> (Song, TrackId, TrackId) {
    let mut song = Song::new(8, 48000);

    let lead = song.add_track("Lead");
    {
        let t = song.track_mut(lead).unwrap();
        let p = t.add_pattern("Melody", 2, 4);
        t.set_sequence_entry(0, p, None).unwrap();
        t.set_sequence_entry(2, p, None).unwrap();
        let pattern = t.pattern_mut(p).unwrap();
        pattern.add_note(0, 60, 100, 2).unwrap();
        pattern.add_note(4, 64, 100, 2).unwrap();
    }

    let drums = song.add_track("Drums");
    {
        let t = song.track_mut(drums).unwrap();
        t.set_channel(9).unwrap();
        let p = t.add_pattern("Kick", 1, 4);
        for beat in 0..4 {
            t.set_sequence_entry(beat, p, None).unwrap();
        }
        t.pattern_mut(p)
            .unwrap()
            .add_note(0, 36, 120, 1)
            .unwrap();
    }

    (song, lead, drums)
}

/// Every NoteOn must be followed by a NoteOff on the same channel and key
fn assert_paired(events: &[(TrackId, gridseq::MidiEventTimed)]) {
    let mut sounding: Vec<(u8, u8)> = Vec::new();
    for (_, timed) in events {
        match timed.event {
            MidiEvent::NoteOn { channel, key, .. } => {
                assert!(
                    !sounding.contains(&(channel, key)),
                    "retrigger without release on channel {} key {}",
                    channel,
                    key
                );
                sounding.push((channel, key));
            }
            MidiEvent::NoteOff { channel, key } => {
                let index = sounding
                    .iter()
                    .position(|&s| s == (channel, key))
                    .expect("NoteOff without a matching NoteOn");
                sounding.remove(index);
            }
            _ => {}
        }
    }
    assert!(sounding.is_empty(), "unterminated notes: {:?}", sounding);
}

#[test]
fn multi_track_events_interleave_on_their_channels() {
    let (song, lead, drums) = two_track_song();
    let mut player = SequencerPlayer::new();

    // One beat per block over four beats
    let mut all_events = Vec::new();
    for block in 0..4u64 {
        let start = block * 24000;
        all_events.extend(player.process_range(&song, start..start + 24000, 0));
    }

    let lead_ons = all_events
        .iter()
        .filter(|(t, e)| *t == lead && matches!(e.event, MidiEvent::NoteOn { .. }))
        .count();
    let drum_ons = all_events
        .iter()
        .filter(|(t, e)| *t == drums && matches!(e.event, MidiEvent::NoteOn { .. }))
        .count();

    // Melody twice through (2 notes each), kick on every beat
    assert_eq!(lead_ons, 4);
    assert_eq!(drum_ons, 4);

    for (track, timed) in &all_events {
        let expected = if *track == drums { 9 } else { 0 };
        assert_eq!(timed.event.channel(), expected);
    }

    assert_paired(&all_events);
}

#[test]
fn block_size_does_not_change_event_times() {
    let (song, _, _) = two_track_song();

    let mut coarse = SequencerPlayer::new();
    let coarse_events = coarse.process_range(&song, 0..96000, 0);

    let mut fine = SequencerPlayer::new();
    let mut fine_events = Vec::new();
    for block in 0..96u64 {
        let start = block * 1000;
        for (track, mut timed) in fine.process_range(&song, start..start + 1000, 0) {
            // Rebase offsets from block-relative to absolute
            timed.frames_from_now += start as u32;
            fine_events.push((track, timed));
        }
    }

    let times = |events: &[(TrackId, gridseq::MidiEventTimed)]| -> Vec<(u32, MidiEvent)> {
        events.iter().map(|(_, e)| (e.frames_from_now, e.event)).collect()
    };
    assert_eq!(times(&coarse_events), times(&fine_events));
}

#[test]
fn loop_wrap_releases_notes_between_halves() {
    let (song, _, _) = two_track_song();
    let mut player = SequencerPlayer::new();

    // Loop over beats 0..2; the block crosses the boundary mid-way, the
    // caller protocol is first half, all_notes_off, second half
    let loop_end = 48000u64;
    let start = 36000u64;
    let overshoot = 24000u64;

    let head = (loop_end - start) as u32;
    let tail = overshoot - (loop_end - start);
    let mut events = player.process_range(&song, start..loop_end, 0);
    events.extend(player.all_notes_off(head));
    events.extend(player.process_range(&song, 0..tail, head));
    // Stopping afterwards releases whatever the wrap restarted
    events.extend(player.all_notes_off(head + tail as u32));

    assert_paired(&events);

    // The lead note starting at the loop start sounds again after the wrap
    let restruck = events.iter().any(|(_, e)| {
        e.frames_from_now >= head
            && matches!(
                e.event,
                MidiEvent::NoteOn {
                    channel: 0,
                    key: 60,
                    ..
                }
            )
    });
    assert!(restruck);

    // Offsets never decrease across the stitched block
    let mut last = 0;
    for (_, timed) in &events {
        assert!(timed.frames_from_now >= last);
        last = timed.frames_from_now;
    }
}

#[test]
fn tempo_change_shifts_later_events() {
    let (mut song, _, _) = two_track_song();
    // Double speed from beat 1: beat 1 spans 12000 frames instead of 24000
    song.add_tempo_change(1, 240).unwrap();

    let mut player = SequencerPlayer::new();
    let events = player.process_range(&song, 0..60000, 0);

    // Lead melody note at beat 1 (step 4) lands at frame 24000 still, but
    // the second pass of the pattern (beat 2) starts at 24000 + 12000
    let second_pass_on = events
        .iter()
        .find(|(_, e)| {
            matches!(
                e.event,
                MidiEvent::NoteOn {
                    channel: 0,
                    key: 60,
                    ..
                }
            ) && e.frames_from_now > 0
        })
        .expect("second pattern pass present");
    assert_eq!(second_pass_on.1.frames_from_now, 36000);
}

#[test]
fn stop_mid_note_emits_all_offs() {
    let (song, lead, _) = two_track_song();
    let mut player = SequencerPlayer::new();

    // Stop 1000 frames in, while the first notes still sound
    let events = player.process_range(&song, 0..1000, 0);
    assert!(events
        .iter()
        .any(|(_, e)| matches!(e.event, MidiEvent::NoteOn { .. })));
    assert!(player.active_note_count() > 0);

    let offs = player.all_notes_off(0);
    assert!(offs.iter().all(|(_, e)| matches!(e.event, MidiEvent::NoteOff { .. })));
    assert!(offs.iter().any(|(t, _)| *t == lead));
    assert_eq!(player.active_note_count(), 0);
}
