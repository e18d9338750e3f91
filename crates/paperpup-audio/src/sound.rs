//! Owning handle to a voice in the mixer.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::Arc;

use crate::block::BlockMemory;
use crate::mixer::{Mixer, MixerLock, VoiceId};
use crate::voice::{EnvelopePhase, Voice, VoiceControls};

/// A voice registered with a [`Mixer`].
///
/// Dropping the sound stops the voice and frees its slot.
pub struct Sound {
    mixer: Arc<Mixer>,
    id: VoiceId,
    controls: Arc<VoiceControls>,
}

impl Sound {
    /// Register `voice` with `mixer`. The sound starts stopped.
    pub fn new(mixer: Arc<Mixer>, voice: Voice) -> Self {
        let controls = Arc::clone(voice.controls());
        let id = mixer.insert(voice);
        Self {
            mixer,
            id,
            controls,
        }
    }

    /// Id of the voice in the mixer.
    pub const fn id(&self) -> VoiceId {
        self.id
    }

    /// Start mixing the voice.
    pub fn play(&self) {
        self.mixer.play(self.id);
    }

    /// Stop mixing the voice. Its decode position is kept.
    pub fn stop(&self) {
        self.mixer.stop(self.id);
    }

    /// Whether the voice is being mixed.
    pub fn is_playing(&self) -> bool {
        self.mixer.is_playing(self.id)
    }

    /// Whether the voice is producing sound.
    pub fn is_keyed_on(&self) -> bool {
        self.mixer
            .with_voice(self.id, |voice| voice.is_keyed_on())
            .unwrap_or(false)
    }

    /// Set left and right volume without taking the mixer lock.
    pub fn set_volume(&self, left: i16, right: i16) {
        self.controls.set_volume(left, right);
    }

    /// Set the playback step without taking the mixer lock.
    pub fn set_sample_rate(&self, step: u16) {
        self.controls.set_sample_rate(step);
    }

    /// Lock the mixer for direct access to the voice.
    ///
    /// The audio callback is held off until the returned guard is dropped,
    /// so several changes made through it land in the same mixing pass.
    pub fn source(&self) -> SoundPtr<'_> {
        SoundPtr {
            lock: self.mixer.lock(),
            id: self.id,
        }
    }
}

impl Drop for Sound {
    fn drop(&mut self) {
        self.mixer.remove(self.id);
    }
}

impl std::fmt::Debug for Sound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sound").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Locked access to a sound's voice.
pub struct SoundPtr<'a> {
    lock: MixerLock<'a>,
    id: VoiceId,
}

impl SoundPtr<'_> {
    fn with<R>(&self, f: impl FnOnce(&mut Voice) -> R) -> Option<R> {
        self.lock.with_voice(self.id, f)
    }

    /// Restart playback at block `start`, looping back to `loop_index`.
    pub fn key_on(&self, start: usize, loop_index: usize) {
        self.with(|voice| voice.key_on(start, loop_index));
    }

    /// Silence the voice.
    pub fn key_off(&self) {
        self.with(Voice::key_off);
    }

    /// Rebind block memory. The voice is silent until the next key-on.
    pub fn set_memory(&self, memory: BlockMemory) {
        self.with(|voice| voice.set_memory(memory));
    }

    /// Store packed ADSR parameters.
    pub fn set_adsr(&self, raw: u32) {
        self.with(|voice| voice.set_adsr(raw));
    }

    /// Current envelope phase.
    pub fn envelope(&self) -> EnvelopePhase {
        self.with(|voice| voice.envelope()).unwrap_or_default()
    }

    /// Set left and right volume (`0x4000` is unity).
    pub fn set_volume(&self, left: i16, right: i16) {
        self.with(|voice| voice.set_volume(left, right));
    }

    /// Set the playback step (`0x1000` plays at the authored pitch).
    pub fn set_sample_rate(&self, step: u16) {
        self.with(|voice| voice.set_sample_rate(step));
    }

    /// Whether the voice is being mixed.
    pub fn is_playing(&self) -> bool {
        self.lock.is_playing(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, BlockFlags, SAMPLES_PER_BLOCK};
    use crate::mixer::MixBuffer;
    use crate::voice::SOURCE_RATE;

    fn sound(mixer: &Arc<Mixer>, flags: BlockFlags) -> Sound {
        let block = Block::encode(0, 0, flags, &[7; SAMPLES_PER_BLOCK]);
        let voice = Voice::with_memory(BlockMemory::from_blocks(&[block]), 0, 0);
        Sound::new(Arc::clone(mixer), voice)
    }

    #[test]
    fn test_play_stop() {
        let mixer = Arc::new(Mixer::new());
        let sound = sound(&mixer, BlockFlags::LOOP | BlockFlags::SUSTAIN);

        assert!(!sound.is_playing());
        sound.play();
        assert!(sound.is_playing());
        assert!(sound.is_keyed_on());
        sound.stop();
        assert!(!sound.is_playing());
    }

    #[test]
    fn test_drop_removes_voice() {
        let mixer = Arc::new(Mixer::new());
        let sound = sound(&mixer, BlockFlags::LOOP | BlockFlags::SUSTAIN);
        let id = sound.id();
        sound.play();

        drop(sound);
        assert_eq!(mixer.voice_count(), 0);
        assert_eq!(mixer.active_count(), 0);
        assert!(!mixer.play(id));
    }

    #[test]
    fn test_source_guard_controls_voice() {
        let mixer = Arc::new(Mixer::new());
        let sound = sound(&mixer, BlockFlags::LOOP);
        sound.play();

        {
            let source = sound.source();
            source.key_off();
            assert_eq!(source.envelope(), EnvelopePhase::Off);
            source.set_adsr(0x1234);
            source.key_on(0, 0);
            assert_eq!(source.envelope(), EnvelopePhase::Attack);
            assert!(source.is_playing());
        }

        assert_eq!(mixer.with_voice(sound.id(), |v| v.adsr()), Some(0x1234));
    }

    #[test]
    fn test_set_memory_through_source() {
        let mixer = Arc::new(Mixer::new());
        let sound = sound(&mixer, BlockFlags::LOOP);
        let replacement = Block::encode(0, 0, BlockFlags::LOOP, &[-7; SAMPLES_PER_BLOCK]);

        let source = sound.source();
        source.set_memory(BlockMemory::from_blocks(&[replacement]));
        assert_eq!(source.envelope(), EnvelopePhase::Off);
        source.key_on(0, 0);
        drop(source);

        sound.play();
        let mut buffer = MixBuffer::default();
        let mut out = vec![0i16; 16 * 2];
        mixer.mix(SOURCE_RATE, &mut buffer, &mut out);
        assert!(out[8 * 2..].iter().all(|&s| s < 0));
    }

    #[test]
    fn test_lock_free_controls_reach_voice() {
        let mixer = Arc::new(Mixer::new());
        let sound = sound(&mixer, BlockFlags::LOOP | BlockFlags::SUSTAIN);
        sound.set_volume(0, 0);
        sound.play();

        let mut buffer = MixBuffer::default();
        let mut out = vec![0x55i16; 16 * 2];
        mixer.mix(SOURCE_RATE, &mut buffer, &mut out);
        assert!(out.iter().all(|&s| s == 0));

        sound.source().set_volume(0x4000, 0);
        sound.set_sample_rate(0x0800);
        mixer.mix(SOURCE_RATE, &mut buffer, &mut out);
        assert!(out[8 * 2..].chunks_exact(2).all(|f| f[0] > 0 && f[1] == 0));
        assert_eq!(
            mixer.with_voice(sound.id(), |v| v.controls().sample_rate()),
            Some(0x0800)
        );
    }

    #[test]
    fn test_finished_sound_reports_keyed_off() {
        let mixer = Arc::new(Mixer::new());
        let sound = sound(&mixer, BlockFlags::LOOP);
        sound.play();

        let mut buffer = MixBuffer::default();
        let mut out = vec![0i16; 64 * 2];
        mixer.mix(SOURCE_RATE, &mut buffer, &mut out);

        assert!(!sound.is_keyed_on());
        assert!(sound.is_playing());
    }
}
