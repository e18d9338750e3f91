//! Voice arena and the device mixing pass.
//!
//! Voices live in an arena addressed by [`VoiceId`]. The ids of playing
//! voices form the active set. Arena and active set sit behind one
//! re-entrant lock that the mixing pass holds from the first voice to the
//! last, so a voice is never stopped, removed or re-keyed halfway through a
//! device buffer.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::cell::RefCell;
use std::collections::HashSet;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, warn};

use crate::decode::clip_sample;
use crate::voice::Voice;

/// Stable handle to a voice in a [`Mixer`].
///
/// Removing a voice bumps its slot's generation, so ids of removed voices
/// never resolve to a later occupant of the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId {
    index: u32,
    generation: u32,
}

impl VoiceId {
    /// Arena slot of the voice.
    pub const fn index(self) -> u32 {
        self.index
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    voice: Option<Voice>,
}

#[derive(Debug, Default)]
struct MixerState {
    slots: Vec<Slot>,
    free: Vec<u32>,
    active: HashSet<VoiceId>,
}

fn resolve(slots: &mut [Slot], id: VoiceId) -> Option<&mut Voice> {
    slots
        .get_mut(id.index as usize)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.voice.as_mut())
}

impl MixerState {
    fn contains(&self, id: VoiceId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|slot| slot.generation == id.generation && slot.voice.is_some())
    }
}

/// Scratch space for [`Mixer::mix`], owned by the caller.
///
/// Buffers only grow, so once sized for the device's largest request a
/// callback never allocates.
#[derive(Debug, Default)]
pub struct MixBuffer {
    scratch: Vec<i16>,
    accum: Vec<i32>,
}

impl MixBuffer {
    /// Create a buffer sized for `frames` stereo frames.
    pub fn with_capacity(frames: usize) -> Self {
        Self {
            scratch: Vec::with_capacity(frames * 2),
            accum: Vec::with_capacity(frames * 2),
        }
    }

    /// Stereo frames the buffer holds without reallocating.
    pub fn capacity(&self) -> usize {
        self.scratch.capacity().min(self.accum.capacity()) / 2
    }

    fn prepare(&mut self, samples: usize) {
        self.scratch.resize(samples, 0);
        self.accum.clear();
        self.accum.resize(samples, 0);
    }
}

/// Set of voices mixed into the audio output.
#[derive(Debug, Default)]
pub struct Mixer {
    state: ReentrantMutex<RefCell<MixerState>>,
}

impl Mixer {
    /// Create an empty mixer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the mixer lock, blocking until any mixing pass in progress ends.
    ///
    /// The lock is re-entrant: the holder may keep calling mixer methods.
    pub fn lock(&self) -> MixerLock<'_> {
        MixerLock {
            guard: self.state.lock(),
        }
    }

    /// Add a voice to the arena. It is not played until [`Self::play`].
    pub fn insert(&self, voice: Voice) -> VoiceId {
        self.lock().insert(voice)
    }

    /// Stop a voice and take it out of the arena.
    pub fn remove(&self, id: VoiceId) -> Option<Voice> {
        self.lock().remove(id)
    }

    /// Start mixing a voice. Returns false if the id is stale.
    pub fn play(&self, id: VoiceId) -> bool {
        self.lock().play(id)
    }

    /// Stop mixing a voice. Returns whether it was playing.
    pub fn stop(&self, id: VoiceId) -> bool {
        self.lock().stop(id)
    }

    /// Whether a voice is in the active set.
    pub fn is_playing(&self, id: VoiceId) -> bool {
        self.lock().is_playing(id)
    }

    /// Number of voices being mixed.
    pub fn active_count(&self) -> usize {
        self.lock().active_count()
    }

    /// Number of voices in the arena.
    pub fn voice_count(&self) -> usize {
        self.lock().voice_count()
    }

    /// Run `f` on a voice while holding the lock.
    ///
    /// `f` must not call back into the mixer: the voice is mutably borrowed
    /// for the duration of the call and a nested mixer call panics.
    pub fn with_voice<R>(&self, id: VoiceId, f: impl FnOnce(&mut Voice) -> R) -> Option<R> {
        self.lock().with_voice(id, f)
    }

    /// Mix every active voice into `out` as interleaved stereo at `output_rate`.
    ///
    /// Voices are summed at 32 bits and clipped once at the end. With no
    /// active voices `out` is filled with silence.
    pub fn mix(&self, output_rate: u32, buffer: &mut MixBuffer, out: &mut [i16]) {
        buffer.prepare(out.len());

        {
            let lock = self.lock();
            let mut state = lock.guard.borrow_mut();
            let MixerState { slots, active, .. } = &mut *state;

            for &id in active.iter() {
                let Some(voice) = resolve(slots, id) else {
                    continue;
                };

                voice.decode(output_rate, &mut buffer.scratch);
                for (sum, &sample) in buffer.accum.iter_mut().zip(&buffer.scratch) {
                    *sum += i32::from(sample);
                }
            }
        }

        for (sample, &sum) in out.iter_mut().zip(&buffer.accum) {
            *sample = clip_sample(sum);
        }
    }
}

/// Scoped hold on the mixer lock.
///
/// The audio callback cannot run while a `MixerLock` is alive; dropping it
/// releases the lock.
pub struct MixerLock<'a> {
    guard: ReentrantMutexGuard<'a, RefCell<MixerState>>,
}

impl MixerLock<'_> {
    /// Add a voice to the arena.
    pub fn insert(&self, voice: Voice) -> VoiceId {
        let mut state = self.guard.borrow_mut();

        let id = if let Some(index) = state.free.pop() {
            let slot = &mut state.slots[index as usize];
            slot.voice = Some(voice);
            VoiceId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = state.slots.len() as u32;
            state.slots.push(Slot {
                generation: 0,
                voice: Some(voice),
            });
            VoiceId {
                index,
                generation: 0,
            }
        };

        debug!("Voice {} inserted", id.index);
        id
    }

    /// Stop a voice and take it out of the arena.
    pub fn remove(&self, id: VoiceId) -> Option<Voice> {
        let mut state = self.guard.borrow_mut();
        if !state.contains(id) {
            return None;
        }

        state.active.remove(&id);
        let slot = &mut state.slots[id.index as usize];
        let voice = slot.voice.take();
        slot.generation = slot.generation.wrapping_add(1);
        state.free.push(id.index);

        debug!("Voice {} removed", id.index);
        voice
    }

    /// Start mixing a voice. Returns false if the id is stale.
    pub fn play(&self, id: VoiceId) -> bool {
        let mut state = self.guard.borrow_mut();
        if !state.contains(id) {
            warn!("Ignoring play for stale voice {}", id.index);
            return false;
        }

        state.active.insert(id);
        true
    }

    /// Stop mixing a voice. Returns whether it was playing.
    pub fn stop(&self, id: VoiceId) -> bool {
        let mut state = self.guard.borrow_mut();
        if !state.contains(id) {
            warn!("Ignoring stop for stale voice {}", id.index);
            return false;
        }

        state.active.remove(&id)
    }

    /// Whether a voice is in the active set.
    pub fn is_playing(&self, id: VoiceId) -> bool {
        self.guard.borrow().active.contains(&id)
    }

    /// Number of voices being mixed.
    pub fn active_count(&self) -> usize {
        self.guard.borrow().active.len()
    }

    /// Number of voices in the arena.
    pub fn voice_count(&self) -> usize {
        let state = self.guard.borrow();
        state.slots.len() - state.free.len()
    }

    /// Run `f` on a voice. `f` must not call back into the mixer.
    pub fn with_voice<R>(&self, id: VoiceId, f: impl FnOnce(&mut Voice) -> R) -> Option<R> {
        let mut state = self.guard.borrow_mut();
        resolve(&mut state.slots, id).map(f)
    }
}
