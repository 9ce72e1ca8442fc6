//! Session-scoped maximum-opening tracker
//!
//! The glove firmware reports *smaller* values for a *more open* hand, so the
//! "maximum opening amplitude" of a channel is the running **minimum** of its
//! readings. Whether that polarity is intended by the sensor calibration or a
//! latent inversion is not settled; the running-minimum rule is kept as is
//! until the calibration is confirmed.

use crate::protocol::{SensorReading, CHANNEL_COUNT};

/// Starting value for every channel. Greater than any valid reading, so the
/// first real sample always registers.
pub const SENTINEL: f64 = 1.1;

/// A set of channel indices, one bit per channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelSet(u32);

impl ChannelSet {
    pub fn insert(&mut self, channel: usize) {
        debug_assert!(channel < CHANNEL_COUNT);
        self.0 |= 1 << channel;
    }

    pub fn contains(&self, channel: usize) -> bool {
        channel < CHANNEL_COUNT && self.0 & (1 << channel) != 0
    }

    pub fn union(self, other: ChannelSet) -> ChannelSet {
        ChannelSet(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..CHANNEL_COUNT).filter(move |&c| self.contains(c))
    }
}

/// Running per-channel minimum since the last reset
#[derive(Clone, Debug)]
pub struct AmplitudeTracker {
    minima: [f64; CHANNEL_COUNT],
    collecting: bool,
}

impl AmplitudeTracker {
    pub fn new() -> Self {
        Self {
            minima: [SENTINEL; CHANNEL_COUNT],
            collecting: false,
        }
    }

    /// Fold a reading into the minima.
    ///
    /// Returns the channels whose minimum moved, so the caller only needs to
    /// redraw those.
    pub fn update(&mut self, reading: &SensorReading) -> ChannelSet {
        let mut updated = ChannelSet::default();
        for (channel, (&value, minimum)) in reading.iter().zip(self.minima.iter_mut()).enumerate()
        {
            if value < *minimum {
                *minimum = value;
                updated.insert(channel);
            }
        }
        self.collecting = false;
        updated
    }

    /// Start a new session: every channel goes back to the sentinel.
    pub fn reset(&mut self) {
        self.minima = [SENTINEL; CHANNEL_COUNT];
        self.collecting = true;
        log::info!("Maximum amplitude reset. Move the hand to record new values.");
    }

    /// True between a reset and the next update
    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Minimum recorded for `channel`, or `None` if nothing has registered
    /// since the last reset.
    pub fn minimum(&self, channel: usize) -> Option<f64> {
        self.minima
            .get(channel)
            .copied()
            .filter(|&value| value < SENTINEL)
    }

    pub fn minima(&self) -> &[f64; CHANNEL_COUNT] {
        &self.minima
    }
}

impl Default for AmplitudeTracker {
    fn default() -> Self {
        Self::new()
    }
}
