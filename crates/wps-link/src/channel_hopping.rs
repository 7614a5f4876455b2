//! Channel hopping sequence.
//!
//! A connection walks a fixed channel sequence, one step per hop. Channel numbers in the
//! sequence are first mapped through a lookup table so that the same configured sequence can be
//! shuffled per network: the distinct channels, in first-seen order, are assigned a seeded
//! permutation of themselves. Both ends build the same table from the same configuration, so only
//! the position in the sequence needs to be exchanged.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wps_config::CfgChannelHopping;
use wps_core::{LinkError, MAX_CHANNEL_COUNT, MAX_HOP_SEQUENCE_SIZE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHopping {
    hop_seq_index: u8,
    channel_sequence: Vec<u8>,
    /// Configured channel number -> channel actually used
    channel_lookup_table: [u8; MAX_CHANNEL_COUNT],
}

impl ChannelHopping {
    pub fn new(
        channel_sequence: &[u8],
        random_sequence_enabled: bool,
        random_sequence_seed: u8,
    ) -> Result<Self, LinkError> {
        if channel_sequence.is_empty() || channel_sequence.len() > MAX_HOP_SEQUENCE_SIZE {
            return Err(LinkError::ChannelSequenceLength {
                len: channel_sequence.len(),
                max: MAX_HOP_SEQUENCE_SIZE,
            });
        }
        if let Some(&channel) = channel_sequence.iter().find(|&&c| c as usize >= MAX_CHANNEL_COUNT) {
            return Err(LinkError::InvalidChannel {
                channel,
                max: MAX_CHANNEL_COUNT,
            });
        }

        let distinct = distinct_channels(channel_sequence);
        let remapped = if random_sequence_enabled {
            shuffle(&distinct, random_sequence_seed)
        } else {
            distinct.clone()
        };

        let mut channel_lookup_table: [u8; MAX_CHANNEL_COUNT] = std::array::from_fn(|c| c as u8);
        for (&from, &to) in distinct.iter().zip(remapped.iter()) {
            channel_lookup_table[from as usize] = to;
        }
        tracing::debug!(
            "channel hopping: {} hops over {:?} remapped to {:?}",
            channel_sequence.len(),
            distinct,
            remapped
        );

        Ok(Self {
            hop_seq_index: 0,
            channel_sequence: channel_sequence.to_vec(),
            channel_lookup_table,
        })
    }

    pub fn from_config(cfg: &CfgChannelHopping) -> Result<Self, LinkError> {
        Self::new(&cfg.channel_sequence, cfg.random_sequence_enabled, cfg.random_sequence_seed)
    }

    /// Advances `increment` hops, wrapping at the end of the sequence
    pub fn increment_sequence(&mut self, increment: u8) {
        let next = (self.hop_seq_index as usize + increment as usize) % self.channel_sequence.len();
        self.hop_seq_index = next as u8;
    }

    /// Jumps to `seq_index`, reduced modulo the sequence size
    pub fn set_seq_index(&mut self, seq_index: u8) {
        self.hop_seq_index = (seq_index as usize % self.channel_sequence.len()) as u8;
    }

    pub fn get_seq_index(&self) -> u8 {
        self.hop_seq_index
    }

    /// Channel for the current hop
    pub fn get_channel(&self) -> u8 {
        let configured = self.channel_sequence[self.hop_seq_index as usize];
        self.channel_lookup_table[configured as usize]
    }

    pub fn sequence_size(&self) -> usize {
        self.channel_sequence.len()
    }
}

fn distinct_channels(sequence: &[u8]) -> Vec<u8> {
    let mut distinct = Vec::with_capacity(MAX_CHANNEL_COUNT);
    for &channel in sequence {
        if !distinct.contains(&channel) {
            distinct.push(channel);
        }
    }
    distinct
}

/// Draws the channels one by one from the remaining pool
fn shuffle(channels: &[u8], seed: u8) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed as u64);
    let mut pool = channels.to_vec();
    let mut out = Vec::with_capacity(pool.len());
    while !pool.is_empty() {
        let k = rng.random_range(0..pool.len());
        out.push(pool.remove(k));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels_of_one_round(ch: &mut ChannelHopping) -> Vec<u8> {
        (0..ch.sequence_size())
            .map(|_| {
                let c = ch.get_channel();
                ch.increment_sequence(1);
                c
            })
            .collect()
    }

    #[test]
    fn test_plain_sequence() {
        let mut ch = ChannelHopping::new(&[2, 0, 4, 0], false, 0).unwrap();
        assert_eq!(channels_of_one_round(&mut ch), vec![2, 0, 4, 0]);
        assert_eq!(ch.get_seq_index(), 0);
    }

    #[test]
    fn test_increment_wraps() {
        let mut ch = ChannelHopping::new(&[0, 1, 2], false, 0).unwrap();
        ch.increment_sequence(2);
        assert_eq!(ch.get_seq_index(), 2);
        ch.increment_sequence(2);
        assert_eq!(ch.get_seq_index(), 1);
        ch.increment_sequence(255);
        // (1 + 255) mod 3
        assert_eq!(ch.get_seq_index(), 1);
    }

    #[test]
    fn test_set_seq_index() {
        let mut ch = ChannelHopping::new(&[3, 1, 4, 1], false, 0).unwrap();
        ch.set_seq_index(2);
        assert_eq!(ch.get_seq_index(), 2);
        assert_eq!(ch.get_channel(), 4);
        // Index past the end wraps instead of pointing outside the sequence
        ch.set_seq_index(9);
        assert_eq!(ch.get_seq_index(), 1);
        assert_eq!(ch.get_channel(), 1);
    }

    #[test]
    fn test_random_remap_is_permutation_of_used_channels() {
        let sequence = [4, 1, 1, 3, 4, 0];
        let mut ch = ChannelHopping::new(&sequence, true, 42).unwrap();
        let hops = channels_of_one_round(&mut ch);

        // Same configured channel always lands on the same channel
        assert_eq!(hops[1], hops[2]);
        assert_eq!(hops[0], hops[4]);
        let mut used: Vec<u8> = distinct_channels(&hops);
        used.sort_unstable();
        assert_eq!(used, vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_same_seed_same_table() {
        let a = ChannelHopping::new(&[0, 1, 2, 3, 4], true, 7).unwrap();
        let b = ChannelHopping::new(&[0, 1, 2, 3, 4], true, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_bad_sequence() {
        assert_eq!(
            ChannelHopping::new(&[], false, 0),
            Err(LinkError::ChannelSequenceLength {
                len: 0,
                max: MAX_HOP_SEQUENCE_SIZE
            })
        );
        assert_eq!(
            ChannelHopping::new(&[0, 5], false, 0),
            Err(LinkError::InvalidChannel {
                channel: 5,
                max: MAX_CHANNEL_COUNT
            })
        );
        assert!(ChannelHopping::new(&[1; MAX_HOP_SEQUENCE_SIZE], false, 0).is_ok());
        assert!(ChannelHopping::new(&[1; MAX_HOP_SEQUENCE_SIZE + 1], false, 0).is_err());
    }

    #[test]
    fn test_from_default_config() {
        let ch = ChannelHopping::from_config(&CfgChannelHopping::default()).unwrap();
        assert_eq!(ch.sequence_size(), 5);
        assert_eq!(ch.get_channel(), 0);
    }
}
