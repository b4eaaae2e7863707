use crate::error::{Error, Result};

/// Bit layout of a generated ID, plus the custom epoch it is anchored to.
///
/// An ID packs three fields into the low 63 bits of a `u64`, leaving the most
/// significant bit clear so the value survives a round trip through a signed
/// 64-bit integer in other languages:
///
/// ```text
///  0TTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTSSSSSSSSSSQQQQQQQQQQQQ
///    timestamp (ms since epoch, 41)           shard (10) sequence (12)
/// ```
///
/// The epoch and bit split are part of the deployment contract: changing
/// either after IDs have been issued can reassign already-used bit patterns,
/// so treat them as immutable once live and migrate deliberately if they must
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdLayout {
    epoch_millis: u64,
    timestamp_bits: u8,
    shard_bits: u8,
    sequence_bits: u8,
}

impl IdLayout {
    /// Default width of the timestamp field, in bits (~69 years of range).
    pub const DEFAULT_TIMESTAMP_BITS: u8 = 41;
    /// Default width of the logical shard id field, in bits (1023 shards).
    pub const DEFAULT_SHARD_BITS: u8 = 10;
    /// Default width of the sequence field, in bits (4096 per grant cycle).
    pub const DEFAULT_SEQUENCE_BITS: u8 = 12;

    /// Total number of usable bits. The 64th is reserved for interop with
    /// signed integer types.
    pub const USABLE_BITS: u8 = 63;

    /// Creates the standard 41/10/12 layout anchored at `epoch_millis`
    /// (milliseconds since the Unix epoch).
    pub const fn new(epoch_millis: u64) -> Self {
        Self {
            epoch_millis,
            timestamp_bits: Self::DEFAULT_TIMESTAMP_BITS,
            shard_bits: Self::DEFAULT_SHARD_BITS,
            sequence_bits: Self::DEFAULT_SEQUENCE_BITS,
        }
    }

    /// Creates a layout with a custom bit split.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLayout`] unless the three widths total 63.
    pub fn with_bits(
        epoch_millis: u64,
        timestamp_bits: u8,
        shard_bits: u8,
        sequence_bits: u8,
    ) -> Result<Self> {
        if timestamp_bits as u32 + shard_bits as u32 + sequence_bits as u32
            != Self::USABLE_BITS as u32
        {
            return Err(Error::InvalidLayout {
                timestamp_bits,
                shard_bits,
                sequence_bits,
            });
        }
        Ok(Self {
            epoch_millis,
            timestamp_bits,
            shard_bits,
            sequence_bits,
        })
    }

    /// The custom epoch, in milliseconds since the Unix epoch.
    pub const fn epoch_millis(&self) -> u64 {
        self.epoch_millis
    }

    /// Largest sequence value that fits in the sequence field.
    pub const fn max_sequence(&self) -> u64 {
        (1 << self.sequence_bits) - 1
    }

    /// Largest batch a single allocation can grant without ambiguity.
    pub const fn max_batch_size(&self) -> u64 {
        self.max_sequence() + 1
    }

    /// Smallest valid logical shard id. 0 is reserved: it is what an
    /// unprovisioned backend node reports, and must be rejected.
    pub const fn min_shard_id(&self) -> u64 {
        1
    }

    /// Largest logical shard id that fits in the shard field.
    pub const fn max_shard_id(&self) -> u64 {
        (1 << self.shard_bits) - 1
    }

    const fn timestamp_shift(&self) -> u32 {
        (self.shard_bits + self.sequence_bits) as u32
    }

    /// Packs the three fields into a 63-bit word.
    ///
    /// Pure and infallible. Callers are responsible for range-checking the
    /// inputs first: values wider than their field would bleed into the
    /// neighboring fields, and a timestamp before the epoch would wrap the
    /// subtraction.
    pub const fn encode(&self, timestamp_millis: u64, shard_id: u64, sequence: u64) -> u64 {
        ((timestamp_millis - self.epoch_millis) << self.timestamp_shift())
            | (shard_id << self.sequence_bits)
            | sequence
    }

    /// Recovers the absolute timestamp (ms since the Unix epoch) from an
    /// encoded word.
    pub const fn decode_timestamp_millis(&self, value: u64) -> u64 {
        (value >> self.timestamp_shift()) + self.epoch_millis
    }

    /// Recovers the logical shard id from an encoded word.
    pub const fn decode_shard_id(&self, value: u64) -> u64 {
        (value >> self.sequence_bits) & self.max_shard_id()
    }

    /// Recovers the sequence from an encoded word.
    pub const fn decode_sequence(&self, value: u64) -> u64 {
        value & self.max_sequence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPOCH: u64 = 1455788600316;

    #[test]
    fn default_bounds() {
        let layout = IdLayout::new(EPOCH);
        assert_eq!(layout.max_sequence(), 4095);
        assert_eq!(layout.max_batch_size(), 4096);
        assert_eq!(layout.min_shard_id(), 1);
        assert_eq!(layout.max_shard_id(), 1023);
        assert_eq!(layout.epoch_millis(), EPOCH);
    }

    #[test]
    fn custom_bits_must_total_63() {
        assert!(IdLayout::with_bits(EPOCH, 40, 11, 12).is_ok());
        assert!(matches!(
            IdLayout::with_bits(EPOCH, 41, 10, 13),
            Err(Error::InvalidLayout { .. })
        ));
        assert!(matches!(
            IdLayout::with_bits(EPOCH, 41, 10, 11),
            Err(Error::InvalidLayout { .. })
        ));
    }

    #[test]
    fn encode_worked_example() {
        // epoch 1455788600316, backend time 1455788601.500000, shard 3, seq 0
        let layout = IdLayout::new(EPOCH);
        let encoded = layout.encode(1455788601500, 3, 0);
        assert_eq!(encoded, (1184 << 22) | (3 << 12));
        assert_eq!(encoded, 4966068224);
    }

    #[test]
    fn decode_recovers_fields() {
        let layout = IdLayout::new(EPOCH);
        let value = layout.encode(EPOCH + 123_456, 42, 4095);
        assert_eq!(layout.decode_timestamp_millis(value), EPOCH + 123_456);
        assert_eq!(layout.decode_shard_id(value), 42);
        assert_eq!(layout.decode_sequence(value), 4095);
    }

    #[test]
    fn msb_stays_clear_at_field_maxima() {
        let layout = IdLayout::new(0);
        let max_timestamp = (1 << 41) - 1;
        let value = layout.encode(max_timestamp, layout.max_shard_id(), layout.max_sequence());
        assert_eq!(value >> 63, 0);
        assert_eq!(value, (1 << 63) - 1);
    }

    #[test]
    fn custom_split_changes_bounds() {
        let layout = IdLayout::with_bits(EPOCH, 43, 8, 12).unwrap();
        assert_eq!(layout.max_shard_id(), 255);
        assert_eq!(layout.max_sequence(), 4095);
        let value = layout.encode(EPOCH + 1, 255, 7);
        assert_eq!(layout.decode_shard_id(value), 255);
        assert_eq!(layout.decode_sequence(value), 7);
    }
}
