use crate::fixed_point::{saturate_32, FpError, FpFormat, QNum};

/// Running arithmetic mean over QX.Y samples.
///
/// Samples beyond `max_mean_size` are counted but not accumulated. `calculate` is a pure read;
/// only `reset` clears the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpMean {
    max_mean_size: u16,
    mean_index: u16,
    mean_accumulated_value: i64,
    mean_precision_bits: u8,
}

impl FpMean {
    pub fn new(format: &FpFormat, max_mean_size: u16) -> Self {
        Self {
            max_mean_size,
            mean_index: 0,
            mean_accumulated_value: 0,
            mean_precision_bits: format.precision(),
        }
    }

    /// Adds one sample and returns the accumulated sum.
    pub fn add(&mut self, value: QNum) -> i64 {
        self.mean_index = self.mean_index.saturating_add(1);
        if self.mean_index <= self.max_mean_size {
            self.mean_accumulated_value += value as i64;
        }
        self.mean_accumulated_value
    }

    pub fn reset(&mut self) {
        self.mean_accumulated_value = 0;
        self.mean_index = 0;
    }

    /// Mean of the accumulated samples, divided by `size` if nonzero, else by `max_mean_size`.
    pub fn calculate(&self, size: u16) -> Result<QNum, FpError> {
        let divisor = if size != 0 { size } else { self.max_mean_size };
        if divisor == 0 {
            return Err(FpError::DivisionByZero);
        }

        // i128 keeps the pre-shifted accumulator from overflowing for wide formats
        let mean_size_scale = (divisor as i128) << self.mean_precision_bits;
        let nominator_scale = (self.mean_accumulated_value as i128) << self.mean_precision_bits;
        let result = nominator_scale / mean_size_scale;

        let result = result.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Ok(saturate_32(result))
    }

    pub fn index(&self) -> u16 {
        self.mean_index
    }

    pub fn accumulated(&self) -> i64 {
        self.mean_accumulated_value
    }

    pub fn max_size(&self) -> u16 {
        self.max_mean_size
    }
}
