//! Signed QX.Y fixed point arithmetic.
//!
//! A `QNum` is a plain `i32`. The format (integer bits X, precision bits Y) is not carried by the
//! number itself; callers hold an `FpFormat` and pass it to every operation on numbers of that
//! format. All arithmetic is done in 64-bit and clamped back to the i32 range, never wrapped.

use thiserror::Error;

pub type QNum = i32;

const FP_TOTAL_NUMBER_OF_BITS: u16 = 32;
pub const FP_DEFAULT_PRECISION: u8 = 16;
pub const FP_DEFAULT_INTEGER_BITS: u8 = 15;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpError {
    #[error("fixed point division by zero")]
    DivisionByZero,
}

/// How `FpFormat::initialize` arrived at the returned format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSource {
    /// Both bit counts used as given
    AsRequested,
    /// One of the two bit counts was zero and was derived from the other
    Derived,
    /// Both were zero or the sum did not fit 32 bits; the Q15.16 default was applied
    DefaultApplied,
}

/// A QX.Y format. Only `initialize` and `Default` build one, so `X + Y + 1` never exceeds 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpFormat {
    /// Number of fractional bits (Y)
    precision: u8,
    /// Number of integer bits (X), sign bit excluded
    integer_bits: u8,
}

impl Default for FpFormat {
    /// Q15.16
    fn default() -> Self {
        Self {
            precision: FP_DEFAULT_PRECISION,
            integer_bits: FP_DEFAULT_INTEGER_BITS,
        }
    }
}

impl FpFormat {
    /// Builds a format from the requested bit counts.
    ///
    /// - both zero, or `precision + integer + 1 > 32`: Q15.16 default
    /// - only one zero: derived as `32 - other - 1`
    /// - otherwise: as given
    ///
    /// The second tuple element tells which of these happened.
    pub fn initialize(precision_bits: u8, integer_bits: u8) -> (FpFormat, FormatSource) {
        let total_bits = precision_bits as u16 + integer_bits as u16 + 1;

        if (precision_bits == 0 && integer_bits == 0) || total_bits > FP_TOTAL_NUMBER_OF_BITS {
            tracing::warn!(
                "fixed point format Q{}.{} not usable, applying default Q{}.{}",
                integer_bits,
                precision_bits,
                FP_DEFAULT_INTEGER_BITS,
                FP_DEFAULT_PRECISION
            );
            (FpFormat::default(), FormatSource::DefaultApplied)
        } else if integer_bits == 0 {
            let fmt = FpFormat {
                precision: precision_bits,
                integer_bits: (FP_TOTAL_NUMBER_OF_BITS as u8) - precision_bits - 1,
            };
            (fmt, FormatSource::Derived)
        } else if precision_bits == 0 {
            let fmt = FpFormat {
                precision: (FP_TOTAL_NUMBER_OF_BITS as u8) - integer_bits - 1,
                integer_bits,
            };
            (fmt, FormatSource::Derived)
        } else {
            let fmt = FpFormat {
                precision: precision_bits,
                integer_bits,
            };
            (fmt, FormatSource::AsRequested)
        }
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn integer_bits(&self) -> u8 {
        self.integer_bits
    }

    /// Largest integer part representable in this format: 2^X - 1
    fn integer_max(&self) -> i64 {
        (1i64 << self.integer_bits) - 1
    }

    /// Smallest integer part representable in this format: -2^X
    fn integer_min(&self) -> i64 {
        -1 - self.integer_max()
    }

    fn scale(&self) -> i64 {
        1i64 << self.precision
    }

    pub fn float_to_q(&self, real_number: f32) -> QNum {
        let max = self.integer_max() as f32;
        let min = self.integer_min() as f32;
        let clamped = if real_number > max {
            max
        } else if real_number < min {
            min
        } else {
            real_number
        };
        // `as` truncates toward zero and saturates at the i32 bounds
        (clamped * self.scale() as f32) as QNum
    }

    pub fn q_to_float(&self, q_number: QNum) -> f32 {
        q_number as f32 / self.scale() as f32
    }

    pub fn int_to_q(&self, real_number: i32) -> QNum {
        saturate_32((real_number as i64) << self.precision)
    }

    /// Arithmetic shift, rounds toward negative infinity
    pub fn q_to_int(&self, q_number: QNum) -> i32 {
        q_number >> self.precision
    }

    pub fn multiply(&self, q_num1: QNum, q_num2: QNum) -> QNum {
        let product = (q_num1 as i64) * (q_num2 as i64);
        saturate_32(product >> self.precision)
    }

    /// The dividend is scaled up by the precision before dividing so the quotient keeps its
    /// fractional part.
    pub fn division(&self, q_num1: QNum, q_num2: QNum) -> Result<QNum, FpError> {
        if q_num2 == 0 {
            return Err(FpError::DivisionByZero);
        }
        let nominator_scale = (q_num1 as i64) << self.precision;
        Ok(saturate_32(nominator_scale / q_num2 as i64))
    }

    /// 1.0 in this format (2^Y)
    pub fn get_precision_q(&self) -> QNum {
        saturate_32(self.scale())
    }
}

pub fn add(q_num1: QNum, q_num2: QNum) -> QNum {
    saturate_32(q_num1 as i64 + q_num2 as i64)
}

pub fn sub(q_num1: QNum, q_num2: QNum) -> QNum {
    saturate_32(q_num1 as i64 - q_num2 as i64)
}

/// Clamps a 64-bit intermediate to the i32 range
#[inline]
pub fn saturate_32(value: i64) -> QNum {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as QNum
}
