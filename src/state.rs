//! The scratch state threaded through the format description.
//!
//! The VC-2 pseudocode accumulates decoding state in a `State` map as it
//! reads the stream; the bitstream description here needs the subset of
//! that state which influences *parsing* (which branch to take, how many
//! coefficients a slice holds, and so on). One `State` is created per
//! sequence and mutated in place by the traversal functions.

use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

use crate::tables::ParseCode;

#[derive(Debug, Clone, Default)]
pub struct State {
    // (10.5.1) parse_info
    pub parse_code: ParseCode,
    pub next_parse_offset: u64,
    pub previous_parse_offset: u64,

    // (11.2.1) parse_parameters
    pub major_version: u64,
    pub minor_version: u64,
    pub profile: u64,
    pub level: u64,

    // (11.6) coding parameters
    pub luma_width: u64,
    pub luma_height: u64,
    pub color_diff_width: u64,
    pub color_diff_height: u64,
    pub luma_depth: u64,
    pub color_diff_depth: u64,

    // (12.4.1) transform_parameters
    pub wavelet_index: u64,
    pub dwt_depth: u64,
    pub wavelet_index_ho: u64,
    pub dwt_depth_ho: u64,

    // (12.4.5.2) slice_parameters
    pub slices_x: u64,
    pub slices_y: u64,
    pub slice_bytes_numerator: u64,
    pub slice_bytes_denominator: u64,
    pub slice_prefix_bytes: u64,
    pub slice_size_scaler: u64,

    // (12.2) / (14.2) picture and fragment headers
    pub picture_number: u64,
    pub fragment_data_length: u64,
    pub fragment_slice_count: u64,
    pub fragment_x_offset: u64,
    pub fragment_y_offset: u64,
}

/// Narrow an arbitrary-precision bitstream value to a `u64` for use in
/// state calculations, saturating rather than failing so that absurd
/// values in malformed streams degrade gracefully instead of aborting the
/// traversal. The tree always keeps the exact value.
pub fn to_u64(value: &BigInt) -> u64 {
    match value.sign() {
        Sign::Minus => 0,
        _ => value.to_u64().unwrap_or(u64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_u64_saturates() {
        assert_eq!(to_u64(&BigInt::from(42)), 42);
        assert_eq!(to_u64(&BigInt::from(-42)), 0);
        assert_eq!(to_u64(&(BigInt::from(1) << 100usize)), u64::MAX);
    }
}
