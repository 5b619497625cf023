//! Exp-Golomb code length calculators.
//!
//! VC-2 uses an *interleaved* exp-Golomb code (A.4.3): data bits alternate
//! with terminator bits, rather than the prefix-then-suffix layout used by
//! H.26x codecs. The encoded length depends only on the magnitude of the
//! value, so the functions here can predict field widths without touching a
//! bitstream. Inputs are arbitrary-precision since length calculations are
//! performed on values (e.g. slice length bounds) which may exceed any
//! machine word.

use num_bigint::{BigInt, Sign};
use num_traits::Signed;

use crate::error::{Error, Result};

/// Return the length, in bits, of the unsigned exp-Golomb representation of
/// `value` (A.4.3).
///
/// Fails with [`Error::OutOfRange`] if `value` is negative.
pub fn exp_golomb_length(value: &BigInt) -> Result<u64> {
    if value.sign() == Sign::Minus {
        return Err(Error::OutOfRange(format!(
            "{} is negative, expected positive",
            value
        )));
    }
    Ok((((value + 1u8).bits() - 1) * 2) + 1)
}

/// Return the length, in bits, of the signed exp-Golomb representation of
/// `value` (A.4.4): the unsigned length of `|value|`, plus a sign bit for
/// non-zero values.
pub fn signed_exp_golomb_length(value: &BigInt) -> Result<u64> {
    let mut length = exp_golomb_length(&value.abs())?;
    if value.sign() != Sign::NoSign {
        length += 1;
    }
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 1)]
    #[test_case(1, 3)]
    #[test_case(2, 3)]
    #[test_case(3, 5)]
    #[test_case(4, 5)]
    #[test_case(5, 5)]
    #[test_case(6, 5)]
    #[test_case(7, 7)]
    fn unsigned_lengths(value: i64, length: u64) {
        assert_eq!(exp_golomb_length(&BigInt::from(value)).unwrap(), length);
    }

    #[test]
    fn unsigned_length_of_huge_value() {
        // (1 << 100) - 1 encodes as 100 data bits interleaved with 100
        // terminators, plus the final stop bit.
        let value = (BigInt::from(1u8) << 100usize) - 1;
        assert_eq!(exp_golomb_length(&value).unwrap(), 201);
    }

    #[test]
    fn unsigned_length_rejects_negative() {
        assert!(matches!(
            exp_golomb_length(&BigInt::from(-1)),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test_case(0, 1)]
    #[test_case(1, 4; "positive_1_4")]
    #[test_case(-1, 4; "negative_1_4")]
    #[test_case(7, 8; "positive_7_8")]
    #[test_case(-7, 8; "negative_7_8")]
    fn signed_lengths(value: i64, length: u64) {
        assert_eq!(
            signed_exp_golomb_length(&BigInt::from(value)).unwrap(),
            length
        );
    }
}
