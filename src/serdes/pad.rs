//! Tree-normalising back-end.

use num_bigint::{BigInt, Sign};
use num_traits::{One, Zero};

use crate::error::{Error, Result};
use crate::exp_golomb::{exp_golomb_length, signed_exp_golomb_length};
use crate::fixeddict::{Record, RecordSchema, Value};
use crate::io::{from_bit_offset, Bits};
use crate::serdes::{ContextStack, PathElement, SerDes};

/// A [`SerDes`] which touches no bitstream at all. Instead it reshapes the
/// provided tree to exactly what the description consumes:
///
/// * missing scalar values are filled in with the type's zero/empty value
///   (as is the [`Auto`](Value::Auto) marker);
/// * values are coerced to the width implied by each operation:
///   [`nbits`](SerDes::nbits) keeps the low bits, bit and byte strings
///   keep their rightmost content and are left-padded with zeros,
///   [`uint`](SerDes::uint) clamps negatives to zero;
/// * lists are extended while traversing and truncated to the consumed
///   length when their context is left.
///
/// Structural errors (reused targets, unused non-list values, unclosed
/// contexts or blocks) are still reported, since they indicate a tree
/// which no amount of padding could make serialisable.
///
/// The simulated bit position honours bounded-block semantics, so
/// byte-alignment and block padding come out exactly as they would for
/// real I/O.
pub struct PadAndTruncate {
    ctx: ContextStack,
    bit_offset: u64,
    bits_remaining: Option<i64>,
}

/// Unwrap an integer [`Value`] produced by one of the coercions below.
fn into_int(value: Value) -> BigInt {
    match value {
        Value::Int(v) => v,
        _ => BigInt::zero(),
    }
}

impl PadAndTruncate {
    pub fn new(context: Record) -> PadAndTruncate {
        PadAndTruncate {
            ctx: ContextStack::new(context),
            bit_offset: 0,
            bits_remaining: None,
        }
    }

    /// Verify the traversal is structurally complete and return the
    /// normalised tree.
    pub fn finish(mut self) -> Result<Record> {
        self.ctx.truncate_lists_to_consumed();
        self.verify_complete()?;
        Ok(self.ctx.into_context())
    }

    /// Advance the simulated position. Inside an exhausted bounded block
    /// the position stops moving, as for real reads.
    fn advance(&mut self, width: u64) {
        match self.bits_remaining.as_mut() {
            Some(remaining) => {
                let width = width.min(i64::MAX as u64) as i64;
                let consumed = width.min((*remaining).max(0));
                *remaining -= width;
                self.bit_offset += consumed as u64;
            }
            None => self.bit_offset += width,
        }
    }
}

impl SerDes for PadAndTruncate {
    fn bool(&mut self, target: &'static str) -> Result<bool> {
        let value = self.ctx.normalise_value(target, &mut |old| {
            Value::Bool(match old {
                Some(Value::Bool(b)) => b,
                Some(Value::Int(v)) => !v.is_zero(),
                _ => false,
            })
        })?;
        self.advance(1);
        Ok(matches!(value, Value::Bool(true)))
    }

    fn nbits(&mut self, target: &'static str, bits: u64) -> Result<BigInt> {
        let mask: BigInt = (BigInt::one() << bits.min(u32::MAX as u64) as usize) - 1;
        let value = self.ctx.normalise_value(target, &mut |old| {
            let raw = match old {
                Some(Value::Int(v)) => v,
                _ => BigInt::zero(),
            };
            // Truncation keeps the low-order bits; negative values coerce
            // to their two's complement residue.
            Value::Int(raw & &mask)
        })?;
        self.advance(bits);
        Ok(into_int(value))
    }

    fn uint_lit(&mut self, target: &'static str, num_bytes: u64) -> Result<BigInt> {
        self.nbits(target, num_bytes * 8)
    }

    fn bitarray(&mut self, target: &'static str, bits: u64) -> Result<Bits> {
        let value = self.ctx.normalise_value(target, &mut |old| {
            let raw = match old {
                Some(Value::Bits(b)) => b,
                _ => Bits::new(),
            };
            let bits = bits as usize;
            let coerced = if raw.len() > bits {
                raw[raw.len() - bits..].to_bitvec()
            } else {
                let mut out = Bits::repeat(false, bits - raw.len());
                out.extend_from_bitslice(&raw);
                out
            };
            Value::Bits(coerced)
        })?;
        self.advance(bits);
        match value {
            Value::Bits(b) => Ok(b),
            _ => Ok(Bits::new()),
        }
    }

    fn bytes(&mut self, target: &'static str, num_bytes: u64) -> Result<Vec<u8>> {
        let value = self.ctx.normalise_value(target, &mut |old| {
            let raw = match old {
                Some(Value::Bytes(b)) => b,
                _ => Vec::new(),
            };
            let num_bytes = num_bytes as usize;
            let coerced = if raw.len() > num_bytes {
                raw[raw.len() - num_bytes..].to_vec()
            } else {
                let mut out = vec![0u8; num_bytes - raw.len()];
                out.extend_from_slice(&raw);
                out
            };
            Value::Bytes(coerced)
        })?;
        self.advance(num_bytes * 8);
        match value {
            Value::Bytes(b) => Ok(b),
            _ => Ok(Vec::new()),
        }
    }

    fn uint(&mut self, target: &'static str) -> Result<BigInt> {
        let value = self.ctx.normalise_value(target, &mut |old| {
            let raw = match old {
                Some(Value::Int(v)) if v.sign() != Sign::Minus => v,
                _ => BigInt::zero(),
            };
            Value::Int(raw)
        })?;
        let value = into_int(value);
        // Always in range: the coercion above discards negatives.
        self.advance(exp_golomb_length(&value)?);
        Ok(value)
    }

    fn sint(&mut self, target: &'static str) -> Result<BigInt> {
        let value = self.ctx.normalise_value(target, &mut |old| {
            Value::Int(match old {
                Some(Value::Int(v)) => v,
                _ => BigInt::zero(),
            })
        })?;
        let value = into_int(value);
        self.advance(signed_exp_golomb_length(&value)?);
        Ok(value)
    }

    fn bounded_block_begin(&mut self, length: u64) -> Result<()> {
        if self.bits_remaining.is_some() {
            return Err(Error::NestedBoundedBlock);
        }
        self.bits_remaining = Some(length.min(i64::MAX as u64) as i64);
        Ok(())
    }

    fn bounded_block_end(&mut self, target: &'static str) -> Result<()> {
        let remaining = self.bits_remaining.take().ok_or(Error::NotInBoundedBlock)?;
        self.bitarray(target, remaining.max(0) as u64)?;
        Ok(())
    }

    fn declare_list(&mut self, target: &'static str) -> Result<()> {
        self.ctx.declare_list(target)
    }

    fn set_context_type(&mut self, schema: &'static RecordSchema) -> Result<()> {
        self.ctx.set_context_type(schema)
    }

    fn subcontext_enter(&mut self, target: &'static str) -> Result<()> {
        self.ctx.enter(target)
    }

    fn subcontext_leave(&mut self) -> Result<()> {
        self.ctx.truncate_lists_to_consumed();
        self.ctx.verify_context_complete()?;
        self.ctx.leave()
    }

    fn computed_value(&mut self, target: &'static str, value: Value) -> Result<()> {
        self.ctx.set_value(target, value)
    }

    fn is_target_complete(&self, target: &str) -> bool {
        self.ctx.is_target_complete(target)
    }

    fn verify_complete(&self) -> Result<()> {
        self.ctx.verify_context_complete()?;
        self.ctx.verify_no_open_contexts()?;
        if self.bits_remaining.is_some() {
            return Err(Error::UnclosedBoundedBlock);
        }
        Ok(())
    }

    fn tell(&self) -> (u64, u8) {
        from_bit_offset(self.bit_offset)
    }

    fn end_of_stream(&self) -> bool {
        true
    }

    fn path(&self, target: Option<&str>) -> Vec<PathElement> {
        self.ctx.path(target)
    }

    fn describe_path(&self, target: Option<&str>) -> String {
        self.ctx.describe_path(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dict, vlist};
    use bitvec::bitvec;
    use bitvec::order::Msb0;
    use test_case::test_case;

    fn bits(s: &str) -> Bits {
        s.chars().map(|c| c == '1').collect()
    }

    #[test_case(dict!["t" => 0u8], Value::Bool(false); "bool from zero")]
    #[test_case(dict!["t" => 100u8], Value::Bool(true); "bool from non zero")]
    fn bool_coercions(tree: Record, expected: Value) {
        let mut pad = PadAndTruncate::new(tree);
        pad.bool("t").unwrap();
        assert_eq!(pad.finish().unwrap()["t"], expected);
    }

    #[test_case(8, 0xAB, 0xAB; "exact width")]
    #[test_case(4, 0xAB, 0xB; "truncated to low bits")]
    #[test_case(12, 0xAB, 0xAB; "wider field unchanged")]
    fn nbits_coercions(bits: u64, value: i64, expected: i64) {
        let mut pad = PadAndTruncate::new(dict!["t" => value]);
        assert_eq!(pad.nbits("t", bits).unwrap(), BigInt::from(expected));
        assert_eq!(pad.finish().unwrap()["t"], Value::from(expected));
    }

    #[test]
    fn bitarray_keeps_rightmost_bits_and_left_pads() {
        let mut pad = PadAndTruncate::new(dict!["t" => bits("10100101")]);
        assert_eq!(pad.bitarray("t", 4).unwrap(), bits("0101"));

        let mut pad = PadAndTruncate::new(dict!["t" => bits("10100101")]);
        assert_eq!(pad.bitarray("t", 12).unwrap(), bits("000010100101"));
    }

    #[test]
    fn bytes_keep_rightmost_bytes_and_left_pad() {
        let mut pad = PadAndTruncate::new(dict!["t" => vec![0xA0u8, 0xCD]]);
        assert_eq!(pad.bytes("t", 1).unwrap(), vec![0xCD]);

        let mut pad = PadAndTruncate::new(dict!["t" => vec![0xA0u8, 0xCD]]);
        assert_eq!(pad.bytes("t", 3).unwrap(), vec![0x00, 0xA0, 0xCD]);
    }

    #[test]
    fn uint_clamps_negatives_and_sint_keeps_sign() {
        let mut pad = PadAndTruncate::new(dict!["u" => -1i8, "s" => -1i8]);
        assert_eq!(pad.uint("u").unwrap(), BigInt::zero());
        assert_eq!(pad.sint("s").unwrap(), BigInt::from(-1));
    }

    #[test]
    fn missing_scalars_become_zero_values() {
        let mut pad = PadAndTruncate::new(Record::untyped());
        assert_eq!(pad.uint("u").unwrap(), BigInt::zero());
        assert!(!pad.bool("b").unwrap());
        assert_eq!(pad.bytes("y", 2).unwrap(), vec![0, 0]);
        let tree = pad.finish().unwrap();
        assert_eq!(
            tree,
            dict!["u" => 0u8, "b" => false, "y" => vec![0u8, 0u8]]
        );
    }

    #[test]
    fn auto_marker_is_replaced_by_zero() {
        let mut pad = PadAndTruncate::new(dict!["t" => Value::Auto]);
        assert_eq!(pad.uint("t").unwrap(), BigInt::zero());
    }

    #[test]
    fn lists_are_extended_and_truncated() {
        let mut pad = PadAndTruncate::new(dict!["list" => vlist![1u8, 2u8, 3u8, 4u8, 5u8]]);
        pad.declare_list("list").unwrap();
        for _ in 0..3 {
            pad.uint("list").unwrap();
        }
        assert_eq!(pad.finish().unwrap()["list"], vlist![1u8, 2u8, 3u8]);

        let mut pad = PadAndTruncate::new(dict!["list" => vlist![1u8, 2u8]]);
        pad.declare_list("list").unwrap();
        for _ in 0..3 {
            pad.uint("list").unwrap();
        }
        assert_eq!(pad.finish().unwrap()["list"], vlist![1u8, 2u8, 0u8]);
    }

    #[test]
    fn unused_scalars_still_fail() {
        let pad = PadAndTruncate::new(dict!["stray" => 1u8]);
        assert!(matches!(pad.finish(), Err(Error::UnusedTarget(_))));
    }

    #[test]
    fn unclosed_contexts_still_fail() {
        let mut pad = PadAndTruncate::new(Record::untyped());
        pad.subcontext_enter("foo").unwrap();
        assert!(matches!(
            pad.finish(),
            Err(Error::UnclosedNestedContext(_))
        ));
    }

    #[test]
    fn simulated_position_drives_byte_align_and_blocks() {
        let mut pad = PadAndTruncate::new(dict![
            "flag" => true,
            "padding" => Bits::new(),
            "block" => Bits::new(),
            "value" => 3u8,
        ]);
        pad.bool("flag").unwrap();
        pad.byte_align("padding").unwrap();
        assert_eq!(pad.tell(), (1, 7));
        pad.bounded_block("block", 10, |pad| pad.nbits("value", 4))
            .unwrap();
        assert_eq!(pad.tell(), (2, 5));
        let tree = pad.finish().unwrap();
        assert_eq!(tree["padding"].as_bits().unwrap().len(), 7);
        assert_eq!(tree["block"].as_bits().unwrap().len(), 6);
    }

    #[test]
    fn pad_and_truncate_is_idempotent() {
        fn traverse(pad: &mut PadAndTruncate) -> Result<()> {
            pad.bool("flag")?;
            pad.nbits("n", 4)?;
            pad.declare_list("list")?;
            pad.uint("list")?;
            pad.uint("list")?;
            pad.byte_align("padding")?;
            Ok(())
        }

        let tree = dict![
            "flag" => 3u8,
            "n" => 0x1234u16,
            "list" => vlist![1u8, 2u8, 3u8],
            "padding" => bitvec![u8, Msb0; 1, 1],
        ];
        let mut pad = PadAndTruncate::new(tree);
        traverse(&mut pad).unwrap();
        let once = pad.finish().unwrap();

        let mut pad = PadAndTruncate::new(once.clone());
        traverse(&mut pad).unwrap();
        let twice = pad.finish().unwrap();

        assert_eq!(once, twice);
    }
}
