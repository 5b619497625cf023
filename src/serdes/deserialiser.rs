//! Bitstream-to-tree back-end.

use std::io::{Read, Seek};

use num_bigint::BigInt;

use crate::error::{Error, Result};
use crate::fixeddict::{Record, RecordSchema, Value};
use crate::io::{BitstreamReader, Bits};
use crate::serdes::{ContextStack, PathElement, SerDes};

/// A [`SerDes`] which reads a bitstream and stores every value read into a
/// tree of records.
///
/// Since all values come from the stream, a missing target can never
/// occur; the checks guarantee instead that no target is written twice, so
/// the resulting tree is a faithful transcript of the bitstream.
pub struct Deserialiser<R: Read + Seek> {
    io: BitstreamReader<R>,
    ctx: ContextStack,
}

impl<R: Read + Seek> Deserialiser<R> {
    pub fn new(io: BitstreamReader<R>) -> Deserialiser<R> {
        Deserialiser::with_context(io, Record::untyped())
    }

    /// Deserialise into an existing tree; values already present are
    /// overwritten as the traversal reaches them.
    pub fn with_context(io: BitstreamReader<R>, context: Record) -> Deserialiser<R> {
        Deserialiser {
            io,
            ctx: ContextStack::new(context),
        }
    }

    pub fn io(&self) -> &BitstreamReader<R> {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut BitstreamReader<R> {
        &mut self.io
    }

    /// Verify the traversal is complete and return the assembled tree.
    pub fn finish(self) -> Result<Record> {
        self.verify_complete()?;
        Ok(self.ctx.into_context())
    }

    /// Return the assembled tree without completeness checks, along with
    /// the reader. For use after an error, when a partial tree is still of
    /// interest.
    pub fn into_parts(self) -> (BitstreamReader<R>, Record) {
        (self.io, self.ctx.into_context())
    }
}

impl<R: Read + Seek> SerDes for Deserialiser<R> {
    fn bool(&mut self, target: &'static str) -> Result<bool> {
        let value = self.io.read_bit()? == 1;
        self.ctx.set_value(target, Value::Bool(value))?;
        Ok(value)
    }

    fn nbits(&mut self, target: &'static str, bits: u64) -> Result<BigInt> {
        let value = self.io.read_nbits(bits)?;
        self.ctx.set_value(target, Value::Int(value.clone()))?;
        Ok(value)
    }

    fn uint_lit(&mut self, target: &'static str, num_bytes: u64) -> Result<BigInt> {
        let value = self.io.read_uint_lit(num_bytes)?;
        self.ctx.set_value(target, Value::Int(value.clone()))?;
        Ok(value)
    }

    fn bitarray(&mut self, target: &'static str, bits: u64) -> Result<Bits> {
        let value = self.io.read_bitarray(bits)?;
        self.ctx.set_value(target, Value::Bits(value.clone()))?;
        Ok(value)
    }

    fn bytes(&mut self, target: &'static str, num_bytes: u64) -> Result<Vec<u8>> {
        let value = self.io.read_bytes(num_bytes)?;
        self.ctx.set_value(target, Value::Bytes(value.clone()))?;
        Ok(value)
    }

    fn uint(&mut self, target: &'static str) -> Result<BigInt> {
        let value = self.io.read_uint()?;
        self.ctx.set_value(target, Value::Int(value.clone()))?;
        Ok(value)
    }

    fn sint(&mut self, target: &'static str) -> Result<BigInt> {
        let value = self.io.read_sint()?;
        self.ctx.set_value(target, Value::Int(value.clone()))?;
        Ok(value)
    }

    fn bounded_block_begin(&mut self, length: u64) -> Result<()> {
        self.io.bounded_block_begin(length)
    }

    fn bounded_block_end(&mut self, target: &'static str) -> Result<()> {
        let unused_bits = self.io.bounded_block_end()?;
        self.bitarray(target, unused_bits)?;
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
        if self.io.bits_remaining().is_some() {
            return Err(Error::UnclosedBoundedBlock);
        }
        Ok(())
    }

    fn tell(&self) -> (u64, u8) {
        self.io.tell()
    }

    fn end_of_stream(&self) -> bool {
        self.io.is_end_of_stream()
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
    use std::io::Cursor;

    fn deserialiser(bytes: &[u8]) -> Deserialiser<Cursor<Vec<u8>>> {
        Deserialiser::new(BitstreamReader::new(Cursor::new(bytes.to_vec())).unwrap())
    }

    #[test]
    fn primitive_ops_store_read_values() {
        let mut des = deserialiser(&[0xAB, 0x3F, 0x80]);
        assert_eq!(des.nbits("n", 8).unwrap(), BigInt::from(0xAB));
        assert_eq!(des.uint("u").unwrap(), BigInt::from(1));
        assert_eq!(des.sint("s").unwrap(), BigInt::from(-1));
        assert!(des.bool("b").unwrap());
        let tree = des.finish().unwrap();
        assert_eq!(
            tree,
            dict![
                "n" => 0xABu8,
                "u" => 1u8,
                "s" => -1i8,
                "b" => true,
            ]
        );
    }

    #[test]
    fn byte_align_consumes_up_to_next_boundary() {
        let mut des = deserialiser(&[0b1010_1010]);
        des.bool("bit").unwrap();
        des.byte_align("padding").unwrap();
        let tree = des.finish().unwrap();
        assert_eq!(
            tree["padding"],
            Value::Bits(bitvec![u8, Msb0; 0, 1, 0, 1, 0, 1, 0])
        );

        // Already aligned: a zero-length bit string.
        let mut des = deserialiser(&[0xFF]);
        des.byte_align("padding").unwrap();
        des.nbits("n", 8).unwrap();
        let tree = des.finish().unwrap();
        assert_eq!(tree["padding"], Value::Bits(bitvec![u8, Msb0;]));
    }

    #[test]
    fn bounded_block_stores_unused_bits() {
        // 100-bit block over 13 bytes, of which only 30 bits are read.
        let mut des = deserialiser(&[0xFF; 13]);
        des.bounded_block("padding", 100, |des| des.nbits("value", 30))
            .unwrap();
        let tree = des.finish().unwrap();
        assert_eq!(tree["padding"].as_bits().unwrap().len(), 70);
    }

    #[test]
    fn lists_fill_in_declaration_order() {
        // Ten exp-Golomb values 9..=0.
        let mut w = crate::io::BitstreamWriter::new(Cursor::new(Vec::new())).unwrap();
        for value in (0..=9u8).rev() {
            w.write_uint(&BigInt::from(value)).unwrap();
        }
        w.flush().unwrap();
        let bytes = w.into_inner().unwrap().into_inner();

        let mut des = deserialiser(&bytes);
        des.declare_list("numbers").unwrap();
        for expected in (0..=9u8).rev() {
            assert_eq!(des.uint("numbers").unwrap(), BigInt::from(expected));
        }
        // Trailing zero-padding bits in the final byte.
        des.byte_align("padding").unwrap();
        let tree = des.finish().unwrap();
        assert_eq!(
            tree["numbers"],
            vlist![9u8, 8u8, 7u8, 6u8, 5u8, 4u8, 3u8, 2u8, 1u8, 0u8]
        );
    }

    #[test]
    fn reused_target_is_rejected() {
        let mut des = deserialiser(&[0xFF]);
        des.bool("flag").unwrap();
        assert!(matches!(
            des.bool("flag"),
            Err(Error::ReusedTarget(ref path)) if path == "Record['flag']"
        ));
    }

    #[test]
    fn verify_complete_rejects_open_contexts_and_blocks() {
        let mut des = deserialiser(&[0xFF]);
        des.subcontext_enter("child").unwrap();
        assert!(matches!(
            des.verify_complete(),
            Err(Error::UnclosedNestedContext(_))
        ));
        des.subcontext_leave().unwrap();

        des.bounded_block_begin(4).unwrap();
        assert!(matches!(
            des.verify_complete(),
            Err(Error::UnclosedBoundedBlock)
        ));
    }

    #[test]
    fn pre_populated_values_must_be_consumed() {
        let des = Deserialiser::with_context(
            BitstreamReader::new(Cursor::new(vec![0xFF])).unwrap(),
            dict!["stale" => 1u8],
        );
        assert!(matches!(des.finish(), Err(Error::UnusedTarget(_))));
    }
}
