//! Tree-to-bitstream back-end.

use std::collections::HashMap;
use std::io::{Seek, Write};

use num_bigint::BigInt;

use crate::error::{Error, Result};
use crate::fixeddict::{Record, RecordSchema, Value};
use crate::io::{BitstreamWriter, Bits};
use crate::serdes::{ContextStack, PathElement, SerDes};

/// Per-record-type fallback values used when a field is absent from the
/// tree being serialised: record type name, then key, to value.
///
/// For list targets the default value is used for *elements* beyond the
/// end of the provided list, not for the list as a whole. Types or keys
/// absent from the table simply have no fallback, so a partial table still
/// validates everything it does not cover.
pub type DefaultValues = HashMap<&'static str, HashMap<&'static str, Value>>;

/// A [`SerDes`] which walks a pre-populated tree and writes the
/// corresponding bitstream.
///
/// Every value in the tree must be consumed exactly once; missing values
/// fail unless the [`DefaultValues`] table supplies a fallback (used for
/// constants such as the parse-info prefix, and for zero-valued padding).
pub struct Serialiser<W: Write + Seek> {
    io: BitstreamWriter<W>,
    ctx: ContextStack,
    default_values: DefaultValues,
}

impl<W: Write + Seek> Serialiser<W> {
    pub fn new(
        io: BitstreamWriter<W>,
        context: Record,
        default_values: DefaultValues,
    ) -> Serialiser<W> {
        Serialiser {
            io,
            ctx: ContextStack::new(context),
            default_values,
        }
    }

    pub fn io(&self) -> &BitstreamWriter<W> {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut BitstreamWriter<W> {
        &mut self.io
    }

    /// Verify the traversal is complete and return the writer together
    /// with the (possibly re-typed) tree that was serialised.
    ///
    /// The returned tree, not the one passed to [`Serialiser::new`], holds
    /// any computed values added during serialisation, so it is the one to
    /// use for post-serialisation fix-ups.
    pub fn finish(self) -> Result<(BitstreamWriter<W>, Record)> {
        self.verify_complete()?;
        Ok((self.io, self.ctx.into_context()))
    }

    /// Fetch the next value for `target`, falling back on the
    /// default-value table when the tree has nothing to offer.
    fn fetch(&mut self, target: &'static str) -> Result<Value> {
        match self.ctx.get_value(target) {
            Ok(value) => Ok(value),
            Err(e @ (Error::MissingTarget(_) | Error::ListTargetExhausted(_))) => {
                let type_name = self.ctx.cur_type_name();
                match self
                    .default_values
                    .get(type_name)
                    .and_then(|defaults| defaults.get(target))
                {
                    Some(value) => Ok(value.clone()),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn expect_bool(&self, target: &'static str, value: Value) -> Result<bool> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(self.type_error(target, "bool", other)),
        }
    }

    fn expect_int(&self, target: &'static str, value: Value) -> Result<BigInt> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(self.type_error(target, "int", other)),
        }
    }

    fn expect_bits(&self, target: &'static str, value: Value) -> Result<Bits> {
        match value {
            Value::Bits(b) => Ok(b),
            other => Err(self.type_error(target, "bits", other)),
        }
    }

    fn expect_bytes(&self, target: &'static str, value: Value) -> Result<Vec<u8>> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(self.type_error(target, "bytes", other)),
        }
    }

    fn type_error(&self, target: &'static str, expected: &'static str, found: Value) -> Error {
        let path = self.ctx.describe_path(Some(target));
        if found.is_auto() {
            Error::AutoNotSerialisable(path)
        } else {
            Error::WrongValueType {
                path,
                expected,
                found: found.type_name(),
            }
        }
    }
}

impl<W: Write + Seek> SerDes for Serialiser<W> {
    fn bool(&mut self, target: &'static str) -> Result<bool> {
        let value = self.fetch(target)?;
        let value = self.expect_bool(target, value)?;
        self.io.write_bit(value)?;
        Ok(value)
    }

    fn nbits(&mut self, target: &'static str, bits: u64) -> Result<BigInt> {
        let value = self.fetch(target)?;
        let value = self.expect_int(target, value)?;
        self.io.write_nbits(bits, &value)?;
        Ok(value)
    }

    fn uint_lit(&mut self, target: &'static str, num_bytes: u64) -> Result<BigInt> {
        let value = self.fetch(target)?;
        let value = self.expect_int(target, value)?;
        self.io.write_uint_lit(num_bytes, &value)?;
        Ok(value)
    }

    fn bitarray(&mut self, target: &'static str, bits: u64) -> Result<Bits> {
        let value = self.fetch(target)?;
        let value = self.expect_bits(target, value)?;
        self.io.write_bitarray(bits, &value)?;
        Ok(value)
    }

    fn bytes(&mut self, target: &'static str, num_bytes: u64) -> Result<Vec<u8>> {
        let value = self.fetch(target)?;
        let value = self.expect_bytes(target, value)?;
        self.io.write_bytes(num_bytes, &value)?;
        Ok(value)
    }

    fn uint(&mut self, target: &'static str) -> Result<BigInt> {
        let value = self.fetch(target)?;
        let value = self.expect_int(target, value)?;
        self.io.write_uint(&value)?;
        Ok(value)
    }

    fn sint(&mut self, target: &'static str) -> Result<BigInt> {
        let value = self.fetch(target)?;
        let value = self.expect_int(target, value)?;
        self.io.write_sint(&value)?;
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
