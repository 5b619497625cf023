//! Monitored wrappers around the [`Deserialiser`] and [`Serialiser`]
//! back-ends.
//!
//! The monitor callback runs after every primitive I/O operation, with a
//! reference to the wrapped back-end (for [`SerDes::describe_path`] and
//! position queries), the target just touched, and its value. Returning an
//! error from the callback cancels the traversal, which unwinds to the
//! top-level caller; this is how long-running operations are interrupted
//! or progress-reported.

use std::io::{Read, Seek, Write};

use num_bigint::BigInt;

use crate::error::Result;
use crate::fixeddict::{Record, RecordSchema, Value};
use crate::io::{BitstreamReader, BitstreamWriter, Bits};
use crate::serdes::{DefaultValues, Deserialiser, PathElement, SerDes, Serialiser};

macro_rules! monitored_serdes_impl {
    () => {
        fn bool(&mut self, target: &'static str) -> Result<bool> {
            let value = self.inner.bool(target)?;
            (self.monitor)(&self.inner, target, &Value::Bool(value))?;
            Ok(value)
        }

        fn nbits(&mut self, target: &'static str, bits: u64) -> Result<BigInt> {
            let value = self.inner.nbits(target, bits)?;
            (self.monitor)(&self.inner, target, &Value::Int(value.clone()))?;
            Ok(value)
        }

        fn uint_lit(&mut self, target: &'static str, num_bytes: u64) -> Result<BigInt> {
            let value = self.inner.uint_lit(target, num_bytes)?;
            (self.monitor)(&self.inner, target, &Value::Int(value.clone()))?;
            Ok(value)
        }

        fn bitarray(&mut self, target: &'static str, bits: u64) -> Result<Bits> {
            let value = self.inner.bitarray(target, bits)?;
            (self.monitor)(&self.inner, target, &Value::Bits(value.clone()))?;
            Ok(value)
        }

        fn bytes(&mut self, target: &'static str, num_bytes: u64) -> Result<Vec<u8>> {
            let value = self.inner.bytes(target, num_bytes)?;
            (self.monitor)(&self.inner, target, &Value::Bytes(value.clone()))?;
            Ok(value)
        }

        fn uint(&mut self, target: &'static str) -> Result<BigInt> {
            let value = self.inner.uint(target)?;
            (self.monitor)(&self.inner, target, &Value::Int(value.clone()))?;
            Ok(value)
        }

        fn sint(&mut self, target: &'static str) -> Result<BigInt> {
            let value = self.inner.sint(target)?;
            (self.monitor)(&self.inner, target, &Value::Int(value.clone()))?;
            Ok(value)
        }

        fn bounded_block_begin(&mut self, length: u64) -> Result<()> {
            self.inner.bounded_block_begin(length)
        }

        fn bounded_block_end(&mut self, target: &'static str) -> Result<()> {
            self.inner.bounded_block_end(target)
        }

        fn declare_list(&mut self, target: &'static str) -> Result<()> {
            self.inner.declare_list(target)
        }

        fn set_context_type(&mut self, schema: &'static RecordSchema) -> Result<()> {
            self.inner.set_context_type(schema)
        }

        fn subcontext_enter(&mut self, target: &'static str) -> Result<()> {
            self.inner.subcontext_enter(target)
        }

        fn subcontext_leave(&mut self) -> Result<()> {
            self.inner.subcontext_leave()
        }

        fn computed_value(&mut self, target: &'static str, value: Value) -> Result<()> {
            self.inner.computed_value(target, value)
        }

        fn is_target_complete(&self, target: &str) -> bool {
            self.inner.is_target_complete(target)
        }

        fn verify_complete(&self) -> Result<()> {
            self.inner.verify_complete()
        }

        fn tell(&self) -> (u64, u8) {
            self.inner.tell()
        }

        fn end_of_stream(&self) -> bool {
            self.inner.end_of_stream()
        }

        fn path(&self, target: Option<&str>) -> Vec<PathElement> {
            self.inner.path(target)
        }

        fn describe_path(&self, target: Option<&str>) -> String {
            self.inner.describe_path(target)
        }
    };
}

/// A [`Deserialiser`] which calls a monitor after every primitive read.
pub struct MonitoredDeserialiser<R, M>
where
    R: Read + Seek,
    M: FnMut(&Deserialiser<R>, &'static str, &Value) -> Result<()>,
{
    inner: Deserialiser<R>,
    monitor: M,
}

impl<R, M> MonitoredDeserialiser<R, M>
where
    R: Read + Seek,
    M: FnMut(&Deserialiser<R>, &'static str, &Value) -> Result<()>,
{
    pub fn new(monitor: M, io: BitstreamReader<R>) -> Self {
        MonitoredDeserialiser {
            inner: Deserialiser::new(io),
            monitor,
        }
    }

    pub fn with_context(monitor: M, io: BitstreamReader<R>, context: Record) -> Self {
        MonitoredDeserialiser {
            inner: Deserialiser::with_context(io, context),
            monitor,
        }
    }

    pub fn inner(&self) -> &Deserialiser<R> {
        &self.inner
    }

    pub fn finish(self) -> Result<Record> {
        self.inner.finish()
    }
}

impl<R, M> SerDes for MonitoredDeserialiser<R, M>
where
    R: Read + Seek,
    M: FnMut(&Deserialiser<R>, &'static str, &Value) -> Result<()>,
{
    monitored_serdes_impl!();
}

/// A [`Serialiser`] which calls a monitor after every primitive write.
pub struct MonitoredSerialiser<W, M>
where
    W: Write + Seek,
    M: FnMut(&Serialiser<W>, &'static str, &Value) -> Result<()>,
{
    inner: Serialiser<W>,
    monitor: M,
}

impl<W, M> MonitoredSerialiser<W, M>
where
    W: Write + Seek,
    M: FnMut(&Serialiser<W>, &'static str, &Value) -> Result<()>,
{
    pub fn new(
        monitor: M,
        io: BitstreamWriter<W>,
        context: Record,
        default_values: DefaultValues,
    ) -> Self {
        MonitoredSerialiser {
            inner: Serialiser::new(io, context, default_values),
            monitor,
        }
    }

    pub fn inner(&self) -> &Serialiser<W> {
        &self.inner
    }

    pub fn finish(self) -> Result<(BitstreamWriter<W>, Record)> {
        self.inner.finish()
    }
}

impl<W, M> SerDes for MonitoredSerialiser<W, M>
where
    W: Write + Seek,
    M: FnMut(&Serialiser<W>, &'static str, &Value) -> Result<()>,
{
    monitored_serdes_impl!();
}
