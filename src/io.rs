//! Bit-level wrappers over byte-oriented streams.
//!
//! [`BitstreamReader`] and [`BitstreamWriter`] provide the `read_*` and
//! `write_*` operations used by the VC-2 bitstream syntax (A.2, A.3, A.4):
//! single bits, fixed-width integers, bit strings, byte strings and
//! interleaved exp-Golomb codes, always MSB first.
//!
//! Both types also implement VC-2's *bounded blocks* (A.4.2): a
//! length-constrained region in which reads past the end synthesise `1`
//! bits without consuming input, and writes past the end absorb `1` bits
//! but reject `0` bits. Blocks do not nest.
//!
//! These wrappers are deliberately "safe": out-of-range values produce an
//! error rather than being silently truncated.

use std::io::{Read, Seek, SeekFrom, Write};

use bitvec::order::Msb0;
use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;
use num_bigint::{BigInt, Sign};
use num_traits::{One, Zero};

use crate::error::{Error, Result};

/// Bit string type used for `bitarray` values throughout this crate.
pub type Bits = BitVec<u8, Msb0>;

/// Convert a `(bytes, bits)` pair (as used by `tell()` and `seek()`) into a
/// total number of bits. `bits` counts from 7 (MSB, next to be used) down
/// to 0 (LSB).
pub fn to_bit_offset(bytes: u64, bits: u8) -> u64 {
    (bytes * 8) + (7 - u64::from(bits))
}

/// Convert a total number of bits back into a `(bytes, bits)` pair.
pub fn from_bit_offset(total_bits: u64) -> (u64, u8) {
    (total_bits / 8, 7 - (total_bits % 8) as u8)
}

/// Shared bounded-block seek adjustment (identical for reads and writes).
///
/// Returns the replacement `bits_remaining` value for a seek whose position
/// moves by `delta` bits, or an error if the seek would move forwards past
/// the end of the block.
fn seek_bits_remaining(remaining: i64, delta: i64) -> Result<i64> {
    if delta > 0 && remaining - delta < 0 {
        return Err(Error::SeekPastBoundedBlock);
    }
    if remaining <= 0 && delta == 0 {
        // Past the end but not moving; leave the overrun count alone.
        Ok(remaining)
    } else if remaining < 0 && delta < 0 {
        // Seeking from beyond the block back to before its end resets the
        // count based on the final position.
        Ok(-delta)
    } else {
        Ok(remaining - delta)
    }
}

/// A byte stream which may be read one bit at a time.
///
/// Reads at the end-of-file produce [`Error::EndOfStream`], except inside a
/// bounded block which has been exhausted, where they synthesise `1` bits.
pub struct BitstreamReader<R> {
    inner: R,

    /// The byte currently being read, or `None` at the EOF.
    current_byte: Option<u8>,

    /// Index of the next bit to read, 7 (MSB) down to 0 (LSB).
    next_bit: u8,

    /// Offset of the byte *after* `current_byte` in the stream.
    byte_offset: u64,

    /// `None` outside bounded blocks. Inside a block, the number of unused
    /// bits remaining; negative once reads have overrun the end.
    bits_remaining: Option<i64>,
}

impl<R: Read + Seek> BitstreamReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let byte_offset = inner.stream_position()?;
        let mut reader = BitstreamReader {
            inner,
            current_byte: None,
            next_bit: 7,
            byte_offset,
            bits_remaining: None,
        };
        reader.advance_byte()?;
        Ok(reader)
    }

    /// Load the next byte from the stream. (A.2.2)
    fn advance_byte(&mut self) -> Result<()> {
        let mut buf = [0u8; 1];
        self.byte_offset += 1;
        self.next_bit = 7;
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => {
                    self.current_byte = None;
                    break;
                }
                Ok(_) => {
                    self.current_byte = Some(buf[0]);
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// True once the end of the underlying stream has been reached. (A.2.5)
    pub fn is_end_of_stream(&self) -> bool {
        self.current_byte.is_none()
    }

    /// The current position as a `(bytes, bits)` pair, where `bits` is the
    /// index of the next bit to be read (7 = MSB).
    pub fn tell(&self) -> (u64, u8) {
        (self.byte_offset - 1, self.next_bit)
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, bytes: u64, bits: u8) -> Result<()> {
        debug_assert!(bits <= 7);
        if let Some(remaining) = self.bits_remaining {
            let (cur_bytes, cur_bits) = self.tell();
            let delta = to_bit_offset(bytes, bits) as i64 - to_bit_offset(cur_bytes, cur_bits) as i64;
            self.bits_remaining = Some(seek_bits_remaining(remaining, delta)?);
        }

        self.inner.seek(SeekFrom::Start(bytes))?;
        self.byte_offset = bytes;
        self.advance_byte()?;
        self.next_bit = bits;
        Ok(())
    }

    /// The number of bits left in the current bounded block: `None` outside
    /// a block, negative once reads have overrun the end.
    pub fn bits_remaining(&self) -> Option<i64> {
        self.bits_remaining
    }

    /// Begin a bounded block of `length` bits. (A.4.2)
    pub fn bounded_block_begin(&mut self, length: u64) -> Result<()> {
        if self.bits_remaining.is_some() {
            return Err(Error::NestedBoundedBlock);
        }
        self.bits_remaining = Some(length.min(i64::MAX as u64) as i64);
        Ok(())
    }

    /// End the current bounded block, returning the number of unused bits.
    /// The unused bits are neither read nor skipped.
    pub fn bounded_block_end(&mut self) -> Result<u64> {
        let remaining = self.bits_remaining.take().ok_or(Error::NotInBoundedBlock)?;
        Ok(remaining.max(0) as u64)
    }

    /// Read and return the next bit. (A.2.3) Returns `1` for bits past the
    /// end of a bounded block.
    pub fn read_bit(&mut self) -> Result<u8> {
        if let Some(remaining) = self.bits_remaining.as_mut() {
            *remaining -= 1;
            // Checked *after* the decrement, hence <= -1 not <= 0.
            if *remaining <= -1 {
                return Ok(1);
            }
        }

        let byte = self.current_byte.ok_or(Error::EndOfStream)?;
        let bit = (byte >> self.next_bit) & 1;
        if self.next_bit == 0 {
            self.advance_byte()?;
        } else {
            self.next_bit -= 1;
        }
        Ok(bit)
    }

    /// Read a `bits`-wide unsigned integer, MSB first. (A.3.3)
    pub fn read_nbits(&mut self, bits: u64) -> Result<BigInt> {
        let mut value = BigInt::zero();
        for _ in 0..bits {
            value <<= 1usize;
            if self.read_bit()? == 1 {
                value += 1u8;
            }
        }
        Ok(value)
    }

    /// Read a `num_bytes`-long unsigned integer. (A.3.4) Performs no byte
    /// alignment.
    pub fn read_uint_lit(&mut self, num_bytes: u64) -> Result<BigInt> {
        self.read_nbits(num_bytes * 8)
    }

    /// Read `bits` bits as a [`Bits`] string.
    pub fn read_bitarray(&mut self, bits: u64) -> Result<Bits> {
        let mut out = Bits::with_capacity(bits.min(4096) as usize);
        for _ in 0..bits {
            out.push(self.read_bit()? == 1);
        }
        Ok(out)
    }

    /// Read `num_bytes` bytes as a byte string.
    pub fn read_bytes(&mut self, num_bytes: u64) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(num_bytes.min(4096) as usize);
        for _ in 0..num_bytes {
            let mut byte = 0u8;
            for _ in 0..8 {
                byte = (byte << 1) | self.read_bit()?;
            }
            out.push(byte);
        }
        Ok(out)
    }

    /// Read an interleaved unsigned exp-Golomb code. (A.4.3)
    pub fn read_uint(&mut self) -> Result<BigInt> {
        let mut value = BigInt::one();
        while self.read_bit()? == 0 {
            value <<= 1usize;
            if self.read_bit()? == 1 {
                value += 1u8;
            }
        }
        value -= 1u8;
        Ok(value)
    }

    /// Read a signed exp-Golomb code. (A.4.4)
    pub fn read_sint(&mut self) -> Result<BigInt> {
        let mut value = self.read_uint()?;
        if !value.is_zero() && self.read_bit()? == 1 {
            value = -value;
        }
        Ok(value)
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// A byte stream which may be written one bit at a time.
pub struct BitstreamWriter<W: Write + Seek> {
    inner: W,

    /// The byte currently being assembled.
    current_byte: u8,

    /// Index of the next bit to write, 7 (MSB) down to 0 (LSB).
    next_bit: u8,

    /// Offset of the byte currently being assembled.
    byte_offset: u64,

    /// As for [`BitstreamReader::bits_remaining`].
    bits_remaining: Option<i64>,
}

impl<W: Write + Seek> BitstreamWriter<W> {
    pub fn new(mut inner: W) -> Result<Self> {
        let byte_offset = inner.stream_position()?;
        Ok(BitstreamWriter {
            inner,
            current_byte: 0,
            next_bit: 7,
            byte_offset,
            bits_remaining: None,
        })
    }

    /// Write the current byte out and start a new one. (A.2.2)
    fn commit_byte(&mut self) -> Result<()> {
        self.inner.write_all(&[self.current_byte])?;
        self.current_byte = 0;
        self.next_bit = 7;
        self.byte_offset += 1;
        Ok(())
    }

    /// Always true: the write cursor is (logically) at the end of the
    /// stream. (A.2.5)
    pub fn is_end_of_stream(&self) -> bool {
        true
    }

    /// The current position as a `(bytes, bits)` pair, where `bits` is the
    /// index of the next bit to be written (7 = MSB).
    pub fn tell(&self) -> (u64, u8) {
        (self.byte_offset, self.next_bit)
    }

    /// Seek to an absolute position. Bits already written into the target
    /// byte are reset to zero.
    pub fn seek(&mut self, bytes: u64, bits: u8) -> Result<()> {
        debug_assert!(bits <= 7);
        if let Some(remaining) = self.bits_remaining {
            let (cur_bytes, cur_bits) = self.tell();
            let delta = to_bit_offset(bytes, bits) as i64 - to_bit_offset(cur_bytes, cur_bits) as i64;
            self.bits_remaining = Some(seek_bits_remaining(remaining, delta)?);
        }

        self.flush()?;

        self.inner.seek(SeekFrom::Start(bytes))?;
        self.byte_offset = bytes;
        self.current_byte = 0;
        self.next_bit = bits;
        Ok(())
    }

    /// Commit all written bits to the underlying stream.
    ///
    /// A partially-assembled byte is written out zero-extended, then the
    /// stream cursor steps back over it so later bits continue filling the
    /// same byte. The logical position is unchanged.
    pub fn flush(&mut self) -> Result<()> {
        if self.next_bit != 7 {
            self.inner.write_all(&[self.current_byte])?;
            self.inner.seek(SeekFrom::Current(-1))?;
        }
        self.inner.flush()?;
        Ok(())
    }

    /// The number of bits left in the current bounded block: `None` outside
    /// a block, negative once writes have overrun the end.
    pub fn bits_remaining(&self) -> Option<i64> {
        self.bits_remaining
    }

    /// Begin a bounded block of `length` bits. (A.4.2)
    pub fn bounded_block_begin(&mut self, length: u64) -> Result<()> {
        if self.bits_remaining.is_some() {
            return Err(Error::NestedBoundedBlock);
        }
        self.bits_remaining = Some(length.min(i64::MAX as u64) as i64);
        Ok(())
    }

    /// End the current bounded block, returning the number of unused bits.
    /// The unused bits are not written or skipped.
    pub fn bounded_block_end(&mut self) -> Result<u64> {
        let remaining = self.bits_remaining.take().ok_or(Error::NotInBoundedBlock)?;
        Ok(remaining.max(0) as u64)
    }

    /// Write a single bit. Past the end of a bounded block, `1` bits are
    /// silently absorbed and `0` bits fail with
    /// [`Error::BoundedBlockOverflow`].
    pub fn write_bit(&mut self, value: bool) -> Result<()> {
        if let Some(remaining) = self.bits_remaining.as_mut() {
            *remaining -= 1;
            // Checked *after* the decrement, hence <= -1 not <= 0.
            if *remaining <= -1 {
                if !value {
                    return Err(Error::BoundedBlockOverflow);
                }
                return Ok(());
            }
        }

        self.current_byte &= !(1 << self.next_bit);
        if value {
            self.current_byte |= 1 << self.next_bit;
        }
        if self.next_bit == 0 {
            self.commit_byte()?;
        } else {
            self.next_bit -= 1;
        }
        Ok(())
    }

    /// Write a `bits`-wide unsigned integer, MSB first. (A.3.3)
    ///
    /// Fails with [`Error::OutOfRange`] if the value is negative or too wide
    /// for the field.
    pub fn write_nbits(&mut self, bits: u64, value: &BigInt) -> Result<()> {
        if value.sign() == Sign::Minus || value.bits() > bits {
            return Err(Error::OutOfRange(format!(
                "0b{:b} is {} bits, not {}",
                value,
                value.bits(),
                bits,
            )));
        }

        let magnitude = value.magnitude();
        for i in (0..bits).rev() {
            self.write_bit(magnitude.bit(i))?;
        }
        Ok(())
    }

    /// Write a `num_bytes`-long unsigned integer. (A.3.4)
    pub fn write_uint_lit(&mut self, num_bytes: u64, value: &BigInt) -> Result<()> {
        self.write_nbits(num_bytes * 8, value)
    }

    /// Write a bit string into a `bits`-wide field, zero-padding on the
    /// right if it is short. Fails with [`Error::OutOfRange`] if it is too
    /// long.
    pub fn write_bitarray(&mut self, bits: u64, value: &BitSlice<u8, Msb0>) -> Result<()> {
        if value.len() as u64 > bits {
            return Err(Error::OutOfRange(format!(
                "bit string is {} bits, not {}",
                value.len(),
                bits,
            )));
        }

        for bit in value.iter().by_vals() {
            self.write_bit(bit)?;
        }
        for _ in value.len() as u64..bits {
            self.write_bit(false)?;
        }
        Ok(())
    }

    /// Write a byte string into a `num_bytes`-wide field, zero-padding on
    /// the right if it is short. Fails with [`Error::OutOfRange`] if it is
    /// too long.
    pub fn write_bytes(&mut self, num_bytes: u64, value: &[u8]) -> Result<()> {
        if value.len() as u64 > num_bytes {
            return Err(Error::OutOfRange(format!(
                "byte string is {} bytes, not {}",
                value.len(),
                num_bytes,
            )));
        }

        for &byte in value {
            for i in (0..8).rev() {
                self.write_bit((byte >> i) & 1 == 1)?;
            }
        }
        for _ in value.len() as u64..num_bytes {
            for _ in 0..8 {
                self.write_bit(false)?;
            }
        }
        Ok(())
    }

    /// Write an interleaved unsigned exp-Golomb code. (A.4.3)
    ///
    /// Fails with [`Error::OutOfRange`] for negative values.
    pub fn write_uint(&mut self, value: &BigInt) -> Result<()> {
        if value.sign() == Sign::Minus {
            return Err(Error::OutOfRange(format!(
                "{} is negative, expected positive",
                value
            )));
        }

        let value: BigInt = value + 1u8;
        let magnitude = value.magnitude();
        for i in (0..magnitude.bits() - 1).rev() {
            self.write_bit(false)?;
            self.write_bit(magnitude.bit(i))?;
        }
        self.write_bit(true)
    }

    /// Write a signed exp-Golomb code: the magnitude followed, for non-zero
    /// values, by a sign bit (`1` = negative). (A.4.4)
    pub fn write_sint(&mut self, value: &BigInt) -> Result<()> {
        self.write_uint(&num_traits::Signed::abs(value))?;
        if !value.is_zero() {
            self.write_bit(value.sign() == Sign::Minus)?;
        }
        Ok(())
    }

    /// Flush and unwrap the underlying stream.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitvec::bitvec;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn reader(bytes: &[u8]) -> BitstreamReader<Cursor<Vec<u8>>> {
        BitstreamReader::new(Cursor::new(bytes.to_vec())).unwrap()
    }

    fn writer() -> BitstreamWriter<Cursor<Vec<u8>>> {
        BitstreamWriter::new(Cursor::new(Vec::new())).unwrap()
    }

    fn written(mut w: BitstreamWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        w.flush().unwrap();
        w.into_inner().unwrap().into_inner()
    }

    #[test]
    fn bit_offset_conversions() {
        assert_eq!(to_bit_offset(0, 7), 0);
        assert_eq!(to_bit_offset(0, 0), 7);
        assert_eq!(to_bit_offset(2, 7), 16);
        assert_eq!(from_bit_offset(0), (0, 7));
        assert_eq!(from_bit_offset(7), (0, 0));
        assert_eq!(from_bit_offset(16), (2, 7));
    }

    #[test]
    fn read_bits_msb_first() {
        let mut r = reader(&[0xA5]);
        assert_eq!(r.tell(), (0, 7));
        let bits: Vec<u8> = (0..8).map(|_| r.read_bit().unwrap()).collect();
        assert_eq!(bits, [1, 0, 1, 0, 0, 1, 0, 1]);
        assert_eq!(r.tell(), (1, 7));
        assert!(matches!(r.read_bit(), Err(Error::EndOfStream)));
    }

    #[test]
    fn read_nbits_accumulates_msb_first() {
        let mut r = reader(&[0xAB, 0xCD]);
        assert_eq!(r.read_nbits(12).unwrap(), BigInt::from(0xABC));
        assert_eq!(r.tell(), (1, 3));
        // Zero-width reads consume nothing.
        assert_eq!(r.read_nbits(0).unwrap(), BigInt::zero());
        assert_eq!(r.tell(), (1, 3));
    }

    #[test]
    fn read_uint_vectors() {
        // 0x3F = 0b0011_1111: pairs (0,0) then terminator 1 -> 1.
        let mut r = reader(&[0x3F]);
        assert_eq!(r.read_uint().unwrap(), BigInt::from(1));
        assert_eq!(r.tell(), (0, 4));

        // A leading 1 bit terminates immediately, encoding 0.
        let mut r = reader(&[0x80]);
        assert_eq!(r.read_uint().unwrap(), BigInt::zero());
        assert_eq!(r.tell(), (0, 6));
    }

    #[test]
    fn read_sint_reads_sign_bit() {
        // 0b0011_1111: uint 1 then sign bit 1 -> -1.
        let mut r = reader(&[0x3F]);
        assert_eq!(r.read_sint().unwrap(), BigInt::from(-1));
        assert_eq!(r.tell(), (0, 3));

        // Zero has no sign bit.
        let mut r = reader(&[0x80]);
        assert_eq!(r.read_sint().unwrap(), BigInt::zero());
        assert_eq!(r.tell(), (0, 6));
    }

    #[test]
    fn write_uint_vectors() {
        for (value, expected) in &[
            (0u8, vec![0b1000_0000u8]),
            (1, vec![0b0010_0000]),
            (2, vec![0b0110_0000]),
            (3, vec![0b0000_1000]),
        ] {
            let mut w = writer();
            w.write_uint(&BigInt::from(*value)).unwrap();
            assert_eq!(written(w), *expected, "uint {}", value);
        }
    }

    #[test]
    fn write_sint_appends_sign_bit() {
        let mut w = writer();
        w.write_sint(&BigInt::from(-1)).unwrap();
        // 001 then sign 1 -> 0b0011_0000
        assert_eq!(written(w), vec![0x30]);
    }

    #[test]
    fn exp_golomb_round_trip_through_reader() {
        use hex_slice::AsHex;

        let mut w = writer();
        for value in &[0i64, 1, 2, 3, 255, 256, 12345678] {
            w.write_uint(&BigInt::from(*value)).unwrap();
        }
        let bytes = written(w);
        let mut r = reader(&bytes);
        for value in &[0i64, 1, 2, 3, 255, 256, 12345678] {
            assert_eq!(
                r.read_uint().unwrap(),
                BigInt::from(*value),
                "decoding {} from {:02x}",
                value,
                bytes.as_hex(),
            );
        }
    }

    #[test]
    fn write_nbits_range_checks() {
        let mut w = writer();
        assert!(matches!(
            w.write_nbits(4, &BigInt::from(16)),
            Err(Error::OutOfRange(_))
        ));
        assert!(matches!(
            w.write_nbits(4, &BigInt::from(-1)),
            Err(Error::OutOfRange(_))
        ));
        // Zero-width fields accept only zero.
        assert!(w.write_nbits(0, &BigInt::zero()).is_ok());
        assert!(matches!(
            w.write_nbits(0, &BigInt::one()),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test]
    fn write_bitarray_pads_and_range_checks() {
        let mut w = writer();
        w.write_bitarray(8, bitvec![u8, Msb0; 1, 0, 1, 0].as_bitslice())
            .unwrap();
        assert_eq!(written(w), vec![0xA0]);

        let mut w = writer();
        assert!(matches!(
            w.write_bitarray(2, bitvec![u8, Msb0; 1, 0, 1].as_bitslice()),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test]
    fn write_bytes_pads_and_range_checks() {
        let mut w = writer();
        w.write_bytes(2, &[0xA0]).unwrap();
        assert_eq!(written(w), vec![0xA0, 0x00]);

        let mut w = writer();
        assert!(matches!(
            w.write_bytes(1, &[0xA0, 0xCD]),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test]
    fn reader_bounded_block_synthesises_ones() {
        // One byte of zeros, bounded block of 4 bits: the first four reads
        // return real bits, subsequent reads return 1 without consuming.
        let mut r = reader(&[0x00]);
        r.bounded_block_begin(4).unwrap();
        for _ in 0..4 {
            assert_eq!(r.read_bit().unwrap(), 0);
        }
        let tell = r.tell();
        for _ in 0..4 {
            assert_eq!(r.read_bit().unwrap(), 1);
        }
        assert_eq!(r.tell(), tell);
        assert_eq!(r.bits_remaining(), Some(-4));
        assert_eq!(r.bounded_block_end().unwrap(), 0);
        assert_eq!(r.bits_remaining(), None);
    }

    #[test]
    fn reader_bounded_block_reports_unused_bits() {
        let mut r = reader(&[0xFF; 13]);
        r.bounded_block_begin(100).unwrap();
        r.read_nbits(30).unwrap();
        assert_eq!(r.bounded_block_end().unwrap(), 70);
    }

    #[test]
    fn reader_bounded_blocks_do_not_nest() {
        let mut r = reader(&[0xFF]);
        r.bounded_block_begin(4).unwrap();
        assert!(matches!(
            r.bounded_block_begin(4),
            Err(Error::NestedBoundedBlock)
        ));
        assert!(matches!(
            {
                r.bounded_block_end().unwrap();
                r.bounded_block_end()
            },
            Err(Error::NotInBoundedBlock)
        ));
    }

    #[test]
    fn writer_bounded_block_absorbs_ones_rejects_zeros() {
        let mut w = writer();
        w.bounded_block_begin(2).unwrap();
        w.write_bit(true).unwrap();
        w.write_bit(false).unwrap();
        // Past the end: 1s absorbed, 0s rejected.
        w.write_bit(true).unwrap();
        assert!(matches!(
            w.write_bit(false),
            Err(Error::BoundedBlockOverflow)
        ));
        assert_eq!(w.bounded_block_end().unwrap(), 0);
        assert_eq!(w.tell(), (0, 5));
    }

    #[test]
    fn seek_within_bounded_block_recomputes_remaining() {
        let mut r = reader(&[0xFF; 4]);
        r.bounded_block_begin(16).unwrap();
        r.read_nbits(8).unwrap();
        assert_eq!(r.bits_remaining(), Some(8));
        r.seek(0, 7).unwrap();
        assert_eq!(r.bits_remaining(), Some(16));
        assert!(matches!(r.seek(4, 7), Err(Error::SeekPastBoundedBlock)));
    }

    #[test]
    fn writer_seek_overwrites_in_place() {
        let mut w = writer();
        w.write_nbits(16, &BigInt::from(0xAABBu32)).unwrap();
        w.seek(0, 7).unwrap();
        w.write_nbits(8, &BigInt::from(0xCCu32)).unwrap();
        w.seek(2, 7).unwrap();
        assert_eq!(written(w), vec![0xCC, 0xBB]);
    }

    #[test]
    fn writer_flush_commits_partial_byte_without_advancing() {
        let mut w = writer();
        w.write_nbits(4, &BigInt::from(0xAu8)).unwrap();
        w.flush().unwrap();
        assert_eq!(w.tell(), (0, 3));
        w.write_nbits(4, &BigInt::from(0xBu8)).unwrap();
        assert_eq!(written(w), vec![0xAB]);
    }

    #[test]
    fn reader_tracks_position_across_seeks() {
        let mut r = reader(&[0x01, 0x02, 0x03]);
        r.seek(2, 7).unwrap();
        assert_eq!(r.read_nbits(8).unwrap(), BigInt::from(3));
        r.seek(0, 3).unwrap();
        assert_eq!(r.tell(), (0, 3));
        assert_eq!(r.read_nbits(4).unwrap(), BigInt::from(1));
    }

    proptest! {
        #[test]
        fn nbits_round_trips(value in 0u64..u64::MAX, extra in 0u64..16) {
            let bits = 64 + extra;
            let mut w = writer();
            w.write_nbits(bits, &BigInt::from(value)).unwrap();
            let bytes = written(w);
            let mut r = reader(&bytes);
            prop_assert_eq!(r.read_nbits(bits).unwrap(), BigInt::from(value));
        }

        #[test]
        fn uint_round_trips(value in 0u64..=u64::MAX) {
            let mut w = writer();
            w.write_uint(&BigInt::from(value)).unwrap();
            let bytes = written(w);
            let mut r = reader(&bytes);
            prop_assert_eq!(r.read_uint().unwrap(), BigInt::from(value));
        }

        #[test]
        fn sint_round_trips(value in i64::MIN + 1..=i64::MAX) {
            let mut w = writer();
            w.write_sint(&BigInt::from(value)).unwrap();
            let bytes = written(w);
            let mut r = reader(&bytes);
            prop_assert_eq!(r.read_sint().unwrap(), BigInt::from(value));
        }

        #[test]
        fn encoded_uint_length_matches_predictor(value in 0u64..=u64::MAX) {
            let mut w = writer();
            w.write_uint(&BigInt::from(value)).unwrap();
            let (bytes, bits) = w.tell();
            prop_assert_eq!(
                to_bit_offset(bytes, bits),
                crate::exp_golomb::exp_golomb_length(&BigInt::from(value)).unwrap()
            );
        }
    }
}
