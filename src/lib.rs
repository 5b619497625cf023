//! Serialiser and deserialiser for VC-2 bitstream syntax (SMPTE ST
//! 2042-1), built for conformance tooling: every value in the bitstream is
//! captured, every value written is accounted for, and malformed streams
//! are represented rather than rejected wherever the specification allows.
//!
//! The design centres on a single declarative description of the bitstream
//! ([`syntax`]), transcribed from the specification's pseudocode against
//! the [`SerDes`](serdes::SerDes) trait. Interchangeable back-ends then
//! drive that one description three ways:
//!
//! * [`Deserialiser`](serdes::Deserialiser) reads a bitstream into a tree
//!   of [`Record`](fixeddict::Record)s mirroring the bitstream structure;
//! * [`Serialiser`](serdes::Serialiser) writes such a tree back out,
//!   bit-for-bit;
//! * [`PadAndTruncate`](serdes::PadAndTruncate) normalises an in-memory
//!   tree to exactly the shape the description consumes.
//!
//! On top sit the [`autofill`] passes, which compute the fields that have
//! no fixed value: picture numbers, the major version, and the
//! next/previous parse offsets patched into the stream after
//! serialisation.
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use vc2_bitstream::syntax::deserialise_stream;
//!
//! # fn main() -> vc2_bitstream::Result<()> {
//! let file = BufReader::new(File::open("stream.vc2")?);
//! let stream = deserialise_stream(file)?;
//! for sequence in stream["sequences"].as_list().unwrap() {
//!     println!("{}", sequence.as_record().unwrap());
//! }
//! # Ok(())
//! # }
//! ```

pub mod autofill;
pub mod error;
pub mod exp_golomb;
pub mod fixeddict;
pub mod io;
pub mod records;
pub mod serdes;
pub mod slice_array;
pub mod slice_sizes;
pub mod state;
pub mod syntax;
pub mod tables;
pub mod video_params;

pub use crate::error::{Error, Result};
pub use crate::fixeddict::{Record, RecordSchema, Value};
pub use crate::io::{BitstreamReader, BitstreamWriter, Bits};
pub use crate::serdes::{
    Deserialiser, MonitoredDeserialiser, MonitoredSerialiser, PadAndTruncate, SerDes, Serialiser,
};
pub use crate::state::State;
