//! Error types shared by the bit-level I/O layer and the serialisation
//! framework.
//!
//! Errors fall into two groups:
//!
//! * *Data errors* describe a problem with the bytes or values being
//!   processed: [`Error::OutOfRange`], [`Error::EndOfStream`] and
//!   [`Error::BoundedBlockOverflow`].
//! * *Structural errors* describe a mismatch between a value tree and the
//!   bitstream description traversing it (a target used twice, a list too
//!   long, an unclosed bounded block, ...). These carry the path of the
//!   offending field, e.g.
//!   `Stream['sequences'][0]['data_units'][3]['parse_info']['parse_code']`.
//!
//! No error is recovered inside this crate; everything propagates to the
//! caller of the top-level operation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A value was too wide for the requested field, or negative where an
    /// unsigned encoding was required.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// The underlying byte stream ended mid-read outside a bounded block.
    #[error("unexpected end of stream")]
    EndOfStream,

    /// A `0` bit was written past the end of a bounded block. (`1` bits past
    /// the end are silently absorbed.)
    #[error("cannot write 0s past the end of a bounded block")]
    BoundedBlockOverflow,

    /// `bounded_block_begin` was called while a block was already open.
    #[error("bounded blocks cannot be nested")]
    NestedBoundedBlock,

    /// `bounded_block_end` was called with no block open.
    #[error("not in a bounded block")]
    NotInBoundedBlock,

    /// A seek attempted to move forwards past the end of the active bounded
    /// block.
    #[error("cannot seek past the end of a bounded block")]
    SeekPastBoundedBlock,

    /// A key was used which is not part of the record type's declared key
    /// set.
    #[error("key {key:?} not allowed in {record_type}")]
    FixedDictKey {
        key: &'static str,
        record_type: &'static str,
    },

    /// A non-list target was read or written more than once, or a list was
    /// re-declared.
    #[error("target used more than once: {0}")]
    ReusedTarget(String),

    /// A value was present in a record but never consumed by the traversal.
    #[error("unused target: {0}")]
    UnusedTarget(String),

    /// The traversal required a value which was not present in the record
    /// (and, during serialisation, no default was available).
    #[error("no value for target: {0}")]
    MissingTarget(String),

    /// More values were consumed from a list target than it contains.
    #[error("list target exhausted: {0}")]
    ListTargetExhausted(String),

    /// A target declared as a list holds a non-list value.
    #[error("list target contains non-list: {0}")]
    ListTargetContainsNonList(String),

    /// A traversal finished while a bounded block was still open.
    #[error("unclosed bounded block")]
    UnclosedBoundedBlock,

    /// A traversal finished while a nested context was still open.
    #[error("unclosed nested context: {0}")]
    UnclosedNestedContext(String),

    /// `subcontext_leave` was called with no nested context open.
    #[error("not in a nested context")]
    NotInNestedContext,

    /// A value in the tree had the wrong type for the operation consuming
    /// it.
    #[error("{path}: expected {expected}, found {found}")]
    WrongValueType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The `Auto` marker reached the serialiser. `Auto` requests an
    /// auto-fill pass and has no bitstream representation.
    #[error("{0}: Auto cannot be serialised")]
    AutoNotSerialisable(String),

    /// A slice, subband or coefficient coordinate was out of range.
    #[error("{0} out of range")]
    IndexOutOfRange(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
