//! A framework for turning the VC-2 pseudocode into general-purpose
//! bitstream serialisers and deserialisers.
//!
//! The VC-2 specification defines its bitstream as a series of `read_*`
//! pseudocode functions. Transcribing those functions once against the
//! [`SerDes`] trait makes the *same* description drive three operations:
//!
//! * [`Deserialiser`] reads a bitstream and assembles a tree of
//!   [`Record`](crate::fixeddict::Record)s holding every value read;
//! * [`Serialiser`] walks a pre-populated tree and writes the
//!   corresponding bitstream;
//! * [`PadAndTruncate`] touches no bitstream at all, instead normalising a
//!   tree to exactly the shape the description consumes.
//!
//! Every operation names a *target*: a key in the current record which the
//! value read/written is stored in or fetched from. The framework checks
//! that targets and bitstream fields correspond one-to-one: a target used
//! twice, a value left unused, or a list of the wrong length is reported
//! eagerly with the full path of the offending field.
//!
//! ```ignore
//! fn frame_size<S: SerDes>(serdes: &mut S) -> Result<()> {
//!     if serdes.bool("custom_dimensions_flag")? {
//!         serdes.uint("frame_width")?;
//!         serdes.uint("frame_height")?;
//!     }
//!     Ok(())
//! }
//!
//! let mut des = Deserialiser::new(BitstreamReader::new(file)?);
//! frame_size(&mut des)?;
//! let tree = des.finish()?;
//! ```

mod deserialiser;
mod monitored;
mod pad;
mod serialiser;

pub use deserialiser::Deserialiser;
pub use monitored::{MonitoredDeserialiser, MonitoredSerialiser};
pub use pad::PadAndTruncate;
pub use serialiser::{DefaultValues, Serialiser};

use num_bigint::BigInt;

use crate::error::{Error, Result};
use crate::fixeddict::{Record, RecordSchema, Value};
use crate::io::Bits;

/// One element of a structured bitstream path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    Key(String),
    Index(usize),
}

/// The uniform traversal interface implemented by every back-end.
///
/// Primitive operations ([`bool`](SerDes::bool), [`nbits`](SerDes::nbits),
/// [`uint`](SerDes::uint), ...) move values between the bitstream and the
/// current record. Structural operations shape the tree (nested contexts,
/// lists, record types) and manage bounded blocks. All operations return
/// the logical value handled so the calling description can branch on it.
pub trait SerDes {
    /// A single bit, as a boolean (A.3.2).
    fn bool(&mut self, target: &'static str) -> Result<bool>;

    /// A fixed-width unsigned integer (A.3.3).
    fn nbits(&mut self, target: &'static str, bits: u64) -> Result<BigInt>;

    /// A whole-byte unsigned integer (A.3.4). No byte alignment is
    /// performed.
    fn uint_lit(&mut self, target: &'static str, num_bytes: u64) -> Result<BigInt>;

    /// A fixed-length bit string.
    fn bitarray(&mut self, target: &'static str, bits: u64) -> Result<Bits>;

    /// A fixed-length byte string.
    fn bytes(&mut self, target: &'static str, num_bytes: u64) -> Result<Vec<u8>>;

    /// A variable-length unsigned exp-Golomb integer (A.4.3).
    fn uint(&mut self, target: &'static str) -> Result<BigInt>;

    /// A variable-length signed exp-Golomb integer (A.4.4).
    fn sint(&mut self, target: &'static str) -> Result<BigInt>;

    /// Begin a bounded block of `length` bits (A.4.2). Must be matched by
    /// [`bounded_block_end`](SerDes::bounded_block_end); prefer the scoped
    /// [`bounded_block`](SerDes::bounded_block).
    fn bounded_block_begin(&mut self, length: u64) -> Result<()>;

    /// End the current bounded block, storing any unused bits in `target`
    /// as a bit string.
    fn bounded_block_end(&mut self, target: &'static str) -> Result<()>;

    /// Declare that `target` holds a list; subsequent operations on it
    /// advance through the elements in order. Has no effect on the
    /// bitstream.
    fn declare_list(&mut self, target: &'static str) -> Result<()>;

    /// Set (or change) the type of the current record, keeping its
    /// contents. Has no effect on the bitstream.
    fn set_context_type(&mut self, schema: &'static RecordSchema) -> Result<()>;

    /// Enter a nested record stored under `target`. Must be matched by
    /// [`subcontext_leave`](SerDes::subcontext_leave); prefer the scoped
    /// [`subcontext`](SerDes::subcontext).
    fn subcontext_enter(&mut self, target: &'static str) -> Result<()>;

    /// Leave the current nested record, verifying it was fully consumed.
    fn subcontext_leave(&mut self) -> Result<()>;

    /// Store `value` in `target` without touching the bitstream. Unlike
    /// other operations this always writes, replacing any existing value;
    /// a second use of the same target fails with
    /// [`Error::ReusedTarget`].
    fn computed_value(&mut self, target: &'static str, value: Value) -> Result<()>;

    /// Whether `target` in the current record has been fully consumed.
    fn is_target_complete(&self, target: &str) -> bool;

    /// Assert that the whole traversal is complete: every value consumed,
    /// no nested context and no bounded block left open.
    fn verify_complete(&self) -> Result<()>;

    /// The current bitstream position as a `(bytes, bits)` pair.
    fn tell(&self) -> (u64, u8);

    /// Whether the underlying stream is exhausted. Always true for
    /// write-style back-ends.
    fn end_of_stream(&self) -> bool;

    /// The structured path of the field currently being processed.
    fn path(&self, target: Option<&str>) -> Vec<PathElement>;

    /// A human-readable rendering of [`path`](SerDes::path), e.g.
    /// `SequenceHeader['video_parameters']['frame_size']['frame_width']`.
    fn describe_path(&self, target: Option<&str>) -> String;

    /// Advance to the next whole-byte boundary (A.2.4), storing the skipped
    /// bits in `target` as a bit string (zero bits long when already
    /// aligned).
    fn byte_align(&mut self, target: &'static str) -> Result<()> {
        let (_, bits) = self.tell();
        let num_bits = if bits == 7 { 0 } else { u64::from(bits) + 1 };
        self.bitarray(target, num_bits)?;
        Ok(())
    }

    /// Scoped form of [`subcontext_enter`](SerDes::subcontext_enter) /
    /// [`subcontext_leave`](SerDes::subcontext_leave).
    fn subcontext<T, F>(&mut self, target: &'static str, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.subcontext_enter(target)?;
        let result = f(self)?;
        self.subcontext_leave()?;
        Ok(result)
    }

    /// Scoped form of [`bounded_block_begin`](SerDes::bounded_block_begin)
    /// / [`bounded_block_end`](SerDes::bounded_block_end).
    fn bounded_block<T, F>(&mut self, target: &'static str, length: u64, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.bounded_block_begin(length)?;
        let result = f(self)?;
        self.bounded_block_end(target)?;
        Ok(result)
    }
}

/// How far through a target the traversal has got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetUse {
    /// A non-list target which has been used once.
    Scalar,
    /// A declared list target; the index is the next element to use.
    List(usize),
}

#[derive(Debug)]
struct Frame {
    /// The parent record, with the child taken out of it.
    record: Record,
    used: Vec<(&'static str, TargetUse)>,
    /// Where the child lives in `record`.
    target: &'static str,
    index: Option<usize>,
}

/// Context-dictionary bookkeeping shared by every back-end: the current
/// record, the used-target log, and the stack of entered parent records.
///
/// The current record is *taken out of* its parent on
/// [`enter`](ContextStack::enter) and re-inserted on
/// [`leave`](ContextStack::leave), so the stack always owns the whole
/// tree.
#[derive(Debug)]
pub(crate) struct ContextStack {
    cur: Record,
    used: Vec<(&'static str, TargetUse)>,
    stack: Vec<Frame>,
}

impl ContextStack {
    pub fn new(context: Record) -> ContextStack {
        ContextStack {
            cur: context,
            used: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn use_of(&self, target: &str) -> Option<TargetUse> {
        self.used
            .iter()
            .find(|(t, _)| *t == target)
            .map(|(_, u)| *u)
    }

    fn set_use(&mut self, target: &'static str, to: TargetUse) {
        for (t, u) in self.used.iter_mut() {
            if *t == target {
                *u = to;
                return;
            }
        }
        self.used.push((target, to));
    }

    /// The schema name of the current record, or `"Record"`.
    pub fn cur_type_name(&self) -> &'static str {
        self.cur.type_name()
    }

    /// Store a value in the current record, appending to (or overwriting
    /// within) declared lists.
    pub fn set_value(&mut self, target: &'static str, value: Value) -> Result<()> {
        match self.use_of(target) {
            None => {
                self.cur.insert(target, value)?;
                self.used.push((target, TargetUse::Scalar));
                Ok(())
            }
            Some(TargetUse::Scalar) => {
                Err(Error::ReusedTarget(self.describe_path(Some(target))))
            }
            Some(TargetUse::List(i)) => {
                if let Some(Value::List(list)) = self.cur.get_mut(target) {
                    if i == list.len() {
                        list.push(value);
                    } else {
                        list[i] = value;
                    }
                } else {
                    return Err(Error::ListTargetContainsNonList(
                        self.describe_path(Some(target)),
                    ));
                }
                self.set_use(target, TargetUse::List(i + 1));
                Ok(())
            }
        }
    }

    /// Fetch (a clone of) a value from the current record, advancing
    /// through declared lists.
    pub fn get_value(&mut self, target: &'static str) -> Result<Value> {
        match self.use_of(target) {
            None => {
                self.used.push((target, TargetUse::Scalar));
                match self.cur.get(target) {
                    Some(value) => Ok(value.clone()),
                    None => Err(Error::MissingTarget(self.describe_path(Some(target)))),
                }
            }
            Some(TargetUse::Scalar) => {
                Err(Error::ReusedTarget(self.describe_path(Some(target))))
            }
            Some(TargetUse::List(i)) => {
                let fetched = match self.cur.get(target) {
                    Some(Value::List(list)) => Ok(list.get(i).cloned()),
                    _ => Err(()),
                };
                match fetched {
                    Ok(Some(value)) => {
                        self.set_use(target, TargetUse::List(i + 1));
                        Ok(value)
                    }
                    Ok(None) => Err(Error::ListTargetExhausted(
                        self.describe_path(Some(target)),
                    )),
                    Err(()) => Err(Error::ListTargetContainsNonList(
                        self.describe_path(Some(target)),
                    )),
                }
            }
        }
    }

    /// Fetch, coerce and store back a value in one step (the
    /// pad-and-truncate primitive). `coerce` receives the existing value,
    /// if any, and returns its normalised replacement.
    pub fn normalise_value(
        &mut self,
        target: &'static str,
        coerce: &mut dyn FnMut(Option<Value>) -> Value,
    ) -> Result<Value> {
        match self.use_of(target) {
            None => {
                self.used.push((target, TargetUse::Scalar));
                let old = self.cur.remove(target);
                let new = coerce(old);
                self.cur.insert(target, new.clone())?;
                Ok(new)
            }
            Some(TargetUse::Scalar) => {
                Err(Error::ReusedTarget(self.describe_path(Some(target))))
            }
            Some(TargetUse::List(i)) => {
                let new;
                if let Some(Value::List(list)) = self.cur.get_mut(target) {
                    if i < list.len() {
                        let old = std::mem::replace(&mut list[i], Value::Auto);
                        new = coerce(Some(old));
                        list[i] = new.clone();
                    } else {
                        new = coerce(None);
                        list.push(new.clone());
                    }
                } else {
                    return Err(Error::ListTargetContainsNonList(
                        self.describe_path(Some(target)),
                    ));
                }
                self.set_use(target, TargetUse::List(i + 1));
                Ok(new)
            }
        }
    }

    pub fn declare_list(&mut self, target: &'static str) -> Result<()> {
        if self.use_of(target).is_some() {
            return Err(Error::ReusedTarget(self.describe_path(Some(target))));
        }
        if !self.cur.contains_key(target) {
            self.cur.insert(target, Value::List(Vec::new()))?;
        } else if !matches!(self.cur.get(target), Some(Value::List(_))) {
            let found = self.cur.get(target).map_or("nothing", Value::type_name);
            return Err(Error::ListTargetContainsNonList(format!(
                "{} contains {} (which is not a list)",
                self.describe_path(Some(target)),
                found,
            )));
        }
        self.used.push((target, TargetUse::List(0)));
        Ok(())
    }

    pub fn set_context_type(&mut self, schema: &'static RecordSchema) -> Result<()> {
        if !self.cur.is_type(schema) {
            self.cur.retype(schema)?;
        }
        Ok(())
    }

    /// Take the record stored under `target` out of the current record
    /// (creating an empty one if absent) and make it current.
    pub fn enter(&mut self, target: &'static str) -> Result<()> {
        let (child, index) = self.take_or_create_record(target)?;
        let parent = std::mem::replace(&mut self.cur, child);
        let used = std::mem::take(&mut self.used);
        self.stack.push(Frame {
            record: parent,
            used,
            target,
            index,
        });
        Ok(())
    }

    fn take_or_create_record(&mut self, target: &'static str) -> Result<(Record, Option<usize>)> {
        match self.use_of(target) {
            None => {
                self.used.push((target, TargetUse::Scalar));
                match self.cur.remove(target) {
                    None => {
                        self.cur.ensure_key(target)?;
                        Ok((Record::untyped(), None))
                    }
                    Some(Value::Record(record)) => Ok((record, None)),
                    Some(other) => {
                        let found = other.type_name();
                        self.cur.insert(target, other)?;
                        Err(Error::WrongValueType {
                            path: self.describe_path(Some(target)),
                            expected: "record",
                            found,
                        })
                    }
                }
            }
            Some(TargetUse::Scalar) => {
                Err(Error::ReusedTarget(self.describe_path(Some(target))))
            }
            Some(TargetUse::List(i)) => {
                let taken = if let Some(Value::List(list)) = self.cur.get_mut(target) {
                    if i == list.len() {
                        list.push(Value::Record(Record::untyped()));
                    }
                    std::mem::replace(&mut list[i], Value::Auto)
                } else {
                    return Err(Error::ListTargetContainsNonList(
                        self.describe_path(Some(target)),
                    ));
                };
                match taken {
                    Value::Record(record) => {
                        self.set_use(target, TargetUse::List(i + 1));
                        Ok((record, Some(i)))
                    }
                    other => {
                        let found = other.type_name();
                        if let Some(Value::List(list)) = self.cur.get_mut(target) {
                            list[i] = other;
                        }
                        Err(Error::WrongValueType {
                            path: self.describe_path(Some(target)),
                            expected: "record",
                            found,
                        })
                    }
                }
            }
        }
    }

    /// Re-insert the current record into its parent and make the parent
    /// current. Callers verify completeness first.
    pub fn leave(&mut self) -> Result<()> {
        let frame = self.stack.pop().ok_or(Error::NotInNestedContext)?;
        let child = std::mem::replace(&mut self.cur, frame.record);
        self.used = frame.used;
        match frame.index {
            None => {
                self.cur.insert(frame.target, Value::Record(child))?;
            }
            Some(i) => {
                if let Some(Value::List(list)) = self.cur.get_mut(frame.target) {
                    list[i] = Value::Record(child);
                }
            }
        }
        Ok(())
    }

    pub fn verify_target_complete(&self, target: &str) -> Result<()> {
        match self.use_of(target) {
            None => Err(Error::UnusedTarget(self.describe_path(Some(target)))),
            Some(TargetUse::Scalar) => Ok(()),
            Some(TargetUse::List(i)) => {
                let len = self.cur.get(target).and_then(Value::as_list).map_or(0, Vec::len);
                if i == len {
                    Ok(())
                } else {
                    Err(Error::UnusedTarget(format!(
                        "{}['{}'][{}:{}]",
                        self.describe_path(None),
                        target,
                        i,
                        len,
                    )))
                }
            }
        }
    }

    pub fn is_target_complete(&self, target: &str) -> bool {
        self.verify_target_complete(target).is_ok()
    }

    /// Verify every entry (and every list element) in the current record
    /// has been used.
    pub fn verify_context_complete(&self) -> Result<()> {
        for key in self.cur.keys() {
            self.verify_target_complete(key)?;
        }
        Ok(())
    }

    pub fn verify_no_open_contexts(&self) -> Result<()> {
        if !self.stack.is_empty() {
            return Err(Error::UnclosedNestedContext(self.describe_path(None)));
        }
        Ok(())
    }

    /// Truncate every declared list in the current record to the number of
    /// elements the traversal consumed (pad-and-truncate only).
    pub fn truncate_lists_to_consumed(&mut self) {
        for index in 0..self.used.len() {
            let (target, use_) = self.used[index];
            if let TargetUse::List(i) = use_ {
                if let Some(Value::List(list)) = self.cur.get_mut(target) {
                    list.truncate(i);
                }
            }
        }
    }

    /// Unwrap the root record. Only meaningful once the stack is empty.
    pub fn into_context(self) -> Record {
        debug_assert!(self.stack.is_empty());
        self.cur
    }

    pub fn path(&self, target: Option<&str>) -> Vec<PathElement> {
        let mut out = Vec::new();
        for frame in &self.stack {
            out.push(PathElement::Key(frame.target.to_string()));
            if let Some(i) = frame.index {
                out.push(PathElement::Index(i));
            }
        }
        if let Some(target) = target {
            out.push(PathElement::Key(target.to_string()));
            if let Some(TargetUse::List(i)) = self.use_of(target) {
                // The recorded index is the *next* element to use; the most
                // recently used element is one before it.
                if i != 0 {
                    out.push(PathElement::Index(i - 1));
                }
            }
        }
        out
    }

    pub fn describe_path(&self, target: Option<&str>) -> String {
        let root = self
            .stack
            .first()
            .map(|f| f.record.type_name())
            .unwrap_or_else(|| self.cur.type_name());
        let mut out = String::from(root);
        for element in self.path(target) {
            match element {
                PathElement::Key(key) => out.push_str(&format!("['{}']", key)),
                PathElement::Index(i) => out.push_str(&format!("[{}]", i)),
            }
        }
        out
    }
}
