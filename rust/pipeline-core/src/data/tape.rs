// rust/pipeline-core/src/data/tape.rs

//! Position tape used to record and reload the resumption state of a pipeline.
//!
//! A tape is an ordered log of primitive values. Every stage appends its own
//! state and then delegates to its upstream stage, so the layout of a tape is
//! defined entirely by the shape of the pipeline that produced it. There are
//! no field names and no versioning; reads are checked against the tag of
//! each value and fail with [`PipelineError::PositionMismatch`] instead of
//! reinterpreting data.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A single tagged value on a [`Tape`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TapeValue {
    Bool(bool),
    UInt(u64),
    Int(i64),
    Float(f64),
    Str(String),
}

impl TapeValue {
    /// Name of the value's tag, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            TapeValue::Bool(_) => "bool",
            TapeValue::UInt(_) => "unsigned integer",
            TapeValue::Int(_) => "signed integer",
            TapeValue::Float(_) => "float",
            TapeValue::Str(_) => "string",
        }
    }
}

/// Ordered, read-once log of [`TapeValue`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tape {
    values: Vec<TapeValue>,
    #[serde(skip)]
    cursor: usize,
}

impl Tape {
    /// Creates an empty tape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tape holding `values`, positioned at the first one.
    pub fn from_values(values: Vec<TapeValue>) -> Self {
        Self { values, cursor: 0 }
    }

    /// Appends `value` to the end of the tape.
    pub fn record<T: Recordable>(&mut self, value: &T) {
        value.record(self);
    }

    /// Reads the next value as a `T`.
    ///
    /// # Errors
    ///
    /// Returns a position mismatch if the tape is exhausted or the next value
    /// does not have the type `T` was recorded with.
    pub fn read<T: Recordable>(&mut self) -> Result<T> {
        T::read(self)
    }

    /// Appends a raw value.
    pub fn push_value(&mut self, value: TapeValue) {
        self.values.push(value);
    }

    /// Reads the next raw value.
    pub fn read_value(&mut self, expected: &'static str) -> Result<TapeValue> {
        let value = self.values.get(self.cursor).cloned().ok_or_else(|| {
            PipelineError::position_mismatch(self.cursor, expected, "end of tape")
        })?;
        self.cursor += 1;
        Ok(value)
    }

    /// Moves the read cursor back to the first value.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Index of the next value to be read.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Number of values that have not been read yet.
    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[TapeValue] {
        &self.values
    }

    /// Serializes the recorded values with bincode. The read cursor is not
    /// part of the encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| PipelineError::serialization(format!("failed to encode tape: {e}")))
    }

    /// Decodes a tape produced by [`Tape::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| PipelineError::serialization(format!("failed to decode tape: {e}")))
    }

    fn mismatch(&self, expected: &'static str, found: &TapeValue) -> PipelineError {
        // The cursor has already moved past the offending value.
        PipelineError::position_mismatch(
            self.cursor.saturating_sub(1),
            expected,
            format!("{} {:?}", found.kind(), found),
        )
    }
}

/// Values that can be written to and read back from a [`Tape`].
pub trait Recordable: Sized {
    fn record(&self, tape: &mut Tape);

    fn read(tape: &mut Tape) -> Result<Self>;
}

macro_rules! impl_recordable_unsigned {
    ($($ty:ty),*) => {
        $(
            impl Recordable for $ty {
                fn record(&self, tape: &mut Tape) {
                    tape.push_value(TapeValue::UInt(*self as u64));
                }

                fn read(tape: &mut Tape) -> Result<Self> {
                    match tape.read_value(stringify!($ty))? {
                        TapeValue::UInt(v) => <$ty>::try_from(v).map_err(|_| {
                            PipelineError::position_mismatch(
                                tape.position() - 1,
                                stringify!($ty),
                                format!("out of range value {v}"),
                            )
                        }),
                        other => Err(tape.mismatch(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

macro_rules! impl_recordable_signed {
    ($($ty:ty),*) => {
        $(
            impl Recordable for $ty {
                fn record(&self, tape: &mut Tape) {
                    tape.push_value(TapeValue::Int(*self as i64));
                }

                fn read(tape: &mut Tape) -> Result<Self> {
                    match tape.read_value(stringify!($ty))? {
                        TapeValue::Int(v) => <$ty>::try_from(v).map_err(|_| {
                            PipelineError::position_mismatch(
                                tape.position() - 1,
                                stringify!($ty),
                                format!("out of range value {v}"),
                            )
                        }),
                        other => Err(tape.mismatch(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

impl_recordable_unsigned!(u8, u16, u32, u64, usize);
impl_recordable_signed!(i32, i64);

impl Recordable for bool {
    fn record(&self, tape: &mut Tape) {
        tape.push_value(TapeValue::Bool(*self));
    }

    fn read(tape: &mut Tape) -> Result<Self> {
        match tape.read_value("bool")? {
            TapeValue::Bool(v) => Ok(v),
            other => Err(tape.mismatch("bool", &other)),
        }
    }
}

impl Recordable for f64 {
    fn record(&self, tape: &mut Tape) {
        tape.push_value(TapeValue::Float(*self));
    }

    fn read(tape: &mut Tape) -> Result<Self> {
        match tape.read_value("f64")? {
            TapeValue::Float(v) => Ok(v),
            other => Err(tape.mismatch("f64", &other)),
        }
    }
}

impl Recordable for f32 {
    fn record(&self, tape: &mut Tape) {
        tape.push_value(TapeValue::Float(f64::from(*self)));
    }

    fn read(tape: &mut Tape) -> Result<Self> {
        match tape.read_value("f32")? {
            TapeValue::Float(v) => Ok(v as f32),
            other => Err(tape.mismatch("f32", &other)),
        }
    }
}

impl Recordable for String {
    fn record(&self, tape: &mut Tape) {
        tape.push_value(TapeValue::Str(self.clone()));
    }

    fn read(tape: &mut Tape) -> Result<Self> {
        match tape.read_value("string")? {
            TapeValue::Str(v) => Ok(v),
            other => Err(tape.mismatch("string", &other)),
        }
    }
}

// Length prefix followed by the elements.
impl<T: Recordable> Recordable for Vec<T> {
    fn record(&self, tape: &mut Tape) {
        tape.record(&self.len());
        for item in self {
            item.record(tape);
        }
    }

    fn read(tape: &mut Tape) -> Result<Self> {
        let len: usize = tape.read()?;
        if len > tape.remaining() {
            return Err(PipelineError::position_mismatch(
                tape.position() - 1,
                "sequence length",
                format!("{len} elements with {} values left", tape.remaining()),
            ));
        }
        (0..len).map(|_| T::read(tape)).collect()
    }
}

impl<T: Recordable> Recordable for Option<T> {
    fn record(&self, tape: &mut Tape) {
        match self {
            Some(value) => {
                tape.record(&true);
                value.record(tape);
            }
            None => tape.record(&false),
        }
    }

    fn read(tape: &mut Tape) -> Result<Self> {
        if tape.read::<bool>()? {
            Ok(Some(T::read(tape)?))
        } else {
            Ok(None)
        }
    }
}

impl<A: Recordable, B: Recordable> Recordable for (A, B) {
    fn record(&self, tape: &mut Tape) {
        self.0.record(tape);
        self.1.record(tape);
    }

    fn read(tape: &mut Tape) -> Result<Self> {
        let a = A::read(tape)?;
        let b = B::read(tape)?;
        Ok((a, b))
    }
}
