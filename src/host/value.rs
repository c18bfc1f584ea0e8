//! Dynamically typed values handled by the reference host.

use std::fmt;

use crate::abi::CanonicalAbiError;

/// A core operand or a component-level value.
///
/// The first four variants are what crosses a core function boundary; the
/// rest mirror the component value shapes. Memory loads produce the
/// width-exact integer variants (`U8`, `S16`, ...) so lifting can tell a
/// byte read from memory apart from an `i32` passed in a register.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),

    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    S8(i8),
    S16(i16),
    S32(i32),
    S64(i64),
    Float32(f32),
    Float64(f64),
    Char(char),
    String(String),
    List(Vec<Val>),
    /// Fields in declaration order.
    Record(Vec<(String, Val)>),
    Tuple(Vec<Val>),
    /// Case name and payload.
    Variant(String, Option<Box<Val>>),
    Enum(String),
    Option(Option<Box<Val>>),
    Result(Result<Option<Box<Val>>, Option<Box<Val>>>),
    /// Names of the flags that are set.
    Flags(Vec<String>),
}

impl Val {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F32(_) => "core f32",
            Self::F64(_) => "core f64",
            Self::Bool(_) => "bool",
            Self::U8(_) => "u8",
            Self::U16(_) => "u16",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::S8(_) => "s8",
            Self::S16(_) => "s16",
            Self::S32(_) => "s32",
            Self::S64(_) => "s64",
            Self::Float32(_) => "f32",
            Self::Float64(_) => "f64",
            Self::Char(_) => "char",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Record(_) => "record",
            Self::Tuple(_) => "tuple",
            Self::Variant(..) => "variant",
            Self::Enum(_) => "enum",
            Self::Option(_) => "option",
            Self::Result(_) => "result",
            Self::Flags(_) => "flags",
        }
    }

    /// Low 32 bits of any integer-like value.
    ///
    /// 64-bit values wrap, narrower values are extended according to their
    /// own signedness.
    pub(crate) fn bits32(&self) -> Result<u32, CanonicalAbiError> {
        Ok(match *self {
            Self::I32(v) | Self::S32(v) => v as u32,
            Self::I64(v) | Self::S64(v) => v as u32,
            Self::U8(v) => u32::from(v),
            Self::U16(v) => u32::from(v),
            Self::U32(v) => v,
            Self::U64(v) => v as u32,
            Self::S8(v) => v as u32,
            Self::S16(v) => v as u32,
            Self::F32(v) | Self::Float32(v) => v.to_bits(),
            _ => return Err(CanonicalAbiError::mismatch("32-bit integer", self.kind_name())),
        })
    }

    /// All 64 bits of an integer-like value. `i32` operands zero-extend.
    pub(crate) fn bits64(&self) -> Result<u64, CanonicalAbiError> {
        Ok(match *self {
            Self::I64(v) | Self::S64(v) => v as u64,
            Self::U64(v) => v,
            Self::F64(v) | Self::Float64(v) => v.to_bits(),
            _ => u64::from(self.bits32()?),
        })
    }
}

impl From<bool> for Val {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u32> for Val {
    fn from(value: u32) -> Self {
        Self::U32(value)
    }
}

impl From<u64> for Val {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl From<&str> for Val {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Val {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "i32:{v}"),
            Self::I64(v) => write!(f, "i64:{v}"),
            Self::F32(v) => write!(f, "f32:{v}"),
            Self::F64(v) => write!(f, "f64:{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::S8(v) => write!(f, "{v}"),
            Self::S16(v) => write!(f, "{v}"),
            Self::S32(v) => write!(f, "{v}"),
            Self::S64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Char(c) => write!(f, "{c:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) | Self::Tuple(items) => {
                let (open, close) = if matches!(self, Self::List(_)) {
                    ("[", "]")
                } else {
                    ("(", ")")
                };
                write!(f, "{open}")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "{close}")
            }
            Self::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
            Self::Variant(name, None) | Self::Enum(name) => write!(f, "{name}"),
            Self::Variant(name, Some(payload)) => write!(f, "{name}({payload})"),
            Self::Option(None) => write!(f, "none"),
            Self::Option(Some(v)) => write!(f, "some({v})"),
            Self::Result(Ok(None)) => write!(f, "ok"),
            Self::Result(Ok(Some(v))) => write!(f, "ok({v})"),
            Self::Result(Err(None)) => write!(f, "err"),
            Self::Result(Err(Some(v))) => write!(f, "err({v})"),
            Self::Flags(names) => write!(f, "{{{}}}", names.join(", ")),
        }
    }
}
