//! Component-level and core-level type descriptions.
//!
//! [`WitType`] is the resolved, structural description of a component value
//! type. It is produced by a WIT resolver (see the `wit` feature for a bridge
//! from `wit_parser`) and only ever read by the canonical ABI.

use std::fmt;

/// A resolved WIT value type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WitType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    Float32,
    Float64,
    Char,
    String,
    List(Box<WitType>),
    Tuple(Vec<WitType>),
    Record(WitRecord),
    Variant(WitVariant),
    Enum(WitEnum),
    Flags(WitFlags),
    Option(Box<WitType>),
    Result {
        ok: Option<Box<WitType>>,
        error: Option<Box<WitType>>,
    },
    /// An owned handle to the named resource.
    Own(String),
    /// A borrowed handle to the named resource.
    Borrow(String),
    Future(Option<Box<WitType>>),
    Stream(Option<Box<WitType>>),
    /// A resource type definition itself. Never a valid value type.
    Resource(String),
}

impl WitType {
    pub fn list(element: WitType) -> Self {
        Self::List(Box::new(element))
    }

    pub fn option(wrapped: WitType) -> Self {
        Self::Option(Box::new(wrapped))
    }

    pub fn result(ok: Option<WitType>, error: Option<WitType>) -> Self {
        Self::Result {
            ok: ok.map(Box::new),
            error: error.map(Box::new),
        }
    }

    /// Short name of the type's shape, used in errors and logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::S8 => "s8",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::S64 => "s64",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Char => "char",
            Self::String => "string",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Record(_) => "record",
            Self::Variant(_) => "variant",
            Self::Enum(_) => "enum",
            Self::Flags(_) => "flags",
            Self::Option(_) => "option",
            Self::Result { .. } => "result",
            Self::Own(_) => "own",
            Self::Borrow(_) => "borrow",
            Self::Future(_) => "future",
            Self::Stream(_) => "stream",
            Self::Resource(_) => "resource",
        }
    }

    /// The payload types of a variant-like type, in discriminant order.
    ///
    /// Options are `[none, some]`, results are `[ok, error]` and enums have
    /// one payload-less case per name. Returns `None` for anything that is not
    /// variant-like.
    pub fn variant_cases(&self) -> Option<Vec<Option<&WitType>>> {
        match self {
            Self::Option(wrapped) => Some(vec![None, Some(wrapped.as_ref())]),
            Self::Result { ok, error } => Some(vec![ok.as_deref(), error.as_deref()]),
            Self::Variant(v) => Some(v.case_types()),
            Self::Enum(e) => Some(vec![None; e.cases.len()]),
            _ => None,
        }
    }
}

impl fmt::Display for WitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(elem) => write!(f, "list<{elem}>"),
            Self::Option(inner) => write!(f, "option<{inner}>"),
            Self::Tuple(types) => {
                write!(f, "tuple<")?;
                for (i, ty) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                write!(f, ">")
            }
            Self::Result { ok, error } => match (ok, error) {
                (None, None) => write!(f, "result"),
                (Some(ok), None) => write!(f, "result<{ok}>"),
                (None, Some(err)) => write!(f, "result<_, {err}>"),
                (Some(ok), Some(err)) => write!(f, "result<{ok}, {err}>"),
            },
            Self::Record(r) => write!(f, "{}", r.name),
            Self::Variant(v) => write!(f, "{}", v.name),
            Self::Enum(e) => write!(f, "{}", e.name),
            Self::Flags(fl) => write!(f, "{}", fl.name),
            Self::Own(name) | Self::Resource(name) => write!(f, "{name}"),
            Self::Borrow(name) => write!(f, "borrow<{name}>"),
            other => write!(f, "{}", other.kind_name()),
        }
    }
}

/// A record type: named fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WitRecord {
    pub name: String,
    pub fields: Vec<WitField>,
}

impl WitRecord {
    pub fn new(name: impl Into<String>, fields: Vec<WitField>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WitField {
    pub name: String,
    pub ty: WitType,
}

impl WitField {
    pub fn new(name: impl Into<String>, ty: WitType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A variant type: named cases with optional payloads, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WitVariant {
    pub name: String,
    pub cases: Vec<WitCase>,
}

impl WitVariant {
    pub fn new(name: impl Into<String>, cases: Vec<WitCase>) -> Self {
        Self {
            name: name.into(),
            cases,
        }
    }

    pub fn case_types(&self) -> Vec<Option<&WitType>> {
        self.cases.iter().map(|c| c.ty.as_ref()).collect()
    }

    pub fn case_index(&self, name: &str) -> Option<usize> {
        self.cases.iter().position(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WitCase {
    pub name: String,
    pub ty: Option<WitType>,
}

impl WitCase {
    pub fn new(name: impl Into<String>, ty: Option<WitType>) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WitEnum {
    pub name: String,
    pub cases: Vec<String>,
}

impl WitEnum {
    pub fn new<S: Into<String>>(name: impl Into<String>, cases: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            cases: cases.into_iter().map(Into::into).collect(),
        }
    }

    pub fn case_index(&self, name: &str) -> Option<usize> {
        self.cases.iter().position(|c| c == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WitFlags {
    pub name: String,
    pub flags: Vec<String>,
}

impl WitFlags {
    pub fn new<S: Into<String>>(name: impl Into<String>, flags: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            flags: flags.into_iter().map(Into::into).collect(),
        }
    }
}

/// The four value types a core WebAssembly function can pass directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreType {
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for CoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Integer type holding the discriminant of a variant-like type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscriminantType {
    U8,
    U16,
    U32,
}

impl DiscriminantType {
    pub fn as_wit_type(self) -> WitType {
        match self {
            Self::U8 => WitType::U8,
            Self::U16 => WitType::U16,
            Self::U32 => WitType::U32,
        }
    }

    /// Size in bytes, which is also its alignment.
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// In-memory representation of a flags value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagsRepr {
    U8,
    U16,
    /// The given number of consecutive 32-bit words.
    U32(usize),
}
