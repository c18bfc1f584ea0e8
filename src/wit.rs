//! Bridge from `wit-parser` resolved types to [`WitType`].

use std::path::Path;

use wit_parser::{Handle, Resolve, Type, TypeDefKind, TypeId};

use crate::abi::CanonicalAbiError;
use crate::error::{Error, Result};
use crate::types::{WitCase, WitEnum, WitField, WitFlags, WitRecord, WitType, WitVariant};

impl WitType {
    /// Convert a resolved `wit_parser` type, following type aliases.
    pub fn from_wit(resolve: &Resolve, ty: &Type) -> std::result::Result<Self, CanonicalAbiError> {
        Ok(match ty {
            Type::Bool => Self::Bool,
            Type::U8 => Self::U8,
            Type::U16 => Self::U16,
            Type::U32 => Self::U32,
            Type::U64 => Self::U64,
            Type::S8 => Self::S8,
            Type::S16 => Self::S16,
            Type::S32 => Self::S32,
            Type::S64 => Self::S64,
            Type::F32 => Self::Float32,
            Type::F64 => Self::Float64,
            Type::Char => Self::Char,
            Type::String => Self::String,
            Type::Id(id) => Self::from_type_id(resolve, *id)?,
            Type::ErrorContext => {
                return Err(CanonicalAbiError::UnsupportedType("error-context".to_string()));
            }
        })
    }

    /// Convert the type definition behind `id`.
    pub fn from_type_id(
        resolve: &Resolve,
        id: TypeId,
    ) -> std::result::Result<Self, CanonicalAbiError> {
        let ty_def = resolve
            .types
            .get(id)
            .ok_or_else(|| CanonicalAbiError::UnknownTypeId(format!("{id:?}")))?;
        let name = ty_def.name.clone().unwrap_or_default();
        let convert = |ty: &Type| Self::from_wit(resolve, ty);
        let convert_opt = |ty: &Option<Type>| ty.as_ref().map(convert).transpose();

        Ok(match &ty_def.kind {
            TypeDefKind::Type(t) => convert(t)?,
            TypeDefKind::Record(r) => {
                let fields = r
                    .fields
                    .iter()
                    .map(|f| Ok(WitField::new(f.name.clone(), convert(&f.ty)?)))
                    .collect::<std::result::Result<_, CanonicalAbiError>>()?;
                Self::Record(WitRecord::new(name, fields))
            }
            TypeDefKind::Tuple(t) => {
                Self::Tuple(t.types.iter().map(convert).collect::<std::result::Result<_, _>>()?)
            }
            TypeDefKind::Flags(f) => {
                Self::Flags(WitFlags::new(name, f.flags.iter().map(|flag| flag.name.clone())))
            }
            TypeDefKind::Enum(e) => {
                Self::Enum(WitEnum::new(name, e.cases.iter().map(|case| case.name.clone())))
            }
            TypeDefKind::Variant(v) => {
                let cases = v
                    .cases
                    .iter()
                    .map(|c| Ok(WitCase::new(c.name.clone(), convert_opt(&c.ty)?)))
                    .collect::<std::result::Result<_, CanonicalAbiError>>()?;
                Self::Variant(WitVariant::new(name, cases))
            }
            TypeDefKind::Option(t) => Self::option(convert(t)?),
            TypeDefKind::Result(r) => Self::result(convert_opt(&r.ok)?, convert_opt(&r.err)?),
            TypeDefKind::List(t) => Self::list(convert(t)?),
            TypeDefKind::Handle(Handle::Own(resource)) => Self::Own(resource_name(resolve, *resource)),
            TypeDefKind::Handle(Handle::Borrow(resource)) => {
                Self::Borrow(resource_name(resolve, *resource))
            }
            TypeDefKind::Resource => Self::Resource(name),
            TypeDefKind::Future(t) => Self::Future(convert_opt(t)?.map(Box::new)),
            TypeDefKind::Stream(t) => Self::Stream(convert_opt(t)?.map(Box::new)),
            TypeDefKind::FixedSizeList(_, _) => {
                return Err(CanonicalAbiError::UnsupportedType("fixed-size-list".to_string()));
            }
            TypeDefKind::Map(_, _) => {
                return Err(CanonicalAbiError::UnsupportedType("map".to_string()));
            }
            TypeDefKind::Unknown => {
                return Err(CanonicalAbiError::UnsupportedType("unknown".to_string()));
            }
        })
    }
}

fn resource_name(resolve: &Resolve, id: TypeId) -> String {
    resolve
        .types
        .get(id)
        .and_then(|ty| ty.name.clone())
        .unwrap_or_else(|| "resource".to_string())
}

/// Find a type by name in a WIT Resolve.
pub fn find_type_by_name(resolve: &Resolve, name: &str) -> Option<TypeId> {
    resolve
        .types
        .iter()
        .find(|(_, ty)| ty.name.as_deref() == Some(name))
        .map(|(id, _)| id)
}

/// Find the first named type in a WIT Resolve.
pub fn find_first_named_type(resolve: &Resolve) -> Option<TypeId> {
    resolve
        .types
        .iter()
        .find(|(_, ty)| ty.name.is_some())
        .map(|(id, _)| id)
}

/// Load a WIT type definition from a string.
///
/// Returns the Resolve, the TypeId and the converted [`WitType`]. If
/// `type_name` is None, the first named type in the document is used.
///
/// # Example
///
/// ```ignore
/// use wit_cabi::load_wit_type_from_string;
///
/// let wit_def = r#"
///     package test:types;
///     interface types {
///         record point { x: u32, y: u32 }
///     }
/// "#;
///
/// let (resolve, type_id, ty) = load_wit_type_from_string(wit_def, Some("point"))?;
/// ```
pub fn load_wit_type_from_string(
    wit_definition: &str,
    type_name: Option<&str>,
) -> Result<(Resolve, TypeId, WitType)> {
    let mut resolve = Resolve::new();
    resolve.push_str("input.wit", wit_definition)?;
    select_type(resolve, type_name)
}

/// Load a WIT type definition from a file or package directory.
pub fn load_wit_type_from_path(
    path: impl AsRef<Path>,
    type_name: Option<&str>,
) -> Result<(Resolve, TypeId, WitType)> {
    let mut resolve = Resolve::new();
    resolve.push_path(path)?;
    select_type(resolve, type_name)
}

fn select_type(resolve: Resolve, type_name: Option<&str>) -> Result<(Resolve, TypeId, WitType)> {
    let type_id = match type_name {
        Some(name) => find_type_by_name(&resolve, name)
            .ok_or_else(|| Error::TypeNotFound(name.to_string()))?,
        None => find_first_named_type(&resolve)
            .ok_or_else(|| Error::TypeNotFound("no named type in WIT definition".to_string()))?,
    };
    let ty = WitType::from_type_id(&resolve, type_id)?;
    Ok((resolve, type_id, ty))
}
