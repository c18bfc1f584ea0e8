//! Flattening of WIT types into core WebAssembly value types.
//!
//! See <https://github.com/WebAssembly/component-model/blob/main/design/mvp/CanonicalABI.md#flattening>.

use super::CanonicalAbiError;
use super::layout::{discriminant_type_of, number_of_i32};
use crate::types::{CoreType, WitType};

/// Maximum number of flat parameters before arguments are passed in memory.
pub const MAX_FLAT_PARAMS: usize = 16;

/// Maximum number of flat results before a return pointer is used.
pub const MAX_FLAT_RESULTS: usize = 1;

/// Direction of a cross-component call.
///
/// A cross-component call is proxied by the host, so a call is lowered on
/// the caller side and lifted on the callee side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    /// A component calls an imported function; component values are lowered.
    Lower,
    /// An exported function is called; core values are lifted.
    Lift,
}

/// One flattened core slot and the field/case names it originated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSegment {
    pub label: Vec<String>,
    pub ty: CoreType,
}

impl SignatureSegment {
    pub fn new(ty: CoreType) -> Self {
        Self { label: Vec::new(), ty }
    }

    pub fn labeled(label: impl Into<String>, ty: CoreType) -> Self {
        Self {
            label: vec![label.into()],
            ty,
        }
    }

    /// Returns the segment with `label` added as the outermost path element.
    pub fn prepending(mut self, label: impl Into<String>) -> Self {
        self.label.insert(0, label.into());
        self
    }

    /// The label path joined with `.`.
    pub fn label_path(&self) -> String {
        self.label.join(".")
    }
}

/// Core function signature derived from a component function type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreSignature {
    pub parameters: Vec<SignatureSegment>,
    pub results: Vec<SignatureSegment>,
    /// Results are passed through memory behind a `ret` pointer.
    pub is_indirect_result: bool,
}

impl CoreSignature {
    pub fn parameter_types(&self) -> Vec<CoreType> {
        self.parameters.iter().map(|s| s.ty).collect()
    }

    pub fn result_types(&self) -> Vec<CoreType> {
        self.results.iter().map(|s| s.ty).collect()
    }

    /// Whether parameters were collapsed into a single `args` pointer.
    pub fn is_indirect_params(&self) -> bool {
        matches!(self.parameters.as_slice(), [only] if only.label == ["args"])
    }
}

/// Flatten a single type into labelled core slots.
pub fn flatten(ty: &WitType) -> Result<Vec<SignatureSegment>, CanonicalAbiError> {
    Ok(match ty {
        WitType::Bool
        | WitType::U8
        | WitType::U16
        | WitType::U32
        | WitType::S8
        | WitType::S16
        | WitType::S32
        | WitType::Char => vec![SignatureSegment::new(CoreType::I32)],
        WitType::U64 | WitType::S64 => vec![SignatureSegment::new(CoreType::I64)],
        WitType::Float32 => vec![SignatureSegment::new(CoreType::F32)],
        WitType::Float64 => vec![SignatureSegment::new(CoreType::F64)],
        WitType::String | WitType::List(_) => vec![
            SignatureSegment::labeled("ptr", CoreType::I32),
            SignatureSegment::labeled("len", CoreType::I32),
        ],
        WitType::Own(_) | WitType::Borrow(_) | WitType::Future(_) | WitType::Stream(_) => {
            vec![SignatureSegment::new(CoreType::I32)]
        }
        WitType::Tuple(types) => {
            let mut segments = Vec::new();
            for (i, ty) in types.iter().enumerate() {
                segments.extend(flatten(ty)?.into_iter().map(|s| s.prepending(i.to_string())));
            }
            segments
        }
        WitType::Record(record) => {
            let mut segments = Vec::new();
            for field in &record.fields {
                segments.extend(
                    flatten(&field.ty)?
                        .into_iter()
                        .map(|s| s.prepending(field.name.as_str())),
                );
            }
            segments
        }
        WitType::Flags(flags) => (0..number_of_i32(flags.flags.len()))
            .map(|i| SignatureSegment::labeled(i.to_string(), CoreType::I32))
            .collect(),
        WitType::Option(wrapped) => flatten_variant(&[None, Some(wrapped.as_ref())])?,
        WitType::Result { ok, error } => flatten_variant(&[ok.as_deref(), error.as_deref()])?,
        WitType::Variant(variant) => flatten_variant(&variant.case_types())?,
        WitType::Enum(e) => flatten_variant(&vec![None; e.cases.len()])?,
        WitType::Resource(_) => return Err(CanonicalAbiError::unsupported(ty, "flattening")),
    })
}

/// Flatten a type into its core types only, dropping labels.
pub fn flatten_types(ty: &WitType) -> Result<Vec<CoreType>, CanonicalAbiError> {
    Ok(flatten(ty)?.into_iter().map(|s| s.ty).collect())
}

fn flatten_variant(cases: &[Option<&WitType>]) -> Result<Vec<SignatureSegment>, CanonicalAbiError> {
    let discriminant = discriminant_type_of(cases.len()).as_wit_type();
    let mut segments: Vec<SignatureSegment> = flatten(&discriminant)?
        .into_iter()
        .map(|s| s.prepending("disc"))
        .collect();
    segments.extend(
        flatten_variant_payload(cases)?
            .into_iter()
            .enumerate()
            .map(|(i, ty)| SignatureSegment::labeled(i.to_string(), ty)),
    );
    Ok(segments)
}

/// Joined core types of the shared payload region of a variant-like type.
///
/// Slot `i` is the join of slot `i` of every case that has one, so the
/// result can carry the bit pattern of any single case's payload.
pub fn flatten_variant_payload(
    cases: &[Option<&WitType>],
) -> Result<Vec<CoreType>, CanonicalAbiError> {
    let mut results: Vec<CoreType> = Vec::new();
    for case in cases.iter().flatten() {
        for (i, segment) in flatten(case)?.into_iter().enumerate() {
            match results.get_mut(i) {
                Some(slot) => *slot = join(*slot, segment.ty),
                None => results.push(segment.ty),
            }
        }
    }
    Ok(results)
}

/// Smallest core type able to hold the bits of both `a` and `b`.
///
/// Two `f32`s join to `i32`, like every other pair of 32-bit types.
pub fn join(a: CoreType, b: CoreType) -> CoreType {
    use CoreType::*;

    match (a, b) {
        (I32 | F32, I32 | F32) => I32,
        (I64 | F64, _) | (_, I64 | F64) => I64,
    }
}

/// Flatten a labelled parameter list and result list into a core signature.
pub fn flatten_params_results<'a>(
    parameters: impl IntoIterator<Item = (&'a str, &'a WitType)>,
    results: impl IntoIterator<Item = (&'a str, &'a WitType)>,
    direction: CallDirection,
) -> Result<CoreSignature, CanonicalAbiError> {
    let mut flat_params = Vec::new();
    for (label, ty) in parameters {
        flat_params.extend(flatten(ty)?.into_iter().map(|s| s.prepending(label)));
    }
    if flat_params.len() > MAX_FLAT_PARAMS {
        flat_params = vec![SignatureSegment::labeled("args", CoreType::I32)];
    }

    let mut flat_results = Vec::new();
    for (label, ty) in results {
        flat_results.extend(flatten(ty)?.into_iter().map(|s| s.prepending(label)));
    }

    // The caller allocates the return area and passes its address, the
    // callee returns the address it wrote to.
    let mut is_indirect_result = false;
    if flat_results.len() > MAX_FLAT_RESULTS {
        is_indirect_result = true;
        let ret = SignatureSegment::labeled("ret", CoreType::I32);
        match direction {
            CallDirection::Lower => {
                flat_params.push(ret);
                flat_results.clear();
            }
            CallDirection::Lift => flat_results = vec![ret],
        }
    }

    Ok(CoreSignature {
        parameters: flat_params,
        results: flat_results,
        is_indirect_result,
    })
}

/// Results of a function declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionResults<T> {
    None,
    /// A single unnamed result, labelled `ret` when flattened.
    Anon(T),
    Named(Vec<(String, T)>),
}

/// A function declaration whose types are not resolved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl<T> {
    pub name: String,
    pub params: Vec<(String, T)>,
    pub results: FunctionResults<T>,
}

/// Flatten a function declaration for the lifting side of a call, resolving
/// each parameter and result type with `resolve_type`.
pub fn flatten_signature<T, E>(
    function: &FunctionDecl<T>,
    mut resolve_type: impl FnMut(&T) -> Result<WitType, E>,
) -> Result<CoreSignature, E>
where
    E: From<CanonicalAbiError>,
{
    let params = function
        .params
        .iter()
        .map(|(name, ty)| Ok((name.clone(), resolve_type(ty)?)))
        .collect::<Result<Vec<_>, E>>()?;
    let results = match &function.results {
        FunctionResults::None => Vec::new(),
        FunctionResults::Anon(ty) => vec![("ret".to_string(), resolve_type(ty)?)],
        FunctionResults::Named(named) => named
            .iter()
            .map(|(name, ty)| Ok((name.clone(), resolve_type(ty)?)))
            .collect::<Result<Vec<_>, E>>()?,
    };

    Ok(flatten_params_results(
        params.iter().map(|(name, ty)| (name.as_str(), ty)),
        results.iter().map(|(name, ty)| (name.as_str(), ty)),
        CallDirection::Lift,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{WitCase, WitEnum, WitField, WitFlags, WitRecord, WitVariant};

    fn labels(segments: &[SignatureSegment]) -> Vec<String> {
        segments.iter().map(SignatureSegment::label_path).collect()
    }

    #[test]
    fn test_join() {
        use CoreType::*;
        assert_eq!(join(I32, F32), I32);
        assert_eq!(join(F32, I32), I32);
        assert_eq!(join(F32, F32), I32);
        assert_eq!(join(I32, I32), I32);
        assert_eq!(join(I32, I64), I64);
        assert_eq!(join(F64, F32), I64);
        assert_eq!(join(F64, F64), I64);
    }

    #[test]
    fn test_record_labels() -> Result<(), CanonicalAbiError> {
        let ty = WitType::Record(WitRecord::new(
            "person",
            vec![
                WitField::new("name", WitType::String),
                WitField::new("age", WitType::U8),
            ],
        ));
        let segments = flatten(&ty)?;
        assert_eq!(labels(&segments), vec!["name.ptr", "name.len", "age"]);
        Ok(())
    }

    #[test]
    fn test_tuple_labels() -> Result<(), CanonicalAbiError> {
        let ty = WitType::Tuple(vec![WitType::U64, WitType::Float32]);
        let segments = flatten(&ty)?;
        assert_eq!(labels(&segments), vec!["0", "1"]);
        assert_eq!(flatten_types(&ty)?, vec![CoreType::I64, CoreType::F32]);
        Ok(())
    }

    #[test]
    fn test_variant_payload_join() -> Result<(), CanonicalAbiError> {
        let variant = WitVariant::new(
            "v",
            vec![
                WitCase::new("a", Some(WitType::Float32)),
                WitCase::new("b", Some(WitType::Tuple(vec![WitType::U32, WitType::U32]))),
                WitCase::new("c", None),
                WitCase::new("d", Some(WitType::Float64)),
            ],
        );
        let payload = flatten_variant_payload(&variant.case_types())?;
        assert_eq!(payload, vec![CoreType::I64, CoreType::I32]);

        let segments = flatten(&WitType::Variant(variant))?;
        assert_eq!(labels(&segments), vec!["disc", "0", "1"]);
        Ok(())
    }

    #[test]
    fn test_float_only_payload_joins_to_i32() -> Result<(), CanonicalAbiError> {
        let ty = WitType::result(Some(WitType::Float32), Some(WitType::Float32));
        assert_eq!(flatten_types(&ty)?, vec![CoreType::I32, CoreType::I32]);
        Ok(())
    }

    #[test]
    fn test_enum_and_flags() -> Result<(), CanonicalAbiError> {
        let e = WitType::Enum(WitEnum::new("e", ["a", "b"]));
        assert_eq!(flatten_types(&e)?, vec![CoreType::I32]);

        let none = WitType::Flags(WitFlags::new("none", Vec::<String>::new()));
        assert!(flatten(&none)?.is_empty());

        let names: Vec<String> = (0..33).map(|i| format!("f{i}")).collect();
        let many = WitType::Flags(WitFlags::new("many", names));
        assert_eq!(flatten_types(&many)?, vec![CoreType::I32, CoreType::I32]);
        Ok(())
    }

    #[test]
    fn test_indirect_result_lower_direction() -> Result<(), CanonicalAbiError> {
        let sig = flatten_params_results(
            [("x", &WitType::U32)],
            [("ret", &WitType::String)],
            CallDirection::Lower,
        )?;
        assert!(sig.is_indirect_result);
        assert!(sig.results.is_empty());
        assert_eq!(labels(&sig.parameters), vec!["x", "ret"]);
        Ok(())
    }

    #[test]
    fn test_single_result_is_direct() -> Result<(), CanonicalAbiError> {
        let sig = flatten_params_results(
            std::iter::empty(),
            [("ret", &WitType::U64)],
            CallDirection::Lift,
        )?;
        assert!(!sig.is_indirect_result);
        assert_eq!(sig.result_types(), vec![CoreType::I64]);
        Ok(())
    }

    #[test]
    fn test_flatten_signature_with_resolver() -> Result<(), CanonicalAbiError> {
        let function = FunctionDecl {
            name: "get".to_string(),
            params: vec![("key".to_string(), "string"), ("count".to_string(), "u32")],
            results: FunctionResults::Anon("string"),
        };
        let sig = flatten_signature(&function, |name: &&str| match *name {
            "string" => Ok(WitType::String),
            "u32" => Ok(WitType::U32),
            other => Err(CanonicalAbiError::UnknownTypeId(other.to_string())),
        })?;
        assert_eq!(labels(&sig.parameters), vec!["key.ptr", "key.len", "count"]);
        assert_eq!(labels(&sig.results), vec!["ret"]);
        assert!(sig.is_indirect_result);
        Ok(())
    }

    #[test]
    fn test_unsupported_resource() {
        let ty = WitType::Resource("r".to_string());
        assert!(flatten(&ty).is_err());
    }
}
