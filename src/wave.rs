//! Conversion between WAVE text values and host [`Val`]s.
//!
//! WAVE values carry their own type, so [`val_to_wave`] is driven by the
//! WAVE type while [`wave_to_val`] is driven by the [`WitType`] the value is
//! going to be lowered as.

use std::borrow::Cow;

use thiserror::Error;
use wasm_wave::value::{Type as WaveType, Value};
use wasm_wave::wasm::{WasmType, WasmTypeKind, WasmValue};

use crate::host::Val;
use crate::types::WitType;

/// Errors that can occur during Val <-> Value conversion.
#[derive(Error, Debug)]
pub enum WaveConvertError {
    /// Type mismatch during conversion.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Failed to construct a wasm_wave value.
    #[error("Failed to construct value: {0}")]
    ConstructionFailed(String),
}

impl From<WaveConvertError> for crate::Error {
    fn from(err: WaveConvertError) -> Self {
        crate::Error::wave_parse(err.to_string())
    }
}

fn expect_kind(wave: &Value, expected: WasmTypeKind) -> Result<(), WaveConvertError> {
    let kind = wave.kind();
    if kind == expected {
        Ok(())
    } else {
        Err(WaveConvertError::TypeMismatch(format!(
            "expected {expected:?}, got {kind:?}"
        )))
    }
}

fn construction(what: &str) -> impl Fn(wasm_wave::wasm::WasmValueError) -> WaveConvertError + '_ {
    move |e| WaveConvertError::ConstructionFailed(format!("failed to construct {what}: {e}"))
}

/// Convert a WAVE value to a [`Val`] of the given type.
pub fn wave_to_val(wave: &Value, ty: &WitType) -> Result<Val, WaveConvertError> {
    match ty {
        WitType::Bool => expect_kind(wave, WasmTypeKind::Bool).map(|_| Val::Bool(wave.unwrap_bool())),
        WitType::U8 => expect_kind(wave, WasmTypeKind::U8).map(|_| Val::U8(wave.unwrap_u8())),
        WitType::U16 => expect_kind(wave, WasmTypeKind::U16).map(|_| Val::U16(wave.unwrap_u16())),
        WitType::U32 => expect_kind(wave, WasmTypeKind::U32).map(|_| Val::U32(wave.unwrap_u32())),
        WitType::U64 => expect_kind(wave, WasmTypeKind::U64).map(|_| Val::U64(wave.unwrap_u64())),
        WitType::S8 => expect_kind(wave, WasmTypeKind::S8).map(|_| Val::S8(wave.unwrap_s8())),
        WitType::S16 => expect_kind(wave, WasmTypeKind::S16).map(|_| Val::S16(wave.unwrap_s16())),
        WitType::S32 => expect_kind(wave, WasmTypeKind::S32).map(|_| Val::S32(wave.unwrap_s32())),
        WitType::S64 => expect_kind(wave, WasmTypeKind::S64).map(|_| Val::S64(wave.unwrap_s64())),
        WitType::Float32 => {
            expect_kind(wave, WasmTypeKind::F32).map(|_| Val::Float32(wave.unwrap_f32()))
        }
        WitType::Float64 => {
            expect_kind(wave, WasmTypeKind::F64).map(|_| Val::Float64(wave.unwrap_f64()))
        }
        WitType::Char => expect_kind(wave, WasmTypeKind::Char).map(|_| Val::Char(wave.unwrap_char())),
        WitType::String => expect_kind(wave, WasmTypeKind::String)
            .map(|_| Val::String(wave.unwrap_string().to_string())),

        WitType::List(element) => {
            expect_kind(wave, WasmTypeKind::List)?;
            let elements: Result<Vec<Val>, _> = wave
                .unwrap_list()
                .map(|elem| wave_to_val(&elem, element))
                .collect();
            Ok(Val::List(elements?))
        }

        WitType::Record(record) => {
            expect_kind(wave, WasmTypeKind::Record)?;
            let wave_fields: Vec<_> = wave.unwrap_record().collect();
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                let (_, wave_field) = wave_fields
                    .iter()
                    .find(|(name, _)| name.as_ref() == field.name)
                    .ok_or_else(|| {
                        WaveConvertError::TypeMismatch(format!("field '{}' not found", field.name))
                    })?;
                fields.push((field.name.clone(), wave_to_val(wave_field, &field.ty)?));
            }
            Ok(Val::Record(fields))
        }

        WitType::Tuple(types) => {
            expect_kind(wave, WasmTypeKind::Tuple)?;
            let elements: Vec<_> = wave.unwrap_tuple().collect();
            if elements.len() != types.len() {
                return Err(WaveConvertError::TypeMismatch(format!(
                    "expected tuple of {}, got {}",
                    types.len(),
                    elements.len()
                )));
            }
            let elements: Result<Vec<Val>, _> = elements
                .iter()
                .zip(types)
                .map(|(elem, ty)| wave_to_val(elem, ty))
                .collect();
            Ok(Val::Tuple(elements?))
        }

        WitType::Enum(_) => {
            expect_kind(wave, WasmTypeKind::Enum)?;
            Ok(Val::Enum(wave.unwrap_enum().to_string()))
        }

        WitType::Flags(_) => {
            expect_kind(wave, WasmTypeKind::Flags)?;
            Ok(Val::Flags(wave.unwrap_flags().map(|s| s.to_string()).collect()))
        }

        WitType::Option(wrapped) => {
            expect_kind(wave, WasmTypeKind::Option)?;
            match wave.unwrap_option() {
                Some(inner) => Ok(Val::Option(Some(Box::new(wave_to_val(&inner, wrapped)?)))),
                None => Ok(Val::Option(None)),
            }
        }

        WitType::Result { ok, error } => {
            expect_kind(wave, WasmTypeKind::Result)?;
            match wave.unwrap_result() {
                Ok(payload) => Ok(Val::Result(Ok(payload_to_val(payload, ok.as_deref(), "ok")?))),
                Err(payload) => {
                    Ok(Val::Result(Err(payload_to_val(payload, error.as_deref(), "err")?)))
                }
            }
        }

        WitType::Variant(variant) => {
            expect_kind(wave, WasmTypeKind::Variant)?;
            let (case_name, payload) = wave.unwrap_variant();
            let case = variant
                .cases
                .iter()
                .find(|c| c.name == case_name.as_ref())
                .ok_or_else(|| {
                    WaveConvertError::TypeMismatch(format!("variant case '{case_name}' not found"))
                })?;
            let payload = payload_to_val(payload, case.ty.as_ref(), &case.name)?;
            Ok(Val::Variant(case.name.clone(), payload))
        }

        WitType::Own(_)
        | WitType::Borrow(_)
        | WitType::Future(_)
        | WitType::Stream(_)
        | WitType::Resource(_) => Err(WaveConvertError::TypeMismatch(format!(
            "{} values have no WAVE form",
            ty.kind_name()
        ))),
    }
}

fn payload_to_val(
    payload: Option<Cow<'_, Value>>,
    ty: Option<&WitType>,
    case: &str,
) -> Result<Option<Box<Val>>, WaveConvertError> {
    match (payload, ty) {
        (Some(payload), Some(ty)) => Ok(Some(Box::new(wave_to_val(&payload, ty)?))),
        (None, None) => Ok(None),
        _ => Err(WaveConvertError::TypeMismatch(format!("{case} payload mismatch"))),
    }
}

/// Convert a [`Val`] back to a WAVE value of the given WAVE type.
pub fn val_to_wave(val: &Val, wave_type: &WaveType) -> Result<Value, WaveConvertError> {
    match val {
        Val::Bool(b) => Ok(Value::make_bool(*b)),
        Val::U8(v) => Ok(Value::make_u8(*v)),
        Val::S8(v) => Ok(Value::make_s8(*v)),
        Val::U16(v) => Ok(Value::make_u16(*v)),
        Val::S16(v) => Ok(Value::make_s16(*v)),
        Val::U32(v) => Ok(Value::make_u32(*v)),
        Val::S32(v) => Ok(Value::make_s32(*v)),
        Val::U64(v) => Ok(Value::make_u64(*v)),
        Val::S64(v) => Ok(Value::make_s64(*v)),
        Val::Float32(v) => Ok(Value::make_f32(*v)),
        Val::Float64(v) => Ok(Value::make_f64(*v)),
        Val::Char(c) => Ok(Value::make_char(*c)),
        Val::String(s) => Ok(Value::make_string(Cow::Owned(s.clone()))),

        Val::Record(fields) => {
            let field_types: Vec<_> = wave_type.record_fields().collect();
            let wave_fields = fields
                .iter()
                .map(|(name, val)| {
                    let (_, field_type) = field_types
                        .iter()
                        .find(|(n, _)| *n == name.as_str())
                        .ok_or_else(|| {
                            WaveConvertError::TypeMismatch(format!(
                                "field '{name}' not found in wave type"
                            ))
                        })?;
                    Ok((name.as_str(), val_to_wave(val, field_type)?))
                })
                .collect::<Result<Vec<_>, WaveConvertError>>()?;
            Value::make_record(wave_type, wave_fields).map_err(construction("record"))
        }

        Val::List(elements) => {
            let element_type = wave_type
                .list_element_type()
                .ok_or_else(|| WaveConvertError::TypeMismatch("expected list type".to_string()))?;
            let wave_elements = elements
                .iter()
                .map(|e| val_to_wave(e, &element_type))
                .collect::<Result<Vec<_>, _>>()?;
            Value::make_list(wave_type, wave_elements).map_err(construction("list"))
        }

        Val::Tuple(elements) => {
            let types: Vec<_> = wave_type.tuple_element_types().collect();
            if types.len() != elements.len() {
                return Err(WaveConvertError::TypeMismatch("expected tuple type".to_string()));
            }
            let wave_elements = elements
                .iter()
                .zip(&types)
                .map(|(e, ty)| val_to_wave(e, ty))
                .collect::<Result<Vec<_>, _>>()?;
            Value::make_tuple(wave_type, wave_elements).map_err(construction("tuple"))
        }

        Val::Option(inner) => {
            let inner = match inner {
                Some(inner) => {
                    let some_type = wave_type.option_some_type().ok_or_else(|| {
                        WaveConvertError::TypeMismatch("expected option type".to_string())
                    })?;
                    Some(val_to_wave(inner, &some_type)?)
                }
                None => None,
            };
            Value::make_option(wave_type, inner).map_err(construction("option"))
        }

        Val::Result(result) => {
            let (ok_type, err_type) = wave_type.result_types().ok_or_else(|| {
                WaveConvertError::TypeMismatch("expected result type".to_string())
            })?;
            let result = match result {
                Ok(payload) => Ok(payload_to_wave(payload.as_deref(), ok_type.as_ref())?),
                Err(payload) => Err(payload_to_wave(payload.as_deref(), err_type.as_ref())?),
            };
            Value::make_result(wave_type, result).map_err(construction("result"))
        }

        Val::Enum(case_name) => Value::make_enum(wave_type, case_name).map_err(construction("enum")),

        Val::Variant(case_name, payload) => {
            let cases: Vec<_> = wave_type.variant_cases().collect();
            let (_, case_type) = cases
                .iter()
                .find(|(name, _)| *name == case_name.as_str())
                .ok_or_else(|| {
                    WaveConvertError::TypeMismatch(format!("variant case '{case_name}' not found"))
                })?;
            let payload = payload_to_wave(payload.as_deref(), case_type.as_ref())?;
            Value::make_variant(wave_type, case_name, payload).map_err(construction("variant"))
        }

        Val::Flags(names) => {
            Value::make_flags(wave_type, names.iter().map(String::as_str))
                .map_err(construction("flags"))
        }

        Val::I32(_) | Val::I64(_) | Val::F32(_) | Val::F64(_) => Err(
            WaveConvertError::TypeMismatch(format!("core {} has no WAVE form", val.kind_name())),
        ),
    }
}

fn payload_to_wave(
    payload: Option<&Val>,
    ty: Option<&WaveType>,
) -> Result<Option<Value>, WaveConvertError> {
    match (payload, ty) {
        (Some(payload), Some(ty)) => Ok(Some(val_to_wave(payload, ty)?)),
        (None, None) => Ok(None),
        _ => Err(WaveConvertError::TypeMismatch("payload mismatch".to_string())),
    }
}

/// Parse WAVE text into a [`Val`] of type `ty`.
pub fn parse_val(text: &str, wave_type: &WaveType, ty: &WitType) -> crate::Result<Val> {
    let value: Value =
        wasm_wave::from_str(wave_type, text).map_err(|e| crate::Error::wave_parse(e.to_string()))?;
    Ok(wave_to_val(&value, ty)?)
}

/// Render a [`Val`] as WAVE text.
pub fn format_val(val: &Val, wave_type: &WaveType) -> crate::Result<String> {
    let value = val_to_wave(val, wave_type)?;
    wasm_wave::to_string(&value).map_err(|e| crate::Error::wave_parse(e.to_string()))
}
