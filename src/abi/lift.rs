//! Flat lifting: core operands to component-level values.
//!
//! See <https://github.com/WebAssembly/component-model/blob/main/design/mvp/CanonicalABI.md#flat-lifting>.

use super::flatten::flatten_variant_payload;
use super::layout::number_of_i32;
use super::load::{CanonicalLoading, load};
use super::{CanonicalAbiError, CanonicalHost, unsupported};
use crate::logging::trace;
use crate::types::{WitEnum, WitFlags, WitRecord, WitType, WitVariant};

/// Host conversions from core operands to component-level values.
///
/// Scalar methods receive the operand of the slot the type flattens to. When
/// the scalar is a variant payload the slot may be the joined, wider type
/// (an `i32` carrying `f32` bits, an `i64` carrying an `i32`), so
/// implementations narrow or reinterpret as needed.
pub trait CanonicalLifting: CanonicalHost {
    fn lift_bool(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lift_u8(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lift_u16(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lift_u32(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lift_u64(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lift_s8(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lift_s16(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lift_s32(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lift_s64(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lift_float32(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lift_float64(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lift_char(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;

    /// Lift a string from a pointer and a byte length.
    fn lift_string(
        &mut self,
        pointer: Self::Operand,
        length: Self::Operand,
    ) -> Result<Self::Operand, Self::Error>;

    /// Lift a list from a pointer and an element count.
    ///
    /// `load_element` loads one element stored at the given address.
    fn lift_list<F>(
        &mut self,
        pointer: Self::Operand,
        length: Self::Operand,
        element: &WitType,
        load_element: F,
    ) -> Result<Self::Operand, Self::Error>
    where
        F: FnMut(&mut Self, Self::Pointer) -> Result<Self::Operand, Self::Error>;

    fn lift_record(
        &mut self,
        fields: Vec<Self::Operand>,
        ty: &WitRecord,
    ) -> Result<Self::Operand, Self::Error>;

    fn lift_tuple(
        &mut self,
        elements: Vec<Self::Operand>,
        types: &[WitType],
    ) -> Result<Self::Operand, Self::Error>;

    fn lift_enum(
        &mut self,
        discriminant: Self::Operand,
        ty: &WitEnum,
    ) -> Result<Self::Operand, Self::Error>;

    /// Lift flags from their raw integer words, lowest flags first.
    fn lift_flags(
        &mut self,
        words: Vec<Self::Operand>,
        ty: &WitFlags,
    ) -> Result<Self::Operand, Self::Error>;

    /// Lift an option. `lift_payload` lifts the `some` payload.
    fn lift_option<F>(
        &mut self,
        discriminant: Self::Operand,
        wrapped: &WitType,
        lift_payload: F,
    ) -> Result<Self::Operand, Self::Error>
    where
        F: FnMut(&mut Self) -> Result<Self::Operand, Self::Error>;

    /// Lift a result. `lift_payload` takes whether the error case is active
    /// and returns `None` when that case has no payload.
    fn lift_result<F>(
        &mut self,
        discriminant: Self::Operand,
        ok: Option<&WitType>,
        error: Option<&WitType>,
        lift_payload: F,
    ) -> Result<Self::Operand, Self::Error>
    where
        F: FnMut(&mut Self, bool) -> Result<Option<Self::Operand>, Self::Error>;

    /// Lift a variant. `lift_payload` takes the active case index and returns
    /// `None` when that case has no payload.
    fn lift_variant<F>(
        &mut self,
        discriminant: Self::Operand,
        ty: &WitVariant,
        lift_payload: F,
    ) -> Result<Self::Operand, Self::Error>
    where
        F: FnMut(&mut Self, usize) -> Result<Option<Self::Operand>, Self::Error>;
}

/// Lift a value of `ty` from a stream of flat core operands.
///
/// Exactly as many operands as [`flatten`](super::flatten()) yields for `ty`
/// are consumed. Lists and strings are read from memory through
/// [`load`], at the address their `ptr` operand names.
pub fn lift<C, I>(ty: &WitType, core_values: &mut I, cx: &mut C) -> Result<C::Operand, C::Error>
where
    C: CanonicalLifting + CanonicalLoading,
    I: Iterator<Item = C::Operand>,
{
    trace!(ty = ty.kind_name(), "lift");
    match ty {
        WitType::Bool => cx.lift_bool(next_operand(core_values, ty)?),
        WitType::U8 => cx.lift_u8(next_operand(core_values, ty)?),
        WitType::U16 => cx.lift_u16(next_operand(core_values, ty)?),
        WitType::U32 => cx.lift_u32(next_operand(core_values, ty)?),
        WitType::U64 => cx.lift_u64(next_operand(core_values, ty)?),
        WitType::S8 => cx.lift_s8(next_operand(core_values, ty)?),
        WitType::S16 => cx.lift_s16(next_operand(core_values, ty)?),
        WitType::S32 => cx.lift_s32(next_operand(core_values, ty)?),
        WitType::S64 => cx.lift_s64(next_operand(core_values, ty)?),
        WitType::Float32 => cx.lift_float32(next_operand(core_values, ty)?),
        WitType::Float64 => cx.lift_float64(next_operand(core_values, ty)?),
        WitType::Char => cx.lift_char(next_operand(core_values, ty)?),
        WitType::String => {
            let pointer = next_operand(core_values, ty)?;
            let length = next_operand(core_values, ty)?;
            cx.lift_string(pointer, length)
        }
        WitType::List(element) => {
            let pointer = next_operand(core_values, ty)?;
            let length = next_operand(core_values, ty)?;
            cx.lift_list(pointer, length, element, |cx, ptr| load(element, ptr, cx))
        }
        WitType::Record(record) => {
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                fields.push(lift(&field.ty, core_values, cx)?);
            }
            cx.lift_record(fields, record)
        }
        WitType::Tuple(types) => {
            let mut elements = Vec::with_capacity(types.len());
            for ty in types {
                elements.push(lift(ty, core_values, cx)?);
            }
            cx.lift_tuple(elements, types)
        }
        WitType::Enum(e) => cx.lift_enum(next_operand(core_values, ty)?, e),
        WitType::Flags(flags) => {
            let mut words = Vec::new();
            for _ in 0..number_of_i32(flags.flags.len()) {
                words.push(next_operand(core_values, ty)?);
            }
            cx.lift_flags(words, flags)
        }
        WitType::Option(wrapped) => {
            let discriminant = next_operand(core_values, ty)?;
            let payload = take_payload(&[None, Some(wrapped.as_ref())], core_values, ty)?;
            cx.lift_option(discriminant, wrapped, |cx| {
                lift(wrapped, &mut payload.iter().cloned(), cx)
            })
        }
        WitType::Result { ok, error } => {
            let (ok, error) = (ok.as_deref(), error.as_deref());
            let discriminant = next_operand(core_values, ty)?;
            let payload = take_payload(&[ok, error], core_values, ty)?;
            cx.lift_result(discriminant, ok, error, |cx, is_error| {
                let case_ty = if is_error { error } else { ok };
                match case_ty {
                    Some(case_ty) => lift(case_ty, &mut payload.iter().cloned(), cx).map(Some),
                    None => Ok(None),
                }
            })
        }
        WitType::Variant(variant) => {
            let cases = variant.case_types();
            let discriminant = next_operand(core_values, ty)?;
            let payload = take_payload(&cases, core_values, ty)?;
            cx.lift_variant(discriminant, variant, |cx, index| {
                let case_ty = cases.get(index).ok_or(CanonicalAbiError::InvalidCaseIndex {
                    index,
                    num_cases: cases.len(),
                })?;
                match case_ty {
                    Some(case_ty) => lift(case_ty, &mut payload.iter().cloned(), cx).map(Some),
                    None => Ok(None),
                }
            })
        }
        WitType::Own(_)
        | WitType::Borrow(_)
        | WitType::Future(_)
        | WitType::Stream(_)
        | WitType::Resource(_) => unsupported(ty, "lifting"),
    }
}

fn next_operand<T>(
    core_values: &mut impl Iterator<Item = T>,
    ty: &WitType,
) -> Result<T, CanonicalAbiError> {
    core_values
        .next()
        .ok_or_else(|| CanonicalAbiError::OperandStreamExhausted { ty: ty.to_string() })
}

/// Collect the joined payload slots of a variant-like type up front.
///
/// Every case reads its payload from the start of the same slots, so they
/// are consumed from the stream once and replayed for the active case.
fn take_payload<T>(
    cases: &[Option<&WitType>],
    core_values: &mut impl Iterator<Item = T>,
    ty: &WitType,
) -> Result<Vec<T>, CanonicalAbiError> {
    let count = flatten_variant_payload(cases)?.len();
    (0..count).map(|_| next_operand(core_values, ty)).collect()
}
