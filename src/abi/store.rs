//! Storing: component-level values written into linear memory.

use super::layout::{discriminant_type_of, field_offsets, payload_offset};
use super::lower::CanonicalLowering;
use super::{CanonicalAbiError, CanonicalHost, GuestPointer, unsupported};
use crate::logging::trace;
use crate::types::{DiscriminantType, WitFlags, WitType, WitVariant};

/// Host writes of little-endian integers and floats into linear memory.
///
/// Scalar methods receive core operands as produced by
/// [`CanonicalLowering`].
pub trait CanonicalStoring: CanonicalHost {
    fn store_u8(
        &mut self,
        pointer: Self::Pointer,
        value: Self::Operand,
    ) -> Result<(), Self::Error>;
    fn store_u16(
        &mut self,
        pointer: Self::Pointer,
        value: Self::Operand,
    ) -> Result<(), Self::Error>;
    fn store_u32(
        &mut self,
        pointer: Self::Pointer,
        value: Self::Operand,
    ) -> Result<(), Self::Error>;
    fn store_u64(
        &mut self,
        pointer: Self::Pointer,
        value: Self::Operand,
    ) -> Result<(), Self::Error>;
    fn store_s8(
        &mut self,
        pointer: Self::Pointer,
        value: Self::Operand,
    ) -> Result<(), Self::Error>;
    fn store_s16(
        &mut self,
        pointer: Self::Pointer,
        value: Self::Operand,
    ) -> Result<(), Self::Error>;
    fn store_s32(
        &mut self,
        pointer: Self::Pointer,
        value: Self::Operand,
    ) -> Result<(), Self::Error>;
    fn store_s64(
        &mut self,
        pointer: Self::Pointer,
        value: Self::Operand,
    ) -> Result<(), Self::Error>;
    fn store_f32(
        &mut self,
        pointer: Self::Pointer,
        value: Self::Operand,
    ) -> Result<(), Self::Error>;
    fn store_f64(
        &mut self,
        pointer: Self::Pointer,
        value: Self::Operand,
    ) -> Result<(), Self::Error>;

    /// Write a flags value in its raw in-memory representation.
    fn store_flags(
        &mut self,
        pointer: Self::Pointer,
        value: Self::Operand,
        ty: &WitFlags,
    ) -> Result<(), Self::Error>;

    /// Store an option through the two callbacks.
    ///
    /// `store_discriminant` writes the case index; `store_payload` writes the
    /// `some` payload and must not be called for `none`.
    fn store_option<D, P>(
        &mut self,
        value: Self::Operand,
        wrapped: &WitType,
        store_discriminant: D,
        store_payload: P,
    ) -> Result<(), Self::Error>
    where
        D: FnMut(&mut Self, Self::Operand) -> Result<(), Self::Error>,
        P: FnMut(&mut Self, Self::Operand) -> Result<(), Self::Error>;

    /// Store a result. `store_payload` takes whether the error case is
    /// active and the payload given for it, if any. It is always called
    /// once, after the discriminant.
    fn store_result<D, P>(
        &mut self,
        value: Self::Operand,
        ok: Option<&WitType>,
        error: Option<&WitType>,
        store_discriminant: D,
        store_payload: P,
    ) -> Result<(), Self::Error>
    where
        D: FnMut(&mut Self, Self::Operand) -> Result<(), Self::Error>,
        P: FnMut(&mut Self, bool, Option<Self::Operand>) -> Result<(), Self::Error>;

    /// Store a variant. `store_payload` takes the active case index and the
    /// payload given for it, if any. It is always called once, after the
    /// discriminant.
    fn store_variant<D, P>(
        &mut self,
        value: Self::Operand,
        ty: &WitVariant,
        store_discriminant: D,
        store_payload: P,
    ) -> Result<(), Self::Error>
    where
        D: FnMut(&mut Self, Self::Operand) -> Result<(), Self::Error>,
        P: FnMut(&mut Self, usize, Option<Self::Operand>) -> Result<(), Self::Error>;
}

/// Store `value` of type `ty` at `pointer`.
///
/// `pointer` must be aligned to [`alignment`](super::alignment()) of `ty` and
/// have [`size`](super::size()) bytes available.
pub fn store<C>(
    ty: &WitType,
    value: C::Operand,
    pointer: C::Pointer,
    cx: &mut C,
) -> Result<(), C::Error>
where
    C: CanonicalStoring + CanonicalLowering,
{
    trace!(ty = ty.kind_name(), "store");
    match ty {
        WitType::Bool => {
            let value = cx.lower_bool(value)?;
            cx.store_u8(pointer, value)
        }
        WitType::U8 => {
            let value = cx.lower_u8(value)?;
            cx.store_u8(pointer, value)
        }
        WitType::U16 => {
            let value = cx.lower_u16(value)?;
            cx.store_u16(pointer, value)
        }
        WitType::U32 => {
            let value = cx.lower_u32(value)?;
            cx.store_u32(pointer, value)
        }
        WitType::U64 => {
            let value = cx.lower_u64(value)?;
            cx.store_u64(pointer, value)
        }
        WitType::S8 => {
            let value = cx.lower_s8(value)?;
            cx.store_s8(pointer, value)
        }
        WitType::S16 => {
            let value = cx.lower_s16(value)?;
            cx.store_s16(pointer, value)
        }
        WitType::S32 => {
            let value = cx.lower_s32(value)?;
            cx.store_s32(pointer, value)
        }
        WitType::S64 => {
            let value = cx.lower_s64(value)?;
            cx.store_s64(pointer, value)
        }
        WitType::Float32 => {
            let value = cx.lower_float32(value)?;
            cx.store_f32(pointer, value)
        }
        WitType::Float64 => {
            let value = cx.lower_float64(value)?;
            cx.store_f64(pointer, value)
        }
        WitType::Char => {
            let value = cx.lower_char(value)?;
            cx.store_u32(pointer, value)
        }
        WitType::Enum(e) => {
            let discriminant = cx.lower_enum(value, e)?;
            store_discriminant(pointer, discriminant, e.cases.len(), cx)
        }
        WitType::Flags(flags) => cx.store_flags(pointer, value, flags),
        WitType::String => {
            let (buffer, length) = cx.lower_string(value)?;
            store_list_header(pointer, buffer, length, cx)
        }
        WitType::List(element) => {
            let (buffer, length) =
                cx.lower_list(value, element, |cx, ptr, item| store(element, item, ptr, cx))?;
            store_list_header(pointer, buffer, length, cx)
        }
        WitType::Record(record) => {
            let fields = cx.lower_record(value, record)?;
            store_fields(record.fields.iter().map(|f| &f.ty), fields, pointer, ty, cx)
        }
        WitType::Tuple(types) => {
            let elements = cx.lower_tuple(value, types)?;
            store_fields(types.iter(), elements, pointer, ty, cx)
        }
        WitType::Option(wrapped) => {
            let payload_ptr = pointer.advanced_by(payload_offset(&[None, Some(wrapped.as_ref())])?);
            cx.store_option(
                value,
                wrapped,
                |cx, discriminant| store_discriminant(pointer, discriminant, 2, cx),
                |cx, payload| store(wrapped, payload, payload_ptr, cx),
            )
        }
        WitType::Result { ok, error } => {
            let (ok, error) = (ok.as_deref(), error.as_deref());
            let payload_ptr = pointer.advanced_by(payload_offset(&[ok, error])?);
            cx.store_result(
                value,
                ok,
                error,
                |cx, discriminant| store_discriminant(pointer, discriminant, 2, cx),
                |cx, is_error, payload| {
                    let case_ty = if is_error { error } else { ok };
                    store_case_payload(case_ty, usize::from(is_error), payload, payload_ptr, cx)
                },
            )
        }
        WitType::Variant(variant) => {
            let cases = variant.case_types();
            let payload_ptr = pointer.advanced_by(payload_offset(&cases)?);
            cx.store_variant(
                value,
                variant,
                |cx, discriminant| store_discriminant(pointer, discriminant, cases.len(), cx),
                |cx, index, payload| {
                    let case_ty = cases.get(index).ok_or(CanonicalAbiError::InvalidCaseIndex {
                        index,
                        num_cases: cases.len(),
                    })?;
                    store_case_payload(*case_ty, index, payload, payload_ptr, cx)
                },
            )
        }
        WitType::Own(_)
        | WitType::Borrow(_)
        | WitType::Future(_)
        | WitType::Stream(_)
        | WitType::Resource(_) => unsupported(ty, "storing"),
    }
}

fn store_fields<'a, C>(
    types: impl Iterator<Item = &'a WitType>,
    values: Vec<C::Operand>,
    pointer: C::Pointer,
    ty: &WitType,
    cx: &mut C,
) -> Result<(), C::Error>
where
    C: CanonicalStoring + CanonicalLowering,
{
    let offsets = field_offsets(types)?;
    if offsets.len() != values.len() {
        return Err(CanonicalAbiError::mismatch(
            format!("{} fields for {ty}", offsets.len()),
            format!("{} values", values.len()),
        )
        .into());
    }
    for ((field_ty, offset), field_value) in offsets.into_iter().zip(values) {
        store(field_ty, field_value, pointer.advanced_by(offset), cx)?;
    }
    Ok(())
}

/// Store the payload of the active case, which must be present exactly when
/// the case has a payload type.
fn store_case_payload<C>(
    case_ty: Option<&WitType>,
    index: usize,
    payload: Option<C::Operand>,
    pointer: C::Pointer,
    cx: &mut C,
) -> Result<(), C::Error>
where
    C: CanonicalStoring + CanonicalLowering,
{
    match (case_ty, payload) {
        (Some(case_ty), Some(payload)) => store(case_ty, payload, pointer, cx),
        (Some(_), None) => Err(CanonicalAbiError::MissingPayload { case: index }.into()),
        (None, Some(_)) => Err(CanonicalAbiError::UnexpectedPayload { case: index }.into()),
        (None, None) => Ok(()),
    }
}

/// Write the `(pointer, length)` pair of a string or list.
fn store_list_header<C>(
    pointer: C::Pointer,
    buffer: C::Operand,
    length: C::Operand,
    cx: &mut C,
) -> Result<(), C::Error>
where
    C: CanonicalStoring,
{
    cx.store_u32(pointer, buffer)?;
    cx.store_u32(pointer.advanced_by(4), length)
}

/// Write a discriminant with the width chosen for `number_of_cases`.
fn store_discriminant<C>(
    pointer: C::Pointer,
    discriminant: C::Operand,
    number_of_cases: usize,
    cx: &mut C,
) -> Result<(), C::Error>
where
    C: CanonicalStoring,
{
    match discriminant_type_of(number_of_cases) {
        DiscriminantType::U8 => cx.store_u8(pointer, discriminant),
        DiscriminantType::U16 => cx.store_u16(pointer, discriminant),
        DiscriminantType::U32 => cx.store_u32(pointer, discriminant),
    }
}
