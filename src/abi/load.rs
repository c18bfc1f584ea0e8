//! Loading: component-level values read out of linear memory.

use super::layout::{discriminant_type_of, field_offsets, payload_offset, raw_type_of_flags};
use super::lift::CanonicalLifting;
use super::{CanonicalAbiError, CanonicalHost, GuestPointer, unsupported};
use crate::logging::trace;
use crate::types::{DiscriminantType, FlagsRepr, WitType};

/// Host reads of little-endian integers and floats from linear memory.
///
/// Each method returns the raw integer as a core-level operand. The core then
/// hands it to the matching [`CanonicalLifting`] method.
pub trait CanonicalLoading: CanonicalHost {
    fn load_u8(&self, pointer: Self::Pointer) -> Result<Self::Operand, Self::Error>;
    fn load_u16(&self, pointer: Self::Pointer) -> Result<Self::Operand, Self::Error>;
    fn load_u32(&self, pointer: Self::Pointer) -> Result<Self::Operand, Self::Error>;
    fn load_u64(&self, pointer: Self::Pointer) -> Result<Self::Operand, Self::Error>;
    fn load_s8(&self, pointer: Self::Pointer) -> Result<Self::Operand, Self::Error>;
    fn load_s16(&self, pointer: Self::Pointer) -> Result<Self::Operand, Self::Error>;
    fn load_s32(&self, pointer: Self::Pointer) -> Result<Self::Operand, Self::Error>;
    fn load_s64(&self, pointer: Self::Pointer) -> Result<Self::Operand, Self::Error>;
    fn load_f32(&self, pointer: Self::Pointer) -> Result<Self::Operand, Self::Error>;
    fn load_f64(&self, pointer: Self::Pointer) -> Result<Self::Operand, Self::Error>;
}

/// Load a value of `ty` stored at `pointer`.
///
/// `pointer` must be aligned to [`alignment`](super::alignment()) of `ty`;
/// the host is responsible for bounds checks.
pub fn load<C>(ty: &WitType, pointer: C::Pointer, cx: &mut C) -> Result<C::Operand, C::Error>
where
    C: CanonicalLoading + CanonicalLifting,
{
    trace!(ty = ty.kind_name(), "load");
    match ty {
        WitType::Bool => {
            let value = cx.load_u8(pointer)?;
            cx.lift_bool(value)
        }
        WitType::U8 => {
            let value = cx.load_u8(pointer)?;
            cx.lift_u8(value)
        }
        WitType::U16 => {
            let value = cx.load_u16(pointer)?;
            cx.lift_u16(value)
        }
        WitType::U32 => {
            let value = cx.load_u32(pointer)?;
            cx.lift_u32(value)
        }
        WitType::U64 => {
            let value = cx.load_u64(pointer)?;
            cx.lift_u64(value)
        }
        WitType::S8 => {
            let value = cx.load_s8(pointer)?;
            cx.lift_s8(value)
        }
        WitType::S16 => {
            let value = cx.load_s16(pointer)?;
            cx.lift_s16(value)
        }
        WitType::S32 => {
            let value = cx.load_s32(pointer)?;
            cx.lift_s32(value)
        }
        WitType::S64 => {
            let value = cx.load_s64(pointer)?;
            cx.lift_s64(value)
        }
        WitType::Float32 => {
            let value = cx.load_f32(pointer)?;
            cx.lift_float32(value)
        }
        WitType::Float64 => {
            let value = cx.load_f64(pointer)?;
            cx.lift_float64(value)
        }
        WitType::Char => {
            let value = cx.load_u32(pointer)?;
            cx.lift_char(value)
        }
        WitType::String => {
            let (buffer, length) = load_list_header(pointer, cx)?;
            cx.lift_string(buffer, length)
        }
        WitType::List(element) => {
            let (buffer, length) = load_list_header(pointer, cx)?;
            cx.lift_list(buffer, length, element, |cx, ptr| load(element, ptr, cx))
        }
        WitType::Record(record) => {
            let offsets = field_offsets(record.fields.iter().map(|f| &f.ty))?;
            let mut fields = Vec::with_capacity(offsets.len());
            for (field_ty, offset) in offsets {
                fields.push(load(field_ty, pointer.advanced_by(offset), cx)?);
            }
            cx.lift_record(fields, record)
        }
        WitType::Tuple(types) => {
            let mut elements = Vec::with_capacity(types.len());
            for (element_ty, offset) in field_offsets(types)? {
                elements.push(load(element_ty, pointer.advanced_by(offset), cx)?);
            }
            cx.lift_tuple(elements, types)
        }
        WitType::Enum(e) => {
            let discriminant = load_discriminant(pointer, e.cases.len(), cx)?;
            cx.lift_enum(discriminant, e)
        }
        WitType::Flags(flags) => {
            let words = match raw_type_of_flags(flags.flags.len()) {
                FlagsRepr::U8 => vec![cx.load_u8(pointer)?],
                FlagsRepr::U16 => vec![cx.load_u16(pointer)?],
                FlagsRepr::U32(count) => {
                    let mut words = Vec::with_capacity(count);
                    for i in 0..count {
                        words.push(cx.load_u32(pointer.advanced_by(i * 4))?);
                    }
                    words
                }
            };
            cx.lift_flags(words, flags)
        }
        WitType::Option(wrapped) => {
            let discriminant = load_discriminant(pointer, 2, cx)?;
            let payload_ptr = pointer.advanced_by(payload_offset(&[None, Some(wrapped.as_ref())])?);
            cx.lift_option(discriminant, wrapped, |cx| load(wrapped, payload_ptr, cx))
        }
        WitType::Result { ok, error } => {
            let (ok, error) = (ok.as_deref(), error.as_deref());
            let discriminant = load_discriminant(pointer, 2, cx)?;
            let payload_ptr = pointer.advanced_by(payload_offset(&[ok, error])?);
            cx.lift_result(discriminant, ok, error, |cx, is_error| {
                let case_ty = if is_error { error } else { ok };
                case_ty.map(|ty| load(ty, payload_ptr, cx)).transpose()
            })
        }
        WitType::Variant(variant) => {
            let cases = variant.case_types();
            let discriminant = load_discriminant(pointer, cases.len(), cx)?;
            let payload_ptr = pointer.advanced_by(payload_offset(&cases)?);
            cx.lift_variant(discriminant, variant, |cx, index| {
                let case_ty = cases.get(index).ok_or(CanonicalAbiError::InvalidCaseIndex {
                    index,
                    num_cases: cases.len(),
                })?;
                case_ty.map(|ty| load(ty, payload_ptr, cx)).transpose()
            })
        }
        WitType::Own(_)
        | WitType::Borrow(_)
        | WitType::Future(_)
        | WitType::Stream(_)
        | WitType::Resource(_) => unsupported(ty, "loading"),
    }
}

/// Read the `(pointer, length)` pair of a string or list.
pub(crate) fn load_list_header<C>(
    pointer: C::Pointer,
    cx: &C,
) -> Result<(C::Operand, C::Operand), C::Error>
where
    C: CanonicalLoading,
{
    let buffer = cx.load_u32(pointer)?;
    let length = cx.load_u32(pointer.advanced_by(4))?;
    Ok((buffer, length))
}

/// Read a discriminant sized for `number_of_cases`.
pub(crate) fn load_discriminant<C>(
    pointer: C::Pointer,
    number_of_cases: usize,
    cx: &C,
) -> Result<C::Operand, C::Error>
where
    C: CanonicalLoading,
{
    match discriminant_type_of(number_of_cases) {
        DiscriminantType::U8 => cx.load_u8(pointer),
        DiscriminantType::U16 => cx.load_u16(pointer),
        DiscriminantType::U32 => cx.load_u32(pointer),
    }
}
