//! Releasing the linear memory owned by a stored value.
//!
//! Strings and lists own a buffer of their own; every other type only owns
//! memory through its children.

use super::layout::{field_offsets, payload_offset};
use super::load::{CanonicalLoading, load_discriminant, load_list_header};
use super::{CanonicalHost, GuestPointer, unsupported};
use crate::logging::trace;
use crate::types::WitType;

/// Host hooks for freeing the buffers of stored strings and lists.
pub trait CanonicalDeallocation: CanonicalHost {
    /// Free the buffer of a string holding `length` bytes.
    fn deallocate_string(
        &mut self,
        pointer: Self::Operand,
        length: Self::Operand,
    ) -> Result<(), Self::Error>;

    /// Free the buffer of a list holding `length` elements.
    ///
    /// `deallocate_element` releases whatever one element, stored at the
    /// given address, owns in turn.
    fn deallocate_list<F>(
        &mut self,
        pointer: Self::Operand,
        length: Self::Operand,
        element: &WitType,
        deallocate_element: F,
    ) -> Result<(), Self::Error>
    where
        F: FnMut(&mut Self, Self::Pointer) -> Result<(), Self::Error>;

    /// Release the active case of a variant-like value.
    ///
    /// `discriminant` is the raw value read from memory; the host resolves it
    /// to a case index and calls `deallocate_payload` with it.
    fn deallocate_variant_like<F>(
        &mut self,
        discriminant: Self::Operand,
        cases: &[Option<&WitType>],
        deallocate_payload: F,
    ) -> Result<(), Self::Error>
    where
        F: FnMut(&mut Self, usize) -> Result<(), Self::Error>;
}

/// Recursively free everything the value of `ty` stored at `pointer` owns.
///
/// Returns whether the value owned any memory at all.
pub fn deallocate<C>(ty: &WitType, pointer: C::Pointer, cx: &mut C) -> Result<bool, C::Error>
where
    C: CanonicalDeallocation + CanonicalLoading,
{
    trace!(ty = ty.kind_name(), "deallocate");
    match ty {
        WitType::Bool
        | WitType::U8
        | WitType::U16
        | WitType::U32
        | WitType::U64
        | WitType::S8
        | WitType::S16
        | WitType::S32
        | WitType::S64
        | WitType::Float32
        | WitType::Float64
        | WitType::Char
        | WitType::Enum(_)
        | WitType::Flags(_) => Ok(false),
        WitType::String => {
            let (buffer, length) = load_list_header(pointer, cx)?;
            cx.deallocate_string(buffer, length)?;
            Ok(true)
        }
        WitType::List(element) => {
            let (buffer, length) = load_list_header(pointer, cx)?;
            cx.deallocate_list(buffer, length, element, |cx, ptr| {
                deallocate(element, ptr, cx).map(|_| ())
            })?;
            Ok(true)
        }
        WitType::Tuple(types) => deallocate_fields(types.iter(), pointer, cx),
        WitType::Record(record) => {
            deallocate_fields(record.fields.iter().map(|f| &f.ty), pointer, cx)
        }
        WitType::Option(wrapped) => deallocate_cases(&[None, Some(wrapped.as_ref())], pointer, cx),
        WitType::Result { ok, error } => {
            deallocate_cases(&[ok.as_deref(), error.as_deref()], pointer, cx)
        }
        WitType::Variant(variant) => deallocate_cases(&variant.case_types(), pointer, cx),
        WitType::Own(_)
        | WitType::Borrow(_)
        | WitType::Future(_)
        | WitType::Stream(_)
        | WitType::Resource(_) => unsupported(ty, "deallocation"),
    }
}

fn deallocate_fields<'a, C>(
    types: impl Iterator<Item = &'a WitType>,
    pointer: C::Pointer,
    cx: &mut C,
) -> Result<bool, C::Error>
where
    C: CanonicalDeallocation + CanonicalLoading,
{
    let mut owned = false;
    for (field_ty, offset) in field_offsets(types)? {
        owned |= deallocate(field_ty, pointer.advanced_by(offset), cx)?;
    }
    Ok(owned)
}

fn deallocate_cases<C>(
    cases: &[Option<&WitType>],
    pointer: C::Pointer,
    cx: &mut C,
) -> Result<bool, C::Error>
where
    C: CanonicalDeallocation + CanonicalLoading,
{
    let discriminant = load_discriminant(pointer, cases.len(), cx)?;
    let payload_ptr = pointer.advanced_by(payload_offset(cases)?);
    let mut owned = false;
    cx.deallocate_variant_like(discriminant, cases, |cx, index| {
        if let Some(Some(case_ty)) = cases.get(index) {
            owned |= deallocate(case_ty, payload_ptr, cx)?;
        }
        Ok(())
    })?;
    Ok(owned)
}
