//! Flat lowering: component-level values to core operands.
//!
//! See <https://github.com/WebAssembly/component-model/blob/main/design/mvp/CanonicalABI.md#flat-lowering>.

use super::flatten::{flatten_types, flatten_variant_payload};
use super::store::{CanonicalStoring, store};
use super::{CanonicalAbiError, CanonicalHost, unsupported};
use crate::logging::trace;
use crate::types::{CoreType, WitEnum, WitFlags, WitRecord, WitType, WitVariant};

/// Host conversions from component-level values to core operands.
pub trait CanonicalLowering: CanonicalHost {
    fn lower_bool(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lower_u8(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lower_u16(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lower_u32(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lower_u64(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lower_s8(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lower_s16(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lower_s32(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lower_s64(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lower_float32(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lower_float64(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;
    fn lower_char(&mut self, value: Self::Operand) -> Result<Self::Operand, Self::Error>;

    /// Lower an enum value to its case index.
    fn lower_enum(
        &mut self,
        value: Self::Operand,
        ty: &WitEnum,
    ) -> Result<Self::Operand, Self::Error>;

    /// Lower flags to their raw words, lowest flags first.
    ///
    /// The number of words must match what the flags type flattens to.
    fn lower_flags(
        &mut self,
        value: Self::Operand,
        ty: &WitFlags,
    ) -> Result<Vec<Self::Operand>, Self::Error>;

    /// Copy a string into linear memory, returning `(pointer, byte length)`.
    fn lower_string(
        &mut self,
        value: Self::Operand,
    ) -> Result<(Self::Operand, Self::Operand), Self::Error>;

    /// Allocate a list buffer and store each element with `store_element`,
    /// returning `(pointer, element count)`.
    fn lower_list<F>(
        &mut self,
        value: Self::Operand,
        element: &WitType,
        store_element: F,
    ) -> Result<(Self::Operand, Self::Operand), Self::Error>
    where
        F: FnMut(&mut Self, Self::Pointer, Self::Operand) -> Result<(), Self::Error>;

    /// Split a record into its field values, in declaration order.
    fn lower_record(
        &mut self,
        value: Self::Operand,
        ty: &WitRecord,
    ) -> Result<Vec<Self::Operand>, Self::Error>;

    /// Split a tuple into its element values.
    fn lower_tuple(
        &mut self,
        value: Self::Operand,
        types: &[WitType],
    ) -> Result<Vec<Self::Operand>, Self::Error>;

    /// Lower an option to its discriminant and joined payload.
    ///
    /// `lower_payload` takes the `some` payload, or `None` for `none`, and
    /// returns the joined payload operands.
    fn lower_option<F>(
        &mut self,
        value: Self::Operand,
        wrapped: &WitType,
        lower_payload: F,
    ) -> Result<(Self::Operand, Vec<Self::Operand>), Self::Error>
    where
        F: FnMut(&mut Self, Option<Self::Operand>) -> Result<Vec<Self::Operand>, Self::Error>;

    /// Lower a result. `lower_payload` takes whether the error case is active
    /// and that case's payload, if any.
    fn lower_result<F>(
        &mut self,
        value: Self::Operand,
        ok: Option<&WitType>,
        error: Option<&WitType>,
        lower_payload: F,
    ) -> Result<(Self::Operand, Vec<Self::Operand>), Self::Error>
    where
        F: FnMut(
            &mut Self,
            bool,
            Option<Self::Operand>,
        ) -> Result<Vec<Self::Operand>, Self::Error>;

    /// Lower a variant. `lower_payload` takes the active case index and that
    /// case's payload, if any.
    fn lower_variant<F>(
        &mut self,
        value: Self::Operand,
        ty: &WitVariant,
        lower_payload: F,
    ) -> Result<(Self::Operand, Vec<Self::Operand>), Self::Error>
    where
        F: FnMut(
            &mut Self,
            usize,
            Option<Self::Operand>,
        ) -> Result<Vec<Self::Operand>, Self::Error>;

    /// A zero of the given core type, used to fill unused payload slots.
    fn make_zero_value(&mut self, ty: CoreType) -> Self::Operand;

    /// Convert a core operand between core types.
    ///
    /// Used to widen a case payload into the joined slot of its variant:
    /// floats are reinterpreted as integer bits and `i32` widens to `i64`.
    fn numeric_cast(
        &mut self,
        value: Self::Operand,
        from: CoreType,
        to: CoreType,
    ) -> Result<Self::Operand, Self::Error>;
}

/// Lower `value` of type `ty` into flat core operands.
///
/// The result has exactly as many operands as [`flatten`](super::flatten())
/// yields for `ty`. Strings and lists are copied into memory through
/// [`store`].
pub fn lower<C>(ty: &WitType, value: C::Operand, cx: &mut C) -> Result<Vec<C::Operand>, C::Error>
where
    C: CanonicalLowering + CanonicalStoring,
{
    trace!(ty = ty.kind_name(), "lower");
    match ty {
        WitType::Bool => Ok(vec![cx.lower_bool(value)?]),
        WitType::U8 => Ok(vec![cx.lower_u8(value)?]),
        WitType::U16 => Ok(vec![cx.lower_u16(value)?]),
        WitType::U32 => Ok(vec![cx.lower_u32(value)?]),
        WitType::U64 => Ok(vec![cx.lower_u64(value)?]),
        WitType::S8 => Ok(vec![cx.lower_s8(value)?]),
        WitType::S16 => Ok(vec![cx.lower_s16(value)?]),
        WitType::S32 => Ok(vec![cx.lower_s32(value)?]),
        WitType::S64 => Ok(vec![cx.lower_s64(value)?]),
        WitType::Float32 => Ok(vec![cx.lower_float32(value)?]),
        WitType::Float64 => Ok(vec![cx.lower_float64(value)?]),
        WitType::Char => Ok(vec![cx.lower_char(value)?]),
        WitType::Enum(e) => Ok(vec![cx.lower_enum(value, e)?]),
        WitType::Flags(flags) => cx.lower_flags(value, flags),
        WitType::String => {
            let (pointer, length) = cx.lower_string(value)?;
            Ok(vec![pointer, length])
        }
        WitType::List(element) => {
            let (pointer, length) =
                cx.lower_list(value, element, |cx, ptr, item| store(element, item, ptr, cx))?;
            Ok(vec![pointer, length])
        }
        WitType::Record(record) => {
            let fields = cx.lower_record(value, record)?;
            lower_fields(record.fields.iter().map(|f| &f.ty), fields, ty, cx)
        }
        WitType::Tuple(types) => {
            let elements = cx.lower_tuple(value, types)?;
            lower_fields(types.iter(), elements, ty, cx)
        }
        WitType::Option(wrapped) => {
            let cases = [None, Some(wrapped.as_ref())];
            let joined = flatten_variant_payload(&cases)?;
            let (discriminant, payload) = cx.lower_option(value, wrapped, |cx, payload| {
                let index = usize::from(payload.is_some());
                lower_case_payload(&cases, &joined, index, payload, cx)
            })?;
            finish_variant(discriminant, payload, &joined, ty)
        }
        WitType::Result { ok, error } => {
            let cases = [ok.as_deref(), error.as_deref()];
            let joined = flatten_variant_payload(&cases)?;
            let (discriminant, payload) =
                cx.lower_result(value, ok.as_deref(), error.as_deref(), |cx, is_error, payload| {
                    lower_case_payload(&cases, &joined, usize::from(is_error), payload, cx)
                })?;
            finish_variant(discriminant, payload, &joined, ty)
        }
        WitType::Variant(variant) => {
            let cases = variant.case_types();
            let joined = flatten_variant_payload(&cases)?;
            let (discriminant, payload) =
                cx.lower_variant(value, variant, |cx, index, payload| {
                    lower_case_payload(&cases, &joined, index, payload, cx)
                })?;
            finish_variant(discriminant, payload, &joined, ty)
        }
        WitType::Own(_)
        | WitType::Borrow(_)
        | WitType::Future(_)
        | WitType::Stream(_)
        | WitType::Resource(_) => unsupported(ty, "lowering"),
    }
}

fn lower_fields<'a, C>(
    types: impl ExactSizeIterator<Item = &'a WitType>,
    values: Vec<C::Operand>,
    ty: &WitType,
    cx: &mut C,
) -> Result<Vec<C::Operand>, C::Error>
where
    C: CanonicalLowering + CanonicalStoring,
{
    if types.len() != values.len() {
        return Err(CanonicalAbiError::mismatch(
            format!("{} fields for {ty}", types.len()),
            format!("{} values", values.len()),
        )
        .into());
    }
    let mut flat = Vec::new();
    for (field_ty, field_value) in types.zip(values) {
        flat.extend(lower(field_ty, field_value, cx)?);
    }
    Ok(flat)
}

/// Lower the payload of case `index` into the joined slots of its variant.
///
/// Each of the case's own flat operands is cast to the joined type at the
/// same position; the remaining slots are zero-filled.
fn lower_case_payload<C>(
    cases: &[Option<&WitType>],
    joined: &[CoreType],
    index: usize,
    payload: Option<C::Operand>,
    cx: &mut C,
) -> Result<Vec<C::Operand>, C::Error>
where
    C: CanonicalLowering + CanonicalStoring,
{
    let case_ty = cases.get(index).ok_or(CanonicalAbiError::InvalidCaseIndex {
        index,
        num_cases: cases.len(),
    })?;
    let (own_types, own_values) = match (case_ty, payload) {
        (Some(case_ty), Some(payload)) => (flatten_types(case_ty)?, lower(case_ty, payload, cx)?),
        (Some(_), None) => return Err(CanonicalAbiError::MissingPayload { case: index }.into()),
        (None, Some(_)) => return Err(CanonicalAbiError::UnexpectedPayload { case: index }.into()),
        (None, None) => (Vec::new(), Vec::new()),
    };

    let mut own = own_types.into_iter().zip(own_values);
    let mut flat = Vec::with_capacity(joined.len());
    for &joined_ty in joined {
        let operand = match own.next() {
            Some((from, value)) => cx.numeric_cast(value, from, joined_ty)?,
            None => cx.make_zero_value(joined_ty),
        };
        flat.push(operand);
    }
    Ok(flat)
}

fn finish_variant<O, E: From<CanonicalAbiError>>(
    discriminant: O,
    payload: Vec<O>,
    joined: &[CoreType],
    ty: &WitType,
) -> Result<Vec<O>, E> {
    if payload.len() != joined.len() {
        return Err(CanonicalAbiError::mismatch(
            format!("{} payload operands for {ty}", joined.len()),
            format!("{}", payload.len()),
        )
        .into());
    }
    let mut flat = Vec::with_capacity(1 + payload.len());
    flat.push(discriminant);
    flat.extend(payload);
    Ok(flat)
}
