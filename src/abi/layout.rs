//! Memory layout of WIT values: size, alignment, field and payload offsets.
//!
//! Every function here is a pure function of the type shape. Composite
//! layouts are computed bottom-up from their immediate children only.

use super::CanonicalAbiError;
use crate::types::{DiscriminantType, FlagsRepr, WitType};

/// Align `offset` up to the nearest multiple of `align` (a power of two).
#[inline]
pub fn align_up(offset: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two(), "alignment {align} is not a power of two");
    (offset + align - 1) & !(align - 1)
}

/// Smallest integer type that can hold a discriminant for `number_of_cases`.
///
/// This is `ceil(log2(n) / 8)` bytes rounded up to u8/u16/u32, computed
/// exactly with integer ranges.
pub fn discriminant_type(number_of_cases: u32) -> DiscriminantType {
    match number_of_cases {
        0..=0x100 => DiscriminantType::U8,
        0x101..=0x1_0000 => DiscriminantType::U16,
        _ => DiscriminantType::U32,
    }
}

/// Discriminant type for a list of cases.
pub(crate) fn discriminant_type_of(number_of_cases: usize) -> DiscriminantType {
    discriminant_type(u32::try_from(number_of_cases).unwrap_or(u32::MAX))
}

/// Number of 32-bit words needed for `flags_count` flags.
pub fn number_of_i32(flags_count: usize) -> usize {
    flags_count.div_ceil(32)
}

/// In-memory representation of a flags type with `flags_count` flags.
pub fn raw_type_of_flags(flags_count: usize) -> FlagsRepr {
    match flags_count {
        0 => FlagsRepr::U32(0),
        1..=8 => FlagsRepr::U8,
        9..=16 => FlagsRepr::U16,
        n => FlagsRepr::U32(number_of_i32(n)),
    }
}

/// Size of a value of `ty` in bytes.
pub fn size(ty: &WitType) -> Result<usize, CanonicalAbiError> {
    Ok(match ty {
        WitType::Bool | WitType::U8 | WitType::S8 => 1,
        WitType::U16 | WitType::S16 => 2,
        WitType::U32 | WitType::S32 | WitType::Float32 | WitType::Char => 4,
        WitType::U64 | WitType::S64 | WitType::Float64 => 8,
        WitType::String | WitType::List(_) => 8,
        WitType::Own(_) | WitType::Borrow(_) | WitType::Future(_) | WitType::Stream(_) => 4,
        WitType::Tuple(types) => size_of_fields(types.iter())?,
        WitType::Record(record) => size_of_fields(record.fields.iter().map(|f| &f.ty))?,
        WitType::Flags(flags) => match raw_type_of_flags(flags.flags.len()) {
            FlagsRepr::U8 => 1,
            FlagsRepr::U16 => 2,
            FlagsRepr::U32(words) => 4 * words,
        },
        WitType::Option(_) | WitType::Result { .. } | WitType::Variant(_) | WitType::Enum(_) => {
            size_of_cases(&variant_cases(ty)?)?
        }
        WitType::Resource(_) => return Err(CanonicalAbiError::unsupported(ty, "size")),
    })
}

/// Alignment of a value of `ty` in bytes.
pub fn alignment(ty: &WitType) -> Result<usize, CanonicalAbiError> {
    Ok(match ty {
        WitType::Bool | WitType::U8 | WitType::S8 => 1,
        WitType::U16 | WitType::S16 => 2,
        WitType::U32 | WitType::S32 | WitType::Float32 | WitType::Char => 4,
        WitType::U64 | WitType::S64 | WitType::Float64 => 8,
        WitType::String | WitType::List(_) => 4,
        WitType::Own(_) | WitType::Borrow(_) | WitType::Future(_) | WitType::Stream(_) => 4,
        WitType::Tuple(types) => alignment_of_fields(types.iter())?,
        WitType::Record(record) => alignment_of_fields(record.fields.iter().map(|f| &f.ty))?,
        WitType::Flags(flags) => match raw_type_of_flags(flags.flags.len()) {
            FlagsRepr::U8 => 1,
            FlagsRepr::U16 => 2,
            FlagsRepr::U32(_) => 4,
        },
        WitType::Option(_) | WitType::Result { .. } | WitType::Variant(_) | WitType::Enum(_) => {
            alignment_of_cases(&variant_cases(ty)?)?
        }
        WitType::Resource(_) => return Err(CanonicalAbiError::unsupported(ty, "alignment")),
    })
}

/// Offsets of each field of a record or tuple, in declaration order.
pub fn field_offsets<'a>(
    fields: impl IntoIterator<Item = &'a WitType>,
) -> Result<Vec<(&'a WitType, usize)>, CanonicalAbiError> {
    let mut current = 0;
    fields
        .into_iter()
        .map(|field| {
            let aligned = align_up(current, alignment(field)?);
            current = aligned + size(field)?;
            Ok((field, aligned))
        })
        .collect()
}

/// Offset of the payload of a variant-like type from its start.
///
/// The discriminant size aligned up to the largest case alignment.
pub fn payload_offset(cases: &[Option<&WitType>]) -> Result<usize, CanonicalAbiError> {
    let discriminant_size = discriminant_type_of(cases.len()).size();
    Ok(align_up(discriminant_size, max_case_alignment(cases)?))
}

fn variant_cases(ty: &WitType) -> Result<Vec<Option<&WitType>>, CanonicalAbiError> {
    ty.variant_cases()
        .ok_or_else(|| CanonicalAbiError::mismatch("variant-like type", ty.kind_name()))
}

fn size_of_fields<'a>(
    fields: impl Iterator<Item = &'a WitType> + Clone,
) -> Result<usize, CanonicalAbiError> {
    let mut size = 0;
    for field in fields.clone() {
        size = align_up(size, alignment(field)?) + self::size(field)?;
    }
    Ok(align_up(size, alignment_of_fields(fields)?))
}

fn alignment_of_fields<'a>(
    fields: impl Iterator<Item = &'a WitType>,
) -> Result<usize, CanonicalAbiError> {
    let mut align = 1;
    for field in fields {
        align = align.max(alignment(field)?);
    }
    Ok(align)
}

fn size_of_cases(cases: &[Option<&WitType>]) -> Result<usize, CanonicalAbiError> {
    let mut max_size = 0;
    for case in cases.iter().flatten() {
        max_size = max_size.max(size(case)?);
    }
    Ok(align_up(payload_offset(cases)? + max_size, alignment_of_cases(cases)?))
}

fn alignment_of_cases(cases: &[Option<&WitType>]) -> Result<usize, CanonicalAbiError> {
    let discriminant_align = discriminant_type_of(cases.len()).size();
    Ok(discriminant_align.max(max_case_alignment(cases)?))
}

fn max_case_alignment(cases: &[Option<&WitType>]) -> Result<usize, CanonicalAbiError> {
    let mut align = 1;
    for case in cases.iter().flatten() {
        align = align.max(alignment(case)?);
    }
    Ok(align)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{WitCase, WitEnum, WitField, WitFlags, WitRecord, WitVariant};

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(4, 4), 4);
        assert_eq!(align_up(5, 8), 8);
        assert_eq!(align_up(3, 1), 3);
    }

    #[test]
    fn test_discriminant_type_boundaries() {
        assert_eq!(discriminant_type(0), DiscriminantType::U8);
        assert_eq!(discriminant_type(1), DiscriminantType::U8);
        assert_eq!(discriminant_type(3), DiscriminantType::U8);
        assert_eq!(discriminant_type(256), DiscriminantType::U8);
        assert_eq!(discriminant_type(257), DiscriminantType::U16);
        assert_eq!(discriminant_type(300), DiscriminantType::U16);
        assert_eq!(discriminant_type(65536), DiscriminantType::U16);
        assert_eq!(discriminant_type(65537), DiscriminantType::U32);
    }

    #[test]
    fn test_flags_repr() {
        assert_eq!(raw_type_of_flags(0), FlagsRepr::U32(0));
        assert_eq!(raw_type_of_flags(1), FlagsRepr::U8);
        assert_eq!(raw_type_of_flags(8), FlagsRepr::U8);
        assert_eq!(raw_type_of_flags(9), FlagsRepr::U16);
        assert_eq!(raw_type_of_flags(16), FlagsRepr::U16);
        assert_eq!(raw_type_of_flags(17), FlagsRepr::U32(1));
        assert_eq!(raw_type_of_flags(32), FlagsRepr::U32(1));
        assert_eq!(raw_type_of_flags(33), FlagsRepr::U32(2));
    }

    #[test]
    fn test_primitive_layout() -> Result<(), CanonicalAbiError> {
        let cases = [
            (WitType::Bool, 1, 1),
            (WitType::S16, 2, 2),
            (WitType::Char, 4, 4),
            (WitType::Float64, 8, 8),
            (WitType::String, 8, 4),
            (WitType::list(WitType::U64), 8, 4),
        ];
        for (ty, expected_size, expected_align) in cases {
            assert_eq!(size(&ty)?, expected_size, "size of {ty}");
            assert_eq!(alignment(&ty)?, expected_align, "alignment of {ty}");
        }
        Ok(())
    }

    #[test]
    fn test_record_padding() -> Result<(), CanonicalAbiError> {
        let record = WitType::Record(WitRecord::new(
            "r",
            vec![
                WitField::new("a", WitType::U8),
                WitField::new("b", WitType::U32),
                WitField::new("c", WitType::U16),
            ],
        ));
        assert_eq!(size(&record)?, 12);
        assert_eq!(alignment(&record)?, 4);

        let offsets: Vec<usize> = field_offsets([&WitType::U8, &WitType::U32, &WitType::U16])?
            .into_iter()
            .map(|(_, off)| off)
            .collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        Ok(())
    }

    #[test]
    fn test_empty_record() -> Result<(), CanonicalAbiError> {
        let record = WitType::Record(WitRecord::new("empty", vec![]));
        assert_eq!(size(&record)?, 0);
        assert_eq!(alignment(&record)?, 1);
        Ok(())
    }

    #[test]
    fn test_variant_layout() -> Result<(), CanonicalAbiError> {
        let variant = WitType::Variant(WitVariant::new(
            "v",
            vec![
                WitCase::new("a", None),
                WitCase::new("b", Some(WitType::U64)),
                WitCase::new("c", Some(WitType::U8)),
            ],
        ));
        assert_eq!(size(&variant)?, 16);
        assert_eq!(alignment(&variant)?, 8);
        assert_eq!(payload_offset(&[None, Some(&WitType::U64), Some(&WitType::U8)])?, 8);

        let option = WitType::option(WitType::U16);
        assert_eq!(size(&option)?, 4);
        assert_eq!(alignment(&option)?, 2);

        let result = WitType::result(None, None);
        assert_eq!(size(&result)?, 1);
        Ok(())
    }

    #[test]
    fn test_enum_and_flags_layout() -> Result<(), CanonicalAbiError> {
        let small = WitType::Enum(WitEnum::new("e", ["a", "b", "c"]));
        assert_eq!(size(&small)?, 1);

        let names: Vec<String> = (0..300).map(|i| format!("c{i}")).collect();
        let large = WitType::Enum(WitEnum::new("big", names));
        assert_eq!(size(&large)?, 2);
        assert_eq!(alignment(&large)?, 2);

        let flags: Vec<String> = (0..40).map(|i| format!("f{i}")).collect();
        let flags = WitType::Flags(WitFlags::new("f", flags));
        assert_eq!(size(&flags)?, 8);
        assert_eq!(alignment(&flags)?, 4);
        Ok(())
    }

    #[test]
    fn test_resource_is_unsupported() {
        let ty = WitType::Resource("file".to_string());
        assert!(matches!(size(&ty), Err(CanonicalAbiError::UnsupportedType(_))));
        assert!(matches!(alignment(&ty), Err(CanonicalAbiError::UnsupportedType(_))));
    }
}
