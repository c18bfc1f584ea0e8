//! Property-based tests for canonical ABI correctness.
//!
//! Random WIT types are paired with random values of that type, then pushed
//! through the reference host: lift(lower(v)) == v and load(store(v)) == v,
//! along with the layout and flattening invariants that hold for every type.

use proptest::prelude::*;
use wit_cabi::abi::{alignment, flatten, flatten_types, flatten_variant_payload, size};
use wit_cabi::host::{MemoryHost, Val};
use wit_cabi::{WitCase, WitEnum, WitField, WitFlags, WitRecord, WitType, WitVariant};

fn scalar_type() -> impl Strategy<Value = WitType> {
    prop_oneof![
        Just(WitType::Bool),
        Just(WitType::U8),
        Just(WitType::U16),
        Just(WitType::U32),
        Just(WitType::U64),
        Just(WitType::S8),
        Just(WitType::S16),
        Just(WitType::S32),
        Just(WitType::S64),
        Just(WitType::Float32),
        Just(WitType::Float64),
        Just(WitType::Char),
        Just(WitType::String),
        (1usize..6).prop_map(|n| WitType::Enum(WitEnum::new("e", (0..n).map(|i| format!("c{i}"))))),
        (0usize..40).prop_map(|n| WitType::Flags(WitFlags::new("f", (0..n).map(|i| format!("f{i}"))))),
    ]
}

/// Arbitrary WIT types, nested a few levels deep.
fn wit_type() -> impl Strategy<Value = WitType> {
    scalar_type().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(WitType::list),
            inner.clone().prop_map(WitType::option),
            prop::collection::vec(inner.clone(), 1..4).prop_map(WitType::Tuple),
            prop::collection::vec(inner.clone(), 1..4).prop_map(|types| {
                WitType::Record(WitRecord::new(
                    "r",
                    types
                        .into_iter()
                        .enumerate()
                        .map(|(i, ty)| WitField::new(format!("f{i}"), ty))
                        .collect(),
                ))
            }),
            (
                prop::option::of(inner.clone()),
                prop::option::of(inner.clone())
            )
                .prop_map(|(ok, error)| WitType::result(ok, error)),
            prop::collection::vec(prop::option::of(inner), 1..5).prop_map(|cases| {
                WitType::Variant(WitVariant::new(
                    "v",
                    cases
                        .into_iter()
                        .enumerate()
                        .map(|(i, ty)| WitCase::new(format!("c{i}"), ty))
                        .collect(),
                ))
            }),
        ]
    })
}

fn boxed(val: Option<Val>) -> Option<Box<Val>> {
    val.map(Box::new)
}

/// Payload strategy for an optional case type.
fn payload(ty: Option<&WitType>) -> BoxedStrategy<Option<Val>> {
    match ty {
        Some(ty) => value_of(ty).prop_map(Some).boxed(),
        None => Just(None).boxed(),
    }
}

/// Arbitrary values of `ty`. Floats are never NaN so `==` is meaningful.
fn value_of(ty: &WitType) -> BoxedStrategy<Val> {
    match ty {
        WitType::Bool => any::<bool>().prop_map(Val::Bool).boxed(),
        WitType::U8 => any::<u8>().prop_map(Val::U8).boxed(),
        WitType::U16 => any::<u16>().prop_map(Val::U16).boxed(),
        WitType::U32 => any::<u32>().prop_map(Val::U32).boxed(),
        WitType::U64 => any::<u64>().prop_map(Val::U64).boxed(),
        WitType::S8 => any::<i8>().prop_map(Val::S8).boxed(),
        WitType::S16 => any::<i16>().prop_map(Val::S16).boxed(),
        WitType::S32 => any::<i32>().prop_map(Val::S32).boxed(),
        WitType::S64 => any::<i64>().prop_map(Val::S64).boxed(),
        WitType::Float32 => any::<f32>()
            .prop_filter("not NaN", |f| !f.is_nan())
            .prop_map(Val::Float32)
            .boxed(),
        WitType::Float64 => any::<f64>()
            .prop_filter("not NaN", |f| !f.is_nan())
            .prop_map(Val::Float64)
            .boxed(),
        WitType::Char => any::<char>().prop_map(Val::Char).boxed(),
        WitType::String => ".{0,12}".prop_map(Val::String).boxed(),
        WitType::List(element) => prop::collection::vec(value_of(element), 0..4)
            .prop_map(Val::List)
            .boxed(),
        WitType::Tuple(types) => types
            .iter()
            .map(value_of)
            .collect::<Vec<_>>()
            .prop_map(Val::Tuple)
            .boxed(),
        WitType::Record(record) => {
            let names: Vec<String> = record.fields.iter().map(|f| f.name.clone()).collect();
            record
                .fields
                .iter()
                .map(|f| value_of(&f.ty))
                .collect::<Vec<_>>()
                .prop_map(move |values| Val::Record(names.iter().cloned().zip(values).collect()))
                .boxed()
        }
        WitType::Enum(e) => prop::sample::select(e.cases.clone()).prop_map(Val::Enum).boxed(),
        WitType::Flags(f) => {
            let count = f.flags.len();
            prop::sample::subsequence(f.flags.clone(), 0..=count)
                .prop_map(Val::Flags)
                .boxed()
        }
        WitType::Option(wrapped) => prop::option::of(value_of(wrapped))
            .prop_map(|v| Val::Option(boxed(v)))
            .boxed(),
        WitType::Result { ok, error } => prop_oneof![
            payload(ok.as_deref()).prop_map(|v| Val::Result(Ok(boxed(v)))),
            payload(error.as_deref()).prop_map(|v| Val::Result(Err(boxed(v)))),
        ]
        .boxed(),
        WitType::Variant(variant) => {
            let cases: Vec<BoxedStrategy<Val>> = variant
                .cases
                .iter()
                .map(|case| {
                    let name = case.name.clone();
                    payload(case.ty.as_ref())
                        .prop_map(move |v| Val::Variant(name.clone(), boxed(v)))
                        .boxed()
                })
                .collect();
            prop::strategy::Union::new(cases).boxed()
        }
        WitType::Own(_)
        | WitType::Borrow(_)
        | WitType::Future(_)
        | WitType::Stream(_)
        | WitType::Resource(_) => Just(Val::U32(0)).boxed(),
    }
}

fn typed_value() -> impl Strategy<Value = (WitType, Val)> {
    wit_type().prop_flat_map(|ty| {
        let values = value_of(&ty);
        (Just(ty), values)
    })
}

/// Largest alignment of any scalar reachable from `ty`, including
/// discriminants and list/string headers.
fn max_scalar_alignment(ty: &WitType) -> usize {
    match ty {
        WitType::Bool | WitType::U8 | WitType::S8 => 1,
        WitType::U16 | WitType::S16 => 2,
        WitType::U32 | WitType::S32 | WitType::Float32 | WitType::Char => 4,
        WitType::U64 | WitType::S64 | WitType::Float64 => 8,
        WitType::String | WitType::List(_) => 4,
        WitType::Tuple(types) => types.iter().map(max_scalar_alignment).max().unwrap_or(1),
        WitType::Record(r) => r.fields.iter().map(|f| max_scalar_alignment(&f.ty)).max().unwrap_or(1),
        // Zero flags are laid out as zero 32-bit words.
        WitType::Flags(f) => match f.flags.len() {
            1..=8 => 1,
            9..=16 => 2,
            _ => 4,
        },
        other => {
            let cases = other.variant_cases().unwrap_or_default();
            let discriminant = match cases.len() {
                0..=256 => 1,
                257..=65536 => 2,
                _ => 4,
            };
            cases
                .iter()
                .flatten()
                .map(|ty| max_scalar_alignment(ty))
                .fold(discriminant, usize::max)
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn roundtrip_lift_lower((ty, val) in typed_value()) {
        let mut host = MemoryHost::new();
        let flat = host.lower_value(&ty, val.clone()).unwrap();
        prop_assert_eq!(flat.len(), flatten(&ty).unwrap().len());
        let lifted = host.lift_value(&ty, flat).unwrap();
        prop_assert_eq!(lifted, val);
    }

    #[test]
    fn roundtrip_store_load((ty, val) in typed_value()) {
        let mut host = MemoryHost::new();
        let ptr = host.store_value(&ty, val.clone()).unwrap();
        prop_assert_eq!(ptr as usize % alignment(&ty).unwrap(), 0);
        let loaded = host.load_value(&ty, ptr).unwrap();
        prop_assert_eq!(loaded, val);
    }

    #[test]
    fn deallocate_leaves_only_the_root((ty, val) in typed_value()) {
        let mut host = MemoryHost::new();
        let ptr = host.store_value(&ty, val).unwrap();
        host.deallocate_value(&ty, ptr).unwrap();
        let root = usize::from(size(&ty).unwrap() > 0);
        prop_assert_eq!(host.memory().live_allocations(), root);
    }

    #[test]
    fn size_is_multiple_of_alignment(ty in wit_type()) {
        let size = size(&ty).unwrap();
        let align = alignment(&ty).unwrap();
        prop_assert_eq!(size % align, 0);
        prop_assert_eq!(align, max_scalar_alignment(&ty));
    }

    #[test]
    fn flattening_depends_only_on_type(ty in wit_type()) {
        prop_assert_eq!(flatten(&ty).unwrap(), flatten(&ty).unwrap());
    }

    #[test]
    fn payload_join_is_stable(a in wit_type(), b in wit_type()) {
        let cases = [Some(&a), None, Some(&b)];
        let joined = flatten_variant_payload(&cases).unwrap();
        prop_assert_eq!(&joined, &flatten_variant_payload(&cases).unwrap());

        let longest = flatten_types(&a).unwrap().len().max(flatten_types(&b).unwrap().len());
        prop_assert_eq!(joined.len(), longest);
        let swapped = flatten_variant_payload(&[Some(&b), None, Some(&a)]).unwrap();
        prop_assert_eq!(joined, swapped);
    }
}

#[test]
fn test_f32_special_values() {
    let mut host = MemoryHost::new();
    for v in [0.0f32, -0.0, f32::INFINITY, f32::NEG_INFINITY, f32::MIN_POSITIVE, f32::MAX] {
        let flat = host.lower_value(&WitType::Float32, Val::Float32(v)).unwrap();
        let lifted = host.lift_value(&WitType::Float32, flat).unwrap();
        let Val::Float32(lifted) = lifted else {
            panic!("expected float32, got {lifted:?}");
        };
        assert_eq!(lifted.to_bits(), v.to_bits());
    }
}

#[test]
fn test_char_values() {
    let mut host = MemoryHost::new();
    for c in ['\0', 'a', 'é', '\u{FFFF}', '\u{10FFFF}', '🦀'] {
        let ptr = host.store_value(&WitType::Char, Val::Char(c)).unwrap();
        assert_eq!(host.load_value(&WitType::Char, ptr).unwrap(), Val::Char(c));
    }
}
