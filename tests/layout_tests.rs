//! Layout and flattening scenarios checked against hand-computed values.

mod common;

use common::{enumeration, flags, record, variant};
use wit_cabi::abi::{
    CallDirection, FunctionDecl, FunctionResults, SignatureSegment, alignment, discriminant_type,
    field_offsets, flatten, flatten_params_results, flatten_signature, flatten_types,
    flatten_variant_payload, payload_offset, size,
};
use wit_cabi::{CanonicalAbiError, CoreType, DiscriminantType, WitType};

type TestResult = Result<(), CanonicalAbiError>;

#[test]
fn test_record_u8_u32() -> TestResult {
    let ty = record("pair", &[("a", WitType::U8), ("b", WitType::U32)]);
    assert_eq!(size(&ty)?, 8);
    assert_eq!(alignment(&ty)?, 4);

    let offsets: Vec<usize> = field_offsets([&WitType::U8, &WitType::U32])?
        .into_iter()
        .map(|(_, offset)| offset)
        .collect();
    assert_eq!(offsets, vec![0, 4]);
    Ok(())
}

#[test]
fn test_discriminant_types() {
    assert_eq!(discriminant_type(3), DiscriminantType::U8);
    assert_eq!(discriminant_type(300), DiscriminantType::U16);
    assert_eq!(discriminant_type(70_000), DiscriminantType::U32);
}

#[test]
fn test_option_u64_flattening() -> TestResult {
    let ty = WitType::option(WitType::U64);
    assert_eq!(flatten_types(&ty)?, vec![CoreType::I32, CoreType::I64]);
    assert_eq!(size(&ty)?, 16);
    assert_eq!(alignment(&ty)?, 8);
    assert_eq!(payload_offset(&[None, Some(&WitType::U64)])?, 8);
    Ok(())
}

#[test]
fn test_too_many_params_collapse_to_args() -> TestResult {
    let names: Vec<String> = (0..17).map(|i| format!("p{i}")).collect();
    let ty = WitType::U32;
    let signature = flatten_params_results(
        names.iter().map(|name| (name.as_str(), &ty)),
        std::iter::empty(),
        CallDirection::Lift,
    )?;
    assert_eq!(
        signature.parameters,
        vec![SignatureSegment::labeled("args", CoreType::I32)]
    );
    assert!(signature.is_indirect_params());
    assert!(signature.results.is_empty());
    assert!(!signature.is_indirect_result);

    // Sixteen slots still fit.
    let signature = flatten_params_results(
        names.iter().take(16).map(|name| (name.as_str(), &ty)),
        std::iter::empty(),
        CallDirection::Lift,
    )?;
    assert!(!signature.is_indirect_params());
    assert_eq!(signature.parameter_types(), vec![CoreType::I32; 16]);
    assert_eq!(signature.parameters[15].label_path(), "p15");
    Ok(())
}

#[test]
fn test_result_u32_u32_flattening() -> TestResult {
    let ty = WitType::result(Some(WitType::U32), Some(WitType::U32));
    assert_eq!(flatten(&ty)?.len(), 2);
    assert_eq!(flatten_types(&ty)?, vec![CoreType::I32, CoreType::I32]);
    Ok(())
}

#[test]
fn test_two_results_are_indirect() -> TestResult {
    let function = FunctionDecl {
        name: "split".to_string(),
        params: vec![("s".to_string(), WitType::String)],
        results: FunctionResults::Named(vec![
            ("head".to_string(), WitType::U32),
            ("tail".to_string(), WitType::U32),
        ]),
    };
    let signature = flatten_signature(&function, |ty| Ok::<_, CanonicalAbiError>(ty.clone()))?;
    assert!(signature.is_indirect_result);
    assert_eq!(
        signature.results,
        vec![SignatureSegment::labeled("ret", CoreType::I32)]
    );
    let labels: Vec<String> = signature.parameters.iter().map(|s| s.label_path()).collect();
    assert_eq!(labels, vec!["s.ptr", "s.len"]);

    // The lowering side passes the return area as an extra parameter.
    let lowered = flatten_params_results(
        [("s", &WitType::String)],
        [("head", &WitType::U32), ("tail", &WitType::U32)],
        CallDirection::Lower,
    )?;
    assert!(lowered.is_indirect_result);
    assert!(lowered.results.is_empty());
    assert_eq!(
        lowered.parameters.last(),
        Some(&SignatureSegment::labeled("ret", CoreType::I32))
    );
    Ok(())
}

#[test]
fn test_single_anonymous_result() -> TestResult {
    let function = FunctionDecl {
        name: "get".to_string(),
        params: vec![],
        results: FunctionResults::Anon(WitType::U64),
    };
    let signature = flatten_signature(&function, |ty| Ok::<_, CanonicalAbiError>(ty.clone()))?;
    assert!(!signature.is_indirect_result);
    assert!(signature.parameter_types().is_empty());
    assert_eq!(signature.result_types(), vec![CoreType::I64]);
    assert_eq!(
        signature.results,
        vec![SignatureSegment::labeled("ret", CoreType::I64)]
    );
    Ok(())
}

#[test]
fn test_variant_with_mixed_payloads() -> TestResult {
    let ty = variant(
        "shape",
        &[
            ("circle", Some(WitType::Float32)),
            ("rectangle", Some(WitType::Tuple(vec![WitType::Float32, WitType::Float32]))),
            ("label", Some(WitType::String)),
            ("empty", None),
        ],
    );
    assert_eq!(
        flatten_types(&ty)?,
        vec![CoreType::I32, CoreType::I32, CoreType::I32]
    );
    assert_eq!(size(&ty)?, 12);
    assert_eq!(alignment(&ty)?, 4);

    let labels: Vec<String> = flatten(&ty)?.iter().map(|s| s.label_path()).collect();
    assert_eq!(labels, vec!["disc", "0", "1"]);
    Ok(())
}

#[test]
fn test_payload_join_is_deterministic() -> TestResult {
    let a = WitType::Tuple(vec![WitType::Float32, WitType::U8]);
    let b = WitType::Float64;
    let forward = flatten_variant_payload(&[Some(&a), Some(&b)])?;
    let backward = flatten_variant_payload(&[Some(&b), Some(&a)])?;
    assert_eq!(forward, vec![CoreType::I64, CoreType::I32]);
    assert_eq!(forward, backward);
    assert_eq!(forward, flatten_variant_payload(&[Some(&a), Some(&b)])?);
    Ok(())
}

#[test]
fn test_enum_and_flags_flattening() -> TestResult {
    let small = enumeration("color", &["red", "green", "blue"]);
    assert_eq!(flatten_types(&small)?, vec![CoreType::I32]);
    assert_eq!(size(&small)?, 1);

    assert_eq!(flatten_types(&flags("none", 0))?, Vec::<CoreType>::new());
    assert_eq!(size(&flags("none", 0))?, 0);
    assert_eq!(flatten_types(&flags("byte", 8))?.len(), 1);
    assert_eq!(size(&flags("byte", 8))?, 1);
    assert_eq!(size(&flags("half", 9))?, 2);
    assert_eq!(size(&flags("word", 17))?, 4);
    assert_eq!(flatten_types(&flags("wide", 33))?.len(), 2);
    assert_eq!(size(&flags("wide", 33))?, 8);
    Ok(())
}

#[test]
fn test_handles_are_i32_but_resources_are_not_laid_out() -> TestResult {
    let own = WitType::Own("file".to_string());
    assert_eq!(size(&own)?, 4);
    assert_eq!(flatten_types(&own)?, vec![CoreType::I32]);

    let resource = WitType::Resource("file".to_string());
    assert!(matches!(flatten(&resource), Err(CanonicalAbiError::UnsupportedType(_))));
    Ok(())
}
