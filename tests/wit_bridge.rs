//! WIT source text through the `wit-parser` bridge, WAVE values through the
//! reference host.

#![cfg(all(feature = "wit", feature = "wave"))]

mod common;

use anyhow::Result;
use common::TYPES_WIT;
use wit_cabi::abi::{self, CallDirection, SignatureSegment};
use wit_cabi::host::{MemoryHost, Val};
use wit_cabi::wave::{format_val, parse_val};
use wit_cabi::{CoreType, WaveType, WitType, load_wit_type_from_string, resolve_wit_type};

fn load(name: &str) -> Result<(WaveType, WitType)> {
    let (resolve, type_id, ty) = load_wit_type_from_string(TYPES_WIT, Some(name))?;
    let wave_type = resolve_wit_type(&resolve, type_id).map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok((wave_type, ty))
}

/// Parse `text`, store it, load it back and render it again.
fn store_and_load(name: &str, text: &str) -> Result<String> {
    let (wave_type, ty) = load(name)?;
    let value = parse_val(text, &wave_type, &ty)?;
    let mut host = MemoryHost::new();
    let ptr = host.store_value(&ty, value)?;
    let loaded = host.load_value(&ty, ptr)?;
    Ok(format_val(&loaded, &wave_type)?)
}

/// Parse `text`, lower it, lift it back and render it again.
fn lower_and_lift(name: &str, text: &str) -> Result<String> {
    let (wave_type, ty) = load(name)?;
    let value = parse_val(text, &wave_type, &ty)?;
    let mut host = MemoryHost::new();
    let flat = host.lower_value(&ty, value)?;
    let lifted = host.lift_value(&ty, flat)?;
    Ok(format_val(&lifted, &wave_type)?)
}

#[test]
fn test_first_named_type_is_default() -> Result<()> {
    let (_, _, ty) = load_wit_type_from_string(TYPES_WIT, None)?;
    assert_eq!(ty, common::point());
    Ok(())
}

#[test]
fn test_person_layout() -> Result<()> {
    let (_, ty) = load("person")?;
    assert_eq!(abi::size(&ty)?, 20);
    assert_eq!(abi::alignment(&ty)?, 4);

    let labels: Vec<String> = abi::flatten(&ty)?.iter().map(|s| s.label_path()).collect();
    assert_eq!(
        labels,
        vec!["name.ptr", "name.len", "age", "tags.ptr", "tags.len"]
    );
    Ok(())
}

#[test]
fn test_wave_roundtrips() -> Result<()> {
    let cases = [
        ("point", "{x: 1, y: 4294967295}"),
        ("person", r#"{name: "Ada", age: 36, tags: ["math", "engines"]}"#),
        ("color", "green"),
        ("permissions", "{read, execute}"),
        ("shape", "circle(1.5)"),
        ("shape", "rectangle((2.5, 3.5))"),
        ("shape", r#"label("hi")"#),
        ("shape", "empty"),
        ("lookup", "ok(some({x: 1, y: 2}))"),
        ("lookup", "ok(none)"),
        ("lookup", r#"err("missing")"#),
    ];
    for (name, text) in cases {
        assert_eq!(store_and_load(name, text)?, text, "store/load of {name}");
        assert_eq!(lower_and_lift(name, text)?, text, "lower/lift of {name}");
    }
    Ok(())
}

#[test]
fn test_lookup_flattening() -> Result<()> {
    // result<option<point>, string>: the point and the string share slots.
    let (_, ty) = load("lookup")?;
    assert_eq!(
        abi::flatten_types(&ty)?,
        vec![CoreType::I32, CoreType::I32, CoreType::I32, CoreType::I32]
    );
    Ok(())
}

#[test]
fn test_function_signature_from_wit_types() -> Result<()> {
    let (_, person) = load("person")?;
    let (_, point) = load("point")?;
    let signature = abi::flatten_params_results(
        [("who", &person), ("at", &point)],
        [("ret", &WitType::option(point.clone()))],
        CallDirection::Lift,
    )?;
    assert_eq!(signature.parameters.len(), 7);
    assert!(signature.is_indirect_result);
    assert_eq!(
        signature.results,
        vec![SignatureSegment::labeled("ret", CoreType::I32)]
    );
    Ok(())
}

#[test]
fn test_wave_kind_mismatch() -> Result<()> {
    let (wave_type, _) = load("point")?;
    let result = parse_val("{x: 1, y: 2}", &wave_type, &WitType::String);
    assert!(matches!(result, Err(wit_cabi::Error::WaveParse(_))));

    let (wave_type, ty) = load("color")?;
    assert!(parse_val("purple", &wave_type, &ty).is_err());
    let value = parse_val("red", &wave_type, &ty)?;
    assert_eq!(value, Val::Enum("red".to_string()));
    Ok(())
}
