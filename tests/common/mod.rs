//! Common test utilities and fixtures.
//!
//! Builders for the WIT types the integration tests exercise, so each test
//! reads as the shape it checks rather than as constructor noise.

#![allow(dead_code)]

use wit_cabi::host::Val;
use wit_cabi::{WitCase, WitEnum, WitField, WitFlags, WitRecord, WitType, WitVariant};

// =============================================================================
// WIT Type Builders
// =============================================================================

pub fn record(name: &str, fields: &[(&str, WitType)]) -> WitType {
    WitType::Record(WitRecord::new(
        name,
        fields
            .iter()
            .map(|(field, ty)| WitField::new(*field, ty.clone()))
            .collect(),
    ))
}

pub fn variant(name: &str, cases: &[(&str, Option<WitType>)]) -> WitType {
    WitType::Variant(WitVariant::new(
        name,
        cases
            .iter()
            .map(|(case, ty)| WitCase::new(*case, ty.clone()))
            .collect(),
    ))
}

pub fn enumeration(name: &str, cases: &[&str]) -> WitType {
    WitType::Enum(WitEnum::new(name, cases.iter().copied()))
}

pub fn flags(name: &str, count: usize) -> WitType {
    WitType::Flags(WitFlags::new(name, (0..count).map(|i| format!("f{i}"))))
}

/// `record point { x: u32, y: u32 }`
pub fn point() -> WitType {
    record("point", &[("x", WitType::U32), ("y", WitType::U32)])
}

// =============================================================================
// Value Builders
// =============================================================================

pub fn point_val(x: u32, y: u32) -> Val {
    Val::Record(vec![("x".to_string(), Val::U32(x)), ("y".to_string(), Val::U32(y))])
}

pub fn some(val: Val) -> Val {
    Val::Option(Some(Box::new(val)))
}

pub fn case(name: &str, payload: Option<Val>) -> Val {
    Val::Variant(name.to_string(), payload.map(Box::new))
}

// =============================================================================
// WIT Source Fixtures
// =============================================================================

/// A small interface covering every shape the WIT bridge converts.
pub const TYPES_WIT: &str = r#"
    package test:types;

    interface types {
        record point {
            x: u32,
            y: u32,
        }

        record person {
            name: string,
            age: u8,
            tags: list<string>,
        }

        enum color { red, green, blue }

        flags permissions { read, write, execute }

        variant shape {
            circle(f32),
            rectangle(tuple<f32, f32>),
            label(string),
            empty,
        }

        type lookup = result<option<point>, string>;
    }
"#;
