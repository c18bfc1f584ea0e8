//! Strategy trait implementations for [`MemoryHost`].

use super::{MemoryHost, Val};
use crate::abi::layout::number_of_i32;
use crate::abi::{
    CanonicalAbiError, CanonicalDeallocation, CanonicalLifting, CanonicalLoading, CanonicalLowering,
    CanonicalStoring, alignment, raw_type_of_flags, size,
};
use crate::types::{CoreType, FlagsRepr, WitEnum, WitFlags, WitRecord, WitType, WitVariant};

type Res<T> = Result<T, CanonicalAbiError>;

fn invalid_discriminant(discriminant: u32, num_cases: usize) -> CanonicalAbiError {
    CanonicalAbiError::InvalidDiscriminant {
        discriminant,
        num_cases,
    }
}

fn mismatch(expected: &str, got: &Val) -> CanonicalAbiError {
    CanonicalAbiError::mismatch(expected, got.kind_name())
}

fn unbox(value: Option<Box<Val>>) -> Option<Val> {
    value.map(|v| *v)
}

/// Byte span of `length` elements of `element`, checked against overflow.
/// Element size and the bytes a list of `length` elements is charged.
///
/// Zero-sized elements are charged one byte each, so a list length read
/// from the guest is always backed by memory the guest actually has.
fn list_span(element: &WitType, length: u32) -> Res<(usize, usize)> {
    let element_size = size(element)?;
    let total = element_size
        .max(1)
        .checked_mul(length as usize)
        .ok_or(CanonicalAbiError::OutOfMemory {
            requested: usize::MAX,
            limit: u32::MAX as usize,
        })?;
    Ok((element_size, total))
}

fn element_pointer(base: u32, index: usize, element_size: usize) -> u32 {
    base.wrapping_add((index * element_size) as u32)
}

impl CanonicalLifting for MemoryHost {
    fn lift_bool(&mut self, value: Val) -> Res<Val> {
        match value {
            // A byte read from memory must be exactly 0 or 1.
            Val::U8(byte) => match byte {
                0 => Ok(Val::Bool(false)),
                1 => Ok(Val::Bool(true)),
                other => Err(CanonicalAbiError::InvalidBool(u32::from(other))),
            },
            other => Ok(Val::Bool(other.bits32()? != 0)),
        }
    }

    fn lift_u8(&mut self, value: Val) -> Res<Val> {
        Ok(Val::U8(value.bits32()? as u8))
    }

    fn lift_u16(&mut self, value: Val) -> Res<Val> {
        Ok(Val::U16(value.bits32()? as u16))
    }

    fn lift_u32(&mut self, value: Val) -> Res<Val> {
        Ok(Val::U32(value.bits32()?))
    }

    fn lift_u64(&mut self, value: Val) -> Res<Val> {
        Ok(Val::U64(value.bits64()?))
    }

    fn lift_s8(&mut self, value: Val) -> Res<Val> {
        Ok(Val::S8(value.bits32()? as i8))
    }

    fn lift_s16(&mut self, value: Val) -> Res<Val> {
        Ok(Val::S16(value.bits32()? as i16))
    }

    fn lift_s32(&mut self, value: Val) -> Res<Val> {
        Ok(Val::S32(value.bits32()? as i32))
    }

    fn lift_s64(&mut self, value: Val) -> Res<Val> {
        Ok(Val::S64(value.bits64()? as i64))
    }

    fn lift_float32(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::F32(v) | Val::Float32(v) => Ok(Val::Float32(v)),
            other => Ok(Val::Float32(f32::from_bits(other.bits32()?))),
        }
    }

    fn lift_float64(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::F64(v) | Val::Float64(v) => Ok(Val::Float64(v)),
            other => Ok(Val::Float64(f64::from_bits(other.bits64()?))),
        }
    }

    fn lift_char(&mut self, value: Val) -> Res<Val> {
        let code = value.bits32()?;
        char::from_u32(code)
            .map(Val::Char)
            .ok_or(CanonicalAbiError::InvalidChar(code))
    }

    fn lift_string(&mut self, pointer: Val, length: Val) -> Res<Val> {
        self.check_string_encoding()?;
        let bytes = self.memory.read(pointer.bits32()?, length.bits32()? as usize)?;
        let s = std::str::from_utf8(bytes).map_err(|_| CanonicalAbiError::InvalidUtf8)?;
        Ok(Val::String(s.to_string()))
    }

    fn lift_list<F>(
        &mut self,
        pointer: Val,
        length: Val,
        element: &WitType,
        mut load_element: F,
    ) -> Result<Self::Operand, Self::Error>
    where
        F: FnMut(&mut Self, Self::Pointer) -> Result<Self::Operand, Self::Error>,
    {
        let base = pointer.bits32()?;
        let length = length.bits32()?;
        let (element_size, total) = list_span(element, length)?;
        // Reject lengths the memory cannot hold before allocating for them.
        self.memory.read(base, total)?;

        let mut items = Vec::with_capacity((length as usize).min(total));
        for i in 0..length as usize {
            items.push(load_element(self, element_pointer(base, i, element_size))?);
        }
        Ok(Val::List(items))
    }

    fn lift_record(&mut self, fields: Vec<Val>, ty: &WitRecord) -> Res<Val> {
        let names = ty.fields.iter().map(|f| f.name.clone());
        Ok(Val::Record(names.zip(fields).collect()))
    }

    fn lift_tuple(&mut self, elements: Vec<Val>, _types: &[WitType]) -> Res<Val> {
        Ok(Val::Tuple(elements))
    }

    fn lift_enum(&mut self, discriminant: Val, ty: &WitEnum) -> Res<Val> {
        let index = discriminant.bits32()?;
        ty.cases
            .get(index as usize)
            .map(|name| Val::Enum(name.clone()))
            .ok_or_else(|| invalid_discriminant(index, ty.cases.len()))
    }

    fn lift_flags(&mut self, words: Vec<Val>, ty: &WitFlags) -> Res<Val> {
        let mut bits = Vec::with_capacity(words.len());
        for word in &words {
            bits.push(word.bits32()?);
        }
        let set = ty
            .flags
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                bits.get(i / 32)
                    .is_some_and(|word| word & (1u32 << (i % 32)) != 0)
            })
            .map(|(_, name)| name.clone())
            .collect();
        Ok(Val::Flags(set))
    }

    fn lift_option<F>(
        &mut self,
        discriminant: Val,
        _wrapped: &WitType,
        mut lift_payload: F,
    ) -> Result<Self::Operand, Self::Error>
    where
        F: FnMut(&mut Self) -> Result<Self::Operand, Self::Error>,
    {
        match discriminant.bits32()? {
            0 => Ok(Val::Option(None)),
            1 => Ok(Val::Option(Some(Box::new(lift_payload(self)?)))),
            other => Err(invalid_discriminant(other, 2)),
        }
    }

    fn lift_result<F>(
        &mut self,
        discriminant: Val,
        _ok: Option<&WitType>,
        _error: Option<&WitType>,
        mut lift_payload: F,
    ) -> Result<Self::Operand, Self::Error>
    where
        F: FnMut(&mut Self, bool) -> Result<Option<Self::Operand>, Self::Error>,
    {
        match discriminant.bits32()? {
            0 => Ok(Val::Result(Ok(lift_payload(self, false)?.map(Box::new)))),
            1 => Ok(Val::Result(Err(lift_payload(self, true)?.map(Box::new)))),
            other => Err(invalid_discriminant(other, 2)),
        }
    }

    fn lift_variant<F>(
        &mut self,
        discriminant: Val,
        ty: &WitVariant,
        mut lift_payload: F,
    ) -> Result<Self::Operand, Self::Error>
    where
        F: FnMut(&mut Self, usize) -> Result<Option<Self::Operand>, Self::Error>,
    {
        let index = discriminant.bits32()?;
        let case = ty
            .cases
            .get(index as usize)
            .ok_or_else(|| invalid_discriminant(index, ty.cases.len()))?;
        let payload = lift_payload(self, index as usize)?;
        Ok(Val::Variant(case.name.clone(), payload.map(Box::new)))
    }
}

impl CanonicalLoading for MemoryHost {
    fn load_u8(&self, pointer: u32) -> Res<Val> {
        Ok(Val::U8(u8::from_le_bytes(self.memory.read_array(pointer)?)))
    }

    fn load_u16(&self, pointer: u32) -> Res<Val> {
        Ok(Val::U16(u16::from_le_bytes(self.memory.read_array(pointer)?)))
    }

    fn load_u32(&self, pointer: u32) -> Res<Val> {
        Ok(Val::U32(u32::from_le_bytes(self.memory.read_array(pointer)?)))
    }

    fn load_u64(&self, pointer: u32) -> Res<Val> {
        Ok(Val::U64(u64::from_le_bytes(self.memory.read_array(pointer)?)))
    }

    fn load_s8(&self, pointer: u32) -> Res<Val> {
        Ok(Val::S8(i8::from_le_bytes(self.memory.read_array(pointer)?)))
    }

    fn load_s16(&self, pointer: u32) -> Res<Val> {
        Ok(Val::S16(i16::from_le_bytes(self.memory.read_array(pointer)?)))
    }

    fn load_s32(&self, pointer: u32) -> Res<Val> {
        Ok(Val::S32(i32::from_le_bytes(self.memory.read_array(pointer)?)))
    }

    fn load_s64(&self, pointer: u32) -> Res<Val> {
        Ok(Val::S64(i64::from_le_bytes(self.memory.read_array(pointer)?)))
    }

    fn load_f32(&self, pointer: u32) -> Res<Val> {
        Ok(Val::F32(f32::from_le_bytes(self.memory.read_array(pointer)?)))
    }

    fn load_f64(&self, pointer: u32) -> Res<Val> {
        Ok(Val::F64(f64::from_le_bytes(self.memory.read_array(pointer)?)))
    }
}

impl CanonicalLowering for MemoryHost {
    fn lower_bool(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::Bool(b) => Ok(Val::I32(i32::from(b))),
            other => Err(mismatch("bool", &other)),
        }
    }

    fn lower_u8(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::U8(v) => Ok(Val::I32(i32::from(v))),
            other => Err(mismatch("u8", &other)),
        }
    }

    fn lower_u16(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::U16(v) => Ok(Val::I32(i32::from(v))),
            other => Err(mismatch("u16", &other)),
        }
    }

    fn lower_u32(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::U32(v) => Ok(Val::I32(v as i32)),
            other => Err(mismatch("u32", &other)),
        }
    }

    fn lower_u64(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::U64(v) => Ok(Val::I64(v as i64)),
            other => Err(mismatch("u64", &other)),
        }
    }

    fn lower_s8(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::S8(v) => Ok(Val::I32(i32::from(v))),
            other => Err(mismatch("s8", &other)),
        }
    }

    fn lower_s16(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::S16(v) => Ok(Val::I32(i32::from(v))),
            other => Err(mismatch("s16", &other)),
        }
    }

    fn lower_s32(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::S32(v) => Ok(Val::I32(v)),
            other => Err(mismatch("s32", &other)),
        }
    }

    fn lower_s64(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::S64(v) => Ok(Val::I64(v)),
            other => Err(mismatch("s64", &other)),
        }
    }

    fn lower_float32(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::Float32(v) => Ok(Val::F32(v)),
            other => Err(mismatch("f32", &other)),
        }
    }

    fn lower_float64(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::Float64(v) => Ok(Val::F64(v)),
            other => Err(mismatch("f64", &other)),
        }
    }

    fn lower_char(&mut self, value: Val) -> Res<Val> {
        match value {
            Val::Char(c) => Ok(Val::I32(u32::from(c) as i32)),
            other => Err(mismatch("char", &other)),
        }
    }

    fn lower_enum(&mut self, value: Val, ty: &WitEnum) -> Res<Val> {
        match value {
            Val::Enum(name) => ty
                .case_index(&name)
                .map(|index| Val::I32(index as i32))
                .ok_or_else(|| CanonicalAbiError::mismatch(format!("case of {}", ty.name), name)),
            other => Err(mismatch("enum", &other)),
        }
    }

    fn lower_flags(&mut self, value: Val, ty: &WitFlags) -> Res<Vec<Val>> {
        let names = match value {
            Val::Flags(names) => names,
            other => return Err(mismatch("flags", &other)),
        };
        let mut words = vec![0u32; number_of_i32(ty.flags.len())];
        for name in names {
            let index = ty
                .flags
                .iter()
                .position(|flag| *flag == name)
                .ok_or_else(|| CanonicalAbiError::mismatch(format!("flag of {}", ty.name), name))?;
            if let Some(word) = words.get_mut(index / 32) {
                *word |= 1 << (index % 32);
            }
        }
        Ok(words.into_iter().map(|w| Val::I32(w as i32)).collect())
    }

    fn lower_string(&mut self, value: Val) -> Res<(Val, Val)> {
        let s = match value {
            Val::String(s) => s,
            other => return Err(mismatch("string", &other)),
        };
        self.check_string_encoding()?;
        let ptr = self.memory.alloc(s.len(), 1)?;
        self.memory.write(ptr, s.as_bytes())?;
        Ok((Val::I32(ptr as i32), Val::I32(s.len() as i32)))
    }

    fn lower_list<F>(
        &mut self,
        value: Val,
        element: &WitType,
        mut store_element: F,
    ) -> Result<(Self::Operand, Self::Operand), Self::Error>
    where
        F: FnMut(&mut Self, Self::Pointer, Self::Operand) -> Result<(), Self::Error>,
    {
        let items = match value {
            Val::List(items) => items,
            other => return Err(mismatch("list", &other)),
        };
        let length = u32::try_from(items.len()).map_err(|_| CanonicalAbiError::OutOfMemory {
            requested: items.len(),
            limit: u32::MAX as usize,
        })?;
        let (element_size, total) = list_span(element, length)?;
        let base = self.memory.alloc(total, alignment(element)?)?;
        for (i, item) in items.into_iter().enumerate() {
            store_element(self, element_pointer(base, i, element_size), item)?;
        }
        Ok((Val::I32(base as i32), Val::I32(length as i32)))
    }

    fn lower_record(&mut self, value: Val, ty: &WitRecord) -> Res<Vec<Val>> {
        let mut fields = match value {
            Val::Record(fields) => fields,
            other => return Err(mismatch("record", &other)),
        };
        let mut ordered = Vec::with_capacity(ty.fields.len());
        for field in &ty.fields {
            let position = fields
                .iter()
                .position(|(name, _)| *name == field.name)
                .ok_or_else(|| {
                    CanonicalAbiError::mismatch(
                        format!("field {} of {}", field.name, ty.name),
                        "missing field",
                    )
                })?;
            ordered.push(fields.swap_remove(position).1);
        }
        if let Some((extra, _)) = fields.first() {
            return Err(CanonicalAbiError::mismatch(
                format!("fields of {}", ty.name),
                format!("unknown field {extra}"),
            ));
        }
        Ok(ordered)
    }

    fn lower_tuple(&mut self, value: Val, types: &[WitType]) -> Res<Vec<Val>> {
        match value {
            Val::Tuple(elements) if elements.len() == types.len() => Ok(elements),
            Val::Tuple(elements) => Err(CanonicalAbiError::mismatch(
                format!("tuple of {}", types.len()),
                format!("tuple of {}", elements.len()),
            )),
            other => Err(mismatch("tuple", &other)),
        }
    }

    fn lower_option<F>(
        &mut self,
        value: Val,
        _wrapped: &WitType,
        mut lower_payload: F,
    ) -> Result<(Self::Operand, Vec<Self::Operand>), Self::Error>
    where
        F: FnMut(&mut Self, Option<Self::Operand>) -> Result<Vec<Self::Operand>, Self::Error>,
    {
        match value {
            Val::Option(None) => Ok((Val::I32(0), lower_payload(self, None)?)),
            Val::Option(Some(payload)) => Ok((Val::I32(1), lower_payload(self, Some(*payload))?)),
            other => Err(mismatch("option", &other)),
        }
    }

    fn lower_result<F>(
        &mut self,
        value: Val,
        _ok: Option<&WitType>,
        _error: Option<&WitType>,
        mut lower_payload: F,
    ) -> Result<(Self::Operand, Vec<Self::Operand>), Self::Error>
    where
        F: FnMut(
            &mut Self,
            bool,
            Option<Self::Operand>,
        ) -> Result<Vec<Self::Operand>, Self::Error>,
    {
        match value {
            Val::Result(Ok(payload)) => Ok((Val::I32(0), lower_payload(self, false, unbox(payload))?)),
            Val::Result(Err(payload)) => Ok((Val::I32(1), lower_payload(self, true, unbox(payload))?)),
            other => Err(mismatch("result", &other)),
        }
    }

    fn lower_variant<F>(
        &mut self,
        value: Val,
        ty: &WitVariant,
        mut lower_payload: F,
    ) -> Result<(Self::Operand, Vec<Self::Operand>), Self::Error>
    where
        F: FnMut(
            &mut Self,
            usize,
            Option<Self::Operand>,
        ) -> Result<Vec<Self::Operand>, Self::Error>,
    {
        let (name, payload) = match value {
            Val::Variant(name, payload) => (name, payload),
            other => return Err(mismatch("variant", &other)),
        };
        let index = ty
            .case_index(&name)
            .ok_or_else(|| CanonicalAbiError::mismatch(format!("case of {}", ty.name), name))?;
        let flat = lower_payload(self, index, unbox(payload))?;
        Ok((Val::I32(index as i32), flat))
    }

    fn make_zero_value(&mut self, ty: CoreType) -> Val {
        match ty {
            CoreType::I32 => Val::I32(0),
            CoreType::I64 => Val::I64(0),
            CoreType::F32 => Val::F32(0.0),
            CoreType::F64 => Val::F64(0.0),
        }
    }

    fn numeric_cast(&mut self, value: Val, from: CoreType, to: CoreType) -> Res<Val> {
        match (from, to) {
            _ if from == to => Ok(value),
            (CoreType::F32, CoreType::I32) => Ok(Val::I32(value.bits32()? as i32)),
            (CoreType::I32 | CoreType::F32, CoreType::I64) => {
                Ok(Val::I64(i64::from(value.bits32()?)))
            }
            (CoreType::F64, CoreType::I64) => Ok(Val::I64(value.bits64()? as i64)),
            _ => Err(CanonicalAbiError::mismatch(
                format!("core value castable to {to}"),
                from.to_string(),
            )),
        }
    }
}

impl CanonicalStoring for MemoryHost {
    fn store_u8(&mut self, pointer: u32, value: Val) -> Res<()> {
        self.memory.write(pointer, &[value.bits32()? as u8])
    }

    fn store_u16(&mut self, pointer: u32, value: Val) -> Res<()> {
        self.memory.write(pointer, &(value.bits32()? as u16).to_le_bytes())
    }

    fn store_u32(&mut self, pointer: u32, value: Val) -> Res<()> {
        self.memory.write(pointer, &value.bits32()?.to_le_bytes())
    }

    fn store_u64(&mut self, pointer: u32, value: Val) -> Res<()> {
        self.memory.write(pointer, &value.bits64()?.to_le_bytes())
    }

    fn store_s8(&mut self, pointer: u32, value: Val) -> Res<()> {
        self.store_u8(pointer, value)
    }

    fn store_s16(&mut self, pointer: u32, value: Val) -> Res<()> {
        self.store_u16(pointer, value)
    }

    fn store_s32(&mut self, pointer: u32, value: Val) -> Res<()> {
        self.store_u32(pointer, value)
    }

    fn store_s64(&mut self, pointer: u32, value: Val) -> Res<()> {
        self.store_u64(pointer, value)
    }

    fn store_f32(&mut self, pointer: u32, value: Val) -> Res<()> {
        self.store_u32(pointer, value)
    }

    fn store_f64(&mut self, pointer: u32, value: Val) -> Res<()> {
        self.store_u64(pointer, value)
    }

    fn store_flags(&mut self, pointer: u32, value: Val, ty: &WitFlags) -> Res<()> {
        let words = self.lower_flags(value, ty)?;
        let first = words.first().cloned().unwrap_or(Val::I32(0));
        match raw_type_of_flags(ty.flags.len()) {
            FlagsRepr::U8 => self.store_u8(pointer, first),
            FlagsRepr::U16 => self.store_u16(pointer, first),
            FlagsRepr::U32(_) => {
                for (i, word) in words.into_iter().enumerate() {
                    self.store_u32(element_pointer(pointer, i, 4), word)?;
                }
                Ok(())
            }
        }
    }

    fn store_option<D, P>(
        &mut self,
        value: Val,
        _wrapped: &WitType,
        mut store_discriminant: D,
        mut store_payload: P,
    ) -> Result<(), Self::Error>
    where
        D: FnMut(&mut Self, Self::Operand) -> Result<(), Self::Error>,
        P: FnMut(&mut Self, Self::Operand) -> Result<(), Self::Error>,
    {
        match value {
            Val::Option(None) => store_discriminant(self, Val::I32(0)),
            Val::Option(Some(payload)) => {
                store_discriminant(self, Val::I32(1))?;
                store_payload(self, *payload)
            }
            other => Err(mismatch("option", &other)),
        }
    }

    fn store_result<D, P>(
        &mut self,
        value: Val,
        _ok: Option<&WitType>,
        _error: Option<&WitType>,
        mut store_discriminant: D,
        mut store_payload: P,
    ) -> Result<(), Self::Error>
    where
        D: FnMut(&mut Self, Self::Operand) -> Result<(), Self::Error>,
        P: FnMut(&mut Self, bool, Option<Self::Operand>) -> Result<(), Self::Error>,
    {
        let (is_error, payload) = match value {
            Val::Result(Ok(payload)) => (false, payload),
            Val::Result(Err(payload)) => (true, payload),
            other => return Err(mismatch("result", &other)),
        };
        store_discriminant(self, Val::I32(i32::from(is_error)))?;
        store_payload(self, is_error, unbox(payload))
    }

    fn store_variant<D, P>(
        &mut self,
        value: Val,
        ty: &WitVariant,
        mut store_discriminant: D,
        mut store_payload: P,
    ) -> Result<(), Self::Error>
    where
        D: FnMut(&mut Self, Self::Operand) -> Result<(), Self::Error>,
        P: FnMut(&mut Self, usize, Option<Self::Operand>) -> Result<(), Self::Error>,
    {
        let (name, payload) = match value {
            Val::Variant(name, payload) => (name, payload),
            other => return Err(mismatch("variant", &other)),
        };
        let index = ty
            .case_index(&name)
            .ok_or_else(|| CanonicalAbiError::mismatch(format!("case of {}", ty.name), name))?;
        store_discriminant(self, Val::I32(index as i32))?;
        store_payload(self, index, unbox(payload))
    }
}

impl CanonicalDeallocation for MemoryHost {
    fn deallocate_string(&mut self, pointer: Val, length: Val) -> Res<()> {
        self.memory.free(pointer.bits32()?, length.bits32()? as usize)
    }

    fn deallocate_list<F>(
        &mut self,
        pointer: Val,
        length: Val,
        element: &WitType,
        mut deallocate_element: F,
    ) -> Result<(), Self::Error>
    where
        F: FnMut(&mut Self, Self::Pointer) -> Result<(), Self::Error>,
    {
        let base = pointer.bits32()?;
        let length = length.bits32()?;
        let (element_size, total) = list_span(element, length)?;
        for i in 0..length as usize {
            deallocate_element(self, element_pointer(base, i, element_size))?;
        }
        self.memory.free(base, total)
    }

    fn deallocate_variant_like<F>(
        &mut self,
        discriminant: Val,
        cases: &[Option<&WitType>],
        mut deallocate_payload: F,
    ) -> Result<(), Self::Error>
    where
        F: FnMut(&mut Self, usize) -> Result<(), Self::Error>,
    {
        let index = discriminant.bits32()?;
        if index as usize >= cases.len() {
            return Err(invalid_discriminant(index, cases.len()));
        }
        deallocate_payload(self, index as usize)
    }
}
