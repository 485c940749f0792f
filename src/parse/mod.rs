//! WebAssembly binary format parsing.
//!
//! [`ModuleParser::parse`] deserializes the section stream into a typed
//! [`ModuleInner`], runs the whole-module structural checks, and validates
//! every function body. A module that parses is therefore fully validated.

pub(crate) mod leb128;

use crate::errors::Error;
use crate::indices::{FuncIndex, GlobalIndex, TypeIndex};
use crate::module::ModuleInner;
use crate::types::{
    ConstExpr, DataSegment, ElementSegment, EntityIndex, EntityType, FuncType, GlobalType, Import,
    Limits, MemoryType, TableType, ValType,
};
use crate::values::VMVal;
use crate::{validate, MAX_WASM_PAGES};
use core::fmt;

/// A cursor over a byte slice. All multi-byte integers are LEB128; floats are
/// fixed-width little-endian.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn eof() -> Error {
        Error::malformed("unexpected EOF")
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(crate) fn read_u8(&mut self) -> crate::Result<u8> {
        let byte = self.bytes.get(self.pos).copied().ok_or_else(Self::eof)?;
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> crate::Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or_else(Self::eof)?;
        if end > self.bytes.len() {
            return Err(Self::eof());
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn read_u32(&mut self) -> crate::Result<u32> {
        leb128::read(|| self.read_u8())
    }

    pub(crate) fn read_i32(&mut self) -> crate::Result<i32> {
        leb128::read(|| self.read_u8())
    }

    pub(crate) fn read_i64(&mut self) -> crate::Result<i64> {
        leb128::read(|| self.read_u8())
    }

    pub(crate) fn read_f32_bits(&mut self) -> crate::Result<u32> {
        let mut buf = [0; 4];
        buf.copy_from_slice(self.read_bytes(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    pub(crate) fn read_f64_bits(&mut self) -> crate::Result<u64> {
        let mut buf = [0; 8];
        buf.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    pub(crate) fn read_valtype(&mut self) -> crate::Result<ValType> {
        let byte = self.read_u8()?;
        ValType::from_byte(byte)
            .ok_or_else(|| Error::malformed(format!("invalid valtype {byte}")))
    }
}

fn read_name(reader: &mut Reader) -> crate::Result<String> {
    let len = reader.read_u32()? as usize;
    let bytes = reader.read_bytes(len)?;
    let name = core::str::from_utf8(bytes).map_err(|_| Error::malformed("invalid UTF-8"))?;
    Ok(name.to_owned())
}

fn parse_limits(reader: &mut Reader) -> crate::Result<Limits> {
    let flag = reader.read_u8()?;
    match flag {
        0x00 => Ok(Limits {
            min: reader.read_u32()?,
            max: None,
        }),
        0x01 => {
            let min = reader.read_u32()?;
            let max = reader.read_u32()?;
            if min > max {
                return Err(Error::validation(
                    "malformed limits (minimum is larger than maximum)",
                ));
            }
            Ok(Limits {
                min,
                max: Some(max),
            })
        }
        _ => Err(Error::malformed(format!("invalid limits {flag}"))),
    }
}

fn parse_table_type(reader: &mut Reader) -> crate::Result<TableType> {
    let elemtype = reader.read_u8()?;
    if elemtype != 0x70 {
        return Err(Error::malformed(format!(
            "unexpected table elemtype: {elemtype}"
        )));
    }
    let limits = parse_limits(reader)?;
    Ok(TableType { limits })
}

fn parse_memory_type(reader: &mut Reader) -> crate::Result<MemoryType> {
    let limits = parse_limits(reader)?;
    if limits.min > MAX_WASM_PAGES || limits.max.is_some_and(|max| max > MAX_WASM_PAGES) {
        return Err(Error::validation("maximum memory page limit exceeded"));
    }
    Ok(MemoryType { limits })
}

fn parse_global_type(reader: &mut Reader) -> crate::Result<GlobalType> {
    let content = reader.read_valtype()?;
    let mutability = reader.read_u8()?;
    if mutability > 0x01 {
        return Err(Error::malformed(format!(
            "unexpected byte value {mutability}, expected 0x00 or 0x01 for global mutability"
        )));
    }
    Ok(GlobalType {
        content,
        mutable: mutability == 0x01,
    })
}

fn parse_constant_expression(reader: &mut Reader) -> crate::Result<ConstExpr> {
    let mut result: Option<ConstExpr> = None;
    loop {
        let opcode = reader.read_u8()?;
        let expr = match opcode {
            0x0b => break,
            0x23 => ConstExpr::GlobalGet(GlobalIndex::from_u32(reader.read_u32()?)),
            0x41 => ConstExpr::Const {
                ty: ValType::I32,
                value: VMVal::i32(reader.read_i32()?),
            },
            0x42 => ConstExpr::Const {
                ty: ValType::I64,
                value: VMVal::i64(reader.read_i64()?),
            },
            0x43 => ConstExpr::Const {
                ty: ValType::F32,
                value: VMVal::u32(reader.read_f32_bits()?),
            },
            0x44 => ConstExpr::Const {
                ty: ValType::F64,
                value: VMVal::u64(reader.read_f64_bits()?),
            },
            _ => {
                return Err(Error::validation(format!(
                    "unexpected instruction in the constant expression: {opcode}"
                )));
            }
        };
        if result.replace(expr).is_some() {
            return Err(Error::validation(
                "constant expression must be a single instruction",
            ));
        }
    }
    result.ok_or_else(|| Error::validation("constant expression is empty"))
}

fn with_context(error: Error, context: impl fmt::Display) -> Error {
    match error {
        Error::Malformed(message) => Error::malformed(format!("{context}: {message}")),
        Error::Validation(message) => Error::validation(format!("{context}: {message}")),
        Error::Instantiation(message) => Error::instantiation(format!("{context}: {message}")),
    }
}

pub(crate) struct ModuleParser {
    module: ModuleInner,
    last_section_id: u8,
}

impl ModuleParser {
    pub(crate) fn parse(bytes: &[u8]) -> crate::Result<ModuleInner> {
        const WASM_PREFIX: [u8; 8] = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        if bytes.len() < WASM_PREFIX.len() || bytes[..WASM_PREFIX.len()] != WASM_PREFIX {
            return Err(Error::malformed("invalid wasm module prefix"));
        }

        let mut parser = ModuleParser {
            module: ModuleInner::default(),
            last_section_id: 0,
        };
        let mut code_bodies: Vec<&[u8]> = Vec::new();

        let mut reader = Reader::new(&bytes[WASM_PREFIX.len()..]);
        while !reader.is_empty() {
            let id = reader.read_u8()?;
            // Non-custom sections must appear in strictly increasing id
            // order; custom sections may appear anywhere.
            if id != 0 {
                if id <= parser.last_section_id {
                    return Err(Error::malformed("unexpected out-of-order section type"));
                }
                parser.last_section_id = id;
            }
            let size = reader.read_u32()? as usize;
            let payload = reader.read_bytes(size)?;
            let mut section = Reader::new(payload);
            tracing::trace!(section = id, size, "parsing section");

            match id {
                0 => Self::skip_custom_section(&mut section)?,
                1 => parser.read_type_section(&mut section)?,
                2 => parser.read_import_section(&mut section)?,
                3 => parser.read_function_section(&mut section)?,
                4 => parser.read_table_section(&mut section)?,
                5 => parser.read_memory_section(&mut section)?,
                6 => parser.read_global_section(&mut section)?,
                7 => parser.read_export_section(&mut section)?,
                8 => parser.module.start = Some(FuncIndex::from_u32(section.read_u32()?)),
                9 => parser.read_element_section(&mut section)?,
                10 => code_bodies = Self::read_code_section(&mut section)?,
                11 => parser.read_data_section(&mut section)?,
                _ => {
                    return Err(Error::malformed(format!("unknown section encountered {id}")));
                }
            }

            if !section.is_empty() {
                return Err(Error::malformed(format!(
                    "incorrect section {id} size, {} unconsumed bytes",
                    section.remaining()
                )));
            }
        }

        parser.structural_checks(code_bodies.len())?;

        for (i, body) in code_bodies.iter().enumerate() {
            let func =
                FuncIndex::from_u32((parser.module.num_imported_functions + i) as u32);
            let code = validate::validate_function_body(&parser.module, func, body)
                .map_err(|error| with_context(error, format_args!("in function {i}")))?;
            parser.module.code.push(code);
        }

        Ok(parser.module)
    }

    // Custom sections are ignored, but the name must be parseable and valid
    // UTF-8.
    fn skip_custom_section(section: &mut Reader) -> crate::Result<()> {
        let name = read_name(section)?;
        let skipped = section.remaining();
        section.read_bytes(skipped)?;
        tracing::trace!(name = %name, skipped, "skipping custom section");
        Ok(())
    }

    fn read_type_section(&mut self, section: &mut Reader) -> crate::Result<()> {
        let count = section.read_u32()?;
        for _ in 0..count {
            let kind = section.read_u8()?;
            if kind != 0x60 {
                return Err(Error::malformed(format!(
                    "unexpected byte value {kind}, expected 0x60 for functype"
                )));
            }
            let param_count = section.read_u32()?;
            let mut params = Vec::with_capacity(param_count.min(128) as usize);
            for _ in 0..param_count {
                params.push(section.read_valtype()?);
            }
            let result_count = section.read_u32()?;
            let mut results = Vec::with_capacity(result_count.min(128) as usize);
            for _ in 0..result_count {
                results.push(section.read_valtype()?);
            }
            if results.len() > 1 {
                return Err(Error::validation("function type has more than one result"));
            }
            self.module.types.push(FuncType {
                params: params.into_boxed_slice(),
                results: results.into_boxed_slice(),
            });
        }
        Ok(())
    }

    fn read_import_section(&mut self, section: &mut Reader) -> crate::Result<()> {
        let count = section.read_u32()?;
        for _ in 0..count {
            let module = read_name(section)?;
            let name = read_name(section)?;
            let kind = section.read_u8()?;
            let ty = match kind {
                0x00 => {
                    let index = TypeIndex::from_u32(section.read_u32()?);
                    self.module.functions.push(index);
                    self.module.num_imported_functions += 1;
                    EntityType::Function(index)
                }
                0x01 => {
                    let ty = parse_table_type(section)?;
                    self.module.tables.push(ty);
                    self.module.num_imported_tables += 1;
                    EntityType::Table(ty)
                }
                0x02 => {
                    let ty = parse_memory_type(section)?;
                    self.module.memories.push(ty);
                    self.module.num_imported_memories += 1;
                    EntityType::Memory(ty)
                }
                0x03 => {
                    let ty = parse_global_type(section)?;
                    self.module.globals.push(ty);
                    self.module.num_imported_globals += 1;
                    EntityType::Global(ty)
                }
                _ => {
                    return Err(Error::malformed(format!(
                        "unexpected import kind value {kind}"
                    )));
                }
            };
            self.module.imports.push(Import { module, name, ty });
        }
        Ok(())
    }

    fn read_function_section(&mut self, section: &mut Reader) -> crate::Result<()> {
        let count = section.read_u32()?;
        for _ in 0..count {
            let index = TypeIndex::from_u32(section.read_u32()?);
            self.module.functions.push(index);
        }
        Ok(())
    }

    fn read_table_section(&mut self, section: &mut Reader) -> crate::Result<()> {
        let count = section.read_u32()?;
        for _ in 0..count {
            let ty = parse_table_type(section)?;
            self.module.tables.push(ty);
        }
        Ok(())
    }

    fn read_memory_section(&mut self, section: &mut Reader) -> crate::Result<()> {
        let count = section.read_u32()?;
        for _ in 0..count {
            let ty = parse_memory_type(section)?;
            self.module.memories.push(ty);
        }
        Ok(())
    }

    fn read_global_section(&mut self, section: &mut Reader) -> crate::Result<()> {
        let count = section.read_u32()?;
        for _ in 0..count {
            let ty = parse_global_type(section)?;
            let init = parse_constant_expression(section)?;
            self.module.globals.push(ty);
            self.module.global_initializers.push(init);
        }
        Ok(())
    }

    fn read_export_section(&mut self, section: &mut Reader) -> crate::Result<()> {
        let count = section.read_u32()?;
        for _ in 0..count {
            let name = read_name(section)?;
            let kind = section.read_u8()?;
            let index = section.read_u32()?;
            let index = match kind {
                0x00 => EntityIndex::Function(FuncIndex::from_u32(index)),
                0x01 => EntityIndex::Table(crate::indices::TableIndex::from_u32(index)),
                0x02 => EntityIndex::Memory(crate::indices::MemoryIndex::from_u32(index)),
                0x03 => EntityIndex::Global(GlobalIndex::from_u32(index)),
                _ => {
                    return Err(Error::malformed(format!(
                        "unexpected export kind value {kind}"
                    )));
                }
            };
            if self.module.exports.contains_key(&name) {
                return Err(Error::validation(format!("duplicate export name {name}")));
            }
            self.module.exports.insert(name, index);
        }
        Ok(())
    }

    fn read_element_section(&mut self, section: &mut Reader) -> crate::Result<()> {
        let count = section.read_u32()?;
        for _ in 0..count {
            let table_index = section.read_u32()?;
            if table_index != 0 {
                return Err(Error::malformed(format!(
                    "unexpected tableidx value {table_index}"
                )));
            }
            let offset = parse_constant_expression(section)?;
            let func_count = section.read_u32()?;
            let mut init = Vec::with_capacity(func_count.min(128) as usize);
            for _ in 0..func_count {
                init.push(FuncIndex::from_u32(section.read_u32()?));
            }
            self.module.elements.push(ElementSegment {
                offset,
                init: init.into_boxed_slice(),
            });
        }
        Ok(())
    }

    fn read_code_section<'a>(section: &mut Reader<'a>) -> crate::Result<Vec<&'a [u8]>> {
        let count = section.read_u32()?;
        let mut bodies = Vec::with_capacity(count.min(128) as usize);
        for _ in 0..count {
            let size = section.read_u32()? as usize;
            bodies.push(section.read_bytes(size)?);
        }
        Ok(bodies)
    }

    fn read_data_section(&mut self, section: &mut Reader) -> crate::Result<()> {
        let count = section.read_u32()?;
        for _ in 0..count {
            let memory_index = section.read_u32()?;
            if memory_index != 0 {
                return Err(Error::malformed(format!(
                    "unexpected memidx value {memory_index}"
                )));
            }
            let offset = parse_constant_expression(section)?;
            let size = section.read_u32()? as usize;
            let init = section.read_bytes(size)?;
            self.module.data.push(DataSegment {
                offset,
                init: init.into(),
            });
        }
        Ok(())
    }

    /// Whole-module checks that need every section parsed: multiplicity
    /// rules, index ranges, export uniqueness targets, the start signature,
    /// and constant-expression typing.
    fn structural_checks(&self, code_count: usize) -> crate::Result<()> {
        let m = &self.module;

        for (func, type_index) in m.functions.iter() {
            if m.types.get(*type_index).is_none() {
                if (func.as_u32() as usize) < m.num_imported_functions {
                    return Err(Error::validation(
                        "invalid type index of an imported function",
                    ));
                }
                return Err(Error::validation("invalid function type index"));
            }
        }

        let defined_tables = m.tables.len() - m.num_imported_tables;
        let defined_memories = m.memories.len() - m.num_imported_memories;

        if defined_tables > 1 {
            return Err(Error::validation(
                "too many table sections (at most one is allowed)",
            ));
        }
        if defined_memories > 1 {
            return Err(Error::validation(
                "too many memory sections (at most one is allowed)",
            ));
        }
        if m.num_imported_memories > 1 {
            return Err(Error::validation(
                "too many imported memories (at most one is allowed)",
            ));
        }
        if defined_memories >= 1 && m.num_imported_memories >= 1 {
            return Err(Error::validation(
                "both module memory and imported memory are defined (at most one of them is allowed)",
            ));
        }
        if !m.data.is_empty() && !m.has_memory() {
            return Err(Error::validation(
                "data section encountered without a memory section",
            ));
        }
        if m.num_imported_tables > 1 {
            return Err(Error::validation(
                "too many imported tables (at most one is allowed)",
            ));
        }
        if defined_tables >= 1 && m.num_imported_tables >= 1 {
            return Err(Error::validation(
                "both module table and imported table are defined (at most one of them is allowed)",
            ));
        }
        if !m.elements.is_empty() && !m.has_table() {
            return Err(Error::validation(
                "element section encountered without a table section",
            ));
        }

        let defined_functions = m.functions.len() - m.num_imported_functions;
        if defined_functions != code_count {
            return Err(Error::malformed(
                "number of function and code entries must match",
            ));
        }

        for (name, index) in &m.exports {
            let valid = match index {
                EntityIndex::Function(func) => (func.as_u32() as usize) < m.functions.len(),
                EntityIndex::Table(table) => table.as_u32() == 0 && m.has_table(),
                EntityIndex::Memory(memory) => memory.as_u32() == 0 && m.has_memory(),
                EntityIndex::Global(global) => (global.as_u32() as usize) < m.globals.len(),
            };
            if !valid {
                return Err(Error::validation(format!(
                    "invalid index of an exported item {name}"
                )));
            }
        }

        if let Some(start) = m.start {
            if (start.as_u32() as usize) >= m.functions.len() {
                return Err(Error::validation("invalid start function index"));
            }
            let ty = m.func_type(start);
            if !ty.params.is_empty() || !ty.results.is_empty() {
                return Err(Error::validation("invalid start function type"));
            }
        }

        for segment in &m.elements {
            self.check_const_expr(&segment.offset, ValType::I32)?;
            for func in &segment.init {
                if (func.as_u32() as usize) >= m.functions.len() {
                    return Err(Error::validation(
                        "invalid function index in element section",
                    ));
                }
            }
        }
        for segment in &m.data {
            self.check_const_expr(&segment.offset, ValType::I32)?;
        }
        for (defined, init) in m.global_initializers.iter() {
            let global =
                GlobalIndex::from_u32(defined.as_u32() + m.num_imported_globals as u32);
            self.check_const_expr(init, m.globals[global].content)?;
        }

        Ok(())
    }

    // Constant expressions may only be a typed literal or a `global.get` of
    // an immutable imported global.
    fn check_const_expr(&self, expr: &ConstExpr, expected: ValType) -> crate::Result<()> {
        let m = &self.module;
        match *expr {
            ConstExpr::Const { ty, .. } => {
                if ty != expected {
                    return Err(Error::validation(format!(
                        "type mismatch in constant expression: expected {expected}, got {ty}"
                    )));
                }
            }
            ConstExpr::GlobalGet(global) => {
                if (global.as_u32() as usize) >= m.num_imported_globals {
                    return Err(Error::validation(
                        "constant expression can use global.get only for imported globals",
                    ));
                }
                let ty = m.globals[global];
                if ty.mutable {
                    return Err(Error::validation(
                        "constant expression references a mutable global",
                    ));
                }
                if ty.content != expected {
                    return Err(Error::validation(format!(
                        "type mismatch in constant expression: expected {expected}, got {}",
                        ty.content
                    )));
                }
            }
        }
        Ok(())
    }
}
