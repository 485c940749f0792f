use crate::code::Code;
use crate::indices::{DefinedFuncIndex, DefinedGlobalIndex, FuncIndex, GlobalIndex, TypeIndex};
use crate::parse::ModuleParser;
use crate::types::{
    ConstExpr, DataSegment, ElementSegment, EntityIndex, FuncType, GlobalType, Import, MemoryType,
    TableType,
};
use cranelift_entity::PrimaryMap;
use hashbrown::HashMap;
use std::sync::Arc;

/// A parsed and validated WebAssembly module.
///
/// Modules are immutable; cloning is cheap and the clone can be instantiated
/// any number of times (including on other threads).
#[derive(Debug, Clone)]
pub struct Module(Arc<ModuleInner>);

impl Module {
    /// Parses and validates a binary module.
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        Ok(Self(Arc::new(ModuleParser::parse(bytes)?)))
    }

    /// The imports this module requires, in declaration order.
    pub fn imports(&self) -> impl ExactSizeIterator<Item = &Import> {
        self.0.imports.iter()
    }

    /// The items this module exports.
    pub fn exports(&self) -> impl ExactSizeIterator<Item = (&str, EntityIndex)> + '_ {
        self.0.exports.iter().map(|(name, index)| (name.as_str(), *index))
    }

    /// The function invoked automatically after instantiation, if any.
    pub fn start(&self) -> Option<FuncIndex> {
        self.0.start
    }

    /// The signature of a function in this module's index space.
    pub fn func_type(&self, func: FuncIndex) -> Option<&FuncType> {
        self.0
            .functions
            .get(func)
            .map(|type_index| &self.0.types[*type_index])
    }

    pub(crate) fn get_export(&self, name: &str) -> Option<EntityIndex> {
        self.0.exports.get(name).copied()
    }

    pub(crate) fn inner(&self) -> &ModuleInner {
        &self.0
    }
}

/// The typed in-memory form of a module, immutable after parsing.
///
/// Index spaces follow the binary format convention: imported entities come
/// first, locally defined ones after them.
#[derive(Debug, Default)]
pub(crate) struct ModuleInner {
    pub(crate) types: PrimaryMap<TypeIndex, FuncType>,
    pub(crate) imports: Vec<Import>,
    /// The signature of every function in the index space.
    pub(crate) functions: PrimaryMap<FuncIndex, TypeIndex>,
    /// The table index space; holds at most one entry.
    pub(crate) tables: Vec<TableType>,
    /// The memory index space; holds at most one entry.
    pub(crate) memories: Vec<MemoryType>,
    /// The global index space.
    pub(crate) globals: PrimaryMap<GlobalIndex, GlobalType>,
    /// Initializers for the locally defined globals.
    pub(crate) global_initializers: PrimaryMap<DefinedGlobalIndex, ConstExpr>,
    pub(crate) exports: HashMap<String, EntityIndex>,
    pub(crate) start: Option<FuncIndex>,
    pub(crate) elements: Vec<ElementSegment>,
    pub(crate) data: Vec<DataSegment>,
    /// Validated bodies of the locally defined functions.
    pub(crate) code: PrimaryMap<DefinedFuncIndex, Code>,
    pub(crate) num_imported_functions: usize,
    pub(crate) num_imported_tables: usize,
    pub(crate) num_imported_memories: usize,
    pub(crate) num_imported_globals: usize,
}

impl ModuleInner {
    pub(crate) fn func_type(&self, func: FuncIndex) -> &FuncType {
        &self.types[self.functions[func]]
    }

    pub(crate) fn defined_func_index(&self, func: FuncIndex) -> Option<DefinedFuncIndex> {
        (func.as_u32() as usize)
            .checked_sub(self.num_imported_functions)
            .map(|defined| DefinedFuncIndex::from_u32(defined as u32))
    }

    pub(crate) fn defined_global_index(&self, global: GlobalIndex) -> Option<DefinedGlobalIndex> {
        (global.as_u32() as usize)
            .checked_sub(self.num_imported_globals)
            .map(|defined| DefinedGlobalIndex::from_u32(defined as u32))
    }

    pub(crate) fn has_table(&self) -> bool {
        !self.tables.is_empty()
    }

    pub(crate) fn has_memory(&self) -> bool {
        !self.memories.is_empty()
    }

    pub(crate) fn imported_table(&self) -> Option<TableType> {
        (self.num_imported_tables > 0).then(|| self.tables[0])
    }

    pub(crate) fn defined_table(&self) -> Option<TableType> {
        (self.tables.len() > self.num_imported_tables)
            .then(|| self.tables[self.num_imported_tables])
    }

    pub(crate) fn imported_memory(&self) -> Option<MemoryType> {
        (self.num_imported_memories > 0).then(|| self.memories[0])
    }

    pub(crate) fn defined_memory(&self) -> Option<MemoryType> {
        (self.memories.len() > self.num_imported_memories)
            .then(|| self.memories[self.num_imported_memories])
    }

    /// Signatures the imported functions must satisfy, in import order.
    pub(crate) fn imported_function_types(&self) -> impl ExactSizeIterator<Item = &FuncType> {
        self.functions
            .values()
            .take(self.num_imported_functions)
            .map(|type_index| &self.types[*type_index])
    }

    /// Types of the imported globals, in import order.
    pub(crate) fn imported_global_types(&self) -> impl ExactSizeIterator<Item = GlobalType> + '_ {
        self.globals
            .values()
            .take(self.num_imported_globals)
            .copied()
    }
}
