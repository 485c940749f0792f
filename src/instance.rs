use crate::func::ExternalFunction;
use crate::global::Global;
use crate::indices::{FuncIndex, GlobalIndex};
use crate::memory::Memory;
use crate::module::Module;
use crate::table::Table;
use crate::types::{FuncType, Limits};

/// The mutable runtime state produced by instantiating a [`Module`].
///
/// An instance exclusively owns its locally defined memory, table and
/// globals; imported ones are shared handles whose backing storage lives in
/// the providing instance (or the host). All mutation goes through interior
/// mutability, so [`execute`](crate::execute) only ever needs a shared
/// reference.
#[derive(Debug)]
pub struct Instance {
    pub(crate) module: Module,
    /// The linear memory, owned or imported; `None` if the module declares
    /// neither.
    pub(crate) memory: Option<Memory>,
    pub(crate) memory_limits: Limits,
    /// Hard limit for memory growth in pages, already clamped to the
    /// module's declared maximum.
    pub(crate) memory_pages_limit: u32,
    /// The funcref table, owned or imported.
    pub(crate) table: Option<Table>,
    pub(crate) table_limits: Limits,
    /// Locally defined globals, in definition order.
    pub(crate) globals: Vec<Global>,
    pub(crate) imported_functions: Vec<ExternalFunction>,
    pub(crate) imported_globals: Vec<Global>,
}

impl Instance {
    /// The module this instance was created from.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// The instance's linear memory, if it has one.
    pub fn memory(&self) -> Option<&Memory> {
        self.memory.as_ref()
    }

    /// The instance's table, if it has one.
    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub(crate) fn func_type(&self, func: FuncIndex) -> &FuncType {
        self.module.inner().func_type(func)
    }

    /// Resolves a global index to its cell, whether imported or defined.
    pub(crate) fn global(&self, index: GlobalIndex) -> &Global {
        let index = index.as_u32() as usize;
        match index.checked_sub(self.imported_globals.len()) {
            None => &self.imported_globals[index],
            Some(defined) => &self.globals[defined],
        }
    }
}
