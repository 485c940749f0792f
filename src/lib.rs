//! An embeddable interpreter for WebAssembly 1.0 binary modules.
//!
//! The pipeline is `parse` (binary to typed [`Module`]) then [`instantiate`]
//! (import resolution and runtime state allocation) then [`execute`] (a
//! stack-machine interpreter over pre-decoded instruction streams). Function
//! bodies are fully validated during parsing, so every [`Module`] this crate
//! hands out is safe to run.

mod code;
mod const_eval;
mod errors;
mod execute;
mod float;
mod func;
mod global;
mod indices;
mod instance;
mod instantiate;
mod linker;
mod memory;
mod module;
mod parse;
mod table;
mod trap;
mod types;
mod validate;
mod values;

pub use errors::Error;
pub type Result<T> = core::result::Result<T, Error>;

pub use execute::{execute, ExecutionContext, ExecutionResult};
pub use func::{ExternalFunction, HostFunc};
pub use global::Global;
pub use indices::{FuncIndex, GlobalIndex, MemoryIndex, TableIndex, TypeIndex};
pub use instance::Instance;
pub use instantiate::{
    find_exported_function, find_exported_function_index, find_exported_global,
    find_exported_memory, find_exported_table, instantiate,
};
pub use linker::{
    resolve_imported_functions, resolve_imported_globals, ImportedFunction, ImportedGlobal,
};
pub use memory::{ExternalMemory, Memory};
pub use module::Module;
pub use table::{ExternalTable, FuncRef, Table};
pub use trap::Trap;
pub use types::{
    EntityIndex, EntityType, FuncType, GlobalType, Import, Limits, MemoryType, TableType, ValType,
};
pub use values::{VMVal, Val};

/// WebAssembly page sizes are defined to be 64KiB.
pub const WASM_PAGE_SIZE: u32 = 0x10000;

/// The number of pages a 32-bit linear memory can have before running out of
/// byte index space.
pub const MAX_WASM_PAGES: u32 = 1 << 16;

/// The maximum call depth of nested `execute` activations. Entering a call at
/// this depth traps with [`Trap::CallStackExhausted`].
pub const CALL_STACK_LIMIT: u32 = 2048;

/// The default hard limit for memory growth, in pages (16 MiB).
pub const DEFAULT_MEMORY_PAGES_LIMIT: u32 = 256;

/// Error messages are truncated to this many bytes so they fit fixed-size
/// error carriers in embedders.
pub const MAX_ERROR_MESSAGE_LEN: usize = 256;

/// Parses and validates a WebAssembly binary module.
pub fn parse(bytes: &[u8]) -> Result<Module> {
    Module::from_bytes(bytes)
}

/// Checks whether `bytes` is a well-formed, valid WebAssembly binary module.
///
/// `validate` accepts exactly the inputs [`parse`] accepts.
pub fn validate(bytes: &[u8]) -> Result<()> {
    Module::from_bytes(bytes).map(drop)
}
