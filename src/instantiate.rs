//! Module instantiation: import matching, allocation of the mutable runtime
//! state, segment initialization, and the start-function invocation.

use crate::const_eval::eval_constant_expression;
use crate::errors::Error;
use crate::execute::{execute, ExecutionContext};
use crate::func::ExternalFunction;
use crate::global::Global;
use crate::indices::{FuncIndex, GlobalIndex};
use crate::instance::Instance;
use crate::memory::{ExternalMemory, Memory};
use crate::module::Module;
use crate::table::{ExternalTable, FuncRef, Table};
use crate::types::{EntityIndex, Limits};
use crate::{MAX_WASM_PAGES, WASM_PAGE_SIZE};
use std::rc::Rc;

fn match_limits(external: &Limits, declared: &Limits) -> crate::Result<()> {
    if external.min < declared.min {
        return Err(Error::instantiation(
            "provided import's min is below import's min defined in module",
        ));
    }
    let Some(declared_max) = declared.max else {
        return Ok(());
    };
    if external.max.is_some_and(|max| max <= declared_max) {
        return Ok(());
    }
    Err(Error::instantiation(
        "provided import's max is above import's max defined in module",
    ))
}

fn match_imported_functions(
    module: &Module,
    imported_functions: &[ExternalFunction],
) -> crate::Result<()> {
    let required = module.inner().imported_function_types();
    if required.len() != imported_functions.len() {
        return Err(Error::instantiation(format!(
            "module requires {} imported functions, {} provided",
            required.len(),
            imported_functions.len()
        )));
    }
    for (i, (required, provided)) in required.zip(imported_functions).enumerate() {
        if *required != provided.ty {
            return Err(Error::instantiation(format!(
                "function {i} type doesn't match module's imported function type"
            )));
        }
    }
    Ok(())
}

fn match_imported_table(module: &Module, imported: Option<&ExternalTable>) -> crate::Result<()> {
    let Some(declared) = module.inner().imported_table() else {
        if imported.is_some() {
            return Err(Error::instantiation(
                "trying to provide imported table to a module that doesn't define one",
            ));
        }
        return Ok(());
    };
    let Some(imported) = imported else {
        return Err(Error::instantiation(
            "module defines an imported table but none was provided",
        ));
    };
    match_limits(&imported.limits, &declared.limits)?;

    let size = imported.table.size();
    let fits = size >= imported.limits.min
        && imported.limits.max.is_none_or(|max| size <= max);
    if !fits {
        return Err(Error::instantiation(
            "provided imported table doesn't fit provided limits",
        ));
    }
    Ok(())
}

fn match_imported_memory(module: &Module, imported: Option<&ExternalMemory>) -> crate::Result<()> {
    let Some(declared) = module.inner().imported_memory() else {
        if imported.is_some() {
            return Err(Error::instantiation(
                "trying to provide imported memory to a module that doesn't define one",
            ));
        }
        return Ok(());
    };
    let Some(imported) = imported else {
        return Err(Error::instantiation(
            "module defines an imported memory but none was provided",
        ));
    };
    match_limits(&imported.limits, &declared.limits)?;

    let size = imported.memory.size_in_bytes() as u64;
    let page = u64::from(WASM_PAGE_SIZE);
    let fits = size >= u64::from(imported.limits.min) * page
        && imported
            .limits
            .max
            .is_none_or(|max| size <= u64::from(max) * page);
    if !fits {
        return Err(Error::instantiation(
            "provided imported memory doesn't fit provided limits",
        ));
    }
    Ok(())
}

fn match_imported_globals(module: &Module, imported_globals: &[Global]) -> crate::Result<()> {
    let required = module.inner().imported_global_types();
    if required.len() != imported_globals.len() {
        return Err(Error::instantiation(format!(
            "module requires {} imported globals, {} provided",
            required.len(),
            imported_globals.len()
        )));
    }
    for (i, (required, provided)) in required.zip(imported_globals).enumerate() {
        if required.content != provided.ty().content {
            return Err(Error::instantiation(format!(
                "global {i} value type doesn't match module's global type"
            )));
        }
        if required.mutable != provided.ty().mutable {
            return Err(Error::instantiation(format!(
                "global {i} mutability doesn't match module's global mutability"
            )));
        }
    }
    Ok(())
}

fn allocate_table(
    module: &Module,
    imported: Option<&ExternalTable>,
) -> (Option<Table>, Limits) {
    if let Some(declared) = module.inner().defined_table() {
        (Some(Table::new(declared.limits.min)), declared.limits)
    } else if let Some(imported) = imported {
        (Some(imported.table.clone()), imported.limits)
    } else {
        (None, Limits::default())
    }
}

fn allocate_memory(
    module: &Module,
    imported: Option<&ExternalMemory>,
    memory_pages_limit: u32,
) -> crate::Result<(Option<Memory>, Limits)> {
    let check_ceiling = |limits: &Limits, what: &str| {
        if limits.min > memory_pages_limit
            || limits.max.is_some_and(|max| max > memory_pages_limit)
        {
            return Err(Error::instantiation(format!(
                "{what} cannot exceed hard memory limit of {} bytes",
                u64::from(memory_pages_limit) * u64::from(WASM_PAGE_SIZE)
            )));
        }
        Ok(())
    };

    if let Some(declared) = module.inner().defined_memory() {
        check_ceiling(&declared.limits, "memory")?;
        Ok((Some(Memory::new(declared.limits.min)), declared.limits))
    } else if let Some(imported) = imported {
        check_ceiling(&imported.limits, "imported memory limits")?;
        Ok((Some(imported.memory.clone()), imported.limits))
    } else {
        Ok((None, Limits::default()))
    }
}

/// Instantiates a validated module.
///
/// Import lists must be in the module's import order; use
/// [`resolve_imported_functions`](crate::resolve_imported_functions) and
/// [`resolve_imported_globals`](crate::resolve_imported_globals) to build
/// them from a named registry. `memory_pages_limit` is the host-imposed hard
/// ceiling for memory growth; the effective runtime limit is the smaller of
/// it and the module's declared maximum.
pub fn instantiate(
    module: Module,
    imported_functions: Vec<ExternalFunction>,
    imported_table: Option<ExternalTable>,
    imported_memory: Option<ExternalMemory>,
    imported_globals: Vec<Global>,
    memory_pages_limit: u32,
) -> crate::Result<Rc<Instance>> {
    if memory_pages_limit > MAX_WASM_PAGES {
        return Err(Error::instantiation(
            "hard memory limit cannot exceed 65536 pages",
        ));
    }

    match_imported_functions(&module, &imported_functions)?;
    match_imported_table(&module, imported_table.as_ref())?;
    match_imported_memory(&module, imported_memory.as_ref())?;
    match_imported_globals(&module, &imported_globals)?;

    // Initialize globals. Validation restricts global.get in initializers to
    // imported globals, so evaluating in definition order always sees every
    // cell it needs.
    let inner = module.inner();
    let mut globals = Vec::with_capacity(inner.global_initializers.len());
    for (defined, init) in inner.global_initializers.iter() {
        let ty = inner.globals
            [GlobalIndex::from_u32(defined.as_u32() + inner.num_imported_globals as u32)];
        let value = eval_constant_expression(init, &imported_globals, &globals);
        globals.push(Global::new(value, ty));
    }

    let (table, table_limits) = allocate_table(&module, imported_table.as_ref());
    let (memory, memory_limits) =
        allocate_memory(&module, imported_memory.as_ref(), memory_pages_limit)?;

    // When the memory declares an upper limit, growth stops there rather
    // than at the host ceiling; allocate_memory already ensured it is below
    // the ceiling.
    let memory_pages_limit = memory_limits.max.unwrap_or(memory_pages_limit);

    // Check that every data and element segment is within bounds before the
    // first write, so a failed instantiation leaves imported state untouched.
    // Offsets are validated to be i32 but the addition could overflow 32
    // bits, so it is done in 64.
    let memory_size = memory.as_ref().map_or(0, |m| m.size_in_bytes() as u64);
    let mut data_offsets = Vec::with_capacity(inner.data.len());
    for segment in &inner.data {
        let offset =
            u64::from(eval_constant_expression(&segment.offset, &imported_globals, &globals).get_u32());
        if offset + segment.init.len() as u64 > memory_size {
            return Err(Error::instantiation("data segment is out of memory bounds"));
        }
        data_offsets.push(offset);
    }

    let table_size = table.as_ref().map_or(0, |t| u64::from(t.size()));
    let mut element_offsets = Vec::with_capacity(inner.elements.len());
    for segment in &inner.elements {
        let offset =
            u64::from(eval_constant_expression(&segment.offset, &imported_globals, &globals).get_u32());
        if offset + segment.init.len() as u64 > table_size {
            return Err(Error::instantiation(
                "element segment is out of table bounds",
            ));
        }
        element_offsets.push(offset);
    }

    // Later segments may overlap and overwrite earlier ones.
    if let Some(memory) = &memory {
        let mut data = memory.data_mut();
        for (segment, &offset) in inner.data.iter().zip(&data_offsets) {
            let start = offset as usize;
            data[start..start + segment.init.len()].copy_from_slice(&segment.init);
        }
    }

    // The instance has to exist before the table is filled, because table
    // elements carry a back-reference to it.
    let instance = Rc::new(Instance {
        module,
        memory,
        memory_limits,
        memory_pages_limit,
        table,
        table_limits,
        globals,
        imported_functions,
        imported_globals,
    });
    let inner = instance.module.inner();

    if !inner.elements.is_empty() {
        let table = instance.table().expect("element segments imply a table");
        let mut elements = table.elements_mut();
        for (segment, &offset) in inner.elements.iter().zip(&element_offsets) {
            for (i, &func) in segment.init.iter().enumerate() {
                elements[offset as usize + i] = Some(FuncRef {
                    instance: Rc::downgrade(&instance),
                    func_idx: func,
                    anchor: None,
                });
            }
        }
    }

    if let Some(start) = instance.module.start() {
        tracing::debug!(func = start.as_u32(), "invoking start function");
        let mut ctx = ExecutionContext::new();
        if execute(&instance, start, &[], &mut ctx).trapped() {
            // Writes to an imported table are not rolled back, so the table
            // now references this instance even though instantiation failed.
            // Anchor shared ownership in each written slot; the orphan is
            // freed once every referring slot has been overwritten.
            if imported_table.is_some() && !inner.elements.is_empty() {
                let table = instance.table().expect("element segments imply a table");
                let mut elements = table.elements_mut();
                for (segment, &offset) in inner.elements.iter().zip(&element_offsets) {
                    for i in 0..segment.init.len() {
                        if let Some(func_ref) = &mut elements[offset as usize + i] {
                            func_ref.anchor = Some(Rc::clone(&instance));
                        }
                    }
                }
            }
            return Err(Error::instantiation("start function failed to execute"));
        }
    }

    tracing::debug!("module instantiated");
    Ok(instance)
}

/// Finds an exported function index by name without instantiating.
pub fn find_exported_function_index(module: &Module, name: &str) -> Option<FuncIndex> {
    match module.get_export(name)? {
        EntityIndex::Function(func) => Some(func),
        _ => None,
    }
}

/// Finds an exported function by name.
///
/// The returned [`ExternalFunction`] re-enters the interpreter on the
/// defining instance, so it can be passed straight to [`instantiate`] as
/// another module's import.
pub fn find_exported_function(instance: &Rc<Instance>, name: &str) -> Option<ExternalFunction> {
    let EntityIndex::Function(func) = instance.module().get_export(name)? else {
        return None;
    };
    let ty = instance.func_type(func).clone();
    let target = Rc::clone(instance);
    Some(ExternalFunction::wrap(ty, move |_caller, args, ctx| {
        execute(&target, func, args, ctx)
    }))
}

/// Finds an exported global by name. Reexported imports resolve to the
/// original backing cell.
pub fn find_exported_global(instance: &Rc<Instance>, name: &str) -> Option<Global> {
    let EntityIndex::Global(global) = instance.module().get_export(name)? else {
        return None;
    };
    Some(instance.global(global).clone())
}

/// Finds the exported table by name.
pub fn find_exported_table(instance: &Rc<Instance>, name: &str) -> Option<ExternalTable> {
    let EntityIndex::Table(_) = instance.module().get_export(name)? else {
        return None;
    };
    Some(ExternalTable {
        table: instance.table()?.clone(),
        limits: instance.table_limits,
    })
}

/// Finds the exported memory by name.
pub fn find_exported_memory(instance: &Rc<Instance>, name: &str) -> Option<ExternalMemory> {
    let EntityIndex::Memory(_) = instance.module().get_export(name)? else {
        return None;
    };
    Some(ExternalMemory {
        memory: instance.memory()?.clone(),
        limits: instance.memory_limits,
    })
}
