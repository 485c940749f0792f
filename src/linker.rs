//! Name-based import resolution: matches a caller-supplied registry of host
//! functions and global cells against a module's import sequence, producing
//! the ordered lists [`instantiate`](crate::instantiate) consumes.

use crate::errors::Error;
use crate::func::{ExternalFunction, HostFunc};
use crate::global::Global;
use crate::module::Module;
use crate::types::{EntityType, ValType};
use hashbrown::HashMap;
use std::rc::Rc;

/// A host function offered for import, identified by module and item name.
/// Entries may be in any order; every function import the module declares
/// must be covered.
pub struct ImportedFunction {
    pub module: String,
    pub name: String,
    /// Parameter types of the function.
    pub inputs: Vec<ValType>,
    /// Result type, or `None` for a void function.
    pub output: Option<ValType>,
    pub function: HostFunc,
}

/// Builds the ordered imported-function list for [`instantiate`],
/// checking that each import resolves and that the signatures agree.
///
/// [`instantiate`]: crate::instantiate
pub fn resolve_imported_functions(
    module: &Module,
    imported_functions: &[ImportedFunction],
) -> crate::Result<Vec<ExternalFunction>> {
    let registry: HashMap<(&str, &str), &ImportedFunction> = imported_functions
        .iter()
        .map(|func| ((func.module.as_str(), func.name.as_str()), func))
        .collect();

    let mut external_functions = Vec::new();
    for import in module.imports() {
        let EntityType::Function(type_index) = import.ty else {
            continue;
        };
        let func_ty = &module.inner().types[type_index];

        let Some(provided) = registry.get(&(import.module.as_str(), import.name.as_str()))
        else {
            return Err(Error::instantiation(format!(
                "imported function {}.{} is required",
                import.module, import.name
            )));
        };

        if provided.inputs[..] != func_ty.params[..] {
            return Err(Error::instantiation(format!(
                "function {}.{} input types don't match imported function in module",
                import.module, import.name
            )));
        }
        match (func_ty.results.first(), provided.output) {
            (None, Some(_)) => {
                return Err(Error::instantiation(format!(
                    "function {}.{} has output but is defined void in module",
                    import.module, import.name
                )));
            }
            (Some(&result), output) if output != Some(result) => {
                return Err(Error::instantiation(format!(
                    "function {}.{} output type doesn't match imported function in module",
                    import.module, import.name
                )));
            }
            _ => {}
        }

        external_functions.push(ExternalFunction {
            function: Rc::clone(&provided.function),
            ty: func_ty.clone(),
        });
    }
    Ok(external_functions)
}

/// A global cell offered for import, identified by module and item name.
pub struct ImportedGlobal {
    pub module: String,
    pub name: String,
    pub global: Global,
}

/// Builds the ordered imported-global list for [`instantiate`], checking
/// that each import resolves and that value type and mutability agree.
///
/// [`instantiate`]: crate::instantiate
pub fn resolve_imported_globals(
    module: &Module,
    imported_globals: &[ImportedGlobal],
) -> crate::Result<Vec<Global>> {
    let registry: HashMap<(&str, &str), &ImportedGlobal> = imported_globals
        .iter()
        .map(|global| ((global.module.as_str(), global.name.as_str()), global))
        .collect();

    let mut globals = Vec::new();
    for import in module.imports() {
        let EntityType::Global(ty) = import.ty else {
            continue;
        };

        let Some(provided) = registry.get(&(import.module.as_str(), import.name.as_str()))
        else {
            return Err(Error::instantiation(format!(
                "imported global {}.{} is required",
                import.module, import.name
            )));
        };

        if provided.global.ty().content != ty.content {
            return Err(Error::instantiation(format!(
                "global {}.{} value type doesn't match imported global in module",
                import.module, import.name
            )));
        }
        if provided.global.ty().mutable != ty.mutable {
            return Err(Error::instantiation(format!(
                "global {}.{} mutability doesn't match imported global in module",
                import.module, import.name
            )));
        }

        globals.push(provided.global.clone());
    }
    Ok(globals)
}
