use crate::execute::{ExecutionContext, ExecutionResult};
use crate::instance::Instance;
use crate::types::FuncType;
use crate::values::VMVal;
use core::fmt;
use std::rc::Rc;

/// The calling convention shared by host functions and re-entrant wasm
/// functions: the instance whose import is being called, the argument
/// values, and the execution context threading depth and ticks.
///
/// The core trusts the callee to respect the declared signature; the result
/// reports either a trap or the (optional) return value.
pub type HostFunc = Rc<dyn Fn(&Rc<Instance>, &[VMVal], &mut ExecutionContext) -> ExecutionResult>;

/// A function with its signature, used to represent both imported and
/// exported functions.
#[derive(Clone)]
pub struct ExternalFunction {
    pub function: HostFunc,
    pub ty: FuncType,
}

impl ExternalFunction {
    /// Wraps a host closure together with the signature it implements.
    pub fn wrap(
        ty: FuncType,
        function: impl Fn(&Rc<Instance>, &[VMVal], &mut ExecutionContext) -> ExecutionResult + 'static,
    ) -> Self {
        Self {
            function: Rc::new(function),
            ty,
        }
    }

    /// Invokes the function on behalf of `caller`.
    pub fn call(
        &self,
        caller: &Rc<Instance>,
        args: &[VMVal],
        ctx: &mut ExecutionContext,
    ) -> ExecutionResult {
        (self.function)(caller, args, ctx)
    }
}

impl fmt::Debug for ExternalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalFunction")
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}
