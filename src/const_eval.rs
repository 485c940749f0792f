use crate::global::Global;
use crate::types::ConstExpr;
use crate::values::VMVal;

/// Evaluates a constant expression against the imported globals and the
/// locally defined globals initialized so far.
///
/// Validation has already pinned the shape down: a typed literal, or a
/// `global.get` of an immutable imported global, so evaluation cannot fail.
pub(crate) fn eval_constant_expression(
    expr: &ConstExpr,
    imported_globals: &[Global],
    globals: &[Global],
) -> VMVal {
    match *expr {
        ConstExpr::Const { value, .. } => value,
        ConstExpr::GlobalGet(index) => {
            let index = index.as_u32() as usize;
            match index.checked_sub(imported_globals.len()) {
                None => imported_globals[index].get(),
                Some(defined) => globals[defined].get(),
            }
        }
    }
}
