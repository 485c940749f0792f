//! The stack-machine interpreter.
//!
//! Execution is single-threaded, synchronous and recursive over call
//! boundaries: one operand stack and one locals region per activation,
//! pre-sized from the heights the validator computed. Host functions are
//! invoked synchronously and may re-enter the interpreter.

use crate::code::{BranchTarget, Code, Instr};
use crate::float;
use crate::indices::FuncIndex;
use crate::instance::Instance;
use crate::trap::Trap;
use crate::values::VMVal;
use crate::CALL_STACK_LIMIT;
use std::rc::Rc;

/// The outcome of one `execute` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Normal return of a single-result function.
    Value(VMVal),
    /// Normal return of a void function.
    Void,
    /// The guest trapped. The instance is not poisoned: state reflects every
    /// write that happened before the trap, and further exports may be
    /// invoked.
    Trap(Trap),
}

impl ExecutionResult {
    pub fn trapped(&self) -> bool {
        matches!(self, Self::Trap(_))
    }

    pub fn value(&self) -> Option<VMVal> {
        match self {
            Self::Value(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<Trap> for ExecutionResult {
    fn from(trap: Trap) -> Self {
        Self::Trap(trap)
    }
}

impl From<VMVal> for ExecutionResult {
    fn from(value: VMVal) -> Self {
        Self::Value(value)
    }
}

/// State shared by all calls in one execution "thread": the call depth, and
/// an optional tick budget for cooperative cancellation.
///
/// Entering a call at depth [`CALL_STACK_LIMIT`] traps; the depth is held
/// incremented for the duration of each activation and restored on the way
/// out, trap or not. A metered context debits 2 ticks per call on entry (one
/// for entry, one for exit of the current frame) and traps once fewer than 2
/// remain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionContext {
    pub depth: u32,
    pub ticks: Option<i64>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_depth(depth: u32) -> Self {
        Self { depth, ticks: None }
    }

    pub fn metered(depth: u32, ticks: i64) -> Self {
        Self {
            depth,
            ticks: Some(ticks),
        }
    }
}

/// Invokes a function of an instance with the given arguments.
///
/// Argument types must match the function's signature; the caller is
/// responsible, the core does not check.
pub fn execute(
    instance: &Rc<Instance>,
    func: FuncIndex,
    args: &[VMVal],
    ctx: &mut ExecutionContext,
) -> ExecutionResult {
    if ctx.depth >= CALL_STACK_LIMIT {
        return Trap::CallStackExhausted.into();
    }
    if let Some(ticks) = ctx.ticks.as_mut() {
        if *ticks < 2 {
            return Trap::TicksExhausted.into();
        }
        *ticks -= 2;
    }

    let module = instance.module.inner();
    let index = func.as_u32() as usize;
    if index < module.num_imported_functions {
        return instance.imported_functions[index].call(instance, args, ctx);
    }

    let defined = module
        .defined_func_index(func)
        .expect("function index space covers imports and definitions");
    let code = &module.code[defined];
    let has_result = !module.func_type(func).results.is_empty();

    ctx.depth += 1;
    let result = run(instance, code, args, has_result, ctx);
    ctx.depth -= 1;

    match result {
        Ok(Some(value)) => ExecutionResult::Value(value),
        Ok(None) => ExecutionResult::Void,
        Err(trap) => {
            tracing::trace!(%trap, "execution trapped");
            trap.into()
        }
    }
}

fn pop(stack: &mut Vec<VMVal>) -> VMVal {
    stack.pop().expect("operand stack underflow is prevented by validation")
}

fn top(stack: &[VMVal]) -> VMVal {
    *stack.last().expect("operand stack underflow is prevented by validation")
}

/// Unwinds the operand stack as computed at validation and returns the new
/// program counter.
fn take_branch(stack: &mut Vec<VMVal>, target: &BranchTarget) -> usize {
    if target.keep {
        let kept = top(stack);
        stack.truncate(stack.len() - 1 - target.drop as usize);
        stack.push(kept);
    } else {
        stack.truncate(stack.len() - target.drop as usize);
    }
    target.pc as usize
}

fn i32_div_s(lhs: i32, rhs: i32) -> Result<i32, Trap> {
    if rhs == 0 {
        return Err(Trap::IntegerDivisionByZero);
    }
    lhs.checked_div(rhs).ok_or(Trap::IntegerOverflow)
}

fn i32_rem_s(lhs: i32, rhs: i32) -> Result<i32, Trap> {
    if rhs == 0 {
        return Err(Trap::IntegerDivisionByZero);
    }
    // INT_MIN % -1 is 0, not an overflow.
    Ok(lhs.wrapping_rem(rhs))
}

fn u32_div(lhs: u32, rhs: u32) -> Result<u32, Trap> {
    if rhs == 0 {
        return Err(Trap::IntegerDivisionByZero);
    }
    Ok(lhs / rhs)
}

fn u32_rem(lhs: u32, rhs: u32) -> Result<u32, Trap> {
    if rhs == 0 {
        return Err(Trap::IntegerDivisionByZero);
    }
    Ok(lhs % rhs)
}

fn i64_div_s(lhs: i64, rhs: i64) -> Result<i64, Trap> {
    if rhs == 0 {
        return Err(Trap::IntegerDivisionByZero);
    }
    lhs.checked_div(rhs).ok_or(Trap::IntegerOverflow)
}

fn i64_rem_s(lhs: i64, rhs: i64) -> Result<i64, Trap> {
    if rhs == 0 {
        return Err(Trap::IntegerDivisionByZero);
    }
    Ok(lhs.wrapping_rem(rhs))
}

fn u64_div(lhs: u64, rhs: u64) -> Result<u64, Trap> {
    if rhs == 0 {
        return Err(Trap::IntegerDivisionByZero);
    }
    Ok(lhs / rhs)
}

fn u64_rem(lhs: u64, rhs: u64) -> Result<u64, Trap> {
    if rhs == 0 {
        return Err(Trap::IntegerDivisionByZero);
    }
    Ok(lhs % rhs)
}

#[allow(clippy::too_many_lines)]
fn run(
    instance: &Rc<Instance>,
    code: &Code,
    args: &[VMVal],
    has_result: bool,
    ctx: &mut ExecutionContext,
) -> Result<Option<VMVal>, Trap> {
    let module = instance.module.inner();

    // Locals are the arguments, zero-extended to cover the declarations.
    let mut locals = vec![VMVal::default(); args.len() + code.local_count as usize];
    locals[..args.len()].copy_from_slice(args);

    // Pre-sized so pushes within the validated height never reallocate.
    let mut stack: Vec<VMVal> = Vec::with_capacity(code.max_stack_height as usize);
    let memory = instance.memory.as_ref();
    let mut pc = 0usize;

    macro_rules! tri {
        ($expr:expr) => {
            match $expr {
                Ok(value) => value,
                Err(trap) => return Err(trap),
            }
        };
    }

    macro_rules! mem {
        () => {
            memory.expect("memory presence is validated")
        };
    }

    macro_rules! unary {
        ($get:ident, $op:expr) => {{
            let value = pop(&mut stack).$get();
            stack.push(VMVal::from(($op)(value)));
        }};
    }

    macro_rules! unary_trap {
        ($get:ident, $op:expr) => {{
            let value = pop(&mut stack).$get();
            stack.push(VMVal::from(tri!(($op)(value))));
        }};
    }

    macro_rules! binary {
        ($get:ident, $op:expr) => {{
            let rhs = pop(&mut stack).$get();
            let lhs = pop(&mut stack).$get();
            stack.push(VMVal::from(($op)(lhs, rhs)));
        }};
    }

    macro_rules! binary_trap {
        ($get:ident, $op:expr) => {{
            let rhs = pop(&mut stack).$get();
            let lhs = pop(&mut stack).$get();
            stack.push(VMVal::from(tri!(($op)(lhs, rhs))));
        }};
    }

    macro_rules! compare {
        ($get:ident, $op:expr) => {{
            let rhs = pop(&mut stack).$get();
            let lhs = pop(&mut stack).$get();
            stack.push(VMVal::u32(u32::from(($op)(lhs, rhs))));
        }};
    }

    macro_rules! call_result {
        ($result:expr, $split:expr) => {{
            let result = $result;
            stack.truncate($split);
            match result {
                ExecutionResult::Value(value) => stack.push(value),
                ExecutionResult::Void => {}
                ExecutionResult::Trap(trap) => return Err(trap),
            }
        }};
    }

    loop {
        let instr = &code.instrs[pc];
        pc += 1;
        match instr {
            Instr::Unreachable => return Err(Trap::UnreachableCodeReached),
            Instr::Nop => {}
            Instr::If { else_pc } => {
                if pop(&mut stack).get_u32() == 0 {
                    pc = *else_pc as usize;
                }
            }
            Instr::Else { end_pc } => pc = *end_pc as usize,
            Instr::Br(target) => pc = take_branch(&mut stack, target),
            Instr::BrIf(target) => {
                if pop(&mut stack).get_u32() != 0 {
                    pc = take_branch(&mut stack, target);
                }
            }
            Instr::BrTable(targets) => {
                let index = (pop(&mut stack).get_u32() as usize).min(targets.len() - 1);
                pc = take_branch(&mut stack, &targets[index]);
            }
            Instr::Return => {
                return Ok(has_result.then(|| pop(&mut stack)));
            }
            Instr::Call(func) => {
                let callee = *func;
                let params = module.func_type(callee).params.len();
                let split = stack.len() - params;
                call_result!(execute(instance, callee, &stack[split..], ctx), split);
            }
            Instr::CallIndirect(type_index) => {
                let expected = &module.types[*type_index];
                let slot = pop(&mut stack).get_u32();
                let table = instance.table().expect("table presence is validated");
                let Some(element) = table.get(slot) else {
                    return Err(Trap::TableOutOfBounds);
                };
                let Some(func_ref) = element else {
                    return Err(Trap::IndirectCallToNull);
                };
                let Some(callee_instance) = func_ref.instance.upgrade() else {
                    return Err(Trap::IndirectCallToNull);
                };
                let callee_ty = callee_instance.func_type(func_ref.func_idx);
                if callee_ty != expected {
                    return Err(Trap::BadSignature);
                }
                let params = callee_ty.params.len();
                let split = stack.len() - params;
                call_result!(
                    execute(&callee_instance, func_ref.func_idx, &stack[split..], ctx),
                    split
                );
            }

            Instr::Drop => {
                pop(&mut stack);
            }
            Instr::Select => {
                let cond = pop(&mut stack).get_u32();
                let v2 = pop(&mut stack);
                let v1 = pop(&mut stack);
                stack.push(if cond != 0 { v1 } else { v2 });
            }

            Instr::LocalGet(index) => stack.push(locals[*index as usize]),
            Instr::LocalSet(index) => locals[*index as usize] = pop(&mut stack),
            Instr::LocalTee(index) => locals[*index as usize] = top(&stack),
            Instr::GlobalGet(index) => stack.push(instance.global(*index).get()),
            Instr::GlobalSet(index) => instance.global(*index).set(pop(&mut stack)),

            Instr::I32Load { offset } => {
                let addr = pop(&mut stack).get_u32();
                let bytes = tri!(mem!().load::<4>(addr, *offset));
                stack.push(VMVal::u32(u32::from_le_bytes(bytes)));
            }
            Instr::I64Load { offset } => {
                let addr = pop(&mut stack).get_u32();
                let bytes = tri!(mem!().load::<8>(addr, *offset));
                stack.push(VMVal::u64(u64::from_le_bytes(bytes)));
            }
            Instr::F32Load { offset } => {
                let addr = pop(&mut stack).get_u32();
                let bytes = tri!(mem!().load::<4>(addr, *offset));
                stack.push(VMVal::u32(u32::from_le_bytes(bytes)));
            }
            Instr::F64Load { offset } => {
                let addr = pop(&mut stack).get_u32();
                let bytes = tri!(mem!().load::<8>(addr, *offset));
                stack.push(VMVal::u64(u64::from_le_bytes(bytes)));
            }
            Instr::I32Load8S { offset } => {
                let addr = pop(&mut stack).get_u32();
                let [byte] = tri!(mem!().load::<1>(addr, *offset));
                stack.push(VMVal::i32(i32::from(byte as i8)));
            }
            Instr::I32Load8U { offset } => {
                let addr = pop(&mut stack).get_u32();
                let [byte] = tri!(mem!().load::<1>(addr, *offset));
                stack.push(VMVal::u32(u32::from(byte)));
            }
            Instr::I32Load16S { offset } => {
                let addr = pop(&mut stack).get_u32();
                let bytes = tri!(mem!().load::<2>(addr, *offset));
                stack.push(VMVal::i32(i32::from(i16::from_le_bytes(bytes))));
            }
            Instr::I32Load16U { offset } => {
                let addr = pop(&mut stack).get_u32();
                let bytes = tri!(mem!().load::<2>(addr, *offset));
                stack.push(VMVal::u32(u32::from(u16::from_le_bytes(bytes))));
            }
            Instr::I64Load8S { offset } => {
                let addr = pop(&mut stack).get_u32();
                let [byte] = tri!(mem!().load::<1>(addr, *offset));
                stack.push(VMVal::i64(i64::from(byte as i8)));
            }
            Instr::I64Load8U { offset } => {
                let addr = pop(&mut stack).get_u32();
                let [byte] = tri!(mem!().load::<1>(addr, *offset));
                stack.push(VMVal::u64(u64::from(byte)));
            }
            Instr::I64Load16S { offset } => {
                let addr = pop(&mut stack).get_u32();
                let bytes = tri!(mem!().load::<2>(addr, *offset));
                stack.push(VMVal::i64(i64::from(i16::from_le_bytes(bytes))));
            }
            Instr::I64Load16U { offset } => {
                let addr = pop(&mut stack).get_u32();
                let bytes = tri!(mem!().load::<2>(addr, *offset));
                stack.push(VMVal::u64(u64::from(u16::from_le_bytes(bytes))));
            }
            Instr::I64Load32S { offset } => {
                let addr = pop(&mut stack).get_u32();
                let bytes = tri!(mem!().load::<4>(addr, *offset));
                stack.push(VMVal::i64(i64::from(i32::from_le_bytes(bytes))));
            }
            Instr::I64Load32U { offset } => {
                let addr = pop(&mut stack).get_u32();
                let bytes = tri!(mem!().load::<4>(addr, *offset));
                stack.push(VMVal::u64(u64::from(u32::from_le_bytes(bytes))));
            }

            Instr::I32Store { offset } => {
                let value = pop(&mut stack).get_u32();
                let addr = pop(&mut stack).get_u32();
                tri!(mem!().store(addr, *offset, value.to_le_bytes()));
            }
            Instr::I64Store { offset } => {
                let value = pop(&mut stack).get_u64();
                let addr = pop(&mut stack).get_u32();
                tri!(mem!().store(addr, *offset, value.to_le_bytes()));
            }
            Instr::F32Store { offset } => {
                let value = pop(&mut stack).get_u32();
                let addr = pop(&mut stack).get_u32();
                tri!(mem!().store(addr, *offset, value.to_le_bytes()));
            }
            Instr::F64Store { offset } => {
                let value = pop(&mut stack).get_u64();
                let addr = pop(&mut stack).get_u32();
                tri!(mem!().store(addr, *offset, value.to_le_bytes()));
            }
            Instr::I32Store8 { offset } => {
                let value = pop(&mut stack).get_u32();
                let addr = pop(&mut stack).get_u32();
                tri!(mem!().store(addr, *offset, [value as u8]));
            }
            Instr::I32Store16 { offset } => {
                let value = pop(&mut stack).get_u32();
                let addr = pop(&mut stack).get_u32();
                tri!(mem!().store(addr, *offset, (value as u16).to_le_bytes()));
            }
            Instr::I64Store8 { offset } => {
                let value = pop(&mut stack).get_u64();
                let addr = pop(&mut stack).get_u32();
                tri!(mem!().store(addr, *offset, [value as u8]));
            }
            Instr::I64Store16 { offset } => {
                let value = pop(&mut stack).get_u64();
                let addr = pop(&mut stack).get_u32();
                tri!(mem!().store(addr, *offset, (value as u16).to_le_bytes()));
            }
            Instr::I64Store32 { offset } => {
                let value = pop(&mut stack).get_u64();
                let addr = pop(&mut stack).get_u32();
                tri!(mem!().store(addr, *offset, (value as u32).to_le_bytes()));
            }
            Instr::MemorySize => stack.push(VMVal::u32(mem!().size_in_pages())),
            Instr::MemoryGrow => {
                let delta = pop(&mut stack).get_u32();
                match mem!().grow(delta, instance.memory_pages_limit) {
                    Some(old_pages) => stack.push(VMVal::u32(old_pages)),
                    None => stack.push(VMVal::i32(-1)),
                }
            }

            Instr::I32Const(value) => stack.push(VMVal::i32(*value)),
            Instr::I64Const(value) => stack.push(VMVal::i64(*value)),
            Instr::F32Const(bits) => stack.push(VMVal::u32(*bits)),
            Instr::F64Const(bits) => stack.push(VMVal::u64(*bits)),

            Instr::I32Eqz => {
                let value = pop(&mut stack).get_u32();
                stack.push(VMVal::u32(u32::from(value == 0)));
            }
            Instr::I32Eq => compare!(get_u32, |a, b| a == b),
            Instr::I32Ne => compare!(get_u32, |a, b| a != b),
            Instr::I32LtS => compare!(get_i32, |a, b| a < b),
            Instr::I32LtU => compare!(get_u32, |a, b| a < b),
            Instr::I32GtS => compare!(get_i32, |a, b| a > b),
            Instr::I32GtU => compare!(get_u32, |a, b| a > b),
            Instr::I32LeS => compare!(get_i32, |a, b| a <= b),
            Instr::I32LeU => compare!(get_u32, |a, b| a <= b),
            Instr::I32GeS => compare!(get_i32, |a, b| a >= b),
            Instr::I32GeU => compare!(get_u32, |a, b| a >= b),
            Instr::I64Eqz => {
                let value = pop(&mut stack).get_u64();
                stack.push(VMVal::u32(u32::from(value == 0)));
            }
            Instr::I64Eq => compare!(get_u64, |a, b| a == b),
            Instr::I64Ne => compare!(get_u64, |a, b| a != b),
            Instr::I64LtS => compare!(get_i64, |a, b| a < b),
            Instr::I64LtU => compare!(get_u64, |a, b| a < b),
            Instr::I64GtS => compare!(get_i64, |a, b| a > b),
            Instr::I64GtU => compare!(get_u64, |a, b| a > b),
            Instr::I64LeS => compare!(get_i64, |a, b| a <= b),
            Instr::I64LeU => compare!(get_u64, |a, b| a <= b),
            Instr::I64GeS => compare!(get_i64, |a, b| a >= b),
            Instr::I64GeU => compare!(get_u64, |a, b| a >= b),
            Instr::F32Eq => compare!(get_f32, |a, b| a == b),
            Instr::F32Ne => compare!(get_f32, |a, b| a != b),
            Instr::F32Lt => compare!(get_f32, |a, b| a < b),
            Instr::F32Gt => compare!(get_f32, |a, b| a > b),
            Instr::F32Le => compare!(get_f32, |a, b| a <= b),
            Instr::F32Ge => compare!(get_f32, |a, b| a >= b),
            Instr::F64Eq => compare!(get_f64, |a, b| a == b),
            Instr::F64Ne => compare!(get_f64, |a, b| a != b),
            Instr::F64Lt => compare!(get_f64, |a, b| a < b),
            Instr::F64Gt => compare!(get_f64, |a, b| a > b),
            Instr::F64Le => compare!(get_f64, |a, b| a <= b),
            Instr::F64Ge => compare!(get_f64, |a, b| a >= b),

            Instr::I32Clz => unary!(get_u32, |a: u32| a.leading_zeros()),
            Instr::I32Ctz => unary!(get_u32, |a: u32| a.trailing_zeros()),
            Instr::I32Popcnt => unary!(get_u32, |a: u32| a.count_ones()),
            Instr::I32Add => binary!(get_u32, |a: u32, b: u32| a.wrapping_add(b)),
            Instr::I32Sub => binary!(get_u32, |a: u32, b: u32| a.wrapping_sub(b)),
            Instr::I32Mul => binary!(get_u32, |a: u32, b: u32| a.wrapping_mul(b)),
            Instr::I32DivS => binary_trap!(get_i32, i32_div_s),
            Instr::I32DivU => binary_trap!(get_u32, u32_div),
            Instr::I32RemS => binary_trap!(get_i32, i32_rem_s),
            Instr::I32RemU => binary_trap!(get_u32, u32_rem),
            Instr::I32And => binary!(get_u32, |a: u32, b: u32| a & b),
            Instr::I32Or => binary!(get_u32, |a: u32, b: u32| a | b),
            Instr::I32Xor => binary!(get_u32, |a: u32, b: u32| a ^ b),
            Instr::I32Shl => binary!(get_u32, |a: u32, b: u32| a.wrapping_shl(b)),
            Instr::I32ShrS => binary!(get_i32, |a: i32, b: i32| a.wrapping_shr(b as u32)),
            Instr::I32ShrU => binary!(get_u32, |a: u32, b: u32| a.wrapping_shr(b)),
            Instr::I32Rotl => binary!(get_u32, |a: u32, b: u32| a.rotate_left(b % 32)),
            Instr::I32Rotr => binary!(get_u32, |a: u32, b: u32| a.rotate_right(b % 32)),
            Instr::I64Clz => unary!(get_u64, |a: u64| u64::from(a.leading_zeros())),
            Instr::I64Ctz => unary!(get_u64, |a: u64| u64::from(a.trailing_zeros())),
            Instr::I64Popcnt => unary!(get_u64, |a: u64| u64::from(a.count_ones())),
            Instr::I64Add => binary!(get_u64, |a: u64, b: u64| a.wrapping_add(b)),
            Instr::I64Sub => binary!(get_u64, |a: u64, b: u64| a.wrapping_sub(b)),
            Instr::I64Mul => binary!(get_u64, |a: u64, b: u64| a.wrapping_mul(b)),
            Instr::I64DivS => binary_trap!(get_i64, i64_div_s),
            Instr::I64DivU => binary_trap!(get_u64, u64_div),
            Instr::I64RemS => binary_trap!(get_i64, i64_rem_s),
            Instr::I64RemU => binary_trap!(get_u64, u64_rem),
            Instr::I64And => binary!(get_u64, |a: u64, b: u64| a & b),
            Instr::I64Or => binary!(get_u64, |a: u64, b: u64| a | b),
            Instr::I64Xor => binary!(get_u64, |a: u64, b: u64| a ^ b),
            Instr::I64Shl => binary!(get_u64, |a: u64, b: u64| a.wrapping_shl(b as u32)),
            Instr::I64ShrS => binary!(get_i64, |a: i64, b: i64| a.wrapping_shr(b as u32)),
            Instr::I64ShrU => binary!(get_u64, |a: u64, b: u64| a.wrapping_shr(b as u32)),
            Instr::I64Rotl => binary!(get_u64, |a: u64, b: u64| a.rotate_left((b % 64) as u32)),
            Instr::I64Rotr => binary!(get_u64, |a: u64, b: u64| a.rotate_right((b % 64) as u32)),

            Instr::F32Abs => unary!(get_f32, f32::abs),
            Instr::F32Neg => unary!(get_f32, |a: f32| -a),
            Instr::F32Ceil => unary!(get_f32, f32::ceil),
            Instr::F32Floor => unary!(get_f32, f32::floor),
            Instr::F32Trunc => unary!(get_f32, f32::trunc),
            Instr::F32Nearest => unary!(get_f32, f32::round_ties_even),
            Instr::F32Sqrt => unary!(get_f32, f32::sqrt),
            Instr::F32Add => binary!(get_f32, |a: f32, b: f32| a + b),
            Instr::F32Sub => binary!(get_f32, |a: f32, b: f32| a - b),
            Instr::F32Mul => binary!(get_f32, |a: f32, b: f32| a * b),
            Instr::F32Div => binary!(get_f32, |a: f32, b: f32| a / b),
            Instr::F32Min => binary!(get_f32, float::f32_min),
            Instr::F32Max => binary!(get_f32, float::f32_max),
            Instr::F32Copysign => binary!(get_f32, |a: f32, b: f32| a.copysign(b)),
            Instr::F64Abs => unary!(get_f64, f64::abs),
            Instr::F64Neg => unary!(get_f64, |a: f64| -a),
            Instr::F64Ceil => unary!(get_f64, f64::ceil),
            Instr::F64Floor => unary!(get_f64, f64::floor),
            Instr::F64Trunc => unary!(get_f64, f64::trunc),
            Instr::F64Nearest => unary!(get_f64, f64::round_ties_even),
            Instr::F64Sqrt => unary!(get_f64, f64::sqrt),
            Instr::F64Add => binary!(get_f64, |a: f64, b: f64| a + b),
            Instr::F64Sub => binary!(get_f64, |a: f64, b: f64| a - b),
            Instr::F64Mul => binary!(get_f64, |a: f64, b: f64| a * b),
            Instr::F64Div => binary!(get_f64, |a: f64, b: f64| a / b),
            Instr::F64Min => binary!(get_f64, float::f64_min),
            Instr::F64Max => binary!(get_f64, float::f64_max),
            Instr::F64Copysign => binary!(get_f64, |a: f64, b: f64| a.copysign(b)),

            Instr::I32WrapI64 => unary!(get_u64, |a: u64| a as u32),
            Instr::I32TruncF32S => unary_trap!(get_f32, float::i32_trunc_f32_s),
            Instr::I32TruncF32U => unary_trap!(get_f32, float::i32_trunc_f32_u),
            Instr::I32TruncF64S => unary_trap!(get_f64, float::i32_trunc_f64_s),
            Instr::I32TruncF64U => unary_trap!(get_f64, float::i32_trunc_f64_u),
            Instr::I64ExtendI32S => unary!(get_i32, i64::from),
            Instr::I64ExtendI32U => unary!(get_u32, u64::from),
            Instr::I64TruncF32S => unary_trap!(get_f32, float::i64_trunc_f32_s),
            Instr::I64TruncF32U => unary_trap!(get_f32, float::i64_trunc_f32_u),
            Instr::I64TruncF64S => unary_trap!(get_f64, float::i64_trunc_f64_s),
            Instr::I64TruncF64U => unary_trap!(get_f64, float::i64_trunc_f64_u),
            Instr::F32ConvertI32S => unary!(get_i32, |a: i32| a as f32),
            Instr::F32ConvertI32U => unary!(get_u32, |a: u32| a as f32),
            Instr::F32ConvertI64S => unary!(get_i64, |a: i64| a as f32),
            Instr::F32ConvertI64U => unary!(get_u64, |a: u64| a as f32),
            Instr::F32DemoteF64 => unary!(get_f64, |a: f64| a as f32),
            Instr::F64ConvertI32S => unary!(get_i32, |a: i32| f64::from(a)),
            Instr::F64ConvertI32U => unary!(get_u32, |a: u32| f64::from(a)),
            Instr::F64ConvertI64S => unary!(get_i64, |a: i64| a as f64),
            Instr::F64ConvertI64U => unary!(get_u64, |a: u64| a as f64),
            Instr::F64PromoteF32 => unary!(get_f32, f64::from),

            // The value cell is untyped raw bits, so reinterpretation is a
            // pure no-op that preserves NaN payloads exactly.
            Instr::I32ReinterpretF32
            | Instr::I64ReinterpretF64
            | Instr::F32ReinterpretI32
            | Instr::F64ReinterpretI64 => {}
        }
    }
}
