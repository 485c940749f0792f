//! Linear memory semantics: loads, stores, bounds, and growth.

use anyhow::Result;
use weft::{
    execute, find_exported_memory, instantiate, ExecutionContext, ExecutionResult, FuncIndex,
    Instance, Trap, VMVal, DEFAULT_MEMORY_PAGES_LIMIT,
};

use std::rc::Rc;

fn instantiate_wat(wat: &str) -> Result<Rc<Instance>> {
    let module = weft::parse(&wat::parse_str(wat)?)?;
    Ok(instantiate(
        module,
        Vec::new(),
        None,
        None,
        Vec::new(),
        DEFAULT_MEMORY_PAGES_LIMIT,
    )?)
}

fn call(instance: &Rc<Instance>, func: u32, args: &[VMVal]) -> ExecutionResult {
    let mut ctx = ExecutionContext::new();
    execute(instance, FuncIndex::from_u32(func), args, &mut ctx)
}

const MODULE: &str = r#"(module
  (memory (export "mem") 1 2)
  (data (i32.const 1) "\11\22")
  (func (export "load") (param i32) (result i32)
    local.get 0
    i32.load)
  (func (export "store8") (param i32 i32)
    local.get 0
    local.get 1
    i32.store8)
  (func (export "grow") (param i32) (result i32)
    local.get 0
    memory.grow)
  (func (export "size") (result i32)
    memory.size))"#;

#[test_log::test]
fn data_segment_then_read_write_read() -> Result<()> {
    let instance = instantiate_wat(MODULE)?;

    assert_eq!(
        call(&instance, 0, &[VMVal::i32(0)]),
        ExecutionResult::Value(VMVal::u32(0x0022_1100))
    );

    assert!(!call(&instance, 1, &[VMVal::i32(0), VMVal::u32(0xaa)]).trapped());
    assert!(!call(&instance, 1, &[VMVal::i32(1), VMVal::u32(0xbb)]).trapped());
    assert_eq!(
        call(&instance, 0, &[VMVal::i32(0)]),
        ExecutionResult::Value(VMVal::u32(0x0022_bbaa))
    );
    Ok(())
}

#[test_log::test]
fn grow_and_size() -> Result<()> {
    let instance = instantiate_wat(MODULE)?;

    assert_eq!(
        call(&instance, 2, &[VMVal::i32(1)]),
        ExecutionResult::Value(VMVal::i32(1))
    );
    assert_eq!(call(&instance, 3, &[]), ExecutionResult::Value(VMVal::i32(2)));

    // Growing past the declared maximum fails with -1 and changes nothing.
    assert_eq!(
        call(&instance, 2, &[VMVal::i32(1)]),
        ExecutionResult::Value(VMVal::i32(-1))
    );
    assert_eq!(call(&instance, 3, &[]), ExecutionResult::Value(VMVal::i32(2)));

    // memory.grow of zero always succeeds and reports the current size.
    assert_eq!(
        call(&instance, 2, &[VMVal::i32(0)]),
        ExecutionResult::Value(VMVal::i32(2))
    );
    Ok(())
}

#[test_log::test]
fn host_page_ceiling_caps_growth_of_unbounded_memory() -> Result<()> {
    let module = weft::parse(&wat::parse_str(
        r#"(module
             (memory 1)
             (func (export "grow") (param i32) (result i32)
               local.get 0
               memory.grow))"#,
    )?)?;
    let instance = instantiate(module, Vec::new(), None, None, Vec::new(), 2)?;

    assert_eq!(
        call(&instance, 0, &[VMVal::i32(1)]),
        ExecutionResult::Value(VMVal::i32(1))
    );
    assert_eq!(
        call(&instance, 0, &[VMVal::i32(1)]),
        ExecutionResult::Value(VMVal::i32(-1))
    );
    Ok(())
}

#[test_log::test]
fn out_of_bounds_accesses_trap() -> Result<()> {
    let instance = instantiate_wat(MODULE)?;

    // One page: addresses 0..65536. A 4-byte load at 65533 straddles the
    // boundary.
    assert_eq!(
        call(&instance, 0, &[VMVal::i32(65533)]),
        ExecutionResult::Trap(Trap::MemoryOutOfBounds)
    );
    assert_eq!(
        call(&instance, 0, &[VMVal::i32(65532)]),
        ExecutionResult::Value(VMVal::i32(0))
    );
    // A negative address is a huge unsigned one.
    assert_eq!(
        call(&instance, 0, &[VMVal::i32(-4)]),
        ExecutionResult::Trap(Trap::MemoryOutOfBounds)
    );
    Ok(())
}

#[test_log::test]
fn effective_address_offset_is_checked_in_64_bits() -> Result<()> {
    let instance = instantiate_wat(
        r#"(module
             (memory 1)
             (func (export "load") (param i32) (result i32)
               local.get 0
               i32.load offset=0xffffffff))"#,
    )?;
    // base + offset overflows 32 bits; must trap, not wrap around.
    assert_eq!(
        call(&instance, 0, &[VMVal::i32(16)]),
        ExecutionResult::Trap(Trap::MemoryOutOfBounds)
    );
    Ok(())
}

#[test_log::test]
fn narrow_loads_extend_correctly() -> Result<()> {
    let instance = instantiate_wat(
        r#"(module
             (memory 1)
             (data (i32.const 0) "\80\ff")
             (func (export "load8_s") (param i32) (result i32)
               local.get 0
               i32.load8_s)
             (func (export "load8_u") (param i32) (result i32)
               local.get 0
               i32.load8_u)
             (func (export "load16_s64") (param i32) (result i64)
               local.get 0
               i64.load16_s))"#,
    )?;
    assert_eq!(
        call(&instance, 0, &[VMVal::i32(0)]),
        ExecutionResult::Value(VMVal::i32(-128))
    );
    assert_eq!(
        call(&instance, 1, &[VMVal::i32(0)]),
        ExecutionResult::Value(VMVal::i32(0x80))
    );
    // 0xff80 sign-extends to -128 in 64 bits.
    assert_eq!(
        call(&instance, 2, &[VMVal::i32(0)]),
        ExecutionResult::Value(VMVal::i64(-128))
    );
    Ok(())
}

#[test_log::test]
fn stores_are_little_endian() -> Result<()> {
    let instance = instantiate_wat(
        r#"(module
             (memory (export "mem") 1)
             (func (export "store") (param i32 i64)
               local.get 0
               local.get 1
               i64.store))"#,
    )?;
    assert!(!call(&instance, 0, &[VMVal::i32(8), VMVal::u64(0x0102_0304_0506_0708)]).trapped());

    let memory = find_exported_memory(&instance, "mem").expect("memory is exported");
    assert_eq!(
        &memory.memory.data()[8..16],
        &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
    );
    Ok(())
}

#[test_log::test]
fn exported_memory_reflects_guest_writes() -> Result<()> {
    let instance = instantiate_wat(MODULE)?;
    let memory = find_exported_memory(&instance, "mem").expect("memory is exported");
    assert_eq!(memory.limits.min, 1);
    assert_eq!(memory.limits.max, Some(2));

    assert!(!call(&instance, 1, &[VMVal::i32(100), VMVal::u32(0x5a)]).trapped());
    assert_eq!(memory.memory.data()[100], 0x5a);
    Ok(())
}
