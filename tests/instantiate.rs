//! Import matching, segment initialization, start-function semantics, and
//! cross-module linking.

use anyhow::Result;
use weft::{
    execute, find_exported_function, find_exported_global, find_exported_memory,
    find_exported_table, instantiate, resolve_imported_functions, resolve_imported_globals, Error,
    ExecutionContext, ExecutionResult, ExternalFunction, FuncIndex, FuncType, Global, GlobalType,
    ImportedFunction, ImportedGlobal, Instance, Module, Trap, VMVal, Val, ValType,
    DEFAULT_MEMORY_PAGES_LIMIT,
};

use std::rc::Rc;

fn parse_wat(wat: &str) -> Result<Module> {
    Ok(weft::parse(&wat::parse_str(wat)?)?)
}

fn instantiate_simple(module: Module) -> weft::Result<Rc<Instance>> {
    instantiate(
        module,
        Vec::new(),
        None,
        None,
        Vec::new(),
        DEFAULT_MEMORY_PAGES_LIMIT,
    )
}

fn call(instance: &Rc<Instance>, func: u32, args: &[VMVal]) -> ExecutionResult {
    let mut ctx = ExecutionContext::new();
    execute(instance, FuncIndex::from_u32(func), args, &mut ctx)
}

#[test_log::test]
fn indirect_call_through_imported_table() -> Result<()> {
    let exporter = instantiate_simple(parse_wat(
        r#"(module
             (table (export "t") 10 30 funcref)
             (elem (i32.const 1) func 0)
             (func (result i32) i32.const 42))"#,
    )?)?;
    let table = find_exported_table(&exporter, "t").expect("table is exported");
    assert_eq!(table.limits.min, 10);
    assert_eq!(table.limits.max, Some(30));

    let module = parse_wat(
        r#"(module
             (type (func (result i32)))
             (import "a" "t" (table 10 30 funcref))
             (func (export "call") (param i32) (result i32)
               local.get 0
               call_indirect (type 0)))"#,
    )?;
    let importer = instantiate(
        module,
        Vec::new(),
        Some(table),
        None,
        Vec::new(),
        DEFAULT_MEMORY_PAGES_LIMIT,
    )?;

    assert_eq!(
        call(&importer, 0, &[VMVal::i32(1)]),
        ExecutionResult::Value(VMVal::i32(42))
    );
    // Slot 0 was never filled.
    assert_eq!(
        call(&importer, 0, &[VMVal::i32(0)]),
        ExecutionResult::Trap(Trap::IndirectCallToNull)
    );
    // Past the live table size.
    assert_eq!(
        call(&importer, 0, &[VMVal::i32(50)]),
        ExecutionResult::Trap(Trap::TableOutOfBounds)
    );
    Ok(())
}

#[test_log::test]
fn indirect_call_signature_mismatch_traps() -> Result<()> {
    let instance = instantiate_simple(parse_wat(
        r#"(module
             (type $good (func (result i32)))
             (type $bad (func (result i64)))
             (table 4 funcref)
             (elem (i32.const 0) func $f)
             (func $f (result i32) i32.const 1)
             (func (export "call_bad") (param i32) (result i64)
               local.get 0
               call_indirect (type $bad)))"#,
    )?)?;
    assert_eq!(
        call(&instance, 1, &[VMVal::i32(0)]),
        ExecutionResult::Trap(Trap::BadSignature)
    );
    Ok(())
}

#[test_log::test]
fn imported_global_reexport() -> Result<()> {
    let exporter = instantiate_simple(parse_wat(
        r#"(module (global (export "g") i32 (i32.const 42)))"#,
    )?)?;
    let global = find_exported_global(&exporter, "g").expect("global is exported");
    assert_eq!(global.get().get_i32(), 42);

    let module = parse_wat(
        r#"(module
             (import "a" "g" (global i32))
             (func (export "get") (result i32) global.get 0))"#,
    )?;
    let importer = instantiate(
        module,
        Vec::new(),
        None,
        None,
        vec![global],
        DEFAULT_MEMORY_PAGES_LIMIT,
    )?;
    assert_eq!(call(&importer, 0, &[]), ExecutionResult::Value(VMVal::i32(42)));
    Ok(())
}

#[test_log::test]
fn mutating_the_backing_cell_is_visible_to_the_guest() -> Result<()> {
    let module = parse_wat(
        r#"(module
             (import "host" "g" (global (mut i32)))
             (func (export "get") (result i32) global.get 0))"#,
    )?;
    let cell = Global::new(
        VMVal::i32(1),
        GlobalType {
            content: ValType::I32,
            mutable: true,
        },
    );
    let instance = instantiate(
        module,
        Vec::new(),
        None,
        None,
        vec![cell.clone()],
        DEFAULT_MEMORY_PAGES_LIMIT,
    )?;

    assert_eq!(call(&instance, 0, &[]), ExecutionResult::Value(VMVal::i32(1)));
    cell.set(VMVal::i32(7));
    assert_eq!(call(&instance, 0, &[]), ExecutionResult::Value(VMVal::i32(7)));
    Ok(())
}

#[test_log::test]
fn host_function_import() -> Result<()> {
    let module = parse_wat(
        r#"(module
             (import "host" "double" (func (param i32) (result i32)))
             (func (export "run") (param i32) (result i32)
               local.get 0
               call 0))"#,
    )?;
    let double = ExternalFunction::wrap(
        FuncType::new([ValType::I32], [ValType::I32]),
        |_instance, args, _ctx| ExecutionResult::Value(VMVal::i32(args[0].get_i32() * 2)),
    );
    let instance = instantiate(
        module,
        vec![double],
        None,
        None,
        Vec::new(),
        DEFAULT_MEMORY_PAGES_LIMIT,
    )?;
    assert_eq!(
        call(&instance, 1, &[VMVal::i32(21)]),
        ExecutionResult::Value(VMVal::i32(42))
    );
    Ok(())
}

#[test_log::test]
fn host_function_may_reenter_the_interpreter() -> Result<()> {
    let module = parse_wat(
        r#"(module
             (import "host" "callback" (func (param i32) (result i32)))
             (func (export "entry") (param i32) (result i32)
               local.get 0
               call 0)
             (func (export "leaf") (param i32) (result i32)
               local.get 0
               i32.const 1
               i32.add))"#,
    )?;
    let callback = ExternalFunction::wrap(
        FuncType::new([ValType::I32], [ValType::I32]),
        |instance, args, ctx| execute(instance, FuncIndex::from_u32(2), args, ctx),
    );
    let instance = instantiate(
        module,
        vec![callback],
        None,
        None,
        Vec::new(),
        DEFAULT_MEMORY_PAGES_LIMIT,
    )?;
    assert_eq!(
        call(&instance, 1, &[VMVal::i32(41)]),
        ExecutionResult::Value(VMVal::i32(42))
    );
    Ok(())
}

#[test_log::test]
fn exported_function_links_as_import_of_another_module() -> Result<()> {
    let exporter = instantiate_simple(parse_wat(
        r#"(module (func (export "forty") (result i32) i32.const 40))"#,
    )?)?;
    let forty = find_exported_function(&exporter, "forty").expect("function is exported");
    assert_eq!(forty.ty, FuncType::new([], [ValType::I32]));

    let module = parse_wat(
        r#"(module
             (import "a" "forty" (func (result i32)))
             (func (export "forty_two") (result i32)
               call 0
               i32.const 2
               i32.add))"#,
    )?;
    let importer = instantiate(
        module,
        vec![forty],
        None,
        None,
        Vec::new(),
        DEFAULT_MEMORY_PAGES_LIMIT,
    )?;
    assert_eq!(
        call(&importer, 1, &[]),
        ExecutionResult::Value(VMVal::i32(42))
    );
    Ok(())
}

#[test_log::test]
fn function_import_type_mismatch() -> Result<()> {
    let module = parse_wat(
        r#"(module (import "host" "f" (func (param i32) (result i32))))"#,
    )?;
    let wrong = ExternalFunction::wrap(FuncType::new([], []), |_, _, _| ExecutionResult::Void);
    let error = instantiate(
        module,
        vec![wrong],
        None,
        None,
        Vec::new(),
        DEFAULT_MEMORY_PAGES_LIMIT,
    )
    .unwrap_err();
    assert!(matches!(error, Error::Instantiation(_)));
    Ok(())
}

#[test_log::test]
fn missing_imports_are_rejected() -> Result<()> {
    let module = parse_wat(
        r#"(module (import "host" "f" (func (param i32) (result i32))))"#,
    )?;
    let error = instantiate_simple(module).unwrap_err();
    assert!(matches!(error, Error::Instantiation(_)));
    Ok(())
}

#[test_log::test]
fn resolve_imports_by_name() -> Result<()> {
    let module = parse_wat(
        r#"(module
             (import "env" "mul" (func (param i32 i32) (result i32)))
             (import "env" "bias" (global i32))
             (func (export "run") (param i32) (result i32)
               local.get 0
               global.get 0
               call 0))"#,
    )?;

    let mul = ExternalFunction::wrap(
        FuncType::new([ValType::I32, ValType::I32], [ValType::I32]),
        |_, args, _| ExecutionResult::Value(VMVal::i32(args[0].get_i32() * args[1].get_i32())),
    );
    // Registry order does not need to match import order.
    let functions = resolve_imported_functions(
        &module,
        &[ImportedFunction {
            module: "env".to_owned(),
            name: "mul".to_owned(),
            inputs: vec![ValType::I32, ValType::I32],
            output: Some(ValType::I32),
            function: mul.function,
        }],
    )?;
    let globals = resolve_imported_globals(
        &module,
        &[ImportedGlobal {
            module: "env".to_owned(),
            name: "bias".to_owned(),
            global: Global::new(
                VMVal::i32(3),
                GlobalType {
                    content: ValType::I32,
                    mutable: false,
                },
            ),
        }],
    )?;

    let instance = instantiate(
        module,
        functions,
        None,
        None,
        globals,
        DEFAULT_MEMORY_PAGES_LIMIT,
    )?;
    assert_eq!(
        call(&instance, 1, &[VMVal::i32(14)]),
        ExecutionResult::Value(VMVal::i32(42))
    );
    Ok(())
}

#[test_log::test]
fn resolve_imports_reports_signature_mismatches() -> Result<()> {
    let module = parse_wat(
        r#"(module (import "env" "f" (func (param i32) (result i32))))"#,
    )?;
    let error = resolve_imported_functions(
        &module,
        &[ImportedFunction {
            module: "env".to_owned(),
            name: "f".to_owned(),
            inputs: vec![ValType::I64],
            output: Some(ValType::I32),
            function: Rc::new(|_: &Rc<Instance>, _: &[VMVal], _: &mut ExecutionContext| {
                ExecutionResult::Void
            }),
        }],
    )
    .unwrap_err();
    assert!(matches!(error, Error::Instantiation(_)));

    let error = resolve_imported_functions(&module, &[]).unwrap_err();
    assert!(matches!(error, Error::Instantiation(_)));
    Ok(())
}

#[test_log::test]
fn page_ceiling_is_enforced() -> Result<()> {
    // Module wants more pages than the host allows.
    let module = parse_wat(r#"(module (memory 300))"#)?;
    let error = instantiate(module, Vec::new(), None, None, Vec::new(), 256).unwrap_err();
    assert!(matches!(error, Error::Instantiation(_)));

    // The ceiling itself may not exceed the 4 GiB address space.
    let module = parse_wat(r#"(module (memory 1))"#)?;
    let error = instantiate(module, Vec::new(), None, None, Vec::new(), 65537).unwrap_err();
    assert!(matches!(error, Error::Instantiation(_)));
    Ok(())
}

#[test_log::test]
fn out_of_bounds_data_segment_fails_before_any_write() -> Result<()> {
    let exporter = instantiate_simple(parse_wat(r#"(module (memory (export "mem") 1))"#)?)?;
    let memory = find_exported_memory(&exporter, "mem").expect("memory is exported");

    // First segment is fine, second is out of bounds; neither may land.
    let module = parse_wat(
        r#"(module
             (import "a" "mem" (memory 1))
             (data (i32.const 0) "\aa\bb")
             (data (i32.const 65535) "\01\02"))"#,
    )?;
    let error = instantiate(
        module,
        Vec::new(),
        None,
        Some(memory.clone()),
        Vec::new(),
        DEFAULT_MEMORY_PAGES_LIMIT,
    )
    .unwrap_err();
    assert!(matches!(error, Error::Instantiation(_)));
    assert_eq!(&memory.memory.data()[0..2], &[0, 0]);
    Ok(())
}

#[test_log::test]
fn out_of_bounds_element_segment_is_rejected() -> Result<()> {
    let module = parse_wat(
        r#"(module
             (table 2 funcref)
             (elem (i32.const 1) func 0 0)
             (func (result i32) i32.const 1))"#,
    )?;
    let error = instantiate_simple(module).unwrap_err();
    assert!(matches!(error, Error::Instantiation(_)));
    Ok(())
}

#[test_log::test]
fn segment_offset_from_imported_global() -> Result<()> {
    let offset = Global::new(
        VMVal::i32(4),
        GlobalType {
            content: ValType::I32,
            mutable: false,
        },
    );
    let module = parse_wat(
        r#"(module
             (import "env" "offset" (global i32))
             (memory (export "mem") 1)
             (data (global.get 0) "\2a")
             (func (export "load") (param i32) (result i32)
               local.get 0
               i32.load8_u))"#,
    )?;
    let instance = instantiate(
        module,
        Vec::new(),
        None,
        None,
        vec![offset],
        DEFAULT_MEMORY_PAGES_LIMIT,
    )?;
    assert_eq!(
        call(&instance, 0, &[VMVal::i32(4)]),
        ExecutionResult::Value(VMVal::i32(0x2a))
    );
    Ok(())
}

#[test_log::test]
fn start_function_runs_during_instantiation() -> Result<()> {
    let module = parse_wat(
        r#"(module
             (memory (export "mem") 1)
             (func $init
               i32.const 0
               i32.const 7
               i32.store8)
             (start $init))"#,
    )?;
    let instance = instantiate_simple(module)?;
    let memory = find_exported_memory(&instance, "mem").expect("memory is exported");
    assert_eq!(memory.memory.data()[0], 7);
    Ok(())
}

#[test_log::test]
fn trapping_start_function_fails_instantiation() -> Result<()> {
    let module = parse_wat(
        r#"(module
             (func $bad unreachable)
             (start $bad))"#,
    )?;
    let error = instantiate_simple(module).unwrap_err();
    assert!(matches!(error, Error::Instantiation(_)));
    Ok(())
}

// When a start function traps after element segments already wrote into an
// imported table, the writes stay (no rollback) and the orphaned instance
// must be kept alive for as long as the table references it.
#[test_log::test]
fn failed_start_keeps_table_entries_callable() -> Result<()> {
    let exporter = instantiate_simple(parse_wat(
        r#"(module (table (export "t") 5 funcref))"#,
    )?)?;
    let table = find_exported_table(&exporter, "t").expect("table is exported");

    let orphan = parse_wat(
        r#"(module
             (import "x" "t" (table 5 funcref))
             (elem (i32.const 0) func $seven)
             (func $seven (result i32) i32.const 7)
             (func $bad unreachable)
             (start $bad))"#,
    )?;
    let error = instantiate(
        orphan,
        Vec::new(),
        Some(table.clone()),
        None,
        Vec::new(),
        DEFAULT_MEMORY_PAGES_LIMIT,
    )
    .unwrap_err();
    assert!(matches!(error, Error::Instantiation(_)));

    let module = parse_wat(
        r#"(module
             (type (func (result i32)))
             (import "x" "t" (table 5 funcref))
             (func (export "call") (param i32) (result i32)
               local.get 0
               call_indirect (type 0)))"#,
    )?;
    let caller = instantiate(
        module,
        Vec::new(),
        Some(table),
        None,
        Vec::new(),
        DEFAULT_MEMORY_PAGES_LIMIT,
    )?;
    // The orphan's function is still reachable through the shared table.
    assert_eq!(
        call(&caller, 0, &[VMVal::i32(0)]),
        ExecutionResult::Value(VMVal::i32(7))
    );
    Ok(())
}

#[test_log::test]
fn imported_table_limits_must_fit() -> Result<()> {
    let exporter = instantiate_simple(parse_wat(
        r#"(module (table (export "t") 2 funcref))"#,
    )?)?;
    let table = find_exported_table(&exporter, "t").expect("table is exported");

    // Module wants at least 10 elements.
    let module = parse_wat(r#"(module (import "x" "t" (table 10 funcref)))"#)?;
    let error = instantiate(
        module,
        Vec::new(),
        Some(table),
        None,
        Vec::new(),
        DEFAULT_MEMORY_PAGES_LIMIT,
    )
    .unwrap_err();
    assert!(matches!(error, Error::Instantiation(_)));
    Ok(())
}

#[test_log::test]
fn typed_value_facade_round_trips_through_a_call() -> Result<()> {
    let instance = instantiate_simple(parse_wat(
        r#"(module
             (func (export "add") (param f64 f64) (result f64)
               local.get 0
               local.get 1
               f64.add))"#,
    )?)?;
    let args = [Val::from(1.5f64).as_vmval(), Val::from(2.25f64).as_vmval()];
    let result = call(&instance, 0, &args);
    let value = result.value().expect("call returns a value");
    assert_eq!(Val::from_vmval(value, ValType::F64), Val::from(3.75f64));
    Ok(())
}
