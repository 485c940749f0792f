//! Per-function validation and lowering.
//!
//! A single pass over the body bytes type-checks every instruction against an
//! abstract operand stack, tracks the control-frame structure, computes the
//! maximum runtime operand-stack height, and emits the executable
//! [`Instr`] stream with immediates decoded and branch targets resolved.

use crate::code::{BranchTarget, Code, Instr, INVALID_PC};
use crate::errors::Error;
use crate::indices::{FuncIndex, GlobalIndex, TypeIndex};
use crate::module::ModuleInner;
use crate::parse::Reader;
use crate::types::ValType;
use smallvec::SmallVec;

/// Validates one function body and lowers it to executable code.
pub(crate) fn validate_function_body(
    module: &ModuleInner,
    func: FuncIndex,
    body: &[u8],
) -> crate::Result<Code> {
    let mut reader = Reader::new(body);
    let func_ty = module.func_type(func);

    let mut locals = LocalGroups::with_params(&func_ty.params);
    let group_count = reader.read_u32()?;
    for _ in 0..group_count {
        let count = reader.read_u32()?;
        let ty = reader.read_valtype()?;
        locals.declare(count, ty)?;
    }
    let local_count = locals.declared();

    let mut validator = FuncValidator {
        module,
        result_type: func_ty.results.first().copied(),
        locals,
        stack: SmallVec::new(),
        frames: vec![ControlFrame {
            kind: FrameKind::Block,
            block_type: func_ty.results.first().copied(),
            entry_height: 0,
            unreachable: false,
            start_pc: 0,
            fixups: SmallVec::new(),
        }],
        code: Vec::new(),
        max_stack_height: 0,
    };

    while !validator.frames.is_empty() {
        let opcode = reader.read_u8()?;
        validator.visit(opcode, &mut reader)?;
    }

    if !reader.is_empty() {
        return Err(Error::malformed("malformed size field for function"));
    }

    Ok(Code {
        max_stack_height: validator.max_stack_height as u32,
        local_count,
        instrs: validator.code.into_boxed_slice(),
    })
}

// Locals are kept as (cumulative end index, type) runs so that a module
// declaring billions of locals cannot make validation allocate billions of
// entries; the expansion happens only when a frame is actually activated.
struct LocalGroups {
    runs: Vec<(u32, ValType)>,
    params: u32,
    total: u32,
}

impl LocalGroups {
    fn with_params(params: &[ValType]) -> Self {
        let mut this = Self {
            runs: Vec::with_capacity(params.len() + 4),
            params: params.len() as u32,
            total: 0,
        };
        for &ty in params {
            this.total += 1;
            this.runs.push((this.total, ty));
        }
        this
    }

    fn declare(&mut self, count: u32, ty: ValType) -> crate::Result<()> {
        let total = u64::from(self.total) + u64::from(count);
        if total > u64::from(u32::MAX) {
            return Err(Error::malformed("too many local variables"));
        }
        self.total = total as u32;
        self.runs.push((self.total, ty));
        Ok(())
    }

    fn get(&self, index: u32) -> Option<ValType> {
        if index >= self.total {
            return None;
        }
        self.runs
            .iter()
            .find(|&&(end, _)| index < end)
            .map(|&(_, ty)| ty)
    }

    fn declared(&self) -> u32 {
        self.total - self.params
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Block,
    Loop,
    /// Carries the index of the emitted `If` instruction so `else`/`end` can
    /// patch its false-branch destination.
    If { instr: usize },
    /// Carries the index of the emitted `Else` jump so `end` can patch it.
    Else { instr: usize },
}

#[derive(Clone, Copy)]
struct Fixup {
    instr: usize,
    /// `Some(i)` patches entry `i` of a `br_table`, `None` a plain branch.
    slot: Option<usize>,
}

struct ControlFrame {
    kind: FrameKind,
    /// The block's result type; branch targets use the entry types for
    /// `loop` frames and this for the others.
    block_type: Option<ValType>,
    /// Operand stack height when the frame was entered.
    entry_height: usize,
    /// Set once the rest of the frame is statically dead; pops below
    /// `entry_height` then produce wildcard types.
    unreachable: bool,
    start_pc: u32,
    fixups: SmallVec<[Fixup; 4]>,
}

struct FuncValidator<'m> {
    module: &'m ModuleInner,
    result_type: Option<ValType>,
    locals: LocalGroups,
    stack: SmallVec<[ValType; 32]>,
    frames: Vec<ControlFrame>,
    code: Vec<Instr>,
    max_stack_height: usize,
}

impl<'m> FuncValidator<'m> {
    fn push(&mut self, ty: ValType) {
        self.stack.push(ty);
        self.max_stack_height = self.max_stack_height.max(self.stack.len());
    }

    /// Pops one operand; `None` is the wildcard produced by popping past the
    /// frame boundary in unreachable code.
    fn pop_any(&mut self) -> crate::Result<Option<ValType>> {
        let frame = self.frames.last().expect("control frame underflow");
        if self.stack.len() == frame.entry_height {
            if frame.unreachable {
                return Ok(None);
            }
            return Err(Error::validation("operand stack underflow"));
        }
        Ok(self.stack.pop())
    }

    fn pop_expect(&mut self, expected: ValType) -> crate::Result<()> {
        match self.pop_any()? {
            None => Ok(()),
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(Error::validation(format!(
                "type mismatch: expected {expected}, got {actual}"
            ))),
        }
    }

    fn emit(&mut self, instr: Instr) -> usize {
        self.code.push(instr);
        self.code.len() - 1
    }

    fn set_unreachable(&mut self) {
        let frame = self.frames.last_mut().expect("control frame underflow");
        self.stack.truncate(frame.entry_height);
        frame.unreachable = true;
    }

    fn push_frame(&mut self, kind: FrameKind, block_type: Option<ValType>, start_pc: u32) {
        self.frames.push(ControlFrame {
            kind,
            block_type,
            entry_height: self.stack.len(),
            unreachable: false,
            start_pc,
            fixups: SmallVec::new(),
        });
    }

    fn frame_index(&self, depth: u32) -> crate::Result<usize> {
        self.frames
            .len()
            .checked_sub(1 + depth as usize)
            .ok_or_else(|| Error::validation("invalid label index"))
    }

    /// The types a branch to this frame carries: the entry types for a
    /// `loop`, the result type otherwise.
    fn label_type(&self, frame_index: usize) -> Option<ValType> {
        let frame = &self.frames[frame_index];
        match frame.kind {
            FrameKind::Loop => None,
            _ => frame.block_type,
        }
    }

    /// Builds the runtime target for a branch to `frame_index`, given the
    /// current (pre-pop) stack height. The destination of non-loop targets
    /// is patched at the frame's `end`.
    fn branch_target(&self, frame_index: usize, keep: bool) -> BranchTarget {
        let frame = &self.frames[frame_index];
        let height = self.stack.len();
        let drop = height.saturating_sub(frame.entry_height + usize::from(keep)) as u32;
        let pc = match frame.kind {
            FrameKind::Loop => frame.start_pc,
            _ => INVALID_PC,
        };
        BranchTarget { pc, drop, keep }
    }

    fn needs_fixup(&self, frame_index: usize) -> bool {
        !matches!(self.frames[frame_index].kind, FrameKind::Loop)
    }

    /// Verifies the operand stack balances to the frame's result type. On
    /// success the stack sits exactly at the frame's entry height.
    fn check_block_exit(&mut self) -> crate::Result<()> {
        let frame = self.frames.last().expect("control frame underflow");
        let (entry_height, was_unreachable, block_type) =
            (frame.entry_height, frame.unreachable, frame.block_type);
        if let Some(ty) = block_type {
            self.pop_expect(ty)?;
        }
        if !was_unreachable && self.stack.len() != entry_height {
            return Err(Error::validation(
                "type mismatch: values left on the operand stack at end of block",
            ));
        }
        self.stack.truncate(entry_height);
        Ok(())
    }

    fn visit_end(&mut self) -> crate::Result<()> {
        let frame = self.frames.last().expect("control frame underflow");
        if let (FrameKind::If { .. }, Some(_)) = (frame.kind, frame.block_type) {
            return Err(Error::validation(
                "type mismatch: if with a result type requires an else branch",
            ));
        }
        self.check_block_exit()?;
        let frame = self.frames.pop().expect("control frame underflow");

        // The destination of branches out of this frame; for the outermost
        // frame this is the function epilogue emitted right below.
        let end_pc = self.code.len() as u32;
        if self.frames.is_empty() {
            self.emit(Instr::Return);
        }
        for fixup in &frame.fixups {
            match (&mut self.code[fixup.instr], fixup.slot) {
                (Instr::Br(target) | Instr::BrIf(target), None) => target.pc = end_pc,
                (Instr::BrTable(targets), Some(slot)) => targets[slot].pc = end_pc,
                _ => unreachable!("fixup does not point at a branch"),
            }
        }
        match frame.kind {
            FrameKind::If { instr } => {
                let Instr::If { else_pc } = &mut self.code[instr] else {
                    unreachable!("if frame does not point at an if");
                };
                *else_pc = end_pc;
            }
            FrameKind::Else { instr } => {
                let Instr::Else { end_pc: pc } = &mut self.code[instr] else {
                    unreachable!("else frame does not point at an else");
                };
                *pc = end_pc;
            }
            _ => {}
        }

        if !self.frames.is_empty() {
            if let Some(ty) = frame.block_type {
                self.push(ty);
            }
        }
        Ok(())
    }

    fn visit_else(&mut self) -> crate::Result<()> {
        let frame = self.frames.last().expect("control frame underflow");
        let FrameKind::If { instr: if_instr } = frame.kind else {
            return Err(Error::validation("else without matching if"));
        };
        self.check_block_exit()?;

        let else_instr = self.emit(Instr::Else { end_pc: INVALID_PC });
        let else_arm_pc = self.code.len() as u32;
        let Instr::If { else_pc } = &mut self.code[if_instr] else {
            unreachable!("if frame does not point at an if");
        };
        *else_pc = else_arm_pc;

        let frame = self.frames.last_mut().expect("control frame underflow");
        frame.kind = FrameKind::Else { instr: else_instr };
        frame.unreachable = false;
        Ok(())
    }

    fn visit_br(&mut self, depth: u32) -> crate::Result<()> {
        let frame_index = self.frame_index(depth)?;
        let label_type = self.label_type(frame_index);
        let target = self.branch_target(frame_index, label_type.is_some());
        if let Some(ty) = label_type {
            self.pop_expect(ty)?;
        }
        let instr = self.emit(Instr::Br(target));
        if self.needs_fixup(frame_index) {
            self.frames[frame_index].fixups.push(Fixup { instr, slot: None });
        }
        self.set_unreachable();
        Ok(())
    }

    fn visit_br_if(&mut self, depth: u32) -> crate::Result<()> {
        self.pop_expect(ValType::I32)?;
        let frame_index = self.frame_index(depth)?;
        let label_type = self.label_type(frame_index);
        let target = self.branch_target(frame_index, label_type.is_some());
        if let Some(ty) = label_type {
            self.pop_expect(ty)?;
            self.push(ty);
        }
        let instr = self.emit(Instr::BrIf(target));
        if self.needs_fixup(frame_index) {
            self.frames[frame_index].fixups.push(Fixup { instr, slot: None });
        }
        Ok(())
    }

    fn visit_br_table(&mut self, reader: &mut Reader) -> crate::Result<()> {
        let count = reader.read_u32()?;
        let mut depths = Vec::with_capacity(count.min(128) as usize);
        for _ in 0..count {
            depths.push(reader.read_u32()?);
        }
        depths.push(reader.read_u32()?); // default label, last

        self.pop_expect(ValType::I32)?;

        let default_index = self.frame_index(depths[count as usize])?;
        let label_type = self.label_type(default_index);
        let mut targets = Vec::with_capacity(depths.len());
        let mut fixups = Vec::with_capacity(depths.len());
        for &depth in &depths {
            let frame_index = self.frame_index(depth)?;
            if self.label_type(frame_index) != label_type {
                return Err(Error::validation(
                    "br_table labels have inconsistent types",
                ));
            }
            targets.push(self.branch_target(frame_index, label_type.is_some()));
            fixups.push(self.needs_fixup(frame_index).then_some(frame_index));
        }
        if let Some(ty) = label_type {
            self.pop_expect(ty)?;
        }

        let instr = self.emit(Instr::BrTable(targets.into_boxed_slice()));
        for (slot, frame_index) in fixups.into_iter().enumerate() {
            if let Some(frame_index) = frame_index {
                self.frames[frame_index].fixups.push(Fixup {
                    instr,
                    slot: Some(slot),
                });
            }
        }
        self.set_unreachable();
        Ok(())
    }

    fn visit_call(&mut self, func: FuncIndex) -> crate::Result<()> {
        if func.as_u32() as usize >= self.module.functions.len() {
            return Err(Error::validation("invalid function index"));
        }
        let ty = self.module.func_type(func);
        for &param in ty.params.iter().rev() {
            self.pop_expect(param)?;
        }
        for &result in ty.results.iter() {
            self.push(result);
        }
        self.emit(Instr::Call(func));
        Ok(())
    }

    fn visit_call_indirect(&mut self, type_index: TypeIndex) -> crate::Result<()> {
        if !self.module.has_table() {
            return Err(Error::validation("call_indirect requires a table"));
        }
        let Some(ty) = self.module.types.get(type_index) else {
            return Err(Error::validation("invalid type index"));
        };
        self.pop_expect(ValType::I32)?;
        for &param in ty.params.iter().rev() {
            self.pop_expect(param)?;
        }
        for &result in ty.results.iter() {
            self.push(result);
        }
        self.emit(Instr::CallIndirect(type_index));
        Ok(())
    }

    fn local_type(&self, index: u32) -> crate::Result<ValType> {
        self.locals
            .get(index)
            .ok_or_else(|| Error::validation("invalid local index"))
    }

    fn global_type(&self, index: u32) -> crate::Result<crate::types::GlobalType> {
        self.module
            .globals
            .get(GlobalIndex::from_u32(index))
            .copied()
            .ok_or_else(|| Error::validation("invalid global index"))
    }

    /// Reads a memarg, enforcing `2^align <= access width`, and checks a
    /// memory exists. Only the static offset survives into the lowered code.
    fn memarg(&mut self, reader: &mut Reader, max_align: u32) -> crate::Result<u32> {
        if !self.module.has_memory() {
            return Err(Error::validation("memory instruction without linear memory"));
        }
        let align = reader.read_u32()?;
        if align > max_align {
            return Err(Error::validation("alignment larger than natural alignment"));
        }
        reader.read_u32()
    }

    fn load(
        &mut self,
        reader: &mut Reader,
        max_align: u32,
        result: ValType,
        instr: impl FnOnce(u32) -> Instr,
    ) -> crate::Result<()> {
        let offset = self.memarg(reader, max_align)?;
        self.pop_expect(ValType::I32)?;
        self.push(result);
        self.emit(instr(offset));
        Ok(())
    }

    fn store(
        &mut self,
        reader: &mut Reader,
        max_align: u32,
        operand: ValType,
        instr: impl FnOnce(u32) -> Instr,
    ) -> crate::Result<()> {
        let offset = self.memarg(reader, max_align)?;
        self.pop_expect(operand)?;
        self.pop_expect(ValType::I32)?;
        self.emit(instr(offset));
        Ok(())
    }

    fn test(&mut self, ty: ValType, instr: Instr) -> crate::Result<()> {
        self.pop_expect(ty)?;
        self.push(ValType::I32);
        self.emit(instr);
        Ok(())
    }

    fn compare(&mut self, ty: ValType, instr: Instr) -> crate::Result<()> {
        self.pop_expect(ty)?;
        self.pop_expect(ty)?;
        self.push(ValType::I32);
        self.emit(instr);
        Ok(())
    }

    fn unary(&mut self, ty: ValType, instr: Instr) -> crate::Result<()> {
        self.pop_expect(ty)?;
        self.push(ty);
        self.emit(instr);
        Ok(())
    }

    fn binary(&mut self, ty: ValType, instr: Instr) -> crate::Result<()> {
        self.pop_expect(ty)?;
        self.pop_expect(ty)?;
        self.push(ty);
        self.emit(instr);
        Ok(())
    }

    fn convert(&mut self, from: ValType, to: ValType, instr: Instr) -> crate::Result<()> {
        self.pop_expect(from)?;
        self.push(to);
        self.emit(instr);
        Ok(())
    }

    fn read_block_type(&mut self, reader: &mut Reader) -> crate::Result<Option<ValType>> {
        let byte = reader.read_u8()?;
        if byte == 0x40 {
            return Ok(None);
        }
        ValType::from_byte(byte)
            .map(Some)
            .ok_or_else(|| Error::malformed(format!("invalid block type {byte}")))
    }

    fn visit(&mut self, opcode: u8, reader: &mut Reader) -> crate::Result<()> {
        use ValType::{F32, F64, I32, I64};

        match opcode {
            0x00 => {
                self.emit(Instr::Unreachable);
                self.set_unreachable();
            }
            0x01 => {
                self.emit(Instr::Nop);
            }
            0x02 => {
                let block_type = self.read_block_type(reader)?;
                self.push_frame(FrameKind::Block, block_type, 0);
            }
            0x03 => {
                let block_type = self.read_block_type(reader)?;
                let start_pc = self.code.len() as u32;
                self.push_frame(FrameKind::Loop, block_type, start_pc);
            }
            0x04 => {
                let block_type = self.read_block_type(reader)?;
                self.pop_expect(I32)?;
                let instr = self.emit(Instr::If { else_pc: INVALID_PC });
                self.push_frame(FrameKind::If { instr }, block_type, 0);
            }
            0x05 => self.visit_else()?,
            0x0b => self.visit_end()?,
            0x0c => {
                let depth = reader.read_u32()?;
                self.visit_br(depth)?;
            }
            0x0d => {
                let depth = reader.read_u32()?;
                self.visit_br_if(depth)?;
            }
            0x0e => self.visit_br_table(reader)?,
            0x0f => {
                if let Some(ty) = self.result_type {
                    self.pop_expect(ty)?;
                }
                self.emit(Instr::Return);
                self.set_unreachable();
            }
            0x10 => {
                let func = FuncIndex::from_u32(reader.read_u32()?);
                self.visit_call(func)?;
            }
            0x11 => {
                let type_index = TypeIndex::from_u32(reader.read_u32()?);
                if reader.read_u8()? != 0 {
                    return Err(Error::malformed("zero byte expected"));
                }
                self.visit_call_indirect(type_index)?;
            }

            0x1a => {
                self.pop_any()?;
                self.emit(Instr::Drop);
            }
            0x1b => {
                self.pop_expect(I32)?;
                let t2 = self.pop_any()?;
                let t1 = self.pop_any()?;
                match (t1, t2) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(Error::validation("type mismatch in select"));
                    }
                    (Some(ty), _) | (_, Some(ty)) => self.push(ty),
                    (None, None) => {}
                }
                self.emit(Instr::Select);
            }

            0x20 => {
                let index = reader.read_u32()?;
                let ty = self.local_type(index)?;
                self.push(ty);
                self.emit(Instr::LocalGet(index));
            }
            0x21 => {
                let index = reader.read_u32()?;
                let ty = self.local_type(index)?;
                self.pop_expect(ty)?;
                self.emit(Instr::LocalSet(index));
            }
            0x22 => {
                let index = reader.read_u32()?;
                let ty = self.local_type(index)?;
                self.pop_expect(ty)?;
                self.push(ty);
                self.emit(Instr::LocalTee(index));
            }
            0x23 => {
                let index = reader.read_u32()?;
                let ty = self.global_type(index)?;
                self.push(ty.content);
                self.emit(Instr::GlobalGet(GlobalIndex::from_u32(index)));
            }
            0x24 => {
                let index = reader.read_u32()?;
                let ty = self.global_type(index)?;
                if !ty.mutable {
                    return Err(Error::validation("global is immutable"));
                }
                self.pop_expect(ty.content)?;
                self.emit(Instr::GlobalSet(GlobalIndex::from_u32(index)));
            }

            0x28 => self.load(reader, 2, I32, |offset| Instr::I32Load { offset })?,
            0x29 => self.load(reader, 3, I64, |offset| Instr::I64Load { offset })?,
            0x2a => self.load(reader, 2, F32, |offset| Instr::F32Load { offset })?,
            0x2b => self.load(reader, 3, F64, |offset| Instr::F64Load { offset })?,
            0x2c => self.load(reader, 0, I32, |offset| Instr::I32Load8S { offset })?,
            0x2d => self.load(reader, 0, I32, |offset| Instr::I32Load8U { offset })?,
            0x2e => self.load(reader, 1, I32, |offset| Instr::I32Load16S { offset })?,
            0x2f => self.load(reader, 1, I32, |offset| Instr::I32Load16U { offset })?,
            0x30 => self.load(reader, 0, I64, |offset| Instr::I64Load8S { offset })?,
            0x31 => self.load(reader, 0, I64, |offset| Instr::I64Load8U { offset })?,
            0x32 => self.load(reader, 1, I64, |offset| Instr::I64Load16S { offset })?,
            0x33 => self.load(reader, 1, I64, |offset| Instr::I64Load16U { offset })?,
            0x34 => self.load(reader, 2, I64, |offset| Instr::I64Load32S { offset })?,
            0x35 => self.load(reader, 2, I64, |offset| Instr::I64Load32U { offset })?,
            0x36 => self.store(reader, 2, I32, |offset| Instr::I32Store { offset })?,
            0x37 => self.store(reader, 3, I64, |offset| Instr::I64Store { offset })?,
            0x38 => self.store(reader, 2, F32, |offset| Instr::F32Store { offset })?,
            0x39 => self.store(reader, 3, F64, |offset| Instr::F64Store { offset })?,
            0x3a => self.store(reader, 0, I32, |offset| Instr::I32Store8 { offset })?,
            0x3b => self.store(reader, 1, I32, |offset| Instr::I32Store16 { offset })?,
            0x3c => self.store(reader, 0, I64, |offset| Instr::I64Store8 { offset })?,
            0x3d => self.store(reader, 1, I64, |offset| Instr::I64Store16 { offset })?,
            0x3e => self.store(reader, 2, I64, |offset| Instr::I64Store32 { offset })?,
            0x3f => {
                if !self.module.has_memory() {
                    return Err(Error::validation("memory instruction without linear memory"));
                }
                if reader.read_u8()? != 0 {
                    return Err(Error::malformed("zero byte expected"));
                }
                self.push(I32);
                self.emit(Instr::MemorySize);
            }
            0x40 => {
                if !self.module.has_memory() {
                    return Err(Error::validation("memory instruction without linear memory"));
                }
                if reader.read_u8()? != 0 {
                    return Err(Error::malformed("zero byte expected"));
                }
                self.pop_expect(I32)?;
                self.push(I32);
                self.emit(Instr::MemoryGrow);
            }

            0x41 => {
                let value = reader.read_i32()?;
                self.push(I32);
                self.emit(Instr::I32Const(value));
            }
            0x42 => {
                let value = reader.read_i64()?;
                self.push(I64);
                self.emit(Instr::I64Const(value));
            }
            0x43 => {
                let bits = reader.read_f32_bits()?;
                self.push(F32);
                self.emit(Instr::F32Const(bits));
            }
            0x44 => {
                let bits = reader.read_f64_bits()?;
                self.push(F64);
                self.emit(Instr::F64Const(bits));
            }

            0x45 => self.test(I32, Instr::I32Eqz)?,
            0x46 => self.compare(I32, Instr::I32Eq)?,
            0x47 => self.compare(I32, Instr::I32Ne)?,
            0x48 => self.compare(I32, Instr::I32LtS)?,
            0x49 => self.compare(I32, Instr::I32LtU)?,
            0x4a => self.compare(I32, Instr::I32GtS)?,
            0x4b => self.compare(I32, Instr::I32GtU)?,
            0x4c => self.compare(I32, Instr::I32LeS)?,
            0x4d => self.compare(I32, Instr::I32LeU)?,
            0x4e => self.compare(I32, Instr::I32GeS)?,
            0x4f => self.compare(I32, Instr::I32GeU)?,
            0x50 => self.test(I64, Instr::I64Eqz)?,
            0x51 => self.compare(I64, Instr::I64Eq)?,
            0x52 => self.compare(I64, Instr::I64Ne)?,
            0x53 => self.compare(I64, Instr::I64LtS)?,
            0x54 => self.compare(I64, Instr::I64LtU)?,
            0x55 => self.compare(I64, Instr::I64GtS)?,
            0x56 => self.compare(I64, Instr::I64GtU)?,
            0x57 => self.compare(I64, Instr::I64LeS)?,
            0x58 => self.compare(I64, Instr::I64LeU)?,
            0x59 => self.compare(I64, Instr::I64GeS)?,
            0x5a => self.compare(I64, Instr::I64GeU)?,
            0x5b => self.compare(F32, Instr::F32Eq)?,
            0x5c => self.compare(F32, Instr::F32Ne)?,
            0x5d => self.compare(F32, Instr::F32Lt)?,
            0x5e => self.compare(F32, Instr::F32Gt)?,
            0x5f => self.compare(F32, Instr::F32Le)?,
            0x60 => self.compare(F32, Instr::F32Ge)?,
            0x61 => self.compare(F64, Instr::F64Eq)?,
            0x62 => self.compare(F64, Instr::F64Ne)?,
            0x63 => self.compare(F64, Instr::F64Lt)?,
            0x64 => self.compare(F64, Instr::F64Gt)?,
            0x65 => self.compare(F64, Instr::F64Le)?,
            0x66 => self.compare(F64, Instr::F64Ge)?,

            0x67 => self.unary(I32, Instr::I32Clz)?,
            0x68 => self.unary(I32, Instr::I32Ctz)?,
            0x69 => self.unary(I32, Instr::I32Popcnt)?,
            0x6a => self.binary(I32, Instr::I32Add)?,
            0x6b => self.binary(I32, Instr::I32Sub)?,
            0x6c => self.binary(I32, Instr::I32Mul)?,
            0x6d => self.binary(I32, Instr::I32DivS)?,
            0x6e => self.binary(I32, Instr::I32DivU)?,
            0x6f => self.binary(I32, Instr::I32RemS)?,
            0x70 => self.binary(I32, Instr::I32RemU)?,
            0x71 => self.binary(I32, Instr::I32And)?,
            0x72 => self.binary(I32, Instr::I32Or)?,
            0x73 => self.binary(I32, Instr::I32Xor)?,
            0x74 => self.binary(I32, Instr::I32Shl)?,
            0x75 => self.binary(I32, Instr::I32ShrS)?,
            0x76 => self.binary(I32, Instr::I32ShrU)?,
            0x77 => self.binary(I32, Instr::I32Rotl)?,
            0x78 => self.binary(I32, Instr::I32Rotr)?,
            0x79 => self.unary(I64, Instr::I64Clz)?,
            0x7a => self.unary(I64, Instr::I64Ctz)?,
            0x7b => self.unary(I64, Instr::I64Popcnt)?,
            0x7c => self.binary(I64, Instr::I64Add)?,
            0x7d => self.binary(I64, Instr::I64Sub)?,
            0x7e => self.binary(I64, Instr::I64Mul)?,
            0x7f => self.binary(I64, Instr::I64DivS)?,
            0x80 => self.binary(I64, Instr::I64DivU)?,
            0x81 => self.binary(I64, Instr::I64RemS)?,
            0x82 => self.binary(I64, Instr::I64RemU)?,
            0x83 => self.binary(I64, Instr::I64And)?,
            0x84 => self.binary(I64, Instr::I64Or)?,
            0x85 => self.binary(I64, Instr::I64Xor)?,
            0x86 => self.binary(I64, Instr::I64Shl)?,
            0x87 => self.binary(I64, Instr::I64ShrS)?,
            0x88 => self.binary(I64, Instr::I64ShrU)?,
            0x89 => self.binary(I64, Instr::I64Rotl)?,
            0x8a => self.binary(I64, Instr::I64Rotr)?,

            0x8b => self.unary(F32, Instr::F32Abs)?,
            0x8c => self.unary(F32, Instr::F32Neg)?,
            0x8d => self.unary(F32, Instr::F32Ceil)?,
            0x8e => self.unary(F32, Instr::F32Floor)?,
            0x8f => self.unary(F32, Instr::F32Trunc)?,
            0x90 => self.unary(F32, Instr::F32Nearest)?,
            0x91 => self.unary(F32, Instr::F32Sqrt)?,
            0x92 => self.binary(F32, Instr::F32Add)?,
            0x93 => self.binary(F32, Instr::F32Sub)?,
            0x94 => self.binary(F32, Instr::F32Mul)?,
            0x95 => self.binary(F32, Instr::F32Div)?,
            0x96 => self.binary(F32, Instr::F32Min)?,
            0x97 => self.binary(F32, Instr::F32Max)?,
            0x98 => self.binary(F32, Instr::F32Copysign)?,
            0x99 => self.unary(F64, Instr::F64Abs)?,
            0x9a => self.unary(F64, Instr::F64Neg)?,
            0x9b => self.unary(F64, Instr::F64Ceil)?,
            0x9c => self.unary(F64, Instr::F64Floor)?,
            0x9d => self.unary(F64, Instr::F64Trunc)?,
            0x9e => self.unary(F64, Instr::F64Nearest)?,
            0x9f => self.unary(F64, Instr::F64Sqrt)?,
            0xa0 => self.binary(F64, Instr::F64Add)?,
            0xa1 => self.binary(F64, Instr::F64Sub)?,
            0xa2 => self.binary(F64, Instr::F64Mul)?,
            0xa3 => self.binary(F64, Instr::F64Div)?,
            0xa4 => self.binary(F64, Instr::F64Min)?,
            0xa5 => self.binary(F64, Instr::F64Max)?,
            0xa6 => self.binary(F64, Instr::F64Copysign)?,

            0xa7 => self.convert(I64, I32, Instr::I32WrapI64)?,
            0xa8 => self.convert(F32, I32, Instr::I32TruncF32S)?,
            0xa9 => self.convert(F32, I32, Instr::I32TruncF32U)?,
            0xaa => self.convert(F64, I32, Instr::I32TruncF64S)?,
            0xab => self.convert(F64, I32, Instr::I32TruncF64U)?,
            0xac => self.convert(I32, I64, Instr::I64ExtendI32S)?,
            0xad => self.convert(I32, I64, Instr::I64ExtendI32U)?,
            0xae => self.convert(F32, I64, Instr::I64TruncF32S)?,
            0xaf => self.convert(F32, I64, Instr::I64TruncF32U)?,
            0xb0 => self.convert(F64, I64, Instr::I64TruncF64S)?,
            0xb1 => self.convert(F64, I64, Instr::I64TruncF64U)?,
            0xb2 => self.convert(I32, F32, Instr::F32ConvertI32S)?,
            0xb3 => self.convert(I32, F32, Instr::F32ConvertI32U)?,
            0xb4 => self.convert(I64, F32, Instr::F32ConvertI64S)?,
            0xb5 => self.convert(I64, F32, Instr::F32ConvertI64U)?,
            0xb6 => self.convert(F64, F32, Instr::F32DemoteF64)?,
            0xb7 => self.convert(I32, F64, Instr::F64ConvertI32S)?,
            0xb8 => self.convert(I32, F64, Instr::F64ConvertI32U)?,
            0xb9 => self.convert(I64, F64, Instr::F64ConvertI64S)?,
            0xba => self.convert(I64, F64, Instr::F64ConvertI64U)?,
            0xbb => self.convert(F32, F64, Instr::F64PromoteF32)?,
            0xbc => self.convert(F32, I32, Instr::I32ReinterpretF32)?,
            0xbd => self.convert(F64, I64, Instr::I64ReinterpretF64)?,
            0xbe => self.convert(I32, F32, Instr::F32ReinterpretI32)?,
            0xbf => self.convert(I64, F64, Instr::F64ReinterpretI64)?,

            _ => {
                return Err(Error::malformed(format!("invalid opcode {opcode:#04x}")));
            }
        }
        Ok(())
    }
}
