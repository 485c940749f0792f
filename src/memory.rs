use crate::trap::Trap;
use crate::types::Limits;
use crate::WASM_PAGE_SIZE;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// A shared handle to a linear memory: a contiguous byte buffer sized in
/// 64KiB pages.
///
/// Cloning the handle aliases the same buffer, which is how an imported
/// memory is shared between the providing and the consuming instance. The
/// core assumes exclusive access; sharing a memory across threads requires
/// external synchronization.
#[derive(Debug, Clone)]
pub struct Memory {
    data: Rc<RefCell<Vec<u8>>>,
}

impl Memory {
    /// Allocates a zero-filled memory of `pages` pages.
    pub fn new(pages: u32) -> Self {
        Self {
            data: Rc::new(RefCell::new(vec![
                0;
                pages as usize * WASM_PAGE_SIZE as usize
            ])),
        }
    }

    /// The current size in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.data.borrow().len()
    }

    /// The current size in pages.
    pub fn size_in_pages(&self) -> u32 {
        (self.size_in_bytes() / WASM_PAGE_SIZE as usize) as u32
    }

    /// Borrows the backing bytes.
    pub fn data(&self) -> Ref<'_, Vec<u8>> {
        self.data.borrow()
    }

    /// Mutably borrows the backing bytes. Host functions may use this to
    /// exchange data with the guest.
    pub fn data_mut(&self) -> RefMut<'_, Vec<u8>> {
        self.data.borrow_mut()
    }

    /// Grows the memory by `delta` pages, zero-filling the new pages.
    /// Returns the previous page count, or `None` if growing would exceed
    /// `limit_pages` (the `memory.grow` instruction then yields -1 and the
    /// memory is left unchanged).
    pub(crate) fn grow(&self, delta: u32, limit_pages: u32) -> Option<u32> {
        let current = self.size_in_pages();
        let new = u64::from(current) + u64::from(delta);
        if new > u64::from(limit_pages) {
            return None;
        }
        tracing::trace!(current, delta, "growing memory");
        self.data
            .borrow_mut()
            .resize(new as usize * WASM_PAGE_SIZE as usize, 0);
        Some(current)
    }

    fn bounds_check(&self, addr: u32, offset: u32, width: usize) -> Result<usize, Trap> {
        // The effective address is computed in 64 bits; a 32-bit sum could
        // wrap and alias low memory.
        let effective = u64::from(addr) + u64::from(offset);
        if effective + width as u64 > self.size_in_bytes() as u64 {
            return Err(Trap::MemoryOutOfBounds);
        }
        Ok(effective as usize)
    }

    pub(crate) fn load<const N: usize>(&self, addr: u32, offset: u32) -> Result<[u8; N], Trap> {
        let start = self.bounds_check(addr, offset, N)?;
        let data = self.data.borrow();
        let mut buf = [0; N];
        buf.copy_from_slice(&data[start..start + N]);
        Ok(buf)
    }

    pub(crate) fn store<const N: usize>(
        &self,
        addr: u32,
        offset: u32,
        bytes: [u8; N],
    ) -> Result<(), Trap> {
        let start = self.bounds_check(addr, offset, N)?;
        let mut data = self.data.borrow_mut();
        data[start..start + N].copy_from_slice(&bytes);
        Ok(())
    }
}

/// An imported or exported memory: the shared buffer plus the limits it was
/// declared with.
#[derive(Debug, Clone)]
pub struct ExternalMemory {
    pub memory: Memory,
    pub limits: Limits,
}
