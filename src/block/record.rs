//! Basic-block records.

use crate::{module::ModuleEntry, Error, Result};

/// Module id stored for blocks outside every known module.
pub const UNKNOWN_MODULE: u32 = u32::MAX;

/// Branch-coverage detail attached to a record when coverage checking is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockDetail {
    /// Offset of the conditional branch target ending the block, `0` if there is none
    pub cbr_target: u32,
    /// Number of application instructions in the block
    pub num_instrs: u16,
    /// The block was built as part of a trace
    pub trace: bool,
}

impl BlockDetail {
    /// Builds the detail for a block, encoding the branch target the same way as the
    /// block start: relative to the module base, or truncated when the module is unknown.
    ///
    /// A target below the module base wraps; it is still checked, and can only ever miss.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlockTooLarge`] if `num_instrs` does not fit 16 bits.
    pub fn locate(
        module: Option<&ModuleEntry>,
        cbr_target: Option<u64>,
        num_instrs: u32,
        trace: bool,
    ) -> Result<Self> {
        let num_instrs =
            u16::try_from(num_instrs).map_err(|_| Error::BlockTooLarge(u64::from(num_instrs)))?;
        let cbr_target = match (cbr_target, module) {
            (None, _) => 0,
            (Some(target), Some(module)) => target.wrapping_sub(module.start()) as u32,
            (Some(target), None) => target as u32,
        };

        Ok(Self {
            cbr_target,
            num_instrs,
            trace,
        })
    }
}

/// One observation of a compiled basic block.
///
/// Records are immutable once appended. The same block may be recorded many times
/// (retranslation, trace building, several threads); duplicates are meaningful and are
/// never merged at this level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRecord {
    /// Module id, or [`UNKNOWN_MODULE`]
    pub module_id: u32,
    /// Offset from the module base, or the truncated raw address for unknown modules
    pub start: u32,
    /// Size of the block in bytes
    pub size: u16,
    /// Branch-coverage detail, present when coverage checking is enabled
    pub detail: Option<BlockDetail>,
}

impl BlockRecord {
    /// Creates a plain record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlockTooLarge`] if `size` exceeds 65535 bytes.
    pub fn new(module_id: u32, start: u32, size: u64) -> Result<Self> {
        let size = u16::try_from(size).map_err(|_| Error::BlockTooLarge(size))?;
        Ok(Self {
            module_id,
            start,
            size,
            detail: None,
        })
    }

    /// Creates a record for a block at `address`, relative to `module` if it is known.
    ///
    /// # Errors
    ///
    /// - [`Error::BlockTooLarge`] if `size` exceeds 65535 bytes
    /// - [`Error::ModuleIdOverflow`] if the module id collides with [`UNKNOWN_MODULE`]
    /// - [`Error::OffsetOverflow`] if the address is not a 32-bit offset into the module
    pub fn locate(module: Option<&ModuleEntry>, address: u64, size: u64) -> Result<Self> {
        let Some(module) = module else {
            return Self::new(UNKNOWN_MODULE, address as u32, size);
        };

        if module.id >= UNKNOWN_MODULE {
            return Err(Error::ModuleIdOverflow(u64::from(module.id)));
        }

        let base = module.start();
        let offset = address
            .checked_sub(base)
            .and_then(|offset| u32::try_from(offset).ok())
            .ok_or(Error::OffsetOverflow { address, base })?;

        Self::new(module.id, offset, size)
    }

    /// Attaches branch-coverage detail.
    #[must_use]
    pub fn with_detail(mut self, detail: BlockDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Returns `true` if the block lies outside every known module.
    #[must_use]
    pub fn is_unknown_module(&self) -> bool {
        self.module_id == UNKNOWN_MODULE
    }

    /// The conditional branch target ending this block, if any.
    #[must_use]
    pub fn branch_target(&self) -> Option<u32> {
        self.detail
            .map(|detail| detail.cbr_target)
            .filter(|&target| target != 0)
    }

    /// The address right after the block, where a not-taken branch continues.
    #[must_use]
    pub fn fallthrough(&self) -> u32 {
        self.start.wrapping_add(u32::from(self.size))
    }
}
