use crate::{engine::Instr, Error, Result};

/// Extent and branch information of a compiled basic block, measured from its
/// instruction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockShape {
    /// Address of the first application instruction (the block tag)
    pub start: u64,
    /// One past the last application byte
    pub end: u64,
    /// Number of application instructions
    pub num_instrs: u32,
    /// Target of the last decoded conditional branch, if any
    pub cbr_target: Option<u64>,
}

impl BlockShape {
    /// Measures a block starting at `start`.
    ///
    /// Engine-inserted instructions are ignored. Application instructions must all carry
    /// an address at or above `start`; anything else means the engine stitched in code
    /// from elsewhere (elided jumps or calls), which makes the size meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ElisionUnsupported`] if an application instruction has no address
    /// or lies below `start`.
    pub fn measure(start: u64, instrs: &[Instr]) -> Result<Self> {
        let mut shape = Self {
            start,
            end: start,
            num_instrs: 0,
            cbr_target: None,
        };

        for instr in instrs.iter().filter(|instr| instr.is_app()) {
            let pc = instr
                .pc
                .filter(|&pc| pc >= start)
                .ok_or(Error::ElisionUnsupported(start))?;

            shape.end = shape.end.max(pc.saturating_add(u64::from(instr.length)));
            shape.num_instrs += 1;
            if instr.is_cbr() {
                shape.cbr_target = instr.target;
            }
        }

        Ok(shape)
    }

    /// Size of the block in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.end - self.start
    }
}
