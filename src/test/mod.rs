//! Helpers shared by the unit tests.


pub use engine::MockEngine;

use crate::{
    block::{BlockDetail, BlockRecord},
    engine::ModuleDescriptor,
};

// Helper function to create a module descriptor without metadata
pub fn module_descriptor(start: u64, end: u64, path: &str) -> ModuleDescriptor {
    ModuleDescriptor::new(start, end, path)
}

// Helper function to create a plain record
pub fn record(module_id: u32, start: u32, size: u64) -> BlockRecord {
    BlockRecord::new(module_id, start, size).unwrap()
}

// Helper function to create a record of a block ending in a conditional branch
pub fn branch_record(module_id: u32, start: u32, size: u64, target: u32) -> BlockRecord {
    record(module_id, start, size).with_detail(BlockDetail {
        cbr_target: target,
        num_instrs: 1,
        trace: false,
    })
}
