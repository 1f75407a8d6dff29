use std::path::Path;

use anyhow::Context;
use bbcov::{
    block::UNKNOWN_MODULE,
    dump::{Dump, UNKNOWN_NAME},
    module::ModuleSummary,
};
use serde::Serialize;

/// Map and parse a dump file.
pub fn load_dump(path: &Path) -> anyhow::Result<Dump> {
    let dump = Dump::from_file(path)
        .with_context(|| format!("failed to load dump: {}", path.display()))?;
    log::debug!(
        "{}: {} modules, {} records",
        path.display(),
        dump.modules.len(),
        dump.records.len()
    );
    Ok(dump)
}

/// Serializable view of one module table entry.
#[derive(Debug, Serialize)]
pub struct ModuleInfo {
    pub id: u32,
    pub base: u64,
    pub end: u64,
    pub entry: u64,
    pub state: String,
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u32>,
}

impl From<&ModuleSummary> for ModuleInfo {
    fn from(module: &ModuleSummary) -> Self {
        let descriptor = &module.descriptor;
        Self {
            id: module.id,
            base: descriptor.start,
            end: descriptor.end,
            entry: descriptor.entry_point,
            state: module.state.to_string(),
            name: descriptor
                .name
                .clone()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            path: descriptor.path.clone(),
            checksum: descriptor.checksum,
            timestamp: descriptor.timestamp,
        }
    }
}

/// Display label of a module id.
pub fn module_label(id: u32) -> String {
    if id == UNKNOWN_MODULE {
        "?".to_string()
    } else {
        id.to_string()
    }
}
