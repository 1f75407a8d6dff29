use std::{collections::HashSet, path::Path};

use bbcov::dump::Dump;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{load_dump, module_label, ModuleInfo},
    output::{hex32, hex64, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct DumpInfo {
    pub path: String,
    pub version: u32,
    pub format: String,
    pub detailed: bool,
    pub record_count: usize,
    pub unique_blocks: usize,
    pub unknown_records: usize,
    pub modules: Vec<ModuleBlocks>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<BlockInfo>,
}

#[derive(Debug, Serialize)]
pub struct ModuleBlocks {
    #[serde(flatten)]
    pub module: ModuleInfo,
    pub records: usize,
    pub unique_blocks: usize,
}

#[derive(Debug, Serialize)]
pub struct BlockInfo {
    pub module: String,
    pub start: u32,
    pub size: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cbr_target: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_instrs: Option<u16>,
}

fn summarize(path: &Path, dump: &Dump, with_blocks: bool) -> DumpInfo {
    let unique: HashSet<(u32, u32)> = dump
        .records
        .iter()
        .map(|record| (record.module_id, record.start))
        .collect();

    let modules = dump
        .modules
        .iter()
        .map(|module| {
            let records = dump
                .records
                .iter()
                .filter(|record| record.module_id == module.id)
                .count();
            let unique_blocks = unique.iter().filter(|(id, _)| *id == module.id).count();
            ModuleBlocks {
                module: ModuleInfo::from(module),
                records,
                unique_blocks,
            }
        })
        .collect();

    let blocks = if with_blocks {
        dump.records
            .iter()
            .map(|record| BlockInfo {
                module: module_label(record.module_id),
                start: record.start,
                size: record.size,
                cbr_target: record.detail.map(|detail| detail.cbr_target),
                trace: record.detail.map(|detail| detail.trace),
                num_instrs: record.detail.map(|detail| detail.num_instrs),
            })
            .collect()
    } else {
        Vec::new()
    };

    DumpInfo {
        path: path.display().to_string(),
        version: dump.version,
        format: dump.format.to_string(),
        detailed: dump.detailed,
        record_count: dump.records.len(),
        unique_blocks: unique.len(),
        unknown_records: dump
            .records
            .iter()
            .filter(|record| record.is_unknown_module())
            .count(),
        modules,
        blocks,
    }
}

pub fn run(path: &Path, with_blocks: bool, opts: &GlobalOptions) -> anyhow::Result<()> {
    let dump = load_dump(path)?;
    let info = summarize(path, &dump, with_blocks);

    print_output(&info, opts, |info| {
        println!("Dump:           {}", info.path);
        println!("Version:        {}", info.version);
        println!(
            "Encoding:       {}{}",
            info.format,
            if info.detailed { " (branch detail)" } else { "" }
        );
        println!("Records:        {}", info.record_count);
        println!("Unique blocks:  {}", info.unique_blocks);
        println!("Unknown module: {}", info.unknown_records);
        println!();

        println!("Modules ({}):", info.modules.len());
        let mut modules = TabWriter::new(&[
            ("ID", Align::Right),
            ("BASE", Align::Left),
            ("END", Align::Left),
            ("STATE", Align::Left),
            ("RECORDS", Align::Right),
            ("UNIQUE", Align::Right),
            ("PATH", Align::Left),
        ])
        .indent("  ");
        for entry in &info.modules {
            modules.row(vec![
                entry.module.id.to_string(),
                hex64(entry.module.base),
                hex64(entry.module.end),
                entry.module.state.clone(),
                entry.records.to_string(),
                entry.unique_blocks.to_string(),
                entry.module.path.clone(),
            ]);
        }
        modules.print();

        if !info.blocks.is_empty() {
            println!();
            println!("Blocks:");
            let mut columns = vec![
                ("MODULE", Align::Right),
                ("START", Align::Left),
                ("SIZE", Align::Right),
            ];
            if info.detailed {
                columns.extend([
                    ("CBR TGT", Align::Left),
                    ("TRACE", Align::Right),
                    ("#INSTR", Align::Right),
                ]);
            }

            let mut blocks = TabWriter::new(&columns).indent("  ");
            for block in &info.blocks {
                let mut row = vec![block.module.clone(), hex32(block.start), block.size.to_string()];
                if info.detailed {
                    row.push(block.cbr_target.map_or_else(String::new, hex32));
                    row.push(block.trace.map_or_else(String::new, |t| u8::from(t).to_string()));
                    row.push(block.num_instrs.map_or_else(String::new, |n| n.to_string()));
                }
                blocks.row(row);
            }
            blocks.print();
        }
    })
}
