use std::path::{Path, PathBuf};

use anyhow::bail;
use bbcov::check::{CoverageReport, ModuleCoverage};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{load_dump, ModuleInfo},
    output::{hex32, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub path: String,
    pub modules: Vec<ModuleResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown: Option<Coverage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub misses: Vec<MissInfo>,
    pub total: Coverage,
}

#[derive(Debug, Serialize)]
pub struct ModuleResult {
    #[serde(flatten)]
    pub module: ModuleInfo,
    pub coverage: Coverage,
}

#[derive(Debug, Serialize)]
pub struct Coverage {
    pub blocks: usize,
    pub targets: usize,
    pub target_misses: usize,
    pub fallthroughs: usize,
    pub fallthrough_misses: usize,
}

impl From<&ModuleCoverage> for Coverage {
    fn from(coverage: &ModuleCoverage) -> Self {
        Self {
            blocks: coverage.blocks,
            targets: coverage.targets,
            target_misses: coverage.target_misses,
            fallthroughs: coverage.fallthroughs,
            fallthrough_misses: coverage.fallthrough_misses,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MissInfo {
    pub module: Option<u32>,
    pub from: u32,
    pub to: u32,
    pub kind: String,
}

fn check_one(path: &Path, summary_only: bool) -> anyhow::Result<CheckResult> {
    let dump = load_dump(path)?;
    if !dump.detailed && !dump.records.is_empty() {
        bail!(
            "{} was recorded without branch detail; rerun the collector with -check_cbr",
            path.display()
        );
    }

    let report = CoverageReport::check(&dump.records, dump.modules.len());
    let modules = dump
        .modules
        .iter()
        .map(|module| ModuleResult {
            module: ModuleInfo::from(module),
            coverage: report
                .module(module.id as usize)
                .map(Coverage::from)
                .unwrap_or_else(|| Coverage::from(&ModuleCoverage::default())),
        })
        .collect();

    let unknown = Some(report.unknown())
        .filter(|unknown| unknown.blocks != 0)
        .map(Coverage::from);

    let misses = if summary_only {
        Vec::new()
    } else {
        report
            .misses()
            .iter()
            .map(|miss| MissInfo {
                module: u32::try_from(miss.bucket)
                    .ok()
                    .filter(|_| miss.bucket < report.num_modules()),
                from: miss.from,
                to: miss.to,
                kind: miss.kind.to_string(),
            })
            .collect()
    };

    Ok(CheckResult {
        path: path.display().to_string(),
        modules,
        unknown,
        misses,
        total: Coverage::from(&report.totals()),
    })
}

fn print_result(result: &CheckResult) {
    println!("{}:", result.path);

    if !result.misses.is_empty() {
        println!("  Not exercised ({}):", result.misses.len());
        let mut misses = TabWriter::new(&[
            ("MODULE", Align::Right),
            ("FROM", Align::Left),
            ("TO", Align::Left),
            ("EDGE", Align::Left),
        ])
        .indent("    ");
        for miss in &result.misses {
            misses.row(vec![
                miss.module.map_or_else(|| "?".to_string(), |id| id.to_string()),
                hex32(miss.from),
                hex32(miss.to),
                miss.kind.clone(),
            ]);
        }
        misses.print();
    }

    let mut summary = TabWriter::new(&[
        ("MODULE", Align::Right),
        ("BLOCKS", Align::Right),
        ("TARGETS", Align::Right),
        ("MISSED", Align::Right),
        ("FALLTHROUGHS", Align::Right),
        ("MISSED", Align::Right),
        ("PATH", Align::Left),
    ])
    .indent("  ");
    let mut row = |label: String, coverage: &Coverage, path: &str| {
        summary.row(vec![
            label,
            coverage.blocks.to_string(),
            coverage.targets.to_string(),
            coverage.target_misses.to_string(),
            coverage.fallthroughs.to_string(),
            coverage.fallthrough_misses.to_string(),
            path.to_string(),
        ]);
    };
    for module in &result.modules {
        row(module.module.id.to_string(), &module.coverage, &module.module.path);
    }
    if let Some(unknown) = &result.unknown {
        row("?".to_string(), unknown, "<unknown module>");
    }
    row("total".to_string(), &result.total, "");
    summary.print();
}

pub fn run(paths: &[PathBuf], summary_only: bool, opts: &GlobalOptions) -> anyhow::Result<()> {
    let results = paths
        .par_iter()
        .map(|path| check_one(path, summary_only))
        .collect::<anyhow::Result<Vec<_>>>()?;

    print_output(&results, opts, |results| {
        for (i, result) in results.iter().enumerate() {
            if i > 0 {
                println!();
            }
            print_result(result);
        }
    })
}
