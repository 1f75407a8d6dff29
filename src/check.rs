//! Conditional-branch edge coverage.
//!
//! A conditional branch has two successors: its taken target and its fall-through. The
//! check approximates "direction never taken" by asking whether each successor was itself
//! ever recorded as a block start. This needs two passes over the records, since a
//! branch's target may be compiled (and recorded) long after the branch itself:
//!
//! 1. collect the unique block starts of every module
//! 2. collect the unique branch edges of every module and test each against pass 1
//!
//! Records without a resolvable module, as well as records naming a module the check does
//! not know about, fall into one extra "unknown" bucket. The per-module sets only live for
//! the duration of [`CoverageReport::check`]; the report keeps counters and misses.

use std::{collections::HashSet, io::Write};

use strum::Display;

use crate::{block::BlockRecord, dump, module::ModuleSummary, Result};

/// Which successor of a conditional branch an edge leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EdgeKind {
    /// The taken branch target
    #[strum(serialize = "target")]
    Target,
    /// The address right after the branch block
    #[strum(serialize = "fallthrough")]
    Fallthrough,
}

/// A branch edge whose destination was never seen as a block start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeMiss {
    /// Module bucket; equal to the number of modules for the unknown bucket
    pub bucket: usize,
    /// Start offset of the block ending in the branch
    pub from: u32,
    /// Destination offset that was never entered
    pub to: u32,
    /// Successor kind
    pub kind: EdgeKind,
}

/// Branch coverage statistics of one module bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleCoverage {
    /// Unique block start offsets
    pub blocks: usize,
    /// Unique branch targets
    pub targets: usize,
    /// Branch targets never seen as a block start
    pub target_misses: usize,
    /// Unique fall-through addresses
    pub fallthroughs: usize,
    /// Fall-through addresses never seen as a block start
    pub fallthrough_misses: usize,
}

impl ModuleCoverage {
    /// Total number of unexercised edges.
    #[must_use]
    pub fn misses(&self) -> usize {
        self.target_misses + self.fallthrough_misses
    }
}

/// Result of a coverage check over one block table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoverageReport {
    modules: Vec<ModuleCoverage>,
    misses: Vec<EdgeMiss>,
}

impl CoverageReport {
    /// Runs the two-pass check over `records` for a table of `num_modules` modules.
    ///
    /// The records are iterated twice and are not modified, so checking the same records
    /// again yields an identical report.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bbcov::{block::{BlockDetail, BlockRecord}, check::CoverageReport};
    ///
    /// let branch = BlockDetail { cbr_target: 0x20, num_instrs: 2, trace: false };
    /// let records = [
    ///     BlockRecord::new(0, 0x10, 4)?.with_detail(branch),
    ///     BlockRecord::new(0, 0x20, 4)?,
    /// ];
    ///
    /// let report = CoverageReport::check(&records, 1);
    /// assert_eq!(report.module(0).unwrap().fallthrough_misses, 1);
    /// # Ok::<(), bbcov::Error>(())
    /// ```
    pub fn check<'a, I>(records: I, num_modules: usize) -> Self
    where
        I: IntoIterator<Item = &'a BlockRecord> + Clone,
    {
        let buckets = num_modules + 1;
        let bucket_of = |record: &BlockRecord| {
            let id = record.module_id as usize;
            if record.is_unknown_module() || id >= num_modules {
                num_modules
            } else {
                id
            }
        };

        let mut report = Self {
            modules: vec![ModuleCoverage::default(); buckets],
            misses: Vec::new(),
        };

        let mut starts: Vec<HashSet<u32>> = vec![HashSet::new(); buckets];
        for record in records.clone() {
            let bucket = bucket_of(record);
            if starts[bucket].insert(record.start) {
                report.modules[bucket].blocks += 1;
            }
        }

        let mut edges: Vec<HashSet<u32>> = vec![HashSet::new(); buckets];
        for record in records {
            let Some(target) = record.branch_target() else {
                continue;
            };
            let bucket = bucket_of(record);

            for (to, kind) in [
                (target, EdgeKind::Target),
                (record.fallthrough(), EdgeKind::Fallthrough),
            ] {
                if !edges[bucket].insert(to) {
                    continue;
                }

                let hit = starts[bucket].contains(&to);
                let coverage = &mut report.modules[bucket];
                match kind {
                    EdgeKind::Target => {
                        coverage.targets += 1;
                        coverage.target_misses += usize::from(!hit);
                    }
                    EdgeKind::Fallthrough => {
                        coverage.fallthroughs += 1;
                        coverage.fallthrough_misses += usize::from(!hit);
                    }
                }
                if !hit {
                    report.misses.push(EdgeMiss {
                        bucket,
                        from: record.start,
                        to,
                        kind,
                    });
                }
            }
        }

        report
    }

    /// Statistics of module `id`, or of the unknown bucket when `id` equals the number of
    /// modules.
    #[must_use]
    pub fn module(&self, id: usize) -> Option<&ModuleCoverage> {
        self.modules.get(id)
    }

    /// Statistics of blocks outside every known module.
    #[must_use]
    pub fn unknown(&self) -> &ModuleCoverage {
        &self.modules[self.modules.len() - 1]
    }

    /// Number of known modules the report was computed for.
    #[must_use]
    pub fn num_modules(&self) -> usize {
        self.modules.len().saturating_sub(1)
    }

    /// Unexercised edges in the order they were found.
    #[must_use]
    pub fn misses(&self) -> &[EdgeMiss] {
        &self.misses
    }

    /// Sum of the statistics of every bucket.
    #[must_use]
    pub fn totals(&self) -> ModuleCoverage {
        self.modules
            .iter()
            .fold(ModuleCoverage::default(), |mut total, module| {
                total.blocks += module.blocks;
                total.targets += module.targets;
                total.target_misses += module.target_misses;
                total.fallthroughs += module.fallthroughs;
                total.fallthrough_misses += module.fallthrough_misses;
                total
            })
    }

    /// Writes the report in the coverage result format.
    ///
    /// Unless `summary_only` is set, every miss is listed first. Each module in `modules`
    /// is then printed with its summary line followed by its statistics. The unknown
    /// bucket is only printed if it holds any block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if writing fails.
    pub fn write<W: Write>(
        &self,
        writer: &mut W,
        modules: &[ModuleSummary],
        summary_only: bool,
    ) -> Result<()> {
        if !summary_only {
            writeln!(writer, "conditional branch not exercised:")?;
            for miss in &self.misses {
                if miss.bucket == self.num_modules() {
                    write!(writer, "module[  ?]: ")?;
                } else {
                    write!(writer, "module[{:3}]: ", miss.bucket)?;
                }
                writeln!(writer, "{:#010x} to {:#010x}", miss.from, miss.to)?;
            }
        }

        let with_metadata = modules
            .iter()
            .any(|module| module.descriptor.has_platform_metadata());
        writeln!(writer, "Summary:")?;
        writeln!(writer, "module {}", dump::module_columns(with_metadata))?;
        for module in modules {
            dump::write_module_line(writer, module, with_metadata)?;
            let coverage = self
                .module(module.id as usize)
                .filter(|_| (module.id as usize) < self.num_modules())
                .copied()
                .unwrap_or_default();
            write_coverage(writer, &coverage)?;
        }

        let unknown = self.unknown();
        if unknown.blocks != 0 {
            writeln!(writer, "basic blocks from unknown module")?;
            write_coverage(writer, unknown)?;
        }
        Ok(())
    }
}

fn write_coverage<W: Write>(writer: &mut W, coverage: &ModuleCoverage) -> Result<()> {
    writeln!(writer, "\tunique basic blocks seen: {},", coverage.blocks)?;
    writeln!(
        writer,
        "\tunique conditional branch targets: {}, not exercised: {},",
        coverage.targets, coverage.target_misses
    )?;
    writeln!(
        writer,
        "\tunique conditional branch fallthroughs: {}, not exercised: {},",
        coverage.fallthroughs, coverage.fallthrough_misses
    )?;
    Ok(())
}
