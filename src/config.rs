//! Collector options.
//!
//! The engine hands the collector a single option string, e.g.
//! `-dump_text -logdir "/tmp/cov out" -check_cbr`. It is split into tokens (double quotes
//! group), the single-dash engine spelling is mapped to long flags, and the result is
//! parsed with clap. Any problem is reported as [`Error::Usage`] before instrumentation
//! starts.

use std::path::PathBuf;

use clap::Parser;

use crate::{dump::DumpFormat, Error, Result};

#[derive(Debug, Parser)]
#[command(
    name = "bbcov",
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct OptionArgs {
    /// Write the block table as text
    #[arg(long = "dump_text")]
    dump_text: bool,

    /// Write the block table as raw records
    #[arg(long = "dump_binary")]
    dump_binary: bool,

    /// Convert termination of other processes into a nudge
    #[arg(long = "nudge_kills", overrides_with = "no_nudge_kills")]
    nudge_kills: bool,

    /// Let termination of other processes through untouched
    #[arg(long = "no_nudge_kills", overrides_with = "nudge_kills")]
    no_nudge_kills: bool,

    /// Directory for dump and result files
    #[arg(long = "logdir", value_name = "DIR")]
    logdir: Option<PathBuf>,

    /// Run threads natively until this thread starts
    #[arg(
        long = "native_until_thread",
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    native_until_thread: Option<u32>,

    /// Diagnostic verbosity
    #[arg(long = "verbose", value_name = "N", default_value_t = 0)]
    verbose: u32,

    /// Check conditional branch edge coverage
    #[arg(long = "check_cbr")]
    check_cbr: bool,

    /// Only print the per-module coverage summary
    #[arg(long = "summary_only", requires = "check_cbr")]
    summary_only: bool,
}

/// Normalized collector options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Block table is written as text
    pub dump_text: bool,
    /// Block table is written as raw records
    pub dump_binary: bool,
    /// Termination of other processes is converted into a nudge (on by default)
    pub nudge_kills: bool,
    /// Output directory; defaults to the directory of the collector library
    pub logdir: Option<PathBuf>,
    /// Thread count at which natively running threads are retaken; `0` disables
    pub native_until_thread: u32,
    /// Diagnostic verbosity
    pub verbose: u32,
    /// Conditional branch coverage is checked
    pub check_cbr: bool,
    /// Uncovered edges are not listed
    pub summary_only: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dump_text: false,
            dump_binary: true,
            nudge_kills: true,
            logdir: None,
            native_until_thread: 0,
            verbose: 0,
            check_cbr: false,
            summary_only: false,
        }
    }
}

impl Options {
    /// Parses an engine option string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] for unknown options, missing or invalid option values,
    /// unbalanced quotes, and `-summary_only` without `-check_cbr`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bbcov::{config::Options, dump::DumpFormat};
    ///
    /// let options = Options::parse_str("-dump_text -check_cbr -verbose 2")?;
    /// assert_eq!(options.format(), DumpFormat::Text);
    /// assert!(options.check_cbr);
    /// assert!(options.nudge_kills);
    ///
    /// assert!(Options::parse_str("-summary_only").is_err());
    /// # Ok::<(), bbcov::Error>(())
    /// ```
    pub fn parse_str(options: &str) -> Result<Self> {
        Self::parse_tokens(tokenize(options)?)
    }

    /// Parses already split engine option tokens.
    ///
    /// # Errors
    ///
    /// See [`Options::parse_str`].
    pub fn parse_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = tokens.into_iter().map(|token| {
            let token = token.into();
            match token.strip_prefix('-') {
                Some(name) if !name.starts_with('-') && !name.is_empty() => format!("--{name}"),
                _ => token,
            }
        });

        let args = OptionArgs::try_parse_from(args)
            .map_err(|error| Error::Usage(error.render().to_string().trim().to_string()))?;
        Ok(Self::from(args))
    }

    /// The active block table encoding.
    #[must_use]
    pub fn format(&self) -> DumpFormat {
        if self.dump_text {
            DumpFormat::Text
        } else {
            DumpFormat::Binary
        }
    }

    /// Returns `true` if threads start out running natively.
    #[must_use]
    pub fn starts_native(&self) -> bool {
        self.native_until_thread > 0
    }
}

impl From<OptionArgs> for Options {
    fn from(args: OptionArgs) -> Self {
        // Both or neither selects binary.
        let dump_text = args.dump_text && !args.dump_binary;

        Self {
            dump_text,
            dump_binary: !dump_text,
            nudge_kills: args.nudge_kills || !args.no_nudge_kills,
            logdir: args.logdir,
            native_until_thread: args.native_until_thread.unwrap_or(0),
            verbose: args.verbose,
            check_cbr: args.check_cbr,
            summary_only: args.summary_only,
        }
    }
}

/// Splits an option string on whitespace; double quotes group a token.
fn tokenize(options: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;

    for c in options.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quoted {
        return Err(Error::Usage(format!("unbalanced quote in '{options}'")));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::parse_str("").unwrap();
        assert_eq!(options, Options::default());
        assert_eq!(options.format(), DumpFormat::Binary);
        assert!(options.nudge_kills);
        assert!(!options.starts_native());
    }

    #[test]
    fn format_normalization() {
        let text = Options::parse_str("-dump_text").unwrap();
        assert!(text.dump_text && !text.dump_binary);

        let both = Options::parse_str("-dump_text -dump_binary").unwrap();
        assert!(!both.dump_text && both.dump_binary);
        assert_eq!(both.format(), DumpFormat::Binary);
    }

    #[test]
    fn last_nudge_flag_wins() {
        assert!(!Options::parse_str("-no_nudge_kills").unwrap().nudge_kills);
        assert!(Options::parse_str("-no_nudge_kills -nudge_kills").unwrap().nudge_kills);
        assert!(!Options::parse_str("-nudge_kills -no_nudge_kills").unwrap().nudge_kills);
    }

    #[test]
    fn values() {
        let options =
            Options::parse_str(r#"-logdir "/tmp/cov out" -native_until_thread 3 -verbose 2"#).unwrap();
        assert_eq!(options.logdir, Some(PathBuf::from("/tmp/cov out")));
        assert_eq!(options.native_until_thread, 3);
        assert!(options.starts_native());
        assert_eq!(options.verbose, 2);
    }

    #[test]
    fn usage_errors() {
        for bad in [
            "-bogus",
            "-logdir",
            "-verbose",
            "-verbose x",
            "-native_until_thread 0",
            "-native_until_thread -1",
            "-summary_only",
            "-logdir \"/tmp",
        ] {
            let err = Options::parse_str(bad).unwrap_err();
            assert!(err.is_usage(), "{bad}: {err}");
        }

        let options = Options::parse_str("-check_cbr -summary_only").unwrap();
        assert!(options.check_cbr && options.summary_only);
    }

    #[test]
    fn tokens() {
        assert_eq!(
            tokenize("  -a  \"b c\" d\"e\" ").unwrap(),
            vec!["-a", "b c", "de"]
        );
        assert!(tokenize("").unwrap().is_empty());
    }
}
