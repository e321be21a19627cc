//! LD data parsing and the scan driver.
//!
//! The input is delimited text with configurable field separator and column
//! positions; columns may be addressed by 1-based index or by header name.
//! [`scan`] drives the callback interface the builder consumes: one event
//! per in-LD pair, one summary event at each index-variant boundary. The
//! same file is scanned once per builder pass, so scans must be
//! deterministic — they are a single forward read.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use ldlookup_core::{Error, LdPair, Result, VariantSummary};

/// How one input column is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSpec {
    /// 1-based column position.
    Position(usize),
    /// Column name, resolved against the header line.
    Name(String),
}

impl ColumnSpec {
    /// Interpret a user argument: a positive integer is a position,
    /// anything else is a header name.
    pub fn from_arg(arg: &str) -> Self {
        match arg.parse::<usize>() {
            Ok(position) if position >= 1 => ColumnSpec::Position(position),
            _ => ColumnSpec::Name(arg.to_string()),
        }
    }
}

/// Parser configuration: delimiter, column addressing, and the r² threshold
/// that decides which pairs count as "in LD".
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Field separator.
    pub delimiter: char,
    /// Column holding index variant IDs.
    pub index_id: ColumnSpec,
    /// Column holding surrogate variant IDs.
    pub ld_id: ColumnSpec,
    /// Column holding index variant MAFs.
    pub index_maf: ColumnSpec,
    /// Column holding r² values.
    pub r2: ColumnSpec,
    /// Minimum r² for a pair to be in LD.
    pub r2_threshold: f64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            delimiter: ' ',
            index_id: ColumnSpec::Name("SNP_A".into()),
            ld_id: ColumnSpec::Name("SNP_B".into()),
            index_maf: ColumnSpec::Name("MAF_A".into()),
            r2: ColumnSpec::Name("R2".into()),
            r2_threshold: 0.0,
        }
    }
}

impl ParserConfig {
    /// Whether any column is addressed by name, requiring the header line.
    pub fn needs_header(&self) -> bool {
        [&self.index_id, &self.ld_id, &self.index_maf, &self.r2]
            .iter()
            .any(|spec| matches!(spec, ColumnSpec::Name(_)))
    }
}

/// A resolved line parser with all columns as 0-based positions.
#[derive(Debug, Clone)]
pub struct LdPairParser {
    delimiter: char,
    index_id_column: usize,
    ld_id_column: usize,
    index_maf_column: usize,
    r2_column: usize,
    r2_threshold: f64,
}

impl LdPairParser {
    /// Resolve a [`ParserConfig`] into column positions.
    ///
    /// `header` must be the first input line when any column is addressed
    /// by name; a name not present there is an `InvalidColumn` error.
    pub fn resolve(config: &ParserConfig, header: Option<&str>) -> Result<Self> {
        let header_fields: Option<Vec<&str>> =
            header.map(|line| split_fields(line, config.delimiter));

        let resolve_one = |spec: &ColumnSpec| -> Result<usize> {
            match spec {
                ColumnSpec::Position(position) => Ok(position - 1),
                ColumnSpec::Name(name) => {
                    let fields = header_fields.as_ref().ok_or_else(|| {
                        Error::invalid_input(format!(
                            "column '{}' is addressed by name but no header was read",
                            name
                        ))
                    })?;
                    fields
                        .iter()
                        .position(|field| field == name)
                        .ok_or_else(|| Error::InvalidColumn {
                            column: name.clone(),
                        })
                }
            }
        };

        Ok(LdPairParser {
            delimiter: config.delimiter,
            index_id_column: resolve_one(&config.index_id)?,
            ld_id_column: resolve_one(&config.ld_id)?,
            index_maf_column: resolve_one(&config.index_maf)?,
            r2_column: resolve_one(&config.r2)?,
            r2_threshold: config.r2_threshold,
        })
    }

    /// The configured r² threshold.
    pub fn r2_threshold(&self) -> f64 {
        self.r2_threshold
    }

    /// Parse one line into an [`LdPair`].
    ///
    /// Returns `None` when the line is invalid: too few columns, MAF
    /// outside [0, 0.5], or r² outside [0, 1].
    pub fn parse_line(&self, line: &str) -> Option<LdPair> {
        let fields = split_fields(line, self.delimiter);
        let max_column = self
            .index_id_column
            .max(self.ld_id_column)
            .max(self.index_maf_column)
            .max(self.r2_column);
        if fields.len() <= max_column {
            return None;
        }

        let index_maf: f64 = fields[self.index_maf_column].parse().ok()?;
        if !(0.0..=0.5).contains(&index_maf) {
            return None;
        }

        let r2: f64 = fields[self.r2_column].parse().ok()?;
        if !(0.0..=1.0).contains(&r2) {
            return None;
        }

        Some(LdPair {
            index_id: fields[self.index_id_column].to_string(),
            ld_id: fields[self.ld_id_column].to_string(),
            index_maf,
            r2,
        })
    }
}

/// Counters reported by one [`scan`] over the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Lines read.
    pub n_lines: u64,
    /// Lines skipped as invalid (including a header line, if present).
    pub n_invalid: u64,
}

/// Scan an LD data file, driving the two builder callbacks.
///
/// `on_pair` fires for every pair at or above the r² threshold;
/// `on_summary` fires once per distinct `index_id`, after all of that
/// variant's rows have been seen. Invalid lines are logged and skipped.
/// An error from either callback aborts the scan.
pub fn scan<P, S>(
    path: &Path,
    parser: &LdPairParser,
    mut on_pair: P,
    mut on_summary: S,
) -> Result<ScanStats>
where
    P: FnMut(&LdPair) -> Result<()>,
    S: FnMut(&VariantSummary) -> Result<()>,
{
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })?;
    let reader = BufReader::new(file);

    let mut stats = ScanStats::default();
    let mut current: Option<VariantSummary> = None;

    for line in reader.lines() {
        let line = line?;
        stats.n_lines += 1;

        let Some(pair) = parser.parse_line(&line) else {
            warn!(line = %line, "ignoring invalid line");
            stats.n_invalid += 1;
            continue;
        };

        // Index variant boundary: flush the finished summary.
        if current
            .as_ref()
            .map_or(true, |summary| summary.variant_id != pair.index_id)
        {
            if let Some(summary) = current.take() {
                on_summary(&summary)?;
            }
            current = Some(VariantSummary {
                variant_id: pair.index_id.clone(),
                maf: pair.index_maf,
                n_surrogates: 0,
            });
        }

        if pair.is_in_ld(parser.r2_threshold) {
            let summary = current.as_mut().expect("summary exists for current pair");
            summary.n_surrogates += 1;
            on_pair(&pair)?;
        }
    }

    if let Some(summary) = current {
        on_summary(&summary)?;
    }

    Ok(stats)
}

/// Apply `f` to each query key: every line of `keys_file` (when given),
/// then each inline key.
pub fn for_each_key<F>(keys_file: Option<&Path>, inline_keys: &[String], mut f: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    if let Some(path) = keys_file {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound {
                path: path.to_path_buf(),
            },
            _ => Error::Io(e),
        })?;
        for line in BufReader::new(file).lines() {
            f(&line?)?;
        }
    }

    for key in inline_keys {
        f(key)?;
    }
    Ok(())
}

/// Split a line on `delimiter`, ignoring leading/consecutive delimiters.
fn split_fields(line: &str, delimiter: char) -> Vec<&str> {
    line.split(delimiter)
        .filter(|field| !field.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn positional_config(threshold: f64) -> ParserConfig {
        ParserConfig {
            delimiter: ' ',
            index_id: ColumnSpec::Position(1),
            ld_id: ColumnSpec::Position(2),
            index_maf: ColumnSpec::Position(3),
            r2: ColumnSpec::Position(4),
            r2_threshold: threshold,
        }
    }

    fn write_source(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn column_spec_from_arg() {
        assert_eq!(ColumnSpec::from_arg("3"), ColumnSpec::Position(3));
        assert_eq!(
            ColumnSpec::from_arg("SNP_A"),
            ColumnSpec::Name("SNP_A".into())
        );
        // 0 is not a valid 1-based position; treat it as a name.
        assert_eq!(ColumnSpec::from_arg("0"), ColumnSpec::Name("0".into()));
    }

    #[test]
    fn resolve_by_header_name() {
        let config = ParserConfig::default();
        assert!(config.needs_header());
        let parser =
            LdPairParser::resolve(&config, Some("CHR_A SNP_A MAF_A CHR_B SNP_B R2")).unwrap();
        let pair = parser
            .parse_line("1 rs1 0.10 1 rs2 0.95")
            .expect("valid line");
        assert_eq!(pair.index_id, "rs1");
        assert_eq!(pair.ld_id, "rs2");
        assert_eq!(pair.index_maf, 0.10);
        assert_eq!(pair.r2, 0.95);
    }

    #[test]
    fn resolve_unknown_column_fails() {
        let mut config = ParserConfig::default();
        config.r2 = ColumnSpec::Name("NO_SUCH".into());
        let err = LdPairParser::resolve(&config, Some("SNP_A SNP_B MAF_A R2")).unwrap_err();
        assert!(matches!(err, Error::InvalidColumn { .. }));
    }

    #[test]
    fn parse_line_validates_ranges() {
        let parser = LdPairParser::resolve(&positional_config(0.0), None).unwrap();
        assert!(parser.parse_line("rs1 rs2 0.10 0.9").is_some());
        // MAF above 0.5, below 0.
        assert!(parser.parse_line("rs1 rs2 0.51 0.9").is_none());
        assert!(parser.parse_line("rs1 rs2 -0.1 0.9").is_none());
        // r² out of [0, 1].
        assert!(parser.parse_line("rs1 rs2 0.10 1.5").is_none());
        // Unparseable numbers, short lines.
        assert!(parser.parse_line("rs1 rs2 maf 0.9").is_none());
        assert!(parser.parse_line("rs1 rs2 0.10").is_none());
        assert!(parser.parse_line("").is_none());
    }

    #[test]
    fn consecutive_delimiters_collapse() {
        let parser = LdPairParser::resolve(&positional_config(0.0), None).unwrap();
        let pair = parser.parse_line("  rs1   rs2  0.10  0.9").unwrap();
        assert_eq!(pair.index_id, "rs1");
        assert_eq!(pair.r2, 0.9);
    }

    #[test]
    fn scan_reports_boundaries_and_pairs() {
        let source = write_source(&[
            "rs1 rs2 0.10 0.9",
            "rs1 rs3 0.10 0.7",
            "rs1 rs4 0.10 0.4",
            "rs5 rs6 0.25 0.95",
        ]);
        let parser = LdPairParser::resolve(&positional_config(0.5), None).unwrap();

        let mut pairs = Vec::new();
        let mut summaries = Vec::new();
        let stats = scan(
            source.path(),
            &parser,
            |pair| {
                pairs.push((pair.index_id.clone(), pair.ld_id.clone()));
                Ok(())
            },
            |summary| {
                summaries.push(summary.clone());
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(stats.n_lines, 4);
        assert_eq!(stats.n_invalid, 0);
        // rs4 is excluded by the threshold.
        assert_eq!(
            pairs,
            vec![
                ("rs1".to_string(), "rs2".to_string()),
                ("rs1".to_string(), "rs3".to_string()),
                ("rs5".to_string(), "rs6".to_string()),
            ]
        );
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].variant_id, "rs1");
        assert_eq!(summaries[0].n_surrogates, 2);
        assert_eq!(summaries[1].variant_id, "rs5");
        assert_eq!(summaries[1].maf, 0.25);
        assert_eq!(summaries[1].n_surrogates, 1);
    }

    #[test]
    fn scan_skips_invalid_lines() {
        let source = write_source(&[
            "SNP_A SNP_B MAF_A R2", // header parses as invalid
            "rs1 rs2 0.10 0.9",
            "garbage",
            "rs1 rs3 0.10 0.8",
        ]);
        let parser = LdPairParser::resolve(&positional_config(0.5), None).unwrap();

        let mut n_pairs = 0;
        let mut summaries = Vec::new();
        let stats = scan(
            source.path(),
            &parser,
            |_| {
                n_pairs += 1;
                Ok(())
            },
            |summary| {
                summaries.push(summary.clone());
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(stats.n_invalid, 2);
        assert_eq!(n_pairs, 2);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].n_surrogates, 2);
    }

    #[test]
    fn scan_counts_below_threshold_variants() {
        // A variant whose every pair misses the threshold still gets a
        // summary, with zero surrogates.
        let source = write_source(&["rs1 rs2 0.10 0.1", "rs5 rs6 0.25 0.95"]);
        let parser = LdPairParser::resolve(&positional_config(0.5), None).unwrap();

        let mut summaries = Vec::new();
        scan(source.path(), &parser, |_| Ok(()), |s| {
            summaries.push(s.clone());
            Ok(())
        })
        .unwrap();

        assert_eq!(summaries[0].variant_id, "rs1");
        assert_eq!(summaries[0].n_surrogates, 0);
        assert_eq!(summaries[1].n_surrogates, 1);
    }

    #[test]
    fn scan_callback_errors_abort() {
        let source = write_source(&["rs1 rs2 0.10 0.9"]);
        let parser = LdPairParser::resolve(&positional_config(0.0), None).unwrap();
        let result = scan(
            source.path(),
            &parser,
            |_| Err(Error::ReadOnly),
            |_| Ok(()),
        );
        assert!(matches!(result, Err(Error::ReadOnly)));
    }

    #[test]
    fn for_each_key_merges_file_and_inline() {
        let keys_file = write_source(&["rs1", "rs2"]);
        let mut seen = Vec::new();
        for_each_key(
            Some(keys_file.path()),
            &["rs3".to_string()],
            |key| {
                seen.push(key.to_string());
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(seen, vec!["rs1", "rs2", "rs3"]);
    }
}
