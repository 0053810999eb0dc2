use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::domain::SearchHit;
use crate::error::MarkerError;

pub const DEFAULT_MAX_EVALUE: f64 = 1e-5;
pub const DEFAULT_MIN_COVERAGE: f64 = 0.0;

// Zero-based domtblout columns.
const COL_QUERY: usize = 0;
const COL_QUERY_LEN: usize = 2;
const COL_TARGET: usize = 3;
const COL_TARGET_LEN: usize = 5;
const COL_EVALUE: usize = 12;
const COL_TARGET_FROM: usize = 15;
const COL_TARGET_TO: usize = 16;
const COL_QUERY_FROM: usize = 19;
const COL_QUERY_TO: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitThresholds {
    pub max_evalue: f64,
    pub min_coverage: f64,
}

impl Default for HitThresholds {
    fn default() -> Self {
        Self {
            max_evalue: DEFAULT_MAX_EVALUE,
            min_coverage: DEFAULT_MIN_COVERAGE,
        }
    }
}

impl HitThresholds {
    pub fn accepts(&self, hit: &SearchHit) -> bool {
        hit.evalue <= self.max_evalue && hit.min_coverage() >= self.min_coverage
    }
}

pub fn parse_line(line: &str, line_no: usize) -> Result<SearchHit, MarkerError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() <= COL_QUERY_TO {
        return Err(MarkerError::MalformedReport {
            line: line_no,
            reason: format!(
                "expected at least {} columns, found {}",
                COL_QUERY_TO + 1,
                fields.len()
            ),
        });
    }

    let number = |col: usize| -> Result<u64, MarkerError> {
        fields[col]
            .parse::<u64>()
            .map_err(|_| MarkerError::MalformedReport {
                line: line_no,
                reason: format!("column {} is not an integer: {}", col + 1, fields[col]),
            })
    };
    let coverage = |from: usize, to: usize, length: u64| -> Result<f64, MarkerError> {
        let (from, to) = (number(from)?, number(to)?);
        if length == 0 || to < from {
            return Err(MarkerError::MalformedReport {
                line: line_no,
                reason: format!("alignment {from}..{to} does not fit length {length}"),
            });
        }
        Ok((to - from + 1) as f64 / length as f64)
    };

    let query_length = number(COL_QUERY_LEN)?;
    let target_length = number(COL_TARGET_LEN)?;
    let evalue = fields[COL_EVALUE]
        .parse::<f64>()
        .ok()
        .filter(|value| !value.is_nan())
        .ok_or_else(|| MarkerError::MalformedReport {
            line: line_no,
            reason: format!("e-value is not a number: {}", fields[COL_EVALUE]),
        })?;

    Ok(SearchHit {
        query: fields[COL_QUERY].to_string(),
        target: fields[COL_TARGET].to_string(),
        evalue,
        query_coverage: coverage(COL_QUERY_FROM, COL_QUERY_TO, query_length)?,
        target_coverage: coverage(COL_TARGET_FROM, COL_TARGET_TO, target_length)?,
        query_length,
        target_length,
    })
}

pub fn parse_report<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = Result<SearchHit, MarkerError>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| match line {
            Ok(line) if line.starts_with('#') || line.trim().is_empty() => None,
            Ok(line) => Some(parse_line(&line, index + 1)),
            Err(err) => Some(Err(MarkerError::Filesystem(format!(
                "read search report: {err}"
            )))),
        })
}

/// Keeps the accepted hits, one per target. A later hit replaces the kept
/// one only with a strictly smaller e-value, so ties go to the earlier line.
/// Targets come out in the order they were first accepted.
pub fn select_hits<I>(hits: I, thresholds: &HitThresholds) -> Result<Vec<SearchHit>, MarkerError>
where
    I: IntoIterator<Item = Result<SearchHit, MarkerError>>,
{
    let mut best: Vec<SearchHit> = Vec::new();
    let mut slot_for_target: HashMap<String, usize> = HashMap::new();
    for hit in hits {
        let hit = hit?;
        if !thresholds.accepts(&hit) {
            continue;
        }
        match slot_for_target.get(&hit.target) {
            Some(&slot) => {
                if hit.evalue < best[slot].evalue {
                    best[slot] = hit;
                }
            }
            None => {
                slot_for_target.insert(hit.target.clone(), best.len());
                best.push(hit);
            }
        }
    }
    Ok(best)
}

pub fn find_hits(report: &Path, thresholds: &HitThresholds) -> Result<Vec<SearchHit>, MarkerError> {
    let file = File::open(report).map_err(|err| {
        MarkerError::Filesystem(format!("open search report {}: {err}", report.display()))
    })?;
    select_hits(parse_report(BufReader::new(file)), thresholds)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn domtbl_line(
        gene: &str,
        gene_len: u64,
        marker: &str,
        marker_len: u64,
        evalue: &str,
        marker_span: (u64, u64),
        gene_span: (u64, u64),
    ) -> String {
        format!(
            "{gene} - {gene_len} {marker} - {marker_len} 1e-50 170.2 0.1 1 1 1e-52 {evalue} 169.9 0.1 {} {} {} {} {} {} 0.98 desc",
            marker_span.0, marker_span.1, gene_span.0, gene_span.1, gene_span.0, gene_span.1
        )
    }

    #[test]
    fn parses_columns_and_coverage() {
        let line = domtbl_line("g1", 200, "B000032", 100, "1e-20", (1, 50), (11, 110));
        let hit = parse_line(&line, 1).unwrap();
        assert_eq!(hit.query, "g1");
        assert_eq!(hit.target, "B000032");
        assert_eq!(hit.evalue, 1e-20);
        assert_eq!(hit.query_length, 200);
        assert_eq!(hit.target_length, 100);
        assert!((hit.query_coverage - 0.5).abs() < 1e-12);
        assert!((hit.target_coverage - 0.5).abs() < 1e-12);
    }

    #[test]
    fn short_line_is_malformed() {
        let err = parse_line("g1 - 200 B1", 7).unwrap_err();
        assert_matches!(err, MarkerError::MalformedReport { line: 7, .. });
    }

    #[test]
    fn comments_and_blank_lines_skipped() {
        let report = format!(
            "# header\n\n{}\n# trailer\n",
            domtbl_line("g1", 100, "B1", 100, "1e-10", (1, 100), (1, 100))
        );
        let hits = parse_report(report.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn stronger_first_hit_is_kept() {
        let report = [
            domtbl_line("g1", 100, "B1", 100, "1e-10", (1, 100), (1, 100)),
            domtbl_line("g2", 100, "B1", 100, "1e-5", (1, 100), (1, 100)),
        ]
        .join("\n");
        let hits = select_hits(parse_report(report.as_bytes()), &HitThresholds::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].query, "g1");
    }

    #[test]
    fn stronger_second_hit_replaces() {
        let report = [
            domtbl_line("g1", 100, "B1", 100, "1e-5", (1, 100), (1, 100)),
            domtbl_line("g2", 100, "B1", 100, "1e-10", (1, 100), (1, 100)),
        ]
        .join("\n");
        let hits = select_hits(parse_report(report.as_bytes()), &HitThresholds::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].query, "g2");
    }

    #[test]
    fn equal_evalue_keeps_earlier() {
        let report = [
            domtbl_line("g1", 100, "B1", 100, "1e-8", (1, 100), (1, 100)),
            domtbl_line("g2", 100, "B1", 100, "1e-8", (1, 100), (1, 100)),
        ]
        .join("\n");
        let hits = select_hits(parse_report(report.as_bytes()), &HitThresholds::default()).unwrap();
        assert_eq!(hits[0].query, "g1");
    }

    #[test]
    fn thresholds_filter_hits() {
        let report = [
            domtbl_line("weak", 100, "B1", 100, "1e-3", (1, 100), (1, 100)),
            domtbl_line("partial", 100, "B2", 100, "1e-30", (1, 100), (1, 20)),
            domtbl_line("good", 100, "B3", 100, "1e-30", (1, 90), (1, 90)),
        ]
        .join("\n");
        let thresholds = HitThresholds {
            max_evalue: 1e-5,
            min_coverage: 0.5,
        };
        let hits = select_hits(parse_report(report.as_bytes()), &thresholds).unwrap();
        let genes: Vec<_> = hits.iter().map(|hit| hit.query.as_str()).collect();
        assert_eq!(genes, vec!["good"]);
    }

    #[test]
    fn evalue_at_threshold_is_accepted() {
        let line = domtbl_line("g1", 100, "B1", 100, "1e-5", (1, 100), (1, 100));
        let hit = parse_line(&line, 1).unwrap();
        assert!(HitThresholds::default().accepts(&hit));
    }

    #[test]
    fn selection_is_idempotent() {
        let report = [
            domtbl_line("g1", 100, "B1", 100, "1e-7", (1, 100), (1, 100)),
            domtbl_line("g2", 120, "B2", 100, "1e-9", (1, 100), (1, 100)),
            domtbl_line("g3", 100, "B1", 100, "1e-12", (1, 100), (1, 100)),
        ]
        .join("\n");
        let thresholds = HitThresholds::default();
        let first = select_hits(parse_report(report.as_bytes()), &thresholds).unwrap();
        let second = select_hits(parse_report(report.as_bytes()), &thresholds).unwrap();
        assert_eq!(first, second);
        let genes: Vec<_> = first.iter().map(|hit| hit.query.as_str()).collect();
        assert_eq!(genes, vec!["g3", "g2"]);
    }
}
