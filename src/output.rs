use std::io::{self, Write};

use serde::Serialize;

use crate::dispatch::{ItemStatus, RunSummary};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_run(summary: &RunSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_run(&mut stdout, summary)
    }

    pub fn write_run<W: Write>(out: &mut W, summary: &RunSummary) -> io::Result<()> {
        for item in &summary.items {
            let status = match &item.status {
                ItemStatus::Completed { markers } => format!("completed ({markers} markers)"),
                ItemStatus::Skipped => "skipped (already complete)".to_string(),
                ItemStatus::Pending => "pending".to_string(),
                ItemStatus::Failed { error } => format!("failed: {error}"),
            };
            writeln!(out, "{}\t{}\t{status}", item.genome_id, item.species_id)?;
        }
        let completed = summary.count(|status| matches!(status, ItemStatus::Completed { .. }));
        let skipped = summary.count(|status| matches!(status, ItemStatus::Skipped));
        let pending = summary.count(|status| matches!(status, ItemStatus::Pending));
        writeln!(
            out,
            "{} genomes: {completed} completed, {skipped} skipped, {pending} pending, {} failed",
            summary.items.len(),
            summary.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ItemOutcome;

    fn outcome(genome: &str, status: ItemStatus) -> ItemOutcome {
        ItemOutcome {
            genome_id: genome.parse().unwrap(),
            species_id: "100001".parse().unwrap(),
            status,
        }
    }

    #[test]
    fn human_summary_lists_each_genome() {
        let summary = RunSummary {
            items: vec![
                outcome("GUT_GENOME000001", ItemStatus::Completed { markers: 12 }),
                outcome("GUT_GENOME000002", ItemStatus::Skipped),
                outcome(
                    "GUT_GENOME000003",
                    ItemStatus::Failed {
                        error: "search tool failed: exit status 1".to_string(),
                    },
                ),
            ],
        };
        let mut buffer = Vec::new();
        HumanOutput::write_run(&mut buffer, &summary).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "GUT_GENOME000001\t100001\tcompleted (12 markers)");
        assert!(lines[2].ends_with("failed: search tool failed: exit status 1"));
        assert_eq!(
            lines[3],
            "3 genomes: 1 completed, 1 skipped, 0 pending, 1 failed"
        );
    }

    #[test]
    fn json_outcome_is_flat() {
        let value = serde_json::to_value(outcome(
            "GUT_GENOME000001",
            ItemStatus::Completed { markers: 3 },
        ))
        .unwrap();
        assert_eq!(value["genome_id"], "GUT_GENOME000001");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["markers"], 3);
    }
}
