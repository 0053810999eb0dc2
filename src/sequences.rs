use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::MarkerError;

pub type GeneSequences = HashMap<String, String>;

pub fn read_fasta<R: BufRead>(reader: R) -> Result<GeneSequences, MarkerError> {
    let mut sequences = GeneSequences::new();
    let mut current: Option<(String, String)> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| MarkerError::MalformedFasta(err.to_string()))?;
        let line = line.trim_end();
        if let Some(header) = line.strip_prefix('>') {
            if let Some((id, seq)) = current.take() {
                sequences.insert(id, seq);
            }
            let id = header.split_whitespace().next().ok_or_else(|| {
                MarkerError::MalformedFasta(format!("line {}: empty record header", index + 1))
            })?;
            current = Some((id.to_string(), String::new()));
        } else if !line.is_empty() {
            let Some((_, seq)) = current.as_mut() else {
                return Err(MarkerError::MalformedFasta(format!(
                    "line {}: sequence data before the first header",
                    index + 1
                )));
            };
            seq.push_str(&line.to_ascii_uppercase());
        }
    }
    if let Some((id, seq)) = current {
        sequences.insert(id, seq);
    }
    Ok(sequences)
}

pub fn load_genes(path: &Path) -> Result<GeneSequences, MarkerError> {
    let file = File::open(path).map_err(|err| {
        MarkerError::Filesystem(format!("open gene sequences {}: {err}", path.display()))
    })?;
    read_fasta(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn multi_line_records_are_uppercased() {
        let fasta = ">g1 hypothetical protein\natgc\nAAtt\n>g2\nggg\n\n";
        let genes = read_fasta(fasta.as_bytes()).unwrap();
        assert_eq!(genes.len(), 2);
        assert_eq!(genes["g1"], "ATGCAATT");
        assert_eq!(genes["g2"], "GGG");
    }

    #[test]
    fn data_before_header_is_rejected() {
        let err = read_fasta("ACGT\n>g1\nA\n".as_bytes()).unwrap_err();
        assert_matches!(err, MarkerError::MalformedFasta(_));
    }

    #[test]
    fn empty_record_is_kept() {
        let genes = read_fasta(">g1\n>g2\nAC\n".as_bytes()).unwrap();
        assert_eq!(genes["g1"], "");
        assert_eq!(genes["g2"], "AC");
    }
}
