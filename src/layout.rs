use crate::domain::{GenomeId, WorkItem};

pub const DEFAULT_MARKER_SET: &str = "phyeco";
pub const ITEM_LOG: &str = "marker_genes.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    marker_set: String,
}

impl Default for RemoteLayout {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_SET)
    }
}

impl RemoteLayout {
    pub fn new(marker_set: &str) -> Self {
        Self {
            marker_set: marker_set.to_string(),
        }
    }

    pub fn marker_set(&self) -> &str {
        &self.marker_set
    }

    pub fn catalog(&self) -> String {
        "genomes.tsv.gz".to_string()
    }

    pub fn marker_model(&self) -> String {
        format!("marker_genes/{}/marker_genes.hmm.gz", self.marker_set)
    }

    pub fn annotation(&self, item: &WorkItem, file_name: &str) -> String {
        format!(
            "gene_annotations/{}/{}/{file_name}",
            item.species_id, item.genome_id
        )
    }

    pub fn proteins(&self, item: &WorkItem) -> String {
        self.annotation(item, &format!("{}.faa.gz", item.genome_id))
    }

    pub fn genes(&self, item: &WorkItem) -> String {
        self.annotation(item, &format!("{}.ffn.gz", item.genome_id))
    }

    pub fn output_dir(&self, item: &WorkItem) -> String {
        format!(
            "marker_genes/{}/temp/{}/{}",
            self.marker_set, item.species_id, item.genome_id
        )
    }

    pub fn output(&self, item: &WorkItem, file_name: &str) -> String {
        format!("{}/{file_name}.gz", self.output_dir(item))
    }

    pub fn completion_marker(&self, item: &WorkItem) -> String {
        self.output(item, &Artifacts::for_genome(&item.genome_id).marker)
    }

    pub fn all_outputs(&self, item: &WorkItem) -> Vec<String> {
        let artifacts = Artifacts::for_genome(&item.genome_id);
        artifacts
            .all()
            .chain(std::iter::once(ITEM_LOG))
            .map(|name| self.output(item, name))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub report: String,
    pub sequences: String,
    pub marker: String,
}

impl Artifacts {
    pub fn for_genome(genome_id: &GenomeId) -> Self {
        Self {
            report: format!("{genome_id}.hmmsearch"),
            sequences: format!("{genome_id}.markers.fa"),
            marker: format!("{genome_id}.markers.map"),
        }
    }

    pub fn quarantined_report(&self) -> String {
        format!("{}.bogus", self.report)
    }

    pub fn non_final(&self) -> [&str; 2] {
        [self.report.as_str(), self.sequences.as_str()]
    }

    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.non_final()
            .into_iter()
            .chain(std::iter::once(self.marker.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> WorkItem {
        WorkItem::new(
            "GUT_GENOME000001".parse().unwrap(),
            "100001".parse().unwrap(),
        )
    }

    #[test]
    fn layout_keys() {
        let layout = RemoteLayout::default();
        let item = item();
        assert_eq!(
            layout.proteins(&item),
            "gene_annotations/100001/GUT_GENOME000001/GUT_GENOME000001.faa.gz"
        );
        assert_eq!(
            layout.completion_marker(&item),
            "marker_genes/phyeco/temp/100001/GUT_GENOME000001/GUT_GENOME000001.markers.map.gz"
        );
        assert_eq!(layout.marker_model(), "marker_genes/phyeco/marker_genes.hmm.gz");
    }

    #[test]
    fn marker_is_last_artifact() {
        let artifacts = Artifacts::for_genome(&item().genome_id);
        assert_eq!(artifacts.all().last(), Some("GUT_GENOME000001.markers.map"));
        assert!(!artifacts.non_final().contains(&artifacts.marker.as_str()));
    }

    #[test]
    fn all_outputs_include_log() {
        let outputs = RemoteLayout::default().all_outputs(&item());
        assert_eq!(outputs.len(), 4);
        assert!(outputs.iter().any(|key| key.ends_with("/marker_genes.log.gz")));
    }
}
