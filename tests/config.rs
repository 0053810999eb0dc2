use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use marker_gene_builder::config::{ConfigLoader, StoreLocation};
use marker_gene_builder::error::MarkerError;

#[test]
fn resolve_reads_explicit_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("marker-genes.json");
    std::fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "store": { "local": "/mnt/igg" },
            "work_dir": "/scratch/marker-genes",
            "marker_set": "phyeco",
            "hmmsearch": "/opt/hmmer/bin/hmmsearch",
            "search_threads": 2,
            "max_evalue": 1e-10,
            "jobs": 16,
            "retries": 5,
            "retry_delay_ms": 50
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.store, StoreLocation::Local(Utf8PathBuf::from("/mnt/igg")));
    assert_eq!(resolved.work_dir, Utf8PathBuf::from("/scratch/marker-genes"));
    assert_eq!(resolved.search_threads, 2);
    assert_eq!(resolved.jobs, 16);
    assert_eq!(resolved.settings.thresholds.max_evalue, 1e-10);
    assert_eq!(resolved.settings.retry.retries, 5);
    assert_eq!(
        resolved.settings.layout.marker_model(),
        "marker_genes/phyeco/marker_genes.hmm.gz"
    );
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(MarkerError::ConfigRead(_))
    );
}

#[test]
fn rejects_non_http_store_url() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("marker-genes.json");
    std::fs::write(&path, r#"{ "store": { "http": "s3://bucket/igg" } }"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(MarkerError::ConfigParse(message)) if message.contains("s3://bucket/igg")
    );
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("marker-genes.json");
    std::fs::write(&path, "{ \"jobs\": ").unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(MarkerError::ConfigParse(_))
    );
}
