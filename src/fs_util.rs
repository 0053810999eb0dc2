use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use crate::error::MarkerError;

pub fn gunzip_file(gz_path: &Path, target: &Path) -> Result<(), MarkerError> {
    let file = fs::File::open(gz_path)
        .map_err(|err| MarkerError::Filesystem(format!("open {}: {err}", gz_path.display())))?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(file));
    let mut outfile = BufWriter::new(
        fs::File::create(target)
            .map_err(|err| MarkerError::Filesystem(format!("create {}: {err}", target.display())))?,
    );
    io::copy(&mut decoder, &mut outfile).map_err(|err| {
        MarkerError::Filesystem(format!("decompress {}: {err}", gz_path.display()))
    })?;
    outfile
        .flush()
        .map_err(|err| MarkerError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn gzip_file(source: &Path, target: &Path) -> Result<(), MarkerError> {
    let mut input = BufReader::new(
        fs::File::open(source)
            .map_err(|err| MarkerError::Filesystem(format!("open {}: {err}", source.display())))?,
    );
    let outfile = fs::File::create(target)
        .map_err(|err| MarkerError::Filesystem(format!("create {}: {err}", target.display())))?;
    let mut encoder = GzEncoder::new(BufWriter::new(outfile), Compression::default());
    io::copy(&mut input, &mut encoder)
        .map_err(|err| MarkerError::Filesystem(format!("compress {}: {err}", source.display())))?;
    let mut writer = encoder
        .finish()
        .map_err(|err| MarkerError::Filesystem(err.to_string()))?;
    writer
        .flush()
        .map_err(|err| MarkerError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn remove_dir_if_exists(path: &Path) -> Result<(), MarkerError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(MarkerError::Filesystem(format!(
            "remove {}: {err}",
            path.display()
        ))),
    }
}

pub fn rename_if_exists(from: &Path, to: &Path) -> Result<bool, MarkerError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(MarkerError::Filesystem(format!(
            "rename {} to {}: {err}",
            from.display(),
            to.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_then_gunzip_restores_content() {
        let temp = tempfile::tempdir().unwrap();
        let plain = temp.path().join("genomes.tsv");
        let packed = temp.path().join("genomes.tsv.gz");
        let restored = temp.path().join("restored.tsv");
        fs::write(&plain, "genome\tspecies\nGUT_GENOME000001\t100001\n").unwrap();

        gzip_file(&plain, &packed).unwrap();
        gunzip_file(&packed, &restored).unwrap();

        assert_eq!(
            fs::read_to_string(&restored).unwrap(),
            "genome\tspecies\nGUT_GENOME000001\t100001\n"
        );
    }

    #[test]
    fn rename_missing_file_is_not_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let moved = rename_if_exists(&temp.path().join("a"), &temp.path().join("b")).unwrap();
        assert!(!moved);
    }
}
