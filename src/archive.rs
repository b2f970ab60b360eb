use crate::pipeline::OutputFile;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Packs every output of a batch into one deflated zip.
pub fn bundle(files: &[OutputFile]) -> Result<Vec<u8>, ArchiveError> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for file in files {
            zip.start_file(file.name.as_str(), options)?;
            zip.write_all(&file.bytes)?;
        }
        zip.finish()?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::OutputKind;
    use std::io::Read;

    #[test]
    fn entries_round_trip_through_the_zip() {
        let files = vec![
            OutputFile {
                name: "packingroom_pick_list.csv".to_string(),
                kind: OutputKind::Csv,
                bytes: b"HAZMAT PICK LIST\n".to_vec(),
            },
            OutputFile {
                name: "warehouse_labels.pdf".to_string(),
                kind: OutputKind::Pdf,
                bytes: b"%PDF-1.5".to_vec(),
            },
        ];
        let bytes = bundle(&files).expect("bundle");

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("open");
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_name("packingroom_pick_list.csv").expect("entry");
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut text = String::new();
        entry.read_to_string(&mut text).expect("read");
        assert_eq!(text, "HAZMAT PICK LIST\n");
    }

    #[test]
    fn empty_batch_is_an_empty_zip() {
        let bytes = bundle(&[]).expect("bundle");
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("open");
        assert_eq!(archive.len(), 0);
    }
}
