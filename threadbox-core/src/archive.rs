//! Archive encoder: packages an ordered sequence of `(member_name, bytes)`
//! into a single ZIP byte string (spec §4.E).

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::ZipWriter;

/// Encode `members` (already ordered by the caller) as a ZIP archive.
/// Member names must use forward slashes with no leading `/`.
pub fn encode_zip(members: &[(String, Vec<u8>)]) -> std::io::Result<Vec<u8>> {
    let cursor = Cursor::new(Vec::new());
    let mut writer = ZipWriter::new(cursor);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in members {
        writer
            .start_file(name, options)
            .map_err(to_io_error)?;
        writer.write_all(content)?;
    }

    let cursor = writer.finish().map_err(to_io_error)?;
    Ok(cursor.into_inner())
}

fn to_io_error(e: zip::result::ZipError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e)
}
