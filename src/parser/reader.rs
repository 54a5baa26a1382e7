//! Input opening and line decoding
//!
//! Tag logs are ISO-8859-1 text, sometimes gzip-compressed. Compression is
//! recognised from a `.gz` name or from the magic bytes. Each byte decodes
//! to the code point of the same value, so decoding never fails.

use crate::constants::GZIP_MAGIC;
use crate::error::{Result, TagError};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Iterator over ISO-8859-1 decoded lines, line endings removed
pub struct LatinLines<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: BufRead> LatinLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(256),
        }
    }
}

impl<R: BufRead> Iterator for LatinLines<R> {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                let mut bytes = self.buffer.as_slice();
                if let Some(stripped) = bytes.strip_suffix(b"\n") {
                    bytes = stripped;
                }
                if let Some(stripped) = bytes.strip_suffix(b"\r") {
                    bytes = stripped;
                }
                Some(Ok(decode_latin1(bytes)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Decode ISO-8859-1 bytes
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Open a tag log, transparently decompressing gzip input
///
/// Input is treated as gzip when its name ends in `.gz` or it starts with the gzip magic.
pub fn open_input(path: &Path) -> Result<LatinLines<Box<dyn BufRead + Send>>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TagError::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => TagError::Io(e),
    })?;

    let mut reader = BufReader::new(file);
    let is_gzip = has_gzip_extension(path) || reader.fill_buf()?.starts_with(&GZIP_MAGIC);

    let inner: Box<dyn BufRead + Send> = if is_gzip {
        debug!("Reading gzip-compressed input: {}", path.display());
        Box::new(BufReader::new(MultiGzDecoder::new(reader)))
    } else {
        Box::new(reader)
    };

    Ok(LatinLines::new(inner))
}

fn has_gzip_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}
