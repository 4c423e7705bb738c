//! Gzip compression of serialized cache values.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use mnemos_core::{Error, Result};

/// Values strictly larger than `threshold` bytes are compressed.
pub fn should_compress(len: usize, threshold: usize) -> bool {
    len > threshold
}

/// Gzip `data` at the default compression level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Cache(format!("Compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::Cache(format!("Compression failed: {}", e)))
}

/// Inverse of [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Cache(format!("Decompression failed: {}", e)))?;
    Ok(out)
}
