use std::io::Write;

use flate2::{write::ZlibEncoder, Compression, Decompress, FlushDecompress, Status};

use crate::error::CorruptStream;

/// Output grows by at least this much whenever the inflater runs out of room.
const CHUNK: usize = 16 * 1024;

/// Streams `bytes` through a zlib encoder into `writer`, returning the writer.
pub fn compress_to<W: Write>(writer: W, bytes: &[u8]) -> std::io::Result<W> {
    let mut encoder = ZlibEncoder::new(writer, Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Wraps `bytes` in a zlib stream.
pub fn compress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    compress_to(Vec::with_capacity(bytes.len() / 2 + 16), bytes)
}

/// Inflates exactly one complete zlib stream.
///
/// The output buffer grows until the stream ends, so there is no upper bound on
/// the decompressed size. Running out of input before the end of the stream, or
/// finding bytes after it, is an error rather than a short read.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, CorruptStream> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(bytes.len().saturating_mul(2).max(CHUNK));
    loop {
        if out.len() == out.capacity() {
            out.reserve(out.capacity().max(CHUNK));
        }
        let consumed = inflater.total_in() as usize;
        let produced = inflater.total_out();
        let status = inflater
            .decompress_vec(&bytes[consumed..], &mut out, FlushDecompress::None)
            .map_err(|err| CorruptStream::InvalidData(err.to_string()))?;
        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                // There was spare output room, so no progress means no more input.
                if inflater.total_in() as usize == consumed && inflater.total_out() == produced {
                    return Err(CorruptStream::Truncated);
                }
            }
        }
    }
    let trailing = bytes.len() - inflater.total_in() as usize;
    if trailing > 0 {
        return Err(CorruptStream::TrailingBytes(trailing));
    }
    Ok(out)
}

#[test]
fn test_round_trip() {
    let original: &[u8] = b"blob 12\0hello world\n";
    assert_eq!(decompress(&compress(original).unwrap()).unwrap(), original);
}

#[test]
fn test_empty_input() {
    assert_eq!(decompress(&compress(b"").unwrap()).unwrap(), Vec::<u8>::new());
}

#[test]
fn test_grows_past_chunk_size() {
    // Highly compressible, so the inflated size dwarfs the initial capacity.
    let original = vec![7u8; 40 * CHUNK + 3];
    let compressed = compress(&original).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), original);
}

#[test]
fn test_truncated_stream() {
    let compressed = compress(b"tree 0\0").unwrap();
    let truncated = &compressed[..compressed.len() - 1];
    assert_eq!(decompress(truncated), Err(CorruptStream::Truncated));
    assert!(decompress(&compressed[..2]).is_err());
    assert!(decompress(&[]).is_err());
}

#[test]
fn test_not_zlib() {
    assert!(matches!(
        decompress(b"definitely not zlib"),
        Err(CorruptStream::InvalidData(_)) | Err(CorruptStream::Truncated)
    ));
}

#[test]
fn test_trailing_bytes() {
    let mut compressed = compress(b"blob 1\0x").unwrap();
    compressed.extend_from_slice(b"junk");
    assert!(matches!(
        decompress(&compressed),
        Err(CorruptStream::TrailingBytes(n)) if n > 0
    ));
}
