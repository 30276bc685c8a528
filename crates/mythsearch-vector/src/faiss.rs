//! Reader and writer for FAISS flat index files.
//!
//! Only the `IndexFlat` family is supported: fourcc `IxFI` (inner product),
//! `IxF2` (L2) or `IxFl` (metric taken from the header). All integers are
//! little-endian:
//!
//! ```text
//! fourcc[4] d:i32 ntotal:i64 dummy:i64 dummy:i64 is_trained:u8 metric_type:i32
//! [metric_arg:f32 if metric_type > 1] n_floats:u64 floats:f32[n_floats]
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use mythsearch_core::traits::VectorIndex;
use mythsearch_core::types::Metric;
use mythsearch_core::{Error, Result};

use crate::flat::FlatIndex;

const FLAT_IP: &[u8; 4] = b"IxFI";
const FLAT_L2: &[u8; 4] = b"IxF2";
const FLAT: &[u8; 4] = b"IxFl";
const METRIC_INNER_PRODUCT: i32 = 0;
const METRIC_L2: i32 = 1;
const HEADER_DUMMY: i64 = 1 << 20;
const MAX_FLOATS: u64 = 1 << 40;

pub fn read_flat(path: &Path) -> Result<FlatIndex> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::MissingData(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let index = read_flat_from(BufReader::new(file), path)?;
    info!(path = %path.display(), rows = index.len(), dim = index.dim(), metric = ?index.metric(), "loaded flat index");
    Ok(index)
}

/// Parses a flat index from `reader`; `path` only labels errors.
pub fn read_flat_from<R: Read>(mut reader: R, path: &Path) -> Result<FlatIndex> {
    let corrupt = |reason: String| Error::CorruptIndex { path: path.to_path_buf(), reason };
    let mut r = Fields { reader: &mut reader, path };

    let fourcc = r.bytes::<4>()?;
    if &fourcc != FLAT_IP && &fourcc != FLAT_L2 && &fourcc != FLAT {
        return Err(corrupt(format!("unsupported index type {:?}", String::from_utf8_lossy(&fourcc))));
    }
    let dim = r.i32()?;
    let ntotal = r.i64()?;
    let _dummy = r.i64()?;
    let _dummy = r.i64()?;
    let _is_trained = r.bytes::<1>()?;
    let metric_type = r.i32()?;
    if metric_type > 1 {
        let _metric_arg = r.bytes::<4>()?;
    }
    let metric = match metric_type {
        METRIC_INNER_PRODUCT => Metric::InnerProduct,
        METRIC_L2 => Metric::L2,
        other => return Err(corrupt(format!("unsupported metric type {other}"))),
    };
    if dim <= 0 || ntotal < 0 {
        return Err(corrupt(format!("invalid header: d={dim} ntotal={ntotal}")));
    }

    let n_floats = u64::from_le_bytes(r.bytes::<8>()?);
    let expected = (dim as u64).checked_mul(ntotal as u64);
    if n_floats >= MAX_FLOATS || expected != Some(n_floats) {
        return Err(corrupt(format!("vector payload holds {n_floats} floats, header implies d={dim} x ntotal={ntotal}")));
    }
    // Grow with the bytes actually present; the header alone is not trusted.
    let expected_bytes = n_floats * 4;
    let mut raw = Vec::new();
    r.reader.by_ref().take(expected_bytes).read_to_end(&mut raw)?;
    if raw.len() as u64 != expected_bytes {
        return Err(corrupt(format!("truncated file: {} of {expected_bytes} payload bytes", raw.len())));
    }
    let vectors = raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    FlatIndex::new(dim as usize, metric, vectors).map_err(|e| corrupt(e.to_string()))
}

pub fn write_flat(path: &Path, index: &FlatIndex) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_flat_to(&mut out, index)?;
    out.flush()?;
    Ok(())
}

pub fn write_flat_to<W: Write>(out: &mut W, index: &FlatIndex) -> io::Result<()> {
    let (fourcc, metric_type) = match index.metric() {
        Metric::InnerProduct => (FLAT_IP, METRIC_INNER_PRODUCT),
        Metric::L2 => (FLAT_L2, METRIC_L2),
    };
    out.write_all(fourcc)?;
    out.write_all(&(index.dim() as i32).to_le_bytes())?;
    out.write_all(&(index.len() as i64).to_le_bytes())?;
    out.write_all(&HEADER_DUMMY.to_le_bytes())?;
    out.write_all(&HEADER_DUMMY.to_le_bytes())?;
    out.write_all(&[1u8])?;
    out.write_all(&metric_type.to_le_bytes())?;
    out.write_all(&(index.vectors().len() as u64).to_le_bytes())?;
    for v in index.vectors() {
        out.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

struct Fields<'a, R: Read> {
    reader: &'a mut R,
    path: &'a Path,
}

impl<R: Read> Fields<'_, R> {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => Error::CorruptIndex { path: PathBuf::from(self.path), reason: "truncated file".into() },
            _ => Error::Io(e),
        })
    }

    fn bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.bytes::<4>()?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.bytes::<8>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encoded(index: &FlatIndex) -> Vec<u8> {
        let mut buf = Vec::new();
        write_flat_to(&mut buf, index).unwrap();
        buf
    }

    #[test]
    fn header_layout_matches_faiss() {
        let index = FlatIndex::new(3, Metric::InnerProduct, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let buf = encoded(&index);
        assert_eq!(&buf[0..4], b"IxFI");
        assert_eq!(i32::from_le_bytes(buf[4..8].try_into().unwrap()), 3);
        assert_eq!(i64::from_le_bytes(buf[8..16].try_into().unwrap()), 2);
        assert_eq!(buf[32], 1);
        assert_eq!(i32::from_le_bytes(buf[33..37].try_into().unwrap()), METRIC_INNER_PRODUCT);
        assert_eq!(u64::from_le_bytes(buf[37..45].try_into().unwrap()), 6);
        assert_eq!(buf.len(), 45 + 6 * 4);

        let back = read_flat_from(Cursor::new(buf), Path::new("mem")).unwrap();
        assert_eq!(back.vectors(), index.vectors());
        assert_eq!(back.metric(), Metric::InnerProduct);
    }

    #[test]
    fn rejects_other_index_types() {
        let mut buf = encoded(&FlatIndex::new(2, Metric::L2, vec![0.0; 4]).unwrap());
        buf[0..4].copy_from_slice(b"IHNf");
        let err = read_flat_from(Cursor::new(buf), Path::new("hnsw.index")).unwrap_err();
        assert!(matches!(err, Error::CorruptIndex { .. }), "{err:?}");
        assert!(err.is_fatal());
    }

    #[test]
    fn rejects_truncated_payload() {
        let buf = encoded(&FlatIndex::new(2, Metric::L2, vec![0.5; 8]).unwrap());
        let err = read_flat_from(Cursor::new(&buf[..buf.len() - 3]), Path::new("t.index")).unwrap_err();
        assert!(err.to_string().contains("truncated"), "{err}");
    }

    #[test]
    fn oversized_header_on_a_short_file_is_corrupt() {
        let mut buf = encoded(&FlatIndex::new(2, Metric::L2, vec![0.5; 4]).unwrap());
        let (d, ntotal) = (1i32 << 20, 1i64 << 19);
        buf[4..8].copy_from_slice(&d.to_le_bytes());
        buf[8..16].copy_from_slice(&ntotal.to_le_bytes());
        buf[37..45].copy_from_slice(&((d as u64) * (ntotal as u64)).to_le_bytes());
        let err = read_flat_from(Cursor::new(buf), Path::new("huge.index")).unwrap_err();
        assert!(matches!(err, Error::CorruptIndex { .. }), "{err:?}");
        assert!(err.is_fatal());
    }

    #[test]
    fn rejects_payload_size_disagreeing_with_header() {
        let mut buf = encoded(&FlatIndex::new(2, Metric::L2, vec![0.5; 8]).unwrap());
        buf[8..16].copy_from_slice(&5i64.to_le_bytes());
        assert!(read_flat_from(Cursor::new(buf), Path::new("t.index")).is_err());
    }
}
