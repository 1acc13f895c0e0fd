//! Streaming loaders for the lookup-table format.
//!
//! 2D tables are read whole. 4D tables are never read whole: exactly the two
//! altitude layers bounding the requested coordinate are pulled in with a
//! single seek, keeping load latency and memory bounded for multi-gigabyte
//! tables.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use crate::error::TableLoadError;
use crate::format::{
    Header2d, Header4d, HEADER_2D_BYTES, HEADER_4D_BYTES, LOADED_ALTITUDE_LAYERS,
};
use crate::slice::AltitudeSlice;

/// A fully-loaded 2D table in row-major RGBA order.
#[derive(Debug, Clone)]
pub struct Table2d {
    pub width: u16,
    pub height: u16,
    pub subpixels: Vec<f32>,
}

/// The two resident altitude layers of a 4D table, flattened for upload as
/// a `tex_width × tex_height × 2` 3D texture.
#[derive(Debug, Clone)]
pub struct Table4d {
    pub header: Header4d,
    pub slice: AltitudeSlice,
    pub subpixels: Vec<f32>,
}

fn read_f32s<R: Read>(
    reader: &mut R,
    count: u64,
    path: &Path,
) -> Result<Vec<f32>, TableLoadError> {
    let mut bytes = vec![0u8; (count * 4) as usize];
    reader
        .read_exact(&mut bytes)
        .map_err(|source| TableLoadError::Payload {
            path: path.display().to_string(),
            source,
        })?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn open(path: &Path) -> Result<BufReader<File>, TableLoadError> {
    let file = File::open(path).map_err(|source| TableLoadError::Open {
        path: path.display().to_string(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Load a whole 2D table.
pub fn load_table_2d(path: &Path) -> Result<Table2d, TableLoadError> {
    let mut reader = open(path)?;

    let mut header_bytes = [0u8; HEADER_2D_BYTES];
    reader
        .read_exact(&mut header_bytes)
        .map_err(|source| TableLoadError::Header {
            path: path.display().to_string(),
            source,
        })?;
    let header = Header2d::from_bytes(header_bytes);
    if header.width == 0 || header.height == 0 {
        return Err(TableLoadError::EmptyDimension {
            path: path.display().to_string(),
        });
    }
    debug!(
        "loading 2D table \"{}\": {}×{}",
        path.display(),
        header.width,
        header.height
    );

    let subpixels = read_f32s(&mut reader, header.subpixel_count(), path)?;
    Ok(Table2d {
        width: header.width,
        height: header.height,
        subpixels,
    })
}

/// Load the two altitude layers of a 4D table bounding `altitude_coord`
/// (unit range). The seek target is the byte offset of the floor layer; the
/// following layer is read contiguously.
pub fn load_table_4d(path: &Path, altitude_coord: f64) -> Result<Table4d, TableLoadError> {
    let mut reader = open(path)?;

    let mut header_bytes = [0u8; HEADER_4D_BYTES];
    reader
        .read_exact(&mut header_bytes)
        .map_err(|source| TableLoadError::Header {
            path: path.display().to_string(),
            source,
        })?;
    let header = Header4d::from_bytes(header_bytes);
    if header.dim0 == 0 || header.dim1 == 0 || header.dim2 == 0 {
        return Err(TableLoadError::EmptyDimension {
            path: path.display().to_string(),
        });
    }
    if header.num_altitude_layers < 2 {
        return Err(TableLoadError::TooFewLayers {
            path: path.display().to_string(),
            layers: header.num_altitude_layers,
        });
    }

    let slice = AltitudeSlice::select(altitude_coord, header.num_altitude_layers);
    let offset = header.layer_byte_offset(slice.floor_index as u64);
    debug!(
        "loading 4D table \"{}\": {}×{}×{}×{}, layers {}..={} at offset {offset}",
        path.display(),
        header.dim0,
        header.dim1,
        header.dim2,
        header.num_altitude_layers,
        slice.floor_index,
        slice.floor_index + 1,
    );

    reader
        .seek(SeekFrom::Start(offset))
        .map_err(|source| TableLoadError::Seek {
            path: path.display().to_string(),
            offset,
            source,
        })?;
    let count = header.layer_subpixel_count() * LOADED_ALTITUDE_LAYERS as u64;
    let subpixels = read_f32s(&mut reader, count, path)?;

    Ok(Table4d {
        header,
        slice,
        subpixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{encode_table_2d, encode_table_4d};
    use std::path::PathBuf;

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("skyglow-tables-{}-{name}", std::process::id()));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_2d_roundtrip_bit_exact() {
        let (w, h) = (5u16, 3u16);
        let data: Vec<f32> = (0..4 * w as usize * h as usize)
            .map(|i| (i as f32 * 0.37 - 2.0).exp2())
            .collect();
        let path = temp_file("roundtrip.f32", &encode_table_2d(w, h, &data));

        let table = load_table_2d(&path).unwrap();
        assert_eq!(table.width, w);
        assert_eq!(table.height, h);
        assert_eq!(table.subpixels, data);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_2d_truncated_payload() {
        let mut bytes = encode_table_2d(2, 2, &[1.0; 16]);
        bytes.truncate(bytes.len() - 5);
        let path = temp_file("truncated.f32", &bytes);
        let err = load_table_2d(&path).unwrap_err();
        assert!(matches!(err, TableLoadError::Payload { .. }));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_2d_truncated_header() {
        let path = temp_file("short-header.f32", &[7u8, 0]);
        let err = load_table_2d(&path).unwrap_err();
        assert!(matches!(err, TableLoadError::Header { .. }));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_2d_missing_file() {
        let err = load_table_2d(Path::new("/nonexistent/skyglow.f32")).unwrap_err();
        assert!(matches!(err, TableLoadError::Open { .. }));
        assert!(err.to_string().contains("/nonexistent/skyglow.f32"));
    }

    /// Fill each altitude layer of a synthetic 4D table with a constant so
    /// a loaded pair identifies exactly which layers were read.
    fn layered_table(dims: [u16; 3], layers: u16) -> Vec<u8> {
        let layer_len = 4 * dims[0] as usize * dims[1] as usize * dims[2] as usize;
        let mut data = Vec::with_capacity(layer_len * layers as usize);
        for k in 0..layers {
            data.extend(std::iter::repeat(k as f32).take(layer_len));
        }
        encode_table_4d(dims, layers, &data)
    }

    #[test]
    fn test_4d_reads_exactly_the_bounding_pair() {
        let path = temp_file("layered.f32", &layered_table([3, 2, 2], 6));
        let layer_len = 4 * 3 * 2 * 2;

        for (u, expected_floor) in [(0.0, 0u32), (0.3, 1), (0.5, 2), (0.99, 4), (1.0, 4)] {
            let table = load_table_4d(&path, u).unwrap();
            assert_eq!(table.slice.floor_index, expected_floor, "u={u}");
            assert_eq!(table.subpixels.len(), layer_len * 2);
            assert!(table.subpixels[..layer_len]
                .iter()
                .all(|&v| v == expected_floor as f32));
            assert!(table.subpixels[layer_len..]
                .iter()
                .all(|&v| v == (expected_floor + 1) as f32));
            assert!(table.slice.contains(u));
        }
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_4d_rejects_single_layer() {
        let path = temp_file("single-layer.f32", &layered_table([2, 2, 2], 1));
        let err = load_table_4d(&path, 0.0).unwrap_err();
        assert!(matches!(err, TableLoadError::TooFewLayers { layers: 1, .. }));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_4d_truncated_top_layer() {
        // Table claims 4 layers but only ships 3: loading near the top must
        // fail on the payload read, not mislabel the data.
        let full = layered_table([2, 2, 1], 4);
        let layer_bytes = 4 * 2 * 2 * 1 * 4;
        let path = temp_file("missing-layer.f32", &full[..full.len() - layer_bytes]);
        let err = load_table_4d(&path, 1.0).unwrap_err();
        assert!(matches!(err, TableLoadError::Payload { .. }));
        std::fs::remove_file(path).ok();
    }
}
