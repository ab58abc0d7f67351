//! NumPy `.npy` embedding file reader
//!
//! Supports format versions 1.0, 2.0 and 3.0 holding a C-ordered float array
//! (`f4` or `f8`, either byte order) of shape `(n, d)` or `(d,)`.

use crate::{EmbeddingSequence, Error, Result};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

/// Magic bytes for NPY format: "\x93NUMPY"
const MAGIC: [u8; 6] = [0x93, b'N', b'U', b'M', b'P', b'Y'];

/// Element type of an `.npy` array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    F32Le,
    F32Be,
    F64Le,
    F64Be,
}

impl Dtype {
    /// Bytes per element
    fn size(self) -> usize {
        match self {
            Dtype::F32Le | Dtype::F32Be => 4,
            Dtype::F64Le | Dtype::F64Be => 8,
        }
    }

    fn parse(descr: &str) -> Result<Self> {
        match descr {
            "<f4" | "=f4" => Ok(Dtype::F32Le),
            ">f4" => Ok(Dtype::F32Be),
            "<f8" | "=f8" => Ok(Dtype::F64Le),
            ">f8" => Ok(Dtype::F64Be),
            other => Err(malformed(format!("unsupported dtype '{other}'"))),
        }
    }
}

/// Parsed `.npy` header
#[derive(Debug, Clone, PartialEq)]
struct NpyHeader {
    dtype: Dtype,
    fortran_order: bool,
    shape: Vec<usize>,
}

impl NpyHeader {
    /// Reads the magic, version and header dictionary from a reader
    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 6];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(malformed("invalid magic bytes, expected '\\x93NUMPY'"));
        }

        let major = reader.read_u8()?;
        let _minor = reader.read_u8()?;
        let header_len = match major {
            1 => reader.read_u16::<LittleEndian>()? as usize,
            2 | 3 => reader.read_u32::<LittleEndian>()? as usize,
            other => return Err(malformed(format!("unsupported version {other}"))),
        };

        let header = read_exact_len(reader, header_len, "header")?;
        let header = String::from_utf8_lossy(&header);

        Self::parse_dict(&header)
    }

    /// Parses the Python dict literal, e.g.
    /// `{'descr': '<f4', 'fortran_order': False, 'shape': (3, 512), }`
    fn parse_dict(dict: &str) -> Result<Self> {
        let descr = quoted_value(dict, "descr")?;
        let dtype = Dtype::parse(&descr)?;

        let fortran_order = match raw_value(dict, "fortran_order")? {
            v if v.starts_with("True") => true,
            v if v.starts_with("False") => false,
            _ => return Err(malformed("invalid fortran_order")),
        };

        let shape_start = raw_value(dict, "shape")?;
        let shape_str = shape_start
            .strip_prefix('(')
            .and_then(|s| s.split(')').next())
            .ok_or_else(|| malformed("invalid shape"))?;
        let shape = shape_str
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.trim_end_matches('L')
                    .parse::<usize>()
                    .map_err(|_| malformed(format!("invalid shape entry '{s}'")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            dtype,
            fortran_order,
            shape,
        })
    }

    /// Returns `(rows, dimension)` for the supported shapes
    fn matrix_shape(&self) -> Result<(usize, usize)> {
        match self.shape.as_slice() {
            [d] => Ok((1, *d)),
            [n, d] => Ok((*n, *d)),
            other => Err(malformed(format!(
                "expected a 1-D or 2-D array, got shape {other:?}"
            ))),
        }
    }
}

/// Reads an embedding sequence from an `.npy` file
pub fn read_npy_file(path: &Path) -> Result<EmbeddingSequence> {
    let file = File::open(path)?;
    read_npy(BufReader::new(file))
}

/// Reads an embedding sequence from `.npy` bytes
pub fn read_npy<R: Read>(mut reader: R) -> Result<EmbeddingSequence> {
    let header = NpyHeader::read(&mut reader)?;
    if header.fortran_order {
        return Err(malformed("Fortran-ordered arrays are not supported"));
    }

    let (rows, dimension) = header.matrix_shape()?;
    let count = rows
        .checked_mul(dimension)
        .ok_or_else(|| malformed("array shape overflows"))?;
    if count == 0 {
        return Ok(EmbeddingSequence::default());
    }

    let values = read_values(&mut reader, header.dtype, count)?;
    EmbeddingSequence::from_flat(values, dimension)
}

fn read_values<R: Read>(reader: &mut R, dtype: Dtype, count: usize) -> Result<Vec<f32>> {
    let byte_len = count
        .checked_mul(dtype.size())
        .ok_or_else(|| malformed("array shape overflows"))?;
    let data = read_exact_len(reader, byte_len, "data")?;
    let mut cursor = Cursor::new(data);

    let values = match dtype {
        Dtype::F32Le | Dtype::F32Be => {
            let mut values = vec![0f32; count];
            if dtype == Dtype::F32Le {
                cursor.read_f32_into::<LittleEndian>(&mut values)?;
            } else {
                cursor.read_f32_into::<BigEndian>(&mut values)?;
            }
            values
        }
        Dtype::F64Le | Dtype::F64Be => {
            let mut wide = vec![0f64; count];
            if dtype == Dtype::F64Le {
                cursor.read_f64_into::<LittleEndian>(&mut wide)?;
            } else {
                cursor.read_f64_into::<BigEndian>(&mut wide)?;
            }
            wide.into_iter().map(|v| v as f32).collect()
        }
    };
    Ok(values)
}

/// Reads exactly `len` bytes without trusting `len` for the allocation, so a
/// header announcing more data than the file holds fails instead of
/// allocating it up front
fn read_exact_len<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(malformed(format!(
            "{what} declares {len} bytes but only {} are present",
            buf.len()
        )));
    }
    Ok(buf)
}

/// Returns the text following `'key':` in the header dictionary
fn raw_value<'a>(dict: &'a str, key: &str) -> Result<&'a str> {
    let pattern = format!("'{key}':");
    let start = dict
        .find(&pattern)
        .ok_or_else(|| malformed(format!("header is missing '{key}'")))?;
    Ok(dict[start + pattern.len()..].trim_start())
}

fn quoted_value(dict: &str, key: &str) -> Result<String> {
    let raw = raw_value(dict, key)?;
    let inner = raw
        .strip_prefix('\'')
        .and_then(|s| s.split('\'').next())
        .ok_or_else(|| malformed(format!("'{key}' is not a string")))?;
    Ok(inner.to_string())
}

fn malformed(message: impl Into<String>) -> Error {
    Error::MalformedEmbeddings(message.into())
}

/// Encodes rows as a version 1.0 little-endian `f4` `.npy` file.
///
/// Used by collaborators and tests to produce embedding fixtures.
pub fn encode_npy_f32(rows: &[Vec<f32>]) -> Vec<u8> {
    let dimension = rows.first().map_or(0, Vec::len);
    let mut dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows.len(),
        dimension
    );
    // Pad so that the data starts on a 64-byte boundary, header ends in '\n'
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    dict.push_str(&" ".repeat(padding));
    dict.push('\n');

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + dict.len() + rows.len() * dimension * 4);
    out.extend_from_slice(&MAGIC);
    out.push(1);
    out.push(0);
    out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    for value in rows.iter().flatten() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}
