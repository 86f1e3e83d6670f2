//! Binary payload files for cached arrays.
//!
//! Purpose
//! -------
//! Persist one `f64` array per file together with the [`EntryKey`] it was
//! stored under, and read it back either into memory or as a read-only
//! memory map.
//!
//! Key behaviors
//! -------------
//! - Layout (all integers little-endian):
//!   `b"NDPA"`, `u32` version, `u8` quantity tag, `u8` derivative flag,
//!   `u16` reserved, `u64` time dimension (`u64::MAX` = none), `u32` rank,
//!   `rank × u64` shape, zero padding to a 16-byte boundary, then the data as
//!   little-endian `f64` in C order.
//! - Writes go to a sibling temp file that is renamed over the target, so a
//!   reader never observes a partially written payload.
//! - Memory-mapped reads hand out zero-copy views when the host is
//!   little-endian; otherwise the data is decoded into an owned array.
//!
//! Invariants & assumptions
//! ------------------------
//! - The data region length equals `8 × product(shape)`; anything else is
//!   rejected as a truncated payload.
//! - A mapped payload must not be modified on disk while mapped; the cache
//!   only ever replaces files by rename, which leaves existing maps intact.
use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::key::{EntryKey, Quantity, Qualifiers};
use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const MAGIC: &[u8; 4] = b"NDPA";
const VERSION: u32 = 1;
const ALIGNMENT: usize = 16;
const NO_TIME_DIM: u64 = u64::MAX;

/// A cached array, either owned or backed by a memory-mapped file.
///
/// Cloning is cheap; all clones share the same storage.
#[derive(Debug, Clone)]
pub struct Payload {
    storage: Rc<Storage>,
}

#[derive(Debug)]
enum Storage {
    Owned(ArrayD<f64>),
    Mapped(MappedArray),
}

/// Read-only `f64` array living inside a memory map.
#[derive(Debug)]
struct MappedArray {
    mmap: Mmap,
    offset: usize,
    shape: Vec<usize>,
}

impl MappedArray {
    fn data(&self) -> &[f64] {
        let len: usize = self.shape.iter().product();
        bytemuck::cast_slice(&self.mmap[self.offset..self.offset + len * 8])
    }
}

impl Payload {
    pub fn owned(array: ArrayD<f64>) -> Self {
        Payload { storage: Rc::new(Storage::Owned(array)) }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(*self.storage, Storage::Mapped(_))
    }

    pub fn shape(&self) -> &[usize] {
        match &*self.storage {
            Storage::Owned(a) => a.shape(),
            Storage::Mapped(m) => &m.shape,
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Borrow the array.
    ///
    /// Panics
    /// ------
    /// - Never for payloads produced by this module: mapped payloads are
    ///   validated against their shape and alignment when opened.
    pub fn view(&self) -> ArrayViewD<'_, f64> {
        match &*self.storage {
            Storage::Owned(a) => a.view(),
            Storage::Mapped(m) => ArrayViewD::from_shape(IxDyn(&m.shape), m.data())
                .expect("mapped payload shape validated on open"),
        }
    }

    pub fn to_owned_array(&self) -> ArrayD<f64> {
        self.view().to_owned()
    }
}

impl From<ArrayD<f64>> for Payload {
    fn from(array: ArrayD<f64>) -> Self {
        Payload::owned(array)
    }
}

struct Header {
    entry: EntryKey,
    shape: Vec<usize>,
    data_offset: usize,
}

fn invalid(path: &Path, reason: &'static str) -> CacheError {
    CacheError::InvalidPayload { path: path.to_path_buf(), reason }
}

fn encode_header(entry: &EntryKey, shape: &[usize]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32 + 8 * shape.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.push(entry.quantity.tag());
    buf.push(entry.qualifiers.derivative_used as u8);
    buf.extend_from_slice(&0u16.to_le_bytes());
    let time_dim = entry.qualifiers.time_dim.map_or(NO_TIME_DIM, |t| t as u64);
    buf.extend_from_slice(&time_dim.to_le_bytes());
    buf.extend_from_slice(&(shape.len() as u32).to_le_bytes());
    for &dim in shape {
        buf.extend_from_slice(&(dim as u64).to_le_bytes());
    }
    while buf.len() % ALIGNMENT != 0 {
        buf.push(0);
    }
    buf
}

fn decode_header(bytes: &[u8], path: &Path) -> CacheResult<Header> {
    let truncated = || invalid(path, "truncated header");
    if bytes.len() < 4 || &bytes[..4] != MAGIC {
        return Err(invalid(path, "bad magic"));
    }
    let mut reader = &bytes[4..];
    let version = reader.read_u32::<LittleEndian>().map_err(|_| truncated())?;
    if version != VERSION {
        return Err(CacheError::UnsupportedVersion { path: path.to_path_buf(), version });
    }
    let tag = reader.read_u8().map_err(|_| truncated())?;
    let quantity = Quantity::from_tag(tag).ok_or_else(|| invalid(path, "unknown quantity tag"))?;
    let derivative_used = reader.read_u8().map_err(|_| truncated())? != 0;
    let _reserved = reader.read_u16::<LittleEndian>().map_err(|_| truncated())?;
    let time_dim = reader.read_u64::<LittleEndian>().map_err(|_| truncated())?;
    let time_dim = (time_dim != NO_TIME_DIM).then_some(time_dim as usize);
    let rank = reader.read_u32::<LittleEndian>().map_err(|_| truncated())? as usize;
    let mut shape = Vec::with_capacity(rank);
    for _ in 0..rank {
        shape.push(reader.read_u64::<LittleEndian>().map_err(|_| truncated())? as usize);
    }
    let consumed = bytes.len() - reader.len();
    let data_offset = consumed.div_ceil(ALIGNMENT) * ALIGNMENT;

    let len = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .and_then(|n| n.checked_mul(8))
        .ok_or_else(|| invalid(path, "shape overflows"))?;
    if bytes.len() != data_offset + len {
        return Err(invalid(path, "data length does not match shape"));
    }
    Ok(Header {
        entry: EntryKey { quantity, qualifiers: Qualifiers { derivative_used, time_dim } },
        shape,
        data_offset,
    })
}

/// Write `array` to `path` atomically, tagged with `entry`.
///
/// Errors
/// ------
/// - [`CacheError::Io`] if the temp file cannot be written or renamed.
pub fn write_payload(path: &Path, entry: &EntryKey, array: ArrayViewD<f64>) -> CacheResult<()> {
    let mut bytes = encode_header(entry, array.shape());
    bytes.reserve(array.len() * 8);
    for &x in array.iter() {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    write_atomically(path, &bytes)
}

/// Write `bytes` to `path` through a temp file and rename.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> CacheResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }
    let tmp = temp_path(path);
    let result = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, path));
    if let Err(err) = result {
        let _ = fs::remove_file(&tmp);
        return Err(CacheError::io(path, err));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".tmp.{}", std::process::id()));
    path.with_file_name(name)
}

/// Read the payload at `path`.
///
/// Returns the entry key stored in the header together with the array.
/// With `use_memmap`, the array is a zero-copy view into the mapped file when
/// the host byte order and data alignment allow it.
///
/// Errors
/// ------
/// - [`CacheError::Io`] if the file cannot be opened, read, or mapped.
/// - [`CacheError::InvalidPayload`] / [`CacheError::UnsupportedVersion`] for
///   malformed files.
pub fn read_payload(path: &Path, use_memmap: bool) -> CacheResult<(EntryKey, Payload)> {
    if use_memmap {
        let file = File::open(path).map_err(|e| CacheError::io(path, e))?;
        // SAFETY: cache files are only ever replaced by rename, never
        // truncated or rewritten in place while mapped.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| CacheError::io(path, e))?;
        let header = decode_header(&mmap, path)?;
        let data = &mmap[header.data_offset..];
        let zero_copy = cfg!(target_endian = "little") && bytemuck::try_cast_slice::<u8, f64>(data).is_ok();
        if zero_copy {
            let mapped = MappedArray { mmap, offset: header.data_offset, shape: header.shape };
            return Ok((header.entry, Payload { storage: Rc::new(Storage::Mapped(mapped)) }));
        }
        let array = decode_data(data, &header.shape, path)?;
        return Ok((header.entry, Payload::owned(array)));
    }
    let bytes = fs::read(path).map_err(|e| CacheError::io(path, e))?;
    let header = decode_header(&bytes, path)?;
    let array = decode_data(&bytes[header.data_offset..], &header.shape, path)?;
    Ok((header.entry, Payload::owned(array)))
}

fn decode_data(mut data: &[u8], shape: &[usize], path: &Path) -> CacheResult<ArrayD<f64>> {
    let mut values = vec![0.0; data.len() / 8];
    data.read_f64_into::<LittleEndian>(&mut values)
        .map_err(|_| invalid(path, "truncated data"))?;
    ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|_| invalid(path, "shape mismatch"))
}
