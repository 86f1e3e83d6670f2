//! Disk tier: one directory per parameter vector.
//!
//! Purpose
//! -------
//! Store model outputs under `<root>/parameter_set_NNNNN/`, where each
//! directory holds a `parameters.txt` (one `%.18e` value per line) that
//! identifies the parameter vector, and a `<cache_dirname>/` subdirectory with
//! the cached payload files.
//!
//! Key behaviors
//! -------------
//! - Lookup scans the root once per new parameter vector and remembers the
//!   directory it found.
//! - A stored payload whose qualifiers differ from the request is treated as
//!   a miss, so the caller recomputes and overwrites it.
//! - New parameter-set directories take the next free index.
//!
//! Invariants & assumptions
//! ------------------------
//! - `%.18e` round-trips every finite `f64`, so exact-match lookups work on
//!   values read back from text.
//! - A single process owns a store at a time; concurrent writers may race on
//!   the choice of a new directory index.
use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::key::{EntryKey, ParameterKey};
use crate::cache::options::{CacheOptions, PersistOptions};
use crate::cache::payload::{read_payload, write_atomically, write_payload, Payload};
use crate::cache::template::{python_scientific, FilenameTemplate};
use ndarray::{Array1, ArrayD, ArrayViewD, Axis};
use slog::{debug, info, warn, Logger};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const PARAMETERS_FILENAME: &str = "parameters.txt";
pub const PARAMETER_SET_DIRNAME: &str = "parameter_set_{index:0>5}";
const PARAMETER_SET_PREFIX: &str = "parameter_set_";

/// Parameter-keyed store of payload files.
#[derive(Debug)]
pub struct PersistentCache {
    root: PathBuf,
    cache_dirname: String,
    logger: Logger,
    directories: RefCell<HashMap<ParameterKey, PathBuf>>,
}

impl PersistentCache {
    pub fn new(options: &CacheOptions, logger: Logger) -> Self {
        PersistentCache {
            root: options.root.clone(),
            cache_dirname: options.cache_dirname.clone(),
            logger,
            directories: RefCell::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the parameter set matching `parameters`, if one exists.
    ///
    /// Errors
    /// ------
    /// - [`CacheError::Io`] if the root cannot be listed.
    /// - [`CacheError::InvalidNumber`] if a `parameters.txt` is corrupt.
    pub fn parameter_set_dir(&self, parameters: &ParameterKey) -> CacheResult<Option<PathBuf>> {
        if let Some(dir) = self.directories.borrow().get(parameters) {
            return Ok(Some(dir.clone()));
        }
        for (_, dir) in self.parameter_set_dirs()? {
            let stored = read_vector(&dir.join(PARAMETERS_FILENAME))?;
            if ParameterKey::from_view(stored.view()) == *parameters {
                self.directories.borrow_mut().insert(parameters.clone(), dir.clone());
                return Ok(Some(dir));
            }
        }
        Ok(None)
    }

    /// Like [`parameter_set_dir`](Self::parameter_set_dir) but creates the
    /// directory (with its `parameters.txt`) when missing.
    pub fn parameter_set_dir_or_create(&self, parameters: &ParameterKey) -> CacheResult<PathBuf> {
        if let Some(dir) = self.parameter_set_dir(parameters)? {
            return Ok(dir);
        }
        let next = self.parameter_set_dirs()?.into_iter().map(|(index, _)| index + 1).max();
        let dirname = FilenameTemplate::new(PARAMETER_SET_DIRNAME)
            .render(&[("index", next.unwrap_or(0).into())])?;
        let dir = self.root.join(dirname);
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
        let text: String =
            parameters.values().iter().map(|&v| python_scientific(v, 18) + "\n").collect();
        write_atomically(&dir.join(PARAMETERS_FILENAME), text.as_bytes())?;
        info!(self.logger, "created parameter set"; "dir" => %dir.display());
        self.directories.borrow_mut().insert(parameters.clone(), dir.clone());
        Ok(dir)
    }

    fn parameter_set_dirs(&self) -> CacheResult<Vec<(usize, PathBuf)>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(CacheError::io(&self.root, err)),
        };
        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.root, e))?;
            let name = entry.file_name();
            let index = name
                .to_str()
                .and_then(|n| n.strip_prefix(PARAMETER_SET_PREFIX))
                .and_then(|suffix| suffix.parse::<usize>().ok());
            let path = entry.path();
            if let Some(index) = index {
                if path.join(PARAMETERS_FILENAME).is_file() {
                    dirs.push((index, path));
                }
            }
        }
        dirs.sort_by_key(|(index, _)| *index);
        Ok(dirs)
    }

    /// Path of `filename` inside the cache subdirectory of `parameters`.
    pub fn value_path(&self, parameters: &ParameterKey, filename: &str) -> CacheResult<Option<PathBuf>> {
        Ok(self.parameter_set_dir(parameters)?.map(|dir| dir.join(&self.cache_dirname).join(filename)))
    }

    pub fn has_value(&self, parameters: &ParameterKey, filename: &str) -> CacheResult<bool> {
        Ok(self.value_path(parameters, filename)?.is_some_and(|p| p.is_file()))
    }

    /// Load a stored payload if present and stored under `entry`.
    pub fn load(
        &self, parameters: &ParameterKey, filename: &str, entry: &EntryKey, use_memmap: bool,
    ) -> CacheResult<Option<Payload>> {
        let path = match self.value_path(parameters, filename)? {
            Some(path) if path.is_file() => path,
            _ => return Ok(None),
        };
        let (stored, payload) = read_payload(&path, use_memmap)?;
        if stored != *entry {
            warn!(self.logger, "stored qualifiers differ, ignoring cached value";
                "path" => %path.display(),
                "stored" => ?stored,
                "requested" => ?entry);
            return Ok(None);
        }
        debug!(self.logger, "loaded cached value"; "path" => %path.display(), "mapped" => payload.is_mapped());
        Ok(Some(payload))
    }

    /// Store `array` for `parameters`, replacing any previous file.
    pub fn save(
        &self, parameters: &ParameterKey, filename: &str, entry: &EntryKey, array: ArrayViewD<f64>,
        save_also_txt: bool,
    ) -> CacheResult<PathBuf> {
        let dir = self.parameter_set_dir_or_create(parameters)?.join(&self.cache_dirname);
        let path = dir.join(filename);
        write_payload(&path, entry, array.view())?;
        if save_also_txt {
            write_atomically(&path.with_extension("txt"), render_text(array.view()).as_bytes())?;
        }
        debug!(self.logger, "saved value"; "path" => %path.display(), "shape" => ?array.shape());
        Ok(path)
    }

    /// Return the stored payload, computing and storing it on a miss.
    ///
    /// With `options.use_memmap` a freshly computed value is reloaded from the
    /// written file so the caller always receives a mapped payload.
    pub fn get_value<E: From<CacheError>>(
        &self, parameters: &ParameterKey, filename: &str, entry: &EntryKey, options: PersistOptions,
        compute: impl FnOnce(&ParameterKey) -> Result<ArrayD<f64>, E>,
    ) -> Result<Payload, E> {
        if let Some(payload) = self.load(parameters, filename, entry, options.use_memmap)? {
            return Ok(payload);
        }
        let array = compute(parameters)?;
        let path = self.save(parameters, filename, entry, array.view(), options.save_also_txt)?;
        if options.use_memmap {
            let (_, payload) = read_payload(&path, true)?;
            return Ok(payload);
        }
        Ok(Payload::owned(array))
    }

    /// Read a whitespace-separated numeric text file from the cache
    /// subdirectory of `parameters`.
    ///
    /// Errors
    /// ------
    /// - [`CacheError::MissingFile`] if the file (or the parameter set) does not exist.
    pub fn load_text_vector(&self, parameters: &ParameterKey, filename: &str) -> CacheResult<Array1<f64>> {
        match self.value_path(parameters, filename)? {
            Some(path) if path.is_file() => read_vector(&path),
            Some(path) => Err(CacheError::MissingFile { path }),
            None => Err(CacheError::MissingFile { path: self.root.join(filename) }),
        }
    }
}

/// Parse a whitespace-separated list of floats.
pub(crate) fn read_vector(path: &Path) -> CacheResult<Array1<f64>> {
    let text = fs::read_to_string(path).map_err(|e| CacheError::io(path, e))?;
    let mut values = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            let value = token.parse::<f64>().map_err(|_| CacheError::InvalidNumber {
                path: path.to_path_buf(),
                line: line_no + 1,
                token: token.to_string(),
            })?;
            values.push(value);
        }
    }
    Ok(Array1::from(values))
}

/// One row per line along the last axis; scalars and vectors one value per line.
fn render_text(array: ArrayViewD<f64>) -> String {
    let mut out = String::new();
    if array.ndim() <= 1 {
        for &v in array.iter() {
            out.push_str(&python_scientific(v, 18));
            out.push('\n');
        }
        return out;
    }
    let last = array.ndim() - 1;
    let width = array.len_of(Axis(last));
    let rows = array.len() / width.max(1);
    let flat: Vec<f64> = array.iter().copied().collect();
    for r in 0..rows {
        let row: Vec<String> =
            flat[r * width..(r + 1) * width].iter().map(|&v| python_scientific(v, 18)).collect();
        out.push_str(&row.join(" "));
        out.push('\n');
    }
    out
}
