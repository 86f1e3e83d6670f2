//! Construction options and on-disk naming for databases.
//!
//! Filename templates are rendered through
//! [`FilenameTemplate`](crate::cache::FilenameTemplate) with the fields
//! `time_dim` and `step_size`.
use crate::cache::{CacheOptions, FilenameTemplate};
use crate::database::errors::{DataBaseError, DataBaseResult};
use crate::logging::discard_logger;
use slog::Logger;
use std::path::PathBuf;

/// Canonical time resolution of box outputs (monthly).
pub const DEFAULT_BOXES_T_DIM: usize = 12;

pub const CACHE_DIRNAME: &str = "data_base";

pub const BOXES_F_FILENAME: &str = "f_boxes_-_time_dim_{time_dim}.bin";
pub const BOXES_DF_FILENAME: &str = "df_boxes_-_time_dim_{time_dim}_-_step_size_{step_size}.bin";

pub const WOA_F_FILENAME: &str = "woa_f.bin";
pub const WOA_DF_FILENAME: &str = "woa_df_-_step_size_{step_size}.bin";

pub const WOD_F_FILENAME: &str = "wod_f.bin";
pub const WOD_DF_FILENAME: &str = "wod_df_-_step_size_{step_size}.bin";

pub const CORRELATION_PARAMETER_FILENAME: &str = "correlation_parameters.txt";

/// Filename templates of observation-site outputs kept in the persistent tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplates {
    pub f: FilenameTemplate,
    /// May use `{step_size}`.
    pub df: FilenameTemplate,
}

impl OutputTemplates {
    pub fn new(f: &str, df: &str) -> Self {
        OutputTemplates { f: FilenameTemplate::new(f), df: FilenameTemplate::new(df) }
    }

    pub fn woa() -> Self {
        Self::new(WOA_F_FILENAME, WOA_DF_FILENAME)
    }

    pub fn wod() -> Self {
        Self::new(WOD_F_FILENAME, WOD_DF_FILENAME)
    }
}

/// Where observation-site outputs `F`/`DF` are cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputCaching {
    /// Only for the most recent parameter vector, in memory.
    Memory,
    /// In the tiered cache under the given filenames.
    Persistent(OutputTemplates),
}

/// Options shared by every database type.
#[derive(Debug, Clone)]
pub struct DataBaseOptions {
    pub cache: CacheOptions,
    pub default_boxes_t_dim: usize,
    pub f_boxes_template: FilenameTemplate,
    pub df_boxes_template: FilenameTemplate,
    /// Also write `.txt` copies of observation-site outputs.
    pub save_also_txt: bool,
    pub logger: Logger,
}

impl DataBaseOptions {
    /// Defaults for a model-output store rooted at `cache_root`.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        DataBaseOptions {
            cache: CacheOptions::new(cache_root, CACHE_DIRNAME),
            default_boxes_t_dim: DEFAULT_BOXES_T_DIM,
            f_boxes_template: FilenameTemplate::new(BOXES_F_FILENAME),
            df_boxes_template: FilenameTemplate::new(BOXES_DF_FILENAME),
            save_also_txt: false,
            logger: discard_logger(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_cache(mut self, cache: CacheOptions) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_save_also_txt(mut self, save_also_txt: bool) -> Self {
        self.save_also_txt = save_also_txt;
        self
    }

    /// Errors
    /// ------
    /// - [`DataBaseError::InvalidDefaultTimeDim`] if `time_dim == 0`.
    pub fn with_default_boxes_t_dim(mut self, time_dim: usize) -> DataBaseResult<Self> {
        if time_dim == 0 {
            return Err(DataBaseError::InvalidDefaultTimeDim { value: time_dim });
        }
        self.default_boxes_t_dim = time_dim;
        Ok(self)
    }
}
