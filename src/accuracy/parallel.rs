//! Serial or parallel fan-out of independent per-item computations.
use rayon::prelude::*;
use std::str::FromStr;

/// How per-item work is scheduled.
///
/// Parsing:
/// Case-insensitive `"serial"` or `"parallel"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Serial,
    /// On the global `rayon` pool.
    Parallel,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "serial" => Ok(ExecutionMode::Serial),
            "parallel" => Ok(ExecutionMode::Parallel),
            _ => Err(format!("execution mode '{s}' unknown; use 'serial' or 'parallel'")),
        }
    }
}

/// `[f(0), f(1), ..., f(n-1)]`, in index order for both modes.
pub fn map_indexed<T, F>(mode: ExecutionMode, n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    match mode {
        ExecutionMode::Serial => (0..n).map(f).collect(),
        ExecutionMode::Parallel => (0..n).into_par_iter().map(f).collect(),
    }
}

/// Like [`map_indexed`], stopping at the first error (in index order for
/// serial mode, at an arbitrary failing index for parallel mode).
pub fn try_map_indexed<T, E, F>(mode: ExecutionMode, n: usize, f: F) -> Result<Vec<T>, E>
where
    T: Send,
    E: Send,
    F: Fn(usize) -> Result<T, E> + Send + Sync,
{
    match mode {
        ExecutionMode::Serial => (0..n).map(f).collect(),
        ExecutionMode::Parallel => (0..n).into_par_iter().map(f).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_modes_preserve_index_order() {
        let serial = map_indexed(ExecutionMode::Serial, 1000, |i| i * i);
        let parallel = map_indexed(ExecutionMode::Parallel, 1000, |i| i * i);
        assert_eq!(serial, parallel);
        assert_eq!(parallel[999], 998_001);
    }

    #[test]
    fn errors_short_circuit() {
        let result: Result<Vec<usize>, String> =
            try_map_indexed(ExecutionMode::Parallel, 100, |i| if i == 42 { Err(format!("{i}")) } else { Ok(i) });
        assert_eq!(result, Err("42".to_string()));
        assert_eq!("PARALLEL".parse::<ExecutionMode>(), Ok(ExecutionMode::Parallel));
    }
}
