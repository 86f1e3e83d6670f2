//! Data-kind selection and database construction from configuration strings.
use crate::database::base::{DataBase, PointDataBase};
use crate::database::errors::{DataBaseError, DataBaseResult};
use crate::database::evaluator::ModelEvaluator;
use crate::database::legacy::OldWodTmm;
use crate::database::measurements::{
    BoxMapper, BoxMeasurements, DeviationBoxes, LegacyArtifacts, NearWaterFilter,
    PointCorrelationProvider, PointMeasurements,
};
use crate::database::options::DataBaseOptions;
use crate::database::woa::{AnnualThreshold, Woa};
use crate::database::wod::Wod;
use crate::database::wod_tmm::WodTmm;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

const ALLOWED_DATA_KINDS: &str = "'WOA', 'WOD', 'WOD.<max_land_boxes>', 'OLDWOD.<max_land_boxes>'";

/// Which measurements a database compares the model with.
///
/// Parsing:
/// Case-insensitive `"WOA"`, `"WOD"`, `"WOD.<n>"` (near-water filtered), and
/// `"OLDWOD.<n>"` (legacy near-water filtered). Anything else returns
/// [`DataBaseError::UnknownDataKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Woa,
    Wod,
    WodTmm { max_land_boxes: usize },
    OldWodTmm { max_land_boxes: usize },
}

impl FromStr for DataKind {
    type Err = DataBaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || DataBaseError::UnknownDataKind {
            value: s.to_string(),
            allowed: ALLOWED_DATA_KINDS.to_string(),
        };
        let upper = s.trim().to_uppercase();
        match upper.split_once('.') {
            None if upper == "WOA" => Ok(DataKind::Woa),
            None if upper == "WOD" => Ok(DataKind::Wod),
            Some((base, n)) => {
                let max_land_boxes = n.parse::<usize>().map_err(|_| unknown())?;
                match base {
                    "WOD" => Ok(DataKind::WodTmm { max_land_boxes }),
                    "OLDWOD" => Ok(DataKind::OldWodTmm { max_land_boxes }),
                    _ => Err(unknown()),
                }
            }
            None => Err(unknown()),
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Woa => write!(f, "WOA"),
            DataKind::Wod => write!(f, "WOD"),
            DataKind::WodTmm { max_land_boxes } => write!(f, "WOD.{max_land_boxes}"),
            DataKind::OldWodTmm { max_land_boxes } => write!(f, "OLDWOD.{max_land_boxes}"),
        }
    }
}

/// External sources a data kind may need. Only those of the chosen kind are
/// required.
#[derive(Clone)]
pub struct Collaborators {
    pub evaluator: Rc<dyn ModelEvaluator>,
    pub box_measurements: Option<Rc<dyn BoxMeasurements>>,
    pub annual_threshold: Option<AnnualThreshold>,
    pub point_measurements: Option<Rc<dyn PointMeasurements>>,
    pub correlations: Option<Rc<dyn PointCorrelationProvider>>,
    pub near_water: Option<Rc<dyn NearWaterFilter>>,
    pub box_mapper: Option<Rc<dyn BoxMapper>>,
    pub deviation_boxes: Option<Rc<dyn DeviationBoxes>>,
    pub legacy: Option<Rc<dyn LegacyArtifacts>>,
}

impl Collaborators {
    pub fn new(evaluator: Rc<dyn ModelEvaluator>) -> Self {
        Collaborators {
            evaluator,
            box_measurements: None,
            annual_threshold: None,
            point_measurements: None,
            correlations: None,
            near_water: None,
            box_mapper: None,
            deviation_boxes: None,
            legacy: None,
        }
    }
}

fn required<T: Clone>(value: &Option<T>, name: &'static str) -> DataBaseResult<T> {
    value.clone().ok_or(DataBaseError::MissingCollaborator { name })
}

/// A database of any configurable kind.
pub enum AnyDataBase {
    Woa(Woa),
    Wod(Wod),
    WodTmm(WodTmm),
    OldWodTmm(OldWodTmm),
}

impl AnyDataBase {
    pub fn as_data_base(&self) -> &dyn DataBase {
        match self {
            AnyDataBase::Woa(db) => db,
            AnyDataBase::Wod(db) => db,
            AnyDataBase::WodTmm(db) => db,
            AnyDataBase::OldWodTmm(db) => db,
        }
    }

    /// `None` for gridded kinds.
    pub fn as_point_data_base(&self) -> Option<&dyn PointDataBase> {
        match self {
            AnyDataBase::Woa(_) => None,
            AnyDataBase::Wod(db) => Some(db),
            AnyDataBase::WodTmm(db) => Some(db),
            AnyDataBase::OldWodTmm(db) => Some(db),
        }
    }
}

/// Build the database for `kind`.
///
/// Errors
/// ------
/// - [`DataBaseError::MissingCollaborator`] if a source the kind needs is absent.
pub fn init_data_base(
    kind: DataKind, collaborators: &Collaborators, options: &DataBaseOptions,
) -> DataBaseResult<AnyDataBase> {
    let evaluator = collaborators.evaluator.clone();
    let data_base = match kind {
        DataKind::Woa => {
            let measurements = required(&collaborators.box_measurements, "box measurements")?;
            let threshold = required(&collaborators.annual_threshold, "annual threshold")?;
            let mut woa = Woa::new(evaluator, measurements, &threshold, options);
            if let Some(source) = &collaborators.deviation_boxes {
                woa = woa.with_deviation_boxes(source.clone());
            }
            AnyDataBase::Woa(woa)
        }
        DataKind::Wod => {
            let measurements = required(&collaborators.point_measurements, "point measurements")?;
            let correlations = required(&collaborators.correlations, "correlation provider")?;
            let mut wod = Wod::new(evaluator, measurements, correlations, options);
            if let Some(mapper) = &collaborators.box_mapper {
                wod = wod.with_box_mapper(mapper.clone());
            }
            if let Some(source) = &collaborators.deviation_boxes {
                wod = wod.with_deviation_boxes(source.clone());
            }
            AnyDataBase::Wod(wod)
        }
        DataKind::WodTmm { max_land_boxes } => {
            let measurements = required(&collaborators.point_measurements, "point measurements")?;
            let correlations = required(&collaborators.correlations, "correlation provider")?;
            let filter = required(&collaborators.near_water, "near-water filter")?;
            AnyDataBase::WodTmm(WodTmm::new(
                evaluator,
                measurements,
                filter,
                correlations,
                max_land_boxes,
                options,
            ))
        }
        DataKind::OldWodTmm { max_land_boxes } => {
            let measurements = required(&collaborators.point_measurements, "point measurements")?;
            let correlations = required(&collaborators.correlations, "correlation provider")?;
            let filter = required(&collaborators.near_water, "near-water filter")?;
            let artifacts = required(&collaborators.legacy, "legacy artifacts")?;
            AnyDataBase::OldWodTmm(OldWodTmm::legacy(
                evaluator,
                measurements,
                filter,
                correlations,
                artifacts,
                max_land_boxes,
                options,
            ))
        }
    };
    slog::debug!(options.logger, "initialized data base";
        "kind" => %kind, "name" => data_base.as_data_base().name());
    Ok(data_base)
}
