//! The four kinds of dimension mapping that can describe one axis of a CIFTI matrix.
//!
//! A mapping says what the indices along an axis mean: locations in the brain (brain models),
//! groups of locations (parcels), independent named maps (scalars), or evenly spaced samples
//! (series).

use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum DimensionMap {
    BrainModels(BrainModelsMap),
    Parcels(ParcelsMap),
    Scalars(ScalarsMap),
    Series(SeriesMap),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapKind {
    BrainModels,
    Parcels,
    Scalars,
    Series,
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MapKind::BrainModels => "brain models",
            MapKind::Parcels => "parcels",
            MapKind::Scalars => "scalars",
            MapKind::Series => "series",
        };
        f.write_str(name)
    }
}

impl DimensionMap {
    pub fn kind(&self) -> MapKind {
        match self {
            DimensionMap::BrainModels(_) => MapKind::BrainModels,
            DimensionMap::Parcels(_) => MapKind::Parcels,
            DimensionMap::Scalars(_) => MapKind::Scalars,
            DimensionMap::Series(_) => MapKind::Series,
        }
    }

    /// Number of indices along the axis this map describes.
    ///
    /// Only a series map read from a legacy header can have an unknown length, in which case
    /// `None` is returned.
    ///
    pub fn length(&self) -> Option<usize> {
        match self {
            DimensionMap::BrainModels(map) => Some(map.length()),
            DimensionMap::Parcels(map) => Some(map.length()),
            DimensionMap::Scalars(map) => Some(map.length()),
            DimensionMap::Series(map) => map.length,
        }
    }

    /// Whether two maps describe the same thing, ignoring cosmetic differences.
    ///
    /// Maps must be of the same kind. Spatial maps must have the same structure (parcel names
    /// don't count). Scalar and series maps only need to agree in length.
    ///
    pub fn approximate_match(&self, other: &DimensionMap) -> bool {
        match (self, other) {
            (DimensionMap::BrainModels(left), DimensionMap::BrainModels(right)) => {
                left.approximate_match(right)
            }
            (DimensionMap::Parcels(left), DimensionMap::Parcels(right)) => {
                left.approximate_match(right)
            }
            (DimensionMap::Scalars(left), DimensionMap::Scalars(right)) => {
                left.length() == right.length()
            }
            (DimensionMap::Series(left), DimensionMap::Series(right)) => {
                left.length == right.length
            }
            _ => false,
        }
    }

    /// A length 1 scalar map with no name and no metadata.
    ///
    /// Used for axes that don't get a mapping from anywhere else.
    ///
    pub fn degenerate() -> Self {
        DimensionMap::Scalars(ScalarsMap {
            maps: vec![NamedMap::default()],
        })
    }
}

/// Describes the voxel grid that volume indices refer to.
///
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeSpace {
    pub dims: [u64; 3],

    /// Affine from voxel indices to millimeter coordinates, last row (0, 0, 0, 1) elided
    pub sform: [[f64; 4]; 3],
}

/// Relative tolerance for sform entries, absolute for entries smaller than 1
const SFORM_TOLERANCE: f64 = 1e-6;

impl VolumeSpace {
    /// Same dimensions, and an sform that agrees up to rounding.
    pub fn approximate_match(&self, other: &VolumeSpace) -> bool {
        self.dims == other.dims
            && self
                .sform
                .iter()
                .flatten()
                .zip(other.sform.iter().flatten())
                .all(|(&left, &right)| {
                    (left - right).abs() <= SFORM_TOLERANCE * left.abs().max(right.abs()).max(1.0)
                })
    }
}

fn same_volume(left: &Option<VolumeSpace>, right: &Option<VolumeSpace>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => left.approximate_match(right),
        (None, None) => true,
        _ => false,
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BrainModelsMap {
    pub volume: Option<VolumeSpace>,
    pub models: Vec<BrainModel>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrainModel {
    pub structure: String,
    pub index_offset: usize,
    pub kind: ModelKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModelKind {
    Surface {
        surface_vertices: usize,
        vertices: Vec<u64>,
    },
    Voxels {
        voxels: Vec<[u64; 3]>,
    },
}

impl BrainModel {
    pub fn index_count(&self) -> usize {
        match &self.kind {
            ModelKind::Surface { vertices, .. } => vertices.len(),
            ModelKind::Voxels { voxels } => voxels.len(),
        }
    }
}

impl BrainModelsMap {
    pub fn length(&self) -> usize {
        self.models.iter().map(BrainModel::index_count).sum()
    }

    fn approximate_match(&self, other: &BrainModelsMap) -> bool {
        same_volume(&self.volume, &other.volume) && self.models == other.models
    }

    /// Append a surface model after the existing models.
    pub fn add_surface<S: Into<String>>(
        &mut self,
        structure: S,
        surface_vertices: usize,
        vertices: Vec<u64>,
    ) {
        let index_offset = self.length();
        self.models.push(BrainModel {
            structure: structure.into(),
            index_offset,
            kind: ModelKind::Surface {
                surface_vertices,
                vertices,
            },
        });
    }

    /// Append a voxel model after the existing models.
    pub fn add_voxels<S: Into<String>>(&mut self, structure: S, voxels: Vec<[u64; 3]>) {
        let index_offset = self.length();
        self.models.push(BrainModel {
            structure: structure.into(),
            index_offset,
            kind: ModelKind::Voxels { voxels },
        });
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParcelsMap {
    pub volume: Option<VolumeSpace>,
    pub surfaces: Vec<ParcelSurface>,
    pub parcels: Vec<Parcel>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParcelSurface {
    pub structure: String,
    pub surface_vertices: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parcel {
    pub name: String,

    /// Vertex indices, keyed by surface structure
    pub vertices: BTreeMap<String, Vec<u64>>,
    pub voxels: Vec<[u64; 3]>,
}

impl Parcel {
    /// Same vertices and voxels, in any order, regardless of name.
    fn same_locations(&self, other: &Parcel) -> bool {
        if self.vertices.len() != other.vertices.len() {
            return false;
        }
        for (structure, vertices) in &self.vertices {
            match other.vertices.get(structure) {
                Some(others) => {
                    if sorted(vertices) != sorted(others) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        sorted(&self.voxels) == sorted(&other.voxels)
    }
}

fn sorted<T: Clone + Ord>(items: &[T]) -> Vec<T> {
    let mut items = items.to_vec();
    items.sort();
    items
}

impl ParcelsMap {
    pub fn length(&self) -> usize {
        self.parcels.len()
    }

    fn approximate_match(&self, other: &ParcelsMap) -> bool {
        same_volume(&self.volume, &other.volume)
            && self.surfaces == other.surfaces
            && self.parcels.len() == other.parcels.len()
            && self
                .parcels
                .iter()
                .zip(&other.parcels)
                .all(|(left, right)| left.same_locations(right))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScalarsMap {
    pub maps: Vec<NamedMap>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NamedMap {
    pub name: String,
    pub metadata: BTreeMap<String, String>,
}

impl ScalarsMap {
    pub fn length(&self) -> usize {
        self.maps.len()
    }

    pub fn named<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            maps: names
                .iter()
                .map(|name| NamedMap {
                    name: name.as_ref().to_string(),
                    metadata: BTreeMap::new(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SeriesMap {
    /// `None` when read from a legacy header, which doesn't record it
    pub length: Option<usize>,
    pub start: f64,
    pub step: f64,
    pub unit: SeriesUnit,
}

impl SeriesMap {
    pub fn new(length: usize, start: f64, step: f64, unit: SeriesUnit) -> Self {
        Self {
            length: Some(length),
            start,
            step,
            unit,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeriesUnit {
    Second,
    Hertz,
    Meter,
    Radian,
}

impl SeriesUnit {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            SeriesUnit::Second => "SECOND",
            SeriesUnit::Hertz => "HERTZ",
            SeriesUnit::Meter => "METER",
            SeriesUnit::Radian => "RADIAN",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "SECOND" => Some(SeriesUnit::Second),
            "HERTZ" => Some(SeriesUnit::Hertz),
            "METER" => Some(SeriesUnit::Meter),
            "RADIAN" => Some(SeriesUnit::Radian),
            _ => None,
        }
    }
}
