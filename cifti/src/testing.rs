use std::collections::BTreeMap;

use ndarray::Array2;

use crate::{
    header::MatrixHeader,
    mapping::{
        BrainModelsMap, DimensionMap, NamedMap, Parcel, ParcelSurface, ParcelsMap, ScalarsMap,
        SeriesMap, SeriesUnit, VolumeSpace,
    },
    matrix::MatrixFile,
};

pub(crate) fn volume_space() -> VolumeSpace {
    VolumeSpace {
        dims: [91, 109, 91],
        sform: [
            [-2.0, 0.0, 0.0, 90.0],
            [0.0, 2.0, 0.0, -126.0],
            [0.0, 0.0, 2.0, -72.0],
        ],
    }
}

/// Three surface vertices followed by two thalamus voxels
pub(crate) fn brain_models() -> BrainModelsMap {
    let mut map = BrainModelsMap {
        volume: Some(volume_space()),
        models: vec![],
    };
    map.add_surface("CIFTI_STRUCTURE_CORTEX_LEFT", 10, vec![0, 4, 7]);
    map.add_voxels("CIFTI_STRUCTURE_THALAMUS_LEFT", vec![[40, 50, 30], [41, 50, 30]]);

    map
}

pub(crate) fn parcels() -> ParcelsMap {
    let mut vertices = BTreeMap::new();
    vertices.insert(String::from("CIFTI_STRUCTURE_CORTEX_LEFT"), vec![1, 2, 3]);

    ParcelsMap {
        volume: Some(volume_space()),
        surfaces: vec![ParcelSurface {
            structure: String::from("CIFTI_STRUCTURE_CORTEX_LEFT"),
            surface_vertices: 10,
        }],
        parcels: vec![
            Parcel {
                name: String::from("V1 & friends"),
                vertices,
                voxels: vec![],
            },
            Parcel {
                name: String::from("thalamus"),
                vertices: BTreeMap::new(),
                voxels: vec![[40, 50, 30], [41, 50, 30], [42, 51, 30]],
            },
        ],
    }
}

pub(crate) fn scalars() -> ScalarsMap {
    let mut metadata = BTreeMap::new();
    metadata.insert(String::from("Description"), String::from("curvature <raw>"));

    ScalarsMap {
        maps: vec![
            NamedMap {
                name: String::from("thickness"),
                metadata,
            },
            NamedMap {
                name: String::from("curvature"),
                metadata: BTreeMap::new(),
            },
        ],
    }
}

/// A dense data series header: 5 brainordinates down the columns, `timepoints` across the rows
pub(crate) fn dtseries_header(timepoints: usize) -> MatrixHeader {
    MatrixHeader::from_maps(vec![
        DimensionMap::Series(SeriesMap::new(timepoints, 0.0, 0.72, SeriesUnit::Second)),
        DimensionMap::BrainModels(brain_models()),
    ])
}

/// Values are `row * 10 + col`, so every cell is distinguishable
pub(crate) fn dtseries(timepoints: usize) -> MatrixFile {
    let data = Array2::from_shape_fn((5, timepoints), |(row, col)| (row * 10 + col) as f32);
    MatrixFile::from_array(dtseries_header(timepoints), data).expect("valid shape")
}
