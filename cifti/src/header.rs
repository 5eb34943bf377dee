use std::collections::BTreeMap;

use crate::mapping::DimensionMap;

/// Index of the axis whose map describes the columns of a matrix (indices along a row)
pub const ALONG_ROW: usize = 0;

/// Index of the axis whose map describes the rows of a matrix (indices along a column)
pub const ALONG_COLUMN: usize = 1;

/// The XML described part of a CIFTI file: one dimension map per axis, plus file level metadata.
///
/// Any number of axes is supported here. The two axis restriction of the matrix file format is
/// applied by `MatrixFile` and by the legacy XML writer.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatrixHeader {
    maps: Vec<Option<DimensionMap>>,
    pub metadata: BTreeMap<String, String>,
}

impl MatrixHeader {
    /// A header with `axes` axes, none of which are mapped yet.
    pub fn new(axes: usize) -> Self {
        Self {
            maps: vec![None; axes],
            metadata: BTreeMap::new(),
        }
    }

    pub fn from_maps(maps: Vec<DimensionMap>) -> Self {
        Self {
            maps: maps.into_iter().map(Some).collect(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn axis_count(&self) -> usize {
        self.maps.len()
    }

    /// Change the number of axes.
    ///
    /// Maps for axes that remain are kept, new axes are unmapped.
    ///
    pub fn set_number_of_axes(&mut self, axes: usize) {
        self.maps.resize(axes, None);
    }

    pub fn map(&self, axis: usize) -> Option<&DimensionMap> {
        self.maps.get(axis).and_then(Option::as_ref)
    }

    /// Set the map for an axis, adding unmapped axes first if the header is too short.
    pub fn set_map(&mut self, axis: usize, map: DimensionMap) {
        if axis >= self.maps.len() {
            self.set_number_of_axes(axis + 1);
        }
        self.maps[axis] = Some(map);
    }

    /// Length of an axis, or `None` if the axis is unmapped, out of range, or is a legacy series
    /// whose length hasn't been resolved.
    pub fn dimension_length(&self, axis: usize) -> Option<usize> {
        self.map(axis).and_then(DimensionMap::length)
    }

    pub fn dimensions(&self) -> Vec<Option<usize>> {
        (0..self.axis_count())
            .map(|axis| self.dimension_length(axis))
            .collect()
    }

    /// Whether every axis is mapped and has a known length.
    pub fn is_resolved(&self) -> bool {
        self.dimensions().iter().all(Option::is_some)
    }

    pub fn row_count(&self) -> Option<usize> {
        self.dimension_length(ALONG_COLUMN)
    }

    pub fn column_count(&self) -> Option<usize> {
        self.dimension_length(ALONG_ROW)
    }

    /// Fill in lengths of series axes that legacy headers leave unset.
    ///
    /// CIFTI-1 doesn't store the number of points in a series, so they have to be borrowed from
    /// somewhere else, usually the matrix dimensions recorded alongside the header. `reference`
    /// holds one length per axis in CIFTI dimension order. Axes with a known length, and axes
    /// beyond the end of `reference`, are left alone.
    ///
    pub fn resolve_series_lengths(&mut self, reference: &[usize]) {
        for (map, &length) in self.maps.iter_mut().zip(reference) {
            if let Some(DimensionMap::Series(series)) = map {
                if series.length.is_none() {
                    series.length = Some(length);
                }
            }
        }
    }

    /// Axis by axis `approximate_match`, requiring the same number of axes.
    pub fn approximate_match(&self, other: &MatrixHeader) -> bool {
        self.axis_count() == other.axis_count()
            && self.maps.iter().zip(&other.maps).all(|pair| match pair {
                (Some(left), Some(right)) => left.approximate_match(right),
                (None, None) => true,
                _ => false,
            })
    }
}
