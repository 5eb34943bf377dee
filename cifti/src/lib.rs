mod errors;
mod extio;
mod fiber;
mod header;
mod mapping;
mod matrix;
mod xml;

#[cfg(test)]
mod testing;

pub use errors::Error;
pub use errors::Result;

pub use fiber::Fiber;
pub use fiber::FiberOrientation;
pub use fiber::FiberOrientationFile;
pub use fiber::{FIBER_ELEMENTS, XYZ_ELEMENTS};

pub use header::MatrixHeader;
pub use header::{ALONG_COLUMN, ALONG_ROW};

pub use mapping::BrainModel;
pub use mapping::BrainModelsMap;
pub use mapping::DimensionMap;
pub use mapping::MapKind;
pub use mapping::ModelKind;
pub use mapping::NamedMap;
pub use mapping::Parcel;
pub use mapping::ParcelSurface;
pub use mapping::ParcelsMap;
pub use mapping::ScalarsMap;
pub use mapping::SeriesMap;
pub use mapping::SeriesUnit;
pub use mapping::VolumeSpace;

pub use matrix::DataType;
pub use matrix::MatrixFile;

pub use xml::CiftiVersion;
