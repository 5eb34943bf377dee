use cifti::{
    BrainModelsMap, DimensionMap, MatrixFile, MatrixHeader, ScalarsMap, SeriesMap, SeriesUnit,
};
use ndarray::{Array1, Array2};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

fn brain_models(rows: usize) -> DimensionMap {
    let mut map = BrainModelsMap::default();
    map.add_surface(
        "CIFTI_STRUCTURE_CORTEX_LEFT",
        rows * 2,
        (0..rows as u64).map(|vertex| vertex * 2).collect(),
    );

    DimensionMap::BrainModels(map)
}

fn scalars(length: usize) -> DimensionMap {
    let names: Vec<String> = (0..length).map(|index| format!("map {index}")).collect();
    DimensionMap::Scalars(ScalarsMap::named(&names))
}

fn series(length: usize) -> DimensionMap {
    DimensionMap::Series(SeriesMap::new(length, 0.0, 1.0, SeriesUnit::Second))
}

/// Surface vertices down the columns, a time series across the rows
pub(crate) fn dense_header(rows: usize, cols: usize) -> MatrixHeader {
    MatrixHeader::from_maps(vec![series(cols), brain_models(rows)])
}

pub(crate) fn scalar_header(rows: usize, cols: usize) -> MatrixHeader {
    MatrixHeader::from_maps(vec![scalars(cols), scalars(rows)])
}

pub(crate) fn series_header(rows: usize, cols: usize) -> MatrixHeader {
    MatrixHeader::from_maps(vec![series(cols), series(rows)])
}

pub(crate) fn dense_file(data: Array2<f32>) -> MatrixFile {
    let (rows, cols) = data.dim();
    MatrixFile::from_array(dense_header(rows, cols), data).expect("valid shape")
}

/// A single row of scalars
pub(crate) fn row_file(values: &[f32]) -> MatrixFile {
    let data = Array1::from_vec(values.to_vec()).insert_axis(ndarray::Axis(0));
    MatrixFile::from_array(scalar_header(1, values.len()), data).expect("valid shape")
}

/// Collects formatted log output written while a closure runs
#[derive(Clone, Default)]
pub(crate) struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f`, returning its result along with every warning logged on this thread meanwhile.
pub(crate) fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .without_time()
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logged = String::from_utf8_lossy(&capture.0.lock().expect("log buffer")).into_owned();

    (result, logged)
}
