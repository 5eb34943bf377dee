//! Reading and writing the XML document that describes the axes of a CIFTI matrix.
//!
//! Two versions of the document are understood. CIFTI-2 (the default for writing) can describe
//! any number of axes and records the length of every axis. CIFTI-1 is the legacy form: it only
//! knows about two axes, numbers them the other way round, and doesn't record the length of a
//! series (time points) axis. Series maps read from CIFTI-1 therefore have an unset length,
//! which the reader of the surrounding file resolves from the matrix dimensions.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::{
    errors::{Error, Result},
    header::MatrixHeader,
    mapping::{
        BrainModelsMap, DimensionMap, ModelKind, NamedMap, Parcel, ParcelSurface, ParcelsMap,
        ScalarsMap, SeriesMap, SeriesUnit, VolumeSpace,
    },
};

const TYPE_BRAIN_MODELS: &str = "CIFTI_INDEX_TYPE_BRAIN_MODELS";
const TYPE_PARCELS: &str = "CIFTI_INDEX_TYPE_PARCELS";
const TYPE_SCALARS: &str = "CIFTI_INDEX_TYPE_SCALARS";
const TYPE_SERIES: &str = "CIFTI_INDEX_TYPE_SERIES";
const TYPE_TIME_POINTS: &str = "CIFTI_INDEX_TYPE_TIME_POINTS";

const MODEL_SURFACE: &str = "CIFTI_MODEL_TYPE_SURFACE";
const MODEL_VOXELS: &str = "CIFTI_MODEL_TYPE_VOXELS";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CiftiVersion {
    V1,
    #[default]
    V2,
}

impl CiftiVersion {
    fn as_str(&self) -> &'static str {
        match self {
            CiftiVersion::V1 => "1.0",
            CiftiVersion::V2 => "2",
        }
    }

    fn from_attribute(value: &str) -> Result<Self> {
        match value.trim() {
            "1" | "1.0" => Ok(CiftiVersion::V1),
            "2" | "2.0" => Ok(CiftiVersion::V2),
            other => Err(Error::format(format!("unsupported CIFTI version '{other}'"))),
        }
    }

    /// Attribute holding the size of a surface
    fn surface_count(&self) -> &'static str {
        match self {
            CiftiVersion::V1 => "SurfaceNumberOfNodes",
            CiftiVersion::V2 => "SurfaceNumberOfVertices",
        }
    }

    /// Element holding the surface indices of a brain model
    fn vertex_indices(&self) -> &'static str {
        match self {
            CiftiVersion::V1 => "NodeIndices",
            CiftiVersion::V2 => "VertexIndices",
        }
    }

    /// Element holding the surface indices of a parcel
    fn parcel_vertices(&self) -> &'static str {
        match self {
            CiftiVersion::V1 => "Nodes",
            CiftiVersion::V2 => "Vertices",
        }
    }

    /// Convert between the dimension number used in the document and the axis index.
    ///
    /// CIFTI-1 numbers the two dimensions in the opposite order, the conversion is its own
    /// inverse.
    ///
    fn swap_dimension(&self, dimension: usize) -> Result<usize> {
        match (self, dimension) {
            (CiftiVersion::V2, _) => Ok(dimension),
            (CiftiVersion::V1, 0) => Ok(1),
            (CiftiVersion::V1, 1) => Ok(0),
            (CiftiVersion::V1, _) => Err(Error::format(format!(
                "CIFTI-1 has no dimension {dimension}"
            ))),
        }
    }
}

impl MatrixHeader {
    /// Parse a header from either version of the XML document.
    pub fn from_xml(text: &str) -> Result<Self> {
        let root = parse_document(text)?;
        read_header(&root)
    }

    /// Serialize the header.
    ///
    /// Writing CIFTI-1 requires exactly two axes. Writing CIFTI-2 requires every series axis to
    /// have a known length.
    ///
    pub fn to_xml(&self, version: CiftiVersion) -> Result<String> {
        let root = header_element(self, version)?;
        write_document(&root)
    }
}

/// Bare bones element tree, just enough structure to interpret a CIFTI document
#[derive(Clone, Debug, Default, PartialEq)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn with_attribute<V: Display>(mut self, key: &str, value: V) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn required(&self, key: &str) -> Result<&str> {
        self.attribute(key).ok_or_else(|| {
            Error::format(format!("<{}> is missing attribute {key}", self.name))
        })
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<T> {
        let value = self.required(key)?;
        value.trim().parse().map_err(|_| {
            Error::format(format!(
                "<{}> attribute {key} has invalid value '{value}'",
                self.name
            ))
        })
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.attribute(key) {
            Some(_) => self.parse(key),
            None => Ok(default),
        }
    }

    fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    fn required_child(&self, name: &str) -> Result<&Element> {
        self.child(name)
            .ok_or_else(|| Error::format(format!("<{}> is missing <{name}>", self.name)))
    }
}

fn parse_document(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<Element> = vec![];
    let mut root = None;
    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| Error::format("unbalanced XML document"))?;
                // Indentation between child elements
                if !element.children.is_empty() && element.text.trim().is_empty() {
                    element.text.clear();
                }
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::format("XML document ended early"));
    }
    root.ok_or_else(|| Error::format("empty XML document"))
}

fn element_from(start: &BytesStart) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_some() {
                return Err(Error::format("XML document has more than one root element"));
            }
            *root = Some(element);
        }
    }

    Ok(())
}

fn write_document(root: &Element) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut writer, root)?;

    String::from_utf8(writer.into_inner())
        .map_err(|_| Error::format("serialized XML is not valid UTF-8"))
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if !element.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&element.text)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;

    Ok(())
}

fn parse_numbers<T: FromStr>(text: &str, context: &str) -> Result<Vec<T>> {
    text.split_whitespace()
        .map(|word| {
            word.parse()
                .map_err(|_| Error::format(format!("invalid number '{word}' in <{context}>")))
        })
        .collect()
}

fn parse_list<T: FromStr>(text: &str, context: &str) -> Result<Vec<T>> {
    text.split(',')
        .map(|word| {
            word.trim()
                .parse()
                .map_err(|_| Error::format(format!("invalid list item '{word}' in {context}")))
        })
        .collect()
}

fn join<T: Display>(items: impl IntoIterator<Item = T>, separator: &str) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<String>>()
        .join(separator)
}

fn read_header(root: &Element) -> Result<MatrixHeader> {
    if root.name != "CIFTI" {
        return Err(Error::format(format!(
            "root element is <{}>, not <CIFTI>",
            root.name
        )));
    }
    let version = CiftiVersion::from_attribute(root.required("Version")?)?;
    let matrix = root.required_child("Matrix")?;

    let mut header = MatrixHeader::new(0);
    header.metadata = read_metadata(matrix.child("MetaData"))?;

    // CIFTI-1 keeps a single volume space for the whole matrix
    let matrix_volume = matrix.child("Volume");
    for element in matrix.children("MatrixIndicesMap") {
        let map = read_map(element, matrix_volume, version)?;
        let dimensions: Vec<usize> =
            parse_list(element.required("AppliesToMatrixDimension")?, "AppliesToMatrixDimension")?;
        for dimension in dimensions {
            let axis = version.swap_dimension(dimension)?;
            if header.map(axis).is_some() {
                return Err(Error::format(format!(
                    "dimension {dimension} is mapped more than once"
                )));
            }
            header.set_map(axis, map.clone());
        }
    }

    if header.axis_count() == 0 {
        return Err(Error::format("document has no <MatrixIndicesMap>"));
    }
    for axis in 0..header.axis_count() {
        if header.map(axis).is_none() {
            return Err(Error::format(format!("dimension {axis} has no mapping")));
        }
    }

    Ok(header)
}

fn read_map(
    element: &Element,
    matrix_volume: Option<&Element>,
    version: CiftiVersion,
) -> Result<DimensionMap> {
    let map = match element.required("IndicesMapToDataType")? {
        TYPE_BRAIN_MODELS => {
            DimensionMap::BrainModels(read_brain_models(element, matrix_volume, version)?)
        }
        TYPE_PARCELS => DimensionMap::Parcels(read_parcels(element, matrix_volume, version)?),
        TYPE_SCALARS => DimensionMap::Scalars(read_scalars(element)?),
        TYPE_SERIES if version == CiftiVersion::V2 => DimensionMap::Series(read_series(element)?),
        TYPE_TIME_POINTS if version == CiftiVersion::V1 => {
            DimensionMap::Series(read_time_points(element)?)
        }
        other => {
            return Err(Error::format(format!(
                "unsupported mapping type {other} for CIFTI version {}",
                version.as_str()
            )))
        }
    };

    Ok(map)
}

fn read_metadata(element: Option<&Element>) -> Result<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    if let Some(element) = element {
        for md in element.children("MD") {
            let name = md.required_child("Name")?.text.clone();
            let value = md.child("Value").map(|value| value.text.clone());
            metadata.insert(name, value.unwrap_or_default());
        }
    }

    Ok(metadata)
}

fn metadata_element(metadata: &BTreeMap<String, String>) -> Element {
    let mut element = Element::new("MetaData");
    for (name, value) in metadata {
        element = element.with_child(
            Element::new("MD")
                .with_child(Element::new("Name").with_text(name.as_str()))
                .with_child(Element::new("Value").with_text(value.as_str())),
        );
    }

    element
}

fn read_volume(element: &Element, version: CiftiVersion) -> Result<VolumeSpace> {
    let dims: Vec<u64> = parse_list(element.required("VolumeDimensions")?, "VolumeDimensions")?;
    let dims: [u64; 3] = dims
        .try_into()
        .map_err(|_| Error::format("VolumeDimensions must have 3 values"))?;

    let transform = element.required_child("TransformationMatrixVoxelIndicesIJKtoXYZ")?;
    let exponent: i32 = match version {
        CiftiVersion::V2 => transform.parse("MeterExponent")?,
        CiftiVersion::V1 => match transform.attribute("UnitsXYZ") {
            None | Some("NIFTI_UNITS_MM") => -3,
            Some("NIFTI_UNITS_MICRON") => -6,
            Some("NIFTI_UNITS_METER") => 0,
            Some(other) => {
                return Err(Error::format(format!("unsupported volume units {other}")));
            }
        },
    };
    let values: Vec<f64> = parse_numbers(&transform.text, &transform.name)?;
    if values.len() != 16 {
        return Err(Error::format(format!(
            "transformation matrix has {} values, expected 16",
            values.len()
        )));
    }

    // Store millimeters
    let scale = 10f64.powi(exponent + 3);
    let mut sform = [[0.0; 4]; 3];
    for (row, sform_row) in sform.iter_mut().enumerate() {
        for (col, value) in sform_row.iter_mut().enumerate() {
            *value = values[row * 4 + col] * scale;
        }
    }

    Ok(VolumeSpace { dims, sform })
}

fn volume_element(volume: &VolumeSpace, version: CiftiVersion) -> Element {
    let values = volume
        .sform
        .iter()
        .flatten()
        .copied()
        .chain([0.0, 0.0, 0.0, 1.0]);
    let transform = Element::new("TransformationMatrixVoxelIndicesIJKtoXYZ");
    let transform = match version {
        CiftiVersion::V1 => transform
            .with_attribute("DataSpace", "NIFTI_XFORM_UNKNOWN")
            .with_attribute("TransformedSpace", "NIFTI_XFORM_UNKNOWN")
            .with_attribute("UnitsXYZ", "NIFTI_UNITS_MM"),
        CiftiVersion::V2 => transform.with_attribute("MeterExponent", -3),
    };

    Element::new("Volume")
        .with_attribute("VolumeDimensions", join(volume.dims, ","))
        .with_child(transform.with_text(join(values, " ")))
}

fn read_voxels(element: Option<&Element>) -> Result<Vec<[u64; 3]>> {
    let element = match element {
        Some(element) => element,
        None => return Ok(vec![]),
    };
    let values: Vec<u64> = parse_numbers(&element.text, &element.name)?;
    if values.len() % 3 != 0 {
        return Err(Error::format(format!(
            "<{}> has {} values, not a multiple of 3",
            element.name,
            values.len()
        )));
    }

    Ok(values
        .chunks_exact(3)
        .map(|ijk| [ijk[0], ijk[1], ijk[2]])
        .collect())
}

fn voxels_element(voxels: &[[u64; 3]]) -> Element {
    Element::new("VoxelIndicesIJK").with_text(join(voxels.iter().flatten(), " "))
}

fn read_brain_models(
    element: &Element,
    matrix_volume: Option<&Element>,
    version: CiftiVersion,
) -> Result<BrainModelsMap> {
    let volume = match version {
        CiftiVersion::V1 => matrix_volume,
        CiftiVersion::V2 => element.child("Volume"),
    };
    let mut map = BrainModelsMap {
        volume: volume.map(|volume| read_volume(volume, version)).transpose()?,
        models: vec![],
    };

    for model in element.children("BrainModel") {
        let offset: usize = model.parse("IndexOffset")?;
        let count: usize = model.parse("IndexCount")?;
        let structure = model.required("BrainStructure")?;
        if offset != map.length() {
            return Err(Error::format(format!(
                "brain model {structure} has index offset {offset}, expected {}",
                map.length()
            )));
        }

        match model.required("ModelType")? {
            MODEL_SURFACE => {
                let surface_vertices: usize = model.parse(version.surface_count())?;
                let vertices = match model.child(version.vertex_indices()) {
                    Some(list) => parse_numbers(&list.text, &list.name)?,
                    // A model covering the whole surface may leave out the list
                    None if count == surface_vertices => (0..count as u64).collect(),
                    None => {
                        return Err(Error::format(format!(
                            "surface model {structure} has no <{}>",
                            version.vertex_indices()
                        )));
                    }
                };
                if let Some(vertex) = vertices.iter().find(|&&v| v as usize >= surface_vertices)
                {
                    return Err(Error::format(format!(
                        "vertex {vertex} is out of range for {structure} with {surface_vertices} vertices"
                    )));
                }
                map.add_surface(structure, surface_vertices, vertices);
            }
            MODEL_VOXELS => {
                if map.volume.is_none() {
                    return Err(Error::format(format!(
                        "voxel model {structure} without a volume space"
                    )));
                }
                let voxels = read_voxels(model.child("VoxelIndicesIJK"))?;
                map.add_voxels(structure, voxels);
            }
            other => {
                return Err(Error::format(format!("unknown model type {other}")));
            }
        }

        let added = map.models.last().map(|model| model.index_count());
        if added != Some(count) {
            return Err(Error::format(format!(
                "brain model {structure} has IndexCount {count} but lists {} indices",
                added.unwrap_or(0)
            )));
        }
    }

    Ok(map)
}

fn read_parcels(
    element: &Element,
    matrix_volume: Option<&Element>,
    version: CiftiVersion,
) -> Result<ParcelsMap> {
    let volume = match version {
        CiftiVersion::V1 => matrix_volume,
        CiftiVersion::V2 => element.child("Volume"),
    };
    let mut map = ParcelsMap {
        volume: volume.map(|volume| read_volume(volume, version)).transpose()?,
        surfaces: vec![],
        parcels: vec![],
    };

    for surface in element.children("Surface") {
        map.surfaces.push(ParcelSurface {
            structure: surface.required("BrainStructure")?.to_string(),
            surface_vertices: surface.parse(version.surface_count())?,
        });
    }

    for element in element.children("Parcel") {
        let mut parcel = Parcel {
            name: element.required("Name")?.to_string(),
            ..Default::default()
        };
        for list in element.children(version.parcel_vertices()) {
            let structure = list.required("BrainStructure")?;
            if !map.surfaces.iter().any(|surface| surface.structure == structure) {
                return Err(Error::format(format!(
                    "parcel {} uses undeclared surface {structure}",
                    parcel.name
                )));
            }
            parcel
                .vertices
                .insert(structure.to_string(), parse_numbers(&list.text, &list.name)?);
        }
        parcel.voxels = read_voxels(element.child("VoxelIndicesIJK"))?;
        if !parcel.voxels.is_empty() && map.volume.is_none() {
            return Err(Error::format(format!(
                "parcel {} has voxels but there is no volume space",
                parcel.name
            )));
        }
        map.parcels.push(parcel);
    }

    Ok(map)
}

fn read_scalars(element: &Element) -> Result<ScalarsMap> {
    let mut map = ScalarsMap::default();
    for named in element.children("NamedMap") {
        map.maps.push(NamedMap {
            name: named.required_child("MapName")?.text.clone(),
            metadata: read_metadata(named.child("MetaData"))?,
        });
    }

    Ok(map)
}

fn read_series(element: &Element) -> Result<SeriesMap> {
    let exponent: i32 = element.parse_or("SeriesExponent", 0)?;
    let scale = 10f64.powi(exponent);
    let unit = element.required("SeriesUnit")?;
    let unit = SeriesUnit::from_name(unit)
        .ok_or_else(|| Error::format(format!("unknown series unit {unit}")))?;

    Ok(SeriesMap {
        length: Some(element.parse("NumberOfSeriesPoints")?),
        start: element.parse::<f64>("SeriesStart")? * scale,
        step: element.parse::<f64>("SeriesStep")? * scale,
        unit,
    })
}

fn read_time_points(element: &Element) -> Result<SeriesMap> {
    let (scale, unit) = match element.required("TimeStepUnits")? {
        "NIFTI_UNITS_SEC" => (1.0, SeriesUnit::Second),
        "NIFTI_UNITS_MSEC" => (1e-3, SeriesUnit::Second),
        "NIFTI_UNITS_USEC" => (1e-6, SeriesUnit::Second),
        "NIFTI_UNITS_HZ" => (1.0, SeriesUnit::Hertz),
        other => {
            return Err(Error::format(format!("unsupported time step units {other}")));
        }
    };

    // Length isn't part of CIFTI-1, it comes from the matrix dimensions
    Ok(SeriesMap {
        length: None,
        start: element.parse_or("TimeStart", 0.0)? * scale,
        step: element.parse::<f64>("TimeStep")? * scale,
        unit,
    })
}

fn header_element(header: &MatrixHeader, version: CiftiVersion) -> Result<Element> {
    if version == CiftiVersion::V1 && header.axis_count() != 2 {
        return Err(Error::AxisCount(header.axis_count()));
    }

    // Axes with identical maps share one <MatrixIndicesMap>
    let mut groups: Vec<(Vec<usize>, &DimensionMap)> = vec![];
    for axis in 0..header.axis_count() {
        let map = header
            .map(axis)
            .ok_or_else(|| Error::format(format!("dimension {axis} has no mapping")))?;
        if version == CiftiVersion::V2 && map.length().is_none() {
            return Err(Error::UnresolvedLength(axis));
        }
        let dimension = version.swap_dimension(axis)?;
        match groups.iter_mut().find(|(_, other)| *other == map) {
            Some((dimensions, _)) => dimensions.push(dimension),
            None => groups.push((vec![dimension], map)),
        }
    }

    let mut matrix = Element::new("Matrix");
    if !header.metadata.is_empty() {
        matrix = matrix.with_child(metadata_element(&header.metadata));
    }
    for (mut dimensions, map) in groups {
        dimensions.sort_unstable();
        matrix = matrix.with_child(map_element(map, &dimensions, version)?);
    }
    if version == CiftiVersion::V1 {
        if let Some(volume) = shared_volume(header)? {
            matrix = matrix.with_child(volume_element(volume, version));
        }
    }

    let root = Element::new("CIFTI").with_attribute("Version", version.as_str());
    let root = match version {
        CiftiVersion::V1 => root.with_attribute("NumberOfMatrices", 1),
        CiftiVersion::V2 => root,
    };

    Ok(root.with_child(matrix))
}

/// The one volume space a CIFTI-1 document can hold.
fn shared_volume(header: &MatrixHeader) -> Result<Option<&VolumeSpace>> {
    let mut volume: Option<&VolumeSpace> = None;
    for axis in 0..header.axis_count() {
        let this = match header.map(axis) {
            Some(DimensionMap::BrainModels(map)) => map.volume.as_ref(),
            Some(DimensionMap::Parcels(map)) => map.volume.as_ref(),
            _ => None,
        };
        match (volume, this) {
            (Some(volume), Some(this)) if volume != this => {
                return Err(Error::format(
                    "CIFTI-1 can't hold different volume spaces for each dimension",
                ));
            }
            (None, Some(this)) => volume = Some(this),
            _ => {}
        }
    }

    Ok(volume)
}

fn map_element(map: &DimensionMap, dimensions: &[usize], version: CiftiVersion) -> Result<Element> {
    let element =
        Element::new("MatrixIndicesMap").with_attribute("AppliesToMatrixDimension", join(dimensions, ","));

    let element = match map {
        DimensionMap::BrainModels(map) => {
            let mut element = element.with_attribute("IndicesMapToDataType", TYPE_BRAIN_MODELS);
            if let (CiftiVersion::V2, Some(volume)) = (version, &map.volume) {
                element = element.with_child(volume_element(volume, version));
            }
            for model in &map.models {
                let model_element = Element::new("BrainModel")
                    .with_attribute("IndexOffset", model.index_offset)
                    .with_attribute("IndexCount", model.index_count());
                let model_element = match &model.kind {
                    ModelKind::Surface {
                        surface_vertices,
                        vertices,
                    } => model_element
                        .with_attribute("ModelType", MODEL_SURFACE)
                        .with_attribute("BrainStructure", &model.structure)
                        .with_attribute(version.surface_count(), surface_vertices)
                        .with_child(
                            Element::new(version.vertex_indices()).with_text(join(vertices, " ")),
                        ),
                    ModelKind::Voxels { voxels } => model_element
                        .with_attribute("ModelType", MODEL_VOXELS)
                        .with_attribute("BrainStructure", &model.structure)
                        .with_child(voxels_element(voxels)),
                };
                element = element.with_child(model_element);
            }

            element
        }
        DimensionMap::Parcels(map) => {
            let mut element = element.with_attribute("IndicesMapToDataType", TYPE_PARCELS);
            if let (CiftiVersion::V2, Some(volume)) = (version, &map.volume) {
                element = element.with_child(volume_element(volume, version));
            }
            for surface in &map.surfaces {
                element = element.with_child(
                    Element::new("Surface")
                        .with_attribute("BrainStructure", &surface.structure)
                        .with_attribute(version.surface_count(), surface.surface_vertices),
                );
            }
            for parcel in &map.parcels {
                let mut parcel_element = Element::new("Parcel").with_attribute("Name", &parcel.name);
                for (structure, vertices) in &parcel.vertices {
                    parcel_element = parcel_element.with_child(
                        Element::new(version.parcel_vertices())
                            .with_attribute("BrainStructure", structure)
                            .with_text(join(vertices, " ")),
                    );
                }
                if !parcel.voxels.is_empty() {
                    parcel_element = parcel_element.with_child(voxels_element(&parcel.voxels));
                }
                element = element.with_child(parcel_element);
            }

            element
        }
        DimensionMap::Scalars(map) => {
            let mut element = element.with_attribute("IndicesMapToDataType", TYPE_SCALARS);
            for named in &map.maps {
                let mut named_element = Element::new("NamedMap");
                if !named.metadata.is_empty() {
                    named_element = named_element.with_child(metadata_element(&named.metadata));
                }
                named_element =
                    named_element.with_child(Element::new("MapName").with_text(named.name.as_str()));
                element = element.with_child(named_element);
            }

            element
        }
        DimensionMap::Series(series) => match version {
            CiftiVersion::V2 => element
                .with_attribute("IndicesMapToDataType", TYPE_SERIES)
                .with_attribute(
                    "NumberOfSeriesPoints",
                    series.length.ok_or(Error::UnresolvedLength(dimensions[0]))?,
                )
                .with_attribute("SeriesExponent", 0)
                .with_attribute("SeriesStart", series.start)
                .with_attribute("SeriesStep", series.step)
                .with_attribute("SeriesUnit", series.unit.as_str()),
            CiftiVersion::V1 => {
                let units = match series.unit {
                    SeriesUnit::Second => "NIFTI_UNITS_SEC",
                    SeriesUnit::Hertz => "NIFTI_UNITS_HZ",
                    other => {
                        return Err(Error::format(format!(
                            "series unit {} has no CIFTI-1 equivalent",
                            other.as_str()
                        )));
                    }
                };
                element
                    .with_attribute("IndicesMapToDataType", TYPE_TIME_POINTS)
                    .with_attribute("TimeStepUnits", units)
                    .with_attribute("TimeStart", series.start)
                    .with_attribute("TimeStep", series.step)
            }
        },
    };

    Ok(element)
}
