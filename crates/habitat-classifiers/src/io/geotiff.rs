//! Single-band GeoTIFF reading and writing on top of the `tiff` crate.
//!
//! Georeferencing is carried by the ModelPixelScale/ModelTiepoint pair (or
//! ModelTransformation for rotated grids), the EPSG code by the
//! GeoKeyDirectory and the NoData value by the GDAL_NODATA ASCII tag.
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

use crate::error::{HabitatError, Result};
use crate::io::{OutputSink, RasterSource};
use crate::raster::{Crs, GeoTransform, GridSpec, RasterLayer};
use crate::stack::LayerRef;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Read the first band of a GeoTIFF, naming the layer after the file stem.
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<RasterLayer> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    read_named_geotiff(path, &name)
}

fn read_named_geotiff(path: &Path, name: &str) -> Result<RasterLayer> {
    let file = File::open(path)?;
    decode(BufReader::new(file), path, name)
}

fn decode<R: Read + Seek>(reader: R, path: &Path, name: &str) -> Result<RasterLayer> {
    let mut decoder = Decoder::new(reader)
        .map_err(|e| HabitatError::raster(path, e))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| HabitatError::raster(path, e))?;
    let (rows, cols) = (height as usize, width as usize);

    let values: Vec<f32> = match decoder
        .read_image()
        .map_err(|e| HabitatError::raster(path, e))?
    {
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        _ => return Err(HabitatError::raster(path, "unsupported pixel type")),
    };

    if values.len() != rows * cols {
        return Err(HabitatError::raster(
            path,
            format!(
                "expected a single band of {}x{} cells, decoded {} samples",
                rows,
                cols,
                values.len()
            ),
        ));
    }

    let transform = read_transform(&mut decoder).unwrap_or_else(|| {
        log::warn!("{} carries no georeferencing tags", path.display());
        GeoTransform::default()
    });
    let crs = read_crs(&mut decoder);
    let nodata = read_nodata(&mut decoder);

    let grid = GridSpec::new(rows, cols, transform, crs);
    RasterLayer::from_vec(name, grid, nodata, values)
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TRANSFORMATION)) {
        if m.len() >= 8 {
            return Some(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT)).ok()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<Crs> {
    let keys: Vec<u16> = decoder
        .get_tag_u32_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
        .ok()?
        .into_iter()
        .map(|v| v as u16)
        .collect();
    if keys.len() < 4 {
        return None;
    }
    let n_keys = keys[3] as usize;
    let mut geographic = None;
    let mut projected = None;
    for entry in keys[4..].chunks_exact(4).take(n_keys) {
        // [key id, tag location, count, value]; location 0 means inline value
        if entry[1] != 0 || entry[3] == USER_DEFINED {
            continue;
        }
        match entry[0] {
            PROJECTED_CS_TYPE_KEY => projected = Some(entry[3]),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(entry[3]),
            _ => {}
        }
    }
    projected.or(geographic).map(|code| Crs::from_epsg(code as u32))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA)).ok()?;
    let text = text.trim_matches(char::from(0)).trim();
    match text.to_ascii_lowercase().as_str() {
        "nan" | "-nan" => Some(f64::NAN),
        other => other.parse::<f64>().ok(),
    }
}

/// Write a layer as a single-band 32-bit float GeoTIFF.
pub fn write_geotiff<P: AsRef<Path>>(path: P, layer: &RasterLayer) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode(&mut writer, path, layer)?;
    writer.flush()?;
    Ok(())
}

fn encode<W: Write + Seek>(writer: W, path: &Path, layer: &RasterLayer) -> Result<()> {
    let grid = layer.grid();
    let mut encoder = TiffEncoder::new(writer).map_err(|e| HabitatError::raster(path, e))?;
    let mut image = encoder
        .new_image::<Gray32Float>(grid.cols as u32, grid.rows as u32)
        .map_err(|e| HabitatError::raster(path, e))?;

    let gt = grid.transform;
    if gt.row_rotation == 0.0 && gt.col_rotation == 0.0 {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &scale[..])
            .map_err(|e| HabitatError::raster(path, e))?;
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), &tiepoint[..])
            .map_err(|e| HabitatError::raster(path, e))?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(MODEL_TRANSFORMATION), &matrix[..])
            .map_err(|e| HabitatError::raster(path, e))?;
    }

    let geokeys = geo_key_directory(grid.crs.as_ref());
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), &geokeys[..])
        .map_err(|e| HabitatError::raster(path, e))?;

    if let Some(nodata) = layer.nodata() {
        let text = if nodata.is_nan() {
            "nan".to_string()
        } else {
            nodata.to_string()
        };
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), text.as_str())
            .map_err(|e| HabitatError::raster(path, e))?;
    }

    let data: Vec<f32> = layer.data().iter().copied().collect();
    image
        .write_data(&data)
        .map_err(|e| HabitatError::raster(path, e))?;
    Ok(())
}

/// EPSG codes 4000-4999 are written as geographic, everything else as projected.
fn geo_key_directory(crs: Option<&Crs>) -> Vec<u16> {
    let epsg = crs
        .and_then(|c| c.epsg())
        .and_then(|code| u16::try_from(code).ok());
    let geographic = matches!(epsg, Some(4000..=4999));

    let mut keys: Vec<u16> = vec![1, 1, 0, 0];
    keys.extend_from_slice(&[GT_MODEL_TYPE_KEY, 0, 1, if geographic { 2 } else { 1 }]);
    keys.extend_from_slice(&[GT_RASTER_TYPE_KEY, 0, 1, 1]);
    if let Some(code) = epsg {
        let key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        keys.extend_from_slice(&[key, 0, 1, code]);
    }
    keys[3] = ((keys.len() - 4) / 4) as u16;
    keys
}

/// [`RasterSource`] reading layer references from GeoTIFF files.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoTiffSource;

impl RasterSource for GeoTiffSource {
    fn read_layer(&self, layer: &LayerRef) -> Result<RasterLayer> {
        read_named_geotiff(&layer.path, &layer.name)
    }
}

/// [`OutputSink`] writing GeoTIFFs and text files below their parent directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoTiffSink;

impl OutputSink for GeoTiffSink {
    fn write_raster(&self, path: &Path, layer: &RasterLayer) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_geotiff(path, layer)
    }

    fn write_text(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }
}
