//! Single-band GeoTIFF reading and writing.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array2, ArrayView2, s};
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{TiffEncoder, colortype::Gray32Float};
use tiff::tags::Tag;
use tracing::debug;

use crate::error::{Error, Result};
use crate::geom::WGS84;
use crate::raster::grid::check_transform;
use crate::raster::source::check_window;
use crate::raster::{GeoTransform, RasterGrid, RasterSource};

// GeoTIFF / GDAL tag IDs (not named by the tiff crate)
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

// GeoKey IDs and values
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Georeferencing read from the first image directory.
#[derive(Debug)]
struct Header {
    width: usize,
    height: usize,
    transform: GeoTransform,
    nodata: Option<f64>,
    epsg: u32,
}

fn read_header<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Header> {
    if !matches!(decoder.colortype()?, ColorType::Gray(_)) {
        return Err(Error::InvalidRaster("only single-band rasters are supported".into()));
    }
    let (width, height) = decoder.dimensions()?;
    Ok(Header {
        width: width as usize,
        height: height as usize,
        transform: read_transform(decoder)?,
        nodata: read_nodata(decoder)?,
        epsg: read_epsg(decoder)?,
    })
}

/// Read a whole single-band GeoTIFF into a [`RasterGrid`].
///
/// Only suitable for small rasters; use [`GeoTiffRaster`] to read windows of large ones.
pub fn read_geotiff(path: &Path) -> Result<RasterGrid> {
    let file = File::open(path)?;
    debug!(target: "raster::geotiff", "reading {}", path.display());
    read_geotiff_from(BufReader::new(file))
}

/// Read a whole single-band GeoTIFF from any seekable reader.
pub fn read_geotiff_from<R: Read + Seek>(reader: R) -> Result<RasterGrid> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());
    let header = read_header(&mut decoder)?;

    let shape = (header.height, header.width);
    let values = to_f32(decoder.read_image()?)?;
    if values.len() != shape.0 * shape.1 {
        return Err(Error::InvalidRaster(format!(
            "expected a single band of {}x{} samples, got {} values", shape.0, shape.1, values.len(),
        )));
    }
    let data = Array2::from_shape_vec(shape, values)
        .map_err(|e| Error::InvalidRaster(e.to_string()))?;

    RasterGrid::new(data, header.transform, header.nodata, header.epsg)
}

fn to_f32(result: DecodingResult) -> Result<Vec<f32>> {
    Ok(match result {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        #[allow(unreachable_patterns)]
        _ => return Err(Error::InvalidRaster("unsupported sample format".into())),
    })
}

/// A GeoTIFF on disk, read lazily by pixel window.
///
/// Opening parses only the header. [`RasterSource::read_window`] decodes the strips or
/// tiles that intersect the window, so a district of a national raster costs a few
/// chunks rather than the whole image.
#[derive(Debug)]
pub struct GeoTiffRaster {
    path: PathBuf,
    header: Header,
    chunk: (usize, usize),       // (width, height) of a full strip or tile
    chunks_read: AtomicUsize,
}

impl GeoTiffRaster {
    pub fn open(path: &Path) -> Result<Self> {
        let mut decoder = decoder_for(path)?;
        let header = read_header(&mut decoder)?;
        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        if chunk_width == 0 || chunk_height == 0 {
            return Err(Error::InvalidRaster(format!("zero-sized chunks in {}", path.display())));
        }

        if header.width == 0 || header.height == 0 {
            return Err(Error::InvalidRaster(format!("{} has zero rows or columns", path.display())));
        }
        check_transform(&header.transform)?;

        debug!(
            target: "raster::geotiff",
            "opened {} ({}x{}, {chunk_width}x{chunk_height} chunks, EPSG:{})",
            path.display(), header.width, header.height, header.epsg,
        );
        Ok(Self {
            path: path.to_path_buf(),
            header,
            chunk: (chunk_width as usize, chunk_height as usize),
            chunks_read: AtomicUsize::new(0),
        })
    }

    #[inline] pub fn path(&self) -> &Path { &self.path }

    /// (width, height) of a full strip or tile.
    #[inline] pub fn chunk_dimensions(&self) -> (usize, usize) { self.chunk }

    /// Strips or tiles decoded so far, across all windows.
    #[inline] pub fn chunks_read(&self) -> usize { self.chunks_read.load(Ordering::Relaxed) }
}

fn decoder_for(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited()))
}

impl RasterSource for GeoTiffRaster {
    #[inline] fn transform(&self) -> &GeoTransform { &self.header.transform }

    #[inline] fn height(&self) -> usize { self.header.height }

    #[inline] fn width(&self) -> usize { self.header.width }

    #[inline] fn nodata(&self) -> Option<f64> { self.header.nodata }

    #[inline] fn epsg(&self) -> u32 { self.header.epsg }

    fn read_window(&self, rows: Range<usize>, cols: Range<usize>) -> Result<RasterGrid> {
        let (width, height) = (self.header.width, self.header.height);
        check_window(&rows, &cols, height, width)?;

        let (chunk_width, chunk_height) = self.chunk;
        let across = width.div_ceil(chunk_width);
        let mut decoder = decoder_for(&self.path)?;
        let mut data = Array2::from_elem((rows.len(), cols.len()), f32::NAN);
        let mut decoded = 0;

        for chunk_row in rows.start / chunk_height..=(rows.end - 1) / chunk_height {
            for chunk_col in cols.start / chunk_width..=(cols.end - 1) / chunk_width {
                let (top, left) = (chunk_row * chunk_height, chunk_col * chunk_width);
                // Edge chunks are returned without padding.
                let shape = (chunk_height.min(height - top), chunk_width.min(width - left));

                let index = u32::try_from(chunk_row * across + chunk_col)
                    .map_err(|_| Error::InvalidRaster("chunk index out of range".into()))?;
                let values = to_f32(decoder.read_chunk(index)?)?;
                let chunk = ArrayView2::from_shape(shape, values.as_slice())
                    .map_err(|e| Error::InvalidRaster(format!("chunk {index}: {e}")))?;
                decoded += 1;

                let r = rows.start.max(top)..rows.end.min(top + shape.0);
                let c = cols.start.max(left)..cols.end.min(left + shape.1);
                data.slice_mut(s![r.start - rows.start..r.end - rows.start, c.start - cols.start..c.end - cols.start])
                    .assign(&chunk.slice(s![r.start - top..r.end - top, c.start - left..c.end - left]));
            }
        }

        self.chunks_read.fetch_add(decoded, Ordering::Relaxed);
        debug!(target: "raster::geotiff", "window rows {rows:?} cols {cols:?}: decoded {decoded} chunks");
        RasterGrid::new(data, self.header.transform.window(cols.start, rows.start), self.header.nodata, self.header.epsg)
    }
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    if let Some(matrix) = find_f64_vec(decoder, MODEL_TRANSFORMATION)? {
        if matrix.len() < 8 {
            return Err(Error::InvalidRaster("ModelTransformation must have 16 values".into()));
        }
        return Ok(GeoTransform::new(matrix[0], matrix[1], matrix[3], matrix[4], matrix[5], matrix[7]));
    }

    let scale = find_f64_vec(decoder, MODEL_PIXEL_SCALE)?
        .ok_or_else(|| Error::InvalidRaster("missing ModelPixelScale tag".into()))?;
    let tiepoint = find_f64_vec(decoder, MODEL_TIEPOINT)?
        .ok_or_else(|| Error::InvalidRaster("missing ModelTiepoint tag".into()))?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(Error::InvalidRaster("malformed ModelPixelScale/ModelTiepoint".into()));
    }

    // Tiepoint [I, J, K, X, Y, Z] ties pixel (I, J) to (X, Y).
    let (sx, sy) = (scale[0], scale[1]);
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    Ok(GeoTransform::new(sx, 0.0, x - i * sx, 0.0, -sy, y + j * sy))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>> {
    let Some(value) = decoder.find_tag(Tag::from_u16_exhaustive(GDAL_NODATA))? else { return Ok(None) };
    let text = value.into_string()?;
    let text = text.trim_matches(char::from(0)).trim();

    match text.to_ascii_lowercase().as_str() {
        "nan" => Ok(Some(f64::NAN)),
        other => other.parse::<f64>()
            .map(Some)
            .map_err(|_| Error::InvalidRaster(format!("unparseable GDAL_NODATA value '{text}'"))),
    }
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<u32> {
    let Some(value) = decoder.find_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))? else { return Ok(WGS84) };
    let keys = value.into_u16_vec()?;

    // Header [version, revision, minor, count], then entries [id, location, count, value].
    let epsg = keys.get(4..).unwrap_or_default()
        .chunks_exact(4)
        .filter(|entry| entry[1] == 0)
        .find_map(|entry| match entry[0] {
            PROJECTED_CS_TYPE_GEO_KEY | GEOGRAPHIC_TYPE_GEO_KEY => Some(entry[3] as u32),
            _ => None,
        });

    Ok(epsg.unwrap_or(WGS84))
}

fn find_f64_vec<R: Read + Seek>(decoder: &mut Decoder<R>, tag: u16) -> Result<Option<Vec<f64>>> {
    decoder.find_tag(Tag::from_u16_exhaustive(tag))?
        .map(|value| value.into_f64_vec())
        .transpose()
        .map_err(Error::from)
}

/// Write a grid as a Float32 GeoTIFF.
pub fn write_geotiff(grid: &RasterGrid, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    debug!(target: "raster::geotiff", "writing {}x{} grid to {}", grid.width(), grid.height(), path.display());
    write_geotiff_to(grid, BufWriter::new(file))
}

/// Write a grid as a Float32 GeoTIFF to any seekable writer.
pub fn write_geotiff_to<W: Write + Seek>(grid: &RasterGrid, writer: W) -> Result<()> {
    write_geotiff_strips(grid, writer, None)
}

/// Write with a fixed number of rows per strip; `None` keeps the encoder's default.
pub(crate) fn write_geotiff_strips<W: Write + Seek>(
    grid: &RasterGrid,
    writer: W,
    rows_per_strip: Option<u32>,
) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<Gray32Float>(grid.width() as u32, grid.height() as u32)?;
    if let Some(rows) = rows_per_strip {
        image.rows_per_strip(rows)?;
    }

    let gt = grid.transform();
    let (sx, sy) = gt.resolution();
    let dir = image.encoder();
    dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), [sx, sy, 0.0].as_slice())?;
    dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), [0.0, 0.0, 0.0, gt.c, gt.f, 0.0].as_slice())?;
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geo_key_directory(grid.epsg()).as_slice())?;
    if let Some(nodata) = grid.nodata() {
        let text = if nodata.is_nan() { "nan".to_string() } else { nodata.to_string() };
        dir.write_tag(Tag::Unknown(GDAL_NODATA), text.as_str())?;
    }

    let pixels = grid.data().iter().copied().collect::<Vec<f32>>();
    image.write_data(&pixels)?;
    Ok(())
}

fn geo_key_directory(epsg: u32) -> Vec<u16> {
    let geographic = crate::geom::proj4_for_epsg(epsg)
        .map(|proj| proj.contains("+proj=longlat"))
        .unwrap_or(epsg == WGS84);
    let (model, crs_key) = if geographic {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_GEO_KEY)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_GEO_KEY)
    };

    vec![
        1, 1, 0, 3,
        GT_MODEL_TYPE_GEO_KEY, 0, 1, model,
        GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, epsg as u16,
    ]
}
