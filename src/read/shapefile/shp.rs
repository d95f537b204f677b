/// Reads ESRI ".shp" Shapefile, as per
/// https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use itertools::Itertools;

const SHP_HEADER_LENGTH: usize = 100;
const SHP_RECORD_HEADER_LENGTH: usize = 8;
const SHP_MAGIC_NUMBER: u32 = 9994;
const SHP_VERSION: u32 = 1000;
const SHP_POINT_LENGTH: usize = 16;
const SHP_BOUNDING_BOX_LENGTH: usize = 32;
const SHP_RANGE_LENGTH: usize = 16;

#[derive(Debug)]
pub enum ShpError {
    IOError(io::Error),
    /// The file is not a shapefile we can read: bad magic, version, type.
    FormatError(String),
    /// A record claims more bytes than the file (or its record) holds.
    TruncatedRecordError(String),
    /// A record's part index array points outside its point array.
    CorruptIndexError(String),
}

impl error::Error for ShpError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ShpError::IOError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ShpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ShpError::IOError(ref err) => err.fmt(f),
            ShpError::FormatError(ref description) => write!(f, "Format error: {}", description),
            ShpError::TruncatedRecordError(ref description) => write!(f, "Truncated record: {}", description),
            ShpError::CorruptIndexError(ref description) => write!(f, "Corrupt part index: {}", description),
        }
    }
}

impl From<io::Error> for ShpError {
    fn from(err: io::Error) -> ShpError {
        ShpError::IOError(err)
    }
}

#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum ShpShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
}

impl ShpShapeType {
    pub fn from_u32(u: u32) -> Option<ShpShapeType> {
        match u {
            0  => Some(ShpShapeType::Null),
            1  => Some(ShpShapeType::Point),
            3  => Some(ShpShapeType::PolyLine),
            5  => Some(ShpShapeType::Polygon),
            8  => Some(ShpShapeType::MultiPoint),
            11 => Some(ShpShapeType::PointZ),
            13 => Some(ShpShapeType::PolyLineZ),
            15 => Some(ShpShapeType::PolygonZ),
            18 => Some(ShpShapeType::MultiPointZ),
            21 => Some(ShpShapeType::PointM),
            23 => Some(ShpShapeType::PolyLineM),
            25 => Some(ShpShapeType::PolygonM),
            28 => Some(ShpShapeType::MultiPointM),
            31 => Some(ShpShapeType::MultiPatch),
            _ => None,
        }
    }

    /// True for types that store a Z range and one Z per point.
    pub fn has_z(&self) -> bool {
        match *self {
            ShpShapeType::PointZ | ShpShapeType::PolyLineZ | ShpShapeType::PolygonZ
                | ShpShapeType::MultiPointZ | ShpShapeType::MultiPatch => true,
            _ => false,
        }
    }

    /// True for types that (may) carry measures. We skip them.
    pub fn has_m(&self) -> bool {
        match *self {
            ShpShapeType::Null | ShpShapeType::Point | ShpShapeType::PolyLine
                | ShpShapeType::Polygon | ShpShapeType::MultiPoint => false,
            _ => true,
        }
    }

    fn is_point(&self) -> bool {
        match *self {
            ShpShapeType::Point | ShpShapeType::PointZ | ShpShapeType::PointM => true,
            _ => false,
        }
    }

    fn is_multi_point(&self) -> bool {
        match *self {
            ShpShapeType::MultiPoint | ShpShapeType::MultiPointZ | ShpShapeType::MultiPointM => true,
            _ => false,
        }
    }
}

/// (xmin, ymin, xmax, ymax)
#[derive(Debug,Copy,Clone,PartialEq)]
pub struct ShpBoundingBox(pub f64, pub f64, pub f64, pub f64);

/// (min, max)
#[derive(Debug,Copy,Clone,PartialEq)]
pub struct ShpRange(pub f64, pub f64);

#[derive(Debug,Copy,Clone)]
pub struct ShpHeader {
    pub file_n_bytes: usize,
    pub shape_type: ShpShapeType,
    pub bounding_box: ShpBoundingBox,
    pub z_range: ShpRange,
}

/// (x, y, z). z is 0 for 2-D shape types.
#[derive(Debug,Clone,Copy,PartialEq,PartialOrd)]
pub struct ShpPoint(pub f64, pub f64, pub f64);

impl fmt::Display for ShpPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.2 == 0. {
            write!(f, "({},{})", self.0, self.1)
        } else {
            write!(f, "({},{},{})", self.0, self.1, self.2)
        }
    }
}

/// One polygon ring or polyline strand, exactly as stored: a closed ring's
/// first and last points are equal, but nothing here checks that.
#[derive(Debug,Clone,PartialEq)]
pub struct ShpPart(pub Box<[ShpPoint]>);

impl fmt::Display for ShpPart {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut r = write!(f, "[");
        for (i, &point) in self.0.iter().enumerate() {
            if i > 0 {
                r = r.and_then(|_| write!(f, ","));
            }
            r = r.and_then(|_| write!(f, "{}", point));
        }
        r.and_then(|_| write!(f, "]"))
    }
}

#[derive(Debug,Clone)]
pub struct ShpRecord {
    pub record_number: u32,
    pub shape_type: ShpShapeType,
    pub bounding_box: ShpBoundingBox,
    /// Only set for Z shape types.
    pub z_range: Option<ShpRange>,
    pub parts: Box<[ShpPart]>,
}

impl ShpRecord {
    pub fn n_points(&self) -> usize {
        self.parts.iter().map(|p| p.0.len()).sum()
    }
}

impl fmt::Display for ShpRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut r = write!(f, "#{} {:?} [", self.record_number, self.shape_type);
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                r = r.and_then(|_| write!(f, ","));
            }
            r = r.and_then(|_| write!(f, "{}", part));
        }
        r.and_then(|_| write!(f, "]"))
    }
}

fn parse_bounding_box(buf: &[u8]) -> ShpBoundingBox {
    ShpBoundingBox(
        LittleEndian::read_f64(&buf[0..8]),
        LittleEndian::read_f64(&buf[8..16]),
        LittleEndian::read_f64(&buf[16..24]),
        LittleEndian::read_f64(&buf[24..32]),
    )
}

fn parse_range(buf: &[u8]) -> ShpRange {
    ShpRange(
        LittleEndian::read_f64(&buf[0..8]),
        LittleEndian::read_f64(&buf[8..16]),
    )
}

fn parse_point(buf: &[u8]) -> ShpPoint {
    ShpPoint(
        LittleEndian::read_f64(&buf[0..8]),
        LittleEndian::read_f64(&buf[8..16]),
        0.,
    )
}

/// Reads the first 100 bytes of the file.
///
/// Side-effect: advances the file cursor 100 bytes.
fn read_shp_header<R: io::Read>(file: &mut R) -> Result<ShpHeader, ShpError> {
    let mut buf = [ 0u8; SHP_HEADER_LENGTH ];

    if let Err(err) = file.read_exact(&mut buf) {
        return match err.kind() {
            io::ErrorKind::UnexpectedEof => Err(ShpError::FormatError(format!("File is shorter than the {}-byte header", SHP_HEADER_LENGTH))),
            _ => Err(ShpError::IOError(err)),
        };
    }

    let magic_number = BigEndian::read_u32(&buf[0..4]);
    let file_len = BigEndian::read_u32(&buf[24..28]) as usize;
    let version = LittleEndian::read_u32(&buf[28..32]);
    let shape_type_u32 = LittleEndian::read_u32(&buf[32..36]);

    if magic_number != SHP_MAGIC_NUMBER {
        return Err(ShpError::FormatError(format!("File has wrong magic number: found {}, expected {}", magic_number, SHP_MAGIC_NUMBER)));
    }

    if version != SHP_VERSION {
        return Err(ShpError::FormatError(format!("File has wrong version: found {}, expected {}", version, SHP_VERSION)));
    }

    let file_n_bytes = match checked_end(0, 2, file_len) {
        Some(n) if n >= SHP_HEADER_LENGTH => n,
        _ => {
            return Err(ShpError::FormatError(format!("File header says the file is {} words long, but the header alone is {} bytes", file_len, SHP_HEADER_LENGTH)));
        }
    };

    let shape_type = match ShpShapeType::from_u32(shape_type_u32) {
        Some(ShpShapeType::MultiPatch) => {
            return Err(ShpError::FormatError(format!("File has unsupported type {:?}", ShpShapeType::MultiPatch)));
        }
        Some(shape_type) => shape_type,
        None => {
            return Err(ShpError::FormatError(format!("File has nonexistent shape type {}", shape_type_u32)));
        }
    };

    let header = ShpHeader {
        file_n_bytes: file_n_bytes,
        shape_type: shape_type,
        bounding_box: parse_bounding_box(&buf[36..68]),
        z_range: parse_range(&buf[68..84]),
    };
    debug!("Shapefile header: {:?}", header);
    Ok(header)
}

fn truncated(record_number: u32, needed_len: usize, buf: &[u8]) -> ShpError {
    ShpError::TruncatedRecordError(format!("Record number {} needs {} bytes, but its content is only {} bytes", record_number, needed_len, buf.len()))
}

/// Reads the trailing Z range and Z array of a Z-type record and writes each
/// Z into the point at the same position.
fn merge_z(buf: &[u8], offset: usize, points: &mut [ShpPoint]) -> ShpRange {
    let z_range = parse_range(&buf[offset .. offset + SHP_RANGE_LENGTH]);
    let z_start = offset + SHP_RANGE_LENGTH;
    let z_end = z_start + 8 * points.len();
    for (point, chunk) in points.iter_mut().zip(buf[z_start .. z_end].chunks(8)) {
        point.2 = LittleEndian::read_f64(chunk);
    }
    z_range
}

/// Byte length of `n_items` items of `item_len` bytes starting at `start`,
/// or None if a corrupt count would overflow usize.
fn checked_end(start: usize, item_len: usize, n_items: usize) -> Option<usize> {
    item_len.checked_mul(n_items).and_then(|n| start.checked_add(n))
}

fn needed_len_with_z(shape_type: ShpShapeType, points_end: usize, n_points: usize) -> Option<usize> {
    if shape_type.has_z() {
        points_end.checked_add(SHP_RANGE_LENGTH).and_then(|z_start| checked_end(z_start, 8, n_points))
    } else {
        Some(points_end)
    }
}

fn overflowing_counts(record_number: u32, num_parts: usize, num_points: usize, buf: &[u8]) -> ShpError {
    ShpError::TruncatedRecordError(format!("Record number {} claims {} parts and {} points, which can't fit in its {} bytes", record_number, num_parts, num_points, buf.len()))
}

fn parse_point_record(buf: &[u8], record_number: u32, shape_type: ShpShapeType) -> Result<ShpRecord, ShpError> {
    let needed_len = 4 + SHP_POINT_LENGTH + if shape_type.has_z() { 8 } else { 0 };
    if buf.len() < needed_len {
        return Err(truncated(record_number, needed_len, buf));
    }

    let mut point = parse_point(&buf[4..20]);
    let z_range = if shape_type.has_z() {
        point.2 = LittleEndian::read_f64(&buf[20..28]);
        Some(ShpRange(point.2, point.2))
    } else {
        None
    };

    Ok(ShpRecord {
        record_number: record_number,
        shape_type: shape_type,
        bounding_box: ShpBoundingBox(point.0, point.1, point.0, point.1),
        z_range: z_range,
        parts: vec![ ShpPart(vec![ point ].into_boxed_slice()) ].into_boxed_slice(),
    })
}

fn parse_multi_point_record(buf: &[u8], record_number: u32, shape_type: ShpShapeType) -> Result<ShpRecord, ShpError> {
    if buf.len() < 40 {
        return Err(truncated(record_number, 40, buf));
    }

    let bounding_box = parse_bounding_box(&buf[4 .. 4 + SHP_BOUNDING_BOX_LENGTH]);
    let num_points = LittleEndian::read_u32(&buf[36..40]) as usize;
    let (points_end, needed_len) = match checked_end(40, SHP_POINT_LENGTH, num_points)
        .and_then(|points_end| needed_len_with_z(shape_type, points_end, num_points).map(|n| (points_end, n)))
    {
        Some(lens) => lens,
        None => return Err(overflowing_counts(record_number, 1, num_points, buf)),
    };

    if buf.len() < needed_len {
        return Err(truncated(record_number, needed_len, buf));
    }

    let mut points: Vec<ShpPoint> = buf[40 .. points_end].chunks(SHP_POINT_LENGTH).map(parse_point).collect();
    let z_range = if shape_type.has_z() {
        Some(merge_z(buf, points_end, &mut points))
    } else {
        None
    };

    Ok(ShpRecord {
        record_number: record_number,
        shape_type: shape_type,
        bounding_box: bounding_box,
        z_range: z_range,
        parts: vec![ ShpPart(points.into_boxed_slice()) ].into_boxed_slice(),
    })
}

/// Validates part starts against the point count, returning (start, end)
/// pairs. Every part must hold at least one point.
fn part_ranges(parts: &[usize], num_points: usize, record_number: u32) -> Result<Vec<(usize, usize)>, ShpError> {
    if parts.is_empty() {
        return Err(ShpError::CorruptIndexError(format!("Record number {} has no parts", record_number)));
    }

    if parts[0] != 0 {
        return Err(ShpError::CorruptIndexError(format!("Record number {} has its first part starting at point {}, expected 0", record_number, parts[0])));
    }

    for (&part_start, &part_end) in parts.iter().tuple_windows() {
        if part_end <= part_start {
            return Err(ShpError::CorruptIndexError(format!("Record number {} has a part with points {}-{}, but that's an invalid range", record_number, part_start, part_end)));
        }
    }

    // parts is strictly increasing, so checking the last start covers them all
    let last_part = parts[parts.len() - 1];
    if last_part >= num_points {
        return Err(ShpError::CorruptIndexError(format!("Record number {} has a part starting at point {}, but there are only {} points in the record", record_number, last_part, num_points)));
    }

    Ok(parts.iter().cloned()
        .zip(parts.iter().skip(1).cloned().chain(Some(num_points)))
        .collect())
}

fn parse_multi_part_record(buf: &[u8], record_number: u32, shape_type: ShpShapeType) -> Result<ShpRecord, ShpError> {
    if buf.len() < 44 {
        return Err(truncated(record_number, 44, buf));
    }

    let bounding_box = parse_bounding_box(&buf[4 .. 4 + SHP_BOUNDING_BOX_LENGTH]);
    let num_parts = LittleEndian::read_u32(&buf[36..40]) as usize;
    let num_points = LittleEndian::read_u32(&buf[40..44]) as usize;
    let (points_start, points_end, needed_len) = match checked_end(44, 4, num_parts)
        .and_then(|points_start| checked_end(points_start, SHP_POINT_LENGTH, num_points).map(|points_end| (points_start, points_end)))
        .and_then(|(points_start, points_end)| needed_len_with_z(shape_type, points_end, num_points).map(|n| (points_start, points_end, n)))
    {
        Some(lens) => lens,
        None => return Err(overflowing_counts(record_number, num_parts, num_points, buf)),
    };

    if buf.len() < needed_len {
        return Err(ShpError::TruncatedRecordError(format!("Record number {} needs {} bytes (it has {} parts and {} points), but the record header says it has {} bytes", record_number, needed_len, num_parts, num_points, buf.len())));
    }

    let parts: Vec<usize> = buf[44 .. points_start].chunks(4)
        .map(|b| LittleEndian::read_u32(b) as usize)
        .collect();
    let ranges = part_ranges(&parts, num_points, record_number)?;

    let mut points: Vec<ShpPoint> = buf[points_start .. points_end].chunks(SHP_POINT_LENGTH).map(parse_point).collect();
    let z_range = if shape_type.has_z() {
        Some(merge_z(buf, points_end, &mut points))
    } else {
        None
    };

    let parts: Vec<ShpPart> = ranges.into_iter()
        .map(|(start, end)| ShpPart(points[start .. end].to_vec().into_boxed_slice()))
        .collect();

    Ok(ShpRecord {
        record_number: record_number,
        shape_type: shape_type,
        bounding_box: bounding_box,
        z_range: z_range,
        parts: parts.into_boxed_slice(),
    })
}

/// Parses one record's content. The record's own shape type decides the
/// layout; it must be Null or the file's shape type.
fn parse_record(buf: &[u8], record_number: u32, file_shape_type: ShpShapeType) -> Result<ShpRecord, ShpError> {
    if buf.len() < 4 {
        return Err(truncated(record_number, 4, buf));
    }

    let shape_type_u32 = LittleEndian::read_u32(&buf[0..4]);
    let shape_type = match ShpShapeType::from_u32(shape_type_u32) {
        Some(ShpShapeType::Null) => {
            return Ok(ShpRecord {
                record_number: record_number,
                shape_type: ShpShapeType::Null,
                bounding_box: ShpBoundingBox(0., 0., 0., 0.),
                z_range: None,
                parts: vec![].into_boxed_slice(),
            });
        }
        Some(t) if t == file_shape_type => t,
        Some(t) => {
            return Err(ShpError::FormatError(format!("Record number {} has shape type {:?}, but the file holds {:?}", record_number, t, file_shape_type)));
        }
        None => {
            return Err(ShpError::FormatError(format!("Record number {} has nonexistent shape type {}", record_number, shape_type_u32)));
        }
    };

    if shape_type.is_point() {
        parse_point_record(buf, record_number, shape_type)
    } else if shape_type.is_multi_point() {
        parse_multi_point_record(buf, record_number, shape_type)
    } else {
        parse_multi_part_record(buf, record_number, shape_type)
    }
}

fn eof_as_truncated(err: io::Error, description: String) -> ShpError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => ShpError::TruncatedRecordError(description),
        _ => ShpError::IOError(err),
    }
}

/// Reads the next record from the file, and returns the number of bytes
/// that record consumed (including its record header).
///
/// Side effect: advances the file cursor to the next record.
fn read_record<R: io::Read>(file: &mut R, file_shape_type: ShpShapeType, offset: usize, file_n_bytes: usize) -> Result<(ShpRecord, usize), ShpError> {
    let mut header_buf = [ 0u8; SHP_RECORD_HEADER_LENGTH ];
    file.read_exact(&mut header_buf)
        .map_err(|err| eof_as_truncated(err, format!("File ends inside the record header at byte {}", offset)))?;

    let record_number = BigEndian::read_u32(&header_buf[0..4]);
    let content_length = match checked_end(0, 2, BigEndian::read_u32(&header_buf[4..8]) as usize) {
        Some(n) => n,
        None => return Err(ShpError::TruncatedRecordError(format!("Record number {} at byte {} declares more content than fits in memory", record_number, offset))),
    };
    trace!("Record {} at byte {}: {} content bytes", record_number, offset, content_length);

    if checked_end(offset + SHP_RECORD_HEADER_LENGTH, 1, content_length).map_or(true, |record_end| record_end > file_n_bytes) {
        return Err(ShpError::TruncatedRecordError(format!("Record number {} at byte {} declares {} content bytes, which runs past the {}-byte file length in the header", record_number, offset, content_length, file_n_bytes)));
    }

    // The declared length may be garbage; don't trust it for capacity
    let mut buf = Vec::with_capacity(content_length.min(1 << 20));
    let n_read = file.by_ref().take(content_length as u64).read_to_end(&mut buf)?;
    if n_read < content_length {
        return Err(ShpError::TruncatedRecordError(format!("Record number {} at byte {} declares {} content bytes, but the file ends after {}", record_number, offset, content_length, n_read)));
    }

    let record = parse_record(&buf[..], record_number, file_shape_type)?;
    Ok((record, SHP_RECORD_HEADER_LENGTH + content_length))
}

/// Reads an ESRI ".shp" Shapefile record by record, following instructions
/// at https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
///
/// # Example
///
/// ```
/// use std::fs;
/// use std::io;
/// use shpdbf::read::shapefile::shp::{ShpPoint, ShpReader};
///
/// let file = fs::File::open("test/read/shapefile/triangle.shp").unwrap();
/// let mut shp_reader = ShpReader::new(io::BufReader::new(file)).unwrap();
///
/// // shp_reader.next(), an Iterator method, returns
/// // Option<Result<ShpRecord, ShpError>>
/// let polygon = shp_reader.next().unwrap().unwrap();
///
/// assert_eq!(1, polygon.parts.len());
/// assert_eq!(4, polygon.parts[0].0.len());
/// assert_eq!(ShpPoint(0., 0., 0.), polygon.parts[0].0[0]);
/// assert!(shp_reader.next().is_none());
/// ```
#[derive(Debug)]
pub struct ShpReader<R: io::Read> {
    file: R,
    pub n_bytes_already_read: usize,
    pub header: ShpHeader,
    last_record_number: u32,
    failed: bool,
}

impl<R: io::Read> ShpReader<R> {
    pub fn new(mut file: R) -> Result<ShpReader<R>, ShpError> {
        read_shp_header(&mut file).map(move |shp_header| {
            ShpReader::<R> {
                file: file,
                n_bytes_already_read: SHP_HEADER_LENGTH,
                header: shp_header,
                last_record_number: 0,
                failed: false,
            }
        })
    }
}

impl<R: io::Read> Iterator for ShpReader<R> {
    type Item = Result<ShpRecord, ShpError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.n_bytes_already_read >= self.header.file_n_bytes {
            return None;
        }

        let result = read_record(&mut self.file, self.header.shape_type, self.n_bytes_already_read, self.header.file_n_bytes)
            .map(|(record, n_bytes)| {
                self.n_bytes_already_read += n_bytes;
                record
            });

        match result {
            Ok(record) => {
                if record.record_number != self.last_record_number + 1 {
                    warn!("Record number {} follows record number {}", record.record_number, self.last_record_number);
                }
                self.last_record_number = record.record_number;
                Some(Ok(record))
            }
            Err(err) => {
                // The stream position is unknown after a failure
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// A whole ".shp" file, decoded.
///
/// Records are indexed from 0 in file order (record number 1 is index 0).
#[derive(Debug,Clone)]
pub struct ShpFile {
    pub header: ShpHeader,
    records: Box<[ShpRecord]>,
}

impl ShpFile {
    /// Reads every record. Fails on the first bad record: there is no
    /// partially-loaded ShpFile.
    pub fn load<R: io::Read>(file: R) -> Result<ShpFile, ShpError> {
        let reader = ShpReader::new(file)?;
        let header = reader.header;
        let records = reader.collect::<Result<Vec<ShpRecord>, ShpError>>()?;
        debug!("Read {} {:?} records", records.len(), header.shape_type);

        Ok(ShpFile {
            header: header,
            records: records.into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ShpRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[ShpRecord] {
        &self.records
    }
}

/// Reads an ESRI ".shp" Shapefile from the filesystem. The file is closed
/// before this returns.
pub fn open(path: &Path) -> Result<ShpFile, ShpError> {
    let f = fs::File::open(path)?;
    ShpFile::load(io::BufReader::new(f))
}

/// Builders for ".shp" bytes.
#[cfg(test)]
pub mod test_bytes {
    use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

    /// Polygon record content: type, bbox, parts, points.
    pub fn polygon_content(shape_type: u32, parts: &[u32], points: &[(f64, f64)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(shape_type).unwrap();
        let xmin = points.iter().map(|p| p.0).fold(::std::f64::INFINITY, f64::min);
        let ymin = points.iter().map(|p| p.1).fold(::std::f64::INFINITY, f64::min);
        let xmax = points.iter().map(|p| p.0).fold(::std::f64::NEG_INFINITY, f64::max);
        let ymax = points.iter().map(|p| p.1).fold(::std::f64::NEG_INFINITY, f64::max);
        for v in &[ xmin, ymin, xmax, ymax ] {
            buf.write_f64::<LittleEndian>(*v).unwrap();
        }
        buf.write_u32::<LittleEndian>(parts.len() as u32).unwrap();
        buf.write_u32::<LittleEndian>(points.len() as u32).unwrap();
        for &part in parts {
            buf.write_u32::<LittleEndian>(part).unwrap();
        }
        for &(x, y) in points {
            buf.write_f64::<LittleEndian>(x).unwrap();
            buf.write_f64::<LittleEndian>(y).unwrap();
        }
        buf
    }

    /// Appends a Z range and Z array to polygon/polyline content.
    pub fn append_z(mut content: Vec<u8>, zs: &[f64]) -> Vec<u8> {
        let zmin = zs.iter().cloned().fold(::std::f64::INFINITY, f64::min);
        let zmax = zs.iter().cloned().fold(::std::f64::NEG_INFINITY, f64::max);
        content.write_f64::<LittleEndian>(zmin).unwrap();
        content.write_f64::<LittleEndian>(zmax).unwrap();
        for &z in zs {
            content.write_f64::<LittleEndian>(z).unwrap();
        }
        content
    }

    /// A whole file: 100-byte header, then each content with its record
    /// header. Contents must be an even number of bytes long.
    pub fn file(shape_type: u32, contents: &[Vec<u8>]) -> Vec<u8> {
        let n_bytes = 100 + contents.iter().map(|c| 8 + c.len()).sum::<usize>();
        let mut buf = Vec::with_capacity(n_bytes);
        buf.write_u32::<BigEndian>(9994).unwrap();
        for _ in 0..5 {
            buf.write_u32::<BigEndian>(0).unwrap();
        }
        buf.write_u32::<BigEndian>((n_bytes / 2) as u32).unwrap();
        buf.write_u32::<LittleEndian>(1000).unwrap();
        buf.write_u32::<LittleEndian>(shape_type).unwrap();
        for _ in 0..8 {
            buf.write_f64::<LittleEndian>(0.).unwrap();
        }
        for (i, content) in contents.iter().enumerate() {
            buf.write_u32::<BigEndian>(i as u32 + 1).unwrap();
            buf.write_u32::<BigEndian>((content.len() / 2) as u32).unwrap();
            buf.extend_from_slice(content);
        }
        buf
    }

    /// One Polygon record holding a closed triangle.
    pub fn triangle_polygon_file() -> Vec<u8> {
        file(5, &[ polygon_content(5, &[ 0 ], &[ (0., 0.), (0., 1.), (1., 0.), (0., 0.) ]) ])
    }
}
