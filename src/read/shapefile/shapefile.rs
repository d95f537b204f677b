use std::error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::slice;
use std::iter;
use encoding;
use super::dbf;
use super::shp;

/// A ".shp" file and its ".dbf" file, both fully read and joined by record
/// index.
///
/// Once built, a Shapefile never changes; share it between threads freely.
///
/// # Examples
///
/// ```
/// # extern crate encoding;
/// # extern crate shpdbf;
///
/// # fn main() {
///   use std::fs;
///   use std::io;
///   use encoding;
///   use shpdbf::read::shapefile::Shapefile;
///   use shpdbf::read::shapefile::shp::ShpPoint;
///
///   let shp_r = io::BufReader::new(fs::File::open("test/read/shapefile/triangle.shp").unwrap());
///   let dbf_r = io::BufReader::new(fs::File::open("test/read/shapefile/triangle.dbf").unwrap());
///
///   // builder returns Result<Shapefile, ShapefileError>
///   let shapefile = Shapefile::new(shp_r, dbf_r, encoding::all::UTF_8).unwrap();
///
///   assert_eq!(1, shapefile.record_count());
///
///   // records_by_field_name() returns None for a missing field
///   assert_eq!(Some(vec![ "bar" ]), shapefile.records_by_field_name("foo"));
///   assert_eq!(None, shapefile.records_by_field_name("FOO"));
///
///   // parts are Box<[shp::ShpPart]>
///   let shape = shapefile.shape_at(0).unwrap();
///   assert_eq!(1, shape.parts.len());
///   assert_eq!(4, shape.parts[0].0.len());
///   assert_eq!(ShpPoint(0., 1., 0.), shape.parts[0].0[1]);
///
///   // there is no record number two
///   assert!(shapefile.shape_at(1).is_err());
/// # }
/// ```
#[derive(Debug,Clone)]
pub struct Shapefile {
    shp: shp::ShpFile,
    dbf: dbf::DbfFile,
}

#[derive(Debug)]
pub enum ShapefileError {
    /// The ".shp" input (named by the String) could not be read.
    ShpError(String, shp::ShpError),
    /// The ".dbf" input (named by the String) could not be read.
    DbfError(String, dbf::DbfError),
    RecordCountMismatchError { shp_records: usize, dbf_records: usize },
    IndexOutOfRange { what: &'static str, index: usize, len: usize },
}

impl error::Error for ShapefileError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ShapefileError::ShpError(_, ref err) => Some(err),
            ShapefileError::DbfError(_, ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ShapefileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ShapefileError::ShpError(ref source, ref err) => write!(f, "{}: {}", source, err),
            ShapefileError::DbfError(ref source, ref err) => write!(f, "{}: {}", source, err),
            ShapefileError::RecordCountMismatchError { shp_records, dbf_records } => {
                write!(f, "Join error: '.shp' file has {} records but '.dbf' file has {}", shp_records, dbf_records)
            }
            ShapefileError::IndexOutOfRange { what, index, len } => {
                write!(f, "{} index {} is out of range: there are {}", what, index, len)
            }
        }
    }
}

const SHP_STREAM: &'static str = "'.shp' stream";
const DBF_STREAM: &'static str = "'.dbf' stream";

impl Shapefile {
    /// Reads both inputs completely. Both must hold the same number of
    /// records.
    pub fn new<R: io::Read, S: io::Read>(r: R, s: S, encoding: encoding::EncodingRef) -> Result<Shapefile, ShapefileError> {
        let shp = shp::ShpFile::load(r)
            .map_err(|err| ShapefileError::ShpError(SHP_STREAM.to_string(), err))?;
        let dbf = dbf::DbfFile::load(s, encoding)
            .map_err(|err| ShapefileError::DbfError(DBF_STREAM.to_string(), err))?;
        Shapefile::join(shp, dbf)
    }

    /// Like `new()`, but picks the ".dbf" text encoding from its language
    /// driver id.
    pub fn new_detected<R: io::Read, S: io::Read>(r: R, s: S) -> Result<Shapefile, ShapefileError> {
        let shp = shp::ShpFile::load(r)
            .map_err(|err| ShapefileError::ShpError(SHP_STREAM.to_string(), err))?;
        let dbf = dbf::DbfFile::load_detected(s)
            .map_err(|err| ShapefileError::DbfError(DBF_STREAM.to_string(), err))?;
        Shapefile::join(shp, dbf)
    }

    /// Opens by ".shp" filename.
    ///
    /// This will automatically search for the accompanying ".dbf"; it will
    /// fail if that file does not exist.
    pub fn open(shp_path: &Path, encoding: encoding::EncodingRef) -> Result<Shapefile, ShapefileError> {
        let shp = shp::open(shp_path)
            .map_err(|err| ShapefileError::ShpError(shp_path.display().to_string(), err))?;
        let dbf_path = dbf_path_for(shp_path);
        let dbf = dbf::open(&dbf_path, encoding)
            .map_err(|err| ShapefileError::DbfError(dbf_path.display().to_string(), err))?;
        Shapefile::join(shp, dbf)
    }

    /// Like `open()`, but picks the ".dbf" text encoding from its language
    /// driver id.
    pub fn open_detected(shp_path: &Path) -> Result<Shapefile, ShapefileError> {
        let shp = shp::open(shp_path)
            .map_err(|err| ShapefileError::ShpError(shp_path.display().to_string(), err))?;
        let dbf_path = dbf_path_for(shp_path);
        let dbf = dbf::open_detected(&dbf_path)
            .map_err(|err| ShapefileError::DbfError(dbf_path.display().to_string(), err))?;
        Shapefile::join(shp, dbf)
    }

    fn join(shp: shp::ShpFile, dbf: dbf::DbfFile) -> Result<Shapefile, ShapefileError> {
        if shp.len() != dbf.len() {
            return Err(ShapefileError::RecordCountMismatchError {
                shp_records: shp.len(),
                dbf_records: dbf.len(),
            });
        }

        info!("Loaded shapefile: {} {:?} records, {} fields", shp.len(), shp.header.shape_type, dbf.fields().len());
        Ok(Shapefile { shp: shp, dbf: dbf })
    }

    pub fn record_count(&self) -> usize {
        self.shp.len()
    }

    pub fn header(&self) -> &shp::ShpHeader {
        &self.shp.header
    }

    pub fn shape_type(&self) -> shp::ShpShapeType {
        self.shp.header.shape_type
    }

    pub fn bounding_box(&self) -> shp::ShpBoundingBox {
        self.shp.header.bounding_box
    }

    fn check_record_index(&self, index: usize) -> Result<(), ShapefileError> {
        if index < self.record_count() {
            Ok(())
        } else {
            Err(ShapefileError::IndexOutOfRange { what: "Record", index: index, len: self.record_count() })
        }
    }

    fn check_field_index(&self, index: usize) -> Result<(), ShapefileError> {
        let len = self.dbf.fields().len();
        if index < len {
            Ok(())
        } else {
            Err(ShapefileError::IndexOutOfRange { what: "Field", index: index, len: len })
        }
    }

    pub fn shape_at(&self, index: usize) -> Result<&shp::ShpRecord, ShapefileError> {
        self.check_record_index(index)?;
        Ok(&self.shp.records()[index])
    }

    pub fn fields(&self) -> &[dbf::DbfField] {
        self.dbf.fields()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.dbf.fields().iter().map(|f| f.name.as_str()).collect()
    }

    /// Position of the first field named exactly `name`. Matching is
    /// case-sensitive.
    pub fn index_of_field_name(&self, name: &str) -> Option<usize> {
        self.dbf.index_of_field_name(name)
    }

    /// Every field value of one record, in field order.
    pub fn fields_at(&self, index: usize) -> Result<&[String], ShapefileError> {
        self.check_record_index(index)?;
        Ok(&self.dbf.records()[index].values)
    }

    pub fn field_value(&self, record_index: usize, field_index: usize) -> Result<&str, ShapefileError> {
        self.check_field_index(field_index)?;
        let values = self.fields_at(record_index)?;
        Ok(&values[field_index])
    }

    pub fn typed_field_value(&self, record_index: usize, field_index: usize) -> Result<dbf::DbfValue, ShapefileError> {
        let text = self.field_value(record_index, field_index)?;
        Ok(self.dbf.fields()[field_index].typed_value(text))
    }

    /// True if the ".dbf" marks this record deleted. Deleted records are
    /// still returned by every other method.
    pub fn is_deleted(&self, index: usize) -> Result<bool, ShapefileError> {
        self.check_record_index(index)?;
        Ok(self.dbf.records()[index].deleted)
    }

    /// The named field's value in every record, or None if there is no such
    /// field.
    pub fn records_by_field_name(&self, name: &str) -> Option<Vec<&str>> {
        self.dbf.index_of_field_name(name)
            .and_then(|index| self.dbf.records_at_field_index(index))
    }

    /// Iterates over (shape, attributes) pairs in record order.
    pub fn iter(&self) -> iter::Zip<slice::Iter<shp::ShpRecord>, slice::Iter<dbf::DbfRecord>> {
        self.shp.records().iter().zip(self.dbf.records().iter())
    }
}

impl<'a> IntoIterator for &'a Shapefile {
    type Item = (&'a shp::ShpRecord, &'a dbf::DbfRecord);
    type IntoIter = iter::Zip<slice::Iter<'a, shp::ShpRecord>, slice::Iter<'a, dbf::DbfRecord>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The ".dbf" path beside a ".shp" path.
///
/// The new extension follows the case of the old one ("SHP" becomes "DBF").
/// If only the other case exists on disk, that one wins.
pub fn dbf_path_for(shp_path: &Path) -> PathBuf {
    let upper = shp_path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| !ext.is_empty() && ext.chars().all(|c| !c.is_lowercase()))
        .unwrap_or(false);

    let (preferred, other) = if upper { ("DBF", "dbf") } else { ("dbf", "DBF") };

    let mut dbf_path = PathBuf::from(shp_path);
    dbf_path.set_extension(preferred);
    if !dbf_path.exists() {
        let mut other_path = PathBuf::from(shp_path);
        other_path.set_extension(other);
        if other_path.exists() {
            debug!("{} does not exist; using {}", dbf_path.display(), other_path.display());
            return other_path;
        }
    }
    dbf_path
}

#[cfg(test)]
mod test {
    use std::io;
    use std::path::{Path, PathBuf};
    use encoding;
    use super::*;
    use read::shapefile::dbf::DbfValue;
    use read::shapefile::shp::{ShpPoint, ShpShapeType};
    use read::shapefile::{dbf, shp};

    fn triangles_shp(n: usize) -> Vec<u8> {
        let contents: Vec<Vec<u8>> = (0..n)
            .map(|i| {
                let o = i as f64 * 10.;
                shp::test_bytes::polygon_content(5, &[ 0 ], &[ (o, o), (o, o + 1.), (o + 1., o), (o, o) ])
            })
            .collect();
        shp::test_bytes::file(5, &contents)
    }

    fn load(shp_bytes: Vec<u8>, dbf_bytes: Vec<u8>) -> Result<Shapefile, ShapefileError> {
        Shapefile::new(io::Cursor::new(shp_bytes), io::Cursor::new(dbf_bytes), encoding::all::UTF_8)
    }

    fn three_polygons() -> Shapefile {
        load(triangles_shp(3), dbf::test_bytes::name_area_file()).unwrap()
    }

    #[test]
    fn three_triangles_with_name_and_area() {
        let shapefile = three_polygons();
        assert_eq!(3, shapefile.record_count());
        assert_eq!(ShpShapeType::Polygon, shapefile.shape_type());

        let shape = shapefile.shape_at(0).unwrap();
        assert_eq!(1, shape.parts.len());
        assert_eq!(4, shape.parts[0].0.len());
        assert_eq!(shape.parts[0].0[0], shape.parts[0].0[3]);
        assert_eq!(ShpPoint(20., 21., 0.), shapefile.shape_at(2).unwrap().parts[0].0[1]);

        assert_eq!(vec![ "NAME", "AREA" ], shapefile.field_names());
        assert_eq!("Alpha", shapefile.field_value(0, 0).unwrap());
        assert_eq!("123.45", shapefile.field_value(0, 1).unwrap());
        assert_eq!(DbfValue::Number(123.45), shapefile.typed_field_value(0, 1).unwrap());
    }

    #[test]
    fn lookups_by_name() {
        let shapefile = three_polygons();
        assert_eq!(Some(0), shapefile.index_of_field_name("NAME"));
        assert_eq!(Some(1), shapefile.index_of_field_name("AREA"));
        assert_eq!(None, shapefile.index_of_field_name("Area"));
        assert_eq!(Some(vec![ "Alpha", "Beta", "Gamma" ]), shapefile.records_by_field_name("NAME"));
        assert_eq!(None, shapefile.records_by_field_name("POPULATION"));
    }

    #[test]
    fn deleted_records_are_exposed() {
        let shapefile = three_polygons();
        assert!(!shapefile.is_deleted(0).unwrap());
        assert!(shapefile.is_deleted(2).unwrap());
        assert_eq!("Gamma", shapefile.field_value(2, 0).unwrap());
    }

    #[test]
    fn out_of_range_indexes() {
        let shapefile = three_polygons();
        match shapefile.shape_at(3) {
            Err(ShapefileError::IndexOutOfRange { what: "Record", index: 3, len: 3 }) => {},
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
        assert!(shapefile.fields_at(3).is_err());
        assert!(shapefile.is_deleted(3).is_err());
        match shapefile.field_value(0, 2) {
            Err(ShapefileError::IndexOutOfRange { what: "Field", index: 2, len: 2 }) => {},
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn record_count_mismatch() {
        match load(triangles_shp(2), dbf::test_bytes::name_area_file()) {
            Err(ShapefileError::RecordCountMismatchError { shp_records: 2, dbf_records: 3 }) => {},
            other => panic!("expected RecordCountMismatchError, got {:?}", other),
        }
    }

    #[test]
    fn errors_name_their_input() {
        let mut shp_bytes = triangles_shp(3);
        shp_bytes[3] = 0;
        let err = load(shp_bytes, dbf::test_bytes::name_area_file()).unwrap_err();
        assert!(format!("{}", err).starts_with("'.shp' stream: Format error"));

        let err = load(triangles_shp(3), vec![ 0u8; 10 ]).unwrap_err();
        assert!(format!("{}", err).starts_with("'.dbf' stream: Format error"));
    }

    #[test]
    fn iterates_pairs() {
        let shapefile = three_polygons();
        let names: Vec<(u32, &str)> = shapefile.iter()
            .map(|(shape, data)| (shape.record_number, data.values[0].as_str()))
            .collect();
        assert_eq!(vec![ (1, "Alpha"), (2, "Beta"), (3, "Gamma") ], names);
        assert_eq!(3, (&shapefile).into_iter().count());
    }

    #[test]
    fn shareable_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Shapefile>();
    }

    #[test]
    fn dbf_path_follows_extension_case() {
        // neither file exists, so the preferred case wins
        assert_eq!(PathBuf::from("/nonexistent/a.dbf"), dbf_path_for(Path::new("/nonexistent/a.shp")));
        assert_eq!(PathBuf::from("/nonexistent/A.DBF"), dbf_path_for(Path::new("/nonexistent/A.SHP")));
        assert_eq!(PathBuf::from("/nonexistent/a.dbf"), dbf_path_for(Path::new("/nonexistent/a.Shp")));
    }
}
