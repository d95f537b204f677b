//! Reads ".shp" and accompanying ".dbf" files.
//!
//! Both files are read completely when opened, then closed. What you get
//! back is plain data: parts of `(x, y, z)` points, and attribute values as
//! the strings the ".dbf" stores.
//!
//! There are two pieces of information ".shp" and ".dbf" files _don't_
//! contain:
//!
//! * The _projection_ isn't specified. Sometimes there's a ".prj" file that
//!   contains that information, but no file format can represent all the
//!   projections out there in the world. This library ignores the file and
//!   returns `f64` points.
//! * The _text encoding_ of ".dbf" values is only hinted at, by a language
//!   driver id in the header. Pick an encoding with the `open_*` functions,
//!   or let `open_detected()` trust the hint.
//!
//! # Examples
//!
//! Open by ".shp" filename:
//!
//! ```no_run
//! use std::path::Path;
//! use shpdbf::read::shapefile;
//!
//! let shapefile = shapefile::open_utf8(Path::new("counties.shp")).unwrap();
//!
//! for i in 0..shapefile.record_count() {
//!     let shape = shapefile.shape_at(i).unwrap();
//!     println!("{} {:?}", shape, shapefile.fields_at(i).unwrap());
//! }
//! ```
//!
//! Open by `io::Read` implementors (works best with `io::BufReader`):
//!
//! ```no_run
//! # extern crate encoding;
//! # extern crate shpdbf;
//!
//! # fn main() {
//! use std::fs;
//! use std::io;
//! use std::path::PathBuf;
//! use shpdbf::read::shapefile;
//! use encoding;
//!
//! let mut path = PathBuf::from("counties.shp");
//! let shp_r = io::BufReader::new(fs::File::open(&path).unwrap());
//! path.set_extension("dbf");
//! let dbf_r = io::BufReader::new(fs::File::open(&path).unwrap());
//!
//! let shapefile = shapefile::Shapefile::new(shp_r, dbf_r, encoding::all::UTF_8).unwrap();
//!
//! for (shape, data) in shapefile.iter() {
//!     println!("{} {:?}", shape, data.values);
//! }
//! # }
//! ```
//!
//! Dump DBF data:
//!
//! ```no_run
//! use std::path::Path;
//! use shpdbf::read::shapefile;
//!
//! let shapefile = shapefile::open_utf8(Path::new("counties.shp")).unwrap();
//!
//! let names = shapefile.field_names();
//!
//! for i in 0..shapefile.record_count() {
//!     for (name, value) in names.iter().zip(shapefile.fields_at(i).unwrap()) {
//!         print!("{}: {}; ", name, value);
//!     }
//!     println!("");
//! }
//! ```

use std::path::Path;
use encoding;

pub mod dbf;
pub mod shp;
pub mod shapefile;
pub mod rings;

pub use self::dbf::{DbfError, DbfField, DbfFile, DbfRecord, DbfType, DbfValue};
pub use self::shp::{ShpBoundingBox, ShpError, ShpFile, ShpPart, ShpPoint, ShpRecord, ShpShapeType};
pub use self::shapefile::{ShapefileError, Shapefile};
pub use self::rings::{ShpRegion, WindingOrder};

pub fn open(shp_path: &Path, encoding: encoding::EncodingRef) -> Result<Shapefile, ShapefileError> {
    Shapefile::open(shp_path, encoding)
}

pub fn open_ascii(shp_path: &Path) -> Result<Shapefile, ShapefileError> {
    open(shp_path, encoding::all::ASCII)
}

pub fn open_utf8(shp_path: &Path) -> Result<Shapefile, ShapefileError> {
    open(shp_path, encoding::all::UTF_8)
}

pub fn open_windows1252(shp_path: &Path) -> Result<Shapefile, ShapefileError> {
    open(shp_path, encoding::all::WINDOWS_1252)
}

/// Opens with the ".dbf" encoding its language driver id suggests, or UTF-8.
pub fn open_detected(shp_path: &Path) -> Result<Shapefile, ShapefileError> {
    Shapefile::open_detected(shp_path)
}
