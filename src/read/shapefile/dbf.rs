/// Reads xbase ".dbf" file, as per
/// https://www.clicketyclick.dk/databases/xbase/format/dbf.html

use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use byteorder::{ByteOrder, LittleEndian};
use encoding;
use encoding::DecoderTrap;
use regex::Regex;

const DBF_HEADER_LENGTH: usize = 32;
const DBF_FIELD_DESCRIPTOR_LENGTH: usize = 32;
const DBF_FIELD_TERMINATOR: u8 = 0x0D;
const DBF_DELETED_FLAG: u8 = b'*';
const DBF_ACTIVE_FLAG: u8 = b' ';

lazy_static! {
    static ref NUMBER_REGEX: Regex = Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").unwrap();
    static ref DATE_REGEX: Regex = Regex::new(r"^(\d{4})(\d{2})(\d{2})$").unwrap();
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum DbfType {
    /// Anything else. We pass its text through, trimmed.
    Unsupported(u8),
    Char,
    Numeric,
    Float,
    Date,
    Logical,
    /// Block number in a ".dbt" file, which we do not read.
    Memo,
    /// 4-byte little-endian integer.
    Long,
    /// 8-byte little-endian float.
    Double,
}

impl DbfType {
    fn with_u8(b: u8) -> DbfType {
        match b {
            b'C' => DbfType::Char,
            b'N' => DbfType::Numeric,
            b'F' => DbfType::Float,
            b'D' => DbfType::Date,
            b'L' => DbfType::Logical,
            b'M' => DbfType::Memo,
            b'I' => DbfType::Long,
            b'O' => DbfType::Double,
            _ => DbfType::Unsupported(b),
        }
    }
}

#[derive(Debug,Clone)]
pub struct DbfField {
    pub name: String,
    pub data_type: DbfType,
    /// Byte offset within a record, counting the deletion flag.
    pub offset: u16,
    pub len: u8,
    pub decimal_count: u8,
}

/// A field value parsed out of its text.
#[derive(Debug,Clone,PartialEq)]
pub enum DbfValue {
    Null,
    Text(String),
    Number(f64),
    Date { year: u16, month: u8, day: u8 },
    Logical(bool),
}

impl DbfField {
    /// Parses a value this field produced (see `DbfRecord::values`).
    ///
    /// Blank text is Null. So is text that doesn't fit the field's type, such
    /// as the asterisks dBASE writes when a number overflows its width.
    pub fn typed_value(&self, text: &str) -> DbfValue {
        if text.is_empty() {
            return DbfValue::Null;
        }

        match self.data_type {
            DbfType::Numeric | DbfType::Float | DbfType::Long | DbfType::Double => {
                if NUMBER_REGEX.is_match(text) {
                    text.parse::<f64>().map(DbfValue::Number).unwrap_or(DbfValue::Null)
                } else {
                    DbfValue::Null
                }
            }
            DbfType::Date => {
                match DATE_REGEX.captures(text) {
                    None => DbfValue::Null,
                    Some(caps) => {
                        let year = caps[1].parse::<u16>().unwrap_or(0);
                        let month = caps[2].parse::<u8>().unwrap_or(0);
                        let day = caps[3].parse::<u8>().unwrap_or(0);
                        if month < 1 || month > 12 || day < 1 || day > 31 {
                            DbfValue::Null
                        } else {
                            DbfValue::Date { year: year, month: month, day: day }
                        }
                    }
                }
            }
            DbfType::Logical => {
                match text {
                    "T" => DbfValue::Logical(true),
                    "F" => DbfValue::Logical(false),
                    _ => DbfValue::Null,
                }
            }
            _ => DbfValue::Text(text.to_string()),
        }
    }
}

#[derive(Debug)]
struct DbfHeader {
    n_records: usize,
    n_header_bytes: usize,
    n_bytes_per_record: usize,
    language_driver_id: u8,
}

struct DbfMeta {
    n_records: usize,
    n_bytes_per_record: usize,
    language_driver_id: u8,
    fields: Box<[DbfField]>,
    encoding: encoding::EncodingRef,
}

// encoding::EncodingRef does not implement std::fmt::Debug
impl fmt::Debug for DbfMeta {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("DbfMeta")
            .field("n_records", &self.n_records)
            .field("n_bytes_per_record", &self.n_bytes_per_record)
            .field("language_driver_id", &self.language_driver_id)
            .field("fields", &self.fields)
            .field("encoding", &self.encoding.name())
            .finish()
    }
}

/// One row. Deleted rows are kept; `deleted` says which they are.
#[derive(Debug,Clone,PartialEq)]
pub struct DbfRecord {
    pub deleted: bool,
    /// One string per field, in field order.
    pub values: Box<[String]>,
}

#[derive(Debug)]
pub enum DbfError {
    IOError(io::Error),
    /// The header or field descriptor array is malformed.
    FormatError(String),
    /// Field widths or text can't be decoded as declared.
    EncodingError(String),
}

impl error::Error for DbfError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            DbfError::IOError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for DbfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DbfError::IOError(ref err) => err.fmt(f),
            DbfError::FormatError(ref description) => write!(f, "Format error: {}", description),
            DbfError::EncodingError(ref description) => write!(f, "Encoding error: {}", description),
        }
    }
}

impl From<io::Error> for DbfError {
    fn from(err: io::Error) -> DbfError {
        DbfError::IOError(err)
    }
}

/// Maps a dBASE language driver id to a text encoding, for the code pages
/// the encoding crate knows.
pub fn encoding_for_language_driver(id: u8) -> Option<encoding::EncodingRef> {
    let encoding: encoding::EncodingRef = match id {
        0x03 | 0x57 | 0x58 | 0x59 => encoding::all::WINDOWS_1252,
        0x13 | 0x7B => encoding::all::WINDOWS_31J,
        0x26 | 0x65 => encoding::all::IBM866,
        0x4D | 0x7A => encoding::all::GBK,
        0x4E | 0x79 => encoding::all::WINDOWS_949,
        0x4F | 0x78 => encoding::all::BIG5_2003,
        0x50 | 0x7C => encoding::all::WINDOWS_874,
        0x7D => encoding::all::WINDOWS_1255,
        0x7E => encoding::all::WINDOWS_1256,
        0xC8 => encoding::all::WINDOWS_1250,
        0xC9 => encoding::all::WINDOWS_1251,
        0xCA => encoding::all::WINDOWS_1254,
        0xCB => encoding::all::WINDOWS_1253,
        0xCC => encoding::all::WINDOWS_1257,
        _ => return None,
    };
    Some(encoding)
}

fn eof_as_format_error(err: io::Error, description: String) -> DbfError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => DbfError::FormatError(description),
        _ => DbfError::IOError(err),
    }
}

fn decode_text(bytes: &[u8], encoding: encoding::EncodingRef) -> Result<String, DbfError> {
    encoding.decode(bytes, DecoderTrap::Replace)
        .map_err(|err| DbfError::EncodingError(format!("Could not decode {:?} as {}: {}", bytes, encoding.name(), err)))
}

fn is_padding(c: char) -> bool {
    c == ' ' || c == '\0'
}

/// Reads the first 32 bytes of the file.
///
/// Side-effect: advances the file cursor 32 bytes.
fn read_dbf_header<R: io::Read>(file: &mut R) -> Result<DbfHeader, DbfError> {
    let mut buf: [ u8; DBF_HEADER_LENGTH ] = [ 0; DBF_HEADER_LENGTH ];

    file.read_exact(&mut buf)
        .map_err(|err| eof_as_format_error(err, format!("File is shorter than the {}-byte header", DBF_HEADER_LENGTH)))?;

    // It's hard to come up with a FormatError, because virtually any
    // combination of 32 bytes is a valid .dbf header.
    //
    // The one exception: invalid dates. bytes 1-3 (base 0) are "YMD"
    // in hex. All years are valid; there are 12 valid months and 31
    // valid days.
    if buf[2] > 12 || buf[3] > 31 {
        return Err(DbfError::FormatError(String::from("The first four bytes of the file mention an invalid creation date. This is not a valid .dbf file.")));
    }

    let header = DbfHeader {
        n_records: LittleEndian::read_u32(&buf[4..8]) as usize,
        n_header_bytes: LittleEndian::read_u16(&buf[8..10]) as usize,
        n_bytes_per_record: LittleEndian::read_u16(&buf[10..12]) as usize,
        language_driver_id: buf[29],
    };

    if header.n_header_bytes <= DBF_HEADER_LENGTH {
        return Err(DbfError::FormatError(format!("Header length is {} bytes, which leaves no room for the field descriptor terminator", header.n_header_bytes)));
    }

    debug!("DBF header: {:?}", header);
    Ok(header)
}

fn parse_dbf_field(buf: &[u8], offset: usize, encoding: encoding::EncodingRef) -> Result<DbfField, DbfError> {
    let name_len = buf[0..11].iter().position(|&b| b == 0).unwrap_or(11);
    let name = decode_text(&buf[0..name_len], encoding)?.trim_end_matches(is_padding).to_string();
    let data_type = DbfType::with_u8(buf[11]);
    let len = buf[16];
    let decimal_count = buf[17];

    if len == 0 {
        return Err(DbfError::EncodingError(format!("Field {} has width 0", name)));
    }

    match (data_type, len) {
        (DbfType::Long, 4) | (DbfType::Double, 8) => {},
        (DbfType::Long, _) | (DbfType::Double, _) => {
            return Err(DbfError::EncodingError(format!("Field {} is {:?}, which is a fixed width, but it claims {} bytes", name, data_type, len)));
        }
        _ => {},
    }

    Ok(DbfField {
        name: name,
        data_type: data_type,
        offset: offset as u16,
        len: len,
        decimal_count: decimal_count,
    })
}

/// Reads all field definitions from the file.
///
/// Assumes exactly DBF_HEADER_LENGTH bytes of the file have been read already.
/// In other words, call this after read_dbf_header().
///
/// Side-effect: advances the file cursor to the first data record.
fn read_dbf_fields<R: io::Read>(file: &mut R, dbf_header: &DbfHeader, encoding: encoding::EncodingRef) -> Result<Box<[DbfField]>, DbfError> {
    let mut buf = vec![ 0u8; dbf_header.n_header_bytes - DBF_HEADER_LENGTH ];

    file.read_exact(&mut buf)
        .map_err(|err| eof_as_format_error(err, format!("File ends inside its {}-byte header", dbf_header.n_header_bytes)))?;

    let mut fields = Vec::<DbfField>::new();
    let mut pos = 0;
    let mut offset = 1; // deletion flag

    loop {
        if pos >= buf.len() || (buf[pos] != DBF_FIELD_TERMINATOR && pos + DBF_FIELD_DESCRIPTOR_LENGTH > buf.len()) {
            return Err(DbfError::FormatError(format!("Field descriptor terminator (0x0D) missing: header length is {} bytes but field {} doesn't end before it", dbf_header.n_header_bytes, fields.len() + 1)));
        }

        if buf[pos] == DBF_FIELD_TERMINATOR {
            break;
        }

        let field = parse_dbf_field(&buf[pos .. pos + DBF_FIELD_DESCRIPTOR_LENGTH], offset, encoding)?;
        trace!("DBF field {:?}", field);
        if fields.iter().any(|f| f.name == field.name) {
            warn!("DBF field name {} appears twice; lookups by name will find the first", field.name);
        }
        offset += field.len as usize;
        fields.push(field);
        pos += DBF_FIELD_DESCRIPTOR_LENGTH;
    }

    if offset != dbf_header.n_bytes_per_record {
        return Err(DbfError::EncodingError(format!("Fields add up to {} bytes per record (including the deletion flag), but the header says records are {} bytes", offset, dbf_header.n_bytes_per_record)));
    }

    Ok(fields.into_boxed_slice())
}

/// Reads the header, including field definitions, from a .dbf file.
///
/// Assumes the cursor is at the start of the file. Without an encoding, picks
/// one from the header's language driver id, or UTF-8.
///
/// Side-effect: advances the file cursor to the first data record.
fn read_dbf_meta<R: io::Read>(file: &mut R, encoding: Option<encoding::EncodingRef>) -> Result<DbfMeta, DbfError> {
    let dbf_header = read_dbf_header(file)?;

    let encoding = match encoding {
        Some(encoding) => encoding,
        None => {
            let detected = encoding_for_language_driver(dbf_header.language_driver_id)
                .unwrap_or(encoding::all::UTF_8);
            debug!("Language driver id {:#04x}: decoding text as {}", dbf_header.language_driver_id, detected.name());
            detected
        }
    };

    let dbf_fields = read_dbf_fields(file, &dbf_header, encoding)?;

    Ok(DbfMeta {
        n_records: dbf_header.n_records,
        n_bytes_per_record: dbf_header.n_bytes_per_record,
        language_driver_id: dbf_header.language_driver_id,
        fields: dbf_fields,
        encoding: encoding,
    })
}

fn decode_value(field: &DbfField, bytes: &[u8], encoding: encoding::EncodingRef) -> Result<String, DbfError> {
    match field.data_type {
        DbfType::Long => Ok(LittleEndian::read_i32(bytes).to_string()),
        DbfType::Double => Ok(LittleEndian::read_f64(bytes).to_string()),
        DbfType::Char => Ok(decode_text(bytes, encoding)?.trim_end_matches(is_padding).to_string()),
        DbfType::Logical => {
            let text = decode_text(bytes, encoding)?;
            let value = match text.trim_matches(is_padding).chars().next() {
                Some('T') | Some('t') | Some('Y') | Some('y') => "T",
                Some('F') | Some('f') | Some('N') | Some('n') => "F",
                _ => "?",
            };
            Ok(value.to_string())
        }
        _ => Ok(decode_text(bytes, encoding)?.trim_matches(is_padding).to_string()),
    }
}

/// Reads a single record from a .dbf file.
///
/// Assumes the cursor is at the start of the record and that the record
/// "should" exist (i.e., the header leads us to believe there's a record
/// here).
///
/// Side-effect: advances the file cursor to the next record.
fn read_dbf_record<R: io::Read>(file: &mut R, dbf_meta: &DbfMeta, index: usize) -> Result<DbfRecord, DbfError> {
    let mut buf = vec![ 0u8; dbf_meta.n_bytes_per_record ];

    file.read_exact(&mut buf)
        .map_err(|err| eof_as_format_error(err, format!("File ends after {} of {} records", index, dbf_meta.n_records)))?;

    let deleted = match buf[0] {
        DBF_DELETED_FLAG => true,
        DBF_ACTIVE_FLAG => false,
        b => {
            warn!("Record {} has deletion flag {:#04x}; treating it as not deleted", index, b);
            false
        }
    };

    let mut values = Vec::<String>::with_capacity(dbf_meta.fields.len());
    for field in dbf_meta.fields.iter() {
        let start = field.offset as usize;
        values.push(decode_value(field, &buf[start .. start + field.len as usize], dbf_meta.encoding)?);
    }

    Ok(DbfRecord {
        deleted: deleted,
        values: values.into_boxed_slice(),
    })
}

/// Reads an xBase ".dbf" file record by record, following instructions at
/// https://www.clicketyclick.dk/databases/xbase/format/dbf.html
#[derive(Debug)]
pub struct DbfReader<R: io::Read> {
    file: R,
    n_records_already_iterated: usize,
    meta: DbfMeta,
    failed: bool,
}

impl<R: io::Read> DbfReader<R> {
    pub fn new(mut file: R, encoding: encoding::EncodingRef) -> Result<DbfReader<R>, DbfError> {
        let meta = read_dbf_meta(&mut file, Some(encoding))?;
        Ok(DbfReader::with_meta(file, meta))
    }

    /// Like `new()`, but picks the text encoding from the file's language
    /// driver id, falling back to UTF-8.
    pub fn new_detected(mut file: R) -> Result<DbfReader<R>, DbfError> {
        let meta = read_dbf_meta(&mut file, None)?;
        Ok(DbfReader::with_meta(file, meta))
    }

    fn with_meta(file: R, meta: DbfMeta) -> DbfReader<R> {
        DbfReader::<R> {
            file: file,
            n_records_already_iterated: 0,
            meta: meta,
            failed: false,
        }
    }

    pub fn fields(&self) -> &[DbfField] {
        &self.meta.fields
    }

    /// Number of records the header promises.
    pub fn n_records(&self) -> usize {
        self.meta.n_records
    }
}

impl<R: io::Read> Iterator for DbfReader<R> {
    type Item = Result<DbfRecord, DbfError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.n_records_already_iterated == self.meta.n_records {
            None
        } else {
            let ret = read_dbf_record(&mut self.file, &self.meta, self.n_records_already_iterated);
            self.n_records_already_iterated += 1;
            self.failed = ret.is_err();
            Some(ret)
        }
    }
}

/// A whole ".dbf" file, decoded into strings.
///
/// # Example
///
/// ```
/// # extern crate encoding;
/// # extern crate shpdbf;
///
/// # fn main() {
/// use std::path::Path;
/// use shpdbf::read::shapefile::dbf;
///
/// let dbf = dbf::open(Path::new("test/read/shapefile/name-area.dbf"), encoding::all::UTF_8).unwrap();
///
/// assert_eq!(Some(1), dbf.index_of_field_name("AREA"));
/// assert_eq!(None, dbf.index_of_field_name("area"));
/// assert_eq!("123.45", dbf.fields_at_record(0).unwrap()[1]);
/// # }
/// ```
#[derive(Debug,Clone)]
pub struct DbfFile {
    pub language_driver_id: u8,
    fields: Box<[DbfField]>,
    records: Box<[DbfRecord]>,
}

impl DbfFile {
    pub fn load<R: io::Read>(file: R, encoding: encoding::EncodingRef) -> Result<DbfFile, DbfError> {
        DbfFile::from_reader(DbfReader::new(file, encoding)?)
    }

    pub fn load_detected<R: io::Read>(file: R) -> Result<DbfFile, DbfError> {
        DbfFile::from_reader(DbfReader::new_detected(file)?)
    }

    fn from_reader<R: io::Read>(reader: DbfReader<R>) -> Result<DbfFile, DbfError> {
        let language_driver_id = reader.meta.language_driver_id;
        let fields = reader.meta.fields.clone();
        let records = reader.collect::<Result<Vec<DbfRecord>, DbfError>>()?;
        debug!("Read {} DBF records with {} fields", records.len(), fields.len());

        Ok(DbfFile {
            language_driver_id: language_driver_id,
            fields: fields,
            records: records.into_boxed_slice(),
        })
    }

    pub fn fields(&self) -> &[DbfField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DbfRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[DbfRecord] {
        &self.records
    }

    /// Position of the first field named exactly `name` (case-sensitive).
    ///
    /// A miss is `None`, not an error.
    pub fn index_of_field_name(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn fields_at_record(&self, index: usize) -> Option<&[String]> {
        self.records.get(index).map(|r| &r.values[..])
    }

    /// One field's value in every record, in record order.
    pub fn records_at_field_index(&self, index: usize) -> Option<Vec<&str>> {
        if index >= self.fields.len() {
            None
        } else {
            Some(self.records.iter().map(|r| r.values[index].as_str()).collect())
        }
    }
}

/// Opens an xBase ".dbf" file from the filesystem and reads all of it. The
/// file is closed before this returns.
pub fn open(path: &Path, encoding: encoding::EncodingRef) -> Result<DbfFile, DbfError> {
    let f = fs::File::open(path)?;
    DbfFile::load(io::BufReader::new(f), encoding)
}

/// Like `open()`, with the encoding picked from the language driver id.
pub fn open_detected(path: &Path) -> Result<DbfFile, DbfError> {
    let f = fs::File::open(path)?;
    DbfFile::load_detected(io::BufReader::new(f))
}

/// Builders for ".dbf" bytes.
#[cfg(test)]
pub mod test_bytes {
    use byteorder::{LittleEndian, WriteBytesExt};

    /// (name, type, width, decimal count)
    pub type FieldSpec<'a> = (&'a str, u8, u8, u8);

    /// A whole file. Each row is the deletion flag followed by each value,
    /// already padded to its field's width.
    pub fn file(language_driver_id: u8, fields: &[FieldSpec], rows: &[(u8, Vec<Vec<u8>>)]) -> Vec<u8> {
        let n_header_bytes = 32 + 32 * fields.len() + 1;
        let n_bytes_per_record = 1 + fields.iter().map(|f| f.2 as usize).sum::<usize>();

        let mut buf = Vec::new();
        buf.extend_from_slice(&[ 0x03, 118, 10, 19 ]);
        buf.write_u32::<LittleEndian>(rows.len() as u32).unwrap();
        buf.write_u16::<LittleEndian>(n_header_bytes as u16).unwrap();
        buf.write_u16::<LittleEndian>(n_bytes_per_record as u16).unwrap();
        buf.extend_from_slice(&[ 0u8; 17 ]);
        buf.push(language_driver_id);
        buf.extend_from_slice(&[ 0u8; 2 ]);

        for &(name, data_type, len, decimal_count) in fields {
            let mut entry = [ 0u8; 32 ];
            entry[.. name.len()].copy_from_slice(name.as_bytes());
            entry[11] = data_type;
            entry[16] = len;
            entry[17] = decimal_count;
            buf.extend_from_slice(&entry);
        }
        buf.push(0x0D);

        for &(flag, ref values) in rows {
            buf.push(flag);
            for value in values {
                buf.extend_from_slice(value);
            }
        }
        buf.push(0x1A);
        buf
    }

    /// NAME Character(10), AREA Numeric(8,2); three rows.
    pub fn name_area_file() -> Vec<u8> {
        file(0x57, &[ ("NAME", b'C', 10, 0), ("AREA", b'N', 8, 2) ], &[
            (b' ', vec![ b"Alpha     ".to_vec(), b"  123.45".to_vec() ]),
            (b' ', vec![ b"Beta      ".to_vec(), b"   67.80".to_vec() ]),
            (b'*', vec![ b"Gamma     ".to_vec(), b"    0.50".to_vec() ]),
        ])
    }
}
