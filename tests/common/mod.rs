//! Builders for ".shp" and ".dbf" bytes.

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

/// Multi-part record content: type, bbox, parts, points.
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

pub fn shp_file(shape_type: u32, contents: &[Vec<u8>]) -> Vec<u8> {
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

/// Each row is the deletion flag followed by each value, already padded to
/// its field's width.
pub fn dbf_file(language_driver_id: u8, fields: &[(&str, u8, u8, u8)], rows: &[(u8, Vec<Vec<u8>>)]) -> Vec<u8> {
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

/// NAME Character(10), AREA Numeric(8,2); three rows, the last deleted.
pub fn name_area_dbf() -> Vec<u8> {
    dbf_file(0x57, &[ ("NAME", b'C', 10, 0), ("AREA", b'N', 8, 2) ], &[
        (b' ', vec![ b"Alpha     ".to_vec(), b"  123.45".to_vec() ]),
        (b' ', vec![ b"Beta      ".to_vec(), b"   67.80".to_vec() ]),
        (b'*', vec![ b"Gamma     ".to_vec(), b"    0.50".to_vec() ]),
    ])
}
