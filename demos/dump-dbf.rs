extern crate shpdbf;

use std::env;
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use shpdbf::read::shapefile::dbf;

/// Prints the fields of the given .dbf file, then one tab-separated line per
/// record.
fn main() {
    let mut args = env::args();

    if args.len() != 2 {
        writeln!(&mut io::stderr(), "Usage: {} <DBF_PATH>", args.next().unwrap_or_default()).unwrap();
        process::exit(1);
    }

    args.next();
    let path = PathBuf::from(args.next().unwrap());

    match dbf::open_detected(&path) {
        Err(err) => {
            writeln!(&mut io::stderr(), "{}", err).unwrap();
            process::exit(1);
        }
        Ok(table) => {
            for field in table.fields() {
                println!("{}: {:?}({}, {})", field.name, field.data_type, field.len, field.decimal_count);
            }

            for record in table.records() {
                let line: Vec<&str> = record.values.iter().map(|v| v.as_str()).collect();
                println!("{}{}", if record.deleted { "*" } else { " " }, line.join("\t"));
            }
        }
    }
}
