extern crate shpdbf;

use std::env;
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use shpdbf::read::shapefile;

/// Prints every record of the given .shp file: its shape, then its .dbf
/// values.
fn main() {
    let mut args = env::args();

    if args.len() != 2 {
        writeln!(&mut io::stderr(), "Usage: {} <SHP_PATH>", args.next().unwrap_or_default()).unwrap();
        process::exit(1);
    }

    args.next();
    let path = PathBuf::from(args.next().unwrap());

    match shapefile::open_detected(&path) {
        Err(err) => {
            writeln!(&mut io::stderr(), "{}", err).unwrap();
            process::exit(1);
        }
        Ok(shapefile) => {
            for (shape, data) in shapefile.iter() {
                let deleted = if data.deleted { " (deleted)" } else { "" };
                println!("{}{} {:?}", shape, deleted, data.values);
            }

            println!("Read {} records", shapefile.record_count());
        }
    }
}
