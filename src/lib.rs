extern crate byteorder;
extern crate encoding;
extern crate itertools;
#[macro_use] extern crate lazy_static;
#[macro_use] extern crate log;
extern crate regex;

pub mod read;
