use std::{env::args_os, fs, io};

use whazzup_parser::settings::ParserSettings;
use whazzup_parser::whazzup::WhazzupData;

fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let path = args_os().nth(1).expect("missing argument: path to whazzup.txt");
    match WhazzupData::parse(&fs::read(path).unwrap(), &ParserSettings::default()) {
        Ok(data) => println!("{}", serde_json::to_string(&data).unwrap()),
        Err(e) => eprintln!("{e}"),
    }
}
