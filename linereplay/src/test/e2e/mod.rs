use std::{io::Read as _, path::Path};

use clap::Parser as _;
use flate2::read::MultiGzDecoder;

use crate::Args;

mod replay;
mod scenario;

fn parse_args(argv: &[&str]) -> Args {
    let mut full = vec!["linereplay"];
    full.extend(argv);
    Args::try_parse_from(full).unwrap()
}

fn read_gz_lines(path: &Path) -> Vec<String> {
    let mut out = String::new();
    MultiGzDecoder::new(std::fs::File::open(path).unwrap())
        .read_to_string(&mut out)
        .unwrap();
    out.lines().map(ToOwned::to_owned).collect()
}

#[test]
fn test_invalid_flags_are_rejected() {
    for argv in [
        &["replay", "in.log", "--addr", "127.0.0.1:1", "--file", "out.gz"][..],
        &["replay", "in.log", "--file", "out.gz", "--delay", "1s", "--rps", "5"],
        &["scenario", "in.log", "--file", "out.gz", "--delay", "soon"],
        &["scenario", "in.log", "--file", "out.gz", "--delay", "500000000000years"],
        &["scenario", "in.log", "--file", "out.gz", "--rps", "1e-20"],
        &["replay", "in.log", "--file", "out.gz", "--rps", "-3"],
    ] {
        let mut full = vec!["linereplay"];
        full.extend(argv);
        assert!(Args::try_parse_from(full).is_err(), "{argv:?}");
    }
}
