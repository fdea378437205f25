use std::path::PathBuf;

use rama::error::BoxError;

/// Where replayed records are to be written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// `host:port` of a UDP receiver, resolved when creating a sink.
    Udp(String),
    /// File to which a gzip stream is appended.
    GzFile(PathBuf),
}

/// Destination flags, of which exactly one is expected.
#[derive(Debug, Clone, clap::Args, Default)]
pub struct DestinationArgs {
    /// UDP address (host:port) to send records to, one datagram per record
    #[arg(long, value_name = "HOST:PORT", conflicts_with = "file")]
    pub addr: Option<String>,

    /// Path of a file to append the records to (always gzip compressed)
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

impl TryFrom<DestinationArgs> for Destination {
    type Error = BoxError;

    fn try_from(args: DestinationArgs) -> Result<Self, Self::Error> {
        match (args.addr, args.file) {
            (Some(addr), None) => {
                let addr = addr.trim();
                if addr.is_empty() {
                    return Err(BoxError::from("empty UDP address is not allowed"));
                }
                Ok(Self::Udp(addr.to_owned()))
            }
            (None, Some(path)) => {
                if path.as_os_str().is_empty() {
                    return Err(BoxError::from("empty file path is not allowed"));
                }
                Ok(Self::GzFile(path))
            }
            (Some(_), Some(_)) => Err(BoxError::from(
                "both a UDP address and a file are specified: pick one destination",
            )),
            (None, None) => Err(BoxError::from(
                "no destination specified: use either --addr or --file",
            )),
        }
    }
}
