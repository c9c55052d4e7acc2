//! CLI argument definition and parsing.

use std::env;
use std::path::PathBuf;
use std::process;

use zonemd_proto::Name;
use zonemd::zone::StoreKind;

/// The most placeholder digest types one invocation will insert.
const MAX_ZONEMD_COUNT: usize = 10;

const DEFAULT_TREE_WIDTH: usize = 13;

#[derive(Clone, Debug)]
pub struct Args {
    pub origin: Name,
    pub zonefile: Option<PathBuf>,
    pub calculate: bool,
    pub verify: bool,
    pub placeholders: Vec<u8>,
    pub update_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub zsk_file: Option<PathBuf>,
    pub tree_depth: u32,
    pub tree_width: usize,
    pub print_timings: bool,
    pub quiet: bool,
}

enum ConsumeNext {
    Output,
    Placeholder,
    Update,
    Zsk,
    Depth,
    Width,
}

impl Args {
    pub fn parse() -> Self {
        // skip executable name
        let args: Vec<String> = env::args().skip(1).collect();

        let mut calculate = false;
        let mut verify = false;
        let mut placeholders = Vec::new();
        let mut update_file = None;
        let mut output_file = None;
        let mut zsk_file = None;
        let mut tree_depth = 0;
        let mut tree_width = DEFAULT_TREE_WIDTH;
        let mut print_timings = false;
        let mut quiet = false;
        let mut positional: Vec<String> = Vec::new();

        let mut consume_next = None;

        for arg in args {
            if let Some(to_consume) = &consume_next {
                match to_consume {
                    ConsumeNext::Output => output_file = Some(PathBuf::from(&arg)),
                    ConsumeNext::Update => update_file = Some(PathBuf::from(&arg)),
                    ConsumeNext::Zsk => zsk_file = Some(PathBuf::from(&arg)),
                    ConsumeNext::Placeholder => match arg.parse::<u8>() {
                        Ok(val) => {
                            if placeholders.len() < MAX_ZONEMD_COUNT {
                                placeholders.push(val);
                            }
                        }
                        Err(_) => err(format!("Invalid digest type: {}.", arg)),
                    },
                    ConsumeNext::Depth => match arg.parse::<u32>() {
                        Ok(val) => tree_depth = val,
                        Err(_) => err(format!("Invalid tree depth: {}.", arg)),
                    },
                    ConsumeNext::Width => match arg.parse::<usize>() {
                        Ok(val) if val >= 1 => tree_width = val,
                        _ => err(format!("Invalid tree fanout (must be at least 1): {}.", arg)),
                    },
                }
                consume_next = None;
            } else if let Some(option) = arg.strip_prefix('-') {
                match option {
                    "c" => calculate = true,
                    "v" => verify = true,
                    "t" => print_timings = true,
                    "q" => quiet = true,
                    "o" => consume_next = Some(ConsumeNext::Output),
                    "p" => consume_next = Some(ConsumeNext::Placeholder),
                    "u" => consume_next = Some(ConsumeNext::Update),
                    "z" => consume_next = Some(ConsumeNext::Zsk),
                    "D" => consume_next = Some(ConsumeNext::Depth),
                    "W" => consume_next = Some(ConsumeNext::Width),
                    _ => usage(),
                }
            } else {
                positional.push(arg);
            }
        }

        if consume_next.is_some() || positional.is_empty() || positional.len() > 2 {
            usage();
        }

        let origin = match Name::from_ascii(&positional[0]) {
            Ok(name) => name,
            Err(e) => err(format!("Invalid origin '{}': {}", positional[0], e)),
        };
        let zonefile = positional.get(1).map(PathBuf::from);

        Self {
            origin,
            zonefile,
            calculate,
            verify,
            placeholders,
            update_file,
            output_file,
            zsk_file,
            tree_depth,
            tree_width,
            print_timings,
            quiet,
        }
    }

    /// The storage back-end this invocation asked for: a depth of 0 means one
    /// leaf, i.e. plain flat mode.
    pub fn store_kind(&self) -> StoreKind {
        if self.tree_depth == 0 {
            StoreKind::Flat
        } else {
            StoreKind::Tree {
                depth: self.tree_depth,
                width: self.tree_width,
            }
        }
    }
}

fn usage() -> ! {
    eprintln!("usage: zonemd [options] origin [zonefile]");
    eprintln!("\t-c\t\tcalculate the zone digest");
    eprintln!("\t-o file\t\twrite zone to output file");
    eprintln!("\t-u file\t\tfile containing RR updates");
    eprintln!("\t-p type\t\tinsert placeholder record of type");
    eprintln!("\t-v\t\tverify the zone digest");
    eprintln!("\t-z file\t\tZSK file name");
    eprintln!("\t-D n\t\tdepth of hash tree (default 0 = flat)");
    eprintln!("\t-W n\t\tfanout of hash tree (default {})", DEFAULT_TREE_WIDTH);
    eprintln!("\t-t\t\tprint timings");
    eprintln!("\t-q\t\tquiet mode, show errors only");
    process::exit(2)
}

fn err(msg: impl AsRef<str>) -> ! {
    eprintln!("{}", msg.as_ref());
    process::exit(2)
}
