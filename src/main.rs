use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use glzextract::{Extractor, GlzError, Header, Profile, SliceSource, Symbol, Table, HEADER_SIZE};

/// Decompress GLZ blobs.
#[derive(Parser, Debug)]
#[command(author, version, about = "Decompress GLZ blobs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Decode everything the header describes.
    Decode {
        file: PathBuf,
        /// Stop after this many bytes.
        #[arg(long, value_parser = parse_num)]
        limit: Option<usize>,
        #[command(flatten)]
        opts: Options,
    },
    /// Decode SIZE bytes starting at bit OFF, counted from the end of the header.
    Slice {
        file: PathBuf,
        #[arg(value_parser = parse_num)]
        off: usize,
        #[arg(value_parser = parse_num)]
        size: usize,
        #[command(flatten)]
        opts: Options,
    },
    /// Print the header and a summary of the table.
    Info {
        file: PathBuf,
        /// The blob carries the 288-entry table.
        #[arg(long)]
        compact: bool,
    },
}

#[derive(Args, Debug, Default, PartialEq, Eq)]
struct Options {
    /// Read the blob one byte at a time through seeks instead of loading it.
    #[arg(long)]
    seek: bool,
    /// The blob carries the 288-entry table.
    #[arg(long)]
    compact: bool,
    /// Write to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Range {
    Full(Option<usize>),
    Slice { off: usize, size: usize },
}

#[derive(Debug)]
enum Failure {
    Usage(String),
    Decode(GlzError),
    Write(io::Error),
}

impl Failure {
    fn code(&self) -> u8 {
        match self {
            Failure::Usage(_) => 1,
            Failure::Decode(_) => 2,
            Failure::Write(_) => 3,
        }
    }
}

/// Accepts decimal or `0x`-prefixed hex.
fn parse_num(s: &str) -> Result<usize, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("{}: {}", s, e))
}

fn profile(compact: bool) -> Profile {
    if compact {
        Profile::COMPACT
    } else {
        Profile::DEFAULT
    }
}

/// Output sink that remembers whether it was the one that failed.
struct Tracked<W> {
    inner: W,
    failed: bool,
}

impl<W: Write> Write for Tracked<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let r = self.inner.write(buf);
        self.failed |= r.is_err();
        r
    }

    fn flush(&mut self) -> io::Result<()> {
        let r = self.inner.flush();
        self.failed |= r.is_err();
        r
    }
}

fn open_failure(path: &Path, e: io::Error) -> Failure {
    Failure::Usage(format!("{}: {}", path.display(), e))
}

fn extract(file: &Path, opts: &Options, range: Range) -> Result<(), Failure> {
    let profile = profile(opts.compact);
    // open the input first so a missing blob does not leave an empty output behind
    let input = File::open(file).map_err(|e| open_failure(file, e))?;
    let sink: Box<dyn Write> = match &opts.output {
        Some(path) => Box::new(File::create(path).map_err(|e| open_failure(path, e))?),
        None => Box::new(io::stdout().lock()),
    };
    let mut sink = Tracked {
        inner: BufWriter::new(sink),
        failed: false,
    };

    let res = if opts.seek {
        match range {
            Range::Full(limit) => Extractor::with_profile(input, &profile, limit),
            Range::Slice { off, size } => Extractor::slice(input, &profile, off, size),
        }
        .and_then(|mut extractor| extractor.decode_to(&mut sink))
    } else {
        let mut input = input;
        let mut blob = Vec::new();
        input
            .read_to_end(&mut blob)
            .map_err(|e| open_failure(file, e))?;
        log::debug!("loaded {} bytes from {}", blob.len(), file.display());
        match range {
            Range::Full(limit) => profile.decode_into(&blob, &mut sink, limit),
            Range::Slice { off, size } => Header::parse_k(&blob).and_then(|k| {
                profile.decode(k, off, size, SliceSource::new(&blob[HEADER_SIZE..]), &mut sink)
            }),
        }
    };

    match res {
        Err(e) if sink.failed => Err(Failure::Write(e.into_io())),
        Err(e) => Err(Failure::Decode(e)),
        Ok(()) => sink.flush().map_err(Failure::Write),
    }
}

fn info(file: &Path, compact: bool) -> Result<(), Failure> {
    let profile = profile(compact);
    let blob = std::fs::read(file).map_err(|e| open_failure(file, e))?;
    let header = Header::parse(&blob).map_err(Failure::Decode)?;

    let mut literals = 0;
    let mut references = 0;
    let mut longest = 0;
    let mut source = SliceSource::new(&blob[HEADER_SIZE..]);
    for symbol in Table::new(&profile).entries(&mut source) {
        match symbol.map_err(Failure::Decode)? {
            Symbol::Literal(_) => literals += 1,
            Symbol::Reference { len } => {
                references += 1;
                longest = longest.max(len);
            }
        }
    }
    let stream_bits = ((blob.len() - HEADER_SIZE) * 8).saturating_sub(profile.stream_start());

    println!("size:       {}", header.size);
    println!("start_off:  {}", header.start_off);
    println!("k:          {}", header.k);
    println!(
        "table:      {} entries, {} literals, {} references",
        profile.table_entries, literals, references
    );
    println!("longest:    {}", longest);
    println!("stream:     {} bits", stream_bits);
    Ok(())
}

fn run(command: Command) -> Result<(), Failure> {
    match command {
        Command::Decode { file, limit, opts } => extract(&file, &opts, Range::Full(limit)),
        Command::Slice {
            file,
            off,
            size,
            opts,
        } => extract(&file, &opts, Range::Slice { off, size }),
        Command::Info { file, compact } => info(&file, compact),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(u8::from(e.use_stderr()));
        }
    };
    log::debug!("{:?}", cli);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            match &failure {
                Failure::Usage(msg) => eprintln!("glz: {}", msg),
                Failure::Decode(e) => eprintln!("glz: decoding failed: {}", e),
                Failure::Write(e) => eprintln!("glz: writing output failed: {}", e),
            }
            ExitCode::from(failure.code())
        }
    }
}
