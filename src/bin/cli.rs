//! octbin CLI
//!
//! Command-line interface for inspecting and converting octbin files.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use octbin::{compress, Config, FileHandle, OpenMode, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// octbin CLI
#[derive(Parser, Debug)]
#[command(name = "octbin-cli")]
#[command(about = "Inspect and convert octbin variable containers")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the variables stored in a file
    List {
        /// File to read (raw or gzip)
        file: PathBuf,
    },

    /// Print one variable
    Show {
        /// File to read (raw or gzip)
        file: PathBuf,

        /// Variable name
        name: String,

        /// Print as JSON instead of debug form
        #[arg(long)]
        json: bool,
    },

    /// Gzip a raw file into <file>.gz and remove the raw file
    Compress {
        /// Raw file
        file: PathBuf,

        /// Gzip level (0-9)
        #[arg(short, long, default_value = "6")]
        level: u32,
    },

    /// Inflate a gzip file back into a raw file
    Inflate {
        /// Gzip file
        file: PathBuf,

        /// Output path (defaults to the input minus ".gz")
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a sample map of vectors, then read it back
    Demo {
        /// Raw path to write
        file: PathBuf,

        /// Compress on close
        #[arg(short, long)]
        compress: bool,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,octbin=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> octbin::Result<()> {
    match command {
        Commands::List { file } => {
            let mut handle = FileHandle::open(&file, OpenMode::Read)?;
            tracing::info!("{} ({:?}, {:?})", file.display(), handle.state(), handle.header());
            for name in handle.names()? {
                println!("{}", name);
            }
            handle.close()?;
        }
        Commands::Show { file, name, json } => {
            let mut handle = FileHandle::open(&file, OpenMode::Read)?;
            let value = handle.load(&name)?;
            handle.close()?;
            if json {
                let text = serde_json::to_string_pretty(&value).map_err(std::io::Error::from)?;
                println!("{}", text);
            } else {
                println!("{} = {:?}", name, value);
            }
        }
        Commands::Compress { file, level } => {
            let config = Config::builder().compression_level(level).build();
            let target = compress::finalize_compress(&file, &config)?;
            tracing::info!("Wrote {}", target.display());
        }
        Commands::Inflate { file, output } => {
            let output = output.unwrap_or_else(|| strip_gz(&file));
            compress::inflate_to(&file, &output)?;
            tracing::info!("Wrote {}", output.display());
        }
        Commands::Demo { file, compress } => demo(&file, compress)?,
    }
    Ok(())
}

/// Save {x: 0.1413 * i, n: i} for i in 0..10 as "the_map", then load it back
fn demo(file: &Path, compress: bool) -> octbin::Result<()> {
    let n: Vec<i64> = (0..10).collect();
    let x: Vec<f64> = n.iter().map(|&i| i as f64 * 0.1413).collect();
    let the_map = Value::map([("x", Value::real_column(x)), ("n", Value::int_column(n))])?;

    // A write on an existing file (or its .gz) appends; start the demo from scratch
    for stale in [file.to_path_buf(), compress::gz_path(file)] {
        if stale.exists() {
            std::fs::remove_file(&stale)?;
        }
    }

    let mode = if compress {
        OpenMode::WriteCompressed
    } else {
        OpenMode::Write
    };
    let mut out = FileHandle::open(file, mode)?;
    tracing::info!("Writing {} as {:?}", file.display(), out.state());
    out.save("the_map", &the_map)?;
    let written = out.close()?.unwrap_or_else(|| file.to_path_buf());

    let mut input = FileHandle::open(&written, OpenMode::Read)?;
    let loaded = input.load("the_map")?;
    input.close()?;

    if let (Some(x), Some(n)) = (
        loaded.get("x").and_then(Value::as_reals),
        loaded.get("n").and_then(Value::as_ints),
    ) {
        for (i, v) in x.iter().enumerate() {
            println!("x_new({}) = {}", i, v);
        }
        for (i, v) in n.iter().enumerate() {
            println!("n_new({}) = {}", i, v);
        }
    }
    tracing::info!("Round trip through {} ok: {}", written.display(), loaded == the_map);
    Ok(())
}

fn strip_gz(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    match text.strip_suffix(compress::GZ_SUFFIX) {
        Some(stem) if !stem.is_empty() => PathBuf::from(stem),
        _ => path.with_extension("raw"),
    }
}
