//! flopfs CLI - Inspect and edit floppy images from the command line.
//!
//! Usage:
//!   flopfs <image> [--config cfg.json] [--trace] [--dry-run] <command>
//!
//! Examples:
//!   flopfs disk.img format                        # Write an empty 1.44 MB filesystem
//!   flopfs disk.img create HELLO TXT              # Add a one-cluster file
//!   flopfs disk.img write HELLO TXT --text hi     # Overwrite from offset 0
//!   flopfs disk.img write LOG TXT --fill 65 --count 600 --offset 512
//!   flopfs disk.img cat HELLO TXT                 # Dump a file to stdout
//!   flopfs disk.img --dry-run rm HELLO TXT        # Show what rm would touch
//!   flopfs disk.img fsck --restore primary        # Copy the primary table over the mirror

mod logger;

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use flopfs_core::{
    split_filename, BlockDevice, FileSystem, FsConfig, ImageFile, MemoryDisk, OverlayDisk,
    TableCopy, VerifyReport,
};

/// Floppy image tool
#[derive(Parser, Debug)]
#[command(name = "flopfs")]
#[command(about = "Inspect and edit flopfs floppy images")]
struct Args {
    /// Disk image file
    image: PathBuf,

    /// JSON filesystem config (drive, geometry, growth policy)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log every filesystem operation to stderr
    #[arg(short, long, global = true)]
    trace: bool,

    /// Stage all writes in memory and leave the image untouched
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create (or truncate) the image and write an empty filesystem
    Format {
        /// Image size in sectors (defaults to the configured geometry)
        #[arg(long)]
        sectors: Option<u32>,
    },
    /// List the directory
    Ls,
    /// Print a file to stdout
    Cat {
        name: String,
        #[arg(default_value = "")]
        ext: String,
    },
    /// Create an empty one-cluster file
    Create {
        name: String,
        #[arg(default_value = "")]
        ext: String,
    },
    /// Write bytes into an existing file
    Write {
        name: String,
        #[arg(default_value = "")]
        ext: String,
        /// Text to write
        #[arg(long, conflicts_with = "fill", required_unless_present = "fill")]
        text: Option<String>,
        /// Byte value to repeat
        #[arg(long, requires = "count")]
        fill: Option<u8>,
        /// Number of fill bytes
        #[arg(long)]
        count: Option<u32>,
        /// Offset of the first byte written
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Delete a file
    Rm {
        name: String,
        #[arg(default_value = "")]
        ext: String,
    },
    /// Check both allocation tables and every file chain
    Fsck {
        /// Repair by copying one table over the other
        #[arg(long, value_enum)]
        restore: Option<RestoreSource>,
    },
    /// Print the configuration and usage as JSON
    Info,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RestoreSource {
    Primary,
    Mirror,
}

impl From<RestoreSource> for TableCopy {
    fn from(source: RestoreSource) -> Self {
        match source {
            RestoreSource::Primary => TableCopy::Primary,
            RestoreSource::Mirror => TableCopy::Mirror,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logger::init(args.trace);

    let mut config = match &args.config {
        Some(path) => FsConfig::from_path(path)?,
        None => FsConfig::default(),
    };

    if let Command::Format { sectors } = &args.command {
        if let Some(sectors) = sectors {
            config.geometry.total_sectors = *sectors;
        }
        return format_image(&args.image, &config, args.dry_run);
    }

    let image = ImageFile::open(&args.image)?.with_drive(config.drive);
    if args.dry_run {
        let drive = config.drive;
        let mut fs = FileSystem::init(OverlayDisk::new(image, drive), config)?;
        run(&mut fs, args.command)?;

        let overlay = fs.into_device();
        let changed: Vec<u32> = overlay.modified_sectors().collect();
        eprintln!(
            "dry run: {} sectors would change {:?}",
            changed.len(),
            changed
        );
    } else {
        let mut fs = FileSystem::init(image, config)?;
        run(&mut fs, args.command)?;
    }

    Ok(())
}

fn format_image(path: &Path, config: &FsConfig, dry_run: bool) -> Result<(), Box<dyn Error>> {
    config.geometry.validate()?;
    let sectors = config.geometry.total_sectors;

    if dry_run {
        let mut disk = MemoryDisk::new(sectors).with_drive(config.drive);
        FileSystem::format(&mut disk, config)?;
        eprintln!("dry run: {} left untouched", path.display());
    } else {
        let mut image = ImageFile::create(path, sectors)?.with_drive(config.drive);
        FileSystem::format(&mut image, config)?;
        info!("wrote {}", path.display());
    }

    println!(
        "{}: {} sectors, {} data clusters, {} directory slots",
        path.display(),
        sectors,
        config.geometry.max_file_clusters(),
        config.geometry.directory_capacity()
    );
    Ok(())
}

fn run<D: BlockDevice>(fs: &mut FileSystem<D>, command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Format { .. } => return Err("format does not run on a mounted image".into()),
        Command::Ls => {
            let files = fs.list();
            for entry in &files {
                println!(
                    "{:<12} {:>8} {:>6}",
                    entry.filename(),
                    entry.file_size,
                    entry.starting_cluster
                );
            }
            println!(
                "{} files, {} free clusters",
                files.len(),
                fs.table().free_count()
            );
        }
        Command::Cat { name, ext } => {
            let (name, ext) = file_name(&name, &ext);
            fs.open(name, ext)?;
            let size = fs.open_file().map_or(0, |file| file.file_size());
            let data = (0..size)
                .map(|i| fs.read_byte(i))
                .collect::<Result<Vec<u8>, _>>()?;
            std::io::stdout().write_all(&data)?;
            // Nothing was staged, so the session is dropped without a commit.
        }
        Command::Create { name, ext } => {
            let (name, ext) = file_name(&name, &ext);
            fs.create(name, ext)?;
        }
        Command::Write {
            name,
            ext,
            text,
            fill,
            count,
            offset,
        } => {
            let data = match (text, fill) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(byte)) => vec![byte; count.unwrap_or(0) as usize],
                (None, None) => Vec::new(),
            };

            let (name, ext) = file_name(&name, &ext);
            fs.open(name, ext)?;
            if let Some((&first, rest)) = data.split_first() {
                fs.write_byte(first, offset)?;
                fs.write_all(rest)?;
            }
            fs.close()?;
            info!("wrote {} bytes at offset {}", data.len(), offset);
        }
        Command::Rm { name, ext } => {
            let (name, ext) = file_name(&name, &ext);
            fs.open(name, ext)?;
            fs.delete()?;
        }
        Command::Fsck { restore } => {
            let report = fs.verify();
            print_report(&report);

            match restore {
                Some(source) => {
                    fs.restore_mirror(source.into())?;
                    let after = fs.verify();
                    println!("after restore:");
                    print_report(&after);
                    if !after.is_clean() {
                        return Err("filesystem still has errors".into());
                    }
                }
                None if !report.is_clean() => {
                    return Err("filesystem has errors".into());
                }
                None => {}
            }
        }
        Command::Info => {
            let summary = serde_json::json!({
                "config": fs.config(),
                "files": fs.list().len(),
                "freeClusters": fs.table().free_count(),
                "maxFileClusters": fs.config().geometry.max_file_clusters(),
                "directorySlots": fs.directory().capacity(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

/// Accept both `NAME EXT` and `NAME.EXT`.
fn file_name<'a>(name: &'a str, ext: &'a str) -> (&'a str, &'a str) {
    if ext.is_empty() {
        split_filename(name)
    } else {
        (name, ext)
    }
}

fn print_report(report: &VerifyReport) {
    if report.is_clean() {
        println!("clean");
        return;
    }
    for cluster in &report.mismatches {
        println!("table mismatch at cluster {}", cluster);
    }
    for file in &report.damaged {
        println!("damaged: {} ({})", file.filename, file.error);
    }
    if !report.orphaned.is_empty() {
        println!("orphaned clusters: {:?}", report.orphaned);
    }
}
