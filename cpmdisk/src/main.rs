// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Host-side CLI for creating, inspecting and modifying CP/M disk images.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use cpmfs::{Disk, Format};

#[derive(Parser)]
#[command(name = "cpmdisk", version, about = "Create and inspect CP/M disk images")]
struct Cli {
    /// Raise the log level to debug for this invocation
    #[clap(long, short, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Write a freshly formatted image
    Create {
        #[clap(flatten)]
        format: FormatArg,

        /// Overwrite an existing image
        #[clap(long, short)]
        force: bool,

        disk: PathBuf,
    },
    /// Add host files to an image
    Add {
        #[clap(flatten)]
        format: FormatArg,

        /// Set the SYS attribute (visible from every user area)
        #[clap(long, short)]
        sys: bool,

        /// User number to add under
        #[clap(long, short, default_value_t = 0)]
        user: u8,

        disk: PathBuf,
        files: Vec<PathBuf>,
    },
    /// List files on an image
    List {
        #[clap(flatten)]
        format: FormatArg,

        disk: PathBuf,
    },
    /// Delete files matching CP/M wildcard patterns
    Delete {
        #[clap(flatten)]
        format: FormatArg,

        disk: PathBuf,
        patterns: Vec<String>,
    },
    /// Extract files from an image
    Extract {
        #[clap(flatten)]
        format: FormatArg,

        /// User number to extract from
        #[clap(long, short, default_value_t = 0)]
        user: u8,

        /// Directory to write extracted files into
        #[clap(long, short, default_value = ".")]
        output: PathBuf,

        disk: PathBuf,
        files: Vec<String>,
    },
}

/// Mutually exclusive geometry override, shared by every subcommand that
/// touches an image.
#[derive(Clone, Parser)]
struct FormatArg {
    /// Force SSSD (8" floppy) geometry
    #[clap(long, conflicts_with_all = &["combo"])]
    sssd: bool,

    /// Force combo (MBR-prefixed multi-slice) geometry
    #[clap(long)]
    combo: bool,
}

impl FormatArg {
    fn explicit(&self) -> Option<Format> {
        if self.sssd {
            Some(Format::Sssd)
        } else if self.combo {
            Some(Format::Combo)
        } else {
            None
        }
    }

    /// Format to create with, when no image exists yet to auto-detect from.
    fn or_default(&self) -> Format {
        self.explicit().unwrap_or(Format::Hd1k)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    );
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            log::error!("{message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Create { format, force, disk } => cmd_create(&disk, format.or_default(), force),
        Command::Add {
            format,
            sys,
            user,
            disk,
            files,
        } => cmd_add(&disk, format.explicit(), sys, user, &files),
        Command::List { format, disk } => cmd_list(&disk, format.explicit()),
        Command::Delete {
            format,
            disk,
            patterns,
        } => cmd_delete(&disk, format.explicit(), &patterns),
        Command::Extract {
            format,
            user,
            output,
            disk,
            files,
        } => cmd_extract(&disk, format.explicit(), user, &output, &files),
    }
}

fn cmd_create(disk: &Path, format: Format, force: bool) -> Result<(), String> {
    if disk.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", disk.display()));
    }
    let image = Disk::create(format).map_err(|e| e.to_string())?;
    fs::write(disk, image.into_bytes()).map_err(|e| e.to_string())?;
    println!("created {}", disk.display());
    Ok(())
}

fn load(disk: &Path, explicit: Option<Format>) -> Result<Disk, String> {
    let bytes = fs::read(disk).map_err(|e| format!("{}: {e}", disk.display()))?;
    Disk::open(bytes, explicit).map_err(|e| e.to_string())
}

fn cmd_add(
    disk_path: &Path,
    format: Option<Format>,
    sys: bool,
    user: u8,
    files: &[PathBuf],
) -> Result<(), String> {
    let mut disk = load(disk_path, format)?;
    let mut failed = false;
    for file in files {
        let data = match fs::read(file) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("error: {}: {e}", file.display());
                failed = true;
                continue;
            }
        };
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format!("invalid filename: {}", file.display()))?;
        match disk.add(filename, &data, sys, user) {
            Ok(()) => println!("added {filename}: {} bytes", data.len()),
            Err(e) => {
                eprintln!("error: {filename}: {e}");
                failed = true;
            }
        }
    }
    fs::write(disk_path, disk.into_bytes()).map_err(|e| e.to_string())?;
    if failed {
        Err("one or more files failed to add".to_string())
    } else {
        Ok(())
    }
}

fn cmd_list(disk_path: &Path, format: Option<Format>) -> Result<(), String> {
    let disk = load(disk_path, format)?;
    for entry in disk.list() {
        println!("{:>2}  {:<12}  {:>10}  {:>4}", entry.user, entry.name, entry.size, entry.blocks);
    }
    Ok(())
}

fn cmd_delete(disk_path: &Path, format: Option<Format>, patterns: &[String]) -> Result<(), String> {
    let mut disk = load(disk_path, format)?;
    for pattern in patterns {
        let marked = disk.delete(pattern, 0);
        if marked == 0 {
            println!("{pattern}: no match");
        } else {
            println!("{pattern}: deleted {marked} entries");
        }
    }
    fs::write(disk_path, disk.into_bytes()).map_err(|e| e.to_string())
}

fn cmd_extract(
    disk_path: &Path,
    format: Option<Format>,
    user: u8,
    output: &Path,
    files: &[String],
) -> Result<(), String> {
    let disk = load(disk_path, format)?;
    let mut failed = false;
    for filename in files {
        match disk.extract(filename, user) {
            Some(bytes) => {
                let basename = Path::new(filename)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| format!("invalid filename: {filename}"))?;
                let dest = output.join(basename.to_ascii_lowercase());
                if let Err(e) = fs::write(&dest, &bytes) {
                    eprintln!("error: {}: {e}", dest.display());
                    failed = true;
                    continue;
                }
                println!("extracted {} ({} bytes)", dest.display(), bytes.len());
            }
            None => {
                eprintln!("error: {filename}: not found");
                failed = true;
            }
        }
    }
    if failed {
        Err("one or more files failed to extract".to_string())
    } else {
        Ok(())
    }
}
