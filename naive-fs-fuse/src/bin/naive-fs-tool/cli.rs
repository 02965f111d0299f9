use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about = "Create and inspect naive-fs images")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a fresh filesystem into an image file
    Format {
        image: PathBuf,

        /// Image size in blocks; defaults to the current file length
        #[arg(long, short)]
        blocks: Option<u32>,

        /// Seed the root directory with an empty `welcome` file
        #[arg(long)]
        welcome: bool,

        #[arg(long, default_value_t = 0)]
        uid: u32,

        #[arg(long, default_value_t = 0)]
        gid: u32,
    },

    /// List a directory
    Ls {
        image: PathBuf,

        #[arg(default_value = "/")]
        path: String,
    },

    /// Create a directory
    Mkdir {
        image: PathBuf,
        path: String,

        /// Permission bits, in octal
        #[arg(long, short, default_value = "755", value_parser = parse_mode)]
        mode: u32,
    },

    /// Create an empty regular file
    Touch {
        image: PathBuf,
        path: String,

        /// Permission bits, in octal
        #[arg(long, short, default_value = "644", value_parser = parse_mode)]
        mode: u32,
    },

    /// Show inode metadata
    Stat { image: PathBuf, path: String },

    /// Show free blocks and inodes
    Df { image: PathBuf },
}

fn parse_mode(mode: &str) -> Result<u32, String> {
    let digits = mode.strip_prefix("0o").unwrap_or(mode);
    match u32::from_str_radix(digits, 8) {
        Ok(bits) if bits <= 0o7777 => Ok(bits),
        Ok(bits) => Err(format!("{bits:o} has bits beyond 0o7777")),
        Err(err) => Err(err.to_string()),
    }
}
