use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[clap(
        about = "Upload every subdirectory of DIR as an album, resuming where the last run stopped",
        display_order = 1
    )]
    Sync {
        #[clap(help = "Base directory; each direct subdirectory becomes one album")]
        dir: PathBuf,
        #[clap(short, long, help = "Also process nested directories, each as its own album")]
        recurse: bool,
        #[clap(short = 'y', long = "yes", help = "Do not ask before uploading a directory")]
        skip_confirmation: bool,
        #[clap(short = 'n', long, help = "Show what would be uploaded without changing anything")]
        dry_run: bool,
        #[clap(short = 'c', long = "concurrency", help = "Number of parallel uploads (default from config, 1)")]
        concurrency: Option<usize>,
        #[clap(
            short = 's',
            long = "substitutions",
            help = "Album name substitutions as one CSV row: old,new,old,new"
        )]
        substitutions: Option<String>,
        #[clap(short = 'a', long = "capitalize", help = "Capitalize every word of the album name")]
        capitalize: bool,
        #[clap(long, help = "Do not parse a trailing year from directory names")]
        no_parse_year: bool,
        #[clap(long, help = "Upload files unchanged instead of writing the album year into EXIF")]
        no_rewrite_dates: bool,
        #[clap(short, long, help = "Write debug logs under ~/.photo-uploader/logs")]
        verbose: bool,
    },
    #[clap(about = "List albums in the library", display_order = 2)]
    Albums {},
    #[clap(about = "Configure photo-uploader", display_order = 3)]
    Set {
        #[clap(short = 'l', long, help = "Set the library directory", display_order = 1)]
        library_path: Option<PathBuf>,
        #[clap(short = 'e', long, help = "Set allowed file extensions, comma separated", display_order = 2)]
        extensions: Option<String>,
        #[clap(short = 's', long, help = "Set default album name substitutions", display_order = 3)]
        substitutions: Option<String>,
        #[clap(short = 'c', long, help = "Set default number of parallel uploads", display_order = 4)]
        concurrency: Option<usize>,
        #[clap(long, help = "Capitalize album names by default", display_order = 5)]
        capitalize: Option<bool>,
        #[clap(long, help = "Parse a trailing year from directory names by default", display_order = 6)]
        parse_year: Option<bool>,
        #[clap(long, help = "Rewrite EXIF dates before upload by default", display_order = 7)]
        rewrite_dates: Option<bool>,
    },
}
