use std::{
    fs::File,
    io::{self, BufReader, Write},
    path::PathBuf,
};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use dantalian::{fs::list_links, init_library, Library, TagMap};
use tracing::Level;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Root of the library,
    /// found from the working directory if not given
    #[arg(long, env = "DANTALIAN_ROOT")]
    root: Option<PathBuf>,

    /// Print operations taken by the program
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments starting with `//` are tagnames,
/// relative to the library root.
/// Other arguments are pathnames.
#[derive(Subcommand)]
enum Commands {
    /// Make a directory the root of a library
    Init {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Link a file or directory into tag directories
    ///
    /// A tag naming an existing directory links into it under a free name.
    /// Any other tag names the new link.
    Tag {
        file: String,
        #[clap(required = true, value_name = "TAG")]
        tags: Vec<String>,
    },
    /// Remove links to a file or directory from tag directories
    Untag {
        file: String,
        #[clap(required = true, value_name = "TAG")]
        tags: Vec<String>,
    },
    /// Create a new link to a file or directory
    Link { src: String, dst: String },
    /// Remove links, never the only reference to a directory
    Unlink {
        #[clap(required = true, value_name = "PATH")]
        paths: Vec<String>,
    },
    /// Move a link, keeping directory tags consistent
    Rename { src: String, dst: String },
    /// Rename every link to a file or directory
    RenameAll { file: String, name: String },
    /// Remove every link to files or directories
    UnlinkAll {
        #[clap(required = true, value_name = "FILE")]
        files: Vec<String>,
    },
    /// Move a directory to the location of a symlink to it
    Swap { path: String },
    /// List every link to a file or directory in the library
    ListLinks { file: String },
    /// List the tags of a file or directory
    Tags { file: String },
    /// Record the symlinks to directories in their dtags
    SaveDtags {
        /// Directory to search for symlinks
        #[arg(long, default_value = "//")]
        top: String,
        #[clap(required = true, value_name = "DIR")]
        dirs: Vec<String>,
    },
    /// Create the symlinks recorded in the dtags of directories
    LoadDtags {
        #[clap(required = true, value_name = "DIR")]
        dirs: Vec<String>,
    },
    /// Remove the symlinks recorded in the dtags of directories
    UnloadDtags {
        #[clap(required = true, value_name = "DIR")]
        dirs: Vec<String>,
    },
    /// Remove dangling symlinks
    Clean {
        #[arg(default_value = "//")]
        top: String,
    },
    /// List files matching a query
    ///
    /// `AND`, `OR` and `MINUS` open a group of queries closed by `END`.
    /// Any other word names a directory matching its entries.
    /// Prefix a name with `\` to take it verbatim.
    Search { query: String },
    /// Print the tags of every file and tagged directory as JSON
    Export {
        #[arg(default_value = "//")]
        top: String,
        /// Map to every link instead of tag directories
        #[arg(long)]
        full: bool,
    },
    /// Apply tags printed by `export`
    Import {
        /// JSON file to read, standard input if not given
        file: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        })
        .with_writer(io::stderr)
        .init();

    if let Commands::Init { path } = &args.command {
        return Ok(init_library(path)?);
    }
    let library = open_library(args.root)?;

    let mut stdout = io::stdout().lock();
    match args.command {
        Commands::Init { .. } => {}
        Commands::Tag { file, tags } => {
            for tag in tags {
                library.tag(&file, &tag)?;
            }
        }
        Commands::Untag { file, tags } => {
            for tag in tags {
                library.untag(&file, &tag)?;
            }
        }
        Commands::Link { src, dst } => library.link(library.resolve(&src), library.resolve(&dst))?,
        Commands::Unlink { paths } => {
            for path in paths {
                library.unlink(library.resolve(&path))?;
            }
        }
        Commands::Rename { src, dst } => {
            library.rename(library.resolve(&src), library.resolve(&dst))?
        }
        Commands::RenameAll { file, name } => {
            library.rename_all(&file, &name)?;
        }
        Commands::UnlinkAll { files } => {
            for file in files {
                library.unlink_all(&file)?;
            }
        }
        Commands::Swap { path } => library.swap_dir(library.resolve(&path))?,
        Commands::ListLinks { file } => {
            let target = library.resolve(&file);
            let links = list_links(library.root(), &target)
                .with_context(|| format!("Failed to list links to `{}`", target.display()))?;
            for link in links {
                writeln!(stdout, "{}", link.display())?;
            }
        }
        Commands::Tags { file } => {
            for tag in library.tags(&file)? {
                writeln!(stdout, "{tag}")?;
            }
        }
        Commands::SaveDtags { top, dirs } => {
            for dir in dirs {
                library.save_dtags(library.resolve(&top), library.resolve(&dir))?;
            }
        }
        Commands::LoadDtags { dirs } => {
            for dir in dirs {
                library.load_dtags(library.resolve(&dir))?;
            }
        }
        Commands::UnloadDtags { dirs } => {
            for dir in dirs {
                library.unload_dtags(library.resolve(&dir))?;
            }
        }
        Commands::Clean { top } => {
            for path in library.clean(&top)? {
                writeln!(stdout, "{}", path.display())?;
            }
        }
        Commands::Search { query } => {
            for path in library.search(&query)? {
                writeln!(stdout, "{}", path.display())?;
            }
        }
        Commands::Export { top, full } => {
            let map = library.export_tags(library.resolve(&top), full)?;
            serde_json::to_writer_pretty(&mut stdout, &map)?;
            writeln!(stdout)?;
        }
        Commands::Import { file } => {
            let map: TagMap = match file {
                Some(path) => {
                    let file = File::open(&path)
                        .with_context(|| format!("Failed to open `{}`", path.display()))?;
                    serde_json::from_reader(BufReader::new(file))?
                }
                None => serde_json::from_reader(io::stdin().lock())?,
            };
            library.import_tags(&map)?;
        }
    }

    Ok(())
}

fn open_library(root: Option<PathBuf>) -> anyhow::Result<Library> {
    match root {
        Some(root) => Library::open(&root)?
            .ok_or_else(|| anyhow!("`{}` is not a library", root.display())),
        None => Library::find(".")?
            .ok_or_else(|| anyhow!("Not in a library; run `dantalian init` to create one")),
    }
}
