use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::process;
use supersize::archive::ArchiveOptions;
use supersize::cmd;

/// Binary size analysis for Android apps and native libraries
///
/// supersize attributes every byte of an APK or shared library to a symbol
/// and a source file, stores the result as a .size snapshot, and diffs
/// snapshots to explain size changes.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable emoji output (useful for CI/CD or accessibility)
    #[arg(long, global = true)]
    no_emoji: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a .size snapshot
    Archive {
        /// Output file (must end in .size)
        #[arg(value_name = "SIZE_FILE")]
        size_file: PathBuf,

        /// APK to measure
        #[arg(long)]
        apk_file: Option<PathBuf>,

        /// Unstripped native library described by --symbols-file
        #[arg(long)]
        elf_file: Option<PathBuf>,

        /// JSON symbol dump of the native library
        #[arg(long)]
        symbols_file: Option<PathBuf>,

        /// Build output directory (enables source attribution)
        #[arg(long)]
        output_directory: Option<PathBuf>,

        /// Output the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare two .size snapshots
    Diff {
        /// Before snapshot
        before: PathBuf,

        /// After snapshot
        after: PathBuf,

        /// Number of changes to list (default from .supersize.toml)
        #[arg(short = 'n', long)]
        top: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the members of an ar archive
    Ar {
        /// Archive to read
        archive: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace thin archives in a list of linker inputs with their members
    ExpandThin {
        /// Build output directory the paths are relative to
        #[arg(long)]
        output_directory: PathBuf,

        /// Linker inputs
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Map object paths to source files using the build's ninja files
    Sources {
        /// Build output directory containing build.ninja
        #[arg(long)]
        output_directory: PathBuf,

        /// Also print the link inputs of this library
        #[arg(long)]
        elf_file: Option<PathBuf>,

        /// Object paths (`obj/foo.o` or `obj/libfoo.a(foo.o)`)
        paths: Vec<String>,
    },

    /// Attribute an APK's dex bytes to packages, classes and methods
    Dex {
        /// APK to analyze
        apk: PathBuf,

        /// Build output directory (for jar source info)
        #[arg(long)]
        output_directory: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count methods, fields and strings in dex files
    MethodCount {
        /// A .dex file or a zip container (.apk, .jar, .aab)
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default .supersize.toml
    Init,

    /// Check that external tools are installed
    Tools,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn main() {
    let cli = Cli::parse();

    init_logger(cli.verbose);

    if cli.no_emoji {
        std::env::set_var("NO_EMOJI", "1");
    }

    let result = match &cli.command {
        Some(Commands::Archive {
            size_file,
            apk_file,
            elf_file,
            symbols_file,
            output_directory,
            json,
        }) => {
            let options = ArchiveOptions {
                apk_path: apk_file.as_deref().map(absolute),
                elf_path: elf_file.as_deref().map(absolute),
                symbols_path: symbols_file.as_deref().map(absolute),
                output_directory: output_directory.as_deref().map(absolute),
            };
            cmd::cmd_archive(size_file, &options, *json)
        }
        Some(Commands::Diff {
            before,
            after,
            top,
            json,
        }) => cmd::cmd_diff(before, after, *top, *json),
        Some(Commands::Ar { archive, json }) => cmd::cmd_ar(archive, *json),
        Some(Commands::ExpandThin {
            output_directory,
            paths,
        }) => cmd::cmd_expand_thin(output_directory, paths),
        Some(Commands::Sources {
            output_directory,
            elf_file,
            paths,
        }) => cmd::cmd_sources(output_directory, elf_file.as_deref(), paths),
        Some(Commands::Dex {
            apk,
            output_directory,
            json,
        }) => cmd::cmd_dex(apk, output_directory.as_deref(), *json),
        Some(Commands::MethodCount { file, json }) => cmd::cmd_method_count(file, *json),
        Some(Commands::Init) => cmd::cmd_init(),
        Some(Commands::Tools) => cmd::cmd_tools(),
        Some(Commands::Completions { shell }) => {
            cmd::cmd_completions(*shell, &mut Cli::command());
            Ok(())
        }
        None => {
            println!("supersize v{}", env!("CARGO_PKG_VERSION"));
            println!("Binary size analysis for Android apps and native libraries\n");
            println!("Usage: supersize <COMMAND>\n");
            println!("Commands:");
            println!("  archive       Create a .size snapshot");
            println!("  diff          Compare two .size snapshots");
            println!("  ar            List the members of an ar archive");
            println!("  expand-thin   Expand thin archives in linker inputs");
            println!("  sources       Map object paths to source files");
            println!("  dex           Attribute dex bytes of an APK");
            println!("  method-count  Count methods in dex files");
            println!("  init          Write a default .supersize.toml");
            println!("  tools         Check external tools");
            println!("\nRun 'supersize <COMMAND> --help' for more information on a command.");
            Ok(())
        }
    };

    if let Err(e) = result {
        use supersize::error::ErrorFormatter;
        eprintln!("{}", ErrorFormatter::format(&e));
        let exit_code = ErrorFormatter::exit_code(&e);
        process::exit(exit_code);
    }
}
