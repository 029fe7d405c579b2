use clap::{Parser, Subcommand};
use emix::cli::{
    default_output_dir, demix_path, list_dir, mix_path, resolve_secret, stat_file, DemixOptions,
    KeySource, ListOptions, MixMode, MixOptions, StatOptions,
};
use emix::EmixError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Version info from build.rs
const VERSION: &str = env!("EMIX_VERSION");
const PROFILE: &str = env!("EMIX_PROFILE");
const GIT_HASH: &str = env!("EMIX_GIT_HASH");

fn get_version() -> &'static str {
    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} {} ({})", PROFILE, VERSION, GIT_HASH))
}

#[derive(Parser)]
#[command(name = "emix")]
#[command(author, about = "Disguise files as ZIP archives, with optional encryption", long_about = None)]
struct Cli {
    /// Print version
    #[arg(short = 'V', long)]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Wrap a file, or every file under a directory, into emix containers
    #[command(alias = "domix")]
    Mix {
        /// File or directory to mix
        path: PathBuf,

        /// 0: plain, 1: encrypt file info, 2: encrypt file info and content
        #[arg(short = 't', long = "type", default_value = "0", value_parser = parse_mode)]
        mix_type: MixMode,

        /// Prompt for a password (1-16 bytes)
        #[arg(short, long)]
        password: bool,

        /// Derive the secret from this file
        #[arg(short, long, conflicts_with = "password")]
        credential_file: Option<PathBuf>,

        /// Store a fresh random secret in each container
        #[arg(long, conflicts_with_all = ["password", "credential_file"])]
        embed_password: bool,

        /// Output directory [default: emix_<date time>]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Glob patterns of paths to skip
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Do not print processed files
        #[arg(short, long)]
        silence: bool,
    },

    /// Restore the original files from emix containers
    Demix {
        /// Container file or directory
        path: PathBuf,

        /// Prompt for a password
        #[arg(short, long)]
        password: bool,

        /// Derive the secret from this file
        #[arg(short, long, conflicts_with = "password")]
        credential_file: Option<PathBuf>,

        /// Output directory [default: emix_<date time>]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Glob patterns of paths to skip
        #[arg(short, long, default_value = ".*")]
        exclude: Vec<String>,

        /// Do not print processed files
        #[arg(short, long)]
        silence: bool,
    },

    /// List the containers in a directory
    Ls {
        /// Directory to list
        dir: PathBuf,

        /// Prompt for a password
        #[arg(short, long)]
        password: bool,

        /// Derive the secret from this file
        #[arg(short, long, conflicts_with = "password")]
        credential_file: Option<PathBuf>,

        /// Show mode, size and modification time
        #[arg(short, long)]
        long: bool,
    },

    /// Show the file info stored in a container
    Stat {
        /// Container file
        file: PathBuf,

        /// Prompt for a password
        #[arg(short, long)]
        password: bool,

        /// Derive the secret from this file
        #[arg(short, long, conflicts_with = "password")]
        credential_file: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print version
    Version,
}

fn parse_mode(s: &str) -> Result<MixMode, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> emix::Result<()> {
    match command {
        Commands::Mix {
            path,
            mix_type,
            password,
            credential_file,
            embed_password,
            output,
            exclude,
            silence,
        } => {
            if mix_type == MixMode::Plain && (password || credential_file.is_some() || embed_password) {
                return Err(EmixError::InvalidOptions(
                    "type 0 takes no password, credential file or embedded password".into(),
                ));
            }
            let key = match resolve_secret(password, credential_file.as_deref(), true)? {
                Some(secret) => KeySource::Secret(secret),
                None if embed_password => KeySource::Embedded,
                None => KeySource::None,
            };
            let options = MixOptions {
                mode: mix_type,
                key,
                output: output.unwrap_or_else(default_output_dir),
                excludes: exclude,
                silence,
            };

            let mixed = mix_path(&path, &options)?;
            if !silence {
                println!("Mixed {} files into {}", mixed.len(), options.output.display());
            }
            Ok(())
        }

        Commands::Demix {
            path,
            password,
            credential_file,
            output,
            exclude,
            silence,
        } => {
            let options = DemixOptions {
                secret: resolve_secret(password, credential_file.as_deref(), false)?,
                output: output.unwrap_or_else(default_output_dir),
                excludes: exclude,
                silence,
            };

            let restored = demix_path(&path, &options)?;
            if !silence {
                println!("Restored {} files into {}", restored.len(), options.output.display());
            }
            Ok(())
        }

        Commands::Ls {
            dir,
            password,
            credential_file,
            long,
        } => {
            let options = ListOptions {
                secret: resolve_secret(password, credential_file.as_deref(), false)?,
                long,
            };
            print!("{}", list_dir(&dir, &options)?);
            Ok(())
        }

        Commands::Stat {
            file,
            password,
            credential_file,
            json,
        } => {
            let options = StatOptions {
                secret: resolve_secret(password, credential_file.as_deref(), false)?,
                json,
            };
            print!("{}", stat_file(&file, &options)?);
            Ok(())
        }

        Commands::Version => {
            println!("emix {}", get_version());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Handle --version flag
    if cli.version {
        println!("emix {}", get_version());
        return ExitCode::SUCCESS;
    }

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            use clap::CommandFactory;
            if Cli::command().print_help().is_ok() {
                println!();
            }
            return ExitCode::SUCCESS;
        }
    };

    init_logging();

    match run(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
