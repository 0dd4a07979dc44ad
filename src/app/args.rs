use clap::{Parser, Subcommand};
use mushguard::file::MODEL_ROOT;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze mushroom photographs
    Analyze {
        /// Image files or directories of images
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Directory holding the three models and their model cards
        #[arg(short, long, env = "MUSHGUARD_MODELS", default_value = MODEL_ROOT)]
        models: PathBuf,

        /// Species table CSV (`label,lifespan,preservation`); the built-in table is used otherwise
        #[arg(short, long)]
        species: Option<PathBuf>,

        /// SQLite database to record the analyses in
        #[arg(long)]
        db: Option<PathBuf>,

        /// Number of images analyzed concurrently
        #[arg(short, long, default_value_t = num_cpus::get())]
        jobs: usize,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Verify and load the models, then print their input and output details
    Check {
        /// Directory holding the three models and their model cards
        #[arg(short, long, env = "MUSHGUARD_MODELS", default_value = MODEL_ROOT)]
        models: PathBuf,
    },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_analyze() {
        let args = Args::try_parse_from([
            "mushguard", "analyze", "--models", "/srv/models", "--jobs", "2", "a.jpg", "photos",
        ])
        .unwrap();

        match args.command {
            Commands::Analyze {
                paths,
                models,
                species,
                db,
                jobs,
                pretty,
            } => {
                assert_eq!(paths, vec![PathBuf::from("a.jpg"), PathBuf::from("photos")]);
                assert_eq!(models, PathBuf::from("/srv/models"));
                assert_eq!(jobs, 2);
                assert!(species.is_none());
                assert!(db.is_none());
                assert!(!pretty);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_analyze_requires_paths() {
        assert!(Args::try_parse_from(["mushguard", "analyze"]).is_err());
    }
}
