use clap::{Parser, Subcommand};
use gents::{BuildRequest, Config, Measure, Pipeline, Pos, SupervisedRequest};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Builds word-context matrices and reweights their features.
#[derive(Parser, Debug)]
#[command(name = "gents", version)]
struct Cli {
    /// Optional json file with numeric parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count word/context pairs of corpus files into a new matrix directory
    Build {
        pos: Pos,
        out_dir: PathBuf,
        name: String,
        min_term: usize,
        min_context: usize,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Corpus is POS-tagged running text instead of dependency triples
        #[arg(long)]
        tagged: bool,
        #[arg(long, default_value_t = 5, requires = "tagged")]
        window: usize,
    },
    /// Reweight every cell by its own association with its row and column
    Unsupervised {
        measure: Measure,
        row_matrix: PathBuf,
        column_matrix: PathBuf,
    },
    /// Weight each context by how well it separates related training pairs
    Context {
        measure: Measure,
        training: PathBuf,
        row_features: PathBuf,
        row_matrix: PathBuf,
        column_matrix: PathBuf,
        #[arg(long)]
        exempt: Option<PathBuf>,
    },
    /// Same as context, with one weight per relation shared by its columns
    Relation {
        measure: Measure,
        training: PathBuf,
        row_features: PathBuf,
        row_matrix: PathBuf,
        column_matrix: PathBuf,
        boundary: PathBuf,
        #[arg(long)]
        exempt: Option<PathBuf>,
    },
}

fn run(cli: Cli) -> gents::Result<()> {

    let params = Config::new(cli.config.as_deref())?.get_params();
    println!("{}", params);

    match cli.command {
        Command::Build { pos, out_dir, name, min_term, min_context, files, tagged, window } => {
            let request = BuildRequest {
                pos,
                out_dir,
                name,
                min_term_partners: min_term,
                min_context_partners: min_context,
                files,
                window: tagged.then_some(window),
            };
            Pipeline::build(&request, &params)?;
        }
        Command::Unsupervised { measure, row_matrix, column_matrix } => {
            Pipeline::unsupervised(measure, &row_matrix, &column_matrix, &params)?;
        }
        Command::Context { measure, training, row_features, row_matrix, column_matrix, exempt } => {
            let request = SupervisedRequest { measure, training, row_features, row_matrix, column_matrix, exempt };
            Pipeline::context(&request, &params)?;
        }
        Command::Relation { measure, training, row_features, row_matrix, column_matrix, boundary, exempt } => {
            let request = SupervisedRequest { measure, training, row_features, row_matrix, column_matrix, exempt };
            Pipeline::relation(&request, &boundary, &params)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
