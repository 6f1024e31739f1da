use clap::{Parser, Subcommand};
use gents::files_handling::read_input;
use gents::{tools, Config, Evaluation, Similarity, SynonymGroups};
use rand::thread_rng;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// query tools over a finished matrix, loaded read-only from its row label
// file and its row-major file

#[derive(Parser, Debug)]
#[command(name = "relatedness", version)]
struct Cli {
    /// Optional json file with numeric parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Top k neighbours of every word of the input file
    Neighbours {
        rlabel: PathBuf,
        row_matrix: PathBuf,
        k: usize,
        input: PathBuf,
        output: PathBuf,
        /// Defaults to the configured thread count
        threads: Option<usize>,
    },
    /// Cosine of `word1 word2 gold` pairs
    Pairs {
        rlabel: PathBuf,
        row_matrix: PathBuf,
        input: PathBuf,
        output: PathBuf,
    },
    /// Scores of `target candidate1 candidate2` triples
    Pick {
        rlabel: PathBuf,
        row_matrix: PathBuf,
        input: PathBuf,
        output: PathBuf,
    },
    /// Rank of the first related neighbour per term frequency
    Evaluate {
        rlabel: PathBuf,
        row_matrix: PathBuf,
        row_features: PathBuf,
        training: PathBuf,
        output: PathBuf,
        #[arg(long)]
        max_frequency: Option<usize>,
        #[arg(long)]
        samples: Option<usize>,
        #[arg(long)]
        list_size: Option<usize>,
        /// Words never drawn as queries
        #[arg(long)]
        stopwords: Option<PathBuf>,
    },
}

fn run(cli: Cli) -> gents::Result<()> {

    let params = Config::new(cli.config.as_deref())?.get_params();

    match cli.command {
        Command::Neighbours { rlabel, row_matrix, k, input, output, threads } => {
            let similarity = Similarity::load(&rlabel, &row_matrix)?;
            let threads = threads.unwrap_or(params.threads);
            let written = tools::neighbours(&similarity, &input, &output, k, threads)?;
            info!("wrote {} neighbour lists to {}", written, output.display());
        }
        Command::Pairs { rlabel, row_matrix, input, output } => {
            let similarity = Similarity::load(&rlabel, &row_matrix)?;
            let written = tools::pairs(&similarity, &input, &output)?;
            info!("wrote {} pairs to {}", written, output.display());
        }
        Command::Pick { rlabel, row_matrix, input, output } => {
            let similarity = Similarity::load(&rlabel, &row_matrix)?;
            let written = tools::pick(&similarity, &input, &output)?;
            info!("wrote {} choices to {}", written, output.display());
        }
        Command::Evaluate { rlabel, row_matrix, row_features, training, output, max_frequency, samples, list_size, stopwords } => {
            let mut evaluation = params.evaluation;
            evaluation.max_frequency = max_frequency.unwrap_or(evaluation.max_frequency);
            evaluation.samples = samples.unwrap_or(evaluation.samples);
            evaluation.list_size = list_size.unwrap_or(evaluation.list_size);
            println!("{}", evaluation);

            let similarity = Similarity::load(&rlabel, &row_matrix)?;
            let oracle: SynonymGroups = read_input(&training)?;
            let rows: Vec<gents::FeatureRecord> = read_input(&row_features)?;
            let stop_words: HashSet<String> = match stopwords {
                Some(path) => read_input(&path)?,
                None => HashSet::new(),
            };

            let evaluation = Evaluation::new(&similarity, &oracle, &rows, &stop_words, evaluation);
            let scores = tools::evaluate(&evaluation, &output, &mut thread_rng())?;
            for score in &scores {
                println!("{}", score);
            }
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
