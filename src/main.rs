use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use seqanchor::anchor::{
    chain_to_gap_intervals, save_anchors_to_csv, save_intervals_to_csv, AnchorFinder, Interval,
};
use seqanchor::index::{AnchorIndex, Concatenation};
use seqanchor::io::fasta_reader::load_sequence;
use seqanchor::opts::AnchorOpts;

#[derive(Parser)]
#[command(name = "seqanchor")]
#[command(about = "Anchor-based pairwise aligner core - finds a chain of rare exact matches between two DNA sequences", long_about = None)]
#[command(version)]
struct Cli {
    /// Reference FASTA file (first sequence)
    #[arg(value_name = "REF.FA")]
    reference: PathBuf,

    /// Query FASTA file (second sequence)
    #[arg(value_name = "QUERY.FA")]
    query: PathBuf,

    /// Output directory for the anchor CSV files
    #[arg(short = 'o', long, value_name = "DIR", default_value = "seqanchor_out")]
    output_dir: PathBuf,

    /// Number of worker threads (default: all available cores; 0 runs inline)
    #[arg(short = 't', long, value_name = "INT")]
    threads: Option<usize>,

    /// Cap on the LCP window width searched for rare matches
    #[arg(short = 'm', long, value_name = "INT", default_value = "100")]
    max_match_count: usize,

    /// Load the index cache instead of rebuilding when possible
    #[arg(long)]
    load_cache: bool,

    /// Do not write the index cache after building
    #[arg(long)]
    no_save_cache: bool,

    /// Path of the index cache blob (default: <output-dir>/save/anchor_index.bin)
    #[arg(long, value_name = "FILE")]
    cache_path: Option<PathBuf>,

    /// Verbose level: 1=error, 2=warning, 3=message, 4+=debugging
    #[arg(short = 'v', long, value_name = "INT", default_value = "3")]
    verbosity: i32,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    // Default to all cores, with a sanity cap against accidental
    // oversubscription.
    let mut num_threads = cli.threads.unwrap_or_else(num_cpus::get);
    let max_threads = num_cpus::get() * 2;
    if num_threads > max_threads {
        log::warn!(
            "Thread count {} exceeds recommended maximum {}, capping at {}",
            num_threads,
            max_threads,
            max_threads
        );
        num_threads = max_threads;
    }

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build_global()
    {
        log::warn!("Failed to configure thread pool: {} (may already be initialized)", e);
    }

    let thread_word = if num_threads == 1 { "thread" } else { "threads" };
    log::info!("Using {} {}", num_threads, thread_word);

    if let Err(e) = std::fs::create_dir_all(&cli.output_dir) {
        log::error!("Cannot create output directory {}: {}", cli.output_dir.display(), e);
        std::process::exit(1);
    }

    let cache_path = cli
        .cache_path
        .clone()
        .unwrap_or_else(|| cli.output_dir.join("save").join("anchor_index.bin"));

    let opts = AnchorOpts {
        thread_num: num_threads,
        max_match_count: cli.max_match_count,
        load_cache: cli.load_cache,
        save_cache: !cli.no_save_cache,
        cache_path,
    };

    if let Err(e) = run(&cli, opts) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, opts: AnchorOpts) -> seqanchor::error::Result<()> {
    let reference = load_sequence(&cli.reference)?;
    let query = load_sequence(&cli.query)?;
    log::info!("The first sequence length is {}", reference.len());
    log::info!("The second sequence length is {}", query.len());

    let concat = Concatenation::new(&reference.seq, &query.seq)?;
    let index = Arc::new(AnchorIndex::obtain(concat, &opts)?);
    let first_len = index.first_len();

    let second_len = index.second_len();
    let finder = AnchorFinder::new(index, opts);

    let first_chain = finder.first_level_chain();
    save_anchors_to_csv(
        &first_chain,
        &cli.output_dir.join("first_anchor.csv"),
        first_len,
    )?;

    let final_anchors = finder.launch_anchor_searching()?;
    save_anchors_to_csv(
        &final_anchors,
        &cli.output_dir.join("final_anchor.csv"),
        first_len,
    )?;

    // Gap intervals an exact aligner would still have to fill
    let root_interval = Interval::new(0, first_len, 0, second_len);
    let gaps = chain_to_gap_intervals(&final_anchors, &root_interval, first_len)?;
    save_intervals_to_csv(&gaps, &cli.output_dir.join("intervals_need_align.csv"))?;

    for anchor in finder.localize(&final_anchors) {
        println!(
            "{}\t{}\t{}",
            anchor.first_pos, anchor.second_pos, anchor.match_length
        );
    }

    Ok(())
}
