use std::process;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use graphwalker::{
    build_from_edges, config::parse_size_suffix, Config, Engine, PersonalizedPageRank,
    StaticBlockStore, WalkManager,
};
use graphwalker::walk::manager::BlockSelectionPolicy;

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    MinStep,
    MaxWalks,
    MaxWeight,
    Random,
    Mixed,
}

fn resolve_policy(arg: PolicyArg, prob: f64) -> BlockSelectionPolicy {
    match arg {
        PolicyArg::MinStep => BlockSelectionPolicy::MinStep,
        PolicyArg::MaxWalks => BlockSelectionPolicy::MaxWalks,
        PolicyArg::MaxWeight => BlockSelectionPolicy::MaxWeight,
        PolicyArg::Random => BlockSelectionPolicy::Random,
        PolicyArg::Mixed => BlockSelectionPolicy::Mixed { prob },
    }
}

#[derive(Parser)]
#[command(about = "Walk-centric execution engine for massive random walks over out-of-core graphs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition a plain-text edge list into on-disk CSR blocks
    Build {
        /// Input edge list (`src dst` per line)
        file: String,

        /// Output store directory
        #[arg(long, default_value = "graphwalker_data")]
        out: String,

        /// Target maximum bytes per CSR block; accepts k/M/G suffix
        #[arg(long, default_value = "67108864", value_parser = parse_size_suffix)]
        blocksize: usize,
    },

    /// Run the PersonalizedPageRank demo kernel against a built store
    Run {
        /// Store directory produced by `build`
        store: String,

        /// Number of vertices in the graph
        #[arg(long)]
        nvertices: usize,

        /// First seed vertex id
        #[arg(long, default_value_t = 0)]
        firstsource: u32,

        /// Number of seed vertices
        #[arg(long, default_value_t = 1)]
        numsources: u32,

        /// Walks started per source
        #[arg(long, default_value_t = 1000)]
        walkspersource: u32,

        /// Per-walk hop bound
        #[arg(long, default_value_t = 20)]
        maxwalklength: u16,

        /// Restart probability per hop
        #[arg(long, default_value_t = 0.15)]
        restart: f64,

        /// Probability of the min-hop policy vs max-walks, under `mixed`
        #[arg(long, default_value_t = 0.2)]
        prob: f64,

        /// Block-selection policy
        #[arg(long, value_enum, default_value_t = PolicyArg::Mixed)]
        policy: PolicyArg,

        /// Number of parallel execution threads
        #[arg(long, default_value_t = 1)]
        execthreads: usize,

        /// In-memory walk-bucket capacity per (thread, block) before spill
        #[arg(long, default_value_t = graphwalker::config::DEFAULT_WALK_BUFFER_SIZE)]
        walk_buffer_size: usize,

        /// Number of top vertices to print
        #[arg(long, default_value_t = 20)]
        topk: usize,

        /// Raise logging verbosity
        #[arg(long)]
        verbose: bool,
    },

    /// Print block/group layout statistics for a built store
    Info {
        /// Store directory produced by `build`
        store: String,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn die(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("error: {}: {}", context, err);
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { file, out, blocksize } => {
            init_logging(false);
            let t0 = Instant::now();
            let store = build_from_edges(&out, &file, blocksize)
                .unwrap_or_else(|e| die(&format!("building store from {}", file), e));
            println!(
                "Built {} block(s) from {} into {} ({:.3}s)",
                store.num_blocks(),
                file,
                out,
                t0.elapsed().as_secs_f64()
            );
        }

        Commands::Run {
            store,
            nvertices,
            firstsource,
            numsources,
            walkspersource,
            maxwalklength,
            restart,
            prob,
            policy,
            execthreads,
            walk_buffer_size,
            topk,
            verbose,
        } => {
            init_logging(verbose);

            // The boundary list is rediscovered from the store directory by
            // probing for `block_*.beg_pos` files; a production build would
            // persist it alongside the blocks, but this keeps `run` usable
            // against whatever `build` just wrote without a second format.
            let boundaries = discover_boundaries(&store, nvertices)
                .unwrap_or_else(|e| die(&format!("reading store {}", store), e));
            let block_store = Arc::new(StaticBlockStore::open(&store, boundaries));

            let config = Config {
                base_path: store.clone().into(),
                exec_threads: execthreads,
                policy: resolve_policy(policy, prob),
                first_source: firstsource,
                num_sources: numsources,
                walks_per_source: walkspersource,
                max_walk_length: maxwalklength,
                walk_buffer_size,
                ..Config::default()
            };
            if let Err(e) = config.validate() {
                die("invalid configuration", e);
            }

            let walks_dir = std::path::Path::new(&store).join("walks");
            let manager = WalkManager::new(&walks_dir, execthreads, block_store.num_blocks(), walk_buffer_size)
                .unwrap_or_else(|e| die("creating walk manager", e));
            let kernel = PersonalizedPageRank::new(block_store.clone(), nvertices, &config, restart);

            let mut engine = Engine::new(block_store, manager, kernel, config)
                .unwrap_or_else(|e| die("creating engine", e));

            let t0 = Instant::now();
            if let Err(e) = engine.run() {
                die("running engine", e);
            }
            println!("Completed in {:.3}s", t0.elapsed().as_secs_f64());

            let counts = engine.kernel().visit_counts();
            let mut order: Vec<usize> = (0..counts.len()).collect();
            order.sort_unstable_by(|&a, &b| counts[b].cmp(&counts[a]));
            println!("Top {} vertices by visit count:", topk);
            for &v in order.iter().take(topk) {
                println!("  {:>10}  {:>10}", v, counts[v]);
            }
        }

        Commands::Info { store } => {
            let boundaries = discover_boundaries(&store, 0)
                .unwrap_or_else(|e| die(&format!("reading store {}", store), e));
            let block_store = StaticBlockStore::open(&store, boundaries);
            println!("Store:       {}", store);
            println!("Blocks:      {}", block_store.num_blocks());
            for p in 0..block_store.num_blocks() as u32 {
                let (lo, hi) = block_store.range(p);
                match block_store.load_block(p) {
                    Ok(csr) => println!(
                        "  block {:>4} [{:>10}, {:>10}): {:>10} edges",
                        p, lo, hi, csr.n_edges()
                    ),
                    Err(e) => println!("  block {:>4} [{:>10}, {:>10}): error: {}", p, lo, hi, e),
                }
            }
        }
    }
}

/// Rediscover a static store's block boundaries by listing `block_*.beg_pos`
/// files and sorting their start offsets, falling back to a single
/// `[0, nvertices)` block if none are found (an empty graph).
fn discover_boundaries(store_dir: &str, nvertices: usize) -> std::io::Result<Vec<u32>> {
    let mut starts: Vec<u32> = Vec::new();
    if let Ok(entries) = std::fs::read_dir(store_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(rest) = name.strip_prefix("block_").and_then(|r| r.strip_suffix(".beg_pos")) {
                if let Ok(start) = rest.parse::<u32>() {
                    starts.push(start);
                }
            }
        }
    }
    starts.sort_unstable();
    if starts.is_empty() {
        return Ok(vec![0, nvertices as u32]);
    }
    starts.push(nvertices as u32);
    Ok(starts)
}
