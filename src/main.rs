use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::bail;
use color_eyre::Result;
use jtree_rs::graph::enumerate_chordal;
use jtree_rs::sample::{sample_naive, AdaptiveSampler};
use jtree_rs::scores::LocalScores;
use jtree_rs::solver::{MaxSolver, SolverConfig, SumSolver};
use jtree_rs::tree::TreeNode;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Parser)]
#[command(author, version, about = "MAP search and posterior sampling over junction trees of decomposable graphical models")]
struct Cli {
    /// Score file in DMST subset-score format
    score_file: PathBuf,

    /// Maximum clique size (defaults to the score file's subset bound)
    #[arg(short, long)]
    width: Option<u32>,

    /// Output sections per tree, any of: s (score), k (cliques and
    /// separators), t (tree), c (compact form), j (junction-tree count),
    /// r (rooted-tree count), m (adjacency matrix), d (dot graph)
    #[arg(short, long, default_value = "kst")]
    output: String,

    /// Suppress the header line before each output section
    #[arg(long)]
    no_headers: bool,

    /// Print information on computation progress
    #[arg(short, long)]
    verbose: bool,

    /// In sampling, print estimates of edge probabilities
    #[arg(short, long)]
    edge_estimates: bool,

    /// Use naive inverse-CDF sampling instead of the adaptive sampler
    #[arg(short, long)]
    naive: bool,

    /// Absolute tolerance used when backtracking the optimum
    #[arg(long, default_value_t = 1e-6)]
    tolerance: f64,

    /// Refuse to allocate DP tables above this many MiB
    #[arg(long)]
    max_memory_mib: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Find the maximum-a-posteriori junction tree (the default action)
    Max,

    /// Sample junction trees from the posterior
    Sample {
        /// Number of trees to draw
        #[arg(default_value_t = 1)]
        count: usize,
        /// RNG seed; wall-clock entropy when omitted
        seed: Option<u64>,
    },

    /// Parse and report a single tree given in the compact form
    Tree { compact: String },

    /// Parse and report every compact tree in a file, one per line
    File { path: PathBuf },

    /// Enumerate all decomposable graphs exactly (small instances only)
    Enum,
}

/// Which sections to print for each resulting tree.
struct OutputOptions {
    sections: Vec<char>,
    headers: bool,
}

impl OutputOptions {
    fn parse(flags: &str, headers: bool) -> Result<Self> {
        let mut sections = Vec::new();
        for c in flags.chars() {
            if !"sktcjrmd".contains(c) {
                bail!("unknown output flag: {c}");
            }
            sections.push(c);
        }
        Ok(Self { sections, headers })
    }

    fn header(&self, title: &str) {
        if self.headers {
            println!("====================================== {}", title);
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    simplelog::TermLogger::init(
        if cli.verbose { simplelog::LevelFilter::Debug } else { simplelog::LevelFilter::Info },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let output = OutputOptions::parse(&cli.output, !cli.no_headers)?;

    log::info!("input score file: {}", cli.score_file.display());
    let scores = LocalScores::parse(&fs::read_to_string(&cli.score_file)?)?;
    let n = scores.num_vars();

    let mut config = SolverConfig::new(cli.width.unwrap_or_else(|| scores.max_size()))
        .with_tolerance(cli.tolerance);
    if let Some(limit) = cli.max_memory_mib {
        config = config.with_memory_limit_mib(limit);
    }

    match cli.command.unwrap_or(Command::Max) {
        Command::Max => {
            let mut solver = MaxSolver::new(scores, config)?;
            log::info!("computing max tables...");
            let (best, tree) = solver.maximize();
            log::info!("optimum: {:.6}", best);
            emit(&tree, solver.scores(), n, &output);
        }

        Command::Sample { count, seed } => {
            let mut solver = SumSolver::new(scores, config)?;
            log::info!("computing sum tables...");
            let total = solver.partition_function();
            log::info!("total score: {:.6}", total);

            let mut rng = match seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::seed_from_u64(rand::random()),
            };

            sampling(&mut solver, &mut rng, count, cli.naive, cli.edge_estimates, &output);
        }

        Command::Tree { compact } => {
            let tree = TreeNode::parse_compact(&compact)?;
            emit(&tree, &scores, n, &output);
        }

        Command::File { path } => {
            for line in fs::read_to_string(&path)?.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match TreeNode::parse_compact(line) {
                    Ok(tree) => emit(&tree, &scores, n, &output),
                    Err(err) => log::error!("skipping `{line}`: {err}"),
                }
            }
        }

        Command::Enum => {
            log::info!("enumerating all decomposable graphs...");
            let result = enumerate_chordal(n, &scores);
            println!("Networks:     {}", result.count);
            println!("Total score:  {:.6}", result.total_score);
            println!("Edge probabilities:");
            for i in 0..n {
                for j in i + 1..n {
                    println!("{}-{}  {:.6}", i, j, result.edge_probability(i, j));
                }
            }
        }
    }

    Ok(())
}

fn sampling(
    solver: &mut SumSolver,
    rng: &mut ChaCha8Rng,
    count: usize,
    naive: bool,
    edge_estimates: bool,
    output: &OutputOptions,
) {
    let n = solver.num_vars() as usize;
    let mut adaptive = (!naive).then(|| AdaptiveSampler::new(solver));

    // Importance weights: each draw is a rooted partition tree, so a graph
    // is proposed (junction trees x nodes) times more often than its score
    // alone warrants.
    let mut weight_total = 0.0;
    let mut edge_graphs = vec![0u64; n * n];
    let mut edge_weights = vec![0.0f64; n * n];

    for _ in 0..count {
        let tree = match adaptive.as_mut() {
            Some(sampler) => sampler.sample(solver, rng),
            None => sample_naive(solver, rng),
        };

        emit(&tree, solver.scores(), n as u32, output);

        if edge_estimates {
            let weight = 1.0 / tree.count_rooted();
            weight_total += weight;

            let graph = tree.to_graph(n as u32);
            for i in 0..n {
                for j in i + 1..n {
                    if graph.has_edge(i as u32, j as u32) {
                        edge_graphs[i * n + j] += 1;
                        edge_weights[i * n + j] += weight;
                    }
                }
            }
        }
    }

    if edge_estimates {
        println!("total weight:  {:.6}", weight_total);
        println!(" edge    graphs    weight         estimate");
        for i in 0..n {
            for j in i + 1..n {
                let weight = edge_weights[i * n + j];
                let normalized = if weight_total > 0.0 { weight / weight_total } else { 0.0 };
                println!(
                    "{:2}-{:2}  {:8}   {:<14.6}  {:.6}",
                    i,
                    j,
                    edge_graphs[i * n + j],
                    weight,
                    normalized
                );
            }
        }
    }
}

/// Prints the selected output sections for one tree.
fn emit(tree: &TreeNode, scores: &LocalScores, n: u32, output: &OutputOptions) {
    // Shared lazily across sections.
    let mut junction_trees = None;
    let mut graph = None;

    for &section in &output.sections {
        match section {
            's' => {
                output.header("Score");
                println!("{:.6}", tree.score(scores));
            }
            'k' => {
                output.header("Cliques and separators");
                println!("Cliques:");
                for node in tree.iter() {
                    println!("{:16.6}  {}", scores.get(node.clique), node.clique);
                }
                println!("Separators:");
                for node in tree.iter().skip(1) {
                    println!("{:16.6}  {}", scores.get(node.separator), node.separator);
                }
            }
            't' => {
                output.header("Tree");
                print!("{}", tree.render());
            }
            'c' => {
                output.header("Compact");
                println!("{}", tree.to_compact());
            }
            'j' => {
                output.header("Junction trees");
                let count = *junction_trees.get_or_insert_with(|| tree.count_junction_trees());
                println!("{:.6}", count);
            }
            'r' => {
                output.header("Rooted junction trees");
                let count = *junction_trees.get_or_insert_with(|| tree.count_junction_trees());
                println!("{:.6}", count * tree.node_count() as f64);
            }
            'm' => {
                output.header("Adjacency matrix");
                let graph = graph.get_or_insert_with(|| tree.to_graph(n));
                print!("{}", graph.render_matrix());
            }
            'd' => {
                output.header(".dot");
                let graph = graph.get_or_insert_with(|| tree.to_graph(n));
                print!("{}", graph.to_dot().expect("writing to a String cannot fail"));
            }
            _ => unreachable!("output flags are validated at startup"),
        }
    }
}
