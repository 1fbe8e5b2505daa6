use std::sync::Arc;

use graphwalker::{build_from_edges, Config, Engine, GraphWalkerError, PersonalizedPageRank, StaticBlockStore, WalkManager};

fn write_static_block(dir: &std::path::Path, start: u32, beg_pos: &[u64], csr: &[u32]) {
    use std::io::Write;
    let base = dir.join(format!("block_{}", start));
    let mut beg_file = std::fs::File::create(base.with_extension("beg_pos")).unwrap();
    for &b in beg_pos {
        beg_file.write_all(&b.to_le_bytes()).unwrap();
    }
    let mut csr_file = std::fs::File::create(base.with_extension("csr")).unwrap();
    for &v in csr {
        csr_file.write_all(&v.to_le_bytes()).unwrap();
    }
}

fn single_block_triangle(dir: &std::path::Path) -> StaticBlockStore {
    let edges = dir.join("edges.txt");
    std::fs::write(&edges, "0 1\n1 2\n2 0\n").unwrap();
    build_from_edges(dir.join("store"), &edges, 1 << 20).unwrap()
}

fn run_ppr(
    store_dir: &std::path::Path,
    store: Arc<StaticBlockStore>,
    nverts: usize,
    config: Config,
    restart_prob: f64,
) -> Vec<u32> {
    let manager = WalkManager::new(
        &store_dir.join("walks"),
        config.exec_threads,
        store.num_blocks(),
        config.walk_buffer_size,
    )
    .unwrap();
    let kernel = PersonalizedPageRank::new(store.clone(), nverts, &config, restart_prob);
    let mut engine = Engine::new(store, manager, kernel, config).unwrap();
    engine.run().unwrap();
    assert_eq!(engine.manager().grand_total, 0, "run must leave no walk behind");
    engine.kernel().visit_counts()
}

/// A single walk around a 3-cycle with no restart and `L=3` visits each
/// vertex exactly once (hops 0,1,2 land on vertices 0,1,2): visit counts
/// `{0:1, 1:1, 2:1}`, matching S1 exactly since `L` counts hops and the walk
/// stops before the hop that would revisit the source.
#[test]
fn triangle_walk_matches_expected_visit_pattern() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(single_block_triangle(tmp.path()));
    let config = Config {
        max_walk_length: 3,
        num_sources: 1,
        walks_per_source: 1,
        exec_threads: 1,
        ..Config::default()
    };
    let counts = run_ppr(tmp.path(), store, 3, config, 0.0);
    assert_eq!(counts, vec![1, 1, 1]);
}

/// Two blocks `[0,2)` and `[2,4)` over `0->2, 1->3, 2->0, 3->1`: with no
/// restart, every hop from either block lands in the other block, so a
/// single walk bounces across the boundary on every hop.
#[test]
fn two_block_walk_crosses_boundary_every_hop() {
    let tmp = tempfile::tempdir().unwrap();
    let store_dir = tmp.path().join("store");
    std::fs::create_dir_all(&store_dir).unwrap();
    write_static_block(&store_dir, 0, &[0, 1, 2], &[2, 3]);
    write_static_block(&store_dir, 2, &[0, 1, 2], &[0, 1]);
    let store = Arc::new(StaticBlockStore::open(&store_dir, vec![0, 2, 4]));

    let config = Config {
        max_walk_length: 4,
        num_sources: 1,
        walks_per_source: 1,
        exec_threads: 1,
        ..Config::default()
    };
    let counts = run_ppr(&store_dir, store, 4, config, 0.0);
    // 4 visits total (hops 0..=3): vertex 0 at hops 0,2 and vertex 2 at
    // hops 1,3 — reachable only by crossing the block boundary on every hop.
    assert_eq!(counts, vec![2, 0, 2, 0]);
}

/// A star graph where every leaf's only neighbour is the centre forces
/// strict alternation; 1,000 walks seeded at the centre with `L=20` visit it
/// exactly `L/2` times each.
#[test]
fn star_graph_walks_alternate_and_centre_count_matches_formula() {
    let tmp = tempfile::tempdir().unwrap();
    let edges = tmp.path().join("edges.txt");
    let mut text = String::new();
    for leaf in 1..=99u32 {
        text.push_str(&format!("0 {}\n{} 0\n", leaf, leaf));
    }
    std::fs::write(&edges, text).unwrap();
    let store = Arc::new(build_from_edges(tmp.path().join("store"), &edges, 1 << 20).unwrap());

    let config = Config {
        max_walk_length: 20,
        first_source: 0,
        num_sources: 1,
        walks_per_source: 1000,
        exec_threads: 1,
        ..Config::default()
    };
    let counts = run_ppr(tmp.path(), store, 100, config, 0.0);

    let total_visits: u64 = counts.iter().map(|&c| c as u64).sum();
    assert_eq!(total_visits, 1000 * 20);
    assert_eq!(counts[0] as u64, 1000 * 10);
    let leaf_total: u64 = counts[1..].iter().map(|&c| c as u64).sum();
    assert_eq!(leaf_total, 1000 * 10);
}

/// A seed whose source id exceeds the 24-bit packed field must fail loudly
/// at seed time rather than silently truncate, and must not register any
/// partial walk.
#[test]
fn oversized_source_id_fails_at_seed_time_with_no_partial_state() {
    let tmp = tempfile::tempdir().unwrap();
    let mut manager = WalkManager::new(&tmp.path().join("walks"), 1, 1, 16).unwrap();
    let result = manager.seed(1 << 24, 0, 0);
    assert!(matches!(result, Err(GraphWalkerError::OverflowEncoding(_))));
    assert_eq!(manager.total_walks(0), 0);
    assert_eq!(manager.grand_total, 0);
}

/// `L = 0` yields exactly one visit per walk and no block transitions.
#[test]
fn zero_hop_length_yields_single_visit_per_walk() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(single_block_triangle(tmp.path()));
    let config = Config {
        max_walk_length: 0,
        num_sources: 1,
        walks_per_source: 5,
        exec_threads: 1,
        ..Config::default()
    };
    let counts = run_ppr(tmp.path(), store, 3, config, 0.0);
    assert_eq!(counts, vec![5, 0, 0]);
}

/// Choosing a block never selects an empty one while any block holds walks,
/// under every selection policy, exercised here end-to-end through a
/// multi-block run rather than directly against the manager (see
/// `walk::manager` unit tests for the direct check).
#[test]
fn multi_block_run_completes_under_every_policy() {
    use graphwalker::BlockSelectionPolicy;
    for policy in [
        BlockSelectionPolicy::MinStep,
        BlockSelectionPolicy::MaxWalks,
        BlockSelectionPolicy::MaxWeight,
        BlockSelectionPolicy::Random,
        BlockSelectionPolicy::Mixed { prob: 0.5 },
    ] {
        let tmp = tempfile::tempdir().unwrap();
        let store_dir = tmp.path().join("store");
        std::fs::create_dir_all(&store_dir).unwrap();
        write_static_block(&store_dir, 0, &[0, 1, 2], &[2, 3]);
        write_static_block(&store_dir, 2, &[0, 1, 2], &[0, 1]);
        let store = Arc::new(StaticBlockStore::open(&store_dir, vec![0, 2, 4]));

        let config = Config {
            max_walk_length: 10,
            num_sources: 2,
            walks_per_source: 20,
            exec_threads: 2,
            policy,
            ..Config::default()
        };
        let counts = run_ppr(&store_dir, store, 4, config, 0.1);
        let total: u64 = counts.iter().map(|&c| c as u64).sum();
        assert_eq!(total, 2 * 20 * 10, "policy {:?} must visit every hop of every walk", policy);
    }
}
