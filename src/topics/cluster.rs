// Density-based clustering (HDBSCAN) over reduced document vectors.
//
// The number of topics is not known ahead of time, so we let density decide:
// build the mutual-reachability minimum spanning tree, turn it into a
// single-linkage hierarchy, condense that hierarchy at `min_cluster_size`,
// and keep the most stable clusters (excess of mass). Points that never
// belong to a kept cluster get the NOISE id.

use tracing::{debug, warn};

/// Cluster id for points that don't belong to any dense region.
pub const NOISE: i32 = -1;

/// Above this many points the dense distance matrix (8·n² bytes, ~200 MB
/// here) gets large enough to be worth a warning.
pub const LARGE_BATCH_POINTS: usize = 5_000;

/// HDBSCAN parameters.
#[derive(Debug, Clone, Copy)]
pub struct ClusterEngine {
    /// Smallest group that counts as a cluster (at least 2).
    pub min_cluster_size: usize,
    /// Neighbourhood size for core distances, counting the point itself.
    /// 1 means plain single linkage.
    pub min_samples: usize,
}

impl Default for ClusterEngine {
    fn default() -> Self {
        Self {
            min_cluster_size: 2,
            min_samples: 1,
        }
    }
}

/// A merge in the single-linkage hierarchy. Node ids below `n` are points;
/// merge `k` has node id `n + k`.
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

/// A cluster in the condensed tree.
struct CondensedCluster {
    parent: Option<usize>,
    birth: f64,
    stability: f64,
    children: Vec<usize>,
}

impl ClusterEngine {
    pub fn new(min_cluster_size: usize, min_samples: usize) -> Self {
        Self {
            min_cluster_size: min_cluster_size.max(2),
            min_samples: min_samples.max(1),
        }
    }

    /// Assign a cluster id (or [`NOISE`]) to every point, in input order.
    ///
    /// Cluster ids are numbered from 0 in order of each cluster's first
    /// member. They only mean something within one call.
    ///
    /// Holds the full n×n distance matrix, so memory is O(n²) and time
    /// O(n²) for the spanning tree. Batches of a few thousand documents are
    /// the intended size; use `--limit` for larger stores.
    pub fn fit(&self, points: &[Vec<f64>]) -> Vec<i32> {
        let n = points.len();
        if n < 2 {
            return vec![NOISE; n];
        }
        if exceeds_batch_limit(n) {
            warn!(
                points = n,
                matrix_mb = distance_matrix_bytes(n) / (1024 * 1024),
                "Large clustering batch, distance matrix is quadratic in size"
            );
        }

        let distances = pairwise_distances(points);
        let core = core_distances(&distances, self.min_samples.max(1));
        let mst = minimum_spanning_tree(&distances, &core);
        let merges = single_linkage(n, mst);
        let (clusters, fell_from) = condense(n, &merges, self.min_cluster_size.max(2));
        let selected = select_clusters(&clusters);

        let labels = label_points(&clusters, &fell_from, &selected);
        debug!(
            points = n,
            clusters = labels.iter().filter(|&&l| l != NOISE).max().map_or(0, |m| m + 1),
            noise = labels.iter().filter(|&&l| l == NOISE).count(),
            "HDBSCAN finished"
        );
        labels
    }
}

fn exceeds_batch_limit(n: usize) -> bool {
    n > LARGE_BATCH_POINTS
}

fn distance_matrix_bytes(n: usize) -> usize {
    n.saturating_mul(n).saturating_mul(std::mem::size_of::<f64>())
}

fn pairwise_distances(points: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut d = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let dist = points[i]
                .iter()
                .zip(&points[j])
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            d[i][j] = dist;
            d[j][i] = dist;
        }
    }
    d
}

/// Distance to the `min_samples`-th nearest point, the point itself included.
fn core_distances(distances: &[Vec<f64>], min_samples: usize) -> Vec<f64> {
    distances
        .iter()
        .map(|row| {
            let mut sorted = row.clone();
            sorted.sort_by(f64::total_cmp);
            let k = (min_samples - 1).min(sorted.len() - 1);
            sorted[k]
        })
        .collect()
}

/// Prim's algorithm over the dense mutual-reachability graph.
fn minimum_spanning_tree(distances: &[Vec<f64>], core: &[f64]) -> Vec<(usize, usize, f64)> {
    let n = distances.len();
    let reach = |a: usize, b: usize| distances[a][b].max(core[a]).max(core[b]);

    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n - 1);

    let mut current = 0;
    in_tree[0] = true;
    for _ in 1..n {
        for j in 0..n {
            if !in_tree[j] {
                let w = reach(current, j);
                if w < best[j] {
                    best[j] = w;
                    from[j] = current;
                }
            }
        }
        let Some(next) = (0..n)
            .filter(|&j| !in_tree[j])
            .min_by(|&a, &b| best[a].total_cmp(&best[b]).then(a.cmp(&b)))
        else {
            break;
        };
        in_tree[next] = true;
        edges.push((from[next], next, best[next]));
        current = next;
    }
    edges
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// Merge MST edges shortest-first into a binary hierarchy.
fn single_linkage(n: usize, mut edges: Vec<(usize, usize, f64)>) -> Vec<Merge> {
    edges.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));

    let mut parent: Vec<usize> = (0..n).collect();
    // Hierarchy node currently representing each union-find root
    let mut node_of: Vec<usize> = (0..n).collect();
    let mut size_of = vec![1usize; n];
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    for (a, b, distance) in edges {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        if ra == rb {
            continue;
        }
        let size = size_of[ra] + size_of[rb];
        merges.push(Merge {
            left: node_of[ra],
            right: node_of[rb],
            distance,
            size,
        });
        parent[rb] = ra;
        size_of[ra] = size;
        node_of[ra] = n + merges.len() - 1;
    }
    merges
}

fn lambda(distance: f64) -> f64 {
    1.0 / distance.max(f64::EPSILON)
}

/// Walk the hierarchy from the root, creating a new cluster whenever both
/// sides of a split are big enough. Returns the condensed clusters (index 0
/// is the root) and, for each point, the cluster it fell out of.
fn condense(n: usize, merges: &[Merge], min_cluster_size: usize) -> (Vec<CondensedCluster>, Vec<usize>) {
    let node_size = |node: usize| if node < n { 1 } else { merges[node - n].size };

    let mut clusters = vec![CondensedCluster {
        parent: None,
        birth: 0.0,
        stability: 0.0,
        children: Vec::new(),
    }];
    let mut fell_from = vec![0usize; n];

    let Some(root) = (n + merges.len()).checked_sub(1).filter(|&r| r >= n) else {
        return (clusters, fell_from);
    };

    let mut stack = vec![(root, 0usize)];
    while let Some((node, cluster)) = stack.pop() {
        let merge = &merges[node - n];
        let lam = lambda(merge.distance);
        let birth = clusters[cluster].birth;
        let (left, right) = (merge.left, merge.right);
        let (left_size, right_size) = (node_size(left), node_size(right));

        let left_big = left_size >= min_cluster_size;
        let right_big = right_size >= min_cluster_size;

        if left_big && right_big {
            for (child, size) in [(left, left_size), (right, right_size)] {
                let id = clusters.len();
                clusters.push(CondensedCluster {
                    parent: Some(cluster),
                    birth: lam,
                    stability: 0.0,
                    children: Vec::new(),
                });
                clusters[cluster].children.push(id);
                clusters[cluster].stability += (lam - birth) * size as f64;
                stack.push((child, id));
            }
            continue;
        }

        for (child, size, big) in [(left, left_size, left_big), (right, right_size, right_big)] {
            if big {
                stack.push((child, cluster));
            } else {
                for point in leaves(n, merges, child) {
                    fell_from[point] = cluster;
                }
                clusters[cluster].stability += (lam - birth) * size as f64;
            }
        }
    }

    (clusters, fell_from)
}

fn leaves(n: usize, merges: &[Merge], node: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current < n {
            out.push(current);
        } else {
            let merge = &merges[current - n];
            stack.push(merge.left);
            stack.push(merge.right);
        }
    }
    out
}

/// Excess-of-mass selection. The root is never selected.
fn select_clusters(clusters: &[CondensedCluster]) -> Vec<bool> {
    let mut selected = vec![false; clusters.len()];
    let mut best: Vec<f64> = clusters.iter().map(|c| c.stability).collect();

    // Children always have larger ids than their parent
    for c in (1..clusters.len()).rev() {
        let subtree: f64 = clusters[c].children.iter().map(|&ch| best[ch]).sum();
        if clusters[c].children.is_empty() || best[c] >= subtree {
            selected[c] = true;
        } else {
            best[c] = subtree;
        }
    }

    // A selected cluster swallows every selected descendant
    let mut covered = vec![false; clusters.len()];
    for c in 1..clusters.len() {
        if let Some(parent) = clusters[c].parent {
            if covered[parent] {
                covered[c] = true;
                selected[c] = false;
                continue;
            }
        }
        if selected[c] {
            covered[c] = true;
        }
    }
    selected
}

fn label_points(clusters: &[CondensedCluster], fell_from: &[usize], selected: &[bool]) -> Vec<i32> {
    let mut ids: Vec<Option<i32>> = vec![None; clusters.len()];
    let mut next_id = 0;

    fell_from
        .iter()
        .map(|&start| {
            let mut current = Some(start);
            while let Some(c) = current {
                if selected[c] {
                    let id = *ids[c].get_or_insert_with(|| {
                        next_id += 1;
                        next_id - 1
                    });
                    return id;
                }
                current = clusters[c].parent;
            }
            NOISE
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Vec<f64> {
        vec![x, y]
    }

    #[test]
    fn test_empty_and_single() {
        let engine = ClusterEngine::default();
        assert!(engine.fit(&[]).is_empty());
        assert_eq!(engine.fit(&[p(1.0, 1.0)]), vec![NOISE]);
    }

    #[test]
    fn test_two_separated_groups() {
        let points = vec![
            p(0.0, 0.0),
            p(0.1, 0.0),
            p(0.0, 0.1),
            p(10.0, 10.0),
            p(10.1, 10.0),
        ];
        let labels = ClusterEngine::new(2, 1).fit(&points);

        assert!(labels.iter().all(|&l| l != NOISE));
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
        assert_eq!(labels[0], 0);
    }

    #[test]
    fn test_identical_points_cluster_together() {
        let points = vec![p(1.0, 1.0), p(1.0, 1.0), p(5.0, 5.0), p(5.0, 5.1)];
        let labels = ClusterEngine::new(2, 1).fit(&points);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], NOISE);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_outlier_is_noise() {
        let points = vec![
            p(0.0, 0.0),
            p(0.1, 0.0),
            p(10.0, 0.0),
            p(10.1, 0.0),
            p(50.0, 0.0),
        ];
        let labels = ClusterEngine::new(2, 1).fit(&points);
        assert_eq!(labels[4], NOISE);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_single_group_without_split_is_all_noise() {
        // Only the root exists, and the root is never a cluster
        let points = vec![p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)];
        let labels = ClusterEngine::new(2, 1).fit(&points);
        assert!(labels.iter().all(|&l| l == NOISE));
    }

    #[test]
    fn test_fewer_points_than_min_cluster_size() {
        let labels = ClusterEngine::new(5, 1).fit(&[p(0.0, 0.0), p(0.0, 0.1), p(9.0, 9.0)]);
        assert!(labels.iter().all(|&l| l == NOISE));
    }

    #[test]
    fn test_partition_independent_of_input_order() {
        let points = vec![
            p(0.0, 0.0),
            p(0.2, 0.1),
            p(8.0, 8.0),
            p(8.1, 8.2),
            p(8.2, 8.0),
            p(30.0, 0.0),
        ];
        let engine = ClusterEngine::new(2, 1);
        let forward = engine.fit(&points);

        let reversed: Vec<Vec<f64>> = points.iter().rev().cloned().collect();
        let mut backward = engine.fit(&reversed);
        backward.reverse();

        let n = points.len();
        for i in 0..n {
            assert_eq!(forward[i] == NOISE, backward[i] == NOISE);
            for j in 0..n {
                if forward[i] != NOISE && forward[j] != NOISE {
                    assert_eq!(forward[i] == forward[j], backward[i] == backward[j]);
                }
            }
        }
    }

    #[test]
    fn test_min_samples_raises_core_distance() {
        let rows = vec![vec![0.0, 1.0, 4.0], vec![1.0, 0.0, 3.0], vec![4.0, 3.0, 0.0]];
        assert_eq!(core_distances(&rows, 1), vec![0.0, 0.0, 0.0]);
        assert_eq!(core_distances(&rows, 2), vec![1.0, 1.0, 3.0]);
        // Clamped to the farthest point
        assert_eq!(core_distances(&rows, 10), vec![4.0, 3.0, 4.0]);
    }

    #[test]
    fn test_large_batch_threshold() {
        assert!(!exceeds_batch_limit(LARGE_BATCH_POINTS));
        assert!(exceeds_batch_limit(LARGE_BATCH_POINTS + 1));
        assert_eq!(distance_matrix_bytes(10_000), 800_000_000);
        assert_eq!(distance_matrix_bytes(usize::MAX), usize::MAX);
    }
}
