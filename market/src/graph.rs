//! Pair graph and depth-bounded route discovery.
//!
//! Tokens are nodes, pairs are undirected edges. A route is a simple path
//! (no token visited twice) from a source token to a destination token, each
//! hop tagged with whether it runs against the pair's stored token order.

use std::collections::{HashMap, HashSet};

use corelib::{PairConfig, PairId, TokenId};
use serde::Serialize;
use tracing::{debug, instrument};

/// One pair traversal.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
pub struct Hop {
    pub pair: PairId,
    /// `true` when entering at `tokens[1]` and leaving at `tokens[0]`.
    pub reverse: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
pub struct Route {
    pub from: TokenId,
    pub to: TokenId,
    pub hops: Vec<Hop>,
}

impl Route {
    /// Zero-hop route from a token to itself; evaluates to rate 1.
    pub fn identity(token: TokenId) -> Self {
        Self {
            from: token,
            to: token,
            hops: Vec::new(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = PairId> + '_ {
        self.hops.iter().map(|h| h.pair)
    }

    pub fn first_pair(&self) -> Option<PairId> {
        self.hops.first().map(|h| h.pair)
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    pair: PairId,
    to: TokenId,
    reverse: bool,
}

/// Token adjacency built from the catalog's pair list (catalog order is kept,
/// so route enumeration is deterministic).
#[derive(Debug, Clone, Default)]
pub struct PairGraph {
    adjacency: HashMap<TokenId, Vec<Edge>>,
}

impl PairGraph {
    pub fn from_pairs(pairs: &[PairConfig]) -> Self {
        let mut adjacency: HashMap<TokenId, Vec<Edge>> = HashMap::new();

        for (idx, pair) in pairs.iter().enumerate() {
            let pair_id = idx as PairId;
            let [a, b] = pair.tokens;
            if a == b {
                debug!(pair = pair_id, token = a, "skipping pair quoted against itself");
                continue;
            }
            adjacency.entry(a).or_default().push(Edge {
                pair: pair_id,
                to: b,
                reverse: false,
            });
            adjacency.entry(b).or_default().push(Edge {
                pair: pair_id,
                to: a,
                reverse: true,
            });
        }

        Self { adjacency }
    }

    /// Every simple route from `src` to `dst` with at most `max_hops` hops.
    #[instrument(skip(self), target = "graph", level = "debug")]
    pub fn find_paths(&self, src: TokenId, dst: TokenId, max_hops: usize) -> Vec<Route> {
        if src == dst {
            return vec![Route::identity(src)];
        }

        let mut out = Vec::new();
        let mut visited = vec![src];
        let mut hops = Vec::with_capacity(max_hops);
        self.walk(src, dst, max_hops, &mut visited, &mut hops, &mut out);

        debug!(routes = out.len(), "route search finished");
        out
    }

    fn walk(
        &self,
        at: TokenId,
        dst: TokenId,
        max_hops: usize,
        visited: &mut Vec<TokenId>,
        hops: &mut Vec<Hop>,
        out: &mut Vec<Route>,
    ) {
        if hops.len() >= max_hops {
            return;
        }
        let Some(edges) = self.adjacency.get(&at) else {
            return;
        };

        for edge in edges {
            let hop = Hop {
                pair: edge.pair,
                reverse: edge.reverse,
            };

            if edge.to == dst {
                hops.push(hop);
                out.push(Route {
                    from: visited[0],
                    to: dst,
                    hops: hops.clone(),
                });
                hops.pop();
                continue;
            }

            if visited.contains(&edge.to) {
                continue;
            }

            visited.push(edge.to);
            hops.push(hop);
            self.walk(edge.to, dst, max_hops, visited, hops, out);
            hops.pop();
            visited.pop();
        }
    }
}

/// De-duplicated pair ids used across `routes`, in first-seen order.
pub fn unique_pairs(routes: &[Route]) -> Vec<PairId> {
    let mut seen = HashSet::new();
    routes
        .iter()
        .flat_map(Route::pairs)
        .filter(|p| seen.insert(*p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(TokenId, TokenId)]) -> PairGraph {
        let pairs: Vec<PairConfig> = edges.iter().map(|&(a, b)| PairConfig::new(a, b)).collect();
        PairGraph::from_pairs(&pairs)
    }

    fn hop(pair: PairId, reverse: bool) -> Hop {
        Hop { pair, reverse }
    }

    #[test]
    fn direct_pair_in_both_directions() {
        let g = graph(&[(0, 1)]);
        assert_eq!(g.find_paths(0, 1, 4)[0].hops, vec![hop(0, false)]);
        assert_eq!(g.find_paths(1, 0, 4)[0].hops, vec![hop(0, true)]);
    }

    #[test]
    fn two_hop_route_records_direction_per_hop() {
        // A=0, B=1, C=2 with pairs A-B and C-B
        let g = graph(&[(0, 1), (2, 1)]);
        let routes = g.find_paths(0, 2, 4);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].hops, vec![hop(0, false), hop(1, true)]);
    }

    #[test]
    fn identity_route_for_any_depth() {
        let g = graph(&[(0, 1)]);
        for n in [0, 1, 4] {
            let routes = g.find_paths(1, 1, n);
            assert_eq!(routes, vec![Route::identity(1)]);
        }
        assert_eq!(PairGraph::default().find_paths(7, 7, 0).len(), 1);
    }

    #[test]
    fn zero_hops_finds_nothing_between_distinct_tokens() {
        let g = graph(&[(0, 1)]);
        assert!(g.find_paths(0, 1, 0).is_empty());
    }

    #[test]
    fn max_hops_prunes_long_routes() {
        // chain 0-1-2-3
        let g = graph(&[(0, 1), (1, 2), (2, 3)]);
        assert!(g.find_paths(0, 3, 2).is_empty());
        assert_eq!(g.find_paths(0, 3, 3).len(), 1);
    }

    #[test]
    fn parallel_pairs_are_separate_routes() {
        let g = graph(&[(0, 1), (0, 1)]);
        let routes = g.find_paths(0, 1, 1);
        assert_eq!(routes.len(), 2);
        assert_eq!(unique_pairs(&routes), vec![0, 1]);
    }

    #[test]
    fn triangle_yields_direct_and_detour_without_cycles() {
        let g = graph(&[(0, 1), (1, 2), (0, 2)]);
        let routes = g.find_paths(0, 2, 4);
        let mut shapes: Vec<Vec<PairId>> = routes.iter().map(|r| r.pairs().collect()).collect();
        shapes.sort();
        assert_eq!(shapes, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn unknown_token_has_no_routes() {
        let g = graph(&[(0, 1)]);
        assert!(g.find_paths(5, 1, 4).is_empty());
    }

    #[test]
    fn self_quoted_pair_is_ignored() {
        let g = graph(&[(1, 1), (0, 1)]);
        let routes = g.find_paths(0, 1, 4);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].hops, vec![hop(1, false)]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Token sequence visited by `route`, derived from the pair list.
    fn walk_tokens(pairs: &[PairConfig], route: &Route) -> Vec<TokenId> {
        let mut tokens = vec![route.from];
        for h in &route.hops {
            let p = &pairs[h.pair as usize];
            let (entry, exit) = if h.reverse {
                (p.tokens[1], p.tokens[0])
            } else {
                (p.tokens[0], p.tokens[1])
            };
            assert_eq!(*tokens.last().unwrap(), entry, "hop does not continue the route");
            tokens.push(exit);
        }
        tokens
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]
        #[test]
        fn routes_are_simple_bounded_and_connected(
            edges in prop::collection::vec((0..7u32, 0..7u32), 0..14),
            src in 0..7u32,
            dst in 0..7u32,
            max_hops in 0..5usize,
        ) {
            let pairs: Vec<PairConfig> = edges.iter().map(|&(a, b)| PairConfig::new(a, b)).collect();
            let g = PairGraph::from_pairs(&pairs);
            let routes = g.find_paths(src, dst, max_hops);

            if src == dst {
                prop_assert_eq!(routes, vec![Route::identity(src)]);
                return Ok(());
            }

            let distinct: HashSet<&Route> = routes.iter().collect();
            prop_assert_eq!(distinct.len(), routes.len(), "duplicate route returned");

            for r in &routes {
                prop_assert!(r.len() <= max_hops);
                prop_assert!(!r.is_identity());

                let tokens = walk_tokens(&pairs, r);
                prop_assert_eq!(tokens[0], src);
                prop_assert_eq!(*tokens.last().unwrap(), dst);

                let unique: HashSet<_> = tokens.iter().collect();
                prop_assert_eq!(unique.len(), tokens.len(), "route revisits a token");
            }
        }
    }
}
