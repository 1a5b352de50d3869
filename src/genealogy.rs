use particle_id::ParticleID;
use petgraph::{
    graph::NodeIndex,
    prelude::DiGraph,
    visit::NodeIndexable,
    Direction::Incoming,
};

use crate::{event::GenParticle, particles::same_species};

/// Mother-daughter relations between generator particles
///
/// Nodes are positions in the generator particle list, edges point from
/// mother to daughter. Mothers outside the stored list have no node.
#[derive(Clone, Debug)]
pub struct Genealogy<'a> {
    particles: &'a [GenParticle],
    graph: DiGraph<usize, ()>,
}

impl<'a> Genealogy<'a> {
    pub fn new(particles: &'a [GenParticle]) -> Self {
        let n = particles.len();
        let mut graph = DiGraph::with_capacity(n, n);
        for idx in 0..n {
            graph.add_node(idx);
        }
        for (daughter, particle) in particles.iter().enumerate() {
            let Some(mother) = particle.mother_index else {
                continue;
            };
            if mother >= n {
                continue;
            }
            let mother = graph.from_index(mother);
            let daughter = graph.from_index(daughter);
            graph.add_edge(mother, daughter, ());
        }
        Self { particles, graph }
    }

    pub fn particles(&self) -> &'a [GenParticle] {
        self.particles
    }

    /// Stored mother of the particle at position `idx`
    pub fn mother(&self, idx: usize) -> Option<usize> {
        if idx >= self.graph.node_count() {
            return None;
        }
        self.graph
            .neighbors_directed(NodeIndex::new(idx), Incoming)
            .next()
            .map(|n| self.graph[n])
    }

    /// Whether any ancestor of the particle at position `idx` has
    /// the given id, up to the sign
    ///
    /// The search stops at particles without a mother and at mothers
    /// that were not stored. Cyclic records terminate after visiting
    /// each stored particle once.
    pub fn has_ancestor(&self, idx: usize, id: ParticleID) -> bool {
        let mut current = idx;
        for _ in 0..=self.particles.len() {
            let Some(particle) = self.particles.get(current) else {
                return false;
            };
            if particle.mother_id == 0 || particle.mother_index.is_none() {
                return false;
            }
            if same_species(particle.mother(), id) {
                return true;
            }
            match self.mother(current) {
                Some(mother) => current = mother,
                None => return false,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::{D_ZERO, KAON, SCALAR};

    fn particle(pdg_id: i32, mother_id: i32, mother_index: Option<usize>) -> GenParticle {
        GenParticle {
            pdg_id,
            mother_id,
            mother_index,
            ..Default::default()
        }
    }

    // scalar -> s quark -> D0 -> K-
    fn chain() -> Vec<GenParticle> {
        vec![
            particle(25, 0, None),
            particle(9000006, 25, Some(0)),
            particle(3, 9000006, Some(1)),
            particle(421, 3, Some(2)),
            particle(-321, 421, Some(3)),
        ]
    }

    #[test]
    fn finds_ancestors() {
        let particles = chain();
        let genealogy = Genealogy::new(&particles);
        assert!(genealogy.has_ancestor(4, SCALAR));
        assert!(genealogy.has_ancestor(4, D_ZERO));
        assert!(genealogy.has_ancestor(4, ParticleID::new(-421)));
        assert!(!genealogy.has_ancestor(4, KAON));
        assert!(!genealogy.has_ancestor(0, SCALAR));
        assert_eq!(genealogy.mother(4), Some(3));
        assert_eq!(genealogy.mother(0), None);
    }

    #[test]
    fn stops_at_missing_mother() {
        let particles = vec![
            particle(13, 15, Some(7)),
            particle(13, 9000006, Some(7)),
            particle(13, 9000006, None),
        ];
        let genealogy = Genealogy::new(&particles);
        assert!(!genealogy.has_ancestor(0, SCALAR));
        // the mother id is known even if the mother itself was not stored
        assert!(genealogy.has_ancestor(1, SCALAR));
        assert!(!genealogy.has_ancestor(2, SCALAR));
        assert!(!genealogy.has_ancestor(10, SCALAR));
    }

    #[test]
    fn terminates_on_cycles() {
        let particles = vec![particle(13, 211, Some(1)), particle(211, 13, Some(0))];
        let genealogy = Genealogy::new(&particles);
        assert!(!genealogy.has_ancestor(0, SCALAR));
        let own = vec![particle(13, 13, Some(0))];
        let genealogy = Genealogy::new(&own);
        assert!(!genealogy.has_ancestor(0, SCALAR));
    }
}
