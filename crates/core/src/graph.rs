use std::collections::{BTreeSet, HashMap};

use petgraph::{
    Direction::{Incoming, Outgoing},
    algo::tarjan_scc,
    stable_graph::{NodeIndex, StableDiGraph},
    visit::{Dfs, Reversed},
};

/// Returns the owning component of a dotted path, or `None` for a boundary variable.
pub(crate) fn owner(path: &str) -> Option<&str> {
    path.split_once('.').map(|(component, _)| component)
}

/// Returns `true` if both ends of an edge belong to the same component.
fn is_internal(src: &str, dst: &str) -> bool {
    matches!((owner(src), owner(dst)), (Some(a), Some(b)) if a == b)
}

/// The dependency graphs of one assembly.
///
/// The variable graph has a node per qualified variable name (`comp.var`, or a
/// bare name for a boundary variable) and an edge `src -> dst` for every
/// connection. Each component also contributes internal edges from all of its
/// inputs to all of its outputs, which lets invalidation reach a component's
/// outputs from its inputs. Internal edges are never reported as connections.
///
/// The component graph has a node per child and an edge per producer/consumer
/// pair, weighted by how many variable connections share that pair. It must
/// stay acyclic; feedback is expressed through drivers instead.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    vars: StableDiGraph<String, ()>,
    var_map: HashMap<String, NodeIndex>,
    comps: StableDiGraph<String, usize>,
    comp_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component and its variables.
    ///
    /// Calling this again for an existing component adds any new variables
    /// and leaves existing ones untouched.
    pub fn add_component(&mut self, name: &str, inputs: &[String], outputs: &[String]) {
        get_or_add(&mut self.comps, &mut self.comp_map, name);

        let ins: Vec<_> = inputs
            .iter()
            .map(|i| self.add_variable(&format!("{name}.{i}")))
            .collect();
        let outs: Vec<_> = outputs
            .iter()
            .map(|o| self.add_variable(&format!("{name}.{o}")))
            .collect();

        for &i in &ins {
            for &o in &outs {
                if self.vars.find_edge(i, o).is_none() {
                    self.vars.add_edge(i, o, ());
                }
            }
        }
    }

    /// Removes a component, its variables, and every edge touching them.
    pub fn remove_component(&mut self, name: &str) {
        let prefix = format!("{name}.");
        let doomed: Vec<String> = self
            .var_map
            .keys()
            .filter(|path| path.starts_with(&prefix))
            .cloned()
            .collect();
        for path in doomed {
            self.remove_variable(&path);
        }
        if let Some(index) = self.comp_map.remove(name) {
            self.comps.remove_node(index);
        }
    }

    /// Adds a variable node if it does not exist yet.
    pub fn add_variable(&mut self, path: &str) -> NodeIndex {
        get_or_add(&mut self.vars, &mut self.var_map, path)
    }

    /// Removes a variable node and its edges.
    pub fn remove_variable(&mut self, path: &str) {
        if let Some(index) = self.var_map.remove(path) {
            self.vars.remove_node(index);
        }
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.var_map.contains_key(path)
    }

    #[must_use]
    pub fn contains_component(&self, name: &str) -> bool {
        self.comp_map.contains_key(name)
    }

    /// Adds a variable edge, creating missing nodes.
    pub fn connect(&mut self, src: &str, dst: &str) {
        let s = self.add_variable(src);
        let d = self.add_variable(dst);
        self.vars.add_edge(s, d, ());
    }

    /// Removes a variable edge, returning whether it existed.
    pub fn disconnect(&mut self, src: &str, dst: &str) -> bool {
        let edge = self.var_edge(src, dst);
        edge.and_then(|e| self.vars.remove_edge(e)).is_some()
    }

    #[must_use]
    pub fn has_edge(&self, src: &str, dst: &str) -> bool {
        self.var_edge(src, dst).is_some()
    }

    fn var_edge(&self, src: &str, dst: &str) -> Option<petgraph::stable_graph::EdgeIndex> {
        let s = *self.var_map.get(src)?;
        let d = *self.var_map.get(dst)?;
        self.vars.find_edge(s, d)
    }

    /// Returns the connected source of a variable, ignoring internal edges.
    #[must_use]
    pub fn source_of(&self, path: &str) -> Option<String> {
        self.neighbors(path, Incoming)
            .into_iter()
            .find(|src| !is_internal(src, path))
    }

    /// Returns `true` if the variable has an inbound connection that is not internal.
    #[must_use]
    pub fn is_destination(&self, path: &str) -> bool {
        self.source_of(path).is_some()
    }

    /// Returns every variable directly downstream of `path`, internal edges included.
    #[must_use]
    pub fn successors(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Outgoing)
    }

    fn neighbors(&self, path: &str, direction: petgraph::Direction) -> Vec<String> {
        let Some(&index) = self.var_map.get(path) else {
            return Vec::new();
        };
        let mut names: Vec<String> = self
            .vars
            .neighbors_directed(index, direction)
            .map(|n| self.vars[n].clone())
            .collect();
        // Neighbors come back newest first.
        names.reverse();
        names
    }

    /// Returns the connections touching a variable, internal edges excluded.
    #[must_use]
    pub fn edges_of(&self, path: &str) -> Vec<(String, String)> {
        let incoming = self
            .neighbors(path, Incoming)
            .into_iter()
            .map(|src| (src, path.to_owned()));
        let outgoing = self
            .neighbors(path, Outgoing)
            .into_iter()
            .map(|dst| (path.to_owned(), dst));
        incoming
            .chain(outgoing)
            .filter(|(src, dst)| !is_internal(src, dst))
            .collect()
    }

    /// Returns the connections touching any variable of a component.
    #[must_use]
    pub fn edges_of_component(&self, name: &str) -> Vec<(String, String)> {
        self.connections()
            .into_iter()
            .filter(|(src, dst)| owner(src) == Some(name) || owner(dst) == Some(name))
            .collect()
    }

    /// Returns every connection, internal edges excluded.
    #[must_use]
    pub fn connections(&self) -> Vec<(String, String)> {
        self.vars
            .edge_indices()
            .filter_map(|e| self.vars.edge_endpoints(e))
            .map(|(s, d)| (self.vars[s].clone(), self.vars[d].clone()))
            .filter(|(src, dst)| !is_internal(src, dst))
            .collect()
    }

    /// Records a producer/consumer link between two components.
    ///
    /// # Errors
    ///
    /// If the link would close a cycle, it is not recorded and the names of
    /// the components on the cycle are returned.
    pub fn link(&mut self, src: &str, dst: &str) -> Result<(), Vec<String>> {
        let s = get_or_add(&mut self.comps, &mut self.comp_map, src);
        let d = get_or_add(&mut self.comps, &mut self.comp_map, dst);

        if let Some(edge) = self.comps.find_edge(s, d) {
            self.comps[edge] += 1;
            return Ok(());
        }

        let edge = self.comps.add_edge(s, d, 1);
        let cycle = tarjan_scc(&self.comps)
            .into_iter()
            .find(|scc| scc.len() > 1 && scc.contains(&s));

        match cycle {
            Some(scc) => {
                self.comps.remove_edge(edge);
                let mut names: Vec<String> = scc.iter().map(|&n| self.comps[n].clone()).collect();
                names.sort();
                Err(names)
            }
            None => Ok(()),
        }
    }

    /// Drops one producer/consumer link, removing the edge when none remain.
    pub fn unlink(&mut self, src: &str, dst: &str) {
        let (Some(&s), Some(&d)) = (self.comp_map.get(src), self.comp_map.get(dst)) else {
            return;
        };
        if let Some(edge) = self.comps.find_edge(s, d) {
            self.comps[edge] -= 1;
            if self.comps[edge] == 0 {
                self.comps.remove_edge(edge);
            }
        }
    }

    /// Returns how many variable connections link two components.
    #[must_use]
    pub fn link_count(&self, src: &str, dst: &str) -> usize {
        let (Some(&s), Some(&d)) = (self.comp_map.get(src), self.comp_map.get(dst)) else {
            return 0;
        };
        self.comps.find_edge(s, d).map_or(0, |e| self.comps[e])
    }

    /// Returns the producer/consumer pairs of the component graph.
    #[must_use]
    pub fn component_edges(&self) -> Vec<(String, String)> {
        self.comps
            .edge_indices()
            .filter_map(|e| self.comps.edge_endpoints(e))
            .map(|(s, d)| (self.comps[s].clone(), self.comps[d].clone()))
            .collect()
    }

    /// Returns the members plus every component on a path between two members.
    #[must_use]
    pub fn between(&self, members: &BTreeSet<String>) -> BTreeSet<String> {
        let starts: Vec<NodeIndex> = members
            .iter()
            .filter_map(|m| self.comp_map.get(m).copied())
            .collect();
        let Some(&first) = starts.first() else {
            return BTreeSet::new();
        };

        let mut downstream = BTreeSet::new();
        let mut dfs = Dfs::new(&self.comps, first);
        for &start in &starts {
            dfs.move_to(start);
            while let Some(n) = dfs.next(&self.comps) {
                downstream.insert(n);
            }
        }

        let reversed = Reversed(&self.comps);
        let mut upstream = BTreeSet::new();
        let mut dfs = Dfs::new(reversed, first);
        for &start in &starts {
            dfs.move_to(start);
            while let Some(n) = dfs.next(reversed) {
                upstream.insert(n);
            }
        }

        downstream
            .intersection(&upstream)
            .map(|&n| self.comps[n].clone())
            .collect()
    }
}

fn get_or_add<E>(
    graph: &mut StableDiGraph<String, E>,
    map: &mut HashMap<String, NodeIndex>,
    name: &str,
) -> NodeIndex {
    *map.entry(name.to_owned())
        .or_insert_with(|| graph.add_node(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|&x| x.to_owned()).collect()
    }

    fn chain() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for comp in ["a", "b", "c"] {
            graph.add_component(comp, &names(&["x"]), &names(&["y"]));
        }
        graph.connect("a.y", "b.x");
        graph.link("a", "b").unwrap();
        graph.connect("b.y", "c.x");
        graph.link("b", "c").unwrap();
        graph
    }

    #[test]
    fn internal_edges_are_hidden_from_connections() {
        let graph = chain();
        assert_eq!(
            graph.connections(),
            vec![
                ("a.y".to_owned(), "b.x".to_owned()),
                ("b.y".to_owned(), "c.x".to_owned()),
            ]
        );
        assert_eq!(graph.successors("b.x"), ["b.y"]);
        assert!(graph.is_destination("b.x"));
        assert!(!graph.is_destination("b.y"));
        assert!(!graph.is_destination("a.x"));
    }

    #[test]
    fn cycles_are_rejected_and_not_recorded() {
        let mut graph = chain();
        let cycle = graph.link("c", "a").unwrap_err();
        assert_eq!(cycle, ["a", "b", "c"]);
        assert_eq!(graph.link_count("c", "a"), 0);
    }

    #[test]
    fn links_are_reference_counted() {
        let mut graph = chain();
        graph.link("a", "b").unwrap();
        assert_eq!(graph.link_count("a", "b"), 2);
        graph.unlink("a", "b");
        assert_eq!(graph.link_count("a", "b"), 1);
        graph.unlink("a", "b");
        assert_eq!(graph.link_count("a", "b"), 0);
        assert_eq!(graph.component_edges(), vec![("b".to_owned(), "c".to_owned())]);
    }

    #[test]
    fn between_fills_in_intermediate_components() {
        let mut graph = chain();
        graph.add_component("d", &names(&["x"]), &names(&["y"]));

        let members = BTreeSet::from(["a", "c"].map(String::from));
        let set = graph.between(&members);
        assert_eq!(set, BTreeSet::from(["a", "b", "c"].map(String::from)));

        let members = BTreeSet::from(["a", "d"].map(String::from));
        assert_eq!(graph.between(&members), members);
    }

    #[test]
    fn removing_a_component_drops_its_edges() {
        let mut graph = chain();
        graph.remove_component("b");
        assert!(graph.connections().is_empty());
        assert!(!graph.contains("b.x"));
        assert!(!graph.contains_component("b"));
    }
}
