use std::collections::{BTreeSet, HashMap};

use petgraph::{algo::toposort, graph::DiGraph};

use crate::error::{ConfigError, Error, Overlap};
use crate::graph::DependencyGraph;

/// What the scheduler needs to know about one driver.
#[derive(Debug, Clone)]
pub(crate) struct DriverPlan {
    pub(crate) name: String,
    /// Explicit workflow members plus the children its references touch.
    pub(crate) members: BTreeSet<String>,
    /// The explicit member order of a sequential workflow.
    pub(crate) sequence: Option<Vec<String>>,
    /// Whether this is the assembly's designated driver.
    pub(crate) root: bool,
}

/// The execution order of an assembly's top level and of every driver.
///
/// Each driver iterates over a set of components: its members plus every
/// component on a connection path between two members. Sets must nest; a
/// driver whose set lies strictly inside another's becomes a single step of
/// the enclosing driver's workflow. The top level runs the outermost drivers
/// together with the components no driver claims.
#[derive(Debug, Clone, Default)]
pub(crate) struct Schedule {
    top: Vec<String>,
    flows: HashMap<String, Vec<String>>,
    sets: HashMap<String, BTreeSet<String>>,
}

impl Schedule {
    /// Returns the order for the top level (`None`) or for a driver.
    pub(crate) fn order(&self, owner: Option<&str>) -> &[String] {
        match owner {
            None => &self.top,
            Some(driver) => self.flows.get(driver).map_or(&[], Vec::as_slice),
        }
    }

    /// Returns the components a driver iterates over, nested drivers' included.
    pub(crate) fn iteration_set(&self, driver: &str) -> Option<&BTreeSet<String>> {
        self.sets.get(driver)
    }

    /// Computes the schedule.
    ///
    /// `children` lists every child in insertion order, and `prefix` is the
    /// assembly path used to qualify names in errors.
    pub(crate) fn compute(
        prefix: &str,
        children: &[String],
        plans: &[DriverPlan],
        graph: &DependencyGraph,
    ) -> Result<Self, Error> {
        let plan_of: HashMap<&str, &DriverPlan> =
            plans.iter().map(|p| (p.name.as_str(), p)).collect();
        let components: BTreeSet<String> = children
            .iter()
            .filter(|c| !plan_of.contains_key(c.as_str()))
            .cloned()
            .collect();

        let mut sets = HashMap::new();
        for plan in plans {
            let mut members = BTreeSet::new();
            expand(plan, &plan_of, &mut members, &mut BTreeSet::new());
            let set: BTreeSet<String> = if plan.root || members.is_empty() {
                components.clone()
            } else {
                graph
                    .between(&members)
                    .into_iter()
                    .filter(|c| components.contains(c))
                    .collect()
            };
            sets.insert(plan.name.clone(), set);
        }

        check_nesting(prefix, plans, &sets)?;

        let mut parents: HashMap<&str, &str> = HashMap::new();
        for plan in plans {
            let own = &sets[&plan.name];
            let parent = plans
                .iter()
                .filter(|p| {
                    let other = &sets[&p.name];
                    p.name != plan.name && own.is_subset(other) && own.len() < other.len()
                })
                .min_by_key(|p| sets[&p.name].len());
            if let Some(parent) = parent {
                parents.insert(plan.name.as_str(), parent.name.as_str());
            }
        }

        let level = Level {
            prefix,
            children,
            graph,
            sets: &sets,
            parents: &parents,
            plan_of: &plan_of,
        };

        let mut flows = HashMap::new();
        for plan in plans {
            let order = level.order(Some(&plan.name), &sets[&plan.name], plan.sequence.as_deref())?;
            flows.insert(plan.name.clone(), order);
        }
        let top = level.order(None, &components, None)?;

        Ok(Self { top, flows, sets })
    }
}

/// Collects a driver's members, replacing member drivers by their own members.
fn expand(
    plan: &DriverPlan,
    plan_of: &HashMap<&str, &DriverPlan>,
    out: &mut BTreeSet<String>,
    seen: &mut BTreeSet<String>,
) {
    if !seen.insert(plan.name.clone()) {
        return;
    }
    for member in &plan.members {
        match plan_of.get(member.as_str()) {
            Some(inner) => expand(inner, plan_of, out, seen),
            None => {
                out.insert(member.clone());
            }
        }
    }
}

/// Rejects driver pairs whose iteration sets are identical or partially overlap.
fn check_nesting(
    prefix: &str,
    plans: &[DriverPlan],
    sets: &HashMap<String, BTreeSet<String>>,
) -> Result<(), Error> {
    for (i, a) in plans.iter().enumerate() {
        for b in &plans[i + 1..] {
            let (sa, sb) = (&sets[&a.name], &sets[&b.name]);
            let collision = if sa == sb {
                Some((Overlap::Identical, sa.clone()))
            } else if !sa.is_subset(sb) && !sb.is_subset(sa) {
                let shared: BTreeSet<String> = sa.intersection(sb).cloned().collect();
                (!shared.is_empty()).then_some((Overlap::Partial, shared))
            } else {
                None
            };

            if let Some((overlap, shared)) = collision {
                return Err(Error::AmbiguousOrder {
                    first: qualify(prefix, &a.name),
                    second: qualify(prefix, &b.name),
                    components: shared.iter().map(|c| qualify(prefix, c)).collect(),
                    overlap,
                });
            }
        }
    }
    Ok(())
}

/// Shared state for ordering one level of the driver tree.
struct Level<'a> {
    prefix: &'a str,
    children: &'a [String],
    graph: &'a DependencyGraph,
    sets: &'a HashMap<String, BTreeSet<String>>,
    parents: &'a HashMap<&'a str, &'a str>,
    plan_of: &'a HashMap<&'a str, &'a DriverPlan>,
}

impl Level<'_> {
    /// Orders the direct children of `owner` (the top level when `None`).
    ///
    /// The direct children are the drivers whose parent is `owner` plus the
    /// components of `scope` those drivers do not claim. Each child driver
    /// stands in for all of its components when ordering.
    fn order(
        &self,
        owner: Option<&str>,
        scope: &BTreeSet<String>,
        sequence: Option<&[String]>,
    ) -> Result<Vec<String>, Error> {
        let drivers: Vec<&str> = self
            .children
            .iter()
            .map(String::as_str)
            .filter(|c| self.plan_of.contains_key(c) && self.parents.get(c).copied() == owner)
            .filter(|&c| Some(c) != owner)
            .collect();

        let claimed: BTreeSet<&String> = drivers.iter().flat_map(|d| &self.sets[*d]).collect();
        let nodes: Vec<&str> = self
            .children
            .iter()
            .filter(|c| drivers.contains(&c.as_str()) || (scope.contains(*c) && !claimed.contains(c)))
            .map(String::as_str)
            .collect();

        let representative = |name: &str| -> Option<usize> {
            if let Some(i) = nodes.iter().position(|&n| n == name) {
                return Some(i);
            }
            if self.plan_of.contains_key(name) {
                let mut current = name;
                while let Some(&parent) = self.parents.get(current) {
                    if let Some(i) = nodes.iter().position(|&n| n == parent) {
                        return Some(i);
                    }
                    current = parent;
                }
                return None;
            }
            drivers
                .iter()
                .find(|d| self.sets[**d].contains(name))
                .and_then(|d| nodes.iter().position(|n| n == d))
        };

        let mut graph = DiGraph::<&str, ()>::new();
        let indices: Vec<_> = nodes.iter().map(|&n| graph.add_node(n)).collect();
        for (src, dst) in self.graph.component_edges() {
            if let (Some(s), Some(d)) = (representative(&src), representative(&dst)) {
                if s != d {
                    graph.update_edge(indices[s], indices[d], ());
                }
            }
        }

        let sorted: Vec<String> = toposort(&graph, None)
            .map_err(|cycle| {
                let name = qualify(self.prefix, graph[cycle.node_id()]);
                Error::from(ConfigError::Circular {
                    src: name.clone(),
                    dst: name.clone(),
                    components: vec![name],
                })
            })?
            .into_iter()
            .map(|n| graph[n].to_owned())
            .collect();

        let Some(sequence) = sequence else {
            return Ok(sorted);
        };

        let mut order: Vec<String> = Vec::with_capacity(sorted.len());
        for member in sequence {
            if let Some(i) = representative(member) {
                let name = nodes[i].to_owned();
                if !order.contains(&name) {
                    order.push(name);
                }
            }
        }
        for name in sorted {
            if !order.contains(&name) {
                order.push(name);
            }
        }
        Ok(order)
    }
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|&x| x.to_owned()).collect()
    }

    fn plan(name: &str, members: &[&str]) -> DriverPlan {
        DriverPlan {
            name: name.to_owned(),
            members: members.iter().map(|&m| m.to_owned()).collect(),
            sequence: None,
            root: false,
        }
    }

    /// c1 -> c2 -> c3, plus drivers added as children.
    fn chain(drivers: &[&str]) -> (Vec<String>, DependencyGraph) {
        let mut graph = DependencyGraph::new();
        for c in ["c1", "c2", "c3"] {
            graph.add_component(c, &names(&["x"]), &names(&["y"]));
        }
        for d in drivers {
            graph.add_component(d, &[], &[]);
        }
        graph.connect("c1.y", "c2.x");
        graph.link("c1", "c2").unwrap();
        graph.connect("c2.y", "c3.x");
        graph.link("c2", "c3").unwrap();

        let mut children = names(&["c1", "c2", "c3"]);
        children.extend(names(drivers));
        (children, graph)
    }

    #[test]
    fn nested_driver_becomes_a_step_of_its_parent() {
        let (children, graph) = chain(&["d1", "d2"]);
        let plans = [plan("d1", &["c2"]), plan("d2", &["c1", "c3"])];
        let schedule = Schedule::compute("", &children, &plans, &graph).unwrap();

        assert_eq!(schedule.order(None), ["d2"]);
        assert_eq!(schedule.order(Some("d2")), ["c1", "d1", "c3"]);
        assert_eq!(schedule.order(Some("d1")), ["c2"]);
        assert_eq!(schedule.iteration_set("d2").unwrap().len(), 3);
    }

    #[test]
    fn peer_drivers_follow_data_dependencies() {
        let (children, graph) = chain(&["d2", "d1"]);
        let plans = [plan("d2", &["c2"]), plan("d1", &["c1"])];
        let schedule = Schedule::compute("", &children, &plans, &graph).unwrap();

        assert_eq!(schedule.order(None), ["d1", "d2", "c3"]);
    }

    #[test]
    fn identical_sets_are_ambiguous() {
        let (children, graph) = chain(&["d1", "d2"]);
        let plans = [plan("d1", &["c1"]), plan("d2", &["c1"])];
        let err = Schedule::compute("top", &children, &plans, &graph).unwrap_err();

        assert_eq!(
            err.to_string(),
            "drivers 'top.d1' and 'top.d2' iterate over the same set of components \
             (top.c1), so their order cannot be determined"
        );
    }

    #[test]
    fn partial_overlap_is_ambiguous() {
        let (children, graph) = chain(&["d1", "d2"]);
        let plans = [plan("d1", &["c1", "c2"]), plan("d2", &["c2", "c3"])];
        let err = Schedule::compute("", &children, &plans, &graph).unwrap_err();

        match err {
            Error::AmbiguousOrder {
                overlap,
                components,
                ..
            } => {
                assert_eq!(overlap, Overlap::Partial);
                assert_eq!(components, ["c2"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn driver_without_members_iterates_over_everything() {
        let (children, graph) = chain(&["run", "d1"]);
        let mut root = plan("run", &[]);
        root.root = true;
        let plans = [root, plan("d1", &["c2"])];
        let schedule = Schedule::compute("", &children, &plans, &graph).unwrap();

        assert_eq!(schedule.order(None), ["run"]);
        assert_eq!(schedule.order(Some("run")), ["c1", "d1", "c3"]);
    }

    #[test]
    fn sequence_overrides_dataflow_order() {
        let mut graph = DependencyGraph::new();
        for c in ["a", "b", "c"] {
            graph.add_component(c, &names(&["x"]), &names(&["y"]));
        }
        let children = names(&["a", "b", "c", "seq"]);
        let mut seq = plan("seq", &["c", "a"]);
        seq.sequence = Some(names(&["c", "a"]));
        let schedule = Schedule::compute("", &children, &[seq], &graph).unwrap();

        assert_eq!(schedule.order(Some("seq")), ["c", "a"]);
        assert_eq!(schedule.order(None), ["b", "seq"]);
    }
}
