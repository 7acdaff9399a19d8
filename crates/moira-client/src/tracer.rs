//! Inclusion pathways from a member up to a root list.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use moira_core::{Error, MemberRef};
use serde::Serialize;
use tracing::debug;

use crate::config::DEFAULT_MAX_PATHWAYS;
use crate::query::QueryExecutor;
use crate::resolver::{ExpandOptions, ExpansionResult, MembershipResolver};
use crate::Result;

/// List names from the root list down to the list containing the member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Pathway(pub Vec<String>);

impl Pathway {
    /// List names in root-to-target order.
    #[must_use]
    pub fn lists(&self) -> &[String] {
        &self.0
    }

    /// Number of lists on the pathway.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for a pathway with no lists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Pathway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" -> "))
    }
}

/// Inverse membership index over one expanded list.
#[derive(Debug, Clone)]
pub struct MembershipTracer {
    root: String,
    /// member -> lists naming it explicitly
    containers: BTreeMap<MemberRef, BTreeSet<String>>,
    /// list name -> lists naming it explicitly
    parents: BTreeMap<String, BTreeSet<String>>,
    max_pathways: usize,
}

impl MembershipTracer {
    /// Expands `group` (nested lists included) and indexes the result.
    ///
    /// # Errors
    ///
    /// Propagates expansion errors.
    pub async fn build<Q>(
        resolver: &mut MembershipResolver<'_, Q>,
        group: &str,
        tags: bool,
    ) -> Result<Self>
    where
        Q: QueryExecutor + ?Sized,
    {
        let options = ExpandOptions::new().include_lists(true).tags(tags);
        let expansion = resolver.expand(group, options).await?;
        Ok(Self::from_expansion(group, &expansion))
    }

    /// Indexes an existing expansion rooted at `root`.
    #[must_use]
    pub fn from_expansion(root: impl Into<String>, expansion: &ExpansionResult) -> Self {
        let mut containers: BTreeMap<MemberRef, BTreeSet<String>> = BTreeMap::new();
        let mut parents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (list, members) in &expansion.known {
            let Some(members) = members else { continue };
            for member in members {
                containers
                    .entry(member.clone())
                    .or_default()
                    .insert(list.clone());
                if member.is_list() {
                    parents
                        .entry(member.name().to_string())
                        .or_default()
                        .insert(list.clone());
                }
            }
        }

        Self {
            root: root.into(),
            containers,
            parents,
            max_pathways: DEFAULT_MAX_PATHWAYS,
        }
    }

    /// Caps the number of pathways a single trace may produce.
    #[must_use]
    pub fn with_max_pathways(mut self, max_pathways: usize) -> Self {
        self.max_pathways = max_pathways;
        self
    }

    /// The root list name.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Lists that name `member` explicitly.
    pub fn containers_of(&self, member: &MemberRef) -> impl Iterator<Item = &str> + '_ {
        self.containers
            .get(member)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Every way `member` is included in the root list.
    ///
    /// Returns an empty vector if no indexed list names `member`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::User`] once more than the configured maximum number of
    /// pathways would be produced.
    pub fn trace(&self, member: &MemberRef) -> Result<Vec<Pathway>> {
        let mut pathways = Vec::new();
        for list in self.containers_of(member) {
            self.walk(list, &mut pathways)?;
        }

        debug!(
            root = %self.root,
            member = %member,
            pathways = pathways.len(),
            "traced member"
        );
        Ok(pathways)
    }

    /// Depth-first walk from `start` up through parent lists. The frames are
    /// kept on the heap so chains as deep as the expansion allows are safe.
    fn walk<'s>(&'s self, start: &'s str, out: &mut Vec<Pathway>) -> Result<()> {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        let mut frames = Vec::new();

        if self.enter(start, &mut path, &mut on_path, out)? {
            frames.push(self.parents_of(start));
        }
        while let Some(frame) = frames.last_mut() {
            match frame.next() {
                Some(parent) if !on_path.contains(parent) => {
                    if self.enter(parent, &mut path, &mut on_path, out)? {
                        frames.push(self.parents_of(parent));
                    }
                }
                Some(_) => {}
                None => {
                    frames.pop();
                    if let Some(list) = path.pop() {
                        on_path.remove(list);
                    }
                }
            }
        }
        Ok(())
    }

    /// Extends the path by `list`. Returns false if the path ended at the
    /// root, in which case it has been emitted and `list` removed again.
    fn enter<'s>(
        &self,
        list: &'s str,
        path: &mut Vec<&'s str>,
        on_path: &mut HashSet<&'s str>,
        out: &mut Vec<Pathway>,
    ) -> Result<bool> {
        if list != self.root {
            path.push(list);
            on_path.insert(list);
            return Ok(true);
        }
        if out.len() == self.max_pathways {
            return Err(Error::User(format!(
                "more than {} pathways to list `{}`",
                self.max_pathways, self.root
            )));
        }
        let pathway = std::iter::once(list)
            .chain(path.iter().rev().copied())
            .map(str::to_string)
            .collect();
        out.push(Pathway(pathway));
        Ok(false)
    }

    fn parents_of<'s>(&'s self, list: &str) -> impl Iterator<Item = &'s str> + 's {
        self.parents
            .get(list)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(members: &[MemberRef]) -> Option<BTreeSet<MemberRef>> {
        Some(members.iter().cloned().collect())
    }

    fn diamond() -> ExpansionResult {
        let user_d = MemberRef::user("d");
        ExpansionResult {
            known: BTreeMap::from([
                (
                    "A".to_string(),
                    set(&[MemberRef::list("B"), MemberRef::list("C")]),
                ),
                ("B".to_string(), set(&[MemberRef::list("D"), user_d.clone()])),
                ("C".to_string(), set(&[MemberRef::list("D")])),
                ("D".to_string(), set(&[user_d])),
            ]),
            ..ExpansionResult::default()
        }
    }

    #[test]
    fn traces_both_sides_of_a_diamond() {
        let tracer = MembershipTracer::from_expansion("A", &diamond());
        let pathways = tracer.trace(&MemberRef::list("D")).unwrap();
        assert_eq!(
            pathways,
            vec![
                Pathway(vec!["A".into(), "B".into()]),
                Pathway(vec!["A".into(), "C".into()]),
            ]
        );
        assert_eq!(pathways[1].to_string(), "A -> C");
    }

    #[test]
    fn leaf_reached_directly_and_through_nesting() {
        let tracer = MembershipTracer::from_expansion("A", &diamond());
        let mut pathways: Vec<String> = tracer
            .trace(&MemberRef::user("d"))
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        pathways.sort();
        assert_eq!(pathways, vec!["A -> B", "A -> B -> D", "A -> C -> D"]);
    }

    #[test]
    fn pathway_cap_is_enforced() {
        let tracer = MembershipTracer::from_expansion("A", &diamond()).with_max_pathways(1);
        let err = tracer.trace(&MemberRef::list("D")).unwrap_err();
        assert!(matches!(err, Error::User(_)));

        let tracer = MembershipTracer::from_expansion("A", &diamond()).with_max_pathways(2);
        assert_eq!(tracer.trace(&MemberRef::list("D")).unwrap().len(), 2);
    }

    #[test]
    fn unknown_member_has_no_pathways() {
        let tracer = MembershipTracer::from_expansion("A", &diamond());
        assert!(tracer.trace(&MemberRef::user("nobody")).unwrap().is_empty());
    }

    #[test]
    fn cycles_do_not_loop() {
        let expansion = ExpansionResult {
            known: BTreeMap::from([
                ("A".to_string(), set(&[MemberRef::list("B")])),
                (
                    "B".to_string(),
                    set(&[MemberRef::list("C"), MemberRef::user("x")]),
                ),
                ("C".to_string(), set(&[MemberRef::list("B")])),
            ]),
            ..ExpansionResult::default()
        };
        let tracer = MembershipTracer::from_expansion("A", &expansion);
        let pathways = tracer.trace(&MemberRef::user("x")).unwrap();
        assert_eq!(pathways, vec![Pathway(vec!["A".into(), "B".into()])]);
    }

    #[test]
    fn denied_lists_are_not_indexed() {
        let mut expansion = diamond();
        expansion.known.insert("C".to_string(), None);
        expansion.denied.insert("C".to_string());
        let tracer = MembershipTracer::from_expansion("A", &expansion);
        let pathways = tracer.trace(&MemberRef::list("D")).unwrap();
        assert_eq!(pathways, vec![Pathway(vec!["A".into(), "B".into()])]);
    }

    #[test]
    fn deep_chain_is_traced_without_recursion() {
        const DEPTH: usize = 100_000;
        let mut known = BTreeMap::new();
        for level in 0..DEPTH - 1 {
            known.insert(
                format!("L{level}"),
                set(&[MemberRef::list(format!("L{}", level + 1))]),
            );
        }
        known.insert(format!("L{}", DEPTH - 1), set(&[MemberRef::user("leaf")]));
        let expansion = ExpansionResult {
            known,
            ..ExpansionResult::default()
        };

        let pathways = MembershipTracer::from_expansion("L0", &expansion)
            .trace(&MemberRef::user("leaf"))
            .unwrap();
        assert_eq!(pathways.len(), 1);
        assert_eq!(pathways[0].len(), DEPTH);
        assert_eq!(pathways[0].lists()[0], "L0");
        assert_eq!(pathways[0].lists()[DEPTH - 1], format!("L{}", DEPTH - 1));
    }
}
