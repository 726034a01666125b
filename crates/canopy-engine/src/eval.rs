//! The recursive node test and its evaluation context.
//!
//! A [`NodeTest`] carries one required permission plus the model queries
//! resolved for it (granting closure, NODE/PARENT/CHILDREN requirements)
//! and walks the primary-parent chain deciding whether the current
//! authority set holds the permission.
//!
//! Denial handling: a deny entry anywhere on the inheritance chain from
//! the starting node to the root vetoes the denied (authority,
//! permission) pairs for the whole evaluation, so the context computes
//! the chain's denial union before any allow entry is matched. Denial
//! sets are shared immutably across sibling branches; merges are
//! copy-on-write.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::trace;

use canopy_core::{NodeRef, PermissionReference, QName};
use canopy_model::{PermissionModel, RequiredOn};

use crate::engine::PermissionEngine;
use crate::error::{EngineError, Result};

/// Per-evaluation set of (authority, permission) pairs that must not be
/// allowed.
#[derive(Debug, Clone, Default)]
pub(crate) struct DeniedSet {
    by_authority: HashMap<String, HashSet<PermissionReference>>,
}

impl DeniedSet {
    pub(crate) fn is_empty(&self) -> bool {
        self.by_authority.is_empty()
    }

    pub(crate) fn insert(&mut self, authority: &str, permission: PermissionReference) {
        self.by_authority
            .entry(authority.to_string())
            .or_default()
            .insert(permission);
    }

    pub(crate) fn contains(&self, authority: &str, permission: &PermissionReference) -> bool {
        self.by_authority
            .get(authority)
            .is_some_and(|set| set.contains(permission))
    }

    pub(crate) fn merge(&mut self, other: &DeniedSet) {
        for (authority, permissions) in &other.by_authority {
            self.by_authority
                .entry(authority.clone())
                .or_default()
                .extend(permissions.iter().cloned());
        }
    }
}

/// Merge without copying when there is nothing to add.
fn merged<'a>(base: &'a DeniedSet, extra: &DeniedSet) -> Cow<'a, DeniedSet> {
    if extra.is_empty() {
        Cow::Borrowed(base)
    } else {
        let mut out = base.clone();
        out.merge(extra);
        Cow::Owned(out)
    }
}

/// State shared across one top-level evaluation: the resolved authority
/// set and per-node denial caches. Discarded when the evaluation ends.
pub(crate) struct EvalContext<'e> {
    pub(crate) engine: &'e PermissionEngine,
    pub(crate) authorities: HashSet<String>,
    denials: HashMap<NodeRef, Arc<DeniedSet>>,
    chains: HashMap<NodeRef, Arc<DeniedSet>>,
}

impl<'e> EvalContext<'e> {
    pub(crate) fn new(engine: &'e PermissionEngine, authorities: HashSet<String>) -> Self {
        Self {
            engine,
            authorities,
            denials: HashMap::new(),
            chains: HashMap::new(),
        }
    }

    /// The denial pairs contributed by the entries at one node.
    ///
    /// For a deny of permission P: everything that would grant P and
    /// everything P would grant is denied for that authority. A deny of
    /// the wildcard expands over every permission exposed on the node,
    /// plus both wildcard forms.
    pub(crate) fn denials_at(&mut self, node: &NodeRef) -> Result<Arc<DeniedSet>> {
        if let Some(cached) = self.denials.get(node) {
            return Ok(cached.clone());
        }

        let engine = self.engine;
        let model = engine.model();
        let mut set = DeniedSet::default();
        if let Some(acl) = engine.acl().permissions(node)? {
            for entry in acl.entries.iter().filter(|e| !e.allowed) {
                if entry.permission.is_all() {
                    let type_name = engine.hierarchy().node_type(node)?;
                    let aspects = engine.hierarchy().aspects(node)?;
                    for exposed in model.exposed_permissions(&type_name, &aspects) {
                        set.insert(&entry.authority, exposed);
                    }
                    set.insert(&entry.authority, PermissionReference::all());
                    set.insert(&entry.authority, PermissionReference::legacy_all());
                } else {
                    for granter in model.granting_permissions(&entry.permission) {
                        set.insert(&entry.authority, granter);
                    }
                    for grantee in model.grantee_permissions(&entry.permission) {
                        set.insert(&entry.authority, grantee);
                    }
                }
            }
        }

        let set = Arc::new(set);
        self.denials.insert(node.clone(), set.clone());
        Ok(set)
    }

    /// The denial union over the inheritance chain from `node` upward,
    /// stopping after the first node that does not inherit. Computed
    /// before any allow entry is matched so the outcome cannot depend on
    /// traversal order.
    pub(crate) fn chain_denials(&mut self, node: &NodeRef) -> Result<Arc<DeniedSet>> {
        if let Some(cached) = self.chains.get(node) {
            return Ok(cached.clone());
        }

        let max_depth = self.engine.config().max_depth;
        let mut acc = DeniedSet::default();
        let mut current = Some(node.clone());
        let mut steps = 0usize;
        while let Some(n) = current {
            steps += 1;
            if steps > max_depth {
                return Err(EngineError::RecursionLimit(max_depth));
            }
            acc.merge(self.denials_at(&n)?.as_ref());
            if !self.inherits(&n)? {
                break;
            }
            current = self.engine.hierarchy().primary_parent(&n)?;
        }

        let acc = Arc::new(acc);
        self.chains.insert(node.clone(), acc.clone());
        Ok(acc)
    }

    /// Whether the node's ACL inherits from its parent; true when the
    /// node has no ACL.
    pub(crate) fn inherits(&self, node: &NodeRef) -> Result<bool> {
        Ok(self
            .engine
            .acl()
            .permissions(node)?
            .map_or(true, |acl| acl.inherits))
    }
}

/// One required permission resolved against the model, evaluated
/// recursively over the node tree.
pub(crate) struct NodeTest {
    required: PermissionReference,
    type_name: QName,
    aspects: HashSet<QName>,
    /// Everything whose holding implies `required`, wildcard included.
    granters: HashSet<PermissionReference>,
    node_required: Vec<PermissionReference>,
    parent_required: Vec<PermissionReference>,
    children_required: Vec<PermissionReference>,
    /// Concrete permission, matched directly against entries.
    atomic: bool,
    /// Atomic and required of its own parent: satisfied by holding it
    /// anywhere up the primary-parent chain.
    recursive: bool,
}

impl NodeTest {
    pub(crate) fn new(
        model: &PermissionModel,
        required: PermissionReference,
        type_name: QName,
        aspects: HashSet<QName>,
    ) -> Self {
        let granters = model.granting_permissions(&required);
        let node_required =
            model.required_permissions(&required, &type_name, &aspects, RequiredOn::Node);
        let parent_required =
            model.required_permissions(&required, &type_name, &aspects, RequiredOn::Parent);
        let children_required =
            model.required_permissions(&required, &type_name, &aspects, RequiredOn::Children);
        let atomic = model.is_atomic(&required);
        let recursive = atomic && parent_required.contains(&required);
        Self {
            required,
            type_name,
            aspects,
            granters,
            node_required,
            parent_required,
            children_required,
            atomic,
            recursive,
        }
    }

    /// Run the full test at `node`: seed the denial set with the chain
    /// union, then evaluate. A recursive test only passes if it resolved
    /// somewhere on the chain.
    pub(crate) fn check(
        &self,
        ctx: &mut EvalContext<'_>,
        node: &NodeRef,
        inherited: &DeniedSet,
        depth: usize,
    ) -> Result<bool> {
        let chain = ctx.chain_denials(node)?;
        let denied = merged(inherited, chain.as_ref());
        let mut resolved = false;
        let ok = self.evaluate(ctx, node, denied.as_ref(), &mut resolved, depth)?;
        Ok(ok && (!self.recursive || resolved))
    }

    fn evaluate(
        &self,
        ctx: &mut EvalContext<'_>,
        node: &NodeRef,
        denied: &DeniedSet,
        resolved: &mut bool,
        depth: usize,
    ) -> Result<bool> {
        let engine = ctx.engine;
        if depth > engine.config().max_depth {
            return Err(EngineError::RecursionLimit(engine.config().max_depth));
        }
        trace!(%node, required = %self.required, depth, "node test");

        let local = ctx.denials_at(node)?;
        let locally_denied = merged(denied, local.as_ref());

        // The permission itself; sets rely entirely on their members.
        if self.atomic {
            if self.recursive {
                if !*resolved && self.direct(ctx, node, locally_denied.as_ref())? {
                    *resolved = true;
                }
            } else if !self.direct(ctx, node, locally_denied.as_ref())? {
                return Ok(false);
            }
        }

        // Everything else required at this node; all must pass.
        for required in &self.node_required {
            let test = NodeTest::new(
                engine.model(),
                required.clone(),
                self.type_name.clone(),
                self.aspects.clone(),
            );
            if !test.check(ctx, node, locally_denied.as_ref(), depth + 1)? {
                return Ok(false);
            }
        }

        // Requirements on the parent, when inheritance is unbroken.
        if !self.parent_required.is_empty() {
            if let Some(parent) = engine.hierarchy().primary_parent(node)? {
                if ctx.inherits(node)? {
                    let parent_local = ctx.denials_at(&parent)?;
                    let denied_above = merged(locally_denied.as_ref(), parent_local.as_ref());
                    for required in &self.parent_required {
                        if *required == self.required {
                            // The recursive case: this same test continues
                            // up the chain carrying the resolution flag.
                            // Nothing left to find once resolved.
                            if !*resolved
                                && !self.evaluate(
                                    ctx,
                                    &parent,
                                    denied_above.as_ref(),
                                    resolved,
                                    depth + 1,
                                )?
                            {
                                return Ok(false);
                            }
                        } else {
                            let parent_type = engine.hierarchy().node_type(&parent)?;
                            let parent_aspects = engine.hierarchy().aspects(&parent)?;
                            let test = NodeTest::new(
                                engine.model(),
                                required.clone(),
                                parent_type,
                                parent_aspects,
                            );
                            if !test.check(ctx, &parent, denied_above.as_ref(), depth + 1)? {
                                return Ok(false);
                            }
                        }
                    }
                }
            }
        }

        // Requirements on every direct child, via fresh top-level
        // evaluations without this evaluation's denial set. The asymmetry
        // is deliberate: it prevents unbounded mutual recursion between
        // parent and child requirements.
        if !self.children_required.is_empty() {
            for child in engine.hierarchy().children(node)? {
                for required in &self.children_required {
                    if !engine.evaluate(&child, required, depth + 1)?.is_allowed() {
                        return Ok(false);
                    }
                }
            }
        }

        Ok(true)
    }

    /// Scan the node for an allow entry matching the authority set and
    /// the granting closure, subject to the denial veto. Global entries
    /// satisfy the requirement without a node lookup.
    fn direct(
        &self,
        ctx: &mut EvalContext<'_>,
        node: &NodeRef,
        denied: &DeniedSet,
    ) -> Result<bool> {
        let engine = ctx.engine;
        if engine.global_match(&self.granters, &ctx.authorities) {
            return Ok(true);
        }

        let Some(acl) = engine.acl().permissions(node)? else {
            return Ok(false);
        };
        for entry in &acl.entries {
            if !entry.allowed {
                continue;
            }
            if !ctx.authorities.contains(&entry.authority) {
                continue;
            }
            if !self.granters.contains(&entry.permission) {
                continue;
            }
            if denied.contains(&entry.authority, &entry.permission) {
                continue;
            }
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read() -> PermissionReference {
        PermissionReference::unscoped("Read")
    }

    #[test]
    fn test_denied_set_merge_and_lookup() {
        let mut a = DeniedSet::default();
        a.insert("frog", read());

        let mut b = DeniedSet::default();
        b.insert("frog", PermissionReference::unscoped("Write"));
        b.insert("lemur", read());

        a.merge(&b);
        assert!(a.contains("frog", &read()));
        assert!(a.contains("frog", &PermissionReference::unscoped("Write")));
        assert!(a.contains("lemur", &read()));
        assert!(!a.contains("andy", &read()));
    }

    #[test]
    fn test_merged_borrows_when_extra_empty() {
        let mut base = DeniedSet::default();
        base.insert("frog", read());
        let extra = DeniedSet::default();

        let out = merged(&base, &extra);
        assert!(matches!(out, Cow::Borrowed(_)));
    }
}
