//! The compiled, immutable permission model.
//!
//! Built once from a [`ModelDefinition`], validated, with the granting and
//! grantee closures precomputed. All queries are read-only; the evaluator
//! holds the model behind an `Arc` for the life of the process.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use canopy_core::{AccessControlEntry, PermissionReference, QName};

use crate::definition::{
    ModelDefinition, PermissionDefinition, PermissionKind, RequiredOn,
};
use crate::error::{ModelError, Result};

/// The reserved wildcard names; neither may be declared in a definition.
const RESERVED_NAMES: [&str; 2] = ["All", "all"];

/// The compiled permission model.
///
/// Immutable after [`PermissionModel::build`]; no ambient statics.
pub struct PermissionModel {
    /// Per-permission compiled info.
    permissions: HashMap<PermissionReference, PermissionInfo>,

    /// Name index; names are unique by validation.
    by_name: HashMap<String, PermissionReference>,

    /// For each permission, the permissions whose holding implies it
    /// (reflexive, transitive, includes both wildcard forms).
    granters: HashMap<PermissionReference, HashSet<PermissionReference>>,

    /// For each permission, the permissions it implies (reflexive,
    /// transitive).
    grantees: HashMap<PermissionReference, HashSet<PermissionReference>>,

    /// ACL-independent allow entries.
    globals: Vec<AccessControlEntry>,
}

struct PermissionInfo {
    kind: PermissionKind,
    exposed: bool,
    context: Option<QName>,
    node_required: Vec<PermissionReference>,
    parent_required: Vec<PermissionReference>,
    children_required: Vec<PermissionReference>,
}

impl PermissionModel {
    /// Compile a definition into a model.
    ///
    /// Validates that names are unique and unreserved, that every
    /// referenced name is declared, that sets have members, and that the
    /// grants graph is acyclic.
    pub fn build(def: ModelDefinition) -> Result<Self> {
        let mut by_name: HashMap<String, PermissionReference> = HashMap::new();
        for p in &def.permissions {
            if RESERVED_NAMES.contains(&p.name.as_str()) {
                return Err(ModelError::ReservedName(p.name.clone()));
            }
            let reference = reference_of(p);
            if by_name.insert(p.name.clone(), reference).is_some() {
                return Err(ModelError::DuplicatePermission(p.name.clone()));
            }
        }

        let resolve = |name: &str, referenced_by: &str| -> Result<PermissionReference> {
            by_name
                .get(name)
                .cloned()
                .ok_or_else(|| ModelError::UnknownPermission {
                    name: name.to_string(),
                    referenced_by: referenced_by.to_string(),
                })
        };

        // Compile per-permission info; a set's grants double as its
        // NODE-relation requirements.
        let mut permissions = HashMap::new();
        let mut grants_edges: HashMap<PermissionReference, Vec<PermissionReference>> =
            HashMap::new();
        for p in &def.permissions {
            let reference = by_name[&p.name].clone();

            let mut granted = Vec::new();
            for name in &p.grants {
                granted.push(resolve(name, &p.name)?);
            }
            if p.kind == PermissionKind::Set && granted.is_empty() {
                return Err(ModelError::EmptySet(p.name.clone()));
            }

            let mut node_required: Vec<PermissionReference> = if p.kind == PermissionKind::Set {
                granted.clone()
            } else {
                Vec::new()
            };
            let mut parent_required = Vec::new();
            let mut children_required = Vec::new();
            for r in &p.required {
                let required = resolve(&r.name, &p.name)?;
                match r.on {
                    RequiredOn::Node => node_required.push(required),
                    RequiredOn::Parent => parent_required.push(required),
                    RequiredOn::Children => children_required.push(required),
                }
            }

            grants_edges.insert(reference.clone(), granted);
            permissions.insert(
                reference,
                PermissionInfo {
                    kind: p.kind,
                    exposed: p.exposed,
                    context: p.context.clone(),
                    node_required,
                    parent_required,
                    children_required,
                },
            );
        }

        let grantees = compute_grantee_closures(&grants_edges)?;

        // Invert for the granting direction, then add the wildcard: an
        // entry for ALL_PERMISSIONS matches any requirement.
        let all = PermissionReference::all();
        let legacy_all = PermissionReference::legacy_all();
        let mut granters: HashMap<PermissionReference, HashSet<PermissionReference>> =
            HashMap::new();
        for (holder, implied) in &grantees {
            for target in implied {
                granters
                    .entry(target.clone())
                    .or_default()
                    .insert(holder.clone());
            }
        }
        for set in granters.values_mut() {
            set.insert(all.clone());
            set.insert(legacy_all.clone());
        }

        let mut globals = Vec::new();
        for g in &def.globals {
            let permission = if RESERVED_NAMES.contains(&g.permission.as_str()) {
                all.clone()
            } else {
                resolve(&g.permission, "globals")?
            };
            globals.push(AccessControlEntry::allow(g.authority.clone(), permission));
        }

        info!(
            permissions = permissions.len(),
            globals = globals.len(),
            "permission model compiled"
        );

        Ok(Self {
            permissions,
            by_name,
            granters,
            grantees,
            globals,
        })
    }

    /// Compile a model from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::build(ModelDefinition::from_json(json)?)
    }

    /// Compile a model from a JSON definition file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading permission model definition");
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Whether the reference is declared in this model. Both wildcard
    /// forms count as declared.
    pub fn is_declared(&self, reference: &PermissionReference) -> bool {
        reference.is_all() || self.permissions.contains_key(reference)
    }

    /// Resolve a permission name to its declared reference.
    ///
    /// Returns `None` on a benign miss; `"All"` resolves to the wildcard.
    pub fn reference(&self, name: &str) -> Option<PermissionReference> {
        if RESERVED_NAMES.contains(&name) {
            return Some(PermissionReference::all());
        }
        self.by_name.get(name).cloned()
    }

    /// Whether the reference is a concrete permission rather than a set
    /// alias. The wildcard is treated as concrete so entries naming it
    /// are matched directly.
    pub fn is_atomic(&self, reference: &PermissionReference) -> bool {
        if reference.is_all() {
            return true;
        }
        self.permissions
            .get(reference)
            .map(|info| info.kind == PermissionKind::Permission)
            .unwrap_or(false)
    }

    /// The permissions settable on a node of the given type and aspects.
    ///
    /// The wildcard is not included; callers that need it add it.
    pub fn exposed_permissions(
        &self,
        type_name: &QName,
        aspects: &HashSet<QName>,
    ) -> HashSet<PermissionReference> {
        self.permissions
            .iter()
            .filter(|(_, info)| info.exposed && applies_to(info, type_name, aspects))
            .map(|(reference, _)| reference.clone())
            .collect()
    }

    /// The permissions whose holding implies `reference` (reflexive,
    /// transitive, includes both wildcard forms). Empty on a benign miss.
    pub fn granting_permissions(
        &self,
        reference: &PermissionReference,
    ) -> HashSet<PermissionReference> {
        if reference.is_all() {
            return [PermissionReference::all(), PermissionReference::legacy_all()]
                .into_iter()
                .collect();
        }
        self.granters.get(reference).cloned().unwrap_or_default()
    }

    /// The permissions implied by holding `reference` (reflexive,
    /// transitive). For the wildcard: every declared permission.
    pub fn grantee_permissions(
        &self,
        reference: &PermissionReference,
    ) -> HashSet<PermissionReference> {
        if reference.is_all() {
            let mut set: HashSet<PermissionReference> =
                self.permissions.keys().cloned().collect();
            set.insert(PermissionReference::all());
            set.insert(PermissionReference::legacy_all());
            return set;
        }
        self.grantees.get(reference).cloned().unwrap_or_default()
    }

    /// The additional permissions required to exercise `reference`, for
    /// the given relation.
    ///
    /// NODE requirements are filtered by applicability to the node's type
    /// and aspects; PARENT and CHILDREN requirements are tested at other
    /// nodes and pass through unfiltered. The wildcard behaves as a
    /// recursive permission: its only requirement is itself on the parent.
    pub fn required_permissions(
        &self,
        reference: &PermissionReference,
        type_name: &QName,
        aspects: &HashSet<QName>,
        on: RequiredOn,
    ) -> Vec<PermissionReference> {
        if reference.is_all() {
            return match on {
                RequiredOn::Parent => vec![reference.clone()],
                _ => Vec::new(),
            };
        }
        let Some(info) = self.permissions.get(reference) else {
            return Vec::new();
        };
        match on {
            RequiredOn::Node => info
                .node_required
                .iter()
                .filter(|r| {
                    self.permissions
                        .get(*r)
                        .map(|ri| applies_to(ri, type_name, aspects))
                        .unwrap_or(false)
                })
                .cloned()
                .collect(),
            RequiredOn::Parent => info.parent_required.clone(),
            RequiredOn::Children => info.children_required.clone(),
        }
    }

    /// The ACL-independent allow entries.
    pub fn global_entries(&self) -> &[AccessControlEntry] {
        &self.globals
    }
}

fn reference_of(p: &PermissionDefinition) -> PermissionReference {
    match &p.context {
        Some(context) => PermissionReference::scoped(context.clone(), &p.name),
        None => PermissionReference::unscoped(&p.name),
    }
}

fn applies_to(info: &PermissionInfo, type_name: &QName, aspects: &HashSet<QName>) -> bool {
    match &info.context {
        None => true,
        Some(context) => context == type_name || aspects.contains(context),
    }
}

/// Compute the reflexive transitive closure of the grants graph, failing
/// on a cycle.
fn compute_grantee_closures(
    edges: &HashMap<PermissionReference, Vec<PermissionReference>>,
) -> Result<HashMap<PermissionReference, HashSet<PermissionReference>>> {
    #[derive(PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        reference: &PermissionReference,
        edges: &HashMap<PermissionReference, Vec<PermissionReference>>,
        marks: &mut HashMap<PermissionReference, Mark>,
        closures: &mut HashMap<PermissionReference, HashSet<PermissionReference>>,
    ) -> Result<()> {
        match marks.get(reference) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(ModelError::GrantCycle(reference.name().to_string()))
            }
            None => {}
        }
        marks.insert(reference.clone(), Mark::Visiting);

        let mut closure = HashSet::new();
        closure.insert(reference.clone());
        for granted in edges.get(reference).map(Vec::as_slice).unwrap_or(&[]) {
            visit(granted, edges, marks, closures)?;
            closure.extend(closures[granted].iter().cloned());
        }

        marks.insert(reference.clone(), Mark::Done);
        closures.insert(reference.clone(), closure);
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut closures = HashMap::new();
    for reference in edges.keys() {
        visit(reference, edges, &mut marks, &mut closures)?;
    }
    Ok(closures)
}
