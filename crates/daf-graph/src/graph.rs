//! The session repository graph and its builder.
//!
//! [`RepositoryGraph`] is an arena: configurations and live nodes are stored
//! in parallel vectors addressed by [`NodeId`], with a [`RootKey`] index for
//! deduplication. Parent links stay as root strings inside each
//! configuration and are resolved through the index.
//!
//! # Search order
//!
//! 1. Read-capable outputs, in declaration order.
//! 2. Explicit inputs, in declaration order, each immediately followed by
//!    its not yet placed ancestors in depth-first order.
//! 3. Stored parents of read-capable outputs not reached by step 2.
//!
//! A root is placed at most once. Parents inherit the tags of the node that
//! reached them; a root reached under several tag sets carries their union.
//!
//! # Construction
//!
//! [`GraphBuilder::build`] validates every argument, loads or plans every
//! configuration, resolves mappers and walks the whole parent graph before it
//! writes anything. Configuration records are created or extended only once
//! the graph is known to be valid.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use daf_mapper::{Mapper, MapperError, MapperId, MapperInit, MapperRegistry, MapperResolver};
use daf_store::{ConfigStore, RepositoryCfg};
use daf_types::{Mode, RepoRoot, RootKey, TagSet};

use crate::args::RepositoryArgs;
use crate::error::{GraphError, GraphResult};
use crate::node::{NodeId, RepositoryNode};

/// Knobs for [`GraphBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildOptions {
    /// Record explicit inputs as parents of existing outputs.
    pub promote_inputs_to_parents: bool,
    /// Persist configurations synthesized for inputs that had none.
    pub persist_input_configs: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            promote_inputs_to_parents: true,
            persist_input_configs: false,
        }
    }
}

/// The repositories of one session.
#[derive(Debug, Default)]
pub struct RepositoryGraph {
    cfgs: Vec<RepositoryCfg>,
    nodes: Vec<RepositoryNode>,
    index: HashMap<RootKey, NodeId>,
    search: Vec<NodeId>,
    outputs: Vec<NodeId>,
}

impl RepositoryGraph {
    /// Start building a graph against `store`, resolving mapper names
    /// through `registry`.
    pub fn builder<'a>(store: &'a ConfigStore, registry: &'a MapperRegistry) -> GraphBuilder<'a> {
        GraphBuilder::new(store, registry)
    }

    /// Number of repositories in the arena, searched or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &RepositoryNode {
        &self.nodes[id.0]
    }

    /// The configuration of a node, as loaded or created for this session.
    pub fn cfg(&self, id: NodeId) -> &RepositoryCfg {
        &self.cfgs[id.0]
    }

    /// The node for `root`, if it is part of the session.
    pub fn find(&self, root: &RepoRoot) -> Option<&RepositoryNode> {
        self.index.get(&root.key()).map(|id| self.node(*id))
    }

    /// Every node in arena order.
    pub fn all(&self) -> impl Iterator<Item = &RepositoryNode> {
        self.nodes.iter()
    }

    /// Searched nodes, in search order.
    pub fn inputs(&self) -> impl Iterator<Item = &RepositoryNode> {
        self.search.iter().map(|id| self.node(*id))
    }

    /// Output nodes, in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = &RepositoryNode> {
        self.outputs.iter().map(|id| self.node(*id))
    }

    /// Searched nodes admitted by `tags`, in search order.
    pub fn search<'g, 't>(&'g self, tags: &'t TagSet) -> impl Iterator<Item = &'g RepositoryNode> + 't
    where
        'g: 't,
    {
        self.inputs().filter(move |n| n.admits(tags))
    }

    // ---------------------------------------------------------------
    // Construction helpers
    // ---------------------------------------------------------------

    fn insert(&mut self, plan: Plan) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.index.insert(plan.key.clone(), id);
        self.nodes.push(RepositoryNode {
            id,
            root: plan.root,
            key: plan.key,
            mapper: plan.mapper,
            storage: plan.storage,
            tags: plan.tags,
            mode: plan.mode,
        });
        self.cfgs.push(plan.cfg);
        id
    }

    fn parent_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.cfgs[id.0]
            .parent_roots()
            .unwrap_or_default()
            .iter()
            .filter_map(|p| self.index.get(&p.key()).copied())
            .collect()
    }

    /// Add `tags` to `from` and to every known ancestor lacking them.
    fn spread_tags(&mut self, from: NodeId, tags: &TagSet) {
        if tags.is_empty() {
            return;
        }
        let mut pending = vec![from];
        while let Some(id) = pending.pop() {
            let node = &mut self.nodes[id.0];
            let before = node.tags.len();
            node.tags.union_with(tags);
            if node.tags.len() != before {
                pending.extend(self.parent_ids(id));
            }
        }
    }
}

// ---------------------------------------------------------------
// Builder
// ---------------------------------------------------------------

/// What to write once the graph has been validated.
#[derive(Debug)]
enum Commit {
    Nothing,
    Create,
    AppendParents(Vec<RepoRoot>),
}

/// A repository whose configuration and mapper are resolved but not yet
/// placed in a graph.
struct Plan {
    root: RepoRoot,
    key: RootKey,
    cfg: RepositoryCfg,
    mapper: Option<Arc<dyn Mapper>>,
    mapper_id: Option<MapperId>,
    storage: Arc<dyn daf_store::Storage>,
    tags: TagSet,
    mode: Mode,
    commit: Commit,
}

enum InputPlan {
    Own(Plan),
    /// An input naming the root of a declared output.
    Output(usize, TagSet),
}

#[derive(Default)]
struct Walk {
    placed: HashSet<NodeId>,
    expanded: HashSet<NodeId>,
    stack: Vec<NodeId>,
}

/// Builds a [`RepositoryGraph`] from ordered input and output arguments.
pub struct GraphBuilder<'a> {
    store: &'a ConfigStore,
    registry: &'a MapperRegistry,
    options: BuildOptions,
    inputs: Vec<RepositoryArgs>,
    outputs: Vec<RepositoryArgs>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(store: &'a ConfigStore, registry: &'a MapperRegistry) -> Self {
        Self {
            store,
            registry,
            options: BuildOptions::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Append one input; order is search priority.
    pub fn input(mut self, args: impl Into<RepositoryArgs>) -> Self {
        self.inputs.push(args.into());
        self
    }

    pub fn inputs<A: Into<RepositoryArgs>>(mut self, args: impl IntoIterator<Item = A>) -> Self {
        self.inputs.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append one output; every put fans out to all outputs in order.
    pub fn output(mut self, args: impl Into<RepositoryArgs>) -> Self {
        self.outputs.push(args.into());
        self
    }

    pub fn outputs<A: Into<RepositoryArgs>>(mut self, args: impl IntoIterator<Item = A>) -> Self {
        self.outputs.extend(args.into_iter().map(Into::into));
        self
    }

    /// Validate the arguments, resolve every repository and compute the
    /// search order, then persist new or extended configurations.
    ///
    /// Any error leaves the stored configurations untouched, except for a
    /// creation racing with another process.
    pub fn build(self) -> GraphResult<RepositoryGraph> {
        // Output identities first, so inputs naming an output can refer to it.
        let mut output_roots = Vec::with_capacity(self.outputs.len());
        let mut output_keys: HashMap<RootKey, usize> = HashMap::new();
        for args in &self.outputs {
            let root = args.repo_root()?;
            let mode = args.mode.unwrap_or(Mode::Write);
            if !mode.is_writable() {
                return Err(GraphError::InvalidArgs(format!(
                    "output {root} must be opened for writing, got mode {mode}"
                )));
            }
            let key = root.key();
            if output_keys.insert(key.clone(), output_roots.len()).is_some() {
                return Err(GraphError::InvalidArgs(format!("output {root} declared twice")));
            }
            output_roots.push((root, key, mode));
        }

        let mut input_plans: Vec<InputPlan> = Vec::with_capacity(self.inputs.len());
        let mut seen: HashMap<RootKey, usize> = HashMap::new();
        // Inputs naming a declared output, checked once output plans exist.
        let mut aliases: Vec<(usize, &RepositoryArgs)> = Vec::new();
        for args in &self.inputs {
            let root = args.repo_root()?;
            let mode = args.mode.unwrap_or(Mode::Read);
            if mode != Mode::Read {
                return Err(GraphError::InvalidArgs(format!(
                    "input {root} must be opened read-only, got mode {mode}"
                )));
            }
            let key = root.key();
            if let Some(&pos) = seen.get(&key) {
                match &mut input_plans[pos] {
                    InputPlan::Own(plan) => {
                        self.check_override(&root, &plan.cfg, args)?;
                        plan.tags.union_with(&args.tags);
                    }
                    InputPlan::Output(out, tags) => {
                        aliases.push((*out, args));
                        tags.union_with(&args.tags);
                    }
                }
                continue;
            }
            seen.insert(key.clone(), input_plans.len());
            match output_keys.get(&key) {
                Some(&out) => {
                    aliases.push((out, args));
                    input_plans.push(InputPlan::Output(out, args.tags.clone()));
                }
                None => input_plans.push(InputPlan::Own(self.plan_input(args, root, key)?)),
            }
        }

        let own_inputs = || {
            input_plans.iter().filter_map(|p| match p {
                InputPlan::Own(plan) => Some(plan),
                InputPlan::Output(..) => None,
            })
        };
        let parent_roots: Vec<RepoRoot> = own_inputs().map(|p| p.root.clone()).collect();
        let candidates: Vec<Option<MapperId>> = own_inputs()
            .map(|p| {
                p.mapper_id
                    .clone()
                    .or_else(|| p.cfg.mapper.clone().map(MapperId::Name))
            })
            .collect();

        let mut output_plans = Vec::with_capacity(self.outputs.len());
        for (args, (root, key, mode)) in self.outputs.iter().zip(output_roots) {
            output_plans.push(self.plan_output(args, root, key, mode, &parent_roots, &candidates)?);
        }
        for (out, args) in aliases {
            let plan = &output_plans[out];
            self.check_override(&plan.root, &plan.cfg, args)?;
        }

        let mut graph = RepositoryGraph::default();
        let mut commits = Vec::new();
        for mut plan in output_plans {
            let commit = std::mem::replace(&mut plan.commit, Commit::Nothing);
            let id = graph.insert(plan);
            graph.outputs.push(id);
            commits.push((id, commit));
        }
        let mut input_ids = Vec::with_capacity(input_plans.len());
        for plan in input_plans {
            let id = match plan {
                InputPlan::Own(mut plan) => {
                    let commit = std::mem::replace(&mut plan.commit, Commit::Nothing);
                    let id = graph.insert(plan);
                    commits.push((id, commit));
                    id
                }
                InputPlan::Output(out, tags) => {
                    let id = graph.outputs[out];
                    graph.nodes[id.0].tags.union_with(&tags);
                    id
                }
            };
            input_ids.push(id);
        }

        let readable: Vec<NodeId> = graph
            .outputs
            .iter()
            .copied()
            .filter(|id| graph.nodes[id.0].mode.is_readable())
            .collect();
        let mut walk = Walk::default();
        for &id in &readable {
            place(&mut graph, &mut walk, id);
        }
        for id in input_ids {
            place(&mut graph, &mut walk, id);
            self.expand(&mut graph, &mut walk, id)?;
        }
        for id in readable {
            self.expand(&mut graph, &mut walk, id)?;
        }

        for (id, commit) in commits {
            self.commit(&mut graph, id, commit)?;
        }

        info!(
            searched = graph.search.len(),
            outputs = graph.outputs.len(),
            repositories = graph.nodes.len(),
            "repository graph built"
        );
        Ok(graph)
    }

    fn plan_input(&self, args: &RepositoryArgs, root: RepoRoot, key: RootKey) -> GraphResult<Plan> {
        let (cfg, commit) = match self.store.load(&root)? {
            Some(stored) => {
                self.check_override(&root, &stored, args)?;
                (stored, Commit::Nothing)
            }
            None => {
                let cfg = self
                    .synthesize_input(&root, args)?
                    .ok_or_else(|| GraphError::ConfigNotFound(root.to_string()))?;
                let persist = self.options.persist_input_configs;
                debug!(root = %root, persist, "synthesized input configuration");
                (cfg, if persist { Commit::Create } else { Commit::Nothing })
            }
        };
        self.plan(root, key, cfg, args.mapper.clone(), args.tags.clone(), Mode::Read, commit)
    }

    fn plan_output(
        &self,
        args: &RepositoryArgs,
        root: RepoRoot,
        key: RootKey,
        mode: Mode,
        parents: &[RepoRoot],
        candidates: &[Option<MapperId>],
    ) -> GraphResult<Plan> {
        let (cfg, commit) = match self.store.load(&root)? {
            Some(mut stored) => {
                self.check_override(&root, &stored, args)?;
                let missing: Vec<RepoRoot> = parents
                    .iter()
                    .filter(|p| !stored.has_parent(&p.key()))
                    .cloned()
                    .collect();
                if self.options.promote_inputs_to_parents && !missing.is_empty() {
                    stored.parents.extend(missing.iter().map(ToString::to_string));
                    (stored, Commit::AppendParents(missing))
                } else {
                    (stored, Commit::Nothing)
                }
            }
            None => {
                let mut cfg = args.cfg.clone().unwrap_or_else(|| RepositoryCfg::new(&root));
                cfg.root = root.to_string();
                cfg.storage = root.kind();

                let explicit = args
                    .mapper
                    .clone()
                    .or_else(|| cfg.mapper.clone().map(MapperId::Name));
                cfg.mapper = MapperResolver::new(self.registry)
                    .resolve(explicit.as_ref(), candidates.iter().map(Option::as_ref))
                    .map_err(|e| match e {
                        MapperError::Ambiguous(candidates) => GraphError::AmbiguousMapper {
                            root: root.to_string(),
                            candidates,
                        },
                        other => other.into(),
                    })?;
                if let Some(mapper_args) = &args.mapper_args {
                    cfg.mapper_args = Some(mapper_args.clone());
                }
                for parent in parents {
                    if !cfg.has_parent(&parent.key()) {
                        cfg.parents.push(parent.to_string());
                    }
                }
                (cfg, Commit::Create)
            }
        };
        self.plan(root, key, cfg, args.mapper.clone(), args.tags.clone(), mode, commit)
    }

    #[allow(clippy::too_many_arguments)]
    fn plan(
        &self,
        root: RepoRoot,
        key: RootKey,
        cfg: RepositoryCfg,
        mapper_id: Option<MapperId>,
        tags: TagSet,
        mode: Mode,
        commit: Commit,
    ) -> GraphResult<Plan> {
        let storage = Arc::clone(self.store.storages().for_root(&root));
        let mapper = self.instantiate(&root, &cfg, mapper_id.as_ref())?;
        Ok(Plan {
            root,
            key,
            cfg,
            mapper,
            mapper_id,
            storage,
            tags,
            mode,
            commit,
        })
    }

    /// A record for an input that has none stored: taken from the supplied
    /// configuration, or built around an explicit mapper.
    fn synthesize_input(&self, root: &RepoRoot, args: &RepositoryArgs) -> GraphResult<Option<RepositoryCfg>> {
        let mut cfg = match (&args.cfg, &args.mapper) {
            (Some(cfg), _) => cfg.clone(),
            (None, Some(_)) => RepositoryCfg::new(root),
            (None, None) => return Ok(None),
        };
        cfg.root = root.to_string();
        cfg.storage = root.kind();
        if let Some(mapper) = &args.mapper {
            cfg.mapper = Some(self.registry.canonical(mapper)?);
        }
        if let Some(mapper_args) = &args.mapper_args {
            cfg.mapper_args = Some(mapper_args.clone());
        }
        Ok(Some(cfg))
    }

    /// Fail if `args` asks for something the stored record contradicts.
    fn check_override(&self, root: &RepoRoot, stored: &RepositoryCfg, args: &RepositoryArgs) -> GraphResult<()> {
        let mismatch = |field, stored: String, requested: String| GraphError::ConfigMismatch {
            root: root.to_string(),
            field,
            stored,
            requested,
        };

        let requested_mapper = args.mapper.clone().or_else(|| {
            args.cfg
                .as_ref()
                .and_then(|c| c.mapper.clone())
                .map(MapperId::Name)
        });
        if let (Some(requested), Some(persisted)) = (requested_mapper, &stored.mapper) {
            let requested = self.registry.canonical(&requested)?;
            let persisted = self
                .registry
                .canonical(&MapperId::name(persisted.as_str()))
                .unwrap_or_else(|_| persisted.clone());
            if requested != persisted {
                return Err(mismatch("mapper", persisted, requested));
            }
        }

        let requested_args = args
            .mapper_args
            .as_ref()
            .or_else(|| args.cfg.as_ref().and_then(|c| c.mapper_args.as_ref()));
        if let Some(requested) = requested_args {
            if stored.mapper_args.as_ref() != Some(requested) {
                let persisted = stored
                    .mapper_args
                    .as_ref()
                    .map_or_else(|| "none".to_string(), ToString::to_string);
                return Err(mismatch("mapperArgs", persisted, requested.to_string()));
            }
        }

        if let Some(cfg) = &args.cfg {
            if cfg.storage != stored.storage {
                return Err(mismatch("storage", stored.storage.to_string(), cfg.storage.to_string()));
            }
            for parent in cfg.parent_roots()? {
                if !stored.has_parent(&parent.key()) {
                    return Err(mismatch("parents", stored.parents.join(", "), parent.to_string()));
                }
            }
        }
        Ok(())
    }

    fn instantiate(
        &self,
        root: &RepoRoot,
        cfg: &RepositoryCfg,
        explicit: Option<&MapperId>,
    ) -> GraphResult<Option<Arc<dyn Mapper>>> {
        let id = match (explicit, &cfg.mapper) {
            (Some(id), _) => id.clone(),
            (None, Some(name)) => MapperId::name(name.as_str()),
            (None, None) => return Ok(None),
        };
        let init = MapperInit {
            root: root.clone(),
            args: cfg.mapper_args.clone(),
            storage: Arc::clone(self.store.storages().for_root(root)),
        };
        Ok(Some(self.registry.instantiate(&id, &init)?))
    }

    /// Depth-first placement of the ancestors of `id`.
    fn expand(&self, graph: &mut RepositoryGraph, walk: &mut Walk, id: NodeId) -> GraphResult<()> {
        if !walk.expanded.insert(id) {
            return Ok(());
        }
        walk.stack.push(id);

        for parent in graph.cfgs[id.0].parent_roots()? {
            let key = parent.key();
            let pid = match graph.index.get(&key).copied() {
                Some(pid) => pid,
                None => {
                    let cfg = self
                        .store
                        .load(&parent)?
                        .ok_or_else(|| GraphError::ConfigNotFound(parent.to_string()))?;
                    let plan = self.plan(parent, key, cfg, None, TagSet::new(), Mode::Read, Commit::Nothing)?;
                    graph.insert(plan)
                }
            };

            if let Some(pos) = walk.stack.iter().position(|s| *s == pid) {
                let mut chain: Vec<String> = walk.stack[pos..]
                    .iter()
                    .map(|s| graph.nodes[s.0].root.to_string())
                    .collect();
                chain.push(graph.nodes[pid.0].root.to_string());
                return Err(GraphError::CycleDetected { chain });
            }

            let tags = graph.nodes[id.0].tags.clone();
            graph.spread_tags(pid, &tags);
            place(graph, walk, pid);
            self.expand(graph, walk, pid)?;
        }

        walk.stack.pop();
        Ok(())
    }

    fn commit(&self, graph: &mut RepositoryGraph, id: NodeId, commit: Commit) -> GraphResult<()> {
        let root = graph.nodes[id.0].root.clone();
        match commit {
            Commit::Nothing => {}
            Commit::Create => {
                let created = self.store.create(&root, &graph.cfgs[id.0])?;
                graph.cfgs[id.0] = created;
            }
            Commit::AppendParents(parents) => {
                for parent in &parents {
                    if self.store.append_parent(&root, parent)? {
                        debug!(root = %root, parent = %parent, "promoted input to parent");
                    }
                }
            }
        }
        Ok(())
    }
}

fn place(graph: &mut RepositoryGraph, walk: &mut Walk, id: NodeId) {
    if walk.placed.insert(id) {
        debug!(
            root = %graph.nodes[id.0].root,
            position = graph.search.len(),
            tags = %graph.nodes[id.0].tags,
            "placed repository in search order"
        );
        graph.search.push(id);
    }
}
