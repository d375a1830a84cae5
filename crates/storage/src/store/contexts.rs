#![forbid(unsafe_code)]

use super::nodes::{ensure_project_tx, insert_nodes_tx};
use super::{
    AppendRequest, ContextSummary, ContextView, CreateContextRequest, DeleteRequest, ForkRequest,
    GetContextRequest, ListContextsRequest, Message, MessageInput, MessageRef, NodeReader,
    SqliteStore, StoreError, UpdateRequest, WriteResult, canonicalize_project,
};
use rusqlite::TransactionBehavior;
use serde_json::{Map, Value, json};
use uc_core::model::{OPERATION_DELETE, OPERATION_FORK, OPERATION_UPDATE};
use uc_core::{
    Node, NodeKind, NodeMetadata, NodeSource, NodeSpec, build_node_insert_records, find_head,
    find_tail, get_chain, get_versions,
};

const RESERVED_METADATA_KEYS: [&str; 2] = ["operation", "affected"];

impl SqliteStore {
    pub fn create_context(
        &self,
        request: CreateContextRequest,
    ) -> Result<ContextSummary, StoreError> {
        let project_id = canonicalize_project(&request.project_id)?;
        reject_reserved_keys(&request.metadata)?;
        let specs = message_specs(request.messages)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_project_tx(&tx, &project_id, request.created_at_ms)?;

        let root_records = build_node_insert_records(
            vec![NodeSpec::context(NodeMetadata::user(request.metadata), None)],
            &project_id,
            None,
            None,
        );
        let Some(root) = insert_nodes_tx(&tx, root_records, request.created_at_ms)?.pop() else {
            return Err(StoreError::InvalidInput("context record was not planned"));
        };

        let message_records =
            build_node_insert_records(specs, &project_id, Some(&root.public_id), None);
        let messages = insert_nodes_tx(&tx, message_records, request.created_at_ms)?;

        tx.commit()?;
        tracing::debug!(
            context_id = %root.public_id,
            messages = messages.len(),
            "context created"
        );
        Ok(ContextSummary::from(root))
    }

    pub fn list_contexts(
        &self,
        request: ListContextsRequest,
    ) -> Result<Vec<ContextSummary>, StoreError> {
        let project_id = canonicalize_project(&request.project_id)?;
        let conn = self.conn()?;
        let reader = NodeReader::new(&conn, &project_id);
        Ok(reader
            .list_root_contexts(request.limit, request.offset)?
            .into_iter()
            .map(ContextSummary::from)
            .collect())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(context_id = %request.context_id))]
    pub fn get_context(&self, request: GetContextRequest) -> Result<ContextView, StoreError> {
        let project_id = canonicalize_project(&request.project_id)?;
        let mut conn = self.conn()?;
        // Deferred transaction: every read below sees the same snapshot.
        let tx = conn.transaction()?;
        let reader = NodeReader::new(&tx, &project_id);

        let lineage = Lineage::load(&reader, &request.context_id)?;
        let (version, head) = match request.version {
            Some(version) => (version, lineage.head_at(version)?),
            None => (lineage.head_version(), &lineage.head),
        };
        let chain = get_chain(&reader, &head.public_id)?;

        Ok(ContextView {
            id: lineage.root_id.clone(),
            head_id: head.public_id.clone(),
            data: Message::from_chain(chain, 0),
            version,
            versions: request.history.then(|| get_versions(&lineage.heads)),
        })
    }

    /// Extends the canonical head's message chain; no new version is created.
    #[tracing::instrument(level = "debug", skip_all, fields(context_id = %request.context_id))]
    pub fn append_messages(&self, request: AppendRequest) -> Result<WriteResult, StoreError> {
        let project_id = canonicalize_project(&request.project_id)?;
        if request.messages.is_empty() {
            return Err(StoreError::InvalidInput("messages must not be empty"));
        }
        let specs = message_specs(request.messages)?;
        let root_id = self.root_id_of(&project_id, &request.context_id)?;

        self.with_lineage_write_lock(&root_id, || {
            let mut conn = self.conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let reader = NodeReader::new(&tx, &project_id);

            let lineage = Lineage::load(&reader, &root_id)?;
            let head_id = lineage.head.public_id.as_str();
            let tail = find_tail(&reader, head_id)?;
            let existing = reader.count_chain(head_id)?;

            let records = build_node_insert_records(
                specs,
                &project_id,
                Some(head_id),
                tail.as_ref().map(|node| node.public_id.as_str()),
            );
            let inserted = insert_nodes_tx(&tx, records, request.created_at_ms)?;
            let result = WriteResult {
                head_id: head_id.to_string(),
                data: Message::from_chain(inserted, existing),
                version: lineage.head_version(),
            };

            tx.commit()?;
            Ok(result)
        })
    }

    /// New version with the addressed messages replaced.
    pub fn update_messages(&self, request: UpdateRequest) -> Result<WriteResult, StoreError> {
        let project_id = canonicalize_project(&request.project_id)?;
        if request.updates.is_empty() {
            return Err(StoreError::InvalidInput("updates must not be empty"));
        }
        for update in &request.updates {
            if update.content.is_none() && update.metadata.is_none() {
                return Err(StoreError::InvalidInput(
                    "update must replace content or metadata",
                ));
            }
            if let Some(metadata) = &update.metadata {
                reject_reserved_keys(metadata)?;
            }
        }
        let updates = request.updates;

        self.commit_version(
            &project_id,
            &request.context_id,
            request.created_at_ms,
            VersionBase::Head,
            |mut chain| {
                let mut affected = Vec::new();
                for update in updates {
                    let target = update
                        .target()
                        .ok_or(StoreError::InvalidInput("update needs an id or an index"))?;
                    let index = locate(&chain, &target)?;
                    let node = &mut chain[index];
                    if let Some(content) = update.content {
                        node.content = content;
                    }
                    if let Some(metadata) = update.metadata {
                        node.metadata = NodeMetadata::user(metadata);
                    }
                    if !affected.contains(&node.public_id) {
                        affected.push(node.public_id.clone());
                    }
                }
                Ok((
                    NodeMetadata::operation(OPERATION_UPDATE, Some(affected)),
                    copy_specs(chain),
                ))
            },
        )
    }

    /// New version without the addressed messages.
    pub fn delete_messages(&self, request: DeleteRequest) -> Result<WriteResult, StoreError> {
        let project_id = canonicalize_project(&request.project_id)?;
        if request.targets.is_empty() {
            return Err(StoreError::InvalidInput("targets must not be empty"));
        }
        let targets = request.targets;

        self.commit_version(
            &project_id,
            &request.context_id,
            request.created_at_ms,
            VersionBase::Head,
            |chain| {
                let mut removed = vec![false; chain.len()];
                let mut affected = Vec::new();
                for target in &targets {
                    let index = locate(&chain, target)?;
                    if !removed[index] {
                        removed[index] = true;
                        affected.push(chain[index].public_id.clone());
                    }
                }
                let kept = chain
                    .into_iter()
                    .zip(removed)
                    .filter(|(_, removed)| !removed)
                    .map(|(node, _)| node)
                    .collect();
                Ok((
                    NodeMetadata::operation(OPERATION_DELETE, Some(affected)),
                    copy_specs(kept),
                ))
            },
        )
    }

    /// Branches off an older version. The fork is newest, so it becomes the
    /// canonical head.
    pub fn fork_context(&self, request: ForkRequest) -> Result<WriteResult, StoreError> {
        let project_id = canonicalize_project(&request.project_id)?;
        let from_version = request.version;

        self.commit_version(
            &project_id,
            &request.context_id,
            request.created_at_ms,
            VersionBase::At(from_version),
            |chain| {
                let mut metadata = NodeMetadata::operation(OPERATION_FORK, None);
                metadata
                    .extra
                    .insert("from_version".to_string(), json!(from_version));
                Ok((metadata, copy_specs(chain)))
            },
        )
    }

    fn root_id_of(&self, project_id: &str, context_id: &str) -> Result<String, StoreError> {
        let conn = self.conn()?;
        resolve_root_id(&NodeReader::new(&conn, project_id), context_id)
    }

    /// Writes a branch version on top of `base` plus a fresh copy of its chain
    /// as rewritten by `derive`.
    fn commit_version(
        &self,
        project_id: &str,
        context_id: &str,
        created_at_ms: i64,
        base: VersionBase,
        derive: impl FnOnce(Vec<Node>) -> Result<(NodeMetadata, Vec<NodeSpec>), StoreError>,
    ) -> Result<WriteResult, StoreError> {
        let root_id = self.root_id_of(project_id, context_id)?;

        self.with_lineage_write_lock(&root_id, || {
            let mut conn = self.conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let reader = NodeReader::new(&tx, project_id);

            let lineage = Lineage::load(&reader, &root_id)?;
            let base = match base {
                VersionBase::Head => &lineage.head,
                VersionBase::At(version) => lineage.head_at(version)?,
            };
            let chain = get_chain(&reader, &base.public_id)?;
            let (metadata, specs) = derive(chain)?;

            let version_records = build_node_insert_records(
                vec![NodeSpec::context(metadata, Some(root_id.clone()))],
                project_id,
                None,
                Some(&base.public_id),
            );
            let Some(head) = insert_nodes_tx(&tx, version_records, created_at_ms)?.pop() else {
                return Err(StoreError::InvalidInput("version record was not planned"));
            };
            let message_records =
                build_node_insert_records(specs, project_id, Some(&head.public_id), None);
            let messages = insert_nodes_tx(&tx, message_records, created_at_ms)?;

            let version = reader
                .find_ordered_branch_heads(&root_id)?
                .iter()
                .position(|node| node.public_id == head.public_id)
                .unwrap_or(lineage.heads.len());

            tx.commit()?;
            tracing::debug!(
                root_id = %root_id,
                head_id = %head.public_id,
                operation = head.metadata.operation.as_deref().unwrap_or_default(),
                version,
                "version committed"
            );
            Ok(WriteResult {
                head_id: head.public_id,
                data: Message::from_chain(messages, 0),
                version,
            })
        })
    }
}

#[derive(Clone, Copy, Debug)]
enum VersionBase {
    Head,
    At(usize),
}

/// One lineage as seen inside a single snapshot.
struct Lineage {
    root_id: String,
    head: Node,
    heads: Vec<Node>,
}

impl Lineage {
    fn load(reader: &NodeReader<'_>, context_id: &str) -> Result<Self, StoreError> {
        let root_id = resolve_root_id(reader, context_id)?;
        let head = find_head(reader, &root_id)?.ok_or(StoreError::UnknownContext)?;
        let heads = reader.find_ordered_branch_heads(&root_id)?;
        Ok(Self {
            root_id,
            head,
            heads,
        })
    }

    fn head_version(&self) -> usize {
        self.heads
            .iter()
            .position(|node| node.public_id == self.head.public_id)
            .unwrap_or(self.heads.len().saturating_sub(1))
    }

    fn head_at(&self, version: usize) -> Result<&Node, StoreError> {
        self.heads.get(version).ok_or(StoreError::UnknownVersion {
            requested: version,
            available: self.heads.len(),
        })
    }
}

/// Any context record (root or version) names its lineage.
fn resolve_root_id(reader: &NodeReader<'_>, context_id: &str) -> Result<String, StoreError> {
    let node = reader
        .get_node(context_id)?
        .filter(|node| node.kind == NodeKind::Context)
        .ok_or(StoreError::UnknownContext)?;
    Ok(node.lineage_id().to_string())
}

fn locate(chain: &[Node], target: &MessageRef) -> Result<usize, StoreError> {
    match target {
        MessageRef::Id(id) => chain.iter().position(|node| &node.public_id == id),
        MessageRef::Index(index) => (*index < chain.len()).then_some(*index),
    }
    .ok_or_else(|| StoreError::UnknownMessage(target.to_string()))
}

fn reject_reserved_keys(metadata: &Map<String, Value>) -> Result<(), StoreError> {
    if RESERVED_METADATA_KEYS
        .iter()
        .any(|key| metadata.contains_key(*key))
    {
        return Err(StoreError::InvalidInput(
            "metadata keys `operation` and `affected` are reserved",
        ));
    }
    Ok(())
}

fn message_specs(inputs: Vec<MessageInput>) -> Result<Vec<NodeSpec>, StoreError> {
    inputs
        .into_iter()
        .map(|input| {
            reject_reserved_keys(&input.metadata)?;
            Ok(NodeSpec::message(input.content, input.metadata))
        })
        .collect()
}

fn copy_specs(chain: Vec<Node>) -> Vec<NodeSpec> {
    chain
        .into_iter()
        .map(|node| NodeSpec {
            kind: NodeKind::Message,
            content: node.content,
            metadata: node.metadata,
            parent_id: None,
        })
        .collect()
}
