//! Postgres graph backend
//!
//! One transaction per `WriteBatch`. A dropped transaction rolls back, so any
//! `?` inside `apply` leaves the store untouched.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::query_builder::Separated;
use sqlx::{FromRow, Postgres, QueryBuilder, Row, Transaction};
use uuid::Uuid;

use super::batch::{Tombstone, Update, WriteBatch};
use super::GraphBackend;
use crate::error::{EntityKind, OntoError, OntoResult};
use crate::models::{
    ClassLink, CompetencyQuestions, Conversation, DataProperty, Domain, DomainRangePair,
    ImportantTerms, Instance, ObjectProperty, OntologyClass, Range,
};

/// Rows per multi-row INSERT. Keeps bind parameters well under the 65535 limit.
const INSERT_CHUNK: usize = 1000;

type Tx<'c> = Transaction<'c, Postgres>;

/// Tombstone filter for every aliased table in a select.
fn live(aliases: &[&str]) -> String {
    aliases
        .iter()
        .map(|a| format!("{a}.deleted_at IS NULL"))
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_by_id<T>(&self, table: &str, column: &str, id: Uuid) -> OntoResult<Option<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = format!(
            "SELECT * FROM {table} x WHERE x.{column} = $1 AND {}",
            live(&["x"])
        );
        Ok(sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn fetch_scoped<T>(&self, table: &str, column: &str, ids: &[Uuid]) -> OntoResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT * FROM {table} x WHERE x.{column} = ANY($1) AND {} ORDER BY x.id",
            live(&["x"])
        );
        Ok(sqlx::query_as::<_, T>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Members reachable through a live junction row, tagged with the linking class.
    async fn fetch_linked<T>(
        &self,
        junction: &str,
        table: &str,
        column: &str,
        class_ids: &[Uuid],
    ) -> OntoResult<Vec<(Uuid, T)>>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        if class_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT m.*, j.class_id AS linked_class_id \
             FROM {junction} j JOIN {table} m ON m.{column} = j.{column} \
             WHERE j.class_id = ANY($1) AND {} ORDER BY j.id",
            live(&["j", "m"])
        );
        let rows = sqlx::query(&sql)
            .bind(class_ids)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let class_id: Uuid = row.try_get("linked_class_id")?;
                Ok((class_id, T::from_row(row)?))
            })
            .collect()
    }
}

// ============================================================================
// Writes
// ============================================================================

async fn insert_chunked<T, F>(
    tx: &mut Tx<'_>,
    head: &str,
    rows: &[T],
    mut bind: F,
) -> OntoResult<()>
where
    T: Sync,
    F: FnMut(Separated<'_, '_, Postgres, &'static str>, &T) + Send,
{
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut qb = QueryBuilder::<Postgres>::new(head);
        qb.push_values(chunk, |b, row| bind(b, row));
        qb.build().execute(&mut **tx).await?;
    }
    Ok(())
}

/// Ids referenced by the batch that it does not itself create.
fn external(referenced: impl IntoIterator<Item = Uuid>, created: &HashSet<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    referenced
        .into_iter()
        .filter(|id| !created.contains(id) && seen.insert(*id))
        .collect()
}

/// Fail with NotFound unless every id names a live row; rows are share-locked
/// until commit so a concurrent delete cannot orphan the new children.
async fn ensure_live(
    tx: &mut Tx<'_>,
    table: &str,
    column: &str,
    kind: EntityKind,
    ids: Vec<Uuid>,
) -> OntoResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let sql = format!(
        "SELECT x.{column} FROM {table} x WHERE x.{column} = ANY($1) AND {} FOR SHARE",
        live(&["x"])
    );
    let found: HashSet<Uuid> = sqlx::query_as::<_, (Uuid,)>(&sql)
        .bind(&ids)
        .fetch_all(&mut **tx)
        .await?
        .into_iter()
        .map(|(id,)| id)
        .collect();

    match ids.into_iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(OntoError::not_found(kind, missing)),
        None => Ok(()),
    }
}

async fn check_references(tx: &mut Tx<'_>, batch: &WriteBatch) -> OntoResult<()> {
    let new_conversations: HashSet<Uuid> = batch.conversations.iter().map(|c| c.id).collect();
    let new_classes: HashSet<Uuid> = batch.classes.iter().map(|c| c.id).collect();
    let new_instances: HashSet<Uuid> = batch.instances.iter().map(|i| i.id).collect();
    let new_data: HashSet<Uuid> = batch.data_properties.iter().map(|d| d.id).collect();
    let new_objects: HashSet<Uuid> = batch.object_properties.iter().map(|o| o.id).collect();
    let new_domains: HashSet<Uuid> = batch.domains.iter().map(|d| d.id).collect();
    let new_ranges: HashSet<Uuid> = batch.ranges.iter().map(|r| r.id).collect();

    let conversation_refs = batch
        .classes
        .iter()
        .map(|c| c.conversation_id)
        .chain(batch.important_terms.iter().map(|t| t.conversation_id))
        .chain(batch.competency_questions.iter().map(|q| q.conversation_id));
    let class_refs = batch
        .instances
        .iter()
        .map(|i| i.class_id)
        .chain(batch.data_properties.iter().map(|d| d.class_id))
        .chain(batch.object_properties.iter().map(|o| o.class_id))
        .chain(batch.class_instance_links.iter().map(|l| l.class_id))
        .chain(batch.class_data_links.iter().map(|l| l.class_id))
        .chain(batch.class_object_links.iter().map(|l| l.class_id));
    let object_refs = batch
        .domains
        .iter()
        .map(|d| d.object_property_id)
        .chain(batch.ranges.iter().map(|r| r.object_property_id))
        .chain(batch.pairs.iter().map(|p| p.object_property_id))
        .chain(batch.class_object_links.iter().map(|l| l.member_id));

    ensure_live(
        tx,
        "conversations",
        "conversation_id",
        EntityKind::Conversation,
        external(conversation_refs, &new_conversations),
    )
    .await?;
    ensure_live(tx, "classes", "class_id", EntityKind::Class, external(class_refs, &new_classes))
        .await?;
    ensure_live(
        tx,
        "object_properties",
        "object_property_id",
        EntityKind::ObjectProperty,
        external(object_refs, &new_objects),
    )
    .await?;
    ensure_live(
        tx,
        "instances",
        "instance_id",
        EntityKind::Instance,
        external(batch.class_instance_links.iter().map(|l| l.member_id), &new_instances),
    )
    .await?;
    ensure_live(
        tx,
        "data_properties",
        "data_property_id",
        EntityKind::DataProperty,
        external(batch.class_data_links.iter().map(|l| l.member_id), &new_data),
    )
    .await?;
    ensure_live(
        tx,
        "domains",
        "domain_id",
        EntityKind::Domain,
        external(batch.pairs.iter().map(|p| p.domain_id), &new_domains),
    )
    .await?;
    ensure_live(
        tx,
        "ranges",
        "range_id",
        EntityKind::Range,
        external(batch.pairs.iter().map(|p| p.range_id), &new_ranges),
    )
    .await
}

async fn insert_links(
    tx: &mut Tx<'_>,
    junction: &str,
    member_column: &str,
    links: &[ClassLink],
    at: DateTime<Utc>,
) -> OntoResult<()> {
    let head = format!("INSERT INTO {junction} (class_id, {member_column}, created_at) ");
    insert_chunked(tx, &head, links, |mut b, l| {
        b.push_bind(l.class_id).push_bind(l.member_id).push_bind(at);
    })
    .await
}

async fn insert_all(tx: &mut Tx<'_>, batch: &WriteBatch) -> OntoResult<()> {
    insert_chunked(
        tx,
        "INSERT INTO conversations (conversation_id, user_id, title, domain, scope, is_active, created_at) ",
        &batch.conversations,
        |mut b, c| {
            b.push_bind(c.id)
                .push_bind(c.user_id)
                .push_bind(c.title.clone())
                .push_bind(c.domain.clone())
                .push_bind(c.scope.clone())
                .push_bind(c.is_active)
                .push_bind(c.created_at);
        },
    )
    .await?;

    insert_chunked(
        tx,
        "INSERT INTO classes (class_id, conversation_id, name, description, created_at) ",
        &batch.classes,
        |mut b, c| {
            b.push_bind(c.id)
                .push_bind(c.conversation_id)
                .push_bind(c.name.clone())
                .push_bind(c.description.clone())
                .push_bind(c.created_at);
        },
    )
    .await?;

    insert_chunked(
        tx,
        "INSERT INTO instances (instance_id, class_id, name, created_at) ",
        &batch.instances,
        |mut b, i| {
            b.push_bind(i.id)
                .push_bind(i.class_id)
                .push_bind(i.name.clone())
                .push_bind(i.created_at);
        },
    )
    .await?;

    insert_chunked(
        tx,
        "INSERT INTO data_properties (data_property_id, class_id, name, data_type, created_at) ",
        &batch.data_properties,
        |mut b, d| {
            b.push_bind(d.id)
                .push_bind(d.class_id)
                .push_bind(d.name.clone())
                .push_bind(d.data_type.clone())
                .push_bind(d.created_at);
        },
    )
    .await?;

    insert_chunked(
        tx,
        "INSERT INTO object_properties (object_property_id, class_id, name, created_at) ",
        &batch.object_properties,
        |mut b, o| {
            b.push_bind(o.id)
                .push_bind(o.class_id)
                .push_bind(o.name.clone())
                .push_bind(o.created_at);
        },
    )
    .await?;

    insert_chunked(
        tx,
        "INSERT INTO domains (domain_id, object_property_id, name, created_at) ",
        &batch.domains,
        |mut b, d| {
            b.push_bind(d.id)
                .push_bind(d.object_property_id)
                .push_bind(d.name.clone())
                .push_bind(d.created_at);
        },
    )
    .await?;

    insert_chunked(
        tx,
        "INSERT INTO ranges (range_id, object_property_id, name, created_at) ",
        &batch.ranges,
        |mut b, r| {
            b.push_bind(r.id)
                .push_bind(r.object_property_id)
                .push_bind(r.name.clone())
                .push_bind(r.created_at);
        },
    )
    .await?;

    insert_links(tx, "classes_instances_junction", "instance_id", &batch.class_instance_links, batch.at).await?;
    insert_links(tx, "classes_data_junction", "data_property_id", &batch.class_data_links, batch.at).await?;
    insert_links(tx, "classes_object_junction", "object_property_id", &batch.class_object_links, batch.at).await?;

    insert_chunked(
        tx,
        "INSERT INTO domains_ranges_junction (pair_id, object_property_id, domain_id, range_id, created_at) ",
        &batch.pairs,
        |mut b, p| {
            b.push_bind(p.id)
                .push_bind(p.object_property_id)
                .push_bind(p.domain_id)
                .push_bind(p.range_id)
                .push_bind(p.created_at);
        },
    )
    .await?;

    insert_chunked(
        tx,
        "INSERT INTO important_terms (important_terms_id, conversation_id, terms, created_at) ",
        &batch.important_terms,
        |mut b, t| {
            b.push_bind(t.id)
                .push_bind(t.conversation_id)
                .push_bind(t.terms.clone())
                .push_bind(t.created_at);
        },
    )
    .await?;

    insert_chunked(
        tx,
        "INSERT INTO competency_questions (cq_id, conversation_id, questions, is_valid, created_at, validated_at) ",
        &batch.competency_questions,
        |mut b, q| {
            b.push_bind(q.id)
                .push_bind(q.conversation_id)
                .push_bind(q.questions.clone())
                .push_bind(q.is_valid)
                .push_bind(q.created_at)
                .push_bind(q.validated_at);
        },
    )
    .await
}

async fn apply_update(tx: &mut Tx<'_>, update: &Update, at: DateTime<Utc>) -> OntoResult<()> {
    let result = match update {
        Update::Conversation {
            id,
            title,
            domain,
            scope,
            is_active,
        } => {
            sqlx::query(
                r#"
                UPDATE conversations
                SET title = $2, domain = $3, scope = $4, is_active = $5, updated_at = $6
                WHERE conversation_id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id)
            .bind(title)
            .bind(domain)
            .bind(scope)
            .bind(is_active)
            .bind(at)
            .execute(&mut **tx)
            .await?
        }
        Update::Class {
            id,
            name,
            description,
        } => {
            sqlx::query(
                r#"
                UPDATE classes SET name = $2, description = $3, updated_at = $4
                WHERE class_id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id)
            .bind(name)
            .bind(description)
            .bind(at)
            .execute(&mut **tx)
            .await?
        }
        Update::DataProperty {
            id,
            name,
            data_type,
        } => {
            sqlx::query(
                r#"
                UPDATE data_properties SET name = $2, data_type = $3, updated_at = $4
                WHERE data_property_id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id)
            .bind(name)
            .bind(data_type)
            .bind(at)
            .execute(&mut **tx)
            .await?
        }
        Update::ObjectProperty { id, name } => {
            rename(tx, "object_properties", "object_property_id", *id, name, at).await?
        }
        Update::Instance { id, name } => {
            rename(tx, "instances", "instance_id", *id, name, at).await?
        }
        Update::Domain { id, name } => rename(tx, "domains", "domain_id", *id, name, at).await?,
        Update::Range { id, name } => rename(tx, "ranges", "range_id", *id, name, at).await?,
        Update::ImportantTerms { id, terms } => {
            sqlx::query(
                r#"
                UPDATE important_terms SET terms = $2, updated_at = $3
                WHERE important_terms_id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id)
            .bind(terms)
            .bind(at)
            .execute(&mut **tx)
            .await?
        }
        Update::CompetencyQuestions { id, questions } => {
            sqlx::query(
                r#"
                UPDATE competency_questions SET questions = $2, updated_at = $3
                WHERE cq_id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id)
            .bind(questions)
            .bind(at)
            .execute(&mut **tx)
            .await?
        }
        Update::ValidateCompetencyQuestions { id, is_valid } => {
            sqlx::query(
                r#"
                UPDATE competency_questions
                SET is_valid = $2, validated_at = $3, updated_at = $3
                WHERE cq_id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id)
            .bind(is_valid)
            .bind(at)
            .execute(&mut **tx)
            .await?
        }
    };

    if result.rows_affected() == 0 {
        let (kind, id) = update.target();
        return Err(OntoError::not_found(kind, id));
    }
    Ok(())
}

async fn rename(
    tx: &mut Tx<'_>,
    table: &str,
    column: &str,
    id: Uuid,
    name: &str,
    at: DateTime<Utc>,
) -> Result<sqlx::postgres::PgQueryResult, sqlx::Error> {
    let sql = format!(
        "UPDATE {table} SET name = $2, updated_at = $3 WHERE {column} = $1 AND deleted_at IS NULL"
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(name)
        .bind(at)
        .execute(&mut **tx)
        .await
}

/// Tombstone live rows of `table` whose `column` is in `ids`; returns the
/// external ids of the rows it tombstoned.
async fn soft_delete_where(
    tx: &mut Tx<'_>,
    table: &str,
    id_column: &str,
    column: &str,
    ids: &[Uuid],
    at: DateTime<Utc>,
) -> OntoResult<Vec<Uuid>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "UPDATE {table} SET deleted_at = $2 \
         WHERE {column} = ANY($1) AND deleted_at IS NULL RETURNING {id_column}"
    );
    let rows: Vec<(Uuid,)> = sqlx::query_as(&sql)
        .bind(ids)
        .bind(at)
        .fetch_all(&mut **tx)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Tombstone live junction rows touching any of `class_ids` or `member_ids`.
async fn soft_delete_links(
    tx: &mut Tx<'_>,
    junction: &str,
    member_column: &str,
    class_ids: &[Uuid],
    member_ids: &[Uuid],
    at: DateTime<Utc>,
) -> OntoResult<()> {
    let sql = format!(
        "UPDATE {junction} SET deleted_at = $3 \
         WHERE deleted_at IS NULL AND (class_id = ANY($1) OR {member_column} = ANY($2))"
    );
    sqlx::query(&sql)
        .bind(class_ids)
        .bind(member_ids)
        .bind(at)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn cascade_object_properties(
    tx: &mut Tx<'_>,
    ids: &[Uuid],
    at: DateTime<Utc>,
) -> OntoResult<()> {
    let column = "object_property_id";
    soft_delete_where(tx, "domains_ranges_junction", "pair_id", column, ids, at).await?;
    soft_delete_where(tx, "domains", "domain_id", column, ids, at).await?;
    soft_delete_where(tx, "ranges", "range_id", column, ids, at).await?;
    soft_delete_links(tx, "classes_object_junction", column, &[], ids, at).await
}

async fn cascade_classes(tx: &mut Tx<'_>, class_ids: &[Uuid], at: DateTime<Utc>) -> OntoResult<()> {
    if class_ids.is_empty() {
        return Ok(());
    }
    let objects = soft_delete_where(
        tx,
        "object_properties",
        "object_property_id",
        "class_id",
        class_ids,
        at,
    )
    .await?;
    cascade_object_properties(tx, &objects, at).await?;
    soft_delete_links(tx, "classes_object_junction", "object_property_id", class_ids, &[], at)
        .await?;

    let data = soft_delete_where(tx, "data_properties", "data_property_id", "class_id", class_ids, at)
        .await?;
    soft_delete_links(tx, "classes_data_junction", "data_property_id", class_ids, &data, at).await?;

    let instances =
        soft_delete_where(tx, "instances", "instance_id", "class_id", class_ids, at).await?;
    soft_delete_links(tx, "classes_instances_junction", "instance_id", class_ids, &instances, at)
        .await
}

async fn apply_tombstone(tx: &mut Tx<'_>, tombstone: Tombstone, at: DateTime<Utc>) -> OntoResult<()> {
    let (kind, target) = tombstone.target();
    let missing = || OntoError::not_found(kind, target);

    match tombstone {
        Tombstone::Conversation(id) => {
            let hit = soft_delete_where(tx, "conversations", "conversation_id", "conversation_id", &[id], at)
                .await?;
            if hit.is_empty() {
                return Err(missing());
            }
            sqlx::query(
                "UPDATE conversations SET is_active = FALSE, updated_at = $2 WHERE conversation_id = $1",
            )
            .bind(id)
            .bind(at)
            .execute(&mut **tx)
            .await?;

            let classes =
                soft_delete_where(tx, "classes", "class_id", "conversation_id", &[id], at).await?;
            cascade_classes(tx, &classes, at).await?;
            soft_delete_where(tx, "important_terms", "important_terms_id", "conversation_id", &[id], at)
                .await?;
            soft_delete_where(tx, "competency_questions", "cq_id", "conversation_id", &[id], at)
                .await?;
        }
        Tombstone::Class(id) => {
            if soft_delete_where(tx, "classes", "class_id", "class_id", &[id], at)
                .await?
                .is_empty()
            {
                return Err(missing());
            }
            cascade_classes(tx, &[id], at).await?;
        }
        Tombstone::DataProperty(id) => {
            let column = "data_property_id";
            if soft_delete_where(tx, "data_properties", column, column, &[id], at)
                .await?
                .is_empty()
            {
                return Err(missing());
            }
            soft_delete_links(tx, "classes_data_junction", column, &[], &[id], at).await?;
        }
        Tombstone::Instance(id) => {
            let column = "instance_id";
            if soft_delete_where(tx, "instances", column, column, &[id], at)
                .await?
                .is_empty()
            {
                return Err(missing());
            }
            soft_delete_links(tx, "classes_instances_junction", column, &[], &[id], at).await?;
        }
        Tombstone::ObjectProperty(id) => {
            let column = "object_property_id";
            if soft_delete_where(tx, "object_properties", column, column, &[id], at)
                .await?
                .is_empty()
            {
                return Err(missing());
            }
            cascade_object_properties(tx, &[id], at).await?;
        }
        Tombstone::DomainRangePair(id) => {
            let pair: Option<(Uuid, Uuid)> = sqlx::query_as(
                r#"
                UPDATE domains_ranges_junction SET deleted_at = $2
                WHERE pair_id = $1 AND deleted_at IS NULL
                RETURNING domain_id, range_id
                "#,
            )
            .bind(id)
            .bind(at)
            .fetch_optional(&mut **tx)
            .await?;
            let (domain_id, range_id) = pair.ok_or_else(missing)?;

            soft_delete_where(tx, "ranges", "range_id", "range_id", &[range_id], at).await?;
            sqlx::query(
                r#"
                UPDATE domains SET deleted_at = $2
                WHERE domain_id = $1 AND deleted_at IS NULL
                  AND NOT EXISTS (
                      SELECT 1 FROM domains_ranges_junction
                      WHERE domain_id = $1 AND deleted_at IS NULL
                  )
                "#,
            )
            .bind(domain_id)
            .bind(at)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl GraphBackend for PgBackend {
    async fn apply(&self, batch: WriteBatch) -> OntoResult<()> {
        let mut tx = self.pool.begin().await?;

        check_references(&mut tx, &batch).await?;
        insert_all(&mut tx, &batch).await?;
        for update in &batch.updates {
            apply_update(&mut tx, update, batch.at).await?;
        }
        for tombstone in &batch.tombstones {
            apply_tombstone(&mut tx, *tombstone, batch.at).await?;
        }

        tx.commit().await?;
        tracing::debug!(
            inserts = batch.insert_count(),
            updates = batch.updates.len(),
            tombstones = batch.tombstones.len(),
            "Committed write batch"
        );
        Ok(())
    }

    async fn conversation(&self, id: Uuid) -> OntoResult<Option<Conversation>> {
        self.fetch_by_id("conversations", "conversation_id", id).await
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> OntoResult<Vec<Conversation>> {
        self.fetch_scoped("conversations", "user_id", &[user_id]).await
    }

    async fn class(&self, id: Uuid) -> OntoResult<Option<OntologyClass>> {
        self.fetch_by_id("classes", "class_id", id).await
    }

    async fn classes(&self, conversation_id: Uuid) -> OntoResult<Vec<OntologyClass>> {
        self.fetch_scoped("classes", "conversation_id", &[conversation_id])
            .await
    }

    async fn data_property(&self, id: Uuid) -> OntoResult<Option<DataProperty>> {
        self.fetch_by_id("data_properties", "data_property_id", id).await
    }

    async fn object_property(&self, id: Uuid) -> OntoResult<Option<ObjectProperty>> {
        self.fetch_by_id("object_properties", "object_property_id", id)
            .await
    }

    async fn instance(&self, id: Uuid) -> OntoResult<Option<Instance>> {
        self.fetch_by_id("instances", "instance_id", id).await
    }

    async fn domain(&self, id: Uuid) -> OntoResult<Option<Domain>> {
        self.fetch_by_id("domains", "domain_id", id).await
    }

    async fn range(&self, id: Uuid) -> OntoResult<Option<Range>> {
        self.fetch_by_id("ranges", "range_id", id).await
    }

    async fn pair(&self, id: Uuid) -> OntoResult<Option<DomainRangePair>> {
        self.fetch_by_id("domains_ranges_junction", "pair_id", id).await
    }

    async fn linked_data_properties(
        &self,
        class_ids: &[Uuid],
    ) -> OntoResult<Vec<(Uuid, DataProperty)>> {
        self.fetch_linked(
            "classes_data_junction",
            "data_properties",
            "data_property_id",
            class_ids,
        )
        .await
    }

    async fn linked_object_properties(
        &self,
        class_ids: &[Uuid],
    ) -> OntoResult<Vec<(Uuid, ObjectProperty)>> {
        self.fetch_linked(
            "classes_object_junction",
            "object_properties",
            "object_property_id",
            class_ids,
        )
        .await
    }

    async fn linked_instances(&self, class_ids: &[Uuid]) -> OntoResult<Vec<(Uuid, Instance)>> {
        self.fetch_linked(
            "classes_instances_junction",
            "instances",
            "instance_id",
            class_ids,
        )
        .await
    }

    async fn domains(&self, object_property_ids: &[Uuid]) -> OntoResult<Vec<Domain>> {
        self.fetch_scoped("domains", "object_property_id", object_property_ids)
            .await
    }

    async fn ranges(&self, object_property_ids: &[Uuid]) -> OntoResult<Vec<Range>> {
        self.fetch_scoped("ranges", "object_property_id", object_property_ids)
            .await
    }

    async fn pairs(&self, object_property_ids: &[Uuid]) -> OntoResult<Vec<DomainRangePair>> {
        self.fetch_scoped(
            "domains_ranges_junction",
            "object_property_id",
            object_property_ids,
        )
        .await
    }

    async fn important_terms(&self, conversation_id: Uuid) -> OntoResult<Option<ImportantTerms>> {
        Ok(self
            .fetch_scoped("important_terms", "conversation_id", &[conversation_id])
            .await?
            .into_iter()
            .next())
    }

    async fn competency_questions(
        &self,
        conversation_id: Uuid,
    ) -> OntoResult<Option<CompetencyQuestions>> {
        Ok(self
            .fetch_scoped("competency_questions", "conversation_id", &[conversation_id])
            .await?
            .into_iter()
            .next())
    }

    async fn competency_questions_by_id(
        &self,
        id: Uuid,
    ) -> OntoResult<Option<CompetencyQuestions>> {
        self.fetch_by_id("competency_questions", "cq_id", id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_filter_covers_every_alias() {
        assert_eq!(live(&["x"]), "x.deleted_at IS NULL");
        assert_eq!(
            live(&["j", "m"]),
            "j.deleted_at IS NULL AND m.deleted_at IS NULL"
        );
    }

    #[test]
    fn test_external_skips_ids_created_in_batch_and_dedups() {
        let created_id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let created: HashSet<Uuid> = [created_id].into_iter().collect();

        let refs = external([created_id, other, other], &created);
        assert_eq!(refs, vec![other]);
    }
}
