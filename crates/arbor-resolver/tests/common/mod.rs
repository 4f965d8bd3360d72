//! Shared fixtures: in-memory loaders that record every batch they receive,
//! and a task -> comment -> feedback schema over them.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use arbor_resolver::Resolver;
use arbor_resolver::loader::{
  BatchLoad, BatchLoader, DependencyError, LoadError, Loader, LoaderContext, async_trait,
  build_list, build_object,
};
use arbor_resolver::schema::{FieldError, Mapper, Node, NodeType, PostField, ResolveField};
use serde_json::{Value, json};

/// Batches seen per log name, as `(loader, keys)`.
static BATCHES: LazyLock<Mutex<HashMap<String, Vec<(&'static str, Vec<Value>)>>>> =
  LazyLock::new(|| Mutex::new(HashMap::new()));

fn record(log: &str, loader: &'static str, keys: Vec<Value>) {
  BATCHES
    .lock()
    .unwrap()
    .entry(log.to_string())
    .or_default()
    .push((loader, keys));
}

/// Every batch `loader` received under `log`, in call order.
pub fn batches(log: &str, loader: &str) -> Vec<Vec<Value>> {
  BATCHES
    .lock()
    .unwrap()
    .get(log)
    .map(|entries| {
      entries
        .iter()
        .filter(|(name, _)| *name == loader)
        .map(|(_, keys)| keys.clone())
        .collect()
    })
    .unwrap_or_default()
}

fn comments() -> Vec<Value> {
  vec![
    json!({ "id": 10, "task_id": 1, "text": "first", "author_id": "a" }),
    json!({ "id": 11, "task_id": 1, "text": "second", "author_id": "b" }),
    json!({ "id": 20, "task_id": 2, "text": "third", "author_id": "a" }),
  ]
}

fn feedbacks() -> Vec<Value> {
  vec![
    json!({ "id": 100, "comment_id": 10, "private": false, "score": 5 }),
    json!({ "id": 101, "comment_id": 10, "private": true, "score": 1 }),
    json!({ "id": 102, "comment_id": 11, "private": false, "score": 3 }),
    json!({ "id": 200, "comment_id": 20, "private": true, "score": 4 }),
  ]
}

fn users() -> Vec<Value> {
  vec![
    json!({ "id": "a", "name": "Ann" }),
    json!({ "id": "b", "name": "Bob" }),
  ]
}

/// Comments per task id.
pub struct CommentLoader {
  log: String,
  fail: bool,
  delay: Option<Duration>,
}

#[async_trait]
impl BatchLoad for CommentLoader {
  type Key = i64;
  type Value = Value;

  async fn load_batch(&self, keys: &[i64]) -> Result<Vec<Value>, LoadError> {
    record(&self.log, Self::NAME, keys.iter().map(|k| json!(k)).collect());
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.fail {
      return Err(LoadError::fetch(Self::NAME, "comment store unavailable"));
    }

    let groups = build_list(comments(), keys, |row| row["task_id"].as_i64().unwrap_or_default());
    Ok(groups.into_iter().map(Value::Array).collect())
  }
}

impl Loader for CommentLoader {
  const NAME: &'static str = "comments";

  fn create(ctx: &mut LoaderContext<'_>) -> Result<Self, DependencyError> {
    Ok(Self {
      log: ctx.optional_param("log")?.unwrap_or_default(),
      fail: ctx.optional_param("fail")?.unwrap_or(false),
      delay: ctx.optional_param::<u64>("delay_ms")?.map(Duration::from_millis),
    })
  }
}

/// Feedback per comment id. Private feedback is only returned when the
/// `private` parameter is set.
pub struct FeedbackLoader {
  log: String,
  private: bool,
}

#[async_trait]
impl BatchLoad for FeedbackLoader {
  type Key = i64;
  type Value = Value;

  async fn load_batch(&self, keys: &[i64]) -> Result<Vec<Value>, LoadError> {
    record(&self.log, Self::NAME, keys.iter().map(|k| json!(k)).collect());

    let visible = feedbacks()
      .into_iter()
      .filter(|row| self.private || row["private"] == json!(false));
    let groups = build_list(visible, keys, |row| row["comment_id"].as_i64().unwrap_or_default());
    Ok(groups.into_iter().map(Value::Array).collect())
  }
}

impl Loader for FeedbackLoader {
  const NAME: &'static str = "feedbacks";

  fn create(ctx: &mut LoaderContext<'_>) -> Result<Self, DependencyError> {
    Ok(Self {
      log: ctx.optional_param("log")?.unwrap_or_default(),
      private: ctx.param("private")?,
    })
  }
}

/// One user per id; unknown ids load as null.
pub struct UserLoader {
  log: String,
}

#[async_trait]
impl BatchLoad for UserLoader {
  type Key = String;
  type Value = Value;

  async fn load_batch(&self, keys: &[String]) -> Result<Vec<Value>, LoadError> {
    record(&self.log, Self::NAME, keys.iter().map(|k| json!(k)).collect());

    let found = build_object(users(), keys, |row| {
      row["id"].as_str().unwrap_or_default().to_string()
    });
    Ok(found.into_iter().map(Option::unwrap_or_default).collect())
  }
}

impl Loader for UserLoader {
  const NAME: &'static str = "users";

  fn create(ctx: &mut LoaderContext<'_>) -> Result<Self, DependencyError> {
    Ok(Self {
      log: ctx.optional_param("log")?.unwrap_or_default(),
    })
  }
}

pub fn id_of(node: &Node, field: &str) -> Result<i64, FieldError> {
  node
    .value(field)
    .and_then(Value::as_i64)
    .ok_or_else(|| FieldError::failed(format!("'{field}' is not an integer")))
}

pub fn user_type() -> Arc<NodeType> {
  NodeType::builder("User").field("id").field("name").build()
}

pub fn author_field(user: Arc<NodeType>) -> ResolveField {
  ResolveField::with_loader::<UserLoader, _, _>("author", |node, loader| {
    let id = node
      .value("author_id")
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_string();
    async move { loader.load(id).await.map_err(FieldError::from) }
  })
  .map(Mapper::to(user))
}

pub fn feedback_type() -> Arc<NodeType> {
  NodeType::builder("Feedback")
    .field("id")
    .field("comment_id")
    .field("private")
    .field("score")
    .build()
}

pub fn comment_type(feedback: Arc<NodeType>) -> Arc<NodeType> {
  NodeType::builder("Comment")
    .field("id")
    .field("task_id")
    .field("text")
    .field_with_default("feedbacks", json!([]))
    .field("score_total")
    .resolve(feedbacks_field(feedback))
    .post(PostField::new("score_total", |node| {
      let total: i64 = node
        .children("feedbacks")
        .iter()
        .filter_map(|feedback| feedback.value("score").and_then(Value::as_i64))
        .sum();
      Ok::<_, FieldError>(json!(total))
    }))
    .build()
}

pub fn feedbacks_field(feedback: Arc<NodeType>) -> ResolveField {
  ResolveField::with_loader::<FeedbackLoader, _, _>("feedbacks", |node, loader| {
    let id = id_of(node, "id");
    async move { loader.load(id?).await.map_err(FieldError::from) }
  })
  .map(Mapper::to(feedback))
}

pub fn comments_field(comment: Arc<NodeType>) -> ResolveField {
  ResolveField::with_loader::<CommentLoader, _, _>("comments", |node, loader| {
    let id = id_of(node, "id");
    async move { loader.load(id?).await.map_err(FieldError::from) }
  })
  .map(Mapper::to(comment))
}

/// Task with comments, each comment with feedback. `feedback_count` reads two
/// levels down.
pub fn task_type() -> Arc<NodeType> {
  let comment = comment_type(feedback_type());

  NodeType::builder("Task")
    .field("id")
    .field("name")
    .field_with_default("comments", json!([]))
    .field("comment_count")
    .field("feedback_count")
    .resolve(comments_field(comment))
    .post(PostField::new("comment_count", |node| {
      Ok::<_, FieldError>(json!(node.children("comments").len()))
    }))
    .post(PostField::new("feedback_count", |node| {
      let count: usize = node
        .children("comments")
        .iter()
        .map(|comment| comment.children("feedbacks").len())
        .sum();
      Ok::<_, FieldError>(json!(count))
    }))
    .build()
}

pub fn task(node_type: &Arc<NodeType>, id: i64) -> Node {
  Node::from_json(
    node_type.clone(),
    json!({ "id": id, "name": format!("task {id}") }),
  )
  .unwrap()
}

/// A resolver with every fixture loader registered, recording under `log`.
pub fn resolver(log: &str, private: bool) -> Resolver {
  Resolver::builder()
    .loader::<CommentLoader>()
    .loader::<FeedbackLoader>()
    .loader::<UserLoader>()
    .loader_params("comments", json!({ "log": log }))
    .loader_params("feedbacks", json!({ "log": log, "private": private }))
    .loader_params("users", json!({ "log": log }))
    .build()
}

/// Handle type passed to custom resolve functions over comments.
pub type Comments = Arc<BatchLoader<CommentLoader>>;
