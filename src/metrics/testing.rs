//! In-memory executors for unit tests.

#![cfg(test)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{GraphQlExecutor, GraphQlQuery};
use crate::error::{Error, Result};

/// Replays canned responses in order and records the queries it saw.
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<Result<serde_json::Value>>>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(responses: Vec<Result<serde_json::Value>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphQlExecutor for ScriptedExecutor {
    async fn execute(&self, query: &GraphQlQuery) -> Result<serde_json::Value> {
        self.queries.lock().unwrap().push(query.as_str().to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Internal("no scripted response".into())))
    }
}

/// Answers each query with a closure over the query text.
pub struct FnExecutor<F> {
    respond: F,
    queries: Mutex<Vec<String>>,
}

impl<F> FnExecutor<F> {
    pub fn new(respond: F) -> Self
    where
        F: Fn(&str) -> Result<serde_json::Value> + Send + Sync,
    {
        Self {
            respond,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl<F> GraphQlExecutor for FnExecutor<F>
where
    F: Fn(&str) -> Result<serde_json::Value> + Send + Sync,
{
    async fn execute(&self, query: &GraphQlQuery) -> Result<serde_json::Value> {
        self.queries.lock().unwrap().push(query.as_str().to_string());
        (self.respond)(query.as_str())
    }
}

/// GUIDs listed in an `entities(guids: [...])` query.
pub fn guids_in(query: &str) -> Vec<String> {
    let Some(start) = query.find("guids: [") else {
        return Vec::new();
    };
    let rest = &query[start + "guids: [".len()..];
    let end = rest.find(']').unwrap_or(rest.len());
    rest[..end]
        .split(", ")
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_matches('"').to_string())
        .collect()
}
