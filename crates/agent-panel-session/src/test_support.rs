//! Scripted transport shared by the panel tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use agent_panel_core::{Endpoint, SessionId, Transport, TransportError};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

use crate::{ChatPanel, StaticToken, TokenSource};

pub(crate) type Call = (Endpoint, Value, Option<SessionId>);

/// Transport that answers each endpoint from a queue of scripted replies.
///
/// A gated endpoint records the call and then waits for a permit, which lets
/// tests observe the panel while a request is in flight.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<HashMap<&'static str, VecDeque<Result<Value, TransportError>>>>,
    calls: Mutex<Vec<Call>>,
    gates: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn reply(&self, endpoint: &'static str, result: Result<Value, TransportError>) {
        self.replies
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .push_back(result);
    }

    /// Hold every call to `endpoint` until a permit is added.
    pub(crate) fn gate(&self, endpoint: &'static str) -> Arc<Semaphore> {
        self.gates
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_insert_with(|| Arc::new(Semaphore::new(0)))
            .clone()
    }

    pub(crate) fn call_log(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, endpoint: &str) -> Vec<Call> {
        self.call_log()
            .into_iter()
            .filter(|(e, _, _)| e.name() == endpoint)
            .collect()
    }

    pub(crate) fn call_count(&self, endpoint: &str) -> usize {
        self.calls_to(endpoint).len()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(
        &self,
        endpoint: Endpoint,
        payload: Value,
        session: Option<&SessionId>,
    ) -> Result<Value, TransportError> {
        let name = endpoint.name();
        self.calls
            .lock()
            .unwrap()
            .push((endpoint, payload, session.cloned()));

        let gate = self.gates.lock().unwrap().get(name).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        self.replies
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(TransportError::Unreachable("no scripted reply".into())))
    }
}

pub(crate) fn panel_with(
    transport: &Arc<ScriptedTransport>,
    tokens: impl TokenSource + 'static,
) -> ChatPanel {
    ChatPanel::with_transport(transport.clone(), Arc::new(tokens))
}

pub(crate) fn panel_with_token(transport: &Arc<ScriptedTransport>, token: &str) -> ChatPanel {
    panel_with(transport, StaticToken::new(token))
}

/// Panel holding session `s-1`, established through a credential login.
pub(crate) async fn connected_panel(transport: &Arc<ScriptedTransport>) -> ChatPanel {
    transport.reply(
        "credential_login",
        Ok(json!({"success": true, "session_id": "s-1"})),
    );
    let panel = panel_with(transport, StaticToken::none());
    panel
        .authenticate_with_credentials("ana", "pw")
        .await
        .unwrap();
    panel
}
