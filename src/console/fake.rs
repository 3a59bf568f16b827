//! In-memory `Backend` used by the console tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use uazdash_core::{
    error::UazError,
    instance::{ConnectionStatus, InstanceStatus, QrCode, UazInstance},
    message::{HistoryFilter, HistoryMessage, OutboundMessage, SendReceipt},
    traits::Backend,
};

#[derive(Default)]
struct State {
    instances: Vec<UazInstance>,
    /// Scripted status answers per instance; the last one repeats.
    statuses: HashMap<i64, VecDeque<Result<InstanceStatus, String>>>,
    /// Scripted QR answers per instance; the last one repeats.
    qr: HashMap<i64, VecDeque<Result<QrCode, String>>>,
    sent: Vec<(i64, String, OutboundMessage, u64)>,
    imported: Vec<String>,
    deleted: Vec<i64>,
    history_queries: Vec<HistoryFilter>,
    list_calls: usize,
    fail_send_at: Option<usize>,
    fail_list: bool,
    fail_delete: bool,
}

/// Scriptable fake backend.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
}

pub fn instance(id: i64, phone: Option<&str>, status: ConnectionStatus) -> UazInstance {
    UazInstance {
        id,
        name: format!("inst-{id}"),
        token: format!("tok-{id}"),
        phone_number: phone.map(String::from),
        profile_name: None,
        status,
        is_active: true,
        updated_at: None,
    }
}

pub fn status(status: ConnectionStatus) -> InstanceStatus {
    InstanceStatus {
        status,
        connected: status.is_connected(),
        logged_in: status.is_connected(),
        phone_number: None,
        profile_name: None,
    }
}

/// Error marker understood by `classify`.
pub const NOT_FOUND: &str = "404";
pub const CONFLICT: &str = "409";
pub const INVALID_TOKEN: &str = "invalid token";

fn classify(instance_id: i64, err: &str) -> UazError {
    match err {
        NOT_FOUND => UazError::NotFound(format!("instance {instance_id}")),
        CONFLICT => UazError::PairingInProgress,
        INVALID_TOKEN => UazError::InvalidToken { instance_id },
        other => UazError::Backend(other.to_string()),
    }
}

fn next<T: Clone>(queue: Option<&mut VecDeque<Result<T, String>>>) -> Option<Result<T, String>> {
    let queue = queue?;
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl FakeBackend {
    pub fn with_instances(instances: Vec<UazInstance>) -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().instances = instances;
        backend
    }

    pub fn script_status(&self, id: i64, answers: Vec<Result<InstanceStatus, String>>) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(id, answers.into());
    }

    pub fn script_qr(&self, id: i64, answers: Vec<Result<QrCode, String>>) {
        self.state.lock().unwrap().qr.insert(id, answers.into());
    }

    pub fn fail_send_at(&self, index: usize) {
        self.state.lock().unwrap().fail_send_at = Some(index);
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn fail_delete(&self) {
        self.state.lock().unwrap().fail_delete = true;
    }

    pub fn instance_ids(&self) -> Vec<i64> {
        self.state
            .lock()
            .unwrap()
            .instances
            .iter()
            .map(|i| i.id)
            .collect()
    }

    pub fn sent(&self) -> Vec<(i64, String, OutboundMessage, u64)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn imported(&self) -> Vec<String> {
        self.state.lock().unwrap().imported.clone()
    }

    pub fn deleted(&self) -> Vec<i64> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn history_queries(&self) -> Vec<HistoryFilter> {
        self.state.lock().unwrap().history_queries.clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn list_instances(&self) -> Result<Vec<UazInstance>, UazError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.fail_list {
            return Err(UazError::Http("connection refused".into()));
        }
        Ok(state.instances.clone())
    }

    async fn instance_status(&self, instance_id: i64) -> Result<InstanceStatus, UazError> {
        let mut state = self.state.lock().unwrap();
        if let Some(answer) = next(state.statuses.get_mut(&instance_id)) {
            return answer.map_err(|e| classify(instance_id, &e));
        }
        state
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .map(|i| status(i.status))
            .ok_or_else(|| classify(instance_id, NOT_FOUND))
    }

    async fn qr_code(&self, instance_id: i64) -> Result<QrCode, UazError> {
        let mut state = self.state.lock().unwrap();
        next(state.qr.get_mut(&instance_id))
            .unwrap_or_else(|| Err(NOT_FOUND.to_string()))
            .map_err(|e| classify(instance_id, &e))
    }

    async fn send(
        &self,
        instance_id: i64,
        number: &str,
        message: &OutboundMessage,
        typing_delay_ms: u64,
    ) -> Result<SendReceipt, UazError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_send_at == Some(state.sent.len()) {
            return Err(UazError::Backend("send rejected".into()));
        }
        state.sent.push((
            instance_id,
            number.to_string(),
            message.clone(),
            typing_delay_ms,
        ));
        Ok(SendReceipt {
            message_id: Some(format!("msg-{}", state.sent.len())),
            status: Some("sent".into()),
        })
    }

    async fn history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryMessage>, UazError> {
        self.state.lock().unwrap().history_queries.push(*filter);
        Ok(Vec::new())
    }

    async fn import_instances(&self, tokens: &[String]) -> Result<u32, UazError> {
        let mut state = self.state.lock().unwrap();
        state.imported.extend(tokens.iter().cloned());
        Ok(tokens.len() as u32)
    }

    async fn delete_instance(&self, instance_id: i64) -> Result<(), UazError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_delete {
            return Err(UazError::Backend("delete rejected".into()));
        }
        let before = state.instances.len();
        state.instances.retain(|i| i.id != instance_id);
        if state.instances.len() == before {
            return Err(classify(instance_id, NOT_FOUND));
        }
        state.deleted.push(instance_id);
        Ok(())
    }
}
