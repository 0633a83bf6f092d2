// # Simulated Line Provider
//
// In-memory implementation of LineProvider.
//
// Holds a mutable line table plus the default/active line selections. Tests
// and the simulated daemon mutate the table directly and then push the
// matching `ChangeEvent` through the [`SimChangeSource`](crate::SimChangeSource)
// so the registry notices.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use telsync_core::traits::line_provider::{Line, LineProvider, LineRecord};
use telsync_core::{Error, LineId};
use tokio::sync::RwLock;

#[derive(Debug)]
struct LineTable {
    lines: Vec<Line>,
    records: HashMap<LineId, LineRecord>,
    default_data: LineId,
    default_voice: LineId,
    active_data: LineId,
    /// Emergency anchor when no line qualifies for a regular account
    default_line: Option<Line>,
    merged_identities: Vec<String>,
    primary_number: Option<String>,
}

impl Default for LineTable {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            records: HashMap::new(),
            default_data: LineId::INVALID,
            default_voice: LineId::INVALID,
            active_data: LineId::INVALID,
            default_line: None,
            merged_identities: Vec::new(),
            primary_number: None,
        }
    }
}

/// In-memory line provider
#[derive(Debug, Clone, Default)]
pub struct SimLineProvider {
    inner: Arc<RwLock<LineTable>>,
}

impl SimLineProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a line and its subscription record
    pub async fn upsert_line(&self, line: Line, record: LineRecord) {
        let mut table = self.inner.write().await;
        table.records.insert(line.id, record);
        if let Some(existing) = table.lines.iter_mut().find(|l| l.id == line.id) {
            *existing = line;
        } else {
            table.lines.push(line);
        }
    }

    /// Remove a line and its record
    pub async fn remove_line(&self, line_id: LineId) {
        let mut table = self.inner.write().await;
        table.lines.retain(|l| l.id != line_id);
        table.records.remove(&line_id);
    }

    /// Set the line the emergency-only account anchors on
    pub async fn set_default_line(&self, line: Line) {
        self.inner.write().await.default_line = Some(line);
    }

    /// Set the user's default data line
    pub async fn set_default_data(&self, line_id: LineId) {
        self.inner.write().await.default_data = line_id;
    }

    /// Set the user's default voice line
    pub async fn set_default_voice(&self, line_id: LineId) {
        self.inner.write().await.default_voice = line_id;
    }

    /// Set the currently active data line (temporary data switch)
    pub async fn set_active_data(&self, line_id: LineId) {
        self.inner.write().await.active_data = line_id;
    }

    /// Configure merged-SIM grouping inputs
    pub async fn set_merged_group(&self, identities: Vec<String>, primary_number: Option<String>) {
        let mut table = self.inner.write().await;
        table.merged_identities = identities;
        table.primary_number = primary_number;
    }
}

#[async_trait]
impl LineProvider for SimLineProvider {
    async fn enumerate_lines(&self) -> Result<Vec<Line>, Error> {
        Ok(self.inner.read().await.lines.clone())
    }

    async fn line(&self, line_id: LineId) -> Result<Option<Line>, Error> {
        let table = self.inner.read().await;
        Ok(table.lines.iter().find(|l| l.id == line_id).cloned())
    }

    async fn subscription_record(&self, line_id: LineId) -> Result<Option<LineRecord>, Error> {
        Ok(self.inner.read().await.records.get(&line_id).cloned())
    }

    async fn default_data_line(&self) -> LineId {
        self.inner.read().await.default_data
    }

    async fn default_voice_line(&self) -> LineId {
        self.inner.read().await.default_voice
    }

    async fn active_data_line(&self) -> LineId {
        self.inner.read().await.active_data
    }

    async fn default_line(&self) -> Result<Line, Error> {
        self.inner
            .read()
            .await
            .default_line
            .clone()
            .ok_or_else(|| Error::line_provider("no default line configured"))
    }

    async fn merged_group_identities(&self) -> Result<Vec<String>, Error> {
        Ok(self.inner.read().await.merged_identities.clone())
    }

    async fn primary_line_number(&self) -> Result<Option<String>, Error> {
        Ok(self.inner.read().await.primary_number.clone())
    }
}
