//! In-process fakes for the cloud client, the publisher and the registry,
//! plus a canned context for service tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cloud::{CloudWatchLogs, EventPage, EventQuery, GroupPage, StreamPage};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::publisher::EventPublisher;
use crate::registry::{MemoryRegistry, Registry, RegistryItem, StreamKey};
use crate::service::Context;

/// Fake CloudWatch client fed with queued pages. Every call pops one queued
/// response; an empty queue yields an empty page. Queries are recorded for
/// assertions.
#[derive(Default)]
pub(crate) struct FakeCloudWatch {
    group_pages: Mutex<VecDeque<Result<GroupPage>>>,
    stream_pages: Mutex<VecDeque<Result<StreamPage>>>,
    event_pages: Mutex<VecDeque<Result<EventPage>>>,
    pub group_prefixes: Mutex<Vec<String>>,
    pub event_queries: Mutex<Vec<EventQuery>>,
}

impl FakeCloudWatch {
    pub fn push_group_page(&self, page: Result<GroupPage>) {
        self.group_pages.lock().push_back(page);
    }

    pub fn push_stream_page(&self, page: Result<StreamPage>) {
        self.stream_pages.lock().push_back(page);
    }

    pub fn push_event_page(&self, page: Result<EventPage>) {
        self.event_pages.lock().push_back(page);
    }
}

#[async_trait]
impl CloudWatchLogs for FakeCloudWatch {
    async fn describe_log_groups(
        &self,
        prefix: &str,
        _next_token: Option<String>,
    ) -> Result<GroupPage> {
        self.group_prefixes.lock().push(prefix.to_string());
        self.group_pages
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(GroupPage::default()))
    }

    async fn describe_log_streams(
        &self,
        _group: &str,
        _next_token: Option<String>,
    ) -> Result<StreamPage> {
        self.stream_pages
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(StreamPage::default()))
    }

    async fn get_log_events(&self, query: &EventQuery) -> Result<EventPage> {
        self.event_queries.lock().push(query.clone());
        self.event_pages
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(EventPage::default()))
    }
}

/// Publisher that collects every event in memory.
#[derive(Default)]
pub(crate) struct FakePublisher {
    pub events: Mutex<Vec<Event>>,
}

#[async_trait]
impl EventPublisher for FakePublisher {
    async fn publish(&self, event: Event) {
        self.events.lock().push(event);
    }

    async fn close(&self) {}
}

/// Registry whose reads always fail.
pub(crate) struct FailingRegistry;

#[async_trait]
impl Registry for FailingRegistry {
    async fn read_cursor(&self, _key: &StreamKey) -> Result<Option<RegistryItem>> {
        Err(Error::Internal("registry unavailable".to_string()))
    }

    async fn write_cursor(&self, _key: &StreamKey, _item: &RegistryItem) -> Result<()> {
        Err(Error::Internal("registry unavailable".to_string()))
    }
}

/// A context wired to fakes, handed out with the handles kept for
/// assertions.
pub(crate) struct TestContext {
    pub ctx: Context,
    pub cloud: Arc<FakeCloudWatch>,
    pub publisher: Arc<FakePublisher>,
    pub registry: Arc<MemoryRegistry>,
}

pub(crate) fn test_context(config: Config) -> TestContext {
    let cloud = Arc::new(FakeCloudWatch::default());
    let publisher = Arc::new(FakePublisher::default());
    let registry = Arc::new(MemoryRegistry::new());
    let ctx = Context {
        config: Arc::new(config),
        cloud: Arc::clone(&cloud) as Arc<dyn CloudWatchLogs>,
        registry: Arc::clone(&registry) as Arc<dyn Registry>,
        publisher: Arc::clone(&publisher) as Arc<dyn EventPublisher>,
    };
    TestContext {
        ctx,
        cloud,
        publisher,
        registry,
    }
}
