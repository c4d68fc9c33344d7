//! Top-level supervisor: expands prospector group patterns and spawns one
//! group supervisor per discovered log group.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant};
use tokio_util::sync::CancellationToken;

use super::{Context, GroupSupervisor};
use crate::config::Prospector;

/// Owns the map of discovered groups. Groups are memoized by name and
/// spawned at most once per process lifetime; the map is only touched from
/// the manager task.
pub struct GroupManager {
    ctx: Context,
    prospectors: Vec<Arc<Prospector>>,
    groups: HashMap<String, JoinHandle<()>>,
    cancel: CancellationToken,
}

impl GroupManager {
    #[must_use]
    pub fn new(ctx: Context, cancel: CancellationToken) -> Self {
        let prospectors = ctx
            .config
            .prospectors
            .iter()
            .cloned()
            .map(Arc::new)
            .collect();
        Self {
            ctx,
            prospectors,
            groups: HashMap::new(),
            cancel,
        }
    }

    /// Monitoring loop: pattern expansion and summary reports, each on its
    /// own ticker. The first expansion cycle runs right away.
    pub async fn run(mut self) {
        tracing::info!("group manager started");

        let mut refresh_ticker = interval(self.ctx.config.group_refresh_frequency);
        let report_period = self.ctx.config.report_frequency;
        let mut report_ticker = interval_at(Instant::now() + report_period, report_period);
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("group manager stopped");
                    return;
                }
                _ = refresh_ticker.tick() => self.refresh_groups().await,
                _ = report_ticker.tick() => self.report(),
            }
        }
    }

    /// One expansion cycle over every (prospector, pattern) pair.
    pub async fn refresh_groups(&mut self) {
        let prospectors = self.prospectors.clone();
        for prospector in &prospectors {
            for pattern in &prospector.groupnames {
                match pattern.strip_suffix('*') {
                    // a plain name monitors a single group
                    None => {
                        if !self.groups.contains_key(pattern) {
                            self.add_group(pattern.clone(), Arc::clone(prospector));
                        }
                    }
                    // a trailing star expands to every group with that prefix
                    Some(prefix) => self.expand_prefix(prefix, prospector).await,
                }
            }
        }
    }

    async fn expand_prefix(&mut self, prefix: &str, prospector: &Arc<Prospector>) {
        let mut next_token = None;
        loop {
            let page = match self
                .ctx
                .cloud
                .describe_log_groups(prefix, next_token.take())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(prefix = %prefix, error = %e, "failed to enumerate log groups");
                    return;
                }
            };

            for name in page.groups {
                if !self.groups.contains_key(&name) {
                    self.add_group(name, Arc::clone(prospector));
                }
            }

            next_token = page.next_token;
            if next_token.is_none() {
                return;
            }
        }
    }

    fn add_group(&mut self, name: String, prospector: Arc<Prospector>) {
        let supervisor = match GroupSupervisor::new(name.clone(), prospector, self.ctx.clone()) {
            Ok(supervisor) => supervisor,
            Err(e) => {
                tracing::error!(group = %name, error = %e, "failed to create group supervisor");
                return;
            }
        };

        tracing::info!(group = %name, "monitoring group");
        let task = tokio::spawn(supervisor.run(self.cancel.child_token()));
        self.groups.insert(name, task);
    }

    fn report(&self) {
        tracing::info!(
            prospectors = self.prospectors.len(),
            groups = self.groups.len(),
            "manager report"
        );
    }

    /// True when a supervisor was spawned for `group`.
    #[must_use]
    pub fn is_monitoring(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::GroupPage;
    use crate::config::Config;
    use crate::error::Error;
    use crate::testutil::{test_context, TestContext};

    fn prospector(patterns: &[&str]) -> Prospector {
        Prospector {
            id: "prospector".to_string(),
            groupnames: patterns.iter().map(|p| (*p).to_string()).collect(),
            multiline: None,
        }
    }

    fn manager(config: Config) -> (GroupManager, TestContext) {
        let test = test_context(config);
        let manager = GroupManager::new(test.ctx.clone(), CancellationToken::new());
        (manager, test)
    }

    #[tokio::test]
    async fn plain_pattern_monitors_a_single_group() {
        let config = Config {
            prospectors: vec![prospector(&["/ecs/api"])],
            ..Config::default()
        };
        let (mut manager, _test) = manager(config);

        manager.refresh_groups().await;

        assert!(manager.is_monitoring("/ecs/api"));
        assert_eq!(manager.group_count(), 1);
    }

    #[tokio::test]
    async fn star_pattern_expands_to_every_prefixed_group() {
        let config = Config {
            prospectors: vec![prospector(&["/aws/lambda/*"])],
            ..Config::default()
        };
        let (mut manager, test) = manager(config);
        test.cloud.push_group_page(Ok(GroupPage {
            groups: vec!["/aws/lambda/api".to_string(), "/aws/lambda/auth".to_string()],
            next_token: Some("page-2".to_string()),
        }));
        test.cloud.push_group_page(Ok(GroupPage {
            groups: vec!["/aws/lambda/worker".to_string()],
            next_token: None,
        }));

        manager.refresh_groups().await;

        assert_eq!(manager.group_count(), 3);
        assert!(manager.is_monitoring("/aws/lambda/api"));
        assert!(manager.is_monitoring("/aws/lambda/auth"));
        assert!(manager.is_monitoring("/aws/lambda/worker"));

        let prefixes = test.cloud.group_prefixes.lock().clone();
        assert_eq!(prefixes, vec!["/aws/lambda/", "/aws/lambda/"]);
    }

    #[tokio::test]
    async fn groups_are_spawned_at_most_once() {
        let config = Config {
            prospectors: vec![prospector(&["/ecs/api", "/aws/lambda/*"])],
            ..Config::default()
        };
        let (mut manager, test) = manager(config);
        for _ in 0..2 {
            test.cloud.push_group_page(Ok(GroupPage {
                groups: vec!["/aws/lambda/api".to_string()],
                next_token: None,
            }));
        }

        manager.refresh_groups().await;
        manager.refresh_groups().await;

        assert_eq!(manager.group_count(), 2);
    }

    #[tokio::test]
    async fn enumeration_failure_is_not_fatal() {
        let config = Config {
            prospectors: vec![prospector(&["/aws/lambda/*", "/ecs/api"])],
            ..Config::default()
        };
        let (mut manager, test) = manager(config);
        test.cloud
            .push_group_page(Err(Error::Cloud("AccessDeniedException".to_string())));

        manager.refresh_groups().await;

        // the wildcard failed, the literal pattern still went through
        assert!(manager.is_monitoring("/ecs/api"));
        assert_eq!(manager.group_count(), 1);
    }

    #[tokio::test]
    async fn two_prospectors_expand_independently() {
        let config = Config {
            prospectors: vec![prospector(&["/ecs/api"]), prospector(&["/ecs/worker"])],
            ..Config::default()
        };
        let (mut manager, _test) = manager(config);

        manager.refresh_groups().await;

        assert_eq!(manager.group_count(), 2);
    }
}
