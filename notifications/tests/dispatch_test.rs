//! Fan-out dispatcher tests: idempotency, channel isolation, retries and
//! real-time pushes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signup_core::environment::{Clock, DirectoryError, Recipient, UserDirectory};
use signup_core::notification::{
    Audience, Author, BellPointer, Category, NotificationMessage, Priority, SystemMessageEntry,
};
use signup_core::types::{BellId, DomainEventId, EntryId, MessageId, UserId};
use signup_notifications::retry::RetryPolicy;
use signup_notifications::{
    Delivery, DispatchError, DispatcherConfig, EmailDelivery, EntryCounts, FanOutDispatcher,
    FeedError, FeedResult, FeedStore, InMemoryFeedStore, RealtimeEvent, RealtimeHub,
};
use signup_testing::{ScriptedEmailTransport, StaticUserDirectory, test_clock};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn fast_retry(max_retries: usize) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::from_millis(1)).with_max_delay(Duration::from_millis(2))
}

fn message(audience: Audience) -> NotificationMessage {
    NotificationMessage {
        id: MessageId::new(),
        source_event: DomainEventId::new(),
        title: "Reminder: Food Drive".to_string(),
        body: "'Food Drive' starts tomorrow.".to_string(),
        category: Category::Reminder,
        priority: Priority::Normal,
        created_at: test_clock().now(),
        author: Author::System,
        audience,
    }
}

struct Harness {
    directory: StaticUserDirectory,
    store: Arc<InMemoryFeedStore>,
    hub: Arc<RealtimeHub>,
    email: ScriptedEmailTransport,
}

impl Harness {
    fn new() -> Self {
        Self {
            directory: StaticUserDirectory::new(),
            store: Arc::new(InMemoryFeedStore::new()),
            hub: Arc::new(RealtimeHub::default()),
            email: ScriptedEmailTransport::new(),
        }
    }

    fn dispatcher(&self, email_delivery: EmailDelivery, retries: usize) -> FanOutDispatcher {
        self.dispatcher_over(self.store.clone(), email_delivery, retries)
    }

    fn dispatcher_over(
        &self,
        store: Arc<dyn FeedStore>,
        email_delivery: EmailDelivery,
        retries: usize,
    ) -> FanOutDispatcher {
        FanOutDispatcher::new(
            store,
            self.hub.clone(),
            Arc::new(self.email.clone()),
            Arc::new(self.directory.clone()),
            DispatcherConfig {
                email_delivery,
                retry: fast_retry(retries),
            },
        )
    }
}

#[tokio::test]
async fn test_double_dispatch_creates_one_entry_and_one_bell() {
    let h = Harness::new();
    let ada = h.directory.add("Ada");
    let dispatcher = h.dispatcher(EmailDelivery::Inline, 0);
    let msg = message(Audience::users([ada]));

    let first = dispatcher.dispatch(&msg).await.unwrap();
    let second = dispatcher.dispatch(&msg).await.unwrap();

    assert_eq!(first.system_message.delivered, 1);
    assert_eq!(first.bell.delivered, 1);
    assert_eq!(second.system_message.delivered, 0);
    assert_eq!(second.system_message.skipped, 1);
    assert_eq!(second.bell.skipped, 1);
    assert_eq!(
        h.store.count_entries(ada).await.unwrap(),
        EntryCounts { total: 1, unread: 1 }
    );
    assert_eq!(h.store.unread_bell_count(ada).await.unwrap(), 1);
    assert_eq!(h.email.sent().len(), 1, "no duplicate email either");
}

#[tokio::test]
async fn test_email_failure_never_blocks_in_app_channels() {
    let mut h = Harness::new();
    h.email = ScriptedEmailTransport::failing();
    let ada = h.directory.add("Ada");
    let bob = h.directory.add("Bob");
    let dispatcher = h.dispatcher(EmailDelivery::Inline, 1);

    let outcome = dispatcher
        .dispatch(&message(Audience::users([ada, bob])))
        .await
        .unwrap();

    assert_eq!(outcome.email.failed, 2);
    assert_eq!(outcome.email.delivered, 0);
    assert_eq!(outcome.system_message.delivered, 2);
    assert_eq!(outcome.bell.delivered, 2);
    assert!(outcome.is_durable());
    assert_eq!(h.email.attempts(), 4, "each email is retried once");
    for user in [ada, bob] {
        assert_eq!(h.store.unread_bell_count(user).await.unwrap(), 1);
    }
}

#[tokio::test]
async fn test_transient_email_failure_is_retried() {
    let h = Harness::new();
    let ada = h.directory.add("Ada");
    h.email.fail_next(2);
    let dispatcher = h.dispatcher(EmailDelivery::Inline, 3);

    let outcome = dispatcher
        .dispatch(&message(Audience::users([ada])))
        .await
        .unwrap();

    assert_eq!(outcome.email.delivered, 1);
    assert_eq!(h.email.attempts(), 3);
    let sent = h.email.sent();
    assert_eq!(sent[0].to, "ada@example.com");
    assert_eq!(sent[0].subject, "Reminder: Food Drive");
    assert!(sent[0].body.starts_with("Hi Ada,"));
}

#[tokio::test]
async fn test_one_bad_address_does_not_affect_others() {
    let h = Harness::new();
    let ada = h.directory.add("Ada");
    let bob = h.directory.add("Bob");
    h.email.fail_for("bob@example.com");
    let dispatcher = h.dispatcher(EmailDelivery::Inline, 0);

    let outcome = dispatcher
        .dispatch(&message(Audience::users([ada, bob])))
        .await
        .unwrap();

    assert_eq!(outcome.email.delivered, 1);
    assert_eq!(outcome.email.failed, 1);
    assert_eq!(h.email.sent()[0].to, "ada@example.com");
}

#[tokio::test]
async fn test_detached_email_is_reported_as_queued() {
    let h = Harness::new();
    h.directory.add("Ada");
    h.directory.add("Bob");
    let dispatcher = h.dispatcher(EmailDelivery::Detached, 0);

    let outcome = dispatcher.dispatch(&message(Audience::All)).await.unwrap();

    assert_eq!(outcome.email.queued, 2);
    assert_eq!(outcome.email.delivered, 0);
    assert_eq!(outcome.system_message.delivered, 2);

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.email.sent().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("detached emails are eventually sent");
}

#[tokio::test]
async fn test_audience_all_reaches_every_active_user() {
    let h = Harness::new();
    let users: Vec<UserId> = ["Ada", "Bob", "Cy"]
        .iter()
        .map(|name| h.directory.add(name))
        .collect();
    let dispatcher = h.dispatcher(EmailDelivery::Inline, 0);

    let outcome = dispatcher.dispatch(&message(Audience::All)).await.unwrap();

    assert_eq!(outcome.recipients, 3);
    for user in users {
        assert_eq!(h.store.count_entries(user).await.unwrap().total, 1);
    }
}

#[tokio::test]
async fn test_unknown_users_are_left_out() {
    let h = Harness::new();
    let ada = h.directory.add("Ada");
    let dispatcher = h.dispatcher(EmailDelivery::Inline, 0);

    let outcome = dispatcher
        .dispatch(&message(Audience::users([ada, UserId::new()])))
        .await
        .unwrap();

    assert_eq!(outcome.recipients, 1);
    assert_eq!(outcome.system_message.delivered, 1);
}

#[tokio::test]
async fn test_connected_users_receive_the_new_bell() {
    let h = Harness::new();
    let ada = h.directory.add("Ada");
    let bob = h.directory.add("Bob");
    let mut ada_connection = h.hub.connect(ada);
    let dispatcher = h.dispatcher(EmailDelivery::Inline, 0);

    let outcome = dispatcher
        .dispatch(&message(Audience::users([ada, bob])))
        .await
        .unwrap();

    assert_eq!(outcome.pushed, 1, "only Ada is connected");
    let push = ada_connection.recv().await.unwrap();
    assert_eq!(push.seq, 1);
    match push.event {
        RealtimeEvent::NotificationAdded { bell } => {
            assert_eq!(bell.title, "Reminder: Food Drive");
            assert!(!bell.is_read);
        }
        other => panic!("unexpected push {other:?}"),
    }
}

#[tokio::test]
async fn test_directory_outage_aborts_before_any_channel() {
    struct DownDirectory;

    #[async_trait]
    impl UserDirectory for DownDirectory {
        async fn active_users(&self) -> Result<Vec<Recipient>, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }

        async fn find_users(&self, _ids: &[UserId]) -> Result<Vec<Recipient>, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }
    }

    let h = Harness::new();
    let dispatcher = FanOutDispatcher::new(
        h.store.clone(),
        h.hub.clone(),
        Arc::new(h.email.clone()),
        Arc::new(DownDirectory),
        DispatcherConfig::default(),
    );

    let result = dispatcher.dispatch(&message(Audience::All)).await;

    assert!(matches!(result, Err(DispatchError::Audience(_))));
    assert_eq!(h.email.attempts(), 0);
}

/// Feed store whose deliveries fail once for chosen users.
struct FlakyFeedStore {
    inner: InMemoryFeedStore,
    fail_once_for: Mutex<HashSet<UserId>>,
}

#[async_trait]
impl FeedStore for FlakyFeedStore {
    async fn insert_message(&self, message: &NotificationMessage) -> FeedResult<()> {
        self.inner.insert_message(message).await
    }

    async fn deliver(
        &self,
        message_id: MessageId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> FeedResult<Option<Delivery>> {
        if self.fail_once_for.lock().unwrap().remove(&user_id) {
            return Err(FeedError::Database("connection reset".to_string()));
        }
        self.inner.deliver(message_id, user_id, at).await
    }

    async fn list_entries(
        &self,
        user_id: UserId,
        offset: u64,
        limit: u64,
    ) -> FeedResult<Vec<(SystemMessageEntry, NotificationMessage)>> {
        self.inner.list_entries(user_id, offset, limit).await
    }

    async fn count_entries(&self, user_id: UserId) -> FeedResult<EntryCounts> {
        self.inner.count_entries(user_id).await
    }

    async fn mark_entry_read(
        &self,
        user_id: UserId,
        entry_id: EntryId,
        at: DateTime<Utc>,
    ) -> FeedResult<Option<SystemMessageEntry>> {
        self.inner.mark_entry_read(user_id, entry_id, at).await
    }

    async fn mark_all_entries_read(&self, user_id: UserId, at: DateTime<Utc>) -> FeedResult<u64> {
        self.inner.mark_all_entries_read(user_id, at).await
    }

    async fn delete_entry(&self, user_id: UserId, entry_id: EntryId) -> FeedResult<Option<Vec<BellId>>> {
        self.inner.delete_entry(user_id, entry_id).await
    }

    async fn list_bells(
        &self,
        user_id: UserId,
        limit: u64,
    ) -> FeedResult<Vec<(BellPointer, NotificationMessage)>> {
        self.inner.list_bells(user_id, limit).await
    }

    async fn unread_bell_count(&self, user_id: UserId) -> FeedResult<u64> {
        self.inner.unread_bell_count(user_id).await
    }

    async fn mark_bell_read(
        &self,
        user_id: UserId,
        bell_id: BellId,
        at: DateTime<Utc>,
    ) -> FeedResult<Option<BellPointer>> {
        self.inner.mark_bell_read(user_id, bell_id, at).await
    }

    async fn mark_all_bells_read(&self, user_id: UserId, at: DateTime<Utc>) -> FeedResult<u64> {
        self.inner.mark_all_bells_read(user_id, at).await
    }

    async fn delete_bell(&self, user_id: UserId, bell_id: BellId) -> FeedResult<bool> {
        self.inner.delete_bell(user_id, bell_id).await
    }
}

#[tokio::test]
async fn test_partial_failure_is_repaired_by_redispatch() {
    let h = Harness::new();
    let ada = h.directory.add("Ada");
    let bob = h.directory.add("Bob");
    let store = Arc::new(FlakyFeedStore {
        inner: InMemoryFeedStore::new(),
        fail_once_for: Mutex::new(HashSet::from([bob])),
    });
    let dispatcher = h.dispatcher_over(store.clone(), EmailDelivery::Inline, 0);
    let msg = message(Audience::users([ada, bob]));

    let first = dispatcher.dispatch(&msg).await.unwrap();
    assert_eq!(first.system_message.delivered, 1);
    assert_eq!(first.system_message.failed, 1);
    assert!(!first.is_durable());
    assert_eq!(store.count_entries(bob).await.unwrap().total, 0);

    let retry = dispatcher.dispatch(&msg).await.unwrap();
    assert_eq!(retry.system_message.delivered, 1);
    assert_eq!(retry.system_message.skipped, 1);
    assert!(retry.is_durable());

    for user in [ada, bob] {
        assert_eq!(store.count_entries(user).await.unwrap().total, 1);
        assert_eq!(store.unread_bell_count(user).await.unwrap(), 1);
    }
}
