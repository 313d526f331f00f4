// End-to-end tests for `Model` over in-memory collaborators.
#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::{broadcast, mpsc};

use appstax_core::{
    Channel, ChannelEvent, ChannelFactory, CoreError, FindOptions, Model, ModelEvent,
    ModelEventKind, Object, ObjectSource, WatchOptions,
};

// ── Mocks ───────────────────────────────────────────────────────────

#[derive(Default)]
struct MockSource {
    collections: Mutex<Vec<(String, Vec<Object>)>>,
    expansions: Mutex<Vec<Object>>,
    calls: Mutex<Vec<String>>,
    fail_loads: bool,
}

impl MockSource {
    fn with(collection: &str, objects: Vec<Object>) -> Self {
        let source = Self::default();
        source.add(collection, objects);
        source
    }

    fn add(&self, collection: &str, objects: Vec<Object>) {
        self.collections
            .lock()
            .unwrap()
            .push((collection.to_owned(), objects));
    }

    fn expands_to(&self, object: Object) {
        self.expansions.lock().unwrap().push(object);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn load(&self, collection: &str) -> Result<Vec<Object>, CoreError> {
        if self.fail_loads {
            return Err(CoreError::Api {
                message: "boom".into(),
                status: Some(500),
            });
        }
        Ok(self
            .collections
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == collection)
            .map(|(_, objects)| objects.clone())
            .unwrap_or_default())
    }
}

impl ObjectSource for MockSource {
    fn find(
        &self,
        collection: &str,
        query: &str,
        options: FindOptions,
    ) -> BoxFuture<'static, Result<Vec<Object>, CoreError>> {
        self.calls.lock().unwrap().push(format!(
            "find {collection} [{query}] expand={:?}",
            options.expand
        ));
        let result = self.load(collection);
        Box::pin(async move { result })
    }

    fn find_all(
        &self,
        collection: &str,
        options: FindOptions,
    ) -> BoxFuture<'static, Result<Vec<Object>, CoreError>> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("find_all {collection} expand={:?}", options.expand));
        let result = self.load(collection);
        Box::pin(async move { result })
    }

    fn expand(&self, object: Object, depth: u32) -> BoxFuture<'static, Result<Object, CoreError>> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("expand {} depth={depth}", object.id().unwrap()));
        let found = self
            .expansions
            .lock()
            .unwrap()
            .iter()
            .find(|candidate| candidate.id() == object.id())
            .cloned();
        Box::pin(async move {
            found.ok_or_else(|| CoreError::NotFound {
                collection: object.collection().to_owned(),
                identifier: object.id().unwrap().to_string(),
            })
        })
    }
}

#[derive(Default)]
struct MockChannels {
    opened: Mutex<Vec<(String, String, mpsc::UnboundedSender<ChannelEvent>)>>,
}

impl MockChannels {
    fn opened(&self) -> Vec<(String, String)> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|(name, filter, _)| (name.clone(), filter.clone()))
            .collect()
    }

    fn count(&self, name: &str) -> usize {
        self.opened().iter().filter(|(n, _)| n == name).count()
    }

    fn senders(&self, name: &str) -> Vec<mpsc::UnboundedSender<ChannelEvent>> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _, _)| n == name)
            .map(|(_, _, tx)| tx.clone())
            .collect()
    }

    /// Deliver to every live channel named `name`.
    fn send(&self, name: &str, event: &ChannelEvent) {
        for tx in self.senders(name) {
            let _ = tx.send(event.clone());
        }
    }
}

impl ChannelFactory for MockChannels {
    fn open(&self, name: &str, filter: &str) -> Result<Channel, CoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.opened
            .lock()
            .unwrap()
            .push((name.to_owned(), filter.to_owned(), tx));
        Ok(Channel::from_receiver(name, filter, rx))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn todo(id: &str, created: &str) -> Object {
    Object::with_id("todos", id).with("sysCreated", created)
}

fn model(source: &Arc<MockSource>, channels: &Arc<MockChannels>) -> Model {
    Model::new(
        Arc::clone(source) as Arc<dyn ObjectSource>,
        Arc::clone(channels) as Arc<dyn ChannelFactory>,
    )
}

fn ids(model: &Model, name: &str) -> Vec<String> {
    model
        .get(name)
        .unwrap()
        .iter()
        .map(|o| o.id().unwrap().to_string())
        .collect()
}

async fn next_change(rx: &mut broadcast::Receiver<ModelEvent>) -> ModelEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a change event")
        .expect("event channel closed")
}

async fn assert_quiet(rx: &mut broadcast::Receiver<ModelEvent>) {
    let waited = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(waited.is_err(), "unexpected event: {waited:?}");
}

// ── Loading & ordering ──────────────────────────────────────────────

#[tokio::test]
async fn watch_loads_and_sorts_newest_first() {
    let source = Arc::new(MockSource::with(
        "todos",
        vec![todo("1", "2020"), todo("2", "2022"), todo("3", "2021")],
    ));
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);
    let mut events = model.events();

    model.watch("todos", WatchOptions::new()).await.unwrap();
    let event = next_change(&mut events).await;

    assert_eq!(event.kind, ModelEventKind::Change);
    assert_eq!(event.watch.as_deref(), Some("todos"));
    assert_eq!(ids(&model, "todos"), vec!["2", "3", "1"]);
    assert_eq!(source.calls(), vec!["find_all todos expand=None"]);
    assert_eq!(
        channels.opened(),
        vec![("objects/todos".to_owned(), String::new())]
    );
}

#[tokio::test]
async fn filtered_watch_queries_and_subscribes_with_filter() {
    let source = Arc::new(MockSource::with("todos", vec![todo("1", "2020")]));
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);
    let mut events = model.events();

    model
        .watch(
            "open",
            WatchOptions::new()
                .collection("todos")
                .filter("done = false")
                .order("title")
                .expand(2),
        )
        .await
        .unwrap();
    next_change(&mut events).await;

    assert_eq!(source.calls(), vec!["find todos [done = false] expand=Some(2)"]);
    assert_eq!(
        channels.opened(),
        vec![("objects/todos".to_owned(), "done = false".to_owned())]
    );
    assert_eq!(ids(&model, "open"), vec!["1"]);
}

#[tokio::test]
async fn failed_load_leaves_empty_results() {
    let source = Arc::new(MockSource {
        fail_loads: true,
        ..MockSource::default()
    });
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);
    let mut events = model.events();

    model.watch("todos", WatchOptions::new()).await.unwrap();

    assert_quiet(&mut events).await;
    assert!(model.get("todos").unwrap().is_empty());
}

// ── Real-time events ────────────────────────────────────────────────

#[tokio::test]
async fn created_and_deleted_events_update_the_list() {
    let source = Arc::new(MockSource::with("todos", vec![todo("1", "2020")]));
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);
    let mut events = model.events();

    model.watch("todos", WatchOptions::new()).await.unwrap();
    next_change(&mut events).await;

    channels.send("objects/todos", &ChannelEvent::created(todo("2", "2021")));
    next_change(&mut events).await;
    assert_eq!(ids(&model, "todos"), vec!["2", "1"]);

    channels.send(
        "objects/todos",
        &ChannelEvent::deleted(Object::with_id("todos", "1")),
    );
    next_change(&mut events).await;
    assert_eq!(ids(&model, "todos"), vec!["2"]);
}

#[tokio::test]
async fn change_listeners_fire_once_per_mutation() {
    let source = Arc::new(MockSource::with("todos", vec![todo("1", "2020")]));
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);
    let mut events = model.events();

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&first);
    model.on(ModelEventKind::Change, move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });
    let s = Arc::clone(&second);
    let id = model.on(ModelEventKind::Change, move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });

    model.watch("todos", WatchOptions::new()).await.unwrap();
    next_change(&mut events).await;
    channels.send("objects/todos", &ChannelEvent::created(todo("2", "2021")));
    next_change(&mut events).await;

    assert_eq!(first.load(Ordering::SeqCst), 2);
    assert_eq!(second.load(Ordering::SeqCst), 2);

    assert!(model.off(id));
    model.update(todo("2", "2021").with("title", "x"), 0).await.unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 3);
    assert_eq!(second.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn related_update_reaches_every_holder() {
    let owner = Object::with_id("users", "u1").with("name", "Ada");
    let source = Arc::new(MockSource::with(
        "todos",
        vec![
            todo("1", "2020").with("owner", owner.clone()),
            todo("2", "2021").with("owner", owner),
        ],
    ));
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);
    let mut events = model.events();

    model
        .watch("todos", WatchOptions::new().expand(1))
        .await
        .unwrap();
    next_change(&mut events).await;

    assert_eq!(channels.count("objects/users"), 1);

    channels.send(
        "objects/users",
        &ChannelEvent::updated(Object::with_id("users", "u1").with("name", "Grace")),
    );
    let event = next_change(&mut events).await;
    assert_eq!(event.watch, None);

    let results = model.get("todos").unwrap();
    for todo in results.iter() {
        assert_eq!(
            todo.object("owner").unwrap().string("name"),
            Some("Grace")
        );
    }
}

#[tokio::test]
async fn deep_update_is_expanded_before_merge() {
    let source = Arc::new(MockSource::with("todos", vec![todo("1", "2020")]));
    source.expands_to(
        todo("1", "2020")
            .with("title", "fresh")
            .with("owner", Object::with_id("users", "u1").with("name", "Ada")),
    );
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);
    let mut events = model.events();

    model
        .watch("todos", WatchOptions::new().expand(1))
        .await
        .unwrap();
    next_change(&mut events).await;

    channels.send(
        "objects/todos",
        &ChannelEvent::updated(Object::with_id("todos", "1").with("title", "stale")),
    );
    next_change(&mut events).await;

    let first = Arc::clone(&model.get("todos").unwrap()[0]);
    assert_eq!(first.string("title"), Some("fresh"));
    assert_eq!(first.object("owner").unwrap().string("name"), Some("Ada"));
    assert!(source.calls().contains(&"expand 1 depth=1".to_owned()));
    assert_eq!(channels.count("objects/users"), 1);
}

#[tokio::test]
async fn failed_expansion_skips_the_update() {
    let source = Arc::new(MockSource::with(
        "todos",
        vec![todo("1", "2020").with("title", "original")],
    ));
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);
    let mut events = model.events();

    model
        .watch("todos", WatchOptions::new().expand(1))
        .await
        .unwrap();
    next_change(&mut events).await;

    channels.send(
        "objects/todos",
        &ChannelEvent::updated(Object::with_id("todos", "1").with("title", "changed")),
    );

    assert_quiet(&mut events).await;
    assert_eq!(
        model.get("todos").unwrap()[0].string("title"),
        Some("original")
    );
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn replacing_a_watch_closes_its_channels() {
    let source = Arc::new(MockSource::with("todos", vec![todo("1", "2020")]));
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);
    let mut events = model.events();

    let old = model.watch("todos", WatchOptions::new()).await.unwrap();
    next_change(&mut events).await;
    let old_sender = channels.senders("objects/todos").remove(0);

    model
        .watch("todos", WatchOptions::new().filter("done = true"))
        .await
        .unwrap();
    next_change(&mut events).await;

    tokio::time::timeout(Duration::from_secs(5), old_sender.closed())
        .await
        .expect("old channel was not closed");
    assert_eq!(channels.count("objects/todos"), 2);

    assert!(!old.dispose().await.unwrap());
    assert_eq!(model.watch_names(), vec!["todos"]);
}

#[tokio::test]
async fn dispose_removes_watch_and_results() {
    let source = Arc::new(MockSource::with("todos", vec![todo("1", "2020")]));
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);
    let mut events = model.events();

    let handle = model.watch("todos", WatchOptions::new()).await.unwrap();
    next_change(&mut events).await;
    assert_eq!(handle.get().unwrap().len(), 1);

    let mut results = handle.results().unwrap();
    assert!(handle.clone().dispose().await.unwrap());

    assert!(model.get("todos").is_none());
    assert!(results.changed().await.is_none());
    assert!(!model.unwatch("todos").await.unwrap());
}

#[tokio::test]
async fn results_stream_sees_each_publish() {
    let source = Arc::new(MockSource::with("todos", vec![todo("1", "2020")]));
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);

    model.watch("todos", WatchOptions::new()).await.unwrap();
    let mut results = model.results("todos").unwrap();

    let loaded = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = results.changed().await.unwrap();
            if !snapshot.is_empty() {
                return snapshot;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(loaded.len(), 1);

    channels.send("objects/todos", &ChannelEvent::created(todo("2", "2021")));
    let next = tokio::time::timeout(Duration::from_secs(5), results.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.len(), 2);
}

#[tokio::test]
async fn explicit_update_is_visible_on_return() {
    let source = Arc::new(MockSource::with("todos", vec![todo("1", "2020")]));
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);
    let mut events = model.events();

    model.watch("todos", WatchOptions::new()).await.unwrap();
    next_change(&mut events).await;

    model
        .update(Object::with_id("todos", "1").with("title", "edited"), 0)
        .await
        .unwrap();

    assert_eq!(model.get("todos").unwrap()[0].string("title"), Some("edited"));
}

#[tokio::test]
async fn shutdown_rejects_further_commands() {
    let source = Arc::new(MockSource::default());
    let channels = Arc::new(MockChannels::default());
    let model = model(&source, &channels);

    model.shutdown().await;

    assert!(model.is_shut_down());
    let err = model.watch("todos", WatchOptions::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::ModelClosed));
}
