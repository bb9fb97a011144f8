use super::*;
use async_trait::async_trait;
use shared::{
    domain::{PostId, UserId},
    error::ErrorObject,
};
use tokio::sync::oneshot;

use crate::{error::ClientError, presentation::Phase};

/// In-memory backend. New posts are appended server-side, so the true order differs
/// from the client's optimistic head insert.
struct TestPostsApi {
    inner: Mutex<TestBackend>,
}

#[derive(Default)]
struct TestBackend {
    posts: Vec<Post>,
    next_id: i64,
    list_calls: usize,
    remove_calls: usize,
    list_failure: Option<u16>,
    create_failure: Option<(u16, Vec<ErrorObject>)>,
    remove_failure: Option<(u16, Vec<ErrorObject>)>,
    hold_next_list: Option<oneshot::Receiver<()>>,
}

impl TestPostsApi {
    fn with_posts(posts: Vec<Post>) -> Arc<Self> {
        let next_id = posts.len() as i64 + 1;
        Arc::new(Self {
            inner: Mutex::new(TestBackend {
                posts,
                next_id,
                ..TestBackend::default()
            }),
        })
    }

    async fn list_calls(&self) -> usize {
        self.inner.lock().await.list_calls
    }

    async fn remove_calls(&self) -> usize {
        self.inner.lock().await.remove_calls
    }

    async fn server_posts(&self) -> Vec<Post> {
        self.inner.lock().await.posts.clone()
    }

    async fn fail_list(&self, status: u16) {
        self.inner.lock().await.list_failure = Some(status);
    }

    async fn fail_create(&self, status: u16, errors: Vec<ErrorObject>) {
        self.inner.lock().await.create_failure = Some((status, errors));
    }

    async fn fail_remove(&self, status: u16, errors: Vec<ErrorObject>) {
        self.inner.lock().await.remove_failure = Some((status, errors));
    }

    /// The next list call snapshots the posts immediately but only answers once the
    /// returned sender fires.
    async fn hold_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().await.hold_next_list = Some(rx);
        tx
    }
}

#[async_trait]
impl PostsApi for TestPostsApi {
    async fn list_posts(&self) -> Result<Vec<Post>, ClientError> {
        let (posts, hold) = {
            let mut backend = self.inner.lock().await;
            backend.list_calls += 1;
            if let Some(status) = backend.list_failure {
                return Err(ClientError::Status {
                    status,
                    errors: Vec::new(),
                });
            }
            (backend.posts.clone(), backend.hold_next_list.take())
        };
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        Ok(posts)
    }

    async fn create_post(&self, message: &str) -> Result<Post, ClientError> {
        let mut backend = self.inner.lock().await;
        if let Some((status, errors)) = backend.create_failure.clone() {
            return Err(ClientError::Status { status, errors });
        }
        let post = Post::new(backend.next_id, message);
        backend.next_id += 1;
        // The stored copy carries author fields the create response omits.
        let mut stored = post.clone();
        stored.username = Some("alice".to_string());
        stored.user_id = Some(UserId::from("u-1"));
        backend.posts.push(stored);
        Ok(post)
    }

    async fn remove_post(&self, id: &PostId) -> Result<(), ClientError> {
        let mut backend = self.inner.lock().await;
        backend.remove_calls += 1;
        if let Some((status, errors)) = backend.remove_failure.clone() {
            return Err(ClientError::Status { status, errors });
        }
        backend.posts.retain(|post| &post.id != id);
        Ok(())
    }
}

fn controller_for(api: Arc<TestPostsApi>) -> Arc<PostController> {
    PostController::new(api, ControllerSettings::default())
}

fn ids(posts: &[Post]) -> Vec<String> {
    posts.iter().map(|post| post.id.to_string()).collect()
}

#[tokio::test]
async fn load_replaces_list_with_backend_order() {
    let api = TestPostsApi::with_posts(vec![Post::new(3, "c"), Post::new(1, "a")]);
    let controller = controller_for(api.clone());
    controller.set_draft("half typed");

    assert_eq!(controller.load_posts().await, Outcome::Applied);

    let view = controller.snapshot();
    assert_eq!(view.posts, api.server_posts().await);
    assert_eq!(view.messages.list_success.text(), Some(POSTS_LOADED));
    assert_eq!(view.messages.list_error.text(), None);
    assert_eq!(view.draft, "half typed");
}

#[tokio::test]
async fn load_failure_shows_fixed_text_and_keeps_list() {
    let api = TestPostsApi::with_posts(vec![Post::new(1, "hi")]);
    let controller = controller_for(api.clone());
    controller.start().await;

    api.fail_list(503).await;
    let outcome = controller.load_posts().await;

    assert_eq!(
        outcome,
        Outcome::Failed {
            message: LOAD_FAILED.to_string()
        }
    );
    let view = controller.snapshot();
    assert_eq!(view.messages.list_error.text(), Some(LOAD_FAILED));
    assert_eq!(ids(&view.posts), vec!["1"]);
    assert_eq!(api.list_calls().await, 2);
}

#[tokio::test(start_paused = true)]
async fn create_prepends_then_reconciles_after_delay() {
    let api = TestPostsApi::with_posts(vec![Post::new(1, "hi")]);
    let controller = controller_for(api.clone());
    assert!(controller.start().await.is_applied());
    controller.set_draft("yo");
    let started = Instant::now();

    assert_eq!(controller.create_post("yo").await, Outcome::Applied);

    let view = controller.snapshot();
    assert_eq!(ids(&view.posts), vec!["2", "1"]);
    assert_eq!(view.posts[0].message, "yo");
    assert_eq!(view.draft, "");
    assert_eq!(view.messages.post_success.text(), Some(POST_SENT));
    assert_eq!(controller.pending_reconciliations().await, 1);

    tokio::time::sleep(Duration::from_millis(4999)).await;
    assert_eq!(api.list_calls().await, 1);
    assert_eq!(ids(&controller.posts()), vec!["2", "1"]);

    controller.wait_reconciled().await;
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(api.list_calls().await, 2);
    assert_eq!(controller.posts(), api.server_posts().await);
    assert_eq!(ids(&controller.posts()), vec!["1", "2"]);
    assert_eq!(controller.posts()[1].username.as_deref(), Some("alice"));
}

#[tokio::test]
async fn create_bad_request_surfaces_server_title() {
    let api = TestPostsApi::with_posts(Vec::new());
    let controller = controller_for(api.clone());
    api.fail_create(400, vec![ErrorObject::new(400, "X")]).await;
    controller.set_draft("short");

    let outcome = controller.create_post("short").await;

    assert_eq!(
        outcome,
        Outcome::Failed {
            message: "X".to_string()
        }
    );
    let view = controller.snapshot();
    assert_eq!(view.messages.post_error.text(), Some("X"));
    assert_eq!(view.draft, "short");
    assert!(view.posts.is_empty());
    assert_eq!(controller.pending_reconciliations().await, 0);
}

#[tokio::test]
async fn create_other_failures_use_fallback() {
    let api = TestPostsApi::with_posts(Vec::new());
    let controller = controller_for(api.clone());

    api.fail_create(500, vec![ErrorObject::new(500, "")]).await;
    controller.create_post("hello world").await;
    assert_eq!(
        controller.snapshot().messages.post_error.text(),
        Some(CREATE_FAILED)
    );

    api.fail_create(400, Vec::new()).await;
    controller.create_post("hello world").await;
    assert_eq!(
        controller.snapshot().messages.post_error.text(),
        Some(CREATE_FAILED)
    );
}

#[tokio::test]
async fn remove_splices_and_reloads() {
    let api = TestPostsApi::with_posts(vec![Post::new(1, "a"), Post::new(2, "b")]);
    let controller = controller_for(api.clone());
    controller.start().await;
    let target = controller.posts()[0].clone();

    assert_eq!(controller.remove_post(&target).await, Outcome::Applied);

    let view = controller.snapshot();
    assert!(!view.posts.contains(&target));
    assert_eq!(ids(&view.posts), vec!["2"]);
    assert_eq!(api.remove_calls().await, 1);
    assert_eq!(api.list_calls().await, 2);
    assert_eq!(view.messages.list_success.text(), Some(POSTS_LOADED));
    assert_eq!(view.messages.list_success.shows(), 3);
}

#[tokio::test]
async fn remove_splices_locally_before_reload_answers() {
    let api = TestPostsApi::with_posts(vec![Post::new(1, "a"), Post::new(2, "b")]);
    let controller = controller_for(api.clone());
    controller.start().await;
    let target = controller.posts()[0].clone();

    let release = api.hold_next_list().await;
    let removal = {
        let controller = Arc::clone(&controller);
        let target = target.clone();
        tokio::spawn(async move { controller.remove_post(&target).await })
    };
    while api.list_calls().await < 2 {
        tokio::task::yield_now().await;
    }

    let view = controller.snapshot();
    assert!(!view.posts.contains(&target));
    assert_eq!(ids(&view.posts), vec!["2"]);
    assert_eq!(view.messages.list_success.text(), Some(POST_REMOVED));

    release.send(()).expect("release held list");
    assert_eq!(removal.await.expect("join"), Outcome::Applied);
    assert_eq!(ids(&controller.posts()), vec!["2"]);
}

#[tokio::test]
async fn removing_post_missing_locally_keeps_list() {
    let api = TestPostsApi::with_posts(vec![Post::new(1, "a"), Post::new(2, "b")]);
    let controller = controller_for(api.clone());
    controller.start().await;
    let stranger = Post::new(99, "never listed");

    let release = api.hold_next_list().await;
    let removal = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.remove_post(&stranger).await })
    };
    while api.list_calls().await < 2 {
        tokio::task::yield_now().await;
    }

    assert_eq!(ids(&controller.posts()), vec!["1", "2"]);
    assert_eq!(
        controller.snapshot().messages.list_success.text(),
        Some(POST_REMOVED)
    );

    release.send(()).expect("release held list");
    assert_eq!(removal.await.expect("join"), Outcome::Applied);
    assert_eq!(ids(&controller.posts()), vec!["1", "2"]);
}

#[tokio::test]
async fn remove_failure_policy_matches_create() {
    let api = TestPostsApi::with_posts(vec![Post::new(1, "a")]);
    let controller = controller_for(api.clone());
    controller.start().await;
    let target = controller.posts()[0].clone();

    api.fail_remove(400, vec![ErrorObject::new(400, "Missing id parameter")])
        .await;
    assert_eq!(
        controller.remove_post(&target).await,
        Outcome::Failed {
            message: "Missing id parameter".to_string()
        }
    );
    assert_eq!(
        controller.snapshot().messages.list_error.text(),
        Some("Missing id parameter")
    );

    api.fail_remove(401, vec![ErrorObject::new(401, "Not allowed to delete resource")])
        .await;
    controller.remove_post(&target).await;
    assert_eq!(
        controller.snapshot().messages.list_error.text(),
        Some(REMOVE_FAILED)
    );
    assert_eq!(ids(&controller.posts()), vec!["1"]);
    assert_eq!(api.list_calls().await, 1);
}

#[tokio::test]
async fn stale_load_is_discarded_after_local_mutation() {
    let api = TestPostsApi::with_posts(vec![Post::new(1, "hi")]);
    let controller = controller_for(api.clone());
    controller.start().await;

    let release = api.hold_next_list().await;
    let pending = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.load_posts().await })
    };
    while api.list_calls().await < 2 {
        tokio::task::yield_now().await;
    }

    controller.create_post("fresh message").await;
    release.send(()).expect("release held list");

    assert_eq!(pending.await.expect("join"), Outcome::Discarded);
    assert_eq!(ids(&controller.posts()), vec!["2", "1"]);
    controller.shutdown().await;
}

#[tokio::test]
async fn older_load_never_overwrites_newer_one() {
    let api = TestPostsApi::with_posts(vec![Post::new(1, "hi")]);
    let controller = controller_for(api.clone());

    let release = api.hold_next_list().await;
    let slow = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.load_posts().await })
    };
    while api.list_calls().await < 1 {
        tokio::task::yield_now().await;
    }

    api.inner.lock().await.posts.push(Post::new(9, "later"));
    assert_eq!(controller.load_posts().await, Outcome::Applied);
    release.send(()).expect("release held list");

    assert_eq!(slow.await.expect("join"), Outcome::Discarded);
    assert_eq!(ids(&controller.posts()), vec!["1", "9"]);
}

#[tokio::test]
async fn subscribers_observe_published_state() {
    let api = TestPostsApi::with_posts(vec![Post::new(1, "hi")]);
    let controller = controller_for(api);
    let mut updates = controller.subscribe();

    controller.start().await;

    updates.changed().await.expect("state published");
    assert_eq!(ids(&updates.borrow_and_update().posts), vec!["1"]);
}

#[tokio::test(start_paused = true)]
async fn status_message_decays_on_schedule() {
    let api = TestPostsApi::with_posts(Vec::new());
    let controller = controller_for(api);
    controller.start().await;

    let phase = || {
        controller
            .snapshot()
            .messages
            .list_success
            .phase_at(Instant::now())
    };
    assert_eq!(phase(), Phase::FadingIn);
    tokio::time::advance(Duration::from_millis(600)).await;
    assert_eq!(phase(), Phase::Visible);
    tokio::time::advance(Duration::from_millis(3000)).await;
    assert_eq!(phase(), Phase::Decaying);
    tokio::time::advance(Duration::from_millis(600)).await;
    assert_eq!(phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_scheduled_reconciliation() {
    let api = TestPostsApi::with_posts(Vec::new());
    let controller = controller_for(api.clone());

    controller.create_post("hello world").await;
    controller.shutdown().await;
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(api.list_calls().await, 0);
    assert_eq!(controller.pending_reconciliations().await, 0);
}
