use std::{sync::Arc, time::Duration};

use shared::domain::Post;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    presentation::{Channel, MessageTiming, ShowOutcome, ViewState},
    transport::PostsApi,
};

pub const POSTS_LOADED: &str = "Posts loaded!";
pub const POST_SENT: &str = "Message sent!";
pub const POST_REMOVED: &str = "Message removed!";
pub const LOAD_FAILED: &str = "Could not fetch posts :( but i'm not giving up";
pub const CREATE_FAILED: &str = "Could not send your message :(";
pub const REMOVE_FAILED: &str = "Could not remove this message :(";

const DEFAULT_RECONCILE_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Delay between a successful create and the full reload that corrects it.
    pub reconcile_delay: Duration,
    pub message_timing: MessageTiming,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            reconcile_delay: DEFAULT_RECONCILE_DELAY,
            message_timing: MessageTiming::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// A load finished after newer local state existed and was dropped.
    Discarded,
    Failed { message: String },
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

#[derive(Debug, Default)]
struct SyncState {
    next_load_ticket: u64,
    applied_load_ticket: u64,
    mutation_epoch: u64,
}

/// Owns the cached post list and the status channels, and runs every backend
/// operation. Failures never escape; they end up as status messages.
pub struct PostController {
    api: Arc<dyn PostsApi>,
    settings: ControllerSettings,
    state: watch::Sender<ViewState>,
    sync: Mutex<SyncState>,
    mutation_lane: Mutex<()>,
    reconcile_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PostController {
    pub fn new(api: Arc<dyn PostsApi>, settings: ControllerSettings) -> Arc<Self> {
        let (state, _) = watch::channel(ViewState::new(settings.message_timing));
        Arc::new(Self {
            api,
            settings,
            state,
            sync: Mutex::new(SyncState::default()),
            mutation_lane: Mutex::new(()),
            reconcile_tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn settings(&self) -> ControllerSettings {
        self.settings
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.state.borrow().posts.clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_modify(|view| view.draft = text);
    }

    /// Initial population of the list.
    pub async fn start(&self) -> Outcome {
        info!("post controller starting");
        self.load_posts().await
    }

    pub async fn load_posts(&self) -> Outcome {
        let (ticket, epoch) = {
            let mut sync = self.sync.lock().await;
            sync.next_load_ticket += 1;
            (sync.next_load_ticket, sync.mutation_epoch)
        };
        debug!(ticket, "loading posts");

        match self.api.list_posts().await {
            Ok(posts) => {
                let mut sync = self.sync.lock().await;
                if ticket < sync.applied_load_ticket || epoch != sync.mutation_epoch {
                    debug!(
                        ticket,
                        applied_ticket = sync.applied_load_ticket,
                        issued_epoch = epoch,
                        current_epoch = sync.mutation_epoch,
                        "discarding stale post list"
                    );
                    return Outcome::Discarded;
                }
                sync.applied_load_ticket = ticket;

                let count = posts.len();
                self.update(|view, now| {
                    view.posts = posts;
                    show(view, Channel::ListSuccess, POSTS_LOADED, now);
                });
                info!(ticket, count, "posts loaded");
                Outcome::Applied
            }
            Err(error) => {
                // The status is only logged; the view gets the fixed text.
                warn!(status = ?error.status(), %error, "could not fetch posts");
                self.update(|view, now| show(view, Channel::ListError, LOAD_FAILED, now));
                Outcome::Failed {
                    message: LOAD_FAILED.to_string(),
                }
            }
        }
    }

    pub async fn create_post(self: &Arc<Self>, message: &str) -> Outcome {
        let _lane = self.mutation_lane.lock().await;

        match self.api.create_post(message).await {
            Ok(post) => {
                let post_id = post.id.clone();
                {
                    let mut sync = self.sync.lock().await;
                    sync.mutation_epoch += 1;
                    self.update(|view, now| {
                        view.draft.clear();
                        view.posts.insert(0, post);
                        show(view, Channel::PostSuccess, POST_SENT, now);
                    });
                }
                info!(%post_id, "post created");
                self.schedule_reconcile().await;
                Outcome::Applied
            }
            Err(error) => {
                let text = error.user_message(CREATE_FAILED);
                warn!(status = ?error.status(), %error, "could not create post");
                self.update(|view, now| show(view, Channel::PostError, &text, now));
                Outcome::Failed { message: text }
            }
        }
    }

    /// Deletes `post`, splices it out of the local list and then reloads.
    pub async fn remove_post(&self, post: &Post) -> Outcome {
        {
            let _lane = self.mutation_lane.lock().await;

            if let Err(error) = self.api.remove_post(&post.id).await {
                let text = error.user_message(REMOVE_FAILED);
                warn!(post_id = %post.id, status = ?error.status(), %error, "could not remove post");
                self.update(|view, now| show(view, Channel::ListError, &text, now));
                return Outcome::Failed { message: text };
            }

            let mut sync = self.sync.lock().await;
            sync.mutation_epoch += 1;
            self.update(|view, now| {
                if let Some(index) = view.posts.iter().position(|candidate| candidate == post) {
                    view.posts.remove(index);
                }
                show(view, Channel::ListSuccess, POST_REMOVED, now);
            });
            info!(post_id = %post.id, "post removed");
        }

        self.load_posts().await;
        Outcome::Applied
    }

    /// Waits for every scheduled reconciliation to finish.
    pub async fn wait_reconciled(&self) {
        let tasks = std::mem::take(&mut *self.reconcile_tasks.lock().await);
        for task in tasks {
            if let Err(error) = task.await {
                if !error.is_cancelled() {
                    warn!(%error, "reconciliation task failed");
                }
            }
        }
    }

    pub async fn pending_reconciliations(&self) -> usize {
        let mut tasks = self.reconcile_tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.len()
    }

    /// Aborts scheduled reconciliations. Requests already in flight still complete.
    pub async fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.reconcile_tasks.lock().await);
        debug!(count = tasks.len(), "aborting scheduled reconciliations");
        for task in tasks {
            task.abort();
        }
    }

    async fn schedule_reconcile(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        let delay = self.settings.reconcile_delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("running scheduled reconciliation");
            controller.load_posts().await;
        });

        let mut tasks = self.reconcile_tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    fn update(&self, apply: impl FnOnce(&mut ViewState, Instant)) {
        let now = Instant::now();
        self.state.send_modify(|view| apply(view, now));
    }
}

fn show(view: &mut ViewState, channel: Channel, text: &str, now: Instant) {
    if let ShowOutcome::Restarted { interrupted } = view.messages.channel_mut(channel).show(text, now)
    {
        debug!(
            channel = channel.label(),
            ?interrupted,
            "status message restarted while on screen"
        );
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
