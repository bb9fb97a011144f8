use serde::{Deserialize, Serialize};

use crate::domain::Post;

/// Every request and success body is wrapped in a top-level `data` member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

impl<T> DataEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub message: String,
}

pub type CreatePostRequest = DataEnvelope<NewPost>;
pub type PostResponse = DataEnvelope<Post>;
pub type PostListResponse = DataEnvelope<Vec<Post>>;

impl CreatePostRequest {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self::new(NewPost {
            message: message.into(),
        })
    }
}

pub fn posts_route() -> &'static str {
    "/api/posts"
}
