//! Purpose: In-memory post collection plus the selected-post detail cache.
//! Exports: `PostStore`.
//! Role: Mediates post CRUD through the API client and enforces the
//! cache-then-network lookup for single posts.
//! Invariants: The collection holds listing arrival order; edits replace in
//! place, deletes remove exactly the matching entry.
//! Invariants: Mutating operations record failures in store state and
//! re-signal them to the caller.

use crate::api::{ApiResult, BlogApi, Error};
use crate::core::model::{Post, PostDraft, PostPatch};
use crate::store::StoreError;

pub struct PostStore<A> {
    api: A,
    posts: Vec<Post>,
    selected: Option<Post>,
    loading: bool,
    error: Option<StoreError>,
}

impl<A: BlogApi> PostStore<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            posts: Vec::new(),
            selected: None,
            loading: false,
            error: None,
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn selected_post(&self) -> Option<&Post> {
        self.selected.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&StoreError> {
        self.error.as_ref()
    }

    /// Replace the entire collection with the listing response. No merge.
    pub fn fetch_posts(&mut self) {
        self.loading = true;
        self.error = None;
        match self.api.list_posts() {
            Ok(posts) => self.posts = posts,
            Err(err) => self.error = Some(StoreError::from_error(&err, "Failed to fetch posts")),
        }
        self.loading = false;
    }

    /// Two-tier lookup: the already-loaded collection first, the network on a
    /// miss. A fetched post is written back into the collection so the next
    /// lookup for the same id hits the cache. The previously selected post is
    /// cleared up front so a failure never leaves a stale detail view.
    pub fn fetch_post(&mut self, id: &str) {
        self.selected = None;
        self.error = None;
        self.loading = true;

        if let Some(hit) = self.posts.iter().find(|post| post.id == id) {
            self.selected = Some(hit.clone());
            self.loading = false;
            return;
        }

        match self.api.get_post(id) {
            Ok(post) => {
                self.posts.push(post.clone());
                self.selected = Some(post);
            }
            Err(err) => {
                self.error = Some(StoreError::from_error(&err, "Failed to fetch post"));
            }
        }
        self.loading = false;
    }

    /// Create a post and append it to the end of the collection. The error is
    /// both recorded and returned so a caller can show an inline message.
    pub fn add_post(&mut self, draft: &PostDraft) -> ApiResult<Post> {
        self.loading = true;
        self.error = None;
        let result = self.api.create_post(draft);
        match result {
            Ok(post) => {
                self.posts.push(post.clone());
                self.loading = false;
                Ok(post)
            }
            Err(err) => Err(self.fail(err, "Failed to create post")),
        }
    }

    /// Update a post, replacing the collection entry in place (same position)
    /// and the selected post when it carries the same id.
    pub fn edit_post(&mut self, id: &str, patch: &PostPatch) -> ApiResult<Post> {
        self.loading = true;
        self.error = None;
        let result = self.api.update_post(id, patch);
        match result {
            Ok(post) => {
                if let Some(entry) = self.posts.iter_mut().find(|entry| entry.id == id) {
                    *entry = post.clone();
                }
                if self.selected.as_ref().is_some_and(|sel| sel.id == id) {
                    self.selected = Some(post.clone());
                }
                self.loading = false;
                Ok(post)
            }
            Err(err) => Err(self.fail(err, "Failed to update post")),
        }
    }

    /// Delete a post and drop the matching collection entry. The backend's
    /// confirmation message is passed through for display.
    pub fn delete_post(&mut self, id: &str) -> ApiResult<String> {
        self.loading = true;
        self.error = None;
        match self.api.delete_post(id) {
            Ok(message) => {
                self.posts.retain(|post| post.id != id);
                self.loading = false;
                Ok(message)
            }
            Err(err) => Err(self.fail(err, "Failed to delete post")),
        }
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Used by views on unmount/navigation so a detail view for one post
    /// never shows data for another.
    pub fn clear_selected_post(&mut self) {
        self.selected = None;
    }

    fn fail(&mut self, err: Error, fallback: &str) -> Error {
        self.error = Some(StoreError::from_error(&err, fallback));
        self.loading = false;
        err
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::PostStore;
    use crate::api::{ApiResult, BlogApi};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::model::{Author, Post, PostDraft, PostPatch, Profile, UserInfo};
    use std::cell::RefCell;

    /// In-memory stand-in for the HTTP client, with call counters so tests
    /// can prove when the stores stayed off the network.
    #[derive(Default)]
    pub(crate) struct TestBackend {
        users: Vec<(String, String, String, bool)>,
        posts: RefCell<Vec<Post>>,
        next_id: RefCell<u32>,
        pub list_calls: RefCell<u32>,
        pub get_calls: RefCell<u32>,
    }

    impl TestBackend {
        pub fn with_user(
            mut self,
            username: &str,
            email: &str,
            password: &str,
            is_admin: bool,
        ) -> Self {
            self.users.push((
                username.to_string(),
                email.to_string(),
                password.to_string(),
                is_admin,
            ));
            self
        }

        pub fn with_post(self, post: Post) -> Self {
            self.posts.borrow_mut().push(post);
            *self.next_id.borrow_mut() += 1;
            self
        }

        fn user_info(&self, username: &str, email: &str, is_admin: bool) -> UserInfo {
            UserInfo {
                id: format!("u-{username}"),
                username: username.to_string(),
                email: email.to_string(),
                is_admin,
                token: format!("tok-{username}"),
            }
        }
    }

    pub(crate) fn post(id: &str, title: &str) -> Post {
        Post {
            id: id.to_string(),
            title: title.to_string(),
            content: "body".to_string(),
            image_url: None,
            author: Author {
                id: "u-alice".to_string(),
                username: "alice".to_string(),
                email: "a@b.c".to_string(),
            },
            published_at: "2026-01-01T00:00:00Z".to_string(),
            tags: vec!["rust".to_string()],
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    impl BlogApi for TestBackend {
        fn login(&self, email: &str, password: &str) -> ApiResult<UserInfo> {
            self.users
                .iter()
                .find(|(_, e, p, _)| e == email && p == password)
                .map(|(username, email, _, is_admin)| self.user_info(username, email, *is_admin))
                .ok_or_else(|| {
                    Error::new(ErrorKind::Permission).with_message("Invalid email or password")
                })
        }

        fn register(
            &self,
            username: &str,
            email: &str,
            _password: &str,
            is_admin: bool,
        ) -> ApiResult<UserInfo> {
            if self.users.iter().any(|(_, e, _, _)| e == email) {
                return Err(
                    Error::new(ErrorKind::AlreadyExists).with_message("User already exists")
                );
            }
            Ok(self.user_info(username, email, is_admin))
        }

        fn profile(&self) -> ApiResult<Profile> {
            Err(Error::new(ErrorKind::Permission).with_message("Not authorized, no token"))
        }

        fn list_posts(&self) -> ApiResult<Vec<Post>> {
            *self.list_calls.borrow_mut() += 1;
            Ok(self.posts.borrow().clone())
        }

        fn get_post(&self, id: &str) -> ApiResult<Post> {
            *self.get_calls.borrow_mut() += 1;
            self.posts
                .borrow()
                .iter()
                .find(|post| post.id == id)
                .cloned()
                .ok_or_else(|| {
                    Error::new(ErrorKind::NotFound).with_message("Blog post not found")
                })
        }

        fn create_post(&self, draft: &PostDraft) -> ApiResult<Post> {
            if draft.title.is_empty() || draft.content.is_empty() {
                return Err(
                    Error::new(ErrorKind::Usage).with_message("Title and content are required")
                );
            }
            let mut next_id = self.next_id.borrow_mut();
            *next_id += 1;
            let mut created = post(&format!("p{next_id}"), &draft.title);
            created.content = draft.content.clone();
            created.image_url = draft.image_url.clone();
            created.tags = draft.tags.clone();
            self.posts.borrow_mut().push(created.clone());
            Ok(created)
        }

        fn update_post(&self, id: &str, patch: &PostPatch) -> ApiResult<Post> {
            let mut posts = self.posts.borrow_mut();
            let entry = posts.iter_mut().find(|post| post.id == id).ok_or_else(|| {
                Error::new(ErrorKind::NotFound).with_message("Blog post not found")
            })?;
            if let Some(title) = &patch.title {
                entry.title = title.clone();
            }
            if let Some(content) = &patch.content {
                entry.content = content.clone();
            }
            if let Some(image_url) = &patch.image_url {
                entry.image_url = Some(image_url.clone());
            }
            if let Some(tags) = &patch.tags {
                entry.tags = tags.clone();
            }
            entry.updated_at = "2026-01-02T00:00:00Z".to_string();
            Ok(entry.clone())
        }

        fn delete_post(&self, id: &str) -> ApiResult<String> {
            let mut posts = self.posts.borrow_mut();
            let before = posts.len();
            posts.retain(|post| post.id != id);
            if posts.len() == before {
                return Err(Error::new(ErrorKind::NotFound).with_message("Blog post not found"));
            }
            Ok("Blog post removed".to_string())
        }
    }

    #[test]
    fn fetch_posts_replaces_the_collection() {
        let backend = TestBackend::default()
            .with_post(post("p1", "first"))
            .with_post(post("p2", "second"));
        let mut store = PostStore::new(backend);

        store.fetch_posts();
        assert_eq!(store.posts().len(), 2);
        assert_eq!(store.posts()[0].id, "p1");
        assert!(!store.is_loading());
        assert!(store.error().is_none());
    }

    #[test]
    fn cache_hit_avoids_the_network() {
        let backend = TestBackend::default().with_post(post("p1", "first"));
        let mut store = PostStore::new(backend);
        store.fetch_posts();

        store.fetch_post("p1");
        assert_eq!(store.selected_post().map(|p| p.id.as_str()), Some("p1"));
        assert_eq!(*store.api.get_calls.borrow(), 0);
        assert!(!store.is_loading());
    }

    #[test]
    fn cache_miss_fetches_and_writes_back() {
        let backend = TestBackend::default().with_post(post("p1", "first"));
        let mut store = PostStore::new(backend);

        store.fetch_post("p1");
        assert_eq!(store.selected_post().map(|p| p.id.as_str()), Some("p1"));
        assert_eq!(*store.api.get_calls.borrow(), 1);
        // Written back into the index: the second lookup is a cache hit.
        store.fetch_post("p1");
        assert_eq!(*store.api.get_calls.borrow(), 1);
    }

    #[test]
    fn fetch_post_clears_previous_selection_before_lookup() {
        let backend = TestBackend::default().with_post(post("p1", "first"));
        let mut store = PostStore::new(backend);
        store.fetch_posts();
        store.fetch_post("p1");
        assert!(store.selected_post().is_some());

        store.fetch_post("missing");
        assert!(store.selected_post().is_none());
        let err = store.error().expect("error recorded");
        assert!(err.is_not_found());
        assert_eq!(err.message, "Blog post not found");
        assert!(!store.is_loading());
    }

    #[test]
    fn add_post_appends_exactly_once() {
        let backend = TestBackend::default().with_post(post("p1", "first"));
        let mut store = PostStore::new(backend);
        store.fetch_posts();

        let draft = PostDraft {
            title: "new".to_string(),
            content: "body".to_string(),
            ..PostDraft::default()
        };
        let created = store.add_post(&draft).expect("create");
        assert_eq!(store.posts().len(), 2);
        assert_eq!(store.posts()[1].id, created.id);

        // A full refetch still shows the post exactly once.
        store.fetch_posts();
        let matches = store
            .posts()
            .iter()
            .filter(|post| post.id == created.id)
            .count();
        assert_eq!(matches, 1);
    }

    #[test]
    fn add_post_failure_is_recorded_and_resignaled() {
        let mut store = PostStore::new(TestBackend::default());
        let draft = PostDraft::default();
        let err = store.add_post(&draft).expect_err("invalid draft");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let recorded = store.error().expect("error recorded");
        assert_eq!(recorded.message, "Title and content are required");
        assert!(!store.is_loading());
    }

    #[test]
    fn edit_post_replaces_in_place_and_syncs_selection() {
        let backend = TestBackend::default()
            .with_post(post("p1", "first"))
            .with_post(post("p2", "second"));
        let mut store = PostStore::new(backend);
        store.fetch_posts();
        store.fetch_post("p1");

        let patch = PostPatch {
            title: Some("renamed".to_string()),
            ..PostPatch::default()
        };
        store.edit_post("p1", &patch).expect("edit");

        // Same position, updated content; omitted fields retained.
        assert_eq!(store.posts()[0].id, "p1");
        assert_eq!(store.posts()[0].title, "renamed");
        assert_eq!(store.posts()[0].content, "body");
        assert_eq!(store.posts()[1].id, "p2");
        assert_eq!(
            store.selected_post().map(|p| p.title.as_str()),
            Some("renamed")
        );
    }

    #[test]
    fn edit_of_unselected_post_leaves_selection_alone() {
        let backend = TestBackend::default()
            .with_post(post("p1", "first"))
            .with_post(post("p2", "second"));
        let mut store = PostStore::new(backend);
        store.fetch_posts();
        store.fetch_post("p1");

        let patch = PostPatch {
            title: Some("renamed".to_string()),
            ..PostPatch::default()
        };
        store.edit_post("p2", &patch).expect("edit");
        assert_eq!(store.selected_post().map(|p| p.id.as_str()), Some("p1"));
        assert_eq!(store.selected_post().map(|p| p.title.as_str()), Some("first"));
    }

    #[test]
    fn delete_post_removes_exactly_one() {
        let backend = TestBackend::default()
            .with_post(post("p1", "first"))
            .with_post(post("p2", "second"))
            .with_post(post("p3", "third"));
        let mut store = PostStore::new(backend);
        store.fetch_posts();

        let message = store.delete_post("p2").expect("delete");
        // The backend confirmation is surfaced as-is, not rebuilt locally.
        assert_eq!(message, "Blog post removed");
        let ids: Vec<&str> = store.posts().iter().map(|post| post.id.as_str()).collect();
        assert_eq!(ids, ["p1", "p3"]);
    }

    #[test]
    fn starting_an_operation_clears_the_prior_error() {
        let mut store = PostStore::new(TestBackend::default());
        store.fetch_post("missing");
        assert!(store.error().is_some());

        store.fetch_posts();
        assert!(store.error().is_none());
    }

    #[test]
    fn clear_helpers_reset_their_fields() {
        let backend = TestBackend::default().with_post(post("p1", "first"));
        let mut store = PostStore::new(backend);
        store.fetch_posts();
        store.fetch_post("p1");
        store.clear_selected_post();
        assert!(store.selected_post().is_none());

        store.fetch_post("missing");
        store.clear_error();
        assert!(store.error().is_none());
    }
}
