//! Purpose: Client-side session state: the authenticated identity and the
//! outcome of the last login/register attempt.
//! Exports: `SessionStore`.
//! Role: Explicit service object; construct once per process and pass by
//! reference. Persists through `SessionFile` and re-derives from it on
//! `refresh`.
//! Invariants: `loading` is true only strictly between the start and end of
//! an in-flight login/register call; never true at rest.
//! Invariants: The persisted session is fully present or fully absent.

use crate::api::BlogApi;
use crate::core::model::UserInfo;
use crate::core::session::SessionFile;
use crate::store::StoreError;

pub struct SessionStore<A> {
    api: A,
    file: SessionFile,
    user_info: Option<UserInfo>,
    loading: bool,
    error: Option<StoreError>,
}

impl<A: BlogApi> SessionStore<A> {
    /// Build the store, loading any previously persisted identity. Malformed
    /// persisted data is treated as absent.
    pub fn open(api: A, file: SessionFile) -> Self {
        let user_info = file.load();
        Self {
            api,
            file,
            user_info,
            loading: false,
            error: None,
        }
    }

    pub fn user_info(&self) -> Option<&UserInfo> {
        self.user_info.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&StoreError> {
        self.error.as_ref()
    }

    pub fn login(&mut self, email: &str, password: &str) {
        self.loading = true;
        self.error = None;
        let result = self.api.login(email, password);
        self.settle(result, "Login failed");
    }

    pub fn register(&mut self, username: &str, email: &str, password: &str, is_admin: bool) {
        self.loading = true;
        self.error = None;
        let result = self.api.register(username, email, password, is_admin);
        self.settle(result, "Registration failed");
    }

    /// Clear the identity from memory and from persisted storage. No network
    /// call is made; the bearer token is simply forgotten.
    pub fn logout(&mut self) {
        self.user_info = None;
        self.loading = false;
        self.error = None;
        self.file.clear();
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Re-derive in-memory state from the persisted source of truth. Invoked
    /// by external storage-change notifications so a logout made by another
    /// process is observed without restart.
    pub fn refresh(&mut self) {
        self.user_info = self.file.load();
    }

    fn settle(&mut self, result: Result<UserInfo, crate::api::Error>, fallback: &str) {
        match result {
            Ok(user) => {
                if let Err(err) = self.file.store(&user) {
                    tracing::warn!(error = %err, "failed to persist session");
                }
                self.user_info = Some(user);
            }
            Err(err) => {
                self.error = Some(StoreError::from_error(&err, fallback));
                self.user_info = None;
                // Drop any stale persisted identity along with the in-memory one.
                self.file.clear();
            }
        }
        self.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::SessionStore;
    use crate::core::error::ErrorKind;
    use crate::core::model::UserInfo;
    use crate::core::session::SessionFile;
    use crate::store::posts::tests::TestBackend;
    use tempfile::tempdir;

    fn store_with(
        backend: TestBackend,
        dir: &std::path::Path,
    ) -> SessionStore<TestBackend> {
        SessionStore::open(backend, SessionFile::new(dir))
    }

    #[test]
    fn fresh_store_is_empty_and_idle() {
        let dir = tempdir().expect("tempdir");
        let store = store_with(TestBackend::default(), dir.path());
        assert!(store.user_info().is_none());
        assert!(!store.is_loading());
        assert!(store.error().is_none());
    }

    #[test]
    fn successful_login_persists_identity() {
        let dir = tempdir().expect("tempdir");
        let backend = TestBackend::default().with_user("alice", "a@b.c", "pw", true);
        let mut store = store_with(backend, dir.path());

        store.login("a@b.c", "pw");
        assert!(!store.is_loading());
        assert!(store.error().is_none());
        let user = store.user_info().expect("logged in");
        assert_eq!(user.email, "a@b.c");
        assert!(user.is_admin);

        // Identity survives a new store instance via the session file.
        let reopened = store_with(TestBackend::default(), dir.path());
        assert_eq!(reopened.user_info().map(|u| u.email.clone()), Some("a@b.c".to_string()));
    }

    #[test]
    fn failed_login_records_error_and_clears_persisted_identity() {
        let dir = tempdir().expect("tempdir");
        let backend = TestBackend::default().with_user("alice", "a@b.c", "pw", false);
        let mut store = store_with(backend, dir.path());

        store.login("a@b.c", "pw");
        assert!(store.user_info().is_some());

        store.login("a@b.c", "wrong");
        assert!(store.user_info().is_none());
        let err = store.error().expect("error recorded");
        assert_eq!(err.kind, ErrorKind::Permission);
        assert_eq!(err.message, "Invalid email or password");
        assert!(!store.is_loading());
        assert_eq!(SessionFile::new(dir.path()).load(), None);
    }

    #[test]
    fn later_successful_login_clears_prior_error() {
        let dir = tempdir().expect("tempdir");
        let backend = TestBackend::default().with_user("alice", "a@b.c", "pw", false);
        let mut store = store_with(backend, dir.path());

        store.login("a@b.c", "wrong");
        assert!(store.error().is_some());
        store.login("a@b.c", "pw");
        assert!(store.error().is_none());
        assert!(store.user_info().is_some());
    }

    #[test]
    fn register_failure_uses_backend_message() {
        let dir = tempdir().expect("tempdir");
        let backend = TestBackend::default().with_user("alice", "a@b.c", "pw", false);
        let mut store = store_with(backend, dir.path());

        store.register("bob", "a@b.c", "pw2", false);
        let err = store.error().expect("error recorded");
        assert_eq!(err.kind, ErrorKind::AlreadyExists);
        assert_eq!(err.message, "User already exists");
    }

    #[test]
    fn logout_clears_memory_and_file() {
        let dir = tempdir().expect("tempdir");
        let backend = TestBackend::default().with_user("alice", "a@b.c", "pw", false);
        let mut store = store_with(backend, dir.path());
        store.login("a@b.c", "pw");

        store.logout();
        assert!(store.user_info().is_none());
        assert_eq!(SessionFile::new(dir.path()).load(), None);
    }

    #[test]
    fn refresh_observes_external_logout() {
        let dir = tempdir().expect("tempdir");
        let backend = TestBackend::default().with_user("alice", "a@b.c", "pw", false);
        let mut store = store_with(backend, dir.path());
        store.login("a@b.c", "pw");
        assert!(store.user_info().is_some());

        // Another process removes the persisted session key.
        SessionFile::new(dir.path()).clear();
        store.refresh();
        assert!(store.user_info().is_none());
    }

    #[test]
    fn refresh_observes_external_login() {
        let dir = tempdir().expect("tempdir");
        let mut store = store_with(TestBackend::default(), dir.path());
        assert!(store.user_info().is_none());

        let user = UserInfo {
            id: "u9".to_string(),
            username: "carol".to_string(),
            email: "c@b.c".to_string(),
            is_admin: false,
            token: "tok".to_string(),
        };
        SessionFile::new(dir.path()).store(&user).expect("store");
        store.refresh();
        assert_eq!(store.user_info(), Some(&user));
    }
}
