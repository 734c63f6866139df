//! Purpose: File-backed document store for users and posts.
//! Exports: `Repo`, `UserRecord`, `PostRecord`, `NewUser`.
//! Role: The server's only persistence layer; one JSON document file per
//! collection under the data directory.
//! Invariants: Writes hold an exclusive advisory lock and replace files
//! atomically (temp + rename); reads hold a shared lock.
//! Invariants: Post listing preserves insertion order; ids are unique and
//! stable once assigned.

use crate::core::auth;
use crate::core::error::{Error, ErrorKind};
use crate::core::model::{PostDraft, PostPatch};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

const USERS_FILE: &str = "users.json";
const POSTS_FILE: &str = "posts.json";
const LOCK_FILE: &str = ".lock";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub is_admin: bool,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub author_id: String,
    pub tags: Vec<String>,
    pub published_at: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
}

#[derive(Clone, Debug)]
pub struct Repo {
    data_dir: PathBuf,
}

impl Repo {
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to create data directory")
                .with_source(err)
        })?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn create_user(&self, new_user: NewUser) -> Result<UserRecord, Error> {
        let _lock = self.lock_exclusive()?;
        let mut users: Vec<UserRecord> = self.load(USERS_FILE)?;
        if users.iter().any(|user| user.email == new_user.email) {
            return Err(Error::new(ErrorKind::AlreadyExists).with_message("User already exists"));
        }
        let salt = auth::generate_salt()?;
        let record = UserRecord {
            id: new_id()?,
            username: new_user.username,
            email: new_user.email,
            password_hash: auth::hash_password(&new_user.password, &salt),
            salt,
            is_admin: new_user.is_admin,
            created_at: now_rfc3339()?,
        };
        users.push(record.clone());
        self.save(USERS_FILE, &users)?;
        Ok(record)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, Error> {
        let _lock = self.lock_shared()?;
        let users: Vec<UserRecord> = self.load(USERS_FILE)?;
        Ok(users.into_iter().find(|user| user.email == email))
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>, Error> {
        let _lock = self.lock_shared()?;
        let users: Vec<UserRecord> = self.load(USERS_FILE)?;
        Ok(users.into_iter().find(|user| user.id == id))
    }

    pub fn list_posts(&self) -> Result<Vec<PostRecord>, Error> {
        let _lock = self.lock_shared()?;
        self.load(POSTS_FILE)
    }

    pub fn get_post(&self, id: &str) -> Result<PostRecord, Error> {
        let _lock = self.lock_shared()?;
        let posts: Vec<PostRecord> = self.load(POSTS_FILE)?;
        posts
            .into_iter()
            .find(|post| post.id == id)
            .ok_or_else(post_not_found)
    }

    pub fn create_post(&self, author_id: &str, draft: PostDraft) -> Result<PostRecord, Error> {
        let _lock = self.lock_exclusive()?;
        let mut posts: Vec<PostRecord> = self.load(POSTS_FILE)?;
        let now = now_rfc3339()?;
        let record = PostRecord {
            id: new_id()?,
            title: draft.title,
            content: draft.content,
            image_url: draft.image_url,
            author_id: author_id.to_string(),
            tags: draft.tags,
            published_at: now.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        posts.push(record.clone());
        self.save(POSTS_FILE, &posts)?;
        Ok(record)
    }

    /// Apply a partial update in place. Fields absent from the patch keep
    /// their prior value; author and publication time are never touched.
    pub fn update_post(&self, id: &str, patch: PostPatch) -> Result<PostRecord, Error> {
        let _lock = self.lock_exclusive()?;
        let mut posts: Vec<PostRecord> = self.load(POSTS_FILE)?;
        let record = posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or_else(post_not_found)?;
        if let Some(title) = patch.title {
            record.title = title;
        }
        if let Some(content) = patch.content {
            record.content = content;
        }
        if let Some(image_url) = patch.image_url {
            record.image_url = Some(image_url);
        }
        if let Some(tags) = patch.tags {
            record.tags = tags;
        }
        record.updated_at = now_rfc3339()?;
        let updated = record.clone();
        self.save(POSTS_FILE, &posts)?;
        Ok(updated)
    }

    pub fn delete_post(&self, id: &str) -> Result<(), Error> {
        let _lock = self.lock_exclusive()?;
        let mut posts: Vec<PostRecord> = self.load(POSTS_FILE)?;
        let before = posts.len();
        posts.retain(|post| post.id != id);
        if posts.len() == before {
            return Err(post_not_found());
        }
        self.save(POSTS_FILE, &posts)
    }

    fn load<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, Error> {
        let path = self.data_dir.join(file);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(Error::new(ErrorKind::Io)
                    .with_message(format!("failed to read {file}"))
                    .with_source(err));
            }
        };
        serde_json::from_str(&raw).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message(format!("invalid json in {file}"))
                .with_source(err)
        })
    }

    fn save<T: Serialize>(&self, file: &str, records: &[T]) -> Result<(), Error> {
        let path = self.data_dir.join(file);
        let raw = serde_json::to_string(records).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("failed to encode {file}"))
                .with_source(err)
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, raw).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to write {file}"))
                .with_source(err)
        })?;
        std::fs::rename(&tmp, &path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to replace {file}"))
                .with_source(err)
        })
    }

    fn lock_exclusive(&self) -> Result<File, Error> {
        let file = self.open_lock_file()?;
        fs2::FileExt::lock_exclusive(&file).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to lock data directory")
                .with_source(err)
        })?;
        Ok(file)
    }

    fn lock_shared(&self) -> Result<File, Error> {
        let file = self.open_lock_file()?;
        fs2::FileExt::lock_shared(&file).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to lock data directory")
                .with_source(err)
        })?;
        Ok(file)
    }

    fn open_lock_file(&self) -> Result<File, Error> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.data_dir.join(LOCK_FILE))
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to open lock file")
                    .with_source(err)
            })
    }
}

fn post_not_found() -> Error {
    Error::new(ErrorKind::NotFound).with_message("Blog post not found")
}

fn new_id() -> Result<String, Error> {
    let mut bytes = [0u8; 12];
    getrandom::fill(&mut bytes).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to generate id")
            .with_source(err)
    })?;
    let mut out = String::with_capacity(24);
    for byte in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    Ok(out)
}

pub fn now_rfc3339() -> Result<String, Error> {
    use time::format_description::well_known::Rfc3339;
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("timestamp format failed")
                .with_source(err)
        })
}
