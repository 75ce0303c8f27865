//! In-process implementation of [`PollStore`]
//!
//! All state sits behind one `tokio::sync::RwLock`. Reads share the lock;
//! every mutation holds the write lock for its whole check-and-update, which
//! is what makes a vote's duplicate check, insert and counter increment a
//! single atomic step.
//!
//! Nothing is persisted. Intended for tests and local runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    already_voted, option_not_in_poll, poll_not_found, user_not_found, PollStore, StoreError,
    StoreResult,
};
use crate::models::{
    bookmark::Bookmark,
    poll::{NewPoll, PageRequest, Poll, PollOption, PollPage},
    user::{CreateUser, User},
    vote::Vote,
};

/// Store keeping everything in memory
///
/// Cloning is cheap and clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

#[derive(Default)]
struct State {
    last_user_id: i64,
    last_poll_id: i64,
    last_option_id: i64,
    last_vote_id: i64,
    last_bookmark_seq: u64,

    users: BTreeMap<i64, User>,
    polls: BTreeMap<i64, PollRecord>,
    votes: HashMap<(i64, i64), Vote>,
    bookmarks: HashMap<(i64, i64), BookmarkEntry>,
}

struct PollRecord {
    id: i64,
    user_id: i64,
    title: String,
    description: String,
    created_at: DateTime<Utc>,
    options: Vec<PollOption>,
}

struct BookmarkEntry {
    bookmark: Bookmark,

    // Insertion order; timestamps alone can tie
    seq: u64,
}

impl State {
    fn assemble(&self, record: &PollRecord) -> Poll {
        let username = self
            .users
            .get(&record.user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();

        Poll {
            id: record.id,
            user_id: record.user_id,
            username,
            title: record.title.clone(),
            description: record.description.clone(),
            created_at: record.created_at,
            vote_count: record.options.iter().map(|o| o.vote_count).sum(),
            options: record.options.clone(),
        }
    }

    /// Polls matching `filter`, newest first
    fn newest_first<'a>(&'a self, filter: impl Fn(&PollRecord) -> bool) -> Vec<&'a PollRecord> {
        let mut records: Vec<&PollRecord> = self.polls.values().filter(|r| filter(r)).collect();
        records.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        records
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_user(&self, user: CreateUser) -> StoreResult<User> {
        let mut state = self.state.write().await;

        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(
                "Email is already registered".to_string(),
            ));
        }
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("Username is already taken".to_string()));
        }

        state.last_user_id += 1;
        let created = User {
            id: state.last_user_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        state.users.insert(created.id, created.clone());

        info!(user_id = created.id, "User created");
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, user_id: i64) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn create_poll(&self, owner_id: i64, poll: &NewPoll) -> StoreResult<Poll> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&owner_id) {
            return Err(user_not_found(owner_id));
        }

        state.last_poll_id += 1;
        let poll_id = state.last_poll_id;

        let mut options = Vec::with_capacity(poll.options().len());
        for (position, text) in poll.options().iter().enumerate() {
            state.last_option_id += 1;
            options.push(PollOption {
                id: state.last_option_id,
                poll_id,
                position: position as i32,
                text: text.clone(),
                vote_count: 0,
            });
        }

        let record = PollRecord {
            id: poll_id,
            user_id: owner_id,
            title: poll.title().to_string(),
            description: poll.description().to_string(),
            created_at: Utc::now(),
            options,
        };
        let created = state.assemble(&record);
        state.polls.insert(poll_id, record);

        info!(poll_id, owner_id, options = created.options.len(), "Poll created");
        Ok(created)
    }

    async fn get_poll(&self, poll_id: i64) -> StoreResult<Poll> {
        let state = self.state.read().await;
        state
            .polls
            .get(&poll_id)
            .map(|r| state.assemble(r))
            .ok_or_else(|| poll_not_found(poll_id))
    }

    async fn list_polls(&self, page: PageRequest) -> StoreResult<PollPage> {
        let state = self.state.read().await;

        let polls = state
            .newest_first(|_| true)
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|r| state.assemble(r))
            .collect();

        Ok(PollPage {
            polls,
            total: state.polls.len() as i64,
            page: page.page(),
            limit: page.limit(),
        })
    }

    async fn list_polls_by_user(&self, user_id: i64) -> StoreResult<Vec<Poll>> {
        let state = self.state.read().await;
        Ok(state
            .newest_first(|r| r.user_id == user_id)
            .into_iter()
            .map(|r| state.assemble(r))
            .collect())
    }

    async fn delete_poll(&self, poll_id: i64, requester_id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;

        let owner = state
            .polls
            .get(&poll_id)
            .map(|r| r.user_id)
            .ok_or_else(|| poll_not_found(poll_id))?;
        if owner != requester_id {
            return Err(StoreError::Forbidden(
                "Only the poll's owner can delete it".to_string(),
            ));
        }

        state.polls.remove(&poll_id);
        state.votes.retain(|&(_, p), _| p != poll_id);
        state.bookmarks.retain(|&(_, p), _| p != poll_id);

        info!(poll_id, requester_id, "Poll deleted");
        Ok(())
    }

    async fn cast_vote(&self, user_id: i64, poll_id: i64, option_id: i64) -> StoreResult<Vote> {
        let mut state = self.state.write().await;
        let state = &mut *state;

        let poll = state
            .polls
            .get_mut(&poll_id)
            .ok_or_else(|| poll_not_found(poll_id))?;
        let option = poll
            .options
            .iter_mut()
            .find(|o| o.id == option_id)
            .ok_or_else(|| option_not_in_poll(option_id, poll_id))?;

        if !state.users.contains_key(&user_id) {
            return Err(user_not_found(user_id));
        }
        if state.votes.contains_key(&(user_id, poll_id)) {
            return Err(already_voted());
        }

        state.last_vote_id += 1;
        let vote = Vote {
            id: state.last_vote_id,
            user_id,
            poll_id,
            option_id,
            created_at: Utc::now(),
        };
        state.votes.insert((user_id, poll_id), vote.clone());
        option.vote_count += 1;

        info!(user_id, poll_id, option_id, "Vote recorded");
        Ok(vote)
    }

    async fn find_vote(&self, user_id: i64, poll_id: i64) -> StoreResult<Option<Vote>> {
        let state = self.state.read().await;
        Ok(state.votes.get(&(user_id, poll_id)).cloned())
    }

    async fn is_bookmarked(&self, user_id: i64, poll_id: i64) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state.bookmarks.contains_key(&(user_id, poll_id)))
    }

    async fn add_bookmark(&self, user_id: i64, poll_id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;

        if !state.polls.contains_key(&poll_id) {
            return Err(poll_not_found(poll_id));
        }
        if !state.users.contains_key(&user_id) {
            return Err(user_not_found(user_id));
        }
        if state.bookmarks.contains_key(&(user_id, poll_id)) {
            debug!(user_id, poll_id, "Already bookmarked");
            return Ok(());
        }

        state.last_bookmark_seq += 1;
        let seq = state.last_bookmark_seq;
        let bookmark = Bookmark {
            user_id,
            poll_id,
            created_at: Utc::now(),
        };
        state
            .bookmarks
            .insert((user_id, poll_id), BookmarkEntry { bookmark, seq });

        debug!(user_id, poll_id, "Bookmark added");
        Ok(())
    }

    async fn remove_bookmark(&self, user_id: i64, poll_id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let removed = state.bookmarks.remove(&(user_id, poll_id)).is_some();

        debug!(user_id, poll_id, removed, "Bookmark removed");
        Ok(())
    }

    async fn list_bookmarks(&self, user_id: i64) -> StoreResult<Vec<Poll>> {
        let state = self.state.read().await;

        let mut entries: Vec<(i64, u64)> = state
            .bookmarks
            .values()
            .filter(|entry| entry.bookmark.user_id == user_id)
            .map(|entry| (entry.bookmark.poll_id, entry.seq))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(entries
            .into_iter()
            .filter_map(|(poll_id, _)| state.polls.get(&poll_id))
            .map(|r| state.assemble(r))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    async fn store_with_user(name: &str) -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = add_user(&store, name).await;
        (store, user)
    }

    async fn add_user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(CreateUser {
                username: name.to_string(),
                email: format!("{}@example.com", name),
                password_hash: "$argon2id$test".to_string(),
            })
            .await
            .unwrap()
    }

    fn new_poll(title: &str, options: &[&str]) -> NewPoll {
        NewPoll::new(title, "", options.iter().map(|o| o.to_string()).collect()).unwrap()
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates() {
        let (store, alice) = store_with_user("alice").await;
        assert_eq!(alice.id, 1);

        let dup_email = store
            .create_user(CreateUser {
                username: "alice2".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "h".to_string(),
            })
            .await;
        assert!(matches!(dup_email, Err(StoreError::Conflict(_))));

        let dup_name = store
            .create_user(CreateUser {
                username: "alice".to_string(),
                email: "other@example.com".to_string(),
                password_hash: "h".to_string(),
            })
            .await;
        assert!(matches!(dup_name, Err(StoreError::Conflict(_))));

        let found = store.find_user_by_email("alice@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(alice.id));
    }

    #[tokio::test]
    async fn test_create_poll_keeps_order_with_zero_votes() {
        let (store, alice) = store_with_user("alice").await;

        let poll = store
            .create_poll(alice.id, &new_poll("Colour?", &["Red", "Green", "Blue"]))
            .await
            .unwrap();

        assert_eq!(poll.username, "alice");
        assert_eq!(poll.vote_count, 0);
        let texts: Vec<&str> = poll.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, ["Red", "Green", "Blue"]);
        assert!(poll.options.iter().all(|o| o.vote_count == 0));
        assert_eq!(
            poll.options.iter().map(|o| o.position).collect::<Vec<_>>(),
            [0, 1, 2]
        );
    }

    #[tokio::test]
    async fn test_create_poll_requires_existing_owner() {
        let store = MemoryStore::new();
        let result = store.create_poll(42, &new_poll("t", &["a", "b"])).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_vote_then_fetch() {
        let (store, alice) = store_with_user("alice").await;
        let poll = store
            .create_poll(alice.id, &new_poll("Ship it?", &["Yes", "No"]))
            .await
            .unwrap();
        let yes = poll.options[0].id;

        store.cast_vote(alice.id, poll.id, yes).await.unwrap();

        let fetched = store.get_poll(poll.id).await.unwrap();
        assert_eq!(fetched.options[0].vote_count, 1);
        assert_eq!(fetched.options[1].vote_count, 0);
        assert_eq!(fetched.vote_count, 1);

        let vote = store.find_vote(alice.id, poll.id).await.unwrap().unwrap();
        assert_eq!(vote.option_id, yes);
    }

    #[tokio::test]
    async fn test_vote_errors() {
        let (store, alice) = store_with_user("alice").await;
        let first = store
            .create_poll(alice.id, &new_poll("One", &["a", "b"]))
            .await
            .unwrap();
        let second = store
            .create_poll(alice.id, &new_poll("Two", &["c", "d"]))
            .await
            .unwrap();

        assert!(matches!(
            store.cast_vote(alice.id, 999, first.options[0].id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.cast_vote(alice.id, first.id, second.options[0].id).await,
            Err(StoreError::Validation(_))
        ));

        store.cast_vote(alice.id, first.id, first.options[0].id).await.unwrap();
        assert!(matches!(
            store.cast_vote(alice.id, first.id, first.options[1].id).await,
            Err(StoreError::Conflict(_))
        ));

        let fetched = store.get_poll(first.id).await.unwrap();
        assert_eq!(fetched.options[0].vote_count, 1);
        assert_eq!(fetched.options[1].vote_count, 0);
    }

    #[tokio::test]
    async fn test_vote_and_bookmark_require_existing_user() {
        let (store, alice) = store_with_user("alice").await;
        let poll = store
            .create_poll(alice.id, &new_poll("Who?", &["a", "b"]))
            .await
            .unwrap();

        assert!(matches!(
            store.cast_vote(999, poll.id, poll.options[0].id).await,
            Err(StoreError::NotFound(ref m)) if m == "User 999 not found"
        ));
        assert!(matches!(
            store.add_bookmark(999, poll.id).await,
            Err(StoreError::NotFound(ref m)) if m == "User 999 not found"
        ));

        assert!(store.find_vote(999, poll.id).await.unwrap().is_none());
        assert!(!store.is_bookmarked(999, poll.id).await.unwrap());
        assert_eq!(store.get_poll(poll.id).await.unwrap().vote_count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_votes_by_same_user_yield_one_success() {
        let (store, alice) = store_with_user("alice").await;
        let poll = store
            .create_poll(alice.id, &new_poll("Race", &["a", "b"]))
            .await
            .unwrap();

        let (user_id, poll_id) = (alice.id, poll.id);
        let handles = (0..32).map(|i| {
            let store = store.clone();
            let option_id = poll.options[i % 2].id;
            tokio::spawn(async move { store.cast_vote(user_id, poll_id, option_id).await })
        });

        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::Conflict(_))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 31);

        let fetched = store.get_poll(poll.id).await.unwrap();
        assert_eq!(fetched.vote_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_votes_by_many_users_lose_no_updates() {
        let (store, owner) = store_with_user("owner").await;
        let poll = store
            .create_poll(owner.id, &new_poll("Popular", &["yes", "no"]))
            .await
            .unwrap();
        let (poll_id, yes) = (poll.id, poll.options[0].id);

        let mut voters = Vec::new();
        for i in 0..50 {
            voters.push(add_user(&store, &format!("voter{}", i)).await);
        }

        let handles = voters.iter().map(|voter| {
            let store = store.clone();
            let user_id = voter.id;
            tokio::spawn(async move { store.cast_vote(user_id, poll_id, yes).await })
        });
        for result in join_all(handles).await {
            result.unwrap().unwrap();
        }

        let fetched = store.get_poll(poll.id).await.unwrap();
        assert_eq!(fetched.options[0].vote_count, 50);
        assert_eq!(fetched.options[1].vote_count, 0);
        assert_eq!(fetched.vote_count, 50);
    }

    #[tokio::test]
    async fn test_list_polls_pages_newest_first() {
        let (store, alice) = store_with_user("alice").await;
        for i in 1..=25 {
            store
                .create_poll(alice.id, &new_poll(&format!("Poll {}", i), &["a", "b"]))
                .await
                .unwrap();
        }

        let page = store.list_polls(PageRequest::new(Some(2), Some(10))).await.unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.page, 2);
        assert_eq!(page.limit, 10);

        let titles: Vec<String> = page.polls.iter().map(|p| p.title.clone()).collect();
        let expected: Vec<String> = (6..=15).rev().map(|i| format!("Poll {}", i)).collect();
        assert_eq!(titles, expected);

        let last = store.list_polls(PageRequest::new(Some(3), Some(10))).await.unwrap();
        assert_eq!(last.polls.len(), 5);

        let beyond = store.list_polls(PageRequest::new(Some(9), Some(10))).await.unwrap();
        assert!(beyond.polls.is_empty());
        assert_eq!(beyond.total, 25);
    }

    #[tokio::test]
    async fn test_list_polls_by_user() {
        let store = MemoryStore::new();
        let alice = add_user(&store, "alice").await;
        let bob = add_user(&store, "bob").await;

        store.create_poll(alice.id, &new_poll("A1", &["x", "y"])).await.unwrap();
        store.create_poll(bob.id, &new_poll("B1", &["x", "y"])).await.unwrap();
        store.create_poll(alice.id, &new_poll("A2", &["x", "y"])).await.unwrap();

        let polls = store.list_polls_by_user(alice.id).await.unwrap();
        let titles: Vec<&str> = polls.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["A2", "A1"]);

        assert!(store.list_polls_by_user(999).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_poll_checks_owner_and_leaves_no_orphans() {
        let store = MemoryStore::new();
        let alice = add_user(&store, "alice").await;
        let bob = add_user(&store, "bob").await;

        let poll = store
            .create_poll(alice.id, &new_poll("Doomed", &["a", "b"]))
            .await
            .unwrap();
        let keep = store
            .create_poll(alice.id, &new_poll("Kept", &["a", "b"]))
            .await
            .unwrap();
        store.cast_vote(bob.id, poll.id, poll.options[0].id).await.unwrap();
        store.cast_vote(bob.id, keep.id, keep.options[0].id).await.unwrap();
        store.add_bookmark(bob.id, poll.id).await.unwrap();
        store.add_bookmark(bob.id, keep.id).await.unwrap();

        assert!(matches!(
            store.delete_poll(poll.id, bob.id).await,
            Err(StoreError::Forbidden(_))
        ));
        assert!(matches!(
            store.delete_poll(999, alice.id).await,
            Err(StoreError::NotFound(_))
        ));

        store.delete_poll(poll.id, alice.id).await.unwrap();

        assert!(matches!(
            store.get_poll(poll.id).await,
            Err(StoreError::NotFound(_))
        ));
        {
            let state = store.state.read().await;
            assert!(state.votes.keys().all(|&(_, p)| p != poll.id));
            assert!(state.bookmarks.keys().all(|&(_, p)| p != poll.id));
            assert_eq!(state.votes.len(), 1);
            assert_eq!(state.bookmarks.len(), 1);
        }
        assert!(store.find_vote(bob.id, poll.id).await.unwrap().is_none());
        assert!(!store.is_bookmarked(bob.id, poll.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_bookmarks_are_a_set() {
        let (store, alice) = store_with_user("alice").await;
        let poll = store
            .create_poll(alice.id, &new_poll("Save me", &["a", "b"]))
            .await
            .unwrap();

        store.add_bookmark(alice.id, poll.id).await.unwrap();
        store.add_bookmark(alice.id, poll.id).await.unwrap();
        assert!(store.is_bookmarked(alice.id, poll.id).await.unwrap());
        assert_eq!(store.list_bookmarks(alice.id).await.unwrap().len(), 1);
        assert_eq!(store.state.read().await.bookmarks.len(), 1);

        store.remove_bookmark(alice.id, poll.id).await.unwrap();
        assert!(!store.is_bookmarked(alice.id, poll.id).await.unwrap());

        // Removing again is a no-op
        store.remove_bookmark(alice.id, poll.id).await.unwrap();
        store.remove_bookmark(alice.id, 12345).await.unwrap();

        assert!(matches!(
            store.add_bookmark(alice.id, 12345).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_bookmarks_most_recent_first() {
        let store = MemoryStore::new();
        let alice = add_user(&store, "alice").await;
        let bob = add_user(&store, "bob").await;

        let first = store.create_poll(bob.id, &new_poll("First", &["a", "b"])).await.unwrap();
        let second = store.create_poll(bob.id, &new_poll("Second", &["a", "b"])).await.unwrap();
        store.cast_vote(bob.id, first.id, first.options[1].id).await.unwrap();

        store.add_bookmark(alice.id, second.id).await.unwrap();
        store.add_bookmark(alice.id, first.id).await.unwrap();

        let bookmarks = store.list_bookmarks(alice.id).await.unwrap();
        let titles: Vec<&str> = bookmarks.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["First", "Second"]);
        assert_eq!(bookmarks[0].username, "bob");
        assert_eq!(bookmarks[0].vote_count, 1);

        assert!(store.list_bookmarks(bob.id).await.unwrap().is_empty());
    }
}
