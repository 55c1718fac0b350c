//! Typed access to counseling records on top of the tiered document store.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::models::customer::Customer;
use crate::models::hair::{HairConditionRecord, Timing};
use crate::models::session::{CounselingSession, SessionStatus};
use crate::store::{StoreError, StoreTier, TieredStore};

const CUSTOMERS: &str = "customers";
const SESSIONS: &str = "sessions";
const HAIR_CONDITIONS: &str = "hair_conditions";
const KNOWLEDGE: &str = "knowledge_base";

/// Reference document injected verbatim into treatment-plan prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeEntry {
    pub id: String,
    pub category: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub priority: i32,
}

/// Fields accepted when registering a customer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    pub kana: Option<String>,
    pub age: Option<u16>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub face_shape: Option<String>,
    pub personal_color: Option<String>,
}

#[derive(Clone)]
pub struct CounselingRepository {
    store: TieredStore,
}

impl CounselingRepository {
    pub fn new(store: TieredStore) -> Self {
        Self { store }
    }

    // ── customers ───────────────────────────────────────────────────────────

    pub async fn create_customer(
        &self,
        input: NewCustomer,
        now: DateTime<Utc>,
    ) -> Result<Customer, StoreError> {
        let build = |id: &str| {
            to_doc(&Customer {
                id: id.to_string(),
                name: input.name.trim().to_string(),
                kana: blank_to_none(input.kana.clone()),
                age: input.age,
                phone: blank_to_none(input.phone.clone()),
                email: blank_to_none(input.email.clone()),
                line_user_id: None,
                face_shape: blank_to_none(input.face_shape.clone()),
                personal_color: blank_to_none(input.personal_color.clone()),
                visit_count: 0,
                last_visit_date: None,
                created_at: now,
                updated_at: now,
            })
        };
        let id = self.store.insert_new(CUSTOMERS, build).await?;
        self.get_customer(&id)
            .await?
            .ok_or_else(|| StoreError::Serialization(missing_after_write(CUSTOMERS, &id)))
    }

    pub async fn get_customer(&self, id: &str) -> Result<Option<Customer>, StoreError> {
        self.get(CUSTOMERS, id).await
    }

    pub async fn save_customer(&self, customer: &Customer) -> Result<StoreTier, StoreError> {
        self.put(CUSTOMERS, &customer.id, customer).await
    }

    /// Customers matching `search` (name, kana or phone), most recently updated first.
    pub async fn list_customers(&self, search: Option<&str>) -> Result<Vec<Customer>, StoreError> {
        let mut customers: Vec<Customer> = self
            .list(CUSTOMERS)
            .await?
            .into_iter()
            .filter(|c: &Customer| search.map_or(true, |s| c.matches(s)))
            .collect();
        customers.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(customers)
    }

    // ── sessions ────────────────────────────────────────────────────────────

    pub async fn create_session(
        &self,
        customer_id: &str,
        stylist_id: Option<String>,
        store_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CounselingSession, StoreError> {
        let build = |id: &str| {
            to_doc(&CounselingSession::new(
                id.to_string(),
                customer_id.to_string(),
                stylist_id.clone(),
                store_id.clone(),
                now,
            ))
        };
        let id = self.store.insert_new(SESSIONS, build).await?;
        self.get_session(&id)
            .await?
            .ok_or_else(|| StoreError::Serialization(missing_after_write(SESSIONS, &id)))
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<CounselingSession>, StoreError> {
        self.get(SESSIONS, id).await
    }

    pub async fn save_session(&self, session: &CounselingSession) -> Result<StoreTier, StoreError> {
        self.put(SESSIONS, &session.id, session).await
    }

    /// Sessions for one customer, newest first.
    pub async fn sessions_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<CounselingSession>, StoreError> {
        let mut sessions: Vec<CounselingSession> = self
            .list(SESSIONS)
            .await?
            .into_iter()
            .filter(|s: &CounselingSession| s.customer_id == customer_id)
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    pub async fn completed_visits(&self, customer_id: &str) -> Result<u32, StoreError> {
        let sessions = self.sessions_for_customer(customer_id).await?;
        Ok(sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Completed)
            .count() as u32)
    }

    /// Marks the session completed and refreshes the customer's visit stats.
    ///
    /// The visit count is derived from completed sessions, so completing the
    /// same session twice does not count it twice.
    pub async fn complete_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CounselingSession>, StoreError> {
        let Some(mut session) = self.get_session(session_id).await? else {
            return Ok(None);
        };
        session.status = SessionStatus::Completed;
        session.updated_at = now;
        self.save_session(&session).await?;

        match self.get_customer(&session.customer_id).await? {
            Some(mut customer) => {
                customer.visit_count = self.completed_visits(&customer.id).await?;
                customer.last_visit_date = Some(session.session_date);
                customer.updated_at = now;
                self.save_customer(&customer).await?;
            }
            None => warn!(
                "Session {session_id} completed for unknown customer {}",
                session.customer_id
            ),
        }
        Ok(Some(session))
    }

    // ── hair condition ──────────────────────────────────────────────────────

    pub async fn get_hair_condition(
        &self,
        session_id: &str,
        timing: Timing,
    ) -> Result<Option<HairConditionRecord>, StoreError> {
        self.get(HAIR_CONDITIONS, &hair_key(session_id, timing))
            .await
    }

    pub async fn save_hair_condition(
        &self,
        record: &HairConditionRecord,
    ) -> Result<StoreTier, StoreError> {
        let key = hair_key(&record.session_id, record.timing);
        self.put(HAIR_CONDITIONS, &key, record).await
    }

    // ── knowledge ───────────────────────────────────────────────────────────

    /// Entries whose category starts with `prefix`, highest priority first.
    pub async fn knowledge(&self, prefix: &str) -> Result<Vec<KnowledgeEntry>, StoreError> {
        let mut entries: Vec<KnowledgeEntry> = self
            .list(KNOWLEDGE)
            .await?
            .into_iter()
            .filter(|k: &KnowledgeEntry| k.category.starts_with(prefix))
            .collect();
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(entries)
    }

    pub async fn save_knowledge(&self, entry: &KnowledgeEntry) -> Result<StoreTier, StoreError> {
        self.put(KNOWLEDGE, &entry.id, entry).await
    }

    // ── plumbing ────────────────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        self.store
            .get(collection, id)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn put<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        value: &T,
    ) -> Result<StoreTier, StoreError> {
        let doc = to_doc(value)?;
        self.store.put(collection, id, &doc).await
    }

    /// Documents that no longer match the current shape are skipped, not fatal.
    async fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, StoreError> {
        Ok(self
            .store
            .list(collection)
            .await?
            .into_iter()
            .filter_map(|doc| match serde_json::from_value(doc) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Skipping unreadable {collection} document: {e}");
                    None
                }
            })
            .collect())
    }
}

fn hair_key(session_id: &str, timing: Timing) -> String {
    format!("{session_id}:{}", timing.as_str())
}

fn to_doc<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(StoreError::from)
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn missing_after_write(collection: &str, id: &str) -> serde_json::Error {
    serde::de::Error::custom(format!("{collection}/{id} unreadable right after insert"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{degraded_tiers, memory_tiers};

    fn repo() -> CounselingRepository {
        CounselingRepository::new(memory_tiers().0)
    }

    #[tokio::test]
    async fn test_create_and_search_customers() {
        let repo = repo();
        let now = Utc::now();
        repo.create_customer(
            NewCustomer {
                name: " 山田 花子 ".to_string(),
                phone: Some("090-0000-1111".to_string()),
                email: Some("  ".to_string()),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();
        repo.create_customer(
            NewCustomer {
                name: "佐藤 太郎".to_string(),
                ..Default::default()
            },
            now + chrono::Duration::seconds(1),
        )
        .await
        .unwrap();

        let all = repo.list_customers(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "佐藤 太郎");

        let found = repo.list_customers(Some("1111")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "山田 花子");
        assert!(found[0].email.is_none());
    }

    #[tokio::test]
    async fn test_customer_created_while_primary_down_gets_local_id() {
        let repo = CounselingRepository::new(degraded_tiers().0);
        let c = repo
            .create_customer(
                NewCustomer {
                    name: "ローカル".to_string(),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(c.id.starts_with("local-"));
        assert_eq!(repo.get_customer(&c.id).await.unwrap().unwrap().name, "ローカル");
    }

    #[tokio::test]
    async fn test_sessions_filtered_by_customer_and_visits_counted() {
        let repo = repo();
        let now = Utc::now();
        let mut s1 = repo.create_session("c1", None, None, now).await.unwrap();
        repo.create_session("c2", None, None, now).await.unwrap();
        repo.create_session("c1", None, None, now + chrono::Duration::seconds(5))
            .await
            .unwrap();

        s1.status = SessionStatus::Completed;
        repo.save_session(&s1).await.unwrap();

        let sessions = repo.sessions_for_customer("c1").await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions[0].created_at > sessions[1].created_at);
        assert_eq!(repo.completed_visits("c1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_completing_twice_counts_one_visit() {
        let repo = repo();
        let now = Utc::now();
        let customer = repo
            .create_customer(
                NewCustomer {
                    name: "常連".to_string(),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        let session = repo.create_session(&customer.id, None, None, now).await.unwrap();

        for _ in 0..2 {
            let done = repo.complete_session(&session.id, now).await.unwrap().unwrap();
            assert_eq!(done.status, SessionStatus::Completed);
        }
        let customer = repo.get_customer(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.visit_count, 1);
        assert_eq!(customer.last_visit_date, Some(now.date_naive()));
        assert!(repo.complete_session("missing", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_knowledge_filtered_by_prefix_and_sorted_by_priority() {
        let repo = repo();
        for (id, category, priority) in [
            ("k1", "meteo_recipe", 1),
            ("k2", "meteo_process", 5),
            ("k3", "color_basics", 9),
        ] {
            repo.save_knowledge(&KnowledgeEntry {
                id: id.to_string(),
                category: category.to_string(),
                title: id.to_string(),
                content: "本文".to_string(),
                priority,
            })
            .await
            .unwrap();
        }
        let ids: Vec<_> = repo
            .knowledge("meteo")
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.id)
            .collect();
        assert_eq!(ids, vec!["k2", "k1"]);
    }
}
