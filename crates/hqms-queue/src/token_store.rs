//! 号码存储
//!
//! 按 id 和号码保存所有就诊号码，并负责分配全局递增号码。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hqms_core::{HqmsError, Result, Token, TokenStatus};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 分配出的号码及其签发时间
///
/// 签发时间与号码在同一临界区内产生，因此号码越大签发时间不早于前者。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedNumber {
    pub number: u64,
    pub issued_at: DateTime<Utc>,
}

/// 号码存储接口
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// 分配下一个号码，并发调用也不会得到重复值
    async fn next_token_number(&self) -> Result<IssuedNumber>;

    /// 保存新号码
    async fn insert(&self, token: Token) -> Result<()>;

    /// 更新已有号码的状态和时间戳
    async fn update(&self, token: Token) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Token>>;

    async fn get_by_number(&self, token_number: u64) -> Result<Option<Token>>;

    /// 按给定顺序批量读取，跳过不存在的 id
    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Token>>;

    /// 按医生和状态查询，结果按号码升序
    async fn list_by_doctor_status(&self, doctor_id: Uuid, status: TokenStatus) -> Result<Vec<Token>>;

    /// 按状态查询所有医生的号码，结果按号码升序
    async fn list_by_status(&self, status: TokenStatus) -> Result<Vec<Token>>;
}

#[derive(Debug, Default)]
struct StoreData {
    by_id: HashMap<Uuid, Token>,
    by_number: BTreeMap<u64, Uuid>,
}

#[derive(Debug)]
struct Sequence {
    next: u64,
    last_issued_at: Option<DateTime<Utc>>,
}

/// 内存号码存储
#[derive(Debug)]
pub struct MemoryTokenStore {
    data: RwLock<StoreData>,
    sequence: Mutex<Sequence>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            sequence: Mutex::new(Sequence {
                next: 1,
                last_issued_at: None,
            }),
        }
    }

    /// 用已有号码初始化存储，号码序列从最大号码之后继续
    pub fn with_tokens(tokens: Vec<Token>) -> Result<Self> {
        let mut data = StoreData::default();
        let mut last_issued_at: Option<DateTime<Utc>> = None;

        for token in tokens {
            if data.by_number.contains_key(&token.token_number) || data.by_id.contains_key(&token.id) {
                return Err(HqmsError::Storage(format!(
                    "Duplicate token {} (#{}) in seed data",
                    token.id, token.token_number
                )));
            }
            last_issued_at = last_issued_at.max(Some(token.created_at));
            data.by_number.insert(token.token_number, token.id);
            data.by_id.insert(token.id, token);
        }

        let next = data
            .by_number
            .keys()
            .next_back()
            .map(|n| n + 1)
            .unwrap_or(1);

        tracing::info!("Token store seeded with {} tokens, next number {}", data.by_id.len(), next);

        Ok(Self {
            data: RwLock::new(data),
            sequence: Mutex::new(Sequence { next, last_issued_at }),
        })
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.by_id.is_empty()
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn next_token_number(&self) -> Result<IssuedNumber> {
        let mut sequence = self
            .sequence
            .lock()
            .map_err(|_| HqmsError::Internal("token sequence lock poisoned".to_string()))?;

        let number = sequence.next;
        let now = Utc::now();
        // 系统时钟回拨时沿用上一次的签发时间
        let issued_at = match sequence.last_issued_at {
            Some(last) if last > now => last,
            _ => now,
        };

        sequence.next += 1;
        sequence.last_issued_at = Some(issued_at);

        Ok(IssuedNumber { number, issued_at })
    }

    async fn insert(&self, token: Token) -> Result<()> {
        let mut data = self.data.write().await;

        if data.by_id.contains_key(&token.id) {
            return Err(HqmsError::Storage(format!("Token {} already exists", token.id)));
        }
        if data.by_number.contains_key(&token.token_number) {
            return Err(HqmsError::Storage(format!(
                "Token number {} already issued",
                token.token_number
            )));
        }

        data.by_number.insert(token.token_number, token.id);
        data.by_id.insert(token.id, token);
        Ok(())
    }

    async fn update(&self, token: Token) -> Result<()> {
        let mut data = self.data.write().await;

        let stored = data
            .by_id
            .get_mut(&token.id)
            .ok_or_else(|| HqmsError::NotFound(format!("Token {} not found", token.id)))?;

        if stored.is_completed() {
            return Err(HqmsError::Storage(format!("Token {} is completed and immutable", token.id)));
        }
        if stored.token_number != token.token_number
            || stored.doctor_id != token.doctor_id
            || stored.priority != token.priority
            || stored.created_at != token.created_at
        {
            return Err(HqmsError::Storage(format!(
                "Immutable fields of token {} cannot change",
                token.id
            )));
        }

        *stored = token;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Token>> {
        Ok(self.data.read().await.by_id.get(&id).cloned())
    }

    async fn get_by_number(&self, token_number: u64) -> Result<Option<Token>> {
        let data = self.data.read().await;
        Ok(data
            .by_number
            .get(&token_number)
            .and_then(|id| data.by_id.get(id))
            .cloned())
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Token>> {
        let data = self.data.read().await;
        Ok(ids.iter().filter_map(|id| data.by_id.get(id).cloned()).collect())
    }

    async fn list_by_doctor_status(&self, doctor_id: Uuid, status: TokenStatus) -> Result<Vec<Token>> {
        let data = self.data.read().await;
        Ok(data
            .by_number
            .values()
            .filter_map(|id| data.by_id.get(id))
            .filter(|token| token.doctor_id == doctor_id && token.status == status)
            .cloned()
            .collect())
    }

    async fn list_by_status(&self, status: TokenStatus) -> Result<Vec<Token>> {
        let data = self.data.read().await;
        Ok(data
            .by_number
            .values()
            .filter_map(|id| data.by_id.get(id))
            .filter(|token| token.status == status)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hqms_core::{Gender, PatientDetails, Priority};
    use std::sync::Arc;

    fn token(number: u64, doctor_id: Uuid, status: TokenStatus) -> Token {
        Token {
            id: Uuid::new_v4(),
            token_number: number,
            patient: PatientDetails {
                patient_name: format!("Patient {}", number),
                patient_phone: "9000000000".to_string(),
                patient_age: 40,
                patient_gender: Gender::Other,
            },
            problem: "checkup".to_string(),
            department_id: Uuid::new_v4(),
            doctor_id,
            priority: Priority::Normal,
            status,
            created_at: Utc::now(),
            called_at: None,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_sequence_starts_at_one_and_increases() {
        let store = MemoryTokenStore::new();
        let first = store.next_token_number().await.unwrap();
        let second = store.next_token_number().await.unwrap();

        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert!(second.issued_at >= first.issued_at);
    }

    #[tokio::test]
    async fn test_concurrent_allocation_has_no_duplicates() {
        let store = Arc::new(MemoryTokenStore::new());
        let mut handles = Vec::new();
        for _ in 0..200 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.next_token_number().await.unwrap().number }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=200).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_lookup_by_id_and_number() {
        let store = MemoryTokenStore::new();
        let doctor_id = Uuid::new_v4();
        let t = token(1, doctor_id, TokenStatus::Waiting);
        store.insert(t.clone()).await.unwrap();

        assert_eq!(store.get(t.id).await.unwrap(), Some(t.clone()));
        assert_eq!(store.get_by_number(1).await.unwrap(), Some(t));
        assert_eq!(store.get_by_number(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MemoryTokenStore::new();
        let doctor_id = Uuid::new_v4();
        store.insert(token(1, doctor_id, TokenStatus::Waiting)).await.unwrap();

        let result = store.insert(token(1, doctor_id, TokenStatus::Waiting)).await;
        assert!(matches!(result, Err(HqmsError::Storage(_))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_completed_token_is_immutable() {
        let store = MemoryTokenStore::new();
        let mut t = token(1, Uuid::new_v4(), TokenStatus::Completed);
        store.insert(t.clone()).await.unwrap();

        t.problem = "rewritten".to_string();
        assert!(store.update(t).await.is_err());
    }

    #[tokio::test]
    async fn test_update_rejects_changed_number() {
        let store = MemoryTokenStore::new();
        let mut t = token(1, Uuid::new_v4(), TokenStatus::Waiting);
        store.insert(t.clone()).await.unwrap();

        t.token_number = 99;
        assert!(matches!(store.update(t).await, Err(HqmsError::Storage(_))));
    }

    #[tokio::test]
    async fn test_list_by_doctor_status_is_ordered() {
        let store = MemoryTokenStore::new();
        let doctor_id = Uuid::new_v4();
        store.insert(token(3, doctor_id, TokenStatus::Waiting)).await.unwrap();
        store.insert(token(1, doctor_id, TokenStatus::Waiting)).await.unwrap();
        store.insert(token(2, doctor_id, TokenStatus::InProgress)).await.unwrap();
        store.insert(token(4, Uuid::new_v4(), TokenStatus::Waiting)).await.unwrap();

        let waiting = store.list_by_doctor_status(doctor_id, TokenStatus::Waiting).await.unwrap();
        let numbers: Vec<u64> = waiting.iter().map(|t| t.token_number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_list_by_status_spans_doctors() {
        let store = MemoryTokenStore::new();
        store.insert(token(5, Uuid::new_v4(), TokenStatus::Waiting)).await.unwrap();
        store.insert(token(2, Uuid::new_v4(), TokenStatus::Waiting)).await.unwrap();
        store.insert(token(3, Uuid::new_v4(), TokenStatus::Completed)).await.unwrap();

        let waiting = store.list_by_status(TokenStatus::Waiting).await.unwrap();
        let numbers: Vec<u64> = waiting.iter().map(|t| t.token_number).collect();
        assert_eq!(numbers, vec![2, 5]);
    }

    #[tokio::test]
    async fn test_seeded_store_resumes_sequence() {
        let doctor_id = Uuid::new_v4();
        let store = MemoryTokenStore::with_tokens(vec![
            token(4, doctor_id, TokenStatus::Completed),
            token(9, doctor_id, TokenStatus::Waiting),
        ])
        .unwrap();

        assert_eq!(store.next_token_number().await.unwrap().number, 10);
    }

    #[test]
    fn test_seed_rejects_duplicate_numbers() {
        let doctor_id = Uuid::new_v4();
        let result = MemoryTokenStore::with_tokens(vec![
            token(4, doctor_id, TokenStatus::Waiting),
            token(4, doctor_id, TokenStatus::Waiting),
        ]);
        assert!(result.is_err());
    }
}
