use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{ChatRepository, OtpRepository, PredictionRepository, UserRepository};
use crate::domain::{
    AccountUpdate, ChatConversation, NewChatConversation, NewPrediction, NewUser, OtpCode,
    OtpPurpose, Prediction, PredictionOutcome, ProfileUpdate, User, UserProfile,
    prediction::PENDING_LABEL,
};
use crate::infrastructure::error::{conflict, not_found, AppError, AppResult};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, UserProfile>,
    otps: HashMap<(Uuid, OtpPurpose), OtpCode>,
    predictions: Vec<Prediction>,
    conversations: Vec<ChatConversation>,
    next_prediction_id: i64,
    next_conversation_id: i64,
}

/// Store en mémoire, mêmes garanties que PostgreSQL pour les bascules conditionnelles
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::InternalError("memory store lock poisoned".to_string()))
    }

    /// Donne les droits administrateur (seed de tests et de développement)
    pub fn grant_staff(&self, user_id: Uuid) -> AppResult<()> {
        let mut state = self.lock()?;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found("User not found"))?;
        user.is_staff = true;
        Ok(())
    }

    /// Réécrit la date de création d'un OTP (simulation d'expiration)
    pub fn backdate_otp(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
        created_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.lock()?;
        let otp = state
            .otps
            .get_mut(&(user_id, purpose))
            .ok_or_else(|| not_found("OTP not found"))?;
        otp.created_at = created_at;
        Ok(())
    }
}

fn taken_by_other(state: &MemoryState, id: Option<Uuid>, username: &str, email: &str) -> AppResult<()> {
    for user in state.users.values() {
        if Some(user.id) == id {
            continue;
        }
        if user.username == username {
            return Err(conflict("Username already exists."));
        }
        if user.email.eq_ignore_ascii_case(email) {
            return Err(conflict("Email already exists."));
        }
    }
    Ok(())
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        let mut state = self.lock()?;
        taken_by_other(&state, None, &new_user.username, &new_user.email)?;

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            first_name: String::new(),
            last_name: String::new(),
            password_hash: new_user.password_hash,
            is_staff: false,
            is_active: true,
            date_joined: Utc::now(),
        };
        state.profiles.insert(user.id, UserProfile::new(user.id));
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_account(&self, id: Uuid, update: AccountUpdate) -> AppResult<User> {
        let mut state = self.lock()?;
        taken_by_other(&state, Some(id), &update.username, &update.email)?;

        let user = state.users.get_mut(&id).ok_or_else(|| not_found("User not found"))?;
        user.username = update.username;
        user.email = update.email;
        user.first_name = update.first_name;
        user.last_name = update.last_name;
        Ok(user.clone())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let mut state = self.lock()?;
        let user = state.users.get_mut(&id).ok_or_else(|| not_found("User not found"))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn get_or_create_profile(&self, user_id: Uuid) -> AppResult<UserProfile> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&user_id) {
            return Err(not_found("User not found"));
        }
        Ok(state
            .profiles
            .entry(user_id)
            .or_insert_with(|| UserProfile::new(user_id))
            .clone())
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<UserProfile> {
        let mut state = self.lock()?;
        let profile = state
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| not_found("Profile not found"))?;
        profile.bio = update.bio;
        profile.phone = update.phone;
        profile.date_of_birth = update.date_of_birth;
        profile.email_notifications = update.email_notifications;
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> AppResult<()> {
        let mut state = self.lock()?;
        if let Some(profile) = state.profiles.get_mut(&user_id) {
            profile.email_verified = true;
            profile.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn claim_first_analysis_email(&self, user_id: Uuid) -> AppResult<bool> {
        let mut state = self.lock()?;
        match state.profiles.get_mut(&user_id) {
            Some(profile) if !profile.first_analysis_email_sent => {
                profile.first_analysis_email_sent = true;
                profile.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl OtpRepository for MemoryStore {
    async fn upsert_otp(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
        code_hash: &str,
        created_at: DateTime<Utc>,
    ) -> AppResult<OtpCode> {
        let otp = OtpCode {
            user_id,
            purpose,
            code_hash: code_hash.to_string(),
            created_at,
            consumed: false,
        };
        self.lock()?.otps.insert((user_id, purpose), otp.clone());
        Ok(otp)
    }

    async fn find_otp(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<Option<OtpCode>> {
        Ok(self.lock()?.otps.get(&(user_id, purpose)).cloned())
    }

    async fn consume_otp(&self, user_id: Uuid, purpose: OtpPurpose, code_hash: &str) -> AppResult<bool> {
        let mut state = self.lock()?;
        match state.otps.get_mut(&(user_id, purpose)) {
            Some(otp) if !otp.consumed && otp.code_hash == code_hash => {
                otp.consumed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_otp(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<()> {
        self.lock()?.otps.remove(&(user_id, purpose));
        Ok(())
    }

    async fn delete_otps_created_before(
        &self,
        purpose: OtpPurpose,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut state = self.lock()?;
        let before = state.otps.len();
        state
            .otps
            .retain(|(_, otp_purpose), otp| *otp_purpose != purpose || otp.created_at >= cutoff);
        Ok((before - state.otps.len()) as u64)
    }
}

#[async_trait]
impl PredictionRepository for MemoryStore {
    async fn create_prediction(&self, new_prediction: NewPrediction) -> AppResult<Prediction> {
        let mut state = self.lock()?;
        state.next_prediction_id += 1;
        let prediction = Prediction {
            id: state.next_prediction_id,
            user_id: new_prediction.user_id,
            image_path: new_prediction.image_path,
            label: PENDING_LABEL.to_string(),
            model_preference: new_prediction.model_preference,
            model_used: None,
            confidence_score: None,
            created_at: Utc::now(),
        };
        state.predictions.push(prediction.clone());
        Ok(prediction)
    }

    async fn attach_outcome(&self, id: i64, outcome: PredictionOutcome) -> AppResult<Prediction> {
        let mut state = self.lock()?;
        let prediction = state
            .predictions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found("Prediction not found"))?;
        prediction.label = outcome.label;
        prediction.model_used = outcome.model_used;
        prediction.confidence_score = outcome.confidence_score;
        Ok(prediction.clone())
    }

    async fn find_prediction(&self, user_id: Uuid, id: i64) -> AppResult<Option<Prediction>> {
        Ok(self
            .lock()?
            .predictions
            .iter()
            .find(|p| p.id == id && p.user_id == user_id)
            .cloned())
    }

    async fn list_predictions(&self, user_id: Uuid, limit: Option<i64>) -> AppResult<Vec<Prediction>> {
        let state = self.lock()?;
        let newest_first = state
            .predictions
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned();
        Ok(match limit {
            Some(limit) => newest_first.take(limit.max(0) as usize).collect(),
            None => newest_first.collect(),
        })
    }

    async fn find_predictions_by_ids(&self, user_id: Uuid, ids: &[i64]) -> AppResult<Vec<Prediction>> {
        Ok(self
            .lock()?
            .predictions
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id && ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn count_predictions(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self
            .lock()?
            .predictions
            .iter()
            .filter(|p| p.user_id == user_id)
            .count() as i64)
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn save_conversation(&self, conversation: NewChatConversation) -> AppResult<ChatConversation> {
        let mut state = self.lock()?;
        state.next_conversation_id += 1;
        let saved = ChatConversation {
            id: state.next_conversation_id,
            user_id: conversation.user_id,
            user_message: conversation.user_message,
            ai_response: conversation.ai_response,
            tokens_used: conversation.tokens_used,
            model: conversation.model,
            created_at: Utc::now(),
        };
        state.conversations.push(saved.clone());
        Ok(saved)
    }

    async fn list_conversations(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<ChatConversation>> {
        Ok(self
            .lock()?
            .conversations
            .iter()
            .rev()
            .filter(|c| c.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
