use crate::auth::{hash_password, normalize_username, verify_password};
use crate::clock::{Clock, SystemClock};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AnalyticsSeries, BooleanResponse, CheckinResponse, CreateGoalPayload, CredentialsPayload, DashboardView, Goal,
    GoalId, Habit, HabitId, HabitSummary, LoginResponse, ProgressEntry, SaveHabitPayload, UpdateGoalPayload, User,
    UserId,
};
use crate::session::SessionManager;
use crate::streak::current_streak;
use std::path::Path;
use std::sync::Arc;

/// Application services over the store: accounts, habits, goals and check-ins.
#[derive(Clone)]
pub struct HabitTracker {
    db: Arc<Database>,
    sessions: SessionManager,
    clock: Arc<dyn Clock>,
}

impl HabitTracker {
    pub fn open(db_path: &Path) -> AppResult<Self> {
        let db = Database::new(db_path)?;
        Ok(Self::with_clock(Arc::new(db), Arc::new(SystemClock)))
    }

    pub fn with_clock(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            sessions: SessionManager::new(),
            clock,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn register(&self, payload: CredentialsPayload) -> AppResult<User> {
        let username = normalize_username(&payload.username)?;
        let password_hash = hash_password(&payload.password)?;
        let user = self.db.insert_user(&username, &password_hash)?;
        tracing::info!(user_id = user.id, "registered user");
        Ok(user)
    }

    pub async fn login(&self, payload: CredentialsPayload) -> AppResult<LoginResponse> {
        let invalid = || AppError::Unauthorized("Invalid credentials".to_string());
        let Some(credentials) = self.db.find_credentials(payload.username.trim())? else {
            tracing::info!("login rejected for unknown user");
            return Err(invalid());
        };
        if !verify_password(&payload.password, &credentials.password_hash)? {
            tracing::info!(user_id = credentials.user.id, "login rejected for wrong password");
            return Err(invalid());
        }

        let token = self.sessions.open_session(credentials.user.id).await;
        tracing::info!(user_id = credentials.user.id, "user logged in");
        Ok(LoginResponse {
            token,
            user: credentials.user,
        })
    }

    pub async fn logout(&self, token: &str) -> BooleanResponse {
        BooleanResponse {
            success: self.sessions.close_session(token).await,
        }
    }

    /// Resolves a session token; sessions whose user row is gone are closed.
    pub async fn current_user(&self, token: &str) -> AppResult<UserId> {
        let user_id = self.sessions.user_id(token).await?;
        if self.db.get_user(user_id)?.is_none() {
            self.sessions.close_session(token).await;
            tracing::warn!(user_id, "closed session for missing user");
            return Err(AppError::Unauthorized("Login required".to_string()));
        }
        Ok(user_id)
    }

    pub fn dashboard(&self, user_id: UserId) -> AppResult<DashboardView> {
        Ok(DashboardView {
            habits: self.list_habits(user_id)?,
            checkin_streak: self.checkin_streak(user_id)?,
        })
    }

    pub fn list_habits(&self, user_id: UserId) -> AppResult<Vec<HabitSummary>> {
        let today = self.clock.today();
        self.db
            .list_habits(user_id)?
            .into_iter()
            .map(|habit| -> AppResult<HabitSummary> {
                let completed_today = self
                    .db
                    .get_progress(user_id, habit.id, today)?
                    .is_some_and(|entry| entry.completed);
                let completed = self.db.completed_dates(user_id, habit.id)?;
                Ok(HabitSummary {
                    id: habit.id,
                    name: habit.name,
                    description: habit.description,
                    completed_today,
                    streak: current_streak(&completed, today),
                    last_completed: completed.first().copied(),
                })
            })
            .collect()
    }

    pub fn create_habit(&self, user_id: UserId, payload: SaveHabitPayload) -> AppResult<Habit> {
        let name = required_text(&payload.name, "Habit name")?;
        let habit = self
            .db
            .insert_habit(user_id, &name, optional_text(payload.description.as_deref()))?;
        tracing::info!(user_id, habit_id = habit.id, "created habit");
        Ok(habit)
    }

    pub fn get_habit(&self, user_id: UserId, habit_id: HabitId) -> AppResult<Habit> {
        self.db
            .get_habit(user_id, habit_id)?
            .ok_or_else(habit_not_found)
    }

    pub fn update_habit(&self, user_id: UserId, habit_id: HabitId, payload: SaveHabitPayload) -> AppResult<Habit> {
        let name = required_text(&payload.name, "Habit name")?;
        self.db
            .update_habit(user_id, habit_id, &name, optional_text(payload.description.as_deref()))?
            .ok_or_else(habit_not_found)
    }

    /// Deleting a habit the user does not own is a no-op.
    pub fn delete_habit(&self, user_id: UserId, habit_id: HabitId) -> AppResult<BooleanResponse> {
        let success = self.db.delete_habit(user_id, habit_id)?;
        if success {
            tracing::info!(user_id, habit_id, "deleted habit");
        }
        Ok(BooleanResponse { success })
    }

    pub fn toggle_progress(&self, user_id: UserId, habit_id: HabitId) -> AppResult<ProgressEntry> {
        self.get_habit(user_id, habit_id)?;
        let entry = self.db.toggle_progress(user_id, habit_id, self.clock.today())?;
        tracing::debug!(user_id, habit_id, completed = entry.completed, "toggled progress");
        Ok(entry)
    }

    pub fn list_goals(&self, user_id: UserId) -> AppResult<Vec<Goal>> {
        self.db.list_goals(user_id)
    }

    pub fn create_goal(&self, user_id: UserId, payload: CreateGoalPayload) -> AppResult<Goal> {
        let title = required_text(&payload.title, "Goal title")?;
        self.db.insert_goal(
            user_id,
            &title,
            optional_text(payload.description.as_deref()),
            payload.target_date,
        )
    }

    pub fn get_goal(&self, user_id: UserId, goal_id: GoalId) -> AppResult<Goal> {
        self.db.get_goal(user_id, goal_id)?.ok_or_else(goal_not_found)
    }

    pub fn update_goal(&self, user_id: UserId, goal_id: GoalId, payload: UpdateGoalPayload) -> AppResult<Goal> {
        let title = required_text(&payload.title, "Goal title")?;
        let progress = u8::try_from(payload.progress)
            .ok()
            .filter(|value| *value <= 100)
            .ok_or_else(|| AppError::Validation("Goal progress must be between 0 and 100".to_string()))?;
        self.db
            .update_goal(
                user_id,
                goal_id,
                &title,
                optional_text(payload.description.as_deref()),
                payload.target_date,
                progress,
            )?
            .ok_or_else(goal_not_found)
    }

    pub fn delete_goal(&self, user_id: UserId, goal_id: GoalId) -> AppResult<BooleanResponse> {
        Ok(BooleanResponse {
            success: self.db.delete_goal(user_id, goal_id)?,
        })
    }

    pub fn analytics(&self, user_id: UserId) -> AppResult<AnalyticsSeries> {
        let mut series = AnalyticsSeries::default();
        for (date, total) in self.db.daily_completion_totals(user_id)? {
            series.dates.push(date.to_string());
            series.totals.push(total);
        }
        Ok(series)
    }

    pub fn daily_checkin(&self, user_id: UserId) -> AppResult<CheckinResponse> {
        let recorded = self.db.insert_checkin(user_id, self.clock.today())?;
        if recorded {
            tracing::info!(user_id, "recorded daily check-in");
        }
        Ok(CheckinResponse {
            recorded,
            streak: self.checkin_streak(user_id)?,
        })
    }

    pub fn checkin_streak(&self, user_id: UserId) -> AppResult<u32> {
        let dates: Vec<_> = self
            .db
            .list_checkins(user_id)?
            .into_iter()
            .map(|checkin| checkin.date)
            .collect();
        Ok(current_streak(&dates, self.clock.today()))
    }
}

fn habit_not_found() -> AppError {
    AppError::NotFound("Habit not found".to_string())
}

fn goal_not_found() -> AppError {
    AppError::NotFound("Goal not found".to_string())
}

fn required_text(raw: &str, field: &str) -> AppResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}
