mod config;

use crate::config::Config;
use habitline_core::models::{
    AnalyticsSeries, BooleanResponse, CheckinResponse, CreateGoalPayload, CredentialsPayload, DashboardView, Goal,
    GoalId, Habit, HabitId, HabitSummary, LoginResponse, ProgressEntry, SaveHabitPayload, UpdateGoalPayload, User,
    UserId,
};
use habitline_core::HabitTracker;
use std::path::{Path, PathBuf};
use tauri::Manager;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

#[derive(Clone)]
struct AppState {
    tracker: HabitTracker,
}

impl AppState {
    async fn user(&self, token: &str) -> Result<UserId, String> {
        self.tracker.current_user(token).await.map_err(to_client_error)
    }
}

#[tauri::command]
fn register(state: tauri::State<'_, AppState>, payload: CredentialsPayload) -> Result<User, String> {
    state.tracker.register(payload).map_err(to_client_error)
}

#[tauri::command]
async fn login(state: tauri::State<'_, AppState>, payload: CredentialsPayload) -> Result<LoginResponse, String> {
    state.tracker.login(payload).await.map_err(to_client_error)
}

#[tauri::command]
async fn logout(state: tauri::State<'_, AppState>, token: String) -> Result<BooleanResponse, String> {
    Ok(state.tracker.logout(&token).await)
}

#[tauri::command]
async fn dashboard_get(state: tauri::State<'_, AppState>, token: String) -> Result<DashboardView, String> {
    let user_id = state.user(&token).await?;
    state.tracker.dashboard(user_id).map_err(to_client_error)
}

#[tauri::command]
async fn habits_list(state: tauri::State<'_, AppState>, token: String) -> Result<Vec<HabitSummary>, String> {
    let user_id = state.user(&token).await?;
    state.tracker.list_habits(user_id).map_err(to_client_error)
}

#[tauri::command]
async fn habit_create(
    state: tauri::State<'_, AppState>,
    token: String,
    payload: SaveHabitPayload,
) -> Result<Habit, String> {
    let user_id = state.user(&token).await?;
    state.tracker.create_habit(user_id, payload).map_err(to_client_error)
}

#[tauri::command]
async fn habit_get(state: tauri::State<'_, AppState>, token: String, habit_id: HabitId) -> Result<Habit, String> {
    let user_id = state.user(&token).await?;
    state.tracker.get_habit(user_id, habit_id).map_err(to_client_error)
}

#[tauri::command]
async fn habit_update(
    state: tauri::State<'_, AppState>,
    token: String,
    habit_id: HabitId,
    payload: SaveHabitPayload,
) -> Result<Habit, String> {
    let user_id = state.user(&token).await?;
    state
        .tracker
        .update_habit(user_id, habit_id, payload)
        .map_err(to_client_error)
}

#[tauri::command]
async fn habit_delete(
    state: tauri::State<'_, AppState>,
    token: String,
    habit_id: HabitId,
) -> Result<BooleanResponse, String> {
    let user_id = state.user(&token).await?;
    state.tracker.delete_habit(user_id, habit_id).map_err(to_client_error)
}

#[tauri::command]
async fn habit_toggle_today(
    state: tauri::State<'_, AppState>,
    token: String,
    habit_id: HabitId,
) -> Result<ProgressEntry, String> {
    let user_id = state.user(&token).await?;
    state
        .tracker
        .toggle_progress(user_id, habit_id)
        .map_err(to_client_error)
}

#[tauri::command]
async fn goals_list(state: tauri::State<'_, AppState>, token: String) -> Result<Vec<Goal>, String> {
    let user_id = state.user(&token).await?;
    state.tracker.list_goals(user_id).map_err(to_client_error)
}

#[tauri::command]
async fn goal_create(
    state: tauri::State<'_, AppState>,
    token: String,
    payload: CreateGoalPayload,
) -> Result<Goal, String> {
    let user_id = state.user(&token).await?;
    state.tracker.create_goal(user_id, payload).map_err(to_client_error)
}

#[tauri::command]
async fn goal_get(state: tauri::State<'_, AppState>, token: String, goal_id: GoalId) -> Result<Goal, String> {
    let user_id = state.user(&token).await?;
    state.tracker.get_goal(user_id, goal_id).map_err(to_client_error)
}

#[tauri::command]
async fn goal_update(
    state: tauri::State<'_, AppState>,
    token: String,
    goal_id: GoalId,
    payload: UpdateGoalPayload,
) -> Result<Goal, String> {
    let user_id = state.user(&token).await?;
    state
        .tracker
        .update_goal(user_id, goal_id, payload)
        .map_err(to_client_error)
}

#[tauri::command]
async fn goal_delete(
    state: tauri::State<'_, AppState>,
    token: String,
    goal_id: GoalId,
) -> Result<BooleanResponse, String> {
    let user_id = state.user(&token).await?;
    state.tracker.delete_goal(user_id, goal_id).map_err(to_client_error)
}

#[tauri::command]
async fn analytics_get(state: tauri::State<'_, AppState>, token: String) -> Result<AnalyticsSeries, String> {
    let user_id = state.user(&token).await?;
    state.tracker.analytics(user_id).map_err(to_client_error)
}

#[tauri::command]
async fn checkin_today(state: tauri::State<'_, AppState>, token: String) -> Result<CheckinResponse, String> {
    let user_id = state.user(&token).await?;
    state.tracker.daily_checkin(user_id).map_err(to_client_error)
}

#[tauri::command]
async fn checkin_streak_get(state: tauri::State<'_, AppState>, token: String) -> Result<u32, String> {
    let user_id = state.user(&token).await?;
    state.tracker.checkin_streak(user_id).map_err(to_client_error)
}

pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            let config = Config::load().map_err(|error| error.to_string())?;
            init_tracing(&config.log_dir).map_err(|error| error.to_string())?;

            let tracker = HabitTracker::open(&config.db_path).map_err(|error| error.to_string())?;
            tracing::info!(db_path = %config.db_path.display(), "habit tracker ready");

            app.manage(AppState { tracker });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            register,
            login,
            logout,
            dashboard_get,
            habits_list,
            habit_create,
            habit_get,
            habit_update,
            habit_delete,
            habit_toggle_today,
            goals_list,
            goal_create,
            goal_get,
            goal_update,
            goal_delete,
            analytics_get,
            checkin_today,
            checkin_streak_get
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}

/// Creates or migrates the database without starting the shell.
pub fn init_database() -> anyhow::Result<PathBuf> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let config = Config::load()?;
    let tracker = HabitTracker::open(&config.db_path)?;
    let path = tracker.database().path().to_path_buf();
    tracing::info!(db_path = %path.display(), "initialized database");
    Ok(path)
}

fn init_tracing(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "habitline.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

fn to_client_error(error: impl std::fmt::Display) -> String {
    error.to_string()
}
