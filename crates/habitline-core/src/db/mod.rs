use crate::errors::{is_unique_violation, AppError, AppResult};
use crate::models::{Checkin, Goal, GoalId, Habit, HabitId, ProgressEntry, User, UserCredentials, UserId};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("schema.sql");
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn insert_user(&self, username: &str, password_hash: &str) -> AppResult<User> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        match conn.execute(
            "INSERT INTO users (username, password) VALUES (?1, ?2)",
            params![username, password_hash],
        ) {
            Ok(_) => {}
            Err(error) if is_unique_violation(&error) => {
                return Err(AppError::Conflict("Username already exists".to_string()));
            }
            Err(error) => return Err(error.into()),
        }

        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
        })
    }

    pub fn find_credentials(&self, username: &str) -> AppResult<Option<UserCredentials>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.query_row(
            "SELECT id, username, password FROM users WHERE username = ?1",
            [username],
            |row| {
                Ok(UserCredentials {
                    user: User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                    },
                    password_hash: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn get_user(&self, user_id: UserId) -> AppResult<Option<User>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.query_row(
            "SELECT id, username FROM users WHERE id = ?1",
            [user_id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn insert_habit(&self, user_id: UserId, name: &str, description: Option<&str>) -> AppResult<Habit> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO habits (user_id, name, description) VALUES (?1, ?2, ?3)",
            params![user_id, name, description],
        )?;

        Ok(Habit {
            id: conn.last_insert_rowid(),
            user_id,
            name: name.to_string(),
            description: description.map(ToString::to_string),
        })
    }

    pub fn list_habits(&self, user_id: UserId) -> AppResult<Vec<Habit>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, description FROM habits WHERE user_id = ?1 ORDER BY id ASC",
        )?;
        let habits = stmt
            .query_map([user_id], parse_habit_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(habits)
    }

    pub fn get_habit(&self, user_id: UserId, habit_id: HabitId) -> AppResult<Option<Habit>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.query_row(
            "SELECT id, user_id, name, description FROM habits WHERE id = ?1 AND user_id = ?2",
            params![habit_id, user_id],
            parse_habit_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn update_habit(
        &self,
        user_id: UserId,
        habit_id: HabitId,
        name: &str,
        description: Option<&str>,
    ) -> AppResult<Option<Habit>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let changed = conn.execute(
            "UPDATE habits SET name = ?1, description = ?2 WHERE id = ?3 AND user_id = ?4",
            params![name, description, habit_id, user_id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        drop(conn);
        self.get_habit(user_id, habit_id)
    }

    pub fn delete_habit(&self, user_id: UserId, habit_id: HabitId) -> AppResult<bool> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let changed = conn.execute(
            "DELETE FROM habits WHERE id = ?1 AND user_id = ?2",
            params![habit_id, user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn get_progress(&self, user_id: UserId, habit_id: HabitId, date: NaiveDate) -> AppResult<Option<ProgressEntry>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.query_row(
            "SELECT id, user_id, habit_id, date, completed FROM progress
             WHERE user_id = ?1 AND habit_id = ?2 AND date = ?3",
            params![user_id, habit_id, format_date(date)],
            parse_progress_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Flips today's completion flag, creating a completed row when none exists.
    pub fn toggle_progress(&self, user_id: UserId, habit_id: HabitId, date: NaiveDate) -> AppResult<ProgressEntry> {
        let date_raw = format_date(date);
        let mut conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let tx = conn.transaction()?;

        let existing: Option<(i64, bool)> = tx
            .query_row(
                "SELECT id, completed FROM progress WHERE user_id = ?1 AND habit_id = ?2 AND date = ?3",
                params![user_id, habit_id, date_raw],
                |row| Ok((row.get(0)?, row.get::<_, i32>(1)? != 0)),
            )
            .optional()?;

        let (id, completed) = match existing {
            Some((id, completed)) => {
                tx.execute(
                    "UPDATE progress SET completed = ?1 WHERE id = ?2",
                    params![i32::from(!completed), id],
                )?;
                (id, !completed)
            }
            None => {
                tx.execute(
                    "INSERT INTO progress (user_id, habit_id, date, completed) VALUES (?1, ?2, ?3, 1)",
                    params![user_id, habit_id, date_raw],
                )?;
                (tx.last_insert_rowid(), true)
            }
        };
        tx.commit()?;

        Ok(ProgressEntry {
            id,
            user_id,
            habit_id,
            date,
            completed,
        })
    }

    /// Dates on which the habit was completed, newest first.
    pub fn completed_dates(&self, user_id: UserId, habit_id: HabitId) -> AppResult<Vec<NaiveDate>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT date FROM progress
             WHERE user_id = ?1 AND habit_id = ?2 AND completed = 1
             ORDER BY date DESC",
        )?;
        let dates = stmt
            .query_map(params![user_id, habit_id], |row| parse_date(&row.get::<_, String>(0)?))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(dates)
    }

    /// Number of completed habits per day with any progress, oldest first.
    pub fn daily_completion_totals(&self, user_id: UserId) -> AppResult<Vec<(NaiveDate, i64)>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT date, SUM(completed) FROM progress
             WHERE user_id = ?1
             GROUP BY date
             ORDER BY date ASC",
        )?;
        let totals = stmt
            .query_map([user_id], |row| {
                Ok((parse_date(&row.get::<_, String>(0)?)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(totals)
    }

    pub fn insert_goal(
        &self,
        user_id: UserId,
        title: &str,
        description: Option<&str>,
        target_date: Option<NaiveDate>,
    ) -> AppResult<Goal> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO goals (user_id, title, description, target_date) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, title, description, target_date.map(format_date)],
        )?;

        Ok(Goal {
            id: conn.last_insert_rowid(),
            user_id,
            title: title.to_string(),
            description: description.map(ToString::to_string),
            target_date,
            progress: 0,
        })
    }

    pub fn list_goals(&self, user_id: UserId) -> AppResult<Vec<Goal>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, description, target_date, progress
             FROM goals WHERE user_id = ?1 ORDER BY id ASC",
        )?;
        let goals = stmt
            .query_map([user_id], parse_goal_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(goals)
    }

    pub fn get_goal(&self, user_id: UserId, goal_id: GoalId) -> AppResult<Option<Goal>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.query_row(
            "SELECT id, user_id, title, description, target_date, progress
             FROM goals WHERE id = ?1 AND user_id = ?2",
            params![goal_id, user_id],
            parse_goal_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn update_goal(
        &self,
        user_id: UserId,
        goal_id: GoalId,
        title: &str,
        description: Option<&str>,
        target_date: Option<NaiveDate>,
        progress: u8,
    ) -> AppResult<Option<Goal>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let changed = conn.execute(
            "UPDATE goals SET title = ?1, description = ?2, target_date = ?3, progress = ?4
             WHERE id = ?5 AND user_id = ?6",
            params![title, description, target_date.map(format_date), progress, goal_id, user_id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        drop(conn);
        self.get_goal(user_id, goal_id)
    }

    pub fn delete_goal(&self, user_id: UserId, goal_id: GoalId) -> AppResult<bool> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let changed = conn.execute(
            "DELETE FROM goals WHERE id = ?1 AND user_id = ?2",
            params![goal_id, user_id],
        )?;
        Ok(changed > 0)
    }

    /// Records a check-in for `date`; returns false when one already exists.
    pub fn insert_checkin(&self, user_id: UserId, date: NaiveDate) -> AppResult<bool> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO checkins (user_id, date) VALUES (?1, ?2)",
            params![user_id, format_date(date)],
        )?;
        Ok(changed > 0)
    }

    pub fn list_checkins(&self, user_id: UserId) -> AppResult<Vec<Checkin>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, date FROM checkins WHERE user_id = ?1 ORDER BY date DESC",
        )?;
        let checkins = stmt
            .query_map([user_id], |row| {
                Ok(Checkin {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    date: parse_date(&row.get::<_, String>(2)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(checkins)
    }
}

fn parse_habit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Habit> {
    Ok(Habit {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
    })
}

fn parse_progress_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProgressEntry> {
    Ok(ProgressEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        habit_id: row.get(2)?,
        date: parse_date(&row.get::<_, String>(3)?)?,
        completed: row.get::<_, i32>(4)? != 0,
    })
}

fn parse_goal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        target_date: row
            .get::<_, Option<String>>(4)?
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_date(&raw))
            .transpose()?,
        progress: row.get::<_, i64>(5)?.clamp(0, 100) as u8,
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::Database;
    use crate::errors::AppError;
    use chrono::NaiveDate;

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn database_can_insert_and_find_user() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("test.db");
        let db = Database::new(&db_path).expect("db");

        let user = db.insert_user("alice", "hash-a").expect("insert user");
        let found = db
            .find_credentials("alice")
            .expect("lookup")
            .expect("user exists");
        assert_eq!(found.user, user);
        assert_eq!(found.password_hash, "hash-a");
        assert_eq!(db.get_user(user.id).expect("get user"), Some(user));
        assert!(db.find_credentials("bob").expect("lookup").is_none());
    }

    #[test]
    fn duplicate_username_is_a_conflict() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");

        db.insert_user("alice", "hash-a").expect("first insert");
        let error = db.insert_user("alice", "hash-b").expect_err("duplicate");
        assert!(matches!(error, AppError::Conflict(_)));
        assert_eq!(error.to_string(), "CONFLICT: Username already exists");
    }

    #[test]
    fn habits_are_scoped_to_their_owner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let alice = db.insert_user("alice", "h").expect("alice");
        let bob = db.insert_user("bob", "h").expect("bob");

        let habit = db.insert_habit(alice.id, "Read", Some("20 pages")).expect("habit");
        assert!(db.get_habit(bob.id, habit.id).expect("get").is_none());
        assert!(db.update_habit(bob.id, habit.id, "Hijack", None).expect("update").is_none());
        assert!(!db.delete_habit(bob.id, habit.id).expect("delete"));

        let updated = db
            .update_habit(alice.id, habit.id, "Read more", None)
            .expect("update")
            .expect("owned habit");
        assert_eq!(updated.name, "Read more");
        assert_eq!(updated.description, None);
        assert_eq!(db.list_habits(alice.id).expect("list").len(), 1);
        assert!(db.list_habits(bob.id).expect("list").is_empty());
    }

    #[test]
    fn toggle_progress_inserts_then_flips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let user = db.insert_user("alice", "h").expect("user");
        let habit = db.insert_habit(user.id, "Run", None).expect("habit");
        let today = day("2024-05-02");

        let first = db.toggle_progress(user.id, habit.id, today).expect("toggle");
        assert!(first.completed);
        let second = db.toggle_progress(user.id, habit.id, today).expect("toggle");
        assert_eq!(second.id, first.id);
        assert!(!second.completed);

        let stored = db
            .get_progress(user.id, habit.id, today)
            .expect("get")
            .expect("row exists");
        assert!(!stored.completed);
        assert!(db.completed_dates(user.id, habit.id).expect("dates").is_empty());
    }

    #[test]
    fn completed_dates_are_newest_first_and_skip_unchecked_days() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let user = db.insert_user("alice", "h").expect("user");
        let habit = db.insert_habit(user.id, "Run", None).expect("habit");

        for raw in ["2024-05-01", "2024-05-03", "2024-05-02"] {
            db.toggle_progress(user.id, habit.id, day(raw)).expect("toggle");
        }
        db.toggle_progress(user.id, habit.id, day("2024-05-02")).expect("untoggle");

        let dates = db.completed_dates(user.id, habit.id).expect("dates");
        assert_eq!(dates, vec![day("2024-05-03"), day("2024-05-01")]);
    }

    #[test]
    fn deleting_a_habit_removes_its_progress() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let user = db.insert_user("alice", "h").expect("user");
        let habit = db.insert_habit(user.id, "Run", None).expect("habit");
        db.toggle_progress(user.id, habit.id, day("2024-05-01")).expect("toggle");

        assert!(db.delete_habit(user.id, habit.id).expect("delete"));
        assert!(db.daily_completion_totals(user.id).expect("totals").is_empty());
    }

    #[test]
    fn daily_totals_group_by_date() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let user = db.insert_user("alice", "h").expect("user");
        let run = db.insert_habit(user.id, "Run", None).expect("habit");
        let read = db.insert_habit(user.id, "Read", None).expect("habit");

        db.toggle_progress(user.id, run.id, day("2024-05-02")).expect("toggle");
        db.toggle_progress(user.id, read.id, day("2024-05-02")).expect("toggle");
        db.toggle_progress(user.id, run.id, day("2024-05-01")).expect("toggle");
        db.toggle_progress(user.id, read.id, day("2024-05-01")).expect("toggle");
        db.toggle_progress(user.id, read.id, day("2024-05-01")).expect("untoggle");

        let totals = db.daily_completion_totals(user.id).expect("totals");
        assert_eq!(totals, vec![(day("2024-05-01"), 1), (day("2024-05-02"), 2)]);
    }

    #[test]
    fn goals_round_trip_with_progress() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let user = db.insert_user("alice", "h").expect("user");

        let goal = db
            .insert_goal(user.id, "Marathon", Some("Sub four"), Some(day("2024-10-13")))
            .expect("goal");
        assert_eq!(goal.progress, 0);

        let updated = db
            .update_goal(user.id, goal.id, "Marathon", None, None, 40)
            .expect("update")
            .expect("owned goal");
        assert_eq!(updated.progress, 40);
        assert_eq!(updated.target_date, None);
        assert_eq!(db.list_goals(user.id).expect("list"), vec![updated]);

        assert!(db.delete_goal(user.id, goal.id).expect("delete"));
        assert!(db.get_goal(user.id, goal.id).expect("get").is_none());
    }

    #[test]
    fn checkins_are_unique_per_day() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let user = db.insert_user("alice", "h").expect("user");

        assert!(db.insert_checkin(user.id, day("2024-05-01")).expect("first"));
        assert!(!db.insert_checkin(user.id, day("2024-05-01")).expect("repeat"));
        assert!(db.insert_checkin(user.id, day("2024-05-02")).expect("next day"));

        let dates: Vec<_> = db
            .list_checkins(user.id)
            .expect("list")
            .into_iter()
            .map(|checkin| checkin.date)
            .collect();
        assert_eq!(dates, vec![day("2024-05-02"), day("2024-05-01")]);
    }

    #[test]
    fn reopening_keeps_existing_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested").join("test.db");
        {
            let db = Database::new(&db_path).expect("db");
            db.insert_user("alice", "h").expect("user");
        }
        let db = Database::new(&db_path).expect("reopen");
        assert_eq!(db.path(), db_path.as_path());
        assert!(db.find_credentials("alice").expect("lookup").is_some());
    }
}
