//! # SQLite
//!
//! Relational store for accounts, meals and meal reviews.
//!
//! Core purpose is to keep every meal's `(rating, review_count)` aggregate consistent with the
//! reviews that reference it. The aggregate columns are only ever written inside the same
//! transaction as the review row that changed them.
//!
//! ## Requirements
//!
//! - A review write and its aggregate write are never observable half-done
//! - Concurrent creates against the same meal must not lose updates
//! - No request blocks forever waiting on the write lock
//!
//! ## Implementation
//!
//! - One connection behind a mutex, so in-process writers queue up
//! - Writes run in `BEGIN IMMEDIATE` transactions: the write lock is taken before the meal row is
//!   read, which also serializes writers coming from other processes on the same file
//! - Busy timeout bounds how long a writer waits for that lock
//! - Dropping an uncommitted transaction rolls it back
use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use rusqlite::{
    Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params, types::Type,
};
use tracing::info;

use crate::{
    error::AppError,
    models::{Account, Meal, MealReview, NewMeal, Role},
};

const SCHEMA_SQL: &str = include_str!("schema.sql");

const MEAL_COLUMNS: &str = "id, chef_id, name, description, price, rating, review_count";
const REVIEW_COLUMNS: &str = "id, meal_id, user_id, rating, review";
const ACCOUNT_COLUMNS: &str = "id, username, password_hash, salt, role";

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, AppError> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(busy_timeout)?;

        info!(path = %path.as_ref().display(), "Opened database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database connection lock poisoned".into()))
    }

    pub fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Runs `f` inside an immediate transaction. Commits only if `f` succeeds.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let value = f(&tx)?;
        tx.commit()?;

        Ok(value)
    }
}

fn meal_from_row(row: &Row<'_>) -> rusqlite::Result<Meal> {
    Ok(Meal {
        id: row.get(0)?,
        chef_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        rating: row.get(5)?,
        review_count: row.get(6)?,
    })
}

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<MealReview> {
    Ok(MealReview {
        id: row.get(0)?,
        meal_id: row.get(1)?,
        user_id: row.get(2)?,
        rating: row.get(3)?,
        review: row.get(4)?,
    })
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let role: String = row.get(4)?;

    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        salt: row.get(3)?,
        role: role
            .parse()
            .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?,
    })
}

pub fn find_meal_by_id(conn: &Connection, meal_id: i64) -> Result<Option<Meal>, AppError> {
    let meal = conn
        .query_row(
            &format!("SELECT {MEAL_COLUMNS} FROM meals WHERE id = ?1"),
            params![meal_id],
            meal_from_row,
        )
        .optional()?;

    Ok(meal)
}

/// Writes the derived aggregate columns of a meal.
pub fn update_meal(
    conn: &Connection,
    meal_id: i64,
    rating: f64,
    review_count: i64,
) -> Result<(), AppError> {
    let changed = conn.execute(
        "UPDATE meals SET rating = ?1, review_count = ?2 WHERE id = ?3",
        params![rating, review_count, meal_id],
    )?;

    if changed == 0 {
        return Err(AppError::NotFound(format!("meal {meal_id}")));
    }

    Ok(())
}

pub fn insert_meal(conn: &Connection, meal: &NewMeal) -> Result<Meal, AppError> {
    conn.execute(
        "INSERT INTO meals (chef_id, name, description, price) VALUES (?1, ?2, ?3, ?4)",
        params![meal.chef_id, meal.name, meal.description, meal.price],
    )?;

    let id = conn.last_insert_rowid();
    find_meal_by_id(conn, id)?.ok_or_else(|| AppError::NotFound(format!("meal {id}")))
}

pub fn create_meal_review(
    conn: &Connection,
    meal_id: i64,
    user_id: i64,
    rating: i64,
    review: &str,
) -> Result<MealReview, AppError> {
    conn.execute(
        "INSERT INTO meal_reviews (meal_id, user_id, rating, review) VALUES (?1, ?2, ?3, ?4)",
        params![meal_id, user_id, rating, review],
    )?;

    Ok(MealReview {
        id: conn.last_insert_rowid(),
        meal_id,
        user_id,
        rating,
        review: review.to_string(),
    })
}

pub fn update_meal_review(
    conn: &Connection,
    review_id: i64,
    rating: i64,
    review: &str,
) -> Result<(), AppError> {
    let changed = conn.execute(
        "UPDATE meal_reviews SET rating = ?1, review = ?2 WHERE id = ?3",
        params![rating, review, review_id],
    )?;

    if changed == 0 {
        return Err(AppError::NotFound(format!("review {review_id}")));
    }

    Ok(())
}

pub fn delete_meal_review(conn: &Connection, review_id: i64) -> Result<(), AppError> {
    let changed = conn.execute("DELETE FROM meal_reviews WHERE id = ?1", params![review_id])?;

    if changed == 0 {
        return Err(AppError::NotFound(format!("review {review_id}")));
    }

    Ok(())
}

pub fn find_review_by_id(conn: &Connection, review_id: i64) -> Result<Option<MealReview>, AppError> {
    let review = conn
        .query_row(
            &format!("SELECT {REVIEW_COLUMNS} FROM meal_reviews WHERE id = ?1"),
            params![review_id],
            review_from_row,
        )
        .optional()?;

    Ok(review)
}

pub fn find_reviews_by_meal(conn: &Connection, meal_id: i64) -> Result<Vec<MealReview>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLUMNS} FROM meal_reviews WHERE meal_id = ?1 ORDER BY id ASC"
    ))?;

    let reviews = stmt
        .query_map(params![meal_id], review_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(reviews)
}

pub fn find_reviews_by_user(conn: &Connection, user_id: i64) -> Result<Vec<MealReview>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLUMNS} FROM meal_reviews WHERE user_id = ?1 ORDER BY id ASC"
    ))?;

    let reviews = stmt
        .query_map(params![user_id], review_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(reviews)
}

/// Average rating and count over every review of a meal, computed by SQLite.
/// A meal without reviews yields `(0.0, 0)`.
pub fn review_stats(conn: &Connection, meal_id: i64) -> Result<(f64, i64), AppError> {
    let stats = conn.query_row(
        "SELECT COALESCE(AVG(rating), 0.0), COUNT(*) FROM meal_reviews WHERE meal_id = ?1",
        params![meal_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(stats)
}

pub fn insert_account(
    conn: &Connection,
    username: &str,
    role: Role,
    password_hash: &str,
    salt: &str,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO accounts (username, role, password_hash, salt) VALUES (?1, ?2, ?3, ?4)",
        params![username, role.as_str(), password_hash, salt],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn find_account(
    conn: &Connection,
    username: &str,
    role: Role,
) -> Result<Option<Account>, AppError> {
    let account = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?1 AND role = ?2"),
            params![username, role.as_str()],
            account_from_row,
        )
        .optional()?;

    Ok(account)
}

pub fn find_account_by_id(conn: &Connection, account_id: i64) -> Result<Option<Account>, AppError> {
    let account = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
            params![account_id],
            account_from_row,
        )
        .optional()?;

    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Store, i64, Meal) {
        let store = Store::open_in_memory().unwrap();
        let (user_id, meal) = store
            .write(|tx| {
                let chef_id = insert_account(tx, "chef", Role::Chef, "hash", "salt")?;
                let user_id = insert_account(tx, "user", Role::User, "hash", "salt")?;
                let meal = insert_meal(
                    tx,
                    &NewMeal {
                        chef_id,
                        name: "lasagna".into(),
                        description: "layered".into(),
                        price: 9.0,
                    },
                )?;
                Ok((user_id, meal))
            })
            .unwrap();

        (store, user_id, meal)
    }

    #[test]
    fn test_new_meal_starts_with_empty_aggregate() {
        let (_, _, meal) = seeded();

        assert_eq!(meal.rating, 0.0);
        assert_eq!(meal.review_count, 0);
    }

    #[test]
    fn test_failed_write_rolls_back_every_statement() {
        let (store, user_id, meal) = seeded();

        let result: Result<(), AppError> = store.write(|tx| {
            create_meal_review(tx, meal.id, user_id, 4, "fine")?;
            update_meal(tx, meal.id, 4.0, 1)?;
            Err(AppError::Internal("injected failure".into()))
        });
        assert!(result.is_err());

        let (reviews, meal) = store
            .read(|conn| Ok((find_reviews_by_meal(conn, meal.id)?, find_meal_by_id(conn, meal.id)?)))
            .unwrap();
        assert!(reviews.is_empty());

        let meal = meal.unwrap();
        assert_eq!(meal.rating, 0.0);
        assert_eq!(meal.review_count, 0);
    }

    #[test]
    fn test_rating_outside_range_is_rejected_by_schema() {
        let (store, user_id, meal) = seeded();

        let result = store.write(|tx| create_meal_review(tx, meal.id, user_id, 6, "too much"));
        assert!(matches!(result, Err(AppError::Persistence(_))));
    }

    #[test]
    fn test_review_stats_of_empty_meal() {
        let (store, _, meal) = seeded();

        let stats = store.read(|conn| review_stats(conn, meal.id)).unwrap();
        assert_eq!(stats, (0.0, 0));
    }

    #[test]
    fn test_reviews_by_user_are_ordered_by_id() {
        let (store, user_id, meal) = seeded();

        store
            .write(|tx| {
                create_meal_review(tx, meal.id, user_id, 2, "first")?;
                create_meal_review(tx, meal.id, user_id, 3, "second")?;
                Ok(())
            })
            .unwrap();

        let reviews = store.read(|conn| find_reviews_by_user(conn, user_id)).unwrap();
        let texts: Vec<_> = reviews.iter().map(|r| r.review.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
        assert!(reviews[0].id < reviews[1].id);
    }

    #[test]
    fn test_missing_rows() {
        let (store, _, _) = seeded();

        assert!(store.read(|conn| find_meal_by_id(conn, 999)).unwrap().is_none());
        assert!(matches!(
            store.write(|tx| update_meal(tx, 999, 1.0, 1)),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.write(|tx| delete_meal_review(tx, 999)),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_accounts_are_scoped_by_role() {
        let (store, user_id, _) = seeded();

        let account = store
            .read(|conn| find_account(conn, "user", Role::User))
            .unwrap()
            .unwrap();
        assert_eq!(account.id, user_id);
        assert_eq!(account.role, Role::User);

        assert!(
            store
                .read(|conn| find_account(conn, "user", Role::Chef))
                .unwrap()
                .is_none()
        );
    }
}
