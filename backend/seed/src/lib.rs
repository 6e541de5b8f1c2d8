//! # Seeding
//!
//! Loads accounts and meals from a JSON fixture into the database the server reads.
//!
//! ## Fixture
//!
//! ```json
//! {
//!     "users": [{ "username": "user", "password": "user" }],
//!     "chefs": [{ "username": "chef", "password": "chef" }],
//!     "meals": [{ "chef": "chef", "name": "Tacos", "description": "Al pastor", "price": 8.5 }]
//! }
//! ```
//!
//! ## Steps
//! 1. Sanitize usernames, drop empty and repeated ones.
//!
//! 2. Skip accounts that already exist for the same role, register the rest.
//!
//! 3. Insert each meal under its chef. Meals naming an unknown chef are skipped.
//!
//! 4. Every meal starts with no reviews, rating `0` and review count `0`. Aggregates are never
//!    seeded directly, reviews go through the server.
use std::{fs, path::Path};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use server::{
    credentials::{PasswordHasher, register},
    database::{Store, find_account, insert_meal},
    models::{NewMeal, Role},
};

pub mod models;
pub mod utils;

use models::{Fixture, Login};
use utils::{sanitize, sanitize_logins};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub accounts: usize,
    pub meals: usize,
    pub skipped: usize,
}

pub fn load_fixture(path: &Path) -> Result<Fixture> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub fn seed(store: &Store, hasher: &dyn PasswordHasher, mut fixture: Fixture) -> Result<Summary> {
    sanitize_logins(&mut fixture.users);
    sanitize_logins(&mut fixture.chefs);

    println!("Loaded Users: {}", fixture.users.len());
    println!("Loaded Chefs: {}", fixture.chefs.len());
    println!("Loaded Meals: {}\n", fixture.meals.len());

    let total = fixture.users.len() + fixture.chefs.len() + fixture.meals.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let mut summary = Summary::default();

    for (logins, role) in [(&fixture.users, Role::User), (&fixture.chefs, Role::Chef)] {
        for login in logins {
            pb.set_message(format!("{role} {}", login.username));

            if seed_account(store, hasher, login, role)? {
                summary.accounts += 1;
            } else {
                summary.skipped += 1;
            }

            pb.inc(1);
        }
    }

    for meal in &fixture.meals {
        pb.set_message(format!("meal {}", meal.name));

        let chef = sanitize(&meal.chef);
        match store.read(|conn| find_account(conn, &chef, Role::Chef))? {
            Some(account) => {
                store.write(|tx| {
                    insert_meal(
                        tx,
                        &NewMeal {
                            chef_id: account.id,
                            name: meal.name.trim().to_string(),
                            description: meal.description.clone(),
                            price: meal.price,
                        },
                    )
                })?;
                summary.meals += 1;
            }
            None => {
                pb.println(format!("Unknown chef {chef} for meal {}, skipping", meal.name));
                summary.skipped += 1;
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    Ok(summary)
}

fn seed_account(
    store: &Store,
    hasher: &dyn PasswordHasher,
    login: &Login,
    role: Role,
) -> Result<bool> {
    if store
        .read(|conn| find_account(conn, &login.username, role))?
        .is_some()
    {
        return Ok(false);
    }

    register(store, hasher, &login.username, &login.password, role)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use server::{credentials::Sha256Hasher, database::find_meal_by_id};

    use super::*;

    const FIXTURE: &str = r#"{
        "users": [
            { "username": "user", "password": "user" },
            { "username": "USER", "password": "again" }
        ],
        "chefs": [{ "username": "Chef", "password": "chef" }],
        "meals": [
            { "chef": "chef", "name": " Tacos ", "price": 8.5 },
            { "chef": "nobody", "name": "Ghost soup" }
        ]
    }"#;

    #[test]
    fn test_seed_fixture() {
        let store = Store::open_in_memory().unwrap();
        let fixture: Fixture = serde_json::from_str(FIXTURE).unwrap();

        let summary = seed(&store, &Sha256Hasher, fixture).unwrap();
        assert_eq!(
            summary,
            Summary {
                accounts: 2,
                meals: 1,
                skipped: 1,
            }
        );

        let meal = store.read(|conn| find_meal_by_id(conn, 1)).unwrap().unwrap();
        assert_eq!(meal.name, "Tacos");
        assert_eq!(meal.review_count, 0);
        assert_eq!(meal.rating, 0.0);
    }

    #[test]
    fn test_seed_skips_existing_accounts() {
        let store = Store::open_in_memory().unwrap();

        seed(&store, &Sha256Hasher, serde_json::from_str(FIXTURE).unwrap()).unwrap();
        let again = seed(&store, &Sha256Hasher, serde_json::from_str(FIXTURE).unwrap()).unwrap();

        assert_eq!(again.accounts, 0);
        assert_eq!(again.skipped, 3);
    }

    #[test]
    fn test_load_fixture_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        fs::write(&path, FIXTURE).unwrap();

        let fixture = load_fixture(&path).unwrap();
        assert_eq!(fixture.users.len(), 2);
        assert_eq!(fixture.meals.len(), 2);

        assert!(load_fixture(&dir.path().join("missing.json")).is_err());
    }
}
