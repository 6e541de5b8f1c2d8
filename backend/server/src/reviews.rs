//! # Review Aggregator
//!
//! Sole owner of the `(rating, review_count)` aggregate stored on every meal.
//!
//! For every meal `M`, between transactions:
//! - `M.review_count == count(reviews of M)`
//! - `M.rating == average(rating of reviews of M)`, or `0` without reviews
//!
//! ## Recompute
//!
//! - Create applies the new rating incrementally on top of the prior aggregate
//! - Update recomputes the average from the full review set with an `AVG` query, the count is
//!   left untouched
//! - Delete recomputes both columns from the full review set
//!
//! The two formulas agree on the same review set up to [`RATING_EPSILON`].
//!
//! ## Open issue
//!
//! Create has no idempotency key, so a retried request is counted twice.
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    database::{
        Store, create_meal_review, delete_meal_review, find_account_by_id, find_meal_by_id,
        find_review_by_id, find_reviews_by_meal, find_reviews_by_user, review_stats, update_meal,
        update_meal_review,
    },
    error::{AppError, DenyReason},
    models::{MAX_RATING, MIN_RATING, Meal, MealReview, Principal, ReviewWithMeal, Role},
};

/// Scale at which two aggregate ratings are considered equal.
pub const RATING_EPSILON: f64 = 1e-6;

pub fn incremental_rating(old_rating: f64, old_count: i64, rating: i64) -> f64 {
    (old_rating * old_count as f64 + rating as f64) / (old_count + 1) as f64
}

pub fn full_rating(ratings: &[i64]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }

    ratings.iter().sum::<i64>() as f64 / ratings.len() as f64
}

pub fn same_rating(a: f64, b: f64) -> bool {
    (a - b).abs() < RATING_EPSILON
}

fn validate(rating: i64, review: &str) -> Result<(), AppError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
        )));
    }

    if review.trim().is_empty() {
        return Err(AppError::Validation("review text is required".into()));
    }

    Ok(())
}

fn require_user(principal: &Principal) -> Result<(), AppError> {
    if principal.role != Role::User {
        return Err(AppError::Denied(DenyReason::RoleMismatch));
    }

    Ok(())
}

fn require_owner(principal: &Principal, review: &MealReview) -> Result<(), AppError> {
    require_user(principal)?;

    if review.user_id != principal.id {
        return Err(AppError::Denied(DenyReason::NotOwner));
    }

    Ok(())
}

#[derive(Clone)]
pub struct ReviewAggregator {
    store: Arc<Store>,
}

impl ReviewAggregator {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn create_review(
        &self,
        principal: &Principal,
        meal_id: i64,
        rating: i64,
        review: &str,
    ) -> Result<MealReview, AppError> {
        require_user(principal)?;
        validate(rating, review)?;

        let stored = self.store.write(|tx| {
            match find_account_by_id(tx, principal.id)? {
                Some(account) if account.role == Role::User => {}
                Some(_) => return Err(AppError::Denied(DenyReason::RoleMismatch)),
                None => return Err(AppError::NotFound(format!("user {}", principal.id))),
            }

            let meal = find_meal_by_id(tx, meal_id)?
                .ok_or_else(|| AppError::NotFound(format!("meal {meal_id}")))?;

            let stored = create_meal_review(tx, meal_id, principal.id, rating, review)?;

            let new_rating = incremental_rating(meal.rating, meal.review_count, rating);
            update_meal(tx, meal_id, new_rating, meal.review_count + 1)?;

            debug!(
                meal = meal_id,
                rating = new_rating,
                count = meal.review_count + 1,
                "Meal aggregate updated"
            );

            Ok(stored)
        })?;

        info!(review = stored.id, meal = meal_id, user = principal.id, "Review created");
        Ok(stored)
    }

    pub fn update_review(
        &self,
        principal: &Principal,
        review_id: i64,
        rating: i64,
        review: &str,
    ) -> Result<ReviewWithMeal, AppError> {
        let updated = self.store.write(|tx| {
            let existing = find_review_by_id(tx, review_id)?
                .ok_or_else(|| AppError::NotFound(format!("review {review_id}")))?;

            require_owner(principal, &existing)?;
            validate(rating, review)?;

            update_meal_review(tx, review_id, rating, review)?;

            let meal = find_meal_by_id(tx, existing.meal_id)?
                .ok_or_else(|| AppError::NotFound(format!("meal {}", existing.meal_id)))?;
            let (average, _) = review_stats(tx, meal.id)?;
            update_meal(tx, meal.id, average, meal.review_count)?;

            Ok(ReviewWithMeal {
                review: MealReview {
                    rating,
                    review: review.to_string(),
                    ..existing
                },
                meal: Meal {
                    rating: average,
                    ..meal
                },
            })
        })?;

        info!(review = review_id, meal = updated.meal.id, "Review updated");
        Ok(updated)
    }

    pub fn delete_review(&self, principal: &Principal, review_id: i64) -> Result<Meal, AppError> {
        let meal = self.store.write(|tx| {
            let existing = find_review_by_id(tx, review_id)?
                .ok_or_else(|| AppError::NotFound(format!("review {review_id}")))?;

            require_owner(principal, &existing)?;

            delete_meal_review(tx, review_id)?;

            let meal = find_meal_by_id(tx, existing.meal_id)?
                .ok_or_else(|| AppError::NotFound(format!("meal {}", existing.meal_id)))?;
            let (average, count) = review_stats(tx, meal.id)?;
            update_meal(tx, meal.id, average, count)?;

            Ok(Meal {
                rating: average,
                review_count: count,
                ..meal
            })
        })?;

        info!(review = review_id, meal = meal.id, "Review deleted");
        Ok(meal)
    }

    pub fn meal(&self, meal_id: i64) -> Result<Meal, AppError> {
        self.store
            .read(|conn| find_meal_by_id(conn, meal_id))?
            .ok_or_else(|| AppError::NotFound(format!("meal {meal_id}")))
    }

    pub fn reviews_by_meal(&self, meal_id: i64) -> Result<Vec<MealReview>, AppError> {
        self.store.read(|conn| {
            find_meal_by_id(conn, meal_id)?
                .ok_or_else(|| AppError::NotFound(format!("meal {meal_id}")))?;

            find_reviews_by_meal(conn, meal_id)
        })
    }

    pub fn reviews_by_user(&self, user_id: i64) -> Result<Vec<MealReview>, AppError> {
        self.store.read(|conn| {
            match find_account_by_id(conn, user_id)? {
                Some(account) if account.role == Role::User => {}
                _ => return Err(AppError::NotFound(format!("user {user_id}"))),
            }

            find_reviews_by_user(conn, user_id)
        })
    }
}
