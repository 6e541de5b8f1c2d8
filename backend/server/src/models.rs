use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Chef,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Chef => "chef",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "chef" => Ok(Role::Chef),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Claims carried inside a signed access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated actor behind a request. Lives only as long as the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub role: Role,
    pub claims: Claims,
}

impl TryFrom<Claims> for Principal {
    type Error = std::num::ParseIntError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            id: claims.sub.parse()?,
            role: claims.role,
            claims,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: i64,
    pub chef_id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub rating: f64,
    pub review_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealReview {
    pub id: i64,
    pub meal_id: i64,
    pub user_id: i64,
    pub rating: i64,
    pub review: String,
}

/// A review returned together with the meal aggregate it just refreshed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewWithMeal {
    #[serde(flatten)]
    pub review: MealReview,
    pub meal: Meal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub meal_id: i64,
    pub rating: i64,
    pub review: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewUpdate {
    pub rating: i64,
    pub review: String,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub chef_id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
}
