use serde::Deserialize;

#[derive(Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub users: Vec<Login>,
    #[serde(default)]
    pub chefs: Vec<Login>,
    #[serde(default)]
    pub meals: Vec<MealEntry>,
}

#[derive(Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct MealEntry {
    pub chef: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
}
