//! Recipe knowledge base
//!
//! Maps classifier food labels to recipes. The catalog is static
//! configuration: loaded once at startup from TOML, either the embedded
//! built-in file or an operator-supplied override.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Built-in catalog compiled into the binary
const BUILTIN_CATALOG: &str = include_str!("../data/recipes.toml");

/// One ingredient line of a recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    /// Ingredient name, also the product matcher query
    pub name: String,
    /// Amount in `unit`
    pub quantity: f64,
    /// Unit of measure (grams, piece, loaf, ...)
    pub unit: String,
}

/// A recipe a food label can resolve to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Display name, matched case-insensitively against food labels
    pub name: String,
    /// Ingredient lines
    pub ingredients: Vec<Ingredient>,
    /// Number of servings the ingredient amounts cover
    pub servings: u32,
    /// Typical total price estimate
    pub average_price: f64,
    /// Suggested extras shown alongside the recipe
    #[serde(default)]
    pub recommended_addons: Vec<String>,
}

/// TOML catalog file shape
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    recipes: Vec<Recipe>,
}

/// Recipe catalog with case-insensitive label lookup
#[derive(Debug)]
pub struct FoodKb {
    /// Keyed by lowercase recipe name; Recipe keeps the display casing
    recipes: HashMap<String, Recipe>,
}

impl FoodKb {
    /// Load the catalog embedded in the binary
    pub fn builtin() -> Result<Self> {
        let kb = Self::from_toml(BUILTIN_CATALOG)?;
        info!(recipes = kb.len(), "Loaded built-in recipe catalog");
        Ok(kb)
    }

    /// Load a catalog from a TOML file
    pub async fn load(path: &Path) -> Result<Self> {
        let toml_str = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Catalog(format!("Failed to read catalog file {:?}: {}", path, e))
        })?;
        let kb = Self::from_toml(&toml_str)?;
        info!(recipes = kb.len(), path = ?path, "Loaded recipe catalog");
        Ok(kb)
    }

    /// Parse a catalog from TOML text
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(toml_str)
            .map_err(|e| Error::Catalog(format!("Failed to parse catalog TOML: {}", e)))?;

        let mut recipes = HashMap::with_capacity(file.recipes.len());
        for recipe in file.recipes {
            let key = recipe.name.trim().to_lowercase();
            if key.is_empty() {
                warn!("Skipping catalog entry with empty name");
                continue;
            }
            if recipes.insert(key, recipe).is_some() {
                warn!("Duplicate catalog entry, keeping the later one");
            }
        }
        Ok(Self { recipes })
    }

    /// Look up a recipe by food label
    ///
    /// Matching is exact after trimming whitespace and lowercasing, so
    /// "caesar salad" and " Caesar Salad " both hit. No fuzzy matching.
    pub fn lookup(&self, label: &str) -> Option<&Recipe> {
        self.recipes.get(&label.trim().to_lowercase())
    }

    /// All recipes sorted by display name
    pub fn all(&self) -> Vec<&Recipe> {
        let mut recipes: Vec<&Recipe> = self.recipes.values().collect();
        recipes.sort_by(|a, b| a.name.cmp(&b.name));
        recipes
    }

    /// Number of recipes in the catalog
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path as StdPath;

    #[test]
    fn test_builtin_catalog_loads() {
        let kb = FoodKb::builtin().unwrap();
        assert_eq!(kb.len(), 3);
        assert!(kb.lookup("Caesar Salad").is_some());
        assert!(kb.lookup("Breakfast Sandwich").is_some());
        assert!(kb.lookup("Spaghetti and Meatballs").is_some());
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_trimmed() {
        let kb = FoodKb::builtin().unwrap();
        let recipe = kb.lookup("  cAeSaR sAlAd  ").unwrap();
        assert_eq!(recipe.name, "Caesar Salad");
    }

    #[test]
    fn test_lookup_miss_returns_none() {
        let kb = FoodKb::builtin().unwrap();
        assert!(kb.lookup("Beef Wellington").is_none());
        assert!(kb.lookup("").is_none());
    }

    #[test]
    fn test_builtin_recipe_contents() {
        let kb = FoodKb::builtin().unwrap();
        let caesar = kb.lookup("caesar salad").unwrap();
        assert_eq!(caesar.servings, 1);
        assert_eq!(caesar.average_price, 5.99);
        assert_eq!(caesar.ingredients.len(), 3);
        assert_eq!(caesar.ingredients[0].name, "Spinach");
        assert_eq!(caesar.ingredients[0].quantity, 30.0);
        assert_eq!(caesar.ingredients[0].unit, "grams");
        assert_eq!(
            caesar.recommended_addons,
            vec!["Cheese", "Spinach", "Ketchup"]
        );
    }

    #[test]
    fn test_from_toml_custom_catalog() {
        let toml_str = r#"
            [[recipes]]
            name = "Tomato Soup"
            servings = 2
            average_price = 3.50
            recommended_addons = ["Croutons"]

            [[recipes.ingredients]]
            name = "Tomato"
            quantity = 4
            unit = "tomatoes"
        "#;
        let kb = FoodKb::from_toml(toml_str).unwrap();
        assert_eq!(kb.len(), 1);
        let soup = kb.lookup("TOMATO SOUP").unwrap();
        assert_eq!(soup.ingredients[0].quantity, 4.0);
    }

    #[test]
    fn test_duplicate_entry_keeps_later() {
        let toml_str = r#"
            [[recipes]]
            name = "Toast"
            servings = 1
            average_price = 1.0
            ingredients = []

            [[recipes]]
            name = "toast"
            servings = 2
            average_price = 2.0
            ingredients = []
        "#;
        let kb = FoodKb::from_toml(toml_str).unwrap();
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.lookup("toast").unwrap().servings, 2);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        tokio::fs::write(
            &path,
            r#"
                [[recipes]]
                name = "Garlic Bread"
                servings = 1
                average_price = 2.99
                ingredients = []
            "#,
        )
        .await
        .unwrap();

        let kb = FoodKb::load(&path).await.unwrap();
        assert!(kb.lookup("garlic bread").is_some());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_catalog_error() {
        let err = FoodKb::load(StdPath::new("/nonexistent/catalog.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }

    #[test]
    fn test_all_sorted_by_name() {
        let kb = FoodKb::builtin().unwrap();
        let names: Vec<&str> = kb.all().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Breakfast Sandwich", "Caesar Salad", "Spaghetti and Meatballs"]
        );
    }
}
