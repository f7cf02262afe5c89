use serde::{Deserialize, Serialize};
use std::fmt;

/// A named recipe and the ingredients it uses.
///
/// The name is the identity of a recipe: storing a recipe under a name that
/// already exists replaces the previous one entirely. Ingredient names are
/// compared with exact, case-sensitive equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub ingredients: Vec<String>,
}

impl Recipe {
    /// Build a recipe, dropping repeated ingredients but keeping the order in
    /// which each ingredient was first listed.
    pub fn new<N, I, S>(name: N, ingredients: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut recipe = Self {
            name: name.into(),
            ingredients: Vec::new(),
        };
        for ingredient in ingredients {
            recipe.add_ingredient(ingredient);
        }
        recipe
    }

    /// Returns true if the recipe lists `ingredient`.
    pub fn uses_ingredient(&self, ingredient: &str) -> bool {
        self.ingredients.iter().any(|i| i == ingredient)
    }

    /// Returns true if the recipe lists every one of `ingredients`.
    ///
    /// An empty query is vacuously satisfied by every recipe.
    pub fn uses_ingredients<S: AsRef<str>>(&self, ingredients: &[S]) -> bool {
        ingredients
            .iter()
            .all(|ingredient| self.uses_ingredient(ingredient.as_ref()))
    }

    /// Append `ingredient` unless the recipe already lists it.
    pub fn add_ingredient<S: Into<String>>(&mut self, ingredient: S) {
        let ingredient = ingredient.into();
        if !self.uses_ingredient(&ingredient) {
            self.ingredients.push(ingredient);
        }
    }

    /// The same recipe with repeated ingredients removed.
    pub fn deduplicated(self) -> Self {
        Self::new(self.name, self.ingredients)
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for ingredient in &self.ingredients {
            write!(f, "\n  - {ingredient}")?;
        }
        Ok(())
    }
}

/// Compare two ingredient lists without regard to order.
///
/// Backends disagree on display order (insertion order in memory, lexical
/// order in SQL), so callers comparing recipes across backends use this
/// instead of `==`.
pub fn same_ingredients<A, B>(a: &[A], b: &[B]) -> bool
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    a.len() == b.len()
        && a
            .iter()
            .all(|x| b.iter().any(|y| y.as_ref() == x.as_ref()))
}
