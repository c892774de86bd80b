use std::collections::HashMap;

use super::types::{Rating, RatingScale};
use crate::errors::EvalError;

/// Immutable, indexed collection of ratings for one evaluation run.
#[derive(Debug, Clone)]
pub struct RatingStore {
    ratings: Vec<Rating>,
    scale: RatingScale,
    users: Vec<String>,
    items: Vec<String>,
    by_user: HashMap<String, Vec<usize>>,
    by_item: HashMap<String, Vec<usize>>,
}

impl RatingStore {
    /// Build a store from ratings in file order.
    ///
    /// `origin` names the data source in the error for an empty input.
    pub fn new(ratings: Vec<Rating>, origin: &str) -> Result<Self, EvalError> {
        let scale = RatingScale::from_scores(ratings.iter().map(|r| r.score)).ok_or_else(|| {
            EvalError::EmptyDataset {
                origin: origin.to_string(),
            }
        })?;

        let (users, by_user) = index_by(&ratings, |r| &r.user_id);
        let (items, by_item) = index_by(&ratings, |r| &r.item_id);

        Ok(Self {
            ratings,
            scale,
            users,
            items,
            by_user,
            by_item,
        })
    }

    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    pub fn get(&self, idx: usize) -> &Rating {
        &self.ratings[idx]
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn scale(&self) -> RatingScale {
        self.scale
    }

    /// Users in order of first appearance.
    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Items in order of first appearance.
    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn user_ratings<'a>(&'a self, user_id: &str) -> impl Iterator<Item = &'a Rating> + 'a {
        self.lookup(&self.by_user, user_id)
    }

    pub fn item_ratings<'a>(&'a self, item_id: &str) -> impl Iterator<Item = &'a Rating> + 'a {
        self.lookup(&self.by_item, item_id)
    }

    fn lookup<'a>(
        &'a self,
        index: &'a HashMap<String, Vec<usize>>,
        key: &str,
    ) -> impl Iterator<Item = &'a Rating> + 'a {
        index
            .get(key)
            .map(|indices| indices.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&idx| &self.ratings[idx])
    }
}

fn index_by<F>(ratings: &[Rating], key: F) -> (Vec<String>, HashMap<String, Vec<usize>>)
where
    F: Fn(&Rating) -> &String,
{
    let mut order = Vec::new();
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();

    for (idx, rating) in ratings.iter().enumerate() {
        let id = key(rating);
        if !index.contains_key(id) {
            order.push(id.clone());
        }
        index.entry(id.clone()).or_default().push(idx);
    }

    (order, index)
}
