use std::collections::HashMap;

use super::store::RatingStore;
use super::types::{Rating, RatingScale};
use crate::errors::EvalError;

/// Dense inner index of a user or item within one training set.
pub type InnerId = usize;

/// Training view over a subset of ratings.
///
/// Users and items get dense inner ids in order of first appearance, so two
/// training sets built from the same indices are identical.
#[derive(Debug, Clone)]
pub struct TrainSet {
    user_ids: HashMap<String, InnerId>,
    item_ids: HashMap<String, InnerId>,
    user_ratings: Vec<Vec<(InnerId, f64)>>,
    item_ratings: Vec<Vec<(InnerId, f64)>>,
    all_ratings: Vec<(InnerId, InnerId, f64)>,
    global_mean: f64,
    scale: RatingScale,
}

impl TrainSet {
    /// Training set over `indices` of `store`.
    pub fn from_indices(store: &RatingStore, indices: &[usize]) -> Result<Self, EvalError> {
        let ratings = indices.iter().map(|&idx| store.get(idx));
        Self::build(ratings, store.scale())
    }

    /// Training set over `ratings`, scale taken from the ratings themselves.
    pub fn from_ratings(ratings: &[Rating]) -> Result<Self, EvalError> {
        let scale = RatingScale::from_scores(ratings.iter().map(|r| r.score))
            .ok_or_else(|| EvalError::insufficient("training subset is empty"))?;
        Self::build(ratings.iter(), scale)
    }

    fn build<'a, I>(ratings: I, scale: RatingScale) -> Result<Self, EvalError>
    where
        I: Iterator<Item = &'a Rating>,
    {
        let mut trainset = TrainSet {
            user_ids: HashMap::new(),
            item_ids: HashMap::new(),
            user_ratings: Vec::new(),
            item_ratings: Vec::new(),
            all_ratings: Vec::new(),
            global_mean: 0.0,
            scale,
        };

        for rating in ratings {
            trainset.push(rating);
        }

        if trainset.all_ratings.is_empty() {
            return Err(EvalError::insufficient("training subset is empty"));
        }

        let total: f64 = trainset.all_ratings.iter().map(|&(_, _, r)| r).sum();
        trainset.global_mean = total / trainset.all_ratings.len() as f64;
        Ok(trainset)
    }

    fn push(&mut self, rating: &Rating) {
        let u = intern(&mut self.user_ids, &mut self.user_ratings, &rating.user_id);
        let i = intern(&mut self.item_ids, &mut self.item_ratings, &rating.item_id);

        self.user_ratings[u].push((i, rating.score));
        self.item_ratings[i].push((u, rating.score));
        self.all_ratings.push((u, i, rating.score));
    }

    pub fn num_users(&self) -> usize {
        self.user_ratings.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_ratings.len()
    }

    pub fn num_ratings(&self) -> usize {
        self.all_ratings.len()
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    pub fn scale(&self) -> RatingScale {
        self.scale
    }

    /// `(item, score)` pairs rated by inner user `u`.
    pub fn user_ratings(&self, u: InnerId) -> &[(InnerId, f64)] {
        &self.user_ratings[u]
    }

    /// `(user, score)` pairs for inner item `i`.
    pub fn item_ratings(&self, i: InnerId) -> &[(InnerId, f64)] {
        &self.item_ratings[i]
    }

    /// Every `(user, item, score)` in training order.
    pub fn all_ratings(&self) -> &[(InnerId, InnerId, f64)] {
        &self.all_ratings
    }

    pub fn inner_user(&self, user_id: &str) -> Option<InnerId> {
        self.user_ids.get(user_id).copied()
    }

    pub fn inner_item(&self, item_id: &str) -> Option<InnerId> {
        self.item_ids.get(item_id).copied()
    }

    pub(crate) fn id_maps(&self) -> (HashMap<String, InnerId>, HashMap<String, InnerId>) {
        (self.user_ids.clone(), self.item_ids.clone())
    }
}

fn intern(
    ids: &mut HashMap<String, InnerId>,
    lists: &mut Vec<Vec<(InnerId, f64)>>,
    raw: &str,
) -> InnerId {
    if let Some(&inner) = ids.get(raw) {
        return inner;
    }
    let inner = lists.len();
    ids.insert(raw.to_string(), inner);
    lists.push(Vec::new());
    inner
}
