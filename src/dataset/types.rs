use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type ItemId = String;
pub type Score = f64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub score: Score,
}

impl Rating {
    pub fn new(user_id: impl Into<UserId>, item_id: impl Into<ItemId>, score: Score) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            score,
        }
    }
}

/// Inclusive score range observed over the whole dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
    pub min: Score,
    pub max: Score,
}

impl RatingScale {
    /// Scale spanning `scores`, or `None` when there are none.
    pub fn from_scores<I: IntoIterator<Item = Score>>(scores: I) -> Option<Self> {
        scores.into_iter().fold(None, |scale, score| match scale {
            None => Some(RatingScale {
                min: score,
                max: score,
            }),
            Some(s) => Some(RatingScale {
                min: s.min.min(score),
                max: s.max.max(score),
            }),
        })
    }

    pub fn clip(&self, value: Score) -> Score {
        value.clamp(self.min, self.max)
    }
}
