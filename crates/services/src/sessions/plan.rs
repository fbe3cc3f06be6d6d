use rand::rng;
use rand::seq::SliceRandom;

use quiz_core::model::{Catalog, CatalogError};

/// Orders a stored catalog for a new session.
pub(crate) struct SessionPlan {
    shuffle: bool,
}

impl SessionPlan {
    #[must_use]
    pub(crate) fn new(shuffle: bool) -> Self {
        Self { shuffle }
    }

    /// Keep catalog order, or shuffle it when enabled.
    ///
    /// Retry passes always follow the order the session was started with.
    pub(crate) fn order(&self, catalog: Catalog) -> Result<Catalog, CatalogError> {
        if !self.shuffle {
            return Ok(catalog);
        }
        let mut questions = catalog.into_questions();
        let mut rng = rng();
        questions.as_mut_slice().shuffle(&mut rng);
        Catalog::new(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Answer, AnswerId, Question, QuestionId};

    fn catalog(n: u64) -> Catalog {
        let questions = (1..=n)
            .map(|id| {
                Question::new(
                    QuestionId::new(id),
                    format!("Q{id}"),
                    vec![Answer::new(AnswerId::new(1), "yes", true)],
                )
                .unwrap()
            })
            .collect();
        Catalog::new(questions).unwrap()
    }

    fn ids(catalog: &Catalog) -> Vec<u64> {
        catalog.questions().iter().map(|q| q.id().value()).collect()
    }

    #[test]
    fn plain_plan_keeps_catalog_order() {
        let ordered = SessionPlan::new(false).order(catalog(5)).unwrap();
        assert_eq!(ids(&ordered), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn shuffled_plan_keeps_every_question() {
        let shuffled = SessionPlan::new(true).order(catalog(20)).unwrap();
        let mut got = ids(&shuffled);
        got.sort_unstable();
        assert_eq!(got, (1..=20).collect::<Vec<_>>());
    }
}
