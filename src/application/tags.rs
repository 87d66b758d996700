use std::sync::Arc;

use crate::application::error::ServiceError;
use crate::application::repos::{QuestionFilter, QuestionsRepo, TagsRepo};
use crate::domain::entities::{TagDetail, TagUsage};
use crate::domain::questions::apply_order;
use crate::domain::slug::normalize_tag;
use crate::domain::types::QuestionOrder;

#[derive(Clone)]
pub struct TagService {
    tags: Arc<dyn TagsRepo>,
    questions: Arc<dyn QuestionsRepo>,
}

impl TagService {
    pub fn new(tags: Arc<dyn TagsRepo>, questions: Arc<dyn QuestionsRepo>) -> Self {
        Self { tags, questions }
    }

    /// Tags with their question counts, most used first.
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<TagUsage>, ServiceError> {
        let search = search
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty());
        Ok(self.tags.list_usage(search.as_deref()).await?)
    }

    pub async fn get(&self, name: &str) -> Result<TagDetail, ServiceError> {
        let name = normalize_tag(name).map_err(|_| ServiceError::not_found("tag"))?;
        let tag = self
            .tags
            .find_tag(&name)
            .await?
            .ok_or(ServiceError::not_found("tag"))?;

        let mut questions = self
            .questions
            .list_summaries(&QuestionFilter {
                tag: Some(tag.name.clone()),
                ..QuestionFilter::default()
            })
            .await?;
        apply_order(&mut questions, QuestionOrder::Newest);

        Ok(TagDetail { tag, questions })
    }
}
