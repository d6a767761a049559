use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{BankRecordEntity, PlayerEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    points: i64,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            points: value.points,
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            points: value.points,
        }
    }
}

/// Question bank rows keep their store-assigned `_id`, which is ignored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    topic: String,
    question: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct_option: String,
}

impl From<MongoQuestionDocument> for BankRecordEntity {
    fn from(value: MongoQuestionDocument) -> Self {
        Self {
            topic: value.topic,
            question: value.question,
            option_a: value.option_a,
            option_b: value.option_b,
            option_c: value.option_c,
            option_d: value.option_d,
            correct_option: value.correct_option,
        }
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}
