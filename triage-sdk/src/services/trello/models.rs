//! Trello REST data models

use serde::{Deserialize, Serialize};

use crate::pipeline::model::ReportSummary;

/// A card as returned by `POST /1/cards` and the list endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub desc: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub short_url: Option<String>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Card {
    /// Short link when available, full URL otherwise
    pub fn link(&self) -> Option<&str> {
        self.short_url.as_deref().or(self.url.as_deref())
    }
}

impl From<Card> for ReportSummary {
    fn from(card: Card) -> Self {
        let url = card.link().unwrap_or_default().to_string();
        Self {
            id: card.id,
            name: card.name,
            desc: card.desc,
            url,
            attachments: card.attachments.into_iter().filter_map(|a| a.url).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Attachment {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}
