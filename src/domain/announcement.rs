use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const DEFAULT_MAX_RESULTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub category: Category,
    pub active: bool,
    /// Server-assigned. `None` until the store has acknowledged the write.
    pub created_at: Option<DateTime<Utc>>,
    pub read_by: BTreeSet<String>,
}

impl Announcement {
    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by.contains(user_id)
    }

    /// Newest first. Records without a timestamp sort last and tie with each
    /// other; ties fall back to the id so the order is stable.
    pub fn newest_first(a: &Announcement, b: &Announcement) -> Ordering {
        let by_time = match (&a.created_at, &b.created_at) {
            (Some(x), Some(y)) => y.cmp(x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_time.then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    General,
    Urgent,
    Event,
    Academic,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::General,
        Category::Urgent,
        Category::Event,
        Category::Academic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Urgent => "urgent",
            Category::Event => "event",
            Category::Academic => "academic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "general" => Some(Category::General),
            "urgent" => Some(Category::Urgent),
            "event" => Some(Category::Event),
            "academic" => Some(Category::Academic),
            _ => None,
        }
    }
}

/// Fields an administrator supplies when publishing an announcement.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAnnouncementRequest {
    #[validate(
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom(function = "not_blank")
    )]
    pub title: String,
    #[validate(
        length(min = 1, max = 500, message = "must be between 1 and 500 characters"),
        custom(function = "not_blank")
    )]
    pub message: String,
    #[serde(default)]
    pub category: Category,
}

impl CreateAnnouncementRequest {
    /// Trims surrounding whitespace. Length limits apply to the stored text.
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            message: self.message.trim().to_string(),
            category: self.category,
        }
    }
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AnnouncementPatch {
    #[validate(
        length(min = 1, max = 100, message = "must be between 1 and 100 characters"),
        custom(function = "not_blank")
    )]
    pub title: Option<String>,
    #[validate(
        length(min = 1, max = 500, message = "must be between 1 and 500 characters"),
        custom(function = "not_blank")
    )]
    pub message: Option<String>,
    pub category: Option<Category>,
    pub active: Option<bool>,
}

impl AnnouncementPatch {
    pub fn active(active: bool) -> Self {
        Self {
            active: Some(active),
            ..Default::default()
        }
    }

    pub fn normalized(self) -> Self {
        Self {
            title: self.title.map(|t| t.trim().to_string()),
            message: self.message.map(|m| m.trim().to_string()),
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.message.is_none()
            && self.category.is_none()
            && self.active.is_none()
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Server-side predicate for queries and subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryFilter {
    pub active: Option<bool>,
    pub category: Option<Category>,
}

impl QueryFilter {
    /// The default end-user view.
    pub fn active_only() -> Self {
        Self {
            active: Some(true),
            category: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn matches(&self, announcement: &Announcement) -> bool {
        if let Some(active) = self.active {
            if announcement.active != active {
                return false;
            }
        }
        if let Some(category) = self.category {
            if announcement.category != category {
                return false;
            }
        }
        true
    }
}

/// Client-side tab filter over a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFilter {
    All,
    Unread,
    Category(Category),
}

impl ReadFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Some(ReadFilter::All),
            "unread" => Some(ReadFilter::Unread),
            other => Category::from_str(other).map(ReadFilter::Category),
        }
    }
}

/// e.g. "Oct 16, 2026, 3:04 PM"
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%b %-d, %Y, %-I:%M %p").to_string()
}
