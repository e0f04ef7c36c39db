//! Client view parameters.
//!
//! A list or chart view on the client re-sends its current query whenever
//! it changes. The parameters arrive as a flat string map with `@`-prefixed
//! keys; this module lifts the three the broker cares about.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Key carrying the client view identifier.
pub const VIEW_ID_PARAM: &str = "@viewId";
/// Key carrying the view kind.
pub const VIEW_TYPE_PARAM: &str = "@viewType";
/// Key carrying the view's search expression.
pub const SEARCH_PARAM: &str = "@search";

/// Kind of client view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    /// The client did not declare a view type.
    Unspecified,
    /// Tabular list view.
    Grid,
    /// Chart over a query result.
    Chart,
    /// Any other view (forms, trees, ...).
    Other(String),
}

impl ViewType {
    /// Parse the `@viewType` value.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" => ViewType::Unspecified,
            "grid" => ViewType::Grid,
            "chart" => ViewType::Chart,
            other => ViewType::Other(other.to_string()),
        }
    }

    /// Whether views of this type narrow their notifications by a search
    /// predicate.
    pub fn is_filtered(&self) -> bool {
        !matches!(self, ViewType::Other(_))
    }
}

/// Parameters a view registers with the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewParams {
    /// Client view identifier.
    pub view_id: String,
    /// Declared view type.
    pub view_type: ViewType,
    /// Search expression; empty means "everything".
    pub search: String,
}

impl ViewParams {
    /// Parameters for an unfiltered view of unspecified type.
    pub fn new(view_id: impl Into<String>) -> Self {
        Self {
            view_id: view_id.into(),
            view_type: ViewType::Unspecified,
            search: String::new(),
        }
    }

    /// Set the view type.
    pub fn with_view_type(mut self, view_type: ViewType) -> Self {
        self.view_type = view_type;
        self
    }

    /// Set the search expression.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Build from the raw client parameter map.
    ///
    /// Unknown keys are ignored. `@viewId` is required and must not be
    /// blank.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut view_id = None;
        let mut view_type = ViewType::Unspecified;
        let mut search = String::new();

        for (key, value) in pairs {
            match key.as_ref() {
                VIEW_ID_PARAM => view_id = Some(value.as_ref().trim().to_string()),
                VIEW_TYPE_PARAM => view_type = ViewType::parse(value.as_ref()),
                SEARCH_PARAM => search = value.as_ref().to_string(),
                _ => {}
            }
        }

        let view_id = view_id.ok_or(Error::MissingParam(VIEW_ID_PARAM))?;
        if view_id.is_empty() {
            return Err(Error::InvalidParam {
                name: VIEW_ID_PARAM,
                reason: "must not be empty".to_string(),
            });
        }
        if view_id.contains('|') {
            return Err(Error::InvalidParam {
                name: VIEW_ID_PARAM,
                reason: "must not contain '|'".to_string(),
            });
        }

        Ok(Self {
            view_id,
            view_type,
            search,
        })
    }
}
