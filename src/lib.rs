use std::collections::{BTreeMap, HashMap};

mod browser;
mod client;
mod config;
mod cookie_jar;
mod document;
mod dom;
mod driver;
mod field_resolver;
mod form;
mod form_cache;
mod form_controls;
mod handler;
mod html;
mod locator;
mod submitter;
mod xpath;

pub use browser::Browser;
pub use client::{BrowserClient, Request, Response, ServerParameters};
pub use config::DriverConfig;
pub use cookie_jar::{Cookie, CookieJar};
pub use document::Document;
pub use dom::NodeId;
pub use driver::BrowserKitDriver;
pub use form::{
    CellValue, ChoiceKind, FieldEntry, FieldKind, FieldValue, FileUpload, FormModel, UploadStatus,
    ValueCell,
};
pub use form_cache::{FormCache, FormIdentity};
pub use handler::{Handler, MockHandler};
pub use xpath::xpath_literal;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Generic driver failure: not-ready accessors, structural problems,
    /// capability mismatches and history misuse.
    #[error("{0}")]
    Driver(String),
    #[error("{kind} matching xpath \"{query}\" not found")]
    ElementNotFound { kind: String, query: String },
    #[error(
        "BrowserKitDriver supports clicking on links and submit or reset buttons only. But \"{tag}\" provided"
    )]
    UnsupportedAction { tag: String },
    /// Raised by the form model itself (unreachable field, value outside the
    /// available choices). `get_value` falls back to the raw attribute on it.
    #[error("{0}")]
    InvalidArgument(String),
    #[error("html parse error: {0}")]
    HtmlParse(String),
    #[error("invalid xpath expression: {0}")]
    XPath(String),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    pub(crate) fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

#[cfg(test)]
mod tests;
